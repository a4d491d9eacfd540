#![deny(missing_docs)]

//! # OpenStack Codegen CLI
//!
//! Command Line Interface for the OpenAPI SDK/CLI code generator.
//!
//! Supported Commands:
//! - `generate`: one operation, one target.
//! - `batch`: every operation of a metadata file.

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::CliResult;

mod batch;
mod error;
mod generate;
mod output;

#[derive(Parser, Debug)]
#[clap(author, version, about = "OpenStack SDK/CLI code generator")]
struct Cli {
    /// Log pipeline progress at debug level.
    #[clap(long, short, global = true, env = "OPENSTACK_CODEGEN_VERBOSE")]
    verbose: bool,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate a single operation.
    Generate(generate::GenerateArgs),
    /// Generate every operation listed in a metadata file.
    Batch(batch::BatchArgs),
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> CliResult<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Commands::Generate(args) => {
            let written = generate::execute(args)?;
            println!("Generated {} files in {:?}", written.len(), args.output_dir);
        }
        Commands::Batch(args) => {
            let summary = batch::execute(args)?;
            println!(
                "Generated {} operations ({} files) in {:?}",
                summary.succeeded,
                summary.files.len(),
                args.output_dir
            );
            batch::check(&summary)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli_structure() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_generate_arguments() {
        let cli = Cli::try_parse_from([
            "openstack-codegen",
            "generate",
            "--openapi-path",
            "compute.yaml",
            "--operation-id",
            "servers:create",
            "--target",
            "cli",
            "-v",
        ])
        .unwrap();
        assert!(cli.verbose);
        let Commands::Generate(args) = cli.command else {
            panic!("expected generate");
        };
        assert_eq!(args.target, codegen_core::TargetDialect::Cli);
        assert_eq!(args.operation_id, "servers:create");
    }
}
