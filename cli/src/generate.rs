#![deny(missing_docs)]

//! # Generate Command
//!
//! Generates the contexts of a single operation.

use crate::error::{CliError, CliResult};
use crate::output::OutputWriter;
use codegen_core::{Document, GenerateRequest, Generator, OperationOverrides, TargetDialect};
use std::path::PathBuf;

/// Arguments for the generate command.
#[derive(clap::Args, Debug, Clone)]
pub struct GenerateArgs {
    /// Path to the OpenAPI document (YAML or JSON).
    #[clap(long, env = "OPENSTACK_CODEGEN_OPENAPI")]
    pub openapi_path: PathBuf,

    /// `operationId` to generate.
    #[clap(long)]
    pub operation_id: String,

    /// Output dialect.
    #[clap(long, default_value = "sdk")]
    pub target: TargetDialect,

    /// Service name (defaults to the document title).
    #[clap(long, env = "OPENSTACK_CODEGEN_SERVICE")]
    pub service_name: Option<String>,

    /// Action selector of action discriminated bodies.
    #[clap(long)]
    pub operation_name: Option<String>,

    /// Module name of the generated file.
    #[clap(long)]
    pub module_name: Option<String>,

    /// Wrapping field of the response resource.
    #[clap(long)]
    pub response_key: Option<String>,

    /// Per-item wrapper inside list responses.
    #[clap(long)]
    pub response_list_item_key: Option<String>,

    /// CLI command name.
    #[clap(long)]
    pub command_name: Option<String>,

    /// Module path (`compute/v2/server`) for the selected target.
    #[clap(long)]
    pub mod_path: Option<String>,

    /// Output directory.
    #[clap(long, env = "OPENSTACK_CODEGEN_OUTPUT", default_value = "generated")]
    pub output_dir: PathBuf,
}

impl GenerateArgs {
    fn request(&self) -> GenerateRequest {
        let mut overrides = OperationOverrides {
            operation_name: self.operation_name.clone(),
            module_name: self.module_name.clone(),
            response_key: self.response_key.clone(),
            response_list_item_key: self.response_list_item_key.clone(),
            command_name: self.command_name.clone(),
            ..Default::default()
        };
        match self.target {
            TargetDialect::Sdk => overrides.sdk_mod_path = self.mod_path.clone(),
            TargetDialect::Cli => overrides.cli_mod_path = self.mod_path.clone(),
        }
        GenerateRequest {
            operation_id: self.operation_id.clone(),
            dialect: self.target,
            service_name: self.service_name.clone(),
            overrides,
        }
    }
}

/// Executes the generate command, returning the written files.
pub fn execute(args: &GenerateArgs) -> CliResult<Vec<PathBuf>> {
    if !args.openapi_path.exists() {
        return Err(CliError::General(format!(
            "OpenAPI file not found: {:?}",
            args.openapi_path
        )));
    }
    let doc = Document::load(&args.openapi_path)?;
    let contexts = Generator::new(&doc).generate(&args.request())?;

    let mut writer = OutputWriter::new(&args.output_dir);
    let mut written = writer.write(&contexts)?;
    written.extend(writer.finish()?);
    tracing::info!(
        operation_id = %args.operation_id,
        files = written.len(),
        output = %args.output_dir.display(),
        "generation finished"
    );
    Ok(written)
}
