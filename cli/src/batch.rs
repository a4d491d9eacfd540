#![deny(missing_docs)]

//! # Batch Command
//!
//! Generates every operation listed in a metadata file. Failed operations are
//! reported and skipped; the command fails at the end if any did.

use crate::error::{CliError, CliResult};
use crate::output::OutputWriter;
use codegen_core::{Document, Generator, Metadata};
use std::path::PathBuf;

/// Arguments for the batch command.
#[derive(clap::Args, Debug, Clone)]
pub struct BatchArgs {
    /// Path to the OpenAPI document (YAML or JSON).
    #[clap(long, env = "OPENSTACK_CODEGEN_OPENAPI")]
    pub openapi_path: PathBuf,

    /// Path to the metadata file.
    #[clap(long, env = "OPENSTACK_CODEGEN_METADATA")]
    pub metadata_path: PathBuf,

    /// Output directory.
    #[clap(long, env = "OPENSTACK_CODEGEN_OUTPUT", default_value = "generated")]
    pub output_dir: PathBuf,
}

/// Summary of a batch run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    /// Successfully generated (operation, target) pairs.
    pub succeeded: usize,
    /// Failed pairs as `label (target): error`.
    pub failed: Vec<String>,
    /// Files written.
    pub files: Vec<PathBuf>,
}

/// Executes the batch command.
pub fn execute(args: &BatchArgs) -> CliResult<BatchSummary> {
    let doc = Document::load(&args.openapi_path)?;
    let metadata = Metadata::load(&args.metadata_path)?;

    let mut summary = BatchSummary::default();
    let mut writer = OutputWriter::new(&args.output_dir);
    for report in Generator::new(&doc).run_batch(&metadata) {
        match &report.result {
            Ok(contexts) => {
                summary.files.extend(writer.write(contexts)?);
                summary.succeeded += 1;
            }
            Err(e) => summary
                .failed
                .push(format!("{} ({}): {}", report.label, report.dialect, e)),
        }
    }
    summary.files.extend(writer.finish()?);

    tracing::info!(
        succeeded = summary.succeeded,
        failed = summary.failed.len(),
        "batch finished"
    );
    Ok(summary)
}

/// Turns failures of a summary into an error.
pub fn check(summary: &BatchSummary) -> CliResult<()> {
    if summary.failed.is_empty() {
        return Ok(());
    }
    Err(CliError::General(format!(
        "{} operation(s) failed:\n  {}",
        summary.failed.len(),
        summary.failed.join("\n  ")
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const DOC: &str = r#"
openapi: 3.1.0
info: {title: Block Storage, version: "3"}
paths:
  /v3/volumes/{volume_id}:
    parameters:
      - {name: volume_id, in: path, required: true, schema: {type: string}}
    get:
      operationId: volumes:show
      responses:
        '200':
          content:
            application/json:
              schema:
                type: object
                properties:
                  volume:
                    type: object
                    properties:
                      id: {type: string}
                      size: {type: integer}
    delete:
      operationId: volumes:delete
      responses:
        '202': {description: accepted}
"#;

    const METADATA: &str = r#"
service: block_storage
operations:
  volume_show:
    operation_id: volumes:show
    targets:
      sdk: {}
      cli: {command_name: show}
  volume_delete:
    operation_id: volumes:delete
    targets:
      sdk: {}
  volume_bogus:
    operation_id: volumes:bogus
    targets:
      cli: {}
"#;

    #[test]
    fn test_batch_collects_failures() {
        let dir = tempdir().unwrap();
        let openapi_path = dir.path().join("openapi.yaml");
        let metadata_path = dir.path().join("metadata.yaml");
        fs::write(&openapi_path, DOC).unwrap();
        fs::write(&metadata_path, METADATA).unwrap();

        let args = BatchArgs {
            openapi_path,
            metadata_path,
            output_dir: dir.path().join("out"),
        };
        let summary = execute(&args).unwrap();
        assert_eq!(summary.succeeded, 3);
        assert_eq!(summary.failed.len(), 1);
        assert!(summary.failed[0].starts_with("volume_bogus (cli)"));

        let volume_mod =
            fs::read_to_string(dir.path().join("out/sdk/block_storage/v3/volume/mod.rs")).unwrap();
        assert_eq!(volume_mod, "pub mod delete;\npub mod get;\n");
        assert!(dir
            .path()
            .join("out/cli/block_storage/v3/volume/get.json")
            .exists());

        let err = check(&summary).unwrap_err();
        assert!(format!("{}", err).contains("1 operation(s) failed"));
    }

    #[test]
    fn test_check_ok() {
        assert!(check(&BatchSummary::default()).is_ok());
    }
}
