#![deny(missing_docs)]

//! # Output Writer
//!
//! Lays generated contexts out on disk:
//!
//! ```text
//! <out>/<dialect>/<service>/<version>/<resource>/<module>.json   context
//! <out>/<dialect>/<service>/<version>/<resource>/<module>.rs     declaration preview
//! <out>/<dialect>/**/mod.rs                                      module tree
//! ```

use crate::error::CliResult;
use codegen_core::{ModTree, OperationContext, TargetDialect};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Writes contexts and keeps one module tree per dialect.
#[derive(Debug)]
pub struct OutputWriter {
    root: PathBuf,
    trees: BTreeMap<TargetDialect, ModTree>,
}

impl OutputWriter {
    /// Writer rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            trees: BTreeMap::new(),
        }
    }

    /// Writes the context file and declaration preview of every context.
    pub fn write(&mut self, contexts: &[OperationContext]) -> CliResult<Vec<PathBuf>> {
        let mut written = Vec::new();
        for ctx in contexts {
            let base = self
                .root
                .join(ctx.dialect.to_string())
                .join(&ctx.module_path);
            fs::create_dir_all(&base)?;

            let json_path = base.join(format!("{}.json", ctx.module_name));
            fs::write(&json_path, serde_json::to_string_pretty(ctx)?)?;
            let rs_path = base.join(format!("{}.rs", ctx.module_name));
            fs::write(&rs_path, ctx.preview()?)?;
            tracing::debug!(path = %rs_path.display(), "module written");

            self.trees
                .entry(ctx.dialect)
                .or_default()
                .register(&ctx.full_module_path());
            written.push(json_path);
            written.push(rs_path);
        }
        Ok(written)
    }

    /// Writes the `mod.rs` files of every registered module path.
    pub fn finish(self) -> CliResult<Vec<PathBuf>> {
        let mut written = Vec::new();
        for (dialect, tree) in &self.trees {
            let base = self.root.join(dialect.to_string());
            for (dir, content) in tree.render() {
                let path = mod_file(&base, &dir);
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::write(&path, content)?;
                written.push(path);
            }
        }
        Ok(written)
    }
}

fn mod_file(base: &Path, dir: &str) -> PathBuf {
    if dir.is_empty() {
        base.join("mod.rs")
    } else {
        base.join(dir).join("mod.rs")
    }
}
