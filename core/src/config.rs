#![deny(missing_docs)]

//! # Configuration
//!
//! Per-operation overrides and the batch metadata file.
//!
//! ```yaml
//! service: compute
//! operations:
//!   server_create:
//!     operation_id: servers:create
//!     operation_type: create
//!     targets:
//!       sdk: { module_name: create, sdk_mod_path: compute/v2/server }
//!       cli: { module_name: create, command_name: create, response_key: server }
//! required_overrides:
//!   Server: [name, flavorRef]
//! ```

use crate::error::{AppError, AppResult};
use crate::oas::binder::OperationType;
use crate::types::TargetDialect;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Caller supplied knobs for one (operation, target) pair.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OperationOverrides {
    /// Forces the operation type instead of inferring it from method and URL.
    pub operation_type: Option<OperationType>,
    /// Action selector for `action` discriminated bodies.
    pub operation_name: Option<String>,
    /// Module name of the generated file.
    pub module_name: Option<String>,
    /// Explicit wrapping field of the response resource.
    pub response_key: Option<String>,
    /// Explicit per-item wrapper inside list responses.
    pub response_list_item_key: Option<String>,
    /// CLI command name.
    pub command_name: Option<String>,
    /// SDK module path (`compute/v2/server`).
    pub sdk_mod_path: Option<String>,
    /// CLI module path.
    pub cli_mod_path: Option<String>,
}

impl OperationOverrides {
    /// Fills every unset field from `defaults`.
    pub fn or(mut self, defaults: &OperationOverrides) -> Self {
        macro_rules! fill {
            ($($field:ident),*) => {
                $(if self.$field.is_none() {
                    self.$field = defaults.$field.clone();
                })*
            };
        }
        fill!(
            operation_type,
            operation_name,
            module_name,
            response_key,
            response_list_item_key,
            command_name,
            sdk_mod_path,
            cli_mod_path
        );
        self
    }
}

/// One entry of the metadata file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OperationMetadata {
    /// `operationId` in the OpenAPI document.
    pub operation_id: String,
    /// Operation type shared by every target.
    #[serde(default)]
    pub operation_type: Option<OperationType>,
    /// Action selector shared by every target.
    #[serde(default)]
    pub operation_name: Option<String>,
    /// Per-target overrides. Only listed targets are generated.
    #[serde(default)]
    pub targets: IndexMap<TargetDialect, OperationOverrides>,
}

impl OperationMetadata {
    /// Effective overrides for `target`.
    pub fn overrides_for(&self, target: TargetDialect) -> OperationOverrides {
        let shared = OperationOverrides {
            operation_type: self.operation_type,
            operation_name: self.operation_name.clone(),
            ..Default::default()
        };
        self.targets
            .get(&target)
            .cloned()
            .unwrap_or_default()
            .or(&shared)
    }
}

/// A batch description: one service, many operations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Metadata {
    /// Service name (module root). Derived from the document title when absent.
    #[serde(default)]
    pub service: Option<String>,
    /// Operations keyed by a free-form label.
    #[serde(default)]
    pub operations: IndexMap<String, OperationMetadata>,
    /// Extra required-field overrides keyed by type name.
    #[serde(default)]
    pub required_overrides: IndexMap<String, Vec<String>>,
}

impl Metadata {
    /// Reads a metadata YAML file.
    pub fn load(path: impl AsRef<Path>) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parses metadata from YAML text.
    pub fn from_yaml(content: &str) -> AppResult<Self> {
        serde_yaml::from_str(content)
            .map_err(|e| AppError::Parse(format!("Failed to parse metadata: {}", e)))
    }
}

/// Binder settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinderConfig {
    /// Required field lists keyed by generated type name.
    pub required_overrides: IndexMap<String, Vec<String>>,
}

impl Default for BinderConfig {
    fn default() -> Self {
        let mut required_overrides = IndexMap::new();
        required_overrides.insert(
            "Server".to_string(),
            vec!["name".to_string(), "flavorRef".to_string()],
        );
        required_overrides.insert("Keypair".to_string(), vec!["name".to_string()]);
        Self { required_overrides }
    }
}

impl BinderConfig {
    /// Adds (or replaces) overrides on top of the built-in table.
    pub fn with_overrides(mut self, extra: &IndexMap<String, Vec<String>>) -> Self {
        for (name, fields) in extra {
            self.required_overrides.insert(name.clone(), fields.clone());
        }
        self
    }

    /// Required fields for a type name, if overridden.
    pub fn required_for(&self, type_name: &str) -> Option<&[String]> {
        self.required_overrides.get(type_name).map(Vec::as_slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const METADATA: &str = r#"
service: compute
operations:
  server_create:
    operation_id: servers:create
    operation_type: create
    targets:
      sdk: { module_name: create, sdk_mod_path: compute/v2/server }
      cli: { module_name: create, command_name: create, response_key: server }
  server_reboot:
    operation_id: servers/server_id/action:post
    operation_type: action
    operation_name: reboot
    targets:
      sdk: {}
required_overrides:
  Flavor: [name, ram]
"#;

    #[test]
    fn test_metadata_parsing() {
        let meta = Metadata::from_yaml(METADATA).unwrap();
        assert_eq!(meta.service.as_deref(), Some("compute"));
        let create = &meta.operations["server_create"];
        assert_eq!(create.operation_id, "servers:create");
        let cli = create.overrides_for(TargetDialect::Cli);
        assert_eq!(cli.command_name.as_deref(), Some("create"));
        assert_eq!(cli.response_key.as_deref(), Some("server"));
        assert_eq!(cli.operation_type, Some(OperationType::Create));
    }

    #[test]
    fn test_shared_fields_flow_into_targets() {
        let meta = Metadata::from_yaml(METADATA).unwrap();
        let sdk = meta.operations["server_reboot"].overrides_for(TargetDialect::Sdk);
        assert_eq!(sdk.operation_name.as_deref(), Some("reboot"));
        assert_eq!(sdk.operation_type, Some(OperationType::Action));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = Metadata::from_yaml("servise: compute\n").unwrap_err();
        assert!(matches!(err, AppError::Parse(_)));
    }

    #[test]
    fn test_binder_config_overrides() {
        let meta = Metadata::from_yaml(METADATA).unwrap();
        let config = BinderConfig::default().with_overrides(&meta.required_overrides);
        assert_eq!(
            config.required_for("Flavor"),
            Some(&["name".to_string(), "ram".to_string()][..])
        );
        assert!(config.required_for("Server").is_some());
        assert!(config.required_for("Image").is_none());
    }
}
