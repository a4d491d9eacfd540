#![deny(missing_docs)]

//! # Generator
//!
//! Runs the pipeline for one operation:
//!
//! 1. bind the operation (parameters, body variants, response resource),
//! 2. parse every body variant into the ADT,
//! 3. feed the ADT and the parameters to the dialect's type manager,
//! 4. capture the result into an [`OperationContext`].
//!
//! Microversion discriminated bodies yield one context per variant. The batch
//! runner drives a whole metadata file and never aborts on a failed operation.

use crate::config::{BinderConfig, Metadata, OperationOverrides};
use crate::emitter::{OperationContext, TypesSnapshot};
use crate::error::AppResult;
use crate::model::adt::{ParameterLocation, RequestParameter};
use crate::model::SchemaParser;
use crate::oas::binder::{BodyVariant, OperationBinder, OperationBinding, OperationType};
use crate::oas::loader::Document;
use crate::oas::naming::{major_version, microversion_suffix};
use crate::types::{
    CliDialect, CliResponseTypeManager, Dialect, SdkDialect, TargetDialect, TypeManager,
};
use heck::ToSnakeCase;
use serde_json::Value;

/// Header names carrying the requested microversion.
pub const MICROVERSION_HEADERS: &[&str] =
    &["OpenStack-API-Version", "X-OpenStack-Nova-API-Version"];

/// One generation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateRequest {
    /// `operationId` to generate.
    pub operation_id: String,
    /// Output dialect.
    pub dialect: TargetDialect,
    /// Service name; derived from the document title when absent.
    pub service_name: Option<String>,
    /// Caller overrides.
    pub overrides: OperationOverrides,
}

impl GenerateRequest {
    /// A request without overrides.
    pub fn new(operation_id: impl Into<String>, dialect: TargetDialect) -> Self {
        Self {
            operation_id: operation_id.into(),
            dialect,
            service_name: None,
            overrides: OperationOverrides::default(),
        }
    }
}

/// Outcome of one (operation, target) pair of a batch.
#[derive(Debug)]
pub struct OperationReport {
    /// Label of the operation in the metadata file.
    pub label: String,
    /// `operationId`.
    pub operation_id: String,
    /// Target dialect.
    pub dialect: TargetDialect,
    /// Generated contexts, or why generation failed.
    pub result: AppResult<Vec<OperationContext>>,
}

impl OperationReport {
    /// Whether generation succeeded.
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Drives the pipeline over one document.
#[derive(Debug, Clone)]
pub struct Generator<'a> {
    doc: &'a Document,
    config: BinderConfig,
}

impl<'a> Generator<'a> {
    /// Creates a generator with the built-in binder configuration.
    pub fn new(doc: &'a Document) -> Self {
        Self {
            doc,
            config: BinderConfig::default(),
        }
    }

    /// Replaces the binder configuration.
    pub fn with_config(mut self, config: BinderConfig) -> Self {
        self.config = config;
        self
    }

    /// Service name: explicit, else the snake_case document title.
    pub fn service_name(&self, explicit: Option<&str>) -> String {
        explicit
            .map(str::to_string)
            .or_else(|| self.doc.title().map(|t| t.to_snake_case()))
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "service".to_string())
    }

    /// Generates one context per body variant of an operation.
    pub fn generate(&self, request: &GenerateRequest) -> AppResult<Vec<OperationContext>> {
        let binder = OperationBinder::new(self.doc).with_config(self.config.clone());
        let binding = binder.bind(&request.operation_id, &request.overrides)?;
        let service_name = self.service_name(request.service_name.as_deref());
        let module_path = module_path(&binding, &service_name, request);
        let base_module = binding.module_name(&request.overrides);

        let response_types = match (request.dialect, &binding.response_schema) {
            (TargetDialect::Cli, Some(schema)) => Some(response_snapshot(schema)?),
            _ => None,
        };

        let variants: Vec<Option<&BodyVariant>> = if binding.request_body_variants.is_empty() {
            vec![None]
        } else {
            binding.request_body_variants.iter().map(Some).collect()
        };
        let suffixed = variants.len() > 1;

        let mut contexts = Vec::with_capacity(variants.len());
        for (idx, variant) in variants.into_iter().enumerate() {
            let types = match request.dialect {
                TargetDialect::Sdk => request_snapshot::<SdkDialect>(&binder, &binding, variant)?,
                TargetDialect::Cli => request_snapshot::<CliDialect>(&binder, &binding, variant)?,
            };
            let microversion = variant.and_then(|v| v.min_ver.clone());
            let module_name = match (&microversion, suffixed) {
                (Some(ver), true) => format!("{}{}", base_module, microversion_suffix(ver)),
                (None, true) => format!("{}_{}", base_module, idx + 1),
                (_, false) => base_module.clone(),
            };
            tracing::debug!(
                operation_id = %binding.operation_id,
                module = %module_name,
                subtypes = types.subtypes.len(),
                "context built"
            );
            contexts.push(context(
                &binding,
                request,
                &service_name,
                &module_path,
                module_name,
                microversion,
                types,
                response_types.clone(),
            ));
        }
        tracing::info!(
            operation_id = %request.operation_id,
            dialect = %request.dialect,
            contexts = contexts.len(),
            "operation generated"
        );
        Ok(contexts)
    }

    /// Runs every (operation, target) pair of `metadata`.
    pub fn run_batch(&self, metadata: &Metadata) -> Vec<OperationReport> {
        let generator = self
            .clone()
            .with_config(self.config.clone().with_overrides(&metadata.required_overrides));
        let mut reports = Vec::new();
        for (label, operation) in &metadata.operations {
            for &dialect in operation.targets.keys() {
                let request = GenerateRequest {
                    operation_id: operation.operation_id.clone(),
                    dialect,
                    service_name: metadata.service.clone(),
                    overrides: operation.overrides_for(dialect),
                };
                let result = generator.generate(&request);
                if let Err(e) = &result {
                    tracing::error!(
                        label = %label,
                        dialect = %dialect,
                        error = %e,
                        "operation failed"
                    );
                }
                reports.push(OperationReport {
                    label: label.clone(),
                    operation_id: operation.operation_id.clone(),
                    dialect,
                    result,
                });
            }
        }
        reports
    }
}

fn request_snapshot<D: Dialect + Default>(
    binder: &OperationBinder<'_>,
    binding: &OperationBinding,
    variant: Option<&BodyVariant>,
) -> AppResult<TypesSnapshot> {
    let mut manager = TypeManager::<D>::new();
    if let Some(variant) = variant {
        let mut parsed = SchemaParser::new()
            .ignore_read_only(true)
            .parse(&variant.schema)?;
        binder.apply_required_overrides(&mut parsed);
        manager.set_models(parsed)?;
    }
    manager.set_parameters(&binding.parameters)?;
    TypesSnapshot::capture(&manager)
}

fn response_snapshot(schema: &Value) -> AppResult<TypesSnapshot> {
    let parsed = SchemaParser::new().parse(schema)?;
    let mut manager = CliResponseTypeManager::new();
    manager.set_models(parsed)?;
    TypesSnapshot::capture(&manager)
}

/// `service/vN/resource/names`, unless overridden.
fn module_path(binding: &OperationBinding, service_name: &str, request: &GenerateRequest) -> String {
    let explicit = match request.dialect {
        TargetDialect::Sdk => &request.overrides.sdk_mod_path,
        TargetDialect::Cli => &request.overrides.cli_mod_path,
    };
    if let Some(path) = explicit {
        return path.trim_matches('/').to_string();
    }
    let mut segments = vec![service_name.to_string()];
    if let Some(version) = binding
        .path
        .split('/')
        .find(|s| !s.is_empty())
        .and_then(major_version)
    {
        segments.push(version);
    }
    segments.extend(binding.resource_names.iter().cloned());
    segments.join("/")
}

fn has_query(parameters: &[RequestParameter], name: &str) -> bool {
    parameters
        .iter()
        .any(|p| p.location == ParameterLocation::Query && p.name == name)
}

#[allow(clippy::too_many_arguments)]
fn context(
    binding: &OperationBinding,
    request: &GenerateRequest,
    service_name: &str,
    module_path: &str,
    module_name: String,
    microversion: Option<String>,
    types: TypesSnapshot,
    response_types: Option<TypesSnapshot>,
) -> OperationContext {
    let params = &binding.parameters;
    let is_list = binding.operation_type == OperationType::List;
    let headers = || params.iter().filter(|p| p.location == ParameterLocation::Header);
    let microversion_header = headers()
        .find(|p| {
            MICROVERSION_HEADERS
                .iter()
                .any(|h| h.eq_ignore_ascii_case(&p.name))
        })
        .map(|p| p.name.clone());

    OperationContext {
        operation_id: binding.operation_id.clone(),
        target_class_name: binding.target_class_name(),
        service_name: service_name.to_string(),
        module_name,
        module_path: module_path.to_string(),
        operation_type: binding.operation_type,
        operation_name: binding.operation_name.clone(),
        command_name: request.overrides.command_name.clone(),
        method: binding.method.clone(),
        url: binding.path.clone(),
        response_codes: binding.response_codes.clone(),
        request_mime_type: binding.request_mime_type.clone(),
        response_mime_type: binding.response_mime_type.clone(),
        response_key: binding.response_key.clone(),
        response_list_item_key: request.overrides.response_list_item_key.clone(),
        response_is_list: binding.response_is_list,
        is_paginated: is_list && has_query(params, "limit") && has_query(params, "marker"),
        find_by_name_available: is_list && has_query(params, "name"),
        has_header_params: headers().next().is_some(),
        microversion,
        microversion_header,
        dialect: request.dialect,
        types,
        response_types,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;

    const DOC: &str = r#"
openapi: 3.1.0
info: {title: Compute, version: "2.1"}
paths:
  /v2.1/servers:
    get:
      operationId: servers:list
      parameters:
        - {name: limit, in: query, schema: {type: integer}}
        - {name: marker, in: query, schema: {type: string}}
        - {name: name, in: query, schema: {type: string}}
        - {name: OpenStack-API-Version, in: header, schema: {type: string}}
      responses:
        '200':
          content:
            application/json:
              schema:
                type: object
                properties:
                  servers:
                    type: array
                    items:
                      type: object
                      properties:
                        id: {type: string}
                        name: {type: string}
    post:
      operationId: servers:create
      requestBody:
        content:
          application/json:
            schema:
              type: object
              x-openstack: {discriminator: microversion}
              oneOf:
                - type: object
                  x-openstack: {min-ver: "2.1", max-ver: "2.46"}
                  properties:
                    server: {type: object, properties: {name: {type: string}}}
                - type: object
                  x-openstack: {min-ver: "2.47"}
                  properties:
                    server:
                      type: object
                      properties:
                        name: {type: string}
                        flavorRef: {type: string}
      responses:
        '202':
          content:
            application/json:
              schema:
                type: object
                properties:
                  server: {type: object, properties: {id: {type: string}}}
  /v2.1/servers/{server_id}:
    delete:
      operationId: servers:delete
      parameters:
        - {name: server_id, in: path, required: true, schema: {type: string}}
      responses:
        '204': {description: gone}
"#;

    fn doc() -> Document {
        Document::parse(DOC).unwrap()
    }

    #[test]
    fn test_service_name_from_title() {
        let doc = doc();
        let generator = Generator::new(&doc);
        assert_eq!(generator.service_name(None), "compute");
        assert_eq!(generator.service_name(Some("nova")), "nova");
    }

    #[test]
    fn test_list_context_flags() {
        let doc = doc();
        let contexts = Generator::new(&doc)
            .generate(&GenerateRequest::new("servers:list", TargetDialect::Sdk))
            .unwrap();
        assert_eq!(contexts.len(), 1);
        let ctx = &contexts[0];
        assert_eq!(ctx.operation_type, OperationType::List);
        assert_eq!(ctx.target_class_name, "Servers");
        assert_eq!(ctx.module_name, "list");
        assert_eq!(ctx.module_path, "compute/v2/server");
        assert_eq!(ctx.full_module_path(), "compute/v2/server/list");
        assert!(ctx.is_paginated);
        assert!(ctx.find_by_name_available);
        assert!(ctx.has_header_params);
        assert_eq!(ctx.microversion_header.as_deref(), Some("OpenStack-API-Version"));
        assert_eq!(ctx.response_key.as_deref(), Some("servers"));
        assert!(ctx.response_types.is_none());
        assert_eq!(ctx.types.parameters.len(), 4);
    }

    #[test]
    fn test_cli_list_has_response_types() {
        let doc = doc();
        let contexts = Generator::new(&doc)
            .generate(&GenerateRequest::new("servers:list", TargetDialect::Cli))
            .unwrap();
        let response = contexts[0].response_types.as_ref().unwrap();
        let root = response.root.as_ref().unwrap();
        assert_eq!(root.name, "Response");
        assert_eq!(root.fields.len(), 2);
        assert!(contexts[0].preview().is_ok());
    }

    #[test]
    fn test_microversion_contexts() {
        let doc = doc();
        let contexts = Generator::new(&doc)
            .generate(&GenerateRequest::new("servers:create", TargetDialect::Sdk))
            .unwrap();
        let modules: Vec<&str> = contexts.iter().map(|c| c.module_name.as_str()).collect();
        assert_eq!(modules, vec!["create_21", "create_247"]);
        assert_eq!(contexts[1].microversion.as_deref(), Some("2.47"));
        let server = contexts[1]
            .types
            .subtypes
            .iter()
            .find(|t| t.name == "Server")
            .unwrap();
        // Built-in override: Server requires name and flavorRef
        assert!(server.fields.iter().all(|f| !f.is_optional));
        assert_eq!(contexts[0].types.subtypes.len(), 1);
    }

    #[test]
    fn test_module_path_override_and_no_body() {
        let doc = doc();
        let mut request = GenerateRequest::new("servers:delete", TargetDialect::Cli);
        request.overrides.cli_mod_path = Some("/compute/v2/server/".into());
        request.overrides.command_name = Some("delete".into());
        let contexts = Generator::new(&doc).generate(&request).unwrap();
        let ctx = &contexts[0];
        assert_eq!(ctx.module_path, "compute/v2/server");
        assert_eq!(ctx.operation_type, OperationType::Delete);
        assert_eq!(ctx.command_name.as_deref(), Some("delete"));
        assert_eq!(ctx.types.root.as_ref().unwrap().fields.len(), 0);
        assert_eq!(ctx.response_codes, vec!["204"]);
        assert!(!ctx.is_paginated);
    }

    #[test]
    fn test_batch_keeps_going() {
        let doc = doc();
        let metadata = Metadata::from_yaml(
            r#"
service: compute
operations:
  server_list:
    operation_id: servers:list
    targets:
      sdk: {}
      cli: {command_name: list}
  missing:
    operation_id: servers:missing
    targets:
      sdk: {}
"#,
        )
        .unwrap();
        let reports = Generator::new(&doc).run_batch(&metadata);
        assert_eq!(reports.len(), 3);
        assert!(reports[0].is_ok());
        assert!(reports[1].is_ok());
        assert!(matches!(
            reports[2].result,
            Err(AppError::OperationNotFound(_))
        ));
    }

    #[test]
    fn test_batch_isolates_recursive_operation() {
        let doc = Document::parse(
            r#"
openapi: 3.1.0
info: {title: Network, version: "2.0"}
paths:
  /v2.0/networks:
    get:
      operationId: networks:list
      responses:
        '200':
          content:
            application/json:
              schema:
                type: object
                properties:
                  networks:
                    type: array
                    items: {type: object, properties: {id: {type: string}}}
  /v2.0/trees:
    post:
      operationId: trees:create
      requestBody:
        content:
          application/json:
            schema:
              $ref: '#/components/schemas/Tree'
      responses:
        '201': {description: created}
components:
  schemas:
    Tree:
      type: object
      properties:
        children:
          type: array
          items:
            $ref: '#/components/schemas/Tree'
"#,
        )
        .unwrap();
        let metadata = Metadata::from_yaml(
            r#"
service: network
operations:
  network_list:
    operation_id: networks:list
    targets:
      sdk: {}
  tree_create:
    operation_id: trees:create
    targets:
      sdk: {}
"#,
        )
        .unwrap();
        let reports = Generator::new(&doc).run_batch(&metadata);
        assert_eq!(reports.len(), 2);
        assert!(reports[0].is_ok());
        assert_eq!(reports[1].label, "tree_create");
        assert!(matches!(
            reports[1].result,
            Err(AppError::RecursiveSchema(_))
        ));
    }
}
