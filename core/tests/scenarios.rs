use codegen_core::emitter::{FieldSnapshot, TypeSnapshot, TypesSnapshot};
use codegen_core::model::{DataType, Primitive, PrimitiveString, SchemaParser};
use codegen_core::types::{CliTypeManager, SdkTypeManager};
use codegen_core::{Document, GenerateRequest, Generator, TargetDialect};
use pretty_assertions::assert_eq;
use serde_json::Value;

fn yaml(text: &str) -> Value {
    serde_yaml::from_str(text).unwrap()
}

fn sdk_types(schema: &str) -> TypesSnapshot {
    let parsed = SchemaParser::new().parse(&yaml(schema)).unwrap();
    let mut tm = SdkTypeManager::new();
    tm.set_models(parsed).unwrap();
    TypesSnapshot::capture(&tm).unwrap()
}

fn cli_types(schema: &str) -> TypesSnapshot {
    let parsed = SchemaParser::new().parse(&yaml(schema)).unwrap();
    let mut tm = CliTypeManager::new();
    tm.set_models(parsed).unwrap();
    TypesSnapshot::capture(&tm).unwrap()
}

fn root(types: &TypesSnapshot) -> &TypeSnapshot {
    types.root.as_ref().unwrap()
}

fn field<'a>(decl: &'a TypeSnapshot, remote: &str) -> &'a FieldSnapshot {
    decl.fields
        .iter()
        .find(|f| f.remote_name == remote)
        .unwrap_or_else(|| panic!("no field {}", remote))
}

const MINIMAL: &str = r#"
type: object
properties:
  name: {type: string}
  count: {type: integer}
"#;

#[test]
fn minimal_object() {
    let types = sdk_types(MINIMAL);
    let root = root(&types);
    assert_eq!(root.name, "Request");
    assert_eq!(root.fields.len(), 2);
    assert_eq!(field(root, "name").type_hint, "Option<Cow<'a, str>>");
    assert_eq!(field(root, "count").type_hint, "Option<i32>");
    assert!(field(root, "name").is_optional);
    assert!(types.subtypes.is_empty());
}

#[test]
fn required_subset() {
    let schema = format!("{}required: [name]\n", MINIMAL);
    let parsed = SchemaParser::new().parse(&yaml(&schema)).unwrap();
    let DataType::Struct(s) = &parsed.root else {
        panic!("root is not a struct");
    };
    assert!(s.fields["name"].is_required);
    assert!(!s.fields["count"].is_required);

    let types = sdk_types(&schema);
    assert_eq!(field(root(&types), "name").type_hint, "Cow<'a, str>");
    assert_eq!(field(root(&types), "count").type_hint, "Option<i32>");
}

const COMPUTE: &str = r#"
openapi: 3.1.0
info: {title: Compute, version: "2.1"}
paths:
  /v2.1/servers:
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
                  x-openstack: {min-ver: "2.1"}
                  properties:
                    server:
                      type: object
                      properties:
                        name: {type: string}
                - type: object
                  x-openstack: {min-ver: "2.47"}
                  properties:
                    server:
                      type: object
                      properties:
                        name: {type: string}
                        description: {type: [string, "null"]}
                        networks:
                          type: array
                          items:
                            type: object
                            properties:
                              uuid: {type: string}
                              port: {type: string}
                              fixed_ip: {type: string}
                              tag: {type: string}
      responses:
        '202':
          content:
            application/json:
              schema:
                type: object
                properties:
                  server: {type: object, properties: {id: {type: string}}}
  /v2.1/servers/{server_id}/action:
    parameters:
      - {name: server_id, in: path, required: true, schema: {type: string}}
    post:
      operationId: servers:action
      requestBody:
        content:
          application/json:
            schema:
              type: object
              oneOf:
                - type: object
                  x-openstack: {action-name: reboot}
                  properties:
                    hard: {type: boolean}
                - type: object
                  x-openstack: {action-name: rebuild}
                  properties:
                    image: {type: string}
      responses:
        '202': {description: accepted}
"#;

#[test]
fn action_discriminator_selects_variant() {
    let doc = Document::parse(COMPUTE).unwrap();
    let mut request = GenerateRequest::new("servers:action", TargetDialect::Sdk);
    request.overrides.operation_name = Some("reboot".into());
    let contexts = Generator::new(&doc).generate(&request).unwrap();
    assert_eq!(contexts.len(), 1);

    let ctx = &contexts[0];
    assert_eq!(ctx.operation_name.as_deref(), Some("reboot"));
    assert_eq!(ctx.module_name, "reboot");
    let root = root(&ctx.types);
    let names: Vec<&str> = root.fields.iter().map(|f| f.remote_name.as_str()).collect();
    assert_eq!(names, vec!["hard"]);
    assert_eq!(field(root, "hard").type_hint, "Option<bool>");
}

#[test]
fn microversion_discriminator_splits_modules() {
    let doc = Document::parse(COMPUTE).unwrap();
    let contexts = Generator::new(&doc)
        .generate(&GenerateRequest::new("servers:create", TargetDialect::Sdk))
        .unwrap();
    let modules: Vec<&str> = contexts.iter().map(|c| c.module_name.as_str()).collect();
    assert_eq!(modules, vec!["create_21", "create_247"]);

    let old: Vec<&str> = contexts[0].types.subtypes.iter().map(|t| t.name.as_str()).collect();
    let new: Vec<&str> = contexts[1].types.subtypes.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(old, vec!["Server"]);
    assert!(new.contains(&"Server"));
    assert!(new.contains(&"Networks"));
    assert_eq!(contexts[0].microversion.as_deref(), Some("2.1"));
    assert_eq!(contexts[1].module_path, "compute/v2/server");
}

#[test]
fn string_or_null_field() {
    let schema = r#"
type: object
properties:
  field: {type: [string, "null"], maxLength: 255}
"#;
    let parsed = SchemaParser::new().parse(&yaml(schema)).unwrap();
    let DataType::Struct(s) = &parsed.root else {
        panic!("root is not a struct");
    };
    let DataType::OneOf(one_of) = &s.fields["field"].data_type else {
        panic!("field is not a oneOf");
    };
    assert_eq!(
        one_of.kinds[0],
        DataType::Primitive(Primitive::String(PrimitiveString {
            max_length: Some(255),
            ..Default::default()
        }))
    );

    let types = cli_types(schema);
    let field = field(root(&types), "field");
    assert_eq!(field.type_hint, "Option<String>");
    assert!(field.is_nullable);
}

#[test]
fn string_or_integer_per_dialect() {
    let schema = r#"
type: object
properties:
  flavorRef: {oneOf: [{type: string}, {type: integer}]}
required: [flavorRef]
"#;
    assert_eq!(field(root(&sdk_types(schema)), "flavorRef").type_hint, "Cow<'a, str>");
    let cli = cli_types(schema);
    let flavor_ref = field(root(&cli), "flavorRef");
    assert_eq!(flavor_ref.type_hint, "IntString");
    assert_eq!(flavor_ref.local_name, "flavor_ref");
    assert!(cli.imports.contains(&"openstack_sdk::types::IntString".to_string()));
}

#[test]
fn array_of_structs_collapsed_in_cli() {
    let doc = Document::parse(COMPUTE).unwrap();
    let generator = Generator::new(&doc);

    let cli = generator
        .generate(&GenerateRequest::new("servers:create", TargetDialect::Cli))
        .unwrap();
    let server = cli[1]
        .types
        .subtypes
        .iter()
        .find(|t| t.name == "Server")
        .unwrap();
    let networks = field(server, "networks");
    assert_eq!(networks.type_hint, "Option<Vec<Value>>");
    assert_eq!(networks.original.as_deref(), Some("networks"));
    assert!(!cli[1].types.subtypes.iter().any(|t| t.name == "Networks"));
    assert!(cli[1].response_types.is_some());
    cli[1].preview().unwrap();

    let sdk = generator
        .generate(&GenerateRequest::new("servers:create", TargetDialect::Sdk))
        .unwrap();
    let networks = sdk[1]
        .types
        .subtypes
        .iter()
        .find(|t| t.name == "Networks")
        .unwrap();
    assert_eq!(networks.fields.len(), 4);
    let server = sdk[1]
        .types
        .subtypes
        .iter()
        .find(|t| t.name == "Server")
        .unwrap();
    assert_eq!(
        field(server, "networks").type_hint,
        "Option<Vec<Networks<'a>>>"
    );
    sdk[1].preview().unwrap();
}
