use openapi_from_routes::compiler::{FilterConfig, RouteCompiler};
use openapi_from_routes::config::{load_config, GeneratorConfig};
use openapi_from_routes::dsl::{rules, shape};
use openapi_from_routes::handler::{Handler, HandlerResolver, Loaded, ServiceContainer};
use openapi_from_routes::metadata::{
    api_body, api_operation, api_query, api_response, BodyOptions, OperationOptions,
    ParamOptions, ResponseOptions,
};
use openapi_from_routes::normalizer::{Normalizer, ValidatorKind};
use openapi_from_routes::openapi_builder::OpenApiBuilder;
use openapi_from_routes::registry::{MetadataRegistry, OwnerId};
use openapi_from_routes::router::{RouteEntry, RouteFile, RouteTable};
use openapi_from_routes::upload;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::fs;
use tempfile::TempDir;

struct TestController;
struct UsersController;
struct AvatarsController;
struct ProfilesController;

fn registry() -> MetadataRegistry {
    let mut registry = MetadataRegistry::new();
    registry.document::<TestController, _>(
        "handle",
        [
            api_operation(OperationOptions::default().summary("Test endpoint").tags(["Test"])),
            api_response(
                200,
                "OK",
                ResponseOptions::default().schema(json!({
                    "type": "object",
                    "properties": {"ok": {"type": "boolean"}}
                })),
            ),
            api_response(400, "Bad request", ResponseOptions::default()),
        ],
    );
    registry.document::<UsersController, _>(
        "index",
        [
            api_operation(OperationOptions::default().summary("List users").tags(["Users"])),
            api_query("search", ParamOptions::default()),
            api_response(200, "Users", ResponseOptions::default()),
        ],
    );
    registry.document::<UsersController, _>(
        "show",
        [
            api_operation(OperationOptions::default().summary("Show user").tags(["Users"])),
            api_response(
                200,
                "The user",
                ResponseOptions::default()
                    .schema(shape::object([
                        ("id", shape::string().uuid()),
                        ("createdAt", shape::datetime()),
                        ("bio", shape::string().nullable()),
                    ]))
                    .validator(ValidatorKind::Shape),
            ),
        ],
    );
    registry.document::<AvatarsController, _>(
        "store",
        [
            api_operation(OperationOptions::default().summary("Upload avatar")),
            api_body(
                rules::object([
                    ("caption", rules::string().optional()),
                    ("avatar", rules::file(upload::file())),
                ]),
                BodyOptions::default().validator(ValidatorKind::Rules),
            ),
            api_response(204, "Stored", ResponseOptions::default()),
        ],
    );
    registry.document::<ProfilesController, _>(
        "update",
        [
            api_operation(OperationOptions::default().summary("Update profile")),
            api_body(
                shape::object([
                    ("name", shape::string()),
                    (
                        "contact",
                        shape::object([
                            ("email", shape::string().email()),
                            ("photo", shape::file(upload::file())),
                        ]),
                    ),
                    (
                        "documents",
                        shape::array(shape::object([
                            ("kind", shape::enumeration(["passport", "license"])),
                            ("scan", shape::file(upload::file())),
                        ])),
                    ),
                ]),
                BodyOptions::default().validator(ValidatorKind::Shape),
            ),
            api_response(204, "Updated", ResponseOptions::default()),
        ],
    );
    registry
}

fn users_loader() -> Handler {
    Handler::lazy(
        || {
            Ok(Loaded::Module {
                default: Some(OwnerId::of::<UsersController>()),
            })
        },
        "show",
    )
}

fn generate(table: &RouteTable, filter: FilterConfig) -> Value {
    let registry = registry();
    let handlers = HandlerResolver::new()
        .with_container(ServiceContainer::new().bind("users", OwnerId::of::<UsersController>()));
    let normalizer = Normalizer::new();
    let compiler = RouteCompiler::new(&registry, &handlers, &normalizer).with_filter(filter);
    OpenApiBuilder::new()
        .with_info("Integration".to_string(), "0.1.0".to_string(), None)
        .generate(table, &compiler)
        .unwrap()
}

#[test]
fn test_documented_route_end_to_end() {
    let table = RouteTable::Flat(vec![
        RouteEntry::new("GET", "/test", Handler::class(OwnerId::of::<TestController>(), "handle")),
        RouteEntry::new(
            "GET",
            "/undocumented",
            Handler::class(OwnerId::of::<TestController>(), "missing"),
        ),
    ]);
    let document = generate(&table, FilterConfig::default());

    let paths: Vec<&String> = document["paths"].as_object().unwrap().keys().collect();
    assert_eq!(paths, vec!["/test"]);

    let operation = &document["paths"]["/test"]["get"];
    assert_eq!(operation["summary"], "Test endpoint");
    assert_eq!(operation["tags"], json!(["Test"]));
    assert_eq!(operation["operationId"], "get_test");
    let statuses: Vec<&String> = operation["responses"].as_object().unwrap().keys().collect();
    assert_eq!(statuses, vec!["200", "400"]);
    assert_eq!(
        operation["responses"]["200"]["content"]["application/json"]["schema"]["properties"]["ok"]
            ["type"],
        "boolean"
    );
    assert!(operation["responses"]["400"].get("content").is_none());

    assert_eq!(document["tags"], json!([{"name": "Test"}]));
    assert_eq!(document["info"]["title"], "Integration");
}

#[test]
fn test_lazy_loader_and_container_handlers() {
    let table = RouteTable::Flat(vec![
        RouteEntry::new("GET", "/users", Handler::reference("users.index")).named("users.index"),
        RouteEntry::new("GET", "/users/:id", users_loader()),
    ]);
    let document = generate(&table, FilterConfig::default());

    assert_eq!(document["paths"]["/users"]["get"]["operationId"], "users_index");
    assert_eq!(
        document["paths"]["/users"]["get"]["parameters"],
        json!([{"name": "search", "in": "query", "required": false, "schema": {"type": "string"}}])
    );

    let show = &document["paths"]["/users/{id}"]["get"];
    assert_eq!(show["operationId"], "get_users_{id}");
    assert_eq!(show["parameters"][0]["name"], "id");
    assert_eq!(show["parameters"][0]["required"], true);

    let user = &show["responses"]["200"]["content"]["application/json"]["schema"];
    assert_eq!(user["properties"]["createdAt"]["format"], "date-time");
    assert!(user["properties"]["createdAt"].get("pattern").is_none());
    assert_eq!(user["required"], json!(["id", "createdAt"]));
}

#[test]
fn test_ignore_methods_keeps_other_methods() {
    let table = RouteTable::Flat(vec![RouteEntry::new(
        "GET",
        "/test",
        Handler::class(OwnerId::of::<TestController>(), "handle"),
    )
    .with_methods(["GET", "HEAD"])]);

    let everything = generate(&table, FilterConfig::default());
    let methods: Vec<&String> = everything["paths"]["/test"].as_object().unwrap().keys().collect();
    assert_eq!(methods, vec!["get", "head"]);

    let filtered = generate(
        &table,
        FilterConfig {
            ignore_methods: vec!["HEAD".to_string()],
            ..FilterConfig::default()
        },
    );
    let methods: Vec<&String> = filtered["paths"]["/test"].as_object().unwrap().keys().collect();
    assert_eq!(methods, vec!["get"]);
}

#[test]
fn test_upload_body_becomes_multipart() {
    let table = RouteTable::Flat(vec![RouteEntry::new(
        "POST",
        "/avatars",
        Handler::class(OwnerId::of::<AvatarsController>(), "store"),
    )]);
    let document = generate(&table, FilterConfig::default());

    let body = &document["paths"]["/avatars"]["post"]["requestBody"];
    assert_eq!(body["required"], true);
    let content = body["content"].as_object().unwrap();
    assert_eq!(content.keys().collect::<Vec<_>>(), vec!["multipart/form-data"]);

    let schema = &content["multipart/form-data"]["schema"];
    assert_eq!(schema["properties"]["avatar"]["type"], "string");
    assert_eq!(schema["properties"]["avatar"]["format"], "binary");
    assert_eq!(schema["required"], json!(["avatar"]));
    // internal markers never reach the document
    assert!(!schema.to_string().contains("x-upload"));
}

#[test]
fn test_domain_table_from_json() {
    let table: RouteTable = serde_json::from_value(json!({
        "root": [
            {"pattern": "/test", "method": "GET", "handler": "users.index"}
        ],
        "admin.example.com": [
            {"pattern": "/users", "methods": ["GET"], "handler": "users.index"}
        ]
    }))
    .unwrap();
    let document = generate(&table, FilterConfig::default());

    let paths: Vec<&String> = document["paths"].as_object().unwrap().keys().collect();
    assert_eq!(paths, vec!["/test", "/users"]);
}

#[test]
fn test_components_and_overlay() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(
        temp_dir.path().join("user.schema.json"),
        r#"{"type": "object", "properties": {"id": {"type": "string"}}}"#,
    )
    .unwrap();

    let registry = registry();
    let handlers = HandlerResolver::new();
    let normalizer = Normalizer::new();
    let compiler = RouteCompiler::new(&registry, &handlers, &normalizer);
    let table = RouteTable::Flat(vec![RouteEntry::new(
        "GET",
        "/test",
        Handler::class(OwnerId::of::<TestController>(), "handle"),
    )]);

    let document = OpenApiBuilder::new()
        .with_components_dir(temp_dir.path().to_path_buf())
        .with_overlay(json!({
            "info": {"title": "Overlaid", "version": "9.9.9"},
            "paths": {"/extra": {"get": {"responses": {"204": {"description": "Nothing"}}}}},
            "components": {"schemas": {"Extra": {"type": "string"}}}
        }))
        .generate(&table, &compiler)
        .unwrap();

    assert_eq!(document["info"], json!({"title": "Overlaid", "version": "9.9.9"}));
    let paths: Vec<&String> = document["paths"].as_object().unwrap().keys().collect();
    assert_eq!(paths, vec!["/test", "/extra"]);
    let schemas: Vec<&String> = document["components"]["schemas"]
        .as_object()
        .unwrap()
        .keys()
        .collect();
    assert_eq!(schemas, vec!["user", "Extra"]);
}

#[test]
fn test_missing_route_file_gives_empty_paths() {
    let temp_dir = TempDir::new().unwrap();
    let registry = registry();
    let handlers = HandlerResolver::new();
    let normalizer = Normalizer::new();
    let compiler = RouteCompiler::new(&registry, &handlers, &normalizer);

    let document = OpenApiBuilder::new()
        .generate(&RouteFile::new(temp_dir.path().join("routes.json")), &compiler)
        .unwrap();

    assert_eq!(document["paths"], json!({}));
    assert_eq!(document["openapi"], "3.0.3");
}

#[test]
fn test_nested_upload_fields_keep_their_paths() {
    let table = RouteTable::Flat(vec![RouteEntry::new(
        "PUT",
        "/profile",
        Handler::class(OwnerId::of::<ProfilesController>(), "update"),
    )]);
    let document = generate(&table, FilterConfig::default());

    let content = document["paths"]["/profile"]["put"]["requestBody"]["content"]
        .as_object()
        .unwrap();
    assert_eq!(content.keys().collect::<Vec<_>>(), vec!["multipart/form-data"]);

    let schema = &content["multipart/form-data"]["schema"];
    let contact = &schema["properties"]["contact"];
    assert_eq!(contact["properties"]["email"]["format"], "email");
    assert_eq!(
        contact["properties"]["photo"],
        json!({"type": "string", "format": "binary"})
    );
    assert_eq!(contact["required"], json!(["email", "photo"]));

    let document_item = &schema["properties"]["documents"]["items"];
    assert_eq!(document_item["properties"]["scan"]["format"], "binary");
    assert_eq!(document_item["required"], json!(["kind", "scan"]));
    assert!(!schema.to_string().contains("x-upload"));
    assert!(!schema.to_string().contains("conversion failed"));
}

#[test]
fn test_malformed_route_entries_do_not_sink_the_table() {
    let table: RouteTable = serde_json::from_value(json!({
        "root": [
            {"pattern": "/test", "method": "GET", "handler": "users.index"},
            {"pattern": "/broken", "method": "GET", "handler": 42},
            {"pattern": "/headless", "method": "GET"}
        ],
        "admin.example.com": [
            {"pattern": "/users", "method": "GET", "handler": "users.index",
             "middleware": {"auth": "admin"}}
        ]
    }))
    .unwrap();
    let document = generate(&table, FilterConfig::default());

    let paths: Vec<&String> = document["paths"].as_object().unwrap().keys().collect();
    assert_eq!(paths, vec!["/test", "/users"]);
}

#[test]
fn test_unmodelled_security_schemes_reach_the_document() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("openapi.yaml");
    fs::write(
        &path,
        r#"
info:
  title: Secured
  version: 1.0.0
securitySchemes:
  oidc:
    type: openIdConnect
    openIdConnectUrl: https://id.example.com/.well-known/openid-configuration
  partner:
    type: x-partner-signature
    header: X-Partner-Signature
    x-rotation-days: 30
"#,
    )
    .unwrap();
    let config: GeneratorConfig = load_config(&path).unwrap();

    let registry = registry();
    let handlers = HandlerResolver::new();
    let normalizer = Normalizer::new();
    let compiler = RouteCompiler::new(&registry, &handlers, &normalizer);
    let document = OpenApiBuilder::from_config(&config)
        .generate(&RouteTable::Flat(Vec::new()), &compiler)
        .unwrap();

    let schemes = &document["components"]["securitySchemes"];
    assert_eq!(
        schemes["oidc"],
        json!({
            "type": "openIdConnect",
            "openIdConnectUrl": "https://id.example.com/.well-known/openid-configuration"
        })
    );
    assert_eq!(
        schemes["partner"],
        json!({
            "type": "x-partner-signature",
            "header": "X-Partner-Signature",
            "x-rotation-days": 30
        })
    );
}
