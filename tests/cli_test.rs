use clap::Parser;
use openapi_from_routes::cli::{parse_args_from_parsed, run, CliArgs};
use openapi_from_routes::serializer::load_document;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::path::PathBuf;
use tempfile::TempDir;

fn fixture(name: &str) -> String {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
        .to_string_lossy()
        .into_owned()
}

fn generate(temp_dir: &TempDir, file_name: &str, format: &str) -> Value {
    let output = temp_dir.path().join(file_name);
    let args = CliArgs::try_parse_from([
        "openapi-from-routes".to_string(),
        "generate".to_string(),
        fixture("routes.json"),
        "--docs".to_string(),
        fixture("docs.yaml"),
        "--config".to_string(),
        fixture("config.yaml"),
        "-f".to_string(),
        format.to_string(),
        "-o".to_string(),
        output.to_string_lossy().into_owned(),
    ])
    .unwrap();

    run(parse_args_from_parsed(args).unwrap()).unwrap();
    load_document(&output).unwrap()
}

#[test]
fn test_generate_from_fixtures() {
    let temp_dir = TempDir::new().unwrap();
    let document = generate(&temp_dir, "openapi.json", "json");

    assert_eq!(document["openapi"], "3.0.3");
    assert_eq!(document["info"]["title"], "Orders API");
    assert_eq!(document["servers"][0]["url"], "https://orders.example.com");

    // excluded, ignored and undocumented routes are all gone
    let paths: Vec<&String> = document["paths"].as_object().unwrap().keys().collect();
    assert_eq!(paths, vec!["/health", "/orders", "/orders/{id}"]);
    let orders = document["paths"]["/orders"].as_object().unwrap();
    assert_eq!(orders.keys().collect::<Vec<_>>(), vec!["get", "post"]);
    let order = document["paths"]["/orders/{id}"].as_object().unwrap();
    assert_eq!(order.keys().collect::<Vec<_>>(), vec!["get"]);
}

#[test]
fn test_generated_operations() {
    let temp_dir = TempDir::new().unwrap();
    let document = generate(&temp_dir, "openapi.json", "json");

    let health = &document["paths"]["/health"]["get"];
    assert_eq!(health["summary"], "Health check");
    assert_eq!(health["operationId"], "get_health");

    let index = &document["paths"]["/orders"]["get"];
    assert_eq!(index["operationId"], "orders_index");
    assert_eq!(index["tags"], json!(["Orders"]));
    assert_eq!(index["parameters"][0]["name"], "page");
    assert_eq!(index["parameters"][0]["in"], "query");
    assert_eq!(index["parameters"][0]["required"], false);
    assert_eq!(
        index["responses"]["200"]["content"]["application/json"]["schema"]["items"]["$ref"],
        "#/components/schemas/order"
    );

    let show = &document["paths"]["/orders/{id}"]["get"];
    assert_eq!(show["operationId"], "get_orders_{id}");
    assert_eq!(show["parameters"][0]["name"], "id");
    assert_eq!(show["parameters"][0]["in"], "path");
    assert_eq!(show["parameters"][0]["required"], true);
    assert_eq!(show["responses"]["404"]["description"], "No such order");
    assert!(show["responses"]["404"].get("content").is_none());

    let store = &document["paths"]["/orders"]["post"];
    assert_eq!(store["security"], json!([{"bearerAuth": []}]));
    let content = store["requestBody"]["content"].as_object().unwrap();
    assert_eq!(
        content.keys().collect::<Vec<_>>(),
        vec!["application/json", "application/x-www-form-urlencoded"]
    );
    assert_eq!(store["requestBody"]["required"], true);
}

#[test]
fn test_components_tags_and_overlay() {
    let temp_dir = TempDir::new().unwrap();
    let document = generate(&temp_dir, "openapi.yaml", "yaml");

    assert_eq!(document["components"]["schemas"]["order"]["required"], json!(["id", "sku"]));
    assert_eq!(
        document["components"]["securitySchemes"]["bearerAuth"],
        json!({"type": "http", "scheme": "bearer", "bearerFormat": "JWT"})
    );
    assert_eq!(
        document["tags"],
        json!([{"name": "Orders", "description": "Everything about orders"}])
    );
    assert_eq!(document["externalDocs"]["url"], "https://docs.orders.example.com");
}

#[test]
fn test_generated_document_validates() {
    let temp_dir = TempDir::new().unwrap();
    generate(&temp_dir, "openapi.yaml", "yaml");

    let args = CliArgs::try_parse_from([
        "openapi-from-routes".to_string(),
        "validate".to_string(),
        temp_dir.path().join("openapi.yaml").to_string_lossy().into_owned(),
    ])
    .unwrap();
    run(parse_args_from_parsed(args).unwrap()).unwrap();
}
