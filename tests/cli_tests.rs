// Command line surface: argument parsing, exit codes, listings and bulk creates

use acceptance_framework::*;
use predicates::prelude::*;
use std::fs;

#[test]
fn test_version_flag() {
    let ctx = AcceptanceTestContext::new();
    ctx.cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_malformed_id_list_is_usage_error() {
    let ctx = AcceptanceTestContext::new();
    ctx.cmd()
        .args(["review", "create", "7,,8"])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("Empty element"));

    ctx.cmd()
        .args(["units", "delete", "9-3"])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("Start must not exceed end"));
}

#[test]
fn test_unknown_list_entity_is_usage_error() {
    let ctx = AcceptanceTestContext::new();
    ctx.cmd()
        .args(["list", "sessions"])
        .assert()
        .failure()
        .code(2);
}

#[test]
fn test_datastore_failure_is_internal_error() {
    // Given data.location points at a directory
    // When any command runs
    // Then exit code is 2 with the cause chain
    let ctx = AcceptanceTestContext::new();
    let blocked = ctx.db_path().parent().unwrap().join("not-a-file");
    fs::create_dir_all(&blocked).unwrap();
    ctx.set_config(&format!("data.location={}", blocked.display()));

    ctx.cmd()
        .args(["list", "projects"])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::starts_with("Internal error:"))
        .stderr(predicate::str::contains("Caused by:"));
}

#[test]
fn test_list_projects_and_stages() {
    let ctx = AcceptanceTestContext::new();
    GivenBuilder::new(ctx.db())
        .production_structure()
        .stage(1, sap::models::StageKind::Normal, 1, 1)
        .stage(2, sap::models::StageKind::Review, 1, 2);

    let mut when = WhenBuilder::new(&ctx);
    when.execute_success(&["list", "projects"]);
    let json = ThenBuilder::new(ctx.db(), when.result()).stdout_json();
    assert_eq!(json[0]["name"], "Topographic Mapping");
    assert_eq!(json[0]["finished"], false);

    let mut when = WhenBuilder::new(&ctx);
    when.execute_success(&["list", "stages"]);
    let json = ThenBuilder::new(ctx.db(), when.result()).stdout_json();
    let stages = json.as_array().unwrap();
    assert_eq!(stages.len(), 2);
    assert_eq!(stages[1]["kind"], "Review");
    assert_eq!(stages[1]["subphase"], "Hydrography");
    assert_eq!(stages[1]["project"], "Topographic Mapping");
}

#[test]
fn test_list_databases_splits_server_and_port() {
    let ctx = AcceptanceTestContext::new();
    ctx.db()
        .execute_batch(
            "INSERT INTO production_data (name, data_type, production_config) VALUES
                ('shapefiles', 1, '/data/shp'),
                ('bdgex_25k', 2, 'db.local:5432'),
                ('service_db', 3, 'pg-service');",
        )
        .unwrap();

    let mut when = WhenBuilder::new(&ctx);
    when.execute_success(&["list", "databases"]);

    let json = ThenBuilder::new(ctx.db(), when.result()).stdout_json();
    assert_eq!(
        json,
        serde_json::json!([
            {"name": "bdgex_25k", "server": "db.local", "port": "5432"},
            {"name": "service_db", "server": "pg-service", "port": null}
        ])
    );
}

#[test]
fn test_products_create_generates_uuid() {
    let ctx = AcceptanceTestContext::new();
    GivenBuilder::new(ctx.db()).production_structure();
    let file = ctx.write_json(
        "products.json",
        r#"[
            {"mi": "2901-1", "scale": "1:25000", "geom": "POLYGON((0 0,1 0,1 1,0 1,0 0))"},
            {"uuid": "0b9f4a52-0d6c-4c4e-9d0e-6f4f8e3f6a10", "scale": "1:25000", "geom": "POLYGON((1 0,2 0,2 1,1 1,1 0))"}
        ]"#,
    );

    let mut when = WhenBuilder::new(&ctx);
    when.execute_success(&["products", "create", "--line", "1", "--file", file.to_str().unwrap()]);
    ThenBuilder::new(ctx.db(), when.result()).message_contains("Created 2 products in production line 1");

    let mut when = WhenBuilder::new(&ctx);
    when.execute_success(&["products", "list", "--line", "1"]);
    let json = ThenBuilder::new(ctx.db(), when.result()).stdout_json();
    let generated = json[0]["uuid"].as_str().unwrap();
    assert_eq!(generated.len(), 36);
    assert_eq!(json[1]["uuid"], "0b9f4a52-0d6c-4c4e-9d0e-6f4f8e3f6a10");
}

#[test]
fn test_products_for_unknown_line_fail() {
    let ctx = AcceptanceTestContext::new();
    let file = ctx.write_json(
        "products.json",
        r#"[{"scale": "1:25000", "geom": "POINT(0 0)"}]"#,
    );

    let mut when = WhenBuilder::new(&ctx);
    when.execute_failure(&["products", "create", "--line", "5", "--file", file.to_str().unwrap()]);
    ThenBuilder::new(ctx.db(), when.result())
        .exit_code_is(1)
        .message_contains("Production line not found");
}

#[test]
fn test_inputs_create_and_group_listing() {
    let ctx = AcceptanceTestContext::new();

    let mut when = WhenBuilder::new(&ctx);
    when.execute_success(&["inputs", "create-group", "Imagery"]);
    ThenBuilder::new(ctx.db(), when.result()).message_contains("Created input group 'Imagery' (id: 1)");

    let file = ctx.write_json(
        "inputs.json",
        r#"[
            {"name": "ortho-2901", "path": "/data/ortho-2901.tif", "geom": "SRID=4674;POLYGON((0 0,1 0,1 1,0 1,0 0))", "input_group_id": 1},
            {"name": "dem", "path": "/data/dem.tif", "input_group_id": 1}
        ]"#,
    );
    let mut when = WhenBuilder::new(&ctx);
    when.execute_success(&["inputs", "create", "--file", file.to_str().unwrap()]);
    ThenBuilder::new(ctx.db(), when.result()).message_contains("Created 2 inputs");

    let mut when = WhenBuilder::new(&ctx);
    when.execute_success(&["inputs", "groups"]);
    let json = ThenBuilder::new(ctx.db(), when.result()).stdout_json();
    assert_eq!(json, serde_json::json!([{"id": 1, "name": "Imagery"}]));
}

#[test]
fn test_empty_json_payload_is_rejected() {
    let ctx = AcceptanceTestContext::new();
    GivenBuilder::new(ctx.db()).production_structure();
    let file = ctx.write_json("units.json", "[]");

    ctx.cmd()
        .args(["units", "create", "--subphase", "1", "--file", file.to_str().unwrap()])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("contains no records"));
}

#[test]
fn test_units_list_as_json() {
    let ctx = AcceptanceTestContext::new();
    GivenBuilder::new(ctx.db())
        .production_structure()
        .work_unit(7, 1, "POINT(0 0)")
        .work_unit(9, 2, "POINT(1 1)");

    let mut when = WhenBuilder::new(&ctx);
    when.execute_success(&["units", "list", "--subphase", "1"]);

    let json = ThenBuilder::new(ctx.db(), when.result()).stdout_json();
    let units = json.as_array().unwrap();
    assert_eq!(units.len(), 1);
    assert_eq!(units[0]["id"], 7);
    assert_eq!(units[0]["name"], "WU-7");
}
