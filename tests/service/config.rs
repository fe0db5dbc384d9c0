//! Configuration precedence as seen through a composed app.

use std::io::Write;

use gangway::{App, Error, Loader, Metadata, Method, Overrides, json};
use tempfile::NamedTempFile;

use super::add;

fn method_of(metadata: &Metadata, overrides: &Overrides) -> Method {
    let app = App::build(vec![add()], metadata, overrides).unwrap();
    app.routes()[0].method.clone()
}

#[test]
fn function_metadata_beats_overrides_beats_defaults() {
    let func = add();
    let overrides = Overrides::new().set("http_method", "put");

    let mut metadata = Metadata::new();
    metadata.http_get(&func);
    let app = App::build(vec![func.clone()], &metadata, &overrides).unwrap();
    assert_eq!(app.routes()[0].method, Method::GET);

    assert_eq!(method_of(&Metadata::new(), &overrides), Method::PUT);
    assert_eq!(method_of(&Metadata::new(), &Overrides::new()), Method::POST);
}

#[test]
fn per_function_map_with_fallback() {
    let overrides = Overrides::new().set("http_method", json!({"add": "get", "$else": "put"}));
    assert_eq!(method_of(&Metadata::new(), &overrides), Method::GET);

    let overrides = Overrides::new().set("http_method", json!({"other": "get", "$else": "put"}));
    assert_eq!(method_of(&Metadata::new(), &overrides), Method::PUT);

    let overrides = Overrides::new().set("http_method", json!({"other": "get"}));
    assert_eq!(method_of(&Metadata::new(), &overrides), Method::POST);
}

#[test]
fn wrong_type_fails_at_build() {
    let overrides = Overrides::new().set("http_method", 3i64);
    let err = App::build(vec![add()], &Metadata::new(), &overrides).err().unwrap();
    assert!(matches!(err, Error::ConfigType { ref key, .. } if key == "http_method"));

    let overrides = Overrides::new().set("http_method", "patch");
    assert!(matches!(
        App::build(vec![add()], &Metadata::new(), &overrides),
        Err(Error::Config(_))
    ));
}

#[test]
fn loaded_file_configures_the_app() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
port = 8080
publish_openapi = true

[input_mapper]
add = "binary"
"$else" = "json"

[openapi]
title = "Calculator"
"#
    )
    .unwrap();

    let overrides = Loader::new("GANGWAY_TEST_UNSET")
        .load(Some(file.path()), Some("127.0.0.1"), None, None)
        .unwrap();
    let app = App::build(vec![add()], &Metadata::new(), &overrides).unwrap();

    assert_eq!(app.host(), "127.0.0.1");
    assert_eq!(app.port(), 8080);
    assert_eq!(app.routes()[0].request_content_type(), "application/octet-stream");
    let doc = app.openapi().unwrap();
    assert_eq!(doc["info"]["title"], "Calculator");
    assert_eq!(doc["servers"][0]["url"], "http://127.0.0.1:8080");
}

#[test]
fn cli_arguments_win_over_file() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "host = \"0.0.0.0\"\nframework = \"hyper\"").unwrap();
    let overrides = Loader::new("GANGWAY_TEST_UNSET")
        .load(Some(file.path()), Some("127.0.0.1"), Some(9000), Some("hyper_blocking"))
        .unwrap();
    assert_eq!(overrides.get("host").and_then(|v| v.as_str()), Some("127.0.0.1"));
    assert_eq!(overrides.get("port").and_then(|v| v.as_i64()), Some(9000));
    assert_eq!(
        overrides.get("framework").and_then(|v| v.as_str()),
        Some("hyper_blocking")
    );
}
