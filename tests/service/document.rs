//! Document assembly through the composer.

use gangway::{
    Annotation, App, Error, Function, Metadata, Overrides, Param, Record, Signature, SubService,
    json,
};

use super::add;

#[test]
fn add_is_described_exactly() {
    let app = App::build(vec![add()], &Metadata::new(), &Overrides::new()).unwrap();
    let doc = app.openapi().unwrap();

    assert_eq!(doc["openapi"], "3.0.2");
    assert_eq!(
        doc["paths"]["/add"]["post"],
        json!({
            "x-method_name": "add",
            "description": "Add two numbers",
            "requestBody": {
                "required": true,
                "content": {
                    "application/json": {
                        "schema": {
                            "type": "object",
                            "properties": {
                                "a": {},
                                "b": {"type": "integer", "default": 0}
                            },
                            "required": ["a"]
                        }
                    }
                }
            },
            "responses": {
                "200": {
                    "description": "",
                    "content": {
                        "application/json": {"schema": {"type": "integer"}}
                    }
                }
            }
        })
    );
}

#[test]
fn building_twice_gives_equal_documents() {
    let funcs = vec![add()];
    let first = App::build(funcs.clone(), &Metadata::new(), &Overrides::new()).unwrap();
    let second = App::build(funcs, &Metadata::new(), &Overrides::new()).unwrap();
    assert_eq!(first.openapi(), second.openapi());
}

#[test]
fn duplicate_path_and_method_fails() {
    let a = add();
    let b = add();
    let err = App::build(vec![a, b], &Metadata::new(), &Overrides::new())
        .err()
        .unwrap();
    assert!(matches!(
        err,
        Error::DuplicatePathMethod { ref path, ref method } if path == "/add" && method == "post"
    ));
}

#[test]
fn record_parameters_nest() {
    let point = Record::new("Point")
        .field("x", Annotation::Float)
        .field("y", Annotation::Float);
    let sig = Signature::new()
        .param(Param::new("points").annotated(Annotation::sequence(Annotation::Record(point))))
        .returns(Annotation::Float);
    let span = Function::new("span", sig, |_| Ok(json!(0.0)));
    let app = App::build(vec![span], &Metadata::new(), &Overrides::new()).unwrap();

    let schema = &app.openapi().unwrap()["paths"]["/span"]["post"]["requestBody"]["content"]
        ["application/json"]["schema"];
    let items = &schema["properties"]["points"]["items"];
    assert_eq!(schema["properties"]["points"]["type"], "array");
    assert_eq!(items["type"], "object");
    assert_eq!(items["properties"]["x"]["type"], "number");
}

#[test]
fn document_written_when_filename_set() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("api.json");
    let overrides = Overrides::new().set(
        "openapi",
        json!({"filename": path.to_string_lossy(), "version": "2.0"}),
    );
    let app = App::build(vec![add()], &Metadata::new(), &overrides).unwrap();

    let written: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    assert_eq!(&written, app.openapi().unwrap());
    assert_eq!(written["info"]["version"], "2.0");
}

#[test]
fn sub_service_writes_document_it_names() {
    let dir = tempfile::tempdir().unwrap();
    let inherited = dir.path().join("root.json");
    let own = dir.path().join("docs_api.json");
    let overrides = Overrides::new().set("openapi", json!({"filename": inherited.to_string_lossy()}));
    let services = vec![
        ("plain_api".to_string(), SubService::new(vec![add()])),
        (
            "docs_api".to_string(),
            SubService::new(vec![add()])
                .config(Overrides::new().set("openapi", json!({"filename": own.to_string_lossy()}))),
        ),
    ];
    let app = App::build(services, &Metadata::new(), &overrides).unwrap();

    let written: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&own).unwrap()).unwrap();
    assert_eq!(&written, app.document("docs_api").unwrap());
    assert_eq!(written["servers"][0]["url"], "http://localhost:3030/docs_api");
    assert!(!inherited.exists());
}
