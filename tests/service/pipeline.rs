//! Request pipeline tests: decode, validate, invoke and encode.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use gangway::mapper::{self, BinaryInput, BinaryOutput, FormInput, RawInput, RawOutput};
use gangway::{
    Annotation, App, Error, Function, Handler, Metadata, Method, Overrides, Param, Request,
    Signature, json,
};
use hyper::{StatusCode, Uri};

use super::{add, body_bytes, body_json};

fn app(handlers: Vec<Handler>, metadata: &Metadata, overrides: &Overrides) -> App {
    App::build(handlers, metadata, overrides).expect("failed to build app")
}

#[tokio::test]
async fn add_returns_sum_and_rejects_missing_argument() {
    let app = app(vec![add().into()], &Metadata::new(), &Overrides::new());

    let req = Request::post_json("/add", &json!({"a": 10, "b": 5})).unwrap();
    let resp = app.handle(req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await, json!(15));

    let req = Request::post_json("/add", &json!({"b": 5})).unwrap();
    let resp = app.handle(req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(resp.headers()["X-Error-Type"], "InputError");
    let message = body_json(resp).await["error"].as_str().unwrap().to_string();
    assert!(message.contains("\"a\""), "message should name a: {message}");
}

#[tokio::test]
async fn positional_body_fills_parameters_in_order() {
    let app = app(vec![add().into()], &Metadata::new(), &Overrides::new());
    let req = Request::post_json("/add", &json!([2, 3])).unwrap();
    assert_eq!(body_json(app.handle(req).await).await, json!(5));
}

struct Multiplier {
    multiplicand: i64,
}

#[tokio::test]
async fn bound_instance_method() {
    let instance = Arc::new(Multiplier { multiplicand: 5 });
    let multiply = Function::method(
        instance,
        "multiply",
        Signature::new().param(Param::new("multiplier").annotated(Annotation::Int)),
        |this, args| {
            let multiplier: i64 = args.get("multiplier")?;
            Ok(json!(this.multiplicand * multiplier))
        },
    );
    let app = app(vec![multiply.into()], &Metadata::new(), &Overrides::new());
    let req = Request::post_json("/multiply", &json!({"multiplier": 6})).unwrap();
    assert_eq!(body_json(app.handle(req).await).await, json!(30));
}

#[tokio::test]
async fn binary_body_on_json_route_never_invokes() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let counted = Function::new("counted", Signature::new().param(Param::new("x")), move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(json!(null))
    });
    let app = app(vec![counted.into()], &Metadata::new(), &Overrides::new());

    let body = mapper::encode_binary(&json!({"x": 1})).unwrap();
    let req = Request::new(Method::POST, Uri::from_static("/counted"))
        .with_header("Content-Type", "application/octet-stream")
        .unwrap()
        .with_body(body);
    let resp = app.handle(req).await;
    assert_eq!(resp.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(resp.headers()["X-Error-Type"], "ContentTypeMismatch");
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn binary_route_round_trips() {
    let handler = Handler::new(add())
        .input_mapper(BinaryInput)
        .output_mapper(BinaryOutput);
    let app = app(vec![handler], &Metadata::new(), &Overrides::new());

    let body = mapper::encode_binary(&json!({"a": 4, "b": 3})).unwrap();
    let req = Request::new(Method::POST, Uri::from_static("/add"))
        .with_header("Content-Type", "application/octet-stream")
        .unwrap()
        .with_body(body);
    let resp = app.handle(req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()["Content-Type"], "application/octet-stream");
    let out = mapper::decode_binary(&body_bytes(resp).await).unwrap();
    assert_eq!(out, json!(7));
}

#[tokio::test]
async fn validator_reports_every_violation() {
    let sig = Signature::new()
        .param(Param::new("name").annotated(Annotation::Str))
        .param(Param::new("age").annotated(Annotation::Int))
        .param(Param::new("tags").annotated(Annotation::sequence(Annotation::Str)));
    let profile = Function::new("profile", sig, |_| Ok(json!(null)));
    let app = app(vec![profile.into()], &Metadata::new(), &Overrides::new());

    let req = Request::post_json("/profile", &json!({"tags": "not-a-list"})).unwrap();
    let resp = app.handle(req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let message = body_json(resp).await["error"].as_str().unwrap().to_string();
    for field in ["\"name\"", "\"age\"", "\"tags\""] {
        assert!(message.contains(field), "{field} missing from: {message}");
    }
}

#[tokio::test]
async fn form_fields_and_parts_become_arguments() {
    let sig = Signature::new()
        .param(Param::new("title").annotated(Annotation::Str))
        .param(Param::new("upload").annotated(Annotation::Str));
    let describe = Function::new("describe", sig, |args| {
        let title: String = args.get("title")?;
        let upload: String = args.get("upload")?;
        Ok(json!(format!("{title}: {}", upload.len())))
    });
    let handler = Handler::new(describe).input_mapper(FormInput);
    let app = app(vec![handler], &Metadata::new(), &Overrides::new());

    let body = "--XyZ\r\n\
        Content-Disposition: form-data; name=\"__fields\"\r\n\r\n\
        {\"title\": \"notes\"}\r\n\
        --XyZ\r\n\
        Content-Disposition: form-data; name=\"upload\"; filename=\"notes.txt\"\r\n\
        Content-Type: text/plain\r\n\r\n\
        hello\r\n\
        --XyZ--\r\n";
    let req = Request::new(Method::POST, Uri::from_static("/describe"))
        .with_header("Content-Type", "multipart/form-data; boundary=XyZ")
        .unwrap()
        .with_body(body);
    let resp = app.handle(req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await, json!("notes: 5"));
}

#[tokio::test]
async fn raw_text_in_and_out() {
    let shout = Function::new(
        "shout",
        Signature::new().param(Param::new("text").annotated(Annotation::Str)),
        |args| {
            let text: String = args.get("text")?;
            Ok(json!(text.to_uppercase()))
        },
    );
    let handler = Handler::new(shout)
        .input_mapper(RawInput::default())
        .output_mapper(RawOutput);
    let app = app(vec![handler], &Metadata::new(), &Overrides::new());

    let req = Request::new(Method::POST, Uri::from_static("/shout"))
        .with_header("Content-Type", "text/plain; charset=utf-8")
        .unwrap()
        .with_body("quiet");
    let resp = app.handle(req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(&body_bytes(resp).await[..], b"QUIET");
}

#[tokio::test]
async fn blocking_framework_runs_on_blocking_pool() {
    let overrides = Overrides::new().set("framework", "hyper_blocking");
    let app = app(vec![add().into()], &Metadata::new(), &overrides);
    assert_eq!(app.routes()[0].scheduling, gangway::Scheduling::Blocking);

    let req = Request::post_json("/add", &json!({"a": 1, "b": 2})).unwrap();
    assert_eq!(body_json(app.handle(req).await).await, json!(3));
}

fn doubled_after_sleep() -> Function {
    Function::suspending(
        "double",
        Signature::new().param(Param::new("n").annotated(Annotation::Int)),
        |args| async move {
            let n: i64 = args.get("n")?;
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
            Ok(json!(n * 2))
        },
    )
}

async fn blocking_app_resolves_suspending_function() {
    let overrides = Overrides::new().set("framework", "hyper_blocking");
    let app = app(vec![doubled_after_sleep().into()], &Metadata::new(), &overrides);
    assert_eq!(app.routes()[0].scheduling, gangway::Scheduling::Blocking);

    let req = Request::post_json("/double", &json!({"n": 21})).unwrap();
    let resp = app.handle(req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await, json!(42));
}

#[tokio::test]
async fn blocking_framework_resolves_suspending_function() {
    blocking_app_resolves_suspending_function().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn blocking_framework_resolves_suspending_function_on_worker_pool() {
    blocking_app_resolves_suspending_function().await;
}

#[tokio::test]
async fn suspending_function_is_awaited() {
    let wait = Function::suspending(
        "wait",
        Signature::new().param(Param::new("ms").annotated(Annotation::Int)),
        |args| async move {
            let ms: u64 = args.get("ms")?;
            tokio::time::sleep(std::time::Duration::from_millis(ms)).await;
            Ok(json!(ms))
        },
    );
    let app = app(vec![wait.into()], &Metadata::new(), &Overrides::new());
    let req = Request::post_json("/wait", &json!({"ms": 5})).unwrap();
    assert_eq!(body_json(app.handle(req).await).await, json!(5));
}

#[tokio::test]
async fn domain_errors_keep_their_status() {
    let lookup = Function::new("lookup", Signature::new().param(Param::new("id")), |_| {
        Err(Error::NotFound("no such record".into()))
    });
    let app = app(vec![lookup.into()], &Metadata::new(), &Overrides::new());
    let req = Request::post_json("/lookup", &json!({"id": 1})).unwrap();
    let resp = app.handle(req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(resp).await["error"], "no such record");
}

#[tokio::test]
async fn header_inputs_fill_arguments() {
    let whoami = Function::new(
        "whoami",
        Signature::new().param(Param::new("user").annotated(Annotation::Str)),
        |args| args.get::<String>("user").map(|u| json!(u)),
    );
    let overrides = Overrides::new().set("header_inputs", json!({"user": "X-User"}));
    let app = app(vec![whoami.into()], &Metadata::new(), &overrides);

    let req = Request::post_json("/whoami", &json!({}))
        .unwrap()
        .with_header("X-User", "ada")
        .unwrap();
    assert_eq!(body_json(app.handle(req).await).await, json!("ada"));
}
