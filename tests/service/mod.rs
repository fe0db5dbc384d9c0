mod config;
mod dispatch;
mod document;
mod pipeline;
mod server;

use gangway::response::HttpResponse;
use gangway::{Annotation, Function, Param, Signature, json};
use http_body_util::BodyExt;
use serde_json::Value;

/// `add(a, b: int = 0) -> int`
pub fn add() -> Function {
    let sig = Signature::new()
        .param(Param::new("a"))
        .param(Param::new("b").annotated(Annotation::Int).default(0))
        .returns(Annotation::Int);
    Function::new("add", sig, |args| {
        let a: i64 = args.get("a")?;
        let b: i64 = args.get("b")?;
        Ok(json!(a + b))
    })
    .doc("Add two numbers")
}

pub async fn body_bytes(resp: HttpResponse) -> bytes::Bytes {
    resp.into_body().collect().await.unwrap().to_bytes()
}

pub async fn body_json(resp: HttpResponse) -> Value {
    serde_json::from_slice(&body_bytes(resp).await).unwrap()
}
