//! Objects exposed through dispatcher and factory endpoints.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use gangway::dispatch::{self, Dispatch, Exposed, ObjectStore};
use gangway::{App, Error, Metadata, Overrides, Request, Result, json};
use hyper::StatusCode;
use serde_json::{Map, Value};

use super::body_json;

#[derive(Default)]
struct Counter {
    counts: Mutex<BTreeMap<String, i64>>,
}

impl Dispatch for Counter {
    fn dispatch(&self, attr: &str, kwargs: Map<String, Value>) -> Option<Result<Value>> {
        let key = || {
            kwargs
                .get("key")
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| Error::Input("key is required".into()))
        };
        Some(match attr {
            "bump" => key().map(|k| {
                let mut counts = self.counts.lock().unwrap();
                let count = counts.entry(k).or_default();
                *count += 1;
                json!(*count)
            }),
            "total" => Ok(json!(self.counts.lock().unwrap().values().sum::<i64>())),
            "reset" => {
                self.counts.lock().unwrap().clear();
                Ok(Value::Null)
            }
            _ => return None,
        })
    }
}

#[tokio::test]
async fn dispatcher_endpoint_honors_whitelist() {
    let counter = dispatch::dispatcher(
        "counter",
        Arc::new(Counter::default()),
        Exposed::only(["bump", "total"]),
    );
    let app = App::build(vec![counter], &Metadata::new(), &Overrides::new()).unwrap();

    for _ in 0..2 {
        let req = Request::post_json("/counter", &json!({"_attr_name": "bump", "key": "k"})).unwrap();
        assert_eq!(app.handle(req).await.status(), StatusCode::OK);
    }
    let req = Request::post_json("/counter", &json!({"_attr_name": "total"})).unwrap();
    assert_eq!(body_json(app.handle(req).await).await, json!(2));

    let req = Request::post_json("/counter", &json!({"_attr_name": "reset"})).unwrap();
    let resp = app.handle(req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(
        body_json(resp).await["error"]
            .as_str()
            .unwrap()
            .contains("not dispatched")
    );
}

#[tokio::test]
async fn factory_endpoint_creates_and_reuses_objects() {
    let store = Arc::new(ObjectStore::new());
    let counters = dispatch::factory(
        "Counter",
        Arc::clone(&store),
        |_kwargs| Ok(Counter::default()),
        Exposed::All,
    );
    let app = App::build(vec![counters], &Metadata::new(), &Overrides::new()).unwrap();

    let req = Request::post_json("/Counter", &json!({})).unwrap();
    let id = body_json(app.handle(req).await).await;
    let id = id.as_str().unwrap().to_string();
    assert_eq!(store.len(), 1);

    let bump = json!({"_obj_id": id, "_attr_name": "bump", "key": "x"});
    let req = Request::post_json("/Counter", &bump).unwrap();
    assert_eq!(body_json(app.handle(req).await).await, json!(1));
    let req = Request::post_json("/Counter", &bump).unwrap();
    assert_eq!(body_json(app.handle(req).await).await, json!(2));

    let req = Request::post_json("/Counter", &json!({"_obj_id": "nope", "_attr_name": "total"}))
        .unwrap();
    assert_eq!(app.handle(req).await.status(), StatusCode::BAD_REQUEST);
}
