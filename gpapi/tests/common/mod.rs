#![allow(dead_code)]

use async_trait::async_trait;
use futures::StreamExt;
use gpapi::{
    GPhotosClient, HttpRequest, HttpResponse, RequestBody, RequestType, Result, Session,
    SessionTokens, Transport, ClientConfig,
};
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

pub const AUTH_TOKEN: &str = "AF1QpN-token";
pub const USER_ID: &str = "104752634501";

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: RequestType,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub form: Vec<(String, String)>,
    pub text: Option<(String, String)>,
    pub bytes: Vec<u8>,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn form_value(&self, key: &str) -> Option<&str> {
        self.form
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn freq(&self) -> Value {
        serde_json::from_str(self.form_value("f.req").expect("request has no f.req"))
            .expect("f.req is not JSON")
    }

    /// `(key, args)` of every call in a batch-execute request.
    pub fn batch_calls(&self) -> Vec<(String, Value)> {
        self.freq()[0]
            .as_array()
            .expect("not a batch request")
            .iter()
            .map(|call| {
                (
                    call[0].as_str().unwrap().to_owned(),
                    serde_json::from_str(call[1].as_str().unwrap()).unwrap(),
                )
            })
            .collect()
    }
}

/// Answers requests from a FIFO of canned responses and records each request,
/// draining streamed bodies.
#[derive(Default)]
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<HttpResponse>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedTransport {
    pub fn new(responses: impl IntoIterator<Item = HttpResponse>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn remaining(&self) -> usize {
        self.responses.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let mut form = Vec::new();
        let mut text = None;
        let mut bytes = Vec::new();
        match request.body {
            RequestBody::Empty => {}
            RequestBody::Form(pairs) => form = pairs,
            RequestBody::Text { content_type, text: body } => text = Some((content_type, body)),
            RequestBody::Stream(mut stream) => {
                while let Some(chunk) = stream.next().await {
                    bytes.extend(chunk?);
                }
            }
        }

        let url = request.url.to_string();
        self.requests.lock().unwrap().push(RecordedRequest {
            method: request.method,
            url: url.clone(),
            headers: request.headers,
            form,
            text,
            bytes,
        });

        let response = self.responses.lock().unwrap().pop_front();
        Ok(response.unwrap_or_else(|| panic!("no scripted response left for {url}")))
    }
}

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn session() -> Session {
    Session::new(SessionTokens {
        auth_token: AUTH_TOKEN.to_owned(),
        user_id: USER_ID.to_owned(),
    })
}

pub fn client(transport: &Arc<ScriptedTransport>) -> GPhotosClient {
    init_logger();
    GPhotosClient::new(ClientConfig::default(), Arc::clone(transport) as Arc<dyn Transport>)
}

fn preamble(value: &Value) -> String {
    format!(")]}}'\n{value}")
}

pub fn batch_response(frames: &[(&str, Value)]) -> HttpResponse {
    let mut entries: Vec<Value> = frames
        .iter()
        .map(|(key, payload)| {
            json!(["wrb.fr", key, payload.to_string(), null, null, null, "generic"])
        })
        .collect();
    entries.push(json!(["di", 84]));
    entries.push(json!(["af.httprm", 83, "-8254431230449356254", 16]));
    HttpResponse::new(200, preamble(&Value::Array(entries)))
}

/// Acknowledgement of a batch call whose result is ignored.
pub fn batch_ack(key: &str) -> HttpResponse {
    HttpResponse::new(
        200,
        preamble(&json!([["wrb.fr", key, "[]", null, null, null, "generic"], ["di", 40]])),
    )
}

pub fn batch_error(key: &str, code: i64) -> HttpResponse {
    HttpResponse::new(
        200,
        preamble(&json!([["wrb.fr", key, null, null, null, [code], "generic"], ["di", 12]])),
    )
}

pub fn data_response(opcode: &str, payload: Value) -> HttpResponse {
    let mut keyed = serde_json::Map::new();
    keyed.insert(opcode.to_owned(), payload);
    HttpResponse::new(200, preamble(&json!([["wrb.d", null, keyed]])))
}

pub fn mutate_response(opcode: &str, payload: Value) -> HttpResponse {
    let mut keyed = serde_json::Map::new();
    keyed.insert(opcode.to_owned(), payload);
    HttpResponse::new(200, preamble(&json!([["af.maf", keyed]])))
}

pub fn photo_entry(id: &str, created_ms: i64) -> Value {
    json!([
        id,
        [format!("https://lh3.googleusercontent.com/{id}"), 4032, 3024],
        created_ms,
        "AHe5Rl",
        -7_200_000,
        created_ms + 60_000,
        null,
        null,
        null
    ])
}

pub fn album_entry(id: &str, title: &str, shared: bool) -> Value {
    json!([
        id,
        [format!("https://lh3.googleusercontent.com/cover-{id}"), 512, 512],
        null,
        {"72930366": [null, title, [1_577_836_800_000_i64, 1_609_459_199_000_i64], 12, shared]}
    ])
}

pub fn landing_page(auth_token: &str, user_id: &str) -> String {
    format!(
        r#"<!doctype html><html><head>
<script nonce="n1">window.IJ_values = [1, 2];</script>
<script data-id="_gd" nonce="n1">window.WIZ_global_data = {{"DpimGf":false,"S06Grb":"{user_id}","SNlM0e":"{auth_token}","Yllh3e":"%.@.1600000000000,1]","cfb2h":"boq_photosuiserver_20240101.00_p0",qwAQke:'PhotosUi',"zChJod":"%.@.]"}};</script>
</head><body><c-wiz></c-wiz></body></html>"#
    )
}
