use axum::{
    extract::{Multipart, Query, State},
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

use crate::{Config, CorpClient};

/// Scripted reply for one upload request.
pub enum Reply {
    Json(Value),
    Status(StatusCode),
    Raw(&'static str),
}

/// Scripted reply for one token fetch.
pub enum TokenReply {
    Issue,
    Errcode(i64),
    Status(StatusCode),
    Raw(&'static str),
    ExpiresIn(i64),
}

#[derive(Debug, Clone)]
pub struct RecordedPart {
    pub name: Option<String>,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct RecordedUpload {
    pub path: String,
    pub query: HashMap<String, String>,
    pub parts: Vec<RecordedPart>,
}

impl RecordedUpload {
    pub fn part(&self, name: &str) -> Option<&RecordedPart> {
        self.parts.iter().find(|p| p.name.as_deref() == Some(name))
    }

    pub fn access_token(&self) -> &str {
        self.query
            .get("access_token")
            .map(String::as_str)
            .unwrap_or_default()
    }
}

#[derive(Default)]
struct Inner {
    uploads: Vec<RecordedUpload>,
    token_fetches: usize,
    token_errcode: Option<i64>,
    token_script: VecDeque<TokenReply>,
    replies: VecDeque<Reply>,
}

/// In-process stand-in for the vendor API.
#[derive(Clone, Default)]
pub struct MockApi {
    inner: Arc<Mutex<Inner>>,
}

impl MockApi {
    pub fn reply(&self, reply: Reply) -> &Self {
        self.inner.lock().unwrap().replies.push_back(reply);
        self
    }

    pub fn reply_errcode(&self, errcode: i64) -> &Self {
        self.reply(Reply::Json(json!({ "errcode": errcode, "errmsg": "scripted" })))
    }

    /// Queues the reply for the next token fetch; unscripted fetches issue a token.
    pub fn script_token(&self, reply: TokenReply) -> &Self {
        self.inner.lock().unwrap().token_script.push_back(reply);
        self
    }

    pub fn fail_token_fetch(&self, errcode: i64) {
        self.inner.lock().unwrap().token_errcode = Some(errcode);
    }

    pub fn uploads(&self) -> Vec<RecordedUpload> {
        self.inner.lock().unwrap().uploads.clone()
    }

    pub fn token_fetches(&self) -> usize {
        self.inner.lock().unwrap().token_fetches
    }

    /// Serves the mock on an ephemeral port and returns its `/cgi-bin` base URL.
    pub async fn serve(&self) -> String {
        let app = Router::new()
            .route("/cgi-bin/gettoken", get(get_token))
            .route("/cgi-bin/media/upload", post(upload))
            .route("/cgi-bin/media/uploadimg", post(upload))
            .route("/cgi-bin/material/add_material", post(upload))
            .with_state(self.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        format!("http://{addr}/cgi-bin")
    }

    /// A client wired to this mock with the default caching token server.
    pub async fn client(&self) -> CorpClient {
        let base_url = self.serve().await;
        CorpClient::from_config(&Config::new("corp-id", "corp-secret").with_base_url(base_url))
            .unwrap()
    }
}

async fn get_token(
    State(api): State<MockApi>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let mut inner = api.inner.lock().unwrap();
    inner.token_fetches += 1;

    assert_eq!(query.get("corpid").map(String::as_str), Some("corp-id"));
    assert_eq!(query.get("corpsecret").map(String::as_str), Some("corp-secret"));

    let reply = match inner.token_script.pop_front() {
        Some(reply) => reply,
        None => match inner.token_errcode {
            Some(errcode) => TokenReply::Errcode(errcode),
            None => TokenReply::Issue,
        },
    };
    let access_token = format!("token-{}", inner.token_fetches);

    match reply {
        TokenReply::Issue => Json(json!({
            "errcode": 0,
            "errmsg": "ok",
            "access_token": access_token,
            "expires_in": 7200,
        }))
        .into_response(),
        TokenReply::ExpiresIn(expires_in) => Json(json!({
            "errcode": 0,
            "errmsg": "ok",
            "access_token": access_token,
            "expires_in": expires_in,
        }))
        .into_response(),
        TokenReply::Errcode(errcode) => {
            Json(json!({ "errcode": errcode, "errmsg": "invalid corpsecret" })).into_response()
        }
        TokenReply::Status(status) => (status, "token service down").into_response(),
        TokenReply::Raw(body) => body.into_response(),
    }
}

async fn upload(
    State(api): State<MockApi>,
    uri: Uri,
    Query(query): Query<HashMap<String, String>>,
    mut multipart: Multipart,
) -> Response {
    let mut parts = Vec::new();
    while let Some(field) = multipart.next_field().await.unwrap() {
        let name = field.name().map(str::to_string);
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let data = field.bytes().await.unwrap().to_vec();
        parts.push(RecordedPart {
            name,
            file_name,
            content_type,
            data,
        });
    }

    let mut inner = api.inner.lock().unwrap();
    inner.uploads.push(RecordedUpload {
        path: uri.path().to_string(),
        query,
        parts,
    });

    match inner.replies.pop_front() {
        Some(Reply::Json(value)) => Json(value).into_response(),
        Some(Reply::Status(status)) => (status, "upstream unavailable").into_response(),
        Some(Reply::Raw(body)) => body.into_response(),
        None => Json(json!({ "errcode": 0, "errmsg": "ok", "media_id": "MEDIA_ID" }))
            .into_response(),
    }
}
