use crate::client::config::ClientConfig;
use crate::client::cookies::CookieJar;
use crate::errors::{APIError, Result};
use async_trait::async_trait;
use derivative::Derivative;
use futures::Stream;
use log::debug;
use reqwest::Url;
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;

pub type ByteStream = Pin<Box<dyn Stream<Item = std::io::Result<Vec<u8>>> + Send>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestType {
    Get,
    Post,
}

pub enum RequestBody {
    Empty,
    Form(Vec<(String, String)>),
    Text { content_type: String, text: String },
    Stream(ByteStream),
}

impl fmt::Debug for RequestBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestBody::Empty => f.write_str("Empty"),
            RequestBody::Form(pairs) => f.debug_tuple("Form").field(&pairs.len()).finish(),
            RequestBody::Text { content_type, text } => f
                .debug_struct("Text")
                .field("content_type", content_type)
                .field("len", &text.len())
                .finish(),
            RequestBody::Stream(_) => f.write_str("Stream"),
        }
    }
}

#[derive(Debug)]
pub struct HttpRequest {
    pub method: RequestType,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: RequestBody,
}

impl HttpRequest {
    #[must_use]
    pub fn get(url: Url) -> Self {
        Self {
            method: RequestType::Get,
            url,
            headers: Vec::new(),
            body: RequestBody::Empty,
        }
    }

    #[must_use]
    pub fn post(url: Url, body: RequestBody) -> Self {
        Self {
            method: RequestType::Post,
            url,
            headers: Vec::new(),
            body,
        }
    }

    #[must_use]
    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_owned(), value.to_owned()));
        self
    }

    #[must_use]
    pub fn query(mut self, pairs: &[(&str, &str)]) -> Self {
        self.url.query_pairs_mut().extend_pairs(pairs);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpResponse {
    #[must_use]
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }

    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// One HTTP round trip. Every status code is returned as a response; only
/// transport-level failures are errors.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse>;
}

/// Cookie-bearing HTTP session used against the live service.
#[derive(Derivative, Clone)]
#[derivative(Debug)]
pub struct APISession {
    client: reqwest::Client,
    #[derivative(Debug = "ignore")]
    jar: Arc<CookieJar>,
}

impl APISession {
    /// Builds a session that never follows redirects, so that callers can
    /// inspect `302` responses, and that stores cookies in `jar`.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(config: &ClientConfig, jar: Arc<CookieJar>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .redirect(reqwest::redirect::Policy::none())
            .cookie_provider(Arc::clone(&jar))
            .build()
            .map_err(APIError::Reqwest)?;

        Ok(Self { client, jar })
    }

    #[must_use]
    pub fn cookie_jar(&self) -> &Arc<CookieJar> {
        &self.jar
    }
}

#[async_trait]
impl Transport for APISession {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        debug!("{:?} {}", request.method, request.url);

        let method = match request.method {
            RequestType::Get => reqwest::Method::GET,
            RequestType::Post => reqwest::Method::POST,
        };

        let mut builder = self.client.request(method, request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Form(pairs) => builder.form(&pairs),
            RequestBody::Text { content_type, text } => builder
                .header(reqwest::header::CONTENT_TYPE, content_type)
                .body(text),
            RequestBody::Stream(stream) => builder.body(reqwest::Body::wrap_stream(stream)),
        };

        let response = builder.send().await.map_err(APIError::Reqwest)?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_owned(), v.to_owned())))
            .collect();
        let body = response.text().await.map_err(APIError::Reqwest)?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}
