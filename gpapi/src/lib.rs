//! Client for the private RPC protocol of the Google Photos web application.
//!
//! [`Authenticator`] turns a cookie jar (restored, or populated by a
//! [`LoginFlow`]) into a [`Session`]; [`GPhotosClient`] runs album, photo and
//! upload operations under that session.

pub mod client;
pub(crate) mod consts;
pub mod errors;
pub mod remote;
pub mod tokens;

pub use client::authenticator::{Authenticator, Password, Session};
pub use client::config::ClientConfig;
pub use client::cookies::{CookieJar, StoredCookie};
pub use client::gpclient::GPhotosClient;
pub use client::models::{Album, MediaType, Page, Period, Photo};
pub use errors::{APIError, Result};
pub use remote::api_session::{
    APISession, HttpRequest, HttpResponse, RequestBody, RequestType, Transport,
};
pub use remote::auth::{FormLogin, LoginFlow};
pub use remote::upload::ProgressFn;
pub use tokens::{SessionTokens, extract_tokens};
