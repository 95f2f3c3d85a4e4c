pub(crate) mod albums;
pub(crate) mod photos;
pub mod authenticator;
pub mod config;
pub mod cookies;
pub mod gpclient;
pub mod models;
