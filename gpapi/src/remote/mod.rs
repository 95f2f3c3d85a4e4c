use crate::client::config::ClientConfig;
use crate::remote::api_session::Transport;
use std::sync::Arc;

pub mod api_session;
pub mod auth;
pub mod envelope;

pub(crate) mod payloads;
pub(crate) mod rpc;
pub(crate) mod upload;

#[derive(Clone)]
pub(crate) struct Client {
    transport: Arc<dyn Transport>,
    config: ClientConfig,
}

impl Client {
    #[must_use]
    pub(crate) fn new(config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        Self { transport, config }
    }

    pub(crate) fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    pub(crate) fn config(&self) -> &ClientConfig {
        &self.config
    }
}
