use crate::client::authenticator::Authenticator;
use crate::client::config::ClientConfig;
use crate::client::cookies::CookieJar;
use crate::client::models::Page;
use crate::errors::Result;
use crate::remote::{self, api_session::APISession, api_session::Transport};
use std::future::Future;
use std::sync::Arc;

/// Album and photo operations of one account.
///
/// Every call takes the [`crate::client::authenticator::Session`] it runs
/// under; calls issued on one client are expected to be awaited in order.
#[derive(Clone)]
pub struct GPhotosClient {
    pub(crate) remote_client: remote::Client,
}

impl GPhotosClient {
    #[must_use]
    pub fn new(config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            remote_client: remote::Client::new(config, transport),
        }
    }

    /// Builds an authenticator and a client over one HTTP session backed by
    /// `jar`, so that cookies set during login are seen by every later call.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn connect(
        config: ClientConfig,
        jar: Arc<CookieJar>,
    ) -> Result<(Authenticator, GPhotosClient)> {
        let transport: Arc<dyn Transport> = Arc::new(APISession::new(&config, jar)?);
        Ok((
            Authenticator::new(config.clone(), Arc::clone(&transport)),
            Self::new(config, transport),
        ))
    }

    /// Follows cursors until the listing reports no further page.
    pub(crate) async fn collect_pages<T, F, Fut>(mut fetch: F) -> Result<Vec<T>>
    where
        F: FnMut(Option<String>) -> Fut,
        Fut: Future<Output = Result<Page<T>>>,
    {
        let mut items = Vec::new();
        let mut cursor = None;
        loop {
            let page = fetch(cursor.take()).await?;
            items.extend(page.items);
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        Ok(items)
    }
}
