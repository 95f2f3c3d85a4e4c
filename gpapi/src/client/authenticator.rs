use crate::client::config::ClientConfig;
use crate::errors::Result;
use crate::remote::api_session::Transport;
use crate::remote::auth::{FormLogin, LoginFlow};
use crate::tokens::SessionTokens;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use zeroize::{Zeroize, ZeroizeOnDrop};

#[derive(Default, Serialize, Deserialize, Zeroize, ZeroizeOnDrop, Clone)]
pub struct Password(pub Vec<u8>);

impl From<&str> for Password {
    fn from(value: &str) -> Self {
        Self(value.as_bytes().to_vec())
    }
}

/// Tokens of one authenticated session, passed to every client call.
///
/// A session is never updated in place: when the service rotates its tokens,
/// [`Authenticator::refresh_tokens`] produces a new one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    tokens: SessionTokens,
}

impl Session {
    #[must_use]
    pub fn new(tokens: SessionTokens) -> Self {
        Self { tokens }
    }

    #[must_use]
    pub fn tokens(&self) -> &SessionTokens {
        &self.tokens
    }

    #[must_use]
    pub fn auth_token(&self) -> &str {
        &self.tokens.auth_token
    }

    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.tokens.user_id
    }
}

pub struct Authenticator {
    remote_client: crate::remote::Client,
    login_flow: Box<dyn LoginFlow>,
}

impl Authenticator {
    /// Creates an authenticator over `transport`, signing in with [`FormLogin`].
    ///
    /// The transport must share its cookie jar with the one later handed to
    /// the photos client.
    #[must_use]
    pub fn new(config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            remote_client: crate::remote::Client::new(config, transport),
            login_flow: Box::new(FormLogin),
        }
    }

    #[must_use]
    pub fn with_login_flow(mut self, login_flow: impl LoginFlow + 'static) -> Self {
        self.login_flow = Box::new(login_flow);
        self
    }

    /// Signs in and returns the session tokens.
    ///
    /// Cookies already present in the jar are tried first; the login flow only
    /// runs when they do not yield a session.
    ///
    /// # Errors
    ///
    /// Returns [`crate::errors::APIError::LoginFailed`] if the account service
    /// rejects the credentials or the landing page stays unreachable, or
    /// [`crate::errors::APIError::TokensNotFound`] if the signed-in landing page
    /// carries no tokens.
    pub async fn login(&self, username: &str, password: Password) -> Result<Session> {
        match self.remote_client.fetch_tokens().await {
            Ok(tokens) => {
                info!("Reusing the session stored in the cookie jar");
                return Ok(Session::new(tokens));
            }
            Err(e) => debug!("No usable session in the cookie jar: {e}"),
        }

        self.login_flow
            .login(
                self.remote_client.transport(),
                self.remote_client.config(),
                username,
                &password,
            )
            .await?;

        let tokens = self.remote_client.fetch_tokens().await?;
        info!("Signed in as user {}", tokens.user_id);
        Ok(Session::new(tokens))
    }

    /// Extracts fresh tokens with the cookies currently in the jar, for example
    /// after restoring a persisted jar or when the previous tokens were rotated.
    ///
    /// # Errors
    ///
    /// Same as the token step of [`Authenticator::login`].
    pub async fn refresh_tokens(&self) -> Result<Session> {
        info!("Refreshing session tokens");
        self.remote_client.fetch_tokens().await.map(Session::new)
    }
}
