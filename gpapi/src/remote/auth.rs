use crate::client::authenticator::Password;
use crate::client::config::ClientConfig;
use crate::consts::{
    LANDING_ENDPOINT, LOOKUP_ENDPOINT, MANAGE_ACCOUNT_ENDPOINT, PASSWORD_CHALLENGE_ENDPOINT,
    SERVICE_LOGIN_ENDPOINT,
};
use crate::errors::{APIError, Result};
use crate::remote::Client;
use crate::remote::api_session::{HttpRequest, HttpResponse, RequestBody, Transport};
use crate::tokens::{SessionTokens, extract_tokens};
use async_trait::async_trait;
use log::{debug, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Url;

const REDIRECT_STATUS: u16 = 302;

static FIRST_FORM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<form\b[^>]*>(.*?)</form\s*>").expect("form pattern is valid"));

static INPUT_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<input\b([^>]*)>").expect("input pattern is valid"));

static TAG_ATTRIBUTE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"([^\s=/>"']+)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>"']+)))?"#)
        .expect("attribute pattern is valid")
});

static CHAR_REFERENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"&(#[0-9]+|#[xX][0-9a-fA-F]+|amp|lt|gt|quot|apos);")
        .expect("entity pattern is valid")
});

impl Client {
    /// Loads the landing page with the current cookies and extracts the
    /// session tokens from it.
    ///
    /// # Errors
    ///
    /// Returns [`APIError::LoginFailed`] if the landing page does not answer
    /// with HTTP 200 (typically a redirect to the sign-in page), or
    /// [`APIError::TokensNotFound`] if the page carries no tokens.
    pub(crate) async fn fetch_tokens(&self) -> Result<SessionTokens> {
        let url = self.config.photos_url(LANDING_ENDPOINT)?;
        let response = self.transport.send(HttpRequest::get(url)).await?;
        if !response.is_ok() {
            return Err(APIError::LoginFailed(format!(
                "landing page answered with HTTP {}",
                response.status
            )));
        }
        extract_tokens(&response.body)
    }
}

/// Populates the shared cookie jar with an authenticated session.
#[async_trait]
pub trait LoginFlow: Send + Sync {
    /// # Errors
    ///
    /// Returns [`APIError::LoginFailed`] if the account service rejects the
    /// credentials or answers with an unexpected page.
    async fn login(
        &self,
        transport: &dyn Transport,
        config: &ClientConfig,
        username: &str,
        password: &Password,
    ) -> Result<()>;
}

/// Non-JavaScript account sign-in: look the account up, then answer the
/// password challenge. Falls back once to the single-page legacy form.
#[derive(Debug, Default, Clone, Copy)]
pub struct FormLogin;

#[async_trait]
impl LoginFlow for FormLogin {
    async fn login(
        &self,
        transport: &dyn Transport,
        config: &ClientConfig,
        username: &str,
        password: &Password,
    ) -> Result<()> {
        let password = std::str::from_utf8(&password.0)
            .map_err(|_| APIError::LoginFailed("password is not valid UTF-8".to_owned()))?;

        info!("Signing in as {username}");
        match Self::lookup_then_challenge(transport, config, username, password).await {
            Ok(true) => return Ok(()),
            Ok(false) => warn!("Sign-in challenge was not accepted, trying the legacy form"),
            Err(e) => warn!("Sign-in lookup failed ({e}), trying the legacy form"),
        }

        if Self::legacy(transport, config, username, password).await? {
            Ok(())
        } else {
            Err(APIError::LoginFailed(
                "account service did not accept the credentials".to_owned(),
            ))
        }
    }
}

impl FormLogin {
    fn service_login_request(config: &ClientConfig) -> Result<HttpRequest> {
        let continue_url = config.accounts_url(MANAGE_ACCOUNT_ENDPOINT)?;
        Ok(
            HttpRequest::get(config.accounts_url(SERVICE_LOGIN_ENDPOINT)?).query(&[
                ("continue", continue_url.as_str()),
                ("rip", "1"),
                ("nojavascript", "1"),
            ]),
        )
    }

    async fn fetch_login_form(
        transport: &dyn Transport,
        config: &ClientConfig,
    ) -> Result<(Url, Vec<(String, String)>)> {
        let request = Self::service_login_request(config)?;
        let url = request.url.clone();
        let response = transport.send(request).await?;
        if !response.is_ok() {
            return Err(APIError::LoginFailed(format!(
                "sign-in page answered with HTTP {}",
                response.status
            )));
        }
        Ok((url, serialize_first_form(&response.body)))
    }

    async fn post_form(
        transport: &dyn Transport,
        url: Url,
        referer: &Url,
        fields: Vec<(String, String)>,
    ) -> Result<HttpResponse> {
        debug!("POST sign-in form to {url}");
        transport
            .send(HttpRequest::post(url, RequestBody::Form(fields)).header("Referer", referer.as_str()))
            .await
    }

    /// Returns `Ok(true)` when the password challenge redirects.
    async fn lookup_then_challenge(
        transport: &dyn Transport,
        config: &ClientConfig,
        username: &str,
        password: &str,
    ) -> Result<bool> {
        let (login_url, mut fields) = Self::fetch_login_form(transport, config).await?;
        set_field(&mut fields, "Email", username);
        set_field(&mut fields, "Passwd", "");
        set_field(&mut fields, "signIn", "Next");

        let lookup_url = config.accounts_url(LOOKUP_ENDPOINT)?;
        let lookup = Self::post_form(transport, lookup_url.clone(), &login_url, fields).await?;
        if !lookup.is_ok() {
            return Err(APIError::LoginFailed(format!(
                "account lookup answered with HTTP {}",
                lookup.status
            )));
        }

        let mut fields = serialize_first_form(&lookup.body);
        set_field(&mut fields, "Email", username);
        set_field(&mut fields, "Passwd", password);
        set_field(&mut fields, "signIn", "Sign in");

        let challenge = Self::post_form(
            transport,
            config.accounts_url(PASSWORD_CHALLENGE_ENDPOINT)?,
            &lookup_url,
            fields,
        )
        .await?;
        Ok(challenge.status == REDIRECT_STATUS)
    }

    async fn legacy(
        transport: &dyn Transport,
        config: &ClientConfig,
        username: &str,
        password: &str,
    ) -> Result<bool> {
        let (login_url, mut fields) = Self::fetch_login_form(transport, config).await?;
        set_field(&mut fields, "Email", username);
        set_field(&mut fields, "Passwd", password);

        let response = Self::post_form(
            transport,
            config.accounts_url(PASSWORD_CHALLENGE_ENDPOINT)?,
            &login_url,
            fields,
        )
        .await?;
        Ok(response.status == REDIRECT_STATUS)
    }
}

fn set_field(fields: &mut Vec<(String, String)>, name: &str, value: &str) {
    fields.retain(|(k, _)| k != name);
    fields.push((name.to_owned(), value.to_owned()));
}

fn decode_entities(text: &str) -> String {
    CHAR_REFERENCE
        .replace_all(text, |caps: &regex::Captures<'_>| {
            let reference = &caps[1];
            let decoded = match reference {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                _ => {
                    let digits = &reference[1..];
                    let code = match digits.strip_prefix(['x', 'X']) {
                        Some(hex) => u32::from_str_radix(hex, 16).ok(),
                        None => digits.parse().ok(),
                    };
                    code.and_then(char::from_u32)
                }
            };
            decoded.map_or_else(|| caps[0].to_owned(), String::from)
        })
        .into_owned()
}

/// Name/value pairs a browser would submit for the first `<form>` of a page.
fn serialize_first_form(html: &str) -> Vec<(String, String)> {
    let Some(form) = FIRST_FORM.captures(html) else {
        return Vec::new();
    };

    INPUT_TAG
        .captures_iter(&form[1])
        .filter_map(|input| {
            let mut name = None;
            let mut value = String::new();
            let mut kind = String::from("text");
            let mut checked = false;

            for attr in TAG_ATTRIBUTE.captures_iter(&input[1]) {
                let raw = attr
                    .get(2)
                    .or_else(|| attr.get(3))
                    .or_else(|| attr.get(4))
                    .map_or("", |m| m.as_str());
                match attr[1].to_ascii_lowercase().as_str() {
                    "name" => name = Some(decode_entities(raw)),
                    "value" => value = decode_entities(raw),
                    "type" => kind = raw.to_ascii_lowercase(),
                    "checked" => checked = true,
                    _ => {}
                }
            }

            let submittable = match kind.as_str() {
                "submit" | "button" | "image" | "reset" | "file" => false,
                "checkbox" | "radio" => checked,
                _ => true,
            };
            name.filter(|n| submittable && !n.is_empty())
                .map(|n| (n, value))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_hidden_and_checked_inputs() {
        let html = r#"
            <html><body>
            <form id="gaia_loginform" action="/signin" method="post">
              <input type="hidden" name="GALX" value="a&amp;b">
              <input type='hidden' name='continue' value='https://accounts/&#x4d;anage'>
              <input type="checkbox" name="PersistentCookie" value="yes" checked>
              <input type="checkbox" name="unchecked" value="no">
              <input type="submit" name="signIn" value="Next">
              <input name=Page value=PasswordSeparationSignIn>
            </form>
            <form><input type="hidden" name="second" value="x"></form>
            </body></html>"#;

        let fields = serialize_first_form(html);
        assert_eq!(
            fields,
            vec![
                ("GALX".to_owned(), "a&b".to_owned()),
                ("continue".to_owned(), "https://accounts/Manage".to_owned()),
                ("PersistentCookie".to_owned(), "yes".to_owned()),
                ("Page".to_owned(), "PasswordSeparationSignIn".to_owned()),
            ]
        );
    }

    #[test]
    fn page_without_form_has_no_fields() {
        assert!(serialize_first_form("<p>nothing</p>").is_empty());
    }

    #[test]
    fn set_field_replaces_existing_value() {
        let mut fields = vec![("Email".to_owned(), "old".to_owned())];
        set_field(&mut fields, "Email", "new");
        assert_eq!(fields, vec![("Email".to_owned(), "new".to_owned())]);
    }

    #[test]
    fn service_login_url_carries_continue() {
        let url = FormLogin::service_login_request(&ClientConfig::default())
            .unwrap()
            .url;
        assert_eq!(url.path(), "/ServiceLogin");
        let pairs: Vec<_> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs[0],
            (
                "continue".to_owned(),
                "https://accounts.google.com/ManageAccount".to_owned()
            )
        );
        assert!(pairs.contains(&("nojavascript".to_owned(), "1".to_owned())));
    }
}
