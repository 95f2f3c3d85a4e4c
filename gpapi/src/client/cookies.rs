use crate::consts::{APP_DIR_NAME, COOKIE_FILE_NAME};
use crate::errors::{APIError, Result};
use chrono::Utc;
use derivative::Derivative;
use log::debug;
use reqwest::Url;
use reqwest::header::HeaderValue;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

const JAR_DOCUMENT_VERSION: u32 = 1;

#[derive(Derivative, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[derivative(Debug)]
pub struct StoredCookie {
    pub name: String,
    #[derivative(Debug = "ignore")]
    pub value: String,
    pub domain: String,
    pub path: String,
    #[serde(default)]
    pub host_only: bool,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub http_only: bool,
    /// Unix timestamp in seconds; `None` for session cookies.
    #[serde(default)]
    pub expires: Option<i64>,
}

impl StoredCookie {
    fn is_expired(&self, now: i64) -> bool {
        self.expires.is_some_and(|e| e <= now)
    }

    fn matches(&self, url: &Url) -> bool {
        let Some(host) = url.host_str() else {
            return false;
        };
        let host = host.to_ascii_lowercase();

        let domain_ok = if self.host_only {
            host == self.domain
        } else {
            domain_match(&host, &self.domain)
        };

        domain_ok && path_match(url.path(), &self.path) && (!self.secure || url.scheme() == "https")
    }

    fn same_slot(&self, other: &StoredCookie) -> bool {
        self.name == other.name && self.domain == other.domain && self.path == other.path
    }
}

#[derive(Serialize, Deserialize)]
struct JarDocument {
    version: u32,
    cookies: Vec<StoredCookie>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EditThisCookieEntry {
    domain: String,
    name: String,
    value: String,
    #[serde(default = "root_path")]
    path: String,
    #[serde(default)]
    secure: bool,
    #[serde(default)]
    host_only: bool,
    #[serde(default)]
    http_only: bool,
    #[serde(default)]
    session: bool,
    expiration_date: Option<f64>,
}

fn root_path() -> String {
    "/".to_owned()
}

/// Cookie jar shared between the login flow and every subsequent request.
///
/// Installed on the HTTP client as its cookie provider; the jar can be
/// exported to and restored from a JSON document to skip repeated logins.
#[derive(Debug, Default)]
pub struct CookieJar {
    cookies: RwLock<Vec<StoredCookie>>,
}

impl CookieJar {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restores a jar from the JSON document produced by [`CookieJar::to_json`].
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not a valid jar export.
    pub fn from_json(json: &str) -> Result<Self> {
        let document: JarDocument =
            serde_json::from_str(json).map_err(|e| APIError::Cookie(e.to_string()))?;
        Ok(Self {
            cookies: RwLock::new(document.cookies),
        })
    }

    /// Imports an "EditThisCookie" browser export.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not an array of cookie entries.
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_edit_this_cookie_json(json: &str) -> Result<Self> {
        let entries: Vec<EditThisCookieEntry> =
            serde_json::from_str(json).map_err(|e| APIError::Cookie(e.to_string()))?;

        let cookies = entries
            .into_iter()
            .map(|e| StoredCookie {
                name: e.name,
                value: e.value,
                domain: e.domain.trim_start_matches('.').to_ascii_lowercase(),
                path: e.path,
                host_only: e.host_only,
                secure: e.secure,
                http_only: e.http_only,
                expires: if e.session {
                    None
                } else {
                    e.expiration_date.map(|d| d as i64)
                },
            })
            .collect();

        Ok(Self {
            cookies: RwLock::new(cookies),
        })
    }

    /// Serializes every stored cookie, session cookies included.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        let document = JarDocument {
            version: JAR_DOCUMENT_VERSION,
            cookies: self.snapshot(),
        };
        serde_json::to_string_pretty(&document).map_err(|e| APIError::Cookie(e.to_string()))
    }

    /// Loads a jar from `path`, or returns an empty jar if the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::new());
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Writes the jar to `path`, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(prefix) = path.parent() {
            std::fs::create_dir_all(prefix)?;
        }
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Default location of the persisted jar in the user's local data directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform has no local data directory.
    pub fn default_path() -> Result<PathBuf> {
        let mut path = dirs::data_local_dir()
            .ok_or(APIError::Cookie("No data local dir".to_owned()))?;
        path.push(APP_DIR_NAME);
        path.push(COOKIE_FILE_NAME);
        Ok(path)
    }

    pub fn insert(&self, cookie: StoredCookie) {
        let mut cookies = self.cookies.write().unwrap_or_else(PoisonError::into_inner);
        cookies.retain(|c| !c.same_slot(&cookie));
        if !cookie.is_expired(Utc::now().timestamp()) {
            cookies.push(cookie);
        }
    }

    /// Unexpired cookies that would be sent to `url`, longest path first.
    #[must_use]
    pub fn cookies_for(&self, url: &Url) -> Vec<StoredCookie> {
        let now = Utc::now().timestamp();
        let mut matching: Vec<StoredCookie> = self
            .cookies
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|c| !c.is_expired(now) && c.matches(url))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.path.len().cmp(&a.path.len()));
        matching
    }

    #[must_use]
    pub fn snapshot(&self) -> Vec<StoredCookie> {
        self.cookies
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cookies.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.cookies
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn parse_set_cookie(header: &str, url: &Url) -> Option<StoredCookie> {
        let cookie = cookie::Cookie::parse(header.to_owned()).ok()?;
        let host = url.host_str()?.to_ascii_lowercase();

        let (domain, host_only) = match cookie.domain() {
            Some(d) if !d.is_empty() => {
                let d = d.trim_start_matches('.').to_ascii_lowercase();
                if !domain_match(&host, &d) {
                    return None;
                }
                (d, false)
            }
            _ => (host, true),
        };

        let path = match cookie.path() {
            Some(p) if p.starts_with('/') => p.to_owned(),
            _ => default_path(url.path()),
        };

        let expires = cookie
            .max_age()
            .map(|age| Utc::now().timestamp().saturating_add(age.whole_seconds()))
            .or_else(|| cookie.expires_datetime().map(|t| t.unix_timestamp()));

        Some(StoredCookie {
            name: cookie.name().to_owned(),
            value: cookie.value().to_owned(),
            domain,
            path,
            host_only,
            secure: cookie.secure().unwrap_or(false),
            http_only: cookie.http_only().unwrap_or(false),
            expires,
        })
    }
}

impl reqwest::cookie::CookieStore for CookieJar {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, url: &Url) {
        for header in cookie_headers {
            if let Some(cookie) = header
                .to_str()
                .ok()
                .and_then(|h| Self::parse_set_cookie(h, url))
            {
                debug!("Storing cookie {} for {}", cookie.name, cookie.domain);
                self.insert(cookie);
            }
        }
    }

    fn cookies(&self, url: &Url) -> Option<HeaderValue> {
        let header = self
            .cookies_for(url)
            .iter()
            .map(|c| format!("{}={}", c.name, c.value))
            .collect::<Vec<_>>()
            .join("; ");

        if header.is_empty() {
            None
        } else {
            HeaderValue::from_str(&header).ok()
        }
    }
}

fn domain_match(host: &str, domain: &str) -> bool {
    host == domain
        || (host.len() > domain.len()
            && host.ends_with(domain)
            && host.as_bytes()[host.len() - domain.len() - 1] == b'.')
}

fn path_match(request_path: &str, cookie_path: &str) -> bool {
    request_path == cookie_path
        || (request_path.starts_with(cookie_path)
            && (cookie_path.ends_with('/')
                || request_path.as_bytes().get(cookie_path.len()) == Some(&b'/')))
}

fn default_path(request_path: &str) -> String {
    match request_path.rfind('/') {
        Some(0) | None => "/".to_owned(),
        Some(i) => request_path[..i].to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::cookie::CookieStore;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn set(jar: &CookieJar, header: &'static str, at: &str) {
        let value = HeaderValue::from_static(header);
        jar.set_cookies(&mut std::iter::once(&value), &url(at));
    }

    #[test]
    fn domain_cookie_is_sent_to_subdomains() {
        let jar = CookieJar::new();
        set(&jar, "SID=abc; Domain=.google.com; Path=/", "https://accounts.google.com/ServiceLogin");

        let header = jar.cookies(&url("https://photos.google.com/_/PhotosUi/data"));
        assert_eq!(header, Some(HeaderValue::from_static("SID=abc")));
        assert!(jar.cookies(&url("https://example.com/")).is_none());
    }

    #[test]
    fn host_only_cookie_stays_on_its_host() {
        let jar = CookieJar::new();
        set(&jar, "HOST=1", "https://accounts.google.com/signin/v1/lookup");

        assert!(jar.cookies(&url("https://photos.google.com/signin/x")).is_none());
        assert!(jar.cookies(&url("https://accounts.google.com/")).is_none());
        assert!(jar.cookies(&url("https://accounts.google.com/signin/v1/other")).is_some());
    }

    #[test]
    fn secure_and_expired_cookies_are_filtered() {
        let jar = CookieJar::new();
        set(&jar, "S=1; Secure; Path=/", "https://photos.google.com/");
        set(&jar, "OLD=1; Path=/; Max-Age=0", "https://photos.google.com/");

        assert!(jar.cookies(&url("http://photos.google.com/")).is_none());
        assert_eq!(
            jar.cookies(&url("https://photos.google.com/")),
            Some(HeaderValue::from_static("S=1"))
        );
    }

    #[test]
    fn huge_max_age_never_expires() {
        let jar = CookieJar::new();
        set(&jar, "SID=abc; Max-Age=9223372036854775807; Path=/", "https://photos.google.com/");

        assert_eq!(jar.snapshot()[0].expires, Some(i64::MAX));
        assert_eq!(
            jar.cookies(&url("https://photos.google.com/")),
            Some(HeaderValue::from_static("SID=abc"))
        );
    }

    #[test]
    fn rejects_foreign_domain_attribute() {
        let jar = CookieJar::new();
        set(&jar, "X=1; Domain=example.com", "https://photos.google.com/");
        assert!(jar.is_empty());
    }

    #[test]
    fn json_export_restores_cookies() {
        let jar = CookieJar::new();
        set(&jar, "SID=abc; Domain=google.com; Path=/", "https://photos.google.com/");

        let restored = CookieJar::from_json(&jar.to_json().unwrap()).unwrap();
        assert_eq!(restored.snapshot(), jar.snapshot());
    }

    #[test]
    fn imports_edit_this_cookie_export() {
        let export = r#"[{
            "domain": ".google.com", "expirationDate": 4102444800.5, "hostOnly": false,
            "httpOnly": true, "name": "SID", "path": "/", "sameSite": "no_restriction",
            "secure": true, "session": false, "storeId": "0", "value": "xyz", "id": 1
        }]"#;

        let jar = CookieJar::from_edit_this_cookie_json(export).unwrap();
        let cookies = jar.snapshot();
        assert_eq!(cookies.len(), 1);
        assert_eq!(cookies[0].domain, "google.com");
        assert!(!cookies[0].host_only);
        assert!(cookies[0].http_only);
        assert_eq!(cookies[0].expires, Some(4_102_444_800));
        assert_eq!(
            jar.cookies(&url("https://photos.google.com/")),
            Some(HeaderValue::from_static("SID=xyz"))
        );
    }
}
