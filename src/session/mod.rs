use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use axum_extra::extract::cookie::Cookie;
use serde::{Deserialize, Serialize};

use crate::error::{ClientError, ClientResult};

pub mod snapshot;
pub mod token;

pub use snapshot::{EditorSnapshot, SnapshotStore, SNAPSHOT_KEY};
pub use token::decode_user_id;

pub const JWT_COOKIE: &str = "jwt";
pub const ACCESS_TOKEN_COOKIE: &str = "access_token";
pub const SESSION_ID_COOKIE: &str = "session_id";

const SESSION_FILE: &str = "session.json";

/// The cookies the backend hands out, kept between CLI invocations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCookies {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jwt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl SessionCookies {
    pub fn is_logged_in(&self) -> bool {
        self.jwt.is_some()
    }

    pub fn cookie_header(&self) -> Option<String> {
        let pairs = [
            (JWT_COOKIE, &self.jwt),
            (ACCESS_TOKEN_COOKIE, &self.access_token),
            (SESSION_ID_COOKIE, &self.session_id),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.as_ref().map(|value| format!("{name}={value}")))
        .collect::<Vec<_>>();
        if pairs.is_empty() {
            None
        } else {
            Some(pairs.join("; "))
        }
    }

    /// Applies one `Set-Cookie` header. Returns true when a tracked cookie changed.
    pub fn absorb_set_cookie(&mut self, header: &str) -> bool {
        let Ok(cookie) = Cookie::parse(header.to_string()) else {
            tracing::debug!(header, "ignoring unparsable Set-Cookie header");
            return false;
        };
        let slot = match cookie.name() {
            JWT_COOKIE => &mut self.jwt,
            ACCESS_TOKEN_COOKIE => &mut self.access_token,
            SESSION_ID_COOKIE => &mut self.session_id,
            _ => return false,
        };
        let expired = cookie.value().is_empty()
            || cookie.max_age().map(|age| age.is_zero() || age.is_negative()).unwrap_or(false);
        let next = if expired {
            None
        } else {
            Some(cookie.value().to_string())
        };
        if *slot == next {
            return false;
        }
        *slot = next;
        true
    }

    pub fn clear(&mut self) {
        *self = SessionCookies::default();
    }
}

/// Reads the two values the workspace needs from the cookie jar.
pub struct SessionAccessor<'a> {
    cookies: &'a SessionCookies,
    secret: Option<&'a [u8]>,
}

impl<'a> SessionAccessor<'a> {
    pub fn new(cookies: &'a SessionCookies, secret: Option<&'a [u8]>) -> Self {
        Self { cookies, secret }
    }

    pub fn user_id(&self) -> ClientResult<u64> {
        let token = self
            .cookies
            .jwt
            .as_deref()
            .ok_or(ClientError::NotFound("Token not found"))?;
        decode_user_id(token, self.secret)
    }

    pub fn session_id(&self) -> ClientResult<&'a str> {
        self.cookies
            .session_id
            .as_deref()
            .ok_or(ClientError::NotFound("Session ID not found"))
    }
}

/// JSON file holding [`SessionCookies`] inside the data directory.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(SESSION_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<SessionCookies> {
        let raw = match fs::read(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Ok(SessionCookies::default())
            }
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("reading session {}", self.path.display()))
            }
        };
        serde_json::from_slice(&raw)
            .with_context(|| format!("parsing session {}", self.path.display()))
    }

    pub fn save(&self, cookies: &SessionCookies) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let json = serde_json::to_vec_pretty(cookies).context("serialising session")?;
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, &json)
            .with_context(|| format!("writing temporary session {}", tmp_path.display()))?;
        fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("persisting session {}", self.path.display()))?;
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err).with_context(|| format!("removing session {}", self.path.display())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn set_cookie_headers_update_the_jar() {
        let mut cookies = SessionCookies::default();
        assert!(cookies.absorb_set_cookie("jwt=abc.def.ghi; Path=/; HttpOnly"));
        assert!(cookies.absorb_set_cookie("session_id=s-1; Path=/"));
        assert!(!cookies.absorb_set_cookie("theme=dark"));
        assert_eq!(cookies.cookie_header().as_deref(), Some("jwt=abc.def.ghi; session_id=s-1"));

        assert!(cookies.absorb_set_cookie("jwt=; Path=/; Max-Age=0; HttpOnly; Secure"));
        assert!(!cookies.is_logged_in());
    }

    #[test]
    fn accessor_maps_missing_cookies_to_not_found() {
        let cookies = SessionCookies::default();
        let accessor = SessionAccessor::new(&cookies, None);
        assert_matches!(accessor.user_id(), Err(ClientError::NotFound("Token not found")));
        assert_matches!(accessor.session_id(), Err(ClientError::NotFound(_)));
    }

    #[test]
    fn accessor_decodes_user_from_jwt() {
        let token = token::sign_for_tests(&json!({"user_id": 12}), b"s");
        let cookies = SessionCookies {
            jwt: Some(token),
            session_id: Some("abc".into()),
            ..SessionCookies::default()
        };
        let accessor = SessionAccessor::new(&cookies, Some(b"s"));
        assert_eq!(accessor.user_id().unwrap(), 12);
        assert_eq!(accessor.session_id().unwrap(), "abc");
    }

    #[test]
    fn session_store_round_trips_and_clears() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let store = SessionStore::new(temp.path());
        assert_eq!(store.load()?, SessionCookies::default());

        let cookies = SessionCookies {
            jwt: Some("token".into()),
            ..SessionCookies::default()
        };
        store.save(&cookies)?;
        assert_eq!(store.load()?, cookies);

        store.clear()?;
        assert!(!store.path().exists());
        store.clear()?;
        Ok(())
    }
}
