use axum::http::{header, HeaderMap};
use std::collections::HashSet;
use std::sync::RwLock;
use uuid::Uuid;

pub const COOKIE_NAME: &str = "certifica_session";

/// Tokens of the currently open admin sessions. Sessions last until logout.
#[derive(Default)]
pub struct SessionStore {
    tokens: RwLock<HashSet<String>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&self) -> String {
        let token = Uuid::new_v4().to_string();
        self.tokens
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(token.clone());
        token
    }

    pub fn is_open(&self, token: &str) -> bool {
        self.tokens
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains(token)
    }

    pub fn close(&self, token: &str) {
        self.tokens
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(token);
    }
}

/// Per-request view of the caller's session.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub token: Option<String>,
    pub authenticated: bool,
}

impl Session {
    pub fn from_headers(store: &SessionStore, headers: &HeaderMap) -> Self {
        let token = session_cookie(headers);
        let authenticated = token.as_deref().map_or(false, |t| store.is_open(t));
        Self {
            token,
            authenticated,
        }
    }
}

fn session_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == COOKIE_NAME)
        .map(|(_, value)| value.to_string())
}

fn attributes(secure: bool) -> &'static str {
    if secure {
        "Path=/; HttpOnly; SameSite=Lax; Secure"
    } else {
        "Path=/; HttpOnly; SameSite=Lax"
    }
}

pub fn set_cookie(token: &str, secure: bool) -> String {
    format!("{}={}; {}", COOKIE_NAME, token, attributes(secure))
}

pub fn clear_cookie(secure: bool) -> String {
    format!("{}=; {}; Max-Age=0", COOKIE_NAME, attributes(secure))
}
