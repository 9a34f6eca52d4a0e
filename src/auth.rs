use serde::Deserialize;

pub const SESSION_COOKIE: &str = "session";
pub const DEFAULT_SESSION_VALUE: &str = "admin";
const SESSION_MAX_AGE_SECS: u64 = 60 * 60 * 24 * 7;

/// Decides whether a request principal may touch admin content.
pub trait Authorizer: Send + Sync {
    fn is_authorized(&self, principal: Option<&str>) -> bool;
}

/// Accepts a single shared session token.
pub struct SessionAuthorizer {
    session_value: String,
}

impl SessionAuthorizer {
    pub fn new(session_value: impl Into<String>) -> Self {
        SessionAuthorizer {
            session_value: session_value.into(),
        }
    }

    pub fn session_value(&self) -> &str {
        &self.session_value
    }
}

impl Default for SessionAuthorizer {
    fn default() -> Self {
        SessionAuthorizer::new(DEFAULT_SESSION_VALUE)
    }
}

impl Authorizer for SessionAuthorizer {
    fn is_authorized(&self, principal: Option<&str>) -> bool {
        matches!(principal, Some(p) if !p.is_empty() && p == self.session_value)
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// Unset credentials never match, so a missing password cannot open the admin.
pub fn credentials_match(form: &LoginForm, username: Option<&str>, password: Option<&str>) -> bool {
    match (username, password) {
        (Some(user), Some(pass)) if !user.is_empty() && !pass.is_empty() => {
            form.username == user && form.password == pass
        }
        _ => false,
    }
}

/// Value of `name` in a `Cookie` request header.
pub fn cookie_value<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| key.trim() == name)
        .map(|(_, value)| value.trim().trim_matches('"'))
}

pub fn session_cookie(value: &str, secure: bool) -> String {
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE, value, SESSION_MAX_AGE_SECS
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

pub fn clear_session_cookie() -> String {
    format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", SESSION_COOKIE)
}
