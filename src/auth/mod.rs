use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{
        header::{self, InvalidHeaderValue},
        request::Parts,
        HeaderMap, HeaderValue,
    },
    response::{IntoResponseParts, ResponseParts},
};
use std::collections::HashMap;
use std::convert::Infallible;

#[cfg(test)]
mod tests;

/// Request-scoped cookie context.
///
/// Holds the cookies the client sent and the `Set-Cookie` headers queued for
/// the response. Writes are visible to later reads within the same request.
/// Extracted from request headers by axum and returned as response parts.
#[derive(Debug, Default, Clone)]
pub struct CookieJar {
    cookies: HashMap<String, String>,
    outgoing: Vec<HeaderValue>,
}

/// Attributes applied when setting or removing a cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieOptions {
    pub max_age: Option<i64>,
    pub path: String,
    pub http_only: bool,
    pub secure: bool,
}

impl Default for CookieOptions {
    fn default() -> Self {
        Self {
            max_age: None,
            path: "/".to_string(),
            http_only: true,
            secure: false,
        }
    }
}

impl CookieJar {
    /// Parse every `Cookie` header. Later duplicates of a name win.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let cookies = headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(';'))
            .filter_map(parse_cookie_pair)
            .collect();

        Self {
            cookies,
            outgoing: Vec::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    /// True if any cookie name starts with `prefix`.
    pub fn has_prefixed(&self, prefix: &str) -> bool {
        self.cookies.keys().any(|name| name.starts_with(prefix))
    }

    /// Queue a `Set-Cookie` and make the value visible to subsequent reads.
    pub fn set(
        &mut self,
        name: &str,
        value: &str,
        options: &CookieOptions,
    ) -> Result<(), InvalidHeaderValue> {
        let header = HeaderValue::from_str(&render_set_cookie(name, value, options.max_age, options))?;
        self.outgoing.push(header);
        self.cookies.insert(name.to_string(), value.to_string());
        Ok(())
    }

    /// Queue an expiring `Set-Cookie`. Removing an absent cookie is not an error.
    pub fn remove(&mut self, name: &str, options: &CookieOptions) {
        self.cookies.remove(name);
        // Name and attributes come from our own constants, always valid header text
        if let Ok(header) = HeaderValue::from_str(&render_set_cookie(name, "", Some(0), options)) {
            self.outgoing.push(header);
        }
    }

    /// `Set-Cookie` values queued so far, in order.
    pub fn set_cookie_headers(&self) -> &[HeaderValue] {
        &self.outgoing
    }
}

fn parse_cookie_pair(pair: &str) -> Option<(String, String)> {
    let (name, value) = pair.trim().split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    let value = value.trim().trim_matches('"');
    Some((name.to_string(), value.to_string()))
}

fn render_set_cookie(name: &str, value: &str, max_age: Option<i64>, options: &CookieOptions) -> String {
    let mut cookie = format!("{}={}", name, value);
    if let Some(max_age) = max_age {
        cookie.push_str(&format!("; Max-Age={}", max_age));
    }
    cookie.push_str(&format!("; Path={}", options.path));
    if options.http_only {
        cookie.push_str("; HttpOnly");
    }
    if options.secure {
        cookie.push_str("; Secure");
    }
    cookie.push_str("; SameSite=Lax");
    cookie
}

#[async_trait]
impl<S> FromRequestParts<S> for CookieJar
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_headers(&parts.headers))
    }
}

impl IntoResponseParts for CookieJar {
    type Error = Infallible;

    fn into_response_parts(self, mut res: ResponseParts) -> Result<ResponseParts, Self::Error> {
        for value in self.outgoing {
            res.headers_mut().append(header::SET_COOKIE, value);
        }
        Ok(res)
    }
}

/// Check whether the request belongs to a signed-in application session.
///
/// The identity provider for the dashboard manages its own session cookies;
/// their presence (any cookie named with `prefix`) is what gates the OAuth
/// routes.
pub fn has_session(jar: &CookieJar, prefix: &str) -> bool {
    !prefix.is_empty() && jar.has_prefixed(prefix)
}
