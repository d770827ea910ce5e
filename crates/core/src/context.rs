//! Request context: the view of an incoming request that eligibility rules
//! and the assignment engine are allowed to see.

use std::collections::HashMap;

use crate::cookie::parse_cookie_header;

/// Where the assignment is being computed.
///
/// Determines how cookies are accessed and whether analytics are reported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Environment {
    /// Request handled on the server: cookies come from headers.
    #[default]
    Server,
    /// Code running in the visitor's browser: cookies live in the document.
    Client,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Server => "server",
            Environment::Client => "client",
        }
    }
}

/// Snapshot of the request an assignment is computed for.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub environment: Environment,
    pub method: String,
    pub path: String,
    /// Decoded query parameters (first occurrence wins)
    pub query: HashMap<String, String>,
    /// Header values keyed by lowercase name
    pub headers: HashMap<String, String>,
    /// Parsed request cookies
    pub cookies: HashMap<String, String>,
}

impl RequestContext {
    /// A server-side GET request for `/`.
    pub fn server() -> Self {
        Self {
            environment: Environment::Server,
            method: "GET".into(),
            path: "/".into(),
            ..Self::default()
        }
    }

    /// A client-side context for `/`.
    pub fn client() -> Self {
        Self {
            environment: Environment::Client,
            ..Self::server()
        }
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Add a header. A `cookie` header also populates [`Self::cookies`].
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        let name = name.to_ascii_lowercase();
        let value = value.into();
        if name == "cookie" {
            for (k, v) in parse_cookie_header(&value) {
                self.cookies.entry(k).or_insert(v);
            }
        }
        self.headers.insert(name, value);
        self
    }

    /// Parse a raw query string (`a=1&b=two`) into [`Self::query`].
    pub fn with_query_string(mut self, raw: &str) -> Self {
        let pairs = url::form_urlencoded::parse(raw.trim_start_matches('?').as_bytes());
        for (key, value) in pairs {
            self.query
                .entry(key.into_owned())
                .or_insert_with(|| value.into_owned());
        }
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    pub fn is_server(&self) -> bool {
        self.environment == Environment::Server
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cookie_header_populates_cookies() {
        let ctx = RequestContext::server().with_header("Cookie", "exp=e1.0; theme=dark");
        assert_eq!(ctx.cookie("exp"), Some("e1.0"));
        assert_eq!(ctx.cookie("theme"), Some("dark"));
        assert_eq!(ctx.header("cookie"), Some("exp=e1.0; theme=dark"));
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let ctx = RequestContext::server().with_header("User-Agent", "Mobile Safari");
        assert_eq!(ctx.header("user-agent"), Some("Mobile Safari"));
        assert_eq!(ctx.header("USER-AGENT"), Some("Mobile Safari"));
    }

    #[test]
    fn query_string_is_decoded() {
        let ctx = RequestContext::server().with_query_string("?utm_source=news%20letter&q=a+b&flag");
        assert_eq!(ctx.query_param("utm_source"), Some("news letter"));
        assert_eq!(ctx.query_param("q"), Some("a b"));
        assert_eq!(ctx.query_param("flag"), Some(""));
    }

    #[test]
    fn query_string_edge_cases() {
        let ctx = RequestContext::server()
            .with_query_string("plus=a%2Bb&bad=%zz&ref=first&ref=second&&empty=");
        assert_eq!(ctx.query_param("plus"), Some("a+b"));
        assert_eq!(ctx.query_param("bad"), Some("%zz"));
        assert_eq!(ctx.query_param("ref"), Some("first"));
        assert_eq!(ctx.query_param("empty"), Some(""));
        assert_eq!(ctx.query.len(), 4);
    }

    #[test]
    fn client_context_environment() {
        assert!(!RequestContext::client().is_server());
        assert_eq!(RequestContext::client().environment.as_str(), "client");
    }
}
