//! Cookie encoding and the [`CookieJar`] capability.
//!
//! Two jars implement the same interface:
//! - [`HeaderCookieJar`] reads the request's `Cookie` header and collects
//!   `Set-Cookie` values for the response (server side).
//! - [`DocumentCookieJar`] behaves like a browser's `document.cookie`:
//!   a write is visible to the next read (client side).

use std::collections::{BTreeMap, HashMap};

/// Attributes attached to an outgoing cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieOptions {
    pub path: String,
    pub domain: Option<String>,
    /// Lifetime in seconds
    pub max_age: Option<u64>,
}

impl Default for CookieOptions {
    fn default() -> Self {
        Self {
            path: "/".into(),
            domain: None,
            max_age: None,
        }
    }
}

/// Read/write access to the visitor's cookies.
pub trait CookieJar {
    /// Current (decoded) value of cookie `name`.
    fn read_cookie(&self, name: &str) -> Option<String>;

    /// Persist `value` under `name` with the given attributes.
    fn write_cookie(&mut self, name: &str, value: &str, options: &CookieOptions);
}

/// Server-side jar backed by the request's `Cookie` header.
#[derive(Debug, Clone, Default)]
pub struct HeaderCookieJar {
    incoming: HashMap<String, String>,
    set_cookies: Vec<String>,
}

impl HeaderCookieJar {
    pub fn from_header(header: Option<&str>) -> Self {
        Self {
            incoming: header.map(parse_cookie_header).unwrap_or_default(),
            set_cookies: Vec::new(),
        }
    }

    /// Serialized `Set-Cookie` values written so far, in write order.
    pub fn set_cookie_headers(&self) -> &[String] {
        &self.set_cookies
    }

    pub fn into_set_cookie_headers(self) -> Vec<String> {
        self.set_cookies
    }
}

impl CookieJar for HeaderCookieJar {
    fn read_cookie(&self, name: &str) -> Option<String> {
        self.incoming.get(name).cloned()
    }

    fn write_cookie(&mut self, name: &str, value: &str, options: &CookieOptions) {
        self.set_cookies.push(serialize_cookie(name, value, options));
    }
}

/// Client-side jar with `document.cookie` semantics.
#[derive(Debug, Clone, Default)]
pub struct DocumentCookieJar {
    cookies: BTreeMap<String, String>,
}

impl DocumentCookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store from a `name=value; ...` string.
    pub fn from_document_cookie(raw: &str) -> Self {
        let mut jar = Self::new();
        for pair in raw.split(';') {
            jar.set_document_cookie(pair);
        }
        jar
    }

    /// The `document.cookie` getter: every live cookie as `name=value; ...`.
    pub fn document_cookie(&self) -> String {
        self.cookies
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// The `document.cookie` setter: apply one serialized cookie.
    ///
    /// `Max-Age=0` removes the cookie; other attributes are not retained.
    pub fn set_document_cookie(&mut self, serialized: &str) {
        let mut parts = serialized.split(';');
        let Some((name, value)) = parts.next().and_then(|p| p.split_once('=')) else {
            return;
        };
        let name = name.trim();
        if name.is_empty() {
            return;
        }
        let expired = parts.any(|attr| {
            attr.split_once('=').is_some_and(|(k, v)| {
                k.trim().eq_ignore_ascii_case("max-age") && v.trim().parse::<i64>().is_ok_and(|n| n <= 0)
            })
        });
        if expired {
            self.cookies.remove(name);
        } else {
            self.cookies.insert(name.to_string(), value.trim().to_string());
        }
    }
}

impl CookieJar for DocumentCookieJar {
    fn read_cookie(&self, name: &str) -> Option<String> {
        parse_cookie_header(&self.document_cookie()).remove(name)
    }

    fn write_cookie(&mut self, name: &str, value: &str, options: &CookieOptions) {
        let serialized = serialize_cookie(name, value, options);
        self.set_document_cookie(&serialized);
    }
}

/// Parse a `Cookie` header (`a=1; b=2`) into decoded pairs.
///
/// Pairs without `=` are ignored, surrounding quotes are stripped, values are
/// percent-decoded (kept raw if decoding fails), and the first occurrence of
/// a name wins.
pub fn parse_cookie_header(header: &str) -> HashMap<String, String> {
    let mut cookies = HashMap::new();
    for pair in header.split(';') {
        let Some((name, value)) = pair.split_once('=') else {
            continue;
        };
        let name = name.trim();
        if name.is_empty() || cookies.contains_key(name) {
            continue;
        }
        let mut value = value.trim();
        if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
            value = &value[1..value.len() - 1];
        }
        let decoded = percent_decode(value).unwrap_or_else(|| value.to_string());
        cookies.insert(name.to_string(), decoded);
    }
    cookies
}

/// Serialize a cookie for a `Set-Cookie` header or `document.cookie` write.
pub fn serialize_cookie(name: &str, value: &str, options: &CookieOptions) -> String {
    let mut out = format!("{name}={}", percent_encode(value));
    if let Some(max_age) = options.max_age {
        out.push_str(&format!("; Max-Age={max_age}"));
    }
    if let Some(domain) = options.domain.as_deref().filter(|d| !d.is_empty()) {
        out.push_str(&format!("; Domain={domain}"));
    }
    if !options.path.is_empty() {
        out.push_str(&format!("; Path={}", options.path));
    }
    out
}

/// Decode `%XX` escapes. Malformed escapes are kept as-is; returns `None`
/// when the decoded bytes are not UTF-8.
pub fn percent_decode(input: &str) -> Option<String> {
    urlencoding::decode(input).ok().map(|decoded| decoded.into_owned())
}

/// Percent-encode everything outside the unreserved set.
pub fn percent_encode(input: &str) -> String {
    urlencoding::encode(input).into_owned()
}
