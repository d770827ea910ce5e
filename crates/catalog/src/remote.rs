//! HTTP catalog source.
//!
//! The remote endpoint answers `GET` with a JSON array of experiment objects
//! in the same shape as the local `[[experiments]]` entries.

use std::time::Duration;

use abwright_config::AssignmentConfig;
use abwright_core::{CatalogError, Environment, Experiment};
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::CatalogSource;

/// A catalog fetched from a URL.
pub struct RemoteCatalog {
    url: String,
    timeout: Duration,
    /// Decode the body as a stream instead of buffering it first
    streamed: bool,
    client: reqwest::Client,
}

impl RemoteCatalog {
    pub fn new(url: impl Into<String>, timeout: Duration, streamed: bool) -> Result<Self, CatalogError> {
        let url = url.into();
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CatalogError::Network {
                url: url.clone(),
                reason: format!("failed to create HTTP client: {e}"),
            })?;

        Ok(Self {
            url,
            timeout,
            streamed,
            client,
        })
    }

    /// Build the remote source described by `config`, or `None` when no
    /// remote source is configured.
    ///
    /// Server-relative sources are resolved against the process
    /// environment; the streamed decode path is used only client-side with
    /// `use_fetch` enabled.
    pub fn from_config(
        config: &AssignmentConfig,
        environment: Environment,
    ) -> Result<Option<Self>, CatalogError> {
        if !config.has_remote_source() {
            return Ok(None);
        }
        let url = resolve_source_url(config.remote_source.trim(), environment, |key| {
            std::env::var(key).ok()
        });
        let streamed = config.use_fetch && environment == Environment::Client;
        Self::new(url, Duration::from_secs(config.fetch_timeout_secs), streamed).map(Some)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn transport_error(&self, e: reqwest::Error) -> CatalogError {
        if e.is_timeout() {
            CatalogError::Timeout {
                url: self.url.clone(),
                timeout_ms: self.timeout.as_millis() as u64,
            }
        } else {
            CatalogError::Network {
                url: self.url.clone(),
                reason: e.to_string(),
            }
        }
    }
}

#[async_trait]
impl CatalogSource for RemoteCatalog {
    fn name(&self) -> &str {
        &self.url
    }

    async fn fetch(&self) -> Result<Vec<Experiment>, CatalogError> {
        debug!(url = %self.url, streamed = self.streamed, "Fetching remote catalog");

        let response = self
            .client
            .get(&self.url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CatalogError::HttpStatus {
                url: self.url.clone(),
                status_code: status.as_u16(),
            });
        }

        let payload: serde_json::Value = if self.streamed {
            response.json().await.map_err(|e| {
                if e.is_timeout() {
                    self.transport_error(e)
                } else {
                    CatalogError::InvalidPayload {
                        url: self.url.clone(),
                        reason: e.to_string(),
                    }
                }
            })?
        } else {
            let body = response.bytes().await.map_err(|e| self.transport_error(e))?;
            serde_json::from_slice(&body).map_err(|e| CatalogError::InvalidPayload {
                url: self.url.clone(),
                reason: e.to_string(),
            })?
        };

        parse_catalog(&self.url, payload)
    }
}

/// Turn a decoded payload into experiments.
///
/// The payload must be an array. Entries that do not deserialize, or whose
/// id is empty or contains the token separator `.`, are skipped with a
/// warning; the rest are kept in order.
pub fn parse_catalog(url: &str, payload: serde_json::Value) -> Result<Vec<Experiment>, CatalogError> {
    let serde_json::Value::Array(entries) = payload else {
        return Err(CatalogError::NotAnArray { url: url.to_string() });
    };

    let mut experiments = Vec::with_capacity(entries.len());
    for (position, entry) in entries.into_iter().enumerate() {
        match serde_json::from_value::<Experiment>(entry) {
            Ok(exp) if exp.id.is_empty() || exp.id.contains('.') => {
                warn!(url, position, id = %exp.id, "Skipping remote experiment with unusable id");
            }
            Ok(exp) => experiments.push(exp),
            Err(e) => {
                warn!(url, position, error = %e, "Skipping malformed remote experiment");
            }
        }
    }
    Ok(experiments)
}

/// Resolve a server-relative source (`/api/experiments`) to an absolute URL.
///
/// Only applies server-side. The host comes from `API_HOST`, then `HOST`,
/// defaulting to `localhost` (`0.0.0.0` is rewritten to `localhost`); the
/// port from `API_PORT`, then `PORT`, defaulting to 3000. Anything else is
/// returned unchanged.
pub fn resolve_source_url(
    source: &str,
    environment: Environment,
    lookup: impl Fn(&str) -> Option<String>,
) -> String {
    if environment != Environment::Server || !source.starts_with('/') {
        return source.to_string();
    }

    let first = |keys: &[&str]| {
        keys.iter()
            .filter_map(|key| lookup(*key))
            .find(|value| !value.trim().is_empty())
    };
    let mut host = first(&["API_HOST", "HOST"]).unwrap_or_else(|| "localhost".into());
    if host == "0.0.0.0" {
        host = "localhost".into();
    }
    let port = first(&["API_PORT", "PORT"]).unwrap_or_else(|| "3000".into());

    format!("http://{host}:{port}{source}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::http::StatusCode;
    use axum::routing::get;
    use serde_json::json;
    use std::collections::HashMap;

    async fn spawn_source() -> String {
        let app = Router::new()
            .route(
                "/experiments",
                get(|| async {
                    axum::Json(json!([
                        { "experimentID": "hero", "name": "hero", "variants": [{}, {}] },
                        { "experimentID": 42 },
                        { "experimentID": "bad.id", "name": "x", "variants": [] },
                        { "experimentID": "cta", "name": "cta", "weight": 2, "variants": [{ "color": "red" }] }
                    ]))
                }),
            )
            .route("/object", get(|| async { axum::Json(json!({ "experiments": [] })) }))
            .route("/text", get(|| async { "definitely not json" }))
            .route("/down", get(|| async { StatusCode::SERVICE_UNAVAILABLE }))
            .route(
                "/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(2)).await;
                    axum::Json(json!([]))
                }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn remote(base: &str, path: &str, streamed: bool) -> RemoteCatalog {
        RemoteCatalog::new(format!("{base}{path}"), Duration::from_secs(5), streamed).unwrap()
    }

    #[tokio::test]
    async fn fetches_and_skips_invalid_entries() {
        let base = spawn_source().await;
        for streamed in [false, true] {
            let experiments = remote(&base, "/experiments", streamed).fetch().await.unwrap();
            let ids: Vec<_> = experiments.iter().map(|e| e.id.as_str()).collect();
            assert_eq!(ids, vec!["hero", "cta"]);
            assert_eq!(experiments[1].weight, Some(2.0));
            assert_eq!(experiments[1].variants[0].data["color"], "red");
        }
    }

    #[tokio::test]
    async fn non_array_payload_is_rejected() {
        let base = spawn_source().await;
        let err = remote(&base, "/object", false).fetch().await.unwrap_err();
        assert!(matches!(err, CatalogError::NotAnArray { .. }));
    }

    #[tokio::test]
    async fn non_json_payload_is_rejected() {
        let base = spawn_source().await;
        for streamed in [false, true] {
            let err = remote(&base, "/text", streamed).fetch().await.unwrap_err();
            assert!(matches!(err, CatalogError::InvalidPayload { .. }));
        }
    }

    #[tokio::test]
    async fn error_status_is_reported() {
        let base = spawn_source().await;
        let err = remote(&base, "/down", false).fetch().await.unwrap_err();
        assert!(matches!(err, CatalogError::HttpStatus { status_code: 503, .. }));
    }

    #[tokio::test]
    async fn slow_source_times_out() {
        let base = spawn_source().await;
        let catalog =
            RemoteCatalog::new(format!("{base}/slow"), Duration::from_millis(200), false).unwrap();
        let err = catalog.fetch().await.unwrap_err();
        assert!(matches!(err, CatalogError::Timeout { timeout_ms: 200, .. }));
    }

    #[tokio::test]
    async fn unreachable_source_is_network_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let catalog = RemoteCatalog::new(format!("http://{addr}/x"), Duration::from_secs(2), false).unwrap();
        let err = catalog.fetch().await.unwrap_err();
        assert!(matches!(err, CatalogError::Network { .. }));
    }

    #[test]
    fn parse_catalog_keeps_order() {
        let experiments = parse_catalog(
            "test",
            json!([
                { "experimentID": "b", "name": "b", "variants": [] },
                { "experimentID": "a", "name": "a", "variants": [] }
            ]),
        )
        .unwrap();
        assert_eq!(experiments[0].id, "b");
        assert_eq!(experiments[1].id, "a");
    }

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn relative_source_uses_defaults() {
        assert_eq!(
            resolve_source_url("/api/experiments", Environment::Server, env(&[])),
            "http://localhost:3000/api/experiments"
        );
    }

    #[test]
    fn relative_source_prefers_api_variables() {
        let lookup = env(&[
            ("API_HOST", "api.internal"),
            ("HOST", "ignored"),
            ("PORT", "8080"),
        ]);
        assert_eq!(
            resolve_source_url("/exp.json", Environment::Server, lookup),
            "http://api.internal:8080/exp.json"
        );
    }

    #[test]
    fn wildcard_host_maps_to_localhost() {
        let lookup = env(&[("HOST", "0.0.0.0"), ("API_PORT", "4000")]);
        assert_eq!(
            resolve_source_url("/e", Environment::Server, lookup),
            "http://localhost:4000/e"
        );
    }

    #[test]
    fn absolute_and_client_sources_unchanged() {
        assert_eq!(
            resolve_source_url("https://cdn.example.com/e.json", Environment::Server, env(&[])),
            "https://cdn.example.com/e.json"
        );
        assert_eq!(
            resolve_source_url("/api/experiments", Environment::Client, env(&[])),
            "/api/experiments"
        );
    }

    #[test]
    fn from_config_disabled_without_source() {
        let config = AssignmentConfig::default();
        assert!(RemoteCatalog::from_config(&config, Environment::Server).unwrap().is_none());
    }

    #[test]
    fn from_config_streams_only_client_side() {
        let config = AssignmentConfig {
            remote_source: "https://cdn.example.com/e.json".into(),
            use_fetch: true,
            ..AssignmentConfig::default()
        };
        let server = RemoteCatalog::from_config(&config, Environment::Server).unwrap().unwrap();
        assert!(!server.streamed);
        assert_eq!(server.url(), "https://cdn.example.com/e.json");
        let client = RemoteCatalog::from_config(&config, Environment::Client).unwrap().unwrap();
        assert!(client.streamed);
    }
}
