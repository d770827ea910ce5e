//! Experiment catalog sources.
//!
//! A catalog is the ordered list of experiments the engine draws from. It is
//! assembled per request from a [`StaticCatalog`] (experiments declared in
//! configuration) and, optionally, a [`RemoteCatalog`] fetched over HTTP.
//! [`CatalogLoader`] merges the two and never fails: a broken remote source
//! only means fewer experiments.

pub mod loader;
pub mod remote;

use async_trait::async_trait;
use abwright_core::{CatalogError, Experiment};

pub use loader::CatalogLoader;
pub use remote::{RemoteCatalog, parse_catalog, resolve_source_url};

/// Anything that can produce a list of experiments.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Human-readable source name used in logs.
    fn name(&self) -> &str;

    /// Fetch the experiments this source currently offers.
    async fn fetch(&self) -> Result<Vec<Experiment>, CatalogError>;
}

/// Experiments known ahead of time.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    experiments: Vec<Experiment>,
}

impl StaticCatalog {
    pub fn new(experiments: Vec<Experiment>) -> Self {
        Self { experiments }
    }

    pub fn len(&self) -> usize {
        self.experiments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.experiments.is_empty()
    }
}

#[async_trait]
impl CatalogSource for StaticCatalog {
    fn name(&self) -> &str {
        "local"
    }

    async fn fetch(&self) -> Result<Vec<Experiment>, CatalogError> {
        Ok(self.experiments.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use abwright_core::RequestContext;

    #[tokio::test]
    async fn static_catalog_returns_its_experiments() {
        let catalog = StaticCatalog::new(vec![
            Experiment::new("a", "a"),
            Experiment::new("b", "b").with_eligibility(|_: &RequestContext| false),
        ]);
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.name(), "local");

        let fetched = catalog.fetch().await.unwrap();
        assert_eq!(fetched[0].id, "a");
        // Programmatic predicates survive the clone.
        assert!(fetched[1].eligibility.is_some());
    }

    #[tokio::test]
    async fn empty_static_catalog() {
        let catalog = StaticCatalog::default();
        assert!(catalog.is_empty());
        assert!(catalog.fetch().await.unwrap().is_empty());
    }
}
