//! Catalog assembly: local experiments first, remote ones appended.

use std::collections::HashSet;
use std::sync::Arc;

use abwright_config::AppConfig;
use abwright_core::{Environment, Experiment};
use tracing::{debug, error, warn};

use crate::remote::RemoteCatalog;
use crate::{CatalogSource, StaticCatalog};

/// Merges the local catalog with an optional remote source.
#[derive(Clone)]
pub struct CatalogLoader {
    local: StaticCatalog,
    remote: Option<Arc<dyn CatalogSource>>,
}

impl CatalogLoader {
    /// Loader over `local` experiments. Their `eligibleWhen` rules are
    /// compiled here, once, and shared by every load.
    pub fn new(mut local: Vec<Experiment>) -> Self {
        abwright_rules::compile_catalog(&mut local);
        Self {
            local: StaticCatalog::new(local),
            remote: None,
        }
    }

    pub fn with_remote(mut self, source: impl CatalogSource + 'static) -> Self {
        self.remote = Some(Arc::new(source));
        self
    }

    /// Loader for the configured local experiments and remote source.
    ///
    /// A remote source that cannot be set up is logged and left out.
    pub fn from_config(config: &AppConfig, environment: Environment) -> Self {
        let loader = Self::new(config.experiments.clone());
        match RemoteCatalog::from_config(&config.assignment, environment) {
            Ok(Some(remote)) => loader.with_remote(remote),
            Ok(None) => loader,
            Err(e) => {
                error!(error = %e, "Remote catalog disabled");
                loader
            }
        }
    }

    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }

    /// Produce the merged catalog.
    ///
    /// Never fails. Remote errors are logged and contribute no experiments;
    /// for duplicate ids the first occurrence wins. Rules of remote
    /// experiments are compiled per fetch.
    pub async fn load(&self) -> Vec<Experiment> {
        let mut experiments = match self.local.fetch().await {
            Ok(list) => list,
            Err(e) => {
                error!(error = %e, "Local catalog unavailable");
                Vec::new()
            }
        };

        if let Some(remote) = &self.remote {
            match remote.fetch().await {
                Ok(mut list) => {
                    abwright_rules::compile_catalog(&mut list);
                    debug!(source = remote.name(), count = list.len(), "Remote catalog fetched");
                    experiments.extend(list);
                }
                Err(e) => {
                    error!(source = remote.name(), error = %e, "Remote catalog fetch failed; using local catalog");
                }
            }
        }

        let mut seen = HashSet::new();
        experiments.retain(|exp| {
            let first = seen.insert(exp.id.clone());
            if !first {
                warn!(experiment = %exp.id, "Duplicate experiment id; keeping the first");
            }
            first
        });

        experiments
    }
}
