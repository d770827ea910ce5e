//! The per-request assignment pipeline.

use abwright_config::AssignmentConfig;
use abwright_core::{Assignment, AssignmentToken, CookieJar, Experiment, RequestContext};
use rand::Rng;
use tracing::{debug, info};

use crate::decoder::decode_token;
use crate::selector::select_experiment;
use crate::variants::select_variants;

/// Assigns visitors to an experiment and variants, persisting the choice in
/// a cookie.
///
/// Built once from configuration and shared across requests; holds no
/// per-request state.
#[derive(Debug, Clone)]
pub struct AssignmentEngine {
    config: AssignmentConfig,
}

impl AssignmentEngine {
    pub fn new(config: &AssignmentConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    pub fn cookie_name(&self) -> &str {
        &self.config.cookie_name
    }

    /// Assign using the thread-local RNG.
    pub fn assign(
        &self,
        catalog: &[Experiment],
        ctx: &RequestContext,
        jar: &mut dyn CookieJar,
    ) -> Assignment {
        self.assign_with_rng(catalog, ctx, jar, &mut rand::rng())
    }

    /// Run decode, experiment selection and variant selection, writing the
    /// cookie through `jar` when the encoded token changed.
    pub fn assign_with_rng<R: Rng + ?Sized>(
        &self,
        catalog: &[Experiment],
        ctx: &RequestContext,
        jar: &mut dyn CookieJar,
        rng: &mut R,
    ) -> Assignment {
        let cookie = jar.read_cookie(&self.config.cookie_name);
        let decoded = decode_token(cookie.as_deref());

        let Some(experiment_index) =
            select_experiment(catalog, &decoded.experiment_id, ctx, rng)
        else {
            debug!(catalog_size = catalog.len(), "No active experiment for request");
            return Assignment::none();
        };
        let experiment = &catalog[experiment_index];

        let variant_indexes = select_variants(experiment, &decoded.variant_indexes, rng);

        let token = AssignmentToken::new(experiment.id.clone(), variant_indexes.clone()).to_string();
        if cookie.as_deref() != Some(token.as_str()) {
            let options = self.config.cookie_options(experiment.max_age);
            jar.write_cookie(&self.config.cookie_name, &token, &options);
            info!(
                experiment = %experiment.id,
                token = %token,
                max_age = ?options.max_age,
                "Assignment cookie updated"
            );
        }

        Assignment {
            experiment_index: Some(experiment_index),
            active_variants: variant_indexes
                .iter()
                .map(|&i| experiment.variants[i].clone())
                .collect(),
            classes: variant_indexes
                .iter()
                .map(|&i| experiment.class_for(i))
                .collect(),
            variant_indexes,
            experiment: Some(experiment.clone()),
        }
    }
}
