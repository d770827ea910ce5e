//! Analytics integration.
//!
//! When code runs in the visitor's browser and an experiment is active, the
//! composite `<experimentID>.<i1>-<i2>` identifier is handed to the analytics
//! collector under a fixed key. Server-side execution never reports.

use crate::assignment::Assignment;
use crate::context::Environment;

/// Key the assignment identifier is reported under.
pub const ANALYTICS_KEY: &str = "exp";

/// Receiver for analytics `set` calls.
pub trait AnalyticsSink: Send + Sync {
    fn set(&self, key: &str, value: &str);
}

/// Sink that records reports as structured log events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAnalyticsSink;

impl AnalyticsSink for TracingAnalyticsSink {
    fn set(&self, key: &str, value: &str) {
        tracing::info!(key, value, "Analytics assignment reported");
    }
}

/// Report `assignment` to `sink` if running client-side with an active
/// experiment. Returns the reported value.
pub fn report_assignment(
    environment: Environment,
    assignment: &Assignment,
    sink: &dyn AnalyticsSink,
) -> Option<String> {
    if environment == Environment::Server {
        return None;
    }
    let value = assignment.token()?.to_string();
    sink.set(ANALYTICS_KEY, &value);
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::experiment::{Experiment, Variant};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        calls: Mutex<Vec<(String, String)>>,
    }

    impl AnalyticsSink for RecordingSink {
        fn set(&self, key: &str, value: &str) {
            self.calls
                .lock()
                .unwrap()
                .push((key.to_string(), value.to_string()));
        }
    }

    fn active() -> Assignment {
        Assignment {
            experiment_index: Some(0),
            variant_indexes: vec![1, 0],
            active_variants: vec![Variant::new(), Variant::new()],
            classes: vec![],
            experiment: Some(Experiment::new("abc", "abc")),
        }
    }

    #[test]
    fn client_reports_composite_id() {
        let sink = RecordingSink::default();
        let reported = report_assignment(Environment::Client, &active(), &sink);
        assert_eq!(reported.as_deref(), Some("abc.1-0"));
        assert_eq!(
            sink.calls.lock().unwrap().as_slice(),
            &[("exp".to_string(), "abc.1-0".to_string())]
        );
    }

    #[test]
    fn server_never_reports() {
        let sink = RecordingSink::default();
        assert!(report_assignment(Environment::Server, &active(), &sink).is_none());
        assert!(sink.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn inactive_assignment_not_reported() {
        let sink = RecordingSink::default();
        assert!(report_assignment(Environment::Client, &Assignment::none(), &sink).is_none());
        assert!(sink.calls.lock().unwrap().is_empty());
    }
}
