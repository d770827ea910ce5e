//! # abwright Core
//!
//! Domain types, capability traits, and error definitions for the abwright
//! experiment assignment engine. This crate has **zero framework
//! dependencies**: it defines the model (experiments, variants, assignments,
//! tokens) and the seams (cookie access, eligibility, analytics) that the
//! other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every environment-dependent concern is a trait here:
//! - [`CookieJar`] hides whether cookies come from a request header or a
//!   live document store
//! - [`Eligibility`] lets an experiment restrict which requests may join it
//! - [`AnalyticsSink`] receives the composite assignment identifier

pub mod analytics;
pub mod assignment;
pub mod context;
pub mod cookie;
pub mod error;
pub mod experiment;

// Re-export key types at crate root for ergonomics
pub use analytics::{ANALYTICS_KEY, AnalyticsSink, TracingAnalyticsSink, report_assignment};
pub use assignment::{Assignment, AssignmentToken};
pub use context::{Environment, RequestContext};
pub use cookie::{CookieJar, CookieOptions, DocumentCookieJar, HeaderCookieJar};
pub use error::{CatalogError, EligibilityError, Error, Result};
pub use experiment::{Eligibility, Experiment, Variant};
