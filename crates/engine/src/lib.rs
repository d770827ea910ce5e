//! Experiment and variant assignment.
//!
//! Per request, the [`AssignmentEngine`] runs three steps in sequence:
//!
//! ```text
//! cookie ──▶ decoder ──▶ experiment selector ──▶ variant selector ──▶ Assignment
//!                          (sticky id, weighted     (restore, fill,      │
//!                           draw, eligibility)       no duplicates)      ▼
//!                                                                Set-Cookie if changed
//! ```
//!
//! Everything here is synchronous and pure over its inputs; randomness comes
//! from the caller-provided RNG so tests can seed it.

pub mod decoder;
pub mod engine;
pub mod selector;
pub mod variants;
pub mod weighted;

pub use decoder::{DecodedToken, decode_token};
pub use engine::AssignmentEngine;
pub use selector::select_experiment;
pub use variants::select_variants;
pub use weighted::weighted_index;
