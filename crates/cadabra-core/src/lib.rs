//! Shared domain types for Cadabra
//!
//! Experiments, assignments and users as seen by every other crate, the
//! reserved `All` bucket label, the report window selectors and the
//! [`HttpError`] trait used to turn domain errors into responses.

#![allow(clippy::must_use_candidate)]

mod error;
mod identity;
mod model;
mod since;

pub use error::HttpError;
pub use identity::{Identity, User, UserId};
pub use model::{ALL_BUCKETS, Assignment, Experiment, ExperimentId, ExperimentStatus, MAX_NAME_LEN};
pub use since::SinceSelector;
