use cadabra_cache::CacheError;
use cadabra_core::{ALL_BUCKETS, ExperimentId, HttpError, UserId};
use cadabra_store::StoreError;
use http::StatusCode;
use thiserror::Error;

/// Errors from the registry, assignment and reporting paths
#[derive(Debug, Error)]
pub enum ExperimentError {
    /// Assignment was requested for an anonymous visitor
    #[error("experiments can only be run for authenticated users")]
    Unauthenticated,

    /// Assignment was requested without any candidate bucket
    #[error("at least one candidate bucket is required")]
    EmptyBuckets,

    /// A candidate bucket used the reserved label
    #[error("bucket label '{all}' is reserved", all = ALL_BUCKETS)]
    ReservedBucket,

    /// Experiment name is empty or too long
    #[error("invalid experiment name: {0}")]
    InvalidName(String),

    /// Candidate bucket label is empty or too long
    #[error("invalid bucket label: {0}")]
    InvalidBucket(String),

    /// No experiment with this id
    #[error("experiment not found: {id}")]
    NotFound { id: ExperimentId },

    /// The reserved label was found among recorded assignments
    #[error("experiment '{experiment}' has assignments recorded in the reserved bucket '{all}'", all = ALL_BUCKETS)]
    ReservedBucketRecorded { experiment: String },

    /// An assignment row still has no bucket after assignment
    #[error("no bucket assigned for user {user_id} in experiment '{experiment}'")]
    MissingBucket { experiment: String, user_id: UserId },

    /// A host-provided metric source failed
    #[error("metric computation failed: {0}")]
    Metric(anyhow::Error),

    /// Durable store failure
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Cache service failure
    #[error(transparent)]
    Cache(#[from] CacheError),
}

impl ExperimentError {
    /// Whether this error reports corrupted stored data
    pub const fn is_integrity_violation(&self) -> bool {
        matches!(self, Self::ReservedBucketRecorded { .. } | Self::MissingBucket { .. })
    }
}

impl HttpError for ExperimentError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::EmptyBuckets | Self::ReservedBucket | Self::InvalidName(_) | Self::InvalidBucket(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::ReservedBucketRecorded { .. }
            | Self::MissingBucket { .. }
            | Self::Metric(_)
            | Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Cache(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn error_type(&self) -> &str {
        match self {
            Self::Unauthenticated => "unauthenticated_error",
            Self::EmptyBuckets | Self::ReservedBucket | Self::InvalidName(_) | Self::InvalidBucket(_) => {
                "invalid_request_error"
            }
            Self::NotFound { .. } => "not_found_error",
            Self::ReservedBucketRecorded { .. } | Self::MissingBucket { .. } => "integrity_error",
            Self::Metric(_) | Self::Store(_) | Self::Cache(_) => "internal_error",
        }
    }

    fn client_message(&self) -> String {
        match self {
            Self::Metric(_) | Self::Store(_) | Self::Cache(_) => "an internal error occurred".to_owned(),
            other => other.to_string(),
        }
    }
}
