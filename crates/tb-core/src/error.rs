//! # AppError
//!
//! Centralized error handling for the Tallyboard ecosystem.
//! Every failure the core can produce is one of these variants; the HTTP
//! adapter maps them to responses and nothing here is ever fatal to the process.

use thiserror::Error;
use uuid::Uuid;

/// The primary error type for all tb-core operations.
#[derive(Error, Debug)]
pub enum AppError {
    /// Malformed or out-of-range input (e.g., title too short, bad direction)
    #[error("validation failed: {0}")]
    ValidationFailed(String),

    /// Referenced resource is absent (e.g., Account, Post, Milestone)
    #[error("{0} not found with ID {1}")]
    NotFound(&'static str, String),

    /// Caller lacks the administrative capability
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Unique field already taken (handle, contact address)
    #[error("conflict: {0}")]
    Conflict(String),

    /// Unknown handle or wrong secret; deliberately indistinguishable.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Token signature or structure did not check out.
    #[error("invalid token")]
    InvalidToken,

    /// Token is past its expiry.
    #[error("token expired")]
    Expired,

    /// Token was valid but its account no longer exists.
    #[error("token refers to an unknown account")]
    UnknownAccount,

    /// The milestone action for this post and threshold has already fired.
    #[error("milestone {threshold} on post {post_id} already triggered")]
    AlreadyTriggered { post_id: Uuid, threshold: i64 },

    /// Infrastructure failure (e.g., DB down, pool timeout, write contention)
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// The post recorded the vote but the voter's history could not be updated.
    /// Distinct from a post-side failure, which leaves both documents untouched.
    #[error("vote recorded on post {post_id} but not mirrored to account {account_id}: {reason}")]
    VoteNotMirrored {
        post_id: Uuid,
        account_id: Uuid,
        reason: String,
    },

    /// Anything else that went wrong inside the process (hashing, token encoding).
    #[error("internal service error: {0}")]
    Internal(String),
}

impl AppError {
    /// Only transient infrastructure failures may be retried automatically.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::StoreUnavailable(_))
    }

    pub fn account_not_found(id: Uuid) -> Self {
        AppError::NotFound("account", id.to_string())
    }

    pub fn post_not_found(id: Uuid) -> Self {
        AppError::NotFound("post", id.to_string())
    }
}

/// A specialized Result type for Tallyboard logic.
pub type Result<T> = std::result::Result<T, AppError>;
