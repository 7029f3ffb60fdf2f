//! Reconciliation error types

use std::fmt;
use thiserror::Error;

/// Errors raised while reconciling a security group
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Invalid CIDR: {0}")]
    InvalidCidr(String),

    #[error("Invalid rule: {0}")]
    InvalidRule(String),

    #[error("Security group not found: {0}")]
    GroupNotFound(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("{phase} phase failed for security group {group_id}: {source}")]
    Phase {
        phase: SyncPhase,
        group_id: String,
        #[source]
        source: Box<SyncError>,
    },
}

impl SyncError {
    /// Wrap an error with the phase it happened in
    pub fn in_phase(phase: SyncPhase, group_id: impl Into<String>, source: SyncError) -> Self {
        SyncError::Phase {
            phase,
            group_id: group_id.into(),
            source: Box::new(source),
        }
    }

    /// The phase that failed, if this error came out of a sync pass
    pub fn phase(&self) -> Option<SyncPhase> {
        match self {
            SyncError::Phase { phase, .. } => Some(*phase),
            _ => None,
        }
    }

    /// The innermost error, with any phase wrappers removed
    pub fn root(&self) -> &SyncError {
        let mut current = self;
        while let SyncError::Phase { source, .. } = current {
            current = source.as_ref();
        }
        current
    }
}

/// Step of a sync pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    /// Resolving or creating the security group itself
    Lookup,
    /// Fetching the current rules
    List,
    /// Canonicalizing and comparing both sides
    Diff,
    /// Removing stale rules
    Delete,
    /// Creating missing rules
    Add,
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncPhase::Lookup => write!(f, "lookup"),
            SyncPhase::List => write!(f, "list"),
            SyncPhase::Diff => write!(f, "diff"),
            SyncPhase::Delete => write!(f, "delete"),
            SyncPhase::Add => write!(f, "add"),
        }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
