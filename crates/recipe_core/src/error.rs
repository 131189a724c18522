//! Caller-facing errors of the recipe provider and batch coordinator.

use crate::dao::DaoError;
use crate::db::DbError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Provider entry point named in error reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Read,
    Create,
    BulkCreate,
    Update,
    Delete,
}

impl Display for Operation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Read => "read",
            Self::Create => "create",
            Self::BulkCreate => "bulk-create",
            Self::Update => "update",
            Self::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// Failure of a single provider call.
#[derive(Debug)]
pub enum ProviderError {
    /// Locator shape is not recognized.
    InvalidLocator(String),
    /// Locator is valid but the operation cannot act on that target.
    UnsupportedTarget {
        operation: Operation,
        locator: String,
        reason: &'static str,
    },
    /// Storage rejected the write or produced no identifier.
    StorageWriteFailed {
        locator: String,
        source: Option<DaoError>,
    },
    /// Operation exists in the interface but has no behavior yet.
    NotImplemented {
        operation: Operation,
        locator: String,
    },
    /// Read or bookkeeping failure in the storage layer.
    Storage(DaoError),
}

impl Display for ProviderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidLocator(locator) => write!(f, "unknown locator: `{locator}`"),
            Self::UnsupportedTarget {
                operation,
                locator,
                reason,
            } => write!(f, "invalid locator for {operation}, {reason}: `{locator}`"),
            Self::StorageWriteFailed { locator, source } => match source {
                Some(err) => write!(f, "failed to write row for `{locator}`: {err}"),
                None => write!(f, "failed to write row for `{locator}`"),
            },
            Self::NotImplemented { operation, locator } => {
                write!(f, "{operation} is not implemented yet: `{locator}`")
            }
            Self::Storage(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ProviderError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::StorageWriteFailed {
                source: Some(err), ..
            } => Some(err),
            Self::Storage(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DaoError> for ProviderError {
    fn from(value: DaoError) -> Self {
        Self::Storage(value)
    }
}

impl From<rusqlite::Error> for ProviderError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Storage(DaoError::from(value))
    }
}

impl From<DbError> for ProviderError {
    fn from(value: DbError) -> Self {
        Self::Storage(DaoError::Db(value))
    }
}

/// Failure of an atomic batch; nothing from the batch was committed.
#[derive(Debug)]
pub enum BatchError {
    /// The exclusive transaction could not be opened.
    Begin(DaoError),
    /// Operation at `index` failed.
    Operation { index: usize, source: DaoError },
    /// Operation at `index` refers to a result that is not an earlier insert.
    BackReference { index: usize, reference: usize },
    /// Every operation succeeded but the commit itself failed.
    Commit(DaoError),
}

impl BatchError {
    /// Index of the operation that aborted the batch, if one did.
    pub fn failed_index(&self) -> Option<usize> {
        match self {
            Self::Operation { index, .. } | Self::BackReference { index, .. } => Some(*index),
            Self::Begin(_) | Self::Commit(_) => None,
        }
    }
}

impl Display for BatchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Begin(err) => write!(f, "failed to begin batch: {err}"),
            Self::Operation { index, source } => {
                write!(f, "batch operation {index} failed: {source}")
            }
            Self::BackReference { index, reference } => write!(
                f,
                "batch operation {index} references result {reference}, which is not an earlier insert"
            ),
            Self::Commit(err) => write!(f, "failed to commit batch: {err}"),
        }
    }
}

impl Error for BatchError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Begin(err) | Self::Commit(err) => Some(err),
            Self::Operation { source, .. } => Some(source),
            Self::BackReference { .. } => None,
        }
    }
}
