//! Data access objects, one per catalog table.
//!
//! # Responsibility
//! - Provide typed insert/select/update/delete over `recipes`, `ingredients`
//!   and `steps`.
//! - Keep SQL details inside the persistence boundary.
//!
//! # Invariants
//! - DAOs borrow a connection and never open transactions of their own;
//!   multi-row writes use savepoints so they nest inside a caller's batch.
//! - `insert_all` reports constraint rejections per row as `None` and keeps
//!   going; any other SQLite failure aborts the whole call.

use crate::db::DbError;
use rusqlite::ErrorCode;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod ingredient_dao;
pub mod recipe_dao;
pub mod step_dao;

pub type DaoResult<T> = Result<T, DaoError>;

/// Persistence error for catalog DAO operations.
#[derive(Debug)]
pub enum DaoError {
    Db(DbError),
    InvalidData(String),
}

impl DaoError {
    /// Returns whether SQLite rejected the write because of a constraint
    /// (foreign key, `CHECK`, `NOT NULL`, uniqueness).
    pub fn is_constraint_violation(&self) -> bool {
        match self {
            Self::Db(DbError::Sqlite(err)) => is_constraint_violation(err),
            _ => false,
        }
    }
}

impl Display for DaoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted catalog data: {message}"),
        }
    }
}

impl Error for DaoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for DaoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for DaoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

pub(crate) fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(failure, _) if failure.code == ErrorCode::ConstraintViolation
    )
}

/// Maps one row insert outcome into the per-row `insert_all` contract.
pub(crate) fn row_outcome(result: rusqlite::Result<i64>) -> DaoResult<Option<i64>> {
    match result {
        Ok(id) if id > 0 => Ok(Some(id)),
        Ok(_) => Ok(None),
        Err(err) if is_constraint_violation(&err) => Ok(None),
        Err(err) => Err(err.into()),
    }
}
