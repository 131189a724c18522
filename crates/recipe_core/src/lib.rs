//! Local recipe catalog storage core.
//!
//! Exposes recipes, with their ordered ingredients and steps, through a
//! locator-addressed CRUD interface with change notification and atomic
//! batch writes. Presentation layers read through [`RecipeProvider`] and
//! watch [`ChangeNotifier`] to know when to read again.

pub mod batch;
pub mod config;
pub mod dao;
pub mod db;
pub mod error;
pub mod locator;
pub mod logging;
pub mod model;
pub mod notify;
pub mod provider;

pub use batch::{BatchOperation, Entity, OperationResult, RecipeRef};
pub use config::{ConfigError, CoreConfig, DatabaseLocation};
pub use dao::ingredient_dao::{IngredientDao, SqliteIngredientDao};
pub use dao::recipe_dao::{RecipeDao, SqliteRecipeDao};
pub use dao::step_dao::{SqliteStepDao, StepDao};
pub use dao::{DaoError, DaoResult};
pub use db::{Database, DbError, DbResult};
pub use error::{BatchError, Operation, ProviderError, ProviderResult};
pub use locator::{Locator, LocatorMatcher, Target};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::recipe::{Ingredient, Recipe, RecipeId, RowId, Step};
pub use notify::{ChangeNotifier, ObserverScope, SubscriptionId};
pub use provider::{RecipeProvider, RecipeQuery};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Opens the database described by `location`.
pub fn open_database(location: &DatabaseLocation) -> DbResult<Database> {
    match location {
        DatabaseLocation::File(path) => Database::open(path),
        DatabaseLocation::Memory => Database::open_in_memory(),
    }
}
