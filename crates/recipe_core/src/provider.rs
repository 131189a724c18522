//! Locator-addressed CRUD entry point for the recipe catalog.
//!
//! # Responsibility
//! - Classify each incoming locator and check it against the verb.
//! - Fan a recipe create out into recipe, ingredient and step writes.
//! - Run batches inside one exclusive transaction.
//! - Publish change notifications after successful writes.
//!
//! # Invariants
//! - Locator classification happens before any storage access, so a
//!   rejected call never mutates storage or notifies observers.
//! - Children are written only after the parent has a positive id.
//! - Child rows rejected during create/bulk-create are logged, not raised.
//! - Notifications are published after the connection lock is released, on
//!   canonical locators built from the classified target.
//! - Bulk-create notifies whenever a recipe row was written, even when the
//!   call itself returns an error.

use crate::batch::{apply_operations, BatchOperation, OperationResult};
use crate::config::ConfigError;
use crate::dao::ingredient_dao::{IngredientDao, SqliteIngredientDao};
use crate::dao::recipe_dao::{RecipeDao, SqliteRecipeDao};
use crate::dao::step_dao::{SqliteStepDao, StepDao};
use crate::dao::{DaoError, DaoResult};
use crate::db::{with_savepoint, Database};
use crate::error::{BatchError, Operation, ProviderError, ProviderResult};
use crate::locator::{Locator, LocatorMatcher, Target};
use crate::model::recipe::{Recipe, RecipeId};
use crate::notify::ChangeNotifier;
use log::{debug, info, warn};
use rusqlite::{Connection, TransactionBehavior};
use std::sync::Arc;
use std::time::Instant;

/// Result of a read: joined recipes plus the locator to watch for changes.
#[derive(Debug, Clone, PartialEq)]
pub struct RecipeQuery {
    /// Locator the read was issued against; pass it to
    /// [`ChangeNotifier::subscribe`] to learn when to read again.
    pub notification_locator: Locator,
    pub target: Target,
    /// Zero or more recipes for a collection read, at most one for an item.
    pub recipes: Vec<Recipe>,
}

impl RecipeQuery {
    pub fn is_empty(&self) -> bool {
        self.recipes.is_empty()
    }

    /// Consumes the result, returning the single recipe of an item read.
    pub fn into_single(self) -> Option<Recipe> {
        self.recipes.into_iter().next()
    }
}

/// Per-call counts of child rows storage rejected during fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct FanOutReport {
    ingredients_failed: usize,
    steps_failed: usize,
}

/// Locator router over an injected storage handle and notifier.
pub struct RecipeProvider {
    db: Arc<Database>,
    notifier: Arc<ChangeNotifier>,
    matcher: LocatorMatcher,
}

impl RecipeProvider {
    pub fn new(
        db: Arc<Database>,
        notifier: Arc<ChangeNotifier>,
        authority: &str,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            db,
            notifier,
            matcher: LocatorMatcher::new(authority)?,
        })
    }

    pub fn authority(&self) -> &str {
        self.matcher.authority()
    }

    /// Locator of the whole recipe collection.
    pub fn collection_locator(&self) -> Locator {
        self.matcher.collection()
    }

    /// Locator of one recipe.
    pub fn item_locator(&self, id: RecipeId) -> Locator {
        self.matcher.item(id)
    }

    pub fn notifier(&self) -> &Arc<ChangeNotifier> {
        &self.notifier
    }

    /// Reads recipes with children joined.
    ///
    /// An item read for a missing id returns an empty result, not an error.
    pub fn query(&self, locator: impl AsRef<str>) -> ProviderResult<RecipeQuery> {
        let locator = locator.as_ref();
        let target = self.matcher.classify(locator)?;
        let notification_locator = self.canonical(target);

        let recipes = {
            let conn = self.db.lock()?;
            let dao = SqliteRecipeDao::new(&conn);
            match target {
                Target::Collection => dao.select_all_with_children()?,
                Target::Item(id) => dao.select_by_id_with_children(id)?.into_iter().collect(),
            }
        };

        debug!(
            "event=query module=provider status=ok locator={locator} rows={}",
            recipes.len()
        );
        Ok(RecipeQuery {
            notification_locator,
            target,
            recipes,
        })
    }

    /// MIME-style type of the data a locator addresses.
    pub fn content_type(&self, locator: impl AsRef<str>) -> ProviderResult<String> {
        let authority = self.matcher.authority();
        match self.matcher.classify(locator.as_ref())? {
            Target::Collection => Ok(format!("vnd.recipe.dir/{authority}.recipes")),
            Target::Item(_) => Ok(format!("vnd.recipe.item/{authority}.recipes")),
        }
    }

    /// Creates one recipe with its embedded ingredients and steps.
    ///
    /// Returns the item locator of the new recipe.
    ///
    /// # Errors
    /// - `UnsupportedTarget` for an item locator.
    /// - `StorageWriteFailed` when the recipe row is rejected; no child row
    ///   is written in that case.
    pub fn insert(&self, locator: impl AsRef<str>, recipe: &Recipe) -> ProviderResult<Locator> {
        let locator = locator.as_ref();
        match self.matcher.classify(locator)? {
            Target::Item(_) => Err(ProviderError::UnsupportedTarget {
                operation: Operation::Create,
                locator: locator.to_string(),
                reason: "cannot create with an explicit id",
            }),
            Target::Collection => {
                let started_at = Instant::now();
                let (id, report) = {
                    let conn = self.db.lock()?;
                    with_savepoint(&conn, "recipe_create", |conn| {
                        create_recipe(conn, recipe, locator)
                    })?
                };

                self.notifier.notify_change(&self.matcher.collection());
                info!(
                    "event=recipe_create module=provider status=ok recipe_id={id} ingredients={} steps={} ingredients_failed={} steps_failed={} duration_ms={}",
                    recipe.ingredients.len(),
                    recipe.steps.len(),
                    report.ingredients_failed,
                    report.steps_failed,
                    started_at.elapsed().as_millis()
                );
                Ok(self.matcher.item(id))
            }
        }
    }

    /// Creates many recipes; returns how many recipe rows were created.
    ///
    /// Recipe rows go in as one multi-row write. Children of a recipe whose
    /// own row was rejected are skipped, and a recipe whose child fan-out
    /// fails is logged while the remaining recipes proceed. No transaction
    /// spans the call.
    pub fn bulk_insert(
        &self,
        locator: impl AsRef<str>,
        recipes: &[Recipe],
    ) -> ProviderResult<usize> {
        let locator = locator.as_ref();
        match self.matcher.classify(locator)? {
            Target::Item(_) => Err(ProviderError::UnsupportedTarget {
                operation: Operation::BulkCreate,
                locator: locator.to_string(),
                reason: "cannot create with an explicit id",
            }),
            Target::Collection => {
                let outcome = {
                    let conn = self.db.lock()?;
                    bulk_create_recipes(&conn, recipes, locator)
                };
                let report = match outcome {
                    Ok(report) => report,
                    Err(err) => {
                        warn!(
                            "event=recipe_bulk_create module=provider status=error requested={} error={err}",
                            recipes.len()
                        );
                        return Err(err);
                    }
                };

                if report.created > 0 {
                    self.notifier.notify_change(&self.matcher.collection());
                }
                info!(
                    "event=recipe_bulk_create module=provider status=ok requested={} created={} fan_out_failed={}",
                    recipes.len(),
                    report.created,
                    report.fan_out_failed
                );
                Ok(report.created)
            }
        }
    }

    /// Deletes one recipe and its children; returns rows removed (0 or 1).
    pub fn delete(&self, locator: impl AsRef<str>) -> ProviderResult<usize> {
        let locator = locator.as_ref();
        match self.matcher.classify(locator)? {
            Target::Collection => Err(ProviderError::UnsupportedTarget {
                operation: Operation::Delete,
                locator: locator.to_string(),
                reason: "cannot delete without an id",
            }),
            Target::Item(id) => {
                let count = {
                    let conn = self.db.lock()?;
                    SqliteRecipeDao::new(&conn).delete_by_id(id)?
                };

                self.notifier.notify_change(&self.matcher.item(id));
                info!("event=recipe_delete module=provider status=ok recipe_id={id} count={count}");
                Ok(count)
            }
        }
    }

    /// Update-in-place is not available through locators on either target.
    pub fn update(&self, locator: impl AsRef<str>, _recipe: &Recipe) -> ProviderResult<usize> {
        let locator = locator.as_ref();
        match self.matcher.classify(locator)? {
            Target::Collection | Target::Item(_) => Err(ProviderError::NotImplemented {
                operation: Operation::Update,
                locator: locator.to_string(),
            }),
        }
    }

    /// Applies `operations` as one all-or-nothing unit.
    ///
    /// The batch holds the connection lock and an IMMEDIATE transaction for
    /// its whole duration. On any failure nothing is committed and the
    /// error names the failing operation.
    pub fn apply_batch(
        &self,
        operations: &[BatchOperation],
    ) -> Result<Vec<OperationResult>, BatchError> {
        let started_at = Instant::now();
        let results = {
            let mut conn = self
                .db
                .lock()
                .map_err(|err| BatchError::Begin(DaoError::from(err)))?;
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(|err| BatchError::Begin(DaoError::from(err)))?;

            let results = match apply_operations(&tx, &self.matcher, operations) {
                Ok(results) => results,
                Err(err) => {
                    warn!(
                        "event=batch module=provider status=rolled_back operations={} failed_index={:?} error={err}",
                        operations.len(),
                        err.failed_index()
                    );
                    return Err(err);
                }
            };
            tx.commit()
                .map_err(|err| BatchError::Commit(DaoError::from(err)))?;
            results
        };

        self.notifier.notify_change(&self.matcher.collection());
        info!(
            "event=batch module=provider status=committed operations={} duration_ms={}",
            operations.len(),
            started_at.elapsed().as_millis()
        );
        Ok(results)
    }
}

impl RecipeProvider {
    fn canonical(&self, target: Target) -> Locator {
        match target {
            Target::Collection => self.matcher.collection(),
            Target::Item(id) => self.matcher.item(id),
        }
    }
}

fn create_recipe(
    conn: &Connection,
    recipe: &Recipe,
    locator: &str,
) -> ProviderResult<(RecipeId, FanOutReport)> {
    let id = SqliteRecipeDao::new(conn)
        .insert(recipe)
        .map_err(|err| write_failed(locator, Some(err)))?;
    if id <= 0 {
        return Err(write_failed(locator, None));
    }

    let report = fan_out_children(conn, recipe, id)?;
    Ok((id, report))
}

/// Per-call outcome of a bulk create.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct BulkReport {
    created: usize,
    fan_out_failed: usize,
}

/// Writes recipe rows atomically, then fans out children per recipe.
///
/// Fails only when the recipe rows themselves could not be written, in
/// which case nothing was kept.
fn bulk_create_recipes(
    conn: &Connection,
    recipes: &[Recipe],
    locator: &str,
) -> ProviderResult<BulkReport> {
    let ids = SqliteRecipeDao::new(conn)
        .insert_all(recipes)
        .map_err(|err| write_failed(locator, Some(err)))?;

    let mut report = BulkReport::default();
    for (index, (recipe, id)) in recipes.iter().zip(ids).enumerate() {
        let Some(id) = id else {
            warn!(
                "event=recipe_bulk_create module=provider status=skipped index={index} reason=parent_insert_failed"
            );
            continue;
        };
        report.created += 1;
        if let Err(err) = fan_out_children(conn, recipe, id) {
            report.fan_out_failed += 1;
            warn!(
                "event=recipe_bulk_create module=provider status=partial index={index} recipe_id={id} reason=fan_out_failed error={err}"
            );
        }
    }

    Ok(report)
}

/// Writes the children of `recipe` under `recipe_id`, best effort per row.
fn fan_out_children(
    conn: &Connection,
    recipe: &Recipe,
    recipe_id: RecipeId,
) -> DaoResult<FanOutReport> {
    let mut owned = recipe.clone();
    owned.assign_owner(recipe_id);

    let ingredient_ids = SqliteIngredientDao::new(conn).insert_all(&owned.ingredients)?;
    let step_ids = SqliteStepDao::new(conn).insert_all(&owned.steps)?;

    Ok(FanOutReport {
        ingredients_failed: log_rejected_rows("ingredient", recipe_id, &ingredient_ids),
        steps_failed: log_rejected_rows("step", recipe_id, &step_ids),
    })
}

fn log_rejected_rows(entity: &str, recipe_id: RecipeId, ids: &[Option<i64>]) -> usize {
    let mut failed = 0;
    for (index, id) in ids.iter().enumerate() {
        match id {
            Some(id) => {
                debug!("event=child_insert module=provider status=ok entity={entity} recipe_id={recipe_id} index={index} id={id}");
            }
            None => {
                failed += 1;
                warn!("event=child_insert module=provider status=error entity={entity} recipe_id={recipe_id} index={index}");
            }
        }
    }
    failed
}

fn write_failed(locator: &str, source: Option<DaoError>) -> ProviderError {
    ProviderError::StorageWriteFailed {
        locator: locator.to_string(),
        source,
    }
}
