//! Batch operation model and its in-transaction executor.
//!
//! # Responsibility
//! - Describe heterogeneous writes across recipes, ingredients and steps.
//! - Apply them in order against an already open transaction.
//!
//! # Invariants
//! - Execution stops at the first failing operation; the caller must then
//!   drop the transaction uncommitted.
//! - Unlike collection-level create, every child insert here is strict.
//! - A back-reference may only name an earlier recipe insert.

use crate::dao::ingredient_dao::{IngredientDao, SqliteIngredientDao};
use crate::dao::recipe_dao::{RecipeDao, SqliteRecipeDao};
use crate::dao::step_dao::{SqliteStepDao, StepDao};
use crate::dao::{DaoError, DaoResult};
use crate::error::BatchError;
use crate::locator::{Locator, LocatorMatcher};
use crate::model::recipe::{Ingredient, Recipe, RecipeId, RowId, Step};
use log::debug;
use rusqlite::Connection;

/// Catalog table touched by an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Recipe,
    Ingredient,
    Step,
}

/// Owning recipe of a child insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipeRef {
    /// A recipe that already exists.
    Id(RecipeId),
    /// The recipe created by the operation at this index of the same batch.
    BackReference(usize),
}

/// One write inside a batch.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchOperation {
    /// Inserts the recipe row and every embedded child.
    InsertRecipe(Recipe),
    InsertIngredient {
        recipe: RecipeRef,
        ingredient: Ingredient,
    },
    InsertStep {
        recipe: RecipeRef,
        step: Step,
    },
    UpdateRecipe(Recipe),
    UpdateIngredient(Ingredient),
    UpdateStep(Step),
    DeleteRecipe(RecipeId),
    DeleteIngredient(RowId),
    DeleteStep(RowId),
}

/// Outcome of one applied operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationResult {
    Inserted {
        entity: Entity,
        id: i64,
        /// Item locator, set for recipe inserts.
        locator: Option<Locator>,
    },
    Affected {
        entity: Entity,
        count: usize,
    },
}

impl OperationResult {
    /// Identifier of an inserted row.
    pub fn inserted_id(&self) -> Option<i64> {
        match self {
            Self::Inserted { id, .. } => Some(*id),
            Self::Affected { .. } => None,
        }
    }
}

/// Applies `operations` in order on `conn`, which must be inside a transaction.
pub(crate) fn apply_operations(
    conn: &Connection,
    matcher: &LocatorMatcher,
    operations: &[BatchOperation],
) -> Result<Vec<OperationResult>, BatchError> {
    let mut results: Vec<OperationResult> = Vec::with_capacity(operations.len());

    for (index, operation) in operations.iter().enumerate() {
        let result = apply_one(conn, matcher, operation, index, &results)?;
        debug!("event=batch_apply module=batch status=ok index={index} result={result:?}");
        results.push(result);
    }

    Ok(results)
}

fn apply_one(
    conn: &Connection,
    matcher: &LocatorMatcher,
    operation: &BatchOperation,
    index: usize,
    earlier: &[OperationResult],
) -> Result<OperationResult, BatchError> {
    let failed = |source: DaoError| BatchError::Operation { index, source };

    let result = match operation {
        BatchOperation::InsertRecipe(recipe) => {
            let id = insert_recipe_strict(conn, recipe).map_err(failed)?;
            OperationResult::Inserted {
                entity: Entity::Recipe,
                id,
                locator: Some(matcher.item(id)),
            }
        }
        BatchOperation::InsertIngredient { recipe, ingredient } => {
            let mut ingredient = ingredient.clone();
            ingredient.recipe_id = resolve_recipe(*recipe, index, earlier)?;
            let id = SqliteIngredientDao::new(conn)
                .insert(&ingredient)
                .map_err(failed)?;
            inserted(Entity::Ingredient, id)
        }
        BatchOperation::InsertStep { recipe, step } => {
            let mut step = step.clone();
            step.recipe_id = resolve_recipe(*recipe, index, earlier)?;
            let id = SqliteStepDao::new(conn).insert(&step).map_err(failed)?;
            inserted(Entity::Step, id)
        }
        BatchOperation::UpdateRecipe(recipe) => {
            let count = SqliteRecipeDao::new(conn).update(recipe).map_err(failed)?;
            affected(Entity::Recipe, count)
        }
        BatchOperation::UpdateIngredient(ingredient) => {
            let count = SqliteIngredientDao::new(conn)
                .update(ingredient)
                .map_err(failed)?;
            affected(Entity::Ingredient, count)
        }
        BatchOperation::UpdateStep(step) => {
            let count = SqliteStepDao::new(conn).update(step).map_err(failed)?;
            affected(Entity::Step, count)
        }
        BatchOperation::DeleteRecipe(id) => {
            let count = SqliteRecipeDao::new(conn)
                .delete_by_id(*id)
                .map_err(failed)?;
            affected(Entity::Recipe, count)
        }
        BatchOperation::DeleteIngredient(id) => {
            let count = SqliteIngredientDao::new(conn)
                .delete_by_id(*id)
                .map_err(failed)?;
            affected(Entity::Ingredient, count)
        }
        BatchOperation::DeleteStep(id) => {
            let count = SqliteStepDao::new(conn)
                .delete_by_id(*id)
                .map_err(failed)?;
            affected(Entity::Step, count)
        }
    };

    Ok(result)
}

fn insert_recipe_strict(conn: &Connection, recipe: &Recipe) -> DaoResult<RecipeId> {
    let id = SqliteRecipeDao::new(conn).insert(recipe)?;
    if id <= 0 {
        return Err(DaoError::InvalidData(format!(
            "recipe insert returned invalid id `{id}`"
        )));
    }

    let mut owned = recipe.clone();
    owned.assign_owner(id);
    let ingredients = SqliteIngredientDao::new(conn);
    for ingredient in &owned.ingredients {
        ingredients.insert(ingredient)?;
    }
    let steps = SqliteStepDao::new(conn);
    for step in &owned.steps {
        steps.insert(step)?;
    }

    Ok(id)
}

fn resolve_recipe(
    recipe: RecipeRef,
    index: usize,
    earlier: &[OperationResult],
) -> Result<RecipeId, BatchError> {
    match recipe {
        RecipeRef::Id(id) => Ok(id),
        RecipeRef::BackReference(reference) => match earlier.get(reference) {
            Some(OperationResult::Inserted {
                entity: Entity::Recipe,
                id,
                ..
            }) => Ok(*id),
            _ => Err(BatchError::BackReference { index, reference }),
        },
    }
}

fn inserted(entity: Entity, id: i64) -> OperationResult {
    OperationResult::Inserted {
        entity,
        id,
        locator: None,
    }
}

fn affected(entity: Entity, count: usize) -> OperationResult {
    OperationResult::Affected { entity, count }
}
