//! Ingredient DAO contracts and SQLite implementation.
//!
//! # Invariants
//! - `position` is assigned as `MAX(position) + 1` within the owning recipe.
//! - Reads are ordered by `position ASC, id ASC`.

use crate::dao::{row_outcome, DaoResult};
use crate::db::with_savepoint;
use crate::model::recipe::{Ingredient, RecipeId, RowId};
use rusqlite::{params, Connection, Row};
use std::collections::BTreeMap;

const INGREDIENT_SELECT_SQL: &str = "SELECT
    id,
    recipe_id,
    position,
    quantity,
    measure,
    name
FROM ingredients";

const INGREDIENT_INSERT_SQL: &str = "INSERT INTO ingredients (
    recipe_id,
    position,
    quantity,
    measure,
    name
) VALUES (
    ?1,
    (SELECT COALESCE(MAX(position), -1) + 1 FROM ingredients WHERE recipe_id = ?1),
    ?2,
    ?3,
    ?4
);";

/// Data access contract for the `ingredients` table.
pub trait IngredientDao {
    /// Inserts one ingredient and returns its new row id.
    fn insert(&self, ingredient: &Ingredient) -> DaoResult<RowId>;
    /// Inserts all rows in order; one entry per input, `None` when rejected.
    fn insert_all(&self, ingredients: &[Ingredient]) -> DaoResult<Vec<Option<RowId>>>;
    /// Lists ingredients of one recipe in stored order.
    fn select_by_recipe(&self, recipe_id: RecipeId) -> DaoResult<Vec<Ingredient>>;
    /// Lists every ingredient grouped by owning recipe.
    fn select_grouped(&self) -> DaoResult<BTreeMap<RecipeId, Vec<Ingredient>>>;
    /// Rewrites quantity, measure and name of an existing row.
    fn update(&self, ingredient: &Ingredient) -> DaoResult<usize>;
    fn delete_by_id(&self, id: RowId) -> DaoResult<usize>;
}

/// SQLite-backed ingredient DAO.
pub struct SqliteIngredientDao<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteIngredientDao<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn insert_row(&self, ingredient: &Ingredient) -> rusqlite::Result<RowId> {
        self.conn.execute(
            INGREDIENT_INSERT_SQL,
            params![
                ingredient.recipe_id,
                ingredient.quantity,
                ingredient.measure.as_str(),
                ingredient.name.as_str(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }
}

impl IngredientDao for SqliteIngredientDao<'_> {
    fn insert(&self, ingredient: &Ingredient) -> DaoResult<RowId> {
        Ok(self.insert_row(ingredient)?)
    }

    fn insert_all(&self, ingredients: &[Ingredient]) -> DaoResult<Vec<Option<RowId>>> {
        with_savepoint(self.conn, "ingredients_insert_all", |_| {
            ingredients
                .iter()
                .map(|ingredient| row_outcome(self.insert_row(ingredient)))
                .collect()
        })
    }

    fn select_by_recipe(&self, recipe_id: RecipeId) -> DaoResult<Vec<Ingredient>> {
        let mut stmt = self.conn.prepare(&format!(
            "{INGREDIENT_SELECT_SQL}
             WHERE recipe_id = ?1
             ORDER BY position ASC, id ASC;"
        ))?;
        let mut rows = stmt.query([recipe_id])?;
        let mut ingredients = Vec::new();
        while let Some(row) = rows.next()? {
            ingredients.push(parse_ingredient_row(row)?);
        }
        Ok(ingredients)
    }

    fn select_grouped(&self) -> DaoResult<BTreeMap<RecipeId, Vec<Ingredient>>> {
        let mut stmt = self.conn.prepare(&format!(
            "{INGREDIENT_SELECT_SQL} ORDER BY recipe_id ASC, position ASC, id ASC;"
        ))?;
        let mut rows = stmt.query([])?;
        let mut grouped: BTreeMap<RecipeId, Vec<Ingredient>> = BTreeMap::new();
        while let Some(row) = rows.next()? {
            let ingredient = parse_ingredient_row(row)?;
            grouped
                .entry(ingredient.recipe_id)
                .or_default()
                .push(ingredient);
        }
        Ok(grouped)
    }

    fn update(&self, ingredient: &Ingredient) -> DaoResult<usize> {
        let changed = self.conn.execute(
            "UPDATE ingredients
             SET
                quantity = ?2,
                measure = ?3,
                name = ?4
             WHERE id = ?1;",
            params![
                ingredient.id,
                ingredient.quantity,
                ingredient.measure.as_str(),
                ingredient.name.as_str(),
            ],
        )?;
        Ok(changed)
    }

    fn delete_by_id(&self, id: RowId) -> DaoResult<usize> {
        Ok(self
            .conn
            .execute("DELETE FROM ingredients WHERE id = ?1;", [id])?)
    }
}

fn parse_ingredient_row(row: &Row<'_>) -> DaoResult<Ingredient> {
    Ok(Ingredient {
        id: row.get("id")?,
        recipe_id: row.get("recipe_id")?,
        position: row.get("position")?,
        quantity: row.get("quantity")?,
        measure: row.get("measure")?,
        name: row.get("name")?,
    })
}
