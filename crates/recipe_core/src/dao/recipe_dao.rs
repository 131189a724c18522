//! Recipe DAO contracts and SQLite implementation.
//!
//! # Responsibility
//! - CRUD over the `recipes` table.
//! - Composite "with children" reads joining ingredients and steps.
//!
//! # Invariants
//! - Inserts never bind a caller-supplied id; storage assigns it.
//! - Deletes cascade to child rows through foreign keys.
//! - Recipes are listed by `id ASC`.

use crate::dao::ingredient_dao::{IngredientDao, SqliteIngredientDao};
use crate::dao::step_dao::{SqliteStepDao, StepDao};
use crate::dao::{row_outcome, DaoError, DaoResult};
use crate::db::with_savepoint;
use crate::model::recipe::{Recipe, RecipeId};
use rusqlite::{params, Connection, Row};

const RECIPE_SELECT_SQL: &str = "SELECT
    id,
    name,
    servings,
    image
FROM recipes";

/// Data access contract for the `recipes` table.
pub trait RecipeDao {
    /// Inserts the recipe row only; embedded children are ignored.
    fn insert(&self, recipe: &Recipe) -> DaoResult<RecipeId>;
    /// Inserts recipe rows in order; one entry per input, `None` when rejected.
    fn insert_all(&self, recipes: &[Recipe]) -> DaoResult<Vec<Option<RecipeId>>>;
    /// Lists recipe rows without children.
    fn select_all(&self) -> DaoResult<Vec<Recipe>>;
    fn select_by_id(&self, id: RecipeId) -> DaoResult<Option<Recipe>>;
    /// Lists every recipe with its ordered ingredients and steps.
    fn select_all_with_children(&self) -> DaoResult<Vec<Recipe>>;
    /// Loads one recipe with its ordered ingredients and steps.
    fn select_by_id_with_children(&self, id: RecipeId) -> DaoResult<Option<Recipe>>;
    /// Rewrites name, servings and image of an existing row.
    fn update(&self, recipe: &Recipe) -> DaoResult<usize>;
    /// Deletes one recipe and, by cascade, its children.
    fn delete_by_id(&self, id: RecipeId) -> DaoResult<usize>;
}

/// SQLite-backed recipe DAO.
pub struct SqliteRecipeDao<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteRecipeDao<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn insert_row(&self, recipe: &Recipe) -> rusqlite::Result<RecipeId> {
        self.conn.execute(
            "INSERT INTO recipes (
                name,
                servings,
                image
            ) VALUES (?1, ?2, ?3);",
            params![recipe.name.as_str(), recipe.servings, recipe.image.as_str()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }
}

impl RecipeDao for SqliteRecipeDao<'_> {
    fn insert(&self, recipe: &Recipe) -> DaoResult<RecipeId> {
        Ok(self.insert_row(recipe)?)
    }

    fn insert_all(&self, recipes: &[Recipe]) -> DaoResult<Vec<Option<RecipeId>>> {
        with_savepoint(self.conn, "recipes_insert_all", |_| {
            recipes
                .iter()
                .map(|recipe| row_outcome(self.insert_row(recipe)))
                .collect()
        })
    }

    fn select_all(&self) -> DaoResult<Vec<Recipe>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{RECIPE_SELECT_SQL} ORDER BY id ASC;"))?;
        let mut rows = stmt.query([])?;
        let mut recipes = Vec::new();
        while let Some(row) = rows.next()? {
            recipes.push(parse_recipe_row(row)?);
        }
        Ok(recipes)
    }

    fn select_by_id(&self, id: RecipeId) -> DaoResult<Option<Recipe>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{RECIPE_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_recipe_row(row)?));
        }
        Ok(None)
    }

    fn select_all_with_children(&self) -> DaoResult<Vec<Recipe>> {
        let mut recipes = self.select_all()?;
        let mut ingredients = SqliteIngredientDao::new(self.conn).select_grouped()?;
        let mut steps = SqliteStepDao::new(self.conn).select_grouped()?;

        for recipe in &mut recipes {
            recipe.ingredients = ingredients.remove(&recipe.id).unwrap_or_default();
            recipe.steps = steps.remove(&recipe.id).unwrap_or_default();
        }

        Ok(recipes)
    }

    fn select_by_id_with_children(&self, id: RecipeId) -> DaoResult<Option<Recipe>> {
        let Some(mut recipe) = self.select_by_id(id)? else {
            return Ok(None);
        };
        recipe.ingredients = SqliteIngredientDao::new(self.conn).select_by_recipe(id)?;
        recipe.steps = SqliteStepDao::new(self.conn).select_by_recipe(id)?;
        Ok(Some(recipe))
    }

    fn update(&self, recipe: &Recipe) -> DaoResult<usize> {
        let changed = self.conn.execute(
            "UPDATE recipes
             SET
                name = ?2,
                servings = ?3,
                image = ?4
             WHERE id = ?1;",
            params![
                recipe.id,
                recipe.name.as_str(),
                recipe.servings,
                recipe.image.as_str(),
            ],
        )?;
        Ok(changed)
    }

    fn delete_by_id(&self, id: RecipeId) -> DaoResult<usize> {
        Ok(self.conn.execute("DELETE FROM recipes WHERE id = ?1;", [id])?)
    }
}

fn parse_recipe_row(row: &Row<'_>) -> DaoResult<Recipe> {
    let id: RecipeId = row.get("id")?;
    if id <= 0 {
        return Err(DaoError::InvalidData(format!(
            "invalid id value `{id}` in recipes.id"
        )));
    }

    Ok(Recipe {
        id,
        name: row.get("name")?,
        servings: row.get("servings")?,
        image: row.get("image")?,
        ingredients: Vec::new(),
        steps: Vec::new(),
    })
}
