//! Step DAO contracts and SQLite implementation.
//!
//! # Invariants
//! - `position` is the step ordinal, assigned in insertion order per recipe.
//! - Reads are ordered by `position ASC, id ASC`.

use crate::dao::{row_outcome, DaoResult};
use crate::db::with_savepoint;
use crate::model::recipe::{RecipeId, RowId, Step};
use rusqlite::{params, Connection, Row};
use std::collections::BTreeMap;

const STEP_SELECT_SQL: &str = "SELECT
    id,
    recipe_id,
    position,
    short_description,
    description,
    video_url,
    thumbnail_url
FROM steps";

const STEP_INSERT_SQL: &str = "INSERT INTO steps (
    recipe_id,
    position,
    short_description,
    description,
    video_url,
    thumbnail_url
) VALUES (
    ?1,
    (SELECT COALESCE(MAX(position), -1) + 1 FROM steps WHERE recipe_id = ?1),
    ?2,
    ?3,
    ?4,
    ?5
);";

/// Data access contract for the `steps` table.
pub trait StepDao {
    fn insert(&self, step: &Step) -> DaoResult<RowId>;
    /// Inserts all rows in order; one entry per input, `None` when rejected.
    fn insert_all(&self, steps: &[Step]) -> DaoResult<Vec<Option<RowId>>>;
    fn select_by_recipe(&self, recipe_id: RecipeId) -> DaoResult<Vec<Step>>;
    fn select_grouped(&self) -> DaoResult<BTreeMap<RecipeId, Vec<Step>>>;
    /// Rewrites descriptions and media references of an existing row.
    fn update(&self, step: &Step) -> DaoResult<usize>;
    fn delete_by_id(&self, id: RowId) -> DaoResult<usize>;
}

/// SQLite-backed step DAO.
pub struct SqliteStepDao<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteStepDao<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn insert_row(&self, step: &Step) -> rusqlite::Result<RowId> {
        self.conn.execute(
            STEP_INSERT_SQL,
            params![
                step.recipe_id,
                step.short_description.as_str(),
                step.description.as_str(),
                step.video_url.as_deref(),
                step.thumbnail_url.as_deref(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }
}

impl StepDao for SqliteStepDao<'_> {
    fn insert(&self, step: &Step) -> DaoResult<RowId> {
        Ok(self.insert_row(step)?)
    }

    fn insert_all(&self, steps: &[Step]) -> DaoResult<Vec<Option<RowId>>> {
        with_savepoint(self.conn, "steps_insert_all", |_| {
            steps
                .iter()
                .map(|step| row_outcome(self.insert_row(step)))
                .collect()
        })
    }

    fn select_by_recipe(&self, recipe_id: RecipeId) -> DaoResult<Vec<Step>> {
        let mut stmt = self.conn.prepare(&format!(
            "{STEP_SELECT_SQL}
             WHERE recipe_id = ?1
             ORDER BY position ASC, id ASC;"
        ))?;
        let mut rows = stmt.query([recipe_id])?;
        let mut steps = Vec::new();
        while let Some(row) = rows.next()? {
            steps.push(parse_step_row(row)?);
        }
        Ok(steps)
    }

    fn select_grouped(&self) -> DaoResult<BTreeMap<RecipeId, Vec<Step>>> {
        let mut stmt = self.conn.prepare(&format!(
            "{STEP_SELECT_SQL} ORDER BY recipe_id ASC, position ASC, id ASC;"
        ))?;
        let mut rows = stmt.query([])?;
        let mut grouped: BTreeMap<RecipeId, Vec<Step>> = BTreeMap::new();
        while let Some(row) = rows.next()? {
            let step = parse_step_row(row)?;
            grouped.entry(step.recipe_id).or_default().push(step);
        }
        Ok(grouped)
    }

    fn update(&self, step: &Step) -> DaoResult<usize> {
        let changed = self.conn.execute(
            "UPDATE steps
             SET
                short_description = ?2,
                description = ?3,
                video_url = ?4,
                thumbnail_url = ?5
             WHERE id = ?1;",
            params![
                step.id,
                step.short_description.as_str(),
                step.description.as_str(),
                step.video_url.as_deref(),
                step.thumbnail_url.as_deref(),
            ],
        )?;
        Ok(changed)
    }

    fn delete_by_id(&self, id: RowId) -> DaoResult<usize> {
        Ok(self.conn.execute("DELETE FROM steps WHERE id = ?1;", [id])?)
    }
}

fn parse_step_row(row: &Row<'_>) -> DaoResult<Step> {
    Ok(Step {
        id: row.get("id")?,
        recipe_id: row.get("recipe_id")?,
        position: row.get("position")?,
        short_description: row.get("short_description")?,
        description: row.get("description")?,
        video_url: row.get("video_url")?,
        thumbnail_url: row.get("thumbnail_url")?,
    })
}
