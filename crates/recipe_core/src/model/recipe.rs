//! Recipe aggregate with ordered ingredients and steps.
//!
//! # Invariants
//! - `Ingredient::recipe_id` and `Step::recipe_id` are only meaningful once
//!   the owning recipe has a storage-assigned identifier.
//! - `position` is assigned by storage in insertion order; caller-supplied
//!   values are ignored on insert.

use serde::{Deserialize, Deserializer, Serialize};

/// Storage-assigned recipe identifier.
pub type RecipeId = i64;

/// Storage-assigned identifier of an ingredient or step row.
pub type RowId = i64;

/// Identifier value carried by entities that were never persisted.
pub const UNASSIGNED_ID: i64 = 0;

/// Recipe with its owned child collections.
///
/// The same shape is used as the create payload and as the joined read
/// result; on reads `ingredients` and `steps` are in stored order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    #[serde(default)]
    pub id: RecipeId,
    pub name: String,
    #[serde(default)]
    pub servings: i64,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub ingredients: Vec<Ingredient>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl Recipe {
    /// Creates an empty, not yet persisted recipe.
    pub fn new(name: impl Into<String>, servings: i64) -> Self {
        Self {
            id: UNASSIGNED_ID,
            name: name.into(),
            servings,
            image: String::new(),
            ingredients: Vec::new(),
            steps: Vec::new(),
        }
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = image.into();
        self
    }

    pub fn with_ingredient(mut self, ingredient: Ingredient) -> Self {
        self.ingredients.push(ingredient);
        self
    }

    pub fn with_step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Returns whether storage has assigned this recipe an identifier.
    pub fn is_persisted(&self) -> bool {
        self.id > UNASSIGNED_ID
    }

    /// Stamps every embedded child with `recipe_id`.
    pub fn assign_owner(&mut self, recipe_id: RecipeId) {
        for ingredient in &mut self.ingredients {
            ingredient.recipe_id = recipe_id;
        }
        for step in &mut self.steps {
            step.recipe_id = recipe_id;
        }
    }
}

/// One ingredient line of a recipe.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ingredient {
    #[serde(default)]
    pub id: RowId,
    #[serde(default)]
    pub recipe_id: RecipeId,
    #[serde(default)]
    pub position: i64,
    pub quantity: f64,
    #[serde(default)]
    pub measure: String,
    /// Catalog JSON names this field `ingredient`.
    #[serde(alias = "ingredient")]
    pub name: String,
}

impl Ingredient {
    pub fn new(quantity: f64, measure: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: UNASSIGNED_ID,
            recipe_id: UNASSIGNED_ID,
            position: 0,
            quantity,
            measure: measure.into(),
            name: name.into(),
        }
    }
}

/// One preparation step of a recipe.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    #[serde(default)]
    pub id: RowId,
    #[serde(default)]
    pub recipe_id: RecipeId,
    #[serde(default)]
    pub position: i64,
    #[serde(default)]
    pub short_description: String,
    #[serde(default)]
    pub description: String,
    #[serde(
        rename = "videoURL",
        alias = "videoUrl",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    pub video_url: Option<String>,
    #[serde(
        rename = "thumbnailURL",
        alias = "thumbnailUrl",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    pub thumbnail_url: Option<String>,
}

impl Step {
    pub fn new(short_description: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: UNASSIGNED_ID,
            recipe_id: UNASSIGNED_ID,
            position: 0,
            short_description: short_description.into(),
            description: description.into(),
            video_url: None,
            thumbnail_url: None,
        }
    }

    pub fn with_video(mut self, video_url: impl Into<String>) -> Self {
        self.video_url = Some(video_url.into());
        self
    }

    pub fn with_thumbnail(mut self, thumbnail_url: impl Into<String>) -> Self {
        self.thumbnail_url = Some(thumbnail_url.into());
        self
    }
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|text| !text.trim().is_empty()))
}
