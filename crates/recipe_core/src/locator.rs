//! Resource locators and their structural classification.
//!
//! # Responsibility
//! - Build collection and item locators for one authority.
//! - Classify raw locator strings into [`Target`] without touching storage.
//!
//! # Invariants
//! - Only `content://{authority}/recipes` and
//!   `content://{authority}/recipes/{digits}` are recognized.
//! - Classification is pure: same input, same output.

use crate::config::ConfigError;
use crate::error::{ProviderError, ProviderResult};
use crate::model::recipe::RecipeId;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt::{Display, Formatter};

pub const SCHEME: &str = "content";
pub const RECIPES_PATH: &str = "recipes";

static LOCATOR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^content://([^/]+)/recipes(?:/([0-9]+))?/?$").expect("valid locator regex")
});
static AUTHORITY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]*$").expect("valid authority regex")
});

/// Logical target addressed by a locator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    /// The whole recipe collection.
    Collection,
    /// One recipe by identifier.
    Item(RecipeId),
}

/// Opaque address of the recipe collection or one recipe.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Locator(String);

impl Locator {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Collection locator for `authority`.
    pub fn collection(authority: &str) -> Self {
        Self(format!("{SCHEME}://{authority}/{RECIPES_PATH}"))
    }

    /// Item locator for `id` under `authority`.
    pub fn item(authority: &str, id: RecipeId) -> Self {
        Self::collection(authority).with_appended_id(id)
    }

    /// Appends `/{id}` to this locator.
    pub fn with_appended_id(&self, id: RecipeId) -> Self {
        Self(format!("{}/{id}", self.0.trim_end_matches('/')))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Path segments with empty segments dropped, so `a/b/` equals `a/b`.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|segment| !segment.is_empty())
    }

    /// Returns whether `other` lies strictly below this locator.
    pub fn is_ancestor_of(&self, other: &Locator) -> bool {
        let mine: Vec<&str> = self.segments().collect();
        let theirs: Vec<&str> = other.segments().collect();
        theirs.len() > mine.len() && theirs.starts_with(&mine)
    }

    /// Returns whether `other` lies exactly one segment below this locator.
    pub fn is_parent_of(&self, other: &Locator) -> bool {
        let mine: Vec<&str> = self.segments().collect();
        let theirs: Vec<&str> = other.segments().collect();
        theirs.len() == mine.len() + 1 && theirs.starts_with(&mine)
    }

    /// Segment-wise equality, ignoring trailing slashes.
    pub fn same_as(&self, other: &Locator) -> bool {
        self.segments().eq(other.segments())
    }
}

impl Display for Locator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Locator {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Locator {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Structural matcher for locators of one authority.
#[derive(Debug, Clone)]
pub struct LocatorMatcher {
    authority: String,
}

impl LocatorMatcher {
    /// Creates a matcher after validating `authority`.
    pub fn new(authority: &str) -> Result<Self, ConfigError> {
        validate_authority(authority)?;
        Ok(Self {
            authority: authority.to_string(),
        })
    }

    pub fn authority(&self) -> &str {
        self.authority.as_str()
    }

    pub fn collection(&self) -> Locator {
        Locator::collection(&self.authority)
    }

    pub fn item(&self, id: RecipeId) -> Locator {
        Locator::item(&self.authority, id)
    }

    /// Classifies `locator` into a [`Target`].
    ///
    /// # Errors
    /// - `InvalidLocator` for a foreign scheme or authority, extra path
    ///   segments, a non-digit id or an id that does not fit `i64`.
    pub fn classify(&self, locator: &str) -> ProviderResult<Target> {
        let invalid = || ProviderError::InvalidLocator(locator.to_string());
        let caps = LOCATOR_RE.captures(locator).ok_or_else(invalid)?;

        if caps.get(1).map(|m| m.as_str()) != Some(self.authority.as_str()) {
            return Err(invalid());
        }

        match caps.get(2) {
            None => Ok(Target::Collection),
            Some(digits) => digits
                .as_str()
                .parse::<RecipeId>()
                .map(Target::Item)
                .map_err(|_| invalid()),
        }
    }
}

/// Checks that `authority` is a non-empty host-like name.
pub fn validate_authority(authority: &str) -> Result<(), ConfigError> {
    if AUTHORITY_RE.is_match(authority) {
        Ok(())
    } else {
        Err(ConfigError::InvalidAuthority(authority.to_string()))
    }
}
