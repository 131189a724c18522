//! Domain model for the recipe catalog.
//!
//! # Responsibility
//! - Define the recipe aggregate and its ordered child entities.
//! - Keep one shape for write payloads and joined read results.
//!
//! # Invariants
//! - Identifiers are assigned by storage; `0` means "not inserted yet".
//! - Children are meaningless without an owning recipe.

pub mod recipe;
