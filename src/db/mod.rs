//! Database module: entity models and SQL repositories.
//!
//! This module is split into two submodules:
//! - `model`: typed domain entities returned by repositories.
//! - `repo`: SQL-only functions that map rows into entities.
//!
//! External modules should import from `tg_moviebot::db` — we re-export the
//! repository API and the models for convenience.

pub mod model;
pub mod repo;

pub use model::{FavoriteOutcome, Movie};
pub use repo::*;
