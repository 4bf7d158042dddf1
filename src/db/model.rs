//! Database entity models used by repositories.
//!
//! Keep these structs focused on the data returned by queries. Business logic
//! should live in higher layers.

use serde::{Deserialize, Serialize};

/// A single catalogue entry. The catalogue is seeded out of band; the bot
/// never writes to it.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Movie {
    pub id: i64,
    /// Image reference (URL or path) shown as the card photo.
    pub img: String,
    pub title: String,
    pub year: i64,
    /// Free text, may hold several comma-separated genres.
    pub genre: String,
    pub rating: f64,
    pub overview: String,
}

/// Result of an attempt to bookmark a movie. `AlreadyExists` is a normal
/// outcome, not an error: the row set is unchanged and the caller surfaces
/// a non-blocking alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FavoriteOutcome {
    Added,
    AlreadyExists,
}
