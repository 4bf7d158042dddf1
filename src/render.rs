//! Presentation layer: movie cards, keyboards and callback payloads.
//!
//! Everything here is a pure function over a [`Movie`] or a payload string;
//! no storage or network access.

use crate::db::Movie;
use teloxide::types::{
    InlineKeyboardButton, InlineKeyboardMarkup, KeyboardButton, KeyboardMarkup,
};

const FAVORITE_PREFIX: &str = "favorite";

/// Text block rendered under the movie photo.
pub fn movie_caption(movie: &Movie) -> String {
    format!(
        "\
📍Title of movie: {title}
📍Year: {year}
📍Genres: {genre}
📍Rating IMDB: {rating}

🔻🔻🔻🔻🔻🔻🔻🔻🔻🔻🔻
{overview}",
        title = movie.title,
        year = movie.year,
        genre = movie.genre,
        rating = movie.rating,
        overview = movie.overview,
    )
}

/// Inline control attached to every movie card. Its activation payload
/// round-trips through [`parse_favorite_payload`].
pub fn favorite_button(movie_id: i64) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new([[InlineKeyboardButton::callback(
        "Add movie to favorites 🌟",
        favorite_payload(movie_id),
    )]])
}

pub fn favorite_payload(movie_id: i64) -> String {
    format!("{FAVORITE_PREFIX}_{movie_id}")
}

/// Extract the movie id from a button payload. Returns `None` for anything
/// that is not a well-formed `favorite_<id>` string; callers treat that as
/// malformed input, never as a crash.
pub fn parse_favorite_payload(payload: &str) -> Option<i64> {
    let (prefix, id) = payload.split_once('_')?;
    if prefix != FAVORITE_PREFIX {
        return None;
    }
    id.parse().ok()
}

/// Persistent reply keyboard exposing the three primary commands.
pub fn main_keyboard() -> KeyboardMarkup {
    KeyboardMarkup::new([
        [KeyboardButton::new("/random")],
        [KeyboardButton::new("/random_genre")],
        [KeyboardButton::new("/favorites")],
    ])
    .resize_keyboard(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_movie() -> Movie {
        Movie {
            id: 42,
            img: "http://img.example/inception.jpg".into(),
            title: "Inception".into(),
            year: 2010,
            genre: "Action, Sci-Fi".into(),
            rating: 8.8,
            overview: "A thief who steals secrets through dreams.".into(),
        }
    }

    #[test]
    fn caption_contains_all_fields() {
        let caption = movie_caption(&sample_movie());
        assert!(caption.contains("Inception"));
        assert!(caption.contains("2010"));
        assert!(caption.contains("Action, Sci-Fi"));
        assert!(caption.contains("8.8"));
        assert!(caption.contains("🔻"));
        assert!(caption.contains("A thief who steals secrets through dreams."));
    }

    #[test]
    fn favorite_payload_round_trips() {
        assert_eq!(parse_favorite_payload(&favorite_payload(42)), Some(42));
        assert_eq!(parse_favorite_payload("favorite_7"), Some(7));
    }

    #[test]
    fn malformed_payloads_are_rejected() {
        assert_eq!(parse_favorite_payload("favorite42"), None);
        assert_eq!(parse_favorite_payload("favorite_"), None);
        assert_eq!(parse_favorite_payload("favorite_abc"), None);
        assert_eq!(parse_favorite_payload("delete_42"), None);
        assert_eq!(parse_favorite_payload(""), None);
    }

    #[test]
    fn main_keyboard_has_three_command_rows() {
        let keyboard = main_keyboard();
        assert_eq!(keyboard.keyboard.len(), 3);
        assert_eq!(keyboard.keyboard[0][0].text, "/random");
        assert_eq!(keyboard.keyboard[1][0].text, "/random_genre");
        assert_eq!(keyboard.keyboard[2][0].text, "/favorites");
    }
}
