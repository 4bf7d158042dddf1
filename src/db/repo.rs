use super::model::{FavoriteOutcome, Movie};
use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::time::Duration;
use tracing::instrument;

pub type Pool = SqlitePool;

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

pub async fn init_pool(database_url: &str) -> Result<Pool> {
    let normalized = prepare_sqlite_url(database_url);
    let options = SqliteConnectOptions::from_str(&normalized)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        // Per-connection pragma; favorites.movie_id references movies(id).
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .connect_with(options)
        .await?;
    Ok(pool)
}

/// If using a file-backed SQLite URL, expand a leading `~/` and ensure the parent
/// directory exists. Leaves in-memory URLs untouched. Returns possibly-updated URL.
fn prepare_sqlite_url(url: &str) -> String {
    // Pass through non-sqlite schemes
    if !url.starts_with("sqlite:") {
        return url.to_string();
    }

    // In-memory URLs like sqlite::memory: or sqlite::memory:?cache=shared
    if url.starts_with("sqlite::memory") {
        return url.to_string();
    }

    // Strip prefix and optional //
    let rest = &url["sqlite:".len()..];
    let path_with_query = rest.strip_prefix("//").unwrap_or(rest);

    // Separate query string if any
    let (path_part, query_part) = match path_with_query.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (path_with_query, None),
    };

    if path_part.is_empty() {
        // nothing to normalize
        return url.to_string();
    }

    // Expand leading ~/ to HOME
    let expanded_path = if let Some(rest) = path_part.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            format!("{}/{}", home.trim_end_matches('/'), rest)
        } else {
            path_part.to_string()
        }
    } else {
        path_part.to_string()
    };

    // Ensure parent directory exists if any
    if let Some(parent) = std::path::Path::new(&expanded_path).parent() {
        if !parent.as_os_str().is_empty() {
            let _ = std::fs::create_dir_all(parent);
        }
    }

    // Rebuild URL, prefer sqlite:// form
    let mut rebuilt = String::from("sqlite://");
    rebuilt.push_str(&expanded_path);
    if let Some(q) = query_part {
        rebuilt.push('?');
        rebuilt.push_str(q);
    }
    rebuilt
}

pub async fn run_migrations(pool: &Pool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

const MOVIE_COLUMNS: &str = "id, img, title, year, genre, rating, overview";

/// Escape LIKE wildcards so user text always matches as a literal substring.
fn like_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for ch in needle.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

/// One row chosen uniformly at random, or `None` on an empty catalogue.
#[instrument(skip_all)]
pub async fn random_movie(pool: &Pool) -> Result<Option<Movie>> {
    let movie = sqlx::query_as::<_, Movie>(&format!(
        "SELECT {MOVIE_COLUMNS} FROM movies ORDER BY RANDOM() LIMIT 1"
    ))
    .fetch_optional(pool)
    .await?;
    Ok(movie)
}

/// Case-insensitive substring match against the genre field.
#[instrument(skip_all)]
pub async fn movies_by_genre(pool: &Pool, genre: &str) -> Result<Vec<Movie>> {
    let movies = sqlx::query_as::<_, Movie>(&format!(
        "SELECT {MOVIE_COLUMNS} FROM movies WHERE LOWER(genre) LIKE ? ESCAPE '\\'"
    ))
    .bind(like_pattern(&genre.to_lowercase()))
    .fetch_all(pool)
    .await?;
    Ok(movies)
}

/// Case-insensitive substring match against the title field. Unbounded; the
/// dispatcher decides how many results are reasonable to render.
#[instrument(skip_all)]
pub async fn movies_by_title(pool: &Pool, text: &str) -> Result<Vec<Movie>> {
    let movies = sqlx::query_as::<_, Movie>(&format!(
        "SELECT {MOVIE_COLUMNS} FROM movies WHERE LOWER(title) LIKE ? ESCAPE '\\'"
    ))
    .bind(like_pattern(&text.to_lowercase()))
    .fetch_all(pool)
    .await?;
    Ok(movies)
}

/// Every movie the user has bookmarked, in bookmark-insertion order.
#[instrument(skip_all)]
pub async fn favorites_for_user(pool: &Pool, user_id: i64) -> Result<Vec<Movie>> {
    let movies = sqlx::query_as::<_, Movie>(
        "SELECT m.id, m.img, m.title, m.year, m.genre, m.rating, m.overview \
         FROM movies m \
         INNER JOIN favorites f ON f.movie_id = m.id \
         WHERE f.user_id = ? \
         ORDER BY f.id",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(movies)
}

#[instrument(skip_all)]
pub async fn is_favorited(pool: &Pool, user_id: i64, movie_id: i64) -> Result<bool> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM favorites WHERE user_id = ? AND movie_id = ?")
            .bind(user_id)
            .bind(movie_id)
            .fetch_one(pool)
            .await?;
    Ok(count > 0)
}

/// Bookmark a movie for a user. The UNIQUE(user_id, movie_id) constraint makes
/// this atomic: a concurrent duplicate insert surfaces as `AlreadyExists`
/// instead of a second row.
#[instrument(skip_all)]
pub async fn add_favorite(pool: &Pool, user_id: i64, movie_id: i64) -> Result<FavoriteOutcome> {
    let res = sqlx::query("INSERT INTO favorites (user_id, movie_id) VALUES (?, ?)")
        .bind(user_id)
        .bind(movie_id)
        .execute(pool)
        .await;
    match res {
        Ok(_) => Ok(FavoriteOutcome::Added),
        Err(sqlx::Error::Database(err)) if err.is_unique_violation() => {
            Ok(FavoriteOutcome::AlreadyExists)
        }
        Err(err) => Err(err.into()),
    }
}

#[cfg(test)]
pub async fn insert_movie(
    pool: &Pool,
    img: &str,
    title: &str,
    year: i64,
    genre: &str,
    rating: f64,
    overview: &str,
) -> Result<i64> {
    use sqlx::Row;
    let rec = sqlx::query(
        "INSERT INTO movies (img, title, year, genre, rating, overview) \
         VALUES (?, ?, ?, ?, ?, ?) RETURNING id",
    )
    .bind(img)
    .bind(title)
    .bind(year)
    .bind(genre)
    .bind(rating)
    .bind(overview)
    .fetch_one(pool)
    .await?;
    Ok(rec.get::<i64, _>("id"))
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup_pool() -> Pool {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .unwrap()
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        pool
    }

    async fn seed(pool: &Pool, title: &str, genre: &str) -> i64 {
        insert_movie(pool, "http://img.example/p.jpg", title, 2010, genre, 8.8, "plot")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn random_movie_on_empty_catalogue_is_none() {
        let pool = setup_pool().await;
        assert!(random_movie(&pool).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn random_movie_returns_a_row() {
        let pool = setup_pool().await;
        seed(&pool, "Inception", "Action, Sci-Fi").await;
        let movie = random_movie(&pool).await.unwrap().unwrap();
        assert_eq!(movie.title, "Inception");
    }

    #[tokio::test]
    async fn title_search_is_case_insensitive() {
        let pool = setup_pool().await;
        seed(&pool, "Inception", "Action, Sci-Fi").await;

        let lower = movies_by_title(&pool, "inception").await.unwrap();
        let upper = movies_by_title(&pool, "INCEPTION").await.unwrap();
        assert_eq!(lower.len(), 1);
        assert_eq!(
            lower.iter().map(|m| m.id).collect::<Vec<_>>(),
            upper.iter().map(|m| m.id).collect::<Vec<_>>()
        );
    }

    #[tokio::test]
    async fn genre_search_matches_substring() {
        let pool = setup_pool().await;
        seed(&pool, "Inception", "Action, Sci-Fi").await;
        seed(&pool, "Airplane!", "Comedy").await;

        let hits = movies_by_genre(&pool, "sci").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title, "Inception");

        assert!(movies_by_genre(&pool, "western").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn like_wildcards_in_input_match_literally() {
        let pool = setup_pool().await;
        seed(&pool, "100% Wolf", "Animation").await;
        seed(&pool, "Inception", "Action, Sci-Fi").await;

        // "%" must not act as a match-anything wildcard.
        let hits = movies_by_title(&pool, "100%").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title, "100% Wolf");

        assert!(movies_by_title(&pool, "_____________________")
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn add_favorite_twice_keeps_one_row() {
        let pool = setup_pool().await;
        let movie_id = seed(&pool, "Inception", "Action, Sci-Fi").await;

        assert_eq!(
            add_favorite(&pool, 7, movie_id).await.unwrap(),
            FavoriteOutcome::Added
        );
        assert_eq!(
            add_favorite(&pool, 7, movie_id).await.unwrap(),
            FavoriteOutcome::AlreadyExists
        );

        let rows: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM favorites WHERE user_id = ? AND movie_id = ?",
        )
        .bind(7_i64)
        .bind(movie_id)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(rows, 1);
        assert!(is_favorited(&pool, 7, movie_id).await.unwrap());
    }

    #[tokio::test]
    async fn favorites_are_scoped_per_user() {
        let pool = setup_pool().await;
        let a = seed(&pool, "Inception", "Action, Sci-Fi").await;
        let b = seed(&pool, "Airplane!", "Comedy").await;

        add_favorite(&pool, 1, a).await.unwrap();
        add_favorite(&pool, 2, b).await.unwrap();

        let user1 = favorites_for_user(&pool, 1).await.unwrap();
        assert_eq!(user1.iter().map(|m| m.id).collect::<Vec<_>>(), vec![a]);

        let user2 = favorites_for_user(&pool, 2).await.unwrap();
        assert_eq!(user2.iter().map(|m| m.id).collect::<Vec<_>>(), vec![b]);

        assert!(favorites_for_user(&pool, 3).await.unwrap().is_empty());
        assert!(!is_favorited(&pool, 2, a).await.unwrap());
    }
}
