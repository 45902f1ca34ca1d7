//! Movie storage. Every movie belongs to exactly one user.

use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqlitePool;

#[derive(Clone)]
pub struct MovieStore {
    pool: SqlitePool,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Movie {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub rate: f64,
    pub user_id: i64,
    pub created_at: String,
    pub updated_at: String,
}

/// Column values for a new or replaced movie.
#[derive(Debug, Clone, Deserialize)]
pub struct MovieFields {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub rate: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovieSortKey {
    #[default]
    Id,
    Title,
    Rate,
    CreatedAt,
}

#[derive(Debug, Clone)]
pub struct MovieFilter {
    pub limit: i64,
    pub offset: i64,
    pub title_contains: Option<String>,
    pub rate_from: f64,
    pub rate_to: f64,
    pub sort_by: MovieSortKey,
}

impl Default for MovieFilter {
    fn default() -> Self {
        Self {
            limit: 10,
            offset: 0,
            title_contains: None,
            rate_from: 0.0,
            rate_to: 5.0,
            sort_by: MovieSortKey::Id,
        }
    }
}

macro_rules! list_movies_query {
    ($order:literal) => {
        concat!(
            "SELECT id, title, description, rate, user_id, created_at, updated_at FROM movies
             WHERE user_id = ?
               AND (? IS NULL OR title LIKE '%' || ? || '%')
               AND rate BETWEEN ? AND ?
             ORDER BY ",
            $order,
            " LIMIT ? OFFSET ?"
        )
    };
}

impl MovieStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a movie owned by `user_id`. Returns the movie ID.
    pub async fn create(&self, user_id: i64, fields: &MovieFields) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO movies (title, description, rate, user_id) VALUES (?, ?, ?, ?)",
        )
        .bind(&fields.title)
        .bind(&fields.description)
        .bind(fields.rate)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<Movie>, sqlx::Error> {
        sqlx::query_as(
            "SELECT id, title, description, rate, user_id, created_at, updated_at FROM movies WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Owner of a movie, without loading the rest of the row.
    pub async fn owner_of(&self, id: i64) -> Result<Option<i64>, sqlx::Error> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT user_id FROM movies WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.0))
    }

    pub async fn update(&self, id: i64, fields: &MovieFields) -> Result<Option<Movie>, sqlx::Error> {
        sqlx::query_as(
            "UPDATE movies
             SET title = ?, description = ?, rate = ?, updated_at = datetime('now')
             WHERE id = ?
             RETURNING id, title, description, rate, user_id, created_at, updated_at",
        )
        .bind(&fields.title)
        .bind(&fields.description)
        .bind(fields.rate)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn delete(&self, id: i64) -> Result<Option<Movie>, sqlx::Error> {
        sqlx::query_as(
            "DELETE FROM movies WHERE id = ?
             RETURNING id, title, description, rate, user_id, created_at, updated_at",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    /// List the movies of one user matching `filter`.
    pub async fn list_by_user(
        &self,
        user_id: i64,
        filter: &MovieFilter,
    ) -> Result<Vec<Movie>, sqlx::Error> {
        let query = match filter.sort_by {
            MovieSortKey::Id => list_movies_query!("id"),
            MovieSortKey::Title => list_movies_query!("title"),
            MovieSortKey::Rate => list_movies_query!("rate DESC, id"),
            MovieSortKey::CreatedAt => list_movies_query!("created_at, id"),
        };

        sqlx::query_as(query)
            .bind(user_id)
            .bind(filter.title_contains.as_deref())
            .bind(filter.title_contains.as_deref())
            .bind(filter.rate_from)
            .bind(filter.rate_to)
            .bind(filter.limit)
            .bind(filter.offset)
            .fetch_all(&self.pool)
            .await
    }
}
