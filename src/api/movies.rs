//! Movie endpoints. Users only ever see and touch their own movies.

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::{ApiError, ResultExt};
use super::users::{check_paging, default_limit};
use crate::auth::{Auth, Member, MovieResource, Owned};
use crate::db::{Database, Movie, MovieFields, MovieFilter, MovieSortKey};
use crate::impl_has_database;

#[derive(Clone)]
pub struct MoviesState {
    pub db: Database,
}

impl_has_database!(MoviesState);

pub fn router(state: MoviesState) -> Router {
    Router::new()
        .route("/new", post(create_movie))
        .route("/all", get(list_movies))
        .route(
            "/{id}",
            get(get_movie).put(update_movie).delete(delete_movie),
        )
        .with_state(state)
}

fn validate_movie(fields: &MovieFields) -> Result<(), ApiError> {
    let title_len = fields.title.trim().chars().count();
    if !(1..=30).contains(&title_len) {
        return Err(ApiError::bad_request("Title must be between 1 and 30 characters"));
    }
    if fields.description.chars().count() > 100 {
        return Err(ApiError::bad_request(
            "Description cannot be longer than 100 characters",
        ));
    }
    if !(0.0..=5.0).contains(&fields.rate) {
        return Err(ApiError::bad_request("Rate must be between 0 and 5"));
    }
    Ok(())
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

async fn create_movie(
    State(state): State<MoviesState>,
    auth: Auth<Member>,
    Json(fields): Json<MovieFields>,
) -> Result<impl IntoResponse, ApiError> {
    validate_movie(&fields)?;

    let id = match state.db.movies().create(auth.payload.user_id(), &fields).await {
        Ok(id) => id,
        Err(e) if is_unique_violation(&e) => {
            return Err(ApiError::conflict("A movie with this title already exists"));
        }
        Err(e) => return Err(ApiError::db_error("Failed to create movie", e)),
    };

    let movie = state
        .db
        .movies()
        .find_by_id(id)
        .await
        .db_err("Failed to load created movie")?
        .ok_or_else(|| ApiError::internal("Created movie vanished"))?;

    debug!(movie_id = id, user_id = auth.payload.user_id(), "Movie created");
    Ok((StatusCode::CREATED, Json(movie)))
}

#[derive(Deserialize)]
struct ListMoviesQuery {
    #[serde(default = "default_limit")]
    limit: i64,
    #[serde(default)]
    offset: i64,
    #[serde(default, alias = "title-contains")]
    title_contains: Option<String>,
    #[serde(default, alias = "rate-from")]
    rate_from: Option<f64>,
    #[serde(default, alias = "rate-to")]
    rate_to: Option<f64>,
    #[serde(default, alias = "sort-by")]
    sort_by: MovieSortKey,
}

async fn list_movies(
    State(state): State<MoviesState>,
    auth: Auth<Member>,
    Query(query): Query<ListMoviesQuery>,
) -> Result<Json<Vec<Movie>>, ApiError> {
    check_paging(query.limit, query.offset)?;

    let movies = state
        .db
        .movies()
        .list_by_user(
            auth.payload.user_id(),
            &MovieFilter {
                limit: query.limit,
                offset: query.offset,
                title_contains: query.title_contains,
                rate_from: query.rate_from.unwrap_or(0.0),
                rate_to: query.rate_to.unwrap_or(5.0),
                sort_by: query.sort_by,
            },
        )
        .await
        .db_err("Failed to list movies")?;

    Ok(Json(movies))
}

async fn get_movie(
    State(state): State<MoviesState>,
    owned: Owned<MovieResource>,
) -> Result<Json<Movie>, ApiError> {
    let movie = state
        .db
        .movies()
        .find_by_id(owned.id)
        .await
        .db_err("Failed to get movie")?
        .ok_or_else(|| ApiError::not_found("Movie not found"))?;

    Ok(Json(movie))
}

#[derive(Serialize)]
struct MovieResponse {
    message: &'static str,
    movie: Movie,
}

async fn update_movie(
    State(state): State<MoviesState>,
    _auth: Auth<Member>,
    owned: Owned<MovieResource>,
    Json(fields): Json<MovieFields>,
) -> Result<Json<MovieResponse>, ApiError> {
    validate_movie(&fields)?;

    let movie = match state.db.movies().update(owned.id, &fields).await {
        Ok(movie) => movie.ok_or_else(|| ApiError::not_found("Movie not found"))?,
        Err(e) if is_unique_violation(&e) => {
            return Err(ApiError::conflict("A movie with this title already exists"));
        }
        Err(e) => return Err(ApiError::db_error("Failed to update movie", e)),
    };

    Ok(Json(MovieResponse {
        message: "Movie has been updated successfully.",
        movie,
    }))
}

async fn delete_movie(
    State(state): State<MoviesState>,
    _auth: Auth<Member>,
    owned: Owned<MovieResource>,
) -> Result<Json<MovieResponse>, ApiError> {
    let movie = state
        .db
        .movies()
        .delete(owned.id)
        .await
        .db_err("Failed to delete movie")?
        .ok_or_else(|| ApiError::not_found("Movie not found"))?;

    Ok(Json(MovieResponse {
        message: "Movie has been removed successfully.",
        movie,
    }))
}
