use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqlitePool;

#[derive(Clone)]
pub struct UserStore {
    pool: SqlitePool,
}

/// User role for authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Guest,
    User,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Guest => "guest",
            UserRole::User => "user",
            UserRole::Admin => "admin",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "admin" => UserRole::Admin,
            "guest" => UserRole::Guest,
            _ => UserRole::User,
        }
    }
}

/// A stored account. The password hash never leaves the server.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(skip_serializing)]
    pub hashed_password: String,
    pub role: UserRole,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    username: String,
    hashed_password: String,
    role: String,
    created_at: String,
    updated_at: String,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            username: row.username,
            hashed_password: row.hashed_password,
            role: UserRole::from_str(&row.role),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Fields an update may change. `None` leaves the column as is.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub hashed_password: Option<String>,
    pub role: Option<UserRole>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserSortKey {
    #[default]
    Id,
    Username,
    CreatedAt,
}

/// Listing filter for the admin user list.
#[derive(Debug, Clone)]
pub struct UserFilter {
    pub limit: i64,
    pub offset: i64,
    pub username_contains: Option<String>,
    pub role: Option<UserRole>,
    pub sort_by: UserSortKey,
}

impl Default for UserFilter {
    fn default() -> Self {
        Self {
            limit: 10,
            offset: 0,
            username_contains: None,
            role: None,
            sort_by: UserSortKey::Id,
        }
    }
}

macro_rules! list_users_query {
    ($order:literal) => {
        concat!(
            "SELECT id, username, hashed_password, role, created_at, updated_at FROM users
             WHERE (? IS NULL OR username LIKE '%' || ? || '%')
               AND (? IS NULL OR role = ?)
             ORDER BY ",
            $order,
            " LIMIT ? OFFSET ?"
        )
    };
}

impl UserStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a user. Returns the user ID.
    pub async fn create(
        &self,
        username: &str,
        hashed_password: &str,
        role: UserRole,
    ) -> Result<i64, sqlx::Error> {
        let result =
            sqlx::query("INSERT INTO users (username, hashed_password, role) VALUES (?, ?, ?)")
                .bind(username)
                .bind(hashed_password)
                .bind(role.as_str())
                .execute(&self.pool)
                .await?;
        Ok(result.last_insert_rowid())
    }

    /// Get a user by username.
    pub async fn find_by_username(&self, username: &str) -> Result<Option<User>, sqlx::Error> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, username, hashed_password, role, created_at, updated_at FROM users WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(User::from))
    }

    /// Get a user by ID.
    pub async fn find_by_id(&self, id: i64) -> Result<Option<User>, sqlx::Error> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, username, hashed_password, role, created_at, updated_at FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(User::from))
    }

    pub async fn is_username_available(&self, username: &str) -> Result<bool, sqlx::Error> {
        let count: (i32,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE username = ?")
            .bind(username)
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0 == 0)
    }

    /// Apply `update` and return the updated record, or `None` if no such user.
    pub async fn update(&self, id: i64, update: &UserUpdate) -> Result<Option<User>, sqlx::Error> {
        let row: Option<UserRow> = sqlx::query_as(
            "UPDATE users
             SET hashed_password = COALESCE(?, hashed_password),
                 role = COALESCE(?, role),
                 updated_at = datetime('now')
             WHERE id = ?
             RETURNING id, username, hashed_password, role, created_at, updated_at",
        )
        .bind(update.hashed_password.as_deref())
        .bind(update.role.map(|r| r.as_str()))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(User::from))
    }

    /// Delete a user by ID and return the removed record. Their movies go with them.
    pub async fn delete(&self, id: i64) -> Result<Option<User>, sqlx::Error> {
        let row: Option<UserRow> = sqlx::query_as(
            "DELETE FROM users WHERE id = ?
             RETURNING id, username, hashed_password, role, created_at, updated_at",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(User::from))
    }

    /// List users matching `filter`.
    pub async fn list(&self, filter: &UserFilter) -> Result<Vec<User>, sqlx::Error> {
        let query = match filter.sort_by {
            UserSortKey::Id => list_users_query!("id"),
            UserSortKey::Username => list_users_query!("username"),
            UserSortKey::CreatedAt => list_users_query!("created_at, id"),
        };
        let role = filter.role.map(|r| r.as_str());

        let rows: Vec<UserRow> = sqlx::query_as(query)
            .bind(filter.username_contains.as_deref())
            .bind(filter.username_contains.as_deref())
            .bind(role)
            .bind(role)
            .bind(filter.limit)
            .bind(filter.offset)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(User::from).collect())
    }

    /// Whether any admin account exists.
    pub async fn has_admin(&self) -> Result<bool, sqlx::Error> {
        let count: (i32,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE role = 'admin'")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0 > 0)
    }
}
