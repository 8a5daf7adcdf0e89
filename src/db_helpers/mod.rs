use sqlx::{Sqlite, SqlitePool};

use crate::errors::RequestError;
use crate::models::{Subscriptor, User};

mod comment_helpers;
mod post_helpers;
mod taxonomy_helpers;
mod user_helpers;

pub use comment_helpers::*;
pub use post_helpers::*;
pub use taxonomy_helpers::*;
pub use user_helpers::*;

pub(crate) const USER_COLUMNS: &str = "id, email, name, picture, is_admin, password, created_at";

// ----------------- Helper Functions -----------------

pub async fn get_user_by_email(
    pool: &SqlitePool,
    email: &str,
) -> Result<Option<User>, RequestError> {
    let mut tx = pool.begin().await?;
    let query = format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS);
    let result = sqlx::query_as::<Sqlite, User>(&query)
        .bind(email)
        .fetch_optional(&mut tx)
        .await?;
    tx.commit().await?;
    Ok(result)
}

pub async fn get_user_by_id(pool: &SqlitePool, id: i64) -> Result<Option<User>, RequestError> {
    let mut tx = pool.begin().await?;
    let query = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
    let result = sqlx::query_as::<Sqlite, User>(&query)
        .bind(id)
        .fetch_optional(&mut tx)
        .await?;
    tx.commit().await?;
    Ok(result)
}

/// Mailing-list capture. No uniqueness, no lifecycle: the row is the
/// feature.
pub async fn subscribe_email(pool: &SqlitePool, email: &str) -> Result<Subscriptor, RequestError> {
    if email.trim().is_empty() {
        return Err(RequestError::ValidationFailed(
            "Email is required".to_string(),
        ));
    }
    let mut tx = pool.begin().await?;
    let result = sqlx::query_as::<Sqlite, Subscriptor>(
        r#"
        INSERT INTO subscriptors (email)
        VALUES ($1)
        RETURNING id, email
        "#,
    )
    .bind(email)
    .fetch_one(&mut tx)
    .await?;
    tx.commit().await?;
    Ok(result)
}
