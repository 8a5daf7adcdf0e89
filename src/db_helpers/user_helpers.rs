use sqlx::{Sqlite, SqlitePool};

use crate::data_formats::{OauthLoginRequest, RegisterRequest};
use crate::errors::RequestError;
use crate::models::User;

use super::USER_COLUMNS;

/// Registration insert; the password in `user` is already hashed by the
/// handler. Email uniqueness surfaces as a database UNIQUE violation the
/// handler maps to a clean message.
pub async fn insert_user(pool: &SqlitePool, user: &RegisterRequest) -> Result<User, RequestError> {
    let mut tx = pool.begin().await?;
    let insert = format!(
        "INSERT INTO users (email, name, password) VALUES ($1, $2, $3) RETURNING {}",
        USER_COLUMNS
    );
    let user = sqlx::query_as::<Sqlite, User>(&insert)
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.password)
        .fetch_one(&mut tx)
        .await?;
    tx.commit().await?;
    Ok(user)
}

/// First OAuth login provisions a password-less account; later logins
/// refresh the display name and picture from the provider.
pub async fn resolve_oauth_user(
    pool: &SqlitePool,
    identity: &OauthLoginRequest,
) -> Result<User, RequestError> {
    let mut tx = pool.begin().await?;
    let select = format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS);
    let existing = sqlx::query_as::<Sqlite, User>(&select)
        .bind(&identity.email)
        .fetch_optional(&mut tx)
        .await?;

    let user = match existing {
        Some(user) => {
            let update = format!(
                "UPDATE users SET name = $1, picture = $2 WHERE id = $3 RETURNING {}",
                USER_COLUMNS
            );
            sqlx::query_as::<Sqlite, User>(&update)
                .bind(&identity.name)
                .bind(&identity.picture)
                .bind(user.id)
                .fetch_one(&mut tx)
                .await?
        }
        None => {
            let insert = format!(
                "INSERT INTO users (email, name, picture, password) \
                 VALUES ($1, $2, $3, NULL) RETURNING {}",
                USER_COLUMNS
            );
            sqlx::query_as::<Sqlite, User>(&insert)
                .bind(&identity.email)
                .bind(&identity.name)
                .bind(&identity.picture)
                .fetch_one(&mut tx)
                .await?
        }
    };
    tx.commit().await?;
    Ok(user)
}
