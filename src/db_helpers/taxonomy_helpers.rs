use sqlx::{Sqlite, SqlitePool};
use std::collections::HashMap;

use crate::errors::RequestError;
use crate::models::{Category, Locale, PostView, SerieView, Tag};

use super::post_helpers::POST_VIEW_QUERY;

/// Tag names are unique; creating an existing name hands back the existing
/// row instead of erroring.
pub async fn create_tag(pool: &SqlitePool, name: &str) -> Result<Tag, RequestError> {
    if name.trim().is_empty() {
        return Err(RequestError::ValidationFailed(
            "Tag name is required".to_string(),
        ));
    }
    let mut tx = pool.begin().await?;
    let result = sqlx::query_as::<Sqlite, Tag>(
        r#"
        INSERT INTO tags (name)
        VALUES ($1)
        ON CONFLICT (name) DO UPDATE SET name = $1
        RETURNING id, name
        "#,
    )
    .bind(name)
    .fetch_one(&mut tx)
    .await?;
    tx.commit().await?;
    Ok(result)
}

pub async fn list_tags(pool: &SqlitePool) -> Result<Vec<Tag>, RequestError> {
    let mut tx = pool.begin().await?;
    let result = sqlx::query_as::<Sqlite, Tag>("SELECT id, name FROM tags ORDER BY name")
        .fetch_all(&mut tx)
        .await?;
    tx.commit().await?;
    Ok(result)
}

/// Category names are intentionally not unique; duplicates are the
/// author's problem.
pub async fn create_category(pool: &SqlitePool, name: &str) -> Result<Category, RequestError> {
    if name.trim().is_empty() {
        return Err(RequestError::ValidationFailed(
            "Category name is required".to_string(),
        ));
    }
    let mut tx = pool.begin().await?;
    let result = sqlx::query_as::<Sqlite, Category>(
        r#"
        INSERT INTO categories (name)
        VALUES ($1)
        RETURNING id, name
        "#,
    )
    .bind(name)
    .fetch_one(&mut tx)
    .await?;
    tx.commit().await?;
    Ok(result)
}

pub async fn list_categories(pool: &SqlitePool) -> Result<Vec<Category>, RequestError> {
    let mut tx = pool.begin().await?;
    let result = sqlx::query_as::<Sqlite, Category>("SELECT id, name FROM categories ORDER BY id")
        .fetch_all(&mut tx)
        .await?;
    tx.commit().await?;
    Ok(result)
}

/// A serie is translatable like a post: both locale names are required up
/// front.
pub async fn create_serie(
    pool: &SqlitePool,
    names: &HashMap<Locale, String>,
) -> Result<i64, RequestError> {
    for locale in Locale::ALL {
        match names.get(&locale) {
            Some(name) if !name.trim().is_empty() => {}
            _ => {
                return Err(RequestError::ValidationFailed(format!(
                    "Missing {} serie name",
                    locale
                )))
            }
        }
    }

    let mut tx = pool.begin().await?;
    let row = sqlx::query_as::<Sqlite, (i64,)>("INSERT INTO series DEFAULT VALUES RETURNING id")
        .fetch_one(&mut tx)
        .await?;
    let serie_id = row.0;
    for locale in Locale::ALL {
        sqlx::query("INSERT INTO serie_translations (serie_id, locale, name) VALUES ($1, $2, $3)")
            .bind(serie_id)
            .bind(locale.as_str())
            .bind(&names[&locale])
            .execute(&mut tx)
            .await?;
    }
    tx.commit().await?;
    Ok(serie_id)
}

pub async fn get_serie(
    pool: &SqlitePool,
    id: i64,
    locale: Locale,
) -> Result<Option<SerieView>, RequestError> {
    let mut tx = pool.begin().await?;
    let result = sqlx::query_as::<Sqlite, SerieView>(
        r#"
        SELECT serie_id AS "id", locale, name
        FROM serie_translations
        WHERE serie_id = $1 AND locale = $2
        "#,
    )
    .bind(id)
    .bind(locale.as_str())
    .fetch_optional(&mut tx)
    .await?;
    tx.commit().await?;
    Ok(result)
}

/// Membership is a field pair on the post, author-assigned. Ties between
/// equal orders stay unresolved here; the list below breaks them by id.
pub async fn add_post_to_serie(
    pool: &SqlitePool,
    serie_id: i64,
    post_id: i64,
    order: Option<i64>,
) -> Result<(), RequestError> {
    let mut tx = pool.begin().await?;
    let serie = sqlx::query_as::<Sqlite, (i64,)>("SELECT id FROM series WHERE id = $1")
        .bind(serie_id)
        .fetch_optional(&mut tx)
        .await?;
    if serie.is_none() {
        return Err(RequestError::NotFound("Serie not found"));
    }
    let result = sqlx::query("UPDATE posts SET serie_id = $1, serie_order = $2 WHERE id = $3")
        .bind(serie_id)
        .bind(order)
        .bind(post_id)
        .execute(&mut tx)
        .await?;
    if result.rows_affected() == 0 {
        return Err(RequestError::NotFound("Post not found"));
    }
    tx.commit().await?;
    Ok(())
}

/// Posts of a serie in reading order: serie_order ascending with unordered
/// posts after every ordered one.
pub async fn list_posts_by_serie(
    pool: &SqlitePool,
    serie_id: i64,
    locale: Locale,
) -> Result<Vec<PostView>, RequestError> {
    let mut tx = pool.begin().await?;
    let query = format!(
        "{} WHERE posts.serie_id = $1 AND post_translations.locale = $2 \
         ORDER BY posts.serie_order IS NULL, posts.serie_order ASC, posts.id ASC",
        POST_VIEW_QUERY
    );
    let result = sqlx::query_as::<Sqlite, PostView>(&query)
        .bind(serie_id)
        .bind(locale.as_str())
        .fetch_all(&mut tx)
        .await?;
    tx.commit().await?;
    Ok(result)
}
