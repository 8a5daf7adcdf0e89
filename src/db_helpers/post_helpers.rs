use sqlx::{Sqlite, SqlitePool};
use std::collections::HashMap;

use crate::data_formats::{SavePostRequest, TranslationInput};
use crate::errors::RequestError;
use crate::models::{Locale, Post, PostTranslation, PostView};
use crate::search::PostProjection;
use crate::slugify;
use crate::storage::ContentStore;

pub(crate) const POST_VIEW_QUERY: &str = r#"
            SELECT posts.id                       AS "id",
                   posts.author_id                AS "author_id",
                   users.name                     AS "author_name",
                   posts.category_id              AS "category_id",
                   categories.name                AS "category_name",
                   posts.serie_id                 AS "serie_id",
                   posts.serie_order              AS "serie_order",
                   post_translations.locale       AS "locale",
                   post_translations.title        AS "title",
                   post_translations.description  AS "description",
                   post_translations.slug         AS "slug",
                   post_translations.content_ref  AS "content_ref",
                   posts.created_at               AS "created_at"
            FROM   posts
                JOIN post_translations
                    ON post_translations.post_id = posts.id
                JOIN users
                    ON users.id = posts.author_id
                LEFT JOIN categories
                    ON categories.id = posts.category_id
     "#;

const MAX_DESCRIPTION_LENGTH: usize = 180;

/// Result of a successful save: the post id plus the per-locale projections
/// the caller pushes to the search mirror.
#[derive(Debug)]
pub struct SavedPost {
    pub id: i64,
    pub slugs: HashMap<Locale, String>,
    pub projections: Vec<(Locale, PostProjection)>,
}

/// What a deleted post leaves behind to clean up: one entry per translation,
/// so the caller can drop artifacts and index documents.
#[derive(Debug)]
pub struct DeletedTranslation {
    pub locale: Locale,
    pub slug: String,
    pub content_ref: String,
}

fn validated_translation<'a>(
    request: &'a SavePostRequest,
    locale: Locale,
) -> Result<&'a TranslationInput, RequestError> {
    let translation = request.translations.get(&locale).ok_or_else(|| {
        RequestError::ValidationFailed(format!("Missing {} translation", locale))
    })?;
    if translation.title.trim().is_empty() {
        return Err(RequestError::ValidationFailed(format!(
            "Missing {} title",
            locale
        )));
    }
    if translation.content.trim().is_empty() {
        return Err(RequestError::ValidationFailed(format!(
            "Missing {} content",
            locale
        )));
    }
    if translation.description.chars().count() > MAX_DESCRIPTION_LENGTH {
        return Err(RequestError::ValidationFailed(format!(
            "The {} description exceeds {} characters",
            locale, MAX_DESCRIPTION_LENGTH
        )));
    }
    Ok(translation)
}

fn map_tag_error(e: RequestError) -> RequestError {
    if let RequestError::DatabaseError(sqlx::Error::Database(db)) = &e {
        if db.message().contains("FOREIGN KEY constraint failed") {
            return RequestError::ValidationFailed("Unknown tag id".to_string());
        }
    }
    e
}

/// Create-or-update. A save is one unit: the envelope row, both locale
/// translations and the tag set all land in a single transaction, with the
/// content artifacts written beforehand and superseded artifacts removed
/// only after the transaction commits.
pub async fn save_post(
    pool: &SqlitePool,
    store: &ContentStore,
    author_id: i64,
    request: SavePostRequest,
) -> Result<SavedPost, RequestError> {
    // A post is publicly visible only with a complete translation pair, so
    // completeness is a save precondition rather than a publish-time check.
    let mut slugs = HashMap::new();
    for locale in Locale::ALL {
        let translation = validated_translation(&request, locale)?;
        slugs.insert(locale, slugify(&translation.title));
    }

    // On update the post must already exist; grab the refs we may be
    // replacing while we're at it.
    let old_refs: Vec<String> = match request.id {
        Some(id) => {
            let existing = sqlx::query_as::<Sqlite, Post>(
                "SELECT id, author_id, category_id, serie_id, serie_order, created_at \
                 FROM posts WHERE id = $1",
            )
            .bind(id)
            .fetch_optional(pool)
            .await?;
            if existing.is_none() {
                return Err(RequestError::NotFound("Post not found"));
            }
            sqlx::query_as::<Sqlite, (String,)>(
                "SELECT content_ref FROM post_translations WHERE post_id = $1",
            )
            .bind(id)
            .fetch_all(pool)
            .await?
            .into_iter()
            .map(|r| r.0)
            .collect()
        }
        None => Vec::new(),
    };

    // Derived slugs must not collide with any other post, in any locale.
    // Checked before a single artifact is touched; the UNIQUE index stays
    // as the backstop for races this cannot see.
    for locale in Locale::ALL {
        let slug = &slugs[&locale];
        let taken = sqlx::query_as::<Sqlite, (i64,)>(
            "SELECT post_id FROM post_translations \
             WHERE slug = $1 AND ( post_id != $2 OR $2 IS NULL )",
        )
        .bind(slug)
        .bind(request.id)
        .fetch_optional(pool)
        .await?;
        if taken.is_some() {
            return Err(RequestError::SlugConflict(slug.clone()));
        }
    }

    // New artifacts are durably on disk before any row points at them.
    let mut new_refs: HashMap<Locale, String> = HashMap::new();
    for locale in Locale::ALL {
        let translation = &request.translations[&locale];
        let slug = &slugs[&locale];
        let filename = match &translation.content_filename {
            Some(name) => name.clone(),
            None => format!("{}.{}.md", slug, locale),
        };
        let content_ref = store
            .write(&filename, &translation.content)
            .await
            .map_err(|e| {
                log::error!("Artifact write failed: {:#}", e);
                RequestError::ServerError
            })?;
        new_refs.insert(locale, content_ref);
    }

    let mut tx = pool.begin().await?;

    let post_id = match request.id {
        Some(id) => {
            sqlx::query(
                r#"
                UPDATE posts
                SET category_id = $1, serie_id = $2, serie_order = $3
                WHERE id = $4
                "#,
            )
            .bind(request.category_id)
            .bind(request.serie_id)
            .bind(request.serie_order)
            .bind(id)
            .execute(&mut tx)
            .await?;
            id
        }
        None => {
            let row = sqlx::query_as::<Sqlite, (i64,)>(
                r#"
                INSERT INTO posts (author_id, category_id, serie_id, serie_order)
                VALUES ($1, $2, $3, $4)
                RETURNING id
                "#,
            )
            .bind(author_id)
            .bind(request.category_id)
            .bind(request.serie_id)
            .bind(request.serie_order)
            .fetch_one(&mut tx)
            .await?;
            row.0
        }
    };

    for locale in Locale::ALL {
        let slug = &slugs[&locale];
        let translation = &request.translations[&locale];
        sqlx::query(
            r#"
            INSERT INTO post_translations (post_id, locale, title, description, slug, content_ref)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (post_id, locale) DO UPDATE
                SET title = excluded.title,
                    description = excluded.description,
                    slug = excluded.slug,
                    content_ref = excluded.content_ref
            "#,
        )
        .bind(post_id)
        .bind(locale.as_str())
        .bind(&translation.title)
        .bind(&translation.description)
        .bind(slug)
        .bind(&new_refs[&locale])
        .execute(&mut tx)
        .await
        .map_err(|e| {
            // The UNIQUE index is the backstop for races the pre-check
            // cannot see.
            let e = RequestError::from(e);
            if e.is_unique_violation() {
                RequestError::SlugConflict(slug.clone())
            } else {
                e
            }
        })?;
    }

    // Tag set is replaced wholesale.
    sqlx::query("DELETE FROM post_tags WHERE post_id = $1")
        .bind(post_id)
        .execute(&mut tx)
        .await?;
    for tag_id in &request.tag_ids {
        sqlx::query("INSERT INTO post_tags (post_id, tag_id) VALUES ($1, $2)")
            .bind(post_id)
            .bind(tag_id)
            .execute(&mut tx)
            .await
            .map_err(|e| map_tag_error(RequestError::from(e)))?;
    }

    tx.commit().await?;

    // Only now are the superseded artifacts safe to drop. Refs that were
    // overwritten in place are skipped.
    for old_ref in &old_refs {
        if new_refs.values().any(|r| r == old_ref) {
            continue;
        }
        if let Err(e) = store.remove(old_ref).await {
            log::warn!("Could not remove stale artifact {}: {:#}", old_ref, e);
        }
    }

    let projections = Locale::ALL
        .iter()
        .map(|&locale| {
            let translation = &request.translations[&locale];
            (
                locale,
                PostProjection::new(
                    &slugs[&locale],
                    &translation.title,
                    &translation.description,
                ),
            )
        })
        .collect();

    Ok(SavedPost {
        id: post_id,
        slugs,
        projections,
    })
}

pub async fn get_post_by_slug(
    pool: &SqlitePool,
    locale: Locale,
    slug: &str,
) -> Result<Option<PostView>, RequestError> {
    let mut tx = pool.begin().await?;
    let query = format!(
        "{} WHERE post_translations.slug = $1 AND post_translations.locale = $2",
        POST_VIEW_QUERY
    );
    let result = sqlx::query_as::<Sqlite, PostView>(&query)
        .bind(slug)
        .bind(locale.as_str())
        .fetch_optional(&mut tx)
        .await?;
    tx.commit().await?;
    Ok(result)
}

/// All posts in one locale, newest first. No pagination.
pub async fn list_posts(pool: &SqlitePool, locale: Locale) -> Result<Vec<PostView>, RequestError> {
    let mut tx = pool.begin().await?;
    let query = format!(
        "{} WHERE post_translations.locale = $1 ORDER BY posts.created_at DESC, posts.id DESC",
        POST_VIEW_QUERY
    );
    let result = sqlx::query_as::<Sqlite, PostView>(&query)
        .bind(locale.as_str())
        .fetch_all(&mut tx)
        .await?;
    tx.commit().await?;
    Ok(result)
}

pub async fn tags_for_post(pool: &SqlitePool, post_id: i64) -> Result<Vec<String>, RequestError> {
    let mut tx = pool.begin().await?;
    let result = sqlx::query_as::<Sqlite, (String,)>(
        r#"
        SELECT tags.name
        FROM tags
            JOIN post_tags ON post_tags.tag_id = tags.id
        WHERE post_tags.post_id = $1
        ORDER BY tags.name
        "#,
    )
    .bind(post_id)
    .fetch_all(&mut tx)
    .await?;
    tx.commit().await?;
    Ok(result.into_iter().map(|r| r.0).collect())
}

/// Search-result re-hydration: slugs back into posts, misses skipped,
/// duplicates collapsed by post id while keeping the ranking order.
pub async fn posts_by_slugs(
    pool: &SqlitePool,
    locale: Locale,
    slugs: &[String],
) -> Result<Vec<PostView>, RequestError> {
    let mut seen = Vec::new();
    let mut result = Vec::new();
    for slug in slugs {
        if let Some(view) = get_post_by_slug(pool, locale, slug).await? {
            if seen.contains(&view.id) {
                continue;
            }
            seen.push(view.id);
            result.push(view);
        }
    }
    Ok(result)
}

/// Removes the post; translations and tag links cascade with it. Comments
/// are left in place, orphaned. Returns what the caller must clean up
/// outside the database.
pub async fn delete_post(
    pool: &SqlitePool,
    id: i64,
) -> Result<Vec<DeletedTranslation>, RequestError> {
    let mut tx = pool.begin().await?;
    let translations = sqlx::query_as::<Sqlite, PostTranslation>(
        "SELECT post_id, locale, title, description, slug, content_ref \
         FROM post_translations WHERE post_id = $1",
    )
    .bind(id)
    .fetch_all(&mut tx)
    .await?;
    if translations.is_empty() {
        return Err(RequestError::NotFound("Post not found"));
    }

    sqlx::query("DELETE FROM posts WHERE id = $1")
        .bind(id)
        .execute(&mut tx)
        .await?;
    tx.commit().await?;

    Ok(translations
        .into_iter()
        .filter_map(|row| {
            row.locale.parse::<Locale>().ok().map(|locale| DeletedTranslation {
                locale,
                slug: row.slug,
                content_ref: row.content_ref,
            })
        })
        .collect())
}
