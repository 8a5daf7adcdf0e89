use sqlx::{Sqlite, SqlitePool};

use crate::data_formats::SubmitCommentRequest;
use crate::errors::RequestError;
use crate::models::{Comment, CommentView, Locale, User};
use crate::render_markdown;

use super::USER_COLUMNS;

const COMMENT_VIEW_QUERY: &str = r#"
            SELECT comments.id         AS "id",
                   comments.post_id    AS "post_id",
                   comments.parent_id  AS "parent_id",
                   users.name          AS "author_name",
                   comments.body_html  AS "body_html",
                   comments.approved   AS "approved",
                   comments.created_at AS "created_at"
            FROM   comments
                JOIN users
                    ON users.id = comments.author_id
     "#;

const COMMENT_RETURNING: &str =
    "RETURNING id, post_id, author_id, parent_id, body_html, approved, created_at";

/// A freshly stored comment plus everything the notification path needs.
#[derive(Debug)]
pub struct SubmittedComment {
    pub comment: Comment,
    pub commenter: User,
    pub post_title: String,
}

/// Visitor comment intake, one transaction: the post must exist, the
/// commenter is resolved or auto-provisioned by email, a reply parent must
/// live on the same post, and the body is rendered to sanitized HTML right
/// here. New comments always start unapproved.
///
/// Parents must pre-exist and are never reassigned, so the parent relation
/// cannot form a cycle.
pub async fn submit_comment(
    pool: &SqlitePool,
    locale: Locale,
    request: SubmitCommentRequest,
) -> Result<SubmittedComment, RequestError> {
    for (field, value) in [
        ("name", &request.name),
        ("email", &request.email),
        ("content", &request.content),
    ] {
        if value.trim().is_empty() {
            return Err(RequestError::ValidationFailed(format!(
                "Missing required field: {}",
                field
            )));
        }
    }

    let mut tx = pool.begin().await?;

    let post_title = sqlx::query_as::<Sqlite, (String,)>(
        "SELECT title FROM post_translations WHERE post_id = $1 AND locale = $2",
    )
    .bind(request.post_id)
    .bind(locale.as_str())
    .fetch_optional(&mut tx)
    .await?;
    let post_title = match post_title {
        Some(row) => row.0,
        None => return Err(RequestError::NotFound("Post not found")),
    };

    // First comment from an unseen address provisions a password-less
    // account.
    let select = format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS);
    let commenter = sqlx::query_as::<Sqlite, User>(&select)
        .bind(&request.email)
        .fetch_optional(&mut tx)
        .await?;
    let commenter = match commenter {
        Some(user) => user,
        None => {
            let insert = format!(
                "INSERT INTO users (email, name, password) VALUES ($1, $2, NULL) RETURNING {}",
                USER_COLUMNS
            );
            sqlx::query_as::<Sqlite, User>(&insert)
                .bind(&request.email)
                .bind(&request.name)
                .fetch_one(&mut tx)
                .await?
        }
    };

    if let Some(parent_id) = request.parent_id {
        let parent_post =
            sqlx::query_as::<Sqlite, (i64,)>("SELECT post_id FROM comments WHERE id = $1")
                .bind(parent_id)
                .fetch_optional(&mut tx)
                .await?;
        match parent_post {
            Some((post_id,)) if post_id == request.post_id => {}
            _ => return Err(RequestError::InvalidParent),
        }
    }

    let body_html = render_markdown(&request.content);
    let insert = format!(
        "INSERT INTO comments (post_id, author_id, parent_id, body_html) \
         VALUES ($1, $2, $3, $4) {}",
        COMMENT_RETURNING
    );
    let comment = sqlx::query_as::<Sqlite, Comment>(&insert)
        .bind(request.post_id)
        .bind(commenter.id)
        .bind(request.parent_id)
        .bind(&body_html)
        .fetch_one(&mut tx)
        .await?;

    tx.commit().await?;

    Ok(SubmittedComment {
        comment,
        commenter,
        post_title,
    })
}

/// Idempotent: approving an already-approved comment changes nothing and
/// raises nothing. Only a missing id is an error.
pub async fn approve_comment(pool: &SqlitePool, id: i64) -> Result<(), RequestError> {
    let mut tx = pool.begin().await?;
    let result = sqlx::query("UPDATE comments SET approved = TRUE WHERE id = $1")
        .bind(id)
        .execute(&mut tx)
        .await?;
    if result.rows_affected() == 0 {
        return Err(RequestError::NotFound("Comment not found"));
    }
    tx.commit().await?;
    Ok(())
}

/// The moderation queue: everything still waiting, oldest first.
pub async fn list_pending_comments(pool: &SqlitePool) -> Result<Vec<CommentView>, RequestError> {
    let mut tx = pool.begin().await?;
    let query = format!(
        "{} WHERE comments.approved = FALSE ORDER BY comments.created_at, comments.id",
        COMMENT_VIEW_QUERY
    );
    let result = sqlx::query_as::<Sqlite, CommentView>(&query)
        .fetch_all(&mut tx)
        .await?;
    tx.commit().await?;
    Ok(result)
}

/// Approved comments for one post, ordered so a caller walking the list can
/// rebuild the reply tree from `parent_id` alone.
pub async fn list_comments_for_post(
    pool: &SqlitePool,
    post_id: i64,
) -> Result<Vec<CommentView>, RequestError> {
    let mut tx = pool.begin().await?;
    let query = format!(
        "{} WHERE comments.post_id = $1 AND comments.approved = TRUE \
         ORDER BY comments.created_at, comments.id",
        COMMENT_VIEW_QUERY
    );
    let result = sqlx::query_as::<Sqlite, CommentView>(&query)
        .bind(post_id)
        .fetch_all(&mut tx)
        .await?;
    tx.commit().await?;
    Ok(result)
}

pub async fn get_comment_by_id(
    pool: &SqlitePool,
    id: i64,
) -> Result<Option<Comment>, RequestError> {
    let mut tx = pool.begin().await?;
    let result = sqlx::query_as::<Sqlite, Comment>(
        r#"
        SELECT id, post_id, author_id, parent_id, body_html, approved, created_at
        FROM comments
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(&mut tx)
    .await?;
    tx.commit().await?;
    Ok(result)
}
