use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The two languages the platform publishes in. Everything translatable
/// keys its rows on one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    En,
    Es,
}

impl Locale {
    pub const ALL: [Locale; 2] = [Locale::En, Locale::Es];

    pub fn as_str(&self) -> &'static str {
        match self {
            Locale::En => "en",
            Locale::Es => "es",
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Locale {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "en" => Ok(Locale::En),
            "es" => Ok(Locale::Es),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub picture: Option<String>,
    pub is_admin: bool,
    // None for accounts provisioned from an OAuth identity or a comment.
    pub password: Option<String>,
    pub created_at: NaiveDateTime,
}

/// Language-neutral envelope; all human-readable fields live in the
/// translation rows.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Post {
    pub id: i64,
    pub author_id: i64,
    pub category_id: Option<i64>,
    pub serie_id: Option<i64>,
    pub serie_order: Option<i64>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PostTranslation {
    pub post_id: i64,
    pub locale: String,
    pub title: String,
    pub description: String,
    pub slug: String,
    pub content_ref: String,
}

/// A post joined with one locale's translation plus the display fields the
/// handlers need. This is what every read path returns.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PostView {
    pub id: i64,
    pub author_id: i64,
    pub author_name: String,
    pub category_id: Option<i64>,
    pub category_name: Option<String>,
    pub serie_id: Option<i64>,
    pub serie_order: Option<i64>,
    pub locale: String,
    pub title: String,
    pub description: String,
    pub slug: String,
    pub content_ref: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Tag {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Category {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SerieView {
    pub id: i64,
    pub locale: String,
    pub name: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Comment {
    pub id: i64,
    pub post_id: i64,
    pub author_id: i64,
    pub parent_id: Option<i64>,
    pub body_html: String,
    pub approved: bool,
    pub created_at: NaiveDateTime,
}

/// Comment joined with its author's display name for rendering.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CommentView {
    pub id: i64,
    pub post_id: i64,
    pub parent_id: Option<i64>,
    pub author_name: String,
    pub body_html: String,
    pub approved: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Subscriptor {
    pub id: i64,
    pub email: String,
}
