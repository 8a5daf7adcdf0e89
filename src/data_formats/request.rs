use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::models::Locale;

// ----------------- User Requests -----------------
#[derive(Deserialize, Serialize, Debug)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, Serialize, Debug)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
}

/// Identity already verified against the provider; the handshake itself
/// happens outside this service.
#[derive(Deserialize, Serialize, Debug)]
pub struct OauthLoginRequest {
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub picture: Option<String>,
}

// ----------------- Post Requests -----------------
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct TranslationInput {
    pub title: String,
    pub description: String,
    /// Markdown source for this locale.
    pub content: String,
    /// Original upload filename; defaults to `<slug>.<locale>.md`.
    #[serde(default)]
    pub content_filename: Option<String>,
}

/// One payload drives both create (no id) and update (id present).
#[derive(Deserialize, Serialize, Debug)]
pub struct SavePostRequest {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub category_id: Option<i64>,
    #[serde(default)]
    pub serie_id: Option<i64>,
    #[serde(default)]
    pub serie_order: Option<i64>,
    #[serde(default)]
    pub tag_ids: Vec<i64>,
    pub translations: HashMap<Locale, TranslationInput>,
}

// ----------------- Comment Requests -----------------
#[derive(Deserialize, Serialize, Debug)]
pub struct SubmitCommentRequest {
    pub post_id: i64,
    pub name: String,
    pub email: String,
    pub content: String,
    /// Reply target; must be a comment on the same post.
    #[serde(default, alias = "comment_id")]
    pub parent_id: Option<i64>,
}

// ----------------- Taxonomy Requests -----------------
#[derive(Deserialize, Serialize, Debug)]
pub struct CreateTagRequest {
    pub name: String,
}

#[derive(Deserialize, Serialize, Debug)]
pub struct CreateCategoryRequest {
    pub name: String,
}

#[derive(Deserialize, Serialize, Debug)]
pub struct CreateSerieRequest {
    pub names: HashMap<Locale, String>,
}

#[derive(Deserialize, Serialize, Debug)]
pub struct AddPostToSerieRequest {
    pub post_id: i64,
    #[serde(default)]
    pub order: Option<i64>,
}

// ----------------- Misc Requests -----------------
#[derive(Deserialize, Serialize, Debug)]
pub struct SubscribeRequest {
    pub email: String,
}

#[derive(Deserialize, Serialize, Debug)]
pub struct ContactRequest {
    pub name: String,
    pub email: String,
    pub message: String,
}
