use serde::{Deserialize, Serialize};

use crate::models::{Category, CommentView, PostView, SerieView, Tag, User};

#[derive(Deserialize, Serialize, Debug)]
pub struct UserResponse {
    pub email: String,
    pub token: String,
    pub name: String,
    pub picture: Option<String>,
    #[serde(rename = "isAdmin")]
    pub is_admin: bool,
}

impl UserResponse {
    pub fn new(user: User, token: String) -> UserResponse {
        UserResponse {
            email: user.email,
            token,
            name: user.name,
            picture: user.picture,
            is_admin: user.is_admin,
        }
    }
}

#[derive(Deserialize, Serialize, Debug)]
pub struct PostResponse {
    pub id: i64,
    pub locale: String,
    pub slug: String,
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub category: Option<String>,
    #[serde(rename = "serieId")]
    pub serie_id: Option<i64>,
    #[serde(rename = "serieOrder")]
    pub serie_order: Option<i64>,
    pub author: String,
    #[serde(rename = "createdAt")]
    pub created_at: String,
    /// Markdown content, only present on single-post reads.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl PostResponse {
    pub fn new(view: PostView, tags: Vec<String>, content: Option<String>) -> PostResponse {
        PostResponse {
            id: view.id,
            locale: view.locale,
            slug: view.slug,
            title: view.title,
            description: view.description,
            tags,
            category: view.category_name,
            serie_id: view.serie_id,
            serie_order: view.serie_order,
            author: view.author_name,
            created_at: view.created_at.to_string(),
            content,
        }
    }
}

#[derive(Deserialize, Serialize, Debug)]
pub struct CommentResponse {
    pub id: i64,
    #[serde(rename = "postId")]
    pub post_id: i64,
    #[serde(rename = "parentId")]
    pub parent_id: Option<i64>,
    pub author: String,
    pub body: String,
    pub approved: bool,
    #[serde(rename = "createdAt")]
    pub created_at: String,
}

impl From<CommentView> for CommentResponse {
    fn from(view: CommentView) -> CommentResponse {
        CommentResponse {
            id: view.id,
            post_id: view.post_id,
            parent_id: view.parent_id,
            author: view.author_name,
            body: view.body_html,
            approved: view.approved,
            created_at: view.created_at.to_string(),
        }
    }
}

#[derive(Deserialize, Serialize, Debug)]
pub struct TagResponse {
    pub id: i64,
    pub name: String,
}

impl From<Tag> for TagResponse {
    fn from(tag: Tag) -> TagResponse {
        TagResponse {
            id: tag.id,
            name: tag.name,
        }
    }
}

#[derive(Deserialize, Serialize, Debug)]
pub struct CategoryResponse {
    pub id: i64,
    pub name: String,
}

impl From<Category> for CategoryResponse {
    fn from(category: Category) -> CategoryResponse {
        CategoryResponse {
            id: category.id,
            name: category.name,
        }
    }
}

#[derive(Deserialize, Serialize, Debug)]
pub struct SerieResponse {
    pub id: i64,
    pub locale: String,
    pub name: String,
}

impl From<SerieView> for SerieResponse {
    fn from(serie: SerieView) -> SerieResponse {
        SerieResponse {
            id: serie.id,
            locale: serie.locale,
            name: serie.name,
        }
    }
}

#[derive(Deserialize, Serialize, Debug)]
pub struct SubscriptionResponse {
    pub email: String,
}
