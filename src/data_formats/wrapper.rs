use serde::{Deserialize, Serialize};

use super::response::{CategoryResponse, CommentResponse, PostResponse, SerieResponse, TagResponse};

#[derive(Debug, Deserialize, Serialize)]
pub struct UserWrapper<T> {
    pub user: T,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct PostWrapper<T> {
    pub post: T,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct MultiplePostsWrapper {
    pub posts: Vec<PostResponse>,
    #[serde(rename = "postsCount")]
    pub posts_count: usize,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct CommentWrapper<T> {
    pub comment: T,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct MultipleCommentsWrapper {
    pub comments: Vec<CommentResponse>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct TagsWrapper {
    pub tags: Vec<TagResponse>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct CategoriesWrapper {
    pub categories: Vec<CategoryResponse>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct SerieWrapper {
    pub serie: SerieResponse,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct SeriePostsWrapper {
    pub serie: SerieResponse,
    pub posts: Vec<PostResponse>,
}

impl<T> UserWrapper<T> {
    pub fn wrap_with_user_data(request: T) -> UserWrapper<T> {
        UserWrapper { user: request }
    }
}
