use std::{str::FromStr, sync::Arc};

use axum::{
    extract::{Path, Query},
    http::{StatusCode, Uri},
    Extension, Json,
};
use sqlx::SqlitePool;

use crate::{
    authentication::{get_jwt_token, hash_password, require_admin, verify_password, MaybeUser},
    db_helpers,
    errors::{RequestError, RequestErrorJsonWrapper},
    models::{Locale, PostView},
    notifications::{send_best_effort, OutgoingMail},
    AppState, CategoriesWrapper, CategoryResponse, CommentResponse, CommentWrapper, ContactRequest,
    CreateCategoryRequest, CreateSerieRequest, CreateTagRequest, LoginRequest,
    MultipleCommentsWrapper, MultiplePostsWrapper, OauthLoginRequest, PostResponse, PostWrapper,
    RegisterRequest, SavePostRequest, SearchQueryParams, SerieResponse, SeriePostsWrapper,
    SerieWrapper, SubmitCommentRequest, SubscribeRequest, SubscriptionResponse, TagResponse,
    TagsWrapper, UserResponse, UserWrapper, AddPostToSerieRequest,
};

type UserJson = UserWrapper<UserResponse>;
type ErrorJson = (StatusCode, Json<RequestErrorJsonWrapper>);
type JsonResult<T> = Result<Json<T>, ErrorJson>;

// ----------------- Helper Handlers -----------------
pub async fn alive() -> &'static str {
    "alive"
}

pub async fn not_found(uri: Uri) -> Result<(), (StatusCode, String)> {
    Err((
        StatusCode::NOT_FOUND,
        format!("URL {} provided was not found", uri),
    ))
}

fn parse_locale(lang: &str) -> Result<Locale, ErrorJson> {
    Locale::from_str(lang)
        .map_err(|_| RequestError::NotFound("Unknown language").to_json_response())
}

async fn views_to_responses(
    pool: &SqlitePool,
    views: Vec<PostView>,
) -> Result<Vec<PostResponse>, RequestError> {
    let mut responses = Vec::with_capacity(views.len());
    for view in views {
        let tags = db_helpers::tags_for_post(pool, view.id).await?;
        responses.push(PostResponse::new(view, tags, None));
    }
    Ok(responses)
}

// ----------------- User Handlers -----------------
pub async fn login_user(
    Extension(state): Extension<Arc<AppState>>,
    Json(UserWrapper { user: request }): Json<UserWrapper<LoginRequest>>,
) -> JsonResult<UserJson> {
    let user = db_helpers::get_user_by_email(&state.pool, &request.email)
        .await
        .map_err(|e| e.to_json_response())?;
    let user = match user {
        Some(user) => user,
        None => {
            return Err(
                RequestError::NotAuthorized("Invalid email or password").to_json_response()
            );
        }
    };
    // Password-less accounts (OAuth, auto-provisioned commenters) cannot
    // log in this way.
    let hash = match &user.password {
        Some(hash) => hash.clone(),
        None => {
            return Err(
                RequestError::NotAuthorized("Invalid email or password").to_json_response()
            );
        }
    };
    let is_password_correct = verify_password(request.password, hash)
        .await
        .map_err(|_| RequestError::ServerError.to_json_response())?;
    if !is_password_correct {
        return Err(RequestError::NotAuthorized("Invalid email or password").to_json_response());
    }
    let token =
        get_jwt_token(user.id).map_err(|_| RequestError::ServerError.to_json_response())?;
    Ok(Json(UserWrapper::wrap_with_user_data(UserResponse::new(
        user, token,
    ))))
}

pub async fn register_user(
    Extension(state): Extension<Arc<AppState>>,
    Json(UserWrapper { mut user }): Json<UserWrapper<RegisterRequest>>,
) -> JsonResult<UserJson> {
    if user.email.trim().is_empty() || user.name.trim().is_empty() || user.password.is_empty() {
        return Err(
            RequestError::ValidationFailed("Email, name and password are required".to_string())
                .to_json_response(),
        );
    }
    user.password = hash_password(user.password)
        .await
        .map_err(|_| RequestError::ServerError.to_json_response())?;

    let user = db_helpers::insert_user(&state.pool, &user)
        .await
        .map_err(|e| {
            if e.is_unique_violation() {
                return RequestError::ValidationFailed("Email already exists".to_string())
                    .to_json_response();
            }
            e.to_json_response()
        })?;

    let token =
        get_jwt_token(user.id).map_err(|_| RequestError::ServerError.to_json_response())?;
    Ok(Json(UserWrapper::wrap_with_user_data(UserResponse::new(
        user, token,
    ))))
}

/// The provider handshake happens outside; this exchanges an already
/// verified identity for a local account and token.
pub async fn oauth_login(
    Extension(state): Extension<Arc<AppState>>,
    Json(UserWrapper { user: identity }): Json<UserWrapper<OauthLoginRequest>>,
) -> JsonResult<UserJson> {
    if identity.email.trim().is_empty() || identity.name.trim().is_empty() {
        return Err(
            RequestError::ValidationFailed("Email and name are required".to_string())
                .to_json_response(),
        );
    }
    let user = db_helpers::resolve_oauth_user(&state.pool, &identity)
        .await
        .map_err(|e| e.to_json_response())?;
    let token =
        get_jwt_token(user.id).map_err(|_| RequestError::ServerError.to_json_response())?;
    Ok(Json(UserWrapper::wrap_with_user_data(UserResponse::new(
        user, token,
    ))))
}

pub async fn get_current_user(
    Extension(state): Extension<Arc<AppState>>,
    maybe_user: MaybeUser,
) -> JsonResult<UserJson> {
    let auth = maybe_user.required().map_err(|e| e.to_json_response())?;
    let user = db_helpers::get_user_by_id(&state.pool, auth.id)
        .await
        .map_err(|e| e.to_json_response())?;
    let user = match user {
        Some(user) => user,
        None => return Err(RequestError::NotFound("User not found").to_json_response()),
    };
    Ok(Json(UserWrapper::wrap_with_user_data(UserResponse::new(
        user, auth.token,
    ))))
}

// ----------------- Post Handlers -----------------
pub async fn list_posts(
    Extension(state): Extension<Arc<AppState>>,
    Path(lang): Path<String>,
) -> JsonResult<MultiplePostsWrapper> {
    let locale = parse_locale(&lang)?;
    let views = db_helpers::list_posts(&state.pool, locale)
        .await
        .map_err(|e| e.to_json_response())?;
    let posts = views_to_responses(&state.pool, views)
        .await
        .map_err(|e| e.to_json_response())?;
    let posts_count = posts.len();
    Ok(Json(MultiplePostsWrapper { posts, posts_count }))
}

pub async fn get_post(
    Extension(state): Extension<Arc<AppState>>,
    Path((lang, slug)): Path<(String, String)>,
) -> JsonResult<PostWrapper<PostResponse>> {
    let locale = parse_locale(&lang)?;
    let view = db_helpers::get_post_by_slug(&state.pool, locale, &slug)
        .await
        .map_err(|e| e.to_json_response())?;
    let view = match view {
        Some(view) => view,
        None => return Err(RequestError::NotFound("Post not found").to_json_response()),
    };
    let content = state.storage.read(&view.content_ref).await.map_err(|e| {
        log::error!("Artifact read failed for {}: {:#}", view.content_ref, e);
        RequestError::ServerError.to_json_response()
    })?;
    let tags = db_helpers::tags_for_post(&state.pool, view.id)
        .await
        .map_err(|e| e.to_json_response())?;
    Ok(Json(PostWrapper {
        post: PostResponse::new(view, tags, Some(content)),
    }))
}

pub async fn save_post(
    Extension(state): Extension<Arc<AppState>>,
    maybe_user: MaybeUser,
    Path(lang): Path<String>,
    Json(request): Json<SavePostRequest>,
) -> JsonResult<PostWrapper<PostResponse>> {
    let locale = parse_locale(&lang)?;
    let auth = maybe_user.required().map_err(|e| e.to_json_response())?;

    let saved = db_helpers::save_post(&state.pool, &state.storage, auth.id, request)
        .await
        .map_err(|e| e.to_json_response())?;

    // The mirror is best-effort: a dead index must not fail the save that
    // already committed.
    for (projection_locale, projection) in &saved.projections {
        if let Err(e) = state.search.index_post(*projection_locale, projection).await {
            log::error!("Search mirror rejected {}: {:#}", projection.slug, e);
        }
    }

    let view = db_helpers::get_post_by_slug(&state.pool, locale, &saved.slugs[&locale])
        .await
        .map_err(|e| e.to_json_response())?
        .ok_or_else(|| RequestError::ServerError.to_json_response())?;
    let tags = db_helpers::tags_for_post(&state.pool, view.id)
        .await
        .map_err(|e| e.to_json_response())?;
    Ok(Json(PostWrapper {
        post: PostResponse::new(view, tags, None),
    }))
}

pub async fn delete_post(
    Extension(state): Extension<Arc<AppState>>,
    maybe_user: MaybeUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ErrorJson> {
    require_admin(&state.pool, &maybe_user)
        .await
        .map_err(|e| e.to_json_response())?;

    let translations = db_helpers::delete_post(&state.pool, id)
        .await
        .map_err(|e| e.to_json_response())?;

    for translation in &translations {
        if let Err(e) = state.storage.remove(&translation.content_ref).await {
            log::warn!(
                "Could not remove artifact {}: {:#}",
                translation.content_ref,
                e
            );
        }
        if let Err(e) = state
            .search
            .remove_post(translation.locale, &translation.slug)
            .await
        {
            log::error!("Search mirror still holds {}: {:#}", translation.slug, e);
        }
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn search_posts(
    Extension(state): Extension<Arc<AppState>>,
    Path(lang): Path<String>,
    Query(params): Query<SearchQueryParams>,
) -> JsonResult<MultiplePostsWrapper> {
    let locale = parse_locale(&lang)?;
    if params.query.trim().is_empty() {
        return Ok(Json(MultiplePostsWrapper {
            posts: Vec::new(),
            posts_count: 0,
        }));
    }
    let slugs = state
        .search
        .search(locale, params.query.trim())
        .await
        .map_err(|e| {
            log::error!("Search query failed: {:#}", e);
            RequestError::ServerError.to_json_response()
        })?;
    let views = db_helpers::posts_by_slugs(&state.pool, locale, &slugs)
        .await
        .map_err(|e| e.to_json_response())?;
    let posts = views_to_responses(&state.pool, views)
        .await
        .map_err(|e| e.to_json_response())?;
    let posts_count = posts.len();
    Ok(Json(MultiplePostsWrapper { posts, posts_count }))
}

// ----------------- Comment Handlers -----------------
pub async fn submit_comment(
    Extension(state): Extension<Arc<AppState>>,
    Path(lang): Path<String>,
    Json(request): Json<SubmitCommentRequest>,
) -> JsonResult<CommentWrapper<CommentResponse>> {
    let locale = parse_locale(&lang)?;
    let submitted = db_helpers::submit_comment(&state.pool, locale, request)
        .await
        .map_err(|e| e.to_json_response())?;

    // Both messages are fire-and-forget; the comment is already committed.
    send_best_effort(
        state.mailer.as_ref(),
        OutgoingMail::comment_acknowledgement(&submitted.commenter.email, &submitted.post_title),
    )
    .await;
    send_best_effort(
        state.mailer.as_ref(),
        OutgoingMail::comment_moderation_alert(
            &state.config.admin_email,
            &submitted.post_title,
            &submitted.commenter.name,
        ),
    )
    .await;

    let comment = submitted.comment;
    Ok(Json(CommentWrapper {
        comment: CommentResponse {
            id: comment.id,
            post_id: comment.post_id,
            parent_id: comment.parent_id,
            author: submitted.commenter.name,
            body: comment.body_html,
            approved: comment.approved,
            created_at: comment.created_at.to_string(),
        },
    }))
}

pub async fn admin_list_comments(
    Extension(state): Extension<Arc<AppState>>,
    maybe_user: MaybeUser,
) -> JsonResult<MultipleCommentsWrapper> {
    require_admin(&state.pool, &maybe_user)
        .await
        .map_err(|e| e.to_json_response())?;
    let comments = db_helpers::list_pending_comments(&state.pool)
        .await
        .map_err(|e| e.to_json_response())?;
    Ok(Json(MultipleCommentsWrapper {
        comments: comments.into_iter().map(CommentResponse::from).collect(),
    }))
}

pub async fn admin_approve_comment(
    Extension(state): Extension<Arc<AppState>>,
    maybe_user: MaybeUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ErrorJson> {
    require_admin(&state.pool, &maybe_user)
        .await
        .map_err(|e| e.to_json_response())?;
    db_helpers::approve_comment(&state.pool, id)
        .await
        .map_err(|e| e.to_json_response())?;
    Ok(StatusCode::OK)
}

// ----------------- Taxonomy Handlers -----------------
pub async fn list_tags(
    Extension(state): Extension<Arc<AppState>>,
) -> JsonResult<TagsWrapper> {
    let tags = db_helpers::list_tags(&state.pool)
        .await
        .map_err(|e| e.to_json_response())?;
    Ok(Json(TagsWrapper {
        tags: tags.into_iter().map(TagResponse::from).collect(),
    }))
}

pub async fn create_tag(
    Extension(state): Extension<Arc<AppState>>,
    maybe_user: MaybeUser,
    Json(request): Json<CreateTagRequest>,
) -> JsonResult<TagResponse> {
    require_admin(&state.pool, &maybe_user)
        .await
        .map_err(|e| e.to_json_response())?;
    let tag = db_helpers::create_tag(&state.pool, &request.name)
        .await
        .map_err(|e| e.to_json_response())?;
    Ok(Json(TagResponse::from(tag)))
}

pub async fn list_categories(
    Extension(state): Extension<Arc<AppState>>,
) -> JsonResult<CategoriesWrapper> {
    let categories = db_helpers::list_categories(&state.pool)
        .await
        .map_err(|e| e.to_json_response())?;
    Ok(Json(CategoriesWrapper {
        categories: categories.into_iter().map(CategoryResponse::from).collect(),
    }))
}

pub async fn create_category(
    Extension(state): Extension<Arc<AppState>>,
    maybe_user: MaybeUser,
    Json(request): Json<CreateCategoryRequest>,
) -> JsonResult<CategoryResponse> {
    require_admin(&state.pool, &maybe_user)
        .await
        .map_err(|e| e.to_json_response())?;
    let category = db_helpers::create_category(&state.pool, &request.name)
        .await
        .map_err(|e| e.to_json_response())?;
    Ok(Json(CategoryResponse::from(category)))
}

pub async fn create_serie(
    Extension(state): Extension<Arc<AppState>>,
    maybe_user: MaybeUser,
    Json(request): Json<CreateSerieRequest>,
) -> JsonResult<SerieWrapper> {
    require_admin(&state.pool, &maybe_user)
        .await
        .map_err(|e| e.to_json_response())?;
    let serie_id = db_helpers::create_serie(&state.pool, &request.names)
        .await
        .map_err(|e| e.to_json_response())?;
    let serie = db_helpers::get_serie(&state.pool, serie_id, Locale::En)
        .await
        .map_err(|e| e.to_json_response())?
        .ok_or_else(|| RequestError::ServerError.to_json_response())?;
    Ok(Json(SerieWrapper {
        serie: SerieResponse::from(serie),
    }))
}

pub async fn add_post_to_serie(
    Extension(state): Extension<Arc<AppState>>,
    maybe_user: MaybeUser,
    Path(serie_id): Path<i64>,
    Json(request): Json<AddPostToSerieRequest>,
) -> Result<StatusCode, ErrorJson> {
    require_admin(&state.pool, &maybe_user)
        .await
        .map_err(|e| e.to_json_response())?;
    db_helpers::add_post_to_serie(&state.pool, serie_id, request.post_id, request.order)
        .await
        .map_err(|e| e.to_json_response())?;
    Ok(StatusCode::OK)
}

pub async fn list_serie_posts(
    Extension(state): Extension<Arc<AppState>>,
    Path((lang, serie_id)): Path<(String, i64)>,
) -> JsonResult<SeriePostsWrapper> {
    let locale = parse_locale(&lang)?;
    let serie = db_helpers::get_serie(&state.pool, serie_id, locale)
        .await
        .map_err(|e| e.to_json_response())?;
    let serie = match serie {
        Some(serie) => serie,
        None => return Err(RequestError::NotFound("Serie not found").to_json_response()),
    };
    let views = db_helpers::list_posts_by_serie(&state.pool, serie_id, locale)
        .await
        .map_err(|e| e.to_json_response())?;
    let posts = views_to_responses(&state.pool, views)
        .await
        .map_err(|e| e.to_json_response())?;
    Ok(Json(SeriePostsWrapper {
        serie: SerieResponse::from(serie),
        posts,
    }))
}

// ----------------- Misc Handlers -----------------
pub async fn subscribe(
    Extension(state): Extension<Arc<AppState>>,
    Path(lang): Path<String>,
    Json(request): Json<SubscribeRequest>,
) -> JsonResult<SubscriptionResponse> {
    parse_locale(&lang)?;
    let subscriptor = db_helpers::subscribe_email(&state.pool, &request.email)
        .await
        .map_err(|e| e.to_json_response())?;
    Ok(Json(SubscriptionResponse {
        email: subscriptor.email,
    }))
}

pub async fn contact(
    Extension(state): Extension<Arc<AppState>>,
    Path(lang): Path<String>,
    Json(request): Json<ContactRequest>,
) -> Result<StatusCode, ErrorJson> {
    parse_locale(&lang)?;
    for (field, value) in [
        ("name", &request.name),
        ("email", &request.email),
        ("message", &request.message),
    ] {
        if value.trim().is_empty() {
            return Err(RequestError::ValidationFailed(format!(
                "Missing required field: {}",
                field
            ))
            .to_json_response());
        }
    }
    send_best_effort(
        state.mailer.as_ref(),
        OutgoingMail::contact_message(
            &state.config.admin_email,
            &request.name,
            &request.email,
            &request.message,
        ),
    )
    .await;
    Ok(StatusCode::OK)
}
