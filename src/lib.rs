pub mod authentication;
pub mod config;
pub mod data_formats;
pub mod db_helpers;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod notifications;
pub mod search;
pub mod storage;

use anyhow::Context;
pub use anyhow::Result;
use axum::http::StatusCode;
use axum::{routing::*, Extension, Json, Router};
pub use data_formats::*;
use handlers::*;
use pulldown_cmark::{html as md_html, Event, Parser};
use sqlx::{migrate::MigrateDatabase, Sqlite, SqlitePool};
use std::{
    net::{SocketAddr, TcpListener},
    sync::Arc,
};

use crate::config::Config;
use crate::notifications::{HttpMailer, Mailer, NullMailer};
use crate::search::{HttpSearchIndex, NullSearchIndex, SearchIndex};
use crate::storage::ContentStore;

pub type JsonResponse<T> = (StatusCode, Json<T>);

/// Everything a handler needs: the pool, the artifact store and the two
/// external collaborators. Injected as one `Extension<Arc<AppState>>`.
pub struct AppState {
    pub pool: SqlitePool,
    pub storage: ContentStore,
    pub search: Arc<dyn SearchIndex>,
    pub mailer: Arc<dyn Mailer>,
    pub config: Config,
}

pub async fn run_app(config: Config) -> Result<()> {
    let pool = init_db(&config.database_url).await?;
    let storage = ContentStore::new(&config.upload_dir)?;
    let search: Arc<dyn SearchIndex> = match &config.search_url {
        Some(url) => Arc::new(HttpSearchIndex::new(url)?),
        None => Arc::new(NullSearchIndex),
    };
    let mailer: Arc<dyn Mailer> = match &config.mail_api_url {
        Some(url) => Arc::new(HttpMailer::new(url, &config.mail_from)?),
        None => Arc::new(NullMailer),
    };
    let address: SocketAddr = config
        .bind_address
        .parse()
        .with_context(|| format!("Invalid bind address {}", config.bind_address))?;
    let state = Arc::new(AppState {
        pool,
        storage,
        search,
        mailer,
        config,
    });
    let app = make_router(state);
    log::info!("Listening on {}", address);
    axum::Server::bind(&address)
        .serve(app.into_make_service())
        .await?;
    Ok(())
}

pub async fn init_db(db_url: &str) -> Result<SqlitePool> {
    if !Sqlite::database_exists(db_url).await.unwrap_or(false) {
        log::info!("Creating database {}", db_url);
        Sqlite::create_database(db_url)
            .await
            .context("Failed to create database")?;
    }
    let pool = SqlitePool::connect(db_url).await?;
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;
    Ok(pool)
}

pub fn get_random_free_port() -> (u16, SocketAddr) {
    let listener = TcpListener::bind("localhost:0").unwrap();
    match listener.local_addr() {
        Ok(addr) => (addr.port(), addr),
        Err(_) => panic!("Could not get a free port"),
    }
}

pub fn make_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/check_health", get(alive))
        .route("/users", post(register_user))
        .route("/users/login", post(login_user))
        .route("/users/oauth", post(oauth_login))
        .route("/user", get(get_current_user))
        .route("/tags", get(list_tags))
        .route("/categories", get(list_categories))
        .route("/admin/tags", post(create_tag))
        .route("/admin/categories", post(create_category))
        .route("/admin/series", post(create_serie))
        .route("/admin/series/:id/posts", post(add_post_to_serie))
        .route("/admin/posts/:id", delete(delete_post))
        .route("/admin/comments/all", get(admin_list_comments))
        .route("/admin/comments/approve/:id", get(admin_approve_comment))
        .route("/:lang/posts", get(list_posts))
        .route("/:lang/posts/create", post(save_post))
        .route("/:lang/posts/comment", post(submit_comment))
        .route("/:lang/posts/search", get(search_posts))
        .route("/:lang/posts/:slug", get(get_post))
        .route("/:lang/series/:id", get(list_serie_posts))
        .route("/:lang/subscribe", post(subscribe))
        .route("/:lang/contact", post(contact))
        .fallback(not_found)
        .layer(Extension(state))
}

/// URL key derivation: lowercase the title and turn spaces into hyphens.
/// Deterministic on purpose; saving the same title twice must collide.
pub fn slugify(title: &str) -> String {
    title.to_lowercase().replace(' ', "-")
}

/// Markdown to HTML with raw HTML blocks and inline HTML dropped, so
/// visitor-supplied comments cannot smuggle markup through. Comments are
/// rendered once, at write time.
pub fn render_markdown(input: &str) -> String {
    let parser =
        Parser::new(input).filter(|event| !matches!(event, Event::Html(_) | Event::InlineHtml(_)));
    let mut out = String::new();
    md_html::push_html(&mut out, parser);
    out
}

/// Strips path separators and anything exotic from an uploaded filename
/// before it touches the filesystem. The result is always a single path
/// component.
pub fn sanitize_filename(name: &str) -> String {
    let name: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '-'
            }
        })
        .collect();
    // "." and ".." are the only single components that still traverse.
    if name.is_empty() || name == "." || name == ".." {
        return "-".to_string();
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_lowercases_and_hyphenates() {
        assert_eq!(slugify("My First Post"), "my-first-post");
        assert_eq!(slugify("Ya está"), "ya-está");
        assert_eq!(slugify("nochange"), "nochange");
    }

    #[test]
    fn markdown_renders_basic_blocks() {
        let html = render_markdown("# Title\n\nSome *text*");
        assert!(html.contains("<h1>Title</h1>"));
        assert!(html.contains("<em>text</em>"));
    }

    #[test]
    fn markdown_drops_raw_html() {
        let html = render_markdown("hello <script>alert(1)</script> world");
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn filenames_lose_path_separators() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "..-..-etc-passwd");
        assert_eq!(sanitize_filename("notes v2.md"), "notes-v2.md");
        assert_eq!(sanitize_filename(".."), "-");
        assert_eq!(sanitize_filename(""), "-");
    }
}
