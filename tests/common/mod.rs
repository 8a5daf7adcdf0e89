use std::sync::{Arc, Mutex};

use polyblog::config::Config;
use polyblog::models::Locale;
use polyblog::notifications::{Mailer, OutgoingMail};
use polyblog::search::{PostProjection, SearchIndex};
use polyblog::storage::ContentStore;
use polyblog::AppState;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use tempfile::TempDir;

pub const JWT_SECRET: &str = "integration-test-secret";

/// In-memory index double: records projections and answers substring
/// queries over them, newest write wins per slug.
#[derive(Default)]
pub struct RecordingSearchIndex {
    pub docs: Mutex<Vec<(Locale, PostProjection)>>,
    pub removed: Mutex<Vec<(Locale, String)>>,
}

#[axum::async_trait]
impl SearchIndex for RecordingSearchIndex {
    async fn index_post(&self, locale: Locale, doc: &PostProjection) -> anyhow::Result<()> {
        let mut docs = self.docs.lock().unwrap();
        docs.retain(|(l, d)| !(*l == locale && d.slug == doc.slug));
        docs.push((locale, doc.clone()));
        Ok(())
    }

    async fn remove_post(&self, locale: Locale, slug: &str) -> anyhow::Result<()> {
        self.docs
            .lock()
            .unwrap()
            .retain(|(l, d)| !(*l == locale && d.slug == slug));
        self.removed
            .lock()
            .unwrap()
            .push((locale, slug.to_string()));
        Ok(())
    }

    async fn search(&self, locale: Locale, query: &str) -> anyhow::Result<Vec<String>> {
        let query = query.to_lowercase();
        Ok(self
            .docs
            .lock()
            .unwrap()
            .iter()
            .filter(|(l, d)| {
                *l == locale && (d.title.contains(&query) || d.description.contains(&query))
            })
            .map(|(_, d)| d.slug.clone())
            .collect())
    }
}

/// Transport double: delivery always succeeds and every message is kept.
#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<OutgoingMail>>,
}

#[axum::async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, mail: &OutgoingMail) -> anyhow::Result<()> {
        self.sent.lock().unwrap().push(mail.clone());
        Ok(())
    }
}

/// One connection only: every handle sees the same in-memory database.
pub async fn test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory database");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("migrations");
    pool
}

pub struct TestApp {
    pub state: Arc<AppState>,
    pub search: Arc<RecordingSearchIndex>,
    pub mailer: Arc<RecordingMailer>,
    // Held so the upload dir outlives the test.
    #[allow(dead_code)]
    pub upload_dir: TempDir,
}

pub async fn test_state() -> TestApp {
    std::env::set_var("JWT_SECRET", JWT_SECRET);
    let pool = test_pool().await;
    let upload_dir = tempfile::tempdir().expect("temp upload dir");
    let storage = ContentStore::new(upload_dir.path()).expect("content store");
    let search = Arc::new(RecordingSearchIndex::default());
    let mailer = Arc::new(RecordingMailer::default());
    let config = Config {
        database_url: "sqlite::memory:".to_string(),
        bind_address: "127.0.0.1:0".to_string(),
        upload_dir: upload_dir.path().to_path_buf(),
        admin_email: "admin@example.com".to_string(),
        mail_from: "blog@example.com".to_string(),
        mail_api_url: None,
        search_url: None,
    };
    let state = Arc::new(AppState {
        pool,
        storage,
        search: search.clone(),
        mailer: mailer.clone(),
        config,
    });
    TestApp {
        state,
        search,
        mailer,
        upload_dir,
    }
}

/// Serves the app on a random port and waits until it answers.
pub async fn spawn_app(state: Arc<AppState>) -> String {
    let (_, address) = polyblog::get_random_free_port();
    let router = polyblog::make_router(state);
    tokio::spawn(async move {
        axum::Server::bind(&address)
            .serve(router.into_make_service())
            .await
            .unwrap();
    });

    let base = format!("http://{}", address);
    let client = reqwest::Client::new();
    for _ in 0..50 {
        if client.get(format!("{}/check_health", base)).send().await.is_ok() {
            return base;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    panic!("server never came up at {}", base);
}
