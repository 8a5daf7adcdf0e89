mod common;

use common::{spawn_app, test_state};
use serde_json::{json, Value};

async fn register(client: &reqwest::Client, base: &str, email: &str, name: &str) -> String {
    let response = client
        .post(format!("{}/users", base))
        .json(&json!({"user": {"email": email, "password": "hunter2hunter", "name": name}}))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());
    let body: Value = response.json().await.unwrap();
    body["user"]["token"].as_str().unwrap().to_string()
}

async fn promote_to_admin(pool: &sqlx::SqlitePool, email: &str) {
    sqlx::query("UPDATE users SET is_admin = TRUE WHERE email = $1")
        .bind(email)
        .execute(pool)
        .await
        .unwrap();
}

fn post_body(tag_ids: &[i64]) -> Value {
    json!({
        "tag_ids": tag_ids,
        "translations": {
            "en": {
                "title": "Hello World",
                "description": "A greeting",
                "content": "# Hello\n\nwelcome"
            },
            "es": {
                "title": "Hola Mundo",
                "description": "Un saludo",
                "content": "# Hola\n\nbienvenidos"
            }
        }
    })
}

#[tokio::test]
async fn health_check_answers() {
    let app = test_state().await;
    let base = spawn_app(app.state.clone()).await;
    let response = reqwest::get(format!("{}/check_health", base)).await.unwrap();
    assert!(response.status().is_success());
    assert_eq!(response.text().await.unwrap(), "alive");
}

#[tokio::test]
async fn register_login_and_fetch_current_user() {
    let app = test_state().await;
    let base = spawn_app(app.state.clone()).await;
    let client = reqwest::Client::new();

    register(&client, &base, "ana@example.com", "Ana").await;

    let response = client
        .post(format!("{}/users/login", base))
        .json(&json!({"user": {"email": "ana@example.com", "password": "hunter2hunter"}}))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());
    let body: Value = response.json().await.unwrap();
    let token = body["user"]["token"].as_str().unwrap();
    assert_eq!(body["user"]["isAdmin"], json!(false));

    let response = client
        .get(format!("{}/user", base))
        .header("Authorization", format!("Token {}", token))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["user"]["email"], json!("ana@example.com"));

    // Wrong password is rejected.
    let response = client
        .post(format!("{}/users/login", base))
        .json(&json!({"user": {"email": "ana@example.com", "password": "wrong"}}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn oauth_identities_get_passwordless_accounts() {
    let app = test_state().await;
    let base = spawn_app(app.state.clone()).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/users/oauth", base))
        .json(&json!({"user": {"email": "bird@example.com", "name": "Bird", "picture": "https://img/b.png"}}))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());

    // Password login for an OAuth-only account fails cleanly.
    let response = client
        .post(format!("{}/users/login", base))
        .json(&json!({"user": {"email": "bird@example.com", "password": "anything"}}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn publishing_flow_end_to_end() {
    let app = test_state().await;
    let base = spawn_app(app.state.clone()).await;
    let client = reqwest::Client::new();

    let token = register(&client, &base, "author@example.com", "Author").await;
    promote_to_admin(&app.state.pool, "author@example.com").await;

    let mut tag_ids = Vec::new();
    for name in ["rust", "web"] {
        let response = client
            .post(format!("{}/admin/tags", base))
            .header("Authorization", format!("Token {}", token))
            .json(&json!({"name": name}))
            .send()
            .await
            .unwrap();
        assert!(response.status().is_success());
        let body: Value = response.json().await.unwrap();
        tag_ids.push(body["id"].as_i64().unwrap());
    }

    // Anonymous saves are rejected.
    let response = client
        .post(format!("{}/en/posts/create", base))
        .json(&post_body(&tag_ids))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::UNAUTHORIZED);

    let response = client
        .post(format!("{}/en/posts/create", base))
        .header("Authorization", format!("Token {}", token))
        .json(&post_body(&tag_ids))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["post"]["slug"], json!("hello-world"));

    // Listed newest-first in each locale.
    let body: Value = reqwest::get(format!("{}/en/posts", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["postsCount"], json!(1));

    // Single read carries tags and the stored markdown.
    let body: Value = reqwest::get(format!("{}/en/posts/hello-world", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let tags: Vec<&str> = body["post"]["tags"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t.as_str().unwrap())
        .collect();
    assert_eq!(tags, vec!["rust", "web"]);
    assert!(body["post"]["content"].as_str().unwrap().contains("# Hello"));

    // The Spanish slug resolves in the Spanish locale only.
    let response = reqwest::get(format!("{}/es/posts/hola-mundo", base)).await.unwrap();
    assert!(response.status().is_success());
    let response = reqwest::get(format!("{}/en/posts/hola-mundo", base)).await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);

    // Both locale projections hit the mirror; querying a title substring
    // finds the post again.
    assert_eq!(app.search.docs.lock().unwrap().len(), 2);
    let body: Value = reqwest::get(format!("{}/en/posts/search?query=Hello", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["postsCount"], json!(1));
    assert_eq!(body["posts"][0]["slug"], json!("hello-world"));

    // Unknown locale prefixes 404 instead of guessing.
    let response = reqwest::get(format!("{}/fr/posts", base)).await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn comment_moderation_flow_end_to_end() {
    let app = test_state().await;
    let base = spawn_app(app.state.clone()).await;
    let client = reqwest::Client::new();

    let admin_token = register(&client, &base, "admin@example.com", "Admin").await;
    promote_to_admin(&app.state.pool, "admin@example.com").await;

    let response = client
        .post(format!("{}/en/posts/create", base))
        .header("Authorization", format!("Token {}", admin_token))
        .json(&post_body(&[]))
        .send()
        .await
        .unwrap();
    let body: Value = response.json().await.unwrap();
    let post_id = body["post"]["id"].as_i64().unwrap();

    let response = client
        .post(format!("{}/en/posts/comment", base))
        .json(&json!({
            "post_id": post_id,
            "name": "Visitor",
            "email": "visitor@example.com",
            "content": "great *post*"
        }))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());
    let body: Value = response.json().await.unwrap();
    let comment_id = body["comment"]["id"].as_i64().unwrap();
    assert_eq!(body["comment"]["approved"], json!(false));

    // Acknowledgement to the commenter plus the moderation alert.
    {
        let sent = app.mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].to, "visitor@example.com");
        assert_eq!(sent[1].to, "admin@example.com");
    }

    // Admin surface is invisible to outsiders.
    let response = reqwest::get(format!("{}/admin/comments/all", base)).await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
    let outsider_token = register(&client, &base, "other@example.com", "Other").await;
    let response = client
        .get(format!("{}/admin/comments/all", base))
        .header("Authorization", format!("Token {}", outsider_token))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);

    let response = client
        .get(format!("{}/admin/comments/all", base))
        .header("Authorization", format!("Token {}", admin_token))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["comments"].as_array().unwrap().len(), 1);

    // Approval surfaces the comment; repeating it changes nothing.
    for _ in 0..2 {
        let response = client
            .get(format!("{}/admin/comments/approve/{}", base, comment_id))
            .header("Authorization", format!("Token {}", admin_token))
            .send()
            .await
            .unwrap();
        assert!(response.status().is_success());
    }
    let comments = polyblog::db_helpers::list_comments_for_post(&app.state.pool, post_id)
        .await
        .unwrap();
    assert_eq!(comments.len(), 1);
    assert!(comments[0].body_html.contains("<em>post</em>"));
}

#[tokio::test]
async fn post_deletion_cleans_mirror_and_artifacts() {
    let app = test_state().await;
    let base = spawn_app(app.state.clone()).await;
    let client = reqwest::Client::new();

    let token = register(&client, &base, "admin@example.com", "Admin").await;
    promote_to_admin(&app.state.pool, "admin@example.com").await;

    let response = client
        .post(format!("{}/en/posts/create", base))
        .header("Authorization", format!("Token {}", token))
        .json(&post_body(&[]))
        .send()
        .await
        .unwrap();
    let body: Value = response.json().await.unwrap();
    let post_id = body["post"]["id"].as_i64().unwrap();

    // Gated like every admin route.
    let response = client
        .delete(format!("{}/admin/posts/{}", base, post_id))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);

    let response = client
        .delete(format!("{}/admin/posts/{}", base, post_id))
        .header("Authorization", format!("Token {}", token))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::NO_CONTENT);

    let response = reqwest::get(format!("{}/en/posts/hello-world", base)).await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
    assert!(app.search.docs.lock().unwrap().is_empty());
    assert_eq!(app.search.removed.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn subscribe_and_contact() {
    let app = test_state().await;
    let base = spawn_app(app.state.clone()).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/es/subscribe", base))
        .json(&json!({"email": "lector@example.com"}))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["email"], json!("lector@example.com"));

    let response = client
        .post(format!("{}/en/contact", base))
        .json(&json!({"name": "Reader", "email": "reader@example.com", "message": "hi"}))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());
    {
        let sent = app.mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "admin@example.com");
        assert_eq!(sent[0].reply_to.as_deref(), Some("reader@example.com"));
    }

    // Missing fields re-render as a validation error, not a crash.
    let response = client
        .post(format!("{}/en/contact", base))
        .json(&json!({"name": "", "email": "reader@example.com", "message": "hi"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::UNPROCESSABLE_ENTITY);
}
