use anyhow::{Context, Result};
use chrono::{NaiveDateTime, Utc};
use serde::Serialize;
use serde_json::json;
use std::time::Duration;

use crate::models::Locale;

/// What gets mirrored into the keyword index for one (post, locale) pair.
/// The slug doubles as the document id so re-saving a post overwrites its
/// previous projection.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PostProjection {
    pub slug: String,
    pub title: String,
    pub description: String,
    pub timestamp: NaiveDateTime,
}

impl PostProjection {
    /// Title and description are lowercased going in; the index only ever
    /// answers keyword queries, never renders.
    pub fn new(slug: &str, title: &str, description: &str) -> PostProjection {
        PostProjection {
            slug: slug.to_string(),
            title: title.to_lowercase(),
            description: description.to_lowercase(),
            timestamp: Utc::now().naive_utc(),
        }
    }
}

/// External keyword-search collaborator. The platform only mirrors
/// projections in and gets ranked slugs back; indexing and ranking are the
/// collaborator's business.
#[axum::async_trait]
pub trait SearchIndex: Send + Sync {
    async fn index_post(&self, locale: Locale, doc: &PostProjection) -> Result<()>;
    async fn remove_post(&self, locale: Locale, slug: &str) -> Result<()>;
    /// Ranked slugs matching `query` over title and description.
    async fn search(&self, locale: Locale, query: &str) -> Result<Vec<String>>;
}

fn index_name(locale: Locale) -> String {
    format!("post_{}", locale)
}

/// REST client for an Elasticsearch-compatible index, one index per locale.
pub struct HttpSearchIndex {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSearchIndex {
    pub fn new(base_url: &str) -> Result<HttpSearchIndex> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(15))
            .build()
            .context("Failed to build search client")?;
        Ok(HttpSearchIndex {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[axum::async_trait]
impl SearchIndex for HttpSearchIndex {
    async fn index_post(&self, locale: Locale, doc: &PostProjection) -> Result<()> {
        let url = format!(
            "{}/{}/_doc/{}",
            self.base_url,
            index_name(locale),
            doc.slug
        );
        let body = json!({
            "title": doc.title,
            "description": doc.description,
            "timestamp": doc.timestamp.and_utc().timestamp(),
        });
        let response = self.client.put(&url).json(&body).send().await?;
        response
            .error_for_status()
            .with_context(|| format!("Indexing {} failed", doc.slug))?;
        Ok(())
    }

    async fn remove_post(&self, locale: Locale, slug: &str) -> Result<()> {
        let url = format!("{}/{}/_doc/{}", self.base_url, index_name(locale), slug);
        let response = self.client.delete(&url).send().await?;
        // The document may never have been indexed.
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(());
        }
        response
            .error_for_status()
            .with_context(|| format!("Removing {} failed", slug))?;
        Ok(())
    }

    async fn search(&self, locale: Locale, query: &str) -> Result<Vec<String>> {
        let url = format!("{}/{}/_search", self.base_url, index_name(locale));
        let body = json!({
            "query": {
                "multi_match": {
                    "query": query,
                    "fields": ["title", "description"],
                }
            }
        });
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await?
            .error_for_status()
            .context("Search query failed")?;
        let payload: serde_json::Value = response.json().await?;
        let hits = payload["hits"]["hits"]
            .as_array()
            .cloned()
            .unwrap_or_default();
        Ok(hits
            .iter()
            .filter_map(|hit| hit["_id"].as_str().map(str::to_string))
            .collect())
    }
}

/// Stand-in when no index is configured: mirrors vanish, queries match
/// nothing.
pub struct NullSearchIndex;

#[axum::async_trait]
impl SearchIndex for NullSearchIndex {
    async fn index_post(&self, _locale: Locale, _doc: &PostProjection) -> Result<()> {
        Ok(())
    }

    async fn remove_post(&self, _locale: Locale, _slug: &str) -> Result<()> {
        Ok(())
    }

    async fn search(&self, _locale: Locale, _query: &str) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}
