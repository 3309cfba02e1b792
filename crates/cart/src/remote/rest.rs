//! PostgREST-style HTTP implementation of the remote mirror.
//!
//! Tables:
//!
//! - `cart_items (user_id, artwork_id, quantity, created_at)`, unique on
//!   `(user_id, artwork_id)`
//! - `wishlist_items (user_id, artwork_id, created_at)`, unique on
//!   `(user_id, artwork_id)`
//!
//! Every request carries the API key both as `apikey` and as a bearer token.

use std::sync::Arc;

use async_trait::async_trait;
use atelier_core::{ArtworkId, UserId};
use reqwest::{Method, RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use tracing::{debug, error, instrument};
use url::Url;

use super::{RemoteCartRow, RemoteError, RemoteMirror, RemoteWishlistRow};
use crate::config::RemoteConfig;

const CART_TABLE: &str = "cart_items";
const WISHLIST_TABLE: &str = "wishlist_items";
const CONFLICT_KEY: &str = "user_id,artwork_id";

/// Maximum number of body characters kept in errors and logs.
const BODY_EXCERPT: usize = 200;

/// Client for a PostgREST (Supabase-compatible) remote store.
#[derive(Clone)]
pub struct RestMirror {
    inner: Arc<RestMirrorInner>,
}

struct RestMirrorInner {
    client: reqwest::Client,
    base_url: Url,
    api_key: SecretString,
}

impl std::fmt::Debug for RestMirror {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestMirror")
            .field("base_url", &self.inner.base_url.as_str())
            .field("api_key", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl RestMirror {
    /// Build a mirror with its own HTTP client honouring the configured timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(config: &RemoteConfig) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self::with_client(client, config))
    }

    /// Build a mirror around an existing HTTP client.
    #[must_use]
    pub fn with_client(client: reqwest::Client, config: &RemoteConfig) -> Self {
        Self {
            inner: Arc::new(RestMirrorInner {
                client,
                base_url: config.base_url.clone(),
                api_key: config.api_key.clone(),
            }),
        }
    }

    /// `<base>/rest/v1/<table>` with the given query pairs.
    fn table_url(&self, table: &str, query: &[(&str, &str)]) -> Result<Url, RemoteError> {
        let mut url = self.inner.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| {
                RemoteError::Unavailable(format!("invalid remote URL {}", self.inner.base_url))
            })?
            .pop_if_empty()
            .extend(["rest", "v1", table]);

        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let key = self.inner.api_key.expose_secret();
        self.inner
            .client
            .request(method, url)
            .header("apikey", key)
            .bearer_auth(key)
    }

    /// Send a request and return the body of a successful response.
    async fn execute(&self, request: RequestBuilder) -> Result<String, RemoteError> {
        let response = request.send().await.map_err(classify)?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(RemoteError::RateLimited(retry_after));
        }

        let body = response.text().await.map_err(classify)?;

        if !status.is_success() {
            let excerpt: String = body.chars().take(BODY_EXCERPT).collect();
            error!(status = %status, body = %excerpt, "Remote mirror returned non-success status");
            return Err(RemoteError::Status {
                status: status.as_u16(),
                body: excerpt,
            });
        }

        Ok(body)
    }
}

/// Separate timeouts from other transport failures.
fn classify(e: reqwest::Error) -> RemoteError {
    if e.is_timeout() {
        RemoteError::Timeout
    } else {
        RemoteError::Http(e)
    }
}

fn eq(value: &str) -> String {
    format!("eq.{value}")
}

#[async_trait]
impl RemoteMirror for RestMirror {
    #[instrument(skip(self), fields(user = %user, artwork = %artwork_id))]
    async fn upsert_cart_item(
        &self,
        user: &UserId,
        artwork_id: &ArtworkId,
        quantity: u32,
    ) -> Result<(), RemoteError> {
        let url = self.table_url(CART_TABLE, &[("on_conflict", CONFLICT_KEY)])?;
        let body = json!([{
            "user_id": user,
            "artwork_id": artwork_id,
            "quantity": quantity,
        }]);
        self.execute(
            self.request(Method::POST, url)
                .header("Prefer", "resolution=merge-duplicates,return=minimal")
                .json(&body),
        )
        .await?;
        debug!("Upserted cart row");
        Ok(())
    }

    #[instrument(skip(self), fields(user = %user, artwork = %artwork_id))]
    async fn update_cart_quantity(
        &self,
        user: &UserId,
        artwork_id: &ArtworkId,
        quantity: u32,
    ) -> Result<(), RemoteError> {
        let user_filter = eq(user.as_str());
        let artwork_filter = eq(artwork_id.as_str());
        let url = self.table_url(
            CART_TABLE,
            &[("user_id", user_filter.as_str()), ("artwork_id", artwork_filter.as_str())],
        )?;
        self.execute(
            self.request(Method::PATCH, url)
                .header("Prefer", "return=minimal")
                .json(&json!({ "quantity": quantity })),
        )
        .await?;
        Ok(())
    }

    #[instrument(skip(self), fields(user = %user, artwork = %artwork_id))]
    async fn delete_cart_item(
        &self,
        user: &UserId,
        artwork_id: &ArtworkId,
    ) -> Result<(), RemoteError> {
        let user_filter = eq(user.as_str());
        let artwork_filter = eq(artwork_id.as_str());
        let url = self.table_url(
            CART_TABLE,
            &[("user_id", user_filter.as_str()), ("artwork_id", artwork_filter.as_str())],
        )?;
        self.execute(self.request(Method::DELETE, url)).await?;
        Ok(())
    }

    #[instrument(skip(self), fields(user = %user, artwork = %artwork_id))]
    async fn insert_wishlist_item(
        &self,
        user: &UserId,
        artwork_id: &ArtworkId,
    ) -> Result<(), RemoteError> {
        let url = self.table_url(WISHLIST_TABLE, &[("on_conflict", CONFLICT_KEY)])?;
        let body = json!([{ "user_id": user, "artwork_id": artwork_id }]);
        self.execute(
            self.request(Method::POST, url)
                .header("Prefer", "resolution=ignore-duplicates,return=minimal")
                .json(&body),
        )
        .await?;
        Ok(())
    }

    #[instrument(skip(self), fields(user = %user, artwork = %artwork_id))]
    async fn delete_wishlist_item(
        &self,
        user: &UserId,
        artwork_id: &ArtworkId,
    ) -> Result<(), RemoteError> {
        let user_filter = eq(user.as_str());
        let artwork_filter = eq(artwork_id.as_str());
        let url = self.table_url(
            WISHLIST_TABLE,
            &[("user_id", user_filter.as_str()), ("artwork_id", artwork_filter.as_str())],
        )?;
        self.execute(self.request(Method::DELETE, url)).await?;
        Ok(())
    }

    #[instrument(skip(self), fields(user = %user))]
    async fn fetch_cart(&self, user: &UserId) -> Result<Vec<RemoteCartRow>, RemoteError> {
        let user_filter = eq(user.as_str());
        let url = self.table_url(
            CART_TABLE,
            &[
                ("select", "artwork_id,quantity"),
                ("user_id", user_filter.as_str()),
                ("order", "created_at.asc"),
            ],
        )?;
        let body = self.execute(self.request(Method::GET, url)).await?;
        Ok(serde_json::from_str(&body)?)
    }

    #[instrument(skip(self), fields(user = %user))]
    async fn fetch_wishlist(&self, user: &UserId) -> Result<Vec<RemoteWishlistRow>, RemoteError> {
        let user_filter = eq(user.as_str());
        let url = self.table_url(
            WISHLIST_TABLE,
            &[
                ("select", "artwork_id"),
                ("user_id", user_filter.as_str()),
                ("order", "created_at.asc"),
            ],
        )?;
        let body = self.execute(self.request(Method::GET, url)).await?;
        Ok(serde_json::from_str(&body)?)
    }
}
