//! Read-only artwork lookup.
//!
//! The engine needs a catalog in two places: adding an artwork by id, and
//! turning remote rows (which carry only ids) back into cart entries with a
//! full artwork snapshot.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use atelier_core::{Artwork, ArtworkId};
use moka::future::Cache;
use thiserror::Error;
use tracing::{debug, instrument};

/// Errors raised by catalog lookups.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The catalog file could not be read.
    #[error("catalog I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The catalog file is not a JSON array of artworks.
    #[error("catalog parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// The catalog backend is temporarily unreachable.
    #[error("catalog unavailable: {0}")]
    Unavailable(String),
}

/// Source of artwork records.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Look up one artwork. `Ok(None)` means the id is unknown.
    async fn artwork(&self, id: &ArtworkId) -> Result<Option<Artwork>, CatalogError>;
}

// =============================================================================
// StaticCatalog
// =============================================================================

/// Catalog held entirely in memory.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    artworks: HashMap<ArtworkId, Artwork>,
}

impl StaticCatalog {
    /// Build a catalog from a list of artworks. Later duplicates win.
    #[must_use]
    pub fn from_artworks(artworks: impl IntoIterator<Item = Artwork>) -> Self {
        Self {
            artworks: artworks.into_iter().map(|a| (a.id.clone(), a)).collect(),
        }
    }

    /// Load a JSON array of artworks.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let raw = std::fs::read_to_string(path)?;
        let artworks: Vec<Artwork> = serde_json::from_str(&raw)?;
        Ok(Self::from_artworks(artworks))
    }

    /// Number of artworks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.artworks.len()
    }

    /// Returns `true` if the catalog is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.artworks.is_empty()
    }

    /// All artworks ordered by id.
    #[must_use]
    pub fn artworks(&self) -> Vec<&Artwork> {
        let mut artworks: Vec<&Artwork> = self.artworks.values().collect();
        artworks.sort_by(|a, b| a.id.cmp(&b.id));
        artworks
    }
}

#[async_trait]
impl Catalog for StaticCatalog {
    async fn artwork(&self, id: &ArtworkId) -> Result<Option<Artwork>, CatalogError> {
        Ok(self.artworks.get(id).cloned())
    }
}

// =============================================================================
// CachedCatalog
// =============================================================================

/// Wraps a catalog with an in-memory cache of found artworks (5-minute TTL).
///
/// Misses are not cached, so an artwork published after a failed lookup is
/// found on the next call.
pub struct CachedCatalog<C> {
    inner: C,
    cache: Cache<ArtworkId, Artwork>,
}

impl<C> CachedCatalog<C> {
    /// Wrap `inner` with the default cache settings.
    #[must_use]
    pub fn new(inner: C) -> Self {
        let cache = Cache::builder()
            .max_capacity(1000)
            .time_to_live(Duration::from_secs(300)) // 5 minutes
            .build();
        Self { inner, cache }
    }
}

impl<C> std::fmt::Debug for CachedCatalog<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedCatalog")
            .field("entries", &self.cache.entry_count())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<C: Catalog> Catalog for CachedCatalog<C> {
    #[instrument(skip(self), fields(artwork = %id))]
    async fn artwork(&self, id: &ArtworkId) -> Result<Option<Artwork>, CatalogError> {
        if let Some(artwork) = self.cache.get(id).await {
            debug!("Cache hit for artwork");
            return Ok(Some(artwork));
        }

        let found = self.inner.artwork(id).await?;
        if let Some(artwork) = &found {
            self.cache.insert(id.clone(), artwork.clone()).await;
        }
        Ok(found)
    }
}
