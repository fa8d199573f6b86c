//! The catalog data model.
//!
//! All records are immutable once fetched: the remote catalog never rewrites
//! an entity, so nothing here carries freshness information.

use serde::{Deserialize, Serialize};
use url::Url;

/// How many behaviors a detail record keeps after normalization.
///
/// The remote catalog ships the full behavior list, which can run into the
/// hundreds per entity; only the top entries are interesting for display.
pub const MAX_BEHAVIORS: usize = 12;

/// One (name, locator) pair from the full catalog index.
///
/// The index is fetched once at preload and is the authoritative enumeration
/// of all valid names and locators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexReference {
    /// The unique display name.
    pub name: String,
    /// Absolute locator of the entity's detail resource.
    pub url: Url,
}

impl IndexReference {
    /// Parses the numeric id from the locator's trailing path segment.
    pub fn id(&self) -> Option<u64> {
        self.url
            .path_segments()?
            .filter(|segment| !segment.is_empty())
            .next_back()?
            .parse()
            .ok()
    }
}

/// The wire shape of the catalog's list endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexPage {
    /// Total number of entities in the catalog.
    pub count: u64,
    /// The references on this page.
    pub results: Vec<IndexReference>,
}

/// Image locators attached to a detail record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sprites {
    /// The representative front-facing image.
    #[serde(default)]
    pub front: Option<String>,
    /// The back-facing image, if any.
    #[serde(default)]
    pub back: Option<String>,
    /// High-resolution artwork, if any.
    #[serde(default)]
    pub artwork: Option<String>,
}

/// A named measurable attribute (e.g. "ferocity": 87).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Measurement {
    pub name: String,
    pub value: u32,
}

/// A named sub-attribute of an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedAttribute {
    pub name: String,
    #[serde(default)]
    pub hidden: bool,
}

/// The immutable detail record for one entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Stable primary key, globally unique, assigned by the remote source.
    pub id: u64,
    /// Unique display name, usable as an alternate key.
    pub name: String,
    #[serde(default)]
    pub height: u32,
    #[serde(default)]
    pub weight: u32,
    #[serde(default)]
    pub sprites: Sprites,
    /// Categorized tags ("aquatic", "venomous", ...).
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub stats: Vec<Measurement>,
    #[serde(default)]
    pub abilities: Vec<NamedAttribute>,
    /// Behavior list, capped to the top [`MAX_BEHAVIORS`] after fetch.
    #[serde(default)]
    pub moves: Vec<String>,
}

impl CatalogEntry {
    /// Caps unbounded list fields after deserialization.
    pub(crate) fn normalize(mut self) -> Self {
        self.moves.truncate(MAX_BEHAVIORS);
        self
    }
}

/// A derived, low-cost projection of a [`CatalogEntry`] for list rendering.
///
/// Summaries are cached independently from full entries and may exist without
/// the full record being cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogSummary {
    pub id: u64,
    pub name: String,
    /// One representative image, if the entry has any.
    pub image: Option<String>,
    pub categories: Vec<String>,
}

impl From<&CatalogEntry> for CatalogSummary {
    fn from(entry: &CatalogEntry) -> Self {
        Self {
            id: entry.id,
            name: entry.name.clone(),
            image: entry
                .sprites
                .front
                .clone()
                .or_else(|| entry.sprites.artwork.clone()),
            categories: entry.categories.clone(),
        }
    }
}

impl CatalogSummary {
    /// A minimal summary for a match whose detail fetch failed.
    ///
    /// Only the name and (when the locator carries one) the id are populated,
    /// so the match can still be listed instead of failing the whole search.
    pub fn placeholder(reference: &IndexReference) -> Self {
        Self {
            id: reference.id().unwrap_or(0),
            name: reference.name.clone(),
            image: None,
            categories: Vec::new(),
        }
    }
}

/// A point-in-time snapshot of cache and registry occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Cached full detail records.
    pub entries: usize,
    /// Cached derived summaries.
    pub summaries: usize,
    /// Cached index pages.
    pub index_pages: usize,
    /// Operations currently in flight.
    pub pending: usize,
}
