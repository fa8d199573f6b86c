use std::fmt;

use url::Url;

/// The logical key identifying one cacheable / dedup-able operation.
///
/// Keys are namespaced by operation kind so that unrelated operations never
/// collide: fetching entry `25` and fetching the index at limit `25` are
/// different keys even though both contain "25".
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// The key for a detail record fetched by name or id.
    ///
    /// Names and ids are case-folded so `Kelpie` and `kelpie` share one slot.
    pub fn for_entry(name_or_id: &str) -> Self {
        Self(format!("entry:{}", name_or_id.trim().to_ascii_lowercase()))
    }

    /// The key for a detail record fetched through an absolute locator.
    pub fn for_url(url: &Url) -> Self {
        Self(format!("url:{url}"))
    }

    /// The key for one index page at the given limit.
    pub fn for_index(limit: usize) -> Self {
        Self(format!("index:{limit}"))
    }

    /// The key for a derived summary, by display name.
    pub fn for_summary(name: &str) -> Self {
        Self(format!("summary:{}", name.trim().to_ascii_lowercase()))
    }

    /// The raw string form of the key.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
