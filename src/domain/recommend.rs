// src/domain/recommend.rs
use std::collections::HashSet;

use crate::domain::publication::PublicationSnapshot;
use crate::errors::ServerError;

#[derive(Debug, Clone)]
pub struct RecommendConfig {
    /// Size of the global-popularity fallback.
    pub fallback_limit: usize,
}

impl Default for RecommendConfig {
    fn default() -> Self {
        Self { fallback_limit: 5 }
    }
}

/// Distinct categories from a user's view and donation history.
/// Recomputed per request, never persisted.
#[derive(Debug, Default, Clone)]
pub struct CategoryHistory {
    pub viewed: HashSet<String>,
    pub donated: HashSet<String>,
}

impl CategoryHistory {
    pub fn preferred_categories(&self) -> HashSet<String> {
        self.viewed.union(&self.donated).cloned().collect()
    }
}

/// Pick publications matching the user's preferred categories, falling back
/// to global popularity when nothing matches (or the history is empty).
///
/// The fetchers close over the repository; `fetch_by_category` must already
/// exclude the requesting user's own publications. The preferred-category
/// branch is returned in repository order, deliberately unranked.
///
/// Repository errors propagate untouched.
pub fn recommend_for_user<F, G>(
    history: &CategoryHistory,
    fetch_by_category: F,
    fetch_popular: G,
    cfg: &RecommendConfig,
) -> Result<Vec<PublicationSnapshot>, ServerError>
where
    F: FnOnce(&HashSet<String>) -> Result<Vec<PublicationSnapshot>, ServerError>,
    G: FnOnce(usize) -> Result<Vec<PublicationSnapshot>, ServerError>,
{
    let preferred = history.preferred_categories();

    let matched = if preferred.is_empty() {
        Vec::new()
    } else {
        fetch_by_category(&preferred)?
    };

    if matched.is_empty() {
        return fetch_popular(cfg.fallback_limit);
    }
    Ok(matched)
}
