use tracing::{debug, info, warn};
use url::Url;

use crate::gateway::{Fetcher, OfflineCacheGateway, Request};
use crate::models::{normalize_category, MenuItem};
use crate::utils::contains_ignore_case;

use super::CatalogError;

/// Category filter value that matches every item.
pub const ALL_CATEGORIES: &str = "all";

/// Fetch and decode the menu through the gateway.
pub async fn fetch_catalog<F: Fetcher>(
    gateway: &OfflineCacheGateway<F>,
    url: &Url,
) -> Result<Vec<MenuItem>, CatalogError> {
    let response = gateway
        .intercept(&Request::get(url.clone()))
        .await?
        .ok_or(CatalogError::Unavailable)?;

    if !response.is_success() {
        return Err(CatalogError::from_status(response.status, &response.body));
    }

    let items: Vec<MenuItem> = serde_json::from_slice(&response.body)?;
    debug!(count = items.len(), "Menu decoded");
    Ok(items)
}

/// The menu items for the current session plus the active filter state.
///
/// Category selection and text search are mutually exclusive views over the
/// same collection: selecting a category clears the search, searching leaves
/// the category alone.
#[derive(Debug, Clone)]
pub struct CatalogStore {
    items: Option<Vec<MenuItem>>,
    active_category: String,
    search_query: String,
}

impl Default for CatalogStore {
    fn default() -> Self {
        Self {
            items: None,
            active_category: ALL_CATEGORIES.to_string(),
            search_query: String::new(),
        }
    }
}

impl CatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the menu, replacing the current collection.
    ///
    /// On failure the collection is cleared, never left half-updated.
    pub async fn load<F: Fetcher>(
        &mut self,
        gateway: &OfflineCacheGateway<F>,
        url: &Url,
    ) -> Result<usize, CatalogError> {
        match fetch_catalog(gateway, url).await {
            Ok(items) => Ok(self.replace(items)),
            Err(e) => {
                warn!(url = %url, error = %e, "Failed to load menu");
                self.clear();
                Err(e)
            }
        }
    }

    /// Replace the whole collection. Returns the new item count.
    pub fn replace(&mut self, items: Vec<MenuItem>) -> usize {
        let count = items.len();
        info!(count, "Loaded menu items");
        self.items = Some(items);
        count
    }

    pub fn clear(&mut self) {
        self.items = None;
    }

    pub fn is_loaded(&self) -> bool {
        self.items.is_some()
    }

    pub fn items(&self) -> &[MenuItem] {
        self.items.as_deref().unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.items().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items().is_empty()
    }

    pub fn active_category(&self) -> &str {
        &self.active_category
    }

    pub fn search_query(&self) -> &str {
        &self.search_query
    }

    /// Distinct categories in first-seen order
    pub fn categories(&self) -> Vec<String> {
        let mut seen: Vec<String> = Vec::new();
        for item in self.items() {
            let key = item.category_key();
            if !key.is_empty() && !seen.contains(&key) {
                seen.push(key);
            }
        }
        seen
    }

    /// Select a category and return the matching items.
    ///
    /// `"all"` matches everything. Clears any text search.
    pub fn filter_by_category(&mut self, category: &str) -> Vec<&MenuItem> {
        self.active_category = normalize_category(category);
        self.search_query.clear();
        let items = by_category(self.items(), &self.active_category);
        debug!(category = %self.active_category, showing = items.len(), "Filtered by category");
        items
    }

    /// Search item names and return the matches.
    ///
    /// Searches the whole collection; the active category is kept.
    pub fn filter_by_name(&mut self, query: &str) -> Vec<&MenuItem> {
        self.search_query = query.to_string();
        let items = by_name(self.items(), &self.search_query);
        debug!(query = %self.search_query, found = items.len(), "Filtered by name");
        items
    }

    /// First `limit` specials in menu order.
    pub fn select_specials(&self, limit: usize) -> Vec<&MenuItem> {
        self.items()
            .iter()
            .filter(|item| item.special)
            .take(limit)
            .collect()
    }

    /// Items currently on screen: search results while a query is active,
    /// otherwise the active category.
    pub fn visible(&self) -> Vec<&MenuItem> {
        if self.search_query.trim().is_empty() {
            by_category(self.items(), &self.active_category)
        } else {
            by_name(self.items(), &self.search_query)
        }
    }
}

fn by_category<'a>(items: &'a [MenuItem], category: &str) -> Vec<&'a MenuItem> {
    let category = normalize_category(category);
    items
        .iter()
        .filter(|item| category == ALL_CATEGORIES || item.category_key() == category)
        .collect()
}

fn by_name<'a>(items: &'a [MenuItem], query: &str) -> Vec<&'a MenuItem> {
    let query = query.trim();
    items
        .iter()
        .filter(|item| query.is_empty() || contains_ignore_case(&item.name, query))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::gateway::worker::tests::{options, FakeNetwork, ORIGIN};
    use crate::gateway::CacheStorage;

    fn item(name: &str, category: &str, price: f64, special: bool) -> MenuItem {
        MenuItem {
            name: name.to_string(),
            category: category.to_string(),
            price,
            special,
            ..Default::default()
        }
    }

    fn sample() -> Vec<MenuItem> {
        vec![
            item("Masala Tea", "drinks", 20.0, false),
            item("Samosa", "snacks", 30.0, true),
            item("Cold Coffee", "Drinks", 60.0, true),
            item("Veg Puff", "snacks", 25.0, false),
            item("Paneer Roll", "rolls", 90.0, true),
            item("Lime Soda", "", 40.0, false),
        ]
    }

    fn names(items: &[&MenuItem]) -> Vec<String> {
        items.iter().map(|i| i.name.clone()).collect()
    }

    fn store() -> CatalogStore {
        let mut store = CatalogStore::new();
        store.replace(sample());
        store
    }

    #[test]
    fn test_spec_example_scenario() {
        let mut store = CatalogStore::new();
        store.replace(vec![
            item("Tea", "drinks", 20.0, false),
            item("Samosa", "snacks", 30.0, true),
        ]);
        assert_eq!(names(&store.select_specials(5)), vec!["Samosa"]);
        assert_eq!(names(&store.filter_by_category("drinks")), vec!["Tea"]);
    }

    #[test]
    fn test_all_returns_full_catalog_in_order() {
        let mut store = store();
        let all = names(&store.filter_by_category(ALL_CATEGORIES));
        let expected: Vec<String> = sample().into_iter().map(|i| i.name).collect();
        assert_eq!(all, expected);
    }

    #[test]
    fn test_category_match_is_case_normalized() {
        let mut store = store();
        let drinks = names(&store.filter_by_category("DRINKS"));
        assert_eq!(drinks, vec!["Masala Tea", "Cold Coffee"]);
        assert_eq!(store.active_category(), "drinks");
    }

    #[test]
    fn test_categories_partition_catalog() {
        let mut store = store();
        let categories = store.categories();
        assert_eq!(categories, vec!["drinks", "snacks", "rolls"]);

        let mut seen = Vec::new();
        for category in &categories {
            for matched in store.filter_by_category(category) {
                assert_eq!(matched.category_key(), *category);
                seen.push(matched.name.clone());
            }
        }
        // Items with no category match none of the filters
        let unmatched: Vec<String> = store
            .items()
            .iter()
            .filter(|i| !categories.contains(&i.category_key()))
            .map(|i| i.name.clone())
            .collect();
        seen.extend(unmatched);
        seen.sort();

        let mut all: Vec<String> = sample().into_iter().map(|i| i.name).collect();
        all.sort();
        assert_eq!(seen, all);
    }

    #[test]
    fn test_category_selection_clears_search() {
        let mut store = store();
        store.filter_by_name("tea");
        assert_eq!(store.search_query(), "tea");
        store.filter_by_category("snacks");
        assert_eq!(store.search_query(), "");
        assert_eq!(names(&store.visible()), vec!["Samosa", "Veg Puff"]);
    }

    #[test]
    fn test_search_keeps_category_and_spans_catalog() {
        let mut store = store();
        store.filter_by_category("snacks");
        let found = names(&store.filter_by_name("CO"));
        assert_eq!(found, vec!["Cold Coffee"]);
        assert_eq!(store.active_category(), "snacks");
        assert_eq!(names(&store.visible()), vec!["Cold Coffee"]);

        store.filter_by_name("");
        assert_eq!(names(&store.visible()), vec!["Samosa", "Veg Puff"]);
    }

    #[test]
    fn test_empty_query_matches_everything() {
        let mut store = store();
        assert_eq!(store.filter_by_name("").len(), sample().len());
        assert_eq!(store.filter_by_name("   ").len(), sample().len());
    }

    #[test]
    fn test_name_filter_is_idempotent() {
        let store = store();
        let once: Vec<MenuItem> = by_name(store.items(), "a").into_iter().cloned().collect();
        let twice: Vec<MenuItem> = by_name(&once, "a").into_iter().cloned().collect();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_select_specials_respects_limit_and_order() {
        let store = store();
        assert_eq!(names(&store.select_specials(2)), vec!["Samosa", "Cold Coffee"]);
        assert_eq!(store.select_specials(10).len(), 3);
        assert!(store.select_specials(0).is_empty());
    }

    #[test]
    fn test_unloaded_store_is_empty() {
        let mut store = CatalogStore::new();
        assert!(!store.is_loaded());
        assert!(store.filter_by_category(ALL_CATEGORIES).is_empty());
        assert!(store.categories().is_empty());
    }

    async fn gateway_with(network: Arc<FakeNetwork>, dir: &tempfile::TempDir) -> OfflineCacheGateway<Arc<FakeNetwork>> {
        let storage = CacheStorage::new(dir.path().to_path_buf()).unwrap();
        let gateway = OfflineCacheGateway::new(options("menu-v1", &[]), storage, network);
        gateway.install().await.unwrap();
        gateway.activate().await.unwrap();
        gateway
    }

    fn menu_url() -> Url {
        Url::parse(ORIGIN).unwrap().join("/menu.json").unwrap()
    }

    #[tokio::test]
    async fn test_load_replaces_collection() {
        let dir = tempfile::tempdir().unwrap();
        let network = Arc::new(FakeNetwork::default());
        network.route("/menu.json", 200, r#"[{"name":"Tea","category":"drinks","price":20}]"#);
        let gateway = gateway_with(network, &dir).await;

        let mut store = store();
        assert_eq!(store.load(&gateway, &menu_url()).await.unwrap(), 1);
        assert_eq!(store.items()[0].name, "Tea");
    }

    #[tokio::test]
    async fn test_load_bad_status_clears_collection() {
        let dir = tempfile::tempdir().unwrap();
        let network = Arc::new(FakeNetwork::default());
        network.route("/menu.json", 500, "boom");
        let gateway = gateway_with(network, &dir).await;

        let mut store = store();
        let err = store.load(&gateway, &menu_url()).await.unwrap_err();
        assert!(matches!(err, CatalogError::Load { status: 500, .. }));
        assert!(!store.is_loaded());
    }

    #[tokio::test]
    async fn test_load_malformed_json_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let network = Arc::new(FakeNetwork::default());
        network.route("/menu.json", 200, r#"[{"name":"Tea""#);
        let gateway = gateway_with(network, &dir).await;

        let mut store = store();
        let err = store.load(&gateway, &menu_url()).await.unwrap_err();
        assert!(matches!(err, CatalogError::Parse(_)));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_load_offline_without_cache_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let network = Arc::new(FakeNetwork::default());
        network.set_down(true);
        let gateway = gateway_with(network, &dir).await;

        let mut store = CatalogStore::new();
        let err = store.load(&gateway, &menu_url()).await.unwrap_err();
        assert!(matches!(err, CatalogError::Unavailable));
    }
}
