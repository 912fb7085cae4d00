//! Application state management for the menu TUI.
//!
//! This module contains the `App` struct that owns the catalog, the offline
//! cache gateway and the order form, and coordinates the background tasks
//! that install the cache and load the menu.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn};
use url::Url;

use menucache_core::catalog::{fetch_catalog, CatalogStore, ALL_CATEGORIES};
use menucache_core::config::{Config, ConfigError};
use menucache_core::gateway::{
    CacheStorage, ControlMessage, HttpFetcher, InstallReport, OfflineCacheGateway, Registration,
    Request, WorkerPhase,
};
use menucache_core::models::MenuItem;
use menucache_core::order::{OrderDestination, OrderDraft, OrderError, OrderSubmission};

// ============================================================================
// Constants
// ============================================================================

/// Buffer size for the background task message channel.
const CHANNEL_BUFFER_SIZE: usize = 16;

/// Number of items to scroll on page up/down.
pub const PAGE_SCROLL_SIZE: usize = 10;

/// Maximum length for the search box.
const MAX_SEARCH_LENGTH: usize = 40;

/// Maximum length for the table number field.
const MAX_TABLE_NUMBER_LENGTH: usize = 6;

/// Maximum length for special instructions.
const MAX_INSTRUCTIONS_LENGTH: usize = 120;

/// The gateway the app talks through
pub type Gateway = OfflineCacheGateway<HttpFetcher>;

// ============================================================================
// UI State Types
// ============================================================================

/// Overall application state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Normal,
    Searching,
    ShowingHelp,
    Ordering,
    OrderSent,
    ConfirmingQuit,
    Quitting,
}

/// Order form focus state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderField {
    Quantity,
    TableNumber,
    Instructions,
    Submit,
}

impl OrderField {
    /// Get the next field (wrapping around)
    pub fn next(&self) -> Self {
        match self {
            OrderField::Quantity => OrderField::TableNumber,
            OrderField::TableNumber => OrderField::Instructions,
            OrderField::Instructions => OrderField::Submit,
            OrderField::Submit => OrderField::Quantity,
        }
    }

    /// Get the previous field (wrapping around)
    pub fn prev(&self) -> Self {
        match self {
            OrderField::Quantity => OrderField::Submit,
            OrderField::TableNumber => OrderField::Quantity,
            OrderField::Instructions => OrderField::TableNumber,
            OrderField::Submit => OrderField::Instructions,
        }
    }
}

// ============================================================================
// Background Task Results
// ============================================================================

/// Results sent back from spawned tasks through the MPSC channel.
enum LoadResult {
    /// Cache generation installed (and possibly activated)
    Installed {
        report: InstallReport,
        phase: WorkerPhase,
    },
    /// A waiting generation was asked to skip waiting
    SkipWaiting { activated: bool, phase: WorkerPhase },
    /// Menu decoded, with the age of its cached copy if there is one
    Menu {
        items: Vec<MenuItem>,
        cache_age: Option<String>,
    },
    InstallFailed(String),
    ActivateFailed(String),
    MenuFailed(String),
}

// ============================================================================
// Main Application Struct
// ============================================================================

/// Main application state container
pub struct App {
    pub config: Config,
    /// Ordering destination, validated once at startup
    pub ordering: Result<OrderDestination, ConfigError>,
    pub store: CatalogStore,
    menu_url: Url,
    gateway: Arc<Gateway>,
    registration: Arc<Mutex<Registration<HttpFetcher>>>,

    // UI State
    pub state: AppState,
    pub selection: usize,

    // Order form
    pub order: Option<OrderDraft>,
    pub order_focus: OrderField,
    pub order_notice: Option<String>,
    pub submission: Option<OrderSubmission>,

    // Loading state
    pub loading: bool,
    pub load_error: Option<String>,
    pub status_message: Option<String>,
    pub cache_age: Option<String>,
    pub phase: WorkerPhase,
    pub offline_mode: bool,

    // Background task channel
    load_rx: mpsc::Receiver<LoadResult>,
    load_tx: mpsc::Sender<LoadResult>,
}

/// Build the gateway for the configured cache generation.
pub fn build_gateway(config: &Config, cache_root: PathBuf) -> Result<Arc<Gateway>> {
    let storage = CacheStorage::new(cache_root)?;
    let options = config.gateway_options()?;
    let gateway = OfflineCacheGateway::new(options, storage, HttpFetcher::new()?);
    gateway.set_offline(config.offline_mode);
    Ok(Arc::new(gateway))
}

impl App {
    /// Create a new application instance using the platform cache directory
    pub fn new(config: Config) -> Result<Self> {
        let cache_root = config.cache_dir()?;
        Self::with_cache_root(config, cache_root)
    }

    pub fn with_cache_root(config: Config, cache_root: PathBuf) -> Result<Self> {
        debug!(?cache_root, generation = %config.cache_generation, "Creating app");
        let gateway = build_gateway(&config, cache_root)?;
        let menu_url = config.menu_url()?;

        let ordering = config.ordering.destination();
        if let Err(ref e) = ordering {
            warn!(error = %e, "Ordering is not available");
        }

        let (tx, rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);
        let offline_mode = config.offline_mode;

        Ok(Self {
            config,
            ordering,
            store: CatalogStore::new(),
            menu_url,
            gateway,
            registration: Arc::new(Mutex::new(Registration::new())),

            state: AppState::Normal,
            selection: 0,

            order: None,
            order_focus: OrderField::Quantity,
            order_notice: None,
            submission: None,

            loading: false,
            load_error: None,
            status_message: None,
            cache_age: None,
            phase: WorkerPhase::Parsed,
            offline_mode,

            load_rx: rx,
            load_tx: tx,
        })
    }

    pub fn generation(&self) -> &str {
        self.gateway.generation()
    }

    // =========================================================================
    // Background Tasks
    // =========================================================================

    /// Install the cache generation, then load the menu through it.
    pub fn start(&mut self) {
        info!(generation = %self.generation(), "Starting cache install and menu load");

        let tx = self.load_tx.clone();
        let gateway = Arc::clone(&self.gateway);
        let registration = Arc::clone(&self.registration);
        let menu_url = self.menu_url.clone();

        tokio::spawn(async move {
            let installed = registration.lock().await.update(Arc::clone(&gateway)).await;
            let result = match installed {
                Ok(report) => LoadResult::Installed {
                    report,
                    phase: gateway.phase().await,
                },
                Err(e) => {
                    error!(error = %e, "Cache install failed");
                    LoadResult::InstallFailed(e.to_string())
                }
            };
            Self::send_result(&tx, result).await;
            let serving = Self::serving(&registration, &gateway).await;
            Self::load_menu(&tx, &serving, &menu_url).await;
        });

        self.loading = true;
        self.status_message = Some("Loading menu...".to_string());
    }

    /// Load the menu again without reinstalling.
    pub fn reload(&mut self) {
        if self.loading {
            return;
        }
        let tx = self.load_tx.clone();
        let gateway = Arc::clone(&self.gateway);
        let registration = Arc::clone(&self.registration);
        let menu_url = self.menu_url.clone();

        tokio::spawn(async move {
            let serving = Self::serving(&registration, &gateway).await;
            Self::load_menu(&tx, &serving, &menu_url).await;
        });

        self.loading = true;
        self.status_message = Some("Reloading menu...".to_string());
    }

    /// Ask a waiting cache generation to take over now.
    pub fn activate_waiting(&mut self) {
        let tx = self.load_tx.clone();
        let gateway = Arc::clone(&self.gateway);
        let registration = Arc::clone(&self.registration);

        tokio::spawn(async move {
            let posted = registration
                .lock()
                .await
                .post_message(ControlMessage::SkipWaiting)
                .await;
            let result = match posted {
                Ok(activated) => LoadResult::SkipWaiting {
                    activated,
                    phase: gateway.phase().await,
                },
                Err(e) => {
                    error!(error = %e, "Cache activation failed");
                    LoadResult::ActivateFailed(e.to_string())
                }
            };
            Self::send_result(&tx, result).await;
        });
    }

    /// The generation in control, or the configured one before any is active
    async fn serving(registration: &Mutex<Registration<HttpFetcher>>, gateway: &Arc<Gateway>) -> Arc<Gateway> {
        registration
            .lock()
            .await
            .controller()
            .unwrap_or_else(|| Arc::clone(gateway))
    }

    async fn load_menu(tx: &mpsc::Sender<LoadResult>, gateway: &Gateway, menu_url: &Url) {
        let result = match fetch_catalog(gateway, menu_url).await {
            Ok(items) => {
                let cache_age = gateway
                    .storage()
                    .match_request(&Request::get(menu_url.clone()))
                    .ok()
                    .flatten()
                    .map(|entry| entry.age_display());
                LoadResult::Menu { items, cache_age }
            }
            Err(e) => {
                warn!(url = %menu_url, error = %e, "Menu load failed");
                LoadResult::MenuFailed(e.to_string())
            }
        };
        Self::send_result(tx, result).await;
    }

    /// Helper to send task results, logging any channel errors
    async fn send_result(tx: &mpsc::Sender<LoadResult>, result: LoadResult) {
        if let Err(e) = tx.send(result).await {
            error!(error = %e, "Failed to send load result - channel closed");
        }
    }

    /// Check for completed background tasks and process results
    pub async fn check_background_tasks(&mut self) {
        while let Ok(result) = self.load_rx.try_recv() {
            self.process_load_result(result);
        }
    }

    fn process_load_result(&mut self, result: LoadResult) {
        match result {
            LoadResult::Installed { report, phase } => {
                self.phase = phase;
                if !report.is_complete() {
                    self.status_message = Some(format!(
                        "Cached {} of {} assets for offline use",
                        report.cached.len(),
                        report.cached.len() + report.failed.len()
                    ));
                }
            }
            LoadResult::SkipWaiting { activated, phase } => {
                self.phase = phase;
                self.status_message = Some(if activated {
                    format!("Cache {} activated", self.generation())
                } else {
                    "No cache generation waiting".to_string()
                });
            }
            LoadResult::Menu { items, cache_age } => {
                let count = self.store.replace(items);
                self.loading = false;
                self.load_error = None;
                self.cache_age = cache_age;
                self.status_message = None;
                self.clamp_selection();
                debug!(count, "Menu ready");
            }
            LoadResult::InstallFailed(message) => {
                self.phase = WorkerPhase::Redundant;
                self.status_message = Some(format!("Offline cache unavailable: {}", message));
            }
            LoadResult::ActivateFailed(message) => {
                self.status_message = Some(format!("Cache activation failed: {}", message));
            }
            LoadResult::MenuFailed(message) => {
                self.store.clear();
                self.loading = false;
                self.load_error = Some(message);
                self.status_message = Some("Failed to load menu".to_string());
                self.selection = 0;
            }
        }
    }

    // =========================================================================
    // Offline Mode
    // =========================================================================

    /// Flip offline mode and remember it in the config file.
    pub fn toggle_offline(&mut self) {
        self.offline_mode = !self.offline_mode;
        self.gateway.set_offline(self.offline_mode);
        info!(offline = self.offline_mode, "Offline mode toggled");

        // Only persist the flag; environment overrides stay out of the file
        self.config.offline_mode = self.offline_mode;
        let persisted = Config::load().and_then(|mut on_disk| {
            on_disk.offline_mode = self.offline_mode;
            on_disk.save()
        });
        if let Err(e) = persisted {
            warn!(error = %e, "Failed to save offline mode");
        }

        self.status_message = Some(if self.offline_mode {
            "Offline mode: serving from cache only".to_string()
        } else {
            "Online mode".to_string()
        });
    }

    // =========================================================================
    // Catalog Views
    // =========================================================================

    /// Category filter values, "all" first
    pub fn categories(&self) -> Vec<String> {
        let mut categories = vec![ALL_CATEGORIES.to_string()];
        categories.extend(self.store.categories());
        categories
    }

    pub fn category_index(&self) -> usize {
        self.categories()
            .iter()
            .position(|c| c == self.store.active_category())
            .unwrap_or(0)
    }

    pub fn select_category(&mut self, index: usize) {
        let categories = self.categories();
        if let Some(category) = categories.get(index) {
            self.store.filter_by_category(category);
            self.selection = 0;
        }
    }

    pub fn next_category(&mut self) {
        let count = self.categories().len();
        self.select_category((self.category_index() + 1) % count);
    }

    pub fn prev_category(&mut self) {
        let count = self.categories().len();
        self.select_category((self.category_index() + count - 1) % count);
    }

    pub fn search(&mut self, query: &str) {
        self.store.filter_by_name(query);
        self.selection = 0;
    }

    pub fn push_search_char(&mut self, c: char) {
        let mut query = self.store.search_query().to_string();
        if query.chars().count() < MAX_SEARCH_LENGTH {
            query.push(c);
            self.search(&query);
        }
    }

    pub fn pop_search_char(&mut self) {
        let mut query = self.store.search_query().to_string();
        query.pop();
        self.search(&query);
    }

    pub fn is_searching(&self) -> bool {
        !self.store.search_query().trim().is_empty()
    }

    pub fn visible_items(&self) -> Vec<&MenuItem> {
        self.store.visible()
    }

    pub fn specials(&self) -> Vec<&MenuItem> {
        self.store.select_specials(self.config.specials_limit)
    }

    pub fn selected_item(&self) -> Option<&MenuItem> {
        self.visible_items().get(self.selection).copied()
    }

    pub fn select_next(&mut self, step: usize) {
        let len = self.visible_items().len();
        if len > 0 {
            self.selection = (self.selection + step).min(len - 1);
        }
    }

    pub fn select_prev(&mut self, step: usize) {
        self.selection = self.selection.saturating_sub(step);
    }

    pub fn select_last(&mut self) {
        self.selection = self.visible_items().len().saturating_sub(1);
    }

    fn clamp_selection(&mut self) {
        let len = self.visible_items().len();
        if self.selection >= len {
            self.selection = len.saturating_sub(1);
        }
    }

    // =========================================================================
    // Ordering
    // =========================================================================

    /// Open the order form for the selected item
    pub fn open_order(&mut self) {
        let Some(item) = self.selected_item() else {
            return;
        };
        debug!(item = %item.name, "Opening order form");
        self.order = Some(OrderDraft::new(item));
        self.order_focus = OrderField::Quantity;
        self.order_notice = None;
        self.state = AppState::Ordering;
    }

    pub fn close_order(&mut self) {
        self.order = None;
        self.order_notice = None;
        self.state = AppState::Normal;
    }

    pub fn order_type_char(&mut self, c: char) {
        let focus = self.order_focus;
        let Some(draft) = self.order.as_mut() else {
            return;
        };
        match focus {
            OrderField::Quantity => match c {
                '+' => draft.increment(),
                '-' => draft.decrement(),
                c if c.is_ascii_digit() => {
                    let text = format!("{}{}", draft.quantity(), c);
                    draft.set_quantity_text(&text);
                }
                _ => {}
            },
            OrderField::TableNumber => {
                if can_add_table_char(draft.table_number.chars().count(), c) {
                    draft.table_number.push(c);
                }
            }
            OrderField::Instructions => {
                if draft.instructions.chars().count() < MAX_INSTRUCTIONS_LENGTH && !c.is_control() {
                    draft.instructions.push(c);
                }
            }
            OrderField::Submit => {}
        }
    }

    pub fn order_backspace(&mut self) {
        let focus = self.order_focus;
        let Some(draft) = self.order.as_mut() else {
            return;
        };
        match focus {
            OrderField::Quantity => {
                let mut text = draft.quantity().to_string();
                text.pop();
                draft.set_quantity_text(&text);
            }
            OrderField::TableNumber => {
                draft.table_number.pop();
            }
            OrderField::Instructions => {
                draft.instructions.pop();
            }
            OrderField::Submit => {}
        }
    }

    /// Validate the order and build the WhatsApp link.
    pub fn submit_order(&mut self) {
        let Some(draft) = self.order.as_ref() else {
            return;
        };

        match draft.submit(self.ordering.as_ref(), &self.config.restaurant_name) {
            Ok(submission) => {
                info!(item = %draft.item_name, quantity = draft.quantity(), "Order ready to send");
                self.submission = Some(submission);
                self.order = None;
                self.order_notice = None;
                self.state = AppState::OrderSent;
            }
            Err(e) => {
                debug!(error = %e, "Order rejected");
                if matches!(e, OrderError::MissingTableNumber) {
                    self.order_focus = OrderField::TableNumber;
                }
                self.order_notice = Some(match e {
                    OrderError::Config(_) => format!("Configuration error: {}", e),
                    _ => e.to_string(),
                });
            }
        }
    }
}

// ============================================================================
// Input Validation
// ============================================================================

/// Check if a character can be added to the table number field.
pub fn can_add_table_char(current_len: usize, c: char) -> bool {
    current_len < MAX_TABLE_NUMBER_LENGTH && (c.is_ascii_alphanumeric() || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;
    use menucache_core::config::OrderingConfig;

    fn item(name: &str, category: &str, price: f64, special: bool) -> MenuItem {
        MenuItem {
            name: name.to_string(),
            category: category.to_string(),
            price,
            special,
            ..Default::default()
        }
    }

    fn app_with(config: Config) -> (App, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let mut app = App::with_cache_root(config, dir.path().to_path_buf()).unwrap();
        app.process_load_result(LoadResult::Menu {
            items: vec![
                item("Masala Tea", "Drinks", 20.0, false),
                item("Samosa", "Snacks", 30.0, true),
                item("Lemon Soda", "drinks", 40.0, true),
            ],
            cache_age: Some("just now".to_string()),
        });
        (app, dir)
    }

    fn app() -> (App, tempfile::TempDir) {
        app_with(Config::default())
    }

    #[test]
    fn test_order_field_cycle() {
        assert_eq!(OrderField::Quantity.next(), OrderField::TableNumber);
        assert_eq!(OrderField::Submit.next(), OrderField::Quantity);
        assert_eq!(OrderField::Quantity.prev(), OrderField::Submit);
        assert_eq!(OrderField::Instructions.prev(), OrderField::TableNumber);
    }

    #[test]
    fn test_can_add_table_char() {
        assert!(can_add_table_char(0, '7'));
        assert!(can_add_table_char(0, 'B'));
        assert!(!can_add_table_char(0, ' '));
        assert!(!can_add_table_char(MAX_TABLE_NUMBER_LENGTH, '1'));
    }

    #[test]
    fn test_categories_start_with_all() {
        let (app, _dir) = app();
        assert_eq!(app.categories(), vec!["all", "drinks", "snacks"]);
        assert_eq!(app.visible_items().len(), 3);
        assert_eq!(app.cache_age.as_deref(), Some("just now"));
    }

    #[test]
    fn test_category_cycling_clears_search() {
        let (mut app, _dir) = app();
        app.search("soda");
        assert!(app.is_searching());

        app.next_category();
        assert!(!app.is_searching());
        let names: Vec<&str> = app.visible_items().iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["Masala Tea", "Lemon Soda"]);

        app.prev_category();
        app.prev_category();
        assert_eq!(app.store.active_category(), "snacks");
    }

    #[test]
    fn test_search_ignores_active_category() {
        let (mut app, _dir) = app();
        app.select_category(2);
        for c in "TEA".chars() {
            app.push_search_char(c);
        }
        assert_eq!(app.selected_item().map(|i| i.name.as_str()), Some("Masala Tea"));

        app.pop_search_char();
        app.pop_search_char();
        app.pop_search_char();
        assert!(!app.is_searching());
        assert_eq!(app.visible_items().len(), 1);
    }

    #[test]
    fn test_selection_is_bounded() {
        let (mut app, _dir) = app();
        app.select_next(PAGE_SCROLL_SIZE);
        assert_eq!(app.selection, 2);
        app.select_prev(PAGE_SCROLL_SIZE);
        assert_eq!(app.selection, 0);
    }

    #[test]
    fn test_specials_bar() {
        let (app, _dir) = app();
        let names: Vec<&str> = app.specials().iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["Samosa", "Lemon Soda"]);
    }

    #[test]
    fn test_menu_failure_clears_items() {
        let (mut app, _dir) = app();
        app.process_load_result(LoadResult::MenuFailed("Menu unavailable".to_string()));
        assert!(!app.store.is_loaded());
        assert!(app.visible_items().is_empty());
        assert_eq!(app.load_error.as_deref(), Some("Menu unavailable"));
    }

    #[test]
    fn test_placeholder_phone_blocks_order() {
        let (mut app, _dir) = app();
        app.open_order();
        assert_eq!(app.state, AppState::Ordering);

        app.submit_order();
        assert_eq!(app.order_focus, OrderField::TableNumber);
        assert!(app.order_notice.as_deref().unwrap().contains("table number"));

        app.order_type_char('4');
        app.submit_order();
        assert_eq!(app.state, AppState::Ordering);
        assert!(app.order_notice.as_deref().unwrap().starts_with("Configuration error"));
        assert!(app.submission.is_none());
    }

    #[test]
    fn test_order_submission() {
        let config = Config {
            ordering: OrderingConfig {
                phone: "919812345678".to_string(),
                ..Default::default()
            },
            ..Default::default()
        };
        let (mut app, _dir) = app_with(config);
        app.select_next(1);
        app.open_order();

        app.order_type_char('+');
        app.order_type_char('+');
        app.order_type_char('-');
        app.order_focus = app.order_focus.next();
        for c in "12".chars() {
            app.order_type_char(c);
        }

        app.submit_order();
        assert_eq!(app.state, AppState::OrderSent);
        let submission = app.submission.as_ref().unwrap();
        assert!(submission.message.contains("Product: Samosa"));
        assert!(submission.message.contains("Quantity: 2"));
        assert!(submission.deep_link.as_str().starts_with("https://wa.me/919812345678?text="));
    }

    #[test]
    fn test_quantity_typing() {
        let (mut app, _dir) = app();
        app.open_order();
        app.order_type_char('2');
        assert_eq!(app.order.as_ref().unwrap().quantity(), 12);
        app.order_backspace();
        app.order_backspace();
        assert_eq!(app.order.as_ref().unwrap().quantity(), 1);
    }

    #[tokio::test]
    async fn test_start_serves_previous_generation_while_new_one_waits() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            cache_generation: "menu-v2".to_string(),
            eager_activation: false,
            offline_mode: true,
            ..Config::default()
        };

        // Left behind by an earlier run on menu-v1
        let storage = CacheStorage::new(dir.path().to_path_buf()).unwrap();
        let menu_url = config.menu_url().unwrap();
        storage
            .open("menu-v1")
            .unwrap()
            .put(
                &Request::get(menu_url.clone()),
                &menucache_core::gateway::Response::new(
                    menu_url.as_str(),
                    200,
                    r#"[{"name":"Filter Coffee","category":"drinks"}]"#,
                ),
            )
            .unwrap();
        storage.set_active("menu-v1").unwrap();

        let mut app = App::with_cache_root(config, dir.path().to_path_buf()).unwrap();
        app.start();
        for _ in 0..1000 {
            if !app.loading {
                break;
            }
            tokio::task::yield_now().await;
            app.check_background_tasks().await;
        }

        assert!(!app.loading);
        assert_eq!(app.load_error, None);
        assert_eq!(app.visible_items()[0].name, "Filter Coffee");
        assert_eq!(app.phase, WorkerPhase::Installed);
    }
}
