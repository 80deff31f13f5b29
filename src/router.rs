use std::collections::HashMap;

/// Pages the dashboard can render
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Page {
    UsStocks,
    JapanStocks,
    DataViewer,
    Login,
    TickerSettings,
    Qr,
    Contact,
}

/// One sidebar entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteConfig {
    /// Key used in `/page/{routing_name}`
    pub routing_name: String,

    /// Material icon name shown next to the entry
    pub icon: String,

    pub page: Page,
}

impl RouteConfig {
    pub fn new(routing_name: &str, icon: &str, page: Page) -> Self {
        RouteConfig {
            routing_name: routing_name.to_string(),
            icon: icon.to_string(),
            page,
        }
    }
}

/// Sidebar entries in display order
///
/// Add a page here to make it reachable.
pub fn default_routes() -> Vec<RouteConfig> {
    vec![
        RouteConfig::new("main", "home", Page::UsStocks),
        RouteConfig::new("JapanStock", "radio_button_checked", Page::JapanStocks),
        RouteConfig::new("DataViewer", "folder", Page::DataViewer),
        RouteConfig::new("Login", "login", Page::Login),
        RouteConfig::new("Settings", "settings", Page::TickerSettings),
        RouteConfig::new("QR", "qr_code", Page::Qr),
        RouteConfig::new("Contact", "send", Page::Contact),
    ]
}

/// Lookup from route key to page, built once at start-up
#[derive(Debug, Clone)]
pub struct RouteTable {
    entries: Vec<RouteConfig>,
    index: HashMap<String, Page>,
}

impl RouteTable {
    /// Builds the table; a later entry with the same key replaces an earlier one.
    pub fn from_config(entries: Vec<RouteConfig>) -> Self {
        let index = entries
            .iter()
            .map(|r| (r.routing_name.clone(), r.page))
            .collect();
        RouteTable { entries, index }
    }

    /// Page registered under `key`; unknown keys give `None`.
    pub fn dispatch(&self, key: &str) -> Option<Page> {
        self.index.get(key).copied()
    }

    pub fn entries(&self) -> &[RouteConfig] {
        &self.entries
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        RouteTable::from_config(default_routes())
    }
}
