//! Route building and the router collaborator
//!
//! Paths have the shape `/{stage}/student/{page}` with an optional
//! `?tab={tab}` suffix. The stage comes from the durable preference.

use std::collections::BTreeSet;
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::RouteError;
use crate::storage::PendingNavigation;

/// Capability to change the current route
#[async_trait]
pub trait Router: Send + Sync {
    async fn navigate(&self, path: &str) -> Result<(), RouteError>;
}

/// Build the route path for a destination
pub fn route_path(stage: &str, destination: &PendingNavigation) -> String {
    let page = destination.page.trim().trim_matches('/');
    let mut path = format!("/{}/student/{}", stage, page);
    if let Some(tab) = destination.tab.as_deref().filter(|t| !t.trim().is_empty()) {
        let encoded: String = url::form_urlencoded::byte_serialize(tab.trim().as_bytes()).collect();
        path.push_str("?tab=");
        path.push_str(&encoded);
    }
    path
}

/// Human-readable label for a page/tab, used in the overlay and the default
/// navigation message.
pub fn destination_label(page: &str, tab: Option<&str>) -> String {
    let page_label = match page.trim() {
        "dashboard" => "Dashboard".to_string(),
        "study" => "Study Hub".to_string(),
        "activities" => "Activities".to_string(),
        "events" => "Events".to_string(),
        "classes" => "My Classes".to_string(),
        "profile" => "Profile".to_string(),
        "leaderboard" => "Leaderboard".to_string(),
        other => title_case(other),
    };
    match tab.map(str::trim).filter(|t| !t.is_empty()) {
        Some("tests") => format!("{} - Tests", page_label),
        Some("resources") => format!("{} - Resources", page_label),
        Some(other) => format!("{} - {}", page_label, title_case(other)),
        None => page_label,
    }
}

fn title_case(slug: &str) -> String {
    slug.split(['-', '_', ' '])
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Pages the student dashboard serves
pub const STUDENT_PAGES: &[&str] = &[
    "dashboard",
    "study",
    "activities",
    "events",
    "classes",
    "profile",
    "leaderboard",
];

/// In-memory router that records every route change.
///
/// When built with a page list, paths for other pages are rejected with
/// [`RouteError::UnknownDestination`].
#[derive(Debug, Default)]
pub struct HistoryRouter {
    known_pages: Option<BTreeSet<String>>,
    history: Mutex<Vec<String>>,
}

impl HistoryRouter {
    pub fn new<I, S>(pages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            known_pages: Some(pages.into_iter().map(Into::into).collect()),
            history: Mutex::new(Vec::new()),
        }
    }

    /// Router for the student dashboard pages
    pub fn student() -> Self {
        Self::new(STUDENT_PAGES.iter().copied())
    }

    /// Accepts any path
    pub fn permissive() -> Self {
        Self::default()
    }

    pub fn history(&self) -> Vec<String> {
        self.history.lock().map(|h| h.clone()).unwrap_or_default()
    }

    pub fn current(&self) -> Option<String> {
        self.history().last().cloned()
    }

    fn page_of(path: &str) -> Option<&str> {
        let without_query = path.split('?').next()?;
        without_query.rsplit('/').next().filter(|p| !p.is_empty())
    }
}

#[async_trait]
impl Router for HistoryRouter {
    async fn navigate(&self, path: &str) -> Result<(), RouteError> {
        if let Some(known) = &self.known_pages {
            let page = Self::page_of(path).unwrap_or_default();
            if !known.contains(page) {
                warn!(path, "Rejecting route change to unknown page");
                return Err(RouteError::UnknownDestination(path.to_string()));
            }
        }
        debug!(path, "Route change");
        self.history
            .lock()
            .map_err(|_| RouteError::Rejected("router history poisoned".to_string()))?
            .push(path.to_string());
        Ok(())
    }
}
