//! Shared application state for the history API server.

use std::sync::Arc;

use annals_core::EventManager;
use annals_core::config::ObserverConfig;

use crate::error::ObserverError;

/// Page sizes applied to `GET /api/events`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    /// Used when the request gives no `limit`.
    pub default: u32,
    /// Larger requested limits are clamped to this.
    pub max: u32,
}

impl Default for PageLimits {
    fn default() -> Self {
        Self {
            default: 100,
            max: 1_000,
        }
    }
}

impl PageLimits {
    /// Page limits from the observer configuration.
    pub fn from_config(config: &ObserverConfig) -> Self {
        Self {
            default: config.default_page_size.max(1),
            max: config.max_page_size.max(1),
        }
    }

    /// Resolve a requested `limit` to the page size actually read.
    ///
    /// # Errors
    ///
    /// Returns [`ObserverError::InvalidQuery`] for a zero or negative limit.
    pub fn resolve(self, requested: Option<i64>) -> Result<u32, ObserverError> {
        let Some(requested) = requested else {
            return Ok(self.default.min(self.max));
        };
        if requested <= 0 {
            return Err(ObserverError::InvalidQuery(format!(
                "limit must be a positive integer, got {requested}"
            )));
        }
        Ok(u32::try_from(requested).map_or(self.max, |n| n.min(self.max)))
    }
}

/// Shared state handed to every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The event manager of the running simulation.
    pub events: Arc<EventManager>,
    /// Page size policy.
    pub pages: PageLimits,
}

impl AppState {
    /// State serving `events` with the default page limits.
    pub fn new(events: Arc<EventManager>) -> Self {
        Self {
            events,
            pages: PageLimits::default(),
        }
    }

    /// Replace the page size policy.
    #[must_use]
    pub const fn with_page_limits(mut self, pages: PageLimits) -> Self {
        self.pages = pages;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_limit_uses_default() {
        assert_eq!(PageLimits::default().resolve(None).ok(), Some(100));
    }

    #[test]
    fn oversized_limit_is_clamped() {
        let pages = PageLimits::default();
        assert_eq!(pages.resolve(Some(5_000)).ok(), Some(1_000));
        assert_eq!(pages.resolve(Some(i64::MAX)).ok(), Some(1_000));
        assert_eq!(pages.resolve(Some(7)).ok(), Some(7));
    }

    #[test]
    fn non_positive_limit_is_rejected() {
        let pages = PageLimits::default();
        assert!(matches!(pages.resolve(Some(0)), Err(ObserverError::InvalidQuery(_))));
        assert!(matches!(pages.resolve(Some(-3)), Err(ObserverError::InvalidQuery(_))));
    }
}
