//! Query descriptor collaborator.
//!
//! The routing layer resolves a request path into a query and hands the
//! pipeline a descriptor exposing only predicates and pagination counters.

use serde::{Deserialize, Serialize};

/// Content-resolution predicates consumed by the pipeline.
pub trait QueryDescriptor {
    fn is_single(&self) -> bool;
    fn is_archive(&self) -> bool;
    fn is_search(&self) -> bool;
    fn is_front_page(&self) -> bool;
    fn is_not_found(&self) -> bool;
    fn pagination_total(&self) -> u32;
    fn current_page(&self) -> u32;
}

/// Plain-data descriptor, as posted to the HTTP front end or read by the CLI.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct QueryState {
    pub single: bool,
    pub archive: bool,
    pub search: bool,
    pub front_page: bool,
    pub not_found: bool,
    pub pagination_total: u32,
    pub current_page: u32,
}

impl QueryState {
    /// A descriptor for a request that resolved to nothing.
    pub fn not_found() -> Self {
        Self {
            not_found: true,
            ..Self::default()
        }
    }
}

impl QueryDescriptor for QueryState {
    fn is_single(&self) -> bool {
        self.single
    }

    fn is_archive(&self) -> bool {
        self.archive
    }

    fn is_search(&self) -> bool {
        self.search
    }

    fn is_front_page(&self) -> bool {
        self.front_page
    }

    fn is_not_found(&self) -> bool {
        self.not_found
    }

    fn pagination_total(&self) -> u32 {
        self.pagination_total
    }

    fn current_page(&self) -> u32 {
        self.current_page.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_camel_case() {
        let query: QueryState = serde_json::from_value(json!({
            "archive": true,
            "notFound": false,
            "paginationTotal": 4,
            "currentPage": 2
        }))
        .unwrap();

        assert!(query.is_archive());
        assert!(!query.is_not_found());
        assert_eq!(query.pagination_total(), 4);
        assert_eq!(query.current_page(), 2);
    }

    #[test]
    fn test_current_page_is_at_least_one() {
        assert_eq!(QueryState::default().current_page(), 1);
        assert!(QueryState::not_found().is_not_found());
    }
}
