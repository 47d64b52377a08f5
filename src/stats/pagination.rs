//! "Fetch until short page" pagination
//!
//! Bounded-result endpoints return at most [`PAGE_SIZE`] items per page and
//! no reliable "last page" flag, so the only end signal is a page with fewer
//! items than that.
//!
//! Includes a hard cap on the number of pages so a backend that keeps
//! returning full pages cannot loop forever.

use std::future::Future;
use tracing::debug;

use super::{StatsError, StatsResult};
use crate::PAGE_SIZE;

/// Maximum number of pages fetched by one [`Paginator::collect_all`] call
pub const MAX_PAGES: u32 = 10_000;

/// Pagination helper
pub struct Paginator;

impl Paginator {
    /// Fetch pages 1, 2, 3, … until one holds fewer than [`PAGE_SIZE`] items
    ///
    /// # Arguments
    /// * `fetch_page` - Fetches one 1-indexed page; returns its items and the
    ///   count the backend reported
    ///
    /// # Returns
    /// Items of every page, concatenated in page order, without deduplication
    ///
    /// # Errors
    /// Returns the first fetch error, or [`StatsError::PageLimit`] once
    /// [`MAX_PAGES`] full pages have been fetched
    pub async fn collect_all<T, F, Fut>(fetch_page: F) -> StatsResult<Vec<T>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = StatsResult<(Vec<T>, u64)>>,
    {
        Self::collect_up_to(MAX_PAGES, fetch_page).await
    }

    /// [`collect_all`](Self::collect_all) with a custom page cap
    pub async fn collect_up_to<T, F, Fut>(max_pages: u32, mut fetch_page: F) -> StatsResult<Vec<T>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = StatsResult<(Vec<T>, u64)>>,
    {
        let mut all_items = Vec::new();

        for page in 1..=max_pages {
            let (items, reported) = fetch_page(page).await?;
            let fetched = items.len();
            all_items.extend(items);

            debug!(
                page = page,
                fetched = fetched,
                reported = reported,
                total = all_items.len(),
                "Fetched page"
            );

            if fetched < PAGE_SIZE as usize {
                return Ok(all_items);
            }
        }

        Err(StatsError::PageLimit(max_pages))
    }
}
