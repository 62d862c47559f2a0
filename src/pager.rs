// ABOUTME: Pagination math for the query command: page to offset/limit mapping.
// ABOUTME: A requested page past the end falls back to page 1, matching the command contract.

use worldlog_core::entry::Entry;
use worldlog_engine::ActionLogger;

/// One fetched page plus the numbers needed to render it.
#[derive(Debug)]
pub struct Page {
    /// The page actually served (may be 1 if the requested page was empty).
    pub page: u32,
    /// Total page count at fetch time.
    pub pages: u64,
    /// Offset of the first served entry, for row numbering.
    pub offset: u32,
    pub entries: Vec<Entry>,
}

/// Count matching entries, then fetch the requested page. If a page beyond
/// the first comes back empty (the log shrank relative to the count, or the
/// page number was out of range), re-fetch from page 1.
#[allow(clippy::too_many_arguments)]
pub async fn fetch_page(
    logger: &ActionLogger,
    world: &str,
    x: i64,
    y: i64,
    z: i64,
    radius: f64,
    action: Option<&str>,
    requested_page: u32,
    entries_per_page: u32,
) -> Page {
    let count = logger.get_around_count(world, x, y, z, radius, action).await;
    let pages = count.div_ceil(u64::from(entries_per_page));

    let mut page = requested_page.max(1);
    loop {
        let offset = (page - 1) * entries_per_page;
        let entries = logger
            .get_around(world, x, y, z, radius, offset, entries_per_page, action)
            .await;
        if page > 1 && entries.is_empty() {
            page = 1;
        } else {
            return Page { page, pages, offset, entries };
        }
    }
}
