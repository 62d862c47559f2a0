// ABOUTME: The action log engine: the only surface callers log through and query from.
// ABOUTME: Composes store operations into create/tag/log, count, paginated fetch, and formatting.

use futures::future::join_all;
use worldlog_core::entry::{Entry, EntryId, Tags};
use worldlog_core::format::FormatterTable;
use worldlog_store::{Database, RegionQuery};

/// Logs world actions and serves radius-bounded, action-filtered queries
/// over them. All storage access goes through the single [`Database`]
/// handle; a fatal storage fault freezes the affected calls and raises the
/// store's shutdown signal (see `worldlog-store`).
///
/// The formatter table is fixed at construction. An entry created by
/// [`ActionLogger::log`] is visible to readers before its tags are; that
/// window is part of the contract, not a race to hide.
pub struct ActionLogger {
    db: Database,
    formatters: FormatterTable,
}

impl ActionLogger {
    pub fn new(db: Database, formatters: FormatterTable) -> Self {
        Self { db, formatters }
    }

    /// Append one entry header; returns the store-assigned id. Trusts the
    /// caller for domain validity (e.g. that `world` names a real region).
    pub async fn create(
        &self,
        world: &str,
        x: i64,
        y: i64,
        z: i64,
        action: &str,
        timestamp: i64,
    ) -> EntryId {
        self.db.insert_header(world, x, y, z, action, timestamp).await
    }

    /// Attach tags to an existing entry. All inserts are issued
    /// concurrently and this completes only once every one of them has.
    pub async fn set_tags(&self, id: EntryId, tags: &Tags) {
        join_all(
            tags.iter()
                .map(|(tag, value)| self.db.insert_tag(id, tag, value)),
        )
        .await;
    }

    /// Create an entry and attach its tags; returns the new id. The header
    /// insert fully completes first, since the tags need the id.
    pub async fn log(
        &self,
        world: &str,
        x: i64,
        y: i64,
        z: i64,
        action: &str,
        timestamp: i64,
        tags: &Tags,
    ) -> EntryId {
        let id = self.create(world, x, y, z, action, timestamp).await;
        self.set_tags(id, tags).await;
        id
    }

    /// Count entries within `radius` of `(x, y, z)` in `world`, restricted
    /// to `action` when given.
    pub async fn get_around_count(
        &self,
        world: &str,
        x: i64,
        y: i64,
        z: i64,
        radius: f64,
        action: Option<&str>,
    ) -> u64 {
        self.db
            .count_headers_in_region(region_query(world, x, y, z, radius, action))
            .await
    }

    /// Fetch one page of entries within the region, newest first, with
    /// their tags. An empty page short-circuits without issuing any tag
    /// queries.
    pub async fn get_around(
        &self,
        world: &str,
        x: i64,
        y: i64,
        z: i64,
        radius: f64,
        offset: u32,
        limit: u32,
        action: Option<&str>,
    ) -> Vec<Entry> {
        let headers = self
            .db
            .select_headers_in_region(region_query(world, x, y, z, radius, action), offset, limit)
            .await;
        if headers.is_empty() {
            return Vec::new();
        }

        let tag_sets = join_all(headers.iter().map(|h| self.db.select_tags_for_entry(h.id))).await;
        headers
            .into_iter()
            .zip(tag_sets)
            .map(|(header, tags)| Entry::from_header(header, tags))
            .collect()
    }

    /// Render one entry's tags for display via the per-action formatter
    /// table. Total: always returns a string.
    pub fn format(&self, action: &str, world: &str, x: i64, y: i64, z: i64, tags: &Tags) -> String {
        self.formatters.format(action, world, x, y, z, tags)
    }

    /// Release the underlying store connection. Idempotent. Any engine call
    /// after close is a programming error and fails fast.
    pub async fn close(&self) {
        self.db.close().await;
    }
}

fn region_query(world: &str, x: i64, y: i64, z: i64, radius: f64, action: Option<&str>) -> RegionQuery {
    RegionQuery {
        world: world.to_string(),
        x,
        y,
        z,
        radius,
        action: action.unwrap_or("").to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use worldlog_core::format::template_formatter;

    fn open_logger(dir: &TempDir) -> ActionLogger {
        let (db, _shutdown) = Database::open(&dir.path().join("data.sqlite")).unwrap();
        ActionLogger::new(db, FormatterTable::new())
    }

    fn tags(pairs: &[(&str, &str)]) -> Tags {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn log_then_query_round_trip() {
        let dir = TempDir::new().unwrap();
        let logger = open_logger(&dir);

        let id = logger
            .log(
                "world",
                0,
                64,
                0,
                "wal:block_entity_break",
                1000,
                &tags(&[("player_xuid", "x1")]),
            )
            .await;
        assert_eq!(id, 1);

        let count = logger
            .get_around_count("world", 0, 64, 0, 5.0, Some("wal:block_entity_break"))
            .await;
        assert_eq!(count, 1);

        let entries = logger
            .get_around("world", 0, 64, 0, 5.0, 0, 10, Some("wal:block_entity_break"))
            .await;
        assert_eq!(entries.len(), 1);
        let entry = &entries[0];
        assert_eq!(entry.id, 1);
        assert_eq!(entry.world, "world");
        assert_eq!((entry.x, entry.y, entry.z), (0, 64, 0));
        assert_eq!(entry.action, "wal:block_entity_break");
        assert_eq!(entry.timestamp, 1000);
        assert_eq!(entry.tags, tags(&[("player_xuid", "x1")]));

        logger.close().await;
    }

    #[tokio::test]
    async fn empty_region_counts_zero_and_fetches_nothing() {
        let dir = TempDir::new().unwrap();
        let logger = open_logger(&dir);

        let count = logger.get_around_count("world", 0, 64, 0, 5.0, None).await;
        assert_eq!(count, 0);

        let entries = logger.get_around("world", 0, 64, 0, 5.0, 0, 10, None).await;
        assert!(entries.is_empty());

        logger.close().await;
    }

    #[tokio::test]
    async fn set_tags_completes_with_all_tags_stored() {
        let dir = TempDir::new().unwrap();
        let logger = open_logger(&dir);

        let id = logger.create("world", 0, 64, 0, "wal:inventory_open", 1000).await;
        let expected = tags(&[
            ("player_xuid", "x1"),
            ("player_uuid", "u1"),
            ("player_gamertag", "steve"),
            ("block_entity", "Chest"),
        ]);
        logger.set_tags(id, &expected).await;

        let entries = logger.get_around("world", 0, 64, 0, 1.0, 0, 1, None).await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].tags, expected);

        logger.close().await;
    }

    #[tokio::test]
    async fn count_matches_unpaginated_fetch() {
        let dir = TempDir::new().unwrap();
        let logger = open_logger(&dir);

        for i in 0..7 {
            logger
                .log("world", i % 3, 64, 0, "wal:chunk_enter", 1000 + i, &Tags::new())
                .await;
        }
        logger.log("world", 100, 64, 0, "wal:chunk_enter", 2000, &Tags::new()).await;

        let count = logger.get_around_count("world", 0, 64, 0, 10.0, None).await;
        let all = logger
            .get_around("world", 0, 64, 0, 10.0, 0, u32::MAX, None)
            .await;
        assert_eq!(count, all.len() as u64);
        assert_eq!(count, 7);

        logger.close().await;
    }

    #[tokio::test]
    async fn pagination_is_newest_first_with_stable_pages() {
        let dir = TempDir::new().unwrap();
        let logger = open_logger(&dir);

        for i in 0..5 {
            logger
                .log("world", 0, 64, 0, "wal:chunk_exit", 1000 + i, &Tags::new())
                .await;
        }

        let page_one = logger.get_around("world", 0, 64, 0, 1.0, 0, 2, None).await;
        let page_two = logger.get_around("world", 0, 64, 0, 1.0, 2, 2, None).await;

        assert_eq!(
            page_one.iter().map(|e| e.timestamp).collect::<Vec<_>>(),
            vec![1004, 1003]
        );
        assert_eq!(
            page_two.iter().map(|e| e.timestamp).collect::<Vec<_>>(),
            vec![1002, 1001]
        );

        logger.close().await;
    }

    #[tokio::test]
    async fn newest_entry_comes_first_at_same_location() {
        let dir = TempDir::new().unwrap();
        let logger = open_logger(&dir);

        logger.log("world", 0, 64, 0, "old", 1000, &Tags::new()).await;
        logger.log("world", 0, 64, 0, "new", 2000, &Tags::new()).await;

        let top = logger.get_around("world", 0, 64, 0, 1.0, 0, 1, None).await;
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].timestamp, 2000);
        assert_eq!(top[0].action, "new");

        logger.close().await;
    }

    #[tokio::test]
    async fn format_prefers_registered_formatter_and_falls_back() {
        let dir = TempDir::new().unwrap();
        let (db, _shutdown) = Database::open(&dir.path().join("data.sqlite")).unwrap();
        let mut formatters = FormatterTable::new();
        formatters.register(
            "wal:block_entity_break",
            template_formatter("{player_gamertag} broke {block_entity}"),
        );
        let logger = ActionLogger::new(db, formatters);

        let t = tags(&[("player_gamertag", "alex"), ("block_entity", "Furnace")]);
        assert_eq!(
            logger.format("wal:block_entity_break", "world", 0, 64, 0, &t),
            "alex broke Furnace"
        );
        assert_eq!(
            logger.format("unregistered", "world", 0, 64, 0, &tags(&[("a", "1")])),
            r#"{"a":"1"}"#
        );

        logger.close().await;
    }

    #[tokio::test]
    async fn close_twice_is_a_no_op() {
        let dir = TempDir::new().unwrap();
        let logger = open_logger(&dir);

        logger.close().await;
        logger.close().await;
    }
}
