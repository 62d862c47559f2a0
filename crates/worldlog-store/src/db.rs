// ABOUTME: SQLite-backed store for action entries and their tags.
// ABOUTME: A dedicated actor thread owns the connection; callers talk to it over channels.

use std::any::Any;
use std::path::Path;

use rusqlite::{Connection, named_params};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use worldlog_core::entry::{EntryHeader, EntryId, Tags};

use crate::shutdown::ShutdownSignal;

/// Errors that can occur while opening the store. Faults after open are not
/// surfaced as errors; see the fatal-fault policy on [`Database`].
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Spatial filter shared by the region select and count operations: entries
/// in `world` within Euclidean distance `radius` of `(x, y, z)`, further
/// restricted to `action` when it is non-empty.
#[derive(Debug, Clone)]
pub struct RegionQuery {
    pub world: String,
    pub x: i64,
    pub y: i64,
    pub z: i64,
    pub radius: f64,
    /// Action filter; the empty string means "no filter".
    pub action: String,
}

/// Message type sent to the store actor: an operation paired with the
/// oneshot sender its result is delivered on.
enum DbCommand {
    InsertHeader {
        world: String,
        x: i64,
        y: i64,
        z: i64,
        action: String,
        timestamp: i64,
        reply: oneshot::Sender<EntryId>,
    },
    InsertTag {
        entry_id: EntryId,
        tag: String,
        value: String,
        reply: oneshot::Sender<()>,
    },
    SelectHeaders {
        query: RegionQuery,
        offset: u32,
        limit: u32,
        reply: oneshot::Sender<Vec<EntryHeader>>,
    },
    CountHeaders {
        query: RegionQuery,
        reply: oneshot::Sender<u64>,
    },
    SelectTags {
        entry_id: EntryId,
        reply: oneshot::Sender<Tags>,
    },
    Close {
        reply: oneshot::Sender<()>,
    },
}

/// Async handle to the single SQLite connection. Cloneable; all clones feed
/// the same command queue, so every statement issued through any handle is
/// serialized by the actor thread that owns the connection.
///
/// Fatal-fault policy: any SQLite error after open is unrecoverable. The
/// actor logs it, raises the [`ShutdownSignal`] so the host can begin an
/// orderly shutdown, and parks the faulting operation's reply channel. The
/// awaiting future never completes, and neither does any operation issued
/// afterward. No caller proceeds on a known-broken store.
#[derive(Debug, Clone)]
pub struct Database {
    cmd_tx: mpsc::Sender<DbCommand>,
}

impl Database {
    /// Open (or create) the database at the given path, run the schema, and
    /// spawn the actor thread that owns the connection.
    ///
    /// Returns the handle plus the shutdown signal the host should watch
    /// for fatal storage faults.
    pub fn open(path: &Path) -> Result<(Self, ShutdownSignal), StoreError> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS actions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                world TEXT NOT NULL,
                x INTEGER NOT NULL,
                y INTEGER NOT NULL,
                z INTEGER NOT NULL,
                action TEXT NOT NULL,
                timestamp INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS actions_idx_world ON actions (world);
            CREATE INDEX IF NOT EXISTS actions_idx_coords ON actions (x, y, z);

            CREATE TABLE IF NOT EXISTS actions_tags (
                entry_id INTEGER NOT NULL REFERENCES actions (id),
                tag TEXT NOT NULL,
                value TEXT NOT NULL
            );

            CREATE UNIQUE INDEX IF NOT EXISTS actions_tags_idx_entry_tag
                ON actions_tags (entry_id, tag);",
        )?;

        let (cmd_tx, cmd_rx) = mpsc::channel::<DbCommand>(64);
        let (shutdown_tx, shutdown) = ShutdownSignal::new();

        let actor = StoreActor {
            conn,
            cmd_rx,
            shutdown_tx,
        };
        std::thread::spawn(move || actor.run());

        Ok((Self { cmd_tx }, shutdown))
    }

    /// Append one entry header; returns the store-assigned id.
    pub async fn insert_header(
        &self,
        world: &str,
        x: i64,
        y: i64,
        z: i64,
        action: &str,
        timestamp: i64,
    ) -> EntryId {
        let (reply, rx) = oneshot::channel();
        self.request(
            DbCommand::InsertHeader {
                world: world.to_string(),
                x,
                y,
                z,
                action: action.to_string(),
                timestamp,
                reply,
            },
            rx,
        )
        .await
    }

    /// Append one tag row for an existing entry. A repeated tag name for the
    /// same entry overwrites the previous value (last write wins).
    pub async fn insert_tag(&self, entry_id: EntryId, tag: &str, value: &str) {
        let (reply, rx) = oneshot::channel();
        self.request(
            DbCommand::InsertTag {
                entry_id,
                tag: tag.to_string(),
                value: value.to_string(),
                reply,
            },
            rx,
        )
        .await
    }

    /// Fetch at most `limit` entry headers matching the region query,
    /// skipping `offset`, ordered newest-first (timestamp, then id).
    pub async fn select_headers_in_region(
        &self,
        query: RegionQuery,
        offset: u32,
        limit: u32,
    ) -> Vec<EntryHeader> {
        let (reply, rx) = oneshot::channel();
        self.request(
            DbCommand::SelectHeaders {
                query,
                offset,
                limit,
                reply,
            },
            rx,
        )
        .await
    }

    /// Count all entry headers matching the region query, pre-pagination.
    pub async fn count_headers_in_region(&self, query: RegionQuery) -> u64 {
        let (reply, rx) = oneshot::channel();
        self.request(DbCommand::CountHeaders { query, reply }, rx).await
    }

    /// Fetch all tags stored for an entry; empty map if none.
    pub async fn select_tags_for_entry(&self, entry_id: EntryId) -> Tags {
        let (reply, rx) = oneshot::channel();
        self.request(DbCommand::SelectTags { entry_id, reply }, rx).await
    }

    /// Close the connection and stop the actor thread. Idempotent: closing
    /// an already-closed store is a no-op.
    pub async fn close(&self) {
        let (reply, rx) = oneshot::channel();
        if self.cmd_tx.send(DbCommand::Close { reply }).await.is_err() {
            return;
        }
        // The ack is dropped unsent only if the actor already fataled, in
        // which case the await below parks with everything else.
        let _ = rx.await;
    }

    async fn request<T>(&self, cmd: DbCommand, rx: oneshot::Receiver<T>) -> T {
        if self.cmd_tx.send(cmd).await.is_err() {
            panic!("worldlog store used after close");
        }
        match rx.await {
            Ok(value) => value,
            // The actor replies to every command it completes and parks the
            // sender on a fatal fault, so a dropped sender means the store
            // was closed while this call was in flight.
            Err(_) => panic!("worldlog store used after close"),
        }
    }
}

/// The actor that owns the connection and processes commands sequentially.
struct StoreActor {
    conn: Connection,
    cmd_rx: mpsc::Receiver<DbCommand>,
    shutdown_tx: watch::Sender<bool>,
}

/// A storage fault carrying the faulting operation's reply sender, kept
/// alive so the caller's await never completes.
struct Fault {
    error: rusqlite::Error,
    parked: Box<dyn Any + Send>,
}

impl StoreActor {
    fn run(mut self) {
        while let Some(cmd) = self.cmd_rx.blocking_recv() {
            match self.handle(cmd) {
                Ok(true) => continue,
                Ok(false) => return,
                Err(fault) => {
                    self.freeze(fault);
                    return;
                }
            }
        }
    }

    /// Execute one command. Returns Ok(false) on close, Err on a storage
    /// fault. Reply send failures are ignored: the caller may have been
    /// torn down already.
    fn handle(&mut self, cmd: DbCommand) -> Result<bool, Fault> {
        match cmd {
            DbCommand::InsertHeader {
                world,
                x,
                y,
                z,
                action,
                timestamp,
                reply,
            } => match self.insert_header(&world, x, y, z, &action, timestamp) {
                Ok(id) => {
                    let _ = reply.send(id);
                }
                Err(error) => return Err(Fault { error, parked: Box::new(reply) }),
            },

            DbCommand::InsertTag { entry_id, tag, value, reply } => {
                match self.insert_tag(entry_id, &tag, &value) {
                    Ok(()) => {
                        let _ = reply.send(());
                    }
                    Err(error) => return Err(Fault { error, parked: Box::new(reply) }),
                }
            }

            DbCommand::SelectHeaders { query, offset, limit, reply } => {
                match self.select_headers(&query, offset, limit) {
                    Ok(headers) => {
                        let _ = reply.send(headers);
                    }
                    Err(error) => return Err(Fault { error, parked: Box::new(reply) }),
                }
            }

            DbCommand::CountHeaders { query, reply } => match self.count_headers(&query) {
                Ok(count) => {
                    let _ = reply.send(count);
                }
                Err(error) => return Err(Fault { error, parked: Box::new(reply) }),
            },

            DbCommand::SelectTags { entry_id, reply } => match self.select_tags(entry_id) {
                Ok(tags) => {
                    let _ = reply.send(tags);
                }
                Err(error) => return Err(Fault { error, parked: Box::new(reply) }),
            },

            DbCommand::Close { reply } => {
                let _ = reply.send(());
                return Ok(false);
            }
        }

        Ok(true)
    }

    /// Fatal-fault path: log, raise the shutdown signal, then hold every
    /// pending and future reply channel open without ever answering, so no
    /// caller proceeds on a broken store.
    fn freeze(mut self, fault: Fault) {
        tracing::error!("fatal storage fault: {}", fault.error);
        tracing::error!("requesting shutdown; in-flight store operations will not complete");
        let _ = self.shutdown_tx.send(true);

        let mut parked: Vec<Box<dyn Any + Send>> = vec![fault.parked];
        while let Some(cmd) = self.cmd_rx.blocking_recv() {
            parked.push(Box::new(cmd));
        }
        // All handles dropped; the process is expected to be exiting.
        drop(parked);
    }

    fn insert_header(
        &self,
        world: &str,
        x: i64,
        y: i64,
        z: i64,
        action: &str,
        timestamp: i64,
    ) -> Result<EntryId, rusqlite::Error> {
        self.conn.execute(
            "INSERT INTO actions (world, x, y, z, action, timestamp)
             VALUES (:world, :x, :y, :z, :action, :timestamp)",
            named_params! {
                ":world": world,
                ":x": x,
                ":y": y,
                ":z": z,
                ":action": action,
                ":timestamp": timestamp,
            },
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn insert_tag(&self, entry_id: EntryId, tag: &str, value: &str) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "INSERT INTO actions_tags (entry_id, tag, value)
             VALUES (:entry_id, :tag, :value)
             ON CONFLICT (entry_id, tag) DO UPDATE SET value = excluded.value",
            named_params! {
                ":entry_id": entry_id,
                ":tag": tag,
                ":value": value,
            },
        )?;
        Ok(())
    }

    fn select_headers(
        &self,
        query: &RegionQuery,
        offset: u32,
        limit: u32,
    ) -> Result<Vec<EntryHeader>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(
            "SELECT id, world, x, y, z, action, timestamp FROM actions
             WHERE world = :world
               AND (x - :x) * (x - :x) + (y - :y) * (y - :y) + (z - :z) * (z - :z)
                   <= :radius * :radius
               AND (:action = '' OR action = :action)
             ORDER BY timestamp DESC, id DESC
             LIMIT :limit OFFSET :offset",
        )?;

        let rows = stmt.query_map(
            named_params! {
                ":world": query.world,
                ":x": query.x,
                ":y": query.y,
                ":z": query.z,
                ":radius": query.radius,
                ":action": query.action,
                ":limit": limit,
                ":offset": offset,
            },
            |row| {
                Ok(EntryHeader {
                    id: row.get(0)?,
                    world: row.get(1)?,
                    x: row.get(2)?,
                    y: row.get(3)?,
                    z: row.get(4)?,
                    action: row.get(5)?,
                    timestamp: row.get(6)?,
                })
            },
        )?;

        let mut headers = Vec::new();
        for row in rows {
            headers.push(row?);
        }
        Ok(headers)
    }

    fn count_headers(&self, query: &RegionQuery) -> Result<u64, rusqlite::Error> {
        let mut stmt = self.conn.prepare(
            "SELECT COUNT(*) FROM actions
             WHERE world = :world
               AND (x - :x) * (x - :x) + (y - :y) * (y - :y) + (z - :z) * (z - :z)
                   <= :radius * :radius
               AND (:action = '' OR action = :action)",
        )?;

        stmt.query_row(
            named_params! {
                ":world": query.world,
                ":x": query.x,
                ":y": query.y,
                ":z": query.z,
                ":radius": query.radius,
                ":action": query.action,
            },
            |row| row.get(0),
        )
    }

    fn select_tags(&self, entry_id: EntryId) -> Result<Tags, rusqlite::Error> {
        let mut stmt = self
            .conn
            .prepare("SELECT tag, value FROM actions_tags WHERE entry_id = :entry_id")?;

        let rows = stmt.query_map(named_params! { ":entry_id": entry_id }, |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut tags = Tags::new();
        for row in rows {
            let (tag, value) = row?;
            tags.insert(tag, value);
        }
        Ok(tags)
    }
}
