//! Connection pool over `HolderStore`.
//!
//! `rusqlite::Connection` is `Send` but not `Sync`, so each concurrent
//! reader checks out its own connection from an `r2d2` pool. Every new
//! connection is prepared and migrated by the pool's init hook.

use crate::{
    error::{HolderError, HolderResult},
    store::{prepare_connection, HolderStore},
};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::OpenFlags;

pub const MEMORY_URL: &str = ":memory:";

#[derive(Clone)]
pub struct StorePool {
    inner: Pool<SqliteConnectionManager>,
}

fn pool_error(e: r2d2::Error) -> HolderError {
    HolderError::Pool(e.to_string())
}

impl StorePool {
    /// Open a pool of at most `max_size` connections on `url`.
    ///
    /// `:memory:` is a single private connection that is never recycled:
    /// the database lives exactly as long as the pool, and readers and
    /// writers take turns on it.
    pub fn open(url: &str, max_size: usize) -> HolderResult<Self> {
        let builder = Pool::builder().max_size(max_size.max(1) as u32);
        let inner = if url == MEMORY_URL {
            builder
                .max_size(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .build(SqliteConnectionManager::memory().with_init(prepare_connection))
        } else {
            let manager = SqliteConnectionManager::file(url)
                .with_flags(
                    OpenFlags::SQLITE_OPEN_READ_WRITE
                        | OpenFlags::SQLITE_OPEN_CREATE
                        | OpenFlags::SQLITE_OPEN_URI
                        | OpenFlags::SQLITE_OPEN_NO_MUTEX,
                )
                .with_init(prepare_connection);
            builder.build(manager)
        }
        .map_err(pool_error)?;
        log::info!("Opened database {url} (pool size {})", inner.max_size());
        Ok(Self { inner })
    }

    /// Pool on a fresh private in-memory database.
    pub fn in_memory() -> HolderResult<Self> {
        Self::open(MEMORY_URL, 1)
    }

    /// Check out a connection, waiting up to the pool's timeout.
    pub fn acquire(&self) -> HolderResult<HolderStore> {
        self.inner.get().map(HolderStore::new).map_err(pool_error)
    }

    pub fn max_size(&self) -> u32 {
        self.inner.max_size()
    }
}
