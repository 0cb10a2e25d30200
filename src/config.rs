use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Hard ceiling applied to every listing `limit`.
pub const MAX_PAGE_SIZE: u32 = 500;

/// Listing page size when the caller passes 0.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Connections older than this are closed and reopened before the next
/// operation, keeping long-lived handles ahead of server-side idle timeouts.
pub const DEFAULT_RECYCLE_AFTER: Duration = Duration::from_secs(3600);

/// Where the record store keeps its data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    Disk(PathBuf),
    Memory,
}

impl fmt::Display for StoreLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disk(path) => write!(f, "{}", path.display()),
            Self::Memory => write!(f, ":memory:"),
        }
    }
}

/// Record store configuration, passed explicitly to [`RecordStore::open`].
/// There is no ambient global configuration.
///
/// [`RecordStore::open`]: crate::db::RecordStore::open
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub location: StoreLocation,
    /// Maximum age of a live connection before it is recycled.
    pub recycle_after: Duration,
    /// Upper bound for listing page sizes.
    pub max_page_size: u32,
}

impl StoreConfig {
    /// Configuration for an on-disk store at `path`.
    pub fn on_disk(path: impl Into<PathBuf>) -> Self {
        Self {
            location: StoreLocation::Disk(path.into()),
            recycle_after: DEFAULT_RECYCLE_AFTER,
            max_page_size: MAX_PAGE_SIZE,
        }
    }

    /// Configuration for an in-memory store (tests, ephemeral use).
    pub fn in_memory() -> Self {
        Self {
            location: StoreLocation::Memory,
            recycle_after: DEFAULT_RECYCLE_AFTER,
            max_page_size: MAX_PAGE_SIZE,
        }
    }

    pub fn is_disk(&self) -> bool {
        matches!(self.location, StoreLocation::Disk(_))
    }

    /// Clamp a caller-supplied limit into `1..=max_page_size`.
    /// A limit of 0 falls back to the default page size.
    pub fn clamp_limit(&self, limit: u32) -> u32 {
        if limit == 0 {
            DEFAULT_PAGE_SIZE.min(self.max_page_size)
        } else {
            limit.min(self.max_page_size)
        }
    }
}
