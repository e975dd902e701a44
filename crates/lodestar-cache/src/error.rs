pub type Result<T> = std::result::Result<T, CacheError>;

/// Errors produced by cache management and persistence.
///
/// Unreadable or corrupt cache entries are never reported through this type; they
/// degrade to cache misses.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("bincode error: {0}")]
    Bincode(#[from] bincode::Error),
}
