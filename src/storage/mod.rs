// Re-export the store trait
pub use crate::storage_traits::{ChainStore, MemoryChainStore};

// Export implementations
mod file;
pub use file::FileChainStore;

#[cfg(feature = "rocksdb")]
mod rocksdb;
#[cfg(feature = "rocksdb")]
pub use self::rocksdb::RocksDbChainStore;
