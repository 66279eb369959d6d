use crate::error::DaoError;
use crate::runtime::ChainSnapshot;
use crate::storage_traits::{decode_snapshot, encode_snapshot, ChainStore};
use log::debug;
use rocksdb::{Options, DB};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Key under which the current snapshot frame is kept
const SNAPSHOT_KEY: &[u8] = b"chain/snapshot";

/// RocksDB-backed snapshot store
pub struct RocksDbChainStore {
    db: Arc<DB>,
    db_path: PathBuf,
}

impl RocksDbChainStore {
    /// Opens (or creates) a store at the specified path
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, DaoError> {
        let db_path = path.as_ref().to_path_buf();

        let mut opts = Options::default();
        opts.create_if_missing(true);
        let db = DB::open(&opts, &db_path)?;

        Ok(Self {
            db: Arc::new(db),
            db_path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }
}

impl ChainStore for RocksDbChainStore {
    fn save(&self, snapshot: &ChainSnapshot) -> Result<(), DaoError> {
        let frame = encode_snapshot(snapshot)?;
        self.db.put(SNAPSHOT_KEY, &frame)?;
        debug!("Stored {} byte snapshot in {}", frame.len(), self.db_path.display());
        Ok(())
    }

    fn load(&self) -> Result<Option<ChainSnapshot>, DaoError> {
        self.db
            .get(SNAPSHOT_KEY)?
            .map(|frame| decode_snapshot(&frame))
            .transpose()
    }
}
