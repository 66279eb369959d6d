use crate::error::DaoError;
use crate::runtime::ChainSnapshot;
use std::sync::Mutex;

/// Tag at the start of every stored snapshot frame
pub const SNAPSHOT_MAGIC: &[u8; 4] = b"DAOS";

const CHECKSUM_LEN: usize = 32;

/// Persistence backend for chain snapshots
pub trait ChainStore {
    /// Replace the stored snapshot
    fn save(&self, snapshot: &ChainSnapshot) -> Result<(), DaoError>;

    /// The last saved snapshot, or `None` when nothing was saved yet
    fn load(&self) -> Result<Option<ChainSnapshot>, DaoError>;
}

/// Frame a snapshot as `magic || blake3(body) || body` with a bincode body
pub fn encode_snapshot(snapshot: &ChainSnapshot) -> Result<Vec<u8>, DaoError> {
    let body = bincode::serialize(snapshot)?;
    let checksum = blake3::hash(&body);

    let mut frame = Vec::with_capacity(SNAPSHOT_MAGIC.len() + CHECKSUM_LEN + body.len());
    frame.extend_from_slice(SNAPSHOT_MAGIC);
    frame.extend_from_slice(checksum.as_bytes());
    frame.extend_from_slice(&body);
    Ok(frame)
}

/// Check and decode a frame produced by `encode_snapshot`
pub fn decode_snapshot(frame: &[u8]) -> Result<ChainSnapshot, DaoError> {
    let header_len = SNAPSHOT_MAGIC.len() + CHECKSUM_LEN;
    if frame.len() < header_len {
        return Err(DaoError::Corrupted(format!("frame of {} bytes is truncated", frame.len())));
    }

    let (magic, rest) = frame.split_at(SNAPSHOT_MAGIC.len());
    if magic != SNAPSHOT_MAGIC {
        return Err(DaoError::Corrupted("unknown snapshot tag".to_string()));
    }

    let (checksum, body) = rest.split_at(CHECKSUM_LEN);
    if blake3::hash(body).as_bytes() != checksum {
        return Err(DaoError::Corrupted("checksum mismatch".to_string()));
    }

    Ok(bincode::deserialize(body)?)
}

/// Keeps the encoded frame in memory; useful for tests and ephemeral chains
#[derive(Debug, Default)]
pub struct MemoryChainStore {
    frame: Mutex<Option<Vec<u8>>>,
}

impl MemoryChainStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ChainStore for MemoryChainStore {
    fn save(&self, snapshot: &ChainSnapshot) -> Result<(), DaoError> {
        let frame = encode_snapshot(snapshot)?;
        let mut guard = self
            .frame
            .lock()
            .map_err(|e| DaoError::Database(format!("Failed to acquire lock: {}", e)))?;
        *guard = Some(frame);
        Ok(())
    }

    fn load(&self) -> Result<Option<ChainSnapshot>, DaoError> {
        let guard = self
            .frame
            .lock()
            .map_err(|e| DaoError::Database(format!("Failed to acquire lock: {}", e)))?;
        guard.as_deref().map(decode_snapshot).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::tests::new_chain;

    #[test]
    fn test_memory_store_starts_empty() {
        let store = MemoryChainStore::new();
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_frame_layout() {
        let chain = new_chain();
        let frame = encode_snapshot(&chain.snapshot()).unwrap();

        assert_eq!(&frame[..4], SNAPSHOT_MAGIC);
        assert_eq!(&frame[4..36], blake3::hash(&frame[36..]).as_bytes());
    }

    #[test]
    fn test_tampered_frame_rejected() {
        let chain = new_chain();
        let mut frame = encode_snapshot(&chain.snapshot()).unwrap();
        let last = frame.len() - 1;
        frame[last] ^= 0xff;

        assert!(matches!(decode_snapshot(&frame), Err(DaoError::Corrupted(_))));
        assert!(matches!(decode_snapshot(&frame[..10]), Err(DaoError::Corrupted(_))));

        frame[0] = b'X';
        assert!(matches!(decode_snapshot(&frame), Err(DaoError::Corrupted(_))));
    }
}
