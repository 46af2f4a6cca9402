//! # Persistence Format
//!
//! Binary serialization for tab queue records.
//!
//! Format: Header (5 bytes) + postcard-serialized `TabQueueRecord`.
//! - 4 bytes: Magic ("ATLQ")
//! - 1 byte: Version
//!
//! ## Validation
//!
//! Size and header are checked before the payload is handed to postcard, so
//! a corrupted or oversized record is rejected without allocating for it.

use crate::{AtomlensError, TabQueueRecord, primitives};

// =============================================================================
// LIMITS
// =============================================================================

/// Maximum accepted size of one encoded record.
///
/// A full queue of large creation payloads stays far below this.
pub const MAX_RECORD_SIZE: usize = 16 * 1024 * 1024; // 16 MB

/// Header length in bytes.
const HEADER_LEN: usize = 5;

// =============================================================================
// RECORD HEADER
// =============================================================================

/// The header that precedes every persisted record.
#[derive(Debug, Clone, Copy)]
pub struct RecordHeader {
    pub magic: [u8; 4],
    pub version: u8,
}

impl RecordHeader {
    /// Create a header with the current format version.
    #[must_use]
    pub fn new() -> Self {
        Self {
            magic: *primitives::MAGIC_BYTES,
            version: primitives::FORMAT_VERSION,
        }
    }

    pub fn validate(&self) -> Result<(), AtomlensError> {
        if &self.magic != primitives::MAGIC_BYTES {
            return Err(AtomlensError::Serialization(
                "Invalid magic bytes".to_string(),
            ));
        }
        if self.version != primitives::FORMAT_VERSION {
            return Err(AtomlensError::Serialization(format!(
                "Unsupported version: {} (expected {})",
                self.version,
                primitives::FORMAT_VERSION
            )));
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut bytes = [0u8; HEADER_LEN];
        bytes[0..4].copy_from_slice(&self.magic);
        bytes[4] = self.version;
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, AtomlensError> {
        if bytes.len() < HEADER_LEN {
            return Err(AtomlensError::Serialization(
                "Header too short".to_string(),
            ));
        }
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[0..4]);
        Ok(Self {
            magic,
            version: bytes[4],
        })
    }
}

impl Default for RecordHeader {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// SERIALIZATION FUNCTIONS
// =============================================================================

/// Encode a record (header + payload).
pub fn record_to_bytes(record: &TabQueueRecord) -> Result<Vec<u8>, AtomlensError> {
    let payload =
        postcard::to_stdvec(record).map_err(|e| AtomlensError::Serialization(e.to_string()))?;

    let mut result = Vec::with_capacity(HEADER_LEN + payload.len());
    result.extend_from_slice(&RecordHeader::new().to_bytes());
    result.extend_from_slice(&payload);
    Ok(result)
}

/// Decode a record.
///
/// Rejects, in order: data shorter than the header, data larger than
/// `MAX_RECORD_SIZE`, a foreign or outdated header, a malformed payload.
pub fn record_from_bytes(bytes: &[u8]) -> Result<TabQueueRecord, AtomlensError> {
    if bytes.len() < HEADER_LEN {
        return Err(AtomlensError::Serialization(format!(
            "Data too short: minimum {HEADER_LEN} bytes required"
        )));
    }

    if bytes.len() > MAX_RECORD_SIZE {
        return Err(AtomlensError::Serialization(format!(
            "Data size {} bytes exceeds maximum allowed {} bytes",
            bytes.len(),
            MAX_RECORD_SIZE
        )));
    }

    RecordHeader::from_bytes(bytes)?.validate()?;

    postcard::from_bytes(&bytes[HEADER_LEN..]).map_err(|e| {
        AtomlensError::Serialization(format!("Failed to deserialize queue record: {e}"))
    })
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        AtomMatch, AtomQuery, CreationData, QueryId, QueryResult, QuerySource, QueueItem,
        QueueItemId, Stake, VaultAggregate,
    };

    fn sample_record() -> TabQueueRecord {
        let mut creation = CreationData {
            entity_type: "Person".to_string(),
            name: "Alice".to_string(),
            platform: Some("x".to_string()),
            username: Some("alice".to_string()),
            ..CreationData::default()
        };
        creation
            .metadata
            .insert("source_page".to_string(), "https://x.com/alice".to_string());

        let query = AtomQuery::new(QueryId::new("q1"), "x.com:alice", QuerySource::Hover, 10)
            .with_creation_data(creation);
        let mut item = QueueItem::new(QueueItemId::new("q1_10_0"), query.clone(), 10);
        let vault = VaultAggregate {
            term_id: "0xabc".to_string(),
            curve_id: 1,
            total_shares: "123456789012345678901234567890".parse().expect("stake"),
            position_count: 4,
        };
        let m = AtomMatch::from_vaults("0xabc", "alice", "x.com:alice", "2025-01-01", None, vec![vault]);
        item.result = QueryResult::resolved(query.id.clone(), &query.query, vec![m], None);
        item.is_pinned = true;

        TabQueueRecord {
            items: vec![item],
            tab_context_url: Some("https://x.com/home".to_string()),
            last_updated: 42,
        }
    }

    #[test]
    fn header_roundtrip() {
        let bytes = RecordHeader::new().to_bytes();
        let restored = RecordHeader::from_bytes(&bytes).expect("parse header");
        assert_eq!(restored.magic, *primitives::MAGIC_BYTES);
        assert_eq!(restored.version, primitives::FORMAT_VERSION);
    }

    #[test]
    fn record_survives_encoding() {
        let record = sample_record();
        let bytes = record_to_bytes(&record).expect("encode");
        assert_eq!(&bytes[0..4], primitives::MAGIC_BYTES);

        let restored = record_from_bytes(&bytes).expect("decode");
        assert_eq!(restored, record);
        assert_eq!(
            restored.items[0].result.matches()[0].total_staked,
            "123456789012345678901234567890".parse::<Stake>().expect("stake")
        );
    }

    #[test]
    fn invalid_magic_rejected() {
        let mut bytes = vec![0u8; 10];
        bytes[0..4].copy_from_slice(b"XXXX");
        assert!(record_from_bytes(&bytes).is_err());
    }

    #[test]
    fn future_version_rejected() {
        let mut bytes = record_to_bytes(&TabQueueRecord::default()).expect("encode");
        bytes[4] = primitives::FORMAT_VERSION + 1;
        assert!(record_from_bytes(&bytes).is_err());
    }

    #[test]
    fn truncated_payload_rejected() {
        let bytes = record_to_bytes(&sample_record()).expect("encode");
        assert!(record_from_bytes(&bytes[..bytes.len() / 2]).is_err());
        assert!(record_from_bytes(&bytes[..3]).is_err());
    }
}
