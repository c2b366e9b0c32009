use chrono::Utc;
use lz4_flex::{compress_prepend_size, decompress_size_prepended};
use rmp_serde::{from_slice, to_vec_named};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::error::SaveError;
use super::SAVE_VERSION;
use crate::models::VenueId;
use crate::state::Match;

const CHECKSUM_LEN: usize = 32;

/// On-disk envelope for one venue's match.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct MatchSave {
    /// Save format version
    pub version: u32,

    /// Save timestamp (unix milliseconds)
    pub saved_at_ms: i64,

    pub venue: VenueId,

    pub state: Match,
}

impl MatchSave {
    pub fn new(venue: VenueId, state: Match) -> Self {
        Self { version: SAVE_VERSION, saved_at_ms: Utc::now().timestamp_millis(), venue, state }
    }
}

/// Serialize, compress and checksum a save envelope.
pub fn encode(save: &MatchSave) -> Result<Vec<u8>, SaveError> {
    // 1. MessagePack with field names
    let msgpack = to_vec_named(save)?;

    // 2. LZ4 with the uncompressed size prepended
    let compressed = compress_prepend_size(&msgpack);

    // 3. SHA-256 of the compressed payload at the end
    let checksum = Sha256::digest(&compressed);

    let mut bytes = compressed;
    bytes.extend_from_slice(&checksum);
    Ok(bytes)
}

/// Verify, decompress and deserialize a save envelope.
pub fn decode(bytes: &[u8]) -> Result<MatchSave, SaveError> {
    // size header + checksum
    if bytes.len() < 4 + CHECKSUM_LEN {
        return Err(SaveError::Corrupted);
    }

    let (payload, checksum) = bytes.split_at(bytes.len() - CHECKSUM_LEN);
    if Sha256::digest(payload).as_slice() != checksum {
        return Err(SaveError::ChecksumMismatch);
    }

    let msgpack = decompress_size_prepended(payload).map_err(|_| SaveError::Decompression)?;
    let save: MatchSave = from_slice(&msgpack)?;

    if save.version > SAVE_VERSION {
        return Err(SaveError::VersionMismatch { found: save.version, expected: SAVE_VERSION });
    }
    Ok(save)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MatchConfig;
    use crate::models::PlayerId;
    use crate::state::test_support::started;

    #[test]
    fn test_lobby_survives_encoding() {
        let save = MatchSave::new(VenueId(7), Match::open_lobby(PlayerId(1), "host", MatchConfig::default()));
        let decoded = decode(&encode(&save).unwrap()).unwrap();
        assert_eq!(decoded, save);
    }

    #[test]
    fn test_checksum_validation() {
        let save = MatchSave::new(VenueId(1), started(MatchConfig::default()));
        let mut bytes = encode(&save).unwrap();

        if let Some(last) = bytes.last_mut() {
            *last = last.wrapping_add(1);
        }
        assert!(matches!(decode(&bytes), Err(SaveError::ChecksumMismatch)));
    }

    #[test]
    fn test_flipped_payload_byte_fails_checksum() {
        let save = MatchSave::new(VenueId(1), started(MatchConfig::default()));
        let mut bytes = encode(&save).unwrap();
        bytes[6] ^= 0xff;
        assert!(matches!(decode(&bytes), Err(SaveError::ChecksumMismatch)));
    }

    #[test]
    fn test_truncated_input_is_corrupted() {
        assert!(matches!(decode(&[0u8; 10]), Err(SaveError::Corrupted)));
    }

    #[test]
    fn test_newer_version_rejected() {
        let mut save = MatchSave::new(VenueId(1), started(MatchConfig::default()));
        save.version = SAVE_VERSION + 1;
        let bytes = encode(&save).unwrap();
        assert!(matches!(
            decode(&bytes),
            Err(SaveError::VersionMismatch { found, .. }) if found == SAVE_VERSION + 1
        ));
    }
}
