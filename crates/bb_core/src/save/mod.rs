// Match persistence
// MessagePack + LZ4 compression with versioning and integrity checks

pub mod error;
pub mod format;
pub mod store;

pub use error::SaveError;
pub use format::{decode, encode, MatchSave};
pub use store::{FileMatchStore, MatchStore, MemoryMatchStore};

pub const SAVE_VERSION: u32 = 1;
