//! Batch construction: target resolution, dedup and the transport port

pub mod builder;
pub mod dedup;
pub mod ports;
pub mod target;

pub use builder::{BatchBuilder, PreparedBatch};
pub use dedup::{dedup, redup, DedupGroups, DedupKey};
pub use ports::{BatchTransport, ProofProvider};
pub use target::RelativeUrl;
