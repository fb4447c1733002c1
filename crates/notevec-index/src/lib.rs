//! Incremental vector index over a markdown corpus: change detection, atomic
//! persistence, batched embedding builds, cosine search, and status.

pub mod fingerprint;
pub mod indexer;
pub mod search;
pub mod status;
pub mod store;

pub use fingerprint::{FingerprintStore, Freshness};
pub use indexer::{BuildOptions, BuildOutcome, BuildReport, CancelFlag, Indexer};
pub use search::{cosine_similarity, SearchEngine, SearchOutcome, SearchQuery};
pub use status::{status, IndexStatus, StatusReport};
pub use store::{merge, BuildLock, IndexEntry, IndexStore, LoadOrigin, LoadedIndex, VectorIndex};
