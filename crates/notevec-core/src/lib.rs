#![deny(unused_variables)]

pub mod chunker;
pub mod config;
pub mod corpus;
pub mod error;
pub mod traits;
pub mod types;

pub use chunker::Chunker;
pub use config::{Config, EngineConfig, ProviderConfig, ProviderKind};
pub use corpus::{Corpus, CorpusFile};
pub use error::{EmbedError, Error, Result};
pub use traits::{EmbedProvider, EmbedRequest};
pub use types::{Chunk, ChunkKey, Document, Fingerprint, Scope, SearchHit};
