//! Block dump parsing.
//!
//! Frames `[marker][size][block]` records out of a raw dump stream, decodes the
//! 80-byte header of each block and derives its target and difficulty ratios
//! from the compact `bits` encoding.

pub mod blockchain;
pub mod config;
pub mod error;

pub use blockchain::{
    BlockHeader, BlockReader, BlockRecord, CompactTarget, DifficultyMetrics, Framer,
    RawBlockRecord, SignPolicy,
};
pub use config::{Config, ConfigError, ErrorMode};
pub use error::{ParseError, Result, StreamFault};
