pub mod difficulty;
pub mod framer;
pub mod header;
pub mod reader;
pub mod record;

pub use difficulty::{
    DECIMAL_PRECISION, Difficulty, DifficultyMetrics, GENESIS_TARGET, GENESIS_TARGET_TRUNCATED,
    SignPolicy, compute_bdifficulty, compute_pdifficulty, compute_target, format_target,
    to_decimal_string,
};
pub use framer::{Framer, RawBlockRecord};
pub use header::{BlockHeader, CompactTarget};
pub use reader::BlockReader;
pub use record::BlockRecord;

/// Size of the fixed block header at the start of every raw block.
pub const HEADER_SIZE: usize = 80;

/// Start-of-record marker preceding each block in a dump.
pub const MARKER_SIZE: usize = 4;

/// Little-endian signed length following the marker.
pub const SIZE_FIELD_SIZE: usize = 4;

/// Mainnet network magic, the usual start marker in `blk*.dat` files.
pub const MAINNET_MAGIC: [u8; 4] = [0xf9, 0xbe, 0xb4, 0xd9];
