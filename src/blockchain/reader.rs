use std::io::Read;

use log::warn;

use super::difficulty::SignPolicy;
use super::framer::Framer;
use super::record::BlockRecord;
use crate::error::Result;

/// Frames, decodes and enriches every block of a dump stream.
///
/// A decoding failure is tagged with its record position and the next call
/// carries on with the following record; a framing failure ends iteration.
pub struct BlockReader<R> {
    framer: Framer<R>,
    policy: SignPolicy,
}

impl<R: Read> BlockReader<R> {
    pub fn new(framer: Framer<R>) -> Self {
        Self {
            framer,
            policy: SignPolicy::default(),
        }
    }

    pub fn sign_policy(mut self, policy: SignPolicy) -> Self {
        self.policy = policy;
        self
    }
}

impl<R: Read> Iterator for BlockReader<R> {
    type Item = Result<BlockRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        let raw = match self.framer.next()? {
            Ok(raw) => raw,
            Err(err) => return Some(Err(err)),
        };
        let decoded = BlockRecord::from_raw(&raw, self.policy).map_err(|err| {
            warn!("record {} at offset {} failed to decode: {err}", raw.index, raw.offset);
            err.in_record(raw.index, raw.offset)
        });
        Some(decoded)
    }
}
