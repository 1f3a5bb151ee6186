use std::io::{self, Read};

use log::debug;

use super::{MARKER_SIZE, SIZE_FIELD_SIZE};
use crate::error::{ParseError, Result, StreamFault};

/// One framed block: the bytes following a `[marker][size]` prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawBlockRecord {
    /// Zero-based position in the stream.
    pub index: usize,
    /// Stream offset of the record's start marker.
    pub offset: u64,
    pub marker: [u8; 4],
    pub data: Vec<u8>,
}

impl RawBlockRecord {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Splits a dump stream into `RawBlockRecord`s, one read per record.
///
/// Loops until the stream is exhausted. The first failure is yielded once and
/// the iterator is fused afterwards. The reader is borrowed for its whole life,
/// closing it stays with the caller.
pub struct Framer<R> {
    reader: R,
    offset: u64,
    index: usize,
    magic: Option<[u8; 4]>,
    stop_at_padding: bool,
    done: bool,
}

impl<R: Read> Framer<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            offset: 0,
            index: 0,
            magic: None,
            stop_at_padding: false,
            done: false,
        }
    }

    /// Require every start marker to equal `magic`.
    pub fn with_magic(mut self, magic: [u8; 4]) -> Self {
        self.magic = Some(magic);
        self
    }

    /// Treat an all-zero start marker as the end of the data.
    pub fn stop_at_padding(mut self, stop: bool) -> Self {
        self.stop_at_padding = stop;
        self
    }

    /// Bytes consumed so far.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    fn next_record(&mut self) -> Result<Option<RawBlockRecord>> {
        let start = self.offset;

        let mut marker = [0u8; MARKER_SIZE];
        match self.fill(&mut marker)? {
            0 => return Ok(None),
            n if n < MARKER_SIZE => {
                return Err(self.malformed(start, StreamFault::ShortMarker { got: n }));
            }
            _ => {}
        }
        if self.stop_at_padding && marker == [0u8; MARKER_SIZE] {
            debug!("zero padding at offset {start}, stopping after {} records", self.index);
            return Ok(None);
        }
        if let Some(expected) = self.magic {
            if marker != expected {
                return Err(ParseError::UnexpectedMagic {
                    record: self.index,
                    offset: start,
                    found: marker,
                    expected,
                });
            }
        }

        let mut size = [0u8; SIZE_FIELD_SIZE];
        let got = self.fill(&mut size)?;
        if got < SIZE_FIELD_SIZE {
            return Err(self.malformed(start, StreamFault::ShortSize { got }));
        }
        let size = i32::from_le_bytes(size);
        if size < 0 {
            return Err(self.malformed(start, StreamFault::NegativeSize { size }));
        }
        let declared = size as usize;

        // `take` keeps a bogus size from reserving memory it never fills.
        let mut data = Vec::new();
        let read = (&mut self.reader)
            .take(declared as u64)
            .read_to_end(&mut data);
        let got = read.map_err(|source| self.io(start, source))?;
        self.offset += got as u64;
        if got < declared {
            return Err(self.malformed(start, StreamFault::ShortPayload { declared, got }));
        }

        let record = RawBlockRecord {
            index: self.index,
            offset: start,
            marker,
            data,
        };
        debug!(
            "framed record {} at offset {}: {} bytes",
            record.index,
            record.offset,
            record.len()
        );
        self.index += 1;
        Ok(Some(record))
    }

    /// Read until `buf` is full or the stream ends. Returns the bytes read.
    fn fill(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.reader.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(self.io(self.offset, e)),
            }
        }
        self.offset += filled as u64;
        Ok(filled)
    }

    fn malformed(&self, offset: u64, reason: StreamFault) -> ParseError {
        ParseError::MalformedStream {
            record: self.index,
            offset,
            reason,
        }
    }

    fn io(&self, offset: u64, source: io::Error) -> ParseError {
        ParseError::Io {
            record: self.index,
            offset,
            source,
        }
    }
}

impl<R: Read> Iterator for Framer<R> {
    type Item = Result<RawBlockRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

impl<R: Read> std::iter::FusedIterator for Framer<R> {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const MAINNET_MAGIC: [u8; 4] = [0xf9, 0xbe, 0xb4, 0xd9];

    fn frame(marker: [u8; 4], size: i32, data: &[u8]) -> Vec<u8> {
        let mut out = marker.to_vec();
        out.extend_from_slice(&size.to_le_bytes());
        out.extend_from_slice(data);
        out
    }

    #[test]
    fn single_record_then_exhaustion() {
        let payload = vec![7u8; 120];
        let stream = frame(MAINNET_MAGIC, 120, &payload);
        let mut framer = Framer::new(Cursor::new(stream));

        let record = framer.next().unwrap().unwrap();
        assert_eq!(record.len(), 120);
        assert_eq!(record.data, payload);
        assert_eq!(record.index, 0);
        assert_eq!(record.offset, 0);
        assert_eq!(record.marker, MAINNET_MAGIC);
        assert!(framer.next().is_none());
        assert!(framer.next().is_none());
    }

    #[test]
    fn loops_over_every_record() {
        let mut stream = frame(MAINNET_MAGIC, 3, &[1, 2, 3]);
        stream.extend(frame(MAINNET_MAGIC, 0, &[]));
        stream.extend(frame(MAINNET_MAGIC, 2, &[9, 9]));

        let records: Vec<_> = Framer::new(Cursor::new(stream))
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].data, vec![1, 2, 3]);
        assert!(records[1].is_empty());
        assert_eq!(records[2].offset, 19);
        assert_eq!(records[2].index, 2);
    }

    #[test]
    fn marker_is_not_validated_by_default() {
        let stream = frame([0xde, 0xad, 0xbe, 0xef], 1, &[5]);
        let records: Vec<_> = Framer::new(Cursor::new(stream)).collect();
        assert_eq!(records.len(), 1);
        assert!(records[0].is_ok());
    }

    #[test]
    fn empty_stream_yields_nothing() {
        let mut framer = Framer::new(Cursor::new(Vec::new()));
        assert!(framer.next().is_none());
    }

    #[test]
    fn oversized_declaration_is_malformed() {
        let stream = frame(MAINNET_MAGIC, 100, &[0u8; 40]);
        let mut framer = Framer::new(Cursor::new(stream));
        match framer.next() {
            Some(Err(ParseError::MalformedStream { record, offset, reason })) => {
                assert_eq!(record, 0);
                assert_eq!(offset, 0);
                assert_eq!(reason, StreamFault::ShortPayload { declared: 100, got: 40 });
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(framer.next().is_none());
    }

    #[test]
    fn short_marker_and_size_are_malformed() {
        let mut framer = Framer::new(Cursor::new(vec![0xf9, 0xbe]));
        assert!(matches!(
            framer.next(),
            Some(Err(ParseError::MalformedStream {
                reason: StreamFault::ShortMarker { got: 2 },
                ..
            }))
        ));

        let mut stream = frame(MAINNET_MAGIC, 1, &[1]);
        stream.extend_from_slice(&MAINNET_MAGIC);
        stream.extend_from_slice(&[0x10]);
        let mut framer = Framer::new(Cursor::new(stream));
        assert!(framer.next().unwrap().is_ok());
        match framer.next() {
            Some(Err(ParseError::MalformedStream { record, offset, reason })) => {
                assert_eq!(record, 1);
                assert_eq!(offset, 9);
                assert_eq!(reason, StreamFault::ShortSize { got: 1 });
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn negative_size_is_malformed() {
        let stream = frame(MAINNET_MAGIC, -5, &[0u8; 8]);
        let mut framer = Framer::new(Cursor::new(stream));
        assert!(matches!(
            framer.next(),
            Some(Err(ParseError::MalformedStream {
                reason: StreamFault::NegativeSize { size: -5 },
                ..
            }))
        ));
    }

    #[test]
    fn magic_mismatch_is_reported() {
        let mut stream = frame(MAINNET_MAGIC, 1, &[1]);
        stream.extend(frame([0x0b, 0x11, 0x09, 0x07], 1, &[2]));
        let mut framer = Framer::new(Cursor::new(stream)).with_magic(MAINNET_MAGIC);
        assert!(framer.next().unwrap().is_ok());
        match framer.next() {
            Some(Err(ParseError::UnexpectedMagic { record, found, .. })) => {
                assert_eq!(record, 1);
                assert_eq!(found, [0x0b, 0x11, 0x09, 0x07]);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn zero_padding_ends_stream_when_enabled() {
        let mut stream = frame(MAINNET_MAGIC, 2, &[1, 2]);
        stream.extend_from_slice(&[0u8; 64]);

        let records: Vec<_> = Framer::new(Cursor::new(stream.clone()))
            .stop_at_padding(true)
            .collect();
        assert_eq!(records.len(), 1);
        assert!(records[0].is_ok());

        // Without the flag the padding frames as empty records.
        let records: Vec<_> = Framer::new(Cursor::new(stream)).collect();
        assert!(records.len() > 1);
    }

    #[test]
    fn offset_tracks_consumed_bytes() {
        let stream = frame(MAINNET_MAGIC, 4, &[1, 2, 3, 4]);
        let mut framer = Framer::new(Cursor::new(stream));
        framer.next();
        assert_eq!(framer.offset(), 12);
    }
}
