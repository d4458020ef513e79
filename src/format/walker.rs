//! Generic record traversal for chunked and linked containers.
//!
//! # Sequential-length mode
//!
//! [`SequentialWalker`] reads `header | payload | trailer` records back to
//! back, as used by PNG chunks, RIFF chunks, PAR2 packets, JPEG marker
//! segments and IPTC datasets. The per-format layout is described by a
//! [`Framing`]. The walk stops after a terminator record, at the end of the
//! stream, or with an error.
//!
//! # Linked-offset mode
//!
//! [`LinkedWalker`] follows absolute "next record" pointers (TIFF IFD
//! chains). A zero pointer ends the chain.
//!
//! # Termination
//!
//! Both walkers are bounded: every record is checked against the end of
//! the stream before any payload is read, the number of records is capped,
//! and a linked chain that revisits an offset is rejected with
//! [`FormatError::CyclicChain`].

use std::collections::HashSet;

use bytes::Bytes;
use tracing::trace;

use crate::error::FormatError;
use crate::io::ByteSource;

// =============================================================================
// Framing
// =============================================================================

/// Header fields every framing must produce.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordHeader<T> {
    /// Record type identifier
    pub tag: T,
    /// Declared payload length in bytes (excluding header and trailer)
    pub payload_len: u64,
}

/// Layout of one record kind.
pub trait Framing {
    /// Record type identifier
    type Tag: Clone + std::fmt::Debug;

    /// Fixed size of the record header in bytes.
    fn header_len(&self) -> usize;

    /// Decode a header found at `offset`. `header` holds exactly
    /// `header_len()` bytes.
    fn parse_header(
        &self,
        header: &[u8],
        offset: u64,
    ) -> Result<RecordHeader<Self::Tag>, FormatError>;

    /// Byte that may repeat before a header as padding (JPEG `0xFF` fill).
    ///
    /// A run of this byte is skipped while the byte after it is also the
    /// fill byte, so the last one is left as the start of the header.
    fn fill_byte(&self) -> Option<u8> {
        None
    }

    /// Size of the trailer following the payload (e.g. a CRC).
    fn trailer_len(&self, _header: &RecordHeader<Self::Tag>) -> usize {
        0
    }

    /// Padding after the trailer, skipped silently (RIFF word alignment).
    fn padding(&self, _header: &RecordHeader<Self::Tag>) -> u64 {
        0
    }

    /// Whether the walk stops after this record.
    fn is_terminator(&self, _header: &RecordHeader<Self::Tag>) -> bool {
        false
    }

    /// Whether the payload bytes should be materialized.
    ///
    /// Bulk payloads (image data, recovery slices) are bounds-checked but
    /// not read.
    fn retain_payload(&self, _header: &RecordHeader<Self::Tag>) -> bool {
        true
    }
}

// =============================================================================
// Record
// =============================================================================

/// One walked record.
#[derive(Debug, Clone)]
pub struct Record<T> {
    /// Absolute offset of the record header
    pub offset: u64,
    /// Record type identifier
    pub tag: T,
    /// Raw header bytes
    pub header: Bytes,
    /// Declared payload length
    pub length: u64,
    /// Payload bytes, unless the framing declined to retain them
    pub payload: Option<Bytes>,
    /// Trailer bytes (empty when the framing has none)
    pub trailer: Bytes,
}

impl<T> Record<T> {
    /// Absolute offset of the first payload byte.
    pub fn payload_offset(&self) -> u64 {
        self.offset + self.header.len() as u64
    }

    /// Payload bytes, or an empty slice when not retained.
    pub fn data(&self) -> &[u8] {
        self.payload.as_deref().unwrap_or(&[])
    }
}

// =============================================================================
// SequentialWalker
// =============================================================================

/// Iterator over back-to-back length-prefixed records in `[start, end)`.
///
/// Yields `Err` at most once; iteration stops afterwards.
pub struct SequentialWalker<'a, F: Framing> {
    source: &'a dyn ByteSource,
    framing: F,
    position: u64,
    end: u64,
    max_records: usize,
    count: usize,
    done: bool,
}

impl<'a, F: Framing> SequentialWalker<'a, F> {
    /// Walk `[start, end)` of `source`. `end` is clamped to the source size.
    pub fn new(
        source: &'a dyn ByteSource,
        framing: F,
        start: u64,
        end: u64,
        max_records: usize,
    ) -> Self {
        Self {
            source,
            framing,
            position: start,
            end: end.min(source.size()),
            max_records,
            count: 0,
            done: false,
        }
    }

    /// Offset of the next record header (or the end after the walk).
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Number of records yielded so far.
    pub fn count(&self) -> usize {
        self.count
    }

    fn fail(&mut self, err: FormatError) -> Option<Result<Record<F::Tag>, FormatError>> {
        self.done = true;
        Some(Err(err))
    }

    /// Advance past fill bytes preceding the next header.
    fn skip_fill(&mut self, fill: u8) -> Result<(), FormatError> {
        const PROBE: usize = 64;
        while self.position + 1 < self.end {
            let len = (self.end - self.position).min(PROBE as u64) as usize;
            let bytes = self.source.read_exact_at(self.position, len)?;
            let run = bytes
                .windows(2)
                .take_while(|pair| pair[0] == fill && pair[1] == fill)
                .count();
            self.position += run as u64;
            if run + 1 < len {
                break;
            }
        }
        Ok(())
    }

    fn read_record(&mut self) -> Result<Record<F::Tag>, FormatError> {
        if let Some(fill) = self.framing.fill_byte() {
            self.skip_fill(fill)?;
        }
        let offset = self.position;
        let header_len = self.framing.header_len();

        if offset + header_len as u64 > self.end {
            return Err(FormatError::RecordOutOfBounds {
                offset,
                length: header_len as u64,
                end: self.end,
            });
        }

        let header = self.source.read_exact_at(offset, header_len)?;
        let parsed = self.framing.parse_header(&header, offset)?;
        let trailer_len = self.framing.trailer_len(&parsed) as u64;

        let payload_start = offset + header_len as u64;
        let record_end = payload_start
            .checked_add(parsed.payload_len)
            .and_then(|v| v.checked_add(trailer_len))
            .filter(|&v| v <= self.end)
            .ok_or(FormatError::RecordOutOfBounds {
                offset,
                length: parsed.payload_len,
                end: self.end,
            })?;

        let payload = if self.framing.retain_payload(&parsed) {
            Some(
                self.source
                    .read_exact_at(payload_start, parsed.payload_len as usize)?,
            )
        } else {
            None
        };

        let trailer = if trailer_len > 0 {
            self.source
                .read_exact_at(payload_start + parsed.payload_len, trailer_len as usize)?
        } else {
            Bytes::new()
        };

        // A missing pad byte at the very end of the stream is tolerated
        self.position = (record_end + self.framing.padding(&parsed)).min(self.end);
        if self.framing.is_terminator(&parsed) {
            self.done = true;
        }

        trace!(
            offset,
            tag = ?parsed.tag,
            length = parsed.payload_len,
            "Walked record"
        );

        Ok(Record {
            offset,
            tag: parsed.tag,
            header,
            length: parsed.payload_len,
            payload,
            trailer,
        })
    }
}

impl<F: Framing> Iterator for SequentialWalker<'_, F> {
    type Item = Result<Record<F::Tag>, FormatError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.position >= self.end {
            self.done = true;
            return None;
        }
        if self.count >= self.max_records {
            return self.fail(FormatError::TooManyRecords(self.max_records));
        }

        match self.read_record() {
            Ok(record) => {
                self.count += 1;
                Some(Ok(record))
            }
            Err(err) => self.fail(err),
        }
    }
}

// =============================================================================
// LinkedWalker
// =============================================================================

/// Follows a chain of absolute offsets, e.g. TIFF IFDs.
#[derive(Debug)]
pub struct LinkedWalker {
    end: u64,
    max_hops: usize,
    visited: HashSet<u64>,
}

impl LinkedWalker {
    /// A walker for offsets in `[0, end)`, visiting at most `max_hops` records.
    pub fn new(end: u64, max_hops: usize) -> Self {
        Self {
            end,
            max_hops,
            visited: HashSet::new(),
        }
    }

    /// Walk the chain starting at `first`.
    ///
    /// `read` decodes the record at an offset and returns it together with
    /// the pointer to the next record (0 terminates). Records are collected
    /// in visit order.
    pub fn walk<R, F>(&mut self, first: u64, mut read: F) -> Result<Vec<R>, FormatError>
    where
        F: FnMut(u64) -> Result<(R, u64), FormatError>,
    {
        let mut records = Vec::new();
        let mut next = first;

        while next != 0 {
            if records.len() >= self.max_hops {
                return Err(FormatError::TooManyRecords(self.max_hops));
            }
            if next >= self.end {
                return Err(FormatError::RecordOutOfBounds {
                    offset: next,
                    length: 0,
                    end: self.end,
                });
            }
            if !self.visited.insert(next) {
                return Err(FormatError::CyclicChain(next));
            }

            trace!(offset = next, "Following link");
            let (record, pointer) = read(next)?;
            records.push(record);
            next = pointer;
        }

        Ok(records)
    }

    /// Offsets visited so far.
    pub fn visited(&self) -> usize {
        self.visited.len()
    }
}
