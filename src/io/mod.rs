//! Byte-level input: random-access sources, caching, and integer/bit readers.

mod bit_cursor;
mod block_cache;
mod endian;
pub(crate) mod source;

pub use bit_cursor::{BitCursor, MAX_READ_BITS};
pub use block_cache::{BlockCache, DEFAULT_BLOCK_SIZE, DEFAULT_CACHE_CAPACITY};
pub use endian::{
    read_int, read_u16_be, read_u16_le, read_u32_be, read_u32_le, read_u64_le, read_uint,
    slice_at, ByteOrder,
};
pub use source::{ByteSource, FileSource, MemorySource, PayloadWindow};
