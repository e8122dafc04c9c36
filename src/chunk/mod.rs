//! Chunk Store Module
//!
//! Fixed-capacity byte regions carved into equally sized chunks.
//!
//! ## Responsibilities
//! - Host main-key bytes and record payloads without heap growth
//! - Chain chunks for payloads larger than one chunk
//! - Report exhaustion as a recoverable `OutOfSpace`
//! - Reject stale or out-of-range handles instead of reading garbage
//!
//! ## Chunk Layout
//! ```text
//! ┌───────────┬───────────┬─────────────────┬──────────────────────┐
//! │ Next (4)  │ Used (4)  │ Generation (4)  │ Payload (chunk size) │
//! └───────────┴───────────┴─────────────────┴──────────────────────┘
//! ```
//! All headers live inside the region. Free chunks are linked through `Next`,
//! so the free list costs no memory outside the region. A handle is the index
//! of the first chunk of a chain plus that chunk's generation; freeing a chain
//! bumps every generation, which invalidates old handles.

mod arena;

pub use arena::{ChunkArena, ChunkHandle, CHUNK_HEADER_SIZE};
