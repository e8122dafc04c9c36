//! Chunk arena implementation
//!
//! One contiguous region, bounds-checked accessors, intrusive free list.

use crate::error::{MultiKvError, Result};

/// Bytes of header at the front of every chunk
pub const CHUNK_HEADER_SIZE: usize = 12;

const NEXT_OFFSET: usize = 0;
const USED_OFFSET: usize = 4;
const GENERATION_OFFSET: usize = 8;

/// End-of-chain / empty free list marker
const NIL: u32 = u32::MAX;

/// Typed reference to a chunk chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkHandle {
    index: u32,
    generation: u32,
}

impl ChunkHandle {
    /// Index of the first chunk in the chain
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Generation the first chunk had when the chain was allocated
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

/// A fixed region of equally sized chunks
#[derive(Debug)]
pub struct ChunkArena {
    /// Backing bytes: `chunk_count * chunk_size`
    region: Vec<u8>,

    /// Header + payload bytes per chunk
    chunk_size: usize,

    /// Number of chunks in the region
    chunk_count: u32,

    /// First free chunk (NIL when exhausted)
    free_head: u32,

    /// Number of chunks on the free list
    free_count: u32,
}

impl ChunkArena {
    /// Carve `region_bytes` into chunks carrying `payload_size` bytes each
    pub fn new(region_bytes: usize, payload_size: usize) -> Result<Self> {
        if payload_size == 0 {
            return Err(MultiKvError::Config("chunk payload size must be non-zero".into()));
        }

        let chunk_size = CHUNK_HEADER_SIZE + payload_size;
        let chunk_count = region_bytes / chunk_size;
        if chunk_count == 0 {
            return Err(MultiKvError::Config(format!(
                "region of {} bytes cannot hold a single {}-byte chunk",
                region_bytes, chunk_size
            )));
        }
        let chunk_count = u32::try_from(chunk_count)
            .ok()
            .filter(|&n| n < NIL)
            .ok_or_else(|| MultiKvError::Config(format!("too many chunks: {}", chunk_count)))?;

        let mut arena = Self {
            region: vec![0u8; chunk_count as usize * chunk_size],
            chunk_size,
            chunk_count,
            free_head: NIL,
            free_count: 0,
        };
        arena.format(0)?;
        Ok(arena)
    }

    // =========================================================================
    // Geometry
    // =========================================================================

    /// Payload bytes carried by one chunk
    pub fn payload_size(&self) -> usize {
        self.chunk_size - CHUNK_HEADER_SIZE
    }

    /// Total chunks in the region
    pub fn chunk_count(&self) -> usize {
        self.chunk_count as usize
    }

    /// Chunks currently on the free list
    pub fn free_chunks(&self) -> usize {
        self.free_count as usize
    }

    /// Chunks currently owned by live chains
    pub fn used_chunks(&self) -> usize {
        self.chunk_count() - self.free_chunks()
    }

    /// Number of chunks needed to hold `len` bytes (at least one)
    pub fn chunks_for(&self, len: usize) -> usize {
        len.div_ceil(self.payload_size()).max(1)
    }

    /// Payload bytes still available for allocation
    pub fn available(&self) -> usize {
        self.free_chunks() * self.payload_size()
    }

    // =========================================================================
    // Allocation
    // =========================================================================

    /// Reserve a chain able to hold `len` bytes
    ///
    /// The chain starts out empty (length 0); fill it with `write`.
    pub fn allocate(&mut self, len: usize) -> Result<ChunkHandle> {
        let needed = self.chunks_for(len);
        if needed > self.free_chunks() {
            return Err(MultiKvError::OutOfSpace {
                requested: len,
                available: self.available(),
            });
        }

        // The free list is already linked: detach its first `needed` chunks
        let first = self.free_head;
        let mut last = first;
        self.set_field(last, USED_OFFSET, 0)?;
        for _ in 1..needed {
            last = self.field(last, NEXT_OFFSET)?;
            self.set_field(last, USED_OFFSET, 0)?;
        }
        self.free_head = self.field(last, NEXT_OFFSET)?;
        self.set_field(last, NEXT_OFFSET, NIL)?;
        self.free_count -= needed as u32;

        Ok(ChunkHandle {
            index: first,
            generation: self.field(first, GENERATION_OFFSET)?,
        })
    }

    /// Reserve a chain and fill it with `bytes`
    pub fn store(&mut self, bytes: &[u8]) -> Result<ChunkHandle> {
        let handle = self.allocate(bytes.len())?;
        self.write(handle, bytes)?;
        Ok(handle)
    }

    /// Return a chain to the free list
    pub fn free(&mut self, handle: ChunkHandle) -> Result<()> {
        let chain = self.chain(handle)?;
        for &index in &chain {
            let generation = self.field(index, GENERATION_OFFSET)?;
            self.set_field(index, GENERATION_OFFSET, generation.wrapping_add(1))?;
            self.set_field(index, USED_OFFSET, 0)?;
        }

        // chain() never returns an empty list
        let last = chain[chain.len() - 1];
        self.set_field(last, NEXT_OFFSET, self.free_head)?;
        self.free_head = handle.index;
        self.free_count += chain.len() as u32;
        Ok(())
    }

    /// Drop every chain and rebuild the free list
    ///
    /// Generations keep advancing, so handles from before the reset are stale.
    pub fn reset(&mut self) -> Result<()> {
        self.format(1)
    }

    // =========================================================================
    // Access
    // =========================================================================

    /// Overwrite the contents of a chain
    ///
    /// Fails with `OutOfSpace` when `bytes` exceeds the chain's capacity; the
    /// chain is left untouched in that case.
    pub fn write(&mut self, handle: ChunkHandle, bytes: &[u8]) -> Result<()> {
        let chain = self.chain(handle)?;
        let capacity = chain.len() * self.payload_size();
        if bytes.len() > capacity {
            return Err(MultiKvError::OutOfSpace {
                requested: bytes.len(),
                available: capacity,
            });
        }

        let payload = self.payload_size();
        let mut pieces = bytes.chunks(payload);
        for &index in &chain {
            let piece = pieces.next().unwrap_or(&[]);
            let start = self.payload_offset(index);
            self.region
                .get_mut(start..start + piece.len())
                .ok_or_else(|| out_of_region(index))?
                .copy_from_slice(piece);
            self.set_field(index, USED_OFFSET, piece.len() as u32)?;
        }
        Ok(())
    }

    /// Copy the contents of a chain out of the region
    pub fn read(&self, handle: ChunkHandle) -> Result<Vec<u8>> {
        let chain = self.chain(handle)?;
        let mut out = Vec::with_capacity(chain.len() * self.payload_size());
        for index in chain {
            out.extend_from_slice(self.payload(index)?);
        }
        Ok(out)
    }

    /// Compare a chain's contents with `bytes` without copying
    pub fn matches(&self, handle: ChunkHandle, bytes: &[u8]) -> Result<bool> {
        let mut rest = bytes;
        for index in self.chain(handle)? {
            let piece = self.payload(index)?;
            match rest.strip_prefix(piece) {
                Some(tail) => rest = tail,
                None => return Ok(false),
            }
        }
        Ok(rest.is_empty())
    }

    /// Bytes currently stored in a chain
    pub fn len(&self, handle: ChunkHandle) -> Result<usize> {
        let mut total = 0;
        for index in self.chain(handle)? {
            total += self.field(index, USED_OFFSET)? as usize;
        }
        Ok(total)
    }

    /// Bytes a chain can hold without reallocation
    pub fn capacity(&self, handle: ChunkHandle) -> Result<usize> {
        Ok(self.chain(handle)?.len() * self.payload_size())
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Link every chunk into the free list, advancing generations by `bump`
    fn format(&mut self, bump: u32) -> Result<()> {
        for index in 0..self.chunk_count {
            let next = if index + 1 == self.chunk_count { NIL } else { index + 1 };
            let generation = self.field(index, GENERATION_OFFSET)?.wrapping_add(bump);
            self.set_field(index, NEXT_OFFSET, next)?;
            self.set_field(index, USED_OFFSET, 0)?;
            self.set_field(index, GENERATION_OFFSET, generation)?;
        }
        self.free_head = 0;
        self.free_count = self.chunk_count;
        Ok(())
    }

    /// Validate a handle and collect the indices of its chain
    fn chain(&self, handle: ChunkHandle) -> Result<Vec<u32>> {
        if handle.index >= self.chunk_count {
            return Err(MultiKvError::InvalidHandle(format!(
                "chunk {} out of range ({} chunks)",
                handle.index, self.chunk_count
            )));
        }
        if self.field(handle.index, GENERATION_OFFSET)? != handle.generation {
            return Err(MultiKvError::InvalidHandle(format!(
                "chunk {} is stale (generation {})",
                handle.index, handle.generation
            )));
        }

        let mut chain = Vec::new();
        let mut index = handle.index;
        while index != NIL {
            // A chain longer than the region means a cycle
            if chain.len() >= self.chunk_count as usize || index >= self.chunk_count {
                return Err(MultiKvError::InvalidHandle(format!(
                    "corrupt chain starting at chunk {}",
                    handle.index
                )));
            }
            chain.push(index);
            index = self.field(index, NEXT_OFFSET)?;
        }
        Ok(chain)
    }

    fn payload(&self, index: u32) -> Result<&[u8]> {
        let used = (self.field(index, USED_OFFSET)? as usize).min(self.payload_size());
        let start = self.payload_offset(index);
        self.region
            .get(start..start + used)
            .ok_or_else(|| out_of_region(index))
    }

    fn payload_offset(&self, index: u32) -> usize {
        index as usize * self.chunk_size + CHUNK_HEADER_SIZE
    }

    fn field(&self, index: u32, offset: usize) -> Result<u32> {
        let start = index as usize * self.chunk_size + offset;
        let bytes = self
            .region
            .get(start..start + 4)
            .ok_or_else(|| out_of_region(index))?;
        let mut word = [0u8; 4];
        word.copy_from_slice(bytes);
        Ok(u32::from_le_bytes(word))
    }

    fn set_field(&mut self, index: u32, offset: usize, value: u32) -> Result<()> {
        let start = index as usize * self.chunk_size + offset;
        self.region
            .get_mut(start..start + 4)
            .ok_or_else(|| out_of_region(index))?
            .copy_from_slice(&value.to_le_bytes());
        Ok(())
    }
}

fn out_of_region(index: u32) -> MultiKvError {
    MultiKvError::InvalidHandle(format!("chunk {} lies outside the region", index))
}
