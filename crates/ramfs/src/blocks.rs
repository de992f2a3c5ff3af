use alloc::{boxed::Box, collections::BTreeMap};
use core::ptr::NonNull;

use crate::BLOCK_SIZE;

/// One page of file content. Page-aligned so mapped blocks can be handed
/// to the paging layer as-is.
#[repr(align(4096))]
pub(crate) struct BlockBuf(pub [u8; BLOCK_SIZE]);

impl BlockBuf {
    fn zeroed() -> Box<Self> {
        Box::new(BlockBuf([0; BLOCK_SIZE]))
    }
}

/// Block-addressed file storage: fixed-size blocks keyed by block index in
/// an ordered map. Holes are simply absent entries and read back as zeroes;
/// a write past end-of-file extends the size but allocates only the blocks
/// it actually touches.
pub(crate) struct FileBlocks {
    pub size: usize,
    blocks: BTreeMap<usize, Box<BlockBuf>>,
}

impl FileBlocks {
    pub fn new() -> Self {
        Self {
            size: 0,
            blocks: BTreeMap::new(),
        }
    }

    pub fn allocated_blocks(&self) -> usize {
        self.blocks.len()
    }

    /// Copies from `offset` into `buf`, stopping at end-of-file. Returns
    /// the number of bytes read.
    pub fn read_at(&self, offset: usize, buf: &mut [u8]) -> usize {
        if offset >= self.size {
            return 0;
        }
        let len = buf.len().min(self.size - offset);
        let mut done = 0;
        while done < len {
            let pos = offset + done;
            let idx = pos / BLOCK_SIZE;
            let in_block = pos % BLOCK_SIZE;
            let chunk = (BLOCK_SIZE - in_block).min(len - done);
            match self.blocks.get(&idx) {
                Some(b) => buf[done..done + chunk].copy_from_slice(&b.0[in_block..in_block + chunk]),
                None => buf[done..done + chunk].fill(0),
            }
            done += chunk;
        }
        len
    }

    /// Copies `buf` to `offset`, growing the file as needed. Returns the
    /// number of bytes written.
    pub fn write_at(&mut self, offset: usize, buf: &[u8]) -> usize {
        let mut done = 0;
        while done < buf.len() {
            let pos = offset + done;
            let idx = pos / BLOCK_SIZE;
            let in_block = pos % BLOCK_SIZE;
            let chunk = (BLOCK_SIZE - in_block).min(buf.len() - done);
            let block = self.blocks.entry(idx).or_insert_with(BlockBuf::zeroed);
            block.0[in_block..in_block + chunk].copy_from_slice(&buf[done..done + chunk]);
            done += chunk;
        }
        if offset + buf.len() > self.size {
            self.size = offset + buf.len();
        }
        buf.len()
    }

    /// Shrinks or grows the file to `len` bytes. Blocks entirely past the
    /// new end are freed; the tail of the last kept block is zeroed so a
    /// later re-extension reads zeroes there.
    pub fn truncate(&mut self, len: usize) {
        let keep = (len + BLOCK_SIZE - 1) / BLOCK_SIZE;
        self.blocks.retain(|idx, _| *idx < keep);
        if len % BLOCK_SIZE != 0 {
            if let Some(last) = self.blocks.get_mut(&(len / BLOCK_SIZE)) {
                last.0[len % BLOCK_SIZE..].fill(0);
            }
        }
        self.size = len;
    }

    /// The backing page holding `offset`, allocated (zeroed) on first
    /// touch. The pointer stays valid until the block is truncated away.
    pub fn page_at(&mut self, offset: usize) -> NonNull<u8> {
        let block = self
            .blocks
            .entry(offset / BLOCK_SIZE)
            .or_insert_with(BlockBuf::zeroed);
        NonNull::from(&mut block.0[0])
    }
}
