//! A minimal Sv39 page table: map, unmap, translate.

use alloc::vec::Vec;

use bitflags::bitflags;

use crate::{
    config::PAGE_SIZE,
    error::{KernelError, KernelResult},
    mm::frame::{frame_alloc, frame_dealloc},
};

bitflags! {
    pub struct PteFlags: usize {
        const V = 1 << 0;
        const R = 1 << 1;
        const W = 1 << 2;
        const X = 1 << 3;
        const U = 1 << 4;
        const G = 1 << 5;
        const A = 1 << 6;
        const D = 1 << 7;
    }
}

#[derive(Clone, Copy)]
#[repr(transparent)]
struct Pte(usize);

impl Pte {
    fn new(pa: usize, flags: PteFlags) -> Self {
        Self((pa >> 12) << 10 | flags.bits())
    }

    fn empty() -> Self {
        Self(0)
    }

    fn pa(self) -> usize {
        (self.0 >> 10) << 12
    }

    fn flags(self) -> PteFlags {
        PteFlags::from_bits_truncate(self.0)
    }

    fn valid(self) -> bool {
        self.flags().contains(PteFlags::V)
    }

    fn leaf(self) -> bool {
        self.flags().intersects(PteFlags::R | PteFlags::W | PteFlags::X)
    }
}

fn table_of(pa: usize) -> &'static mut [Pte; 512] {
    unsafe { &mut *(pa as *mut [Pte; 512]) }
}

/// An Sv39 page table. Owns its table pages, not the mapped frames.
pub struct PageTable {
    root: usize,
    tables: Vec<usize>,
}

impl PageTable {
    pub fn new() -> KernelResult<Self> {
        let root = frame_alloc().ok_or(KernelError::FrameAllocFailed)?;
        Ok(Self {
            root,
            tables: Vec::new(),
        })
    }

    pub fn satp(&self) -> usize {
        8usize << 60 | self.root >> 12
    }

    fn indexes(va: usize) -> [usize; 3] {
        [(va >> 30) & 0x1ff, (va >> 21) & 0x1ff, (va >> 12) & 0x1ff]
    }

    fn walk(&self, va: usize) -> Option<&'static mut Pte> {
        let mut table = table_of(self.root);
        let idx = Self::indexes(va);
        for (level, &i) in idx.iter().enumerate() {
            let pte = &mut table[i];
            if level == 2 {
                return Some(pte);
            }
            if !pte.valid() || pte.leaf() {
                return None;
            }
            table = table_of(pte.pa());
        }
        None
    }

    fn walk_create(&mut self, va: usize) -> KernelResult<&'static mut Pte> {
        let mut table = table_of(self.root);
        let idx = Self::indexes(va);
        for (level, &i) in idx.iter().enumerate() {
            let pte = &mut table[i];
            if level == 2 {
                return Ok(pte);
            }
            if !pte.valid() {
                let page = frame_alloc().ok_or(KernelError::FrameAllocFailed)?;
                self.tables.push(page);
                *pte = Pte::new(page, PteFlags::V);
            }
            table = table_of(pte.pa());
        }
        unreachable!()
    }

    pub fn map(&mut self, va: usize, pa: usize, flags: PteFlags) -> KernelResult<()> {
        debug_assert!(va % PAGE_SIZE == 0 && pa % PAGE_SIZE == 0);
        let pte = self.walk_create(va)?;
        if pte.valid() {
            return Err(KernelError::PageTableInvalid);
        }
        *pte = Pte::new(pa, flags | PteFlags::V | PteFlags::A | PteFlags::D);
        Ok(())
    }

    /// Unmaps one page, returning the physical page it pointed at.
    pub fn unmap(&mut self, va: usize) -> KernelResult<usize> {
        let pte = self.walk(va).ok_or(KernelError::PageTableInvalid)?;
        if !pte.valid() {
            return Err(KernelError::PageTableInvalid);
        }
        let pa = pte.pa();
        *pte = Pte::empty();
        Ok(pa)
    }

    /// The physical page and flags `va` is mapped to, if any.
    pub fn translate(&self, va: usize) -> Option<(usize, PteFlags)> {
        let pte = self.walk(va & !(PAGE_SIZE - 1))?;
        if !pte.valid() {
            return None;
        }
        Some((pte.pa(), pte.flags()))
    }
}

impl Drop for PageTable {
    fn drop(&mut self) {
        for &page in &self.tables {
            frame_dealloc(page);
        }
        frame_dealloc(self.root);
    }
}
