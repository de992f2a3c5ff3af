//! Per-process address spaces.

use alloc::vec::Vec;

use bitflags::bitflags;
use vfs::FileRef;

use crate::{
    arch::virt_to_phys,
    config::{PAGE_SIZE, PHYSICAL_MEMORY_END, TRAMPOLINE_VA, USER_MMAP_TOP},
    error::{KernelError, KernelResult},
    mm::{
        frame::{frame_alloc, frame_dealloc},
        page_table::{PageTable, PteFlags},
    },
};

bitflags! {
    pub struct VmFlags: u8 {
        const READ = 1 << 0;
        const WRITE = 1 << 1;
        const EXEC = 1 << 2;
        const USER = 1 << 3;
    }
}

impl VmFlags {
    fn as_pte(self) -> PteFlags {
        let mut f = PteFlags::empty();
        if self.contains(VmFlags::READ) {
            f |= PteFlags::R;
        }
        if self.contains(VmFlags::WRITE) {
            f |= PteFlags::W;
        }
        if self.contains(VmFlags::EXEC) {
            f |= PteFlags::X;
        }
        if self.contains(VmFlags::USER) {
            f |= PteFlags::U;
        }
        f
    }
}

enum AreaKind {
    /// Frames owned by this area, freed with it.
    Anon,
    /// Pages owned by a file's block storage; mapped as-is, never freed
    /// here. Unmapping is the whole teardown.
    FileShared,
}

struct VmArea {
    start: usize,
    end: usize,
    flags: VmFlags,
    kind: AreaKind,
    frames: Vec<usize>,
}

/// The address-space half of a process: a page table plus the areas mapped
/// into it.
pub struct MemorySpace {
    pub pt: PageTable,
    areas: Vec<VmArea>,

    /// Program entry point, set by the loader.
    pub entry: usize,

    /// Current program break and where the heap starts.
    pub heap_start: usize,
    pub brk: usize,

    /// mmap regions are carved downward from here.
    mmap_top: usize,
}

extern "C" {
    fn stext();
    fn strampoline();
}

impl MemorySpace {
    fn empty() -> KernelResult<Self> {
        Ok(Self {
            pt: PageTable::new()?,
            areas: Vec::new(),
            entry: 0,
            heap_start: 0,
            brk: 0,
            mmap_top: USER_MMAP_TOP,
        })
    }

    /// The kernel's own space: all of RAM identity-mapped, plus the
    /// trampoline at the top of the address space.
    pub fn new_kernel() -> KernelResult<Self> {
        let mut ms = Self::empty()?;
        let mut va = stext as usize & !(PAGE_SIZE - 1);
        while va < PHYSICAL_MEMORY_END {
            ms.pt
                .map(va, va, PteFlags::R | PteFlags::W | PteFlags::X)?;
            va += PAGE_SIZE;
        }
        Self::map_trampoline(&mut ms.pt)?;
        Ok(ms)
    }

    /// A fresh user space holding only the trampoline.
    pub fn new_user() -> KernelResult<Self> {
        let mut ms = Self::empty()?;
        Self::map_trampoline(&mut ms.pt)?;
        Ok(ms)
    }

    fn map_trampoline(pt: &mut PageTable) -> KernelResult<()> {
        pt.map(
            TRAMPOLINE_VA,
            virt_to_phys(strampoline as usize),
            PteFlags::R | PteFlags::X,
        )
    }

    /// Maps `[start, start + len)` with fresh zeroed frames, optionally
    /// seeding `data` at `data_offset` bytes into the area.
    pub fn map_anon(
        &mut self,
        start: usize,
        len: usize,
        flags: VmFlags,
        data: Option<(&[u8], usize)>,
    ) -> KernelResult<()> {
        debug_assert!(start % PAGE_SIZE == 0);
        let pages = (len + PAGE_SIZE - 1) / PAGE_SIZE;
        let mut area = VmArea {
            start,
            end: start + pages * PAGE_SIZE,
            flags,
            kind: AreaKind::Anon,
            frames: Vec::new(),
        };
        for i in 0..pages {
            let pa = frame_alloc().ok_or(KernelError::FrameAllocFailed)?;
            area.frames.push(pa);
            self.pt.map(start + i * PAGE_SIZE, pa, flags.as_pte())?;
        }
        if let Some((bytes, offset)) = data {
            copy_into_area(&area, offset, bytes);
        }
        self.areas.push(area);
        Ok(())
    }

    /// Maps `len` bytes of `file` starting at file offset 0 into the next
    /// free mmap slot, without copying: the file's own pages back the
    /// mapping.
    pub fn map_file(&mut self, file: &FileRef, len: usize, flags: VmFlags) -> KernelResult<usize> {
        let pages = (len + PAGE_SIZE - 1) / PAGE_SIZE;
        if pages == 0 {
            return Err(KernelError::Errno(errno::Errno::EINVAL));
        }
        self.mmap_top -= pages * PAGE_SIZE;
        let start = self.mmap_top;
        let mut area = VmArea {
            start,
            end: start + pages * PAGE_SIZE,
            flags,
            kind: AreaKind::FileShared,
            frames: Vec::new(),
        };
        for i in 0..pages {
            let page = file
                .mmap_page(i * PAGE_SIZE)
                .map_err(KernelError::Errno)?;
            let pa = virt_to_phys(page.as_ptr() as usize);
            area.frames.push(pa);
            self.pt.map(start + i * PAGE_SIZE, pa, flags.as_pte())?;
        }
        self.areas.push(area);
        Ok(start)
    }

    /// Maps `len` anonymous bytes into the next free mmap slot.
    pub fn map_anon_mmap(&mut self, len: usize, flags: VmFlags) -> KernelResult<usize> {
        let pages = (len + PAGE_SIZE - 1) / PAGE_SIZE;
        if pages == 0 {
            return Err(KernelError::Errno(errno::Errno::EINVAL));
        }
        self.mmap_top -= pages * PAGE_SIZE;
        let start = self.mmap_top;
        self.map_anon(start, len, flags, None)?;
        Ok(start)
    }

    /// Unmaps the area that starts at `start`; partial unmaps are not
    /// supported.
    pub fn unmap_area(&mut self, start: usize) -> KernelResult<()> {
        let idx = self
            .areas
            .iter()
            .position(|a| a.start == start)
            .ok_or(KernelError::Errno(errno::Errno::EINVAL))?;
        let area = self.areas.remove(idx);
        release_area(&mut self.pt, &area);
        Ok(())
    }

    /// Grows (never shrinks) the program break. Returns the resulting brk.
    pub fn set_brk(&mut self, new_brk: usize) -> usize {
        if new_brk <= self.brk {
            return self.brk;
        }
        let start = (self.brk + PAGE_SIZE - 1) & !(PAGE_SIZE - 1);
        let end = (new_brk + PAGE_SIZE - 1) & !(PAGE_SIZE - 1);
        if end > start
            && self
                .map_anon(
                    start,
                    end - start,
                    VmFlags::READ | VmFlags::WRITE | VmFlags::USER,
                    None,
                )
                .is_err()
        {
            return self.brk;
        }
        self.brk = new_brk;
        self.brk
    }

    pub fn translate(&self, va: usize) -> Option<(usize, PteFlags)> {
        self.pt.translate(va)
    }

    /// Duplicates this space for fork: anonymous areas are deep-copied,
    /// file-shared mappings point at the same pages.
    pub fn fork_clone(&self) -> KernelResult<Self> {
        let mut child = Self::empty()?;
        Self::map_trampoline(&mut child.pt)?;
        child.entry = self.entry;
        child.heap_start = self.heap_start;
        child.brk = self.brk;
        child.mmap_top = self.mmap_top;
        for area in &self.areas {
            match area.kind {
                AreaKind::Anon => {
                    let mut copy = VmArea {
                        start: area.start,
                        end: area.end,
                        flags: area.flags,
                        kind: AreaKind::Anon,
                        frames: Vec::new(),
                    };
                    for (i, &src) in area.frames.iter().enumerate() {
                        let pa = frame_alloc().ok_or(KernelError::FrameAllocFailed)?;
                        unsafe {
                            core::ptr::copy_nonoverlapping(
                                src as *const u8,
                                pa as *mut u8,
                                PAGE_SIZE,
                            );
                        }
                        copy.frames.push(pa);
                        child
                            .pt
                            .map(area.start + i * PAGE_SIZE, pa, area.flags.as_pte())?;
                    }
                    child.areas.push(copy);
                }
                AreaKind::FileShared => {
                    for (i, &pa) in area.frames.iter().enumerate() {
                        child
                            .pt
                            .map(area.start + i * PAGE_SIZE, pa, area.flags.as_pte())?;
                    }
                    child.areas.push(VmArea {
                        start: area.start,
                        end: area.end,
                        flags: area.flags,
                        kind: AreaKind::FileShared,
                        frames: area.frames.clone(),
                    });
                }
            }
        }
        Ok(child)
    }
}

fn copy_into_area(area: &VmArea, offset: usize, bytes: &[u8]) {
    let mut done = 0;
    while done < bytes.len() {
        let pos = offset + done;
        let frame = area.frames[pos / PAGE_SIZE];
        let in_page = pos % PAGE_SIZE;
        let chunk = (PAGE_SIZE - in_page).min(bytes.len() - done);
        unsafe {
            core::ptr::copy_nonoverlapping(
                bytes[done..].as_ptr(),
                (frame + in_page) as *mut u8,
                chunk,
            );
        }
        done += chunk;
    }
}

fn release_area(pt: &mut PageTable, area: &VmArea) {
    let pages = (area.end - area.start) / PAGE_SIZE;
    for i in 0..pages {
        pt.unmap(area.start + i * PAGE_SIZE).ok();
    }
    if matches!(area.kind, AreaKind::Anon) {
        for &pa in &area.frames {
            frame_dealloc(pa);
        }
    }
}

impl Drop for MemorySpace {
    fn drop(&mut self) {
        for area in core::mem::take(&mut self.areas) {
            release_area(&mut self.pt, &area);
        }
    }
}
