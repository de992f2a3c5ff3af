//! User-pointer validation and copying.
//!
//! Every syscall argument that names user memory goes through here: the
//! range must be mapped user-accessible (and writable for copy-out) in the
//! current process's address space, page by page. With the kernel identity
//! mapped, a validated physical page is directly addressable.

use errno::Errno;

use crate::{
    config::PAGE_SIZE,
    error::{KernelError, KernelResult},
    mm::{page_table::PteFlags, space::MemorySpace},
};

fn page_of(ms: &MemorySpace, va: usize, write: bool) -> KernelResult<usize> {
    let (pa, flags) = ms
        .translate(va)
        .ok_or(KernelError::Errno(Errno::EFAULT))?;
    if !flags.contains(PteFlags::U) || (write && !flags.contains(PteFlags::W)) {
        return Err(KernelError::Errno(Errno::EFAULT));
    }
    Ok(pa + va % PAGE_SIZE)
}

/// Checks that `[addr, addr + len)` is user-accessible.
pub fn validate_user_range(ms: &MemorySpace, addr: usize, len: usize, write: bool) -> KernelResult {
    if len == 0 {
        return Ok(());
    }
    let end = addr.checked_add(len).ok_or(KernelError::Errno(Errno::EFAULT))?;
    let mut va = addr & !(PAGE_SIZE - 1);
    while va < end {
        page_of(ms, va.max(addr), write)?;
        va += PAGE_SIZE;
    }
    Ok(())
}

pub fn copy_from_user(ms: &MemorySpace, addr: usize, dst: &mut [u8]) -> KernelResult {
    let mut done = 0;
    while done < dst.len() {
        let va = addr + done;
        let pa = page_of(ms, va, false)?;
        let chunk = (PAGE_SIZE - va % PAGE_SIZE).min(dst.len() - done);
        unsafe {
            core::ptr::copy_nonoverlapping(pa as *const u8, dst[done..].as_mut_ptr(), chunk);
        }
        done += chunk;
    }
    Ok(())
}

pub fn copy_to_user(ms: &MemorySpace, addr: usize, src: &[u8]) -> KernelResult {
    let mut done = 0;
    while done < src.len() {
        let va = addr + done;
        let pa = page_of(ms, va, true)?;
        let chunk = (PAGE_SIZE - va % PAGE_SIZE).min(src.len() - done);
        unsafe {
            core::ptr::copy_nonoverlapping(src[done..].as_ptr(), pa as *mut u8, chunk);
        }
        done += chunk;
    }
    Ok(())
}

/// Copies a NUL-terminated user string into `buf` (the caller's scratch
/// buffer). Fails with ENAMETOOLONG when no terminator fits.
pub fn read_user_cstr(ms: &MemorySpace, addr: usize, buf: &mut [u8]) -> KernelResult<usize> {
    let mut len = 0;
    while len < buf.len() {
        let va = addr + len;
        let pa = page_of(ms, va, false)?;
        let chunk = (PAGE_SIZE - va % PAGE_SIZE).min(buf.len() - len);
        let bytes = unsafe { core::slice::from_raw_parts(pa as *const u8, chunk) };
        if let Some(nul) = bytes.iter().position(|&b| b == 0) {
            buf[len..len + nul].copy_from_slice(&bytes[..nul]);
            return Ok(len + nul);
        }
        buf[len..len + chunk].copy_from_slice(bytes);
        len += chunk;
    }
    Err(KernelError::Errno(Errno::ENAMETOOLONG))
}
