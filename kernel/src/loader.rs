//! Program loading: maps an ELF image into a fresh address space and
//! builds the initial user stack.

use alloc::{string::String, vec::Vec};

use xmas_elf::{program::Type, ElfFile};

use crate::{
    config::{PAGE_SIZE, USER_STACK_SIZE, USER_STACK_TOP},
    error::{KernelError, KernelResult},
    mm::{copy_to_user, MemorySpace, VmFlags},
};

/// Builds a user address space from `data`. Returns the space, the
/// initial stack pointer (argc/argv laid out on top) and the entry point.
pub fn from_elf(data: &[u8], args: &[String]) -> KernelResult<(MemorySpace, usize, usize)> {
    let mut ms = MemorySpace::new_user()?;
    let elf = ElfFile::new(data).map_err(|_| KernelError::ElfInvalid)?;
    if elf.header.pt1.magic != [0x7f, b'E', b'L', b'F'] {
        return Err(KernelError::ElfInvalid);
    }

    let mut max_end = 0usize;
    for ph in elf.program_iter() {
        if ph.get_type() != Ok(Type::Load) {
            continue;
        }
        let va = ph.virtual_addr() as usize;
        let offset = ph.offset() as usize;
        let filesz = ph.file_size() as usize;
        let memsz = ph.mem_size() as usize;
        if offset + filesz > data.len() || memsz < filesz {
            return Err(KernelError::ElfInvalid);
        }
        let start = va & !(PAGE_SIZE - 1);

        let mut flags = VmFlags::USER;
        if ph.flags().is_read() {
            flags |= VmFlags::READ;
        }
        if ph.flags().is_write() {
            flags |= VmFlags::WRITE;
        }
        if ph.flags().is_execute() {
            flags |= VmFlags::EXEC;
        }

        ms.map_anon(
            start,
            va + memsz - start,
            flags,
            Some((&data[offset..offset + filesz], va - start)),
        )?;
        max_end = max_end.max(va + memsz);
    }

    ms.entry = elf.header.pt2.entry_point() as usize;
    ms.heap_start = (max_end + PAGE_SIZE - 1) & !(PAGE_SIZE - 1);
    ms.brk = ms.heap_start;

    ms.map_anon(
        USER_STACK_TOP - USER_STACK_SIZE,
        USER_STACK_SIZE,
        VmFlags::READ | VmFlags::WRITE | VmFlags::USER,
        None,
    )?;
    let sp = push_args(&ms, args)?;

    let entry = ms.entry;
    Ok((ms, sp, entry))
}

/// Lays `argc | argv[] | NULL | NULL` plus the strings out on the stack
/// top, SysV style.
fn push_args(ms: &MemorySpace, args: &[String]) -> KernelResult<usize> {
    let mut sp = USER_STACK_TOP;
    let mut arg_ptrs = Vec::with_capacity(args.len());
    for arg in args.iter().rev() {
        sp -= arg.len() + 1;
        // fresh pages: the terminating NUL is already there
        copy_to_user(ms, sp, arg.as_bytes())?;
        arg_ptrs.push(sp);
    }
    arg_ptrs.reverse();

    // argc + argv pointers + argv NULL + envp NULL
    let words = 1 + args.len() + 2;
    sp = (sp - words * 8) & !0xf;

    let mut frame = Vec::with_capacity(words * 8);
    frame.extend_from_slice(&(args.len() as u64).to_le_bytes());
    for ptr in &arg_ptrs {
        frame.extend_from_slice(&(*ptr as u64).to_le_bytes());
    }
    frame.extend_from_slice(&0u64.to_le_bytes());
    frame.extend_from_slice(&0u64.to_le_bytes());
    copy_to_user(ms, sp, &frame)?;

    Ok(sp)
}
