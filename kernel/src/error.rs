#![allow(unused)]

use errno::Errno;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelError {
    /// A POSIX error to be reported to user space as-is.
    Errno(Errno),

    /// An invalid or unmapped page table entry.
    PageTableInvalid,

    /// Failed to allocate a physical frame.
    FrameAllocFailed,

    /// Failed to resolve an ELF image.
    ElfInvalid,

    /// Unsupported syscall number.
    SyscallUnsupported(usize),
}

impl From<Errno> for KernelError {
    fn from(e: Errno) -> Self {
        Self::Errno(e)
    }
}

impl KernelError {
    /// Collapses kernel-internal kinds onto the user-facing error surface.
    pub fn as_errno(self) -> Errno {
        match self {
            Self::Errno(e) => e,
            Self::PageTableInvalid => Errno::EFAULT,
            Self::FrameAllocFailed => Errno::ENOMEM,
            Self::ElfInvalid => Errno::ENOEXEC,
            Self::SyscallUnsupported(_) => Errno::ENOSYS,
        }
    }
}

pub type KernelResult<T = ()> = Result<T, KernelError>;
