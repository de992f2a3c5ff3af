/// User context saved by the trampoline on every user-mode trap. The
/// first three words are kernel state the trampoline needs before it can
/// touch anything else; the layout is baked into the trampoline assembly.
#[repr(C)]
#[derive(Debug)]
pub struct TrapFrame {
    /// Kernel page table root
    kernel_satp: usize,
    /// Kernel stack pointer of this task
    pub kernel_sp: usize,
    /// Trap handler address
    trap_handler: usize,
    /// User program counter
    user_epc: usize,
    /// User status
    user_status: usize,
    /// Saved general registers x1..x31 (x0 is wired to zero)
    user_regs: [usize; 31],
}

/// sstatus.SPIE: interrupts on after sret
const SSTATUS_SPIE: usize = 1 << 5;
/// sstatus.SPP: privilege to sret into (0 = user)
const SSTATUS_SPP: usize = 1 << 8;

impl TrapFrame {
    /// A frame that enters user mode at `entry` with stack `user_sp`.
    pub fn new(
        kernel_satp: usize,
        kernel_sp: usize,
        trap_handler: usize,
        entry: usize,
        user_sp: usize,
    ) -> Self {
        let mut status = riscv::register::sstatus::read().bits();
        status &= !SSTATUS_SPP;
        status |= SSTATUS_SPIE;
        let mut tf = Self {
            kernel_satp,
            kernel_sp,
            trap_handler,
            user_epc: entry,
            user_status: status,
            user_regs: [0; 31],
        };
        tf.set_user_sp(user_sp);
        tf
    }

    pub fn set_user_sp(&mut self, sp: usize) {
        self.user_regs[1] = sp; // x2
    }

    /// Syscall return value goes into a0.
    pub fn set_return(&mut self, value: usize) {
        self.user_regs[9] = value; // x10
    }

    /// Set integer argument registers a0/a1.
    pub fn set_args(&mut self, a0: usize, a1: usize) {
        self.user_regs[9] = a0;
        self.user_regs[10] = a1;
    }

    /// Syscall number (a7) and arguments (a0..a5).
    pub fn syscall_args(&self) -> (usize, [usize; 6]) {
        let r = &self.user_regs;
        (r[16], [r[9], r[10], r[11], r[12], r[13], r[14]])
    }

    /// Step over the ecall instruction.
    pub fn advance_sepc(&mut self) {
        self.user_epc += 4;
    }

    pub fn sepc(&self) -> usize {
        self.user_epc
    }
}
