//! Trap handling: the kernel vector, the user trap entry/exit paths, and
//! the bounded nested-interrupt stack.

mod trampoline;
mod trapframe;

use core::arch::asm;

use log::debug;
use riscv::register::{scause, scause::Trap, sepc, stval};

pub use trapframe::TrapFrame;

use crate::{
    arch,
    cell::SyncCell,
    config::{MAX_NESTED_INTERRUPTS, TRAMPOLINE_VA},
    println,
    task::{
        current_task, do_exit, kernel_yield, need_resched, preempt_count, preempt_disable_raw,
        preempt_enable_nosched, preemption_enabled, schedule, trapframe_base,
    },
};

/* Nested interrupt bookkeeping */

/// Exception code of an environment call from U-mode.
const EXC_USER_ECALL: usize = 8;

struct NestedTraps {
    depth: usize,
    causes: [usize; MAX_NESTED_INTERRUPTS],
}

/// Mutated only on trap entry/exit paths, which run with interrupts off.
static NESTED: SyncCell<NestedTraps> = SyncCell::new(NestedTraps {
    depth: 0,
    causes: [0; MAX_NESTED_INTERRUPTS],
});

fn nested() -> &'static mut NestedTraps {
    unsafe { NESTED.get_mut() }
}

fn push_trap(cause: usize) {
    let n = nested();
    assert!(n.depth < MAX_NESTED_INTERRUPTS, "trap nesting too deep");
    n.causes[n.depth] = cause;
    n.depth += 1;
}

fn pop_trap() {
    let n = nested();
    debug_assert!(n.depth > 0);
    n.depth -= 1;
}

const INTERRUPT_BIT: usize = 1 << (usize::BITS - 1);

/// Is an interrupt handler on the trap stack?
pub fn in_irq() -> bool {
    let n = nested();
    (0..n.depth).any(|i| n.causes[i] & INTERRUPT_BIT != 0)
}

/// Is a syscall being serviced?
pub fn in_syscall() -> bool {
    let n = nested();
    (0..n.depth).any(|i| n.causes[i] == EXC_USER_ECALL)
}

pub fn dump_nested_interrupts() {
    let n = nested();
    println!("nested trap stack ({} deep):", n.depth);
    for i in (0..n.depth).rev() {
        let c = n.causes[i];
        if c & INTERRUPT_BIT != 0 {
            println!("  [{}] irq {}", i, c & !INTERRUPT_BIT);
        } else {
            println!("  [{}] exception {}", i, c);
        }
    }
}

/* Kernel-mode traps */

/// Full-register save for traps taken in kernel mode; the handler may
/// context-switch underneath this frame.
#[unsafe(naked)]
#[no_mangle]
unsafe extern "C" fn __kernelvec() {
    core::arch::naked_asm!(
        "
        addi sp, sp, -256
        sd ra, 0(sp)
        sd gp, 8(sp)
        sd tp, 16(sp)
        sd t0, 24(sp)
        sd t1, 32(sp)
        sd t2, 40(sp)
        sd s0, 48(sp)
        sd s1, 56(sp)
        sd a0, 64(sp)
        sd a1, 72(sp)
        sd a2, 80(sp)
        sd a3, 88(sp)
        sd a4, 96(sp)
        sd a5, 104(sp)
        sd a6, 112(sp)
        sd a7, 120(sp)
        sd s2, 128(sp)
        sd s3, 136(sp)
        sd s4, 144(sp)
        sd s5, 152(sp)
        sd s6, 160(sp)
        sd s7, 168(sp)
        sd s8, 176(sp)
        sd s9, 184(sp)
        sd s10, 192(sp)
        sd s11, 200(sp)
        sd t3, 208(sp)
        sd t4, 216(sp)
        sd t5, 224(sp)
        sd t6, 232(sp)
        csrr t0, sepc
        sd t0, 240(sp)
        csrr t0, sstatus
        sd t0, 248(sp)

        call kernel_trap_handler

        ld t0, 240(sp)
        csrw sepc, t0
        ld t0, 248(sp)
        csrw sstatus, t0
        ld ra, 0(sp)
        ld gp, 8(sp)
        ld tp, 16(sp)
        ld t0, 24(sp)
        ld t1, 32(sp)
        ld t2, 40(sp)
        ld s0, 48(sp)
        ld s1, 56(sp)
        ld a0, 64(sp)
        ld a1, 72(sp)
        ld a2, 80(sp)
        ld a3, 88(sp)
        ld a4, 96(sp)
        ld a5, 104(sp)
        ld a6, 112(sp)
        ld a7, 120(sp)
        ld s2, 128(sp)
        ld s3, 136(sp)
        ld s4, 144(sp)
        ld s5, 152(sp)
        ld s6, 160(sp)
        ld s7, 168(sp)
        ld s8, 176(sp)
        ld s9, 184(sp)
        ld s10, 192(sp)
        ld s11, 200(sp)
        ld t3, 208(sp)
        ld t4, 216(sp)
        ld t5, 224(sp)
        ld t6, 232(sp)
        addi sp, sp, 256
        sret
        ",
    );
}

#[no_mangle]
extern "C" fn kernel_trap_handler() {
    let cause = scause::read();
    push_trap(cause.bits());
    match cause.cause() {
        Trap::Interrupt(scause::Interrupt::SupervisorTimer) => {
            crate::timer::on_timer_tick();
        }
        Trap::Interrupt(_) => {
            debug!("spurious interrupt {:?}", cause.cause());
        }
        Trap::Exception(e) => {
            panic!(
                "kernel fault {:?}: stval = {:#x}, sepc = {:#x}",
                e,
                stval::read(),
                sepc::read()
            );
        }
    }
    pop_trap();

    // Preemption point: leaving the outermost IRQ with a pending resched.
    if nested().depth == 0 && preemption_enabled() && need_resched() {
        preempt_disable_raw();
        schedule();
        preempt_enable_nosched();
    }
}

/* User-mode traps */

/// Arrival point from the trampoline on any user-mode trap.
#[no_mangle]
pub extern "C" fn user_trap_handler() -> ! {
    init();
    let curr = current_task();
    curr.running_in_kernel
        .store(true, core::sync::atomic::Ordering::Relaxed);

    let cause = scause::read();
    push_trap(cause.bits());
    match cause.cause() {
        Trap::Exception(scause::Exception::UserEnvCall) => {
            let tf = curr.trapframe();
            tf.advance_sepc();
            let (nr, args) = tf.syscall_args();
            // Syscalls run with interrupts enabled; they may block.
            arch::intr_on();
            let ret = crate::syscall::syscall(nr, args);
            arch::intr_off();
            curr.trapframe().set_return(ret as usize);
        }
        Trap::Interrupt(scause::Interrupt::SupervisorTimer) => {
            crate::timer::on_timer_tick();
        }
        Trap::Exception(e) => {
            debug!(
                "killed {:?}: {:?}, stval = {:#x}, sepc = {:#x}",
                curr,
                e,
                stval::read(),
                curr.trapframe().sepc()
            );
            pop_trap();
            do_exit(-1);
        }
        Trap::Interrupt(i) => {
            debug!("spurious interrupt {:?}", i);
        }
    }
    pop_trap();

    if preemption_enabled() && need_resched() {
        kernel_yield();
    }
    user_trap_return()
}

/// The one way back to user mode: clears the kernel trap state, delivers
/// the pending signal, and jumps through the trampoline.
#[no_mangle]
pub extern "C" fn user_trap_return() -> ! {
    arch::intr_off();
    let curr = current_task();

    // Preemption must be fully re-enabled whenever user code runs.
    assert!(
        preempt_count() == 0,
        "returning to user with preemption disabled"
    );

    let sig = curr.take_pending_signal();
    if sig != 0 && sig != 17 {
        // Default action for everything but SIGCHLD: terminate.
        do_exit(128 + sig);
    }

    curr.running_in_kernel
        .store(false, core::sync::atomic::Ordering::Relaxed);

    extern "C" {
        fn strampoline();
        fn uservec();
        fn userret();
    }
    // While in user mode, traps enter through the trampoline page.
    arch::set_kernel_trap_entry(TRAMPOLINE_VA + (uservec as usize - strampoline as usize));

    let satp = curr.proc.mm().lock().pt.satp();
    let tf_va = trapframe_base(curr.inner().kstack.kid);
    let userret_va = TRAMPOLINE_VA + (userret as usize - strampoline as usize);
    unsafe {
        asm!(
            "fence.i",
            "jr {entry}",
            entry = in(reg) userret_va,
            in("a0") tf_va,
            in("a1") satp,
            options(noreturn)
        );
    }
}

/// Installs the kernel trap vector. Called at boot and on every return
/// from user mode handling.
pub fn init() {
    arch::set_kernel_trap_entry(__kernelvec as usize);
}
