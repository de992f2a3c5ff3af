//! riscv64 glue: the narrow architecture contract the core consumes.

use riscv::register::{satp, sie, sstatus, stvec, time};

use crate::config::{BOOT_STACK_SIZE, CLOCK_FREQ, TIMER_HZ};

/// Boot stack for the initial execution context, in .bss.
#[link_section = ".bss.stack"]
static mut BOOT_STACK: [u8; BOOT_STACK_SIZE] = [0u8; BOOT_STACK_SIZE];

/// Entry for the kernel: point sp at the boot stack and leave assembly.
#[unsafe(naked)]
#[no_mangle]
#[link_section = ".text.entry"]
unsafe extern "C" fn __entry() -> ! {
    core::arch::naked_asm!(
        "la sp, {stack} + {stack_size}",
        "j  {main}",
        stack_size = const BOOT_STACK_SIZE,
        stack      =   sym BOOT_STACK,
        main       =   sym crate::rust_main,
    )
}

#[inline]
pub fn console_putchar(byte: u8) {
    #[allow(deprecated)]
    sbi_rt::legacy::console_putchar(byte as usize);
}

pub fn shutdown() -> ! {
    sbi_rt::system_reset(sbi_rt::Shutdown, sbi_rt::SystemFailure);
    loop {
        halt();
    }
}

/// Waits for the next interrupt; the idle task lives here.
#[inline]
pub fn halt() {
    unsafe { riscv::asm::wfi() };
}

/* Interrupt flag handling */

#[inline]
pub fn intr_on() {
    unsafe { sstatus::set_sie() };
}

#[inline]
pub fn intr_off() {
    unsafe { sstatus::clear_sie() };
}

#[inline]
pub fn intr_get() -> bool {
    sstatus::read().sie()
}

/// Disables interrupts, returning the previous enable bit.
#[inline]
pub fn local_irq_save() -> bool {
    let was = intr_get();
    intr_off();
    was
}

/// Restores the enable bit saved by [`local_irq_save`].
#[inline]
pub fn local_irq_restore(was: bool) {
    if was {
        intr_on();
    }
}

/* Timer */

pub fn get_time() -> usize {
    time::read()
}

/// Arms the timer for the next tick.
pub fn set_next_trigger() {
    sbi_rt::set_timer((get_time() + CLOCK_FREQ / TIMER_HZ) as u64);
}

/// Unmasks the supervisor timer interrupt.
pub fn enable_timer_interrupt() {
    unsafe { sie::set_stimer() };
}

/* Paging */

/// The kernel runs identity-mapped, so a kernel virtual address is the
/// physical address.
#[inline]
pub fn virt_to_phys(va: usize) -> usize {
    va
}

/// Installs a page table and flushes the TLB.
pub fn activate_page_table(satp_value: usize) {
    satp::write(satp_value);
    flush_tlb();
}

#[inline]
pub fn flush_tlb() {
    unsafe { core::arch::asm!("sfence.vma") };
}

/// Points stvec at the kernel trap vector.
pub fn set_kernel_trap_entry(addr: usize) {
    unsafe { stvec::write(addr, stvec::TrapMode::Direct) };
}
