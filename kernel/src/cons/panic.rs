use core::panic::PanicInfo;

use crate::{println, task, trap};

/// Stops the machine: report where, dump the interrupt nesting and the
/// last scheduler transitions, then hand control back to the firmware.
#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    if let Some(location) = info.location() {
        println!(
            "\u{1B}[31mKernel panicked at {}:{} {}\u{1B}[0m",
            location.file(),
            location.line(),
            info.message()
        );
    } else {
        println!("\u{1B}[31mKernel panicked: {}\u{1B}[0m", info.message());
    }

    trap::dump_nested_interrupts();
    task::dump_sched_trace();
    #[cfg(feature = "heap-leak-detector")]
    crate::heap::dump_live_allocations();

    crate::arch::shutdown()
}
