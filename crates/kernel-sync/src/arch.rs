cfg_if::cfg_if! {
    if #[cfg(all(target_os = "none", target_arch = "riscv64"))] {
        use riscv::register::sstatus;

        /// Interrupt on
        pub(crate) fn intr_on() {
            unsafe { sstatus::set_sie() };
        }

        /// Interrupt off
        pub(crate) fn intr_off() {
            unsafe { sstatus::clear_sie() };
        }

        /// Gets if interrupt is enabled
        pub(crate) fn intr_get() -> bool {
            sstatus::read().sie()
        }
    } else {
        pub(crate) fn intr_on() {}

        pub(crate) fn intr_off() {}

        pub(crate) fn intr_get() -> bool {
            false
        }
    }
}
