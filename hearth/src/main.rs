#![cfg_attr(target_os = "none", no_std)]
#![cfg_attr(target_os = "none", no_main)]

//! # Hearth
//!
//! The smallest kernel that can stand on Threshold: it links the boot
//! header, boot stack and `_start` from the `threshold` crate and provides
//! the `kernel_main` they hand off to.
//!
//! Hearth's `kernel_main` reports what it was given and returns, which is
//! the deliberate shutdown path: the trampoline parks the CPU.
//!
//! Build the bootable image with
//! `cargo build -p hearth --target x86_64-unknown-none`.

#[cfg(target_os = "none")]
mod kernel {
    use threshold::{halt_forever, Hardware};

    /// The kernel's main routine, called once by the trampoline
    #[no_mangle]
    pub extern "C" fn kernel_main(boot_info: u64) {
        log::info!("hearth awake");

        if boot_info == 0 {
            log::warn!("loader passed no boot information");
            return;
        }
        log::info!("stivale2 structure at {:#018x}", boot_info);

        // Memory, interrupts and drivers would be set up from here
        log::info!("nothing left to do, returning to the trampoline");
    }

    #[panic_handler]
    fn panic(info: &core::panic::PanicInfo) -> ! {
        log::error!("hearth panicked: {}", info);
        halt_forever(&mut Hardware)
    }
}

#[cfg(not(target_os = "none"))]
fn main() {
    eprintln!("hearth is a freestanding image; build it with --target x86_64-unknown-none");
    std::process::exit(1);
}
