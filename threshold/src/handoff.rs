//! # The Handoff
//!
//! The two pieces of static data the loader consumes, and the symbol it
//! jumps to.
//!
//! The loader reads [`STIVALE_HEADER`] out of `.stivale2hdr`, points the
//! stack pointer at the top of the boot stack, and calls `_start` with its
//! boot-information pointer in the first argument register. From there the
//! trampoline takes over.

use crate::header::StivaleHeader;
use crate::stack::{BootStack, BOOT_STACK_SIZE};

/// The boot stack
///
/// Private on purpose: apart from the header below, nothing may name it.
static BOOT_STACK: BootStack<BOOT_STACK_SIZE> = BootStack::new();

/// The header the loader scans for
///
/// Entry point left to the ELF entry symbol (`_start`), no flags, no tags.
///
/// The section is emitted for every ELF target, hosted ones included, so
/// any binary linking this crate carries a header a scanner can read back.
/// Only the freestanding image has a `_start` for it to name.
#[used]
#[cfg_attr(not(target_vendor = "apple"), link_section = ".stivale2hdr")]
pub static STIVALE_HEADER: StivaleHeader = StivaleHeader::new(BOOT_STACK.top());

/// The first Rust code executed in kernel context
///
/// # Safety
/// Only the loader calls this, on the boot stack, with interrupts disabled
/// and `boot_info` pointing at its stivale2 structure.
#[cfg(target_os = "none")]
#[no_mangle]
pub unsafe extern "C" fn _start(boot_info: *const crate::boot_info::BootInfo) -> ! {
    use crate::boot_info::BootInfoPtr;
    use crate::cpu::Hardware;
    use crate::trampoline::{ExternKernelMain, Trampoline};

    #[cfg(all(feature = "early-log", target_arch = "x86_64"))]
    {
        // A second logger means the kernel brought its own; keep going
        let _ = crate::serial::init_logger(log::LevelFilter::Debug);
    }

    Trampoline::new(BootInfoPtr::from_raw(boot_info), ExternKernelMain, Hardware).run()
}
