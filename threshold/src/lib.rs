//! # Threshold - the stivale2 boot handoff
//!
//! The first code a stivale2 loader (Limine and friends) runs after it has
//! mapped the kernel image. Threshold owns only three things:
//! - The boot header the loader scans for in `.stivale2hdr`
//! - The statically reserved boot stack the header points at
//! - The entry trampoline that forwards the loader's boot-information
//!   pointer to `kernel_main` and halts forever if that call ever returns
//!
//! Everything after `kernel_main` is the kernel's business.

#![cfg_attr(not(test), no_std)]

pub mod boot_info;
pub mod cpu;
pub mod header;
pub mod stack;
pub mod trampoline;
pub mod handoff;  // The header/stack statics and `_start`

#[cfg(all(feature = "early-log", target_arch = "x86_64"))]
pub mod serial;  // COM1 sink for the `log` facade

// Re-export key types
pub use boot_info::{BootInfo, BootInfoPtr};
pub use cpu::{halt_forever, Cpu, Hardware};
pub use header::{EntryFn, HeaderError, HeaderFlags, StivaleHeader};
pub use stack::{BootStack, BOOT_STACK_SIZE};
pub use trampoline::{HandoffState, KernelMain, Trampoline};
