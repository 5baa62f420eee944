//! # Boot Stack
//!
//! The stack the loader installs before jumping to `_start`. It is carved
//! out of `.bss` at link time because nothing can allocate yet, and it stays
//! the kernel's stack until the kernel builds its own.
//!
//! The loader learns where it ends from the boot header; apart from that the
//! only thing that ever holds its address is the stack pointer register.

use core::cell::UnsafeCell;
use static_assertions::const_assert;

/// Size of the boot stack: 64 KB
///
/// Generous for the trampoline plus whatever the kernel does before it sets
/// up stacks of its own.
pub const BOOT_STACK_SIZE: usize = 64 * 1024;

/// Smallest stack we are willing to hand to the kernel
pub const MIN_BOOT_STACK_SIZE: usize = 64 * 1024;

/// Required alignment of the stack top (x86-64 SysV)
pub const STACK_ALIGN: usize = 16;

const_assert!(BOOT_STACK_SIZE >= MIN_BOOT_STACK_SIZE);
const_assert!(BOOT_STACK_SIZE % STACK_ALIGN == 0);

/// A statically reserved, downward-growing stack of `SIZE` bytes
///
/// The bytes sit behind an `UnsafeCell` so a `static` of this type is
/// placed in writable memory (`.bss`, since it is all zeroes) rather than
/// `.rodata`.
#[repr(C, align(16))]
pub struct BootStack<const SIZE: usize> {
    bytes: UnsafeCell<[u8; SIZE]>,
}

// Safety: Rust code never touches the bytes; only the CPU does, through
// the stack pointer, on the single thread that exists during boot.
unsafe impl<const SIZE: usize> Sync for BootStack<SIZE> {}

impl<const SIZE: usize> BootStack<SIZE> {
    /// Reserve a zeroed stack
    ///
    /// # Panics
    /// If `SIZE` is zero or not a multiple of 16. In a `static` initializer
    /// this is a compile error.
    pub const fn new() -> Self {
        assert!(SIZE > 0, "boot stack must not be empty");
        assert!(SIZE % STACK_ALIGN == 0, "boot stack size must keep the top 16-byte aligned");
        Self {
            bytes: UnsafeCell::new([0; SIZE]),
        }
    }

    /// Lowest address of the stack
    pub const fn base(&self) -> *const u8 {
        self.bytes.get() as *const u8
    }

    /// One byte past the highest address: the initial stack pointer
    pub const fn top(&self) -> *const u8 {
        self.base().wrapping_add(SIZE)
    }

    pub const fn size(&self) -> usize {
        SIZE
    }

    /// Check if an address is within this stack
    pub fn contains(&self, addr: usize) -> bool {
        let base = self.base() as usize;
        addr >= base && addr < base + SIZE
    }
}
