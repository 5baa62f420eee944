//! # Boot Information Pointer
//!
//! The loader hands `_start` a single pointer to its stivale2 structure
//! (memory map, framebuffer, modules...). Threshold never looks inside; the
//! pointer is only carried across to `kernel_main`.

use core::fmt;
use static_assertions::{assert_eq_size, const_assert};

/// Opaque stand-in for the loader's `struct stivale2_struct`
///
/// Zero-sized and unconstructible: it only exists to give the pointer a type.
#[repr(C)]
pub struct BootInfo {
    _opaque: [u8; 0],
}

/// The loader's boot-information pointer, passed through untouched
///
/// `#[repr(transparent)]` keeps it ABI-identical to the raw pointer the
/// loader leaves in the first argument register.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct BootInfoPtr(*const BootInfo);

assert_eq_size!(BootInfoPtr, *const BootInfo);
// Widening to the kernel's u64 must never drop bits
const_assert!(core::mem::size_of::<usize>() <= core::mem::size_of::<u64>());

impl BootInfoPtr {
    /// Wrap the pointer exactly as the loader delivered it
    pub const fn from_raw(ptr: *const BootInfo) -> Self {
        Self(ptr)
    }

    /// Build from a bare address (tests and tooling)
    pub fn from_addr(addr: usize) -> Self {
        Self(addr as *const BootInfo)
    }

    pub const fn as_ptr(self) -> *const BootInfo {
        self.0
    }

    /// The value `kernel_main` receives: the same bit pattern, zero-extended
    pub fn as_u64(self) -> u64 {
        self.0 as usize as u64
    }

    pub fn is_null(self) -> bool {
        self.0.is_null()
    }
}

impl fmt::Debug for BootInfoPtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BootInfoPtr({:#018x})", self.as_u64())
    }
}
