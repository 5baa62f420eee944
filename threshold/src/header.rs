//! # The stivale2 Boot Header
//!
//! A stivale2 loader does not jump into an image blindly: it first scans the
//! ELF file for a section named `.stivale2hdr` and reads this record from
//! it. If the section is missing the loader refuses to boot the image.
//!
//! ```text
//! offset  field        meaning
//!   0     entry_point  0 = use the ELF entry symbol
//!   8     stack        initial stack pointer (one past the top of the stack)
//!  16     flags        optional protocol behaviours
//!  24     tags         header tag list, 0 = none
//! ```
//!
//! The header is built entirely at compile time and never touched again.
//! Kernel code does not read it; the accessors here exist for tests and for
//! the image scanner.

use core::fmt;
use bitflags::bitflags;
use static_assertions::{assert_impl_all, assert_not_impl_any, const_assert_eq};

use crate::boot_info::BootInfoPtr;

/// Name of the section the loader scans for
pub const HEADER_SECTION: &str = ".stivale2hdr";

/// Size of the encoded header in bytes
pub const HEADER_SIZE: usize = 32;

/// Signature of an explicit entry point override
pub type EntryFn = unsafe extern "C" fn(BootInfoPtr) -> !;

bitflags! {
    /// stivale2 header flags
    ///
    /// Nothing is requested by default. The bits are named so a kernel that
    /// does want one can ask for it explicitly.
    pub struct HeaderFlags: u64 {
        /// Pointers in the boot-information structure are higher-half
        const HIGHER_HALF_POINTERS = 1 << 1;
        /// Map the kernel with per-segment permissions (PMRs)
        const PROTECTED_MEMORY_RANGES = 1 << 2;
        /// Map the kernel fully virtually instead of at its physical load address
        const FULLY_VIRTUAL_MAPPINGS = 1 << 3;
    }
}

/// The header record itself
#[repr(C)]
pub struct StivaleHeader {
    entry_point: Option<EntryFn>,
    stack: *const u8,
    flags: u64,
    tags: u64,
}

// Required to be used in a static. Nothing mutates the header after link
// time.
unsafe impl Sync for StivaleHeader {}

assert_impl_all!(StivaleHeader: Sync);
assert_not_impl_any!(StivaleHeader: Send);

#[cfg(target_pointer_width = "64")]
const_assert_eq!(core::mem::size_of::<StivaleHeader>(), HEADER_SIZE);
#[cfg(target_pointer_width = "64")]
const_assert_eq!(core::mem::align_of::<StivaleHeader>(), 8);

impl StivaleHeader {
    /// A header that asks for `stack_top` and nothing else
    ///
    /// Entry point is left to the ELF entry symbol, no flags, no tags.
    pub const fn new(stack_top: *const u8) -> Self {
        Self {
            entry_point: None,
            stack: stack_top,
            flags: HeaderFlags::empty().bits(),
            tags: 0,
        }
    }

    /// Override the ELF entry symbol
    pub const fn with_entry_point(mut self, entry: EntryFn) -> Self {
        self.entry_point = Some(entry);
        self
    }

    pub const fn with_flags(mut self, flags: HeaderFlags) -> Self {
        self.flags = flags.bits();
        self
    }

    /// `None` is the zero sentinel: jump to the ELF entry symbol
    pub fn entry_point(&self) -> Option<EntryFn> {
        self.entry_point
    }

    pub fn stack_top(&self) -> *const u8 {
        self.stack
    }

    pub fn flags(&self) -> HeaderFlags {
        HeaderFlags::from_bits_truncate(self.flags)
    }

    pub fn tags(&self) -> u64 {
        self.tags
    }
}

/// Ways an image's header can fail the loader's expectations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderError {
    /// No `.stivale2hdr` section: the loader will not boot the image
    MissingSection,
    /// The section is shorter than a header
    Truncated { len: usize },
    /// `stack` is zero
    NullStack,
    /// `stack` would leave the stack pointer misaligned
    MisalignedStack { stack: u64 },
    /// `stack` does not end a writable, allocated region of the image
    StackNotWritable { stack: u64 },
    /// `entry_point` override does not land in executable code
    EntryNotExecutable { entry: u64 },
    /// Bits the protocol does not define
    UnknownFlags { bits: u64 },
    /// A tag list is present but this header never requests tags
    UnexpectedTags { tags: u64 },
}

impl fmt::Display for HeaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeaderError::MissingSection => {
                write!(f, "no {} section, the loader will refuse the image", HEADER_SECTION)
            }
            HeaderError::Truncated { len } => {
                write!(f, "header section is {} bytes, expected at least {}", len, HEADER_SIZE)
            }
            HeaderError::NullStack => write!(f, "stack top is zero"),
            HeaderError::MisalignedStack { stack } => {
                write!(f, "stack top {:#x} is not 16-byte aligned", stack)
            }
            HeaderError::StackNotWritable { stack } => {
                write!(f, "stack top {:#x} does not end a writable section", stack)
            }
            HeaderError::EntryNotExecutable { entry } => {
                write!(f, "entry point {:#x} is outside executable code", entry)
            }
            HeaderError::UnknownFlags { bits } => {
                write!(f, "flags {:#x} are not defined by stivale2", bits)
            }
            HeaderError::UnexpectedTags { tags } => {
                write!(f, "header tag list at {:#x}, expected none", tags)
            }
        }
    }
}

/// The header as it sits in the image: four little-endian words
///
/// This is what the loader actually sees, with no pointers attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawHeader {
    pub entry_point: u64,
    pub stack: u64,
    pub flags: u64,
    pub tags: u64,
}

impl RawHeader {
    /// Decode the start of a `.stivale2hdr` section
    pub fn from_le_bytes(bytes: &[u8]) -> Result<Self, HeaderError> {
        if bytes.len() < HEADER_SIZE {
            return Err(HeaderError::Truncated { len: bytes.len() });
        }

        let word = |index: usize| {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(&bytes[index * 8..index * 8 + 8]);
            u64::from_le_bytes(buf)
        };

        Ok(Self {
            entry_point: word(0),
            stack: word(1),
            flags: word(2),
            tags: word(3),
        })
    }

    /// Checks that need nothing but the header itself
    pub fn check_fields(&self) -> Result<(), HeaderError> {
        if self.stack == 0 {
            return Err(HeaderError::NullStack);
        }
        if self.stack % crate::stack::STACK_ALIGN as u64 != 0 {
            return Err(HeaderError::MisalignedStack { stack: self.stack });
        }
        if self.tags != 0 {
            return Err(HeaderError::UnexpectedTags { tags: self.tags });
        }
        Ok(())
    }

    /// Flag bits stivale2 does not define
    pub fn unknown_flags(&self) -> u64 {
        self.flags & !HeaderFlags::all().bits()
    }

    pub fn known_flags(&self) -> HeaderFlags {
        HeaderFlags::from_bits_truncate(self.flags)
    }
}
