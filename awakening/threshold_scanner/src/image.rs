//! The parts of an ELF image a stivale2 loader looks at

use std::borrow::Cow;

use anyhow::{bail, Context, Result};
use goblin::elf::header::{EM_AARCH64, EM_X86_64};
use goblin::elf::reloc::{R_AARCH64_RELATIVE, R_X86_64_RELATIVE};
use goblin::elf::section_header::{SHF_ALLOC, SHF_EXECINSTR, SHF_WRITE, SHT_NOBITS};
use goblin::elf::Elf;

/// One section, reduced to what the header checks need
#[derive(Debug, Clone)]
pub struct SectionView<'a> {
    pub name: String,
    pub addr: u64,
    pub size: u64,
    pub alloc: bool,
    pub writable: bool,
    pub executable: bool,
    /// Empty for NOBITS sections such as `.bss`. Owned once a relocation
    /// has been applied to it.
    pub data: Cow<'a, [u8]>,
}

impl SectionView<'_> {
    /// Whether `addr` could be an initial stack pointer for this section:
    /// strictly above its start and no further than one past its end
    pub fn ends_at_or_contains(&self, addr: u64) -> bool {
        addr > self.addr && addr <= self.addr.saturating_add(self.size)
    }

    pub fn contains(&self, addr: u64) -> bool {
        addr >= self.addr && addr < self.addr.saturating_add(self.size)
    }

    /// Write a 64-bit word at virtual address `addr`, if this section's
    /// file bytes cover it
    fn patch_u64(&mut self, addr: u64, value: u64) -> bool {
        if !self.contains(addr) {
            return false;
        }
        let start = (addr - self.addr) as usize;
        if start + 8 > self.data.len() {
            return false;
        }
        self.data.to_mut()[start..start + 8].copy_from_slice(&value.to_le_bytes());
        true
    }
}

#[derive(Debug, Clone)]
pub struct Image<'a> {
    /// ELF entry symbol address (`e_entry`)
    pub entry: u64,
    pub sections: Vec<SectionView<'a>>,
}

impl<'a> Image<'a> {
    pub fn parse(bytes: &'a [u8]) -> Result<Self> {
        let elf = Elf::parse(bytes).context("not an ELF image")?;
        if !elf.is_64 {
            bail!("32-bit ELF images cannot carry a stivale2 header");
        }

        let mut sections = Vec::with_capacity(elf.section_headers.len());
        for section in elf.section_headers.iter() {
            let name = elf.shdr_strtab.get_at(section.sh_name).unwrap_or("").to_string();

            let data = if section.sh_type == SHT_NOBITS {
                Cow::Borrowed(&bytes[0..0])
            } else {
                let start = section.sh_offset as usize;
                let end = start
                    .checked_add(section.sh_size as usize)
                    .with_context(|| format!("section {} size overflows", name))?;
                let data = bytes
                    .get(start..end)
                    .with_context(|| format!("section {} extends past the end of the file", name))?;
                Cow::Borrowed(data)
            };

            sections.push(SectionView {
                name,
                addr: section.sh_addr,
                size: section.sh_size,
                alloc: section.sh_flags & SHF_ALLOC as u64 != 0,
                writable: section.sh_flags & SHF_WRITE as u64 != 0,
                executable: section.sh_flags & SHF_EXECINSTR as u64 != 0,
                data,
            });
        }

        let mut image = Self {
            entry: elf.header.e_entry,
            sections,
        };

        // A position-independent image keeps its absolute pointers in
        // `.rela.dyn`; apply the relative ones at load address zero
        let relative = match elf.header.e_machine {
            EM_X86_64 => Some(R_X86_64_RELATIVE),
            EM_AARCH64 => Some(R_AARCH64_RELATIVE),
            _ => None,
        };
        for reloc in elf.dynrelas.iter() {
            if Some(reloc.r_type) != relative {
                continue;
            }
            image.relocate(reloc.r_offset, reloc.r_addend.unwrap_or(0) as u64);
        }

        Ok(image)
    }

    fn relocate(&mut self, addr: u64, value: u64) {
        for section in self.sections.iter_mut().filter(|s| !s.data.is_empty()) {
            if section.patch_u64(addr, value) {
                return;
            }
        }
    }

    /// First section with the given name
    pub fn section(&self, name: &str) -> Option<&SectionView<'a>> {
        self.sections.iter().find(|s| s.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn bss<'a>(addr: u64, size: u64) -> SectionView<'a> {
        SectionView {
            name: ".bss".to_string(),
            addr,
            size,
            alloc: true,
            writable: true,
            executable: false,
            data: Cow::Borrowed(&[]),
        }
    }

    /// A bare ELF64 file: header, a null section, then one section per
    /// `(sh_type, sh_offset, sh_size)`, all mapped at 0x1000
    fn elf64(sections: &[(u32, u64, u64)]) -> Vec<u8> {
        let mut bytes = vec![0x7f, b'E', b'L', b'F', 2, 1, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0];
        bytes.extend(2u16.to_le_bytes()); // ET_EXEC
        bytes.extend(EM_X86_64.to_le_bytes());
        bytes.extend(1u32.to_le_bytes());
        bytes.extend(0x1000u64.to_le_bytes()); // e_entry
        bytes.extend(0u64.to_le_bytes()); // e_phoff
        bytes.extend(64u64.to_le_bytes()); // e_shoff
        bytes.extend(0u32.to_le_bytes());
        bytes.extend(64u16.to_le_bytes()); // e_ehsize
        bytes.extend(56u16.to_le_bytes());
        bytes.extend(0u16.to_le_bytes());
        bytes.extend(64u16.to_le_bytes()); // e_shentsize
        bytes.extend((sections.len() as u16 + 1).to_le_bytes());
        bytes.extend(0u16.to_le_bytes());
        bytes.extend([0u8; 64]);

        for &(sh_type, offset, size) in sections {
            bytes.extend(0u32.to_le_bytes());
            bytes.extend(sh_type.to_le_bytes());
            bytes.extend(((SHF_ALLOC | SHF_WRITE) as u64).to_le_bytes());
            bytes.extend(0x1000u64.to_le_bytes());
            bytes.extend(offset.to_le_bytes());
            bytes.extend(size.to_le_bytes());
            bytes.extend(0u32.to_le_bytes());
            bytes.extend(0u32.to_le_bytes());
            bytes.extend(16u64.to_le_bytes());
            bytes.extend(0u64.to_le_bytes());
        }
        bytes
    }

    #[test]
    fn test_stack_top_may_sit_one_past_the_end() {
        let section = bss(0x1000, 0x1000);
        assert!(section.ends_at_or_contains(0x2000));
        assert!(section.ends_at_or_contains(0x1010));
        assert!(!section.ends_at_or_contains(0x1000));
        assert!(!section.ends_at_or_contains(0x2010));
    }

    #[test]
    fn test_contains_is_half_open() {
        let section = bss(0x1000, 0x1000);
        assert!(section.contains(0x1000));
        assert!(section.contains(0x1FFF));
        assert!(!section.contains(0x2000));
    }

    #[test]
    fn test_patch_stays_inside_file_bytes() {
        let mut section = bss(0x1000, 0x1000);
        assert!(!section.patch_u64(0x1000, 1));

        let bytes = [0u8; 16];
        section.data = Cow::Borrowed(&bytes);
        assert!(section.patch_u64(0x1008, 0xdead_beef));
        assert!(!section.patch_u64(0x1009, 1));
        assert_eq!(&section.data[8..], &0xdead_beefu64.to_le_bytes());
        assert_eq!(bytes, [0u8; 16]);
    }

    #[test]
    fn test_garbage_is_not_an_image() {
        assert!(Image::parse(b"definitely not an ELF file").is_err());
    }

    #[test]
    fn test_nobits_section_has_no_file_bytes() {
        // Offset and size point well past the file; NOBITS never reads them
        let bytes = elf64(&[(SHT_NOBITS, 0x10_0000, 0x10000)]);
        let image = Image::parse(&bytes).unwrap();

        assert_eq!(image.entry, 0x1000);
        assert_eq!(image.sections.len(), 2);
        assert_eq!(image.sections[1].size, 0x10000);
        assert!(image.sections[1].writable);
        assert!(image.sections[1].data.is_empty());
    }

    #[test]
    fn test_section_past_end_of_file() {
        let bytes = elf64(&[(goblin::elf::section_header::SHT_PROGBITS, 0x10_0000, 0x100)]);
        let err = Image::parse(&bytes).unwrap_err();
        assert!(format!("{:#}", err).contains("past the end of the file"), "{:#}", err);
    }

    #[test]
    fn test_32_bit_image_rejected() {
        let mut bytes = vec![0x7f, b'E', b'L', b'F', 1, 1, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0];
        bytes.extend(2u16.to_le_bytes());
        bytes.extend(3u16.to_le_bytes()); // EM_386
        bytes.extend(1u32.to_le_bytes());
        bytes.extend(0x1000u32.to_le_bytes()); // e_entry
        bytes.extend(0u32.to_le_bytes()); // e_phoff
        bytes.extend(0u32.to_le_bytes()); // e_shoff
        bytes.extend(0u32.to_le_bytes());
        bytes.extend(52u16.to_le_bytes());
        bytes.extend(32u16.to_le_bytes());
        bytes.extend(0u16.to_le_bytes());
        bytes.extend(40u16.to_le_bytes());
        bytes.extend(0u16.to_le_bytes());
        bytes.extend(0u16.to_le_bytes());

        assert!(Image::parse(&bytes).is_err());
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn test_parse_own_test_binary() {
        // Keep the header's object in the link
        std::hint::black_box(&threshold::handoff::STIVALE_HEADER);

        let bytes = fs::read(std::env::current_exe().unwrap()).unwrap();
        let image = Image::parse(&bytes).unwrap();

        let header = image.section(threshold::header::HEADER_SECTION).unwrap();
        assert_eq!(header.data.len(), threshold::header::HEADER_SIZE);
        assert!(header.alloc);

        let bss = image.section(".bss").unwrap();
        assert!(bss.size > 0);
        assert!(bss.data.is_empty());

        assert!(image.sections.iter().any(|s| s.executable && s.contains(image.entry)));
    }
}
