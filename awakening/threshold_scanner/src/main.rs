//! # Threshold Scanner
//!
//! Reads a kernel image the way a stivale2 loader does before it boots it:
//! find `.stivale2hdr`, decode the header, and check that the stack and
//! entry point it names actually exist in the image. A loader that gets this
//! wrong refuses the image; this catches it at build time instead.

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::fs;
use std::path::PathBuf;

use threshold::header::HeaderFlags;

mod image;
mod verify;

use image::Image;
use verify::{Report, ScanOptions, Severity};

/// Check a kernel image's stivale2 boot header
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Kernel ELF image to scan
    image: PathBuf,

    /// Header section name
    #[arg(short, long, default_value = threshold::header::HEADER_SECTION)]
    section: String,

    /// Treat unknown flag bits as errors
    #[arg(long)]
    strict: bool,
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = Args::parse();

    let bytes = fs::read(&args.image)
        .with_context(|| format!("failed to read {}", args.image.display()))?;
    let image = Image::parse(&bytes)
        .with_context(|| format!("failed to parse {}", args.image.display()))?;

    let options = ScanOptions {
        section: args.section,
        strict: args.strict,
    };
    let report = verify::scan(&image, &options);

    println!("{}", args.image.display());
    print_report(&report, &options);

    if !report.is_bootable() {
        bail!("image is not bootable: {} error(s)", report.errors());
    }
    Ok(())
}

fn print_report(report: &Report, options: &ScanOptions) {
    if let Some(header) = report.header {
        println!("  section      {}", options.section);
        match (header.entry_point, report.resolved_entry) {
            (0, Some(entry)) => println!("  entry_point  0 (ELF entry {:#x})", entry),
            _ => println!("  entry_point  {:#x}", header.entry_point),
        }
        match &report.stack_section {
            Some(name) => println!("  stack_top    {:#x} (end of {})", header.stack, name),
            None => println!("  stack_top    {:#x}", header.stack),
        }
        println!("  flags        {}", describe_flags(header.known_flags(), header.unknown_flags()));
        println!("  tags         {:#x}", header.tags);
    }

    for finding in &report.findings {
        let label = match finding.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        println!("  {}: {}", label, finding.error);
    }

    if report.is_bootable() {
        println!("  ok: a stivale2 loader will accept this header");
    }
}

fn describe_flags(known: HeaderFlags, unknown: u64) -> String {
    let mut parts = Vec::new();
    if known.contains(HeaderFlags::HIGHER_HALF_POINTERS) {
        parts.push("higher-half pointers".to_string());
    }
    if known.contains(HeaderFlags::PROTECTED_MEMORY_RANGES) {
        parts.push("protected memory ranges".to_string());
    }
    if known.contains(HeaderFlags::FULLY_VIRTUAL_MAPPINGS) {
        parts.push("fully virtual mappings".to_string());
    }
    if unknown != 0 {
        parts.push(format!("unknown {:#x}", unknown));
    }

    if parts.is_empty() {
        "none".to_string()
    } else {
        parts.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_flags() {
        assert_eq!(describe_flags(HeaderFlags::empty(), 0), "none");
        assert_eq!(
            describe_flags(HeaderFlags::HIGHER_HALF_POINTERS | HeaderFlags::FULLY_VIRTUAL_MAPPINGS, 0),
            "higher-half pointers, fully virtual mappings"
        );
        assert_eq!(describe_flags(HeaderFlags::empty(), 1 << 9), "unknown 0x200");
    }

    #[test]
    fn test_args_default_to_stivale2_section() {
        let args = Args::try_parse_from(["threshold_scanner", "kernel.elf"]).unwrap();
        assert_eq!(args.section, ".stivale2hdr");
        assert!(!args.strict);

        let args = Args::try_parse_from(["threshold_scanner", "--strict", "-s", ".hdr", "k.elf"]).unwrap();
        assert_eq!(args.section, ".hdr");
        assert!(args.strict);
    }
}
