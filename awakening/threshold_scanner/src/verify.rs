//! Header checks, in the order a loader trips over them

use threshold::header::{HeaderError, RawHeader};

use crate::image::Image;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Finding {
    pub severity: Severity,
    pub error: HeaderError,
}

#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Section the loader scans for
    pub section: String,
    /// Treat unknown flag bits as errors
    pub strict: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            section: threshold::header::HEADER_SECTION.to_string(),
            strict: false,
        }
    }
}

/// What the scan found
#[derive(Debug, Clone, Default)]
pub struct Report {
    pub header: Option<RawHeader>,
    /// Where the loader will jump: the override, or the ELF entry
    pub resolved_entry: Option<u64>,
    /// Section the stack top belongs to
    pub stack_section: Option<String>,
    pub findings: Vec<Finding>,
}

impl Report {
    fn error(&mut self, error: HeaderError) {
        self.findings.push(Finding { severity: Severity::Error, error });
    }

    fn warning(&mut self, error: HeaderError) {
        self.findings.push(Finding { severity: Severity::Warning, error });
    }

    /// No errors: a stivale2 loader will accept the image
    pub fn is_bootable(&self) -> bool {
        self.findings.iter().all(|f| f.severity != Severity::Error)
    }

    pub fn errors(&self) -> usize {
        self.findings.iter().filter(|f| f.severity == Severity::Error).count()
    }
}

pub fn scan(image: &Image, options: &ScanOptions) -> Report {
    let mut report = Report::default();

    let section = match image.section(&options.section) {
        Some(section) => section,
        None => {
            report.error(HeaderError::MissingSection);
            return report;
        }
    };

    let header = match RawHeader::from_le_bytes(&section.data) {
        Ok(header) => header,
        Err(error) => {
            report.error(error);
            return report;
        }
    };
    report.header = Some(header);

    if let Err(error) = header.check_fields() {
        report.error(error);
    }

    if header.stack != 0 {
        let stack_section = image
            .sections
            .iter()
            .find(|s| s.alloc && s.writable && s.ends_at_or_contains(header.stack));
        match stack_section {
            Some(s) => report.stack_section = Some(s.name.clone()),
            None => report.error(HeaderError::StackNotWritable { stack: header.stack }),
        }
    }

    let entry = if header.entry_point == 0 { image.entry } else { header.entry_point };
    report.resolved_entry = Some(entry);
    let executable = image
        .sections
        .iter()
        .any(|s| s.alloc && s.executable && s.contains(entry));
    if !executable {
        report.error(HeaderError::EntryNotExecutable { entry });
    }

    let unknown = header.unknown_flags();
    if unknown != 0 {
        if options.strict {
            report.error(HeaderError::UnknownFlags { bits: unknown });
        } else {
            report.warning(HeaderError::UnknownFlags { bits: unknown });
        }
    }

    report
}
