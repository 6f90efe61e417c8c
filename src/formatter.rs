//! Output formatters for parse reports and metadata records.
//!
//! This module provides trait-based formatters for rendering the section
//! listing and the firmware metadata record in various output formats
//! (human-readable, JSON, compact).

use std::fmt;
use std::path::Path;

use crate::layout::{LayoutReport, ReportRow};
use crate::meta::FwMetadata;
use crate::types::{NoteLevel, ParseNote, RomEntry, SectionStatus, UidEntry};

/// Trait for formatting reports.
///
/// Implementors provide methods for rendering each component of the section
/// report, plus complete renderers for the report and the metadata record.
pub trait ReportFormatter {
    /// Format the file path header.
    fn format_file(&self, path: &Path) -> String;

    /// Format the image summary block (format, magic, length, encrypted).
    fn format_summary(&self, report: &LayoutReport) -> Option<String>;

    /// Format the section rows.
    fn format_rows(&self, rows: &[ReportRow]) -> Option<String>;

    /// Format parse notes.
    fn format_notes(&self, notes: &[ParseNote]) -> Option<String>;

    /// Format the complete section report.
    ///
    /// Default implementation concatenates all component outputs.
    fn format_report(&self, report: &LayoutReport, path: &Path) -> String {
        let mut parts = vec![self.format_file(path)];

        if let Some(s) = self.format_summary(report) {
            parts.push(s);
        }
        if let Some(s) = self.format_rows(&report.rows) {
            parts.push(s);
        }
        if let Some(s) = self.format_notes(&report.notes) {
            parts.push(s);
        }

        parts.join("")
    }

    /// Format the complete metadata record.
    fn format_metadata(&self, meta: &FwMetadata, path: &Path) -> String;
}

/// Human-readable output formatter.
#[derive(Debug, Clone, Default)]
pub struct HumanFormatter {
    /// Show informational notes, not only warnings.
    pub verbose: bool,
}

impl HumanFormatter {
    /// Create a new human formatter with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a verbose formatter.
    pub fn verbose() -> Self {
        Self { verbose: true }
    }
}

fn render_row(row: &ReportRow) -> String {
    let index = match row.index {
        Some(i) => i.to_string(),
        None => "-".to_string(),
    };
    let range = if row.size == 0 {
        format!("/{:#010x}/", row.offset)
    } else {
        format!(
            "/0x{:08x}-0x{:08x} (0x{:06x})/",
            row.offset,
            row.offset + row.size - 1,
            row.size
        )
    };
    let mut line = format!("    {index:>3}: {range} ({}) - {}", row.kind, row.status);
    if let Some(detail) = &row.detail {
        line.push_str(&format!(" ({detail})"));
    }
    line.push('\n');
    line
}

fn meta_line(label: &str, value: impl fmt::Display) -> String {
    format!("  {:<18} {value}\n", format!("{label}:"))
}

fn opt_display<T: fmt::Display>(value: Option<&T>) -> String {
    value.map_or_else(|| "N/A".to_string(), ToString::to_string)
}

fn uid_value(entry: Option<&UidEntry>) -> String {
    match entry {
        Some(e) => format!("{e} (count {}, step {})", e.count, e.step),
        None => "N/A".to_string(),
    }
}

fn rom_value(rom: &RomEntry) -> String {
    match rom.cpu {
        Some(cpu) => format!("type={} version={} cpu={cpu}", rom.kind, rom.version),
        None => format!("type={} version={}", rom.kind, rom.version),
    }
}

impl ReportFormatter for HumanFormatter {
    fn format_file(&self, path: &Path) -> String {
        format!("File: {}\n", path.display())
    }

    fn format_summary(&self, report: &LayoutReport) -> Option<String> {
        let mut s = format!("  Format:    {}\n", report.format);
        s.push_str(&format!("  Magic:     {:#x}\n", report.magic_offset));
        s.push_str(&format!("  Length:    {:#x}\n", report.image_len));
        s.push_str(&format!(
            "  Encrypted: {}\n",
            if report.encrypted { "yes" } else { "no" }
        ));
        Some(s)
    }

    fn format_rows(&self, rows: &[ReportRow]) -> Option<String> {
        if rows.is_empty() {
            return None;
        }
        let mut s = String::from("  Sections:\n");
        for row in rows {
            s.push_str(&render_row(row));
        }
        Some(s)
    }

    fn format_notes(&self, notes: &[ParseNote]) -> Option<String> {
        // Only show warnings unless verbose
        let to_show: Vec<_> = if self.verbose {
            notes.iter().collect()
        } else {
            notes
                .iter()
                .filter(|n| n.level != NoteLevel::Info)
                .collect()
        };

        if to_show.is_empty() {
            return None;
        }

        let mut s = String::new();
        for note in to_show {
            let prefix = match note.level {
                NoteLevel::Info => "  [info]",
                NoteLevel::Warning => "  [warn]",
            };
            s.push_str(&format!("{prefix} {}\n", note.message));
        }
        Some(s)
    }

    fn format_metadata(&self, meta: &FwMetadata, path: &Path) -> String {
        let mut s = self.format_file(path);
        s.push_str(&meta_line("Format", meta.format));
        if meta.encrypted {
            s.push_str(&meta_line("Encrypted", "yes"));
        }
        s.push_str(&meta_line("FW Version", opt_display(meta.fw_version.as_ref())));
        s.push_str(&meta_line(
            "Release Date",
            opt_display(meta.release_date.as_ref()),
        ));
        s.push_str(&meta_line(
            "Product Version",
            meta.product_version.as_deref().unwrap_or("N/A"),
        ));
        s.push_str(&meta_line(
            "Part Number",
            meta.part_number.as_deref().unwrap_or("N/A"),
        ));
        s.push_str(&meta_line(
            "Description",
            meta.description.as_deref().unwrap_or("N/A"),
        ));
        if let Some(prs) = &meta.prs_name {
            s.push_str(&meta_line("PRS Name", prs));
        }
        if meta.roms.is_empty() {
            s.push_str(&meta_line("Rom Info", "N/A"));
        } else {
            for (i, rom) in meta.roms.iter().enumerate() {
                if i == 0 {
                    s.push_str(&meta_line("Rom Info", rom_value(rom)));
                } else {
                    s.push_str(&format!("  {:<18} {}\n", "", rom_value(rom)));
                }
            }
        }
        s.push_str(&meta_line("Base GUID", uid_value(meta.base_guid.as_ref())));
        if meta.base_guid_dual.is_some() {
            s.push_str(&meta_line(
                "Base GUID (dual)",
                uid_value(meta.base_guid_dual.as_ref()),
            ));
        }
        s.push_str(&meta_line("Base MAC", uid_value(meta.base_mac.as_ref())));
        if meta.base_mac_dual.is_some() {
            s.push_str(&meta_line(
                "Base MAC (dual)",
                uid_value(meta.base_mac_dual.as_ref()),
            ));
        }
        s.push_str(&meta_line(
            "Image VSD",
            meta.image_vsd.as_deref().unwrap_or("N/A"),
        ));
        s.push_str(&meta_line(
            "Device VSD",
            meta.device_vsd.as_deref().unwrap_or("N/A"),
        ));
        s.push_str(&meta_line("PSID", meta.psid.as_deref().unwrap_or("N/A")));
        if let Some(orig) = &meta.orig_psid {
            s.push_str(&meta_line("Orig PSID", orig));
        }
        s.push_str(&meta_line("Security Attrs", meta.security.render()));
        s.push_str(&meta_line("Security Ver", meta.security_version));
        s
    }
}

/// JSON output formatter.
#[derive(Debug, Clone)]
pub struct JsonFormatter {
    /// Pretty-print JSON
    pub pretty: bool,
}

impl Default for JsonFormatter {
    fn default() -> Self {
        Self { pretty: true }
    }
}

impl JsonFormatter {
    /// Create a new JSON formatter with pretty printing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a compact JSON formatter.
    pub fn compact() -> Self {
        Self { pretty: false }
    }

    fn render<T: serde::Serialize>(&self, value: &T) -> String {
        let out = if self.pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        };
        out.unwrap_or_else(|_| "{}".to_string())
    }
}

impl ReportFormatter for JsonFormatter {
    fn format_file(&self, _path: &Path) -> String {
        String::new() // Handled in format_report
    }

    fn format_summary(&self, _report: &LayoutReport) -> Option<String> {
        None // Handled in format_report
    }

    fn format_rows(&self, _rows: &[ReportRow]) -> Option<String> {
        None // Handled in format_report
    }

    fn format_notes(&self, _notes: &[ParseNote]) -> Option<String> {
        None // Handled in format_report
    }

    fn format_report(&self, report: &LayoutReport, path: &Path) -> String {
        #[derive(serde::Serialize)]
        struct JsonReport<'a> {
            file: String,
            format: &'a str,
            magic_offset: String,
            image_len: u64,
            encrypted: bool,
            sections: Vec<JsonRow<'a>>,
            notes: &'a [ParseNote],
        }

        #[derive(serde::Serialize)]
        struct JsonRow<'a> {
            index: Option<usize>,
            name: String,
            code: u16,
            offset: String,
            size: u64,
            crc: Option<&'static str>,
            device_data: bool,
            status: SectionStatus,
            detail: Option<&'a str>,
        }

        let output = JsonReport {
            file: path.display().to_string(),
            format: report.format.name(),
            magic_offset: format!("{:#x}", report.magic_offset),
            image_len: report.image_len,
            encrypted: report.encrypted,
            sections: report
                .rows
                .iter()
                .map(|row| JsonRow {
                    index: row.index,
                    name: row.kind.to_string(),
                    code: row.kind.code(),
                    offset: format!("{:#x}", row.offset),
                    size: row.size,
                    crc: row.crc_mode.map(|m| m.name()),
                    device_data: row.device_data,
                    status: row.status,
                    detail: row.detail.as_deref(),
                })
                .collect(),
            notes: &report.notes,
        };

        self.render(&output)
    }

    fn format_metadata(&self, meta: &FwMetadata, path: &Path) -> String {
        #[derive(serde::Serialize)]
        struct JsonMetadata<'a> {
            file: String,
            #[serde(flatten)]
            meta: &'a FwMetadata,
        }

        self.render(&JsonMetadata {
            file: path.display().to_string(),
            meta,
        })
    }
}

/// Compact tab-separated output formatter, one line per section.
#[derive(Debug, Clone, Default)]
pub struct ShortFormatter;

impl ShortFormatter {
    /// Create a new short formatter.
    pub fn new() -> Self {
        Self
    }
}

impl ReportFormatter for ShortFormatter {
    fn format_file(&self, _path: &Path) -> String {
        String::new() // Handled in format_report
    }

    fn format_summary(&self, _report: &LayoutReport) -> Option<String> {
        None
    }

    fn format_rows(&self, _rows: &[ReportRow]) -> Option<String> {
        None
    }

    fn format_notes(&self, _notes: &[ParseNote]) -> Option<String> {
        None
    }

    fn format_report(&self, report: &LayoutReport, path: &Path) -> String {
        let mut s = String::new();
        for row in &report.rows {
            let index = row.index.map_or_else(|| "-".to_string(), |i| i.to_string());
            s.push_str(&format!(
                "{}\t{}\t{}\t{:#x}\t{:#x}\t{}\n",
                path.display(),
                index,
                row.kind,
                row.offset,
                row.size,
                row.status
            ));
        }
        s
    }

    fn format_metadata(&self, meta: &FwMetadata, path: &Path) -> String {
        format!(
            "{}\t{}\t{}\t{}\t{}\n",
            path.display(),
            opt_display(meta.fw_version.as_ref()),
            meta.psid.as_deref().unwrap_or("N/A"),
            meta.security.render(),
            meta.format
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        CpuArch, CrcMode, FwFormat, FwVersion, ReleaseDate, RomKind, RomVersion, SectionKind,
        SecurityReport, UidEntry,
    };
    use std::path::PathBuf;

    fn sample_report() -> LayoutReport {
        LayoutReport {
            format: FwFormat::Fs4,
            magic_offset: 0,
            image_len: 0x10_0000,
            encrypted: false,
            rows: vec![
                ReportRow {
                    index: Some(0),
                    kind: SectionKind::Boot2,
                    offset: 0x1000,
                    size: 0x50,
                    crc_mode: Some(CrcMode::InSection),
                    device_data: false,
                    status: SectionStatus::Ok,
                    detail: None,
                },
                ReportRow {
                    index: None,
                    kind: SectionKind::ImageInfo,
                    offset: 0x6000,
                    size: 0,
                    crc_mode: None,
                    device_data: false,
                    status: SectionStatus::NoEntry,
                    detail: Some("image-info pointer set but no table entry describes it".into()),
                },
            ],
            notes: vec![
                ParseNote::info("probed magic at 0x0"),
                ParseNote::warning("ITOC slot 5: unknown section type 0x7e, listed generically"),
            ],
        }
    }

    fn sample_meta() -> FwMetadata {
        FwMetadata {
            format: FwFormat::Fs4,
            encrypted: false,
            fw_version: Some(FwVersion {
                major: 16,
                minor: 35,
                subminor: 2000,
            }),
            release_date: Some(ReleaseDate {
                day: 3,
                month: 12,
                year: 2023,
            }),
            product_version: Some("16.35.2000".to_string()),
            part_number: Some("MCX556A-ECAT".to_string()),
            description: Some("ConnectX-5 VPI adapter card".to_string()),
            prs_name: None,
            psid: Some("MT_0000000001".to_string()),
            orig_psid: None,
            image_vsd: None,
            device_vsd: None,
            security: SecurityReport {
                secure: true,
                signed: true,
                debug: false,
                mcc: true,
            },
            security_version: 1,
            base_guid: UidEntry::from_raw(0x0002_C903_0001_2345, 8, 1),
            base_mac: UidEntry::from_raw(0x0002_C912_3456, 8, 1),
            base_guid_dual: None,
            base_mac_dual: None,
            roms: vec![RomEntry {
                kind: RomKind::Pxe,
                version: RomVersion {
                    major: 3,
                    minor: 6,
                    build: 514,
                },
                cpu: Some(CpuArch::Amd64),
            }],
        }
    }

    #[test]
    fn test_human_report() {
        let formatter = HumanFormatter::new();
        let output = formatter.format_report(&sample_report(), &PathBuf::from("fw.bin"));

        assert!(output.contains("File: fw.bin"));
        assert!(output.contains("Format:    FS4"));
        assert!(output.contains("Encrypted: no"));
        assert!(output.contains("/0x00001000-0x0000104f (0x000050)/ (BOOT2) - OK"));
        assert!(output.contains("(IMAGE_INFO) - NO ENTRY"));
        assert!(output.contains("[warn]"));
        // info notes hidden unless verbose
        assert!(!output.contains("[info]"));

        let verbose = HumanFormatter::verbose();
        let output = verbose.format_report(&sample_report(), &PathBuf::from("fw.bin"));
        assert!(output.contains("[info] probed magic"));
    }

    #[test]
    fn test_human_metadata() {
        let formatter = HumanFormatter::new();
        let output = formatter.format_metadata(&sample_meta(), &PathBuf::from("fw.bin"));

        assert!(output.contains("FW Version:        16.35.2000"));
        assert!(output.contains("Release Date:      03.12.2023"));
        assert!(output.contains("type=PXE version=3.6.514 cpu=AMD64"));
        assert!(output.contains("Base GUID:         0002c90300012345 (count 8, step 1)"));
        assert!(output.contains("Image VSD:         N/A"));
        assert!(output.contains("Security Attrs:    secure-fw"));
        assert!(!output.contains("Orig PSID"));
    }

    #[test]
    fn test_json_report() {
        let formatter = JsonFormatter::new();
        let output = formatter.format_report(&sample_report(), &PathBuf::from("fw.bin"));

        assert!(output.contains("\"file\": \"fw.bin\""));
        assert!(output.contains("\"name\": \"BOOT2\""));
        assert!(output.contains("\"crc\": \"in-section\""));
        assert!(output.contains("\"status\": \"NO ENTRY\""));

        let compact = JsonFormatter::compact();
        let output = compact.format_report(&sample_report(), &PathBuf::from("fw.bin"));
        assert!(output.contains("\"file\":\"fw.bin\""));
    }

    #[test]
    fn test_json_metadata() {
        let formatter = JsonFormatter::new();
        let output = formatter.format_metadata(&sample_meta(), &PathBuf::from("fw.bin"));

        assert!(output.contains("\"psid\": \"MT_0000000001\""));
        assert!(output.contains("\"secure\": true"));
        assert!(output.contains("\"kind\": \"PXE\""));
    }

    #[test]
    fn test_short_report() {
        let formatter = ShortFormatter::new();
        let output = formatter.format_report(&sample_report(), &PathBuf::from("fw.bin"));

        assert!(output.contains("fw.bin\t0\tBOOT2\t0x1000\t0x50\tOK"));
        assert!(output.contains("fw.bin\t-\tIMAGE_INFO"));
    }

    #[test]
    fn test_short_metadata() {
        let formatter = ShortFormatter::new();
        let output = formatter.format_metadata(&sample_meta(), &PathBuf::from("fw.bin"));
        assert_eq!(output, "fw.bin\t16.35.2000\tMT_0000000001\tsecure-fw\tFS4\n");
    }
}
