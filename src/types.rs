//! Core types shared across the crate.
//!
//! This module defines the section type registry, CRC modes, the image
//! format generations, report statuses, and the small value types that make
//! up the firmware metadata record.

use std::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// High-byte tag OR-ed onto device-table entry types so they never collide
/// with image-table types.
pub const DTOC_TYPE_TAG: u16 = 0xE000;

/// Image format generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FwFormat {
    /// Older generation: 32-bit marker at offset 0, single sector-scanned
    /// table, dword-unit fields, entry-resident CRCs.
    Fs3,
    /// Current generation: 64-bit probed magic, hardware pointer table,
    /// parallel image and device tables.
    Fs4,
}

impl FwFormat {
    /// Short display name.
    pub fn name(&self) -> &'static str {
        match self {
            FwFormat::Fs3 => "FS3",
            FwFormat::Fs4 => "FS4",
        }
    }
}

impl fmt::Display for FwFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Where a section's CRC lives, if anywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CrcMode {
    /// 16-bit CRC stored in the owning table entry.
    InEntry,
    /// No CRC covers the payload.
    None,
    /// CRC in the low half of the section's final dword.
    InSection,
}

impl CrcMode {
    /// Display name used in reports.
    pub fn name(&self) -> &'static str {
        match self {
            CrcMode::InEntry => "in-entry",
            CrcMode::None => "none",
            CrcMode::InSection => "in-section",
        }
    }
}

impl fmt::Display for CrcMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Section type registry.
///
/// Image-table types are raw 8-bit values; device-table types carry the
/// [`DTOC_TYPE_TAG`] in their 16-bit external code. The pointer-derived
/// regions with no table type of their own (hashes table, tools area) get
/// codes outside both byte registries. Unrecognised values stay `Unknown`
/// and are listed generically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum SectionKind {
    // Image-area code sections
    /// Second-stage boot loader.
    Boot2,
    /// PCI subsystem code.
    PciCode,
    /// Main firmware code.
    MainCode,
    /// PCIe link training code.
    PcieLinkCode,
    /// Iron preparation code.
    IronPrepCode,
    /// Boot code run after iron preparation.
    PostIronBootCode,
    /// In-field upgrade code.
    UpgradeCode,
    /// Hardware boot-time configuration.
    HwBootCfg,
    /// Hardware main configuration.
    HwMainCfg,
    /// PHY microcontroller code.
    PhyUcCode,
    /// PHY microcontroller constants.
    PhyUcConsts,
    /// PCIe PHY microcontroller code.
    PciePhyUcCode,
    // Image-area data sections
    /// Image-info metadata record.
    ImageInfo,
    /// Firmware boot-time configuration.
    FwBootCfg,
    /// Firmware main configuration.
    FwMainCfg,
    /// Expansion ROM image.
    RomCode,
    /// Reset capability description.
    ResetInfo,
    /// Compressed debug firmware INI.
    DbgFwIni,
    /// Debug trace parameters.
    DbgFwParams,
    // Signatures and keys (opaque)
    /// 256-byte image signature.
    ImageSignature256,
    /// 2048-bit public key store.
    PublicKeys2048,
    /// Versions the device refuses to boot.
    ForbiddenVersions,
    /// 512-byte image signature.
    ImageSignature512,
    /// 4096-bit public key store.
    PublicKeys4096,
    /// Register-dump mask data.
    CrDumpMaskData,
    /// Programmable hardware firmware.
    ProgrammableHwFw,
    // Device-area sections
    /// Manufacture-info record.
    MfgInfo,
    /// Device-info record.
    DevInfo,
    /// Non-volatile configuration data.
    NvData,
    /// Firmware non-volatile log.
    FwNvLog,
    /// Vital product data, read-only area.
    VpdR0,
    /// Extended non-volatile configuration data.
    NvDataExt,
    // Pointer-derived regions
    /// Measured-boot hashes table.
    HashesTable,
    /// Tools area.
    ToolsArea,
    /// Type value outside the registry; carries the external 16-bit code.
    Unknown(u16),
}

impl SectionKind {
    /// Map an image-table type byte.
    pub fn from_itoc_type(b: u8) -> SectionKind {
        match b {
            0x01 => SectionKind::Boot2,
            0x02 => SectionKind::PciCode,
            0x03 => SectionKind::MainCode,
            0x04 => SectionKind::PcieLinkCode,
            0x05 => SectionKind::IronPrepCode,
            0x06 => SectionKind::PostIronBootCode,
            0x07 => SectionKind::UpgradeCode,
            0x08 => SectionKind::HwBootCfg,
            0x09 => SectionKind::HwMainCfg,
            0x0A => SectionKind::PhyUcCode,
            0x0B => SectionKind::PhyUcConsts,
            0x0C => SectionKind::PciePhyUcCode,
            0x10 => SectionKind::ImageInfo,
            0x11 => SectionKind::FwBootCfg,
            0x12 => SectionKind::FwMainCfg,
            0x18 => SectionKind::RomCode,
            0x20 => SectionKind::ResetInfo,
            0x30 => SectionKind::DbgFwIni,
            0x32 => SectionKind::DbgFwParams,
            0xA0 => SectionKind::ImageSignature256,
            0xA1 => SectionKind::PublicKeys2048,
            0xA2 => SectionKind::ForbiddenVersions,
            0xA3 => SectionKind::ImageSignature512,
            0xA4 => SectionKind::PublicKeys4096,
            0xE9 => SectionKind::CrDumpMaskData,
            0xEB => SectionKind::ProgrammableHwFw,
            other => SectionKind::Unknown(u16::from(other)),
        }
    }

    /// Map a device-table type byte (tagged into the 0xE0xx code space).
    pub fn from_dtoc_type(b: u8) -> SectionKind {
        match b {
            0x01 => SectionKind::MfgInfo,
            0x02 => SectionKind::DevInfo,
            0x03 => SectionKind::NvData,
            0x04 => SectionKind::FwNvLog,
            0x05 => SectionKind::VpdR0,
            0x06 => SectionKind::NvDataExt,
            other => SectionKind::Unknown(DTOC_TYPE_TAG | u16::from(other)),
        }
    }

    /// Inverse of [`code`](Self::code), for selector lookups.
    pub fn from_code(code: u16) -> SectionKind {
        match code {
            0xFA => SectionKind::HashesTable,
            0xFB => SectionKind::ToolsArea,
            c if c & 0xFF00 == DTOC_TYPE_TAG => SectionKind::from_dtoc_type((c & 0xFF) as u8),
            c if c <= 0xFF => SectionKind::from_itoc_type(c as u8),
            other => SectionKind::Unknown(other),
        }
    }

    /// External 16-bit type code.
    pub fn code(&self) -> u16 {
        match self {
            SectionKind::Boot2 => 0x01,
            SectionKind::PciCode => 0x02,
            SectionKind::MainCode => 0x03,
            SectionKind::PcieLinkCode => 0x04,
            SectionKind::IronPrepCode => 0x05,
            SectionKind::PostIronBootCode => 0x06,
            SectionKind::UpgradeCode => 0x07,
            SectionKind::HwBootCfg => 0x08,
            SectionKind::HwMainCfg => 0x09,
            SectionKind::PhyUcCode => 0x0A,
            SectionKind::PhyUcConsts => 0x0B,
            SectionKind::PciePhyUcCode => 0x0C,
            SectionKind::ImageInfo => 0x10,
            SectionKind::FwBootCfg => 0x11,
            SectionKind::FwMainCfg => 0x12,
            SectionKind::RomCode => 0x18,
            SectionKind::ResetInfo => 0x20,
            SectionKind::DbgFwIni => 0x30,
            SectionKind::DbgFwParams => 0x32,
            SectionKind::ImageSignature256 => 0xA0,
            SectionKind::PublicKeys2048 => 0xA1,
            SectionKind::ForbiddenVersions => 0xA2,
            SectionKind::ImageSignature512 => 0xA3,
            SectionKind::PublicKeys4096 => 0xA4,
            SectionKind::CrDumpMaskData => 0xE9,
            SectionKind::ProgrammableHwFw => 0xEB,
            SectionKind::MfgInfo => DTOC_TYPE_TAG | 0x01,
            SectionKind::DevInfo => DTOC_TYPE_TAG | 0x02,
            SectionKind::NvData => DTOC_TYPE_TAG | 0x03,
            SectionKind::FwNvLog => DTOC_TYPE_TAG | 0x04,
            SectionKind::VpdR0 => DTOC_TYPE_TAG | 0x05,
            SectionKind::NvDataExt => DTOC_TYPE_TAG | 0x06,
            SectionKind::HashesTable => 0xFA,
            SectionKind::ToolsArea => 0xFB,
            SectionKind::Unknown(code) => *code,
        }
    }

    /// Registry display name.
    pub fn name(&self) -> &'static str {
        match self {
            SectionKind::Boot2 => "BOOT2",
            SectionKind::PciCode => "PCI_CODE",
            SectionKind::MainCode => "MAIN_CODE",
            SectionKind::PcieLinkCode => "PCIE_LINK_CODE",
            SectionKind::IronPrepCode => "IRON_PREP_CODE",
            SectionKind::PostIronBootCode => "POST_IRON_BOOT_CODE",
            SectionKind::UpgradeCode => "UPGRADE_CODE",
            SectionKind::HwBootCfg => "HW_BOOT_CFG",
            SectionKind::HwMainCfg => "HW_MAIN_CFG",
            SectionKind::PhyUcCode => "PHY_UC_CODE",
            SectionKind::PhyUcConsts => "PHY_UC_CONSTS",
            SectionKind::PciePhyUcCode => "PCIE_PHY_UC_CODE",
            SectionKind::ImageInfo => "IMAGE_INFO",
            SectionKind::FwBootCfg => "FW_BOOT_CFG",
            SectionKind::FwMainCfg => "FW_MAIN_CFG",
            SectionKind::RomCode => "ROM_CODE",
            SectionKind::ResetInfo => "RESET_INFO",
            SectionKind::DbgFwIni => "DBG_FW_INI",
            SectionKind::DbgFwParams => "DBG_FW_PARAMS",
            SectionKind::ImageSignature256 => "IMAGE_SIGNATURE_256",
            SectionKind::PublicKeys2048 => "PUBLIC_KEYS_2048",
            SectionKind::ForbiddenVersions => "FORBIDDEN_VERSIONS",
            SectionKind::ImageSignature512 => "IMAGE_SIGNATURE_512",
            SectionKind::PublicKeys4096 => "PUBLIC_KEYS_4096",
            SectionKind::CrDumpMaskData => "CRDUMP_MASK_DATA",
            SectionKind::ProgrammableHwFw => "PROGRAMMABLE_HW_FW",
            SectionKind::MfgInfo => "MFG_INFO",
            SectionKind::DevInfo => "DEV_INFO",
            SectionKind::NvData => "NV_DATA",
            SectionKind::FwNvLog => "FW_NV_LOG",
            SectionKind::VpdR0 => "VPD_R0",
            SectionKind::NvDataExt => "NV_DATA_EXT",
            SectionKind::HashesTable => "HASHES_TABLE",
            SectionKind::ToolsArea => "TOOLS_AREA",
            SectionKind::Unknown(_) => "UNKNOWN",
        }
    }

    /// Look a kind up by its registry name (case-insensitive).
    pub fn from_name(name: &str) -> Option<SectionKind> {
        let upper = name.to_ascii_uppercase();
        let kind = match upper.as_str() {
            "BOOT2" => SectionKind::Boot2,
            "PCI_CODE" => SectionKind::PciCode,
            "MAIN_CODE" => SectionKind::MainCode,
            "PCIE_LINK_CODE" => SectionKind::PcieLinkCode,
            "IRON_PREP_CODE" => SectionKind::IronPrepCode,
            "POST_IRON_BOOT_CODE" => SectionKind::PostIronBootCode,
            "UPGRADE_CODE" => SectionKind::UpgradeCode,
            "HW_BOOT_CFG" => SectionKind::HwBootCfg,
            "HW_MAIN_CFG" => SectionKind::HwMainCfg,
            "PHY_UC_CODE" => SectionKind::PhyUcCode,
            "PHY_UC_CONSTS" => SectionKind::PhyUcConsts,
            "PCIE_PHY_UC_CODE" => SectionKind::PciePhyUcCode,
            "IMAGE_INFO" => SectionKind::ImageInfo,
            "FW_BOOT_CFG" => SectionKind::FwBootCfg,
            "FW_MAIN_CFG" => SectionKind::FwMainCfg,
            "ROM_CODE" => SectionKind::RomCode,
            "RESET_INFO" => SectionKind::ResetInfo,
            "DBG_FW_INI" => SectionKind::DbgFwIni,
            "DBG_FW_PARAMS" => SectionKind::DbgFwParams,
            "IMAGE_SIGNATURE_256" => SectionKind::ImageSignature256,
            "PUBLIC_KEYS_2048" => SectionKind::PublicKeys2048,
            "FORBIDDEN_VERSIONS" => SectionKind::ForbiddenVersions,
            "IMAGE_SIGNATURE_512" => SectionKind::ImageSignature512,
            "PUBLIC_KEYS_4096" => SectionKind::PublicKeys4096,
            "CRDUMP_MASK_DATA" => SectionKind::CrDumpMaskData,
            "PROGRAMMABLE_HW_FW" => SectionKind::ProgrammableHwFw,
            "MFG_INFO" => SectionKind::MfgInfo,
            "DEV_INFO" => SectionKind::DevInfo,
            "NV_DATA" => SectionKind::NvData,
            "FW_NV_LOG" => SectionKind::FwNvLog,
            "VPD_R0" => SectionKind::VpdR0,
            "NV_DATA_EXT" => SectionKind::NvDataExt,
            "HASHES_TABLE" => SectionKind::HashesTable,
            "TOOLS_AREA" => SectionKind::ToolsArea,
            _ => return None,
        };
        Some(kind)
    }

    /// True for device-area kinds.
    pub fn is_device_data(&self) -> bool {
        matches!(
            self,
            SectionKind::MfgInfo
                | SectionKind::DevInfo
                | SectionKind::NvData
                | SectionKind::FwNvLog
                | SectionKind::VpdR0
                | SectionKind::NvDataExt
        ) || matches!(self, SectionKind::Unknown(c) if c & 0xFF00 == DTOC_TYPE_TAG)
    }

    /// True for executable code sections.
    pub fn is_code(&self) -> bool {
        matches!(
            self,
            SectionKind::PciCode
                | SectionKind::MainCode
                | SectionKind::PcieLinkCode
                | SectionKind::IronPrepCode
                | SectionKind::PostIronBootCode
                | SectionKind::UpgradeCode
        )
    }
}

impl fmt::Display for SectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SectionKind::Unknown(code) => write!(f, "UNKNOWN_SECTION_{code:04X}"),
            other => f.write_str(other.name()),
        }
    }
}

/// Per-section outcome in the listing report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionStatus {
    /// CRC verified.
    Ok,
    /// No CRC covers the section, or the stored CRC is blank.
    CrcIgnored,
    /// Computed CRC disagrees with the stored one.
    Fail,
    /// A pointer names this region but no table entry backs it.
    NoEntry,
    /// A set pointer's region cannot be materialised.
    NotFound,
    /// In-section mode with a size that is not a dword multiple.
    SizeNotAligned,
    /// Verification skipped because the image or section is encrypted.
    Encrypted,
}

impl SectionStatus {
    /// Report string.
    pub fn name(&self) -> &'static str {
        match self {
            SectionStatus::Ok => "OK",
            SectionStatus::CrcIgnored => "CRC IGNORED",
            SectionStatus::Fail => "FAIL",
            SectionStatus::NoEntry => "NO ENTRY",
            SectionStatus::NotFound => "NOT FOUND",
            SectionStatus::SizeNotAligned => "SIZE NOT ALIGNED",
            SectionStatus::Encrypted => "ENCRYPTED",
        }
    }

    /// Whether this status makes the listing exit non-zero.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SectionStatus::Fail | SectionStatus::NoEntry | SectionStatus::NotFound
        )
    }
}

impl fmt::Display for SectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for SectionStatus {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

/// Severity of a non-fatal parse finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteLevel {
    /// Expected deviation, e.g. a fallback probe that succeeded.
    Info,
    /// Unexpected but recoverable, e.g. an unknown section type.
    Warning,
}

/// A non-fatal finding recorded while parsing (header CRC mismatch, unknown
/// section type, fallback probes taken).
#[derive(Debug, Clone, Serialize)]
pub struct ParseNote {
    /// Finding severity.
    pub level: NoteLevel,
    /// Human-readable description.
    pub message: String,
}

impl ParseNote {
    /// An informational finding.
    pub fn info(message: impl Into<String>) -> Self {
        ParseNote {
            level: NoteLevel::Info,
            message: message.into(),
        }
    }

    /// A warning finding.
    pub fn warning(message: impl Into<String>) -> Self {
        ParseNote {
            level: NoteLevel::Warning,
            message: message.into(),
        }
    }
}

bitflags! {
    /// Security attribute bits of the image-info control word.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SecurityAttributes: u32 {
        /// Module-level checksum coverage.
        const MCC    = 1 << 8;
        /// Debug build of the firmware.
        const DEBUG  = 1 << 13;
        /// Image carries a cryptographic signature.
        const SIGNED = 1 << 14;
        /// Secure-boot enforcing firmware.
        const SECURE = 1 << 15;
    }
}

impl SecurityAttributes {
    /// Extract the attribute bits from the image-info control word.
    pub fn from_info_word(word: u32) -> Self {
        Self::from_bits_truncate(word)
    }
}

/// Security attributes as they appear in the metadata record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SecurityReport {
    /// Secure-boot enforcing.
    pub secure: bool,
    /// Cryptographically signed.
    pub signed: bool,
    /// Debug build.
    pub debug: bool,
    /// Module-level checksum coverage.
    pub mcc: bool,
}

impl SecurityReport {
    /// Build from decoded attribute bits.
    pub fn from_attributes(attrs: SecurityAttributes) -> Self {
        SecurityReport {
            secure: attrs.contains(SecurityAttributes::SECURE),
            signed: attrs.contains(SecurityAttributes::SIGNED),
            debug: attrs.contains(SecurityAttributes::DEBUG),
            mcc: attrs.contains(SecurityAttributes::MCC),
        }
    }

    /// Comma-list rendering: `secure-fw` wins over `signed-fw`, `N/A` when
    /// neither is set, `, debug` appended when the debug bit is up.
    pub fn render(&self) -> String {
        let base = if self.secure {
            "secure-fw"
        } else if self.signed {
            "signed-fw"
        } else {
            "N/A"
        };
        if self.debug {
            format!("{base}, debug")
        } else {
            base.to_string()
        }
    }
}

/// Firmware version triple. The subminor renders zero-padded to four digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FwVersion {
    /// Major version.
    pub major: u16,
    /// Minor version.
    pub minor: u16,
    /// Subminor version (build number).
    pub subminor: u16,
}

impl fmt::Display for FwVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{:04}", self.major, self.minor, self.subminor)
    }
}

/// Release date, rendered `dd.mm.yyyy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReleaseDate {
    /// Day of month, 1-31.
    pub day: u8,
    /// Month, 1-12.
    pub month: u8,
    /// Four-digit year.
    pub year: u16,
}

impl ReleaseDate {
    /// Basic plausibility check; all-zero and all-ones fields mean "unset".
    pub fn is_valid(&self) -> bool {
        (1..=31).contains(&self.day) && (1..=12).contains(&self.month) && self.year != 0 && self.year != 0xFFFF
    }
}

impl fmt::Display for ReleaseDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}.{:02}.{}", self.day, self.month, self.year)
    }
}

/// A base GUID or MAC with its allocation count and step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UidEntry {
    /// Base identifier, held big-endian for display.
    pub uid: u64,
    /// Number of identifiers allocated from the base.
    pub count: u8,
    /// Increment between consecutive identifiers.
    pub step: u8,
}

impl UidEntry {
    /// `None` for the unset encodings (zero, all-ones).
    pub fn from_raw(uid: u64, count: u8, step: u8) -> Option<UidEntry> {
        if uid == 0 || uid == u64::MAX {
            None
        } else {
            Some(UidEntry { uid, count, step })
        }
    }
}

impl fmt::Display for UidEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.uid.to_be_bytes()))
    }
}

/// Expansion-ROM kinds recognised in ROM-code sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RomKind {
    /// PXE network boot ROM.
    Pxe,
    /// UEFI driver.
    Uefi,
    /// CLP management ROM.
    Clp,
    /// NVMe boot ROM.
    Nvme,
}

impl RomKind {
    /// Map a ROM product identifier; unrecognised values are skipped by the
    /// scanner.
    pub fn from_product_id(id: u16) -> Option<RomKind> {
        match id {
            0x10 => Some(RomKind::Pxe),
            0x11 => Some(RomKind::Uefi),
            0x12 | 0x0F => Some(RomKind::Clp),
            0x13 => Some(RomKind::Nvme),
            _ => None,
        }
    }

    /// Display name.
    pub fn name(&self) -> &'static str {
        match self {
            RomKind::Pxe => "PXE",
            RomKind::Uefi => "UEFI",
            RomKind::Clp => "CLP",
            RomKind::Nvme => "NVMe",
        }
    }
}

impl fmt::Display for RomKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// CPU architecture advertised by an expansion ROM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CpuArch {
    /// x86-64.
    Amd64,
    /// 64-bit ARM.
    Aarch64,
    /// Dual x86-64 and 64-bit ARM image.
    Amd64Aarch64,
    /// 32-bit x86.
    Ia32,
}

impl CpuArch {
    /// Decode the four-bit CPU field; `0` means unspecified.
    pub fn from_nibble(n: u8) -> Option<CpuArch> {
        match n {
            1 => Some(CpuArch::Amd64),
            2 => Some(CpuArch::Aarch64),
            3 => Some(CpuArch::Amd64Aarch64),
            4 => Some(CpuArch::Ia32),
            _ => None,
        }
    }

    /// Display name.
    pub fn name(&self) -> &'static str {
        match self {
            CpuArch::Amd64 => "AMD64",
            CpuArch::Aarch64 => "AARCH64",
            CpuArch::Amd64Aarch64 => "AMD64,AARCH64",
            CpuArch::Ia32 => "IA32",
        }
    }
}

impl fmt::Display for CpuArch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Expansion-ROM version triple, rendered `v0.v1.v2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RomVersion {
    /// Major version.
    pub major: u8,
    /// Minor version.
    pub minor: u8,
    /// Build number.
    pub build: u16,
}

impl fmt::Display for RomVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.build)
    }
}

/// One expansion ROM found in a ROM-code section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RomEntry {
    /// ROM product kind.
    pub kind: RomKind,
    /// Version triple.
    pub version: RomVersion,
    /// CPU architecture, when the descriptor carries one.
    pub cpu: Option<CpuArch>,
}
