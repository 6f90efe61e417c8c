//! Shared test fixtures: synthetic images covering both format generations,
//! plus raw record builders for table headers and entries.

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::bitfield::set_bits;
use crate::crc;
use crate::layout::hwpointers::{stamp_pointer, HW_POINTER_DELTA};
use crate::layout::toc::{TocKind, FS3_ITOC_SIG1, FS3_ITOC_SIG2, FS3_ITOC_SIG3};
use crate::layout;
use crate::types::FwFormat;

pub(crate) const FIX_LEN: usize = 0x10_0000;
pub(crate) const FIX_BOOT2_OFFSET: u64 = 0x1000;
pub(crate) const FIX_BOOT2_SIZE: u64 = 0x50;
pub(crate) const FIX_TOOLS_OFFSET: u64 = 0x2000;
pub(crate) const FIX_ITOC_OFFSET: u64 = 0x4000;
pub(crate) const FIX_IMAGE_INFO_OFFSET: u64 = 0x6000;
pub(crate) const FIX_MAIN_CODE_OFFSET: u64 = 0x7000;
pub(crate) const FIX_MAIN_CODE_SIZE: u64 = 0x1000;
pub(crate) const FIX_ROM_OFFSET: u64 = 0x9000;
pub(crate) const FIX_ROM_SIZE: u64 = 0x800;
pub(crate) const FIX_DBG_OFFSET: u64 = 0xA000;
pub(crate) const FIX_DBG_SIZE: u64 = 0x200;

pub(crate) const FIX_PSID: &str = "MT_0000000001";
pub(crate) const FIX_PART_NUMBER: &str = "MCX556A-ECAT";
pub(crate) const FIX_PRS_NAME: &str = "MCX556A-ECAT_Ax";
pub(crate) const FIX_DESCRIPTION: &str = "ConnectX-5 VPI adapter card";
pub(crate) const FIX_VSD: &str = "Mellanox";
pub(crate) const FIX_GUID: u64 = 0x0002_C903_0001_2345;
pub(crate) const FIX_MAC: u64 = 0x0002_C912_3456;

/// Device-area sections sit at a fixed distance below the device TOC.
pub(crate) fn fix_dev_base(image_len: u64) -> u64 {
    layout::dtoc_offset(image_len).unwrap() - 0xF000
}

pub(crate) fn build_toc_header(kind: TocKind, format: FwFormat) -> [u8; 32] {
    let mut raw = [0u8; 32];
    BigEndian::write_u32(&mut raw[0..4], kind.signature());
    if format == FwFormat::Fs3 && kind == TocKind::Itoc {
        BigEndian::write_u32(&mut raw[4..8], FS3_ITOC_SIG1);
        BigEndian::write_u32(&mut raw[8..12], FS3_ITOC_SIG2);
        BigEndian::write_u32(&mut raw[12..16], FS3_ITOC_SIG3);
    }
    BigEndian::write_u32(&mut raw[16..20], 1);
    crc::stamp_trailer(&mut raw);
    raw
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn build_entry_full(
    section_type: u8,
    size_bytes: u64,
    offset_bytes: u64,
    format: FwFormat,
    crc_field: u32,
    section_crc: u16,
    device_data: bool,
    no_crc: bool,
) -> [u8; 32] {
    let mut raw = [0u8; 32];
    set_bits(&mut raw, 0, 8, u32::from(section_type));
    set_bits(&mut raw, 8, 22, (size_bytes / 4) as u32);
    match format {
        FwFormat::Fs3 => set_bits(&mut raw, 129, 32, (offset_bytes / 4) as u32),
        FwFormat::Fs4 => set_bits(&mut raw, 161, 29, (offset_bytes / 4) as u32),
    }
    if no_crc {
        set_bits(&mut raw, 202, 1, 1);
    }
    if device_data {
        set_bits(&mut raw, 204, 1, 1);
    }
    set_bits(&mut raw, 205, 3, crc_field);
    set_bits(&mut raw, 208, 16, u32::from(section_crc));
    let crc = crc::software_crc(&raw[..28]);
    BigEndian::write_u16(&mut raw[30..32], crc);
    raw
}

pub(crate) fn build_entry(
    section_type: u8,
    size_bytes: u64,
    offset_bytes: u64,
    format: FwFormat,
    crc_field: u32,
    section_crc: u16,
) -> [u8; 32] {
    build_entry_full(
        section_type,
        size_bytes,
        offset_bytes,
        format,
        crc_field,
        section_crc,
        false,
        false,
    )
}

pub(crate) fn terminator_entry() -> [u8; 32] {
    let mut raw = [0u8; 32];
    raw[0] = 0xFF;
    raw
}

fn put_str(buf: &mut [u8], at: usize, field_len: usize, s: &str) {
    buf[at..at + field_len].fill(0);
    buf[at..at + s.len()].copy_from_slice(s.as_bytes());
}

pub(crate) fn write_image_info(buf: &mut [u8]) {
    buf.fill(0);
    BigEndian::write_u32(&mut buf[0x000..], 0x0400_8100); // format 4.0, secure + mcc
    BigEndian::write_u16(&mut buf[0x004..], 16);
    BigEndian::write_u16(&mut buf[0x008..], 35);
    BigEndian::write_u16(&mut buf[0x00A..], 2000);
    BigEndian::write_u16(&mut buf[0x010..], 2023);
    buf[0x012] = 3;
    buf[0x013] = 12;
    BigEndian::write_u32(&mut buf[0x014..], 1);
    put_str(buf, 0x020, 16, FIX_PSID);
    put_str(buf, 0x030, 32, FIX_PART_NUMBER);
    put_str(buf, 0x050, 16, "16.35.2000");
    put_str(buf, 0x060, 96, FIX_PRS_NAME);
    put_str(buf, 0x0C0, 256, FIX_DESCRIPTION);
    put_str(buf, 0x1C0, 208, FIX_VSD);
    put_str(buf, 0x290, 208, FIX_VSD);
}

pub(crate) fn write_device_info(buf: &mut [u8]) {
    buf.fill(0);
    for base in [0x10, 0x30] {
        LittleEndian::write_u64(&mut buf[base..], FIX_GUID);
        buf[base + 8] = 8;
        buf[base + 9] = 1;
    }
    for base in [0x20, 0x40] {
        LittleEndian::write_u64(&mut buf[base..], FIX_MAC);
        buf[base + 8] = 8;
        buf[base + 9] = 1;
    }
}

pub(crate) fn write_mfg_info(buf: &mut [u8]) {
    buf.fill(0);
    put_str(buf, 0x00, 16, FIX_PSID);
    LittleEndian::write_u64(&mut buf[0x10..], FIX_GUID);
    buf[0x18] = 8;
    buf[0x19] = 1;
    LittleEndian::write_u64(&mut buf[0x20..], FIX_MAC);
    buf[0x28] = 8;
    buf[0x29] = 1;
}

pub(crate) fn write_rom(buf: &mut [u8]) {
    buf.fill(0);
    // PXE 3.6.514 for AMD64
    buf[0x10..0x18].copy_from_slice(b"mlxsign:");
    BigEndian::write_u32(&mut buf[0x18..], 0x0010_0003);
    BigEndian::write_u32(&mut buf[0x1C..], 0x0006_0202);
    BigEndian::write_u32(&mut buf[0x20..], 0x0000_0100);
    // UEFI 14.0.170 for AARCH64
    buf[0x100..0x108].copy_from_slice(b"mlxsign:");
    BigEndian::write_u32(&mut buf[0x108..], 0x0011_000E);
    BigEndian::write_u32(&mut buf[0x10C..], 0x0000_00AA);
    BigEndian::write_u32(&mut buf[0x110..], 0x0000_0200);
}

fn build_fs4(len: usize, main_code_offset: u64) -> Vec<u8> {
    let mut img = vec![0xFFu8; len];
    BigEndian::write_u64(&mut img[0..8], layout::MAGIC);

    // boot2 region: 16 payload dwords behind the two header words
    {
        let at = FIX_BOOT2_OFFSET as usize;
        let region = &mut img[at..at + FIX_BOOT2_SIZE as usize];
        region.fill(0x11);
        BigEndian::write_u32(&mut region[0..4], 0);
        BigEndian::write_u32(&mut region[4..8], 64);
        crc::stamp_region_crc(region, 16);
    }

    // tools area
    {
        let at = FIX_TOOLS_OFFSET as usize;
        let region = &mut img[at..at + 0x40];
        region.fill(0);
        crc::stamp_trailer(region);
    }

    {
        let at = FIX_IMAGE_INFO_OFFSET as usize;
        write_image_info(&mut img[at..at + 0x400]);
    }

    // main code carries an in-section trailer
    {
        let at = main_code_offset as usize;
        let section = &mut img[at..at + FIX_MAIN_CODE_SIZE as usize];
        for (i, b) in section.iter_mut().enumerate() {
            *b = (i % 251) as u8;
        }
        crc::stamp_trailer(section);
    }

    {
        let at = FIX_ROM_OFFSET as usize;
        write_rom(&mut img[at..at + FIX_ROM_SIZE as usize]);
    }
    {
        let at = FIX_DBG_OFFSET as usize;
        img[at..at + FIX_DBG_SIZE as usize].fill(0xDD);
    }

    let dtoc_at = layout::dtoc_offset(len as u64).unwrap() as usize;
    let dev_base = dtoc_at - 0xF000;
    write_device_info(&mut img[dev_base..dev_base + 0x200]);
    write_mfg_info(&mut img[dev_base + 0x800..dev_base + 0x940]);
    img[dev_base + 0x1000..dev_base + 0x1100].fill(0x56);

    // image TOC
    {
        let ii = FIX_IMAGE_INFO_OFFSET as usize;
        let ii_crc = crc::software_crc(&img[ii..ii + 0x400]);
        let rom = FIX_ROM_OFFSET as usize;
        let rom_crc = crc::software_crc(&img[rom..rom + FIX_ROM_SIZE as usize]);
        let mut at = FIX_ITOC_OFFSET as usize;
        img[at..at + 32].copy_from_slice(&build_toc_header(TocKind::Itoc, FwFormat::Fs4));
        at += 32;
        let entries = [
            build_entry(0x10, 0x400, FIX_IMAGE_INFO_OFFSET, FwFormat::Fs4, 0, ii_crc),
            build_entry(0x03, FIX_MAIN_CODE_SIZE, main_code_offset, FwFormat::Fs4, 7, 0),
            build_entry(0x18, FIX_ROM_SIZE, FIX_ROM_OFFSET, FwFormat::Fs4, 0, rom_crc),
            build_entry(0x30, FIX_DBG_SIZE, FIX_DBG_OFFSET, FwFormat::Fs4, 1, 0),
        ];
        for raw in entries {
            img[at..at + 32].copy_from_slice(&raw);
            at += 32;
        }
        img[at..at + 32].copy_from_slice(&terminator_entry());
    }

    // device TOC
    {
        let di_crc = crc::software_crc(&img[dev_base..dev_base + 0x200]);
        let mfg_crc = crc::software_crc(&img[dev_base + 0x800..dev_base + 0x940]);
        let mut at = dtoc_at;
        img[at..at + 32].copy_from_slice(&build_toc_header(TocKind::Dtoc, FwFormat::Fs4));
        at += 32;
        let base = dev_base as u64;
        let entries = [
            build_entry_full(0x02, 0x200, base, FwFormat::Fs4, 0, di_crc, true, false),
            build_entry_full(0x01, 0x140, base + 0x800, FwFormat::Fs4, 0, mfg_crc, true, false),
            build_entry_full(0x05, 0x100, base + 0x1000, FwFormat::Fs4, 1, 0, true, false),
        ];
        for raw in entries {
            img[at..at + 32].copy_from_slice(&raw);
            at += 32;
        }
        img[at..at + 32].copy_from_slice(&terminator_entry());
    }

    // magic sits at zero, so the pointer table is at the bare delta
    stamp_pointer(&mut img, HW_POINTER_DELTA, 1, FIX_BOOT2_OFFSET as u32);
    stamp_pointer(&mut img, HW_POINTER_DELTA, 2, FIX_ITOC_OFFSET as u32);
    stamp_pointer(&mut img, HW_POINTER_DELTA, 3, FIX_TOOLS_OFFSET as u32);
    stamp_pointer(&mut img, HW_POINTER_DELTA, 4, FIX_IMAGE_INFO_OFFSET as u32);

    img
}

/// The standard current-generation fixture: 1 MiB, magic at zero, four
/// image-table sections, three device-table sections, boot2 and tools
/// regions reachable through pointers.
pub(crate) fn fs4_image() -> Vec<u8> {
    build_fs4(FIX_LEN, FIX_MAIN_CODE_OFFSET)
}

/// A canonically sized (32 MiB) variant with the main code at 0x100000.
pub(crate) fn fs4_canonical_image() -> Vec<u8> {
    build_fs4(0x0200_0000, 0x0010_0000)
}

/// Older-generation fixture: 32-bit marker at zero, ITOC found by sector
/// scan at 0x2000, one checked and one unchecked section.
pub(crate) fn fs3_image() -> Vec<u8> {
    let mut img = vec![0xFFu8; FIX_LEN];
    BigEndian::write_u32(&mut img[0..4], layout::FS3_MAGIC);

    for (i, b) in img[0x3000..0x3800].iter_mut().enumerate() {
        *b = (i % 253) as u8;
    }
    let main_crc = crc::software_crc(&img[0x3000..0x3800]);
    img[0x4000..0x4100].fill(0xDD);

    let mut at = 0x2000;
    img[at..at + 32].copy_from_slice(&build_toc_header(TocKind::Itoc, FwFormat::Fs3));
    at += 32;
    let entries = [
        build_entry(0x03, 0x800, 0x3000, FwFormat::Fs3, 0, main_crc),
        build_entry_full(0x30, 0x100, 0x4000, FwFormat::Fs3, 0, 0, false, true),
    ];
    for raw in entries {
        img[at..at + 32].copy_from_slice(&raw);
        at += 32;
    }
    img[at..at + 32].copy_from_slice(&terminator_entry());
    img
}

/// Move the image TOC from `from` to `to` and scribble over the original
/// signature, leaving an image that only parses via the fallback probes.
pub(crate) fn with_relocated_itoc(mut img: Vec<u8>, from: u64, to: u64) -> Vec<u8> {
    let (from, to) = (from as usize, to as usize);
    let table: Vec<u8> = img[from..from + 0x800].to_vec();
    img[to..to + 0x800].copy_from_slice(&table);
    BigEndian::write_u32(&mut img[from..], 0xDEAD_BEEF);
    img
}
