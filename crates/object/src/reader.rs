//! Object container reader.
//!
//! A minimal parser for the format produced by [`crate::ObjectWriter`].
//! It exists for verification: tests and tooling decode what the
//! compiler emitted instead of pattern-matching raw bytes.

use byteorder::{ByteOrder, LittleEndian};

use crate::instr::Instruction;
use crate::writer::{HEADER_SIZE, MAGIC, SECTION_CODE, SECTION_HEADER_SIZE, SECTION_STRTAB};
use crate::ObjectError;

/// Decoded object header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub version: (u8, u8, u8),
    pub flags: u8,
    pub arch: u16,
    pub section_count: u16,
    pub entrypoint: u32,
    pub strtab_offset: u32,
    pub strtab_size: u32,
    pub symtab_offset: u32,
    pub symtab_size: u32,
}

/// Decoded section header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionHeader {
    pub name_offset: u32,
    pub kind: u32,
    pub flags: u32,
    pub offset: u32,
    pub size: u32,
    pub link: u32,
    pub info: u32,
    pub align: u32,
    pub entry_size: u32,
}

/// A parsed COIL object.
#[derive(Debug)]
pub struct ObjectFile {
    pub header: Header,
    pub sections: Vec<SectionHeader>,
    data: Vec<u8>,
}

impl ObjectFile {
    pub fn parse(data: Vec<u8>) -> Result<ObjectFile, ObjectError> {
        if data.len() < HEADER_SIZE {
            return Err(ObjectError::Truncated {
                offset: 0,
                needed: HEADER_SIZE,
            });
        }
        if data[0..4] != MAGIC {
            return Err(ObjectError::BadMagic);
        }
        let header = Header {
            version: (data[4], data[5], data[6]),
            flags: data[7],
            arch: LittleEndian::read_u16(&data[8..10]),
            section_count: LittleEndian::read_u16(&data[10..12]),
            entrypoint: LittleEndian::read_u32(&data[12..16]),
            strtab_offset: LittleEndian::read_u32(&data[16..20]),
            strtab_size: LittleEndian::read_u32(&data[20..24]),
            symtab_offset: LittleEndian::read_u32(&data[24..28]),
            symtab_size: LittleEndian::read_u32(&data[28..32]),
        };

        let mut sections = Vec::with_capacity(header.section_count as usize);
        for i in 0..header.section_count as usize {
            let at = HEADER_SIZE + i * SECTION_HEADER_SIZE;
            if at + SECTION_HEADER_SIZE > data.len() {
                return Err(ObjectError::Truncated {
                    offset: at,
                    needed: SECTION_HEADER_SIZE,
                });
            }
            let field = |n: usize| LittleEndian::read_u32(&data[at + n * 4..at + n * 4 + 4]);
            let sh = SectionHeader {
                name_offset: field(0),
                kind: field(1),
                flags: field(2),
                offset: field(3),
                size: field(4),
                link: field(5),
                info: field(6),
                align: field(7),
                entry_size: field(8),
            };
            let end = sh.offset as usize + sh.size as usize;
            if end > data.len() {
                return Err(ObjectError::BadSection {
                    kind: sh.kind,
                    offset: sh.offset,
                    size: sh.size,
                });
            }
            sections.push(sh);
        }

        Ok(ObjectFile {
            header,
            sections,
            data,
        })
    }

    /// First section of the given kind.
    pub fn section(&self, kind: u32) -> Option<&SectionHeader> {
        self.sections.iter().find(|s| s.kind == kind)
    }

    /// Raw bytes of a section.
    pub fn section_bytes(&self, sh: &SectionHeader) -> &[u8] {
        &self.data[sh.offset as usize..(sh.offset + sh.size) as usize]
    }

    /// The code section's bytes, or empty if there is none.
    pub fn code(&self) -> &[u8] {
        self.section(SECTION_CODE)
            .map(|sh| self.section_bytes(sh))
            .unwrap_or(&[])
    }

    /// Decode the whole code section.
    pub fn instructions(&self) -> Result<Vec<Instruction>, ObjectError> {
        Instruction::decode_all(self.code())
    }

    /// Look up a string-table entry by offset.
    pub fn string_at(&self, offset: u32) -> Option<&str> {
        let sh = self.section(SECTION_STRTAB)?;
        let bytes = self.section_bytes(sh);
        let start = offset as usize;
        if start >= bytes.len() {
            return None;
        }
        let end = start + bytes[start..].iter().position(|&b| b == 0)?;
        std::str::from_utf8(&bytes[start..end]).ok()
    }
}
