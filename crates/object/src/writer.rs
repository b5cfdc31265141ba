//! Object container writer.
//!
//! The writer owns the output buffer and the string table. Header and
//! section-header fields that depend on final sizes (entrypoint,
//! section offsets and sizes, string-table location) start as zeros and
//! are patched in [`ObjectWriter::finish`] once all code has been
//! emitted.

use byteorder::{ByteOrder, LittleEndian};

use crate::instr::Instruction;
use crate::strtab::StringTable;

/// `43 4F 49 4C`, "COIL".
pub const MAGIC: [u8; 4] = [0x43, 0x4F, 0x49, 0x4C];

pub const HEADER_SIZE: usize = 32;
pub const SECTION_HEADER_SIZE: usize = 36;

/// Object flag: the object carries an entrypoint and can be run.
pub const FLAG_EXECUTABLE: u8 = 0x01;
/// Object flag: the object may participate in a link step.
pub const FLAG_LINKABLE: u8 = 0x02;

/// Default target architecture tag: the generic 64-bit virtual machine.
pub const ARCH_VIRT64: u16 = 0x0001;

pub const SECTION_CODE: u32 = 1;
pub const SECTION_STRTAB: u32 = 2;
pub const SECTION_SYMTAB: u32 = 3;

pub const SECTION_FLAG_WRITE: u32 = 0x01;
pub const SECTION_FLAG_ALLOC: u32 = 0x02;
pub const SECTION_FLAG_EXEC: u32 = 0x04;
pub const SECTION_FLAG_STRINGS: u32 = 0x20;

// Header field byte positions, patched by finish().
const OFF_VERSION: usize = 4;
const OFF_FLAGS: usize = 7;
const OFF_ARCH: usize = 8;
const OFF_SECTION_COUNT: usize = 10;
const OFF_ENTRYPOINT: usize = 12;
const OFF_STRTAB_OFFSET: usize = 16;
const OFF_STRTAB_SIZE: usize = 20;

/// Builds a COIL object: 32-byte header, section headers for `.text`
/// and `.strtab`, code bytes, then the string table.
pub struct ObjectWriter {
    buf: Vec<u8>,
    strtab: StringTable,
    version: (u8, u8, u8),
    arch: u16,
    flags: u8,
    entrypoint: u32,
    text_name: u32,
    strtab_name: u32,
}

impl ObjectWriter {
    pub fn new(arch: u16) -> ObjectWriter {
        let mut strtab = StringTable::new();
        let text_name = strtab.intern(".text");
        let strtab_name = strtab.intern(".strtab");
        let mut buf = Vec::with_capacity(4096);
        // Header and both section headers start zeroed; finish() patches them.
        buf.resize(HEADER_SIZE + 2 * SECTION_HEADER_SIZE, 0);
        ObjectWriter {
            buf,
            strtab,
            version: (1, 0, 0),
            arch,
            flags: FLAG_LINKABLE,
            entrypoint: 0,
            text_name,
            strtab_name,
        }
    }

    /// File offset where the code section begins.
    pub fn code_start(&self) -> u32 {
        (HEADER_SIZE + 2 * SECTION_HEADER_SIZE) as u32
    }

    /// Current absolute file offset (the running byte counter).
    pub fn offset(&self) -> u32 {
        self.buf.len() as u32
    }

    /// Bytes of code emitted so far.
    pub fn code_size(&self) -> u32 {
        self.offset() - self.code_start()
    }

    pub fn version(&mut self, major: u8, minor: u8, patch: u8) {
        self.version = (major, minor, patch);
    }

    /// Record the entrypoint and mark the object executable.
    pub fn set_entrypoint(&mut self, offset: u32) {
        self.entrypoint = offset;
        self.flags |= FLAG_EXECUTABLE;
    }

    /// Intern a string into the object's string table.
    pub fn intern(&mut self, s: &str) -> u32 {
        self.strtab.intern(s)
    }

    /// Append one instruction to the code section.
    pub fn emit(&mut self, ins: &Instruction) {
        ins.encode(&mut self.buf);
    }

    pub fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn write_u16(&mut self, v: u16) {
        let mut b = [0u8; 2];
        LittleEndian::write_u16(&mut b, v);
        self.buf.extend_from_slice(&b);
    }

    pub fn write_u32(&mut self, v: u32) {
        let mut b = [0u8; 4];
        LittleEndian::write_u32(&mut b, v);
        self.buf.extend_from_slice(&b);
    }

    pub fn write_u64(&mut self, v: u64) {
        let mut b = [0u8; 8];
        LittleEndian::write_u64(&mut b, v);
        self.buf.extend_from_slice(&b);
    }

    pub fn write_i32(&mut self, v: i32) {
        self.write_u32(v as u32);
    }

    pub fn write_f32(&mut self, v: f32) {
        self.write_u32(v.to_bits());
    }

    pub fn write_f64(&mut self, v: f64) {
        self.write_u64(v.to_bits());
    }

    /// Overwrite a previously written 32-bit field.
    pub fn patch_u32(&mut self, pos: usize, v: u32) {
        LittleEndian::write_u32(&mut self.buf[pos..pos + 4], v);
    }

    /// Overwrite a previously written 16-bit field.
    pub fn patch_u16(&mut self, pos: usize, v: u16) {
        LittleEndian::write_u16(&mut self.buf[pos..pos + 2], v);
    }

    /// Append the string table, patch the header and section headers,
    /// and return the finished object bytes.
    pub fn finish(self) -> Vec<u8> {
        let code_offset = self.code_start();
        let code_size = self.code_size();
        let strtab_offset = self.buf.len() as u32;
        let strtab_size = self.strtab.size();

        let ObjectWriter {
            mut buf,
            strtab,
            version,
            arch,
            flags,
            entrypoint,
            text_name,
            strtab_name,
        } = self;

        buf.extend_from_slice(strtab.as_bytes());

        buf[0..4].copy_from_slice(&MAGIC);
        buf[OFF_VERSION] = version.0;
        buf[OFF_VERSION + 1] = version.1;
        buf[OFF_VERSION + 2] = version.2;
        buf[OFF_FLAGS] = flags;
        LittleEndian::write_u16(&mut buf[OFF_ARCH..OFF_ARCH + 2], arch);
        LittleEndian::write_u16(&mut buf[OFF_SECTION_COUNT..OFF_SECTION_COUNT + 2], 2);
        LittleEndian::write_u32(&mut buf[OFF_ENTRYPOINT..OFF_ENTRYPOINT + 4], entrypoint);
        LittleEndian::write_u32(&mut buf[OFF_STRTAB_OFFSET..OFF_STRTAB_OFFSET + 4], strtab_offset);
        LittleEndian::write_u32(&mut buf[OFF_STRTAB_SIZE..OFF_STRTAB_SIZE + 4], strtab_size);
        // Symbol-table fields stay zero: the section is reserved in v1.

        patch_section_header(
            &mut buf,
            HEADER_SIZE,
            &SectionFields {
                name_offset: text_name,
                kind: SECTION_CODE,
                flags: SECTION_FLAG_ALLOC | SECTION_FLAG_EXEC,
                offset: code_offset,
                size: code_size,
                align: 4,
            },
        );
        patch_section_header(
            &mut buf,
            HEADER_SIZE + SECTION_HEADER_SIZE,
            &SectionFields {
                name_offset: strtab_name,
                kind: SECTION_STRTAB,
                flags: SECTION_FLAG_STRINGS,
                offset: strtab_offset,
                size: strtab_size,
                align: 1,
            },
        );

        buf
    }
}

struct SectionFields {
    name_offset: u32,
    kind: u32,
    flags: u32,
    offset: u32,
    size: u32,
    align: u32,
}

fn patch_section_header(buf: &mut [u8], at: usize, f: &SectionFields) {
    let fields = [
        f.name_offset,
        f.kind,
        f.flags,
        f.offset,
        f.size,
        0, // link
        0, // info
        f.align,
        0, // entry size
    ];
    for (i, v) in fields.iter().enumerate() {
        LittleEndian::write_u32(&mut buf[at + i * 4..at + i * 4 + 4], *v);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instr::Operand;
    use crate::opcode::{Opcode, TYPE_INT};

    #[test]
    fn test_magic_at_offset_zero() {
        let bytes = ObjectWriter::new(ARCH_VIRT64).finish();
        assert_eq!(&bytes[0..4], &[0x43, 0x4F, 0x49, 0x4C]);
    }

    #[test]
    fn test_empty_object_layout() {
        let bytes = ObjectWriter::new(ARCH_VIRT64).finish();
        // Header, two section headers, no code, then the string table.
        assert_eq!(bytes[4], 1); // major version
        assert_eq!(bytes[7], FLAG_LINKABLE);
        assert_eq!(LittleEndian::read_u16(&bytes[8..10]), ARCH_VIRT64);
        assert_eq!(LittleEndian::read_u16(&bytes[10..12]), 2);
        assert_eq!(LittleEndian::read_u32(&bytes[12..16]), 0); // entrypoint
        let strtab_offset = LittleEndian::read_u32(&bytes[16..20]);
        assert_eq!(strtab_offset as usize, HEADER_SIZE + 2 * SECTION_HEADER_SIZE);
        let strtab_size = LittleEndian::read_u32(&bytes[20..24]);
        assert_eq!(bytes.len(), strtab_offset as usize + strtab_size as usize);
    }

    #[test]
    fn test_little_endian_round_trip() {
        let mut w = ObjectWriter::new(ARCH_VIRT64);
        let base = w.offset() as usize;
        w.write_u16(0xBEEF);
        w.write_u32(0xDEAD_BEEF);
        w.write_u64(0x0123_4567_89AB_CDEF);
        let bytes = w.finish();
        assert_eq!(LittleEndian::read_u16(&bytes[base..]), 0xBEEF);
        assert_eq!(LittleEndian::read_u32(&bytes[base + 2..]), 0xDEAD_BEEF);
        assert_eq!(
            LittleEndian::read_u64(&bytes[base + 6..]),
            0x0123_4567_89AB_CDEF
        );
    }

    #[test]
    fn test_float_bit_patterns() {
        let mut w = ObjectWriter::new(ARCH_VIRT64);
        let base = w.offset() as usize;
        w.write_f32(3.5);
        w.write_f64(-0.25);
        let bytes = w.finish();
        assert_eq!(LittleEndian::read_u32(&bytes[base..]), 3.5f32.to_bits());
        assert_eq!(LittleEndian::read_u64(&bytes[base + 4..]), (-0.25f64).to_bits());
    }

    #[test]
    fn test_entrypoint_patched() {
        let mut w = ObjectWriter::new(ARCH_VIRT64);
        let entry = w.offset();
        w.emit(&Instruction::new(
            Opcode::Movi,
            0,
            vec![Operand::reg(0, TYPE_INT, 4), Operand::imm(TYPE_INT, 4, 0)],
        ));
        w.set_entrypoint(entry);
        let bytes = w.finish();
        assert_eq!(LittleEndian::read_u32(&bytes[12..16]), entry);
        assert_eq!(bytes[7] & FLAG_EXECUTABLE, FLAG_EXECUTABLE);
    }

    #[test]
    fn test_code_section_header_describes_code() {
        let mut w = ObjectWriter::new(ARCH_VIRT64);
        w.emit(&Instruction::plain(Opcode::Nop));
        let code_size = w.code_size();
        let bytes = w.finish();
        let sh = &bytes[HEADER_SIZE..HEADER_SIZE + SECTION_HEADER_SIZE];
        assert_eq!(LittleEndian::read_u32(&sh[4..8]), SECTION_CODE);
        assert_eq!(
            LittleEndian::read_u32(&sh[12..16]),
            (HEADER_SIZE + 2 * SECTION_HEADER_SIZE) as u32
        );
        assert_eq!(LittleEndian::read_u32(&sh[16..20]), code_size);
    }
}
