//! Instruction and operand framing.
//!
//! Every instruction is `opcode:u8, qualifier:u8, operand-count:u8`
//! followed by the operands. Each operand is a qualifier byte, a type
//! byte, a width byte, and a kind-specific payload:
//!
//! | Operand   | Qualifier | Payload                      |
//! |-----------|-----------|------------------------------|
//! | immediate | 0x01      | `width` bytes, little-endian |
//! | variable  | 0x02      | u32 variable id              |
//! | register  | 0x03      | u32 register id              |
//! | memory    | 0x04      | u8 base register + i32 offset|
//! | label     | 0x05      | i32 label id                 |
//! | string    | 0x06      | u32 string-table offset      |
//! | symbol    | 0x07      | u32 string-table offset      |

use byteorder::{ByteOrder, LittleEndian};

use crate::opcode::{Opcode, TYPE_PTR, TYPE_VOID};
use crate::ObjectError;

const QUAL_IMM: u8 = 0x01;
const QUAL_VAR: u8 = 0x02;
const QUAL_REG: u8 = 0x03;
const QUAL_MEM: u8 = 0x04;
const QUAL_LABEL: u8 = 0x05;
const QUAL_STR: u8 = 0x06;
const QUAL_SYM: u8 = 0x07;

/// The payload of an operand, without its type/width bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandKind {
    /// Immediate value; the low `width` bytes are encoded. Floats are
    /// carried as their IEEE-754 bit pattern.
    Imm(u64),
    /// A declared variable, by id.
    Var(u32),
    /// A virtual register, by id.
    Reg(u32),
    /// A memory reference: base register plus signed displacement.
    Mem { base: u8, offset: i32 },
    /// A code label, by id.
    Label(i32),
    /// A string-literal reference into the string table.
    Str(u32),
    /// A named symbol, as a string-table offset.
    Sym(u32),
}

/// One instruction operand: payload plus its type and width bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Operand {
    pub kind: OperandKind,
    pub ty: u8,
    pub width: u8,
}

impl Operand {
    pub fn imm(ty: u8, width: u8, bits: u64) -> Operand {
        Operand {
            kind: OperandKind::Imm(bits),
            ty,
            width,
        }
    }

    pub fn var(id: u32, ty: u8, width: u8) -> Operand {
        Operand {
            kind: OperandKind::Var(id),
            ty,
            width,
        }
    }

    pub fn reg(id: u32, ty: u8, width: u8) -> Operand {
        Operand {
            kind: OperandKind::Reg(id),
            ty,
            width,
        }
    }

    pub fn mem(base: u8, offset: i32, ty: u8, width: u8) -> Operand {
        Operand {
            kind: OperandKind::Mem { base, offset },
            ty,
            width,
        }
    }

    pub fn label(id: i32) -> Operand {
        Operand {
            kind: OperandKind::Label(id),
            ty: TYPE_VOID,
            width: 0,
        }
    }

    pub fn strref(offset: u32, word_size: u8) -> Operand {
        Operand {
            kind: OperandKind::Str(offset),
            ty: TYPE_PTR,
            width: word_size,
        }
    }

    pub fn sym(offset: u32) -> Operand {
        Operand {
            kind: OperandKind::Sym(offset),
            ty: TYPE_VOID,
            width: 0,
        }
    }

    fn qualifier(&self) -> u8 {
        match self.kind {
            OperandKind::Imm(_) => QUAL_IMM,
            OperandKind::Var(_) => QUAL_VAR,
            OperandKind::Reg(_) => QUAL_REG,
            OperandKind::Mem { .. } => QUAL_MEM,
            OperandKind::Label(_) => QUAL_LABEL,
            OperandKind::Str(_) => QUAL_STR,
            OperandKind::Sym(_) => QUAL_SYM,
        }
    }

    /// Append the wire form of this operand.
    pub fn encode(&self, buf: &mut Vec<u8>) {
        buf.push(self.qualifier());
        buf.push(self.ty);
        buf.push(self.width);
        match self.kind {
            OperandKind::Imm(bits) => {
                for i in 0..self.width {
                    buf.push((bits >> (8 * i as u32)) as u8);
                }
            }
            OperandKind::Var(id) | OperandKind::Reg(id) => push_u32(buf, id),
            OperandKind::Mem { base, offset } => {
                buf.push(base);
                push_u32(buf, offset as u32);
            }
            OperandKind::Label(id) => push_u32(buf, id as u32),
            OperandKind::Str(offset) | OperandKind::Sym(offset) => push_u32(buf, offset),
        }
    }

    fn decode(r: &mut ByteReader<'_>) -> Result<Operand, ObjectError> {
        let qualifier = r.u8()?;
        let ty = r.u8()?;
        let width = r.u8()?;
        let kind = match qualifier {
            QUAL_IMM => {
                if width > 8 {
                    return Err(ObjectError::InvalidWidth(width));
                }
                let mut bits: u64 = 0;
                for i in 0..width {
                    bits |= (r.u8()? as u64) << (8 * i as u32);
                }
                OperandKind::Imm(bits)
            }
            QUAL_VAR => OperandKind::Var(r.u32()?),
            QUAL_REG => OperandKind::Reg(r.u32()?),
            QUAL_MEM => OperandKind::Mem {
                base: r.u8()?,
                offset: r.u32()? as i32,
            },
            QUAL_LABEL => OperandKind::Label(r.u32()? as i32),
            QUAL_STR => OperandKind::Str(r.u32()?),
            QUAL_SYM => OperandKind::Sym(r.u32()?),
            other => return Err(ObjectError::UnknownOperandQualifier(other)),
        };
        Ok(Operand { kind, ty, width })
    }
}

/// A decoded (or to-be-encoded) instruction.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub opcode: Opcode,
    pub qualifier: u8,
    pub operands: Vec<Operand>,
}

impl Instruction {
    pub fn new(opcode: Opcode, qualifier: u8, operands: Vec<Operand>) -> Instruction {
        debug_assert!(operands.len() <= u8::MAX as usize);
        Instruction {
            opcode,
            qualifier,
            operands,
        }
    }

    /// An instruction with qualifier 0 and no operands (`RET`, `VARSC`, …).
    pub fn plain(opcode: Opcode) -> Instruction {
        Instruction::new(opcode, 0, Vec::new())
    }

    /// Append the wire form of this instruction.
    pub fn encode(&self, buf: &mut Vec<u8>) {
        buf.push(self.opcode as u8);
        buf.push(self.qualifier);
        buf.push(self.operands.len() as u8);
        for operand in &self.operands {
            operand.encode(buf);
        }
    }

    /// Decode one instruction starting at `*pos`, advancing `*pos` past it.
    pub fn decode(data: &[u8], pos: &mut usize) -> Result<Instruction, ObjectError> {
        let mut r = ByteReader {
            data,
            pos: *pos,
        };
        let opcode_byte = r.u8()?;
        let opcode = Opcode::from_u8(opcode_byte).ok_or(ObjectError::UnknownOpcode(opcode_byte))?;
        let qualifier = r.u8()?;
        let count = r.u8()?;
        let mut operands = Vec::with_capacity(count as usize);
        for _ in 0..count {
            operands.push(Operand::decode(&mut r)?);
        }
        *pos = r.pos;
        Ok(Instruction {
            opcode,
            qualifier,
            operands,
        })
    }

    /// Decode an entire code buffer into its instruction sequence.
    pub fn decode_all(data: &[u8]) -> Result<Vec<Instruction>, ObjectError> {
        let mut pos = 0;
        let mut out = Vec::new();
        while pos < data.len() {
            out.push(Instruction::decode(data, &mut pos)?);
        }
        Ok(out)
    }
}

fn push_u32(buf: &mut Vec<u8>, v: u32) {
    let mut b = [0u8; 4];
    LittleEndian::write_u32(&mut b, v);
    buf.extend_from_slice(&b);
}

struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl ByteReader<'_> {
    fn u8(&mut self) -> Result<u8, ObjectError> {
        let b = *self.data.get(self.pos).ok_or(ObjectError::Truncated {
            offset: self.pos,
            needed: 1,
        })?;
        self.pos += 1;
        Ok(b)
    }

    fn u32(&mut self) -> Result<u32, ObjectError> {
        if self.pos + 4 > self.data.len() {
            return Err(ObjectError::Truncated {
                offset: self.pos,
                needed: 4,
            });
        }
        let v = LittleEndian::read_u32(&self.data[self.pos..self.pos + 4]);
        self.pos += 4;
        Ok(v)
    }
}
