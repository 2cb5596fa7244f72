//! Slot lists produced by code generation and the final byte image.

use std::fmt;
use std::ops::Range;

use itertools::Itertools;
use serde::{Serialize, Serializer};

use crate::isa::{MEMORY_SIZE, Opcode};

/// Placeholder for the address of a static variable or scratch cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RefKey(pub usize);

/// Placeholder for a forward branch distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct JumpKey(pub usize);

impl fmt::Display for RefKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

impl fmt::Display for JumpKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "J{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Byte(u8),
    /// Inline data, not an instruction.
    Data(u8),
    Ref(RefKey),
    Jump(JumpKey),
}

impl From<Opcode> for Slot {
    fn from(op: Opcode) -> Self {
        Slot::Byte(op as u8)
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Slot::Byte(b) | Slot::Data(b) => write!(f, "{b:02X}"),
            Slot::Ref(key) => write!(f, "{key}"),
            Slot::Jump(key) => write!(f, "{key}"),
        }
    }
}

/// A fully resolved program: plain bytes, no placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ByteCode {
    bytes: Vec<u8>,
    /// Inline data inside the code area.
    data: Vec<Range<usize>>,
}

impl ByteCode {
    pub(crate) fn new(bytes: Vec<u8>) -> Self {
        ByteCode {
            bytes,
            data: Vec::new(),
        }
    }

    pub(crate) fn with_data(mut self, data: Vec<Range<usize>>) -> Self {
        self.data = data;
        self
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// The program loaded into a zeroed memory.
    pub fn image(&self) -> [u8; MEMORY_SIZE] {
        let mut memory = [0u8; MEMORY_SIZE];
        for (cell, byte) in memory.iter_mut().zip(&self.bytes) {
            *cell = *byte;
        }
        memory
    }

    pub fn to_hex(&self) -> String {
        self.image().iter().map(|b| format!("{b:02X}")).join(" ")
    }

    /// One line per instruction of the code area, with branch targets
    /// written as absolute addresses.
    pub fn disassemble(&self) -> Vec<String> {
        let mut lines = Vec::new();
        let mut pc = 0;
        while pc < self.bytes.len() {
            let end = match self.data.iter().find(|range| range.start == pc) {
                Some(range) => range.end.min(self.bytes.len()),
                None => match Opcode::from_byte(self.bytes[pc]) {
                    Some(op) => (pc + 1 + op.operand_len()).min(self.bytes.len()),
                    None => pc + 1,
                },
            };
            lines.push(self.line_at(pc, end));
            pc = end;
        }
        lines
    }

    fn line_at(&self, pc: usize, end: usize) -> String {
        let raw = &self.bytes[pc..end];
        let hex = raw.iter().map(|b| format!("{b:02X}")).join(" ");
        let is_data = self.data.iter().any(|range| range.start == pc);

        let text = match (Opcode::from_byte(raw[0]), &raw[1..]) {
            _ if is_data => {
                let text: String = raw
                    .iter()
                    .take_while(|b| **b != 0)
                    .map(|b| char::from(*b))
                    .collect();
                format!(".DB \"{text}\", $00")
            }
            (Some(op @ (Opcode::LdaImm | Opcode::LdxImm | Opcode::LdyImm)), [value]) => {
                format!("{} #${value:02X}", op.mnemonic())
            }
            (Some(Opcode::Bne), [distance]) => {
                let target = (end + usize::from(*distance)) % MEMORY_SIZE;
                format!("BNE ${target:02X}")
            }
            (Some(op), [low, high]) => format!("{} ${high:02X}{low:02X}", op.mnemonic()),
            (Some(op), []) => op.mnemonic().to_owned(),
            _ => format!(".DB ${:02X}", raw[0]),
        };
        format!("{pc:02X}  {hex:<8}  {text}")
    }
}

/// Eight bytes per row, the whole memory image.
impl fmt::Display for ByteCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let image = self.image();
        let rows = image
            .chunks(8)
            .map(|row| row.iter().map(|b| format!("{b:02X}")).join(" "))
            .join("\n");
        f.write_str(&rows)
    }
}

impl Serialize for ByteCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}
