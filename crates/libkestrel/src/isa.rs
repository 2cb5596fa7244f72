//! The 6502a instruction subset.

use std::fmt;

use serde::Serialize;

/// Bytes of addressable memory. Code, static data and the heap share it.
pub const MEMORY_SIZE: usize = 256;

/// Values of the X register understood by `SYS`.
pub mod syscall {
    /// Print the integer held in Y.
    pub const PRINT_INT: u8 = 0x01;
    /// Print the null-terminated string starting at the address held in Y.
    pub const PRINT_STR: u8 = 0x02;
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Opcode {
    LdaImm = 0xA9,
    LdaAbs = 0xAD,
    Sta = 0x8D,
    Adc = 0x6D,
    LdxImm = 0xA2,
    LdxAbs = 0xAE,
    LdyImm = 0xA0,
    LdyAbs = 0xAC,
    Cpx = 0xEC,
    Bne = 0xD0,
    Nop = 0xEA,
    Brk = 0x00,
    Sys = 0xFF,
}

impl Opcode {
    pub fn from_byte(byte: u8) -> Option<Self> {
        Some(match byte {
            0xA9 => Opcode::LdaImm,
            0xAD => Opcode::LdaAbs,
            0x8D => Opcode::Sta,
            0x6D => Opcode::Adc,
            0xA2 => Opcode::LdxImm,
            0xAE => Opcode::LdxAbs,
            0xA0 => Opcode::LdyImm,
            0xAC => Opcode::LdyAbs,
            0xEC => Opcode::Cpx,
            0xD0 => Opcode::Bne,
            0xEA => Opcode::Nop,
            0x00 => Opcode::Brk,
            0xFF => Opcode::Sys,
            _ => return None,
        })
    }

    /// Operand bytes following the opcode.
    pub fn operand_len(self) -> usize {
        match self {
            Opcode::LdaImm | Opcode::LdxImm | Opcode::LdyImm | Opcode::Bne => 1,
            Opcode::LdaAbs
            | Opcode::Sta
            | Opcode::Adc
            | Opcode::LdxAbs
            | Opcode::LdyAbs
            | Opcode::Cpx => 2,
            Opcode::Nop | Opcode::Brk | Opcode::Sys => 0,
        }
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::LdaImm | Opcode::LdaAbs => "LDA",
            Opcode::Sta => "STA",
            Opcode::Adc => "ADC",
            Opcode::LdxImm | Opcode::LdxAbs => "LDX",
            Opcode::LdyImm | Opcode::LdyAbs => "LDY",
            Opcode::Cpx => "CPX",
            Opcode::Bne => "BNE",
            Opcode::Nop => "NOP",
            Opcode::Brk => "BRK",
            Opcode::Sys => "SYS",
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02X}", *self as u8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcodes_round_trip_through_bytes() {
        let sample = [
            Opcode::LdaImm,
            Opcode::Sta,
            Opcode::Cpx,
            Opcode::Bne,
            Opcode::Brk,
            Opcode::Sys,
        ];
        for op in sample {
            assert_eq!(Opcode::from_byte(op as u8), Some(op));
        }
        assert_eq!(Opcode::from_byte(0x42), None);
        assert_eq!(Opcode::Adc.to_string(), "6D");
        assert_eq!(Opcode::Cpx.operand_len(), 2);
    }
}
