//! A model of the 6502a, enough to run what the code generator emits.

use crate::bytecode::ByteCode;
use crate::error::VmError;
use crate::isa::{MEMORY_SIZE, Opcode, syscall};

pub const DEFAULT_STEP_LIMIT: usize = 100_000;

#[derive(Debug, Clone)]
pub struct Machine {
    memory: [u8; MEMORY_SIZE],
    pc: u8,
    acc: u8,
    x: u8,
    y: u8,
    zero: bool,
    output: String,
    steps: usize,
    step_limit: usize,
}

impl Machine {
    pub fn new(code: &ByteCode) -> Self {
        Machine {
            memory: code.image(),
            pc: 0,
            acc: 0,
            x: 0,
            y: 0,
            zero: false,
            output: String::new(),
            steps: 0,
            step_limit: DEFAULT_STEP_LIMIT,
        }
    }

    pub fn with_step_limit(mut self, step_limit: usize) -> Self {
        self.step_limit = step_limit;
        self
    }

    /// Run until `BRK`, returning everything printed.
    pub fn run(&mut self) -> Result<&str, VmError> {
        while self.step()? {}
        tracing::debug!(steps = self.steps, "machine halted");
        Ok(&self.output)
    }

    /// Execute one instruction. Returns `false` once halted.
    pub fn step(&mut self) -> Result<bool, VmError> {
        if self.steps >= self.step_limit {
            return Err(VmError::StepLimit(self.step_limit));
        }
        self.steps += 1;

        let address = self.pc;
        let byte = self.fetch();
        let op = Opcode::from_byte(byte).ok_or(VmError::InvalidOpcode { byte, address })?;
        match op {
            Opcode::LdaImm => self.acc = self.fetch(),
            Opcode::LdaAbs => {
                let at = self.address()?;
                self.acc = self.load(at);
            }
            Opcode::Sta => {
                let at = self.address()?;
                self.memory[usize::from(at)] = self.acc;
            }
            Opcode::Adc => {
                let at = self.address()?;
                self.acc = self.acc.wrapping_add(self.load(at));
            }
            Opcode::LdxImm => self.x = self.fetch(),
            Opcode::LdxAbs => {
                let at = self.address()?;
                self.x = self.load(at);
            }
            Opcode::LdyImm => self.y = self.fetch(),
            Opcode::LdyAbs => {
                let at = self.address()?;
                self.y = self.load(at);
            }
            Opcode::Cpx => {
                let at = self.address()?;
                self.zero = self.x == self.load(at);
            }
            Opcode::Bne => {
                let distance = self.fetch();
                if !self.zero {
                    self.pc = self.pc.wrapping_add(distance);
                }
            }
            Opcode::Nop => {}
            Opcode::Brk => return Ok(false),
            Opcode::Sys => self.syscall()?,
        }
        Ok(true)
    }

    fn fetch(&mut self) -> u8 {
        let byte = self.memory[usize::from(self.pc)];
        self.pc = self.pc.wrapping_add(1);
        byte
    }

    /// Little endian absolute operand. The high byte must be zero.
    fn address(&mut self) -> Result<u8, VmError> {
        let address = self.pc;
        let low = self.fetch();
        let high = self.fetch();
        if high != 0 {
            return Err(VmError::AddressOutOfRange { address, low, high });
        }
        Ok(low)
    }

    fn load(&self, address: u8) -> u8 {
        self.memory[usize::from(address)]
    }

    fn syscall(&mut self) -> Result<(), VmError> {
        match self.x {
            syscall::PRINT_INT => self.output.push_str(&self.y.to_string()),
            syscall::PRINT_STR => {
                let text: String = self.memory[usize::from(self.y)..]
                    .iter()
                    .take_while(|b| **b != 0)
                    .map(|b| char::from(*b))
                    .collect();
                self.output.push_str(&text);
            }
            other => return Err(VmError::InvalidSyscall(other)),
        }
        Ok(())
    }
}
