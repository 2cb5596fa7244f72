//! Code generation for the 6502a.
//!
//! A single depth-first walk emits a slot list in which static addresses
//! and forward branch distances are placeholders. [`backpatch`] then lays
//! out the static area right after the code and resolves everything.
//!
//! Memory layout of a generated program:
//!
//! ```text
//! 00 ........ code ........ BRK | statics | free | heap (strings) FF
//! ```
//!
//! Scratch cells `temp0`, `temp1`, ... are statics indexed by expression
//! nesting depth. An evaluation at depth `d` only writes cells `>= d`.

pub mod backpatch;
pub mod tables;

use std::collections::{HashMap, HashSet};
use std::iter;

use anyhow::{Context, anyhow};
use kestrel_syntax::ast::{Block, Expr, Ident, Operand, Program, Stmt};
use kestrel_syntax::diagnostics::{Diagnostic, DiagnosticKind, Reporter, Tally};
use kestrel_syntax::symbols::{Entry, SymbolId, SymbolTable};
use kestrel_syntax::token::{Op, Type};

pub use self::backpatch::backpatch;
use self::tables::{JumpTable, ReferenceTable};
use crate::bytecode::{ByteCode, JumpKey, RefKey, Slot};
use crate::error::CodeGenError;
use crate::isa::{MEMORY_SIZE, Opcode, syscall};

pub fn generate(
    program: &Program,
    symbols: &SymbolTable,
    reporter: &mut dyn Reporter,
) -> Result<ByteCode, CodeGenError> {
    let mut generator = Generator {
        symbols,
        slots: Vec::new(),
        refs: ReferenceTable::new(),
        jumps: JumpTable::new(),
        capacities: heap_capacities(program, symbols),
        tally: Tally::new(reporter),
    };
    generator.tally.trace("Generating code...");
    generator.stmt(&program.body)?;
    generator.emit(Opcode::Brk);
    generator.finish()
}

struct Generator<'a, 'r> {
    symbols: &'a SymbolTable,
    slots: Vec<Slot>,
    refs: ReferenceTable,
    jumps: JumpTable,
    /// Heap bytes reserved per string variable, terminator included.
    capacities: HashMap<SymbolId, usize>,
    tally: Tally<'r>,
}

impl<'a> Generator<'a, '_> {
    fn emit(&mut self, op: Opcode) {
        self.slots.push(op.into());
    }

    fn emit_byte(&mut self, op: Opcode, byte: u8) {
        self.slots.extend([op.into(), Slot::Byte(byte)]);
    }

    fn emit_ref(&mut self, op: Opcode, key: RefKey) {
        self.slots.extend([op.into(), Slot::Ref(key), Slot::Byte(0x00)]);
    }

    fn emit_abs(&mut self, op: Opcode, address: u8) {
        self.slots.extend([op.into(), Slot::Byte(address), Slot::Byte(0x00)]);
    }

    fn emit_branch(&mut self) -> JumpKey {
        self.emit(Opcode::Bne);
        let key = self.jumps.open(self.slots.len());
        self.slots.push(Slot::Jump(key));
        key
    }

    /// Emit the `NOP` a forward branch lands on.
    fn land(&mut self, key: JumpKey) {
        self.jumps.land(key, self.slots.len());
        self.emit(Opcode::Nop);
    }

    /// Compare 0 with 1 so the following `BNE` is always taken.
    fn false_comparison(&mut self) {
        let temp = self.refs.scratch(0);
        self.emit_byte(Opcode::LdaImm, 0x01);
        self.emit_ref(Opcode::Sta, temp);
        self.emit_byte(Opcode::LdxImm, 0x00);
        self.emit_ref(Opcode::Cpx, temp);
    }

    fn out_of_memory(&mut self, required: usize, available: usize) -> CodeGenError {
        self.tally.error(Diagnostic::new(
            DiagnosticKind::OutOfMemory,
            format!("program needs {required} bytes but only {available} are available"),
        ));
        self.tally.failure("Code generation failed!");
        CodeGenError::OutOfMemory { required, available }
    }

    fn entry(&self, ident: &Ident) -> Result<(SymbolId, &'a Entry), CodeGenError> {
        let symbol = ident.symbol.ok_or_else(|| {
            anyhow!(
                "identifier '{}' on line {} is not bound to a symbol",
                ident.name,
                ident.line
            )
        })?;
        let entry = self
            .symbols
            .get(symbol)
            .with_context(|| format!("identifier '{}' points at a missing symbol", ident.name))?;
        Ok((symbol, entry))
    }

    fn static_ref(&mut self, ident: &Ident) -> Result<RefKey, CodeGenError> {
        let (symbol, entry) = self.entry(ident)?;
        if !entry.ty.is_static() {
            let message = anyhow!("'{}' is a {} and has no static address", ident.name, entry.ty);
            return Err(message.into());
        }
        Ok(self.refs.static_for(symbol, entry))
    }

    fn heap_region(&mut self, ident: &Ident) -> Result<(u8, usize), CodeGenError> {
        let (symbol, entry) = self.entry(ident)?;
        if entry.ty != Type::String {
            return Err(anyhow!("'{}' is a {} and has no heap region", ident.name, entry.ty).into());
        }
        let capacity = self.capacities.get(&symbol).copied().unwrap_or(1);
        match self.refs.heap_for(symbol, entry, capacity) {
            Some(region) => Ok(region),
            None => {
                let required = MEMORY_SIZE - self.refs.heap_bottom() + capacity;
                Err(self.out_of_memory(required, MEMORY_SIZE))
            }
        }
    }

    fn stmt(&mut self, stmt: &Stmt) -> Result<(), CodeGenError> {
        match stmt {
            Stmt::Block(block) => self.block(block)?,
            Stmt::VarDecl { ty, ident } => {
                if ty.is_static() {
                    let key = self.static_ref(ident)?;
                    self.emit_byte(Opcode::LdaImm, 0x00);
                    self.emit_ref(Opcode::Sta, key);
                } else {
                    self.heap_region(ident)?;
                }
            }
            Stmt::Assign { target, value, line } => {
                self.tally
                    .trace(format!("Generating assignment to '{}' on line {line}", target.name));
                self.assign(target, value)?;
            }
            Stmt::Print { expr, line } => {
                self.tally.trace(format!("Generating print on line {line}"));
                self.print(expr)?;
            }
            Stmt::If { cond, body, .. } => {
                self.condition(cond)?;
                let exit = self.emit_branch();
                self.block(body)?;
                self.land(exit);
            }
            Stmt::While { cond, body, .. } => {
                let start = self.slots.len();
                self.condition(cond)?;
                let exit = self.emit_branch();
                self.block(body)?;

                self.false_comparison();
                self.emit(Opcode::Bne);
                let operand = self.slots.len();
                let back = (MEMORY_SIZE + start).saturating_sub(operand + 1) % MEMORY_SIZE;
                self.slots.push(Slot::Byte(back as u8));
                self.land(exit);
            }
        }
        Ok(())
    }

    fn block(&mut self, block: &Block) -> Result<(), CodeGenError> {
        for stmt in &block.stmts {
            self.stmt(stmt)?;
        }
        Ok(())
    }

    fn assign(&mut self, target: &Ident, value: &Expr) -> Result<(), CodeGenError> {
        let (symbol, entry) = self.entry(target)?;
        if entry.ty == Type::String {
            return self.assign_string(target, value);
        }

        let key = self.static_ref(target)?;
        if value.is_compound() && value.reads(symbol) {
            let temp = self.refs.scratch(0);
            self.eval_into(value, temp, 1)?;
            self.emit_ref(Opcode::LdaAbs, temp);
            self.emit_ref(Opcode::Sta, key);
            Ok(())
        } else {
            self.eval_into(value, key, 0)
        }
    }

    /// A literal is stored with one `LDA # / STA` pair per byte, terminator
    /// included. Another string variable is copied at run time, byte by
    /// byte over the whole of its region.
    fn assign_string(&mut self, target: &Ident, value: &Expr) -> Result<(), CodeGenError> {
        let (address, capacity) = self.heap_region(target)?;
        match value {
            Expr::StringLiteral(text) => {
                if text.len() + 1 > capacity {
                    return Err(anyhow!(
                        "'{text}' does not fit the {capacity} bytes reserved for '{}'",
                        target.name
                    )
                    .into());
                }
                for (offset, byte) in text.bytes().chain(iter::once(0x00)).enumerate() {
                    self.emit_byte(Opcode::LdaImm, byte);
                    self.emit_abs(Opcode::Sta, heap_cell(address, offset)?);
                }
            }
            Expr::Ident(source) => {
                let (from, length) = self.heap_region(source)?;
                if length > capacity {
                    return Err(anyhow!(
                        "'{}' needs {length} bytes but '{}' only has {capacity}",
                        source.name,
                        target.name
                    )
                    .into());
                }
                for offset in 0..length {
                    self.emit_abs(Opcode::LdaAbs, heap_cell(from, offset)?);
                    self.emit_abs(Opcode::Sta, heap_cell(address, offset)?);
                }
            }
            other => {
                return Err(anyhow!("cannot store '{other}' in string '{}'", target.name).into());
            }
        }
        Ok(())
    }

    fn print(&mut self, expr: &Expr) -> Result<(), CodeGenError> {
        match expr {
            Expr::Ident(ident) => {
                let (_, entry) = self.entry(ident)?;
                if entry.ty == Type::String {
                    let (address, _) = self.heap_region(ident)?;
                    self.emit_byte(Opcode::LdxImm, syscall::PRINT_STR);
                    self.emit_byte(Opcode::LdyImm, address);
                } else {
                    let key = self.static_ref(ident)?;
                    self.emit_byte(Opcode::LdxImm, syscall::PRINT_INT);
                    self.emit_ref(Opcode::LdyAbs, key);
                }
                self.emit(Opcode::Sys);
            }
            Expr::StringLiteral(text) => self.print_literal(text)?,
            other => {
                let temp = self.refs.scratch(0);
                self.eval_into(other, temp, 1)?;
                self.emit_byte(Opcode::LdxImm, syscall::PRINT_INT);
                self.emit_ref(Opcode::LdyAbs, temp);
                self.emit(Opcode::Sys);
            }
        }
        Ok(())
    }

    /// The literal is placed inline, right after a branch that always
    /// jumps over it.
    fn print_literal(&mut self, text: &str) -> Result<(), CodeGenError> {
        self.emit_byte(Opcode::LdxImm, syscall::PRINT_STR);
        self.emit(Opcode::LdyImm);
        let operand = self.slots.len();
        self.slots.push(Slot::Byte(0x00));
        self.emit(Opcode::Sys);
        self.false_comparison();

        let len = text.len() + 1;
        self.emit(Opcode::Bne);
        let start = self.slots.len() + 1;
        let (Ok(skip), Ok(address)) = (u8::try_from(len), u8::try_from(start)) else {
            return Err(self.out_of_memory(start + len, MEMORY_SIZE));
        };
        self.slots.push(Slot::Byte(skip));
        self.slots[operand] = Slot::Byte(address);
        self.slots.extend(text.bytes().chain(iter::once(0x00)).map(Slot::Data));
        Ok(())
    }

    /// Evaluate an int or boolean expression and store it at `dest`.
    fn eval_into(&mut self, expr: &Expr, dest: RefKey, depth: usize) -> Result<(), CodeGenError> {
        match expr {
            Expr::IntLiteral(n) => {
                self.emit_byte(Opcode::LdaImm, *n);
                self.emit_ref(Opcode::Sta, dest);
            }
            Expr::BoolLiteral(b) => {
                self.emit_byte(Opcode::LdaImm, u8::from(*b));
                self.emit_ref(Opcode::Sta, dest);
            }
            Expr::Ident(ident) => {
                let key = self.static_ref(ident)?;
                self.emit_ref(Opcode::LdaAbs, key);
                self.emit_ref(Opcode::Sta, dest);
            }
            Expr::IntExpr { .. } => self.accumulate(expr, dest)?,
            Expr::Equality { lhs, rhs } => {
                self.compare(lhs, rhs, depth)?;
                // LDA leaves Z alone: 0 if the branch skips the 1
                self.emit_byte(Opcode::LdaImm, 0x00);
                self.emit_byte(Opcode::Bne, 0x02);
                self.emit_byte(Opcode::LdaImm, 0x01);
                self.emit_ref(Opcode::Sta, dest);
            }
            Expr::StringLiteral(text) => {
                let message = anyhow!("string \"{text}\" used where a byte value was expected");
                return Err(message.into());
            }
        }
        Ok(())
    }

    /// Sum the terms of an int expression left to right into `dest`.
    /// Subtracting a digit adds its two's complement.
    fn accumulate(&mut self, expr: &Expr, dest: RefKey) -> Result<(), CodeGenError> {
        for (index, (op, operand)) in expr.int_operands().into_iter().enumerate() {
            match operand {
                Operand::Digit(n) => {
                    let n = if op == Op::Sub { n.wrapping_neg() } else { n };
                    self.emit_byte(Opcode::LdaImm, n);
                }
                Operand::Ident(ident) if op == Op::Add => {
                    let key = self.static_ref(ident)?;
                    self.emit_ref(Opcode::LdaAbs, key);
                }
                Operand::Ident(ident) => {
                    return Err(anyhow!("cannot subtract variable '{}'", ident.name).into());
                }
                Operand::Other(other) => {
                    return Err(anyhow!("'{other}' is not an int operand").into());
                }
            }
            if index > 0 {
                self.emit_ref(Opcode::Adc, dest);
            }
            self.emit_ref(Opcode::Sta, dest);
        }
        Ok(())
    }

    /// Leave Z set iff `lhs == rhs`: right side in memory, left side in X.
    fn compare(&mut self, lhs: &Expr, rhs: &Expr, depth: usize) -> Result<(), CodeGenError> {
        let right = match rhs {
            Expr::Ident(ident) => self.static_ref(ident)?,
            other => {
                let temp = self.refs.scratch(depth);
                self.eval_into(other, temp, depth + 1)?;
                temp
            }
        };

        match lhs {
            Expr::Ident(ident) => {
                let key = self.static_ref(ident)?;
                self.emit_ref(Opcode::LdxAbs, key);
            }
            Expr::IntLiteral(n) => self.emit_byte(Opcode::LdxImm, *n),
            Expr::BoolLiteral(b) => self.emit_byte(Opcode::LdxImm, u8::from(*b)),
            other => {
                let temp = self.refs.scratch(depth + 1);
                self.eval_into(other, temp, depth + 2)?;
                self.emit_ref(Opcode::LdxAbs, temp);
            }
        }

        self.emit_ref(Opcode::Cpx, right);
        Ok(())
    }

    fn condition(&mut self, cond: &Expr) -> Result<(), CodeGenError> {
        match cond {
            Expr::Equality { lhs, rhs } => self.compare(lhs, rhs, 0),
            Expr::BoolLiteral(b) => {
                // compared against true
                let temp = self.refs.scratch(0);
                self.emit_byte(Opcode::LdaImm, 0x01);
                self.emit_ref(Opcode::Sta, temp);
                self.emit_byte(Opcode::LdxImm, u8::from(*b));
                self.emit_ref(Opcode::Cpx, temp);
                Ok(())
            }
            other => Err(anyhow!("'{other}' is not a condition").into()),
        }
    }

    fn finish(mut self) -> Result<ByteCode, CodeGenError> {
        let required = self.slots.len() + self.refs.static_count();
        let available = self.refs.heap_bottom();
        if required > available {
            return Err(self.out_of_memory(required, available));
        }

        let code = backpatch(&self.slots, &self.refs, &self.jumps)?;
        tracing::debug!(
            code = self.slots.len(),
            statics = self.refs.static_count(),
            heap = MEMORY_SIZE - available,
            jumps = self.jumps.len(),
            "code generation finished"
        );
        tracing::trace!("reference table\n{}", self.refs);
        self.tally.success("Code generation successful!");
        Ok(code)
    }
}

fn heap_cell(region: u8, offset: usize) -> Result<u8, CodeGenError> {
    let cell = u8::try_from(usize::from(region) + offset).context("heap region runs past memory")?;
    Ok(cell)
}

/// Heap bytes each string variable needs: its longest literal plus the
/// terminator, and at least as much as any variable copied into it.
fn heap_capacities(program: &Program, symbols: &SymbolTable) -> HashMap<SymbolId, usize> {
    let mut own = HashMap::new();
    let mut sources: HashMap<SymbolId, Vec<SymbolId>> = HashMap::new();
    collect_string_stores(&program.body, &mut own, &mut sources);

    symbols
        .iter()
        .filter(|(_, entry)| entry.ty == Type::String)
        .map(|(symbol, _)| {
            let mut visited = HashSet::new();
            (symbol, capacity_of(symbol, &own, &sources, &mut visited))
        })
        .collect()
}

fn collect_string_stores(
    stmt: &Stmt,
    own: &mut HashMap<SymbolId, usize>,
    sources: &mut HashMap<SymbolId, Vec<SymbolId>>,
) {
    match stmt {
        Stmt::Block(block) | Stmt::While { body: block, .. } | Stmt::If { body: block, .. } => {
            for stmt in &block.stmts {
                collect_string_stores(stmt, own, sources);
            }
        }
        Stmt::Assign {
            target: Ident {
                symbol: Some(target), ..
            },
            value,
            ..
        } => match value {
            Expr::StringLiteral(text) => {
                let size = own.entry(*target).or_insert(1);
                *size = (*size).max(text.len() + 1);
            }
            Expr::Ident(Ident {
                symbol: Some(source), ..
            }) => sources.entry(*target).or_default().push(*source),
            _ => {}
        },
        _ => {}
    }
}

fn capacity_of(
    symbol: SymbolId,
    own: &HashMap<SymbolId, usize>,
    sources: &HashMap<SymbolId, Vec<SymbolId>>,
    visited: &mut HashSet<SymbolId>,
) -> usize {
    if !visited.insert(symbol) {
        return 1;
    }
    let mut capacity = own.get(&symbol).copied().unwrap_or(1);
    for source in sources.get(&symbol).into_iter().flatten() {
        capacity = capacity.max(capacity_of(*source, own, sources, visited));
    }
    capacity
}

#[cfg(test)]
mod tests {
    use kestrel_syntax::diagnostics::Diagnostics;
    use kestrel_syntax::{lex, parse};

    use super::*;

    fn generate_source(source: &str) -> (Result<ByteCode, CodeGenError>, Diagnostics) {
        let mut diagnostics = Diagnostics::new();
        let tokens = lex(source, &mut diagnostics).unwrap();
        let tree = parse(&tokens, &mut diagnostics).unwrap();
        let result = generate(&tree.ast, &tree.symbols, &mut diagnostics);
        (result, diagnostics)
    }

    #[test]
    fn test_declare_assign_print() {
        let (result, _) = generate_source("{ int a a = 3 print(a) } $");
        assert_eq!(
            result.unwrap().bytes(),
            &[
                0xA9, 0x00, 0x8D, 0x11, 0x00, // int a
                0xA9, 0x03, 0x8D, 0x11, 0x00, // a = 3
                0xA2, 0x01, 0xAC, 0x11, 0x00, 0xFF, // print(a)
                0x00,
            ]
        );
    }

    #[test]
    fn test_subtraction_adds_twos_complement() {
        let (result, _) = generate_source("{ int a a = 5 - 3 print(a) } $");
        let code = result.unwrap();
        // LDA #05 STA a, LDA #FD ADC a STA a
        assert_eq!(
            &code.bytes()[5..18],
            &[0xA9, 0x05, 0x8D, 0x19, 0x00, 0xA9, 0xFD, 0x6D, 0x19, 0x00, 0x8D, 0x19, 0x00]
        );
    }

    #[test]
    fn test_strings_live_at_the_top_of_memory() {
        let (result, _) = generate_source("{ string s s = \"hi\" print(s) } $");
        let code = result.unwrap();
        // "hi\0" is packed against the end of memory
        assert_eq!(
            code.bytes(),
            &[
                0xA9, b'h', 0x8D, 0xFD, 0x00, //
                0xA9, b'i', 0x8D, 0xFE, 0x00, //
                0xA9, 0x00, 0x8D, 0xFF, 0x00, //
                0xA2, 0x02, 0xA0, 0xFD, 0xFF, //
                0x00,
            ]
        );
    }

    #[test]
    fn test_string_copy_reads_the_source_region() {
        let (result, _) = generate_source("{ string s string t s = \"a\" t = s } $");
        assert_eq!(
            result.unwrap().bytes(),
            &[
                0xA9, b'a', 0x8D, 0xFE, 0x00, //
                0xA9, 0x00, 0x8D, 0xFF, 0x00, //
                0xAD, 0xFE, 0x00, 0x8D, 0xFC, 0x00, //
                0xAD, 0xFF, 0x00, 0x8D, 0xFD, 0x00, //
                0x00,
            ]
        );
    }

    #[test]
    fn test_copy_reserves_enough_room() {
        let mut diagnostics = Diagnostics::new();
        let source = "{ string s string t s = \"long one\" t = s print(t) } $";
        let tokens = lex(source, &mut diagnostics).unwrap();
        let tree = parse(&tokens, &mut diagnostics).unwrap();
        let capacities = heap_capacities(&tree.ast, &tree.symbols);
        assert_eq!(
            capacities.values().copied().collect::<HashSet<_>>(),
            HashSet::from([9])
        );
    }

    #[test]
    fn test_literal_print_is_inline_data() {
        let (result, _) = generate_source("{ print(\"hi\") } $");
        let listing = result.unwrap().disassemble();
        let data = listing
            .iter()
            .position(|line| line.ends_with(".DB \"hi\", $00"))
            .unwrap();
        assert!(listing[data - 1].contains("BNE"));
        assert!(listing[1].starts_with("02  A0"));
        assert_eq!(listing.last().map(|line| line.ends_with("BRK")), Some(true));
    }

    #[test]
    fn test_if_jump_lands_on_nop() {
        let (result, _) = generate_source("{ if true { print(1) } } $");
        let bytes = result.unwrap().bytes().to_vec();
        // condition: LDA #01 STA t LDX #01 CPX t, then BNE
        let bne = bytes.iter().position(|b| *b == 0xD0).unwrap();
        let distance = usize::from(bytes[bne + 1]);
        assert_eq!(bytes[bne + 2 + distance], 0xEA);
        assert_eq!(bytes[bytes.len() - 1], 0x00);
    }

    #[test]
    fn test_out_of_memory() {
        let long = "a".repeat(120);
        let source =
            format!("{{ string s s = \"{long}\" string t t = \"{long}\" print(s) print(t) }} $");
        let (result, diagnostics) = generate_source(&source);
        assert!(matches!(result, Err(CodeGenError::OutOfMemory { .. })));
        assert_eq!(diagnostics.errors_of(DiagnosticKind::OutOfMemory), 1);
    }
}
