//! Back end of the Kestrel compiler: type checking, 6502a code generation
//! and a machine model to run the result.

pub mod bytecode;
pub mod codegen;
pub mod error;
pub mod isa;
pub mod semantic;
pub mod session;
pub mod vm;

pub use bytecode::ByteCode;
pub use codegen::generate;
pub use error::{CodeGenError, CompileError, SemanticError, Stage, VmError};
pub use semantic::check_semantics;
pub use session::{CompilationResult, CompilationSession, compile};
pub use vm::Machine;
