use kestrel_syntax::SyntaxError;
use serde::Serialize;

#[derive(thiserror::Error, miette::Diagnostic, Debug, Clone, Copy, PartialEq, Eq)]
#[error("semantic analysis failed with {0} error(s)")]
#[diagnostic(code(kestrel::semantic), help("code generation only runs on a type-correct program"))]
pub struct SemanticError(pub usize);

#[derive(thiserror::Error, miette::Diagnostic, Debug)]
pub enum CodeGenError {
    #[error(
        "out of memory: code and static data need {required} bytes but only {available} are \
         free below the heap"
    )]
    #[diagnostic(
        code(kestrel::codegen::out_of_memory),
        help("shorten the program or its string literals")
    )]
    OutOfMemory { required: usize, available: usize },
    #[error(transparent)]
    #[diagnostic(code(kestrel::codegen::internal))]
    Internal(#[from] anyhow::Error),
}

/// Failure of one of the machine model's instructions.
#[derive(thiserror::Error, miette::Diagnostic, Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmError {
    #[error("invalid opcode {byte:02X} at address {address:02X}")]
    InvalidOpcode { byte: u8, address: u8 },
    #[error("address {high:02X}{low:02X} at {address:02X} is outside the 256 byte memory")]
    AddressOutOfRange { address: u8, low: u8, high: u8 },
    #[error("invalid system call {0:02X}")]
    InvalidSyscall(u8),
    #[error("program did not halt within {0} steps")]
    #[diagnostic(help("the program is probably stuck in a loop"))]
    StepLimit(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Lex,
    Parse,
    Semantic,
    CodeGen,
}

#[derive(thiserror::Error, miette::Diagnostic, Debug)]
pub enum CompileError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Syntax(#[from] SyntaxError),
    #[error(transparent)]
    #[diagnostic(transparent)]
    Semantic(#[from] SemanticError),
    #[error(transparent)]
    #[diagnostic(transparent)]
    CodeGen(#[from] CodeGenError),
}

impl CompileError {
    pub fn stage(&self) -> Stage {
        match self {
            CompileError::Syntax(SyntaxError::Lex(_)) => Stage::Lex,
            CompileError::Syntax(SyntaxError::Parse(_)) => Stage::Parse,
            CompileError::Semantic(_) => Stage::Semantic,
            CompileError::CodeGen(_) => Stage::CodeGen,
        }
    }
}
