use anyhow::{Context, Result};
use kestrel_syntax::Diagnostics;
use libkestrel::{CompilationResult, Machine, compile};

pub(crate) struct Compiled {
    pub(crate) result: CompilationResult,
    pub(crate) diagnostics: Diagnostics,
}

pub(crate) fn compile_source(source: &str) -> Compiled {
    let mut diagnostics = Diagnostics::new();
    let result = compile(source, &mut diagnostics);
    Compiled { result, diagnostics }
}

/// Compile `source` and run it on the machine model, returning its output.
pub(crate) fn run_source(source: &str) -> Result<String> {
    let compiled = compile_source(source);
    let code = compiled
        .result
        .byte_code
        .with_context(|| format!("compilation failed: {:?}", compiled.diagnostics.errors))?;
    let mut machine = Machine::new(&code).with_step_limit(10_000);
    Ok(machine.run()?.to_owned())
}
