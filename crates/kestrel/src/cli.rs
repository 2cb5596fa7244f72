use std::fs;
use std::path::PathBuf;

use clap::{ArgAction, Parser, ValueEnum};
use itertools::Itertools;
use libkestrel::vm::DEFAULT_STEP_LIMIT;
use libkestrel::{CompilationResult, Machine, compile};
use miette::{IntoDiagnostic, WrapErr};
use serde_json::json;

use crate::report::ConsoleReporter;

#[derive(Debug, Parser)]
#[command(name = "kestrel", version, about = "Compile Kestrel programs to 6502a machine code")]
pub(crate) struct Cli {
    /// Source file to compile
    pub(crate) file: PathBuf,

    /// Artifacts to print, comma separated
    #[arg(long, value_enum, value_delimiter = ',', default_value = "hex")]
    pub(crate) emit: Vec<Emit>,

    /// Run the compiled program on the machine model and print its output
    #[arg(long)]
    pub(crate) run: bool,

    /// Instructions the machine may execute before giving up
    #[arg(long, default_value_t = DEFAULT_STEP_LIMIT)]
    pub(crate) step_limit: usize,

    #[arg(long, value_enum, default_value_t = Format::Text)]
    pub(crate) format: Format,

    /// Log every step of every stage
    #[arg(long)]
    pub(crate) trace: bool,

    /// Raise the log level, repeat for more
    #[arg(short, long, action = ArgAction::Count)]
    pub(crate) verbose: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum Emit {
    Tokens,
    Cst,
    Ast,
    Symbols,
    Hex,
    Asm,
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum Format {
    Text,
    Json,
}

impl Cli {
    fn wants(&self, emit: Emit) -> bool {
        self.emit.iter().any(|e| *e == emit || *e == Emit::All)
    }
}

pub(crate) fn run(args: Cli) -> miette::Result<()> {
    let source = fs::read_to_string(&args.file)
        .into_diagnostic()
        .wrap_err_with(|| format!("cannot read {}", args.file.display()))?;
    let name = args.file.display().to_string();

    let mut reporter = ConsoleReporter::new(&name, &source, args.format, args.trace);
    let mut result = compile(&source, &mut reporter);

    let output = match (&result.byte_code, args.run) {
        (Some(code), true) => Some(
            Machine::new(code)
                .with_step_limit(args.step_limit)
                .run()?
                .to_owned(),
        ),
        _ => None,
    };

    match args.format {
        Format::Text => print_text(&args, &result, output.as_deref()),
        Format::Json => print_json(&args, &result, &reporter, output.as_deref())?,
    }

    match result.error.take() {
        Some(err) => Err(err.into()),
        None => Ok(()),
    }
}

fn print_text(args: &Cli, result: &CompilationResult, output: Option<&str>) {
    if args.wants(Emit::Tokens) && !result.tokens.is_empty() {
        println!("{}\n", result.tokens.iter().join("\n"));
    }
    if let Some(syntax) = &result.syntax {
        if args.wants(Emit::Cst) {
            println!("{}", syntax.cst);
        }
        if args.wants(Emit::Ast) {
            println!("{}", syntax.ast);
        }
        if args.wants(Emit::Symbols) {
            println!("{}\n", syntax.symbols);
        }
    }
    if let (Some(code), true) = (&result.byte_code, args.wants(Emit::Hex)) {
        println!("{code}\n");
    }
    if let (Some(code), true) = (&result.byte_code, args.wants(Emit::Asm)) {
        println!("{}\n", code.disassemble().join("\n"));
    }
    if let Some(output) = output {
        println!("{output}");
    }

    let verdict = if result.succeeded { "succeeded" } else { "failed" };
    eprintln!(
        "compilation {verdict} with {} error(s) and {} warning(s)",
        result.error_count, result.warning_count
    );
}

fn print_json(
    args: &Cli,
    result: &CompilationResult,
    reporter: &ConsoleReporter,
    output: Option<&str>,
) -> miette::Result<()> {
    let mut report = json!({
        "succeeded": result.succeeded,
        "failed_stage": result.failed_stage,
        "errors": reporter.collected.errors,
        "warnings": reporter.collected.warnings,
    });
    if args.trace {
        report["trace"] = json!(reporter.collected.trace);
    }
    if args.wants(Emit::Tokens) {
        report["tokens"] = json!(result.tokens);
    }
    if let Some(syntax) = &result.syntax {
        if args.wants(Emit::Cst) {
            report["cst"] = json!(syntax.cst.to_string());
        }
        if args.wants(Emit::Ast) {
            report["ast"] = json!(syntax.ast.to_string());
        }
        if args.wants(Emit::Symbols) {
            report["symbols"] = json!(syntax.symbols);
        }
    }
    if let (Some(code), true) = (&result.byte_code, args.wants(Emit::Hex)) {
        report["hex"] = json!(code);
    }
    if let (Some(code), true) = (&result.byte_code, args.wants(Emit::Asm)) {
        report["asm"] = json!(code.disassemble());
    }
    if let Some(output) = output {
        report["output"] = json!(output);
    }

    let text = serde_json::to_string_pretty(&report).into_diagnostic()?;
    println!("{text}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_list() {
        let args = Cli::parse_from(["kestrel", "prog.k", "--emit", "tokens,ast", "--run", "-vv"]);
        assert!(args.wants(Emit::Tokens));
        assert!(args.wants(Emit::Ast));
        assert!(!args.wants(Emit::Hex));
        assert!(args.run);
        assert_eq!(args.verbose, 2);

        assert_eq!(args.step_limit, DEFAULT_STEP_LIMIT);

        let args = Cli::parse_from(["kestrel", "prog.k", "--emit", "all", "--format", "json"]);
        assert!(args.wants(Emit::Symbols));
        assert!(args.wants(Emit::Asm));
        assert_eq!(args.format, Format::Json);

        let args = Cli::parse_from([
            "kestrel",
            "prog.k",
            "--emit",
            "asm",
            "--run",
            "--step-limit",
            "50",
        ]);
        assert!(args.wants(Emit::Asm));
        assert!(!args.wants(Emit::Hex));
        assert_eq!(args.step_limit, 50);
    }
}
