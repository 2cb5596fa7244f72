mod common;

use anyhow::Result;
use kestrel_syntax::DiagnosticKind;
use libkestrel::{CodeGenError, CompileError, Stage};
use quickcheck::quickcheck;

use common::{compile_source, run_source};

#[test]
fn test_shadowed_variables_print_inner_then_outer() -> Result<()> {
    let out =
        run_source("{\n int a\n a = 1\n {\n  int a\n  a = 2\n  print(a)\n }\n print(a)\n} $")?;
    assert_eq!(out, "21");
    Ok(())
}

#[test]
fn test_while_body_runs_once() -> Result<()> {
    let out = run_source("{ int a a = 1 while (a == 1) { print(a) a = 2 } print(a) } $")?;
    assert_eq!(out, "12");
    Ok(())
}

#[test]
fn test_counting_loop() -> Result<()> {
    let out = run_source("{ int i i = 0 while (false == (i == 3)) { print(i) i = 1 + i } } $")?;
    assert_eq!(out, "012");
    Ok(())
}

#[test]
fn test_nested_if() -> Result<()> {
    let out = run_source(
        r#"{
            int a
            a = 3
            if (a == 3) {
                if (a == 4) { print("no") }
                print("yes")
            }
            if false { print("never") }
            print("done")
        } $"#,
    )?;
    assert_eq!(out, "yesdone");
    Ok(())
}

#[test]
fn test_booleans_print_as_digits() -> Result<()> {
    let out = run_source("{ boolean b b = (1 == 1) print(b) print((2 == 3)) print(true) } $")?;
    assert_eq!(out, "101");
    Ok(())
}

#[test]
fn test_strings_are_copied_by_value() -> Result<()> {
    let out = run_source(
        r#"{ string s string t s = "hello" t = s s = "bye" print(t) print(" ") print(s) } $"#,
    )?;
    assert_eq!(out, "hello bye");
    Ok(())
}

#[test]
fn test_string_copy_sees_the_runtime_value() -> Result<()> {
    let source = r#"{ string s s = "a" if false { s = "bb" } string t t = s print(t) } $"#;
    let out = run_source(source)?;
    assert_eq!(out, "a");
    Ok(())
}

#[test]
fn test_arithmetic_wraps() -> Result<()> {
    let out = run_source("{ int a a = 9 - 4 + 2 print(a) print(2 + a) a = 200 + 100 print(a) } $")?;
    assert_eq!(out, "7944");
    Ok(())
}

#[test]
fn test_uninitialized_variables_default() -> Result<()> {
    let compiled = compile_source("{ int x string s print(x) print(s) } $");
    assert!(compiled.result.succeeded);
    assert_eq!(compiled.diagnostics.warnings_of(DiagnosticKind::UninitializedVariable), 2);
    assert_eq!(run_source("{ int x string s print(x) print(s) } $")?, "0");
    Ok(())
}

#[test]
fn test_type_mismatch_skips_code_generation() {
    let compiled = compile_source("{ int a a = \"x\" print(a) } $");
    assert!(!compiled.result.succeeded);
    assert_eq!(compiled.result.failed_stage, Some(Stage::Semantic));
    assert!(compiled.result.byte_code.is_none());
    assert!(!compiled.diagnostics.trace.iter().any(|(m, _)| m.starts_with("Generating")));
}

#[test]
fn test_parse_errors_are_all_collected() {
    let compiled = compile_source("{ int a string a b = 1 print(c) } $");
    assert_eq!(compiled.result.failed_stage, Some(Stage::Parse));
    assert_eq!(compiled.result.error_count, 3);
    assert_eq!(compiled.diagnostics.errors_of(DiagnosticKind::RedeclaredVariable), 1);
    assert_eq!(compiled.diagnostics.errors_of(DiagnosticKind::UndeclaredVariable), 2);
}

#[test]
fn test_end_of_program_warnings() {
    let missing = compile_source("{ print(1) }");
    assert!(missing.result.succeeded);
    assert_eq!(missing.diagnostics.warnings_of(DiagnosticKind::MissingEof), 1);

    let trailing = compile_source("{ print(1) } $ print(2)\n{ }");
    assert!(trailing.result.succeeded);
    assert_eq!(trailing.diagnostics.warnings_of(DiagnosticKind::ContentAfterEof), 1);
}

#[test]
fn test_successful_compile_fits_in_memory() {
    let compiled =
        compile_source("{ int a a = 1 + 2 + 3 while (a == 6) { a = 1 print(\"x\") } } $");
    let code = compiled.result.byte_code.unwrap();
    assert!(code.len() < 256);
    assert_eq!(code.bytes().last(), Some(&0x00));
    assert_eq!(code.to_hex().split(' ').count(), 256);
}

#[test]
fn test_out_of_memory() {
    let source = format!("{{ {} }} $", "print(1) ".repeat(30));
    let compiled = compile_source(&source);
    assert_eq!(compiled.result.failed_stage, Some(Stage::CodeGen));
    assert!(matches!(
        compiled.result.error,
        Some(CompileError::CodeGen(CodeGenError::OutOfMemory { .. }))
    ));
    assert_eq!(compiled.diagnostics.errors_of(DiagnosticKind::OutOfMemory), 1);
}

quickcheck! {
    fn prop_digits_print_themselves(n: u8) -> bool {
        run_source(&format!("{{ print({n}) }} $")).ok() == Some(n.to_string())
    }

    fn prop_sums_wrap_like_bytes(a: u8, b: u8) -> bool {
        let sum = run_source(&format!("{{ print({a} + {b}) }} $")).ok();
        let difference = run_source(&format!("{{ print({a} - {b}) }} $")).ok();
        sum == Some(a.wrapping_add(b).to_string())
            && difference == Some(a.wrapping_sub(b).to_string())
    }
}
