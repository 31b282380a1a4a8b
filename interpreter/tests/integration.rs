use std::collections::HashMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use interpreter::{
    NewlineMode, Params, RenderError, RenderOptions, RuntimeError, RuntimeValue, SourceLoader,
};
use spool::parser::ParseErrorKind;

fn run_with(source: &str, params: &Params, options: &RenderOptions) -> String {
    interpreter::render(source, params, options).expect("render failed")
}

fn run(source: &str) -> String {
    run_with(source, &Params::new(), &RenderOptions::default())
}

fn run_err(source: &str) -> RenderError {
    interpreter::render(source, &Params::new(), &RenderOptions::default())
        .expect_err("render unexpectedly succeeded")
}

fn params(pairs: &[(&str, RuntimeValue)]) -> Params {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

fn s(text: &str) -> RuntimeValue {
    RuntimeValue::Str(text.to_string())
}

/// Templates served from memory, keyed by path.
struct MapLoader(HashMap<PathBuf, String>);

impl MapLoader {
    fn new(files: &[(&str, &str)]) -> Self {
        MapLoader(
            files
                .iter()
                .map(|(path, text)| (PathBuf::from(path), text.to_string()))
                .collect(),
        )
    }
}

impl SourceLoader for MapLoader {
    fn exists(&self, path: &Path) -> bool {
        self.0.contains_key(path)
    }

    fn load(&self, path: &Path) -> io::Result<String> {
        self.0
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no such template"))
    }
}

fn run_in_memory(source: &str, files: &[(&str, &str)]) -> Result<String, RenderError> {
    interpreter::render_with_loader(
        source,
        &Params::new(),
        &RenderOptions::default(),
        &MapLoader::new(files),
    )
}

// ---------------------------------------------------------------------------
// Block structure
// ---------------------------------------------------------------------------

#[test]
fn if_else_selects_branch() {
    let source = "#py if a==1\nyes\n#py else\nno\n#py endif";
    let one = params(&[("a", RuntimeValue::Int(1))]);
    let two = params(&[("a", RuntimeValue::Int(2))]);
    assert_eq!(run_with(source, &one, &RenderOptions::default()), "yes");
    assert_eq!(run_with(source, &two, &RenderOptions::default()), "no");
}

#[test]
fn splice_expression() {
    assert_eq!(run("line `1+1` end"), "line 2 end");
}

#[test]
fn for_loop_emits_each_iteration() {
    assert_eq!(run("#py for i in range(2)\nitem `i`\n#py endfor"), "item 0\nitem 1");
}

#[test]
fn elif_at_top_level_is_structural_error() {
    let RenderError::Parse(errors) = run_err("#py elif x\n#py endif") else {
        panic!("expected a parse error");
    };
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].line, 1);
    assert_eq!(
        errors[0].kind,
        ParseErrorKind::Structural {
            tag: "elif".into(),
            after: "root".into()
        }
    );
}

#[test]
fn unclosed_if_is_unterminated() {
    let RenderError::Parse(errors) = run_err("#py if true") else {
        panic!("expected a parse error");
    };
    assert_eq!(
        errors[0].kind,
        ParseErrorKind::Unterminated {
            tag: "if".into(),
            expected: "endif".into()
        }
    );
    assert_eq!(errors[0].message, "expected \"endif\" to close \"if\"");
}

#[test]
fn else_after_for_is_structural_error() {
    let RenderError::Parse(errors) = run_err("#py for i in range(1)\n#py else\n#py endfor") else {
        panic!("expected a parse error");
    };
    assert_eq!(errors[0].line, 2);
    assert_eq!(errors[0].message, "unexpected \"else\" after \"for\"");
}

#[test]
fn conditional_chain_inside_loop() {
    let source = "\
#py for i in range(3):
#py if i == 1:
x
#py else:
y
#py endif
#py endfor";
    assert_eq!(run(source), "y\nx\ny");
}

#[test]
fn elif_chain() {
    let source = "\
#py for i in range(4)
#py if i == 0
zero
#py elif i == 1
one
#py elif i == 2
two
#py else
many
#py endif
#py endfor";
    assert_eq!(run(source), "zero\none\ntwo\nmany");
}

#[test]
fn nested_loops() {
    let source = "#py for i in range(2)\n#py for j in range(2)\n`i``j`\n#py endfor\n#py endfor";
    assert_eq!(run(source), "00\n01\n10\n11");
}

#[test]
fn while_loop_with_augmented_assignment() {
    let source = "#py n = 3\n#py while n > 0\n`n`\n#py n -= 1\n#py endwhile";
    assert_eq!(run(source), "3\n2\n1");
}

#[test]
fn empty_bodies_and_empty_template() {
    assert_eq!(run(""), "");
    assert_eq!(run("#py if False\n#py endif"), "");
    assert_eq!(run("#py for i in []\n#py endfor\nafter"), "after");
}

#[test]
fn stray_closer_is_a_bare_statement() {
    let RenderError::Runtime(e) = run_err("ok\n#py endfor") else {
        panic!("expected a runtime error");
    };
    assert!(matches!(e.error, RuntimeError::UndefinedVariable(ref name) if name == "endfor"));
    assert_eq!(e.line, Some(2));
}

// ---------------------------------------------------------------------------
// Literal lines
// ---------------------------------------------------------------------------

#[test]
fn literal_text_is_verbatim() {
    let line = r"C:\path\to {x} 'quoted' and {{braces}}";
    assert_eq!(run(line), line);
    assert_eq!(run("  indented\t"), "  indented\t");
}

#[test]
fn spliced_values_render_like_str() {
    let source = "`True` `None` `2.5` `[1, 'a']` `{'k': 1}` `7 / 2` `7 // 2`";
    assert_eq!(run(source), "True None 2.5 [1, 'a'] {'k': 1} 3.5 3");
}

#[test]
fn multiple_generation_faults_are_all_reported() {
    let RenderError::Parse(errors) = run_err("a `b\nfine\n#py x = = 1\n`1 +`") else {
        panic!("expected parse errors");
    };
    let lines: Vec<usize> = errors.iter().map(|e| e.line).collect();
    assert_eq!(lines, vec![1, 3, 4]);
    assert!(errors.iter().all(|e| e.kind == ParseErrorKind::Generation));
}

#[test]
fn suites_are_rejected() {
    let RenderError::Parse(errors) = run_err("#py def f(x):\\\n    return x\n") else {
        panic!("expected a parse error");
    };
    assert!(errors[0].message.contains("'def'"));
}

// ---------------------------------------------------------------------------
// Continuation
// ---------------------------------------------------------------------------

#[test]
fn continued_dict_literal() {
    let source = "\
#include <iostream>
#define TYPE \\
    int
#py x = { \\
    'a': 100, \\
    'b': 200 \\
}
#py for k, v in x.items():
    int `k` = `v // 2`;
#py endfor";
    assert_eq!(
        run(source),
        "#include <iostream>\n#define TYPE \\\n    int\n    int a = 50;\n    int b = 100;"
    );
}

#[test]
fn continuation_matches_single_line() {
    let joined = run("#py total = (1 + \\\n2 + \\\n3)\n`total`");
    assert_eq!(joined, run("#py total = 1 + 2 + 3\n`total`"));
}

#[test]
fn continued_lines_outside_brackets_are_separate_statements() {
    assert_eq!(run("#py a = 1\\\nb = 2\n`a + b`"), "3");
}

#[test]
fn errors_in_continued_runs_report_the_first_line() {
    let RenderError::Runtime(e) = run_err("a\n#py y = (1 + \\\nnope)\n") else {
        panic!("expected a runtime error");
    };
    assert_eq!(e.line, Some(2));
}

// ---------------------------------------------------------------------------
// Parameters and statements
// ---------------------------------------------------------------------------

#[test]
fn params_are_names_and_a_dict() {
    let p = params(&[("v", s("nunn"))]);
    assert_eq!(
        run_with("`v` `params['v']` `params.get('w', '-')`", &p, &RenderOptions::default()),
        "nunn nunn -"
    );
}

#[test]
fn statements_and_builtins() {
    let source = "\
#py names = ['b', 'a']; names.append('c')
#py d = {}
#py d['n'] = len(names)
`', '.join(sorted(names))` `d['n']` `max(3, 9, 4)` `str(abs(-2)) + '!'`
#py for i, name in enumerate(names, 1)
`i`:`name.upper()`
#py endfor";
    assert_eq!(run(source), "a, b, c 3 9 2!\n1:B\n2:A\n3:C");
}

#[test]
fn conditional_expression_and_boolean_operators() {
    assert_eq!(run("`'y' if 1 < 2 else 'n'` `0 or 'x'` `1 and 0` `not []`"), "y x 0 True");
    assert_eq!(run("`3 in range(5)` `'k' not in {'k': 1}`"), "True False");
}

#[test]
fn runtime_errors_carry_the_failing_line() {
    let RenderError::Runtime(e) = run_err("ok\n#py if True\n`1 / 0`\n#py endif") else {
        panic!("expected a runtime error");
    };
    assert!(matches!(e.error, RuntimeError::DivisionByZero));
    assert_eq!(e.line, Some(3));
}

#[test]
fn elif_condition_errors_point_at_the_elif() {
    let RenderError::Runtime(e) = run_err("#py if False\n#py elif nope\n#py endif") else {
        panic!("expected a runtime error");
    };
    assert_eq!(e.line, Some(2));
}

#[test]
fn loop_target_mismatch_is_a_runtime_error() {
    let RenderError::Runtime(e) = run_err("#py for a, b in [1, 2]\n#py endfor") else {
        panic!("expected a runtime error");
    };
    assert_eq!(e.line, Some(1));
}

// ---------------------------------------------------------------------------
// Output accumulation
// ---------------------------------------------------------------------------

#[test]
fn output_builtin_appends_fragments() {
    let source = "#py output('x')\ny";
    assert_eq!(run(source), "x\ny");
    let keep = RenderOptions {
        newline_mode: NewlineMode::Preserve,
        ..RenderOptions::default()
    };
    assert_eq!(run_with(source, &Params::new(), &keep), "xy\n");
}

#[test]
fn preserve_mode_keeps_line_terminators() {
    let keep = RenderOptions {
        newline_mode: NewlineMode::Preserve,
        ..RenderOptions::default()
    };
    assert_eq!(run_with("a\nb", &Params::new(), &keep), "a\nb\n");
}

// ---------------------------------------------------------------------------
// Includes
// ---------------------------------------------------------------------------

#[test]
fn include_splices_at_the_call_point() {
    let out = run_in_memory(
        "before\n#py include('part.tpl')\nafter",
        &[("part.tpl", "part `1 + 1`\n")],
    )
    .unwrap();
    assert_eq!(out, "before\npart 2\nafter");
}

#[test]
fn include_shares_params_but_not_variables() {
    let p = params(&[("title", s("T"))]);
    let files = MapLoader::new(&[("head.tpl", "// `title`\n#py local = 1\n")]);
    let out = interpreter::render_with_loader(
        "#py include('head.tpl')\n`'local' in params`",
        &p,
        &RenderOptions::default(),
        &files,
    )
    .unwrap();
    assert_eq!(out, "// T\nFalse");
}

#[test]
fn include_from_search_directories() {
    let first = tempfile::tempdir().expect("failed to create temp dir");
    let second = tempfile::tempdir().expect("failed to create temp dir");

    let mut shadowed = std::fs::File::create(second.path().join("lib.tpl")).unwrap();
    writeln!(shadowed, "second").unwrap();
    let mut winner = std::fs::File::create(first.path().join("lib.tpl")).unwrap();
    writeln!(winner, "first `who`").unwrap();
    let mut only_second = std::fs::File::create(second.path().join("other.tpl")).unwrap();
    writeln!(only_second, "other").unwrap();

    let options = RenderOptions {
        include_dirs: vec![first.path().to_path_buf(), second.path().to_path_buf()],
        ..RenderOptions::default()
    };
    let p = params(&[("who", s("wins"))]);
    let out = run_with("#py include('lib.tpl'); include('other.tpl')", &p, &options);
    assert_eq!(out, "first wins\nother");
}

#[test]
fn missing_include_is_an_io_error() {
    let err = run_in_memory("x\n#py include('nope.tpl')", &[]).unwrap_err();
    let RenderError::Runtime(e) = err else {
        panic!("expected a runtime error");
    };
    assert!(matches!(e.error, RuntimeError::IoError(_)));
    assert_eq!(e.line, Some(2));
}

#[test]
fn include_parse_failures_name_the_file() {
    let err = run_in_memory("#py include('bad.tpl')", &[("bad.tpl", "#py if x\n")]).unwrap_err();
    let RenderError::Runtime(e) = err else {
        panic!("expected a runtime error");
    };
    assert!(matches!(e.error, RuntimeError::IncludeParse { ref path, .. } if path == "bad.tpl"));
}

#[test]
fn include_runtime_errors_are_anchored_at_the_call() {
    let err = run_in_memory(
        "one\ntwo\n#py include('bad.tpl')",
        &[("bad.tpl", "fine\n`missing`\n")],
    )
    .unwrap_err();
    let RenderError::Runtime(e) = err else {
        panic!("expected a runtime error");
    };
    assert!(matches!(e.error, RuntimeError::UndefinedVariable(_)));
    assert_eq!(e.line, Some(3));
    // The label points at the include line of the top-level file.
    assert_eq!(e.span, Some(8..30));
    assert_eq!(e.source_id, 0);
    assert_eq!(e.notes, vec!["raised in 'bad.tpl' at line 2".to_string()]);
}

#[test]
fn empty_include_adds_no_line() {
    let out = run_in_memory("a\n#py include('empty.tpl')\nb", &[("empty.tpl", "")]).unwrap();
    assert_eq!(out, "a\nb");
}

#[test]
fn recursive_include_is_bounded() {
    let err = run_in_memory(
        "#py include('self.tpl')",
        &[("self.tpl", "#py include('self.tpl')\n")],
    )
    .unwrap_err();
    let RenderError::Runtime(e) = err else {
        panic!("expected a runtime error");
    };
    assert!(matches!(e.error, RuntimeError::StackOverflow));
    assert_eq!(e.line, Some(1));
}

// ---------------------------------------------------------------------------
// Resource limits
// ---------------------------------------------------------------------------

fn runtime_error(source: &str) -> RuntimeError {
    match run_err(source) {
        RenderError::Runtime(e) => e.error,
        RenderError::Parse(errors) => panic!("unexpected parse errors: {:?}", errors),
    }
}

#[test]
fn full_width_range_reports_overflowing_length() {
    let wide = "range(-9223372036854775807, 9223372036854775807)";
    assert!(matches!(
        runtime_error(&format!("`len({})`", wide)),
        RuntimeError::Overflow
    ));
    assert_eq!(run(&format!("#py if {}\nx\n#py endif", wide)), "x");
}

#[test]
fn huge_repetition_is_refused() {
    assert!(matches!(runtime_error("`len([1, 2] * (2**62))`"), RuntimeError::TooLarge(_)));
    assert!(matches!(runtime_error("`len('x' * (2**62))`"), RuntimeError::TooLarge(_)));
    assert!(matches!(runtime_error("`list(range(10**12))`"), RuntimeError::TooLarge(_)));
    assert_eq!(run("`len([] * (2**62))`"), "0");
}

#[test]
fn large_ranges_are_used_without_collecting() {
    assert_eq!(run("`5 in range(10**12)`"), "True");
    assert_eq!(run("`range(10**12)[-1]`"), "999999999999");
    // The loop reaches its third item before failing.
    let source = "#py for i in range(10**12)\n`10 // (2 - i)`\n#py endfor";
    let RenderError::Runtime(e) = run_err(source) else {
        panic!("expected a runtime error");
    };
    assert!(matches!(e.error, RuntimeError::DivisionByZero));
    assert_eq!(e.line, Some(2));
}

#[test]
fn deeply_nested_expression_is_a_parse_error() {
    let source = format!("`{}1{}`", "(".repeat(100_000), ")".repeat(100_000));
    let RenderError::Parse(errors) = run_err(&source) else {
        panic!("expected parse errors");
    };
    assert_eq!(errors[0].kind, ParseErrorKind::Generation);
}
