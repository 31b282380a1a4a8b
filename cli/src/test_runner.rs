use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use interpreter::{NewlineMode, RenderOptions};

use crate::params::params_from_table;

#[derive(Debug, Deserialize)]
pub struct TestConfig {
    /// Human-readable test description.
    #[serde(default)]
    pub description: Option<String>,

    /// Parameters passed to the template, with TOML types preserved.
    #[serde(default)]
    pub params: toml::Table,

    /// Include directories, relative to the test file. The test file's own
    /// directory is always searched last.
    #[serde(default)]
    pub include_dirs: Vec<PathBuf>,

    /// Render with `NewlineMode::Preserve`.
    #[serde(default)]
    pub keep_newlines: bool,

    /// Expected rendered text. Trailing newlines are ignored on both sides.
    #[serde(default)]
    pub expect_output: Option<String>,

    /// Expected runtime error; the error's Display string must contain this substring.
    #[serde(default)]
    pub expect_error: Option<String>,

    /// If true, the test expects parsing to fail.
    #[serde(default)]
    pub expect_parse_error: bool,
}

/// Parse a `.test.tpl` file into its TOML config and template source.
fn parse_test_file(content: &str) -> Result<(TestConfig, &str), String> {
    let content = content.trim_start_matches('\u{feff}');

    let after_open = content
        .strip_prefix("---")
        .ok_or("missing opening --- frontmatter delimiter")?;
    let after_open = after_open
        .strip_prefix('\n')
        .or_else(|| after_open.strip_prefix("\r\n"))
        .unwrap_or(after_open);

    let close_pos = after_open
        .find("\n---")
        .ok_or("missing closing --- frontmatter delimiter")?;

    let toml_str = after_open[..close_pos].trim_end_matches('\r');
    let rest = &after_open[close_pos + 4..];
    let source = rest
        .strip_prefix("\r\n")
        .or_else(|| rest.strip_prefix('\n'))
        .unwrap_or(rest);

    let config: TestConfig =
        toml::from_str(toml_str).map_err(|e| format!("TOML parse error: {}", e))?;

    Ok((config, source))
}

pub enum TestOutcome {
    Pass,
    Fail(String),
}

pub struct TestResult {
    pub path: PathBuf,
    pub description: Option<String>,
    pub outcome: TestOutcome,
}

impl TestResult {
    fn label(&self) -> &str {
        self.description.as_deref().unwrap_or_else(|| {
            self.path
                .file_name()
                .and_then(|s| s.to_str())
                .and_then(|s| s.strip_suffix(".test.tpl"))
                .unwrap_or("?")
        })
    }
}

fn run_single_test(path: &Path) -> TestResult {
    let fail = |description: Option<String>, reason: String| TestResult {
        path: path.to_path_buf(),
        description,
        outcome: TestOutcome::Fail(reason),
    };

    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => return fail(None, format!("cannot read file: {}", e)),
    };

    let (config, source) = match parse_test_file(&content) {
        Ok(pair) => pair,
        Err(e) => return fail(None, format!("frontmatter error: {}", e)),
    };

    let description = config.description.clone();
    let outcome = check_template(path, &config, source);
    TestResult {
        path: path.to_path_buf(),
        description,
        outcome: match outcome {
            None => TestOutcome::Pass,
            Some(reason) => TestOutcome::Fail(reason),
        },
    }
}

/// Render `source` under `config` and compare against its expectations.
/// Returns `Some(reason)` on mismatch.
fn check_template(path: &Path, config: &TestConfig, source: &str) -> Option<String> {
    let parse_result = spool::parser::Parser::new(source.to_string(), 0).parse();

    if config.expect_parse_error {
        return match parse_result {
            Err(_) => None,
            Ok(_) => Some("expected parse error, but parsing succeeded".into()),
        };
    }

    let program = match parse_result {
        Ok(p) => p,
        Err(errs) => {
            let msgs: Vec<String> = errs.iter().map(|e| e.to_string()).collect();
            return Some(format!("unexpected parse error: {}", msgs.join("; ")));
        }
    };

    let base_dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let mut include_dirs: Vec<PathBuf> = config
        .include_dirs
        .iter()
        .map(|dir| base_dir.join(dir))
        .collect();
    include_dirs.push(base_dir);

    let options = RenderOptions {
        include_dirs,
        newline_mode: if config.keep_newlines {
            NewlineMode::Preserve
        } else {
            NewlineMode::Normalize
        },
    };
    let params = params_from_table(&config.params);

    let result = interpreter::execute_program(&program, &params, &options);

    match (&config.expect_error, &config.expect_output, result) {
        (Some(expected_err), _, Err(runtime_err)) => {
            let err_str = runtime_err.to_string();
            if err_str.contains(expected_err.as_str()) {
                None
            } else {
                Some(format!(
                    "expected error containing \"{}\", got: {}",
                    expected_err, err_str
                ))
            }
        }
        (Some(expected_err), _, Ok(_)) => Some(format!(
            "expected error containing \"{}\", but rendering succeeded",
            expected_err
        )),
        (None, _, Err(runtime_err)) => Some(format!("unexpected runtime error: {}", runtime_err)),
        (None, Some(expected_output), Ok(actual)) => {
            let actual = actual.trim_end_matches('\n');
            let expected = expected_output.trim_end_matches('\n');
            if actual == expected {
                None
            } else {
                Some(format!(
                    "output mismatch\n  expected: {:?}\n  actual:   {:?}",
                    expected, actual
                ))
            }
        }
        (None, None, Ok(_)) => None,
    }
}

/// Discover `.test.tpl` files grouped by category (subfolder relative to root).
/// Files directly in `root` get category "" (uncategorized).
fn discover_categorized(root: &Path) -> BTreeMap<String, Vec<PathBuf>> {
    let mut categories: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    collect_tests(root, root, &mut categories);
    for files in categories.values_mut() {
        files.sort();
    }
    categories
}

fn collect_tests(dir: &Path, root: &Path, out: &mut BTreeMap<String, Vec<PathBuf>>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_tests(&path, root, out);
        } else if path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|name| name.ends_with(".test.tpl"))
        {
            let category = path
                .parent()
                .and_then(|p| p.strip_prefix(root).ok())
                .map(|p| p.to_string_lossy().replace('\\', "/"))
                .unwrap_or_default();
            out.entry(category).or_default().push(path);
        }
    }
}

/// List available categories for the given test path.
pub fn list_categories(path: &Path) {
    if path.is_file() {
        eprintln!("(single file, no categories)");
        return;
    }

    let categories = discover_categorized(path);
    if categories.is_empty() {
        eprintln!("no .test.tpl files found in {}", path.display());
        return;
    }

    eprintln!("available categories:");
    for (cat, files) in &categories {
        let label = if cat.is_empty() { "(root)" } else { cat.as_str() };
        eprintln!("  {} ({} tests)", label, files.len());
    }
}

fn paint(s: &str, code: &str, no_color: bool) -> String {
    if no_color {
        s.to_string()
    } else {
        format!("\x1b[{}m{}\x1b[0m", code, s)
    }
}

/// Select the categories to run. Unknown names are reported and skipped.
fn filter_categories<'a>(
    all: &'a BTreeMap<String, Vec<PathBuf>>,
    requested: &[String],
) -> BTreeMap<&'a str, &'a Vec<PathBuf>> {
    if requested.is_empty() {
        return all.iter().map(|(k, v)| (k.as_str(), v)).collect();
    }

    let mut filtered = BTreeMap::new();
    for requested in requested {
        let req = requested.trim_matches('/');
        let mut found = false;
        for (cat, files) in all {
            if cat == req || cat.starts_with(&format!("{}/", req)) {
                filtered.insert(cat.as_str(), files);
                found = true;
            }
        }
        if !found {
            log::warn!(
                "category '{}' not found (available: {})",
                req,
                all.keys()
                    .map(|k| if k.is_empty() { "(root)" } else { k.as_str() })
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }
    }
    filtered
}

/// Run all `.test.tpl` files under `path` (or a single file).
/// If `categories` is non-empty, only run tests in those categories.
/// Returns exit code: 0 = all pass, 1 = any failure.
pub fn run_tests(path: &Path, no_color: bool, categories: &[String]) -> i32 {
    let run_categories: Vec<(String, Vec<PathBuf>)> = if path.is_file() {
        vec![(String::new(), vec![path.to_path_buf()])]
    } else {
        let all = discover_categorized(path);
        if all.is_empty() {
            eprintln!("no .test.tpl files found in {}", path.display());
            return 1;
        }
        filter_categories(&all, categories)
            .into_iter()
            .map(|(cat, files)| (cat.to_string(), files.clone()))
            .collect()
    };

    if run_categories.is_empty() {
        eprintln!("no matching categories found");
        return 1;
    }

    let mut passed = 0usize;
    let mut failures: Vec<TestResult> = Vec::new();

    for (cat, files) in &run_categories {
        if !path.is_file() {
            let header = if cat.is_empty() { "(root)" } else { cat.as_str() };
            eprintln!();
            eprintln!("{}", paint(header, "1", no_color));
        }

        for file in files {
            let result = run_single_test(file);
            match &result.outcome {
                TestOutcome::Pass => {
                    passed += 1;
                    eprintln!("  {}  {}", paint("PASS", "32", no_color), result.label());
                }
                TestOutcome::Fail(_) => {
                    eprintln!("  {}  {}", paint("FAIL", "31", no_color), result.label());
                    failures.push(result);
                }
            }
        }
    }

    if !failures.is_empty() {
        eprintln!();
        eprintln!("failures:");
        for f in &failures {
            eprintln!();
            eprintln!("  --- {} ---", f.path.display());
            if let TestOutcome::Fail(reason) = &f.outcome {
                for line in reason.lines() {
                    eprintln!("  {}", line);
                }
            }
        }
    }

    eprintln!();
    let failed = failures.len();
    if failed == 0 {
        eprintln!("test result: {}. {} passed, 0 failed", paint("ok", "32", no_color), passed);
        0
    } else {
        eprintln!(
            "test result: {}. {} passed, {} failed (of {})",
            paint("FAILED", "31", no_color),
            passed,
            failed,
            passed + failed
        );
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frontmatter_and_source_are_split() {
        let content =
            "---\ndescription = \"d\"\nexpect_output = \"x\"\n[params]\nn = 2\n---\n`n`\n";
        let (config, source) = parse_test_file(content).unwrap();
        assert_eq!(config.description.as_deref(), Some("d"));
        assert_eq!(config.params["n"].as_integer(), Some(2));
        assert!(!config.keep_newlines);
        assert_eq!(source, "`n`\n");
    }

    #[test]
    fn missing_frontmatter_is_rejected() {
        assert!(parse_test_file("`1`\n").is_err());
        assert!(parse_test_file("---\ndescription = \"d\"\n").is_err());
    }

    #[test]
    fn expectations_are_checked() {
        let content = "---\nexpect_output = \"\"\"\nitem 0\nitem 1\n\"\"\"\n---\n\
                       #py for i in range(2)\nitem `i`\n#py endfor\n";
        let (config, source) = parse_test_file(content).unwrap();
        assert_eq!(check_template(Path::new("case.test.tpl"), &config, source), None);

        let (config, source) =
            parse_test_file("---\nexpect_error = \"undefined variable\"\n---\n`nope`\n").unwrap();
        let reason = check_template(Path::new("case.test.tpl"), &config, source);
        assert!(reason.is_none(), "{:?}", reason);

        let (config, source) =
            parse_test_file("---\nexpect_parse_error = true\n---\n#py if x\n").unwrap();
        assert_eq!(check_template(Path::new("case.test.tpl"), &config, source), None);
    }

    #[test]
    fn output_mismatch_is_reported() {
        let (config, source) = parse_test_file("---\nexpect_output = \"b\"\n---\na\n").unwrap();
        let reason = check_template(Path::new("case.test.tpl"), &config, source).unwrap();
        assert!(reason.starts_with("output mismatch"));
    }
}
