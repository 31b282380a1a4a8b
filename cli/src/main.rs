mod params;
mod test_runner;

use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use codespan_reporting::diagnostic::{Diagnostic, Label, Severity};
use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term;
use codespan_reporting::term::termcolor::{ColorChoice, StandardStream};

use interpreter::{DiagnosticError, NewlineMode, Params, RenderOptions};
use spool::parser::ParseError;

const SUBCOMMANDS: &[&str] = &["run", "test", "help"];

#[derive(Parser)]
#[command(name = "spool", version, about = "Line-oriented template preprocessor")]
struct Cli {
    /// Disable colored error output
    #[arg(long, global = true)]
    no_color: bool,

    /// Log pipeline stages and include resolution
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render a template
    Run(RunArgs),

    /// Run .test.tpl test files
    Test(TestArgs),
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Dump the block tree
    Tree,
    /// Print the generated program text
    Program,
    /// Render the template
    Output,
}

#[derive(clap::Args)]
struct RunArgs {
    /// Template file, or `-` for stdin
    #[arg(default_value = "-")]
    file: String,

    /// Where to write the result, or `-` for stdout
    #[arg(short, long, default_value = "-")]
    output: String,

    /// What to produce
    #[arg(short, long, value_enum, default_value_t = Mode::Output)]
    mode: Mode,

    /// Template parameter as key=value. Repeatable.
    #[arg(short, long = "param", value_name = "KEY=VALUE")]
    param: Vec<String>,

    /// TOML file of typed parameters; -p takes precedence
    #[arg(long, value_name = "FILE")]
    params_file: Option<PathBuf>,

    /// Directory searched by include(). Repeatable.
    #[arg(short = 'I', long = "include-dir", value_name = "DIR")]
    include_dir: Vec<PathBuf>,

    /// Concatenate output fragments without normalizing newlines
    #[arg(long)]
    keep_newlines: bool,
}

#[derive(clap::Args)]
struct TestArgs {
    /// Path to a .test.tpl file or directory containing them
    path: String,

    /// Run only tests in these categories (subfolder names). Repeatable.
    #[arg(short, long)]
    category: Vec<String>,

    /// List available categories and exit
    #[arg(long)]
    list_categories: bool,
}

fn main() {
    // Backwards compatibility: without a known subcommand, inject "run" so
    // `spool file.tpl` works like `spool run file.tpl` and bare `spool` reads stdin.
    let mut args: Vec<String> = std::env::args().collect();
    let first_pos = args.iter().skip(1).find(|a| !a.starts_with('-') || *a == "-");
    let has_subcommand = first_pos.is_some_and(|a| SUBCOMMANDS.contains(&a.as_str()));
    let wants_info = matches!(
        args.get(1).map(String::as_str),
        Some("-h" | "--help" | "-V" | "--version")
    );
    if !has_subcommand && !wants_info {
        args.insert(1, "run".to_string());
    }

    let cli = Cli::parse_from(&args);

    let level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match cli.command {
        Command::Run(run_args) => do_run(run_args, cli.no_color),
        Command::Test(test_args) => {
            let path = Path::new(&test_args.path);
            if test_args.list_categories {
                test_runner::list_categories(path);
                return;
            }
            let exit_code = test_runner::run_tests(path, cli.no_color, &test_args.category);
            process::exit(exit_code);
        }
    }
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("error: {}", message);
    process::exit(1);
}

fn read_source(file: &str) -> io::Result<String> {
    if file == "-" {
        let mut source = String::new();
        io::stdin().read_to_string(&mut source)?;
        Ok(source)
    } else {
        std::fs::read_to_string(file)
    }
}

fn write_result(output: &str, text: &str) -> io::Result<()> {
    if output == "-" {
        let mut stdout = io::stdout().lock();
        stdout.write_all(text.as_bytes())?;
        stdout.flush()
    } else {
        std::fs::write(output, text)
    }
}

/// Parameter file first, then `-p` pairs on top.
fn collect_params(args: &RunArgs) -> Result<Params, String> {
    let mut params = match &args.params_file {
        Some(path) => params::load_params_file(path)?,
        None => Params::new(),
    };
    for arg in &args.param {
        let (key, value) = params::parse_param(arg)?;
        params.insert(key, value);
    }
    Ok(params)
}

fn do_run(args: RunArgs, no_color: bool) {
    let color_choice = if no_color {
        ColorChoice::Never
    } else {
        ColorChoice::Auto
    };

    let source = read_source(&args.file)
        .unwrap_or_else(|e| fail(format_args!("cannot read '{}': {}", args.file, e)));

    let mut files = SimpleFiles::new();
    let name = if args.file == "-" { "<stdin>".to_string() } else { args.file.clone() };
    let file_id = files.add(name, source.clone());

    let writer = StandardStream::stderr(color_choice);
    let config = term::Config::default();

    let parser = spool::parser::Parser::new(source, file_id);

    let text = match args.mode {
        Mode::Tree => match parser.parse_tree() {
            Ok(tree) => tree.to_string(),
            Err(error) => {
                emit_parse_errors(&writer, &config, &files, &[error]);
                process::exit(1);
            }
        },

        Mode::Program => {
            let generated = parser
                .parse_tree()
                .and_then(|tree| spool::codegen::generate(&tree, file_id));
            match generated {
                Ok(program) => program,
                Err(error) => {
                    emit_parse_errors(&writer, &config, &files, &[error]);
                    process::exit(1);
                }
            }
        }

        Mode::Output => {
            let program = match parser.parse() {
                Ok(p) => p,
                Err(errors) => {
                    emit_parse_errors(&writer, &config, &files, &errors);
                    process::exit(1);
                }
            };

            let params = collect_params(&args).unwrap_or_else(|e| fail(e));

            let mut include_dirs = args.include_dir.clone();
            if args.file != "-" {
                let base_dir = Path::new(&args.file)
                    .parent()
                    .filter(|p| !p.as_os_str().is_empty())
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| PathBuf::from("."));
                include_dirs.push(base_dir);
            }

            let options = RenderOptions {
                include_dirs,
                newline_mode: if args.keep_newlines {
                    NewlineMode::Preserve
                } else {
                    NewlineMode::Normalize
                },
            };

            match interpreter::execute_program(&program, &params, &options) {
                Ok(text) => text,
                Err(error) => {
                    emit_diagnostic_error(&writer, &config, &files, &error);
                    process::exit(1);
                }
            }
        }
    };

    if let Err(e) = write_result(&args.output, &text) {
        fail(format_args!("cannot write '{}': {}", args.output, e));
    }
}

fn emit_parse_errors(
    writer: &StandardStream,
    config: &term::Config,
    files: &SimpleFiles<String, String>,
    errors: &[ParseError],
) {
    for error in errors {
        let diagnostic = error.to_diagnostic();
        let _ = term::emit_to_write_style(&mut writer.lock(), config, files, &diagnostic);
    }
}

fn emit_diagnostic_error(
    writer: &StandardStream,
    config: &term::Config,
    files: &SimpleFiles<String, String>,
    error: &DiagnosticError,
) {
    if let Some(span) = &error.span {
        let diagnostic = Diagnostic::new(Severity::Error)
            .with_message(error.error.to_string())
            .with_labels(vec![Label::primary(error.source_id, span.clone())])
            .with_notes(error.notes.clone());
        let _ = term::emit_to_write_style(&mut writer.lock(), config, files, &diagnostic);
    } else {
        eprintln!("runtime error: {}", error);
        for note in &error.notes {
            eprintln!("  = {}", note);
        }
    }
}
