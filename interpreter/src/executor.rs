use std::mem;
use std::path::PathBuf;

use spool::Program;
use spool::instruction::value::Value;
use spool::instruction::{Branch, Instruction, Statement, Target};
use spool::parser::Parser;

use crate::environment::{Environment, Params};
use crate::error::{DiagnosticError, RenderError, RuntimeError};
use crate::evaluator::{
    dict_insert, eval_binary_op, eval_template_string, evaluate, normalize_index,
};
use crate::include::{FsLoader, SourceLoader};
use crate::output::{NewlineMode, OutputSink};
use crate::pattern::bind_target;
use crate::runtime_value::RuntimeValue;

/// Knobs shared by a run and every template it includes.
#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    /// Searched in order by `include`.
    pub include_dirs: Vec<PathBuf>,
    pub newline_mode: NewlineMode,
}

/// Per-run state threaded through execution.
pub struct RenderContext<'a> {
    pub params: &'a Params,
    pub options: &'a RenderOptions,
    pub loader: &'a dyn SourceLoader,
    pub sink: OutputSink,
    /// Number of `include` calls enclosing this run.
    pub include_depth: usize,
    pub source_id: usize,
}

impl<'a> RenderContext<'a> {
    pub fn new(
        params: &'a Params,
        options: &'a RenderOptions,
        loader: &'a dyn SourceLoader,
        source_id: usize,
    ) -> Self {
        RenderContext {
            params,
            options,
            loader,
            sink: OutputSink::new(),
            include_depth: 0,
            source_id,
        }
    }
}

/// Parse and render a template in one step, reading includes from disk.
pub fn render(
    source: &str,
    params: &Params,
    options: &RenderOptions,
) -> Result<String, RenderError> {
    render_with_loader(source, params, options, &FsLoader)
}

pub fn render_with_loader(
    source: &str,
    params: &Params,
    options: &RenderOptions,
    loader: &dyn SourceLoader,
) -> Result<String, RenderError> {
    let program = Parser::new(source.to_string(), 0)
        .parse()
        .map_err(RenderError::Parse)?;
    Ok(execute_program_with_loader(&program, params, options, loader)?)
}

/// Execute a parsed program and return the rendered text.
pub fn execute_program(
    program: &Program,
    params: &Params,
    options: &RenderOptions,
) -> Result<String, DiagnosticError> {
    execute_program_with_loader(program, params, options, &FsLoader)
}

/// Execute a program with a custom source loader for includes.
pub fn execute_program_with_loader(
    program: &Program,
    params: &Params,
    options: &RenderOptions,
    loader: &dyn SourceLoader,
) -> Result<String, DiagnosticError> {
    let mut ctx = RenderContext::new(params, options, loader, program.source_id);
    run(program, &mut ctx)
}

/// Execute an included program one level deeper, with a fresh sink.
pub(crate) fn execute_nested(
    program: &Program,
    ctx: &RenderContext<'_>,
) -> Result<String, DiagnosticError> {
    let mut nested = RenderContext {
        params: ctx.params,
        options: ctx.options,
        loader: ctx.loader,
        sink: OutputSink::new(),
        include_depth: ctx.include_depth + 1,
        source_id: program.source_id,
    };
    run(program, &mut nested)
}

fn run(program: &Program, ctx: &mut RenderContext<'_>) -> Result<String, DiagnosticError> {
    let mut env = Environment::with_params(ctx.params);
    execute_block(&program.instructions, &mut env, ctx)?;
    let sink = mem::take(&mut ctx.sink);
    log::debug!(
        "run finished at include depth {} with {} fragments",
        ctx.include_depth,
        sink.len()
    );
    Ok(sink.finish(ctx.options.newline_mode))
}

/// Execute instructions in order, stopping at the first failure.
pub fn execute_block(
    instructions: &[Instruction],
    env: &mut Environment,
    ctx: &mut RenderContext<'_>,
) -> Result<(), DiagnosticError> {
    for instruction in instructions {
        execute_instruction(instruction, env, ctx)?;
    }
    Ok(())
}

fn execute_instruction(
    instruction: &Instruction,
    env: &mut Environment,
    ctx: &mut RenderContext<'_>,
) -> Result<(), DiagnosticError> {
    let result = match instruction {
        Instruction::Spool { template, .. } => {
            eval_template_string(template, env, ctx, 0).map(|mut line| {
                line.push('\n');
                ctx.sink.push(line);
            })
        }

        Instruction::Statements { statements, .. } => statements
            .iter()
            .try_for_each(|statement| execute_statement(statement, env, ctx)),

        Instruction::For {
            target,
            iterable,
            body,
            ..
        } => execute_for(target, iterable, body, env, ctx),

        Instruction::While {
            condition, body, ..
        } => execute_while(condition, body, env, ctx),

        Instruction::If { branches } => execute_if(branches, env, ctx),
    };

    // Attach the instruction's location to errors that don't already have one
    result.map_err(|e| e.anchor(instruction.line(), instruction.span(), ctx.source_id))
}

fn execute_for(
    target: &Target,
    iterable: &Value,
    body: &[Instruction],
    env: &mut Environment,
    ctx: &mut RenderContext<'_>,
) -> Result<(), DiagnosticError> {
    // Ranges are stepped rather than collected up front.
    let items = evaluate(iterable, env, ctx, 0)?.elements()?;
    for item in items {
        bind_target(target, item, env)?;
        execute_block(body, env, ctx)?;
    }
    Ok(())
}

fn execute_while(
    condition: &Value,
    body: &[Instruction],
    env: &mut Environment,
    ctx: &mut RenderContext<'_>,
) -> Result<(), DiagnosticError> {
    while evaluate(condition, env, ctx, 0)?.is_truthy() {
        execute_block(body, env, ctx)?;
    }
    Ok(())
}

/// Run the body of the first branch whose condition holds.
fn execute_if(
    branches: &[Branch],
    env: &mut Environment,
    ctx: &mut RenderContext<'_>,
) -> Result<(), DiagnosticError> {
    for branch in branches {
        let taken = match &branch.condition {
            None => true,
            Some(condition) => evaluate(condition, env, ctx, 0)
                .map_err(|e| e.anchor(branch.line, branch.span.clone(), ctx.source_id))?
                .is_truthy(),
        };
        if taken {
            return execute_block(&branch.body, env, ctx);
        }
    }
    Ok(())
}

fn execute_statement(
    statement: &Statement,
    env: &mut Environment,
    ctx: &mut RenderContext<'_>,
) -> Result<(), DiagnosticError> {
    match statement {
        Statement::Pass => {}

        Statement::Expression(value) => {
            evaluate(value, env, ctx, 0)?;
        }

        Statement::Assignment { target, value } => {
            let val = evaluate(value, env, ctx, 0)?;
            bind_target(target, val, env)?;
        }

        Statement::IndexAssignment {
            variable,
            key,
            value,
        } => {
            let val = evaluate(value, env, ctx, 0)?;
            let key = evaluate(key, env, ctx, 0)?;
            match env.get_variable_mut(variable) {
                Some(RuntimeValue::List(items)) => {
                    let index = normalize_index(&key, items.len())?;
                    items[index] = val;
                }
                Some(RuntimeValue::Dict(entries)) => dict_insert(entries, key, val),
                Some(other) => {
                    return Err(
                        RuntimeError::type_error("a list or dict", other.type_name()).into(),
                    );
                }
                None => return Err(RuntimeError::UndefinedVariable(variable.clone()).into()),
            }
        }

        Statement::AugmentedAssignment {
            variable,
            operator,
            value,
        } => {
            let current = env
                .get_variable(variable)
                .cloned()
                .ok_or_else(|| RuntimeError::UndefinedVariable(variable.clone()))?;
            let rhs = evaluate(value, env, ctx, 0)?;
            let updated = eval_binary_op(operator, &current, &rhs)?;
            env.set_variable(variable, updated);
        }
    }
    Ok(())
}
