use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use spool::parser::Parser;

use crate::error::{DiagnosticError, RuntimeError};
use crate::executor::{RenderContext, execute_nested};

/// Maximum nesting of `include` calls.
pub const MAX_INCLUDE_DEPTH: usize = 64;

/// Where nested templates come from.
pub trait SourceLoader {
    fn exists(&self, path: &Path) -> bool;
    fn load(&self, path: &Path) -> io::Result<String>;
}

/// Reads templates from the filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsLoader;

impl SourceLoader for FsLoader {
    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn load(&self, path: &Path) -> io::Result<String> {
        fs::read_to_string(path)
    }
}

/// First `dir/path` that exists in the search path, or `path` unchanged.
pub fn resolve(path: &str, include_dirs: &[PathBuf], loader: &dyn SourceLoader) -> PathBuf {
    for dir in include_dirs {
        let candidate = dir.join(path);
        if loader.exists(&candidate) {
            log::debug!("include '{}' resolved to {}", path, candidate.display());
            return candidate;
        }
        log::debug!("include '{}' not found in {}", path, dir.display());
    }
    PathBuf::from(path)
}

/// Render `path` with the caller's parameters and append the result to the
/// caller's sink as one fragment.
pub fn include(path: &str, ctx: &mut RenderContext<'_>) -> Result<(), DiagnosticError> {
    if ctx.include_depth >= MAX_INCLUDE_DEPTH {
        return Err(RuntimeError::StackOverflow.into());
    }

    let resolved = resolve(path, &ctx.options.include_dirs, ctx.loader);
    let source = ctx
        .loader
        .load(&resolved)
        .map_err(|e| {
            RuntimeError::IoError(format!("cannot read '{}': {}", resolved.display(), e))
        })?;

    let program = Parser::new(source, ctx.source_id).parse().map_err(|errs| {
        RuntimeError::IncludeParse {
            path: path.to_string(),
            messages: errs.iter().map(|e| e.to_string()).collect(),
        }
    })?;

    let text = execute_nested(&program, ctx).map_err(|e| e.into_nested(path))?;
    // An empty file contributes no line at all.
    if !text.is_empty() {
        ctx.sink.push(text);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct MapLoader(HashMap<PathBuf, String>);

    impl SourceLoader for MapLoader {
        fn exists(&self, path: &Path) -> bool {
            self.0.contains_key(path)
        }

        fn load(&self, path: &Path) -> io::Result<String> {
            self.0
                .get(path)
                .cloned()
                .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))
        }
    }

    #[test]
    fn first_matching_directory_wins() {
        let loader = MapLoader(HashMap::from([
            (PathBuf::from("b/x.tpl"), String::new()),
            (PathBuf::from("c/x.tpl"), String::new()),
        ]));
        let dirs = vec![PathBuf::from("a"), PathBuf::from("b"), PathBuf::from("c")];
        assert_eq!(resolve("x.tpl", &dirs, &loader), PathBuf::from("b/x.tpl"));
    }

    #[test]
    fn unresolved_path_is_used_as_given() {
        let loader = MapLoader(HashMap::new());
        assert_eq!(
            resolve("missing.tpl", &[PathBuf::from("a")], &loader),
            PathBuf::from("missing.tpl")
        );
    }
}
