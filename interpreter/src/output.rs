/// How sink fragments are flattened into the rendered text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NewlineMode {
    /// Strip one trailing `\n` from every fragment and join with `\n`.
    #[default]
    Normalize,
    /// Concatenate fragments verbatim.
    Preserve,
}

/// Append-only accumulator of rendered text fragments for one run.
#[derive(Debug, Default)]
pub struct OutputSink {
    fragments: Vec<String>,
}

impl OutputSink {
    pub fn new() -> Self {
        OutputSink::default()
    }

    pub fn push(&mut self, fragment: impl Into<String>) {
        self.fragments.push(fragment.into());
    }

    pub(crate) fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn finish(self, mode: NewlineMode) -> String {
        match mode {
            NewlineMode::Preserve => self.fragments.concat(),
            NewlineMode::Normalize => self
                .fragments
                .iter()
                .map(|f| f.strip_suffix('\n').unwrap_or(f))
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}
