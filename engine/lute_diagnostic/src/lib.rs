//! Diagnostic and error reporting for the Lute engine.
//!
//! Two taxonomies flow through here:
//!
//! - *Parse errors* abort the current top-level unit only; the parser
//!   reports them with the source line attached.
//! - *Runtime errors* are non-fatal: the evaluator degrades the offending
//!   expression to the empty value and reports through [`Reporter`], which
//!   gates output on the configured verbosity and a per-run stack-trace
//!   budget.
//!
//! Fatal conditions (internal invariant violations) do not come through
//! this crate at all; they panic, because they indicate engine bugs.

use std::fmt;

/// Severity level for diagnostics.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub enum Severity {
    Error,
    Warning,
    Note,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Note => write!(f, "note"),
        }
    }
}

/// One diagnostic message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    /// 1-based source line, where one is known.
    pub line: Option<u32>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>) -> Self {
        Diagnostic {
            severity: Severity::Error,
            message: message.into(),
            line: None,
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Diagnostic {
            severity: Severity::Warning,
            message: message.into(),
            line: None,
        }
    }

    pub fn note(message: impl Into<String>) -> Self {
        Diagnostic {
            severity: Severity::Note,
            message: message.into(),
            line: None,
        }
    }

    /// Attach the source line the diagnostic refers to.
    pub fn with_line(mut self, line: u32) -> Self {
        self.line = Some(line);
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "{}: line {}: {}", self.severity, line, self.message),
            None => write!(f, "{}: {}", self.severity, self.message),
        }
    }
}

/// Reporting configuration consulted by the evaluator's error path.
///
/// Not part of the language semantics: a program behaves identically at
/// every verbosity, only the printed output changes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DiagConfig {
    /// 0 = silent, 1 = errors, 2 = + warnings, 3 = + notes.
    pub verbosity: u8,
    /// Call frames to print per runtime-error trace.
    pub max_trace_frames: usize,
}

impl Default for DiagConfig {
    fn default() -> Self {
        DiagConfig {
            verbosity: 1,
            max_trace_frames: 8,
        }
    }
}

impl DiagConfig {
    /// Whether a diagnostic of `severity` passes the verbosity gate.
    pub fn allows(&self, severity: Severity) -> bool {
        let needed = match severity {
            Severity::Error => 1,
            Severity::Warning => 2,
            Severity::Note => 3,
        };
        self.verbosity >= needed
    }
}

/// Sink for gated diagnostics.
pub trait Emitter {
    fn emit(&mut self, diagnostic: &Diagnostic);
}

/// Emitter that prints to stderr (the CLI default).
#[derive(Default)]
pub struct StderrEmitter;

impl Emitter for StderrEmitter {
    fn emit(&mut self, diagnostic: &Diagnostic) {
        eprintln!("{diagnostic}");
    }
}

/// Emitter that collects diagnostics, for tests and embedders.
#[derive(Default)]
pub struct BufferEmitter {
    diagnostics: Vec<Diagnostic>,
}

impl BufferEmitter {
    pub fn new() -> Self {
        BufferEmitter::default()
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn take(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }
}

impl Emitter for BufferEmitter {
    fn emit(&mut self, diagnostic: &Diagnostic) {
        self.diagnostics.push(diagnostic.clone());
    }
}

/// Severity gate plus emitter, owned by the interpreter.
pub struct Reporter {
    config: DiagConfig,
    emitter: Box<dyn Emitter>,
    errors: usize,
}

impl Reporter {
    pub fn new(config: DiagConfig, emitter: Box<dyn Emitter>) -> Self {
        Reporter {
            config,
            emitter,
            errors: 0,
        }
    }

    /// Stderr-backed reporter with the given configuration.
    pub fn stderr(config: DiagConfig) -> Self {
        Reporter::new(config, Box::new(StderrEmitter))
    }

    pub fn config(&self) -> DiagConfig {
        self.config
    }

    /// Report one diagnostic, counting errors and gating on verbosity.
    pub fn report(&mut self, diagnostic: &Diagnostic) {
        if diagnostic.severity == Severity::Error {
            self.errors += 1;
        }
        if self.config.allows(diagnostic.severity) {
            self.emitter.emit(diagnostic);
        }
    }

    /// Errors reported so far, gated or not.
    pub fn error_count(&self) -> usize {
        self.errors
    }
}
