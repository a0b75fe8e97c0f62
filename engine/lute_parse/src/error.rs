//! Parse errors and the native-signature table entry.

use lute_diagnostic::Diagnostic;
use std::fmt;

/// A syntax error. Aborts the current top-level unit only.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseError {
    pub message: String,
    /// 1-based source line.
    pub line: u32,
}

impl ParseError {
    /// Render as a diagnostic for the configured emitter.
    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic::error(self.message.clone()).with_line(self.line)
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "syntax error at line {}: {}", self.line, self.message)
    }
}

impl std::error::Error for ParseError {}

/// One entry of the native-function table, as the parser sees it: the
/// name scripts bind with `internal "name"`, the dispatch id, and the
/// declared arity range. The entry points themselves live in the
/// evaluator's registry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NativeSig {
    pub name: String,
    pub id: u16,
    pub min_args: u8,
    pub max_args: u8,
}
