use crate::span::Span;
use std::fmt;
use std::path::PathBuf;

/// Coarse classification used by hosts to react to specific failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Unknown,
    VariableNotFound,
}

/// Which stage raised the error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    Syntax,
    Runtime,
    Interpreter,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCode::Syntax => write!(f, "SyntaxError"),
            ErrorCode::Runtime => write!(f, "RuntimeError"),
            ErrorCode::Interpreter => write!(f, "InterpreterError"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{code}: {message}")]
pub struct VineError {
    pub message: String,
    pub kind: ErrorKind,
    pub code: ErrorCode,
    pub span: Option<Span>,
    pub file: Option<PathBuf>,
    pub hint: Option<String>,
}

impl VineError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: ErrorKind::Unknown,
            code,
            span: None,
            file: None,
            hint: None,
        }
    }

    pub fn syntax(message: impl Into<String>, span: Span) -> Self {
        Self::new(ErrorCode::Syntax, message).at(span)
    }

    pub fn runtime(message: impl Into<String>, span: Span) -> Self {
        Self::new(ErrorCode::Runtime, message).at(span)
    }

    pub fn interpreter(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Interpreter, message)
    }

    pub fn not_declared(name: &str) -> Self {
        Self {
            kind: ErrorKind::VariableNotFound,
            ..Self::new(ErrorCode::Runtime, format!("'{}' is not declared", name))
        }
    }

    /// Attaches a position unless one is already known.
    pub fn at(mut self, span: Span) -> Self {
        if self.span.is_none() {
            self.span = Some(span);
        }
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Attaches the originating file unless one is already known.
    pub fn in_file(mut self, file: Option<PathBuf>) -> Self {
        if self.file.is_none() {
            self.file = file;
        }
        self
    }
}

/// Failures recorded during one parse or interpret pass, innermost first.
#[derive(Debug, Default)]
pub struct ErrorStack {
    errors: Vec<VineError>,
}

impl ErrorStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `error` and hands it back so call sites can `return Err(stack.push(..))`.
    pub fn push(&mut self, error: VineError) -> VineError {
        self.errors.push(error.clone());
        error
    }

    pub fn innermost(&self) -> Option<&VineError> {
        self.errors.first()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn clear(&mut self) {
        self.errors.clear();
    }

    /// Surfaces the innermost recorded error, falling back to `fallback`, and resets the stack.
    pub fn surface(&mut self, fallback: VineError) -> VineError {
        let innermost = if self.errors.is_empty() {
            fallback
        } else {
            self.errors.swap_remove(0)
        };
        self.errors.clear();
        innermost
    }
}
