use crate::store::{NodeKind, RegistryError};
use thiserror::Error;

/// Everything that aborts a compilation. Each variant maps to a fixed
/// negative code (see [`CompileError::code`]) for callers that speak in
/// status codes.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompileError {
    #[error("invalid line '{0}'")]
    InvalidLine(String),
    #[error("'{0}' is not declared")]
    Undeclared(String),
    #[error("'{0}' referenced before defined")]
    UsedBeforeDefinition(String),
    #[error("'{0}' is already declared")]
    Redeclaration(String),
    #[error("'{0}' is already defined")]
    Redefinition(String),
    #[error("unknown declaration kind '{0}'")]
    UnknownKind(String),
    #[error("output destination is not open")]
    OutputNotOpen,
    #[error("'{name}' is declared {kind} and cannot be defined")]
    DefineSource { name: String, kind: NodeKind },
    #[error("cannot declare loss '{rejected}': '{existing}' is already the loss")]
    SecondLoss { existing: String, rejected: String },
    #[error("structural violation: {0}")]
    Structural(RegistryError),
    #[error("invalid variable name '{0}'")]
    InvalidName(String),
    #[error("i/o failure: {0}")]
    Io(String),
    #[error("line {line}: {source}")]
    AtLine { line: usize, source: Box<CompileError> },
}

impl CompileError {
    pub fn code(&self) -> i32 {
        match self {
            CompileError::InvalidLine(_) => -1,
            CompileError::Undeclared(_) => -2,
            CompileError::UsedBeforeDefinition(_) => -3,
            CompileError::Redeclaration(_) => -4,
            CompileError::Redefinition(_) => -5,
            CompileError::UnknownKind(_) => -6,
            CompileError::OutputNotOpen => -7,
            CompileError::DefineSource { .. } => -8,
            CompileError::SecondLoss { .. } => -9,
            CompileError::Structural(_) => -10,
            CompileError::InvalidName(_) => -11,
            CompileError::Io(_) => -12,
            CompileError::AtLine { source, .. } => source.code(),
        }
    }

    /// Attaches the 1-based source line, unless one is already attached.
    pub fn at_line(self, line: usize) -> Self {
        match self {
            located @ CompileError::AtLine { .. } => located,
            other => CompileError::AtLine { line, source: Box::new(other) },
        }
    }
}

impl From<std::io::Error> for CompileError {
    fn from(e: std::io::Error) -> Self {
        CompileError::Io(e.to_string())
    }
}

impl From<RegistryError> for CompileError {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::DuplicateName(name) => CompileError::Redeclaration(name),
            RegistryError::SecondLoss { existing, rejected } => {
                CompileError::SecondLoss { existing, rejected }
            }
            RegistryError::Unregistered(name) => CompileError::Undeclared(name),
            other => CompileError::Structural(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_distinct_and_negative() {
        let errors = vec![
            CompileError::InvalidLine(String::new()),
            CompileError::Undeclared(String::new()),
            CompileError::UsedBeforeDefinition(String::new()),
            CompileError::Redeclaration(String::new()),
            CompileError::Redefinition(String::new()),
            CompileError::UnknownKind(String::new()),
            CompileError::OutputNotOpen,
            CompileError::DefineSource { name: String::new(), kind: NodeKind::Input },
            CompileError::SecondLoss { existing: String::new(), rejected: String::new() },
            CompileError::Structural(RegistryError::Unregistered(String::new())),
            CompileError::InvalidName(String::new()),
            CompileError::Io(String::new()),
        ];
        let mut codes: Vec<i32> = errors.iter().map(CompileError::code).collect();
        assert!(codes.iter().all(|&c| c < 0));
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn test_line_context_keeps_code_and_message() {
        let err = CompileError::Redefinition("y".into()).at_line(7);
        assert_eq!(err.code(), -5);
        assert_eq!(err.to_string(), "line 7: 'y' is already defined");
        // Wrapping twice keeps the innermost location.
        assert_eq!(err.clone().at_line(9), err);
    }
}
