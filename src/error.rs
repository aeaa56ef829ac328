//! error defines the taxonomy every fallible operation in this crate
//! returns: a `thiserror`-derived `MakeError` enum, grounded on
//! `pymake`'s `MakeError`/`ParseError` class hierarchy but flattened
//! into kind enums rather than a subclass tree.

use std::rc::Rc;

use thiserror::Error;

/// ParseErrorKind enumerates the subkinds spec.md §7 names for
/// tokenizer/directive failures.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum ParseErrorKind {
    #[error("recipe commences before first target")]
    RecipeCommencesBeforeFirstTarget,

    #[error("missing separator")]
    MissingSeparator,

    #[error("invalid function arguments: {0}")]
    InvalidFunctionArguments(String),

    #[error("unterminated variable reference")]
    UnterminatedVarRef,

    #[error("unterminated conditional")]
    UnterminatedConditional,

    #[error("unterminated define")]
    UnterminatedDefine,

    #[error("extraneous else")]
    ExtraneousElse,

    #[error("extraneous endif")]
    ExtraneousEndif,

    #[error("{0}")]
    Other(String),
}

/// EvalErrorKind enumerates the subkinds spec.md §7 names for evaluator
/// failures.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum EvalErrorKind {
    #[error("undefined variable: {0}")]
    UndefinedVariableFatal(String),

    #[error("recursive variable \"{0}\" references itself (eventually)")]
    RecursiveVariableLoop(String),

    #[error("{file}:{row}: *** {message}. Stop.")]
    UserError { file: Rc<str>, row: usize, message: String },
}

/// MakeError is the single error type returned across this crate's
/// public API.
#[derive(Debug, Error)]
pub enum MakeError {
    #[error("*** filename=\"{file}\" pos=({row}, {col}): {kind}")]
    Parse {
        file: Rc<str>,
        row: usize,
        col: usize,
        kind: ParseErrorKind,
    },

    #[error("{0}")]
    Eval(EvalErrorKind),

    #[error("shell: {0}")]
    Shell(String),

    #[error("io error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl MakeError {
    pub fn parse(file: Rc<str>, row: usize, col: usize, kind: ParseErrorKind) -> MakeError {
        MakeError::Parse { file, row, col, kind }
    }

    pub fn eval(kind: EvalErrorKind) -> MakeError {
        MakeError::Eval(kind)
    }
}

pub type MakeResult<T> = Result<T, MakeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_format() {
        let e = MakeError::parse(Rc::from("Makefile"), 3, 1, ParseErrorKind::MissingSeparator);
        assert_eq!(
            e.to_string(),
            "*** filename=\"Makefile\" pos=(3, 1): missing separator"
        );
    }

    #[test]
    fn test_eval_error_user_error_format() {
        let e = MakeError::eval(EvalErrorKind::UserError {
            file: Rc::from("Makefile"),
            row: 5,
            message: "boom".to_string(),
        });
        assert_eq!(e.to_string(), "Makefile:5: *** boom. Stop.");
    }
}
