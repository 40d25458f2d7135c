use color_print::cprintln;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Unknown opcode: `{0}`")]
    UnknownOpcode(String),

    #[error("Undefined label: `{0}`")]
    UnresolvedLabel(String, usize),

    #[error("Re-defined label: `{0}`")]
    DuplicateLabel(String),

    #[error("`{mnemonic}` expects `{expected}`, got `{got}`")]
    OperandShapeMismatch {
        mnemonic: String,
        expected: String,
        got: String,
    },

    #[error("Invalid register name: `{0}`")]
    InvalidRegisterName(String),

    #[error("Cannot parse `{0}` as a literal")]
    MalformedLiteral(String),

    #[error("Unknown directive: `{0}`")]
    UnknownDirective(String),

    #[error("Invalid label name: `{0}`")]
    InvalidLabel(String),

    #[error("Invalid graph: {0}")]
    InvalidGraph(String),

    #[error("Failed to access file: {0}")]
    IoFailure(String, #[source] std::io::Error),

    #[error("Failed to load ISA config: {0}")]
    Config(String, #[source] serde_yaml::Error),

    #[error(transparent)]
    Isa(gxarch::Error),
}

impl From<gxarch::Error> for Error {
    fn from(err: gxarch::Error) -> Self {
        match err {
            gxarch::Error::UnknownOpcode(name) => Error::UnknownOpcode(name),
            gxarch::Error::ShapeMismatch {
                mnemonic,
                expected,
                got,
            } => Error::OperandShapeMismatch {
                mnemonic,
                expected,
                got,
            },
            other => Error::Isa(other),
        }
    }
}

/// An error pinned to a 0-based source line, or to the whole run.
#[derive(Debug)]
pub struct Diag {
    pub line: Option<usize>,
    pub error: Error,
    /// Earlier line the error refers back to, e.g. a first label definition.
    pub note: Option<usize>,
}

impl Diag {
    pub fn at(line: usize, error: Error) -> Self {
        Diag {
            line: Some(line),
            error,
            note: None,
        }
    }

    pub fn global(error: Error) -> Self {
        Diag {
            line: None,
            error,
            note: None,
        }
    }

    pub fn with_note(mut self, line: usize) -> Self {
        self.note = Some(line);
        self
    }

    /// Print error with the offending source line underneath
    pub fn print(&self, file: &str, lines: &[&str]) {
        cprintln!("<red,bold>error</>: {}", self.error);
        if let Some(line) = self.line {
            print_location(file, lines, line);
        }
        if let Some(line) = self.note {
            cprintln!("<green,bold>note</>: first defined here");
            print_location(file, lines, line);
        }
    }
}

fn print_location(file: &str, lines: &[&str], line_idx: usize) {
    let line_num = line_idx + 1;
    let content = lines.get(line_idx).copied().unwrap_or("");
    cprintln!("     <blue>--></> <underline>{}:{}</>", file, line_num);
    cprintln!("      <blue>|</>");
    cprintln!(" <blue>{:>4} |</> {}", line_num, content);
    cprintln!("      <blue>|</>");
}

impl fmt::Display for Diag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "line {}: {}", line + 1, self.error),
            None => write!(f, "{}", self.error),
        }
    }
}

pub fn print_warning(message: &str) {
    cprintln!("<yellow,bold>warn</>: {}", message);
}
