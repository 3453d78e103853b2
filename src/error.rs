use std::fmt;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::object::Object;
use crate::token::{Token, TokenType};

/// Set once scanning/parsing/resolving reports a static error. Consulted by
/// the driver to decide whether to run the interpreter at all, and to pick
/// the process exit code.
pub static HAD_ERROR: AtomicBool = AtomicBool::new(false);

/// Set once the interpreter raises a runtime error that reaches the driver.
pub static HAD_RUNTIME_ERROR: AtomicBool = AtomicBool::new(false);

pub fn reset_flags() {
    HAD_ERROR.store(false, Ordering::Relaxed);
    HAD_RUNTIME_ERROR.store(false, Ordering::Relaxed);
}

pub fn had_error() -> bool {
    HAD_ERROR.load(Ordering::Relaxed)
}

pub fn had_runtime_error() -> bool {
    HAD_RUNTIME_ERROR.load(Ordering::Relaxed)
}

#[derive(Debug)]
pub enum Error {
    Io(io::Error),
    /// A static error was already reported to stderr; the driver just needs
    /// to know execution can't proceed.
    Parse,
    Runtime { token: Token, message: String },
    /// Not an error: the non-local exit a `return` statement unwinds through.
    /// Must never reach the script driver.
    Return { value: Object },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "{e}"),
            Error::Parse => write!(f, "parse error"),
            Error::Runtime { message, .. } => write!(f, "{message}"),
            Error::Return { .. } => write!(f, "<non-local return>"),
        }
    }
}

impl std::error::Error for Error {}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

/// Scanner-level error: no token to point at yet, only a line.
pub fn error(line: i32, message: &str) {
    report(line, "", message);
    HAD_ERROR.store(true, Ordering::Relaxed);
}

/// Parser/resolver-level error: we have a token, so we can say where.
pub fn parser_error(token: &Token, message: &str) {
    if token.token_type == TokenType::Eof {
        report(token.line, " at end", message);
    } else {
        report(token.line, &format!(" at '{}'", token.lexeme), message);
    }
    HAD_ERROR.store(true, Ordering::Relaxed);
}

fn report(line: i32, where_: &str, message: &str) {
    log::debug!("static error at line {line}");
    eprintln!("[line {line}] Error{where_}: {message}");
}

/// Runtime error: reported in the `MESSAGE\n[line N]` form spec'd for §7.
pub fn runtime_error(token: &Token, message: &str) {
    log::debug!("runtime error at line {}", token.line);
    eprintln!("{message}\n[line {}]", token.line);
    HAD_RUNTIME_ERROR.store(true, Ordering::Relaxed);
}
