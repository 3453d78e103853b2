//! The driver that wires scanner → parser → resolver → interpreter together
//! and exposes the three run modes `main.rs` dispatches to (spec.md §6).
use std::fs;
use std::io::{self, BufRead, Write as _};
use std::mem;
use std::path::Path;
use std::process::exit;

use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::error::{self, Error};
use crate::interpreter::Interpreter;
use crate::parser::Parser;
use crate::resolver::Resolver;
use crate::scanner::Scanner;

pub struct Lox {
    interpreter: Interpreter,
}

impl Default for Lox {
    fn default() -> Self {
        Self::new()
    }
}

impl Lox {
    pub fn new() -> Self {
        Lox {
            interpreter: Interpreter::new(),
        }
    }

    /// Builds a `Lox` that writes `print` output to a caller-supplied sink
    /// instead of real stdout; used by the golden fixture test harness.
    pub fn with_stdout(output: Box<dyn std::io::Write>) -> Self {
        Lox {
            interpreter: Interpreter::with_output(output),
        }
    }

    pub fn run_file(&mut self, path: &Path) -> Result<(), Error> {
        let source = fs::read_to_string(path)?;
        self.run(source)
    }

    /// Runs one chunk of source through the full pipeline. Static errors
    /// (scan/parse/resolve) are reported as a side effect and this returns
    /// `Ok(())` without interpreting, per the book's "never run code that
    /// had a static error" rule; `error::had_error()` tells the caller it
    /// happened.
    pub fn run(&mut self, source: String) -> Result<(), Error> {
        error::reset_flags();

        let mut scanner = Scanner::new(source);
        let tokens = scanner.scan_tokens().clone();

        let mut parser = Parser::new(&tokens);
        let statements = parser.parse()?;

        if error::had_error() {
            return Ok(());
        }

        // The resolver has a reference to the interpreter and pokes the
        // resolution data directly into it as it walks over variables. When
        // the interpreter runs next, it has everything it needs.
        let mut resolver = Resolver::new(&mut self.interpreter);
        resolver.resolve_stmts(&statements);

        if error::had_error() {
            return Ok(());
        }

        self.interpreter.interpret(&statements)
    }

    /// Interactive REPL: `rustyline` for history/editing, a hand-rolled
    /// completeness check for multi-line input.
    pub fn run_repl(&mut self) -> Result<(), Error> {
        let mut editor = DefaultEditor::new()
            .map_err(|e| Error::Io(io::Error::new(io::ErrorKind::Other, e.to_string())))?;
        let history_path = ".lox_history";
        let _ = editor.load_history(history_path);

        let mut buffer = String::new();
        loop {
            let prompt = if buffer.is_empty() { "> " } else { "  " };
            match editor.readline(prompt) {
                Ok(line) => {
                    if buffer.is_empty() {
                        match line.trim() {
                            "exit" => break,
                            "clear" => {
                                print!("\x1B[2J\x1B[1;1H");
                                let _ = io::stdout().flush();
                                continue;
                            }
                            _ => {}
                        }
                    }

                    let _ = editor.add_history_entry(line.as_str());
                    buffer.push_str(&line);
                    buffer.push('\n');

                    if is_complete(&buffer) {
                        let _ = self.run(mem::take(&mut buffer));
                    }
                }
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
                Err(err) => {
                    log::warn!("REPL read error: {err}");
                    break;
                }
            }
        }

        let _ = editor.save_history(history_path);
        Ok(())
    }

    /// `jlox test`: same completeness protocol as the interactive REPL, but
    /// reading plain lines from stdin (so it works when piped) and exiting
    /// the process with the spec's static/runtime exit code on first error,
    /// instead of continuing the session.
    pub fn run_test_mode(&mut self) -> Result<(), Error> {
        let stdin = io::stdin();
        let mut buffer = String::new();

        for line in stdin.lock().lines() {
            let line = line?;
            buffer.push_str(&line);
            buffer.push('\n');

            if is_complete(&buffer) {
                let chunk = mem::take(&mut buffer);
                self.run(chunk)?;
                if error::had_error() {
                    exit(65);
                }
                if error::had_runtime_error() {
                    exit(70);
                }
            }
        }

        Ok(())
    }
}

/// Brace/paren balance (ignoring string-literal and line-comment contents)
/// plus the trailing-punctuation rule from spec.md §6.
fn is_complete(buffer: &str) -> bool {
    let trimmed = buffer.trim_end();
    if trimmed.is_empty() {
        return false;
    }

    if buffer.ends_with("\n\n\n") {
        return true;
    }

    let mut depth = 0i32;
    let mut in_string = false;
    let mut chars = trimmed.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' => in_string = !in_string,
            '/' if !in_string && chars.peek() == Some(&'/') => {
                while let Some(&next) = chars.peek() {
                    if next == '\n' {
                        break;
                    }
                    chars.next();
                }
            }
            '(' | '{' if !in_string => depth += 1,
            ')' | '}' if !in_string => depth -= 1,
            _ => {}
        }
    }

    if depth > 0 || in_string {
        return false;
    }

    matches!(trimmed.chars().last(), Some('}') | Some(';'))
}

#[cfg(test)]
mod tests {
    use super::is_complete;

    #[test]
    fn single_statement_is_complete() {
        assert!(is_complete("print 1 + 2;\n"));
    }

    #[test]
    fn unbalanced_brace_is_incomplete() {
        assert!(!is_complete("fun f() {\n"));
    }

    #[test]
    fn balanced_block_is_complete() {
        assert!(is_complete("fun f() {\n  print 1;\n}\n"));
    }

    #[test]
    fn trailing_whitespace_after_terminator_is_complete() {
        assert!(is_complete("print 1 + 2;  \n"));
    }

    #[test]
    fn brace_inside_a_string_does_not_count() {
        assert!(is_complete(r#"print "{";"#));
    }

    #[test]
    fn bare_expression_without_semicolon_is_incomplete() {
        assert!(!is_complete("1 + 2"));
    }
}
