use std::env;
use std::path::PathBuf;
use std::process::exit;

use lox_interpreter_rs::error::{self, Error};
use lox_interpreter_rs::lox::Lox;

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let mut lox = Lox::new();

    match &args[1..] {
        [] => {
            if let Err(err) = lox.run_repl() {
                eprintln!("{err}");
                exit(74);
            }
        }
        [mode] if mode == "test" => {
            if let Err(err) = lox.run_test_mode() {
                report_and_exit(&err);
            }
        }
        [path] => match lox.run_file(&PathBuf::from(path)) {
            Ok(()) => {
                if error::had_error() {
                    exit(65);
                }
                if error::had_runtime_error() {
                    exit(70);
                }
            }
            Err(err) => report_and_exit(&err),
        },
        _ => {
            eprintln!("Usage: jlox [script]");
            exit(64);
        }
    }
}

fn report_and_exit(err: &Error) -> ! {
    match err {
        Error::Runtime { .. } => exit(70),
        Error::Parse => exit(65),
        Error::Io(io_err) => {
            eprintln!("{io_err}");
            exit(74)
        }
        Error::Return { .. } => {
            unreachable!("a top-level return is a static error, not a propagated Err")
        }
    }
}
