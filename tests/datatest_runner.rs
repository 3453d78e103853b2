//! Golden fixture harness: runs every `tests/fixtures/*.lox` script through
//! the full scan → parse → resolve → interpret pipeline and diffs captured
//! stdout against the trailing `// Output: ...` comment block.
use std::error::Error;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};

use lox_interpreter_rs::lox::Lox;

/// A `Write` sink that appends to a shared buffer, handed to the interpreter
/// in place of real stdout so the fixture can assert on what it printed.
#[derive(Clone)]
struct CapturingWriter(Arc<Mutex<Vec<u8>>>);

impl Write for CapturingWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Splits a fixture into its Lox source and the expected stdout.
///
/// Expected output is given as one or more trailing `// Output: <line>`
/// comments at the end of the file; each becomes one line of expected output.
/// A fixture with no such comments expects empty output.
fn parse_fixture(content: &str) -> (String, String) {
    let lines: Vec<&str> = content.lines().collect();

    let split = lines
        .iter()
        .rposition(|line| !line.trim_start().starts_with("// Output:"))
        .map_or(0, |idx| idx + 1);

    let source = lines[..split].join("\n");
    let expected = lines[split..]
        .iter()
        .map(|line| line.trim_start().trim_start_matches("// Output:").trim_start())
        .collect::<Vec<_>>()
        .join("\n");

    (source, expected)
}

fn run_fixture_test(path: &Path) -> Result<(), Box<dyn Error>> {
    let content = fs::read_to_string(path)?;
    let (source, expected) = parse_fixture(&content);

    let output = Arc::new(Mutex::new(Vec::new()));
    let mut lox = Lox::with_stdout(Box::new(CapturingWriter(output.clone())));

    lox.run(source)?;

    let actual = String::from_utf8(output.lock().unwrap().clone())?;
    let actual = actual.trim_end_matches('\n');

    assert_eq!(
        actual,
        expected,
        "[{}] stdout mismatch",
        path.display()
    );
    Ok(())
}

datatest_stable::harness!(run_fixture_test, "tests/fixtures", r"^.*\.lox$");
