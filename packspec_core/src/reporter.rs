//! Reporter sink for feature outcomes

use std::fmt;
use std::io::{self, Write};

/// Why a feature failed
#[derive(Debug, Clone, PartialEq)]
pub enum Failure {
    /// Invocation raised and no error was expected
    Exception(String),
    /// Actual and expected results differ
    Mismatch { actual: String, expected: String },
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Failure::Exception(message) => write!(f, "Exception: {}", message),
            Failure::Mismatch { actual, expected } => {
                write!(f, "Assertion: {} != {}", actual, expected)
            }
        }
    }
}

/// Receives run events in feature order
pub trait Reporter {
    /// A comment feature
    fn heading(&mut self, text: &str) -> io::Result<()>;

    /// Informational line from the runner
    fn comment(&mut self, text: &str) -> io::Result<()>;

    fn skipped(&mut self, text: &str) -> io::Result<()>;

    fn pass(&mut self, text: &str) -> io::Result<()>;

    fn fail(&mut self, text: &str, failure: &Failure) -> io::Result<()>;

    /// End of a specification; `total` excludes comments and skipped tests
    fn summary(&mut self, package: &str, passed: usize, total: usize) -> io::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineKind {
    Heading,
    Comment,
    Test,
    Summary,
}

/// Plain text reporter
///
/// A blank line separates runs of different kinds of lines.
pub struct ConsoleReporter<W: Write> {
    out: W,
    last: Option<LineKind>,
}

impl ConsoleReporter<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> ConsoleReporter<W> {
    pub fn new(out: W) -> Self {
        Self { out, last: None }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn line(&mut self, kind: LineKind, text: &str) -> io::Result<()> {
        if self.last.is_some_and(|last| last != kind) {
            writeln!(self.out)?;
        }
        self.last = Some(kind);
        writeln!(self.out, "{}", text)
    }
}

impl<W: Write> Reporter for ConsoleReporter<W> {
    fn heading(&mut self, text: &str) -> io::Result<()> {
        self.line(LineKind::Heading, &format!(" # {}", text))
    }

    fn comment(&mut self, text: &str) -> io::Result<()> {
        self.line(LineKind::Comment, text)
    }

    fn skipped(&mut self, text: &str) -> io::Result<()> {
        self.line(LineKind::Test, &format!(" \u{2013}  {}", text))
    }

    fn pass(&mut self, text: &str) -> io::Result<()> {
        self.line(LineKind::Test, &format!(" \u{2714}  {}", text))
    }

    fn fail(&mut self, text: &str, failure: &Failure) -> io::Result<()> {
        self.line(LineKind::Test, &format!(" \u{2718}  {}\n{}", text, failure))
    }

    fn summary(&mut self, package: &str, passed: usize, total: usize) -> io::Result<()> {
        let mark = if passed == total { '\u{2714}' } else { '\u{2718}' };
        self.line(
            LineKind::Summary,
            &format!(" {}  {}: {}/{}", mark, package, passed, total),
        )
    }
}

/// One recorded reporter event
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Heading(String),
    Comment(String),
    Skipped(String),
    Pass(String),
    Fail(String, Failure),
    Summary {
        package: String,
        passed: usize,
        total: usize,
    },
}

/// Reporter that keeps events in memory
#[derive(Debug, Default)]
pub struct Recorder {
    pub events: Vec<Event>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Reporter for Recorder {
    fn heading(&mut self, text: &str) -> io::Result<()> {
        self.events.push(Event::Heading(text.to_string()));
        Ok(())
    }

    fn comment(&mut self, text: &str) -> io::Result<()> {
        self.events.push(Event::Comment(text.to_string()));
        Ok(())
    }

    fn skipped(&mut self, text: &str) -> io::Result<()> {
        self.events.push(Event::Skipped(text.to_string()));
        Ok(())
    }

    fn pass(&mut self, text: &str) -> io::Result<()> {
        self.events.push(Event::Pass(text.to_string()));
        Ok(())
    }

    fn fail(&mut self, text: &str, failure: &Failure) -> io::Result<()> {
        self.events
            .push(Event::Fail(text.to_string(), failure.clone()));
        Ok(())
    }

    fn summary(&mut self, package: &str, passed: usize, total: usize) -> io::Result<()> {
        self.events.push(Event::Summary {
            package: package.to_string(),
            passed,
            total,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_console_separates_kinds_with_blank_lines() {
        let mut reporter = ConsoleReporter::new(Vec::new());
        reporter.heading("Package").unwrap();
        reporter.pass("a == 1").unwrap();
        reporter.skipped("b").unwrap();
        reporter
            .fail(
                "c == 2",
                &Failure::Mismatch {
                    actual: "3".to_string(),
                    expected: "2".to_string(),
                },
            )
            .unwrap();
        reporter.summary("Package", 1, 2).unwrap();

        let output = String::from_utf8(reporter.into_inner()).unwrap();
        assert_eq!(
            output,
            " # Package\n\n \u{2714}  a == 1\n \u{2013}  b\n \u{2718}  c == 2\nAssertion: 3 != 2\n\n \u{2718}  Package: 1/2\n"
        );
    }

    #[test]
    fn test_blank_line_state_is_per_reporter() {
        let mut first = ConsoleReporter::new(Vec::new());
        first.heading("One").unwrap();
        let mut second = ConsoleReporter::new(Vec::new());
        second.pass("x").unwrap();
        assert_eq!(String::from_utf8(second.into_inner()).unwrap(), " \u{2714}  x\n");
    }

    #[test]
    fn test_exception_failure_display() {
        let failure = Failure::Exception("boom".to_string());
        assert_eq!(failure.to_string(), "Exception: boom");
    }
}
