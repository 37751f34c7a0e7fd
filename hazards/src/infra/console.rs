use crate::domain::report::Reporter;
use std::io::{self, Write};

/// Plain text reporter. `main` hands it stdout, tests hand it a `Vec<u8>`.
pub struct ConsoleReporter<W: Write> {
    out: W,
}

impl<W: Write> ConsoleReporter<W> {
    pub fn new(out: W) -> Self {
        ConsoleReporter { out }
    }
}

impl ConsoleReporter<Vec<u8>> {
    pub fn into_text(self) -> String {
        String::from_utf8_lossy(&self.out).into_owned()
    }
}

impl<W: Write> Reporter for ConsoleReporter<W> {
    fn section(&mut self, title: &str) -> io::Result<()> {
        writeln!(self.out)?;
        writeln!(self.out, "=== {} ===", title)
    }

    fn line(&mut self, text: &str) -> io::Result<()> {
        writeln!(self.out, "{}", text)
    }

    fn comparison(&mut self, label: &str, before: &str, after: &str, differs: bool) -> io::Result<()> {
        let verdict = if differs { "CHANGED" } else { "unchanged" };
        writeln!(self.out, "{}: before = {} | after = {} -> {}", label, before, after, verdict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comparison_is_labeled() {
        let mut reporter = ConsoleReporter::new(Vec::new());
        reporter.section("demo").unwrap();
        reporter.comparison("&v[0]", "0x10", "0x40", true).unwrap();
        reporter.comparison("data", "0x10", "0x10", false).unwrap();

        let text = reporter.into_text();
        assert!(text.contains("=== demo ==="));
        assert!(text.contains("&v[0]: before = 0x10 | after = 0x40 -> CHANGED"));
        assert!(text.contains("data: before = 0x10 | after = 0x10 -> unchanged"));
    }
}
