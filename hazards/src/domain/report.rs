use std::io;

/// Where scenarios send their narrative. Implementations decide the styling.
#[cfg_attr(test, mockall::automock)]
pub trait Reporter {
    fn section(&mut self, title: &str) -> io::Result<()>;

    fn line(&mut self, text: &str) -> io::Result<()>;

    /// A labeled before/after comparison. `differs` is computed by the caller.
    fn comparison(&mut self, label: &str, before: &str, after: &str, differs: bool) -> io::Result<()>;
}
