use crate::error::Result;

/// Interactive channel to the operator, used only when a stored session is
/// missing or no longer valid.
pub trait Prompter {
    /// Show an informational message (e.g. a URL to open).
    fn notify(&self, message: &str);

    /// Ask for a line of visible input.
    fn input(&self, prompt: &str) -> Result<String>;

    /// Ask for a secret; input is not echoed.
    fn secret(&self, prompt: &str) -> Result<String>;
}
