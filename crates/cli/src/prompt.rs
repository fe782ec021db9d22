use camsweep_core::error::{Error, Result};
use camsweep_core::prompt::Prompter;
use dialoguer::{Input, Password};

/// Terminal prompts for re-authentication.
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn notify(&self, message: &str) {
        eprintln!("{message}");
    }

    fn input(&self, prompt: &str) -> Result<String> {
        Input::<String>::new()
            .with_prompt(prompt)
            .interact_text()
            .map_err(|e| Error::Prompt(e.to_string()))
    }

    fn secret(&self, prompt: &str) -> Result<String> {
        Password::new()
            .with_prompt(prompt)
            .interact()
            .map_err(|e| Error::Prompt(e.to_string()))
    }
}
