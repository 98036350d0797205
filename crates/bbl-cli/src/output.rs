use bbl_commands::{Output, Prompter};
use dialoguer::Confirm;
use tracing::warn;

/// Command results go to stdout; logs go to stderr.
pub struct Stdout;

impl Output for Stdout {
    fn print(&self, text: &str) {
        println!("{text}");
    }
}

/// Asks on the terminal. Anything but an explicit yes is a no.
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn confirm(&self, message: &str) -> bool {
        match Confirm::new().with_prompt(message).default(false).interact() {
            Ok(answer) => answer,
            Err(e) => {
                warn!(error = %e, "could not read an answer, treating it as no");
                false
            }
        }
    }
}
