/// Asks the operator a yes/no question.
pub trait Prompter: Send + Sync {
    fn confirm(&self, message: &str) -> bool;
}

/// Where command results go. Progress and diagnostics go through `tracing`.
pub trait Output: Send + Sync {
    fn print(&self, text: &str);
}

/// Answers every question the same way.
pub struct FixedAnswer(pub bool);

impl Prompter for FixedAnswer {
    fn confirm(&self, _message: &str) -> bool {
        self.0
    }
}
