//! UI adapters: asking the user and telling the user.

/// Supplies the user's answer to a yes/no question.
pub trait Confirm {
    fn confirm(&mut self, prompt: &str) -> bool;
}

impl<F: FnMut(&str) -> bool> Confirm for F {
    fn confirm(&mut self, prompt: &str) -> bool { self(prompt) }
}

/// Answers yes without asking (`--yes` on the command line).
#[derive(Debug, Clone, Copy, Default)]
pub struct AssumeYes;

impl Confirm for AssumeYes {
    fn confirm(&mut self, _prompt: &str) -> bool { true }
}

/// Answers no without asking.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssumeNo;

impl Confirm for AssumeNo {
    fn confirm(&mut self, _prompt: &str) -> bool { false }
}

/// Blocking notification shown to the user (an error dialog in a GUI).
pub trait Notify {
    fn notify(&mut self, title: &str, text: &str);
}

impl<F: FnMut(&str, &str)> Notify for F {
    fn notify(&mut self, title: &str, text: &str) { self(title, text) }
}
