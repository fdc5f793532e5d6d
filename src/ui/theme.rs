//! Terminal theme for the chat front end

use console::{Color, Style};

/// Styles shared by the CLI commands
pub struct Theme {
    pub prompt: Style,
    pub assistant: Style,
    pub muted: Style,
    pub success: Style,
    pub error: Style,
    pub prompt_prefix: &'static str,
}

impl Default for Theme {
    fn default() -> Self {
        Self::new()
    }
}

impl Theme {
    pub fn new() -> Self {
        // 256-color approximations: light blue, gold, gray, light green, light red
        Self {
            prompt: Style::new().fg(Color::Color256(117)).bold(),
            assistant: Style::new().fg(Color::Color256(220)).bold(),
            muted: Style::new().fg(Color::Color256(242)),
            success: Style::new().fg(Color::Color256(114)),
            error: Style::new().fg(Color::Color256(210)),
            prompt_prefix: "❯ ",
        }
    }

    pub fn user_label(&self) -> String {
        format!("{}", self.prompt.apply_to(format!("{}You", self.prompt_prefix)))
    }

    pub fn assistant_label(&self) -> String {
        format!("{}", self.assistant.apply_to("Assistant"))
    }

    pub fn error_line(&self, message: &str) -> String {
        format!("{} {}", self.error.apply_to("✗"), self.error.apply_to(message))
    }

    pub fn success_line(&self, message: &str) -> String {
        format!("{} {}", self.success.apply_to("✓"), message)
    }
}
