/// Single-line input field: submission gating plus empty/non-empty typing
/// notifications.
#[derive(Debug, Default)]
pub struct ChatInput {
    text: String,
}

impl ChatInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Replaces the field contents. Returns `Some(is_typing)` only when the
    /// field flips between empty and non-empty.
    pub fn set_text(&mut self, text: impl Into<String>) -> Option<bool> {
        let was_empty = self.text.is_empty();
        self.text = text.into();
        let is_empty = self.text.is_empty();
        if was_empty != is_empty { Some(!is_empty) } else { None }
    }

    /// Hands back the trimmed text and clears the field, unless the text is
    /// blank or a request is already in flight.
    pub fn submit(&mut self, busy: bool) -> Option<String> {
        let trimmed = self.text.trim();
        if trimmed.is_empty() || busy {
            return None;
        }
        let submitted = trimmed.to_string();
        self.text.clear();
        Some(submitted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_input_never_submits() {
        let mut input = ChatInput::new();
        assert_eq!(input.submit(false), None);
        input.set_text("   ");
        assert_eq!(input.submit(false), None);
        assert_eq!(input.text(), "   ");
    }

    #[test]
    fn busy_input_keeps_text() {
        let mut input = ChatInput::new();
        input.set_text("Analyze Ethereum");
        assert_eq!(input.submit(true), None);
        assert_eq!(input.text(), "Analyze Ethereum");
    }

    #[test]
    fn submit_trims_and_clears() {
        let mut input = ChatInput::new();
        input.set_text("  Analyze Ethereum \n");
        assert_eq!(input.submit(false), Some("Analyze Ethereum".to_string()));
        assert_eq!(input.text(), "");
    }

    #[test]
    fn typing_fires_only_on_transitions() {
        let mut input = ChatInput::new();
        assert_eq!(input.set_text("a"), Some(true));
        assert_eq!(input.set_text("ab"), None);
        assert_eq!(input.set_text(""), Some(false));
        assert_eq!(input.set_text(""), None);
    }
}
