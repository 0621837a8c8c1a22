//! Ordered, role-tagged message log for one conversation.

use devin_llm::{Message, Role, TokenInfo};

/// Estimate token count with a simple character heuristic (~4 chars per token).
pub fn estimate_tokens(text: &str) -> usize {
    text.len() / 4
}

/// The messages of one conversation plus token usage.
///
/// At most one system message exists and it always sits at index 0. Other
/// messages are only ever appended; they change wholesale only through
/// [`replace_history`](Self::replace_history) after a compression.
#[derive(Debug, Clone, Default)]
pub struct ConversationState {
    messages: Vec<Message>,
    token_info: TokenInfo,
}

impl ConversationState {
    /// Create a conversation. An empty prompt means no system message.
    pub fn new(system_prompt: impl Into<String>) -> Self {
        let mut state = Self::default();
        state.replace_system_prompt(system_prompt);
        state
    }

    /// Append a message.
    ///
    /// A system message replaces the current system prompt instead.
    pub fn append(&mut self, message: Message) {
        if message.role == Role::System {
            self.replace_system_prompt(message.content);
        } else {
            self.messages.push(message);
        }
    }

    /// All messages in order.
    pub fn history(&self) -> &[Message] {
        &self.messages
    }

    /// The system message plus the last `max_count - 1` others.
    pub fn recent(&self, max_count: usize) -> Vec<Message> {
        if max_count == 0 {
            return Vec::new();
        }

        match self.system_message() {
            Some(system) => {
                let rest = &self.messages[1..];
                let keep = (max_count - 1).min(rest.len());
                std::iter::once(system.clone())
                    .chain(rest[rest.len() - keep..].iter().cloned())
                    .collect()
            }
            None => {
                let keep = max_count.min(self.messages.len());
                self.messages[self.messages.len() - keep..].to_vec()
            }
        }
    }

    /// Set, replace or (with an empty string) remove the system prompt.
    pub fn replace_system_prompt(&mut self, text: impl Into<String>) {
        let text = text.into();
        let has_system = self.system_message().is_some();

        match (has_system, text.is_empty()) {
            (true, true) => {
                self.messages.remove(0);
            }
            (true, false) => self.messages[0] = Message::system(text),
            (false, false) => self.messages.insert(0, Message::system(text)),
            (false, true) => {}
        }
    }

    /// The system message, if any.
    pub fn system_message(&self) -> Option<&Message> {
        self.messages.first().filter(|m| m.is_system())
    }

    /// The system prompt text, if any.
    pub fn system_prompt(&self) -> Option<&str> {
        self.system_message().map(|m| m.content.as_str())
    }

    /// Messages after the system message.
    pub fn non_system(&self) -> &[Message] {
        match self.system_message() {
            Some(_) => &self.messages[1..],
            None => &self.messages,
        }
    }

    /// Drop every message except the system message.
    pub fn clear(&mut self) {
        self.messages.retain(Message::is_system);
        self.token_info = TokenInfo::default();
    }

    /// Swap in a new message list (after compression).
    ///
    /// System messages are collapsed to a single one at index 0; the first
    /// system message found wins.
    pub fn replace_history(&mut self, messages: Vec<Message>) {
        let mut system = None;
        let mut rest = Vec::with_capacity(messages.len());
        for message in messages {
            if message.is_system() {
                if system.is_none() {
                    system = Some(message);
                }
            } else {
                rest.push(message);
            }
        }

        self.messages = system.into_iter().chain(rest).collect();
        self.token_info = TokenInfo::default();
    }

    /// Reported token usage.
    pub fn token_info(&self) -> &TokenInfo {
        &self.token_info
    }

    /// Record token usage reported by a backend.
    pub fn record_usage(&mut self, input_tokens: u32, output_tokens: u32) {
        self.token_info.record_usage(input_tokens, output_tokens);
    }

    /// Estimated token count of the whole history.
    pub fn estimated_tokens(&self) -> usize {
        self.messages
            .iter()
            .map(|m| estimate_tokens(&m.content))
            .sum()
    }

    /// Number of user messages.
    pub fn user_turns(&self) -> usize {
        self.count_role(Role::User)
    }

    /// Number of assistant messages.
    pub fn assistant_turns(&self) -> usize {
        self.count_role(Role::Assistant)
    }

    /// Number of function messages.
    pub fn function_turns(&self) -> usize {
        self.count_role(Role::Function)
    }

    /// Total number of messages, including the system message.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// True when there are no messages at all.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    fn count_role(&self, role: Role) -> usize {
        self.messages.iter().filter(|m| m.role == role).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_with(n: usize) -> ConversationState {
        let mut state = ConversationState::new("system");
        for i in 0..n {
            if i % 2 == 0 {
                state.append(Message::user(format!("u{}", i)));
            } else {
                state.append(Message::assistant(format!("a{}", i)));
            }
        }
        state
    }

    #[test]
    fn test_new_with_and_without_prompt() {
        let state = ConversationState::new("be helpful");
        assert_eq!(state.len(), 1);
        assert_eq!(state.system_prompt(), Some("be helpful"));

        let empty = ConversationState::new("");
        assert!(empty.is_empty());
        assert!(empty.system_message().is_none());
    }

    #[test]
    fn test_append_preserves_order() {
        let state = state_with(3);
        let contents: Vec<_> = state.history().iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["system", "u0", "a1", "u2"]);
    }

    #[test]
    fn test_append_system_replaces_prompt() {
        let mut state = state_with(2);
        state.append(Message::system("new prompt"));
        assert_eq!(state.len(), 3);
        assert_eq!(state.history()[0], Message::system("new prompt"));
        assert_eq!(state.history().iter().filter(|m| m.is_system()).count(), 1);
    }

    #[test]
    fn test_replace_system_prompt_inserts_at_front() {
        let mut state = ConversationState::new("");
        state.append(Message::user("hi"));
        state.replace_system_prompt("sys");
        assert_eq!(state.history()[0], Message::system("sys"));
        assert_eq!(state.history()[1], Message::user("hi"));

        state.replace_system_prompt("");
        assert_eq!(state.history(), &[Message::user("hi")]);
    }

    #[test]
    fn test_recent_keeps_system() {
        let state = state_with(6);
        let recent = state.recent(3);
        let contents: Vec<_> = recent.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["system", "u4", "a5"]);
    }

    #[test]
    fn test_recent_edges() {
        let state = state_with(4);
        assert!(state.recent(0).is_empty());
        assert_eq!(state.recent(1), vec![Message::system("system")]);
        assert_eq!(state.recent(100).len(), 5);

        let mut no_system = ConversationState::new("");
        no_system.append(Message::user("a"));
        no_system.append(Message::assistant("b"));
        assert_eq!(no_system.recent(1), vec![Message::assistant("b")]);
    }

    #[test]
    fn test_clear_keeps_system() {
        let mut state = state_with(4);
        state.record_usage(10, 5);
        state.clear();
        assert_eq!(state.history(), &[Message::system("system")]);
        assert!(!state.token_info().is_reported());
    }

    #[test]
    fn test_replace_history_normalizes_system() {
        let mut state = state_with(2);
        state.replace_history(vec![
            Message::user("summary"),
            Message::system("sys"),
            Message::assistant("tail"),
            Message::system("duplicate"),
        ]);
        assert_eq!(
            state.history(),
            &[
                Message::system("sys"),
                Message::user("summary"),
                Message::assistant("tail"),
            ]
        );
    }

    #[test]
    fn test_turn_counters() {
        let mut state = state_with(3);
        state.append(Message::function("shell", "ok"));
        assert_eq!(state.user_turns(), 2);
        assert_eq!(state.assistant_turns(), 1);
        assert_eq!(state.function_turns(), 1);
    }

    #[test]
    fn test_estimated_tokens() {
        let mut state = ConversationState::new("");
        state.append(Message::user("a".repeat(400)));
        state.append(Message::assistant("b".repeat(40)));
        assert_eq!(state.estimated_tokens(), 110);
    }
}
