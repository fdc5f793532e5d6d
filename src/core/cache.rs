//! Chat history kept for one session

#![allow(dead_code)]

/// One prompt/response pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatExchange {
    pub prompt: String,
    pub response: String,
}

impl ChatExchange {
    pub fn new(prompt: impl Into<String>, response: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            response: response.into(),
        }
    }
}

/// Ordered, append-only history of labelled entries.
///
/// Each exchange is stored as two entries, `User: ...` then `You: ...`.
/// There is no size cap; callers clear it when it grows too large.
#[derive(Debug, Clone, Default)]
pub struct ChatCache {
    entries: Vec<String>,
}

impl ChatCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, exchange: ChatExchange) {
        self.entries.push(format!("User: {}", exchange.prompt));
        self.entries.push(format!("You: {}", exchange.response));
    }

    /// Append a single free-form entry
    pub fn push_entry(&mut self, entry: impl Into<String>) {
        self.entries.push(entry.into());
    }

    /// Replace the history wholesale
    pub fn replace(&mut self, entries: Vec<String>) {
        self.entries = entries;
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn size(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// `[User: a, You: b, ...]`, oldest first
    pub fn as_ordered_text(&self) -> String {
        format!("[{}]", self.entries.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_adds_two_entries() {
        let mut cache = ChatCache::new();
        cache.append(ChatExchange::new("hi", "hello"));
        assert_eq!(cache.size(), 2);
        assert_eq!(cache.entries(), ["User: hi", "You: hello"]);

        cache.append(ChatExchange::new("hi", "hello"));
        assert_eq!(cache.size(), 4);
    }

    #[test]
    fn test_ordered_text_and_clear() {
        let mut cache = ChatCache::new();
        assert_eq!(cache.as_ordered_text(), "[]");

        cache.append(ChatExchange::new("What is my major?", "Computer Science."));
        cache.push_entry("User: thanks");
        assert_eq!(
            cache.as_ordered_text(),
            "[User: What is my major?, You: Computer Science., User: thanks]"
        );

        cache.clear();
        assert_eq!(cache.size(), 0);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_replace() {
        let mut cache = ChatCache::new();
        cache.push_entry("old");
        cache.replace(vec!["User: a".to_string(), "You: b".to_string()]);
        assert_eq!(cache.entries(), ["User: a", "You: b"]);
    }
}
