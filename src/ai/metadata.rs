//! Metadata about the most recent remote call

use serde_json::{Map, Value};

pub const PROCESSING_TIME_MS: &str = "processing_time_ms";
pub const TOTAL_TOKENS: &str = "total_tokens";
pub const FILE_NAMES: &str = "file_names";
pub const ASSISTANT_TYPE: &str = "assistant_type";
pub const INITIAL_INSTRUCTION: &str = "initial_instruction";
pub const RECEIVED_MESSAGE_LENGTH: &str = "received_message_length";

const NO_DATA: &str = "No data available.";

/// Raw top-level response fields plus derived facts about the call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResponseMetadata {
    fields: Map<String, Value>,
}

impl ResponseMetadata {
    /// Flatten the top-level fields of a decoded response body
    pub fn from_body(body: &Value) -> Self {
        let fields = body.as_object().cloned().unwrap_or_default();
        Self { fields }
    }

    pub fn insert(&mut self, key: &str, value: impl Into<Value>) {
        self.fields.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn processing_time_ms(&self) -> Option<u64> {
        self.get(PROCESSING_TIME_MS).and_then(Value::as_u64)
    }

    pub fn total_tokens(&self) -> Option<u64> {
        self.get(TOTAL_TOKENS).and_then(Value::as_u64)
    }

    /// Human-readable lookup.
    ///
    /// `all` renders every field, `keys` the key list; anything missing
    /// reads as `No data available.`.
    pub fn describe(&self, key: &str) -> String {
        if self.fields.is_empty() {
            return NO_DATA.to_string();
        }
        match key {
            "all" => Value::Object(self.fields.clone()).to_string(),
            "keys" => format!("[{}]", self.keys().collect::<Vec<_>>().join(", ")),
            _ => match self.fields.get(key) {
                None | Some(Value::Null) => NO_DATA.to_string(),
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
            },
        }
    }
}
