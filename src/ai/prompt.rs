//! Prompt assembly
//!
//! Folds the instruction, length directive, chat history and file context
//! into the single message sent to the model.

use crate::config::{AssistantMode, EngineConfig};
use crate::core::cache::ChatCache;

/// Smallest response length requested when dynamic sizing is on
pub const MIN_DYNAMIC_LENGTH: usize = 100;

const CACHE_DIRECTIVE: &str = " Please keep this content of these files in cached tokens.";
const EDIT_DIRECTIVE: &str = " If the user requests edit be made to the code please return the updated code block in full, and only return the code block if any edits were made.";

/// Response length to ask for: `max(len(message) * scale, 100)`
pub fn dynamic_length(message: &str, scale: f32) -> usize {
    let scaled = message.trim().chars().count() as f32 * scale;
    (scaled.max(0.0) as usize).max(MIN_DYNAMIC_LENGTH)
}

/// Length the prompt asks the model to stay under, if any.
///
/// Code-interpreter replies carry whole files and are never capped.
pub fn requested_length(config: &EngineConfig, message: &str) -> Option<usize> {
    let max_length = config.max_prompt_length?;
    if config.mode == Some(AssistantMode::CodeInterpreter) {
        return None;
    }
    if config.dynamic_prompt_length {
        Some(dynamic_length(message, config.dynamic_prompt_length_scale))
    } else {
        Some(max_length)
    }
}

/// Everything the builder reads, borrowed from the engine
pub struct PromptInputs<'a> {
    pub config: &'a EngineConfig,
    pub cache: &'a ChatCache,
    /// Current file context blob; only read in file modes
    pub file_context: &'a str,
}

/// Assemble the outbound prompt for `message`
pub fn build_prompt(inputs: &PromptInputs<'_>, message: &str) -> String {
    let config = inputs.config;
    let mode = config.mode.unwrap_or(AssistantMode::Chat);

    let mut prompt = String::from(config.instruction.as_deref().unwrap_or_default());

    if let Some(length) = requested_length(config, message) {
        prompt.push_str(&format!(
            " Please keep the response length under {} characters.",
            length
        ));
    }

    if inputs.cache.size() > 1 {
        prompt.push_str(&format!(
            " This is the chat history between you and the user: [ {} ]",
            inputs.cache.as_ordered_text()
        ));
        prompt.push_str(&format!(
            " This is the latest message from the user: [{}]",
            message
        ));
    } else {
        prompt.push_str(&format!(
            " This is the first message from the user: [{}]",
            message
        ));
    }

    match mode {
        AssistantMode::Chat => {}
        AssistantMode::FileSearch => {
            prompt.push_str(&format!(
                " This is the contents of the provided files from the user: [ {} ]",
                inputs.file_context
            ));
            if config.cache_tokens {
                prompt.push_str(CACHE_DIRECTIVE);
            }
        }
        AssistantMode::CodeInterpreter => {
            prompt.push_str(&format!(
                " These are the files provided by the user: [ {} ]",
                inputs.file_context
            ));
            prompt.push_str(EDIT_DIRECTIVE);
        }
    }

    prompt
}
