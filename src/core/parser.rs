//! Fenced code block extraction from model output

use tracing::warn;

const FENCE: &str = "```";

/// One fenced region of a response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBlock {
    /// Text after the opening fence, e.g. `rust` or `python app.py`
    pub info: String,
    pub lines: Vec<String>,
}

impl CodeBlock {
    /// Last word of the info string, if it looks like a file name
    pub fn annotated_file(&self) -> Option<&str> {
        self.info
            .split_whitespace()
            .last()
            .filter(|word| word.contains('.'))
    }
}

/// Collect every closed fenced block in order.
///
/// A line starting with the fence marker opens a block and the next one
/// closes it. A block still open at the end of the text is dropped.
pub fn extract_code_blocks(text: &str) -> Vec<CodeBlock> {
    let mut blocks = Vec::new();
    let mut current: Option<CodeBlock> = None;

    for line in text.lines() {
        if let Some(info) = line.strip_prefix(FENCE) {
            match current.take() {
                Some(block) => blocks.push(block),
                None => {
                    current = Some(CodeBlock {
                        info: info.trim().to_string(),
                        lines: Vec::new(),
                    })
                }
            }
        } else if let Some(block) = current.as_mut() {
            block.lines.push(line.to_string());
        }
    }

    if let Some(block) = current {
        warn!(
            lines = block.lines.len(),
            "Discarding unterminated code block at end of response"
        );
    }

    blocks
}
