//! CLI command implementations

pub mod ask;
pub mod chat;
pub mod probe;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};

use crate::config::{AppConfig, AssistantMode, EngineConfig};
use crate::engine::Engine;

/// Engine settings that can be overridden per run
#[derive(Debug, Clone, Default, Args)]
pub struct EngineArgs {
    /// Assistant mode (chat, file-search, code-interpreter)
    #[arg(short, long, global = true)]
    pub mode: Option<AssistantMode>,

    /// File to include as context; repeat for more
    #[arg(short = 'f', long = "file", global = true)]
    pub files: Vec<PathBuf>,

    /// Initial instruction for the model
    #[arg(short, long, global = true)]
    pub instruction: Option<String>,

    /// Model identifier
    #[arg(long, global = true)]
    pub model: Option<String>,

    /// Seconds to wait for a reply
    #[arg(short, long, global = true)]
    pub timeout: Option<f32>,

    /// Ask for replies under this many characters
    #[arg(long, global = true)]
    pub max_length: Option<usize>,

    /// Scale the length limit with the message length by this factor
    #[arg(long, global = true)]
    pub dynamic_scale: Option<f32>,

    /// Ask the model to keep file contents in cached tokens
    #[arg(long, global = true)]
    pub cache_tokens: bool,

    /// Re-ask when a reply is longer than the length limit
    #[arg(long, global = true)]
    pub precision: bool,

    /// Print replies without markdown styling
    #[arg(long, global = true)]
    pub raw: bool,
}

impl EngineArgs {
    /// Layer the flags over the file configuration
    pub fn apply(&self, config: &mut EngineConfig) {
        if let Some(mode) = self.mode {
            config.mode = Some(mode);
        }
        if !self.files.is_empty() {
            config.files = self.files.clone();
        }
        if let Some(instruction) = &self.instruction {
            config.instruction = Some(instruction.clone());
        }
        if let Some(model) = &self.model {
            config.model = model.clone();
        }
        if let Some(timeout) = self.timeout {
            config.timeout_secs = timeout;
        }
        if let Some(max_length) = self.max_length {
            config.max_prompt_length = Some(max_length);
        }
        if let Some(scale) = self.dynamic_scale {
            config.dynamic_prompt_length = true;
            config.dynamic_prompt_length_scale = scale;
        }
        config.cache_tokens |= self.cache_tokens;
        config.max_prompt_precision |= self.precision;
    }
}

/// Build an engine from the loaded configuration and command-line overrides
pub fn build_engine(config: &AppConfig, args: &EngineArgs) -> Result<Engine> {
    let mut engine_config = config.engine_config();
    args.apply(&mut engine_config);
    Engine::new(engine_config)
}

/// Spinner shown while waiting on the model
pub fn spinner(message: &str) -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.yellow} {msg:.dim}")?
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "✓"]),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    Ok(pb)
}
