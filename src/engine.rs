//! The assistant engine
//!
//! Owns the configuration, the file context, the chat cache and the metadata
//! of the last call. A request flows through prompt assembly, the remote
//! invoker, the code block patcher (code-interpreter mode only) and finally
//! the markdown formatter.
//!
//! Calls take `&mut self`, so one engine serves one conversation at a time.

#![allow(dead_code)]

use std::path::PathBuf;

use tracing::{debug, info, warn};

use crate::ai::context::{file_name, FileContext};
use crate::ai::invoker::{sanitize, timeout_duration, Invocation, Provenance, RemoteInvoker};
use crate::ai::metadata::ResponseMetadata;
use crate::ai::openai::{probe_api_key, ChatRequest, ChatTransport, OpenAiClient};
use crate::ai::prompt::{build_prompt, requested_length, PromptInputs};
use crate::config::{validate, AssistantMode, EngineConfig};
use crate::core::cache::{ChatCache, ChatExchange};
use crate::core::patch::{apply_code_blocks, BlockMapping, PositionalMapping};
use crate::error::{ConfigError, EngineError};
use crate::ui::format_markdown;

/// Extra attempts allowed when a reply overshoots the requested length
pub const PRECISION_RETRIES: usize = 3;

const CLEAR_CACHED_TOKENS: &str = "Clear all cached tokens.";

pub struct Engine<T = OpenAiClient> {
    config: EngineConfig,
    files: FileContext,
    cache: ChatCache,
    invoker: RemoteInvoker<T>,
    mapping: Box<dyn BlockMapping + Send + Sync>,
    last_prompt: Option<String>,
    last_assembled_prompt: Option<String>,
    last_response: Option<String>,
    metadata: ResponseMetadata,
}

impl Engine {
    /// Engine talking to the configured OpenAI-compatible endpoint
    pub fn new(config: EngineConfig) -> anyhow::Result<Self> {
        Ok(Self::with_transport(config, OpenAiClient::new()?))
    }
}

impl<T: ChatTransport> Engine<T> {
    /// Engine over any transport.
    ///
    /// The configured file list moves into the engine's file context.
    pub fn with_transport(mut config: EngineConfig, transport: T) -> Self {
        let files = FileContext::new(std::mem::take(&mut config.files));
        Self {
            config,
            files,
            cache: ChatCache::new(),
            invoker: RemoteInvoker::new(transport),
            mapping: Box::new(PositionalMapping),
            last_prompt: None,
            last_assembled_prompt: None,
            last_response: None,
            metadata: ResponseMetadata::default(),
        }
    }

    /// Send `message` with the full prompt treatment.
    ///
    /// On success the exchange is cached and, in code-interpreter mode, the
    /// returned code is written back and a patch report appended.
    pub async fn chat(&mut self, message: &str, format: bool) -> Result<String, EngineError> {
        validate(&self.config)?;
        let mode = self.config.mode.unwrap_or(AssistantMode::Chat);

        let file_context = match mode {
            AssistantMode::Chat => "",
            AssistantMode::FileSearch | AssistantMode::CodeInterpreter => self.files.contents(),
        };
        let prompt = build_prompt(
            &PromptInputs {
                config: &self.config,
                cache: &self.cache,
                file_context,
            },
            message,
        );

        let mut invocation = self.send(&prompt).await?;

        if self.config.max_prompt_precision {
            if let Some(limit) = requested_length(&self.config, message) {
                let mut retries = 0;
                while invocation.content.trim().chars().count() > limit
                    && retries < PRECISION_RETRIES
                {
                    retries += 1;
                    debug!(limit, attempt = retries, "Response over length, asking again");
                    match self.send(&prompt).await {
                        Ok(next) => invocation = next,
                        Err(e) => {
                            warn!("Retry failed, keeping previous response: {}", e);
                            break;
                        }
                    }
                }
            }
        }

        let content = invocation.content.clone();
        self.record(prompt, invocation);

        if !content.trim().is_empty() {
            self.cache.append(ChatExchange::new(message, content.as_str()));
        }

        let mut output = content;
        if mode == AssistantMode::CodeInterpreter {
            let report =
                apply_code_blocks(&output, self.files.ingested_files(), self.mapping.as_ref());
            if report.touched_files() {
                self.files.mark_dirty();
            }
            info!(
                blocks = report.blocks_found,
                patched = report.diffs.len(),
                failed = report.failures.len(),
                "Applied code blocks"
            );
            output.push_str(&report.to_string());
        }

        Ok(finish(output, format))
    }

    /// Send `message` as-is: no instruction, history or file context
    pub async fn direct(&mut self, message: &str, format: bool) -> Result<String, EngineError> {
        let invocation = self.send(message).await?;
        let content = invocation.content.clone();
        self.record(message.to_string(), invocation);
        Ok(finish(content, format))
    }

    /// Ask the model to drop any cached file tokens
    pub async fn clear_cached_tokens(&mut self) -> Result<String, EngineError> {
        self.direct(CLEAR_CACHED_TOKENS, false).await
    }

    /// Check the configured credential against the endpoint
    pub async fn probe(&self) -> bool {
        match self.config.api_key.as_deref() {
            Some(key) => probe_api_key(&self.config.base_url, key).await,
            None => false,
        }
    }

    async fn send(&self, prompt: &str) -> Result<Invocation, EngineError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or(ConfigError::MissingCredential)?;

        let content = if self.config.sanitize_prompts {
            sanitize(prompt)
        } else {
            prompt.to_string()
        };
        let request =
            ChatRequest::single_turn(&self.config.base_url, api_key, &self.config.model, content);

        let invocation = self
            .invoker
            .invoke(
                request,
                self.provenance(),
                timeout_duration(self.config.timeout_secs),
            )
            .await?;
        Ok(invocation)
    }

    fn provenance(&self) -> Provenance {
        Provenance {
            mode: self.config.mode,
            instruction: self.config.instruction.clone(),
            file_names: self.files.files().iter().map(|p| file_name(p)).collect(),
        }
    }

    /// Overwrite the last-call state; only called after a success
    fn record(&mut self, assembled: String, invocation: Invocation) {
        self.last_prompt = Some(invocation.sent_prompt);
        self.last_assembled_prompt = Some(assembled);
        self.last_response = Some(invocation.content);
        self.metadata = invocation.metadata;
    }

    // Settings

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn set_api_key(&mut self, api_key: impl Into<String>) {
        self.config.api_key = Some(api_key.into());
    }

    pub fn set_instruction(&mut self, instruction: impl Into<String>) {
        self.config.instruction = Some(instruction.into());
    }

    pub fn set_mode(&mut self, mode: AssistantMode) {
        self.config.mode = Some(mode);
    }

    pub fn set_model(&mut self, model: impl Into<String>) {
        self.config.model = model.into();
    }

    pub fn set_max_prompt_length(&mut self, max_length: Option<usize>) {
        self.config.max_prompt_length = max_length;
    }

    pub fn set_timeout(&mut self, secs: f32) {
        self.config.timeout_secs = secs;
    }

    pub fn set_dynamic_prompt_length_scale(&mut self, scale: f32) {
        self.config.dynamic_prompt_length_scale = scale;
    }

    pub fn set_cache_tokens(&mut self, enabled: bool) {
        self.config.cache_tokens = enabled;
    }

    pub fn set_dynamic_prompt_length(&mut self, enabled: bool) {
        self.config.dynamic_prompt_length = enabled;
    }

    pub fn set_max_prompt_precision(&mut self, enabled: bool) {
        self.config.max_prompt_precision = enabled;
    }

    pub fn set_sanitize_prompts(&mut self, enabled: bool) {
        self.config.sanitize_prompts = enabled;
    }

    /// Swap how returned code blocks are matched to files
    pub fn set_block_mapping(&mut self, mapping: impl BlockMapping + Send + Sync + 'static) {
        self.mapping = Box::new(mapping);
    }

    // File set

    pub fn files(&self) -> &[PathBuf] {
        self.files.files()
    }

    pub fn set_files(&mut self, files: Vec<PathBuf>) {
        self.files.set_files(files);
    }

    pub fn set_file(&mut self, file: PathBuf) {
        self.files.set_files(vec![file]);
    }

    pub fn add_file(&mut self, file: PathBuf) {
        self.files.add_files([file]);
    }

    pub fn add_files(&mut self, files: impl IntoIterator<Item = PathBuf>) {
        self.files.add_files(files);
    }

    pub fn clear_files(&mut self) {
        self.files.clear();
    }

    /// Re-ingest the file set if it changed; returns the blob length
    pub fn refresh_file_context(&mut self) -> usize {
        self.files.refresh()
    }

    pub fn file_context(&mut self) -> &str {
        self.files.contents()
    }

    // Chat cache

    pub fn chat_cache(&self) -> &ChatCache {
        &self.cache
    }

    pub fn set_chat_cache(&mut self, entries: Vec<String>) {
        self.cache.replace(entries);
    }

    pub fn add_chat_entry(&mut self, entry: impl Into<String>) {
        self.cache.push_entry(entry);
    }

    pub fn clear_chat_cache(&mut self) {
        self.cache.clear();
    }

    // Last call

    /// Prompt exactly as transmitted
    pub fn last_prompt_used(&self) -> Option<&str> {
        self.last_prompt.as_deref()
    }

    /// Prompt as assembled, before sanitization
    pub fn last_assembled_prompt(&self) -> Option<&str> {
        self.last_assembled_prompt.as_deref()
    }

    pub fn last_response_received(&self) -> Option<&str> {
        self.last_response.as_deref()
    }

    pub fn metadata(&self) -> &ResponseMetadata {
        &self.metadata
    }

    /// Metadata lookup; `all` and `keys` are special
    pub fn response_data(&self, key: &str) -> String {
        self.metadata.describe(key)
    }
}

fn finish(text: String, format: bool) -> String {
    if format {
        format_markdown(&text)
    } else {
        text
    }
}
