//! Interactive chat command
//!
//! Reads one message per line, prints the reply, and keeps running totals of
//! time and tokens for the session.

use anyhow::Result;
use std::io::{self, BufRead, Write};

use crate::ai::metadata::ResponseMetadata;
use crate::cli::{build_engine, spinner, EngineArgs};
use crate::config::AppConfig;
use crate::engine::Engine;
use crate::ui::Theme;

/// Time and token totals across one session
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SessionStats {
    pub prompts: u64,
    pub total_ms: u64,
    pub total_tokens: u64,
}

impl SessionStats {
    pub fn record(&mut self, metadata: &ResponseMetadata) {
        self.prompts += 1;
        self.total_ms += metadata.processing_time_ms().unwrap_or(0);
        self.total_tokens += metadata.total_tokens().unwrap_or(0);
    }

    /// Totals and averages, or `None` before the first reply
    pub fn summary(&self) -> Option<String> {
        if self.prompts == 0 {
            return None;
        }
        let prompts = self.prompts as f64;
        Some(format!(
            "Prompts: {}\nTotal time: {:.2}s (avg {:.2}s)\nTotal tokens: {} (avg {:.1})",
            self.prompts,
            self.total_ms as f64 / 1000.0,
            self.total_ms as f64 / 1000.0 / prompts,
            self.total_tokens,
            self.total_tokens as f64 / prompts,
        ))
    }
}

enum Command<'a> {
    Exit,
    Help,
    Clear,
    Data(&'a str),
    Files,
    Unknown(&'a str),
}

fn parse_command(input: &str) -> Option<Command<'_>> {
    let rest = input.strip_prefix('/')?;
    let (name, arg) = rest.split_once(' ').unwrap_or((rest, ""));
    Some(match name {
        "exit" | "quit" | "q" => Command::Exit,
        "help" | "h" | "?" => Command::Help,
        "clear" | "c" => Command::Clear,
        "data" | "d" => Command::Data(if arg.trim().is_empty() { "all" } else { arg.trim() }),
        "files" => Command::Files,
        _ => Command::Unknown(input),
    })
}

fn print_help(theme: &Theme) {
    println!();
    println!("{}", theme.prompt.apply_to("Available commands:"));
    println!("  /data <key>  Show a field from the last reply (all, keys, total_tokens, ...)");
    println!("  /files       List the files in context");
    println!("  /clear       Clear the conversation history");
    println!("  /exit        End the session");
    println!();
}

fn read_line(theme: &Theme) -> Option<String> {
    print!("\n{} ", theme.user_label());
    io::stdout().flush().ok();

    let mut line = String::new();
    match io::stdin().lock().read_line(&mut line) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(line.trim().to_string()),
    }
}

/// Main chat loop
pub async fn run(config: AppConfig, args: EngineArgs, initial_prompt: Option<String>) -> Result<()> {
    let theme = Theme::new();
    let mut engine = build_engine(&config, &args)?;
    let mut stats = SessionStats::default();

    println!(
        "{} {} ({}, {})",
        theme.assistant.apply_to("forge"),
        env!("CARGO_PKG_VERSION"),
        engine.config().model,
        engine
            .config()
            .mode
            .map(|m| m.as_str())
            .unwrap_or("no mode")
    );
    println!("{}", theme.muted.apply_to("Type /help for commands, /exit to quit"));

    let mut pending = initial_prompt;
    loop {
        let input = match pending.take().or_else(|| read_line(&theme)) {
            Some(input) => input,
            None => break,
        };
        if input.is_empty() {
            continue;
        }

        match parse_command(&input) {
            Some(Command::Exit) => break,
            Some(Command::Help) => print_help(&theme),
            Some(Command::Clear) => {
                engine.clear_chat_cache();
                println!("{}", theme.success_line("Conversation cleared"));
            }
            Some(Command::Data(key)) => println!("{}", engine.response_data(key)),
            Some(Command::Files) => {
                for file in engine.files() {
                    println!("  {}", file.display());
                }
            }
            Some(Command::Unknown(cmd)) => {
                println!("{}", theme.error_line(&format!("Unknown command: {}", cmd)));
            }
            None => send(&mut engine, &input, !args.raw, &theme, &mut stats).await?,
        }
    }

    if let Some(summary) = stats.summary() {
        println!();
        println!("{}", theme.muted.apply_to(summary));
    }
    Ok(())
}

async fn send(
    engine: &mut Engine,
    input: &str,
    format: bool,
    theme: &Theme,
    stats: &mut SessionStats,
) -> Result<()> {
    let pb = spinner("Thinking...")?;
    let result = engine.chat(input, format).await;
    pb.finish_and_clear();

    match result {
        Ok(reply) => {
            stats.record(engine.metadata());
            println!("\n{}", theme.assistant_label());
            println!("{}", reply);
        }
        Err(e) => println!("{}", theme.error_line(&e.to_string())),
    }
    Ok(())
}
