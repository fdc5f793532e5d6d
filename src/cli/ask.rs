//! Ask command - one question, one reply

use anyhow::Result;

use crate::cli::{build_engine, spinner, EngineArgs};
use crate::config::AppConfig;
use crate::ui::Theme;

pub async fn run(config: AppConfig, args: EngineArgs, question: &str) -> Result<()> {
    let theme = Theme::new();
    let mut engine = build_engine(&config, &args)?;

    let pb = spinner("Thinking...")?;
    let result = engine.chat(question, !args.raw).await;
    pb.finish_and_clear();

    let reply = result?;
    println!("{}", reply);

    if config.verbose {
        let meta = engine.metadata();
        println!(
            "{}",
            theme.muted.apply_to(format!(
                "{} ms, {} tokens",
                meta.processing_time_ms().unwrap_or(0),
                meta.total_tokens().unwrap_or(0)
            ))
        );
    }
    Ok(())
}
