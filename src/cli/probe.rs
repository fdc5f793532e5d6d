//! Probe command - check the configured API key

use anyhow::{bail, Result};

use crate::cli::{build_engine, spinner, EngineArgs};
use crate::config::AppConfig;
use crate::ui::Theme;

pub async fn run(config: AppConfig, args: EngineArgs) -> Result<()> {
    let theme = Theme::new();
    let engine = build_engine(&config, &args)?;

    if engine.config().api_key.is_none() {
        bail!("API key not set. Export {} first.", config.api_key_env);
    }

    let pb = spinner("Checking API key...")?;
    let valid = engine.probe().await;
    pb.finish_and_clear();

    if valid {
        println!("{}", theme.success_line("API key is valid"));
        Ok(())
    } else {
        bail!("API key was rejected or the endpoint is unreachable")
    }
}
