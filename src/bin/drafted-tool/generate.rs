use anyhow::{anyhow, Result};
use spdlog::info;

use drafted::config::Config;
use drafted::generator::GenerationOutcome;
use drafted::workflow::ContentWorkflow;

use crate::GenerateArgs;

pub async fn generate_cmd(args: &GenerateArgs, config: &Config, workflow: &ContentWorkflow) -> Result<()> {
    let generator = config.generator.build_generator()
        .ok_or_else(|| anyhow!("No generator API key configured. Set GEMINI_API_KEY or [generator] api_key"))?;

    info!("Generating draft for topic '{}'", args.topic);
    match generator.generate(&args.topic, workflow).await? {
        GenerationOutcome::Saved { title, path, .. } => {
            println!("Draft '{}' written to {}", title, path.display());
        }
        GenerationOutcome::Duplicate(verdict) => {
            println!("Topic not generated: {}", verdict.reason());
        }
    }

    Ok(())
}
