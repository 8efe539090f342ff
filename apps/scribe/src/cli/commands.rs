//! # CLI Command Implementations

use scribe::api::{self, StagesResponse};
use scribe::config::Config;
use scribe_core::{FeatureFlags, ScribeError, StepSequencer};

// =============================================================================
// SERVER COMMAND
// =============================================================================

/// Start the HTTP server.
pub async fn cmd_server(config: &Config) -> Result<(), ScribeError> {
    config.openai.api_key()?;
    let seeded = StepSequencer::from_config(&config.features);

    println!("Scribe Demo Server Starting...");
    println!();
    println!("Configuration:");
    println!("  Host:          {}", config.server.host);
    println!("  Port:          {}", config.server.port);
    println!("  AI Service:    {}", config.openai.base_url);
    println!("  Chat Model:    {}", config.openai.chat_model);
    println!("  Max Sessions:  {}", config.server.max_sessions);
    println!("  Session Idle:  {}s", config.server.session_idle_secs);
    println!("  Start Stage:   {}", seeded.current_label());
    println!();
    println!("Endpoints:");
    println!("  GET  /stages                          - List demo stages");
    println!("  POST /sessions                        - Open a session");
    println!("  POST /sessions/{{id}}/next|previous     - Navigate");
    println!("  POST /sessions/{{id}}/generate/content  - Generate content");
    println!("  GET  /sessions/{{id}}/generate/stream   - Stream content");
    println!("  POST /sessions/{{id}}/generate/image    - Generate image");
    println!("  POST /sessions/{{id}}/generate/speech   - Generate speech");
    println!("  GET  /health                          - Health check");
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    api::run_server(config).await
}

// =============================================================================
// STAGES COMMAND
// =============================================================================

/// Show the stage table.
pub fn cmd_stages(json_mode: bool) -> Result<(), ScribeError> {
    let table = StagesResponse::all();

    if json_mode {
        let output = serde_json::to_string_pretty(&table)
            .map_err(|e| ScribeError::IoError(format!("Cannot render stages: {}", e)))?;
        println!("{}", output);
        return Ok(());
    }

    println!("Scribe Demo Stages");
    println!("==================");
    for info in &table.stages {
        let unlocked: Vec<&str> = FeatureFlags::for_stage(info.stage)
            .enabled()
            .map(|f| f.name())
            .collect();
        println!(
            "  {}. {:<20} {}",
            info.index + 1,
            info.label,
            if unlocked.is_empty() {
                "(no AI features)".to_string()
            } else {
                unlocked.join(", ")
            }
        );
        if let Some(feature) = info.unlocks {
            println!("     {:<20} + {}", "", feature.description());
        }
    }

    Ok(())
}

// =============================================================================
// CONFIG COMMAND
// =============================================================================

/// Show the effective configuration with secrets redacted.
pub fn cmd_config(config: &Config, json_mode: bool) -> Result<(), ScribeError> {
    if json_mode {
        let mut redacted = config.clone();
        if redacted.openai.api_key.is_some() {
            redacted.openai.api_key = Some("<redacted>".to_string());
        }
        let output = serde_json::to_string_pretty(&redacted)
            .map_err(|e| ScribeError::Config(format!("Cannot render config: {}", e)))?;
        println!("{}", output);
        return Ok(());
    }

    print!("{}", config.to_redacted_toml()?);
    if !config.features.is_prefix() {
        println!();
        println!(
            "# note: enabled features are not a prefix; a session's flags follow its stage after the first move"
        );
    }
    Ok(())
}
