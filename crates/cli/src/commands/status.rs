//! `nami status`: show the effective configuration.

use nami_config::AppConfig;
use nami_core::Provider;
use nami_core::source::{ConversationState, SourceKind};

pub async fn run(check: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let router = &config.router;

    println!("Nami Status");
    println!("===========");
    println!("  Config dir:   {}", AppConfig::config_dir().display());
    println!("  Bot name:     {}", config.bot_name);
    println!("  Aliases:      {}", config.mention_aliases.join(", "));
    println!("  Endpoint:     {}", config.provider.base_url);
    println!("  Model:        {}", config.provider.model);
    println!("  API key:      {}", if config.provider.api_key.is_some() { "set" } else { "none" });
    println!("  Funnel:       {}", if router.use_funnel { "on" } else { "off" });
    println!("  Interval:     {:.1}s", router.min_prompt_interval_secs);
    println!("  Start state:  {}", router.initial_state);

    println!("\n  Thresholds:");
    for state in ConversationState::ALL {
        println!("    {:<10} {:.2}", state.as_str(), router.thresholds.for_state(state));
    }

    println!("\n  Source weights:");
    for source in SourceKind::ALL {
        let note = if router.disabled_sources.contains(&source) {
            " (disabled)"
        } else if source.is_actionable() {
            " (actionable)"
        } else {
            ""
        };
        println!(
            "    {:<18} {:.2}{note}",
            source.as_str(),
            router.source_weights.for_source(source)
        );
    }

    println!("\n  Producers:");
    if config.intake.producers.is_empty() {
        println!("    none (console only)");
    }
    for producer in &config.intake.producers {
        println!(
            "    {:<12} {:?} {} {}",
            producer.name,
            producer.kind,
            producer.command,
            producer.args.join(" ")
        );
    }
    println!(
        "  Voice:        {}",
        config.voice.command.as_deref().unwrap_or("none")
    );

    let config_path = AppConfig::config_dir().join("config.toml");
    if config_path.exists() {
        println!("\n  ✅ Config file found");
    } else {
        println!("\n  ⚠️  No config file, using defaults. Run `nami onboard` to create one.");
    }

    if check {
        let provider = nami_providers::provider_from_config(&config.provider);
        match provider.health_check().await {
            Ok(true) => println!("  ✅ Model endpoint reachable ({})", provider.name()),
            Ok(false) => println!("  ❌ Model endpoint answered with an error"),
            Err(e) => println!("  ❌ Model endpoint unreachable: {e}"),
        }
    }

    Ok(())
}
