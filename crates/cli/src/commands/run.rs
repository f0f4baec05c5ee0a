//! `nami run`: route console and producer input until exit.

use std::sync::Arc;

use nami_channels::{CommandSpeaker, ConsoleChat, ConsoleUi, LineSources};
use nami_config::AppConfig;
use nami_router::console::HELP;
use nami_router::{ContextAggregator, LineOutcome, RouterBuilder};
use tracing::{debug, info};

pub async fn run(no_funnel: bool, state: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    if no_funnel {
        config.router.use_funnel = false;
    }
    if let Some(name) = state {
        config.router.initial_state = name.parse()?;
    }

    // The responder reads the same context the router fills.
    let context = Arc::new(ContextAggregator::new(config.router.context));
    let responder = nami_providers::build_from_config(&config, Some(context.clone()));

    let mut builder = RouterBuilder::from_config(&config, Arc::new(responder))
        .with_context(context)
        .with_ui(Arc::new(ConsoleUi::new()))
        .with_chat_sink(Arc::new(ConsoleChat::new(config.bot_name.clone())));
    let voice = CommandSpeaker::from_config(&config.voice);
    let has_voice = voice.is_some();
    if let Some(speaker) = voice {
        builder = builder.with_speaker(Arc::new(speaker));
    }
    let router = builder.build();

    let mut sources = LineSources::new(config.intake.producers.clone());

    println!();
    println!("  Nami attention router");
    println!("  =====================");
    println!("  Model:      {} @ {}", config.provider.model, config.provider.base_url);
    println!("  State:      {}", router.state());
    println!("  Funnel:     {}", if config.router.use_funnel { "on" } else { "off" });
    println!("  Voice:      {}", if has_voice { "on" } else { "off" });
    let producers = sources.list();
    if producers.is_empty() {
        println!("  Producers:  none (console only)");
    } else {
        println!("  Producers:  {}", producers.join(", "));
    }
    println!();
    println!("{HELP}");
    println!();

    router.start();
    let mut lines = sources.start_all();

    loop {
        tokio::select! {
            line = lines.recv() => {
                let Some(line) = line else {
                    info!("All input sources closed");
                    break;
                };
                let from_console = line.kind.is_none();
                match router.handle_line(line.kind, &line.text) {
                    LineOutcome::Exit => break,
                    LineOutcome::Command(feedback) => println!("{feedback}"),
                    LineOutcome::Rejected(e) if from_console => eprintln!("  [Error] {e}"),
                    LineOutcome::Console(false) => eprintln!("  [Error] input discarded"),
                    outcome => debug!(origin = %line.origin, ?outcome, "Line handled"),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!();
                break;
            }
        }
    }

    sources.stop_all().await;
    router.stop().await;

    println!("  Goodbye! 👋");
    Ok(())
}
