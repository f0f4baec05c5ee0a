//! `nami score`: preview how an input would be scored and admitted.

use chrono::{Duration, Utc};
use nami_config::AppConfig;
use nami_core::input::{EventMetadata, InputEvent};
use nami_core::source::{ConversationState, SourceKind};
use nami_router::Scorer;

pub struct ScoreArgs {
    pub source: String,
    pub state: Option<String>,
    pub relevance: Option<f64>,
    pub urgency: Option<f64>,
    pub since_reply: Option<f64>,
    pub text: String,
}

pub async fn run(args: ScoreArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let source: SourceKind = args.source.parse()?;
    let states = match args.state.as_deref() {
        Some(name) => vec![name.parse::<ConversationState>()?],
        None => ConversationState::ALL.to_vec(),
    };

    let mut metadata = EventMetadata::new();
    if let Some(relevance) = args.relevance {
        metadata = metadata.with_relevance(relevance);
    }
    if let Some(urgency) = args.urgency {
        metadata = metadata.with_urgency(urgency);
    }

    let now = Utc::now();
    let last_response = args
        .since_reply
        .map(|secs| now - Duration::milliseconds((secs * 1000.0) as i64));
    let event = InputEvent::at(source, args.text.trim(), metadata, now);

    let scorer = Scorer::new(config.router.source_weights, config.router.scoring);
    let breakdown = scorer.breakdown_at(&event, &[], last_response, now);
    let total = breakdown.total();

    println!("Score for {source}: {:?}", event.text);
    println!("  base        {:+.3}", breakdown.base);
    println!("  recency     {:+.3}", breakdown.recency);
    println!("  relevance   {:+.3}", breakdown.relevance);
    println!("  urgency     {:+.3}", breakdown.urgency);
    println!("  continuity  {:+.3}", breakdown.continuity);
    println!("  cooldown    {:+.3}", -breakdown.cooldown);
    println!("  total       {total:.3}\n");

    if !source.is_actionable() {
        println!("  {source} is context-only and never competes for a reply.");
        return Ok(());
    }

    for state in states {
        let threshold = config.router.thresholds.for_state(state);
        let verdict = if total >= threshold { "admitted" } else { "dropped" };
        println!("  {:<10} threshold {threshold:.2}  {verdict}", state.as_str());
    }

    Ok(())
}
