//! Configuration loading, validation, and management for Nami.
//!
//! Loads configuration from `~/.nami/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use nami_core::{ConversationState, SourceKind};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The root configuration structure.
///
/// Maps directly to `~/.nami/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// The bot's chat name; its own chat messages are ignored
    #[serde(default = "default_bot_name")]
    pub bot_name: String,

    /// Words that count as addressing the bot
    #[serde(default = "default_mention_aliases")]
    pub mention_aliases: Vec<String>,

    /// Language model settings
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Admission, scoring, and dispatch settings
    #[serde(default)]
    pub router: RouterConfig,

    /// Text-to-speech hook
    #[serde(default)]
    pub voice: VoiceConfig,

    /// External producer processes
    #[serde(default)]
    pub intake: IntakeConfig,
}

fn default_bot_name() -> String {
    "peepingnami".into()
}
fn default_mention_aliases() -> Vec<String> {
    vec!["nami".into(), "peepingnami".into()]
}
fn default_true() -> bool {
    true
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("bot_name", &self.bot_name)
            .field("mention_aliases", &self.mention_aliases)
            .field("provider", &self.provider)
            .field("router", &self.router)
            .field("voice", &self.voice)
            .field("intake", &self.intake)
            .finish()
    }
}

// ── Provider ────────────────────────────────────────────────────────────────

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// OpenAI-compatible base URL (Ollama by default)
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// How many prompt/reply messages the model sees
    #[serde(default = "default_history_len")]
    pub history_len: usize,

    /// Persona prompt placed ahead of the situation summary
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    /// Words masked as `*filtered*` in generated replies
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub banned_words: Vec<String>,
}

fn default_base_url() -> String {
    "http://localhost:11434/v1".into()
}
fn default_model() -> String {
    "peepingnami".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_history_len() -> usize {
    8
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            api_key: None,
            temperature: default_temperature(),
            max_tokens: None,
            history_len: default_history_len(),
            system_prompt: None,
            banned_words: vec![],
        }
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &redact(&self.api_key))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("history_len", &self.history_len)
            .field("system_prompt", &self.system_prompt)
            .field("banned_words", &self.banned_words.len())
            .finish()
    }
}

// ── Router ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Route admitted events through the rate-limited dispatch funnel
    #[serde(default = "default_true")]
    pub use_funnel: bool,

    /// Minimum gap between two reply-generation calls
    #[serde(default = "default_min_prompt_interval")]
    pub min_prompt_interval_secs: f64,

    #[serde(default)]
    pub initial_state: ConversationState,

    #[serde(default)]
    pub thresholds: ThresholdConfig,

    #[serde(default)]
    pub source_weights: SourceWeightConfig,

    #[serde(default)]
    pub scoring: ScoringConfig,

    #[serde(default)]
    pub context: ContextConfig,

    #[serde(default)]
    pub dedup: DedupConfig,

    #[serde(default)]
    pub admission: AdmissionConfig,

    #[serde(default)]
    pub fanout: FanoutConfig,

    /// Sources rejected at the ingestion boundary
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub disabled_sources: Vec<SourceKind>,
}

fn default_min_prompt_interval() -> f64 {
    2.0
}

impl RouterConfig {
    pub fn min_prompt_interval(&self) -> Duration {
        Duration::from_secs_f64(self.min_prompt_interval_secs)
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            use_funnel: true,
            min_prompt_interval_secs: default_min_prompt_interval(),
            initial_state: ConversationState::Idle,
            thresholds: ThresholdConfig::default(),
            source_weights: SourceWeightConfig::default(),
            scoring: ScoringConfig::default(),
            context: ContextConfig::default(),
            dedup: DedupConfig::default(),
            admission: AdmissionConfig::default(),
            fanout: FanoutConfig::default(),
            disabled_sources: vec![],
        }
    }
}

/// Admission threshold per conversation state. A struct field per state
/// keeps the lookup total.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ThresholdConfig {
    #[serde(default = "default_idle_threshold")]
    pub idle: f64,
    #[serde(default = "default_engaged_threshold")]
    pub engaged: f64,
    #[serde(default = "default_observing_threshold")]
    pub observing: f64,
    #[serde(default = "default_busy_threshold")]
    pub busy: f64,
}

fn default_idle_threshold() -> f64 {
    0.5
}
fn default_engaged_threshold() -> f64 {
    0.7
}
fn default_observing_threshold() -> f64 {
    0.8
}
fn default_busy_threshold() -> f64 {
    0.9
}

impl ThresholdConfig {
    pub fn for_state(&self, state: ConversationState) -> f64 {
        match state {
            ConversationState::Idle => self.idle,
            ConversationState::Engaged => self.engaged,
            ConversationState::Observing => self.observing,
            ConversationState::Busy => self.busy,
        }
    }
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            idle: default_idle_threshold(),
            engaged: default_engaged_threshold(),
            observing: default_observing_threshold(),
            busy: default_busy_threshold(),
        }
    }
}

/// Prior importance of each source, in [0, 1].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SourceWeightConfig {
    #[serde(default = "default_mic_weight")]
    pub direct_microphone: f64,
    #[serde(default = "default_mention_weight")]
    pub twitch_mention: f64,
    #[serde(default = "default_visual_weight")]
    pub visual_change: f64,
    #[serde(default = "default_ambient_weight")]
    pub ambient_audio: f64,
    #[serde(default = "default_chat_weight")]
    pub twitch_chat: f64,
}

fn default_mic_weight() -> f64 {
    0.8
}
fn default_mention_weight() -> f64 {
    0.7
}
fn default_visual_weight() -> f64 {
    0.4
}
fn default_ambient_weight() -> f64 {
    0.3
}
fn default_chat_weight() -> f64 {
    0.2
}

impl SourceWeightConfig {
    pub fn for_source(&self, source: SourceKind) -> f64 {
        match source {
            SourceKind::DirectMicrophone => self.direct_microphone,
            SourceKind::TwitchMention => self.twitch_mention,
            SourceKind::VisualChange => self.visual_change,
            SourceKind::AmbientAudio => self.ambient_audio,
            SourceKind::TwitchChat => self.twitch_chat,
        }
    }
}

impl Default for SourceWeightConfig {
    fn default() -> Self {
        Self {
            direct_microphone: default_mic_weight(),
            twitch_mention: default_mention_weight(),
            visual_change: default_visual_weight(),
            ambient_audio: default_ambient_weight(),
            twitch_chat: default_chat_weight(),
        }
    }
}

/// Heuristic scoring constants. None of these are tuned for any particular
/// stream; they are exposed so a deployment can adjust them.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Age at which the recency boost reaches zero
    #[serde(default = "default_recency_window")]
    pub recency_window_secs: f64,
    #[serde(default = "default_recency_weight")]
    pub recency_weight: f64,
    #[serde(default = "default_relevance_weight")]
    pub relevance_weight: f64,
    #[serde(default = "default_urgency_weight")]
    pub urgency_weight: f64,
    #[serde(default = "default_continuity_bonus")]
    pub continuity_bonus: f64,
    /// How many of the most recent events are checked for shared words
    #[serde(default = "default_continuity_lookback")]
    pub continuity_lookback: usize,
    /// Words must be strictly longer than this to count as shared
    #[serde(default = "default_continuity_min_word_len")]
    pub continuity_min_word_len: usize,
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: f64,
    #[serde(default = "default_cooldown_penalty")]
    pub cooldown_penalty: f64,
}

fn default_recency_window() -> f64 {
    30.0
}
fn default_recency_weight() -> f64 {
    0.2
}
fn default_relevance_weight() -> f64 {
    0.3
}
fn default_urgency_weight() -> f64 {
    0.2
}
fn default_continuity_bonus() -> f64 {
    0.2
}
fn default_continuity_lookback() -> usize {
    3
}
fn default_continuity_min_word_len() -> usize {
    4
}
fn default_cooldown_secs() -> f64 {
    5.0
}
fn default_cooldown_penalty() -> f64 {
    0.3
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            recency_window_secs: default_recency_window(),
            recency_weight: default_recency_weight(),
            relevance_weight: default_relevance_weight(),
            urgency_weight: default_urgency_weight(),
            continuity_bonus: default_continuity_bonus(),
            continuity_lookback: default_continuity_lookback(),
            continuity_min_word_len: default_continuity_min_word_len(),
            cooldown_secs: default_cooldown_secs(),
            cooldown_penalty: default_cooldown_penalty(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ContextConfig {
    #[serde(default = "default_context_window")]
    pub vision_window_secs: f64,
    #[serde(default = "default_context_window")]
    pub spoken_word_window_secs: f64,
    #[serde(default = "default_context_window")]
    pub ambient_audio_window_secs: f64,
    /// Chat is bounded by message count rather than age
    #[serde(default = "default_chat_capacity")]
    pub chat_capacity: usize,
}

fn default_context_window() -> f64 {
    30.0
}
fn default_chat_capacity() -> usize {
    20
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            vision_window_secs: default_context_window(),
            spoken_word_window_secs: default_context_window(),
            ambient_audio_window_secs: default_context_window(),
            chat_capacity: default_chat_capacity(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DedupConfig {
    /// Number of recent replies remembered
    #[serde(default = "default_dedup_capacity")]
    pub capacity: usize,
    /// Leading characters of the input compared
    #[serde(default = "default_prefix_chars")]
    pub prefix_chars: usize,
}

fn default_dedup_capacity() -> usize {
    15
}
fn default_prefix_chars() -> usize {
    50
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            capacity: default_dedup_capacity(),
            prefix_chars: default_prefix_chars(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AdmissionConfig {
    /// Events remembered for continuity scoring
    #[serde(default = "default_recent_events_capacity")]
    pub recent_events_capacity: usize,
    /// Sleep between polls of an empty queue
    #[serde(default = "default_idle_poll_ms")]
    pub idle_poll_ms: u64,
    /// Pause after a failed dispatch
    #[serde(default = "default_error_backoff_ms")]
    pub error_backoff_ms: u64,
    /// Pause after each processed event
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
}

fn default_recent_events_capacity() -> usize {
    10
}
fn default_idle_poll_ms() -> u64 {
    100
}
fn default_error_backoff_ms() -> u64 {
    1000
}
fn default_settle_ms() -> u64 {
    500
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            recent_events_capacity: default_recent_events_capacity(),
            idle_poll_ms: default_idle_poll_ms(),
            error_backoff_ms: default_error_backoff_ms(),
            settle_ms: default_settle_ms(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FanoutConfig {
    /// Speech jobs allowed in flight before new ones are shed
    #[serde(default = "default_max_concurrent_speech")]
    pub max_concurrent_speech: usize,
}

fn default_max_concurrent_speech() -> usize {
    2
}

impl Default for FanoutConfig {
    fn default() -> Self {
        Self {
            max_concurrent_speech: default_max_concurrent_speech(),
        }
    }
}

// ── Voice ───────────────────────────────────────────────────────────────────

/// External TTS program. The reply text is appended as the final argument.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VoiceConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
}

// ── Intake ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IntakeConfig {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub producers: Vec<ProducerConfig>,
}

/// Which line format a producer speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProducerKind {
    Hearing,
    Vision,
    Chat,
}

/// A hearing, vision, or chat bridge whose stdout lines are ingested.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProducerConfig {
    pub name: String,
    pub kind: ProducerKind,
    pub command: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
}

// ── Loading ─────────────────────────────────────────────────────────────────

impl AppConfig {
    /// Load configuration from the default path (~/.nami/config.toml).
    ///
    /// Environment variables take priority over the file:
    /// - `NAMI_API_KEY`
    /// - `NAMI_API_URL`
    /// - `NAMI_MODEL`
    /// - `NAMI_BOT_NAME`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var("NAMI_API_KEY") {
            self.provider.api_key = Some(key);
        }
        if let Ok(url) = std::env::var("NAMI_API_URL") {
            self.provider.base_url = url;
        }
        if let Ok(model) = std::env::var("NAMI_MODEL") {
            self.provider.model = model;
        }
        if let Ok(name) = std::env::var("NAMI_BOT_NAME") {
            self.bot_name = name;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".nami")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let router = &self.router;

        let thresholds: Vec<f64> = ConversationState::ALL
            .iter()
            .map(|s| router.thresholds.for_state(*s))
            .collect();
        if thresholds.windows(2).any(|pair| pair[0] > pair[1]) {
            return Err(ConfigError::ValidationError(
                "thresholds must not decrease from idle to busy".into(),
            ));
        }

        for source in SourceKind::ALL {
            let weight = router.source_weights.for_source(source);
            if !(0.0..=1.0).contains(&weight) {
                return Err(ConfigError::ValidationError(format!(
                    "source weight for {source} must be between 0.0 and 1.0"
                )));
            }
        }

        if router.min_prompt_interval_secs < 0.1 {
            return Err(ConfigError::ValidationError(
                "min_prompt_interval_secs must be at least 0.1".into(),
            ));
        }

        let windows = [
            router.context.vision_window_secs,
            router.context.spoken_word_window_secs,
            router.context.ambient_audio_window_secs,
            router.scoring.recency_window_secs,
            router.scoring.cooldown_secs,
        ];
        if windows.iter().any(|w| *w <= 0.0) {
            return Err(ConfigError::ValidationError(
                "time windows must be greater than zero".into(),
            ));
        }

        let capacities = [
            router.context.chat_capacity,
            router.dedup.capacity,
            router.dedup.prefix_chars,
            router.admission.recent_events_capacity,
            router.fanout.max_concurrent_speech,
            self.provider.history_len,
        ];
        if capacities.contains(&0) {
            return Err(ConfigError::ValidationError(
                "capacities must be greater than zero".into(),
            ));
        }

        if let Some(p) = self.intake.producers.iter().find(|p| p.command.trim().is_empty()) {
            return Err(ConfigError::ValidationError(format!(
                "producer '{}' has an empty command",
                p.name
            )));
        }

        if self.provider.temperature < 0.0 || self.provider.temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "provider temperature must be between 0.0 and 2.0".into(),
            ));
        }

        Ok(())
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bot_name: default_bot_name(),
            mention_aliases: default_mention_aliases(),
            provider: ProviderConfig::default(),
            router: RouterConfig::default(),
            voice: VoiceConfig::default(),
            intake: IntakeConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.bot_name, "peepingnami");
        assert!(config.router.use_funnel);
        assert_eq!(config.router.context.chat_capacity, 20);
    }

    #[test]
    fn thresholds_rise_from_idle_to_busy() {
        let t = ThresholdConfig::default();
        assert_eq!(t.for_state(ConversationState::Idle), 0.5);
        assert_eq!(t.for_state(ConversationState::Engaged), 0.7);
        assert_eq!(t.for_state(ConversationState::Observing), 0.8);
        assert_eq!(t.for_state(ConversationState::Busy), 0.9);
    }

    #[test]
    fn source_weights_rank_direct_address_first() {
        let w = SourceWeightConfig::default();
        let ranked: Vec<f64> = SourceKind::ALL.iter().map(|s| w.for_source(*s)).collect();
        assert!(ranked.windows(2).all(|pair| pair[0] > pair[1]));
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.bot_name, config.bot_name);
        assert_eq!(parsed.router.dedup.capacity, 15);
        assert_eq!(parsed.router.initial_state, ConversationState::Idle);
    }

    #[test]
    fn decreasing_thresholds_rejected() {
        let mut config = AppConfig::default();
        config.router.thresholds.busy = 0.1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn out_of_range_weight_rejected() {
        let mut config = AppConfig::default();
        config.router.source_weights.twitch_chat = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn tiny_prompt_interval_rejected() {
        let mut config = AppConfig::default();
        config.router.min_prompt_interval_secs = 0.01;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_capacity_rejected() {
        let mut config = AppConfig::default();
        config.router.dedup.capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let result = AppConfig::load_from(Path::new("/nonexistent/config.toml"));
        assert!(result.is_ok());
        assert_eq!(result.unwrap().router.thresholds.idle, 0.5);
    }

    #[test]
    fn partial_router_section_keeps_defaults() {
        let toml_str = r#"
bot_name = "otherbot"

[router]
initial_state = "engaged"
disabled_sources = ["ambient_audio", "visual_change"]

[router.thresholds]
busy = 0.95

[router.scoring]
cooldown_secs = 8.0
"#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.bot_name, "otherbot");
        assert_eq!(config.router.initial_state, ConversationState::Engaged);
        assert_eq!(config.router.thresholds.busy, 0.95);
        assert_eq!(config.router.thresholds.idle, 0.5);
        assert_eq!(config.router.scoring.cooldown_secs, 8.0);
        assert_eq!(config.router.scoring.cooldown_penalty, 0.3);
        assert_eq!(
            config.router.disabled_sources,
            vec![SourceKind::AmbientAudio, SourceKind::VisualChange]
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn producers_parse_from_toml() {
        let toml_str = r#"
[[intake.producers]]
name = "hearing"
kind = "hearing"
command = "python"
args = ["hearing.py"]
"#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.intake.producers.len(), 1);
        assert_eq!(config.intake.producers[0].args, vec!["hearing.py"]);
        assert_eq!(config.intake.producers[0].kind, ProducerKind::Hearing);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_producer_command_rejected() {
        let mut config = AppConfig::default();
        config.intake.producers.push(ProducerConfig {
            name: "vision".into(),
            kind: ProducerKind::Vision,
            command: " ".into(),
            args: vec![],
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_from_file_validates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[router]\nmin_prompt_interval_secs = 0.0\n").unwrap();
        let err = AppConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn load_from_file_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "router = 12 = oops").unwrap();
        let err = AppConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn debug_output_redacts_api_key() {
        let mut config = AppConfig::default();
        config.provider.api_key = Some("sk-secret".into());
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("peepingnami"));
        assert!(toml_str.contains("min_prompt_interval_secs"));
    }
}
