use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Result, TandemError};

/// Top-level configuration for the Tandem application.
///
/// Loaded from a TOML file at startup. Each section corresponds to one
/// component or cross-cutting concern. Unknown keys are rejected and the
/// whole document is validated eagerly; any failure is a fatal
/// `ConfigError` before the session starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TandemConfig {
    pub speech: SpeechConfig,
    pub tts: TtsConfig,
    pub ai: AiConfig,
    pub memory: MemoryConfig,
    pub ui: UiConfig,
    pub logging: LoggingConfig,
    pub session: SessionConfig,
}

impl Default for TandemConfig {
    fn default() -> Self {
        Self {
            speech: SpeechConfig::default(),
            tts: TtsConfig::default(),
            ai: AiConfig::default(),
            memory: MemoryConfig::default(),
            ui: UiConfig::default(),
            logging: LoggingConfig::default(),
            session: SessionConfig::default(),
        }
    }
}

impl TandemConfig {
    /// Load and validate configuration from a TOML file.
    ///
    /// Returns a `Config` error if the file cannot be read, contains
    /// unknown keys, or fails validation.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            TandemError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config: TandemConfig = toml::from_str(&content)?;
        config.validate()?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Validate all sections, failing fast on the first bad value.
    pub fn validate(&self) -> Result<()> {
        self.speech.validate()?;
        self.tts.validate()?;
        self.ai.validate()?;
        self.memory.validate()?;
        self.ui.validate()?;
        self.logging.validate()?;
        self.session.validate()?;
        Ok(())
    }

    /// Resolve the selected display language to its recognition code.
    pub fn language_code(&self, language: &str) -> Option<&str> {
        self.speech.language_codes.get(language).map(String::as_str)
    }
}

fn invalid(section: &str, message: impl std::fmt::Display) -> TandemError {
    TandemError::Config(format!("[{}] {}", section, message))
}

/// Speech recognition settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SpeechConfig {
    /// Capture sample rate in Hz.
    pub sample_rate: u32,
    /// Seconds of audio accumulated per recognition request.
    pub chunk_duration_secs: u32,
    /// Segments below this recognizer confidence are dropped.
    pub min_confidence: f32,
    /// Display name of the startup language; must be a key of
    /// `language_codes`.
    pub default_language: String,
    /// Display name -> ISO recognition code.
    pub language_codes: BTreeMap<String, String>,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        let mut language_codes = BTreeMap::new();
        language_codes.insert("English".to_string(), "en".to_string());
        language_codes.insert("Spanish".to_string(), "es".to_string());
        language_codes.insert("French".to_string(), "fr".to_string());
        language_codes.insert("German".to_string(), "de".to_string());
        Self {
            sample_rate: 16_000,
            chunk_duration_secs: 2,
            min_confidence: 0.4,
            default_language: "English".to_string(),
            language_codes,
        }
    }
}

impl SpeechConfig {
    fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(invalid("speech", "sample_rate must be positive"));
        }
        if self.chunk_duration_secs == 0 {
            return Err(invalid("speech", "chunk_duration_secs must be positive"));
        }
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(invalid("speech", "min_confidence must be in [0, 1]"));
        }
        if self.language_codes.is_empty() {
            return Err(invalid("speech", "language_codes must not be empty"));
        }
        if !self.language_codes.contains_key(&self.default_language) {
            return Err(invalid(
                "speech",
                format!(
                    "default_language '{}' is not in language_codes",
                    self.default_language
                ),
            ));
        }
        Ok(())
    }
}

/// Text-to-speech settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TtsConfig {
    /// Whether replies are spoken at all.
    pub enabled: bool,
    /// Provider voice identifier.
    pub voice_id: String,
    /// Provider synthesis model.
    pub model_id: String,
    /// Encoded output format requested from the provider.
    pub output_format: String,
    /// Per-request deadline for the synthesis collaborator.
    pub timeout_secs: u64,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            voice_id: "JBFqnCBsd6RMkjVDRZzb".to_string(),
            model_id: "eleven_multilingual_v2".to_string(),
            output_format: "mp3_44100_128".to_string(),
            timeout_secs: 10,
        }
    }
}

impl TtsConfig {
    fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 {
            return Err(invalid("tts", "timeout_secs must be positive"));
        }
        if self.enabled && self.voice_id.is_empty() {
            return Err(invalid("tts", "voice_id must not be empty when enabled"));
        }
        Ok(())
    }
}

/// Language-model and persona settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AiConfig {
    /// Model name passed to the generation collaborator.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Token budget per generated reply.
    pub max_tokens: u32,
    /// Deadline for a single generation call.
    pub generation_timeout_secs: u64,
    /// Utterance presented when generation times out or fails.
    pub fallback_reply: String,
    pub persona: PersonaConfig,
    pub search: SearchConfig,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4-32k-0613".to_string(),
            temperature: 0.7,
            max_tokens: 512,
            generation_timeout_secs: 30,
            fallback_reply: "Sorry, I lost my train of thought there. Could you say that again?"
                .to_string(),
            persona: PersonaConfig::default(),
            search: SearchConfig::default(),
        }
    }
}

impl AiConfig {
    fn validate(&self) -> Result<()> {
        if self.model.is_empty() {
            return Err(invalid("ai", "model must not be empty"));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(invalid("ai", "temperature must be in [0, 2]"));
        }
        if self.max_tokens == 0 {
            return Err(invalid("ai", "max_tokens must be positive"));
        }
        if self.generation_timeout_secs == 0 {
            return Err(invalid("ai", "generation_timeout_secs must be positive"));
        }
        if self.fallback_reply.is_empty() {
            return Err(invalid("ai", "fallback_reply must not be empty"));
        }
        self.persona.validate()?;
        self.search.validate()?;
        Ok(())
    }
}

/// The identity shaping generated replies.
///
/// Loaded once at startup and passed read-only to every component.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PersonaConfig {
    /// Name the assistant answers as (also its speaker id).
    pub name: String,
    /// Role within the team.
    pub role: String,
    /// Traits folded into every prompt.
    pub personality_traits: Vec<String>,
}

impl Default for PersonaConfig {
    fn default() -> Self {
        Self {
            name: "Theo".to_string(),
            role: "Technical Advisor".to_string(),
            personality_traits: vec![
                "analytical".to_string(),
                "supportive".to_string(),
                "curious".to_string(),
                "professional".to_string(),
            ],
        }
    }
}

impl PersonaConfig {
    fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(invalid("ai.persona", "name must not be empty"));
        }
        if self.role.is_empty() {
            return Err(invalid("ai.persona", "role must not be empty"));
        }
        Ok(())
    }
}

/// Internet-search collaborator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SearchConfig {
    /// Provider search depth: "basic" or "advanced".
    pub search_depth: String,
    /// Result cap per lookup.
    pub max_results: usize,
    /// Domains to restrict results to (empty = no restriction).
    pub include_domains: Vec<String>,
    /// Domains excluded from results.
    pub exclude_domains: Vec<String>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            search_depth: "advanced".to_string(),
            max_results: 5,
            include_domains: vec![],
            exclude_domains: vec![],
        }
    }
}

impl SearchConfig {
    fn validate(&self) -> Result<()> {
        if self.search_depth != "basic" && self.search_depth != "advanced" {
            return Err(invalid(
                "ai.search",
                format!("search_depth must be 'basic' or 'advanced', got '{}'", self.search_depth),
            ));
        }
        if self.max_results == 0 {
            return Err(invalid("ai.search", "max_results must be positive"));
        }
        Ok(())
    }
}

/// Context window and vector-memory settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MemoryConfig {
    /// Path of the SQLite snapshot file.
    pub persist_path: String,
    /// Similarity metric; only "cosine" is supported.
    pub metric: String,
    /// Vector-store capacity; oldest entries are evicted past this.
    pub max_elements: usize,
    /// Context-window cap (recent utterances kept verbatim).
    pub max_recent_messages: usize,
    /// Maximum retrieved references per response cycle.
    pub max_references: usize,
    /// References below this cosine similarity are not surfaced.
    pub similarity_threshold: f64,
    /// Dimensionality of stored embeddings.
    pub embedding_dim: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            persist_path: "tandem.db".to_string(),
            metric: "cosine".to_string(),
            max_elements: 10_000,
            max_recent_messages: 10,
            max_references: 5,
            similarity_threshold: 0.5,
            embedding_dim: 384,
        }
    }
}

impl MemoryConfig {
    fn validate(&self) -> Result<()> {
        if self.persist_path.is_empty() {
            return Err(invalid("memory", "persist_path must not be empty"));
        }
        if self.metric != "cosine" {
            return Err(invalid(
                "memory",
                format!("unsupported metric '{}'; only 'cosine' is supported", self.metric),
            ));
        }
        if self.max_elements == 0 {
            return Err(invalid("memory", "max_elements must be positive"));
        }
        if self.max_recent_messages == 0 {
            return Err(invalid("memory", "max_recent_messages must be positive"));
        }
        if self.max_references == 0 {
            return Err(invalid("memory", "max_references must be positive"));
        }
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(invalid("memory", "similarity_threshold must be in [0, 1]"));
        }
        if self.embedding_dim == 0 {
            return Err(invalid("memory", "embedding_dim must be positive"));
        }
        Ok(())
    }
}

/// Presentation hints for the external UI surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UiConfig {
    /// "dark" or "light".
    pub theme: String,
    /// Accent color as a hex string.
    pub accent_color: String,
    /// Whether the transcript spans the full width.
    pub wide_layout: bool,
    /// Visible rows in the live transcript view.
    pub transcript_rows: usize,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            theme: "dark".to_string(),
            accent_color: "#6366f1".to_string(),
            wide_layout: true,
            transcript_rows: 12,
        }
    }
}

impl UiConfig {
    fn validate(&self) -> Result<()> {
        if self.theme != "dark" && self.theme != "light" {
            return Err(invalid("ui", format!("unknown theme '{}'", self.theme)));
        }
        if self.transcript_rows == 0 {
            return Err(invalid("ui", "transcript_rows must be positive"));
        }
        Ok(())
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// trace, debug, info, warn, or error.
    pub level: String,
    /// Log file rotation: "never", "hourly", or "daily".
    pub rotation: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            rotation: "daily".to_string(),
        }
    }
}

impl LoggingConfig {
    fn validate(&self) -> Result<()> {
        const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
        if !LEVELS.contains(&self.level.as_str()) {
            return Err(invalid("logging", format!("unknown level '{}'", self.level)));
        }
        const ROTATIONS: [&str; 3] = ["never", "hourly", "daily"];
        if !ROTATIONS.contains(&self.rotation.as_str()) {
            return Err(invalid(
                "logging",
                format!("unknown rotation '{}'", self.rotation),
            ));
        }
        Ok(())
    }
}

/// Session lifecycle settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    /// Seconds between reference-store snapshots.
    pub autosave_interval_secs: u64,
    /// Port the UI surface binds to.
    pub port: u16,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            autosave_interval_secs: 60,
            port: 7700,
        }
    }
}

impl SessionConfig {
    fn validate(&self) -> Result<()> {
        if self.autosave_interval_secs == 0 {
            return Err(invalid("session", "autosave_interval_secs must be positive"));
        }
        if self.port == 0 {
            return Err(invalid("session", "port must be positive"));
        }
        Ok(())
    }
}

// =============================================================================
// Credentials
// =============================================================================

/// Provider credentials, read from the environment at startup.
///
/// A missing credential disables the corresponding collaborator rather than
/// failing startup. Values are never logged; the `Debug` impl redacts them.
#[derive(Clone, Default)]
pub struct Credentials {
    model_api_key: Option<String>,
    tts_api_key: Option<String>,
    search_api_key: Option<String>,
}

impl Credentials {
    /// Read credentials from `MODEL_API_KEY`, `TTS_API_KEY`, and
    /// `SEARCH_API_KEY`.
    pub fn from_env() -> Self {
        Self {
            model_api_key: read_secret("MODEL_API_KEY"),
            tts_api_key: read_secret("TTS_API_KEY"),
            search_api_key: read_secret("SEARCH_API_KEY"),
        }
    }

    pub fn has_model(&self) -> bool {
        self.model_api_key.is_some()
    }

    pub fn has_tts(&self) -> bool {
        self.tts_api_key.is_some()
    }

    pub fn has_search(&self) -> bool {
        self.search_api_key.is_some()
    }

    pub fn model_api_key(&self) -> Option<&str> {
        self.model_api_key.as_deref()
    }

    pub fn tts_api_key(&self) -> Option<&str> {
        self.tts_api_key.as_deref()
    }

    pub fn search_api_key(&self) -> Option<&str> {
        self.search_api_key.as_deref()
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fn mark(present: bool) -> &'static str {
            if present {
                "[set]"
            } else {
                "[missing]"
            }
        }
        f.debug_struct("Credentials")
            .field("model_api_key", &mark(self.model_api_key.is_some()))
            .field("tts_api_key", &mark(self.tts_api_key.is_some()))
            .field("search_api_key", &mark(self.search_api_key.is_some()))
            .finish()
    }
}

fn read_secret(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

// =============================================================================
// Tests
// =============================================================================
