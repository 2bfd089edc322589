//! Configuration for providers, polling and the pipeline.
//!
//! Every field has a serde default so a partial JSON document (or none at
//! all) yields a working configuration. Credentials are kept apart from the
//! document and read from the environment.

use crate::errors::ConfigError;
use crate::poller::BackoffConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable holding the text-generation key.
pub const OPENAI_API_KEY_VAR: &str = "OPENAI_API_KEY";
/// Environment variable holding the video-synthesis key.
pub const WAVESPEED_API_KEY_VAR: &str = "WAVESPEED_API_KEY";
/// Environment variable holding the audio/composition key.
pub const FAL_API_KEY_VAR: &str = "FAL_API_KEY";

/// Top-level engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClipflowConfig {
    /// Text-generation provider.
    #[serde(default)]
    pub text: TextConfig,
    /// Video-synthesis provider.
    #[serde(default)]
    pub video: VideoConfig,
    /// Audio-synthesis queue endpoint.
    #[serde(default = "QueueEndpointConfig::audio")]
    pub audio: QueueEndpointConfig,
    /// Composition queue endpoint.
    #[serde(default = "QueueEndpointConfig::composition")]
    pub composition: QueueEndpointConfig,
    /// Remote task polling.
    #[serde(default)]
    pub polling: PollingConfig,
    /// Pipeline shape.
    #[serde(default)]
    pub pipeline: PipelineConfig,
    /// Local artifact storage.
    #[serde(default)]
    pub storage: StorageConfig,
}

impl Default for ClipflowConfig {
    fn default() -> Self {
        Self {
            text: TextConfig::default(),
            video: VideoConfig::default(),
            audio: QueueEndpointConfig::audio(),
            composition: QueueEndpointConfig::composition(),
            polling: PollingConfig::default(),
            pipeline: PipelineConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl ClipflowConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a JSON document and validates it.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.polling.validate()?;
        if self.pipeline.max_scenes == 0 {
            return Err(ConfigError::Invalid("pipeline.max_scenes must be at least 1".into()));
        }
        if self.pipeline.max_concurrent_jobs == 0 {
            return Err(ConfigError::Invalid(
                "pipeline.max_concurrent_jobs must be at least 1".into(),
            ));
        }
        if self.video.clip_duration_secs == 0 {
            return Err(ConfigError::Invalid("video.clip_duration_secs must be at least 1".into()));
        }
        for (name, template) in [
            ("video", &self.video.status_url_template),
            ("audio", &self.audio.status_url_template),
            ("composition", &self.composition.status_url_template),
        ] {
            if !template.contains("{id}") {
                return Err(ConfigError::Invalid(format!(
                    "{name}.status_url_template must contain an {{id}} placeholder"
                )));
            }
        }
        Ok(())
    }

    /// Sets the polling configuration.
    #[must_use]
    pub fn with_polling(mut self, polling: PollingConfig) -> Self {
        self.polling = polling;
        self
    }

    /// Sets the maximum number of scenes used per video.
    #[must_use]
    pub fn with_max_scenes(mut self, max_scenes: usize) -> Self {
        self.pipeline.max_scenes = max_scenes;
        self
    }

    /// Sets the storage root.
    #[must_use]
    pub fn with_storage_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.storage.root = root.into();
        self
    }
}

/// Text-generation (chat completions) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextConfig {
    /// Chat completions URL.
    #[serde(default = "default_text_endpoint")]
    pub endpoint: String,
    /// Model name.
    #[serde(default = "default_text_model")]
    pub model: String,
    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Prompt templates.
    #[serde(default)]
    pub prompts: PromptConfig,
}

fn default_text_endpoint() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}

fn default_text_model() -> String {
    "gpt-4-turbo".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

impl Default for TextConfig {
    fn default() -> Self {
        Self {
            endpoint: default_text_endpoint(),
            model: default_text_model(),
            temperature: default_temperature(),
            prompts: PromptConfig::default(),
        }
    }
}

/// Prompt templates sent to the text model.
///
/// `{idea}`, `{environment}` and `{sound}` are substituted in the scene
/// request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptConfig {
    /// System prompt for ideation.
    #[serde(default = "default_idea_system")]
    pub idea_system: String,
    /// User prompt for ideation when the job has no custom prompt.
    #[serde(default = "default_idea_user")]
    pub idea_user: String,
    /// System prompt for scripting.
    #[serde(default = "default_scene_system")]
    pub scene_system: String,
    /// User prompt for scripting.
    #[serde(default = "default_scene_user")]
    pub scene_user: String,
}

fn default_idea_system() -> String {
    "Generate exactly one short video idea for the user's topic. Reply with a single-line \
     JSON array holding one object with the keys Caption, Idea, Environment, Sound and \
     Status (always \"for production\")."
        .to_string()
}

fn default_idea_user() -> String {
    "A solid, hard material being sliced cleanly with a sharp blade, shaped like an \
     everyday object."
        .to_string()
}

fn default_scene_system() -> String {
    "Write cinematic scene descriptions for a short video. Answer in the format\n\
     Idea: \"...\"\nEnvironment: \"...\"\nSound: \"...\"\n\nScene 1: \"...\"\nScene 2: \"...\""
        .to_string()
}

fn default_scene_user() -> String {
    "Give me 3 video prompts based on the previous idea\n\n\
     Idea: \"{idea}\"\nEnvironment: \"{environment}\"\nSound: \"{sound}\""
        .to_string()
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            idea_system: default_idea_system(),
            idea_user: default_idea_user(),
            scene_system: default_scene_system(),
            scene_user: default_scene_user(),
        }
    }
}

/// Video-synthesis provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoConfig {
    /// Submission URL.
    #[serde(default = "default_video_submit")]
    pub submit_url: String,
    /// Status URL with an `{id}` placeholder.
    #[serde(default = "default_video_status")]
    pub status_url_template: String,
    /// Requested aspect ratio.
    #[serde(default = "default_aspect_ratio")]
    pub aspect_ratio: String,
    /// Length of every clip, which is also the composition slot length.
    #[serde(default = "default_clip_duration")]
    pub clip_duration_secs: u32,
}

fn default_video_submit() -> String {
    "https://api.wavespeed.ai/api/v3/bytedance/seedance-v1-pro-t2v-480p".to_string()
}

fn default_video_status() -> String {
    "https://api.wavespeed.ai/api/v3/predictions/{id}/result".to_string()
}

fn default_aspect_ratio() -> String {
    "9:16".to_string()
}

fn default_clip_duration() -> u32 {
    10
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            submit_url: default_video_submit(),
            status_url_template: default_video_status(),
            aspect_ratio: default_aspect_ratio(),
            clip_duration_secs: default_clip_duration(),
        }
    }
}

/// A queue-style endpoint: submit returns a request id, status is polled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueEndpointConfig {
    /// Submission URL.
    pub submit_url: String,
    /// Status URL with an `{id}` placeholder.
    pub status_url_template: String,
}

impl QueueEndpointConfig {
    /// Default audio endpoint.
    #[must_use]
    pub fn audio() -> Self {
        Self {
            submit_url: "https://queue.fal.run/fal-ai/mmaudio-v2".to_string(),
            status_url_template: "https://queue.fal.run/fal-ai/mmaudio-v2/requests/{id}/status"
                .to_string(),
        }
    }

    /// Default composition endpoint.
    #[must_use]
    pub fn composition() -> Self {
        Self {
            submit_url: "https://queue.fal.run/fal-ai/ffmpeg-api/compose".to_string(),
            status_url_template: "https://queue.fal.run/fal-ai/ffmpeg-api/requests/{id}/status"
                .to_string(),
        }
    }
}

/// Remote task polling settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollingConfig {
    /// First wait between polls.
    #[serde(default = "default_initial_interval")]
    pub initial_interval_ms: u64,
    /// Added to the wait after every non-terminal poll.
    #[serde(default = "default_increment")]
    pub increment_ms: u64,
    /// Upper bound of the wait.
    #[serde(default = "default_max_interval")]
    pub max_interval_ms: u64,
    /// Wait budget for one remote task.
    #[serde(default = "default_max_wait")]
    pub max_wait_secs: u64,
}

fn default_initial_interval() -> u64 {
    5_000
}

fn default_increment() -> u64 {
    2_000
}

fn default_max_interval() -> u64 {
    15_000
}

fn default_max_wait() -> u64 {
    300
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            initial_interval_ms: default_initial_interval(),
            increment_ms: default_increment(),
            max_interval_ms: default_max_interval(),
            max_wait_secs: default_max_wait(),
        }
    }
}

impl PollingConfig {
    /// Returns the backoff schedule.
    #[must_use]
    pub fn backoff(&self) -> BackoffConfig {
        BackoffConfig::new()
            .with_initial(Duration::from_millis(self.initial_interval_ms))
            .with_increment(Duration::from_millis(self.increment_ms))
            .with_max(Duration::from_millis(self.max_interval_ms))
    }

    /// Returns the per-task wait budget.
    #[must_use]
    pub fn max_wait(&self) -> Duration {
        Duration::from_secs(self.max_wait_secs)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.initial_interval_ms == 0 {
            return Err(ConfigError::Invalid("polling.initial_interval_ms must be positive".into()));
        }
        if self.max_interval_ms < self.initial_interval_ms {
            return Err(ConfigError::Invalid(
                "polling.max_interval_ms must not be below polling.initial_interval_ms".into(),
            ));
        }
        if self.max_wait_secs == 0 {
            return Err(ConfigError::Invalid("polling.max_wait_secs must be positive".into()));
        }
        Ok(())
    }
}

/// Pipeline shape settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Scenes beyond this count are dropped.
    #[serde(default = "default_max_scenes")]
    pub max_scenes: usize,
    /// Jobs allowed to run at the same time.
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,
    /// Whether jobs request audio unless told otherwise.
    #[serde(default = "default_include_sound")]
    pub include_sound: bool,
    /// Prepended to the idea's sound description for audio synthesis.
    #[serde(default = "default_audio_prompt_prefix")]
    pub audio_prompt_prefix: String,
}

fn default_max_scenes() -> usize {
    3
}

fn default_max_concurrent_jobs() -> usize {
    4
}

fn default_include_sound() -> bool {
    true
}

fn default_audio_prompt_prefix() -> String {
    "ASMR Soothing sound effects.".to_string()
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_scenes: default_max_scenes(),
            max_concurrent_jobs: default_max_concurrent_jobs(),
            include_sound: default_include_sound(),
            audio_prompt_prefix: default_audio_prompt_prefix(),
        }
    }
}

/// Local artifact storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root directory; videos and metadata live in subdirectories.
    #[serde(default = "default_storage_root")]
    pub root: PathBuf,
}

fn default_storage_root() -> PathBuf {
    PathBuf::from("generated")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_storage_root(),
        }
    }
}

/// An API key. `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    /// Wraps a key.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Returns the raw key.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

/// Credentials for the three providers.
#[derive(Debug, Clone)]
pub struct Credentials {
    /// Text-generation key.
    pub openai: ApiKey,
    /// Video-synthesis key.
    pub wavespeed: ApiKey,
    /// Audio/composition key.
    pub fal: ApiKey,
}

impl Credentials {
    /// Reads credentials from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads credentials through `lookup`, reporting every missing name.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut missing = Vec::new();
        let mut fetch = |name: &str| match lookup(name).filter(|v| !v.trim().is_empty()) {
            Some(value) => ApiKey::new(value),
            None => {
                missing.push(name.to_string());
                ApiKey::new("")
            }
        };

        let openai = fetch(OPENAI_API_KEY_VAR);
        let wavespeed = fetch(WAVESPEED_API_KEY_VAR);
        let fal = fetch(FAL_API_KEY_VAR);

        if missing.is_empty() {
            Ok(Self {
                openai,
                wavespeed,
                fal,
            })
        } else {
            Err(ConfigError::MissingCredentials(missing))
        }
    }
}
