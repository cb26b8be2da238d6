//! Immutable coordinator configuration.
//!
//! Built once at process start (file + `HELPLINE_*` environment overrides)
//! and passed by reference into every component constructor. Pass logic
//! never reads ambient global state.

use config::{Config as ConfigBuilder, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{HelplineError, HelplineResult};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CoordinatorConfig {
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub scheduler: SchedulerConfig,
    pub queue: QueueConfig,
    pub classifier: ClassifierConfig,
    pub tenancy: TenancyConfig,
    pub messages: MessageCatalog,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,

    #[serde(default = "default_pool_min")]
    pub pool_min_connections: u32,

    #[serde(default = "default_pool_max")]
    pub pool_max_connections: u32,

    #[serde(default = "default_acquire_timeout")]
    pub pool_acquire_timeout_secs: u64,

    #[serde(default = "default_idle_timeout")]
    pub pool_idle_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub json_format: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Assignment + agent-side expiry period. Tight because it governs
    /// user-visible "agent went silent" cutoffs.
    #[serde(default = "default_fast_interval")]
    pub fast_interval_secs: u64,

    /// Enrichment + memory reclamation period.
    #[serde(default = "default_slow_interval")]
    pub slow_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// "postgres" for the durable backend, "memory" for single-node runs.
    #[serde(default = "default_queue_backend")]
    pub backend: String,

    /// Prefix of workspace wait-queue keys: "{prefix}:{bot_id}:{workspace_id}".
    #[serde(default = "default_transfer_prefix")]
    pub transfer_prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Sentiment + language endpoint.
    #[serde(default)]
    pub sentiment_url: String,

    /// Tag-occurrence endpoint.
    #[serde(default)]
    pub tag_url: String,

    /// Static bearer-style header pair.
    #[serde(default)]
    pub app_key: String,

    #[serde(default = "default_super_team")]
    pub super_team: String,

    #[serde(default = "default_classifier_timeout")]
    pub timeout_secs: u64,

    /// A tag is kept when its occurrence count exceeds this value.
    #[serde(default = "default_tag_min_occurrences")]
    pub tag_min_occurrences: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenancyConfig {
    /// Suffix appended to the tenant slug to form its schema name. The
    /// coordinator discovers tenants by enumerating schemata carrying it.
    #[serde(default = "default_schema_suffix")]
    pub schema_suffix: String,
}

/// Localized message templates keyed by the profile's display-language
/// preference. Templates use `{agent_name}` and `{messages}` placeholders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageCatalog {
    #[serde(default = "default_english_pack")]
    pub english: LanguagePack,

    #[serde(default = "default_arabic_pack")]
    pub arabic: LanguagePack,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguagePack {
    /// Profile preference value this pack serves.
    pub preference: String,

    /// Greeting prompt sent through the workspace LLM when an agent is
    /// assigned.
    pub agent_arrival: String,

    /// Prompt used to summarize an expired session transcript.
    pub summary_prompt: String,
}

impl MessageCatalog {
    /// Resolve the language pack for a profile preference. Unknown
    /// preferences fall back to English.
    pub fn pack_for(&self, preference: &str) -> &LanguagePack {
        if preference == self.arabic.preference {
            &self.arabic
        } else {
            &self.english
        }
    }
}

impl LanguagePack {
    pub fn arrival_prompt(&self, agent_name: &str) -> String {
        self.agent_arrival.replace("{agent_name}", agent_name)
    }

    pub fn summary_prompt(&self, transcript: &str) -> String {
        self.summary_prompt.replace("{messages}", transcript)
    }
}

impl CoordinatorConfig {
    /// Load configuration from an optional TOML file plus `HELPLINE_*`
    /// environment overrides (e.g. `HELPLINE_DATABASE__URL`).
    pub fn load(path: Option<&Path>) -> HelplineResult<Self> {
        dotenvy::dotenv().ok();

        let mut builder = ConfigBuilder::builder();

        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }

        let settings = builder
            .add_source(Environment::with_prefix("HELPLINE").separator("__"))
            .build()?;

        let config: CoordinatorConfig = settings.try_deserialize()?;
        config.validate()?;

        Ok(config)
    }

    fn validate(&self) -> HelplineResult<()> {
        if self.scheduler.fast_interval_secs == 0 {
            return Err(HelplineError::InvalidConfigValue {
                key: "scheduler.fast_interval_secs".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        if self.scheduler.slow_interval_secs == 0 {
            return Err(HelplineError::InvalidConfigValue {
                key: "scheduler.slow_interval_secs".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        if self.queue.backend != "postgres" && self.queue.backend != "memory" {
            return Err(HelplineError::InvalidConfigValue {
                key: "queue.backend".to_string(),
                message: format!("unknown backend '{}'", self.queue.backend),
            });
        }
        Ok(())
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            pool_min_connections: default_pool_min(),
            pool_max_connections: default_pool_max(),
            pool_acquire_timeout_secs: default_acquire_timeout(),
            pool_idle_timeout_secs: default_idle_timeout(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json_format: false,
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            fast_interval_secs: default_fast_interval(),
            slow_interval_secs: default_slow_interval(),
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            backend: default_queue_backend(),
            transfer_prefix: default_transfer_prefix(),
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            sentiment_url: String::new(),
            tag_url: String::new(),
            app_key: String::new(),
            super_team: default_super_team(),
            timeout_secs: default_classifier_timeout(),
            tag_min_occurrences: default_tag_min_occurrences(),
        }
    }
}

impl Default for TenancyConfig {
    fn default() -> Self {
        Self {
            schema_suffix: default_schema_suffix(),
        }
    }
}

impl Default for MessageCatalog {
    fn default() -> Self {
        Self {
            english: default_english_pack(),
            arabic: default_arabic_pack(),
        }
    }
}

fn default_database_url() -> String {
    "postgres://localhost/helpline_dev".to_string()
}

fn default_pool_min() -> u32 {
    1
}

fn default_pool_max() -> u32 {
    10
}

fn default_acquire_timeout() -> u64 {
    30
}

fn default_idle_timeout() -> u64 {
    600
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_fast_interval() -> u64 {
    5
}

fn default_slow_interval() -> u64 {
    150
}

fn default_queue_backend() -> String {
    "postgres".to_string()
}

fn default_transfer_prefix() -> String {
    "transfer".to_string()
}

fn default_super_team() -> String {
    "100".to_string()
}

fn default_classifier_timeout() -> u64 {
    8
}

fn default_tag_min_occurrences() -> u32 {
    2
}

fn default_schema_suffix() -> String {
    "_helpline".to_string()
}

fn default_english_pack() -> LanguagePack {
    LanguagePack {
        preference: "english".to_string(),
        agent_arrival: "Write a short greeting telling the customer that support agent \
                        {agent_name} has joined the conversation and will assist them."
            .to_string(),
        summary_prompt: "Summarize the following customer conversation in a few sentences: \
                         {messages}"
            .to_string(),
    }
}

fn default_arabic_pack() -> LanguagePack {
    LanguagePack {
        preference: "arabic".to_string(),
        agent_arrival: "اكتب تحية قصيرة تخبر العميل بأن موظف الدعم {agent_name} قد انضم إلى \
                        المحادثة وسيساعده."
            .to_string(),
        summary_prompt: "لخص محادثة العميل التالية في بضع جمل: {messages}".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_intervals() {
        let config = CoordinatorConfig::default();
        assert_eq!(config.scheduler.fast_interval_secs, 5);
        assert_eq!(config.scheduler.slow_interval_secs, 150);
    }

    #[test]
    fn test_default_classifier() {
        let config = ClassifierConfig::default();
        assert_eq!(config.timeout_secs, 8);
        assert_eq!(config.tag_min_occurrences, 2);
        assert_eq!(config.super_team, "100");
    }

    #[test]
    fn test_pack_for_falls_back_to_english() {
        let catalog = MessageCatalog::default();
        assert_eq!(catalog.pack_for("arabic").preference, "arabic");
        assert_eq!(catalog.pack_for("english").preference, "english");
        assert_eq!(catalog.pack_for("klingon").preference, "english");
    }

    #[test]
    fn test_arrival_prompt_substitution() {
        let pack = default_english_pack();
        let prompt = pack.arrival_prompt("Sara");
        assert!(prompt.contains("Sara"));
        assert!(!prompt.contains("{agent_name}"));
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let mut config = CoordinatorConfig::default();
        config.scheduler.fast_interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_unknown_queue_backend() {
        let mut config = CoordinatorConfig::default();
        config.queue.backend = "etcd".to_string();
        assert!(config.validate().is_err());
    }
}
