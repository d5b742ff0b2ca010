//! Configuration file loading and explainer factory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use quizdeck_core::cache::CacheConfig;
use quizdeck_core::model::SessionConfig;
use quizdeck_core::traits::ExplanationProvider;

use crate::mock::MockExplainer;
use crate::openai::OpenAiExplainer;

/// Configuration for a single explanation provider.
///
/// Debug output masks API keys.
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ExplainerConfig {
    OpenAI {
        api_key: String,
        #[serde(default = "default_openai_model")]
        model: String,
        #[serde(default)]
        base_url: Option<String>,
        #[serde(default)]
        org_id: Option<String>,
    },
    Mock {
        #[serde(default)]
        response: Option<String>,
        #[serde(default)]
        confidence: Option<f64>,
    },
}

impl std::fmt::Debug for ExplainerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExplainerConfig::OpenAI {
                api_key: _,
                model,
                base_url,
                org_id,
            } => f
                .debug_struct("OpenAI")
                .field("api_key", &"***")
                .field("model", model)
                .field("base_url", base_url)
                .field("org_id", org_id)
                .finish(),
            ExplainerConfig::Mock {
                response,
                confidence,
            } => f
                .debug_struct("Mock")
                .field("response", response)
                .field("confidence", confidence)
                .finish(),
        }
    }
}

fn default_openai_model() -> String {
    "gpt-4.1-mini".to_string()
}

/// `[cache]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheSettings {
    #[serde(default = "default_max_cache_size")]
    pub max_cache_size: usize,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_ttl_hours")]
    pub ttl_hours: u32,
    /// Byte quota of the chunk store. Unlimited when absent.
    #[serde(default)]
    pub durable_quota_bytes: Option<u64>,
}

fn default_max_cache_size() -> usize {
    8
}
fn default_chunk_size() -> usize {
    50
}
fn default_ttl_hours() -> u32 {
    24
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            max_cache_size: default_max_cache_size(),
            chunk_size: default_chunk_size(),
            ttl_hours: default_ttl_hours(),
            durable_quota_bytes: None,
        }
    }
}

impl CacheSettings {
    pub fn to_cache_config(&self) -> CacheConfig {
        CacheConfig {
            max_cache_size: self.max_cache_size.max(1),
            chunk_size: self.chunk_size.max(1),
            ttl: chrono::Duration::hours(i64::from(self.ttl_hours)),
            ..CacheConfig::default()
        }
    }
}

/// Top-level quizdeck configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizdeckConfig {
    /// Corpus file path or `http(s)://` URL.
    #[serde(default = "default_corpus")]
    pub corpus: String,
    /// Directory holding the durable store.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default)]
    pub cache: CacheSettings,
    /// Defaults for new sessions.
    #[serde(default)]
    pub quiz: SessionConfig,
    /// Explainer configurations keyed by name.
    #[serde(default)]
    pub explainers: HashMap<String, ExplainerConfig>,
    /// Explainer used by `quiz --explain` when none is named.
    #[serde(default)]
    pub default_explainer: Option<String>,
    /// Time allowed for one explanation request.
    #[serde(default = "default_explain_timeout")]
    pub explain_timeout_secs: u64,
}

fn default_corpus() -> String {
    "questions.json".to_string()
}
fn default_data_dir() -> PathBuf {
    PathBuf::from(".quizdeck")
}
fn default_explain_timeout() -> u64 {
    20
}

impl Default for QuizdeckConfig {
    fn default() -> Self {
        Self {
            corpus: default_corpus(),
            data_dir: default_data_dir(),
            cache: CacheSettings::default(),
            quiz: SessionConfig::default(),
            explainers: HashMap::new(),
            default_explainer: None,
            explain_timeout_secs: default_explain_timeout(),
        }
    }
}

impl QuizdeckConfig {
    /// Look up an explainer by name, falling back to `default_explainer`.
    pub fn explainer(&self, name: Option<&str>) -> Result<(&str, &ExplainerConfig)> {
        let name = match name.or(self.default_explainer.as_deref()) {
            Some(name) => name,
            None => anyhow::bail!("no explainer named and no default_explainer configured"),
        };
        self.explainers
            .get_key_value(name)
            .map(|(k, v)| (k.as_str(), v))
            .with_context(|| format!("explainer '{name}' is not configured"))
    }
}

/// Config written by `quizdeck init`.
pub const STARTER_CONFIG: &str = r#"# quizdeck configuration
corpus = "questions.json"
data_dir = ".quizdeck"
default_explainer = "openai"
explain_timeout_secs = 20

[cache]
max_cache_size = 8
chunk_size = 50
ttl_hours = 24
# durable_quota_bytes = 5242880

[quiz]
question_count = 20
shuffle_questions = true
shuffle_options = false
time_per_question_secs = 60
timer_enabled = false
allow_answer_change = false

[explainers.openai]
type = "openai"
api_key = "${OPENAI_API_KEY}"
model = "gpt-4.1-mini"

[explainers.mock]
type = "mock"
"#;

/// Resolve environment variable references like `${VAR_NAME}` in a string.
///
/// Substituted values are taken literally; references inside them are not
/// expanded again.
fn resolve_env_vars(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(start) = rest.find("${") {
        let Some(end) = rest[start..].find('}') else {
            break;
        };
        let var_name = &rest[start + 2..start + end];
        result.push_str(&rest[..start]);
        result.push_str(&std::env::var(var_name).unwrap_or_default());
        rest = &rest[start + end + 1..];
    }
    result.push_str(rest);
    result
}

fn resolve_explainer_config(config: &ExplainerConfig) -> ExplainerConfig {
    match config {
        ExplainerConfig::OpenAI {
            api_key,
            model,
            base_url,
            org_id,
        } => ExplainerConfig::OpenAI {
            api_key: resolve_env_vars(api_key),
            model: resolve_env_vars(model),
            base_url: base_url.as_deref().map(resolve_env_vars),
            org_id: org_id.as_deref().map(resolve_env_vars),
        },
        ExplainerConfig::Mock {
            response,
            confidence,
        } => ExplainerConfig::Mock {
            response: response.as_deref().map(resolve_env_vars),
            confidence: *confidence,
        },
    }
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `quizdeck.toml` in the current directory
/// 2. `~/.config/quizdeck/config.toml`
///
/// `QUIZDECK_OPENAI_KEY` overrides the key of the `openai` explainer.
pub fn load_config() -> Result<QuizdeckConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<QuizdeckConfig> {
    let config_path = match path {
        Some(p) if p.exists() => Some(p.to_path_buf()),
        Some(p) => anyhow::bail!("config file not found: {}", p.display()),
        None => {
            let local = PathBuf::from("quizdeck.toml");
            if local.exists() {
                Some(local)
            } else {
                dirs_path()
                    .map(|home| home.join("config.toml"))
                    .filter(|global| global.exists())
            }
        }
    };

    let mut config = match config_path {
        Some(path) => {
            tracing::debug!(path = %path.display(), "loading config");
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            parse_config(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => QuizdeckConfig::default(),
    };

    if let Ok(key) = std::env::var("QUIZDECK_OPENAI_KEY") {
        let entry = config
            .explainers
            .entry("openai".into())
            .or_insert(ExplainerConfig::OpenAI {
                api_key: String::new(),
                model: default_openai_model(),
                base_url: None,
                org_id: None,
            });
        if let ExplainerConfig::OpenAI { api_key, .. } = entry {
            *api_key = key;
        }
    }

    config.explainers = config
        .explainers
        .iter()
        .map(|(k, v)| (k.clone(), resolve_explainer_config(v)))
        .collect();

    Ok(config)
}

/// Parse a config document.
pub fn parse_config(content: &str) -> Result<QuizdeckConfig> {
    let config: QuizdeckConfig = toml::from_str(content)?;
    if config.quiz.question_count == 0 {
        anyhow::bail!("[quiz] question_count must be at least 1");
    }
    Ok(config)
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("quizdeck"))
}

/// Create an explainer instance from its configuration.
pub fn create_explainer(
    name: &str,
    config: &ExplainerConfig,
) -> Result<Box<dyn ExplanationProvider>> {
    match config {
        ExplainerConfig::OpenAI {
            api_key,
            model,
            base_url,
            org_id,
        } => {
            if api_key.is_empty() {
                anyhow::bail!(
                    "explainer '{name}' has no API key (set QUIZDECK_OPENAI_KEY or api_key)"
                );
            }
            Ok(Box::new(OpenAiExplainer::new(
                api_key,
                model,
                base_url.clone(),
                org_id.clone(),
            )?))
        }
        ExplainerConfig::Mock {
            response,
            confidence,
        } => {
            let mut mock = MockExplainer::new();
            if let Some(response) = response {
                mock = mock.with_fixed_response(response, confidence.unwrap_or(1.0));
            }
            Ok(Box::new(mock))
        }
    }
}
