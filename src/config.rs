use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

use crate::{PromptError, PromptResult};

/// Limits and knobs for the generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Upper clamp for the number of prompt slots in one call.
    #[serde(default = "default_max_prompts")]
    pub max_prompts: usize,

    /// Upper clamp for continuation passes per prompt slot.
    #[serde(default = "default_max_continues")]
    pub max_continues: usize,

    #[serde(default = "default_max_repeat")]
    pub max_repeat: usize,

    /// Maximum nesting of resolver frames before a pass is aborted.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Maximum bracket substitutions in one pass.
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,

    #[serde(default)]
    pub echo: EchoConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EchoConfig {
    #[serde(default = "default_echo_begin")]
    pub begin: String,
    #[serde(default = "default_echo_end")]
    pub end: String,
}

impl Default for EchoConfig {
    fn default() -> Self {
        Self {
            begin: default_echo_begin(),
            end: default_echo_end(),
        }
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            max_prompts: default_max_prompts(),
            max_continues: default_max_continues(),
            max_repeat: default_max_repeat(),
            max_depth: default_max_depth(),
            max_steps: default_max_steps(),
            echo: EchoConfig::default(),
        }
    }
}

impl GeneratorConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> PromptResult<Self> {
        from_file(path)
    }

    /// Clamps a requested prompt count into `1..=max_prompts`.
    pub fn clamp_prompts(&self, requested: usize) -> usize {
        requested.clamp(1, self.max_prompts.max(1))
    }

    pub fn clamp_continues(&self, requested: usize) -> usize {
        requested.min(self.max_continues)
    }
}

pub fn from_file<T: for<'de> Deserialize<'de>, P: AsRef<Path>>(path: P) -> PromptResult<T> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|e| {
        PromptError::template(format!(
            "Failed to open config file '{}': {}",
            path.display(),
            e
        ))
    })?;
    from_str(&text)
}

pub fn from_str<T: for<'de> Deserialize<'de>>(s: &str) -> PromptResult<T> {
    let config = serde_json::from_str(s)?;
    Ok(config)
}

fn default_max_prompts() -> usize {
    1000
}
fn default_max_continues() -> usize {
    10
}
fn default_max_repeat() -> usize {
    256
}
fn default_max_depth() -> usize {
    64
}
fn default_max_steps() -> usize {
    100_000
}
fn default_echo_begin() -> String {
    "<<BEGIN_ECHO>>".to_string()
}
fn default_echo_end() -> String {
    "<<END_ECHO>>".to_string()
}
