//! Per-request options

use serde::{Deserialize, Serialize};

/// Generation knobs exposed in the UI sidebar
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Sampling temperature (0.0-1.0, default: 0.3)
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Maximum answer length in tokens (100-1000, default: 500)
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
}

fn default_temperature() -> f32 {
    0.3
}

fn default_max_output_tokens() -> u32 {
    500
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            max_output_tokens: default_max_output_tokens(),
        }
    }
}

impl GenerationOptions {
    /// Clamp values into the ranges the sliders allow
    pub fn clamped(self) -> Self {
        let temperature = if self.temperature.is_finite() {
            self.temperature.clamp(0.0, 1.0)
        } else {
            default_temperature()
        };
        Self {
            temperature,
            max_output_tokens: self.max_output_tokens.clamp(100, 1000),
        }
    }
}

/// Browser-session identifier used to scope on-disk index snapshots
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionKey(String);

impl SessionKey {
    const MAX_LEN: usize = 64;

    /// Sanitise a client-supplied identifier.
    ///
    /// Keeps `[A-Za-z0-9_-]`, truncates to 64 characters and falls back to
    /// `default` when nothing usable remains.
    pub fn new(raw: &str) -> Self {
        let cleaned: String = raw
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
            .take(Self::MAX_LEN)
            .collect();
        if cleaned.is_empty() {
            Self::default()
        } else {
            Self(cleaned)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionKey {
    fn default() -> Self {
        Self("default".to_string())
    }
}

impl std::fmt::Display for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
