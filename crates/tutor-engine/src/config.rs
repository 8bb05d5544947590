use std::collections::HashMap;
use std::env;
use std::fmt;
use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::service::ModelOptions;

pub const TUTOR_TITLE: &str = "O-Level Physics AI Tutor";
pub const TUTOR_TAGLINE: &str = "Ask me about Kinematics, Forces, Lenses, or Electricity!";
pub const DEFAULT_MODEL: &str = "gemini-flash-latest";
pub const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

pub const DEFAULT_SYSTEM_INSTRUCTION: &str = "\
You are a supportive O-Level Physics tutor (Singapore).
RULES:
1. g = 10 N/kg.
2. Speed of light = 3.0 x 10^8 m/s.
3. Unit Formatting: Use m/s, m/s^2 (NO negative indices like ms^-1).
4. EMI Phrase: Must use \"change in number of magnetic field lines going through a coil with time\".
5. Field Lines: Remind student to draw sufficient lines to show symmetry.
6. Scaffolding: Never give the answer immediately. Use hints.
";

/// Resolved from the environment first; callers layer CLI flags on top.
#[derive(Clone)]
pub struct TutorConfig {
    pub model: String,
    pub api_base: String,
    pub api_key: Option<String>,
    pub system_instruction: String,
    /// `None` leaves remote calls unbounded.
    pub request_timeout: Option<Duration>,
}

impl Default for TutorConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            api_base: DEFAULT_GEMINI_API_BASE.to_string(),
            api_key: None,
            system_instruction: DEFAULT_SYSTEM_INSTRUCTION.to_string(),
            request_timeout: None,
        }
    }
}

impl fmt::Debug for TutorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TutorConfig")
            .field("model", &self.model)
            .field("api_base", &self.api_base)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("system_instruction_chars", &self.system_instruction.len())
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl TutorConfig {
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Some(model) = non_empty_env("TUTOR_MODEL") {
            config.model = model;
        }
        if let Some(base) = non_empty_env("GEMINI_API_BASE") {
            config.api_base = base.trim_end_matches('/').to_string();
        }
        config.api_key = non_empty_env("GEMINI_API_KEY").or_else(|| non_empty_env("GOOGLE_API_KEY"));
        if let Some(raw) = non_empty_env("TUTOR_REQUEST_TIMEOUT_SECS") {
            config.request_timeout = parse_timeout_secs(&raw)
                .with_context(|| format!("invalid TUTOR_REQUEST_TIMEOUT_SECS '{raw}'"))?;
        }
        Ok(config)
    }

    pub fn with_instruction_file(mut self, path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed reading instruction file {}", path.display()))?;
        if raw.trim().is_empty() {
            bail!("instruction file {} is empty", path.display());
        }
        self.system_instruction = raw;
        Ok(self)
    }

    pub fn model_options(&self) -> ModelOptions {
        ModelOptions {
            model: self.model.clone(),
            system_instruction: self.system_instruction.clone(),
        }
    }
}

/// Parses a timeout in seconds; `0` means no timeout.
pub fn parse_timeout_secs(raw: &str) -> Result<Option<Duration>> {
    let secs: f64 = raw
        .trim()
        .parse()
        .with_context(|| format!("'{raw}' is not a number of seconds"))?;
    if !secs.is_finite() || secs < 0.0 {
        bail!("timeout must be a non-negative number of seconds");
    }
    if secs == 0.0 {
        return Ok(None);
    }
    Duration::try_from_secs_f64(secs)
        .map(Some)
        .with_context(|| format!("timeout of {raw} seconds is out of range"))
}

/// Loads `KEY=VALUE` pairs from a dotenv file into the process environment.
///
/// Variables already present in the environment win. Returns how many
/// variables were set.
pub fn load_env_file(path: &Path) -> Result<usize> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed reading env file {}", path.display()))?;
    let mut applied = 0;
    for (key, value) in parse_dotenv(&content) {
        if env::var_os(&key).is_some() {
            continue;
        }
        env::set_var(&key, value);
        applied += 1;
    }
    Ok(applied)
}

pub(crate) fn parse_dotenv(content: &str) -> HashMap<String, String> {
    let mut vars = HashMap::new();
    for raw_line in content.lines() {
        let mut line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some(stripped) = line.strip_prefix("export ") {
            line = stripped.trim();
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        let mut value = value.trim().to_string();
        if value.len() >= 2 {
            let bytes = value.as_bytes();
            if (bytes[0] == b'"' && bytes[bytes.len() - 1] == b'"')
                || (bytes[0] == b'\'' && bytes[bytes.len() - 1] == b'\'')
            {
                value = value[1..value.len() - 1].to_string();
            }
        }
        vars.insert(key.to_string(), value);
    }
    vars
}

pub(crate) fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
