//! Pipeline configuration.
//!
//! Defaults cover every field, a TOML file may override any subset, and
//! `PREVIEW_*` environment variables override the file.

use crate::analyzer::AnalyzerKind;
use crate::bundler::{BundleConfig, BundleStrategy};
use crate::error::{PipelineError, PipelineResult};
use crate::heal::HealConfig;
use crate::preview::PreviewConfig;
use crate::validation::QualityRules;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Whether a pass stops at the first failing stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    #[default]
    FailFast,
    Comprehensive,
}

impl std::fmt::Display for RunMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FailFast => write!(f, "fail_fast"),
            Self::Comprehensive => write!(f, "comprehensive"),
        }
    }
}

impl std::str::FromStr for RunMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fail_fast" | "fail-fast" | "failfast" => Ok(Self::FailFast),
            "comprehensive" | "all" => Ok(Self::Comprehensive),
            other => Err(format!(
                "Invalid run mode '{}'. Valid values: fail_fast, comprehensive",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub analyzer: AnalyzerKind,
    pub mode: RunMode,
    /// Entry module to prefer over detection
    pub entry: Option<String>,
    pub quality: QualityRules,
    pub bundle: BundleConfig,
    pub preview: PreviewConfig,
    pub heal: HealConfig,
}

impl PipelineConfig {
    /// Parse a TOML document; missing keys take their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Load a TOML file.
    pub fn load(path: &Path) -> PipelineResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content).map_err(|e| PipelineError::config(path, e.to_string()))
    }

    /// Load `path` if given (defaults otherwise), then apply the environment.
    pub fn resolve(path: Option<&Path>) -> PipelineResult<Self> {
        let mut config = match path {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply `PREVIEW_*` overrides from `lookup`. Unparseable values are
    /// logged and ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("PREVIEW_ANALYZER") {
            set_parsed("PREVIEW_ANALYZER", &v, &mut self.analyzer);
        }
        if let Some(v) = lookup("PREVIEW_MODE") {
            set_parsed("PREVIEW_MODE", &v, &mut self.mode);
        }
        if let Some(v) = lookup("PREVIEW_ENTRY") {
            self.entry = Some(v);
        }
        if let Some(v) = lookup("PREVIEW_BUNDLE_STRATEGY") {
            set_parsed::<BundleStrategy>("PREVIEW_BUNDLE_STRATEGY", &v, &mut self.bundle.strategy);
        }
        if let Some(v) = lookup("PREVIEW_NAVIGATION_TIMEOUT_MS") {
            set_parsed("PREVIEW_NAVIGATION_TIMEOUT_MS", &v, &mut self.preview.navigation_timeout_ms);
        }
        if let Some(v) = lookup("PREVIEW_SETTLE_MS") {
            set_parsed("PREVIEW_SETTLE_MS", &v, &mut self.preview.settle_ms);
        }
        if let Some(v) = lookup("PREVIEW_CHROME") {
            self.preview.chrome_executable = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("PREVIEW_NO_SANDBOX") {
            self.preview.no_sandbox = matches!(v.as_str(), "1" | "true" | "yes");
        }
        if let Some(v) = lookup("PREVIEW_MAX_ATTEMPTS") {
            set_parsed("PREVIEW_MAX_ATTEMPTS", &v, &mut self.heal.max_attempts);
        }
        if let Some(v) = lookup("PREVIEW_REGENERATION_TIMEOUT_MS") {
            set_parsed(
                "PREVIEW_REGENERATION_TIMEOUT_MS",
                &v,
                &mut self.heal.regeneration_timeout_ms,
            );
        }
    }
}

fn set_parsed<T>(key: &str, value: &str, slot: &mut T)
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match value.parse::<T>() {
        Ok(parsed) => *slot = parsed,
        Err(e) => tracing::warn!(key, value, error = %e, "Ignoring invalid config override"),
    }
}
