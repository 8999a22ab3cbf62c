use crate::guidelines::Guidelines;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Name of the config file looked up at the root of an analyzed tree.
pub const CONFIG_FILE_NAME: &str = "ecoscan.toml";

/// Analysis configuration loaded from `ecoscan.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default)]
    pub pipeline: PipelineSettings,
    #[serde(default)]
    pub gateway: GatewaySettings,
    #[serde(default)]
    pub sampling: SamplingSettings,
    #[serde(default)]
    pub thresholds: Thresholds,
    #[serde(default)]
    pub scan: ScanSettings,
    /// Per-kind weight overrides merged onto the built-in table.
    #[serde(default)]
    pub weights: BTreeMap<String, u32>,
}

/// How ranked findings are ordered within equal weight.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RankingOrder {
    /// High, then Medium, then Low.
    #[default]
    Urgency,
    /// Alphabetical by severity name: High, Low, Medium.
    Lexical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSettings {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Wall-clock budget for the whole enrichment phase
    #[serde(default = "default_enrich_budget_ms")]
    pub enrich_budget_ms: u64,
    #[serde(default = "default_heartbeat_ms")]
    pub heartbeat_ms: u64,
    #[serde(default)]
    pub ranking: RankingOrder,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewaySettings {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Model override for the selected provider
    pub model: Option<String>,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

/// Bounds on what the assisted rule batch sends to the generation service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplingSettings {
    #[serde(default = "default_files_per_dir")]
    pub files_per_dir: usize,
    #[serde(default = "default_max_files")]
    pub max_files: usize,
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thresholds {
    /// Cyclomatic complexity above which a function is flagged
    #[serde(default = "default_complexity")]
    pub complexity: u32,
    #[serde(default = "default_max_pixels")]
    pub max_pixels: u64,
    /// Compressed/original ratio above which a script counts as poorly compressible
    #[serde(default = "default_compression_ratio")]
    pub compression_ratio: f64,
    #[serde(default = "default_min_compress_bytes")]
    pub min_compress_bytes: usize,
    #[serde(default = "default_uncompressed_asset_bytes")]
    pub uncompressed_asset_bytes: u64,
    #[serde(default = "default_unused_css_fraction")]
    pub unused_css_fraction: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanSettings {
    /// Glob patterns, relative to the tree root, skipped by the static engine and the sampler
    #[serde(default)]
    pub exclude: Vec<String>,
}

fn default_chunk_size() -> usize {
    5
}

fn default_enrich_budget_ms() -> u64 {
    45_000
}

fn default_heartbeat_ms() -> u64 {
    10_000
}

fn default_max_attempts() -> u32 {
    2
}

fn default_temperature() -> f32 {
    0.1
}

fn default_request_timeout_ms() -> u64 {
    60_000
}

fn default_files_per_dir() -> usize {
    5
}

fn default_max_files() -> usize {
    20
}

fn default_max_chars() -> usize {
    2000
}

fn default_complexity() -> u32 {
    10
}

fn default_max_pixels() -> u64 {
    1_000_000
}

fn default_compression_ratio() -> f64 {
    0.7
}

fn default_min_compress_bytes() -> usize {
    1024
}

fn default_uncompressed_asset_bytes() -> u64 {
    1024
}

fn default_unused_css_fraction() -> f64 {
    0.2
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            enrich_budget_ms: default_enrich_budget_ms(),
            heartbeat_ms: default_heartbeat_ms(),
            ranking: RankingOrder::default(),
        }
    }
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            temperature: default_temperature(),
            model: None,
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl Default for SamplingSettings {
    fn default() -> Self {
        Self {
            files_per_dir: default_files_per_dir(),
            max_files: default_max_files(),
            max_chars: default_max_chars(),
        }
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            complexity: default_complexity(),
            max_pixels: default_max_pixels(),
            compression_ratio: default_compression_ratio(),
            min_compress_bytes: default_min_compress_bytes(),
            uncompressed_asset_bytes: default_uncompressed_asset_bytes(),
            unused_css_fraction: default_unused_css_fraction(),
        }
    }
}

impl PipelineSettings {
    pub fn enrich_budget(&self) -> Duration {
        Duration::from_millis(self.enrich_budget_ms)
    }

    pub fn heartbeat(&self) -> Duration {
        Duration::from_millis(self.heartbeat_ms)
    }
}

impl AnalysisConfig {
    /// Build the guideline tables with this config's weight overrides applied.
    pub fn guidelines(&self) -> Guidelines {
        Guidelines::builtin().with_weight_overrides(&self.weights)
    }

    /// Apply `ECOSCAN_*` environment overrides on top of file values.
    pub fn with_env_overrides(self) -> anyhow::Result<Self> {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    fn with_overrides_from<F>(mut self, lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("ECOSCAN_ENRICH_BUDGET_MS") {
            self.pipeline.enrich_budget_ms = parse_env("ECOSCAN_ENRICH_BUDGET_MS", &v)?;
        }
        if let Some(v) = lookup("ECOSCAN_CHUNK_SIZE") {
            self.pipeline.chunk_size = parse_env("ECOSCAN_CHUNK_SIZE", &v)?;
        }
        if let Some(v) = lookup("ECOSCAN_HEARTBEAT_MS") {
            self.pipeline.heartbeat_ms = parse_env("ECOSCAN_HEARTBEAT_MS", &v)?;
        }
        if let Some(v) = lookup("ECOSCAN_MAX_ATTEMPTS") {
            self.gateway.max_attempts = parse_env("ECOSCAN_MAX_ATTEMPTS", &v)?;
        }
        if let Some(v) = lookup("ECOSCAN_MODEL") {
            if !v.trim().is_empty() {
                self.gateway.model = Some(v.trim().to_string());
            }
        }
        self.validate()?;
        Ok(self)
    }

    /// Reject settings that would stall or disable the pipeline.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.pipeline.chunk_size == 0 {
            anyhow::bail!("pipeline.chunk_size must be at least 1");
        }
        if self.pipeline.heartbeat_ms == 0 {
            anyhow::bail!("pipeline.heartbeat_ms must be greater than zero");
        }
        if self.gateway.max_attempts == 0 {
            anyhow::bail!("gateway.max_attempts must be at least 1");
        }
        for pattern in &self.scan.exclude {
            glob::Pattern::new(pattern)
                .map_err(|e| anyhow::anyhow!("Invalid exclude pattern '{}': {}", pattern, e))?;
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> anyhow::Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|e| anyhow::anyhow!("Invalid value '{}' for {}: {}", value, key, e))
}

/// Load configuration from a TOML file.
pub fn load_config(path: &Path) -> anyhow::Result<AnalysisConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e))?;
    let config: AnalysisConfig = toml::from_str(&content)
        .map_err(|e| anyhow::anyhow!("Failed to parse config file '{}': {}", path.display(), e))?;
    config.validate()?;
    Ok(config)
}

/// Load `ecoscan.toml` from `root` if present, defaults otherwise.
pub fn load_config_for_tree(root: &Path) -> anyhow::Result<AnalysisConfig> {
    let candidate = root.join(CONFIG_FILE_NAME);
    if candidate.is_file() {
        load_config(&candidate)
    } else {
        Ok(AnalysisConfig::default())
    }
}
