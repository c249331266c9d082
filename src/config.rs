//! Tool configuration module.
//!
//! Handles loading, validating, merging and updating the settings that
//! drive a processing run. A run always receives an immutable
//! [`ToolSettings`] snapshot; changes between runs go through
//! [`ToolSettings::apply`], which returns a new validated snapshot.
//!
//! ## Config File
//!
//! Settings can be loaded from a TOML file (`pixpress.toml` by default):
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [resize]
//! enabled = false
//! mode = "max_side"        # max_side | fixed_width | fixed_height | percentage
//! value = 1200             # 1-100 for percentage, 16-8000 for pixel modes
//!
//! [format]
//! type = "webp"            # webp | jpeg
//! quality = 0.85           # 0.1 - 1.0
//!
//! [optimization]
//! max_size_mb = 0          # 0 = unlimited
//!
//! [processing]
//! workers = 1              # 1 = strictly sequential
//! # item_timeout_secs = 30 # omit for no per-item timeout
//! ```
//!
//! ## Partial Configuration
//!
//! Config files are sparse: override just the values you want. The file is
//! merged over the stock defaults before it is deserialized.
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::OutputFormat;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Valid `resize.value` range in percentage mode.
pub const PERCENT_RANGE: std::ops::RangeInclusive<u32> = 1..=100;
/// Valid `resize.value` range in the pixel modes.
pub const PIXEL_RANGE: std::ops::RangeInclusive<u32> = 16..=8000;

/// Pixel value picked when leaving percentage mode with a value that only
/// makes sense as a percentage.
const DEFAULT_PIXEL_VALUE: u32 = 1200;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

fn invalid(msg: impl Into<String>) -> ConfigError {
    ConfigError::InvalidConfiguration(msg.into())
}

// =============================================================================
// Settings groups
// =============================================================================

/// How the target geometry is derived from the original dimensions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResizeMode {
    /// Bound the longer side; never upscale.
    #[default]
    MaxSide,
    FixedWidth,
    FixedHeight,
    Percentage,
}

impl ResizeMode {
    pub fn valid_range(self) -> std::ops::RangeInclusive<u32> {
        match self {
            ResizeMode::Percentage => PERCENT_RANGE,
            _ => PIXEL_RANGE,
        }
    }
}

impl FromStr for ResizeMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "max_side" => Ok(ResizeMode::MaxSide),
            "fixed_width" => Ok(ResizeMode::FixedWidth),
            "fixed_height" => Ok(ResizeMode::FixedHeight),
            "percentage" => Ok(ResizeMode::Percentage),
            other => Err(invalid(format!(
                "unknown resize mode '{other}' (expected max_side, fixed_width, fixed_height or percentage)"
            ))),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "webp" => Ok(OutputFormat::Webp),
            "jpeg" | "jpg" => Ok(OutputFormat::Jpeg),
            other => Err(invalid(format!(
                "unknown format '{other}' (expected webp or jpeg)"
            ))),
        }
    }
}

/// Resize geometry settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResizeConfig {
    pub enabled: bool,
    pub mode: ResizeMode,
    /// Percentage (1–100) or pixels (16–8000), depending on `mode`.
    pub value: u32,
}

impl Default for ResizeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            mode: ResizeMode::MaxSide,
            value: DEFAULT_PIXEL_VALUE,
        }
    }
}

impl ResizeConfig {
    /// Switch modes, carrying the value across the unit change.
    ///
    /// Entering percentage mode starts at 100%. Leaving it for a pixel mode
    /// replaces a value of 100 or less with 1200 px.
    pub fn with_mode(self, mode: ResizeMode) -> Self {
        let value = if mode == ResizeMode::Percentage && self.mode != ResizeMode::Percentage {
            *PERCENT_RANGE.end()
        } else if self.mode == ResizeMode::Percentage
            && mode != ResizeMode::Percentage
            && self.value <= *PERCENT_RANGE.end()
        {
            DEFAULT_PIXEL_VALUE
        } else {
            self.value
        };
        Self {
            mode,
            value,
            ..self
        }
    }
}

/// Output codec settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FormatConfig {
    #[serde(rename = "type")]
    pub kind: OutputFormat,
    /// Lossy quality, 0.1–1.0.
    pub quality: f32,
}

impl Default for FormatConfig {
    fn default() -> Self {
        Self {
            kind: OutputFormat::Webp,
            quality: 0.85,
        }
    }
}

/// Output size budget.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OptimizationConfig {
    /// Target size per output in MB; `0` means unlimited. Best effort only.
    #[serde(alias = "maxSizeMB")]
    pub max_size_mb: f64,
}

impl OptimizationConfig {
    /// The budget in bytes, or `None` when unlimited.
    pub fn budget_bytes(&self) -> Option<u64> {
        (self.max_size_mb > 0.0).then(|| (self.max_size_mb * 1024.0 * 1024.0).round() as u64)
    }
}

/// Immutable settings snapshot handed to each processing run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolSettings {
    pub resize: ResizeConfig,
    pub format: FormatConfig,
    pub optimization: OptimizationConfig,
}

impl ToolSettings {
    /// Validate every value against its range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let range = self.resize.mode.valid_range();
        if !range.contains(&self.resize.value) {
            return Err(invalid(format!(
                "resize.value {} is outside {}-{} for mode {:?}",
                self.resize.value,
                range.start(),
                range.end(),
                self.resize.mode
            )));
        }
        let quality = self.format.quality;
        if !quality.is_finite() || !(0.1..=1.0).contains(&quality) {
            return Err(invalid(format!(
                "format.quality must be 0.1-1.0, got {quality}"
            )));
        }
        let mb = self.optimization.max_size_mb;
        if !mb.is_finite() || mb < 0.0 {
            return Err(invalid(format!(
                "optimization.max_size_mb must be >= 0, got {mb}"
            )));
        }
        Ok(())
    }

    /// Apply one update and return the resulting validated snapshot.
    ///
    /// `self` is left untouched, so a rejected update never leaves a
    /// half-applied configuration behind.
    pub fn apply(&self, update: SettingsUpdate) -> Result<ToolSettings, ConfigError> {
        let mut next = *self;
        match update {
            SettingsUpdate::Resize(ResizeUpdate::Enabled(enabled)) => next.resize.enabled = enabled,
            SettingsUpdate::Resize(ResizeUpdate::Mode(mode)) => next.resize = next.resize.with_mode(mode),
            SettingsUpdate::Resize(ResizeUpdate::Value(value)) => next.resize.value = value,
            SettingsUpdate::Format(FormatUpdate::Type(kind)) => next.format.kind = kind,
            SettingsUpdate::Format(FormatUpdate::Quality(quality)) => next.format.quality = quality,
            SettingsUpdate::Optimization(OptimizationUpdate::MaxSizeMb(mb)) => {
                next.optimization.max_size_mb = mb
            }
        }
        next.validate()?;
        Ok(next)
    }
}

// =============================================================================
// Settings updates
// =============================================================================

/// One change to one settings group.
///
/// Closed on purpose: an update naming a field that does not exist cannot
/// be constructed, so it is rejected when parsed rather than when used.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SettingsUpdate {
    Resize(ResizeUpdate),
    Format(FormatUpdate),
    Optimization(OptimizationUpdate),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResizeUpdate {
    Enabled(bool),
    Mode(ResizeMode),
    Value(u32),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FormatUpdate {
    Type(OutputFormat),
    Quality(f32),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OptimizationUpdate {
    MaxSizeMb(f64),
}

fn parse_value<T: FromStr>(key: &str, raw: &str) -> Result<T, ConfigError> {
    raw.trim()
        .parse()
        .map_err(|_| invalid(format!("cannot parse '{raw}' for {key}")))
}

/// Parses `group.key=value`, e.g. `resize.mode=percentage`.
impl FromStr for SettingsUpdate {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (key, raw) = s
            .split_once('=')
            .ok_or_else(|| invalid(format!("expected KEY=VALUE, got '{s}'")))?;
        let key = key.trim();
        let update = match key {
            "resize.enabled" => SettingsUpdate::Resize(ResizeUpdate::Enabled(parse_value(key, raw)?)),
            "resize.mode" => SettingsUpdate::Resize(ResizeUpdate::Mode(raw.trim().parse()?)),
            "resize.value" => SettingsUpdate::Resize(ResizeUpdate::Value(parse_value(key, raw)?)),
            "format.type" => SettingsUpdate::Format(FormatUpdate::Type(raw.trim().parse()?)),
            "format.quality" => SettingsUpdate::Format(FormatUpdate::Quality(parse_value(key, raw)?)),
            "optimization.max_size_mb" | "optimization.maxSizeMB" => {
                SettingsUpdate::Optimization(OptimizationUpdate::MaxSizeMb(parse_value(key, raw)?))
            }
            other => return Err(invalid(format!("unknown setting '{other}'"))),
        };
        Ok(update)
    }
}

// =============================================================================
// Processing (run options)
// =============================================================================

/// Run-level options that are not part of the per-image settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Number of images processed at once. `1` keeps the run strictly
    /// sequential; larger values are clamped to the core count.
    pub workers: usize,
    /// Give up on a single image after this many seconds. Absent = no limit.
    pub item_timeout_secs: Option<u64>,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            item_timeout_secs: None,
        }
    }
}

impl ProcessingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(invalid("processing.workers must be at least 1"));
        }
        if self.item_timeout_secs == Some(0) {
            return Err(invalid("processing.item_timeout_secs must be positive"));
        }
        Ok(())
    }
}

/// Resolve the effective worker count from config.
///
/// The user can constrain down, not up: `min(workers, cores)`, at least 1.
pub fn effective_workers(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.workers.clamp(1, cores)
}

// =============================================================================
// Config file loading, merging, and validation
// =============================================================================

/// Everything a config file can hold.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub resize: ResizeConfig,
    pub format: FormatConfig,
    pub optimization: OptimizationConfig,
    pub processing: ProcessingConfig,
}

impl Config {
    pub fn settings(&self) -> ToolSettings {
        ToolSettings {
            resize: self.resize,
            format: self.format,
            optimization: self.optimization,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.settings().validate()?;
        self.processing.validate()
    }
}

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    toml::Value::try_from(Config::default())
        .map_err(|e| invalid(format!("default config does not serialize: {e}")))
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
/// Returns `Err` if the file exists but contains invalid TOML.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Rewrite alias keys in a user overlay to their canonical names, so they
/// replace the stock value instead of sitting next to it after the merge.
///
/// When both spellings are present the overlay is left alone and
/// deserialization reports the duplicate.
fn normalize_aliases(overlay: &mut toml::Value) {
    if let Some(opt) = overlay
        .get_mut("optimization")
        .and_then(toml::Value::as_table_mut)
    {
        if !opt.contains_key("max_size_mb") {
            if let Some(value) = opt.remove("maxSizeMB") {
                opt.insert("max_size_mb".to_string(), value);
            }
        }
    }
}

/// Whether the overlay picks a resize mode but leaves `value` to the defaults.
fn sets_mode_without_value(overlay: &toml::Value) -> bool {
    overlay
        .get("resize")
        .and_then(toml::Value::as_table)
        .is_some_and(|resize| resize.contains_key("mode") && !resize.contains_key("value"))
}

/// Merge an optional overlay onto the stock defaults, then deserialize and validate.
///
/// A file that sets `resize.mode` without `resize.value` gets the same value
/// carry-over as [`ResizeConfig::with_mode`]: `percentage` starts at 100.
pub fn resolve_config(overlay: Option<toml::Value>) -> Result<Config, ConfigError> {
    let base = stock_defaults_value()?;
    let (merged, mode_only) = match overlay {
        Some(mut ov) => {
            normalize_aliases(&mut ov);
            let mode_only = sets_mode_without_value(&ov);
            (merge_toml(base, ov), mode_only)
        }
        None => (base, false),
    };
    let mut config: Config = merged.try_into()?;
    if mode_only {
        let mode = config.resize.mode;
        config.resize = ResizeConfig {
            mode: ResizeMode::default(),
            ..config.resize
        }
        .with_mode(mode);
    }
    config.validate()?;
    Ok(config)
}

/// Load config from the TOML file at `path`.
///
/// A missing file yields the stock defaults. Unknown keys are rejected and
/// the merged result is validated.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    resolve_config(load_raw_config(path)?)
}

/// Returns a fully-commented stock config file with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# pixpress configuration
# ======================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Resize
# ---------------------------------------------------------------------------
[resize]
# Resize at all? When false every image keeps its original dimensions.
enabled = false

# max_side     - bound the longer side to `value` px (never upscales)
# fixed_width  - width = `value` px, height follows the aspect ratio
# fixed_height - height = `value` px, width follows the aspect ratio
# percentage   - scale both sides to `value` percent
mode = "max_side"

# 1-100 for percentage, 16-8000 for the pixel modes.
value = 1200

# ---------------------------------------------------------------------------
# Output format
# ---------------------------------------------------------------------------
[format]
# webp or jpeg.
type = "webp"

# Lossy quality between 0.1 (smallest) and 1.0 (best).
quality = 0.85

# ---------------------------------------------------------------------------
# Size budget
# ---------------------------------------------------------------------------
[optimization]
# Approximate per-image size target in MB. 0 = unlimited.
# A single best-effort shrink is attempted; the target is not guaranteed.
max_size_mb = 0.0

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Images processed at once. 1 = strictly sequential, in input order.
workers = 1

# Fail an image that takes longer than this many seconds.
# Omit or comment out for no limit.
# item_timeout_secs = 30
"##
}
