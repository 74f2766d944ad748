//! Configuration for the port checker
//!
//! Reads configuration from:
//! - `.portcheckrc.yaml` / `.portcheckrc.json` / `portcheck.yaml` (project-level)
//! - the same names in the home directory (user-level)
//! - an explicit `--config` file or directory

use crate::diagnostic::Severity;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File names searched for, in order, inside a config directory
pub const CONFIG_NAMES: [&str; 6] = [
    ".portcheckrc.yaml",
    ".portcheckrc.yml",
    ".portcheckrc.json",
    "portcheck.yaml",
    "portcheck.yml",
    "portcheck.json",
];

/// Qualified name of the attribute that marks intentional virtual inheritance
pub const DEFAULT_MARKER: &str = "CsToCppPorter.CppVirtualInheritance";

/// Namespace prefix of platform (built-in) types
pub const DEFAULT_PLATFORM_PREFIX: &str = "System.";

/// Configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Bad/empty/unknown config path: {0}")]
    BadPath(PathBuf),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Analysis settings shared by every unit
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Qualified name of the virtual inheritance marker attribute
    pub marker: String,

    /// Namespace prefix identifying platform-origin types
    pub platform_prefix: String,

    /// Extra preprocessor symbols defined for every unit
    pub defines: Vec<String>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            marker: DEFAULT_MARKER.to_string(),
            platform_prefix: DEFAULT_PLATFORM_PREFIX.to_string(),
            defines: Vec::new(),
        }
    }
}

/// Rule configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    /// Disabled rules
    pub disabled: Vec<String>,
}

/// Engine settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Analyze the units of one compilation in parallel
    pub parallel: bool,

    /// Number of parallel jobs (0 = auto-detect)
    pub jobs: usize,
}

impl EngineConfig {
    /// Effective worker count
    pub fn worker_count(&self) -> usize {
        if self.jobs == 0 {
            num_cpus::get()
        } else {
            self.jobs
        }
    }
}

/// Output settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Verbosity of progress narration
    pub level: OutputLevel,

    /// Output format
    pub format: OutputFormat,

    /// Color mode
    pub color: ColorMode,
}

/// Tri-level verbosity. Gates what is printed, never what is detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputLevel {
    #[default]
    Error,
    Warning,
    Info,
}

impl OutputLevel {
    /// Whether a message of the given severity is shown at this level
    pub fn shows(self, severity: Severity) -> bool {
        match severity {
            Severity::Error => true,
            Severity::Warning => self >= OutputLevel::Warning,
            Severity::Info => self >= OutputLevel::Info,
        }
    }
}

impl std::str::FromStr for OutputLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "error" => Ok(OutputLevel::Error),
            "warning" => Ok(OutputLevel::Warning),
            "info" => Ok(OutputLevel::Info),
            _ => Err(format!("Unknown output level: {}", s)),
        }
    }
}

impl std::fmt::Display for OutputLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputLevel::Error => write!(f, "Error"),
            OutputLevel::Warning => write!(f, "Warning"),
            OutputLevel::Info => write!(f, "Info"),
        }
    }
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}

/// Color mode options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    #[default]
    Auto,
    Always,
    Never,
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Analysis settings
    pub analysis: AnalysisConfig,

    /// Rule configuration
    pub rules: RulesConfig,

    /// Engine settings
    pub engine: EngineConfig,

    /// Output settings
    pub output: OutputConfig,
}

impl Config {
    /// Create default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        let config: Self = match ext {
            "yaml" | "yml" => serde_yaml::from_str(&content)?,
            "json" => serde_json::from_str(&content)?,
            _ => {
                return Err(ConfigError::Invalid(format!(
                    "Unknown config file format: {}",
                    ext
                )))
            }
        };

        log::debug!("Loaded configuration from {}", path.display());
        config.validate()?;
        Ok(config)
    }

    /// Load from an explicit `--config` value: a file, or a directory searched
    /// for the default file names. Anything else is a bad path.
    pub fn resolve(path: &Path) -> Result<Self, ConfigError> {
        if path.as_os_str().is_empty() {
            return Err(ConfigError::BadPath(path.to_path_buf()));
        }
        if path.is_file() {
            return Self::load(path);
        }
        if path.is_dir() {
            return match Self::find_in(path) {
                Some(found) => Self::load(&found),
                None => {
                    log::debug!("No configuration file in {}, using defaults", path.display());
                    Ok(Self::default())
                }
            };
        }
        Err(ConfigError::BadPath(path.to_path_buf()))
    }

    /// First default-named config file inside `dir`
    pub fn find_in(dir: &Path) -> Option<PathBuf> {
        CONFIG_NAMES
            .iter()
            .map(|name| dir.join(name))
            .find(|path| path.is_file())
    }

    /// Load configuration from default locations
    pub fn load_default() -> Result<Self, ConfigError> {
        // Check current directory
        if let Some(path) = Self::find_in(Path::new(".")) {
            return Self::load(&path);
        }

        // Check home directory
        if let Some(home) = dirs::home_dir() {
            if let Some(path) = Self::find_in(&home) {
                return Self::load(&path);
            }
        }

        Ok(Self::default())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.analysis.marker.trim().is_empty() {
            return Err(ConfigError::Invalid("analysis.marker must not be empty".to_string()));
        }
        if self.analysis.platform_prefix.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "analysis.platform_prefix must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Merge CLI arguments into configuration
    pub fn merge_cli(
        &mut self,
        level: Option<OutputLevel>,
        format: Option<OutputFormat>,
        no_color: bool,
        parallel: bool,
        jobs: Option<usize>,
        disabled_rules: Option<Vec<String>>,
    ) {
        if let Some(l) = level {
            self.output.level = l;
        }
        if let Some(f) = format {
            self.output.format = f;
        }
        if no_color {
            self.output.color = ColorMode::Never;
        }
        if parallel {
            self.engine.parallel = true;
        }
        if let Some(j) = jobs {
            self.engine.jobs = j;
        }
        if let Some(disabled) = disabled_rules {
            self.rules.disabled.extend(disabled);
        }
    }

    /// Check if a rule is enabled
    pub fn is_rule_enabled(&self, rule_id: &str) -> bool {
        !self
            .rules
            .disabled
            .iter()
            .any(|d| d.eq_ignore_ascii_case(rule_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::new();
        assert!(!config.engine.parallel);
        assert_eq!(config.engine.jobs, 0);
        assert_eq!(config.output.format, OutputFormat::Text);
        assert_eq!(config.output.level, OutputLevel::Error);
        assert_eq!(config.analysis.marker, DEFAULT_MARKER);
        assert_eq!(config.analysis.platform_prefix, "System.");
    }

    #[test]
    fn test_output_level_from_str() {
        assert_eq!("Error".parse::<OutputLevel>().unwrap(), OutputLevel::Error);
        assert_eq!("warning".parse::<OutputLevel>().unwrap(), OutputLevel::Warning);
        assert_eq!("INFO".parse::<OutputLevel>().unwrap(), OutputLevel::Info);
        assert!("verbose".parse::<OutputLevel>().is_err());
    }

    #[test]
    fn test_output_level_gating() {
        assert!(OutputLevel::Error.shows(Severity::Error));
        assert!(!OutputLevel::Error.shows(Severity::Warning));
        assert!(OutputLevel::Warning.shows(Severity::Warning));
        assert!(!OutputLevel::Warning.shows(Severity::Info));
        assert!(OutputLevel::Info.shows(Severity::Info));
    }

    #[test]
    fn test_output_format_from_str() {
        assert_eq!("text".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert!("sarif".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_config_merge_cli() {
        let mut config = Config::new();
        config.merge_cli(
            Some(OutputLevel::Info),
            Some(OutputFormat::Json),
            true,
            true,
            Some(4),
            Some(vec!["non-ascii-identifiers".to_string()]),
        );

        assert_eq!(config.output.level, OutputLevel::Info);
        assert_eq!(config.output.format, OutputFormat::Json);
        assert_eq!(config.output.color, ColorMode::Never);
        assert!(config.engine.parallel);
        assert_eq!(config.engine.worker_count(), 4);
        assert!(!config.is_rule_enabled("non-ascii-identifiers"));
        assert!(config.is_rule_enabled("virtual-inheritance"));
    }

    #[test]
    fn test_yaml_deserialize() {
        let yaml = r#"
analysis:
  marker: Porting.VirtualBase
  defines: [NETSTANDARD]
engine:
  parallel: true
  jobs: 2
output:
  level: warning
  format: json
rules:
  disabled:
    - virtual-inheritance
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.analysis.marker, "Porting.VirtualBase");
        assert_eq!(config.analysis.platform_prefix, "System.");
        assert_eq!(config.analysis.defines, vec!["NETSTANDARD"]);
        assert!(config.engine.parallel);
        assert_eq!(config.output.level, OutputLevel::Warning);
        assert_eq!(config.output.format, OutputFormat::Json);
        assert!(!config.is_rule_enabled("Virtual-Inheritance"));
    }

    #[test]
    fn test_resolve_directory() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("portcheck.json"),
            r#"{"output": {"level": "info"}}"#,
        )
        .unwrap();

        let config = Config::resolve(dir.path()).unwrap();
        assert_eq!(config.output.level, OutputLevel::Info);
    }

    #[test]
    fn test_resolve_prefers_rc_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("portcheck.yaml"), "output:\n  level: info\n").unwrap();
        std::fs::write(dir.path().join(".portcheckrc.yaml"), "output:\n  level: warning\n").unwrap();

        let config = Config::resolve(dir.path()).unwrap();
        assert_eq!(config.output.level, OutputLevel::Warning);
    }

    #[test]
    fn test_resolve_bad_path() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing.yaml");
        assert!(matches!(Config::resolve(&missing), Err(ConfigError::BadPath(_))));
        assert!(matches!(Config::resolve(Path::new("")), Err(ConfigError::BadPath(_))));
    }

    #[test]
    fn test_load_rejects_unknown_extension() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "x = 1").unwrap();
        assert!(matches!(Config::load(&path), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_load_rejects_empty_marker() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("portcheck.yaml");
        std::fs::write(&path, "analysis:\n  marker: \"\"\n").unwrap();
        assert!(matches!(Config::load(&path), Err(ConfigError::Invalid(_))));
    }
}
