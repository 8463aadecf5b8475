//! Pipeline configuration.
//!
//! Settings are layered: defaults → `pcrflow.toml` → environment → CLI.
//! Executable and genome paths are static configuration and are never taken
//! from a request.
//!
//! # Configuration File Format
//!
//! ```toml
//! [paths]
//! upload_root = "instance/seq"
//! genome = "/data/genome/Homo_sapiens.GRCh38.dna.primary_assembly.fa"
//!
//! [tools]
//! primer3_core = "/opt/primer3/primer3_core"
//! primersearch = "/usr/local/bin/primersearch"
//!
//! [primer3]
//! opt_size = 20
//! min_size = 18
//! max_size = 27
//! opt_tm = 60.0
//! min_tm = 57.0
//! max_tm = 63.0
//! product_size_range = "75-150"
//! num_return = 5
//! explain = true
//!
//! [primersearch]
//! mismatch_percent = 0
//!
//! [server]
//! host = "127.0.0.1"
//! port = 5000
//! ```

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::warn;

pub const CONFIG_FILE_NAME: &str = "pcrflow.toml";

static PRODUCT_SIZE_RANGE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+-\d+(\s+\d+-\d+)*$").unwrap());

/// Filesystem locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Directory holding one workspace per sequence identity
    #[serde(default = "default_upload_root")]
    pub upload_root: PathBuf,
    /// Reference genome FASTA searched by primersearch
    #[serde(default = "default_genome")]
    pub genome: PathBuf,
}

fn default_upload_root() -> PathBuf {
    PathBuf::from("instance/seq")
}

fn default_genome() -> PathBuf {
    PathBuf::from("genome/Homo_sapiens.GRCh38.dna.primary_assembly.fa")
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            upload_root: default_upload_root(),
            genome: default_genome(),
        }
    }
}

/// External executables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default = "default_primer3_core")]
    pub primer3_core: String,
    #[serde(default = "default_primersearch")]
    pub primersearch: String,
}

fn default_primer3_core() -> String {
    "primer3_core".to_string()
}

fn default_primersearch() -> String {
    "primersearch".to_string()
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            primer3_core: default_primer3_core(),
            primersearch: default_primersearch(),
        }
    }
}

/// Global primer3 settings written into every design template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Primer3Settings {
    #[serde(default = "default_opt_size")]
    pub opt_size: u32,
    #[serde(default = "default_min_size")]
    pub min_size: u32,
    #[serde(default = "default_max_size")]
    pub max_size: u32,
    #[serde(default = "default_opt_tm")]
    pub opt_tm: f64,
    #[serde(default = "default_min_tm")]
    pub min_tm: f64,
    #[serde(default = "default_max_tm")]
    pub max_tm: f64,
    /// Space separated `min-max` ranges, e.g. "75-150 150-250"
    #[serde(default = "default_product_size_range")]
    pub product_size_range: String,
    /// Number of primer pairs to return
    #[serde(default = "default_num_return")]
    pub num_return: u32,
    /// Ask primer3 to explain how many candidates were rejected and why
    #[serde(default = "default_explain")]
    pub explain: bool,
}

fn default_opt_size() -> u32 {
    20
}

fn default_min_size() -> u32 {
    18
}

fn default_max_size() -> u32 {
    27
}

fn default_opt_tm() -> f64 {
    60.0
}

fn default_min_tm() -> f64 {
    57.0
}

fn default_max_tm() -> f64 {
    63.0
}

fn default_product_size_range() -> String {
    "75-150".to_string()
}

fn default_num_return() -> u32 {
    5
}

fn default_explain() -> bool {
    true
}

impl Default for Primer3Settings {
    fn default() -> Self {
        Self {
            opt_size: default_opt_size(),
            min_size: default_min_size(),
            max_size: default_max_size(),
            opt_tm: default_opt_tm(),
            min_tm: default_min_tm(),
            max_tm: default_max_tm(),
            product_size_range: default_product_size_range(),
            num_return: default_num_return(),
            explain: default_explain(),
        }
    }
}

/// primersearch settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PrimersearchSettings {
    /// Allowed percent mismatch between primer and genome
    #[serde(default)]
    pub mismatch_percent: u32,
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5000
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Root configuration, mirrors `pcrflow.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub primer3: Primer3Settings,
    #[serde(default)]
    pub primersearch: PrimersearchSettings,
    #[serde(default)]
    pub server: ServerSettings,
}

impl PipelineConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse pcrflow.toml")
    }

    /// Load the explicit `path` if given, else `./pcrflow.toml` if present,
    /// else defaults. An explicit path that does not exist is an error.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let local = Path::new(CONFIG_FILE_NAME);
                if local.exists() {
                    Self::load(local)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Full resolution used by the binary: file, then process environment.
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        let mut config = Self::load_or_default(path)?;
        config.apply_env();
        Ok(config)
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = self.to_toml()?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize pcrflow.toml")
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from `lookup`, which maps variable names to values.
    ///
    /// Recognized variables: `PCRFLOW_UPLOAD_ROOT`, `PCRFLOW_GENOME`,
    /// `PRIMER3_CORE`, `PRIMERSEARCH`, `PCRFLOW_PORT`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(root) = lookup("PCRFLOW_UPLOAD_ROOT") {
            self.paths.upload_root = PathBuf::from(root);
        }
        if let Some(genome) = lookup("PCRFLOW_GENOME") {
            self.paths.genome = PathBuf::from(genome);
        }
        if let Some(cmd) = lookup("PRIMER3_CORE") {
            self.tools.primer3_core = cmd;
        }
        if let Some(cmd) = lookup("PRIMERSEARCH") {
            self.tools.primersearch = cmd;
        }
        if let Some(port) = lookup("PCRFLOW_PORT") {
            match port.parse() {
                Ok(port) => self.server.port = port,
                Err(_) => warn!(value = %port, "Ignoring invalid PCRFLOW_PORT"),
            }
        }
    }

    /// Validate the configuration and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.tools.primer3_core.trim().is_empty() {
            warnings.push("tools.primer3_core is empty".to_string());
        }
        if self.tools.primersearch.trim().is_empty() {
            warnings.push("tools.primersearch is empty".to_string());
        }
        if !self.paths.genome.is_file() {
            warnings.push(format!(
                "Genome file not found: {} (primersearch will fail)",
                self.paths.genome.display()
            ));
        }

        let p3 = &self.primer3;
        if !(p3.min_size <= p3.opt_size && p3.opt_size <= p3.max_size) {
            warnings.push(format!(
                "primer3 sizes must satisfy min <= opt <= max (got {} / {} / {})",
                p3.min_size, p3.opt_size, p3.max_size
            ));
        }
        if !(p3.min_tm <= p3.opt_tm && p3.opt_tm <= p3.max_tm) {
            warnings.push(format!(
                "primer3 Tm must satisfy min <= opt <= max (got {} / {} / {})",
                p3.min_tm, p3.opt_tm, p3.max_tm
            ));
        }
        if !is_valid_product_size_range(&p3.product_size_range) {
            warnings.push(format!(
                "Invalid product_size_range '{}': expected ranges like '75-150 150-250'",
                p3.product_size_range
            ));
        }
        if p3.num_return == 0 {
            warnings.push("primer3.num_return is 0, no primers will be designed".to_string());
        }
        if self.primersearch.mismatch_percent > 100 {
            warnings.push(format!(
                "primersearch.mismatch_percent {} is above 100",
                self.primersearch.mismatch_percent
            ));
        }

        warnings
    }
}

/// Check `min-max` ranges, each with min < max.
pub fn is_valid_product_size_range(value: &str) -> bool {
    let value = value.trim();
    if !PRODUCT_SIZE_RANGE_REGEX.is_match(value) {
        return false;
    }
    value.split_whitespace().all(|range| {
        let mut bounds = range.split('-').map(|n| n.parse::<u64>());
        matches!((bounds.next(), bounds.next()), (Some(Ok(lo)), Some(Ok(hi))) if lo < hi)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn test_config_parse_empty() {
        let config = PipelineConfig::parse("").unwrap();
        assert_eq!(config.paths.upload_root, PathBuf::from("instance/seq"));
        assert_eq!(config.tools.primer3_core, "primer3_core");
        assert_eq!(config.primer3.opt_size, 20);
        assert_eq!(config.primersearch.mismatch_percent, 0);
        assert_eq!(config.server.port, 5000);
    }

    #[test]
    fn test_config_parse_partial_sections() {
        let content = r#"
[tools]
primer3_core = "/opt/primer3/primer3_core"

[primer3]
product_size_range = "100-200"
num_return = 1
"#;
        let config = PipelineConfig::parse(content).unwrap();
        assert_eq!(config.tools.primer3_core, "/opt/primer3/primer3_core");
        assert_eq!(config.tools.primersearch, "primersearch");
        assert_eq!(config.primer3.product_size_range, "100-200");
        assert_eq!(config.primer3.num_return, 1);
        assert_eq!(config.primer3.max_size, 27);
    }

    #[test]
    fn test_config_parse_invalid_toml() {
        assert!(PipelineConfig::parse("[paths\nupload_root = 1").is_err());
    }

    #[test]
    fn test_config_load_and_save() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);

        let mut config = PipelineConfig::default();
        config.paths.upload_root = PathBuf::from("/srv/seq");
        config.primersearch.mismatch_percent = 10;
        config.save(&path).unwrap();

        let loaded = PipelineConfig::load(&path).unwrap();
        assert_eq!(loaded.paths.upload_root, PathBuf::from("/srv/seq"));
        assert_eq!(loaded.primersearch.mismatch_percent, 10);
    }

    #[test]
    fn test_config_load_or_default_explicit_missing_file() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(PipelineConfig::load_or_default(Some(&missing)).is_err());
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("PCRFLOW_UPLOAD_ROOT", "/tmp/seq"),
            ("PCRFLOW_GENOME", "/tmp/genome.fa"),
            ("PRIMER3_CORE", "/usr/bin/primer3_core"),
            ("PRIMERSEARCH", "/usr/bin/primersearch"),
            ("PCRFLOW_PORT", "8080"),
        ]);
        let mut config = PipelineConfig::default();
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.paths.upload_root, PathBuf::from("/tmp/seq"));
        assert_eq!(config.paths.genome, PathBuf::from("/tmp/genome.fa"));
        assert_eq!(config.tools.primer3_core, "/usr/bin/primer3_core");
        assert_eq!(config.tools.primersearch, "/usr/bin/primersearch");
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_env_invalid_port_is_ignored() {
        let mut config = PipelineConfig::default();
        config.apply_overrides(|key| (key == "PCRFLOW_PORT").then(|| "not-a-port".to_string()));
        assert_eq!(config.server.port, 5000);
    }

    #[test]
    fn test_validate_valid_config() {
        let dir = tempdir().unwrap();
        let genome = dir.path().join("genome.fa");
        std::fs::write(&genome, ">chr1\nACGT\n").unwrap();

        let mut config = PipelineConfig::default();
        config.paths.genome = genome;
        assert!(config.validate().is_empty(), "{:?}", config.validate());
    }

    #[test]
    fn test_validate_reports_problems() {
        let mut config = PipelineConfig::default();
        config.paths.genome = PathBuf::from("/definitely/not/here.fa");
        config.primer3.min_size = 30;
        config.primer3.product_size_range = "150-75".to_string();
        config.tools.primersearch = "  ".to_string();

        let warnings = config.validate();
        assert!(warnings.iter().any(|w| w.contains("Genome file not found")));
        assert!(warnings.iter().any(|w| w.contains("sizes")));
        assert!(warnings.iter().any(|w| w.contains("product_size_range")));
        assert!(warnings.iter().any(|w| w.contains("primersearch is empty")));
    }

    #[test]
    fn test_product_size_range_validation() {
        assert!(is_valid_product_size_range("75-150"));
        assert!(is_valid_product_size_range("75-150 150-250"));
        assert!(!is_valid_product_size_range("150-75"));
        assert!(!is_valid_product_size_range("75"));
        assert!(!is_valid_product_size_range("a-b"));
        assert!(!is_valid_product_size_range(""));
    }
}
