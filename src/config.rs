// Configuration File Support
//
// TOML configuration for reconctl with environment variable overrides.
// The file is looked up in the XDG config directory
// (~/.config/recon-orchestrator/config.toml) unless --config is given.

use crate::tools::{ExecutorConfig, LifecyclePolicy, DEFAULT_SYNC_CEILING_SECS};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Logging configuration
    pub logging: LoggingSettings,

    /// HTTP listener
    pub server: ServerConfig,

    /// Binary names or absolute paths of the backing tools
    pub tools: ToolPaths,

    /// Values used when a request leaves a parameter out
    pub defaults: DefaultsConfig,

    /// Lifecycle windows per tool family
    pub timeouts: TimeoutConfig,

    /// Offline cracking
    pub cracking: CrackingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (plain, pretty, json)
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "plain".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Origins allowed by CORS
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_origins: vec![
                "http://localhost:5173".to_string(),
                "http://localhost:3000".to_string(),
            ],
        }
    }
}

impl ServerConfig {
    /// `host:port` for the listener
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ToolPaths {
    pub ifconfig: String,
    pub netdiscover: String,
    pub nmap: String,
    pub msfconsole: String,
    pub john: String,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            ifconfig: "ifconfig".to_string(),
            netdiscover: "netdiscover".to_string(),
            nmap: "nmap".to_string(),
            msfconsole: "msfconsole".to_string(),
            john: "john".to_string(),
        }
    }
}

impl ToolPaths {
    fn entries(&self) -> [(&'static str, &str); 5] {
        [
            ("ifconfig", &self.ifconfig),
            ("netdiscover", &self.netdiscover),
            ("nmap", &self.nmap),
            ("msfconsole", &self.msfconsole),
            ("john", &self.john),
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DefaultsConfig {
    /// Range swept by host discovery when none is given
    pub discovery_range: String,
    /// Ports scanned when none are given
    pub ports: String,
    pub exploit_port: u16,
    pub payload: String,
    /// Remote file read by credential extraction
    pub shadow_path: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            discovery_range: "192.168.1.0/24".to_string(),
            ports: "21,22,80,443".to_string(),
            exploit_port: 21,
            payload: "cmd/unix/interact".to_string(),
            shadow_path: "/etc/shadow".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Ceiling for synchronous tools
    pub sync_ceiling_secs: u64,
    pub exploit_grace_secs: u64,
    pub exploit_collect_secs: u64,
    pub session_grace_secs: u64,
    pub session_collect_secs: u64,
    /// Time allowed for pipes to drain after exit or kill
    pub drain_secs: u64,
    /// Cap on captured bytes per stream
    pub max_output_bytes: usize,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            sync_ceiling_secs: DEFAULT_SYNC_CEILING_SECS,
            exploit_grace_secs: 5,
            exploit_collect_secs: 10,
            session_grace_secs: 3,
            session_collect_secs: 15,
            drain_secs: 2,
            max_output_bytes: 4 * 1024 * 1024,
        }
    }
}

impl TimeoutConfig {
    /// Discovery, scanning, search, listing, crack status
    pub fn sync_policy(&self) -> LifecyclePolicy {
        LifecyclePolicy::sync_wait(Duration::from_secs(self.sync_ceiling_secs))
    }

    /// Exploit launches
    pub fn exploit_policy(&self) -> LifecyclePolicy {
        LifecyclePolicy::bounded_wait(
            Duration::from_secs(self.exploit_grace_secs),
            Duration::from_secs(self.exploit_collect_secs),
        )
    }

    /// Commands run inside an open session
    pub fn session_policy(&self) -> LifecyclePolicy {
        LifecyclePolicy::bounded_wait(
            Duration::from_secs(self.session_grace_secs),
            Duration::from_secs(self.session_collect_secs),
        )
    }

    pub fn executor_config(&self) -> ExecutorConfig {
        ExecutorConfig::with_max_output_size(self.max_output_bytes)
            .drain_timeout(Duration::from_secs(self.drain_secs))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CrackingConfig {
    /// `--format` passed to john
    pub hash_format: String,
    /// Wordlist used when a request does not name one
    pub default_wordlist: Option<PathBuf>,
    /// Directory receiving extracted hash files
    pub loot_dir: PathBuf,
}

impl Default for CrackingConfig {
    fn default() -> Self {
        Self {
            hash_format: "sha512crypt".to_string(),
            default_wordlist: None,
            loot_dir: PathBuf::from("."),
        }
    }
}

impl Config {
    /// Load configuration from the default XDG config directory
    ///
    /// If the config file does not exist, returns the default configuration
    /// with environment overrides applied.
    pub fn load() -> Result<Self> {
        Self::load_from_path(Self::config_path())
    }

    /// Load configuration from a specific path
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed, or
    /// if the merged configuration fails [`Config::validate`].
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let config = if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file from {:?}", path))?;
            let config: Config = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file from {:?}", path))?;
            tracing::info!("Loaded configuration from {:?}", path);
            config
        } else {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            Self::default()
        };

        let config = config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path
    ///
    /// Returns `~/.config/recon-orchestrator/config.toml` on Linux
    pub fn config_path() -> PathBuf {
        if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "recon-orchestrator") {
            proj_dirs.config_dir().join("config.toml")
        } else {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home)
                .join(".config")
                .join("recon-orchestrator")
                .join("config.toml")
        }
    }

    /// Apply `RECON_*` environment variable overrides
    ///
    /// - RECON_LOG_LEVEL, RECON_LOG_FORMAT
    /// - RECON_PORT
    /// - RECON_IFCONFIG, RECON_NETDISCOVER, RECON_NMAP, RECON_MSFCONSOLE, RECON_JOHN
    /// - RECON_LOOT_DIR
    pub fn apply_env_overrides(self) -> Self {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    fn apply_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(level) = lookup("RECON_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("RECON_LOG_FORMAT") {
            self.logging.format = format;
        }

        if let Some(port) = lookup("RECON_PORT") {
            match port.parse::<u16>() {
                Ok(port) if port > 0 => self.server.port = port,
                _ => tracing::warn!("Ignoring invalid RECON_PORT={}", port),
            }
        }

        let tools = [
            ("RECON_IFCONFIG", &mut self.tools.ifconfig),
            ("RECON_NETDISCOVER", &mut self.tools.netdiscover),
            ("RECON_NMAP", &mut self.tools.nmap),
            ("RECON_MSFCONSOLE", &mut self.tools.msfconsole),
            ("RECON_JOHN", &mut self.tools.john),
        ];
        for (var, slot) in tools {
            if let Some(value) = lookup(var).filter(|v| !v.trim().is_empty()) {
                *slot = value;
            }
        }

        if let Some(dir) = lookup("RECON_LOOT_DIR").filter(|v| !v.trim().is_empty()) {
            self.cracking.loot_dir = PathBuf::from(dir);
        }

        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                self.logging.level
            ),
        }

        match self.logging.format.to_lowercase().as_str() {
            "plain" | "pretty" | "json" => {}
            _ => anyhow::bail!(
                "Invalid log format: {}. Must be one of: plain, pretty, json",
                self.logging.format
            ),
        }

        if self.server.port == 0 {
            anyhow::bail!("Server port must be > 0");
        }

        for (name, program) in self.tools.entries() {
            if program.trim().is_empty() {
                anyhow::bail!("Tool '{}' has an empty command", name);
            }
        }

        if self.defaults.exploit_port == 0 {
            anyhow::bail!("Default exploit port must be > 0");
        }

        let t = &self.timeouts;
        for (name, secs) in [
            ("sync_ceiling_secs", t.sync_ceiling_secs),
            ("exploit_grace_secs", t.exploit_grace_secs),
            ("exploit_collect_secs", t.exploit_collect_secs),
            ("session_grace_secs", t.session_grace_secs),
            ("session_collect_secs", t.session_collect_secs),
            ("drain_secs", t.drain_secs),
        ] {
            if secs == 0 {
                anyhow::bail!("Timeout {} must be > 0", name);
            }
        }
        if t.max_output_bytes == 0 {
            anyhow::bail!("max_output_bytes must be > 0");
        }

        if self.cracking.hash_format.trim().is_empty() {
            anyhow::bail!("Cracking hash_format must not be empty");
        }

        Ok(())
    }

    /// Convert log level string to tracing::Level
    pub fn log_level(&self) -> Result<tracing::Level> {
        self.logging
            .level
            .to_lowercase()
            .parse()
            .map_err(|e| anyhow::anyhow!("Failed to parse log level: {}", e))
    }
}
