//! Runtime configuration for the watcher
//!
//! Everything here is already parsed (by the CLI layer) and validated once
//! at startup; nothing is re-checked per cycle.

use crate::error::ConfigError;
use crate::kill::{KillThreshold, DEFAULT_KILL_LOG};
use crate::source::{parse_order_by, OrderTerm, ProcessListQuery};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Directory under `$HOME` holding named credential files
pub const CREDENTIALS_DIR: &str = ".mypsl";

/// Poll interval used by the defaults profile
pub const DEFAULTS_INTERVAL: Duration = Duration::from_secs(3);

/// Commands matched by the defaults profile
pub const DEFAULTS_COMMANDS: &[&str] = &["Query", "Connect"];

/// Connection parameters for the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub charset: String,
    /// Unix socket used instead of host/port when set
    pub socket: Option<PathBuf>,
}

impl Default for ConnectionParams {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 3306,
            user: "root".to_string(),
            password: String::new(),
            charset: "utf8".to_string(),
            socket: None,
        }
    }
}

impl ConnectionParams {
    pub fn is_localhost(&self) -> bool {
        self.host == "localhost"
    }

    /// Apply values from a credential file; file values win.
    pub fn apply(&mut self, file: CredentialFile) {
        if let Some(host) = file.host {
            self.host = host;
        }
        if let Some(port) = file.port {
            self.port = port;
        }
        if let Some(user) = file.user {
            self.user = user;
        }
        if let Some(password) = file.passwd {
            self.password = password;
        }
        if let Some(charset) = file.charset {
            self.charset = charset;
        }
    }
}

/// Connection values read from a named YAML file, e.g.
///
/// ```yaml
/// host: db01.internal
/// port: 3306
/// user: ops
/// passwd: secret
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CredentialFile {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    #[serde(alias = "password")]
    pub passwd: Option<String>,
    pub charset: Option<String>,
}

impl CredentialFile {
    /// Load `$HOME/.mypsl/<name>`
    pub fn load_named(name: &str) -> Result<Self, ConfigError> {
        let home = dirs_next::home_dir().ok_or(ConfigError::NoHomeDirectory)?;
        Self::load(&home.join(CREDENTIALS_DIR).join(name))
    }

    /// Load a credential file from an explicit path. The file must exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let fail = |reason: String| ConfigError::CredentialFile {
            path: path.to_path_buf(),
            reason,
        };

        if !path.is_file() {
            return Err(fail("no such file".to_string()));
        }
        let name = path
            .to_str()
            .ok_or_else(|| fail("path is not valid UTF-8".to_string()))?;

        config::Config::builder()
            .add_source(config::File::new(name, config::FileFormat::Yaml).required(true))
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| fail(e.to_string()))
    }
}

/// Operator filter criteria; a non-empty set is required for kill mode
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterCriteria {
    pub command: Option<String>,
    pub state: Option<String>,
    pub min_elapsed_secs: Option<u64>,
    pub database: Option<String>,
    pub info_prefix: Option<String>,
}

impl FilterCriteria {
    /// Copy with blank text and a zero elapsed time dropped. Those match
    /// every session and never count as a criterion.
    pub fn normalized(&self) -> Self {
        let text = |value: &Option<String>| value.clone().filter(|v| !v.is_empty());
        Self {
            command: text(&self.command),
            state: text(&self.state),
            min_elapsed_secs: self.min_elapsed_secs.filter(|secs| *secs > 0),
            database: text(&self.database),
            info_prefix: text(&self.info_prefix),
        }
    }

    pub fn is_empty(&self) -> bool {
        let f = self.normalized();
        f.command.is_none()
            && f.state.is_none()
            && f.min_elapsed_secs.is_none()
            && f.database.is_none()
            && f.info_prefix.is_none()
    }
}

/// Settings for kill mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KillSettings {
    pub kill_all: bool,
    pub threshold: KillThreshold,
    pub log_path: PathBuf,
}

impl Default for KillSettings {
    fn default() -> Self {
        Self {
            kill_all: false,
            threshold: KillThreshold::default(),
            log_path: PathBuf::from(DEFAULT_KILL_LOG),
        }
    }
}

/// What a cycle does with a non-empty snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchMode {
    /// Classify, summarize and render the sessions
    Display,
    /// Print session ids only
    IdOnly,
    /// Terminate matching sessions
    Kill(KillSettings),
}

impl WatchMode {
    pub fn name(&self) -> &'static str {
        match self {
            WatchMode::Display => "display",
            WatchMode::IdOnly => "id_only",
            WatchMode::Kill(_) => "kill",
        }
    }
}

/// Complete watcher configuration
#[derive(Debug, Clone)]
pub struct WatchConfig {
    pub connection: ConnectionParams,
    /// Zero or unset means a single cycle
    pub interval: Option<Duration>,
    pub filters: FilterCriteria,
    pub order_by: Option<String>,
    pub id_only: bool,
    pub ignore_system_user: bool,
    /// Built-in sensible defaults profile
    pub use_defaults: bool,
    pub kill: Option<KillSettings>,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            connection: ConnectionParams::default(),
            interval: None,
            filters: FilterCriteria::default(),
            order_by: None,
            id_only: false,
            ignore_system_user: false,
            use_defaults: false,
            kill: None,
        }
    }
}

impl WatchConfig {
    /// Check mode combinations. Called once before polling begins.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.kill.is_some() && self.use_defaults {
            return Err(ConfigError::KillWithDefaults);
        }
        if self.kill.is_some() && self.filters.is_empty() {
            return Err(ConfigError::KillWithoutCriteria);
        }
        if self.use_defaults && (!self.filters.is_empty() || self.order_by.is_some()) {
            return Err(ConfigError::DefaultsWithFilters);
        }
        if let Some(clause) = &self.order_by {
            parse_order_by(clause)?;
        }
        Ok(())
    }

    /// Interval between cycles, `None` for a single cycle
    pub fn effective_interval(&self) -> Option<Duration> {
        if self.use_defaults {
            return Some(DEFAULTS_INTERVAL);
        }
        self.interval.filter(|d| !d.is_zero())
    }

    pub fn mode(&self) -> WatchMode {
        match &self.kill {
            Some(settings) => WatchMode::Kill(settings.clone()),
            None if self.id_only => WatchMode::IdOnly,
            None => WatchMode::Display,
        }
    }

    /// Build the process list query for this configuration
    pub fn build_query(&self) -> Result<ProcessListQuery, ConfigError> {
        let mut builder = ProcessListQuery::builder();

        if self.use_defaults {
            builder = builder
                .commands_in(DEFAULTS_COMMANDS)
                .ignore_system_user(true)
                .order_by(OrderTerm::asc("time"))
                .order_by(OrderTerm::asc("id"));
            return Ok(builder.build());
        }

        let f = self.filters.normalized();
        if let Some(command) = &f.command {
            builder = builder.command(command);
        }
        if let Some(state) = &f.state {
            builder = builder.state(state);
        }
        if let Some(secs) = f.min_elapsed_secs {
            builder = builder.min_elapsed(secs);
        }
        if let Some(db) = &f.database {
            builder = builder.database(db);
        }
        if let Some(prefix) = &f.info_prefix {
            builder = builder.info_prefix(prefix);
        }
        if let Some(clause) = &self.order_by {
            for term in parse_order_by(clause)? {
                builder = builder.order_by(term);
            }
        }

        Ok(builder.ignore_system_user(self.ignore_system_user).build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn with_filters(filters: FilterCriteria) -> WatchConfig {
        WatchConfig {
            filters,
            ..Default::default()
        }
    }

    #[test]
    fn test_kill_requires_criteria() {
        let config = WatchConfig {
            kill: Some(KillSettings::default()),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::KillWithoutCriteria)));

        // Order-by alone is not a criterion
        let config = WatchConfig {
            kill: Some(KillSettings::default()),
            order_by: Some("time desc".to_string()),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::KillWithoutCriteria)));

        let mut config = with_filters(FilterCriteria {
            min_elapsed_secs: Some(30),
            ..Default::default()
        });
        config.kill = Some(KillSettings::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_blank_and_zero_filters_are_not_criteria() {
        let blank = [
            FilterCriteria {
                min_elapsed_secs: Some(0),
                ..Default::default()
            },
            FilterCriteria {
                command: Some(String::new()),
                ..Default::default()
            },
            FilterCriteria {
                state: Some(String::new()),
                database: Some(String::new()),
                info_prefix: Some(String::new()),
                ..Default::default()
            },
        ];

        for filters in blank {
            let mut config = with_filters(filters);
            config.kill = Some(KillSettings::default());
            assert!(matches!(config.validate(), Err(ConfigError::KillWithoutCriteria)));

            config.kill = None;
            let query = config.build_query().unwrap();
            assert!(query.binds().is_empty());
            assert_eq!(query.describe_criteria(), "");
        }
    }

    #[test]
    fn test_kill_with_defaults_rejected() {
        let config = WatchConfig {
            kill: Some(KillSettings::default()),
            use_defaults: true,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::KillWithDefaults)));
    }

    #[test]
    fn test_defaults_with_filters_rejected() {
        let mut config = with_filters(FilterCriteria {
            command: Some("Query".to_string()),
            ..Default::default()
        });
        config.use_defaults = true;
        assert!(matches!(config.validate(), Err(ConfigError::DefaultsWithFilters)));
    }

    #[test]
    fn test_bad_order_by_rejected() {
        let config = WatchConfig {
            order_by: Some("time; drop table x".to_string()),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidOrderBy { .. })));
    }

    #[test]
    fn test_effective_interval() {
        assert_eq!(WatchConfig::default().effective_interval(), None);

        let zero = WatchConfig {
            interval: Some(Duration::ZERO),
            ..Default::default()
        };
        assert_eq!(zero.effective_interval(), None);

        let looping = WatchConfig {
            interval: Some(Duration::from_secs(2)),
            ..Default::default()
        };
        assert_eq!(looping.effective_interval(), Some(Duration::from_secs(2)));

        let defaults = WatchConfig {
            use_defaults: true,
            ..Default::default()
        };
        assert_eq!(defaults.effective_interval(), Some(DEFAULTS_INTERVAL));
    }

    #[test]
    fn test_mode_selection() {
        assert_eq!(WatchConfig::default().mode(), WatchMode::Display);

        let ids = WatchConfig {
            id_only: true,
            ..Default::default()
        };
        assert_eq!(ids.mode(), WatchMode::IdOnly);

        let kill = WatchConfig {
            id_only: true,
            kill: Some(KillSettings::default()),
            ..Default::default()
        };
        assert_eq!(kill.mode().name(), "kill");
    }

    #[test]
    fn test_defaults_query() {
        let config = WatchConfig {
            use_defaults: true,
            ..Default::default()
        };
        let query = config.build_query().unwrap();
        assert!(query.sql().contains("command IN (?, ?)"));
        assert!(query.sql().contains("user != 'system user'"));
        assert!(query.sql().ends_with("ORDER BY time ASC, id ASC"));
    }

    #[test]
    fn test_credential_file_overrides() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("prod");
        std::fs::write(
            &path,
            "host: db01.internal\nport: 3307\nuser: ops\npasswd: s3cret\n",
        )
        .unwrap();

        let file = CredentialFile::load(&path).unwrap();
        let mut params = ConnectionParams {
            host: "cli-host".to_string(),
            password: "cli-pass".to_string(),
            ..Default::default()
        };
        params.apply(file);

        assert_eq!(params.host, "db01.internal");
        assert_eq!(params.port, 3307);
        assert_eq!(params.user, "ops");
        assert_eq!(params.password, "s3cret");
        // Not in the file, so the CLI value stays
        assert_eq!(params.charset, "utf8");
    }

    #[test]
    fn test_missing_credential_file() {
        let temp_dir = TempDir::new().unwrap();
        let err = CredentialFile::load(&temp_dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, ConfigError::CredentialFile { .. }));
    }
}
