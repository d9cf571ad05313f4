//! Turns parsed CLI arguments into a watcher configuration

use crate::Cli;
use anyhow::{Context, Result};
use psl_lib::config::{
    ConnectionParams, CredentialFile, FilterCriteria, KillSettings, WatchConfig,
};
use psl_lib::kill::KillThreshold;
use std::time::Duration;

impl Cli {
    /// Connection parameters from flags and env, overridden by the named
    /// credential file when one is given.
    pub fn connection(&self) -> Result<ConnectionParams> {
        let mut params = ConnectionParams {
            host: self.host.clone(),
            port: self.port,
            user: self.user.clone(),
            password: self.pass.clone().unwrap_or_default(),
            charset: self.charset.clone(),
            socket: None,
        };

        if let Some(name) = &self.config {
            let file = CredentialFile::load_named(name)
                .with_context(|| format!("Failed to load credential file '{}'", name))?;
            params.apply(file);
        }
        Ok(params)
    }

    pub fn filters(&self) -> FilterCriteria {
        FilterCriteria {
            command: self.command.clone(),
            state: self.state.clone(),
            min_elapsed_secs: self.time,
            database: self.database.clone(),
            info_prefix: self.query.clone(),
        }
    }

    pub fn kill_settings(&self) -> Option<KillSettings> {
        self.kill.then(|| KillSettings {
            kill_all: self.kill_all,
            threshold: KillThreshold::parse(&self.kill_threshold),
            log_path: self.kill_log.clone(),
        })
    }

    /// Full watcher configuration, validated
    pub fn watch_config(&self) -> Result<WatchConfig> {
        let config = WatchConfig {
            connection: self.connection()?,
            interval: self.interval.map(Duration::from_secs),
            filters: self.filters(),
            order_by: self.order_by.clone(),
            id_only: self.id,
            ignore_system_user: self.ignore_system_user,
            use_defaults: self.default,
            kill: self.kill_settings(),
        };
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use psl_lib::config::WatchMode;
    use psl_lib::ConfigError;
    use std::path::PathBuf;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["mypsl"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_connection_defaults() {
        let cli = parse(&[]);
        let params = cli.connection().unwrap();
        assert_eq!(params.host, "localhost");
        assert_eq!(params.port, 3306);
        assert_eq!(params.user, "root");
        assert_eq!(params.charset, "utf8");
        assert!(params.password.is_empty());
    }

    #[test]
    fn test_filters_map_to_criteria() {
        let cli = parse(&["-c", "Query", "-t", "5", "-d", "shop", "-q", "SELECT"]);
        let config = cli.watch_config().unwrap();

        assert_eq!(config.filters.command.as_deref(), Some("Query"));
        assert_eq!(config.filters.min_elapsed_secs, Some(5));
        assert_eq!(config.filters.database.as_deref(), Some("shop"));
        assert_eq!(config.filters.info_prefix.as_deref(), Some("SELECT"));
        assert_eq!(config.mode(), WatchMode::Display);
        assert_eq!(config.effective_interval(), None);
    }

    #[test]
    fn test_kill_settings() {
        let cli = parse(&[
            "--kill",
            "-t",
            "30",
            "--kill-threshold",
            "off",
            "--kill-log",
            "/tmp/killed.log",
        ]);
        let config = cli.watch_config().unwrap();

        match config.mode() {
            WatchMode::Kill(settings) => {
                assert_eq!(settings.threshold, KillThreshold::Off);
                assert!(!settings.kill_all);
                assert_eq!(settings.log_path, PathBuf::from("/tmp/killed.log"));
            }
            other => panic!("expected kill mode, got {:?}", other),
        }
    }

    #[test]
    fn test_kill_without_criteria_rejected() {
        let err = parse(&["--kill"]).watch_config().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::KillWithoutCriteria)
        ));
    }

    #[test]
    fn test_kill_with_zero_time_or_blank_command_rejected() {
        for args in [&["--kill", "-t", "0"][..], &["--kill", "-c", ""][..]] {
            let err = parse(args).watch_config().unwrap_err();
            assert!(
                matches!(
                    err.downcast_ref::<ConfigError>(),
                    Some(ConfigError::KillWithoutCriteria)
                ),
                "{:?} should be rejected",
                args
            );
        }
    }

    #[test]
    fn test_defaults_profile() {
        let config = parse(&["--default"]).watch_config().unwrap();
        assert_eq!(config.effective_interval(), Some(Duration::from_secs(3)));

        let err = parse(&["--default", "-c", "Query"]).watch_config().unwrap_err();
        assert!(err.downcast_ref::<ConfigError>().is_some());
    }

    #[test]
    fn test_loop_interval() {
        let config = parse(&["-l", "2"]).watch_config().unwrap();
        assert_eq!(config.effective_interval(), Some(Duration::from_secs(2)));

        let config = parse(&["-l", "0"]).watch_config().unwrap();
        assert_eq!(config.effective_interval(), None);
    }

    #[test]
    fn test_missing_credential_file_is_fatal() {
        let cli = parse(&["--config", "definitely-not-a-real-mypsl-profile"]);
        assert!(cli.connection().is_err());
    }
}
