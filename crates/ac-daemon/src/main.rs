//! autocommit: watch a working copy and commit settled changes.

use std::path::PathBuf;

use ac_core::config::Config;
use ac_daemon::worker::Worker;
use ac_harness::shutdown::ShutdownReason;
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing::info;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Backend {
    Git,
    Jj,
}

impl Backend {
    fn as_config(self) -> &'static str {
        match self {
            Backend::Git => "git",
            Backend::Jj => "jj",
        }
    }
}

/// Watch a repository and let an oracle decide when to commit.
#[derive(Debug, Parser)]
#[command(name = "autocommit", version, about)]
struct Cli {
    /// Repository to watch. Created if it is not one yet.
    repo: PathBuf,

    /// Version-control backend.
    #[arg(long, value_enum)]
    backend: Option<Backend>,

    /// Configuration file (default: ~/.autocommit/config.toml).
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Quiet period before a burst of changes is considered settled.
    #[arg(long, value_name = "N")]
    debounce_ms: Option<u64>,

    /// Port for the notification channel.
    #[arg(long, value_name = "N")]
    port: Option<u16>,

    /// Emit logs as JSON lines.
    #[arg(long)]
    log_json: bool,
}

impl Cli {
    fn load_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load_from(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?,
            None => Config::load().context("failed to load config")?,
        };

        if let Some(backend) = self.backend {
            config.vcs.backend = backend.as_config().to_string();
        }
        if let Some(ms) = self.debounce_ms {
            config.watch.debounce_ms = ms;
        }
        if let Some(port) = self.port {
            config.bridge.port = port;
        }
        if self.log_json {
            config.general.log_json = true;
        }
        config.validate().context("invalid configuration")?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.load_config()?;

    ac_telemetry::logging::init(config.general.log_json, &config.general.log_level);

    anyhow::ensure!(
        cli.repo.is_dir(),
        "repository path {} does not exist or is not a directory",
        cli.repo.display()
    );

    let worker = Worker::new(&cli.repo, config);
    let shutdown = worker.shutdown_handle();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            return;
        }
        info!("ctrl-c received, finishing session");
        shutdown.trigger(ShutdownReason::Interrupted);
    });

    worker.run().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_all_flags() {
        let cli = Cli::try_parse_from([
            "autocommit",
            "/work/repo",
            "--backend",
            "jj",
            "--debounce-ms",
            "250",
            "--port",
            "9000",
            "--log-json",
        ])
        .unwrap();
        assert_eq!(cli.repo, PathBuf::from("/work/repo"));
        assert!(matches!(cli.backend, Some(Backend::Jj)));
        assert_eq!(cli.debounce_ms, Some(250));
        assert_eq!(cli.port, Some(9000));
        assert!(cli.log_json);
    }

    #[test]
    fn repo_is_required() {
        assert!(Cli::try_parse_from(["autocommit"]).is_err());
    }

    #[test]
    fn unknown_backend_is_rejected() {
        assert!(Cli::try_parse_from(["autocommit", ".", "--backend", "svn"]).is_err());
    }

    #[test]
    fn flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[watch]\ndebounce_ms = 5000\n[bridge]\nport = 1234\n").unwrap();

        let cli = Cli::try_parse_from([
            "autocommit",
            ".",
            "--config",
            path.to_str().unwrap(),
            "--debounce-ms",
            "100",
            "--backend",
            "jj",
        ])
        .unwrap();
        let config = cli.load_config().unwrap();
        assert_eq!(config.watch.debounce_ms, 100);
        assert_eq!(config.bridge.port, 1234);
        assert_eq!(config.vcs.backend, "jj");
    }

    #[test]
    fn zero_debounce_override_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "").unwrap();
        let cli = Cli::try_parse_from([
            "autocommit",
            ".",
            "--config",
            path.to_str().unwrap(),
            "--debounce-ms",
            "0",
        ])
        .unwrap();
        assert!(cli.load_config().is_err());
    }
}
