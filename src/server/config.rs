use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

pub(crate) const DEFAULT_HOST: &str = "127.0.0.1";
pub(crate) const DEFAULT_STARTUP_TIMEOUT: Duration = Duration::from_secs(15);
pub(crate) const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);
pub(crate) const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(2);
pub(crate) const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);
pub(crate) const DEFAULT_CHILD_LOG_LEVEL: &str = "warn";

/// Program and arguments that start one instance of the target API.
///
/// The instance is told where to listen through the `HOST` and `PORT`
/// environment variables.
#[derive(Debug, Clone)]
pub struct ServerCommand {
    pub program: PathBuf,
    pub args: Vec<OsString>,
}

impl ServerCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// The running executable's own `serve` subcommand.
    pub fn current_exe() -> std::io::Result<Self> {
        Ok(Self::new(std::env::current_exe()?).with_arg("serve"))
    }

    pub fn with_arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

#[derive(Debug, Clone)]
pub struct ServerManagerConfig {
    pub command: ServerCommand,
    pub host: String,
    pub env: Vec<(String, String)>,
    /// `LOG_LEVEL` handed to the instance so its stderr stays quiet next to
    /// the report. Entries in `env` take precedence.
    pub log_level: Option<String>,
    pub startup_timeout: Duration,
    pub poll_interval: Duration,
    pub probe_timeout: Duration,
    pub shutdown_grace: Duration,
}

impl ServerManagerConfig {
    pub fn new(command: ServerCommand) -> Self {
        Self {
            command,
            host: DEFAULT_HOST.to_string(),
            env: Vec::new(),
            log_level: Some(DEFAULT_CHILD_LOG_LEVEL.to_string()),
            startup_timeout: DEFAULT_STARTUP_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn with_envs<I>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        self.env.extend(vars);
        self
    }

    pub fn with_log_level(mut self, level: Option<String>) -> Self {
        self.log_level = level;
        self
    }

    pub fn with_startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_bind_loopback() {
        let config = ServerManagerConfig::new(ServerCommand::new("target-api"));
        assert_eq!(config.host, "127.0.0.1");
        assert!(config.poll_interval < config.startup_timeout);
        assert_eq!(config.log_level.as_deref(), Some("warn"));
    }

    #[test]
    fn current_exe_runs_serve_subcommand() {
        let command = ServerCommand::current_exe().unwrap();
        assert_eq!(command.args, vec![OsString::from("serve")]);
    }
}
