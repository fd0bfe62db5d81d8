use std::process::Stdio;

use tokio::process::{Child, Command};
use tokio::time::{Instant, sleep, timeout};
use tracing::{debug, info, warn};

use crate::ValidationError;

use super::config::ServerManagerConfig;
use super::probe::{HealthProbe, free_port};

/// How a call to [`ServerHandle::stop`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// The process exited within the grace period after SIGTERM.
    Graceful,
    /// The grace period ran out (or SIGTERM is unavailable) and the process was killed.
    Forced,
    /// Nothing to do: the handle was already stopped or the process had exited.
    AlreadyStopped,
}

/// Launches ephemeral instances of the target API.
#[derive(Debug, Clone)]
pub struct ServerManager {
    config: ServerManagerConfig,
}

impl ServerManager {
    pub fn new(config: ServerManagerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ServerManagerConfig {
        &self.config
    }

    pub async fn start(&self) -> Result<ServerHandle, ValidationError> {
        let host = self.config.host.clone();
        let port = free_port(&host)?;
        let program = self.config.command.program.display().to_string();

        let mut command = Command::new(&self.config.command.program);
        command.args(&self.config.command.args);
        if let Some(level) = &self.config.log_level {
            command.env("LOG_LEVEL", level);
        }
        command
            .envs(self.config.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .env("HOST", &host)
            .env("PORT", port.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .kill_on_drop(true);

        let child = command
            .spawn()
            .map_err(|source| ValidationError::ServerSpawn { program, source })?;

        let mut handle = ServerHandle {
            child: Some(child),
            host,
            port,
            alive: false,
            shutdown_grace: self.config.shutdown_grace,
        };
        info!(pid = ?handle.pid(), url = %handle.base_url(), "server launched");

        match self.wait_until_ready(&mut handle).await {
            Ok(()) => {
                handle.alive = true;
                info!(url = %handle.base_url(), "server ready");
                Ok(handle)
            }
            Err(err) => {
                if let Err(stop_err) = handle.stop().await {
                    warn!(error = %stop_err, "failed to stop server that never became ready");
                }
                Err(err)
            }
        }
    }

    async fn wait_until_ready(&self, handle: &mut ServerHandle) -> Result<(), ValidationError> {
        let probe = HealthProbe::new(&handle.base_url(), self.config.probe_timeout)?;
        let deadline = Instant::now() + self.config.startup_timeout;
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            if let Some(status) = handle.try_exit_status()? {
                return Err(ValidationError::ServerExited { status });
            }
            if probe.check().await {
                debug!(attempt, "server answered health probe");
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(ValidationError::ServerStartupTimeout {
                    timeout: self.config.startup_timeout,
                });
            }
            sleep(self.config.poll_interval).await;
        }
    }
}

/// One running instance. Dropping a handle that was never stopped kills the
/// process.
#[derive(Debug)]
pub struct ServerHandle {
    child: Option<Child>,
    host: String,
    port: u16,
    alive: bool,
    shutdown_grace: std::time::Duration,
}

impl ServerHandle {
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().and_then(Child::id)
    }

    fn try_exit_status(&mut self) -> Result<Option<std::process::ExitStatus>, ValidationError> {
        match self.child.as_mut() {
            Some(child) => Ok(child.try_wait()?),
            None => Ok(None),
        }
    }

    /// Terminates the process: SIGTERM, then a forced kill once the grace
    /// period runs out. Safe to call more than once.
    pub async fn stop(&mut self) -> Result<StopOutcome, ValidationError> {
        self.alive = false;
        let Some(mut child) = self.child.take() else {
            return Ok(StopOutcome::AlreadyStopped);
        };

        if let Some(status) = child.try_wait()? {
            debug!(%status, "server had already exited");
            return Ok(StopOutcome::AlreadyStopped);
        }

        if !request_termination(&child) {
            child.kill().await?;
            return Ok(StopOutcome::Forced);
        }

        match timeout(self.shutdown_grace, child.wait()).await {
            Ok(status) => {
                let status = status?;
                info!(%status, url = %self.base_url(), "server stopped");
                Ok(StopOutcome::Graceful)
            }
            Err(_) => {
                warn!(
                    grace = ?self.shutdown_grace,
                    "server ignored SIGTERM, killing process"
                );
                child.kill().await?;
                Ok(StopOutcome::Forced)
            }
        }
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            warn!(url = %self.base_url(), "server handle dropped while running, killing process");
            let _ = child.start_kill();
        }
    }
}

#[cfg(unix)]
fn request_termination(child: &Child) -> bool {
    let Some(pid) = child.id().and_then(|pid| libc::pid_t::try_from(pid).ok()) else {
        return false;
    };
    // SAFETY: kill(2) has no memory-safety preconditions; the pid belongs to
    // a child we have not reaped yet.
    unsafe { libc::kill(pid, libc::SIGTERM) == 0 }
}

#[cfg(not(unix))]
fn request_termination(_child: &Child) -> bool {
    false
}

#[cfg(all(test, unix))]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::ServerCommand;

    fn manager(command: ServerCommand) -> ServerManager {
        ServerManager::new(
            ServerManagerConfig::new(command)
                .with_startup_timeout(Duration::from_secs(1))
                .with_poll_interval(Duration::from_millis(100))
                .with_shutdown_grace(Duration::from_secs(1)),
        )
    }

    #[tokio::test]
    async fn early_exit_is_reported() {
        let command = ServerCommand::new("sh").with_args(["-c", "exit 3"]);
        let result = manager(command).start().await;

        match result {
            Err(ValidationError::ServerExited { status }) => assert_eq!(status.code(), Some(3)),
            other => panic!("expected ServerExited, got {other:?}"),
        }
    }

    fn pid_file(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("auth-validator-{name}-{}.pid", std::process::id()))
    }

    fn process_exists(pid: libc::pid_t) -> bool {
        // SAFETY: signal 0 only checks that the pid exists.
        unsafe { libc::kill(pid, 0) == 0 }
    }

    #[tokio::test]
    async fn silent_process_times_out_and_is_killed() {
        let pid_path = pid_file("silent");
        let script = format!("echo $$ > {}; exec sleep 30", pid_path.display());
        let command = ServerCommand::new("sh").with_args(["-c".to_string(), script]);
        let started = std::time::Instant::now();
        let result = manager(command).start().await;

        assert!(matches!(
            result,
            Err(ValidationError::ServerStartupTimeout { .. })
        ));
        assert!(started.elapsed() < Duration::from_secs(10));

        let pid: libc::pid_t = std::fs::read_to_string(&pid_path)
            .unwrap()
            .trim()
            .parse()
            .unwrap();
        let _ = std::fs::remove_file(&pid_path);
        assert!(!process_exists(pid), "server process {pid} is still running");
    }

    #[tokio::test]
    async fn child_gets_quiet_log_level_by_default() {
        let command = ServerCommand::new("sh")
            .with_args(["-c", r#"[ "$LOG_LEVEL" = warn ] && exit 3; exit 4"#]);
        match manager(command).start().await {
            Err(ValidationError::ServerExited { status }) => assert_eq!(status.code(), Some(3)),
            other => panic!("expected ServerExited, got {other:?}"),
        }

        let command = ServerCommand::new("sh")
            .with_args(["-c", r#"[ "$LOG_LEVEL" = debug ] && exit 3; exit 4"#]);
        let manager = ServerManager::new(
            ServerManagerConfig::new(command)
                .with_env("LOG_LEVEL", "debug")
                .with_startup_timeout(Duration::from_secs(1))
                .with_poll_interval(Duration::from_millis(100)),
        );
        match manager.start().await {
            Err(ValidationError::ServerExited { status }) => assert_eq!(status.code(), Some(3)),
            other => panic!("expected ServerExited, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_program_fails_to_spawn() {
        let command = ServerCommand::new("/nonexistent/auth-validator-target");
        let result = manager(command).start().await;
        assert!(matches!(result, Err(ValidationError::ServerSpawn { .. })));
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let child = Command::new("sleep")
            .arg("30")
            .kill_on_drop(true)
            .spawn()
            .unwrap();
        let mut handle = ServerHandle {
            child: Some(child),
            host: "127.0.0.1".to_string(),
            port: 0,
            alive: true,
            shutdown_grace: Duration::from_secs(1),
        };

        assert_eq!(handle.stop().await.unwrap(), StopOutcome::Graceful);
        assert!(!handle.is_alive());
        assert_eq!(handle.stop().await.unwrap(), StopOutcome::AlreadyStopped);
    }

    #[tokio::test]
    async fn stop_after_exit_is_a_no_op() {
        let mut child = Command::new("true").spawn().unwrap();
        let _ = child.wait().await;
        let mut handle = ServerHandle {
            child: Some(child),
            host: "127.0.0.1".to_string(),
            port: 0,
            alive: true,
            shutdown_grace: Duration::from_secs(1),
        };

        assert_eq!(handle.stop().await.unwrap(), StopOutcome::AlreadyStopped);
    }
}
