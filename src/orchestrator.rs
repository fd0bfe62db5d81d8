use std::fmt;
use std::future::Future;

use tracing::{error, info, warn};

use crate::{
    AuthClient, AuthMethod, CredentialInput, Credentials, IdentityResult, ServerManager,
    StopOutcome, ValidationError, VerificationClient, shutdown_signal,
};

/// Step of a validation run that a failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Resolve,
    Authenticate,
    StartServer,
    Verify,
    Teardown,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Resolve => "resolve credentials",
            Stage::Authenticate => "authenticate",
            Stage::StartServer => "start server",
            Stage::Verify => "verify token",
            Stage::Teardown => "stop server",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    CredentialsResolved,
    Authenticated,
    ServerRunning,
    Verified,
    Done,
    Failed(Stage),
}

#[derive(Debug)]
pub struct Failure {
    pub stage: Stage,
    pub error: ValidationError,
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed: {}", self.stage, self.error)
    }
}

/// Everything a finished run has to say.
#[derive(Debug)]
pub struct ValidationReport {
    pub method: AuthMethod,
    pub state: RunState,
    pub outcome: Result<IdentityResult, Failure>,
    /// Where the ephemeral server listened, if it became ready.
    pub server_url: Option<String>,
    /// `None` when no server was ever started.
    pub teardown: Option<Result<StopOutcome, ValidationError>>,
}

impl ValidationReport {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    /// A teardown problem alone never turns a verified run into a failure.
    pub fn exit_code(&self) -> u8 {
        match &self.outcome {
            Ok(_) => 0,
            Err(failure) => failure.error.class().exit_code(),
        }
    }

    pub fn server_started(&self) -> bool {
        self.teardown.is_some()
    }
}

/// Sequences credential resolution, authentication, server start,
/// verification and teardown for one run.
#[derive(Debug, Clone)]
pub struct Validator {
    auth: AuthClient,
    servers: ServerManager,
    verifier: VerificationClient,
}

impl Validator {
    pub fn new(auth: AuthClient, servers: ServerManager, verifier: VerificationClient) -> Self {
        Self {
            auth,
            servers,
            verifier,
        }
    }

    pub async fn run(&self, method: AuthMethod, input: CredentialInput) -> ValidationReport {
        self.run_until(method, input, shutdown_signal()).await
    }

    /// Like [`Validator::run`], but `interrupt` replaces the process
    /// termination signals. Once the server is up, an interrupt still stops it.
    pub async fn run_until<F>(
        &self,
        method: AuthMethod,
        input: CredentialInput,
        interrupt: F,
    ) -> ValidationReport
    where
        F: Future<Output = ()>,
    {
        let mut run = Run::new(method);

        let credentials = match Credentials::resolve(method, input) {
            Ok(credentials) => credentials,
            Err(err) => return run.fail(Stage::Resolve, err, None),
        };
        run.advance(RunState::CredentialsResolved);

        let token = match self.auth.authenticate(&credentials).await {
            Ok(token) => token,
            Err(err) => return run.fail(Stage::Authenticate, err, None),
        };
        drop(credentials);
        run.advance(RunState::Authenticated);

        tokio::pin!(interrupt);

        // A handle dropped mid-start kills its process.
        let started = tokio::select! {
            result = self.servers.start() => result,
            _ = &mut interrupt => Err(ValidationError::Interrupted),
        };
        let mut server = match started {
            Ok(server) => server,
            Err(err) => return run.fail(Stage::StartServer, err, None),
        };
        run.server_url = Some(server.base_url());
        run.advance(RunState::ServerRunning);

        let verified = tokio::select! {
            result = self.verifier.whoami(&server, &token) => result,
            _ = &mut interrupt => Err(ValidationError::Interrupted),
        };

        let teardown = server.stop().await;
        if let Err(err) = &teardown {
            warn!(error = %err, "failed to stop server");
        }

        match verified {
            Ok(identity) => {
                run.advance(RunState::Verified);
                run.finish(identity, teardown)
            }
            Err(err) => run.fail(Stage::Verify, err, Some(teardown)),
        }
    }
}

struct Run {
    method: AuthMethod,
    state: RunState,
    server_url: Option<String>,
}

impl Run {
    fn new(method: AuthMethod) -> Self {
        Self {
            method,
            state: RunState::Idle,
            server_url: None,
        }
    }

    fn advance(&mut self, next: RunState) {
        info!(method = %self.method, from = ?self.state, to = ?next, "validation progressed");
        self.state = next;
    }

    fn fail(
        self,
        stage: Stage,
        error: ValidationError,
        teardown: Option<Result<StopOutcome, ValidationError>>,
    ) -> ValidationReport {
        error!(method = %self.method, %stage, error = %error, "validation failed");
        ValidationReport {
            method: self.method,
            state: RunState::Failed(stage),
            outcome: Err(Failure { stage, error }),
            server_url: self.server_url,
            teardown,
        }
    }

    fn finish(
        mut self,
        identity: IdentityResult,
        teardown: Result<StopOutcome, ValidationError>,
    ) -> ValidationReport {
        self.advance(RunState::Done);
        ValidationReport {
            method: self.method,
            state: self.state,
            outcome: Ok(identity),
            server_url: self.server_url,
            teardown: Some(teardown),
        }
    }
}
