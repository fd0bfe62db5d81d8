use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use auth_validator::{
    AuthClient, AuthMethod, CredentialInput, DEFAULT_ADMIN_ROLE_NAME, DEFAULT_KEYCLOAK_REALM_URL,
    DEFAULT_VERIFY_TIMEOUT, ErrorClass, ServerCommand, ServerManager, ServerManagerConfig,
    Settings, ValidationError, Validator, VerificationClient, api::ApiServer, logging, report,
    shutdown_signal,
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use dialoguer::{Input, Password};
use tracing::error;

const ABOUT: &str = "Validate authentication integration with Supabase and Keycloak.";

const LONG_ABOUT: &str = "\
Validate authentication integration with Supabase and Keycloak.

`validate` authenticates with the selected method, starts a temporary API
server, calls its /whoami endpoint with the token, prints the user and roles,
and stops the server.

Methods:
  supabase         email/password via Supabase
  keycloak-user    username/password via Keycloak (resource owner password grant)
  keycloak-client  client credentials via Keycloak (client credentials grant)

If keycloak-user fails, try keycloak-client first to verify the basic client
setup, and check that the Keycloak client has Direct Access Grants enabled.

Exit codes: 0 verified, 2 invalid arguments, 3 authentication failed,
4 server or verification failed, 1 unexpected error, 130 interrupted.";

#[derive(Debug, Parser)]
#[command(name = "auth-validator", version, about = ABOUT, long_about = LONG_ABOUT)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Authenticate, start a temporary server and verify /whoami.
    Validate(ValidateArgs),
    /// Run the API (/health, /whoami).
    Serve(ServeArgs),
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum MethodArg {
    Supabase,
    KeycloakUser,
    KeycloakClient,
}

impl From<MethodArg> for AuthMethod {
    fn from(method: MethodArg) -> Self {
        match method {
            MethodArg::Supabase => AuthMethod::DirectPassword,
            MethodArg::KeycloakUser => AuthMethod::IdentityProviderPassword,
            MethodArg::KeycloakClient => AuthMethod::IdentityProviderClientCredentials,
        }
    }
}

#[derive(Debug, Args)]
struct SettingsArgs {
    #[arg(long, env = "SUPABASE_URL")]
    supabase_url: String,

    #[arg(long, env = "SUPABASE_KEY", hide_env_values = true)]
    supabase_key: String,

    #[arg(long, env = "KEYCLOAK_CLIENT_ID")]
    keycloak_client_id: String,

    #[arg(long, env = "KEYCLOAK_CLIENT_SECRET", hide_env_values = true)]
    keycloak_client_secret: String,

    #[arg(long, env = "KEYCLOAK_REALM_URL", default_value = DEFAULT_KEYCLOAK_REALM_URL)]
    keycloak_realm_url: String,

    #[arg(long, env = "ADMIN_ROLE_NAME", default_value = DEFAULT_ADMIN_ROLE_NAME)]
    admin_role_name: String,
}

impl SettingsArgs {
    fn into_settings(self) -> Settings {
        Settings::new(
            self.supabase_url,
            self.supabase_key,
            self.keycloak_client_id,
            self.keycloak_client_secret,
        )
        .with_keycloak_realm_url(self.keycloak_realm_url)
        .with_admin_role_name(self.admin_role_name)
    }
}

#[derive(Debug, Args)]
struct ValidateArgs {
    /// Authentication method to use.
    #[arg(long, value_enum, default_value_t = MethodArg::KeycloakClient)]
    auth_method: MethodArg,

    /// User email (supabase; also the keycloak-user username when --username is omitted).
    #[arg(long)]
    email: Option<String>,

    /// Keycloak username (keycloak-user).
    #[arg(long)]
    username: Option<String>,

    /// User password. Prompted for when omitted and stdin is a terminal.
    #[arg(long)]
    password: Option<String>,

    /// Keycloak client id [default: KEYCLOAK_CLIENT_ID].
    #[arg(long)]
    client_id: Option<String>,

    /// Keycloak client secret [default: KEYCLOAK_CLIENT_SECRET].
    #[arg(long)]
    client_secret: Option<String>,

    /// Never prompt; missing credentials fail immediately.
    #[arg(long)]
    no_prompt: bool,

    /// Program that starts the API [default: this executable's `serve`].
    #[arg(long, value_name = "PATH")]
    server_command: Option<PathBuf>,

    /// Extra argument for the server program (repeatable).
    #[arg(long = "server-arg", value_name = "ARG", allow_hyphen_values = true)]
    server_args: Vec<String>,

    /// Seconds to wait for the server to answer its health check.
    #[arg(long, default_value_t = 15)]
    startup_timeout: u64,

    #[command(flatten)]
    settings: SettingsArgs,
}

#[derive(Debug, Args)]
struct ServeArgs {
    #[arg(long, env = "HOST", default_value = "127.0.0.1")]
    host: String,

    #[arg(long, env = "PORT", default_value_t = 8000)]
    port: u16,

    #[command(flatten)]
    settings: SettingsArgs,
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    logging::init();

    match cli.command {
        Command::Validate(args) => validate(args).await,
        Command::Serve(args) => serve(args).await,
    }
}

async fn validate(args: ValidateArgs) -> ExitCode {
    let method = AuthMethod::from(args.auth_method);
    let mut input = CredentialInput {
        email: args.email.clone(),
        password: args.password.clone(),
        username: args.username.clone(),
        client_id: args.client_id.clone(),
        client_secret: args.client_secret.clone(),
    };

    if !args.no_prompt && std::io::stdin().is_terminal() {
        if let Err(err) = prompt_missing(method, &mut input) {
            eprintln!("{} {err}", "Failed to read credentials:".red());
            return ExitCode::from(ErrorClass::Internal.exit_code());
        }
    }

    let settings = args.settings.into_settings();
    input.client_id = input.client_id.or_else(|| Some(settings.keycloak_client_id.clone()));
    input.client_secret = input
        .client_secret
        .or_else(|| Some(settings.keycloak_client_secret.clone()));

    let validator = match build_validator(
        &settings,
        args.server_command,
        args.server_args,
        Duration::from_secs(args.startup_timeout),
    ) {
        Ok(validator) => validator,
        Err(err) => {
            error!(error = %err, "failed to set up validator");
            eprintln!("{} {err}", "Setup failed:".red());
            return ExitCode::from(err.class().exit_code());
        }
    };

    println!(
        "{} {}",
        "Validating authentication via".blue(),
        method.to_string().bold()
    );
    let report = validator.run(method, input).await;
    print!("{}", report::render(&report, &settings.admin_role_name));

    ExitCode::from(report.exit_code())
}

fn build_validator(
    settings: &Settings,
    server_command: Option<PathBuf>,
    server_args: Vec<String>,
    startup_timeout: Duration,
) -> Result<Validator, ValidationError> {
    let auth = AuthClient::new(settings.auth_client_config())?;

    let command = match server_command {
        Some(program) => ServerCommand::new(program),
        None => ServerCommand::current_exe()?,
    }
    .with_args(server_args);

    let servers = ServerManager::new(
        ServerManagerConfig::new(command)
            .with_envs(settings.to_env())
            .with_startup_timeout(startup_timeout),
    );
    let verifier = VerificationClient::new(DEFAULT_VERIFY_TIMEOUT)?;

    Ok(Validator::new(auth, servers, verifier))
}

fn prompt_missing(method: AuthMethod, input: &mut CredentialInput) -> dialoguer::Result<()> {
    match method {
        AuthMethod::DirectPassword if input.email.is_none() => {
            input.email = Some(Input::<String>::new().with_prompt("Email").interact_text()?);
        }
        AuthMethod::IdentityProviderPassword
            if input.email.is_none() && input.username.is_none() =>
        {
            input.username = Some(Input::<String>::new().with_prompt("Username").interact_text()?);
        }
        AuthMethod::IdentityProviderClientCredentials => return Ok(()),
        _ => {}
    }

    if input.password.is_none() {
        input.password = Some(Password::new().with_prompt("Password").interact()?);
    }
    Ok(())
}

async fn serve(args: ServeArgs) -> ExitCode {
    match run_server(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "server failed");
            ExitCode::from(err.class().exit_code())
        }
    }
}

async fn run_server(args: ServeArgs) -> Result<(), ValidationError> {
    let server = ApiServer::new(args.settings.into_settings())?;
    let listener = ApiServer::bind(&args.host, args.port)?;
    server.serve_with(listener, shutdown_signal()).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn complete_input_needs_no_prompt() {
        let mut input = CredentialInput::default()
            .with_email("user@example.com")
            .with_password("secret");
        prompt_missing(AuthMethod::DirectPassword, &mut input).unwrap();
        prompt_missing(AuthMethod::IdentityProviderPassword, &mut input).unwrap();
        assert_eq!(input.email.as_deref(), Some("user@example.com"));
        assert_eq!(input.password.as_deref(), Some("secret"));
    }

    #[test]
    fn client_credentials_never_prompt() {
        let mut input = CredentialInput::default();
        prompt_missing(AuthMethod::IdentityProviderClientCredentials, &mut input).unwrap();
        assert!(input.password.is_none());
    }
}
