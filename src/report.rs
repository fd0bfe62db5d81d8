use std::fmt::Write as _;

use colored::Colorize;

use crate::{
    AuthMethod, ErrorClass, IdentityResult, Stage, StopOutcome, ValidationError, ValidationReport,
};

/// Human-readable summary of a finished run.
pub fn render(report: &ValidationReport, admin_role: &str) -> String {
    let mut out = String::new();

    match &report.outcome {
        Ok(identity) => {
            let _ = writeln!(out, "{}", "Authentication verified".green().bold());
            render_identity(&mut out, identity, admin_role);
        }
        Err(failure) => {
            let _ = writeln!(
                out,
                "{} {}",
                format!("Validation failed at stage `{}`:", failure.stage).red().bold(),
                failure.error
            );
            if let Some(hint) = hint(report.method, failure.stage, &failure.error) {
                let _ = writeln!(out, "{}", hint.yellow());
            }
        }
    }

    match &report.teardown {
        Some(Err(err)) => {
            let _ = writeln!(
                out,
                "{} {err}",
                format!("Warning: `{}` failed:", Stage::Teardown).yellow()
            );
        }
        Some(Ok(StopOutcome::Forced)) => {
            let _ = writeln!(
                out,
                "{}",
                "Server ignored the shutdown request and was killed".yellow()
            );
        }
        Some(Ok(_)) | None => {}
    }

    out
}

fn render_identity(out: &mut String, identity: &IdentityResult, admin_role: &str) {
    let na = "N/A";
    let _ = writeln!(out, "  {:<22} {}", "User ID".cyan(), identity.subject);
    let _ = writeln!(
        out,
        "  {:<22} {}",
        "Email".cyan(),
        identity.email.as_deref().unwrap_or(na)
    );
    let _ = writeln!(
        out,
        "  {:<22} {}",
        "Authentication Method".cyan(),
        identity.authentication_method.as_deref().unwrap_or(na)
    );

    if !identity.attributes.is_empty() {
        let _ = writeln!(out, "  {}", "User Metadata".cyan());
        for (key, value) in &identity.attributes {
            let value = value
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| value.to_string());
            let _ = writeln!(out, "    {key}: {value}");
        }
    }

    if identity.roles.is_empty() {
        let _ = writeln!(out, "  {:<22} None", "Keycloak Roles".cyan());
    } else {
        let _ = writeln!(
            out,
            "  {:<22} {} roles:",
            "Keycloak Roles".cyan(),
            identity.roles.len()
        );
        for role in &identity.roles {
            match &role.description {
                Some(description) if !description.is_empty() => {
                    let _ = writeln!(out, "    • {}: {description}", role.name);
                }
                _ => {
                    let _ = writeln!(out, "    • {}", role.name);
                }
            }
        }
    }

    let admin = if identity.has_role(admin_role) {
        "Yes".green()
    } else {
        "No".red()
    };
    let _ = writeln!(out, "  {:<22} {admin}", "Admin Role".cyan());
}

fn hint(method: AuthMethod, stage: Stage, error: &ValidationError) -> Option<&'static str> {
    match (stage, error.class()) {
        (Stage::Authenticate, ErrorClass::Authentication)
            if method == AuthMethod::IdentityProviderPassword =>
        {
            Some(
                "Hint: try --auth-method keycloak-client to check the client setup, and make sure \
                 \"Direct Access Grants\" is enabled for the Keycloak client.",
            )
        }
        (Stage::Verify, _) if matches!(error, ValidationError::TokenRejected { .. }) => Some(
            "Hint: the provider issued a token the server does not accept; check that both \
             sides share the same realm, client id and keys.",
        ),
        _ => None,
    }
}
