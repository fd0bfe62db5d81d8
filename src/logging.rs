use tracing_subscriber::{EnvFilter, fmt};

const DEFAULT_LOG_LEVEL: &str = "info";
const QUIET_TARGETS: &[&str] = &["hyper", "hyper_util", "reqwest", "h2", "httpmock"];

/// Installs the global subscriber. `RUST_LOG` wins; otherwise `LOG_LEVEL`
/// (default `info`) applies, with noisy HTTP internals held at `warn`.
/// ANSI colors are off when `CI` is set.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter());
    let ansi = std::env::var_os("CI").is_none();

    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(ansi)
        .with_target(false)
        .try_init();
}

fn default_filter() -> EnvFilter {
    let level = std::env::var("LOG_LEVEL")
        .map(|level| level.to_ascii_lowercase())
        .unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string());
    let directives = filter_directives(&level);
    EnvFilter::try_new(&directives).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL))
}

fn filter_directives(level: &str) -> String {
    let level = match level {
        "warning" => "warn",
        "critical" => "error",
        other => other,
    };
    let mut directives = vec![level.to_string()];
    directives.extend(QUIET_TARGETS.iter().map(|target| format!("{target}=warn")));
    directives.join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiets_http_internals() {
        let directives = filter_directives("debug");
        assert!(directives.starts_with("debug,"));
        assert!(directives.contains("hyper=warn"));
        assert!(directives.contains("reqwest=warn"));
    }

    #[test]
    fn maps_alternate_level_names() {
        assert!(filter_directives("warning").starts_with("warn,"));
        assert!(filter_directives("critical").starts_with("error,"));
    }
}
