use std::path::PathBuf;

/// Application-level constants
pub const APP_NAME: &str = "Radreport";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

const DEFAULT_API_URL: &str = "http://localhost:5000/api";
const DEFAULT_TEMPLATES_ENDPOINT: &str = "templates";
const DEFAULT_METADATA_ENDPOINT: &str = "studies";
const DEFAULT_UPLOAD_ENDPOINT: &str = "reports";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default tracing filter when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "radreport=info,radreport_lib=info,warn"
}

/// Local export directory for the CLI `export` command.
/// ~/Radreport/exports/ on all platforms. Falls back to the working
/// directory when no home directory can be determined.
pub fn exports_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
        .join("exports")
}

/// Backend endpoints and transport settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub api_url: String,
    pub templates_endpoint: String,
    pub metadata_endpoint: String,
    pub upload_endpoint: String,
    pub timeout_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.into(),
            templates_endpoint: DEFAULT_TEMPLATES_ENDPOINT.into(),
            metadata_endpoint: DEFAULT_METADATA_ENDPOINT.into(),
            upload_endpoint: DEFAULT_UPLOAD_ENDPOINT.into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl ServiceConfig {
    /// Read `RADREPORT_*` environment variables, keeping defaults for
    /// anything unset, empty or (for the timeout) not a positive integer.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let get = |key: &str, default: String| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or(default)
        };

        let timeout_secs = lookup("RADREPORT_TIMEOUT_SECS")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .unwrap_or(defaults.timeout_secs);

        Self {
            api_url: get("RADREPORT_API_URL", defaults.api_url),
            templates_endpoint: get("RADREPORT_TEMPLATES_ENDPOINT", defaults.templates_endpoint),
            metadata_endpoint: get("RADREPORT_METADATA_ENDPOINT", defaults.metadata_endpoint),
            upload_endpoint: get("RADREPORT_UPLOAD_ENDPOINT", defaults.upload_endpoint),
            timeout_secs,
        }
    }
}
