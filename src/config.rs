use std::path::PathBuf;

/// Application-level constants
pub const APP_NAME: &str = "cccd-verify";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Env var naming a JSON file with `VerificationConfig` overrides.
pub const CONFIG_PATH_ENV: &str = "CCCD_VERIFY_CONFIG";

/// Env var overriding the number of concurrent recognition workers.
pub const WORKERS_ENV: &str = "CCCD_VERIFY_WORKERS";

/// Env var overriding the recognition language hint (e.g. "vie", "vie+eng").
pub const LANGUAGE_ENV: &str = "CCCD_VERIFY_LANGUAGE";

/// Env var overriding the pending-review score cutoff.
pub const APPROVAL_CUTOFF_ENV: &str = "CCCD_VERIFY_APPROVAL_CUTOFF";

/// Env var pointing at a tessdata directory for the bundled CLI recognizer.
pub const TESSDATA_ENV: &str = "TESSDATA_PREFIX";

/// Default `tracing` filter when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    if cfg!(debug_assertions) {
        "cccd_verify=debug,info"
    } else {
        "cccd_verify=info,warn"
    }
}

/// Path of the JSON config file, if one is configured.
pub fn config_file_path() -> Option<PathBuf> {
    std::env::var_os(CONFIG_PATH_ENV)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

/// Tessdata directory for the CLI recognizer, if one is configured.
pub fn tessdata_dir() -> Option<PathBuf> {
    std::env::var_os(TESSDATA_ENV)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}
