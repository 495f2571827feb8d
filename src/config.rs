// Process configuration.
//
// The data service URL and access key are mandatory; everything else has a
// default. A missing key is reported as `DashboardError::Config` and `main`
// refuses to start.
use crate::error::{DashboardError, DashboardResult};
use std::env;
use std::path::PathBuf;

pub const DEFAULT_IMPORT_URL: &str = "http://127.0.0.1:8000/api/importar-planilha";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_key: String,
    pub import_url: String,
    pub export_dir: PathBuf,
    pub log_level: String,
    pub http_timeout_secs: u64,
}

impl AppConfig {
    /// Load configuration from environment variables.
    /// Loads `.env` file if present, then reads required vars.
    pub fn from_env() -> DashboardResult<Self> {
        // Best-effort .env load; ignore if missing
        let _ = dotenvy::dotenv();

        Ok(Self {
            supabase_url: trim_url(&get_var("SUPABASE_URL")?),
            supabase_key: get_var("SUPABASE_ANON_KEY")?,
            import_url: trim_url(&get_var_or("IMPORT_URL", DEFAULT_IMPORT_URL)),
            export_dir: PathBuf::from(get_var_or("EXPORT_DIR", ".")),
            log_level: get_var_or("LOG_LEVEL", "info"),
            http_timeout_secs: get_var_or("HTTP_TIMEOUT_SECS", "30")
                .parse()
                .map_err(|e| DashboardError::Config(format!("invalid HTTP_TIMEOUT_SECS: {e}")))?,
        })
    }
}

fn get_var(key: &str) -> DashboardResult<String> {
    match env::var(key) {
        Ok(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(DashboardError::Config(format!("{key} is required but not set"))),
    }
}

fn get_var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn trim_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}
