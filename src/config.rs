use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};

const DEFAULT_API_URL: &str = "http://localhost:8000/api";
const DEFAULT_BACKEND_URL: &str = "http://localhost:5000/api";

/// Runtime configuration loaded from the environment (and `.env`).
#[derive(Clone, Debug)]
pub struct Config {
    /// Base URL of the external job-board API (JOBBOARD_API_URL)
    pub api_url: String,

    /// Base URL of the account/contact backend (JOBBOARD_BACKEND_URL)
    pub backend_url: String,

    /// SQLite file holding the local key-value slots (JOBBOARD_DB_PATH)
    pub db_path: Option<PathBuf>,

    /// Jobs requested per page (JOBBOARD_PAGE_SIZE, 1..=100, default 10)
    pub page_size: u32,

    /// Per-request timeout (JOBBOARD_HTTP_TIMEOUT_SECS, default 30, 0 = none)
    pub http_timeout: Option<Duration>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_url = lookup("JOBBOARD_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let backend_url =
            lookup("JOBBOARD_BACKEND_URL").unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string());
        let db_path = lookup("JOBBOARD_DB_PATH").map(PathBuf::from);

        let page_size = match lookup("JOBBOARD_PAGE_SIZE") {
            Some(raw) => {
                let size: u32 = raw.trim().parse().map_err(|_| {
                    Error::validation(format!("JOBBOARD_PAGE_SIZE must be a number, got '{}'", raw))
                })?;
                if !(1..=100).contains(&size) {
                    return Err(Error::validation("JOBBOARD_PAGE_SIZE must be between 1 and 100"));
                }
                size
            }
            None => 10,
        };

        let http_timeout = match lookup("JOBBOARD_HTTP_TIMEOUT_SECS") {
            Some(raw) => {
                let secs: u64 = raw.trim().parse().map_err(|_| {
                    Error::validation(format!(
                        "JOBBOARD_HTTP_TIMEOUT_SECS must be a number, got '{}'",
                        raw
                    ))
                })?;
                (secs > 0).then(|| Duration::from_secs(secs))
            }
            None => Some(Duration::from_secs(30)),
        };

        Ok(Config {
            api_url: api_url.trim_end_matches('/').to_string(),
            backend_url: backend_url.trim_end_matches('/').to_string(),
            db_path,
            page_size,
            http_timeout,
        })
    }
}
