use std::env;
use std::path::PathBuf;

/// Checkpoint used when neither an argument nor `MODEL_PATH` names one.
pub const DEFAULT_MODEL: &str = "gpt2";
pub const MODEL_PATH_VAR: &str = "MODEL_PATH";
pub const DEFAULT_HUB_ENDPOINT: &str = "https://huggingface.co";

pub struct EnvConfig {
    pub hub_endpoint: String,
    pub hub_token: Option<String>,
    pub cache_dir: PathBuf,
}

impl EnvConfig {
    pub fn from_env() -> Self {
        Self {
            hub_endpoint: non_empty_var("HF_ENDPOINT")
                .unwrap_or_else(|| DEFAULT_HUB_ENDPOINT.to_string()),
            hub_token: non_empty_var("HF_TOKEN"),
            cache_dir: cache_dir(),
        }
    }
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

/// An explicit path or id wins; otherwise `MODEL_PATH`, then the default.
pub fn model_path(explicit: Option<&str>) -> String {
    explicit
        .filter(|p| !p.trim().is_empty())
        .map(String::from)
        .or_else(|| non_empty_var(MODEL_PATH_VAR))
        .unwrap_or_else(|| DEFAULT_MODEL.to_string())
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

pub fn cache_dir() -> PathBuf {
    if let Some(path) = non_empty_var("LM_RUNNER_CACHE") {
        return expand_home(&path);
    }

    hf_hub::Cache::from_env().path().clone()
}

fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}
