use crate::core::error::LoadError;
use crate::core::Result;
use crate::envconfig::EnvConfig;
use crate::infra::checkpoint::{
    shard_files, Checkpoint, CONFIG_FILE, MERGES_FILE, PYTORCH_FILE, SAFETENSORS_FILE,
    SAFETENSORS_INDEX_FILE, TOKENIZER_JSON_FILE, VOCAB_FILE,
};
use hf_hub::api::sync::{Api, ApiBuilder};
use hf_hub::Cache;
use std::path::{Path, PathBuf};

/// Weight files in the order a checkpoint prefers them.
const WEIGHT_CANDIDATES: [&str; 3] = [SAFETENSORS_FILE, SAFETENSORS_INDEX_FILE, PYTORCH_FILE];

/// Fetches checkpoint files from a Hugging Face compatible hub into the
/// standard hub cache. A snapshot that is already complete on disk is used
/// without any network access.
pub struct HubClient {
    cache: Cache,
    endpoint: String,
    token: Option<String>,
}

impl HubClient {
    pub fn new(endpoint: impl Into<String>, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache: Cache::new(cache_dir.into()),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            token: None,
        }
    }

    pub fn from_env(config: &EnvConfig) -> Self {
        let mut hub = Self::new(config.hub_endpoint.clone(), config.cache_dir.clone());
        hub.token = config.hub_token.clone();
        hub
    }

    pub fn cache_dir(&self) -> &Path {
        self.cache.path()
    }

    /// Snapshot directory of `repo` when every file a checkpoint needs is
    /// already cached.
    pub fn cached_snapshot(&self, repo: &str) -> Option<PathBuf> {
        let config = self.cache.model(repo.to_string()).get(CONFIG_FILE)?;
        let dir = config.parent()?.to_path_buf();
        match Checkpoint::from_dir(&dir) {
            Ok(_) => Some(dir),
            Err(err) => {
                tracing::debug!(repo, error = %err, "cached snapshot is incomplete");
                None
            }
        }
    }

    /// Downloads everything a checkpoint needs and returns the local directory.
    pub fn snapshot(&self, repo: &str) -> Result<PathBuf> {
        if let Some(dir) = self.cached_snapshot(repo) {
            tracing::debug!(repo, dir = %dir.display(), "using cached snapshot");
            return Ok(dir);
        }

        let remote = self.api(repo)?.model(repo.to_string());
        fetch_checkpoint(repo, |file| {
            tracing::info!(repo, file, "downloading");
            remote.get(file).map_err(|e| e.to_string())
        })
    }

    fn api(&self, repo: &str) -> Result<Api> {
        let api = ApiBuilder::from_cache(self.cache.clone())
            .with_endpoint(self.endpoint.clone())
            .with_token(self.token.clone())
            .with_progress(true)
            .build()
            .map_err(|e| LoadError::Download {
                repo: repo.to_string(),
                file: String::new(),
                reason: e.to_string(),
            })?;
        Ok(api)
    }
}

/// Pulls the files of a checkpoint through `get`, trying alternatives in the
/// order `Checkpoint::from_dir` prefers them, and returns the directory that
/// holds `config.json`. `get` reports a file it cannot provide as `Err`.
pub fn fetch_checkpoint<F>(repo: &str, mut get: F) -> Result<PathBuf>
where
    F: FnMut(&str) -> std::result::Result<PathBuf, String>,
{
    let failed = |file: &str, reason: String| LoadError::Download {
        repo: repo.to_string(),
        file: file.to_string(),
        reason,
    };

    let config = get(CONFIG_FILE).map_err(|reason| failed(CONFIG_FILE, reason))?;

    let (weights, path) = first_available(&mut get, &WEIGHT_CANDIDATES)
        .map_err(|reason| failed(&WEIGHT_CANDIDATES.join(" | "), reason))?;
    if weights == SAFETENSORS_INDEX_FILE {
        for shard in shard_files(&path)? {
            get(&shard).map_err(|reason| failed(&shard, reason))?;
        }
    }

    if let Err(reason) = get(TOKENIZER_JSON_FILE) {
        tracing::debug!(repo, %reason, "no tokenizer.json, falling back to vocab and merges");
        for file in [VOCAB_FILE, MERGES_FILE] {
            get(file).map_err(|reason| failed(file, reason))?;
        }
    }

    config
        .parent()
        .map(Path::to_path_buf)
        .ok_or_else(|| failed(CONFIG_FILE, "downloaded file has no parent".to_string()).into())
}

fn first_available<'a, F>(
    get: &mut F,
    candidates: &[&'a str],
) -> std::result::Result<(&'a str, PathBuf), String>
where
    F: FnMut(&str) -> std::result::Result<PathBuf, String>,
{
    let mut reasons = Vec::new();
    for &file in candidates {
        match get(file) {
            Ok(path) => return Ok((file, path)),
            Err(reason) => reasons.push(format!("{}: {}", file, reason)),
        }
    }
    Err(reasons.join("; "))
}
