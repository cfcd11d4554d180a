use crate::core::error::LoadError;
use crate::core::tokenizer::TokenizerSource;
use crate::core::Result;
use crate::infra::hub::HubClient;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "config.json";
pub const SAFETENSORS_FILE: &str = "model.safetensors";
pub const SAFETENSORS_INDEX_FILE: &str = "model.safetensors.index.json";
pub const PYTORCH_FILE: &str = "pytorch_model.bin";
pub const TOKENIZER_JSON_FILE: &str = "tokenizer.json";
pub const VOCAB_FILE: &str = "vocab.json";
pub const MERGES_FILE: &str = "merges.txt";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WeightFiles {
    Safetensors(Vec<PathBuf>),
    Pytorch(PathBuf),
}

/// A checkpoint directory whose required files have all been found.
#[derive(Debug, Clone)]
pub struct Checkpoint {
    pub dir: PathBuf,
    pub config: PathBuf,
    pub weights: WeightFiles,
    pub tokenizer: TokenizerSource,
}

impl Checkpoint {
    pub fn from_dir(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            return Err(LoadError::CheckpointNotFound(dir.to_path_buf()).into());
        }
        let missing = |file: &str| LoadError::MissingFile {
            dir: dir.to_path_buf(),
            file: file.to_string(),
        };

        let config = dir.join(CONFIG_FILE);
        if !config.is_file() {
            return Err(missing(CONFIG_FILE).into());
        }

        let weights = if dir.join(SAFETENSORS_FILE).is_file() {
            WeightFiles::Safetensors(vec![dir.join(SAFETENSORS_FILE)])
        } else if dir.join(SAFETENSORS_INDEX_FILE).is_file() {
            let shards = shard_files(&dir.join(SAFETENSORS_INDEX_FILE))?
                .into_iter()
                .map(|f| dir.join(f))
                .collect::<Vec<_>>();
            if let Some(absent) = shards.iter().find(|p| !p.is_file()) {
                let name = absent.file_name().map(|n| n.to_string_lossy().into_owned());
                return Err(missing(&name.unwrap_or_default()).into());
            }
            WeightFiles::Safetensors(shards)
        } else if dir.join(PYTORCH_FILE).is_file() {
            WeightFiles::Pytorch(dir.join(PYTORCH_FILE))
        } else {
            return Err(missing(SAFETENSORS_FILE).into());
        };

        let tokenizer = if dir.join(TOKENIZER_JSON_FILE).is_file() {
            TokenizerSource::Json(dir.join(TOKENIZER_JSON_FILE))
        } else if dir.join(VOCAB_FILE).is_file() && dir.join(MERGES_FILE).is_file() {
            TokenizerSource::VocabMerges {
                vocab: dir.join(VOCAB_FILE),
                merges: dir.join(MERGES_FILE),
            }
        } else {
            return Err(missing(TOKENIZER_JSON_FILE).into());
        };

        tracing::debug!(dir = %dir.display(), ?weights, "resolved checkpoint files");

        Ok(Self {
            dir: dir.to_path_buf(),
            config,
            weights,
            tokenizer,
        })
    }
}

/// Shard file names listed in a `model.safetensors.index.json`.
pub fn shard_files(index_path: &Path) -> Result<Vec<String>> {
    let raw = std::fs::read(index_path)?;
    let index: serde_json::Value = serde_json::from_slice(&raw)?;
    let weight_map = index
        .get("weight_map")
        .and_then(|v| v.as_object())
        .ok_or_else(|| anyhow::anyhow!("{} has no weight_map", index_path.display()))?;

    let files: BTreeSet<String> = weight_map
        .values()
        .filter_map(|v| v.as_str().map(String::from))
        .collect();
    Ok(files.into_iter().collect())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckpointLocation {
    Local(PathBuf),
    Hub(String),
}

fn expand_home(spec: &str) -> PathBuf {
    if let Some(rest) = spec.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(spec)
}

fn looks_like_path(spec: &str) -> bool {
    spec.starts_with('/')
        || spec.starts_with("./")
        || spec.starts_with("../")
        || spec.starts_with('~')
        || spec.starts_with('.')
        || spec.contains('\\')
}

fn is_hub_id(spec: &str) -> bool {
    let valid_part = |p: &str| {
        !p.is_empty()
            && p.chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    };
    let parts: Vec<&str> = spec.split('/').collect();
    parts.len() <= 2 && parts.iter().all(|p| valid_part(p))
}

/// Decides whether `spec` names a local directory or a hub model id. An
/// existing directory always wins; a path-looking string that does not exist
/// is an error rather than a hub lookup.
pub fn locate(spec: &str) -> Result<CheckpointLocation> {
    let path = expand_home(spec);
    if path.exists() {
        return Ok(CheckpointLocation::Local(path));
    }
    if looks_like_path(spec) || !is_hub_id(spec) {
        return Err(LoadError::CheckpointNotFound(path).into());
    }
    Ok(CheckpointLocation::Hub(spec.to_string()))
}

pub fn resolve(spec: &str, hub: &HubClient) -> Result<Checkpoint> {
    match locate(spec)? {
        CheckpointLocation::Local(dir) => Checkpoint::from_dir(&dir),
        CheckpointLocation::Hub(repo) => {
            let dir = hub.snapshot(&repo)?;
            Checkpoint::from_dir(&dir)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("lm-runner-{}-{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_locate() {
        assert_eq!(locate("gpt2").unwrap(), CheckpointLocation::Hub("gpt2".to_string()));
        assert_eq!(
            locate("openai-community/gpt2").unwrap(),
            CheckpointLocation::Hub("openai-community/gpt2".to_string())
        );
        assert!(locate("/definitely/not/a/checkpoint").is_err());
        assert!(locate("./missing-checkpoint").is_err());
        assert!(locate("a/b/c").is_err());
        assert!(locate("has space").is_err());
    }

    #[test]
    fn test_locate_existing_dir_is_local() {
        let dir = scratch_dir("locate");
        let spec = dir.to_string_lossy().into_owned();
        assert_eq!(locate(&spec).unwrap(), CheckpointLocation::Local(dir.clone()));
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_from_dir_reports_first_missing_file() {
        let dir = scratch_dir("missing");
        let err = Checkpoint::from_dir(&dir).unwrap_err();
        match err.downcast_ref::<LoadError>() {
            Some(LoadError::MissingFile { file, .. }) => assert_eq!(file, CONFIG_FILE),
            other => panic!("unexpected error {:?}", other),
        }

        std::fs::write(dir.join(CONFIG_FILE), "{}").unwrap();
        std::fs::write(dir.join(PYTORCH_FILE), b"").unwrap();
        let err = Checkpoint::from_dir(&dir).unwrap_err();
        match err.downcast_ref::<LoadError>() {
            Some(LoadError::MissingFile { file, .. }) => assert_eq!(file, TOKENIZER_JSON_FILE),
            other => panic!("unexpected error {:?}", other),
        }

        std::fs::write(dir.join(VOCAB_FILE), "{}").unwrap();
        std::fs::write(dir.join(MERGES_FILE), "").unwrap();
        let checkpoint = Checkpoint::from_dir(&dir).unwrap();
        assert_eq!(checkpoint.weights, WeightFiles::Pytorch(dir.join(PYTORCH_FILE)));
        assert!(matches!(checkpoint.tokenizer, TokenizerSource::VocabMerges { .. }));
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_shard_files_are_deduplicated() {
        let dir = scratch_dir("shards");
        let index = dir.join(SAFETENSORS_INDEX_FILE);
        std::fs::write(
            &index,
            r#"{"weight_map": {"a": "model-00002.safetensors", "b": "model-00001.safetensors", "c": "model-00001.safetensors"}}"#,
        )
        .unwrap();
        assert_eq!(
            shard_files(&index).unwrap(),
            vec!["model-00001.safetensors", "model-00002.safetensors"]
        );
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
