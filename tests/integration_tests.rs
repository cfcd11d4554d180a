mod common;

use common::TinyCheckpoint;
use lm_runner::app::container;
use lm_runner::envconfig::EnvConfig;
use lm_runner::{
    load_model, DeviceKind, GenerationOptions, InferenceRunner, LoadError, LoadOptions, TokenId,
};

fn offline_env() -> EnvConfig {
    EnvConfig {
        hub_endpoint: "http://127.0.0.1:9".to_string(),
        hub_token: None,
        cache_dir: std::env::temp_dir().join("lm-runner-test-cache"),
    }
}

fn cpu() -> LoadOptions {
    LoadOptions { force_cpu: true }
}

#[test]
fn test_valid_checkpoint_loads_tokenizer_and_model() {
    let checkpoint = TinyCheckpoint::create();
    let loaded = load_model(&checkpoint.path(), &cpu(), &offline_env()).unwrap();

    assert_eq!(loaded.device, DeviceKind::Cpu);
    assert_eq!(loaded.tokenizer.vocab_size(), 259);
    assert_eq!(loaded.tokenizer.eos_token(), Some(TokenId(common::EOS_ID)));
    assert_eq!(loaded.model.meta().vocab_size, 259);
    assert_eq!(
        loaded.model.meta().parameter_count,
        TinyCheckpoint::config().parameter_count()
    );

    let mut report = Vec::new();
    loaded.write_report(&mut report).unwrap();
    let report = String::from_utf8(report).unwrap();
    assert!(report.contains("Model loaded on CPU in "));
    assert!(!report.contains("GPU memory"));
}

#[test]
fn test_generation_respects_max_new_tokens_and_seed() {
    let checkpoint = TinyCheckpoint::create_without_eos();
    let mut loaded = load_model(&checkpoint.path(), &cpu(), &offline_env()).unwrap();

    let options = GenerationOptions {
        max_new_tokens: 8,
        seed: Some(42),
        ..GenerationOptions::default()
    };
    let first = InferenceRunner::new(loaded.tokenizer.as_ref(), loaded.model.as_mut())
        .with_options(options.clone())
        .generate("the cat")
        .unwrap();
    assert_eq!(first.generated.len(), 8);
    assert!(first.text.starts_with("the cat"));
    assert_eq!(first.prompt_tokens, 6);

    let second = InferenceRunner::new(loaded.tokenizer.as_ref(), loaded.model.as_mut())
        .with_options(options)
        .generate("the cat")
        .unwrap();
    assert_eq!(first.generated, second.generated);
    assert_eq!(first.text, second.text);
}

#[test]
fn test_generation_stops_at_context_window() {
    let checkpoint = TinyCheckpoint::create_without_eos();
    let mut loaded = load_model(&checkpoint.path(), &cpu(), &offline_env()).unwrap();

    // 30 prompt tokens leave room for exactly 3 more in a 32 position window
    let prompt = "x".repeat(30);
    let output = InferenceRunner::new(loaded.tokenizer.as_ref(), loaded.model.as_mut())
        .max_new_tokens(50)
        .seed(5)
        .generate(&prompt)
        .unwrap();
    assert_eq!(output.prompt_tokens, 30);
    assert_eq!(output.generated.len(), 3);
}

#[test]
fn test_container_loader_reads_local_directory() {
    let checkpoint = TinyCheckpoint::create_without_eos();
    let (tokenizer, mut model) = container::load_model_from(&checkpoint.dir).unwrap();

    let output = InferenceRunner::new(tokenizer.as_ref(), model.as_mut())
        .max_new_tokens(3)
        .seed(1)
        .generate("he")
        .unwrap();
    assert_eq!(output.generated.len(), 3);
    assert_eq!(container::CONTAINER_MODEL_PATH, "/app/models/gpt2");
}

#[test]
fn test_invalid_checkpoint_path_fails() {
    let missing = std::env::temp_dir().join(format!("lm-runner-missing-{}", uuid::Uuid::new_v4()));
    let err = load_model(&missing.to_string_lossy(), &cpu(), &offline_env())
        .err()
        .unwrap();
    assert!(matches!(
        err.downcast_ref::<LoadError>(),
        Some(LoadError::CheckpointNotFound(_))
    ));

    assert!(container::load_model_from(&missing).is_err());
}

#[test]
fn test_incomplete_checkpoint_fails() {
    let checkpoint = TinyCheckpoint::create();
    std::fs::remove_file(checkpoint.dir.join("model.safetensors")).unwrap();

    let err = load_model(&checkpoint.path(), &cpu(), &offline_env())
        .err()
        .unwrap();
    match err.downcast_ref::<LoadError>() {
        Some(LoadError::MissingFile { file, .. }) => assert_eq!(file, "model.safetensors"),
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn test_other_architectures_are_rejected() {
    let checkpoint = TinyCheckpoint::create();
    std::fs::write(
        checkpoint.dir.join("config.json"),
        r#"{"model_type": "llama", "vocab_size": 259}"#,
    )
    .unwrap();

    let err = container::load_model_from(&checkpoint.dir).err().unwrap();
    assert!(matches!(
        err.downcast_ref::<LoadError>(),
        Some(LoadError::UnsupportedArchitecture(t)) if t == "llama"
    ));
}

#[test]
fn test_eos_token_comes_from_checkpoint() {
    let with_eos = TinyCheckpoint::create();
    let (tokenizer, model) = container::load_model_from(&with_eos.dir).unwrap();
    assert_eq!(model.eos_token(), Some(TokenId(common::EOS_ID)));
    assert_eq!(tokenizer.eos_token(), Some(TokenId(common::EOS_ID)));

    let without = TinyCheckpoint::create_without_eos();
    let (tokenizer, model) = container::load_model_from(&without.dir).unwrap();
    assert_eq!(model.eos_token(), None);
    assert_eq!(tokenizer.eos_token(), None);
}

#[test]
fn test_malformed_config_fails_at_load() {
    for (config, expected) in [
        (r#"{"n_head": 0, "n_embd": 16}"#, "n_head"),
        (r#"{"n_head": 3, "n_embd": 16}"#, "not divisible"),
        (r#"{"n_positions": 0}"#, "n_positions"),
        (r#"{"vocab_size": 0}"#, "vocab_size"),
    ] {
        let checkpoint = TinyCheckpoint::create();
        std::fs::write(checkpoint.dir.join("config.json"), config).unwrap();

        let err = container::load_model_from(&checkpoint.dir).err().unwrap();
        match err.downcast_ref::<LoadError>() {
            Some(LoadError::InvalidConfigValue { reason, .. }) => {
                assert!(reason.contains(expected), "{reason}")
            }
            other => panic!("unexpected error {:?}", other),
        }
    }
}
