//! Local sentence embedder, lazily initialized once per process.
//!
//! Same `OnceLock<Result<Mutex<TextEmbedding>, String>>` shape as the
//! teacher's `embeddings::local`, so a failed model load is cached and
//! doesn't retry fastembed's download/ONNX-init path on every call.

#[cfg(feature = "embeddings")]
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::sync::{Mutex, OnceLock};

#[cfg(feature = "embeddings")]
static EMBEDDING_MODEL: OnceLock<Result<Mutex<TextEmbedding>, String>> = OnceLock::new();

#[cfg(feature = "embeddings")]
fn cache_dir() -> std::path::PathBuf {
    if let Ok(path) = std::env::var("FASTEMBED_CACHE_PATH") {
        return std::path::PathBuf::from(path);
    }
    if let Some(proj_dirs) = directories::ProjectDirs::from("com", "polaris", "core") {
        return proj_dirs.cache_dir().join("fastembed");
    }
    std::path::PathBuf::from(".fastembed_cache")
}

#[cfg(feature = "embeddings")]
fn model() -> Result<std::sync::MutexGuard<'static, TextEmbedding>, String> {
    let result = EMBEDDING_MODEL.get_or_init(|| {
        let dir = cache_dir();
        if let Err(e) = std::fs::create_dir_all(&dir) {
            tracing::warn!(error = %e, "failed to create fastembed cache dir");
        }
        let options = InitOptions::new(EmbeddingModel::NomicEmbedTextV15)
            .with_show_download_progress(false)
            .with_cache_dir(dir);
        TextEmbedding::try_new(options)
            .map(Mutex::new)
            .map_err(|e| format!("failed to initialize embedding model: {e}"))
    });
    match result {
        Ok(m) => m.lock().map_err(|e| format!("embedding model lock poisoned: {e}")),
        Err(e) => Err(e.clone()),
    }
}

/// Embeds `texts`, truncating to `dimension` and padding with trailing
/// zeros if the model's native width is smaller. Never fails: on any
/// initialization or inference error, returns zero-vectors of `dimension`
/// so the caller's pipeline keeps moving (spec.md §4.3, `EmbedBatch`).
pub fn embed_batch(texts: &[String], dimension: usize) -> Vec<Vec<f32>> {
    #[cfg(feature = "embeddings")]
    {
        if texts.is_empty() {
            return Vec::new();
        }
        match model() {
            Ok(mut m) => {
                let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
                match m.embed(refs, None) {
                    Ok(vectors) => return vectors.into_iter().map(|v| resize(v, dimension)).collect(),
                    Err(e) => tracing::warn!(error = %e, "embedding inference failed, returning zero-vectors"),
                }
            }
            Err(e) => tracing::warn!(error = %e, "embedding model unavailable, returning zero-vectors"),
        }
    }
    #[cfg(not(feature = "embeddings"))]
    let _ = texts;

    vec![vec![0.0_f32; dimension]; texts.len()]
}

#[cfg(feature = "embeddings")]
fn resize(mut vector: Vec<f32>, dimension: usize) -> Vec<f32> {
    vector.resize(dimension, 0.0);
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in &mut vector {
            *x /= norm;
        }
    }
    vector
}
