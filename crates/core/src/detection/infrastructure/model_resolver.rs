use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::shared::constants::CONFIG_DIR_NAME;

#[derive(Error, Debug)]
pub enum ModelResolveError {
    #[error("model file {0} does not exist")]
    Missing(PathBuf),
    #[error("failed to create cache directory: {0}")]
    CacheDir(#[source] std::io::Error),
    #[error("download failed for {url}: {source}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to write model to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not determine cache directory")]
    NoCacheDir,
}

/// Locate the face model.
///
/// An explicit path wins and must exist. Otherwise the model is looked up in
/// the user cache and downloaded there on first use.
pub fn resolve(
    name: &str,
    url: &str,
    explicit: Option<&Path>,
) -> Result<PathBuf, ModelResolveError> {
    if let Some(path) = explicit {
        return if path.is_file() {
            Ok(path.to_path_buf())
        } else {
            Err(ModelResolveError::Missing(path.to_path_buf()))
        };
    }
    resolve_in(&model_cache_dir()?, name, url)
}

/// Cache lookup with download fallback, against a given cache directory.
pub fn resolve_in(cache_dir: &Path, name: &str, url: &str) -> Result<PathBuf, ModelResolveError> {
    let cached = cache_dir.join(name);
    if cached.is_file() {
        return Ok(cached);
    }

    fs::create_dir_all(cache_dir).map_err(ModelResolveError::CacheDir)?;
    log::info!("Downloading face model from {url}");
    download(url, &cached)?;
    log::info!("Face model saved to {}", cached.display());
    Ok(cached)
}

/// Platform-specific model cache directory.
///
/// - macOS: `~/Library/Application Support/MicAim/models/`
/// - Linux: `$XDG_CACHE_HOME/MicAim/models/` or `~/.cache/MicAim/models/`
/// - Windows: `%LOCALAPPDATA%/MicAim/models/`
pub fn model_cache_dir() -> Result<PathBuf, ModelResolveError> {
    #[cfg(target_os = "macos")]
    let base = dirs::data_dir();
    #[cfg(not(target_os = "macos"))]
    let base = dirs::cache_dir();

    base.map(|d| d.join(CONFIG_DIR_NAME).join("models"))
        .ok_or(ModelResolveError::NoCacheDir)
}

/// Streams `url` into `dest` through a `.part` file; nothing is left behind
/// on failure.
fn download(url: &str, dest: &Path) -> Result<(), ModelResolveError> {
    let part = dest.with_extension("part");
    let result = stream_to(url, &part).and_then(|()| {
        fs::rename(&part, dest).map_err(|source| ModelResolveError::Write {
            path: dest.to_path_buf(),
            source,
        })
    });
    if result.is_err() {
        let _ = fs::remove_file(&part);
    }
    result
}

fn stream_to(url: &str, path: &Path) -> Result<(), ModelResolveError> {
    let write_err = |source| ModelResolveError::Write {
        path: path.to_path_buf(),
        source,
    };

    let mut response = reqwest::blocking::get(url)
        .and_then(|r| r.error_for_status())
        .map_err(|source| ModelResolveError::Download {
            url: url.to_string(),
            source,
        })?;
    let total = response.content_length().unwrap_or(0);

    let mut file = fs::File::create(path).map_err(write_err)?;
    let mut buf = vec![0u8; 1024 * 1024];
    let mut downloaded: u64 = 0;
    let mut last_decile = 0;
    loop {
        let n = response.read(&mut buf).map_err(write_err)?;
        if n == 0 {
            break;
        }
        file.write_all(&buf[..n]).map_err(write_err)?;
        downloaded += n as u64;
        if total > 0 {
            let decile = downloaded * 10 / total;
            if decile > last_decile {
                last_decile = decile;
                log::info!("Model download {}%", decile * 10);
            }
        }
    }
    file.flush().map_err(write_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_explicit_path_is_used() {
        let tmp = TempDir::new().unwrap();
        let model = tmp.path().join("face.onnx");
        fs::write(&model, b"model").unwrap();

        let resolved = resolve("ignored.onnx", "http://invalid.example.com", Some(&model)).unwrap();
        assert_eq!(resolved, model);
    }

    #[test]
    fn test_missing_explicit_path_errors() {
        let tmp = TempDir::new().unwrap();
        let model = tmp.path().join("absent.onnx");

        let err = resolve("x.onnx", "http://invalid.example.com", Some(&model)).unwrap_err();
        assert!(matches!(err, ModelResolveError::Missing(p) if p == model));
    }

    #[test]
    fn test_cached_model_skips_download() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("face.onnx"), b"cached").unwrap();

        let resolved = resolve_in(
            tmp.path(),
            "face.onnx",
            "http://invalid.nonexistent.example.com/face.onnx",
        )
        .unwrap();
        assert_eq!(fs::read(resolved).unwrap(), b"cached");
    }

    #[test]
    fn test_failed_download_leaves_nothing() {
        let tmp = TempDir::new().unwrap();
        let cache = tmp.path().join("models");

        let result = resolve_in(
            &cache,
            "face.onnx",
            "http://invalid.nonexistent.example.com/face.onnx",
        );
        assert!(matches!(result, Err(ModelResolveError::Download { .. })));
        assert!(!cache.join("face.onnx").exists());
        assert!(!cache.join("face.part").exists());
    }

    #[test]
    fn test_model_cache_dir_is_namespaced() {
        let path = model_cache_dir().unwrap();
        assert!(path.ends_with(Path::new(CONFIG_DIR_NAME).join("models")));
    }
}
