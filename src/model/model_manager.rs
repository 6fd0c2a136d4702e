use crate::{
    error::{IsolationError, Result},
    io::{
        crypto::verify_sha256,
        net::{download_with_progress, http_client},
        paths::models_cache_dir,
    },
    model::registry::resolve_manifest_url,
    types::{ModelManifest, ModelOptions},
};

use std::{fs, path::PathBuf};
use tracing::{info, warn};

/// A manifest together with the verified weights file it points at.
#[derive(Debug, Clone)]
pub struct ModelHandle {
    pub manifest: ModelManifest,
    pub local_path: PathBuf,
}

pub fn ensure_model(model_name: &str, manifest_url_override: Option<&str>) -> Result<ModelHandle> {
    ensure_model_with(&ModelOptions {
        model_name: model_name.to_string(),
        manifest_url_override: manifest_url_override.map(str::to_string),
        cache_dir_override: None,
    })
}

/// Fetch the manifest and make sure its primary artifact sits in the cache
/// with a matching checksum, downloading it only when it does not.
pub fn ensure_model_with(opts: &ModelOptions) -> Result<ModelHandle> {
    let manifest_url = match opts.manifest_url_override.as_deref() {
        Some(url) => url.to_string(),
        None => resolve_manifest_url(&opts.model_name)?,
    };

    let client = http_client()?;
    let manifest: ModelManifest = client
        .get(&manifest_url)
        .send()?
        .error_for_status()?
        .json()?;

    let a = manifest
        .resolve_primary_artifact()
        .map_err(IsolationError::Manifest)?;

    let cache_dir = models_cache_dir(opts.cache_dir_override.as_deref())?;
    fs::create_dir_all(&cache_dir)?;
    let ext = a
        .file
        .rsplit_once('.')
        .map(|(_, ext)| format!(".{ext}"))
        .unwrap_or_default();
    let file_name = format!("{}-{}{}", manifest.name, &a.sha256[..8], ext);
    let local_path = cache_dir.join(file_name);

    if verify_sha256(&local_path, &a.sha256)? {
        info!(path = %local_path.display(), "model weights found in cache");
    } else {
        download_with_progress(&client, &a.url, &local_path)?;
        if !verify_sha256(&local_path, &a.sha256)? {
            return Err(IsolationError::Checksum {
                path: local_path.display().to_string(),
            });
        }
        if a.size_bytes > 0 {
            let size = fs::metadata(&local_path).map(|m| m.len()).unwrap_or(0);
            if size != a.size_bytes {
                warn!(
                    path = %local_path.display(),
                    expected = a.size_bytes,
                    got = size,
                    "size mismatch for downloaded model"
                );
            }
        }
    }

    Ok(ModelHandle {
        manifest,
        local_path,
    })
}
