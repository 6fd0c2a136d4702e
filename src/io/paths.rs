use crate::error::{IsolationError, Result};
use directories::ProjectDirs;
use std::path::PathBuf;

/// Where downloaded model weights live. An explicit override wins over the
/// per-user cache directory.
pub fn models_cache_dir(override_dir: Option<&str>) -> Result<PathBuf> {
    if let Some(dir) = override_dir.filter(|d| !d.is_empty()) {
        return Ok(PathBuf::from(dir));
    }
    let proj = ProjectDirs::from("dev", "VoiceIsolation", "voice-isolation")
        .ok_or(IsolationError::CacheDirUnavailable)?;
    let mut p = PathBuf::from(proj.cache_dir());
    p.push("models");
    Ok(p)
}
