//! Service configuration.
//!
//! Sources, later ones winning:
//! 1. built-in defaults ([`AppConfig::default`]);
//! 2. an optional `voice-isolation.{toml,json,yaml}` file in the working
//!    directory, or the file passed with `--config`;
//! 3. `VOICE_ISOLATION__<SECTION>__<KEY>` environment variables
//!    (e.g. `VOICE_ISOLATION__MODEL__DEVICE=cpu`);
//! 4. plain `HOST` / `PORT`, as most container platforms set them.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::{env, path::Path};

use crate::{
    core::{dsp::DEFAULT_RESAMPLE_CHUNK, engine::Device, isolator::IsolationSettings, separator::VOCALS},
    types::ModelOptions,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub model: ModelConfig,
    pub audio: AudioConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// HTTP worker threads; 0 keeps actix-web's default (one per core).
    pub workers: usize,
    /// Largest accepted request body, in MiB.
    pub max_payload_mb: usize,
    /// Ceiling on a single isolation; 0 disables it.
    pub inference_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub name: String,
    pub manifest_url: Option<String>,
    pub cache_dir: Option<String>,
    pub device: Device,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    pub vocals_stem: String,
    pub resample_chunk: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
                workers: 0,
                max_payload_mb: 256,
                inference_timeout_secs: 600,
            },
            model: ModelConfig {
                name: ModelOptions::default().model_name,
                manifest_url: None,
                cache_dir: None,
                device: Device::Auto,
            },
            audio: AudioConfig {
                vocals_stem: VOCALS.to_string(),
                resample_chunk: DEFAULT_RESAMPLE_CHUNK,
            },
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Layer defaults, file, and environment. `path` replaces the default
    /// `voice-isolation` file lookup and must exist.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(p) => config::File::from(p).required(true),
            None => config::File::with_name("voice-isolation").required(false),
        };

        let mut settings = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(file)
            .add_source(
                config::Environment::with_prefix("VOICE_ISOLATION")
                    .prefix_separator("__")
                    .separator("__"),
            );

        if let Ok(host) = env::var("HOST") {
            settings = settings.set_override("server.host", host)?;
        }

        if let Ok(port) = env::var("PORT") {
            settings = settings.set_override("server.port", port)?;
        }

        let config: AppConfig = settings.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(anyhow!("Server port cannot be 0"));
        }

        if self.server.max_payload_mb == 0 {
            return Err(anyhow!("max_payload_mb must be greater than 0"));
        }

        if self.audio.resample_chunk == 0 {
            return Err(anyhow!("resample_chunk must be greater than 0"));
        }

        if self.audio.vocals_stem.trim().is_empty() {
            return Err(anyhow!("vocals_stem cannot be empty"));
        }

        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn payload_limit_bytes(&self) -> usize {
        self.server.max_payload_mb * 1024 * 1024
    }

    pub fn model_options(&self) -> ModelOptions {
        ModelOptions {
            model_name: self.model.name.clone(),
            manifest_url_override: self.model.manifest_url.clone().filter(|u| !u.is_empty()),
            cache_dir_override: self.model.cache_dir.clone().filter(|d| !d.is_empty()),
        }
    }

    pub fn isolation_settings(&self) -> IsolationSettings {
        IsolationSettings {
            vocals_stem: self.audio.vocals_stem.clone(),
            resample_chunk: self.audio.resample_chunk,
        }
    }
}
