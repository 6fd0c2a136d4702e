use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use ndarray::Array2;
use std::{path::PathBuf, sync::Arc, time::Duration};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use voice_isolation::{
    encode_wav_base64, model::registry::registry, prepare_model,
    service::{config::AppConfig, run_server, schema::IsolateResponse, AppState},
    set_download_progress_callback, AudioBuffer, IsolationService,
};

#[derive(Parser)]
#[command(name = "voice-isolation")]
#[command(about = "Vocal isolation service backed by a pretrained separation model", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (TOML/JSON/YAML); defaults to ./voice-isolation.*
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load the model and serve the HTTP endpoint
    Serve,

    /// Download and verify model weights ahead of time
    Prepare {
        #[arg(short, long)]
        model: Option<String>,

        #[arg(long)]
        manifest_url: Option<String>,

        #[arg(short, long)]
        quiet: bool,
    },

    /// List available models
    List,

    /// Send a synthesized sine tone to a running endpoint
    Smoke {
        #[arg(long, default_value = "http://127.0.0.1:8080/isolate")]
        url: String,

        #[arg(long, default_value_t = 2.0)]
        seconds: f32,

        #[arg(long)]
        accompaniment: bool,
    },
}

fn main() {
    dotenv::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Serve => handle_serve(cli.config),
        Commands::Prepare {
            model,
            manifest_url,
            quiet,
        } => handle_prepare(cli.config, model, manifest_url, quiet),
        Commands::List => handle_list(),
        Commands::Smoke {
            url,
            seconds,
            accompaniment,
        } => handle_smoke(&url, seconds, accompaniment),
    };

    if let Err(e) = result {
        error!("{e:#}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "voice_isolation=info,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn handle_serve(config_path: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load_from(config_path.as_deref())?;

    info!("Starting voice-isolation v{}", env!("CARGO_PKG_VERSION"));

    let service = Arc::new(IsolationService::onnx(
        config.isolation_settings(),
        config.model_options(),
        config.model.device,
    ));

    // The model must be loaded before the first request is accepted.
    service
        .warm_up()
        .context("model failed to load; refusing to serve")?;

    let state = AppState::new(service, &config);
    actix_web::rt::System::new().block_on(run_server(config, state))?;
    Ok(())
}

fn handle_prepare(
    config_path: Option<PathBuf>,
    model: Option<String>,
    manifest_url: Option<String>,
    quiet: bool,
) -> Result<()> {
    let config = AppConfig::load_from(config_path.as_deref())?;
    let mut opts = config.model_options();
    if let Some(model) = model {
        opts.model_name = model;
    }
    if manifest_url.is_some() {
        opts.manifest_url_override = manifest_url;
    }

    if !quiet {
        eprintln!("📦 Preparing model: {}", opts.model_name);
        set_download_progress_callback(|downloaded, total| {
            if total > 0 {
                let percent = (downloaded as f64 / total as f64 * 100.0).round() as u64;
                eprint!(
                    "\rDownloading model: {:>3}% ({:.2} MB / {:.2} MB)",
                    percent,
                    downloaded as f64 / 1_000_000.0,
                    total as f64 / 1_000_000.0
                );
                if downloaded >= total {
                    eprintln!();
                }
            } else {
                eprint!("\rDownloading model: {:.2} MB", downloaded as f64 / 1_000_000.0);
            }
        });
    }

    let handle = prepare_model(&opts, config.model.device)?;

    if !quiet {
        eprintln!("✅ Model ready at {}", handle.local_path.display());
        eprintln!("   stems: {}", handle.manifest.stems.join(", "));
    } else {
        println!("{}", handle.local_path.display());
    }

    Ok(())
}

fn handle_list() -> Result<()> {
    let registry = registry()?;

    eprintln!("📋 Available Models");
    for model in &registry.models {
        let marker = if model.name == registry.default {
            " (default)"
        } else {
            ""
        };
        eprintln!("  • {}{}", model.name, marker);
    }
    eprintln!();
    eprintln!("Use --model <name> with `prepare`, or set model.name in the config");

    Ok(())
}

/// Stereo sine, half amplitude.
fn sine_tone(freq: f32, seconds: f32, sample_rate: u32) -> AudioBuffer {
    let frames = (sample_rate as f32 * seconds) as usize;
    let samples = Array2::from_shape_fn((2, frames), |(_, i)| {
        let t = i as f32 / sample_rate as f32;
        (2.0 * std::f32::consts::PI * freq * t).sin() * 0.5
    });
    AudioBuffer::new(samples, sample_rate)
}

fn handle_smoke(url: &str, seconds: f32, accompaniment: bool) -> Result<()> {
    if !(seconds > 0.0) {
        return Err(anyhow!("--seconds must be positive"));
    }
    let tone = sine_tone(440.0, seconds, 44_100);
    let audio_base64 = encode_wav_base64(&tone)?;

    info!(url, seconds, "sending test tone");
    let client = reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(15 * 60))
        .build()?;
    let response: IsolateResponse = client
        .post(url)
        .json(&serde_json::json!({
            "audio_base64": audio_base64,
            "return_accompaniment": accompaniment,
        }))
        .send()?
        .error_for_status()?
        .json()?;

    match response {
        IsolateResponse::Success(ok) => {
            println!(
                "Result: success=true, duration={:.3}s, vocals={} bytes (base64), accompaniment={}",
                ok.duration_seconds,
                ok.vocals_base64.len(),
                ok.accompaniment_base64.map_or("absent".to_string(), |a| format!("{} bytes", a.len()))
            );
            Ok(())
        }
        IsolateResponse::Failure(err) => {
            println!("Result: success=false, error={}", err.error);
            Err(anyhow!("endpoint reported failure"))
        }
    }
}
