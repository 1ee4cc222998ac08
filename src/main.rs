use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::prelude::*;

use cairo_vision::config::Config;
use cairo_vision::studio::docx::preview;
use cairo_vision::studio::export::{self, ExportFormat};
use cairo_vision::studio::location::{FixedLocation, IpLocation, LocationProvider};
use cairo_vision::studio::types::Coordinates;
use cairo_vision::studio::{
    AspectRatio, Attachment, CredentialGate, DesignStyle, GeminiClient, GenerationConfig,
    GeneratedImage, History, ImagePart, KeyProvider, LineSource, PromptKeySelector, Studio,
    StudioError,
};

/// Generate images from a description, a reference image or a document.
#[derive(Parser, Debug)]
#[command(name = "cairo-vision", version)]
struct Cli {
    /// Config file (JSON). Missing file means defaults.
    #[arg(long, default_value = "cairo-vision.json")]
    config: PathBuf,

    /// What to draw. Not needed when an image or document is attached.
    #[arg(short, long, default_value = "")]
    prompt: String,

    /// Image (reference), .docx or .txt file. Repeatable; later files replace earlier ones of the same kind.
    #[arg(short, long = "attach")]
    attach: Vec<PathBuf>,

    #[arg(long, default_value = "3d")]
    style: DesignStyle,

    #[arg(long, default_value = "1:1")]
    ratio: AspectRatio,

    /// Use the high-quality image model.
    #[arg(long)]
    hq: bool,

    /// Number of images to generate (1-4).
    #[arg(short = 'n', long, default_value_t = 1, value_parser = clap::value_parser!(u8).range(1..=4))]
    variations: u8,

    /// Ground the prompt with places around your location.
    #[arg(long)]
    maps: bool,

    /// Override the location used with --maps.
    #[arg(long, requires = "longitude", allow_hyphen_values = true)]
    latitude: Option<f64>,

    #[arg(long, requires = "latitude", allow_hyphen_values = true)]
    longitude: Option<f64>,

    /// Format of the saved files.
    #[arg(long, default_value = "png")]
    format: ExportFormat,

    /// Keep a session open and read prompts from stdin.
    #[arg(short, long)]
    interactive: bool,
}

/// Attachments currently held by the session.
#[derive(Default)]
struct Attached {
    image: Option<ImagePart>,
    document: Option<(String, String)>,
}

impl Attached {
    async fn add(&mut self, path: &std::path::Path) -> anyhow::Result<()> {
        match Attachment::load(path).await? {
            Attachment::Image(part) => self.image = Some(part),
            Attachment::Document { name, text } => {
                println!("📄 {name}: {}", preview(&text, 200));
                self.document = Some((name, text));
            }
        }
        Ok(())
    }

    fn document_text(&self) -> Option<&str> {
        self.document.as_ref().map(|(_, text)| text.as_str())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load_or_default(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    // Setup logging
    let log_dir = config.data_dir.join("logs");
    std::fs::create_dir_all(&log_dir).ok();
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("cairo-vision.log"))
        .context("failed to open log file")?;
    let (non_blocking, _guard) = tracing_appender::non_blocking(log_file);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::WARN.into()),
                ),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        )
        .init();

    info!("🚀 Starting cairo-vision...");
    info!("Loaded config from {}", cli.config.display());

    // One reader for the whole session: prompts, commands and key entry.
    let input = Arc::new(LineSource::stdin());
    let studio = build_studio(&config, &cli, input.clone())?;
    if !studio.gate().check_availability().await {
        println!("🔒 No API key found. Enter one to activate the service.");
        studio.gate().request_credential().await;
    }

    let mut attached = Attached::default();
    for path in &cli.attach {
        attached.add(path).await?;
    }

    let snapshot = GenerationConfig {
        prompt: cli.prompt.clone(),
        style: cli.style,
        ratio: cli.ratio,
        high_quality: cli.hq,
        variations: cli.variations,
        use_maps: cli.maps,
    };

    if cli.interactive {
        return interactive(&studio, &input, &config, &cli, snapshot, attached).await;
    }

    let batch = generate(&studio, &snapshot, &attached).await?;
    save_batch(&batch, &config, cli.format).await
}

fn build_studio(config: &Config, cli: &Cli, input: Arc<LineSource>) -> anyhow::Result<Studio> {
    let selector: Arc<dyn KeyProvider> = Arc::new(PromptKeySelector::new(input));
    let gate = CredentialGate::new(config.raw_api_key().as_deref(), Some(selector));
    let api = GeminiClient::new(config.base_url.clone(), config.request_timeout)
        .context("failed to build HTTP client")?;

    let fixed = match (cli.latitude, cli.longitude) {
        (Some(latitude), Some(longitude)) => Some(Coordinates { latitude, longitude }),
        _ => config.location,
    };
    let location: Option<Arc<dyn LocationProvider>> = match (fixed, &config.location_endpoint) {
        (Some(coords), _) => Some(Arc::new(FixedLocation(coords))),
        (None, Some(endpoint)) => Some(Arc::new(
            IpLocation::new(endpoint.clone(), config.request_timeout)
                .context("failed to build location client")?,
        )),
        (None, None) => None,
    };

    Ok(Studio::new(
        gate,
        Arc::new(api),
        location,
        config.models.clone(),
        History::new(config.history_capacity),
    ))
}

async fn generate(
    studio: &Studio,
    snapshot: &GenerationConfig,
    attached: &Attached,
) -> Result<Vec<GeneratedImage>, StudioError> {
    println!("⏳ Analyzing and designing...");
    let result = studio
        .run_generation(snapshot, attached.image.as_ref(), attached.document_text())
        .await;

    match &result {
        Ok(_) => {
            if let Some(place) = studio.place_context().await {
                println!("📍 {}", place.text);
                for link in &place.links {
                    println!("   {} <{}>", link.title, link.uri);
                }
            }
        }
        Err(e) => {
            if e.is_auth() {
                eprintln!("🔒 Activate a key (:key in interactive mode) and try again.");
            }
        }
    }
    result
}

async fn save_batch(batch: &[GeneratedImage], config: &Config, format: ExportFormat) -> anyhow::Result<()> {
    let saved = export::save_batch(batch, &config.output_dir, format).await?;
    for (path, image) in saved.files.iter().zip(batch) {
        println!("🖼️  {} [{} · {}] \"{}\"", path.display(), image.style, image.ratio, image.prompt);
    }
    println!("🧾 {}", saved.manifest.display());
    Ok(())
}

const USAGE: &str = "Commands: :attach <path>, :detach, :history, :clear, :key, :quit";

/// One line of interactive input.
#[derive(Debug, PartialEq, Eq)]
enum SessionCommand<'a> {
    Quit,
    Key,
    Clear,
    History,
    Detach,
    Attach(&'a str),
    /// `:`-prefixed input that is not a command, including `:attach` without a path.
    Unknown(&'a str),
    Prompt(&'a str),
}

impl<'a> SessionCommand<'a> {
    fn parse(line: &'a str) -> Self {
        let line = line.trim();
        match line.split_once(' ').map_or((line, ""), |(cmd, arg)| (cmd, arg.trim())) {
            (":quit" | ":q", _) => Self::Quit,
            (":key", _) => Self::Key,
            (":clear", _) => Self::Clear,
            (":history", _) => Self::History,
            (":detach", _) => Self::Detach,
            (":attach", path) if !path.is_empty() => Self::Attach(path),
            (cmd, _) if cmd.starts_with(':') => Self::Unknown(line),
            _ => Self::Prompt(line),
        }
    }
}

async fn interactive(
    studio: &Studio,
    input: &LineSource,
    config: &Config,
    cli: &Cli,
    mut snapshot: GenerationConfig,
    mut attached: Attached,
) -> anyhow::Result<()> {
    println!("Type a description and press enter. {USAGE}");

    while let Some(line) = input.next_line().await? {
        match SessionCommand::parse(&line) {
            SessionCommand::Quit => break,
            SessionCommand::Key => studio.gate().request_credential().await,
            SessionCommand::Clear => {
                studio.clear_history().await;
                println!("History cleared");
            }
            SessionCommand::History => {
                let history = studio.history().await;
                println!("{} design(s)", history.len());
                for image in &history {
                    println!("  {} {} [{}] \"{}\"", image.timestamp.format("%H:%M:%S"), image.id, image.style, image.prompt);
                }
            }
            SessionCommand::Detach => {
                attached = Attached::default();
                println!("Attachments removed");
            }
            SessionCommand::Attach(path) => {
                if let Err(e) = attached.add(std::path::Path::new(path)).await {
                    eprintln!("❌ {e:#}");
                }
            }
            SessionCommand::Unknown(cmd) => println!("Unknown command '{cmd}'. {USAGE}"),
            SessionCommand::Prompt(prompt) => {
                snapshot.prompt = prompt.to_string();
                match generate(studio, &snapshot, &attached).await {
                    Ok(batch) => {
                        if let Err(e) = save_batch(&batch, config, cli.format).await {
                            warn!("Failed to save batch: {e:#}");
                            eprintln!("❌ {e:#}");
                        }
                    }
                    Err(e) => eprintln!("❌ {e}"),
                }
            }
        }
    }
    Ok(())
}
