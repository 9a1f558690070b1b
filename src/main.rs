use clap::{Parser, Subcommand};
use futures_util::StreamExt;
use pixelpipe::config::{self, ServiceConfig};
use pixelpipe::error::ServiceError;
use pixelpipe::fetch::HttpFetcher;
use pixelpipe::imaging::RustEngine;
use pixelpipe::pipeline::ProcessOutcome;
use pixelpipe::service::ImageService;
use pixelpipe::source::{RemoteSource, SourceDescriptor};
use pixelpipe::steps::parse_steps;
use pixelpipe::{gateway, output};
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pixelpipe")]
#[command(about = "Image metadata, statistics and transformation pipelines")]
#[command(long_about = "\
Image metadata, statistics and transformation pipelines

Sources are a file path, an http(s):// URL, or '-' for stdin.

Steps are a JSON array. Each entry is an operation name or an array of the
name followed by its arguments:

  pixelpipe process photo.jpg --steps '[[\"resize\", 200], \"greyscale\", [\"webp\"]]' -o out.webp
  pixelpipe process photo.jpg --steps '[[\"rotate\", 90], [\"toFile\", \"/tmp/r.png\"]]'

Run 'pixelpipe gen-config' to generate a documented config.toml.")]
#[command(version)]
struct Cli {
    /// Config file (defaults apply when omitted)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

/// Shared flags for commands that inspect an image.
#[derive(clap::Args, Clone)]
struct InspectArgs {
    /// Path, http(s):// URL, or '-' for stdin
    source: String,
    /// Print JSON instead of the text summary
    #[arg(long)]
    json: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP gateway
    Serve {
        /// Listen address (overrides server.bind)
        #[arg(long)]
        bind: Option<String>,
    },
    /// Print image header metadata
    Metadata(InspectArgs),
    /// Print per-channel pixel statistics
    Stats(InspectArgs),
    /// Run a step pipeline over an image
    Process {
        /// Path, http(s):// URL, or '-' for stdin
        source: String,
        /// JSON array of steps
        #[arg(long)]
        steps: String,
        /// Write streamed output here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print a stock config.toml with all options documented
    GenConfig,
}

/// Install the stderr log subscriber. `RUST_LOG` wins over the config filter.
fn init_tracing(config: &ServiceConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .ok();
}

fn source_from_arg(arg: &str) -> SourceDescriptor {
    if arg == "-" {
        SourceDescriptor::Stream(Box::pin(ReaderStream::new(tokio::io::stdin())))
    } else if arg.starts_with("http://") || arg.starts_with("https://") {
        SourceDescriptor::Remote(RemoteSource {
            url: arg.to_string(),
            options: Map::new(),
        })
    } else {
        SourceDescriptor::Path(PathBuf::from(arg))
    }
}

fn label(arg: &str) -> &str {
    if arg == "-" { "<stdin>" } else { arg }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = config::load_config(cli.config.as_deref())?;
    init_tracing(&config);
    let fetcher = HttpFetcher::new(&config.fetch)?;
    let service = ImageService::new(RustEngine::new(), fetcher);

    match cli.command {
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
        Command::Serve { bind } => {
            let bind = bind.unwrap_or_else(|| config.server.bind.clone());
            let listener = tokio::net::TcpListener::bind(&bind).await?;
            gateway::serve(listener, Arc::new(service)).await?;
        }
        Command::Metadata(args) => {
            let meta = service.metadata(source_from_arg(&args.source)).await?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&meta)?);
            } else {
                output::print_metadata(label(&args.source), &meta);
            }
        }
        Command::Stats(args) => {
            let stats = service.stats(source_from_arg(&args.source)).await?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                output::print_stats(label(&args.source), &stats);
            }
        }
        Command::Process {
            source,
            steps,
            output: target,
        } => {
            let entries: Vec<Value> = serde_json::from_str(&steps)?;
            let steps = parse_steps(&entries)?;
            match service.process(source_from_arg(&source), &steps).await? {
                ProcessOutcome::File(info) => output::print_output_info(label(&source), &info),
                ProcessOutcome::Stream(mut processed) => {
                    // no output file for an encode that fails outright
                    let first = match processed.stream.next().await {
                        Some(chunk) => Some(chunk.map_err(ServiceError::from_stream_error)?),
                        None => None,
                    };
                    let mut sink: Box<dyn tokio::io::AsyncWrite + Unpin> = match &target {
                        Some(path) => Box::new(tokio::fs::File::create(path).await?),
                        None => Box::new(tokio::io::stdout()),
                    };
                    if let Some(chunk) = first {
                        sink.write_all(&chunk).await?;
                    }
                    while let Some(chunk) = processed.stream.next().await {
                        sink.write_all(&chunk?).await?;
                    }
                    sink.flush().await?;
                }
            }
        }
    }

    Ok(())
}
