//! Command-line front end for the brand-voice stream aggregator.

mod file_source;
mod render;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context as _;
use brandvoice_stream::prelude::*;
use brandvoice_stream::init_observability;
use clap::{Args, Parser, Subcommand};
use tokio::io::{AsyncReadExt as _, AsyncWriteExt as _};
use tracing::info;

use crate::file_source::FileChunks;

#[derive(Parser, Debug)]
#[command(name = "brandvoice", about = "Preview streamed brand-voice content")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Aggregate a generation stream and print the final content
    Preview(PreviewArgs),
    /// Normalize markdown read from stdin
    Normalize,
}

#[derive(Args, Debug)]
struct PreviewArgs {
    /// Read the stream body from a file instead of an endpoint
    #[arg(long, conflicts_with = "url")]
    file: Option<PathBuf>,

    /// Generation endpoint (defaults to BRANDVOICE_GENERATE_URL)
    #[arg(long)]
    url: Option<String>,

    /// Prompt sent to the endpoint
    #[arg(long, default_value = "")]
    prompt: String,

    /// Brand voice id; with an endpoint this runs both preview variants
    #[arg(long)]
    brand_voice: Option<String>,

    /// Content type sent to the endpoint
    #[arg(long)]
    content_type: Option<String>,

    /// Override the flush delay in milliseconds
    #[arg(long)]
    flush_delay_ms: Option<u64>,

    /// Override the minimum growth in characters between throttled updates
    #[arg(long)]
    min_chars: Option<usize>,

    /// File mode: bytes per chunk
    #[arg(long, default_value_t = 64)]
    chunk_size: usize,

    /// File mode: pause between chunks in milliseconds
    #[arg(long, default_value_t = 0)]
    chunk_delay_ms: u64,

    /// Render the final content as HTML
    #[arg(long)]
    html: bool,
}

impl PreviewArgs {
    fn aggregator_config(&self) -> anyhow::Result<AggregatorConfig> {
        let mut config = AggregatorConfig::from_env()?;
        if let Some(ms) = self.flush_delay_ms {
            config = config.flush_delay(Duration::from_millis(ms));
        }
        if let Some(chars) = self.min_chars {
            config = config.min_growth(chars);
        }
        config.validate()?;
        Ok(config)
    }

    fn request(&self) -> GenerationRequest {
        let mut request = GenerationRequest::new(&self.prompt);
        if let Some(id) = &self.brand_voice {
            request = request.brand_voice(id);
        }
        if let Some(content_type) = &self.content_type {
            request = request.content_type(content_type);
        }
        request
    }

    fn client(&self) -> anyhow::Result<GenerationClient> {
        let config = match &self.url {
            Some(url) => GenerationClientConfig::new(url),
            None => GenerationClientConfig::from_env()?,
        };
        Ok(GenerationClient::new(config)?)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    init_observability();
    let cli = Cli::parse();

    match cli.command {
        Command::Preview(args) => {
            let output = preview(&args).await?;
            let mut stdout = tokio::io::stdout();
            stdout.write_all(output.as_bytes()).await?;
            stdout.write_all(b"\n").await?;
            stdout.flush().await?;
        }
        Command::Normalize => {
            let mut input = String::new();
            tokio::io::stdin()
                .read_to_string(&mut input)
                .await
                .context("failed to read stdin")?;
            println!("{}", normalize(&input));
        }
    }
    Ok(())
}

/// Runs a preview and returns what goes to stdout.
async fn preview(args: &PreviewArgs) -> anyhow::Result<String> {
    let config = args.aggregator_config()?;
    let finish = |content: &str| {
        if args.html {
            render::markdown_to_html(content)
        } else {
            content.to_string()
        }
    };

    if let Some(path) = &args.file {
        let source = FileChunks::open(path, args.chunk_size, Duration::from_millis(args.chunk_delay_ms))
            .await
            .with_context(|| format!("failed to open {}", path.display()))?;
        let out = StreamAggregator::new(config)
            .run(source.into_stream(), |content: &str| print_update(None, content))
            .await?;
        info!(emits = out.emits, "file preview finished");
        return Ok(finish(&out.content));
    }

    let client = args.client()?;
    let request = args.request();
    if request.brand_voice_id.is_none() {
        let source = client.open(&request).await?;
        let out = StreamAggregator::new(config)
            .run(source, |content: &str| print_update(None, content))
            .await?;
        return Ok(finish(&out.content));
    }

    let outcome = Preview::new(config)
        .run_request(&client, &request, |variant, content| {
            print_update(Some(variant), content)
        })
        .await?;
    Ok(format!(
        "## {}\n\n{}\n\n## {}\n\n{}",
        Variant::WithVoice,
        finish(&outcome.with_voice.content),
        Variant::WithoutVoice,
        finish(&outcome.without_voice.content),
    ))
}

fn print_update(variant: Option<Variant>, content: &str) {
    match variant {
        Some(variant) => eprintln!("--- {variant} ({} chars)\n{content}", content.chars().count()),
        None => eprintln!("--- update ({} chars)\n{content}", content.chars().count()),
    }
}
