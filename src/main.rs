use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use suburb_cards::{pipeline, Config};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

/// Build the suburb listing YAML from the ABS Census DataPack.
#[derive(Parser, Debug)]
#[command(name = "suburb_cards", version, about, long_about = None)]
struct Cli {
    /// YAML config file; unset fields use the DataPack defaults
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Where to write the cards
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Number of most populous regions to keep
    #[arg(short = 'n', long)]
    top_n: Option<usize>,

    /// Directory the archive is downloaded to and extracted in
    #[arg(short, long, value_name = "DIR")]
    work_dir: Option<PathBuf>,

    /// Reuse tables already extracted under the work dir
    #[arg(long, default_value_t = false)]
    skip_download: bool,
}

impl Cli {
    fn into_config(self) -> Result<Config> {
        let mut cfg = match &self.config {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };
        if let Some(output) = self.output {
            cfg.output = output;
        }
        if let Some(n) = self.top_n {
            cfg.top_n = n;
        }
        if let Some(dir) = self.work_dir {
            cfg.work_dir = dir;
        }
        if self.skip_download {
            cfg.skip_download = true;
        }
        Ok(cfg)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,suburb_cards=info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();

    std::panic::set_hook(Box::new(|info| {
        eprintln!("panic: {:?}", info);
    }));

    // ─── 2) resolve config ───────────────────────────────────────────
    let cfg = Cli::parse().into_config()?;
    info!(
        output = %cfg.output.display(),
        work_dir = %cfg.work_dir.display(),
        top_n = cfg.top_n,
        "startup"
    );

    // ─── 3) run ──────────────────────────────────────────────────────
    let cards = pipeline::run(&cfg).await?;
    info!(cards = cards.len(), "all done");
    Ok(())
}
