use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tally_core::Issuer;
use tally_extract::{Extraction, Extractor, SourceFile};
use tally_ingest::{ParseContext, ParseRequest};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod render;
mod state;

#[derive(Parser, Debug)]
#[command(name = "tally", version, about = "Bank statement extraction from OCR text")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Parse already-recognized statement text (no OCR)
    Parse {
        text_file: PathBuf,

        /// Skip bank detection (hsbc, bdo, bpi, metrobank, landbank, security-bank, citibank)
        #[arg(long)]
        bank: Option<Issuer>,

        /// Year for rows that print only day and month
        #[arg(long)]
        year: Option<i32>,

        #[arg(long)]
        json: bool,
    },

    /// OCR a statement image or PDF and extract its transactions
    Extract {
        file: PathBuf,

        #[arg(long)]
        bank: Option<Issuer>,

        /// Run only the standard OCR pass
        #[arg(long)]
        no_recovery: bool,

        #[arg(long)]
        json: bool,
    },

    /// Show the categorization rules in effect
    Rules,

    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Write a default ~/.tally/config.toml
    Init,
    /// Print the effective configuration
    Show,
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "tally=info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Parse {
            text_file,
            bank,
            year,
            json,
        } => {
            let text = std::fs::read_to_string(&text_file)
                .with_context(|| format!("read {}", text_file.display()))?;
            let extractor = Extractor::from_config(config::load_config()?)?;

            let mut ctx = ParseContext::default();
            ctx.statement_year = year;
            if let Some(name) = text_file.file_name() {
                ctx = ctx.with_source(name.to_string_lossy());
            }
            let mut request = ParseRequest::new(ctx);
            request.bank_override = bank;

            let extraction = extractor.extract_text_with(&text, &request);
            emit(&extraction, json)?;
        }

        Command::Extract {
            file,
            bank,
            no_recovery,
            json,
        } => {
            let source = SourceFile::from_path(&file).await?;
            let extractor = Extractor::from_config(config::load_config()?)?;
            let extraction = extractor.extract(&source, bank, !no_recovery).await;
            if json {
                emit(&extraction, true)?;
            }
            if let Some(err) = &extraction.error {
                bail!("{err}");
            }
            if !json {
                emit(&extraction, false)?;
            }
        }

        Command::Rules => {
            let cfg = config::load_config()?;
            let rules = tally_finance::load_rules(&cfg.rules.source());
            println!("{}", serde_json::to_string_pretty(&rules.status())?);
        }

        Command::Config { command } => match command {
            ConfigCommand::Init => config::init_config()?,
            ConfigCommand::Show => config::show_config()?,
        },
    }

    Ok(())
}

fn emit(extraction: &Extraction, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(extraction)?);
    } else {
        print!("{}", render::render(extraction));
    }
    Ok(())
}
