use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use pipeline_core::{EmbedParams, ProcessPdfsParams, StartParams, SummarizeParams};

#[derive(Debug, Parser)]
#[command(name = "pipeline")]
#[command(about = "Start, follow and stop pipeline jobs on the worker", long_about = None)]
pub struct Cli {
    /// RON settings file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Worker base URL, overrides the settings file
    #[arg(long, env = "PIPELINE_API_BASE", global = true)]
    pub api_base: Option<String>,

    /// Log poll traffic
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start a stage and follow it until it finishes
    Run {
        #[command(subcommand)]
        stage: StageCommand,
    },
    /// Print the aggregate pipeline counters
    Stats,
    /// Remove duplicate attachments
    Dedupe,
}

#[derive(Debug, Subcommand)]
pub enum StageCommand {
    /// Extract and chunk PDFs
    Pdf(PdfArgs),
    /// Embed chunks into the vector store
    Embed(EmbedArgs),
    /// Summarize papers
    Summarize(SummarizeArgs),
}

#[derive(Debug, Args)]
pub struct PdfArgs {
    #[arg(long, default_value_t = 1200)]
    pub chunk_size: u32,
    #[arg(long, default_value_t = 200)]
    pub overlap: u32,
    #[arg(long)]
    pub limit: Option<u64>,
    /// Reprocess PDFs that already have chunks
    #[arg(long)]
    pub no_skip_existing: bool,
}

#[derive(Debug, Args)]
pub struct EmbedArgs {
    #[arg(long)]
    pub limit_chunks: Option<u64>,
    #[arg(long)]
    pub collection: Option<String>,
    #[arg(long)]
    pub persist_dir: Option<String>,
    #[arg(long, default_value_t = 16)]
    pub batch_size: u32,
    #[arg(long)]
    pub embed_base_url: Option<String>,
    #[arg(long)]
    pub embed_model: Option<String>,
    #[arg(long, env = "PIPELINE_EMBED_API_KEY", hide_env_values = true)]
    pub embed_api_key: Option<String>,
    /// Re-embed chunks that are already in the store
    #[arg(long)]
    pub no_skip_existing: bool,
}

#[derive(Debug, Args)]
pub struct SummarizeArgs {
    #[arg(long)]
    pub limit: Option<u64>,
    #[arg(long, default_value_t = 4000)]
    pub chunk_chars: u32,
    /// Summarize papers that already have a summary
    #[arg(long)]
    pub no_skip_existing: bool,
    /// Run without writing summaries
    #[arg(long)]
    pub dry_run: bool,
}

impl StageCommand {
    pub fn into_params(self) -> StartParams {
        match self {
            StageCommand::Pdf(args) => StartParams::PdfProcessing(ProcessPdfsParams {
                chunk_size: args.chunk_size,
                overlap: args.overlap,
                limit: args.limit,
                skip_existing: !args.no_skip_existing,
            }),
            StageCommand::Embed(args) => StartParams::Embedding(EmbedParams {
                limit_chunks: args.limit_chunks,
                collection: args.collection,
                persist_dir: args.persist_dir,
                batch_size: args.batch_size,
                embed_base_url: args.embed_base_url,
                embed_model: args.embed_model,
                embed_api_key: args.embed_api_key,
                skip_existing: !args.no_skip_existing,
            }),
            StageCommand::Summarize(args) => StartParams::Summarization(SummarizeParams {
                limit: args.limit,
                chunk_chars: args.chunk_chars,
                skip_existing: !args.no_skip_existing,
                dry_run: args.dry_run,
            }),
        }
    }
}
