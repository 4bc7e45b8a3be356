use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "uncouch",
    about = "Read CouchDB database files without CouchDB",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Print every document of a database as NDJSON
    Data(FileArgs),
    /// Show the newest database header
    Header(FileArgs),
    /// Show the header and the term tree of the by-sequence root
    Explore(FileArgs),
    /// Dump every B-tree node payload into a directory
    Headers(HeadersArgs),
    /// Extract databases from a file, bundle or directory into rotating NDJSON outputs
    Extract(ExtractArgs),
}

#[derive(Args)]
pub struct FileArgs {
    /// A `.couch` or `.couch.gz` file
    pub file: PathBuf,
}

#[derive(Args)]
pub struct HeadersArgs {
    pub file: PathBuf,
    pub dir: PathBuf,
}

#[derive(Args)]
pub struct ExtractArgs {
    /// A database file, a `.tar`/`.tar.gz` bundle or a directory searched
    /// recursively
    pub input: PathBuf,
    pub output_dir: PathBuf,
    /// TOML job configuration; flags override it
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    #[arg(short, long)]
    pub workers: Option<usize>,
    #[arg(long)]
    pub writers: Option<usize>,
    /// Write gzip outputs
    #[arg(long)]
    pub compress: bool,
    #[arg(long)]
    pub max_output_bytes: Option<u64>,
    /// Leave deleted documents out of the output
    #[arg(long)]
    pub skip_deleted: bool,
}
