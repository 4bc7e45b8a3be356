use std::fs::File;
use std::io::{BufReader, BufWriter, Cursor, Read, Seek, Write};
use std::path::Path;
use std::sync::Arc;

use colored::Colorize;
use flate2::read::MultiGzDecoder;
use uncouch_couch::{db_name_from_path, CouchFile, ExtractOptions, NodeKind, TreeKind};
use uncouch_job::{
    is_tar_path, ByteStore, DirectorySource, ExtractConfig, ExtractJob, FileListSource, InputSource,
    JobReport, LocalStore, TarSource,
};

use crate::cli::*;

trait ReadSeek: Read + Seek {}

impl<T: Read + Seek> ReadSeek for T {}

type Input = CouchFile<Box<dyn ReadSeek>>;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Data(args) => cmd_data(args),
        Command::Header(args) => cmd_header(args),
        Command::Explore(args) => cmd_explore(args),
        Command::Headers(args) => cmd_headers(args),
        Command::Extract(args) => cmd_extract(args),
    }
}

/// Open a database file, inflating `.gz` into memory.
fn open_input(path: &Path) -> anyhow::Result<Input> {
    let file = File::open(path)?;
    let is_gz = path.extension().is_some_and(|ext| ext == "gz");
    if is_gz {
        let mut bytes = Vec::new();
        MultiGzDecoder::new(BufReader::new(file)).read_to_end(&mut bytes)?;
        let size = bytes.len() as u64;
        let input: Box<dyn ReadSeek> = Box::new(Cursor::new(bytes));
        return Ok(CouchFile::open(input, size)?);
    }
    let size = file.metadata()?.len();
    let input: Box<dyn ReadSeek> = Box::new(BufReader::new(file));
    Ok(CouchFile::open(input, size)?)
}

fn write_documents<R: Read + Seek>(
    file: CouchFile<R>,
    db: &str,
    out: &mut impl Write,
) -> anyhow::Result<u64> {
    let mut count = 0;
    for doc in file.into_documents(ExtractOptions::new(db)) {
        writeln!(out, "{}", doc?.to_json_line()?)?;
        count += 1;
    }
    Ok(count)
}

fn cmd_data(args: FileArgs) -> anyhow::Result<()> {
    let file = open_input(&args.file)?;
    let stdout = std::io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let count = write_documents(file, &db_name_from_path(&args.file), &mut out)?;
    out.flush()?;
    tracing::info!(documents = count, "done");
    Ok(())
}

fn header_json<R: Read + Seek>(file: &CouchFile<R>) -> serde_json::Value {
    serde_json::json!({
        "offset": file.header_offset(),
        "file_size": file.size(),
        "header": file.header(),
    })
}

fn cmd_header(args: FileArgs) -> anyhow::Result<()> {
    let file = open_input(&args.file)?;
    println!("{}", serde_json::to_string_pretty(&header_json(&file))?);
    Ok(())
}

fn cmd_explore(args: FileArgs) -> anyhow::Result<()> {
    let mut file = open_input(&args.file)?;
    println!("{}", serde_json::to_string_pretty(&header_json(&file))?);
    match file.root(TreeKind::BySeq) {
        Some(root) => {
            println!("\n{} {}", "by-sequence root at".bold(), root.to_string().yellow());
            print!("{}", file.read_node_tree(root)?);
        }
        None => println!("\n{}", "by-sequence tree is empty".dimmed()),
    }
    Ok(())
}

/// `{id|seq}-{kp|kv}-<offset>.bin`
fn node_file_name(tree: TreeKind, kind: NodeKind, offset: u64) -> String {
    format!("{tree}-{kind}-{offset}.bin")
}

fn dump_nodes(file: &mut Input, dir: &Path, store: &dyn ByteStore) -> anyhow::Result<usize> {
    let mut written = 0;
    for tree in [TreeKind::ById, TreeKind::BySeq] {
        let mut nodes = Vec::new();
        file.visit_nodes(tree, |visit| {
            let name = node_file_name(visit.tree, visit.kind, visit.offset);
            nodes.push((name, visit.payload.to_vec()));
            Ok(())
        })?;
        for (name, payload) in nodes {
            store.put(&payload, &dir.join(name).to_string_lossy())?;
            written += 1;
        }
    }
    Ok(written)
}

fn cmd_headers(args: HeadersArgs) -> anyhow::Result<()> {
    let mut file = open_input(&args.file)?;
    let written = dump_nodes(&mut file, &args.dir, &LocalStore)?;
    println!(
        "{} Wrote {} nodes to {}",
        "✓".green().bold(),
        written,
        args.dir.display().to_string().bold()
    );
    Ok(())
}

fn extract_config(args: &ExtractArgs) -> anyhow::Result<ExtractConfig> {
    let mut config = match &args.config {
        Some(path) => ExtractConfig::load(path)?,
        None => ExtractConfig::default(),
    };
    config.output_dir = args.output_dir.clone();
    if let Some(workers) = args.workers {
        config.workers = workers;
    }
    if let Some(writers) = args.writers {
        config.writers = writers;
    }
    if let Some(max) = args.max_output_bytes {
        config.max_output_bytes = max;
    }
    if args.compress {
        config.compress_output = true;
    }
    if args.skip_deleted {
        config.include_deleted = false;
    }
    Ok(config)
}

fn print_report(report: &JobReport) {
    let mark = if report.is_success() { "✓".green().bold() } else { "✗".red().bold() };
    println!(
        "{} Processed {} files: {} succeeded, {} failed, {} documents",
        mark,
        report.processed.to_string().bold(),
        report.succeeded.to_string().green(),
        report.failed.to_string().red(),
        report.documents.to_string().bold(),
    );
    for output in &report.outputs {
        println!("  {} {}", "wrote".green(), output.display());
    }
    for failure in &report.failures {
        println!("  {} {}", "failed".red(), failure);
    }
    if let Some(error) = &report.source.error {
        println!("  {} {}", "input:".red(), error);
    }
}

fn cmd_extract(args: ExtractArgs) -> anyhow::Result<()> {
    let config = extract_config(&args)?;
    let store: Arc<dyn ByteStore> = Arc::new(LocalStore);
    let source: Arc<dyn InputSource> = if args.input.is_dir() {
        Arc::new(DirectorySource::new(args.input.clone(), store))
    } else if is_tar_path(&args.input) {
        Arc::new(TarSource::new(args.input.clone(), store))
    } else {
        Arc::new(FileListSource::new(vec![args.input.clone()], store))
    };
    let job = ExtractJob::new(config)?;
    let runtime = tokio::runtime::Runtime::new()?;
    let report = runtime.block_on(job.run(source))?;
    print_report(&report);
    report.into_result()?;
    Ok(())
}
