use std::io::Cursor;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, info_span, warn};
use uncouch_couch::{db_name_from_path, extract, ExtractOptions};

use crate::config::ExtractConfig;
use crate::error::{JobError, JobResult};
use crate::locks::LockRegistry;
use crate::report::JobReport;
use crate::source::{ArchiveEntry, InputSource};
use crate::writer::OutputWriter;

/// All NDJSON lines of one fully decoded file.
#[derive(Debug)]
struct Batch {
    path: PathBuf,
    db: String,
    data: Vec<u8>,
    documents: u64,
}

type SharedReceiver<T> = Arc<tokio::sync::Mutex<mpsc::Receiver<T>>>;
type SharedReport = Arc<Mutex<JobReport>>;

/// Extraction of many databases with a decode pool feeding a writer pool.
///
/// Each worker takes one file from the input queue and decodes it
/// completely before handing its lines to a writer. A file that fails to
/// decode is recorded in the report and produces no output; the other
/// files carry on.
pub struct ExtractJob {
    config: ExtractConfig,
}

impl ExtractJob {
    pub fn new(config: ExtractConfig) -> JobResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ExtractConfig {
        &self.config
    }

    /// Drain `source` and return the tally. Per-file failures are in the
    /// report; use [`JobReport::into_result`] to turn them into an error.
    pub async fn run(&self, source: Arc<dyn InputSource>) -> JobResult<JobReport> {
        let depth = self.config.queue_depth;
        let (file_tx, file_rx) = mpsc::channel::<ArchiveEntry>(depth);
        let (batch_tx, batch_rx) = mpsc::channel::<Batch>(depth);
        let file_rx: SharedReceiver<ArchiveEntry> = Arc::new(tokio::sync::Mutex::new(file_rx));
        let batch_rx: SharedReceiver<Batch> = Arc::new(tokio::sync::Mutex::new(batch_rx));
        let report: SharedReport = Arc::new(Mutex::new(JobReport::default()));

        info!(
            workers = self.config.workers,
            writers = self.config.writers,
            output_dir = %self.config.output_dir.display(),
            "starting extraction"
        );

        let producer = tokio::task::spawn_blocking(move || source.produce(file_tx));

        let workers: Vec<JoinHandle<()>> = (0..self.config.workers)
            .map(|_| {
                let rx = Arc::clone(&file_rx);
                let tx = batch_tx.clone();
                let report = Arc::clone(&report);
                let include_deleted = self.config.include_deleted;
                tokio::task::spawn_blocking(move || decode_loop(rx, tx, report, include_deleted))
            })
            .collect();
        // Writers stop once every worker's sender is gone.
        drop(batch_tx);

        let output = OutputWriter::new(
            self.config.output_dir.clone(),
            self.config.compress_output,
            self.config.max_output_bytes,
            Arc::new(LockRegistry::new()),
        );
        let writers: Vec<JoinHandle<()>> = (0..self.config.writers)
            .map(|_| {
                let rx = Arc::clone(&batch_rx);
                let report = Arc::clone(&report);
                let output = output.clone();
                tokio::task::spawn_blocking(move || write_loop(rx, output, report))
            })
            .collect();

        let summary = producer
            .await
            .map_err(|e| JobError::WorkerPanicked(e.to_string()))?;
        for handle in workers.into_iter().chain(writers) {
            handle
                .await
                .map_err(|e| JobError::WorkerPanicked(e.to_string()))?;
        }

        let mut report = std::mem::take(&mut *report.lock().expect("report poisoned"));
        report.source = summary;
        info!(
            processed = report.processed,
            succeeded = report.succeeded,
            failed = report.failed,
            documents = report.documents,
            "extraction finished"
        );
        Ok(report)
    }
}

fn decode_loop(
    rx: SharedReceiver<ArchiveEntry>,
    tx: mpsc::Sender<Batch>,
    report: SharedReport,
    include_deleted: bool,
) {
    loop {
        let entry = rx.blocking_lock().blocking_recv();
        let Some(entry) = entry else {
            break;
        };
        report.lock().expect("report poisoned").processed += 1;

        let span = info_span!("file", path = %entry.path.display());
        let _entered = span.enter();
        match decode_entry(&entry, include_deleted) {
            Ok(batch) => {
                info!(documents = batch.documents, "file decoded");
                if tx.blocking_send(batch).is_err() {
                    warn!("writers are gone");
                    break;
                }
            }
            Err(e) => {
                warn!(error = %e, "file failed");
                report
                    .lock()
                    .expect("report poisoned")
                    .record_failure(entry.path, e.to_string());
            }
        }
    }
}

fn decode_entry(entry: &ArchiveEntry, include_deleted: bool) -> JobResult<Batch> {
    let db = db_name_from_path(&entry.path);
    let mut options = ExtractOptions::new(db.clone());
    options.include_deleted = include_deleted;

    let mut data = Vec::new();
    let mut documents = 0;
    for doc in extract(Cursor::new(entry.bytes.as_slice()), entry.size, options)? {
        data.extend_from_slice(doc?.to_json_line()?.as_bytes());
        data.push(b'\n');
        documents += 1;
    }
    Ok(Batch {
        path: entry.path.clone(),
        db,
        data,
        documents,
    })
}

fn write_loop(rx: SharedReceiver<Batch>, output: OutputWriter, report: SharedReport) {
    loop {
        let batch = rx.blocking_lock().blocking_recv();
        let Some(batch) = batch else {
            break;
        };
        if batch.data.is_empty() {
            report.lock().expect("report poisoned").record_success(0, None);
            continue;
        }
        let written = output.write_batch(&batch.db, &batch.data);
        let mut tally = report.lock().expect("report poisoned");
        match written {
            Ok(path) => tally.record_success(batch.documents, Some(path)),
            Err(e) => {
                warn!(path = %batch.path.display(), error = %e, "write failed");
                tally.record_failure(batch.path, e.to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{DirectorySource, FileListSource, TarSource};
    use crate::store::LocalStore;
    use flate2::read::MultiGzDecoder;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::{Read, Write};
    use std::path::Path;
    use uncouch_testkit::{empty_db, single_leaf_db, Value};

    fn config(output_dir: &Path) -> ExtractConfig {
        ExtractConfig {
            workers: 2,
            writers: 2,
            queue_depth: 2,
            output_dir: output_dir.to_path_buf(),
            ..Default::default()
        }
    }

    fn doc(n: i64) -> Value {
        Value::object(vec![("n", Value::int(n))])
    }

    fn lines(path: &Path) -> Vec<serde_json::Value> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn failures_do_not_stop_other_files() {
        let input = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        std::fs::write(
            input.path().join("good.couch"),
            single_leaf_db(&[("a", doc(1)), ("b", doc(2))]),
        )
        .unwrap();
        std::fs::write(input.path().join("bad.couch"), vec![7u8; 8192]).unwrap();
        let mut gz = GzEncoder::new(Vec::new(), Compression::default());
        gz.write_all(&single_leaf_db(&[("z", doc(3))])).unwrap();
        std::fs::write(input.path().join("other.couch.gz"), gz.finish().unwrap()).unwrap();

        let job = ExtractJob::new(config(out.path())).unwrap();
        let source = Arc::new(DirectorySource::new(input.path(), Arc::new(LocalStore)));
        let report = job.run(source).await.unwrap();

        assert!(report.source.success);
        assert_eq!(report.source.total_files, 3);
        assert_eq!((report.processed, report.succeeded, report.failed), (3, 2, 1));
        assert_eq!(report.documents, 3);
        assert!(report.failures[0].path.ends_with("bad.couch"));
        assert_eq!(
            report.outputs,
            vec![out.path().join("good_00.json"), out.path().join("other_00.json")]
        );

        let good = lines(&out.path().join("good_00.json"));
        assert_eq!(good.len(), 2);
        assert_eq!(good[0]["_id"], "a");
        assert_eq!(good[0]["_db"], "good");
        assert_eq!(good[1]["doc"]["n"], 2);
        assert_eq!(lines(&out.path().join("other_00.json"))[0]["_db"], "other");

        match report.into_result() {
            Err(JobError::FilesFailed { failed: 1, total: 3, .. }) => {}
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn shards_of_one_database_share_its_outputs() {
        let input = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let first = input.path().join("users.1.couch");
        let second = input.path().join("users.2.couch");
        std::fs::write(&first, single_leaf_db(&[("u1", doc(1))])).unwrap();
        std::fs::write(&second, single_leaf_db(&[("u2", doc(2))])).unwrap();

        let mut cfg = config(out.path());
        // Small enough that the second shard rotates.
        cfg.max_output_bytes = 40;
        let job = ExtractJob::new(cfg).unwrap();
        let source = Arc::new(FileListSource::new(vec![first, second], Arc::new(LocalStore)));
        let report = job.run(source).await.unwrap().into_result().unwrap();

        assert_eq!(report.documents, 2);
        assert_eq!(
            report.outputs,
            vec![out.path().join("users_00.json"), out.path().join("users_01.json")]
        );
        for path in &report.outputs {
            assert_eq!(lines(path).len(), 1);
        }
    }

    #[tokio::test]
    async fn compressed_output_and_empty_databases() {
        let input = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        std::fs::write(input.path().join("docs.couch"), single_leaf_db(&[("d", doc(9))])).unwrap();
        std::fs::write(input.path().join("blank.couch"), empty_db()).unwrap();

        let mut cfg = config(out.path());
        cfg.compress_output = true;
        let job = ExtractJob::new(cfg).unwrap();
        let source = Arc::new(DirectorySource::new(input.path(), Arc::new(LocalStore)));
        let report = job.run(source).await.unwrap().into_result().unwrap();

        assert_eq!(report.succeeded, 2);
        assert_eq!(report.outputs, vec![out.path().join("docs_00.json.gz")]);
        let mut text = String::new();
        MultiGzDecoder::new(std::fs::File::open(&report.outputs[0]).unwrap())
            .read_to_string(&mut text)
            .unwrap();
        assert_eq!(text, "{\"_id\":\"d\",\"_db\":\"docs\",\"doc\":{\"n\":9}}\n");
    }

    #[tokio::test]
    async fn databases_from_a_tar_bundle() {
        let input = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let mut builder = tar::Builder::new(Vec::new());
        for (name, image) in [
            ("shards/00-7f/users.1510000000.couch", single_leaf_db(&[("u", doc(1))])),
            ("shards/00-7f/_users.couch", single_leaf_db(&[("skip", doc(2))])),
            ("orders.couch", single_leaf_db(&[("o1", doc(3)), ("o2", doc(4))])),
        ] {
            let mut header = tar::Header::new_gnu();
            header.set_size(image.len() as u64);
            header.set_mode(0o644);
            builder.append_data(&mut header, name, image.as_slice()).unwrap();
        }
        let bundle = input.path().join("couch.tar");
        std::fs::write(&bundle, builder.into_inner().unwrap()).unwrap();

        let job = ExtractJob::new(config(out.path())).unwrap();
        let source = Arc::new(TarSource::new(&bundle, Arc::new(LocalStore)));
        let report = job.run(source).await.unwrap().into_result().unwrap();

        assert_eq!(report.source.total_files, 2);
        assert_eq!(report.documents, 3);
        assert_eq!(
            report.outputs,
            vec![out.path().join("orders_00.json"), out.path().join("users_00.json")]
        );
        assert_eq!(lines(&out.path().join("users_00.json"))[0]["_id"], "u");
    }

    #[test]
    fn invalid_config_is_rejected() {
        let cfg = ExtractConfig {
            writers: 0,
            ..Default::default()
        };
        assert!(matches!(ExtractJob::new(cfg), Err(JobError::Config(_))));
    }
}
