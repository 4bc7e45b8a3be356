use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use flate2::write::GzEncoder;
use flate2::Compression;
use tracing::{debug, info};

use crate::error::JobResult;
use crate::locks::LockRegistry;
use crate::naming::{highest_index, output_file_name};

/// Appends NDJSON batches to size-capped, rotating output files.
#[derive(Clone)]
pub struct OutputWriter {
    output_dir: PathBuf,
    compress: bool,
    max_output_bytes: u64,
    locks: Arc<LockRegistry>,
}

impl OutputWriter {
    pub fn new(
        output_dir: impl Into<PathBuf>,
        compress: bool,
        max_output_bytes: u64,
        locks: Arc<LockRegistry>,
    ) -> Self {
        Self {
            output_dir: output_dir.into(),
            compress,
            max_output_bytes,
            locks,
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Append `data` to the current output of `db`. Returns the file written.
    pub fn write_batch(&self, db: &str, data: &[u8]) -> JobResult<PathBuf> {
        let lease = self.locks.acquire(db);
        let _guard = lease.lock();

        std::fs::create_dir_all(&self.output_dir)?;
        let mut index = highest_index(&self.output_dir, db, self.compress)?;
        let mut path = output_file_name(db, &self.output_dir, index, self.compress);
        let current = match std::fs::metadata(&path) {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => 0,
            Err(e) => return Err(e.into()),
        };
        if current > 0 && current + data.len() as u64 > self.max_output_bytes {
            index += 1;
            path = output_file_name(db, &self.output_dir, index, self.compress);
            info!(db, index, "rotating output");
        }

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        if self.compress {
            // Concatenated gzip members form a valid gzip stream.
            let mut gz = GzEncoder::new(file, Compression::default());
            gz.write_all(data)?;
            gz.finish()?.sync_data()?;
        } else {
            let mut file = file;
            file.write_all(data)?;
            file.sync_data()?;
        }
        debug!(db, path = %path.display(), len = data.len(), "batch written");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::MultiGzDecoder;
    use std::io::Read;
    use std::thread;

    fn writer(dir: &Path, compress: bool, max: u64) -> OutputWriter {
        OutputWriter::new(dir, compress, max, Arc::new(LockRegistry::new()))
    }

    #[test]
    fn appends_until_the_cap_then_rotates() {
        let dir = tempfile::tempdir().unwrap();
        let w = writer(dir.path(), false, 10);
        let first = w.write_batch("db", b"123456\n").unwrap();
        let second = w.write_batch("db", b"ab\n").unwrap();
        let third = w.write_batch("db", b"xyz\n").unwrap();
        assert_eq!(first, dir.path().join("db_00.json"));
        assert_eq!(second, first);
        assert_eq!(third, dir.path().join("db_01.json"));
        assert_eq!(std::fs::read(&first).unwrap(), b"123456\nab\n");
        assert_eq!(std::fs::read(&third).unwrap(), b"xyz\n");
    }

    #[test]
    fn oversized_batch_still_lands_in_an_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let w = writer(dir.path(), false, 4);
        let path = w.write_batch("db", b"far too long\n").unwrap();
        assert_eq!(path, dir.path().join("db_00.json"));
    }

    #[test]
    fn gzip_members_concatenate() {
        let dir = tempfile::tempdir().unwrap();
        let w = writer(dir.path(), true, 1 << 20);
        w.write_batch("db", b"{\"a\":1}\n").unwrap();
        let path = w.write_batch("db", b"{\"b\":2}\n").unwrap();
        assert_eq!(path, dir.path().join("db_00.json.gz"));
        let mut text = String::new();
        MultiGzDecoder::new(std::fs::File::open(path).unwrap())
            .read_to_string(&mut text)
            .unwrap();
        assert_eq!(text, "{\"a\":1}\n{\"b\":2}\n");
    }

    #[test]
    fn concurrent_writers_never_interleave() {
        let dir = tempfile::tempdir().unwrap();
        let w = writer(dir.path(), false, 1 << 20);
        let mut handles = Vec::new();
        for t in 0..4u8 {
            let w = w.clone();
            handles.push(thread::spawn(move || {
                let line = format!("{}\n", (b'a' + t) as char).repeat(200);
                for _ in 0..10 {
                    w.write_batch("db", line.as_bytes()).unwrap();
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        let text = std::fs::read_to_string(dir.path().join("db_00.json")).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4 * 10 * 200);
        for batch in lines.chunks(200) {
            assert!(batch.iter().all(|l| *l == batch[0]));
        }
    }
}
