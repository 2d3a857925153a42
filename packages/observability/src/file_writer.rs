//! Append-only JSONL file output for the tracing layer.

use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::fmt::MakeWriter;

/// Shared handle to the JSONL log file.
///
/// Every write is flushed immediately so a line is visible to `tail -f` as
/// soon as the event is recorded.
#[derive(Clone)]
pub struct JsonlFileWriter {
    inner: Arc<Mutex<BufWriter<File>>>,
}

impl JsonlFileWriter {
    /// Open (or create) `path` in append mode, creating parent directories.
    pub fn open(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            inner: Arc::new(Mutex::new(BufWriter::with_capacity(8192, file))),
        })
    }
}

impl Write for JsonlFileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut guard = self.inner.lock();
        let written = guard.write(buf)?;
        guard.flush()?;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.lock().flush()
    }
}

/// `MakeWriter` adapter handing out clones of one [`JsonlFileWriter`].
#[derive(Clone)]
pub struct JsonlWriterFactory {
    writer: JsonlFileWriter,
}

impl JsonlWriterFactory {
    pub fn new(writer: JsonlFileWriter) -> Self {
        Self { writer }
    }
}

impl<'a> MakeWriter<'a> for JsonlWriterFactory {
    type Writer = JsonlFileWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.writer.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn open_creates_parent_dirs_and_appends() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("relay.jsonl");

        let mut writer = JsonlFileWriter::open(&path).unwrap();
        writer.write_all(b"{\"a\":1}\n").unwrap();

        let mut again = JsonlFileWriter::open(&path).unwrap();
        again.write_all(b"{\"b\":2}\n").unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "{\"a\":1}\n{\"b\":2}\n");
    }

    #[test]
    fn factory_clones_share_one_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("relay.jsonl");
        let factory = JsonlWriterFactory::new(JsonlFileWriter::open(&path).unwrap());

        factory.make_writer().write_all(b"one\n").unwrap();
        factory.make_writer().write_all(b"two\n").unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().collect::<Vec<_>>(), vec!["one", "two"]);
    }
}
