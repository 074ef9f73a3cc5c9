use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{BuildError, Result};

/// Destination for everything a build prints: messages, child process output
/// and dry-run notices. Cloning shares the underlying writer, which is how a
/// nested build writes into its parent's sink.
#[derive(Clone)]
pub struct Output {
    inner: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl Output {
    pub fn new<W: Write + Send + 'static>(writer: W) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Box::new(writer))),
        }
    }

    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }

    /// An in-memory sink and a handle for reading back what was written.
    pub fn captured() -> (Self, Captured) {
        let captured = Captured::default();
        (Self::new(captured.clone()), captured)
    }

    pub fn line(&self, text: &str) -> io::Result<()> {
        let mut writer = self.lock();
        writeln!(writer, "{}", text)?;
        writer.flush()
    }

    /// Writes `text` exactly as given, without adding a newline.
    pub fn write(&self, text: &str) -> io::Result<()> {
        let mut writer = self.lock();
        writer.write_all(text.as_bytes())?;
        writer.flush()
    }

    /// Like [`Output::line`], for callers that report [`BuildError`]s.
    pub fn emit(&self, text: &str) -> Result<()> {
        self.line(text)
            .map_err(|e| BuildError::io("<output>", e))
    }

    fn lock(&self) -> MutexGuard<'_, Box<dyn Write + Send>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for Output {
    fn default() -> Self {
        Self::stdout()
    }
}

#[derive(Clone, Default)]
pub struct Captured {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl Captured {
    pub fn contents(&self) -> String {
        let buffer = self.buffer.lock().unwrap_or_else(|e| e.into_inner());
        String::from_utf8_lossy(&buffer).into_owned()
    }

    pub fn clear(&self) {
        self.buffer.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

impl Write for Captured {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
