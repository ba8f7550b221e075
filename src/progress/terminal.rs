//! Terminal capabilities, output sinks and memory probes injected into renderers.

use std::io::{self, Write};
use std::sync::Arc;

use console::Term;
use parking_lot::Mutex;

/// What the output terminal can do. Renderer selection depends only on these flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TerminalCapabilities {
    pub is_interactive: bool,
    pub supports_color: bool,
    pub supports_ansi: bool,
    pub supports_unicode: bool,
}

impl TerminalCapabilities {
    /// Inspect stderr, where progress is drawn
    pub fn detect() -> Self {
        let term = Term::stderr();
        let features = term.features();
        let attended = features.is_attended();
        let dumb = std::env::var("TERM").map(|t| t == "dumb").unwrap_or(false);

        Self {
            is_interactive: attended,
            supports_color: attended && features.colors_supported() && console::colors_enabled_stderr(),
            supports_ansi: attended && !dumb,
            supports_unicode: features.wants_emoji(),
        }
    }

    /// Everything enabled
    pub fn full() -> Self {
        Self {
            is_interactive: true,
            supports_color: true,
            supports_ansi: true,
            supports_unicode: true,
        }
    }

    /// Pipe or log file: nothing enabled
    pub fn plain() -> Self {
        Self::default()
    }
}

/// Destination for rendered progress text
pub trait OutputSink: Send {
    fn write_str(&mut self, text: &str) -> io::Result<()>;
    fn flush(&mut self) -> io::Result<()>;
}

/// Writes to a `console::Term` (stderr by default)
#[derive(Debug, Clone)]
pub struct TermSink {
    term: Term,
}

impl TermSink {
    pub fn stderr() -> Self {
        Self {
            term: Term::stderr(),
        }
    }

    pub fn stdout() -> Self {
        Self {
            term: Term::stdout(),
        }
    }
}

impl OutputSink for TermSink {
    fn write_str(&mut self, text: &str) -> io::Result<()> {
        self.term.write_str(text)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.term.flush()
    }
}

/// Adapts any `io::Write`
#[derive(Debug)]
pub struct WriterSink<W> {
    writer: W,
}

impl<W: Write + Send> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> OutputSink for WriterSink<W> {
    fn write_str(&mut self, text: &str) -> io::Result<()> {
        self.writer.write_all(text.as_bytes())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

/// In-memory sink whose clones share one buffer
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer {
    inner: Arc<Mutex<String>>,
}

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        self.inner.lock().clone()
    }

    /// Non-empty lines with ANSI escape sequences stripped
    pub fn lines(&self) -> Vec<String> {
        console::strip_ansi_codes(&self.contents())
            .split(['\n', '\r'])
            .map(str::trim_end)
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect()
    }

    pub fn clear(&self) {
        self.inner.lock().clear();
    }
}

impl OutputSink for SharedBuffer {
    fn write_str(&mut self, text: &str) -> io::Result<()> {
        self.inner.lock().push_str(text);
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Source of the process memory figure shown by the interactive renderer
pub trait MemoryProbe: Send + Sync {
    /// Resident set size in bytes, if known
    fn resident_bytes(&self) -> Option<u64>;
}

/// Reports nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMemoryProbe;

impl MemoryProbe for NoMemoryProbe {
    fn resident_bytes(&self) -> Option<u64> {
        None
    }
}

/// Reads `VmRSS` from `/proc/self/status` (Linux only, `None` elsewhere)
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcMemoryProbe;

impl MemoryProbe for ProcMemoryProbe {
    fn resident_bytes(&self) -> Option<u64> {
        let status = std::fs::read_to_string("/proc/self/status").ok()?;
        parse_vm_rss(&status)
    }
}

fn parse_vm_rss(status: &str) -> Option<u64> {
    let line = status.lines().find(|line| line.starts_with("VmRSS:"))?;
    let kib: u64 = line
        .trim_start_matches("VmRSS:")
        .split_whitespace()
        .next()?
        .parse()
        .ok()?;
    Some(kib * 1024)
}
