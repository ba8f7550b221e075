use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use reviewpipe::progress::{FileStatus, ProgressRenderer, RenderError, RenderErrorKind};

/// Shared log of renderer calls, one line per call
#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn calls(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.0.lock().iter().filter(|c| c.starts_with(prefix)).count()
    }

    fn push(&self, call: String) {
        self.0.lock().push(call);
    }
}

/// Records every call and never fails
pub struct RecordingRenderer {
    name: &'static str,
    log: CallLog,
}

impl RecordingRenderer {
    pub fn new(name: &'static str, log: CallLog) -> Self {
        Self { name, log }
    }
}

impl ProgressRenderer for RecordingRenderer {
    fn name(&self) -> &'static str {
        self.name
    }

    fn start(&mut self, total: usize) -> Result<(), RenderError> {
        self.log.push(format!("start {total}"));
        Ok(())
    }

    fn update_progress(
        &mut self,
        _current: Option<&Path>,
        completed: usize,
        total: usize,
    ) -> Result<(), RenderError> {
        self.log.push(format!("progress {completed}/{total}"));
        Ok(())
    }

    fn update_file_status(&mut self, file: &Path, status: FileStatus) -> Result<(), RenderError> {
        self.log
            .push(format!("status {} {}", file.display(), status.as_str()));
        Ok(())
    }

    fn error(&mut self, file: &Path, _message: &str) -> Result<(), RenderError> {
        self.log.push(format!("error {}", file.display()));
        Ok(())
    }

    fn complete(&mut self) -> Result<(), RenderError> {
        self.log.push("complete".to_string());
        Ok(())
    }

    fn cleanup(&mut self) -> Result<(), RenderError> {
        self.log.push("cleanup".to_string());
        Ok(())
    }
}

/// Fails every call; panics instead when `panics` is set
pub struct BrokenRenderer {
    pub panics: bool,
    pub calls: Arc<Mutex<usize>>,
}

impl BrokenRenderer {
    pub fn new(panics: bool) -> Self {
        Self {
            panics,
            calls: Arc::default(),
        }
    }

    fn fail(&self) -> Result<(), RenderError> {
        *self.calls.lock() += 1;
        if self.panics {
            panic!("terminal went away");
        }
        Err(RenderError::new(RenderErrorKind::RenderFailed, "write failed"))
    }
}

impl ProgressRenderer for BrokenRenderer {
    fn name(&self) -> &'static str {
        "broken"
    }

    fn start(&mut self, _total: usize) -> Result<(), RenderError> {
        self.fail()
    }

    fn update_progress(
        &mut self,
        _current: Option<&Path>,
        _completed: usize,
        _total: usize,
    ) -> Result<(), RenderError> {
        self.fail()
    }

    fn update_file_status(&mut self, _file: &Path, _status: FileStatus) -> Result<(), RenderError> {
        self.fail()
    }

    fn error(&mut self, _file: &Path, _message: &str) -> Result<(), RenderError> {
        self.fail()
    }

    fn complete(&mut self) -> Result<(), RenderError> {
        self.fail()
    }

    fn cleanup(&mut self) -> Result<(), RenderError> {
        self.fail()
    }
}
