// Test helper modules
pub mod recording_renderer;
pub mod scripted_analyzer;
pub mod test_harness;

pub use recording_renderer::{BrokenRenderer, CallLog, RecordingRenderer};
pub use scripted_analyzer::{Script, ScriptedAnalyzer};
pub use test_harness::{fast_retry, paths, TestHarness};
