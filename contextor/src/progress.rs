//! Stage reporting for a single question. Servers keep the no-op reporter;
//! the CLI draws a spinner on stderr.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

/// Pipeline stages in execution order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Decompose,
    Embed,
    Search,
    Rerank,
    Synthesize,
}

impl Stage {
    pub const COUNT: usize = 5;

    pub fn position(self) -> usize {
        self as usize + 1
    }

    pub fn label(self) -> &'static str {
        match self {
            Stage::Decompose => "decomposing question",
            Stage::Embed => "embedding sub-questions",
            Stage::Search => "searching documents",
            Stage::Rerank => "reranking references",
            Stage::Synthesize => "writing answer",
        }
    }
}

pub trait Progress: Send + Sync {
    fn enter(&self, _stage: Stage) {}
    fn done(&self) {}
    /// The request failed at the current stage.
    fn abandon(&self, _reason: &str) {}
}

#[derive(Default, Clone, Copy)]
pub struct NoopProgress;

impl Progress for NoopProgress {}

pub struct IndicatifProgress {
    pb: ProgressBar,
}

impl IndicatifProgress {
    pub fn spinner() -> Self {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner} {prefix} {msg} ({elapsed})") {
            pb.set_style(style.tick_chars("-\\|/ "));
        }
        pb.enable_steady_tick(Duration::from_millis(80));
        Self { pb }
    }
}

impl Progress for IndicatifProgress {
    fn enter(&self, stage: Stage) {
        self.pb
            .set_prefix(format!("[{}/{}]", stage.position(), Stage::COUNT));
        self.pb.set_message(stage.label());
    }

    fn done(&self) {
        self.pb.finish_and_clear();
    }

    fn abandon(&self, reason: &str) {
        self.pb.abandon_with_message(format!("failed: {reason}"));
    }
}
