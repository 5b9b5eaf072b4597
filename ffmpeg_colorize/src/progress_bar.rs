use colorize_common::pipeline::Stage;
use colorize_common::progress::{ProgressSink, ProgressState};
use indicatif::{ProgressBar, ProgressStyle};

const TEMPLATE: &str = "{prefix:>12.cyan.bold} [{bar:40.cyan/blue}] {pos}/{len} {wide_msg}";

/// Terminal progress bar showing frames done and the estimated time left.
pub struct TerminalProgress {
    bar: ProgressBar,
}

impl TerminalProgress {
    pub fn new(prefix: &'static str) -> Self {
        let style = ProgressStyle::with_template(TEMPLATE)
            .map(|style| style.progress_chars("=> "))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        let bar = ProgressBar::new(0).with_style(style).with_prefix(prefix);
        Self { bar }
    }
}

impl ProgressSink for TerminalProgress {
    fn on_stage(&mut self, stage: Stage) {
        match stage {
            Stage::PerFrame => self.bar.set_prefix("Colorizing"),
            Stage::Aborted => self.bar.set_message("Source ended early"),
            Stage::Encoding => {
                self.bar.set_prefix("Encoding");
                self.bar.set_message("Merging frames to video...");
            }
            Stage::AudioMux => {
                self.bar.set_prefix("Audio");
                self.bar.set_message("Adding audio...");
            }
            Stage::Idle | Stage::Decoding | Stage::Done => {}
        }
    }

    fn on_start(&mut self, total: u64) {
        self.bar.set_length(total);
        self.bar.set_position(0);
    }

    fn on_frame(&mut self, state: &ProgressState) {
        self.bar.set_length(state.frames_total);
        self.bar.set_position(state.frames_completed);
        self.bar.set_message(state.remaining_text().unwrap_or_default());
    }

    fn on_finish(&mut self) {
        self.bar.finish_and_clear();
    }
}
