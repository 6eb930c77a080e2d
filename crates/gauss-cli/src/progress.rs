use gaussbio3d::engine::progress::{Progress, ProgressReporter};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::Arc;
use std::time::Duration;

const SPINNER_TICK_MS: u64 = 100;

/// Draws batch featurization on one `indicatif` bar: a spinner while a stage is being
/// set up, a bar labelled with the most recently finished pair while pairs are running.
///
/// `ProgressBar` is internally reference counted, so clones of the handler (and the
/// callbacks it hands out) all drive the same bar.
#[derive(Clone)]
pub struct BatchProgress {
    bar: ProgressBar,
    labels: Arc<[String]>,
}

impl BatchProgress {
    /// `labels[i]` names pair `i` of the manifest.
    pub fn new(labels: Vec<String>, quiet: bool) -> Self {
        let target = if quiet {
            ProgressDrawTarget::hidden()
        } else {
            ProgressDrawTarget::stderr()
        };
        let bar = ProgressBar::with_draw_target(Some(0), target).with_style(spinner_style());
        Self {
            bar,
            labels: labels.into(),
        }
    }

    pub fn reporter(&self) -> ProgressReporter<'static> {
        let this = self.clone();
        ProgressReporter::with_callback(Box::new(move |event| this.handle(event)))
    }

    fn handle(&self, event: Progress) {
        match event {
            Progress::StageStart { name } => {
                self.bar.set_style(spinner_style());
                self.bar.set_prefix(name);
                self.bar.set_message("loading pairs");
                self.bar.enable_steady_tick(Duration::from_millis(SPINNER_TICK_MS));
            }
            Progress::PairsStart { total } => {
                self.bar.disable_steady_tick();
                self.bar.set_length(total);
                self.bar.set_position(0);
                self.bar.set_style(bar_style());
            }
            Progress::PairDone {
                index,
                nodes_a,
                nodes_b,
            } => {
                let label = self.labels.get(index).map_or("?", String::as_str);
                self.bar
                    .set_message(format!("{label} ({nodes_a}×{nodes_b} nodes)"));
                self.bar.inc(1);
            }
            Progress::PairsFinish => {
                self.bar.set_message(format!("{} pairs featurized", self.bar.position()));
            }
            Progress::ProjectionDegraded { reason } => {
                self.bar
                    .println(format!("⚠ Projection skipped, writing raw descriptors: {reason}"));
            }
            Progress::StageFinish => {
                self.bar.disable_steady_tick();
                let done = self.bar.position();
                self.bar.finish_with_message(format!("✓ {done} pairs"));
            }
        }
    }
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.green} {prefix:.bold} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::with_template("{prefix:.bold} [{bar:40.cyan/blue}] {pos}/{len} {wide_msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ")
}
