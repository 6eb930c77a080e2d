/// Progress events emitted by the pipeline while it featurizes structure pairs.
#[derive(Debug, Clone, PartialEq)]
pub enum Progress {
    /// A pipeline stage (`fit`, `transform`, `fit_transform`) begins.
    StageStart { name: &'static str },
    StageFinish,

    PairsStart { total: u64 },
    /// Pair `index` (position in the input list) has been featurized. Under the
    /// `parallel` feature pairs complete in no particular order.
    PairDone {
        index: usize,
        nodes_a: usize,
        nodes_b: usize,
    },
    PairsFinish,

    /// The configured projection could not be fitted; descriptors stay unprojected.
    ProjectionDegraded { reason: String },
}

pub type ProgressCallback<'a> = Box<dyn Fn(Progress) + Send + Sync + 'a>;

/// Optional sink for [`Progress`] events; silent when no callback is installed.
///
/// Events may arrive from worker threads, so the callback must be `Send + Sync`.
#[derive(Default)]
pub struct ProgressReporter<'a> {
    callback: Option<ProgressCallback<'a>>,
}

impl<'a> ProgressReporter<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_callback(callback: ProgressCallback<'a>) -> Self {
        Self {
            callback: Some(callback),
        }
    }

    #[inline]
    pub fn report(&self, event: Progress) {
        if let Some(cb) = &self.callback {
            cb(event);
        }
    }
}
