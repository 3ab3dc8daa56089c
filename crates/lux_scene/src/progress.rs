use std::sync::Arc;

/// Callback receiving encode progress as a fraction in `[0, 1]`.
pub type ProgressFn = Arc<dyn Fn(f32) + Send + Sync>;

/// Forwards progress monotonically and finishes on exactly 1.0.
///
/// Stages call [`Progress::enter`] with their share of the whole encode and
/// then report their own local fraction.
pub(crate) struct Progress<'a> {
    sink: Option<&'a (dyn Fn(f32) + Send + Sync)>,
    last: f32,
    start: f32,
    end: f32,
}

impl<'a> Progress<'a> {
    pub(crate) fn new(sink: Option<&'a (dyn Fn(f32) + Send + Sync)>) -> Self {
        Self {
            sink,
            last: 0.0,
            start: 0.0,
            end: 1.0,
        }
    }

    /// Map subsequent reports onto `[start, end]` of the total.
    pub(crate) fn enter(&mut self, start: f32, end: f32) {
        self.start = start;
        self.end = end;
    }

    /// Report a fraction of the current stage, ignoring regressions.
    pub(crate) fn report(&mut self, fraction: f32) {
        let total = self.start + (self.end - self.start) * fraction.clamp(0.0, 1.0);
        if total <= self.last {
            return;
        }
        self.last = total;
        if let Some(sink) = self.sink {
            sink(total);
        }
    }

    pub(crate) fn finish(&mut self) {
        self.last = 1.0;
        if let Some(sink) = self.sink {
            sink(1.0);
        }
    }
}
