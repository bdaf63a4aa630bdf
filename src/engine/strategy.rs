use crate::engine::session::SketchSession;
use crate::foundation::error::ScrawlResult;

/// Hard bound on batch ticks, against pathological graphs (isolated
/// components the spawn policy keeps missing). Reaching it is an expected
/// early stop, not an error.
const MAX_BATCH_STEPS: u64 = 100_000;
/// The batch strategy stops chasing stragglers at this coverage.
const BATCH_COVERAGE_STOP: f32 = 0.99;

/// What a live frame callback observed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunPhase {
    /// Work remains; schedule another frame.
    Drawing,
    /// The graph is fully covered; the runner deactivated itself.
    Complete,
    /// The runner was stopped externally.
    Stopped,
}

/// Frame-paced execution over the shared step function.
///
/// The host owns the frame loop (an animation-frame callback, a timer):
/// each [`LiveRunner::frame`] call runs up to `draw_speed` ticks and
/// rasterizes the batch. Cancellation is cooperative and checked at frame
/// entry only; an in-flight batch always finishes.
#[derive(Clone, Copy, Debug, Default)]
pub struct LiveRunner {
    active: bool,
}

impl LiveRunner {
    /// A new, inactive runner.
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin a live run: fresh analysis and run state, runner active.
    pub fn start(&mut self, session: &mut SketchSession) -> ScrawlResult<()> {
        session.prepare()?;
        self.active = true;
        Ok(())
    }

    /// The frame callback body. Call once per animation frame while
    /// [`RunPhase::Drawing`] is returned.
    pub fn frame(&mut self, session: &mut SketchSession) -> ScrawlResult<RunPhase> {
        if !self.active {
            return Ok(RunPhase::Stopped);
        }
        for _ in 0..session.opts().draw_speed {
            if !session.step() {
                session.flush()?;
                self.active = false;
                return Ok(RunPhase::Complete);
            }
        }
        session.flush()?;
        Ok(RunPhase::Drawing)
    }

    /// Stop the run. Idempotent; takes effect at the next frame entry.
    pub fn stop(&mut self) {
        self.active = false;
    }

    /// Whether the runner would process another frame.
    pub fn is_active(&self) -> bool {
        self.active
    }
}

/// Counters from a batch render.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BatchStats {
    /// Ticks executed.
    pub steps: u64,
    /// Final coverage in `[0, 1]`.
    pub coverage: f32,
}

/// Synchronous execution over the shared step function: loop without
/// yielding until the graph is covered, coverage reaches 99%, or the
/// safety cap trips. Used for thumbnails and static exports.
#[tracing::instrument(skip(session))]
pub fn render_batch(session: &mut SketchSession) -> ScrawlResult<BatchStats> {
    session.prepare()?;

    let mut steps = 0u64;
    while session.step() {
        steps += 1;
        if steps >= MAX_BATCH_STEPS || session.coverage() >= BATCH_COVERAGE_STOP {
            break;
        }
    }
    session.flush()?;

    let stats = BatchStats {
        steps,
        coverage: session.coverage(),
    };
    tracing::debug!(steps = stats.steps, coverage = stats.coverage, "batch render done");
    Ok(stats)
}
