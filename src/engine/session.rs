use rand::SeedableRng;
use rand::rngs::SmallRng;

use crate::analyze::decode::SourceImage;
use crate::analyze::graph::{PixelGraph, analyze_image};
use crate::engine::agent::AgentPool;
use crate::engine::options::EngineOpts;
use crate::engine::step::{StepCtx, step};
use crate::foundation::core::{Canvas, FittedBounds};
use crate::foundation::error::ScrawlResult;
use crate::render::surface::{FrameRGBA, Surface};

/// One sketch rendering session: the source image, its analyzed pixel
/// graph, the agent pool, the drawable surface, and the session RNG.
///
/// All engine state lives here; nothing is process-global. Concurrent runs
/// against one session are never valid: a host that re-enters (say, a
/// resize while a live run is active) stops the run and goes through
/// [`SketchSession::prepare`] again, which re-analyzes from scratch.
pub struct SketchSession {
    source: SourceImage,
    canvas: Canvas,
    opts: EngineOpts,
    max_dimension: Option<u32>,

    surface: Surface,
    graph: PixelGraph,
    bounds: FittedBounds,
    pool: AgentPool,
    rng: SmallRng,
    seed: u64,
}

impl SketchSession {
    /// Create a session and run the initial analysis.
    ///
    /// The session owns its RNG, seeded from `opts.seed` or a fresh random
    /// seed; the effective value is readable via [`SketchSession::seed`]
    /// so any run can be reproduced.
    pub fn new(source: SourceImage, canvas: Canvas, opts: EngineOpts) -> ScrawlResult<Self> {
        opts.validate()?;
        let seed = opts.seed.unwrap_or_else(rand::random);
        let mut session = Self {
            surface: Surface::new(canvas)?,
            source,
            canvas,
            opts,
            max_dimension: None,
            graph: PixelGraph::default(),
            bounds: FittedBounds::empty(),
            pool: AgentPool::default(),
            rng: SmallRng::seed_from_u64(seed),
            seed,
        };
        session.prepare()?;
        Ok(session)
    }

    /// Cap analysis resolution for thumbnail renders (neither fitted
    /// dimension will exceed `max * 1.5`). Takes effect at the next
    /// analysis.
    pub fn with_max_dimension(mut self, max: u32) -> ScrawlResult<Self> {
        self.max_dimension = Some(max);
        self.prepare()?;
        Ok(self)
    }

    /// Re-analyze the source and reset all run state: fresh graph and
    /// counters, cleared/filled background, empty pool plus one initial
    /// agent. Both execution strategies call this at run start.
    pub fn prepare(&mut self) -> ScrawlResult<()> {
        let analysis = analyze_image(&self.source, self.canvas, &self.opts, self.max_dimension);
        self.graph = analysis.graph;
        self.bounds = analysis.bounds;

        self.surface
            .begin(self.opts.mode, self.opts.transparent);
        self.pool.clear();
        self.pool.spawn_one(&self.graph, &self.bounds, &mut self.rng);
        Ok(())
    }

    /// Advance the simulation one tick. Returns `false` once the graph is
    /// fully covered.
    pub fn step(&mut self) -> bool {
        let mut ctx = StepCtx {
            graph: &mut self.graph,
            pool: &mut self.pool,
            surface: &mut self.surface,
            bounds: &self.bounds,
            opts: &self.opts,
            rng: &mut self.rng,
        };
        step(&mut ctx)
    }

    /// Rasterize any queued strokes onto the surface.
    pub fn flush(&mut self) -> ScrawlResult<()> {
        self.surface.flush()
    }

    /// Rebuild the surface at new dimensions and restart from fresh
    /// analysis.
    pub fn resize(&mut self, canvas: Canvas) -> ScrawlResult<()> {
        self.surface = Surface::new(canvas)?;
        self.canvas = canvas;
        self.prepare()
    }

    /// Swap configuration between ticks. Geometry-affecting fields apply at
    /// the next [`SketchSession::prepare`]. The RNG and its seed are kept.
    pub fn update_opts(&mut self, opts: EngineOpts) -> ScrawlResult<()> {
        opts.validate()?;
        self.opts = opts;
        Ok(())
    }

    /// Current configuration snapshot.
    pub fn opts(&self) -> &EngineOpts {
        &self.opts
    }

    /// Surface dimensions.
    pub fn canvas(&self) -> Canvas {
        self.canvas
    }

    /// Placement of the fitted image inside the surface.
    pub fn bounds(&self) -> FittedBounds {
        self.bounds
    }

    /// The analyzed pixel graph.
    pub fn graph(&self) -> &PixelGraph {
        &self.graph
    }

    /// Number of currently active agents.
    pub fn agents_alive(&self) -> usize {
        self.pool.len()
    }

    /// Graph size fixed at analysis time.
    pub fn total_dark(&self) -> usize {
        self.graph.total_dark()
    }

    /// Nodes visited at least once so far.
    pub fn drawn_dark(&self) -> usize {
        self.graph.drawn_dark()
    }

    /// Completion ratio in `[0, 1]`.
    pub fn coverage(&self) -> f32 {
        self.graph.coverage()
    }

    /// Whether the run is complete.
    pub fn complete(&self) -> bool {
        self.graph.complete()
    }

    /// The effective RNG seed for this session.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Total strokes queued since the last prepare.
    pub fn strokes_drawn(&self) -> u64 {
        self.surface.strokes_drawn()
    }

    /// Read back the whole surface.
    pub fn frame(&self) -> FrameRGBA {
        self.surface.frame()
    }

    /// Read back the fitted image region only.
    pub fn cropped_frame(&self) -> FrameRGBA {
        self.surface.crop(&self.bounds)
    }
}
