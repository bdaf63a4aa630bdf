use crate::foundation::error::{ScrawlError, ScrawlResult};

/// Stroke color policy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    /// Black ink on a white background.
    #[default]
    Bw,
    /// Fixed sepia ink on a white background.
    Sepia,
    /// Each stroke uses the source pixel's color.
    Color,
    /// White ink on a black background.
    Invert,
}

impl ColorMode {
    /// Resolve the stroke RGB for a node with the given source color.
    pub(crate) fn stroke_rgb(self, node_color: [u8; 3]) -> [u8; 3] {
        match self {
            ColorMode::Bw => [0, 0, 0],
            ColorMode::Invert => [255, 255, 255],
            ColorMode::Sepia => [93, 64, 55],
            ColorMode::Color => node_color,
        }
    }
}

/// Neighbor-ranking rule for an agent that has not moved yet.
///
/// The legacy engine variants disagreed here (the live renderer preferred
/// the least-visited neighbor, the instant renderer the darkest one); the
/// rule is configuration now so both strategies stay tick-for-tick
/// equivalent under one option set.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeedRanking {
    /// Prefer the neighbor crossed by the fewest agents so far.
    #[default]
    LeastVisited,
    /// Prefer the neighbor with the strongest darkness intensity.
    DarkestFirst,
}

/// Engine configuration, snapshotted per tick.
///
/// Values may be hot-swapped between ticks; geometry-affecting fields
/// (`scale_factor`, `threshold`) take effect at the next analysis.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct EngineOpts {
    /// Ticks processed per live animation frame.
    pub draw_speed: u32,
    /// Probability of spawning an extra agent at a junction node.
    pub branch_probability: f64,
    /// Maximum concurrent agents.
    pub max_heads: usize,
    /// Fraction of the surface the fitted image occupies.
    pub scale_factor: f64,
    /// Summed-brightness cutoff (`0..=765`); pixels below it become nodes.
    pub threshold: f32,
    /// Weight favoring continuation of an agent's prior direction.
    pub momentum: f32,
    /// Stroke width in surface pixels.
    pub line_width: f64,
    /// Base stroke opacity; the per-stroke value also folds in node
    /// intensity and visit fade.
    pub alpha: f32,
    /// Stroke color policy.
    pub mode: ColorMode,
    /// Leave the background transparent instead of filling it.
    pub transparent: bool,
    /// RNG seed; `None` draws a fresh one per session.
    pub seed: Option<u64>,
    /// Ranking rule for freshly spawned (zero-velocity) agents.
    pub seed_ranking: SeedRanking,
}

impl Default for EngineOpts {
    fn default() -> Self {
        Self {
            draw_speed: 160,
            branch_probability: 0.05,
            max_heads: 64,
            scale_factor: 0.8,
            threshold: 640.0,
            momentum: 0.5,
            line_width: 0.5,
            alpha: 0.1,
            mode: ColorMode::Bw,
            transparent: false,
            seed: None,
            seed_ranking: SeedRanking::LeastVisited,
        }
    }
}

impl EngineOpts {
    /// Check option invariants. Called by the session on construction and
    /// on every hot-swap.
    pub fn validate(&self) -> ScrawlResult<()> {
        if self.draw_speed == 0 {
            return Err(ScrawlError::validation("draw_speed must be > 0"));
        }
        if self.max_heads == 0 {
            return Err(ScrawlError::validation("max_heads must be > 0"));
        }
        if !self.branch_probability.is_finite() || !(0.0..=1.0).contains(&self.branch_probability) {
            return Err(ScrawlError::validation(
                "branch_probability must be within [0, 1]",
            ));
        }
        if !self.scale_factor.is_finite() || self.scale_factor < 0.0 {
            return Err(ScrawlError::validation(
                "scale_factor must be finite and >= 0",
            ));
        }
        if !self.threshold.is_finite() {
            return Err(ScrawlError::validation("threshold must be finite"));
        }
        if !self.momentum.is_finite() {
            return Err(ScrawlError::validation("momentum must be finite"));
        }
        if !self.line_width.is_finite() || self.line_width <= 0.0 {
            return Err(ScrawlError::validation("line_width must be > 0"));
        }
        if !self.alpha.is_finite() || self.alpha < 0.0 {
            return Err(ScrawlError::validation("alpha must be finite and >= 0"));
        }
        Ok(())
    }

    /// Parse options from a JSON object, filling missing fields from the
    /// defaults, then validate.
    pub fn from_json_str(json: &str) -> ScrawlResult<Self> {
        let opts: Self = serde_json::from_str(json)
            .map_err(|e| ScrawlError::serde(format!("invalid engine options: {e}")))?;
        opts.validate()?;
        Ok(opts)
    }
}
