use kurbo::Point;
use rand::Rng;
use smallvec::SmallVec;

use crate::analyze::graph::PixelGraph;
use crate::engine::agent::AgentPool;
use crate::engine::options::{EngineOpts, SeedRanking};
use crate::foundation::core::FittedBounds;
use crate::render::surface::{StrokeSegment, Surface};

/// Per-tick probability of an opportunistic spawn while below `max_heads`.
pub(crate) const SPAWN_CHANCE: f64 = 0.1;
/// Neighbors are eligible moves only below this visit count.
const NEIGHBOR_VISIT_LIMIT: u32 = 2;
/// Arriving at a node visited more often than this retires the agent.
const DEAD_END_VISITS: u32 = 10;
/// Score weight on neighbor darkness intensity.
const INTENSITY_WEIGHT: f32 = 3.0;
/// Score penalty per neighbor visit.
const VISIT_PENALTY: f32 = 2.0;
/// Floor under the per-stroke opacity so late strokes stay visible.
const MIN_STROKE_ALPHA: f32 = 0.05;
/// Opacity lost per prior visit of the target node.
const VISIT_ALPHA_FADE: f32 = 0.05;
/// Junction size (eligible neighbors) above which branching may trigger.
const BRANCH_MIN_NEIGHBORS: usize = 2;

/// Borrowed view of everything one tick mutates.
pub(crate) struct StepCtx<'a, R: Rng> {
    pub graph: &'a mut PixelGraph,
    pub pool: &'a mut AgentPool,
    pub surface: &'a mut Surface,
    pub bounds: &'a FittedBounds,
    pub opts: &'a EngineOpts,
    pub rng: &'a mut R,
}

#[derive(Clone, Copy)]
struct Candidate {
    dx: i32,
    dy: i32,
    x: i32,
    y: i32,
    visits: u32,
    intensity: f32,
    color: [u8; 3],
}

/// Advance the simulation by exactly one logical tick.
///
/// Returns `false` once the graph is fully covered (no more work). Both
/// execution strategies call this identical function; they differ only in
/// pacing and termination policy.
pub(crate) fn step<R: Rng>(ctx: &mut StepCtx<'_, R>) -> bool {
    if ctx.graph.complete() {
        return false;
    }

    if ctx.pool.len() < ctx.opts.max_heads && ctx.rng.random::<f64>() < SPAWN_CHANCE {
        ctx.pool.spawn_one(ctx.graph, ctx.bounds, ctx.rng);
    }

    // Reverse index order so retirement mid-loop is safe and agents spawned
    // by branching this tick wait until the next one.
    let mut i = ctx.pool.len();
    while i > 0 {
        i -= 1;
        let mut agent = ctx.pool.agents()[i];

        if ctx.graph.record_visit(agent.x, agent.y) {
            agent.life -= 1;
        }
        if agent.life <= 0 {
            ctx.pool.agents_mut().remove(i);
            continue;
        }

        let candidates = eligible_neighbors(ctx.graph, agent.x, agent.y);
        if candidates.is_empty() {
            ctx.pool.agents_mut().remove(i);
            continue;
        }

        let chosen = if agent.has_velocity() {
            pick_by_momentum(&candidates, agent.vx, agent.vy, ctx.opts.momentum)
        } else {
            pick_at_seed(&candidates, ctx.opts.seed_ranking)
        };

        // Recheck against the live count: the eligibility filter and this
        // ceiling can disagree once other agents have crossed the node.
        let live_visits = ctx
            .graph
            .get(chosen.x, chosen.y)
            .map(|n| n.visit_count)
            .unwrap_or(0);
        if live_visits > DEAD_END_VISITS {
            ctx.pool.agents_mut().remove(i);
            continue;
        }

        agent.vx = chosen.dx;
        agent.vy = chosen.dy;
        agent.x = chosen.x;
        agent.y = chosen.y;
        ctx.pool.agents_mut()[i] = agent;

        ctx.surface.queue(StrokeSegment {
            from: Point::new(
                ctx.bounds.offset_x + f64::from(agent.x - agent.vx),
                ctx.bounds.offset_y + f64::from(agent.y - agent.vy),
            ),
            to: Point::new(
                ctx.bounds.offset_x + f64::from(agent.x),
                ctx.bounds.offset_y + f64::from(agent.y),
            ),
            rgb: ctx.opts.mode.stroke_rgb(chosen.color),
            alpha: stroke_alpha(chosen.intensity, chosen.visits, ctx.opts.alpha),
            width: ctx.opts.line_width,
        });

        if candidates.len() > BRANCH_MIN_NEIGHBORS
            && ctx.pool.len() < ctx.opts.max_heads
            && ctx.rng.random::<f64>() < ctx.opts.branch_probability
            && chosen.visits < NEIGHBOR_VISIT_LIMIT
        {
            ctx.pool.spawn_one(ctx.graph, ctx.bounds, ctx.rng);
        }
    }

    !ctx.graph.complete()
}

fn eligible_neighbors(graph: &PixelGraph, x: i32, y: i32) -> SmallVec<[Candidate; 8]> {
    let mut out = SmallVec::new();
    for dy in -1..=1 {
        for dx in -1..=1 {
            if dx == 0 && dy == 0 {
                continue;
            }
            if let Some(node) = graph.get(x + dx, y + dy)
                && node.visit_count < NEIGHBOR_VISIT_LIMIT
            {
                out.push(Candidate {
                    dx,
                    dy,
                    x: node.x,
                    y: node.y,
                    visits: node.visit_count,
                    intensity: node.intensity,
                    color: node.color,
                });
            }
        }
    }
    out
}

/// Moving agents continue by score: momentum along the prior direction,
/// plus darkness, minus a crowding penalty. First strictly-greater wins,
/// matching a stable descending sort taking rank 0.
fn pick_by_momentum(candidates: &[Candidate], vx: i32, vy: i32, momentum: f32) -> Candidate {
    let score = |c: &Candidate| {
        let dot = (c.dx * vx + c.dy * vy) as f32;
        momentum * dot + INTENSITY_WEIGHT * c.intensity - VISIT_PENALTY * c.visits as f32
    };
    let mut best = candidates[0];
    let mut best_score = score(&best);
    for c in &candidates[1..] {
        let s = score(c);
        if s > best_score {
            best = *c;
            best_score = s;
        }
    }
    best
}

/// Fresh spawns have no direction to continue; rank by the configured rule.
fn pick_at_seed(candidates: &[Candidate], ranking: SeedRanking) -> Candidate {
    let mut best = candidates[0];
    for c in &candidates[1..] {
        let better = match ranking {
            SeedRanking::LeastVisited => c.visits < best.visits,
            SeedRanking::DarkestFirst => c.intensity > best.intensity,
        };
        if better {
            best = *c;
        }
    }
    best
}

/// Per-stroke opacity: scaled darkness, faded by visit history, floored so
/// heavily revisited regions never vanish entirely.
fn stroke_alpha(intensity: f32, visits: u32, base_alpha: f32) -> f32 {
    (intensity * (base_alpha / 0.1) - visits as f32 * VISIT_ALPHA_FADE).max(MIN_STROKE_ALPHA)
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    use super::*;
    use crate::analyze::graph::PixelNode;
    use crate::engine::agent::PenAgent;
    use crate::engine::options::ColorMode;
    use crate::foundation::core::Canvas;

    fn node(x: i32, y: i32, visits: u32, intensity: f32) -> PixelNode {
        PixelNode {
            x,
            y,
            visit_count: visits,
            intensity,
            color: [0, 0, 0],
        }
    }

    fn bounds(w: f64, h: f64) -> FittedBounds {
        FittedBounds {
            offset_x: 0.0,
            offset_y: 0.0,
            width: w,
            height: h,
        }
    }

    struct Fixture {
        graph: PixelGraph,
        pool: AgentPool,
        surface: Surface,
        bounds: FittedBounds,
        opts: EngineOpts,
        rng: SmallRng,
    }

    impl Fixture {
        fn new(nodes: Vec<PixelNode>, w: f64, h: f64) -> Self {
            let opts = EngineOpts {
                scale_factor: 1.0,
                seed: Some(0),
                // Keep the dynamics deterministic for these unit tests:
                // no random spawns beyond the ones a test sets up itself.
                max_heads: 1,
                branch_probability: 0.0,
                ..EngineOpts::default()
            };
            let mut surface = Surface::new(Canvas::new(32, 32).unwrap()).unwrap();
            surface.begin(ColorMode::Bw, false);
            Self {
                graph: PixelGraph::from_nodes(nodes),
                pool: AgentPool::default(),
                surface,
                bounds: bounds(w, h),
                opts,
                rng: SmallRng::seed_from_u64(42),
            }
        }

        fn place_agent(&mut self, agent: PenAgent) {
            self.pool.agents_mut().push(agent);
        }

        fn step(&mut self) -> bool {
            let mut ctx = StepCtx {
                graph: &mut self.graph,
                pool: &mut self.pool,
                surface: &mut self.surface,
                bounds: &self.bounds,
                opts: &self.opts,
                rng: &mut self.rng,
            };
            super::step(&mut ctx)
        }
    }

    fn agent_at(x: i32, y: i32) -> PenAgent {
        PenAgent {
            x,
            y,
            vx: 0,
            vy: 0,
            life: 200,
        }
    }

    #[test]
    fn completed_graph_reports_no_work() {
        let mut fx = Fixture::new(vec![node(0, 0, 0, 1.0)], 1.0, 1.0);
        fx.graph.record_visit(0, 0);
        assert!(!fx.step());
    }

    #[test]
    fn agent_walks_a_line_and_strokes_each_move() {
        let mut fx = Fixture::new(
            vec![node(0, 0, 0, 1.0), node(1, 0, 0, 1.0), node(2, 0, 0, 1.0)],
            3.0,
            1.0,
        );
        fx.place_agent(agent_at(0, 0));

        fx.step();
        assert_eq!(fx.graph.drawn_dark(), 1);
        let a = fx.pool.agents()[0];
        assert_eq!((a.x, a.y), (1, 0));
        assert!(a.has_velocity());
        assert_eq!(fx.surface.strokes_drawn(), 1);

        fx.step();
        let a = fx.pool.agents()[0];
        assert_eq!((a.x, a.y), (2, 0));
        assert_eq!(fx.surface.strokes_drawn(), 2);
        assert_eq!(fx.graph.drawn_dark(), 2);
    }

    #[test]
    fn strokes_are_offset_by_the_fitted_placement() {
        let mut fx = Fixture::new(vec![node(0, 0, 0, 1.0), node(1, 0, 0, 1.0)], 2.0, 1.0);
        fx.bounds = FittedBounds {
            offset_x: 5.0,
            offset_y: 7.0,
            width: 2.0,
            height: 1.0,
        };
        fx.place_agent(agent_at(0, 0));
        fx.step();

        // One queued stroke from (5,7) to (6,7); verify through the pixels
        // after an opaque-enough flush that ink landed near y=7.
        assert_eq!(fx.surface.pending_strokes(), 1);
        fx.surface.flush().unwrap();
        let frame = fx.surface.frame();
        let stride = 32usize * 4;
        let row7 = &frame.data[7 * stride..8 * stride];
        assert!(row7.chunks_exact(4).any(|px| px[0] < 255));
    }

    #[test]
    fn no_eligible_neighbors_retires_the_agent() {
        let mut fx = Fixture::new(vec![node(0, 0, 0, 1.0), node(5, 5, 0, 1.0)], 6.0, 6.0);
        fx.place_agent(agent_at(0, 0));
        fx.step();
        assert!(fx.pool.is_empty());
        assert_eq!(fx.surface.strokes_drawn(), 0);
    }

    #[test]
    fn overdrawn_neighbors_are_not_eligible() {
        let mut fx = Fixture::new(vec![node(0, 0, 0, 1.0), node(1, 0, 2, 1.0)], 2.0, 1.0);
        fx.place_agent(agent_at(0, 0));
        fx.step();
        // The only neighbor already carries 2 visits: retire, no stroke.
        assert!(fx.pool.is_empty());
        assert_eq!(fx.surface.strokes_drawn(), 0);
    }

    #[test]
    fn sole_neighbor_over_the_ceiling_retires_without_a_stroke() {
        let mut fx = Fixture::new(vec![node(0, 0, 0, 1.0), node(1, 0, 11, 1.0)], 2.0, 1.0);
        fx.place_agent(agent_at(0, 0));
        fx.step();
        assert!(fx.pool.is_empty());
        assert_eq!(fx.surface.strokes_drawn(), 0);
        assert_eq!(fx.graph.get(1, 0).unwrap().visit_count, 11);
    }

    #[test]
    fn life_exhaustion_retires_the_agent() {
        let mut fx = Fixture::new(vec![node(0, 0, 0, 1.0), node(1, 0, 0, 1.0)], 2.0, 1.0);
        let mut a = agent_at(0, 0);
        a.life = 1;
        fx.place_agent(a);
        fx.step();
        assert!(fx.pool.is_empty());
        // The node was still visited before retirement.
        assert_eq!(fx.graph.drawn_dark(), 1);
    }

    #[test]
    fn momentum_prefers_the_prior_direction() {
        // Moving right with equal-intensity left/right neighbors: momentum
        // must carry the agent rightwards.
        let mut fx = Fixture::new(
            vec![
                node(0, 1, 0, 1.0),
                node(1, 1, 0, 1.0),
                node(2, 1, 0, 1.0),
                node(1, 0, 0, 1.0),
                node(1, 2, 0, 1.0),
            ],
            3.0,
            3.0,
        );
        let mut a = agent_at(1, 1);
        a.vx = 1;
        a.vy = 0;
        fx.place_agent(a);
        fx.step();
        let a = fx.pool.agents()[0];
        assert_eq!((a.x, a.y), (2, 1));
    }

    #[test]
    fn momentum_yields_to_crowding_penalty() {
        // The straight-ahead node carries a visit; with momentum 0.5 the
        // penalty (-2) outweighs the dot-product bonus and the agent turns.
        let mut fx = Fixture::new(
            vec![node(0, 0, 0, 1.0), node(1, 0, 1, 1.0), node(1, 1, 0, 1.0)],
            2.0,
            2.0,
        );
        let mut a = agent_at(0, 0);
        a.vx = 1;
        a.vy = 0;
        fx.place_agent(a);
        fx.step();
        let a = fx.pool.agents()[0];
        assert_eq!((a.x, a.y), (1, 1));
    }

    #[test]
    fn seed_ranking_least_visited_vs_darkest() {
        let cands = [
            Candidate {
                dx: 1,
                dy: 0,
                x: 1,
                y: 0,
                visits: 1,
                intensity: 0.9,
                color: [0; 3],
            },
            Candidate {
                dx: 0,
                dy: 1,
                x: 0,
                y: 1,
                visits: 0,
                intensity: 0.2,
                color: [0; 3],
            },
        ];
        let c = pick_at_seed(&cands, SeedRanking::LeastVisited);
        assert_eq!((c.x, c.y), (0, 1));
        let c = pick_at_seed(&cands, SeedRanking::DarkestFirst);
        assert_eq!((c.x, c.y), (1, 0));
    }

    #[test]
    fn stroke_alpha_scales_fades_and_floors() {
        // Full darkness, default base alpha, untouched node.
        assert_eq!(stroke_alpha(1.0, 0, 0.1), 1.0);
        // Each visit fades by 0.05.
        assert_eq!(stroke_alpha(1.0, 4, 0.1), 0.8);
        // Floor keeps late strokes visible.
        assert_eq!(stroke_alpha(0.01, 10, 0.1), MIN_STROKE_ALPHA);
    }

    #[test]
    fn branching_spawns_at_junctions() {
        // A 3x3 block of fresh nodes gives the center agent 8 eligible
        // neighbors; branch probability 1 forces a spawn.
        let nodes = (0..3)
            .flat_map(|y| (0..3).map(move |x| node(x, y, 0, 1.0)))
            .collect();
        let mut fx = Fixture::new(nodes, 3.0, 3.0);
        fx.opts.branch_probability = 1.0;
        fx.opts.max_heads = 4;
        fx.place_agent(agent_at(1, 1));
        fx.step();
        assert!(fx.pool.len() >= 2, "junction must branch a second agent");
    }

    #[test]
    fn visit_counts_never_decrease_and_coverage_is_bounded() {
        let nodes = (0..4)
            .flat_map(|y| (0..4).map(move |x| node(x, y, 0, 1.0)))
            .collect();
        let mut fx = Fixture::new(nodes, 4.0, 4.0);
        fx.opts.max_heads = 4;
        fx.place_agent(agent_at(0, 0));

        let mut prev: Vec<u32> = fx.graph.nodes().iter().map(|n| n.visit_count).collect();
        for _ in 0..200 {
            fx.step();
            let now: Vec<u32> = fx.graph.nodes().iter().map(|n| n.visit_count).collect();
            assert!(now.iter().zip(&prev).all(|(a, b)| a >= b));
            assert!(fx.graph.drawn_dark() <= fx.graph.total_dark());
            prev = now;
        }
    }
}
