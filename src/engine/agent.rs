use rand::Rng;

use crate::analyze::graph::PixelGraph;
use crate::foundation::core::FittedBounds;

/// Steps an agent survives once spawned.
pub(crate) const AGENT_LIFE: i32 = 200;
/// Random placement attempts before falling back to a graph scan.
const SPAWN_ATTEMPTS: usize = 50;
/// Nodes visited this often or more are deprioritized as spawn targets.
const SPAWN_VISIT_LIMIT: u32 = 5;

/// A pen head: a transient traversal cursor over the pixel graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PenAgent {
    /// Current raster x coordinate.
    pub x: i32,
    /// Current raster y coordinate.
    pub y: i32,
    /// Last horizontal move direction (`-1..=1`; 0 before the first move).
    pub vx: i32,
    /// Last vertical move direction (`-1..=1`; 0 before the first move).
    pub vy: i32,
    /// Remaining steps before forced retirement.
    pub life: i32,
}

impl PenAgent {
    fn at(x: i32, y: i32) -> Self {
        Self {
            x,
            y,
            vx: 0,
            vy: 0,
            life: AGENT_LIFE,
        }
    }

    /// Whether the agent has moved since spawning.
    pub fn has_velocity(&self) -> bool {
        self.vx != 0 || self.vy != 0
    }
}

/// The set of active pen agents.
#[derive(Clone, Debug, Default)]
pub struct AgentPool {
    agents: Vec<PenAgent>,
}

impl AgentPool {
    /// Active agent count.
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    /// Whether no agents are active.
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// The active agents, in processing order.
    pub fn agents(&self) -> &[PenAgent] {
        &self.agents
    }

    pub(crate) fn agents_mut(&mut self) -> &mut Vec<PenAgent> {
        &mut self.agents
    }

    pub(crate) fn clear(&mut self) {
        self.agents.clear();
    }

    /// Try to place one fresh agent on an under-visited node.
    ///
    /// Up to [`SPAWN_ATTEMPTS`] uniform random draws over the fitted raster
    /// bounds, accepting a node with fewer than [`SPAWN_VISIT_LIMIT`]
    /// visits; if all misses (sparse or mostly saturated graph), a linear
    /// scan picks the first never-visited node. Failing both is the normal
    /// terminal condition as coverage approaches completion: no agent is
    /// created and `false` is returned.
    pub(crate) fn spawn_one(
        &mut self,
        graph: &PixelGraph,
        bounds: &FittedBounds,
        rng: &mut impl Rng,
    ) -> bool {
        if graph.complete() {
            return false;
        }

        let (w, h) = bounds.raster_size();
        if w > 0 && h > 0 {
            for _ in 0..SPAWN_ATTEMPTS {
                let x = rng.random_range(0..w) as i32;
                let y = rng.random_range(0..h) as i32;
                if let Some(node) = graph.get(x, y)
                    && node.visit_count < SPAWN_VISIT_LIMIT
                {
                    self.agents.push(PenAgent::at(x, y));
                    return true;
                }
            }
        }

        if let Some(node) = graph.first_unvisited() {
            self.agents.push(PenAgent::at(node.x, node.y));
            return true;
        }
        false
    }
}
