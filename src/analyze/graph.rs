use std::collections::HashMap;

use rayon::prelude::*;

use crate::analyze::decode::SourceImage;
use crate::analyze::fit::fit_image;
use crate::engine::options::EngineOpts;
use crate::foundation::core::{Canvas, FittedBounds};

/// Alpha cutoff (0-255): pixels at or below are ignored by analysis.
const ALPHA_CUTOFF: u8 = 128;

/// Summed-channel brightness of a pixel, `0..=765`.
pub fn brightness(r: u8, g: u8, b: u8) -> u32 {
    u32::from(r) + u32::from(g) + u32::from(b)
}

/// Normalized darkness strength of a pixel relative to the threshold.
///
/// `max(0, 1 - brightness / threshold)`; a threshold at or below zero is
/// defined as "no pixel ever matches" and yields 0 rather than a division
/// error.
pub fn intensity(brightness: u32, threshold: f32) -> f32 {
    if threshold <= 0.0 {
        return 0.0;
    }
    (1.0 - brightness as f32 / threshold).max(0.0)
}

/// One traversable node: a source pixel dark enough to draw.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PixelNode {
    /// Raster x coordinate within the fitted image.
    pub x: i32,
    /// Raster y coordinate within the fitted image.
    pub y: i32,
    /// Times any agent has stood on this node. Monotonically increasing.
    pub visit_count: u32,
    /// Darkness strength in `[0, 1]`.
    pub intensity: f32,
    /// Source color, used by the `color` stroke mode.
    pub color: [u8; 3],
}

/// Sparse graph of drawable pixels plus the run's coverage counters.
///
/// Nodes are stored in row-major analysis order; the side index maps
/// `(x, y)` to the node slot. Insertion order matters: the spawn fallback
/// scans it, so two analyses of the same image see the same order.
#[derive(Clone, Debug, Default)]
pub struct PixelGraph {
    nodes: Vec<PixelNode>,
    index: HashMap<(i32, i32), u32>,
    total_dark: usize,
    drawn_dark: usize,
}

impl PixelGraph {
    pub(crate) fn from_nodes(nodes: Vec<PixelNode>) -> Self {
        let index = nodes
            .iter()
            .enumerate()
            .map(|(i, n)| ((n.x, n.y), i as u32))
            .collect();
        let total_dark = nodes.len();
        Self {
            nodes,
            index,
            total_dark,
            drawn_dark: 0,
        }
    }

    /// Node at integer coordinates, if one passed the darkness filter.
    pub fn get(&self, x: i32, y: i32) -> Option<&PixelNode> {
        self.index.get(&(x, y)).map(|&i| &self.nodes[i as usize])
    }

    pub(crate) fn get_mut(&mut self, x: i32, y: i32) -> Option<&mut PixelNode> {
        let i = *self.index.get(&(x, y))?;
        Some(&mut self.nodes[i as usize])
    }

    /// Record an agent standing on `(x, y)`. Returns whether a node exists
    /// there; a first visit advances the coverage counter.
    pub(crate) fn record_visit(&mut self, x: i32, y: i32) -> bool {
        let Some(&i) = self.index.get(&(x, y)) else {
            return false;
        };
        let node = &mut self.nodes[i as usize];
        if node.visit_count == 0 {
            self.drawn_dark += 1;
        }
        node.visit_count += 1;
        true
    }

    /// First never-visited node in analysis order (spawn fallback).
    pub(crate) fn first_unvisited(&self) -> Option<&PixelNode> {
        self.nodes.iter().find(|n| n.visit_count == 0)
    }

    /// All nodes in analysis (row-major) order.
    pub fn nodes(&self) -> &[PixelNode] {
        &self.nodes
    }

    /// Number of nodes in the graph.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Graph size at analysis time; fixed for the graph's lifetime.
    pub fn total_dark(&self) -> usize {
        self.total_dark
    }

    /// Nodes visited at least once so far.
    pub fn drawn_dark(&self) -> usize {
        self.drawn_dark
    }

    /// Whether every node has been visited (vacuously true when empty).
    pub fn complete(&self) -> bool {
        self.drawn_dark >= self.total_dark
    }

    /// `drawn / total` in `[0, 1]`; 1.0 for an empty graph.
    pub fn coverage(&self) -> f32 {
        if self.total_dark == 0 {
            return 1.0;
        }
        self.drawn_dark as f32 / self.total_dark as f32
    }
}

/// Result of analyzing one source image against a surface.
#[derive(Clone, Debug)]
pub struct Analysis {
    /// The traversal graph. Replaces any previous graph entirely.
    pub graph: PixelGraph,
    /// Placement of the fitted image inside the surface.
    pub bounds: FittedBounds,
}

/// Build the pixel-node graph for `source` fitted into `canvas`.
///
/// This is the dominant cost of a run, `O(fitted pixel count)`, and happens
/// once per image/resize/geometry change, never per tick. Rows are scanned
/// in parallel; per-row results are concatenated in row order so the output
/// is identical to a sequential scan.
#[tracing::instrument(skip(source, opts), fields(src_w = source.width(), src_h = source.height()))]
pub fn analyze_image(
    source: &SourceImage,
    canvas: Canvas,
    opts: &EngineOpts,
    max_dimension: Option<u32>,
) -> Analysis {
    let bounds = fit_image(
        source.width(),
        source.height(),
        canvas,
        opts.scale_factor,
        max_dimension,
    );
    let (raster_w, raster_h) = bounds.raster_size();
    if raster_w == 0 || raster_h == 0 {
        return Analysis {
            graph: PixelGraph::default(),
            bounds,
        };
    }

    let pixels = source.resize_to(raster_w, raster_h);
    let threshold = opts.threshold;

    let rows: Vec<Vec<PixelNode>> = (0..raster_h)
        .into_par_iter()
        .map(|y| {
            let mut row = Vec::new();
            for x in 0..raster_w {
                let [r, g, b, a] = pixels.get_pixel(x, y).0;
                if a <= ALPHA_CUTOFF {
                    continue;
                }
                let bright = brightness(r, g, b);
                if (bright as f32) < threshold {
                    row.push(PixelNode {
                        x: x as i32,
                        y: y as i32,
                        visit_count: 0,
                        intensity: intensity(bright, threshold),
                        color: [r, g, b],
                    });
                }
            }
            row
        })
        .collect();

    let graph = PixelGraph::from_nodes(rows.into_iter().flatten().collect());
    tracing::debug!(
        nodes = graph.len(),
        raster_w,
        raster_h,
        "image analysis complete"
    );
    Analysis { graph, bounds }
}
