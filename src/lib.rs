//! Scrawl turns a raster photograph into a hand-drawn-looking line sketch.
//!
//! The engine simulates a pool of "pen" agents wandering across the dark
//! regions of an image: analysis derives a sparse graph of drawable pixels,
//! agents traverse it with momentum-biased pathfinding, and every move
//! leaves a stroke whose opacity follows the local darkness and visit
//! history.
//!
//! # Pipeline overview
//!
//! 1. **Decode**: [`SourceImage`] wraps decoded RGBA pixels
//! 2. **Analyze**: [`analyze_image`] fits the image into the surface and
//!    builds the [`PixelGraph`] (done once per image/resize, never per tick)
//! 3. **Step**: [`SketchSession::step`] advances every agent one graph edge
//!    and queues stroke segments
//! 4. **Drive**: [`LiveRunner`] paces steps across animation frames;
//!    [`render_batch`] loops synchronously for instant snapshots
//!
//! Both drivers share the identical step function; a fixed `seed` in
//! [`EngineOpts`] makes a whole run reproducible.
//!
//! The engine performs no file IO, network calls, or encoding: input is a
//! decoded image plus options, output is the mutated surface readback and
//! the fitted bounds for cropping.
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod analyze;
mod engine;
mod foundation;
mod render;

pub use analyze::decode::SourceImage;
pub use analyze::graph::{Analysis, PixelGraph, PixelNode, analyze_image, brightness, intensity};
pub use engine::agent::{AgentPool, PenAgent};
pub use engine::options::{ColorMode, EngineOpts, SeedRanking};
pub use engine::session::SketchSession;
pub use engine::strategy::{BatchStats, LiveRunner, RunPhase, render_batch};
pub use foundation::core::{Canvas, FittedBounds};
pub use foundation::error::{ScrawlError, ScrawlResult};
pub use render::surface::{FrameRGBA, StrokeSegment, Surface};
