//! The renderer boundary: a submit-and-flush draw over a UV rectangle that
//! returns raw pixels.

use anyhow::Result;
use half::f16;
use serde::{Deserialize, Serialize};

use crate::color::Color;
use crate::proxy::ShadingProxy;
use crate::target_pool::PooledTarget;

/// A sub-rectangle of a mesh's texture space.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct UvRect {
    pub min: [f32; 2],
    pub max: [f32; 2],
}

impl UvRect {
    /// The whole unit tile.
    pub const FULL: UvRect = UvRect {
        min: [0.0, 0.0],
        max: [1.0, 1.0],
    };

    pub fn width(&self) -> f32 {
        self.max[0] - self.min[0]
    }

    pub fn height(&self) -> f32 {
        self.max[1] - self.min[1]
    }
}

impl Default for UvRect {
    fn default() -> Self {
        UvRect::FULL
    }
}

/// What one bake draw covers: either the full unit tile as a screen-aligned
/// quad, or a mesh sub-region described by its UV bounds and an explicit
/// per-wedge remap table.
#[derive(Clone, Copy, Debug)]
pub struct BakeView<'a> {
    pub uv_bounds: UvRect,
    /// Explicit UV remap table; empty means "draw the full quad".
    pub texcoords: &'a [[f32; 2]],
}

/// Raw pixels read back after a flush.
#[derive(Clone, Debug)]
pub enum PixelData {
    Rgba8(Vec<Color>),
    HalfFloat(Vec<[f16; 4]>),
}

impl PixelData {
    pub fn len(&self) -> usize {
        match self {
            PixelData::Rgba8(v) => v.len(),
            PixelData::HalfFloat(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The consumed host renderer. One call submits a draw of `proxy` across
/// `view` into `target`, flushes the pipeline, and reads the result back.
/// Both 8-bit and half-float target formats must be supported.
pub trait TargetRenderer {
    fn render_to_target(
        &mut self,
        proxy: &dyn ShadingProxy,
        view: &BakeView,
        target: &PooledTarget,
    ) -> Result<PixelData>;
}
