//! Pooled off-screen render targets and the in-flight render lock.
//!
//! Targets are keyed by exact (width, height, format, gamma) and never evicted
//! individually; the host's reclamation sweep calls [`RenderTargetPool::drain`],
//! which defers while a bake holds the render lock.

use std::cell::Cell;
use std::rc::Rc;

use anyhow::{Result, bail};

use crate::color::LinearColor;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    Rgba8,
    FloatRgba,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TargetDesc {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub force_linear_gamma: bool,
}

/// One pooled target. Owned by the pool; bakes borrow it for a single
/// render + readback and must not retain it afterwards.
#[derive(Clone, Debug)]
pub struct PooledTarget {
    pub desc: TargetDesc,
    pub clear_color: LinearColor,
}

/// RAII token for the single in-flight bake. Dropping it releases the lock.
pub struct RenderLock {
    in_flight: Rc<Cell<usize>>,
}

impl Drop for RenderLock {
    fn drop(&mut self) {
        self.in_flight.set(self.in_flight.get().saturating_sub(1));
    }
}

#[derive(Default)]
pub struct RenderTargetPool {
    targets: Vec<PooledTarget>,
    in_flight: Rc<Cell<usize>>,
}

impl RenderTargetPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the render lock for the duration of one bake. Fails if another
    /// bake is already in flight; overlapping bakes are a caller bug.
    pub fn begin_render(&self) -> Result<RenderLock> {
        if self.in_flight.get() != 0 {
            bail!("a bake is already in flight; bakes must be strictly sequential");
        }
        self.in_flight.set(1);
        Ok(RenderLock {
            in_flight: Rc::clone(&self.in_flight),
        })
    }

    pub fn is_rendering(&self) -> bool {
        self.in_flight.get() != 0
    }

    /// Find a pooled target with exactly the requested properties, or allocate
    /// and pool a new one.
    pub fn acquire(&mut self, desc: TargetDesc) -> &mut PooledTarget {
        if let Some(i) = self.targets.iter().position(|t| t.desc == desc) {
            return &mut self.targets[i];
        }
        self.targets.push(PooledTarget {
            desc,
            clear_color: LinearColor::TRANSPARENT,
        });
        let last = self.targets.len() - 1;
        &mut self.targets[last]
    }

    /// Release every pooled target. Deferred (returns `false`, pool left
    /// intact) while a bake is in flight: reclaiming mid-render would
    /// invalidate the buffer currently being written.
    pub fn drain(&mut self) -> bool {
        if self.is_rendering() {
            return false;
        }
        self.targets.clear();
        true
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}
