//! Draws one material channel into a pooled render target and reads the
//! texels back, with the uniform-channel collapse and HDR normalization the
//! downstream packing steps rely on.

use anyhow::{Result, bail};

use crate::channel::MaterialProperty;
use crate::color::{Color, LinearColor};
use crate::flatten::MaterialMergeData;
use crate::renderer::{PixelData, TargetRenderer};
use crate::target_pool::{PixelFormat, RenderTargetPool, TargetDesc};

/// One baked channel readback.
#[derive(Clone, Debug)]
pub struct BakedProperty {
    /// [1, 1] when the channel collapsed to a uniform value.
    pub size: [u32; 2],
    pub samples: Vec<Color>,
    /// Factor the quantized samples were divided by. 1.0 except for HDR
    /// emissive whose peak exceeded the unit range.
    pub emissive_scale: f32,
}

/// Borrows the host renderer and the target pool for a run of bakes. The two
/// live in separate fields so a target checked out of the pool can be handed
/// to the renderer without fighting the borrow checker.
pub struct TextureBaker<'a> {
    renderer: &'a mut dyn TargetRenderer,
    pool: &'a mut RenderTargetPool,
}

impl<'a> TextureBaker<'a> {
    pub fn new(renderer: &'a mut dyn TargetRenderer, pool: &'a mut RenderTargetPool) -> Self {
        Self { renderer, pool }
    }

    /// Bake `property` of `data`'s material into a `target_size` texture.
    ///
    /// Two passes: the first clears to transparent and reads the channel
    /// back, the second clears to the brightest first-pass texel. If the
    /// second readback is wall-to-wall that texel, the channel is uniform
    /// and the result collapses to a single sample.
    pub fn bake_channel(
        &mut self,
        data: &mut MaterialMergeData,
        property: MaterialProperty,
        force_linear_gamma: bool,
        format: PixelFormat,
        target_size: [u32; 2],
    ) -> Result<BakedProperty> {
        let [width, height] = target_size;
        if width == 0 || height == 0 {
            bail!(
                "cannot bake {property:?} for '{}': requested target is {width}x{height}",
                data.material.name()
            );
        }

        let proxy = data.proxy_cache.proxy_for(&data.material, property);
        let view = data.bake_view();

        let _lock = self.pool.begin_render()?;
        let desc = TargetDesc {
            width,
            height,
            format,
            force_linear_gamma,
        };

        let target = self.pool.acquire(desc);
        target.clear_color = LinearColor::TRANSPARENT;
        let pixels = self.renderer.render_to_target(proxy.as_ref(), &view, target)?;
        let emissive_scale = pixel_scale(&pixels);
        let samples = quantize_pixels(pixels, emissive_scale);

        let expected = (width as usize) * (height as usize);
        if samples.len() != expected {
            bail!(
                "readback for {property:?} of '{}' returned {} texels, expected {expected}",
                data.material.name(),
                samples.len()
            );
        }

        let max = samples
            .iter()
            .copied()
            .max_by_key(|c| c.channel_sum())
            .unwrap_or(Color::TRANSPARENT);

        let target = self.pool.acquire(desc);
        target.clear_color = max.to_linear().scaled(emissive_scale);
        let witness = self.renderer.render_to_target(proxy.as_ref(), &view, target)?;
        let witness = quantize_pixels(witness, emissive_scale);

        if witness.iter().all(|&c| c == max) {
            return Ok(BakedProperty {
                size: [1, 1],
                samples: vec![max],
                emissive_scale,
            });
        }

        Ok(BakedProperty {
            size: target_size,
            samples,
            emissive_scale,
        })
    }
}

/// Normalization factor for an HDR readback: the largest RGB component,
/// floored at 1.0 so LDR content passes through untouched.
fn pixel_scale(pixels: &PixelData) -> f32 {
    match pixels {
        PixelData::Rgba8(_) => 1.0,
        PixelData::HalfFloat(texels) => {
            let mut max = 0.0f32;
            for texel in texels {
                for component in &texel[..3] {
                    max = max.max(f32::from(*component));
                }
            }
            max.max(1.0)
        }
    }
}

fn quantize_pixels(pixels: PixelData, scale: f32) -> Vec<Color> {
    match pixels {
        PixelData::Rgba8(texels) => texels,
        PixelData::HalfFloat(texels) => {
            let inv = 1.0 / scale;
            texels
                .into_iter()
                .map(|t| LinearColor::from_half(t).scaled(inv).to_color())
                .collect()
        }
    }
}
