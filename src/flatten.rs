//! Flattening a source material: bakes every requested channel into planes
//! of quantized texels that the reconstruction step can pack into a plain
//! textured material.

use std::mem;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::baker::{BakedProperty, TextureBaker};
use crate::channel::{BakedChannel, BlendMode, MaterialProperty};
use crate::color::Color;
use crate::material::SourceMaterial;
use crate::proxy::ProxyCache;
use crate::renderer::{BakeView, TargetRenderer, UvRect};
use crate::target_pool::{PixelFormat, RenderTargetPool};

/// One flattened channel. A zero `size` means the channel was disabled,
/// empty samples mean the bake was skipped or failed, a single sample means
/// the channel collapsed to a uniform value.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct BakedPlane {
    pub size: [u32; 2],
    pub samples: Vec<Color>,
}

impl BakedPlane {
    pub fn sized(size: [u32; 2]) -> Self {
        Self {
            size,
            samples: Vec::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.size[0] > 0 && self.size[1] > 0
    }

    pub fn is_baked(&self) -> bool {
        !self.samples.is_empty()
    }

    pub fn is_uniform(&self) -> bool {
        self.samples.len() == 1
    }
}

/// Which optional channels to flatten and at what resolution. Diffuse is
/// always baked and is not gated here.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct FlattenSettings {
    pub texture_size: [u32; 2],
    pub normal_map: bool,
    pub metallic_map: bool,
    pub roughness_map: bool,
    pub specular_map: bool,
    pub opacity_map: bool,
    pub emissive_map: bool,
}

impl Default for FlattenSettings {
    fn default() -> Self {
        Self {
            texture_size: [1024, 1024],
            normal_map: true,
            metallic_map: false,
            roughness_map: false,
            specular_map: false,
            opacity_map: false,
            emissive_map: true,
        }
    }
}

impl FlattenSettings {
    /// Parse settings from a JSON document; absent fields keep their
    /// defaults.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("parsing flatten settings")
    }
}

/// The full flattened result for one material.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FlattenedMaterial {
    pub diffuse: BakedPlane,
    pub normal: BakedPlane,
    pub metallic: BakedPlane,
    pub roughness: BakedPlane,
    pub specular: BakedPlane,
    pub opacity: BakedPlane,
    pub emissive: BakedPlane,
    /// Multiplier that restores the emissive samples to their HDR range.
    pub emissive_scale: f32,
    /// Stable identity of the source material, for dedup across bakes.
    pub material_id: String,
}

impl FlattenedMaterial {
    pub fn with_settings(settings: &FlattenSettings) -> Self {
        let size = settings.texture_size;
        let optional = |enabled: bool| {
            if enabled {
                BakedPlane::sized(size)
            } else {
                BakedPlane::default()
            }
        };
        Self {
            diffuse: BakedPlane::sized(size),
            normal: optional(settings.normal_map),
            metallic: optional(settings.metallic_map),
            roughness: optional(settings.roughness_map),
            specular: optional(settings.specular_map),
            opacity: optional(settings.opacity_map),
            emissive: optional(settings.emissive_map),
            emissive_scale: 1.0,
            material_id: String::new(),
        }
    }

    pub fn plane(&self, channel: BakedChannel) -> &BakedPlane {
        match channel {
            BakedChannel::Diffuse => &self.diffuse,
            BakedChannel::Normal => &self.normal,
            BakedChannel::Metallic => &self.metallic,
            BakedChannel::Roughness => &self.roughness,
            BakedChannel::Specular => &self.specular,
            BakedChannel::Opacity => &self.opacity,
            BakedChannel::Emissive => &self.emissive,
        }
    }

    pub fn plane_mut(&mut self, channel: BakedChannel) -> &mut BakedPlane {
        match channel {
            BakedChannel::Diffuse => &mut self.diffuse,
            BakedChannel::Normal => &mut self.normal,
            BakedChannel::Metallic => &mut self.metallic,
            BakedChannel::Roughness => &mut self.roughness,
            BakedChannel::Specular => &mut self.specular,
            BakedChannel::Opacity => &mut self.opacity,
            BakedChannel::Emissive => &mut self.emissive,
        }
    }
}

/// Per-material bake inputs: the material itself, the UV window and remap
/// table the bake quad samples with, and the proxy cache carried between
/// channel bakes.
pub struct MaterialMergeData {
    pub material: Arc<dyn SourceMaterial>,
    /// Mesh the material slot came from, when baking a specific mesh's
    /// section rather than the material in isolation.
    pub mesh: Option<usize>,
    pub texcoord_bounds: UvRect,
    pub texcoords: Vec<[f32; 2]>,
    pub material_index: usize,
    pub proxy_cache: ProxyCache,
}

impl MaterialMergeData {
    pub fn new(material: Arc<dyn SourceMaterial>, material_index: usize) -> Self {
        Self {
            material,
            mesh: None,
            texcoord_bounds: UvRect::FULL,
            texcoords: Vec::new(),
            material_index,
            proxy_cache: ProxyCache::new(),
        }
    }

    pub fn bake_view(&self) -> BakeView<'_> {
        BakeView {
            uv_bounds: self.texcoord_bounds,
            texcoords: &self.texcoords,
        }
    }
}

/// Bakes every enabled channel of `data`'s material into `out`.
///
/// A caller running many bakes of the same material can pass
/// `external_cache` to keep the compiled proxies alive across calls; it is
/// swapped in for the duration and swapped back out before returning.
/// A single channel failing to bake is logged and leaves that plane empty
/// rather than aborting the whole material.
pub fn bake_material(
    renderer: &mut dyn TargetRenderer,
    pool: &mut RenderTargetPool,
    data: &mut MaterialMergeData,
    out: &mut FlattenedMaterial,
    mut external_cache: Option<&mut ProxyCache>,
) -> Result<()> {
    if pool.is_rendering() {
        bail!(
            "cannot flatten '{}': another bake is in flight",
            data.material.name()
        );
    }
    log::info!(
        "flattening material '{}' (blend {:?})",
        data.material.name(),
        data.material.blend_mode()
    );

    if let Some(cache) = external_cache.as_deref_mut() {
        mem::swap(cache, &mut data.proxy_cache);
    }

    let blend = data.material.blend_mode();
    let opacity_property = match blend {
        BlendMode::Masked => Some(MaterialProperty::OpacityMask),
        b if b.is_translucent() => Some(MaterialProperty::Opacity),
        _ => None,
    };

    let mut plan: Vec<(BakedChannel, MaterialProperty, bool, PixelFormat)> = vec![(
        BakedChannel::Diffuse,
        MaterialProperty::BaseColor,
        false,
        PixelFormat::Rgba8,
    )];
    if data.material.has_property_connected(MaterialProperty::Normal) {
        plan.push((
            BakedChannel::Normal,
            MaterialProperty::Normal,
            true,
            PixelFormat::Rgba8,
        ));
    }
    for (channel, property) in [
        (BakedChannel::Metallic, MaterialProperty::Metallic),
        (BakedChannel::Roughness, MaterialProperty::Roughness),
        (BakedChannel::Specular, MaterialProperty::Specular),
    ] {
        plan.push((channel, property, false, PixelFormat::Rgba8));
    }
    if let Some(property) = opacity_property {
        if data.material.has_property_connected(property) {
            plan.push((BakedChannel::Opacity, property, true, PixelFormat::Rgba8));
        }
    }
    if data
        .material
        .has_property_connected(MaterialProperty::EmissiveColor)
    {
        plan.push((
            BakedChannel::Emissive,
            MaterialProperty::EmissiveColor,
            true,
            PixelFormat::FloatRgba,
        ));
    }

    let mut baker = TextureBaker::new(renderer, pool);
    for (channel, property, force_linear_gamma, format) in plan {
        let size = out.plane(channel).size;
        if size[0] == 0 || size[1] == 0 {
            continue;
        }
        match baker.bake_channel(data, property, force_linear_gamma, format, size) {
            Ok(BakedProperty {
                size,
                samples,
                emissive_scale,
            }) => {
                let plane = out.plane_mut(channel);
                plane.size = size;
                plane.samples = samples;
                if channel == BakedChannel::Emissive {
                    out.emissive_scale = emissive_scale;
                }
            }
            Err(err) => {
                log::warn!(
                    "baking {channel:?} of '{}' failed, leaving the plane empty: {err:#}",
                    data.material.name()
                );
                out.plane_mut(channel).samples = Vec::new();
            }
        }
    }

    // Channels that never produced samples report a zero size, so consumers
    // see "channel not baked" rather than an enabled-but-empty plane.
    for channel in BakedChannel::ALL {
        let plane = out.plane_mut(channel);
        if !plane.is_baked() {
            plane.size = [0, 0];
        }
    }

    out.material_id = data.material.material_id();

    if let Some(cache) = external_cache {
        mem::swap(cache, &mut data.proxy_cache);
    }
    Ok(())
}

/// Bakes one channel at the resolution of the largest texture the source
/// graph references, floored at `minimum_size`. Normal and opacity bakes
/// always read back linear.
pub fn bake_single_property(
    renderer: &mut dyn TargetRenderer,
    pool: &mut RenderTargetPool,
    data: &mut MaterialMergeData,
    property: MaterialProperty,
    minimum_size: [u32; 2],
) -> Result<BakedProperty> {
    let size = data
        .proxy_cache
        .proxy_for(&data.material, property)
        .max_texture_size(minimum_size);
    let force_linear_gamma = matches!(
        property,
        MaterialProperty::Normal | MaterialProperty::Opacity | MaterialProperty::OpacityMask
    );
    let format = match property {
        MaterialProperty::EmissiveColor => PixelFormat::FloatRgba,
        _ => PixelFormat::Rgba8,
    };
    TextureBaker::new(renderer, pool).bake_channel(data, property, force_linear_gamma, format, size)
}

/// Collapses any plane whose texels all agree down to a single sample.
pub fn optimize_flattened(flattened: &mut FlattenedMaterial) {
    for channel in BakedChannel::ALL {
        let plane = flattened.plane_mut(channel);
        if plane.samples.len() > 1 && plane.samples.iter().all(|&c| c == plane.samples[0]) {
            plane.samples.truncate(1);
            plane.size = [1, 1];
        }
    }
}

/// Writes a quantized plane out as a PNG for inspection or downstream DCC
/// import.
pub fn write_plane_png(plane: &BakedPlane, path: &Path) -> Result<()> {
    if !plane.is_baked() {
        bail!("plane has no samples to write");
    }
    let [width, height] = if plane.is_uniform() {
        [1, 1]
    } else {
        plane.size
    };
    let raw: Vec<u8> = plane
        .samples
        .iter()
        .flat_map(|c| [c.r, c.g, c.b, c.a])
        .collect();
    let img = image::RgbaImage::from_raw(width, height, raw)
        .context("plane sample count does not match its size")?;
    img.save_with_format(path, image::ImageFormat::Png)
        .with_context(|| format!("writing plane to {}", path.display()))?;
    Ok(())
}

/// Writes the emissive plane as a 32-bit float EXR with the HDR scale
/// multiplied back in.
pub fn write_emissive_exr(flattened: &FlattenedMaterial, path: &Path) -> Result<()> {
    let plane = &flattened.emissive;
    if !plane.is_baked() {
        bail!("emissive plane has no samples to write");
    }
    let [width, height] = if plane.is_uniform() {
        [1, 1]
    } else {
        plane.size
    };
    let scale = flattened.emissive_scale;
    let raw: Vec<f32> = plane
        .samples
        .iter()
        .flat_map(|c| {
            let linear = c.to_linear().scaled(scale);
            [linear.r, linear.g, linear.b, 1.0]
        })
        .collect();
    let img = image::Rgba32FImage::from_raw(width, height, raw)
        .context("emissive sample count does not match its size")?;
    img.save_with_format(path, image::ImageFormat::OpenExr)
        .with_context(|| format!("writing emissive to {}", path.display()))?;
    Ok(())
}
