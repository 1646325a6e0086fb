//! Turns a flattened material back into a plain textured material
//! description: generated textures plus per-channel bindings, with uniform
//! planes folded into constants and the metallic/roughness/specular planes
//! packed into one texture when their shapes allow it.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::color::{Color, LinearColor};
use crate::flatten::{BakedPlane, FlattenedMaterial};

/// How a generated texture should be sampled by the reconstructed material.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SamplerKind {
    /// sRGB color data.
    Color,
    /// Linear color data.
    LinearColor,
    /// Single linear channel.
    LinearGrayscale,
    /// Tangent-space normals stored remapped to [0, 1].
    Normal,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextureCompression {
    Default,
    Grayscale,
    NormalMap,
}

/// A texture asset produced by reconstruction.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GeneratedTexture {
    pub name: String,
    pub size: [u32; 2],
    pub samples: Vec<Color>,
    pub srgb: bool,
    pub compression: TextureCompression,
}

/// Which components of a sampled texture feed a channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorMask {
    pub r: bool,
    pub g: bool,
    pub b: bool,
    pub a: bool,
}

impl ColorMask {
    pub const RGB: ColorMask = ColorMask::new(true, true, true, false);
    pub const R: ColorMask = ColorMask::new(true, false, false, false);
    pub const G: ColorMask = ColorMask::new(false, true, false, false);
    pub const B: ColorMask = ColorMask::new(false, false, true, false);

    pub const fn new(r: bool, g: bool, b: bool, a: bool) -> Self {
        Self { r, g, b, a }
    }
}

/// What feeds one channel of the reconstructed material. Texture indices
/// point into [`BuiltMaterial::textures`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ChannelSource {
    Texture {
        texture: usize,
        sampler: SamplerKind,
        mask: ColorMask,
    },
    /// Texture sample multiplied by a constant, used to restore HDR emissive.
    ScaledTexture {
        texture: usize,
        sampler: SamplerKind,
        scale: f32,
    },
    Constant(LinearColor),
    Scalar(f32),
}

/// The reconstructed material graph, renderer-agnostic.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MaterialDescription {
    pub name: String,
    pub base_color: Option<ChannelSource>,
    pub metallic: Option<ChannelSource>,
    pub roughness: Option<ChannelSource>,
    pub specular: Option<ChannelSource>,
    pub normal: Option<ChannelSource>,
    pub emissive: Option<ChannelSource>,
    pub opacity: Option<ChannelSource>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuiltMaterial {
    pub description: MaterialDescription,
    pub textures: Vec<GeneratedTexture>,
}

fn scalar_of(plane: &BakedPlane) -> f32 {
    plane.samples[0].r as f32 / 255.0
}

/// A plane needs a texture of its own only when it holds more than one
/// distinct texel.
fn is_textured(plane: &BakedPlane) -> bool {
    plane.samples.len() > 1
}

/// Builds the reconstructed material for `flattened`, named `M_{base_name}`.
pub fn build_material(flattened: &FlattenedMaterial, base_name: &str) -> Result<BuiltMaterial> {
    let mut textures: Vec<GeneratedTexture> = Vec::new();
    let mut description = MaterialDescription {
        name: format!("M_{base_name}"),
        ..MaterialDescription::default()
    };

    let mut push_texture = |textures: &mut Vec<GeneratedTexture>,
                            suffix: &str,
                            plane: &BakedPlane,
                            srgb: bool,
                            compression: TextureCompression| {
        textures.push(GeneratedTexture {
            name: format!("T_{base_name}_{suffix}"),
            size: plane.size,
            samples: plane.samples.clone(),
            srgb,
            compression,
        });
        textures.len() - 1
    };

    // Diffuse.
    if flattened.diffuse.is_baked() {
        description.base_color = Some(if is_textured(&flattened.diffuse) {
            let texture = push_texture(
                &mut textures,
                "D",
                &flattened.diffuse,
                true,
                TextureCompression::Default,
            );
            ChannelSource::Texture {
                texture,
                sampler: SamplerKind::Color,
                mask: ColorMask::RGB,
            }
        } else {
            ChannelSource::Constant(flattened.diffuse.samples[0].to_linear())
        });
    }

    // Metallic, roughness and specular share one packed texture when at
    // least two of them are textured and every textured one matches the
    // diffuse resolution.
    let grayscale = [
        (&flattened.metallic, "M", 0usize),
        (&flattened.roughness, "R", 1usize),
        (&flattened.specular, "S", 2usize),
    ];
    let textured_count = grayscale.iter().filter(|(p, _, _)| is_textured(p)).count();
    let shapes_match = grayscale
        .iter()
        .filter(|(p, _, _)| is_textured(p))
        .all(|(p, _, _)| p.size == flattened.diffuse.size);
    let pack = textured_count >= 2 && shapes_match;

    let packed_texture = if pack {
        let size = flattened.diffuse.size;
        let texel_count = (size[0] as usize) * (size[1] as usize);
        let mut samples = vec![Color::TRANSPARENT; texel_count];
        for (plane, _, component) in &grayscale {
            if !is_textured(plane) {
                continue;
            }
            for (merged, source) in samples.iter_mut().zip(&plane.samples) {
                match component {
                    0 => merged.r = source.r,
                    1 => merged.g = source.g,
                    _ => merged.b = source.b,
                }
            }
        }
        let plane = BakedPlane { size, samples };
        Some(push_texture(
            &mut textures,
            "MRS",
            &plane,
            false,
            TextureCompression::Default,
        ))
    } else {
        None
    };

    for (plane, suffix, component) in grayscale {
        let source = if !plane.is_baked() {
            None
        } else if !is_textured(plane) {
            Some(ChannelSource::Scalar(scalar_of(plane)))
        } else if let Some(texture) = packed_texture {
            let mask = match component {
                0 => ColorMask::R,
                1 => ColorMask::G,
                _ => ColorMask::B,
            };
            Some(ChannelSource::Texture {
                texture,
                sampler: SamplerKind::LinearColor,
                mask,
            })
        } else {
            let texture = push_texture(
                &mut textures,
                suffix,
                plane,
                false,
                TextureCompression::Grayscale,
            );
            Some(ChannelSource::Texture {
                texture,
                sampler: SamplerKind::LinearGrayscale,
                mask: ColorMask::R,
            })
        };
        match component {
            0 => description.metallic = source,
            1 => description.roughness = source,
            _ => description.specular = source,
        }
    }

    // Normal. A single sample is not a meaningful normal map; skip it.
    if is_textured(&flattened.normal) {
        let texture = push_texture(
            &mut textures,
            "N",
            &flattened.normal,
            false,
            TextureCompression::NormalMap,
        );
        description.normal = Some(ChannelSource::Texture {
            texture,
            sampler: SamplerKind::Normal,
            mask: ColorMask::RGB,
        });
    }

    // Emissive. A uniform black plane carries no light and is dropped.
    if flattened.emissive.is_baked() {
        let plane = &flattened.emissive;
        if is_textured(plane) {
            // Emissive samples are normalized linear values; an sRGB decode
            // on sampling would distort them before the scale multiply.
            let texture =
                push_texture(&mut textures, "E", plane, false, TextureCompression::Default);
            description.emissive = Some(ChannelSource::ScaledTexture {
                texture,
                sampler: SamplerKind::LinearColor,
                scale: flattened.emissive_scale,
            });
        } else if plane.samples[0] != Color::BLACK {
            description.emissive = Some(ChannelSource::Constant(
                plane.samples[0].to_linear().scaled(flattened.emissive_scale),
            ));
        }
    }

    // Opacity. Whether this binds opacity or the opacity mask is the
    // caller's call, driven by the source blend mode.
    if flattened.opacity.is_baked() {
        description.opacity = Some(if is_textured(&flattened.opacity) {
            let texture = push_texture(
                &mut textures,
                "O",
                &flattened.opacity,
                false,
                TextureCompression::Grayscale,
            );
            ChannelSource::Texture {
                texture,
                sampler: SamplerKind::LinearGrayscale,
                mask: ColorMask::R,
            }
        } else {
            ChannelSource::Scalar(scalar_of(&flattened.opacity))
        });
    }

    for texture in &textures {
        let expected = (texture.size[0] as usize) * (texture.size[1] as usize);
        (texture.samples.len() == expected)
            .then_some(())
            .with_context(|| {
                format!(
                    "texture '{}' holds {} texels for a {}x{} size",
                    texture.name,
                    texture.samples.len(),
                    texture.size[0],
                    texture.size[1]
                )
            })?;
    }

    Ok(BuiltMaterial {
        description,
        textures,
    })
}
