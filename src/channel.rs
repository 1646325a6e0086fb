//! Material channel enums and the per-channel bake policy table.

use serde::{Deserialize, Serialize};

/// A compilable output of a shading network.
///
/// `CustomUv` slots are geometry-space passthroughs, not shading outputs; they
/// exist here because the renderer may ask the export proxy for them during a
/// draw.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MaterialProperty {
    BaseColor,
    Metallic,
    Specular,
    Roughness,
    Normal,
    AmbientOcclusion,
    EmissiveColor,
    Opacity,
    OpacityMask,
    WorldPositionOffset,
    CustomUv(u8),
}

/// One of the seven planes stored in a [`FlattenedMaterial`](crate::flatten::FlattenedMaterial).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BakedChannel {
    Diffuse,
    Normal,
    Metallic,
    Roughness,
    Specular,
    Opacity,
    Emissive,
}

impl BakedChannel {
    pub const ALL: [BakedChannel; 7] = [
        BakedChannel::Diffuse,
        BakedChannel::Normal,
        BakedChannel::Metallic,
        BakedChannel::Roughness,
        BakedChannel::Specular,
        BakedChannel::Opacity,
        BakedChannel::Emissive,
    ];
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlendMode {
    #[default]
    Opaque,
    Masked,
    Translucent,
    Additive,
    Modulate,
}

impl BlendMode {
    pub fn is_translucent(self) -> bool {
        matches!(
            self,
            BlendMode::Translucent | BlendMode::Additive | BlendMode::Modulate
        )
    }

    /// Whether surface channels compile from the source graph under this mode.
    pub fn bakes_surface_channels(self) -> bool {
        matches!(self, BlendMode::Opaque | BlendMode::Masked)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaterialDomain {
    #[default]
    Surface,
    DeferredDecal,
    LightFunction,
    PostProcess,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShadingModel {
    #[default]
    DefaultLit,
    Unlit,
}

/// What the export proxy does with a property when it is the bake target.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BakePolicy {
    /// Compile from the source graph under every blend mode.
    CompileAlways,
    /// Compile from the source graph only under Opaque/Masked blend; a zero
    /// constant otherwise.
    CompileOpaqueOnly,
    /// Like `CompileOpaqueOnly`, then remap the signed result into [0,1]
    /// (`v * 0.5 + 0.5`) for texture storage.
    CompileOpaqueRemapped,
    /// Always a zero constant. The bake must sample the rest pose; any
    /// position offset would shift texels.
    ForceZero,
    /// Compile from the source graph with no context isolation at all.
    PassThrough,
}

/// The per-channel policy table. Kept as one explicit match so the gating
/// semantics are visible in a single place.
pub fn bake_policy(property: MaterialProperty) -> BakePolicy {
    match property {
        MaterialProperty::EmissiveColor
        | MaterialProperty::Opacity
        | MaterialProperty::OpacityMask => BakePolicy::CompileAlways,
        MaterialProperty::BaseColor
        | MaterialProperty::Metallic
        | MaterialProperty::Specular
        | MaterialProperty::Roughness
        | MaterialProperty::AmbientOcclusion => BakePolicy::CompileOpaqueOnly,
        MaterialProperty::Normal => BakePolicy::CompileOpaqueRemapped,
        MaterialProperty::WorldPositionOffset => BakePolicy::ForceZero,
        MaterialProperty::CustomUv(_) => BakePolicy::PassThrough,
    }
}

/// Whether a bake of `property` under `blend` can produce non-default data.
/// Callers use this to skip channels that are defined to bake to a constant.
pub fn will_fill_data(blend: BlendMode, property: MaterialProperty) -> bool {
    if property == MaterialProperty::EmissiveColor {
        return true;
    }
    if blend == BlendMode::Opaque {
        return matches!(
            property,
            MaterialProperty::BaseColor
                | MaterialProperty::Specular
                | MaterialProperty::Normal
                | MaterialProperty::Metallic
                | MaterialProperty::Roughness
                | MaterialProperty::AmbientOcclusion
        );
    }
    false
}
