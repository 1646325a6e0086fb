//! The source-material boundary: what the baking pipeline needs to know about
//! a host shading network.

use anyhow::Result;

use crate::channel::{BlendMode, MaterialDomain, MaterialProperty};
use crate::compiler::{ShadingCompiler, ValueHandle};

/// Static analysis of one property's per-vertex input requirements.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChannelAnalysis {
    /// Highest UV-coordinate-set index the property reads, plus one.
    pub texcoord_count: u32,
    pub uses_vertex_color: bool,
}

impl ChannelAnalysis {
    pub fn merge(self, other: ChannelAnalysis) -> ChannelAnalysis {
        ChannelAnalysis {
            texcoord_count: self.texcoord_count.max(other.texcoord_count),
            uses_vertex_color: self.uses_vertex_color || other.uses_vertex_color,
        }
    }
}

/// A host shading network, consumed by the export proxy.
///
/// `compile_property` should emit the channel's authored default when nothing
/// is connected but the channel exists; it returns `Ok(None)` only when the
/// channel is genuinely absent from the graph, which bakes as "channel not
/// present".
pub trait SourceMaterial {
    fn name(&self) -> &str;

    /// Identity token copied verbatim into the flattened output.
    fn material_id(&self) -> String;

    fn blend_mode(&self) -> BlendMode;

    fn domain(&self) -> MaterialDomain {
        MaterialDomain::Surface
    }

    fn two_sided(&self) -> bool {
        false
    }

    fn dithered_lod_transition(&self) -> bool {
        false
    }

    fn wireframe(&self) -> bool {
        false
    }

    fn special_engine_material(&self) -> bool {
        false
    }

    /// Whether the property has anything connected in the source graph.
    fn has_property_connected(&self, property: MaterialProperty) -> bool;

    /// Compile one property of the graph through the given compiler.
    fn compile_property(
        &self,
        compiler: &mut dyn ShadingCompiler,
        property: MaterialProperty,
    ) -> Result<Option<ValueHandle>>;

    /// Dimensions of every texture the graph references, LOD bias already
    /// applied. Used by the texture-resolution policy.
    fn referenced_texture_sizes(&self) -> Vec<[u32; 2]> {
        Vec::new()
    }

    /// Static analysis of one property's input requirements.
    fn analyze_property(&self, property: MaterialProperty) -> ChannelAnalysis;
}
