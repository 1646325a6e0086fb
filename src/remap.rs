//! Deduplicating (mesh, material) pairs ahead of a batched flatten: decides
//! which sections can share one bake and which need their own because
//! per-vertex data leaks into the shading.

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::channel::{BlendMode, MaterialProperty, will_fill_data};
use crate::color::Color;
use crate::flatten::FlattenSettings;
use crate::material::{ChannelAnalysis, SourceMaterial};

/// One level of detail of an input mesh.
#[derive(Clone, Debug, Default)]
pub struct MeshLod {
    /// Per-section index into the scene's material table.
    pub material_map: Vec<usize>,
    /// Painted wedge colors; empty when the LOD carries none.
    pub wedge_colors: Vec<Color>,
}

#[derive(Clone, Debug, Default)]
pub struct InputMesh {
    pub name: String,
    pub lods: Vec<MeshLod>,
}

/// One unique bake job produced by remapping.
#[derive(Clone)]
pub struct MeshMaterialReference {
    pub material: Arc<dyn SourceMaterial>,
    /// The mesh this bake is pinned to, `None` when the bake is shareable
    /// across meshes.
    pub mesh: Option<usize>,
    pub bakes_vertex_data: bool,
}

pub struct RemapResult {
    pub materials: Vec<MeshMaterialReference>,
    /// `material_maps[mesh][lod][section]` indexes into `materials`.
    pub material_maps: Vec<Vec<Vec<usize>>>,
    pub mesh_should_bake_vertex_data: Vec<bool>,
}

// `materials` holds `Arc<dyn SourceMaterial>`, which is not `Debug`, so the
// impl is written by hand and prints material names instead.
impl std::fmt::Debug for RemapResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemapResult")
            .field(
                "materials",
                &self
                    .materials
                    .iter()
                    .map(|m| m.material.name())
                    .collect::<Vec<_>>(),
            )
            .field("material_maps", &self.material_maps)
            .field(
                "mesh_should_bake_vertex_data",
                &self.mesh_should_bake_vertex_data,
            )
            .finish()
    }
}

/// Accumulated input requirements across every channel the flatten would
/// actually bake for this material.
pub fn analyze_material(
    material: &dyn SourceMaterial,
    settings: &FlattenSettings,
) -> ChannelAnalysis {
    let blend = material.blend_mode();
    let mut properties = vec![MaterialProperty::BaseColor];
    if settings.emissive_map {
        properties.push(MaterialProperty::EmissiveColor);
    }
    if settings.normal_map {
        properties.push(MaterialProperty::Normal);
    }
    if settings.metallic_map {
        properties.push(MaterialProperty::Metallic);
    }
    if settings.roughness_map {
        properties.push(MaterialProperty::Roughness);
    }
    if settings.specular_map {
        properties.push(MaterialProperty::Specular);
    }
    if settings.opacity_map {
        match blend {
            BlendMode::Masked => properties.push(MaterialProperty::OpacityMask),
            b if b.is_translucent() => properties.push(MaterialProperty::Opacity),
            _ => {}
        }
    }

    let mut analysis = ChannelAnalysis::default();
    for property in properties {
        if !will_fill_data(blend, property) {
            continue;
        }
        if !material.has_property_connected(property) {
            continue;
        }
        analysis = analysis.merge(material.analyze_property(property));
    }
    analysis
}

/// Collapses every (mesh, LOD, section) material slot down to a list of
/// unique bake jobs and rewritten per-section maps.
///
/// A section whose shading reads painted vertex colors or a second UV set
/// produces per-mesh output and is never shared across meshes. Everything
/// else shares one job per material when `merge_materials` is set, and one
/// job per (mesh, material) otherwise.
pub fn remap_material_indices(
    materials: &[Arc<dyn SourceMaterial>],
    meshes: &[InputMesh],
    settings: &FlattenSettings,
    bake_vertex_data: bool,
    merge_materials: bool,
) -> Result<RemapResult> {
    let mut unique: Vec<MeshMaterialReference> = Vec::new();
    let mut material_maps = Vec::with_capacity(meshes.len());
    let mut mesh_should_bake_vertex_data = vec![false; meshes.len()];

    for (mesh_index, mesh) in meshes.iter().enumerate() {
        let mut lod_maps = Vec::with_capacity(mesh.lods.len());
        for lod in &mesh.lods {
            let mut section_map = Vec::with_capacity(lod.material_map.len());
            for &slot in &lod.material_map {
                let material = materials.get(slot).with_context(|| {
                    format!(
                        "mesh '{}' references material slot {slot}, but only {} materials were given",
                        mesh.name,
                        materials.len()
                    )
                })?;

                let analysis = analyze_material(material.as_ref(), settings);
                let reads_painted_colors =
                    analysis.uses_vertex_color && !lod.wedge_colors.is_empty();
                let bakes_vertex_data =
                    bake_vertex_data && (reads_painted_colors || analysis.texcoord_count >= 2);
                if bakes_vertex_data {
                    mesh_should_bake_vertex_data[mesh_index] = true;
                }

                // Vertex-data bakes are pinned to their mesh; shareable bakes
                // drop the mesh only when cross-mesh merging was requested.
                let mesh_key = if bakes_vertex_data || !merge_materials {
                    Some(mesh_index)
                } else {
                    None
                };

                let found = unique.iter().position(|r| {
                    Arc::ptr_eq(&r.material, material)
                        && r.mesh == mesh_key
                        && r.bakes_vertex_data == bakes_vertex_data
                });
                let index = match found {
                    Some(i) => i,
                    None => {
                        unique.push(MeshMaterialReference {
                            material: Arc::clone(material),
                            mesh: mesh_key,
                            bakes_vertex_data,
                        });
                        unique.len() - 1
                    }
                };
                section_map.push(index);
            }
            lod_maps.push(section_map);
        }
        material_maps.push(lod_maps);
    }

    log::debug!(
        "remapped {} material slots down to {} unique bakes",
        material_maps
            .iter()
            .flatten()
            .map(|sections| sections.len())
            .sum::<usize>(),
        unique.len()
    );

    Ok(RemapResult {
        materials: unique,
        material_maps,
        mesh_should_bake_vertex_data,
    })
}
