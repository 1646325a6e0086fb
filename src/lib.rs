//! Material flattening: bakes arbitrary procedural shading networks down to
//! fixed texture maps and reconstructs a plain textured material from them.
//!
//! The pipeline is renderer-agnostic. A host plugs in at three seams:
//! [`material::SourceMaterial`] exposes its shading graphs,
//! [`compiler::ShadingCompiler`] exposes its graph compiler, and
//! [`renderer::TargetRenderer`] draws a compiled proxy into a render target
//! and reads the texels back. Everything between those seams lives here:
//! per-channel export proxies, context isolation, the render-target pool,
//! uniform-channel collapse, HDR emissive normalization, texture packing and
//! (mesh, material) dedup ahead of batched bakes.

pub mod baker;
pub mod channel;
pub mod color;
pub mod compiler;
pub mod flatten;
pub mod material;
pub mod proxy;
pub mod reconstruct;
pub mod remap;
pub mod renderer;
pub mod target_pool;

#[cfg(test)]
pub mod test_fixtures;

pub use baker::{BakedProperty, TextureBaker};
pub use channel::{BakedChannel, BlendMode, MaterialProperty};
pub use color::{Color, LinearColor};
pub use flatten::{
    FlattenSettings, FlattenedMaterial, MaterialMergeData, bake_material, bake_single_property,
    optimize_flattened,
};
pub use material::SourceMaterial;
pub use proxy::{ExportProxy, ProxyCache, ShadingProxy};
pub use reconstruct::{BuiltMaterial, MaterialDescription, build_material};
pub use remap::{InputMesh, MeshLod, RemapResult, remap_material_indices};
pub use renderer::{BakeView, PixelData, TargetRenderer, UvRect};
pub use target_pool::{PixelFormat, RenderTargetPool, TargetDesc};
