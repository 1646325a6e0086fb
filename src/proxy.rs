//! The per-(material, channel) export proxy: the minimal shading contract the
//! host renderer consumes during a bake, with every answer forced to fixed
//! export values.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;

use crate::channel::{BakePolicy, BlendMode, MaterialDomain, MaterialProperty, ShadingModel, bake_policy};
use crate::compiler::{IsolationCompiler, ShadingCompiler, ValueHandle, property_value_type};
use crate::material::SourceMaterial;

/// What the renderer sees while drawing a bake quad.
///
/// Most answers are fixed by the export contract: the draw is Opaque and
/// Unlit so the renderer evaluates exactly one output, compilation must be
/// synchronous (an async compile would read back blank pixels), and every
/// shader permutation is cached because export draws go through code paths
/// normal runtime availability checks never exercise. Geometry-affecting
/// flags mirror the source material.
pub trait ShadingProxy {
    /// The one channel this proxy keeps live.
    fn target_property(&self) -> MaterialProperty;

    /// Compile the live output: the target channel, gated by blend mode and
    /// re-encoded per channel policy. `None` means the channel is absent and
    /// the renderer should not draw.
    fn compile_output(&self, compiler: &mut dyn ShadingCompiler) -> Result<Option<ValueHandle>>;

    /// Compile any other property the renderer asks for during the draw.
    fn compile_property(
        &self,
        compiler: &mut dyn ShadingCompiler,
        property: MaterialProperty,
    ) -> Result<Option<ValueHandle>>;

    fn blend_mode(&self) -> BlendMode {
        BlendMode::Opaque
    }

    fn shading_model(&self) -> ShadingModel {
        ShadingModel::Unlit
    }

    fn masked(&self) -> bool {
        false
    }

    fn opacity_mask_clip_value(&self) -> f32 {
        0.5
    }

    fn requires_synchronous_compilation(&self) -> bool {
        true
    }

    fn cache_all_shader_permutations(&self) -> bool {
        true
    }

    fn domain(&self) -> MaterialDomain;
    fn two_sided(&self) -> bool;
    fn dithered_lod_transition(&self) -> bool;
    fn wireframe(&self) -> bool;
    fn special_engine_material(&self) -> bool;
    fn usage_description(&self) -> String;
}

/// A compiled shading handle for one (material, channel) pair.
pub struct ExportProxy {
    material: Arc<dyn SourceMaterial>,
    property: MaterialProperty,
}

impl ExportProxy {
    pub fn new(material: Arc<dyn SourceMaterial>, property: MaterialProperty) -> Self {
        Self { material, property }
    }

    pub fn material(&self) -> &Arc<dyn SourceMaterial> {
        &self.material
    }

    /// Compile the target property through an isolation wrapper.
    fn compile_isolated(
        &self,
        compiler: &mut dyn ShadingCompiler,
        property: MaterialProperty,
    ) -> Result<Option<ValueHandle>> {
        let mut isolated = IsolationCompiler::new(compiler);
        self.material.compile_property(&mut isolated, property)
    }

    /// Largest (LOD-bias-adjusted) dimensions among the textures the source
    /// graph references, floored at `minimum` and never below 1x1.
    pub fn max_texture_size(&self, minimum: [u32; 2]) -> [u32; 2] {
        let mut max = [minimum[0].max(1), minimum[1].max(1)];
        for [w, h] in self.material.referenced_texture_sizes() {
            max[0] = max[0].max(w);
            max[1] = max[1].max(h);
        }
        max
    }
}

impl ShadingProxy for ExportProxy {
    fn target_property(&self) -> MaterialProperty {
        self.property
    }

    fn compile_output(&self, compiler: &mut dyn ShadingCompiler) -> Result<Option<ValueHandle>> {
        let property = self.property;
        let blend = self.material.blend_mode();

        match bake_policy(property) {
            BakePolicy::CompileAlways => {
                let raw = self.compile_isolated(compiler, property)?;
                Ok(raw.map(|v| compiler.force_cast(v, property_value_type(property))))
            }
            BakePolicy::CompileOpaqueOnly => {
                if blend.bakes_surface_channels() {
                    let raw = self.compile_isolated(compiler, property)?;
                    Ok(raw.map(|v| compiler.force_cast(v, property_value_type(property))))
                } else {
                    // Meaningless under translucency; keep the draw benign.
                    Ok(Some(compiler.constant(0.0)))
                }
            }
            BakePolicy::CompileOpaqueRemapped => {
                if blend.bakes_surface_channels() {
                    match self.compile_isolated(compiler, property)? {
                        Some(v) => {
                            // [-1,1] -> [0,1] for texture storage.
                            let half = compiler.constant(0.5);
                            let scaled = compiler.mul(v, half);
                            let remapped = compiler.add(scaled, half);
                            Ok(Some(
                                compiler.force_cast(remapped, property_value_type(property)),
                            ))
                        }
                        None => Ok(None),
                    }
                } else {
                    Ok(Some(compiler.constant(0.0)))
                }
            }
            BakePolicy::ForceZero => Ok(Some(compiler.constant(0.0))),
            BakePolicy::PassThrough => self.material.compile_property(compiler, property),
        }
    }

    fn compile_property(
        &self,
        compiler: &mut dyn ShadingCompiler,
        property: MaterialProperty,
    ) -> Result<Option<ValueHandle>> {
        if property == self.property {
            return self.compile_output(compiler);
        }
        match property {
            // The rest pose must project exactly onto the bake texels.
            MaterialProperty::WorldPositionOffset => Ok(Some(compiler.constant(0.0))),
            // Geometry-space data, forwarded untouched.
            MaterialProperty::CustomUv(_) => self.material.compile_property(compiler, property),
            _ => Ok(Some(compiler.constant(1.0))),
        }
    }

    fn domain(&self) -> MaterialDomain {
        self.material.domain()
    }

    fn two_sided(&self) -> bool {
        self.material.two_sided()
    }

    fn dithered_lod_transition(&self) -> bool {
        self.material.dithered_lod_transition()
    }

    fn wireframe(&self) -> bool {
        self.material.wireframe()
    }

    fn special_engine_material(&self) -> bool {
        self.material.special_engine_material()
    }

    fn usage_description(&self) -> String {
        format!("export proxy for {}", self.material.name())
    }
}

/// One export proxy per channel of a single material, built lazily and reused
/// across bakes to amortize compilation. Dropping the cache releases every
/// proxy and its compiled state.
#[derive(Default)]
pub struct ProxyCache {
    proxies: HashMap<MaterialProperty, Arc<ExportProxy>>,
}

impl ProxyCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve or create the proxy for `property`.
    pub fn proxy_for(
        &mut self,
        material: &Arc<dyn SourceMaterial>,
        property: MaterialProperty,
    ) -> Arc<ExportProxy> {
        Arc::clone(
            self.proxies
                .entry(property)
                .or_insert_with(|| Arc::new(ExportProxy::new(Arc::clone(material), property))),
        )
    }

    pub fn release(&mut self) {
        self.proxies.clear();
    }

    pub fn len(&self) -> usize {
        self.proxies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proxies.is_empty()
    }
}
