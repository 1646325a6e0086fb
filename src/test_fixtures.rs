//! Shared test doubles: an expression-tree compiler that can be evaluated on
//! the CPU, a builder-style source material, and a software quad renderer
//! that drives the real bake path end to end.

use std::collections::HashMap;

use anyhow::{Result, bail};
use half::f16;

use crate::channel::{BlendMode, MaterialProperty};
use crate::color::LinearColor;
use crate::compiler::{ParameterCollection, ShadingCompiler, ValueHandle, ValueType};
use crate::material::{ChannelAnalysis, SourceMaterial};
use crate::proxy::ShadingProxy;
use crate::renderer::{BakeView, PixelData, TargetRenderer};
use crate::target_pool::{PixelFormat, PooledTarget};

/// The sample inputs one evaluated pixel sees.
#[derive(Clone, Copy, Debug, Default)]
pub struct EvalContext {
    pub uv: [f32; 2],
    pub vertex_color: [f32; 4],
}

enum EvalNode {
    Const([f32; 4], ValueType),
    Add(ValueHandle, ValueHandle),
    Mul(ValueHandle, ValueHandle),
    Cast(ValueHandle, ValueType),
    TexCoord(u32),
    VertexColor,
    /// Any context query answered without isolation. Evaluates to an
    /// obviously-wrong value so leaks are visible in assertions.
    ContextSentinel,
}

/// Records the expression tree a graph compiles into and evaluates it per
/// pixel.
#[derive(Default)]
pub struct EvalCompiler {
    nodes: Vec<EvalNode>,
}

fn width(ty: ValueType) -> usize {
    match ty {
        ValueType::Float1 => 1,
        ValueType::Float2 => 2,
        ValueType::Float3 => 3,
        ValueType::Float4 => 4,
    }
}

impl EvalCompiler {
    fn push(&mut self, node: EvalNode) -> ValueHandle {
        self.nodes.push(node);
        ValueHandle(self.nodes.len() - 1)
    }

    fn sentinel(&mut self) -> ValueHandle {
        self.push(EvalNode::ContextSentinel)
    }

    pub fn eval(&self, handle: ValueHandle, ctx: &EvalContext) -> ([f32; 4], ValueType) {
        match &self.nodes[handle.0] {
            EvalNode::Const(v, ty) => (*v, *ty),
            EvalNode::Add(a, b) => self.binary(*a, *b, ctx, |x, y| x + y),
            EvalNode::Mul(a, b) => self.binary(*a, *b, ctx, |x, y| x * y),
            EvalNode::Cast(v, ty) => {
                let (val, from) = self.eval(*v, ctx);
                let mut out = if width(from) == 1 { [val[0]; 4] } else { val };
                if *ty == ValueType::Float3 {
                    out[3] = 1.0;
                }
                (out, *ty)
            }
            EvalNode::TexCoord(0) => ([ctx.uv[0], ctx.uv[1], 0.0, 0.0], ValueType::Float2),
            // Secondary sets evaluate the primary pair reversed, so tests can
            // tell which set a sample came from.
            EvalNode::TexCoord(_) => ([ctx.uv[1], ctx.uv[0], 0.0, 0.0], ValueType::Float2),
            EvalNode::VertexColor => (ctx.vertex_color, ValueType::Float4),
            EvalNode::ContextSentinel => ([99.0; 4], ValueType::Float4),
        }
    }

    fn binary(
        &self,
        a: ValueHandle,
        b: ValueHandle,
        ctx: &EvalContext,
        f: fn(f32, f32) -> f32,
    ) -> ([f32; 4], ValueType) {
        let (av, at) = self.eval(a, ctx);
        let (bv, bt) = self.eval(b, ctx);
        let ty = if width(at) >= width(bt) { at } else { bt };
        let mut out = [0.0; 4];
        for (i, slot) in out.iter_mut().enumerate() {
            let x = if width(at) == 1 { av[0] } else { av[i] };
            let y = if width(bt) == 1 { bv[0] } else { bv[i] };
            *slot = f(x, y);
        }
        (out, ty)
    }
}

impl ShadingCompiler for EvalCompiler {
    fn constant(&mut self, x: f32) -> ValueHandle {
        self.push(EvalNode::Const([x; 4], ValueType::Float1))
    }

    fn constant2(&mut self, x: f32, y: f32) -> ValueHandle {
        self.push(EvalNode::Const([x, y, 0.0, 0.0], ValueType::Float2))
    }

    fn constant3(&mut self, x: f32, y: f32, z: f32) -> ValueHandle {
        self.push(EvalNode::Const([x, y, z, 0.0], ValueType::Float3))
    }

    fn constant4(&mut self, x: f32, y: f32, z: f32, w: f32) -> ValueHandle {
        self.push(EvalNode::Const([x, y, z, w], ValueType::Float4))
    }

    fn add(&mut self, a: ValueHandle, b: ValueHandle) -> ValueHandle {
        self.push(EvalNode::Add(a, b))
    }

    fn mul(&mut self, a: ValueHandle, b: ValueHandle) -> ValueHandle {
        self.push(EvalNode::Mul(a, b))
    }

    fn force_cast(&mut self, v: ValueHandle, ty: ValueType) -> ValueHandle {
        self.push(EvalNode::Cast(v, ty))
    }

    fn texture_coordinate(&mut self, index: u32) -> ValueHandle {
        self.push(EvalNode::TexCoord(index))
    }

    fn vertex_color(&mut self) -> ValueHandle {
        self.push(EvalNode::VertexColor)
    }

    fn world_position(&mut self) -> ValueHandle {
        self.sentinel()
    }

    fn object_world_position(&mut self) -> ValueHandle {
        self.sentinel()
    }

    fn actor_world_position(&mut self) -> ValueHandle {
        self.sentinel()
    }

    fn camera_vector(&mut self) -> ValueHandle {
        self.sentinel()
    }

    fn reflection_vector(&mut self) -> ValueHandle {
        self.sentinel()
    }

    fn reflection_about_custom_normal(
        &mut self,
        _custom_normal: ValueHandle,
        _normalize: bool,
    ) -> ValueHandle {
        self.sentinel()
    }

    fn light_vector(&mut self) -> ValueHandle {
        self.sentinel()
    }

    fn object_radius(&mut self) -> ValueHandle {
        self.sentinel()
    }

    fn object_bounds(&mut self) -> ValueHandle {
        self.sentinel()
    }

    fn distance_cull_fade(&mut self) -> ValueHandle {
        self.sentinel()
    }

    fn particle_relative_time(&mut self) -> ValueHandle {
        self.sentinel()
    }

    fn particle_motion_blur_fade(&mut self) -> ValueHandle {
        self.sentinel()
    }

    fn particle_random(&mut self) -> ValueHandle {
        self.sentinel()
    }

    fn particle_direction(&mut self) -> ValueHandle {
        self.sentinel()
    }

    fn particle_speed(&mut self) -> ValueHandle {
        self.sentinel()
    }

    fn particle_size(&mut self) -> ValueHandle {
        self.sentinel()
    }

    fn atmospheric_fog_color(&mut self, _world_position: ValueHandle) -> Option<ValueHandle> {
        Some(self.sentinel())
    }

    fn collection_parameter(
        &mut self,
        _collection: &ParameterCollection,
        _parameter_index: u32,
        _component_index: u32,
    ) -> Option<ValueHandle> {
        Some(self.sentinel())
    }

    fn lightmass_replace(&mut self, _realtime: ValueHandle, lightmass: ValueHandle) -> ValueHandle {
        lightmass
    }

    fn material_proxy_replace(&mut self, realtime: ValueHandle, _proxy: ValueHandle) -> ValueHandle {
        realtime
    }
}

/// One channel's graph in a [`FixtureMaterial`].
#[derive(Clone, Copy, Debug)]
pub enum GraphExpr {
    Constant([f32; 4]),
    /// Primary UV pair, so baked texels vary across the target.
    UvGradient,
    /// Second UV set.
    SecondaryUv,
    VertexColor,
    CameraVector,
    /// Collection parameter at (parameter_index, component_index).
    Collection(u32, u32),
    /// Compilation fails outright.
    Fails,
}

pub struct FixtureMaterial {
    name: String,
    blend: BlendMode,
    channels: HashMap<MaterialProperty, GraphExpr>,
    texture_sizes: Vec<[u32; 2]>,
    collection: ParameterCollection,
    two_sided: bool,
}

impl FixtureMaterial {
    pub fn new(name: &str, blend: BlendMode) -> Self {
        Self {
            name: name.to_string(),
            blend,
            channels: HashMap::new(),
            texture_sizes: Vec::new(),
            collection: ParameterCollection::default(),
            two_sided: false,
        }
    }

    pub fn with_channel(mut self, property: MaterialProperty, expr: GraphExpr) -> Self {
        self.channels.insert(property, expr);
        self
    }

    pub fn with_texture_sizes(mut self, sizes: Vec<[u32; 2]>) -> Self {
        self.texture_sizes = sizes;
        self
    }

    pub fn with_collection(mut self, collection: ParameterCollection) -> Self {
        self.collection = collection;
        self
    }

    pub fn two_sided(mut self) -> Self {
        self.two_sided = true;
        self
    }
}

impl SourceMaterial for FixtureMaterial {
    fn name(&self) -> &str {
        &self.name
    }

    fn material_id(&self) -> String {
        self.name.clone()
    }

    fn blend_mode(&self) -> BlendMode {
        self.blend
    }

    fn two_sided(&self) -> bool {
        self.two_sided
    }

    fn has_property_connected(&self, property: MaterialProperty) -> bool {
        self.channels.contains_key(&property)
    }

    fn compile_property(
        &self,
        compiler: &mut dyn ShadingCompiler,
        property: MaterialProperty,
    ) -> Result<Option<ValueHandle>> {
        let Some(expr) = self.channels.get(&property) else {
            return Ok(None);
        };
        match *expr {
            GraphExpr::Constant([x, y, z, w]) => Ok(Some(compiler.constant4(x, y, z, w))),
            GraphExpr::UvGradient => Ok(Some(compiler.texture_coordinate(0))),
            GraphExpr::SecondaryUv => Ok(Some(compiler.texture_coordinate(1))),
            GraphExpr::VertexColor => Ok(Some(compiler.vertex_color())),
            GraphExpr::CameraVector => Ok(Some(compiler.camera_vector())),
            GraphExpr::Collection(parameter_index, component_index) => Ok(compiler
                .collection_parameter(&self.collection, parameter_index, component_index)),
            GraphExpr::Fails => bail!("channel {property:?} of '{}' does not compile", self.name),
        }
    }

    fn referenced_texture_sizes(&self) -> Vec<[u32; 2]> {
        self.texture_sizes.clone()
    }

    fn analyze_property(&self, property: MaterialProperty) -> ChannelAnalysis {
        match self.channels.get(&property) {
            Some(GraphExpr::UvGradient) => ChannelAnalysis {
                texcoord_count: 1,
                ..ChannelAnalysis::default()
            },
            Some(GraphExpr::SecondaryUv) => ChannelAnalysis {
                texcoord_count: 2,
                ..ChannelAnalysis::default()
            },
            Some(GraphExpr::VertexColor) => ChannelAnalysis {
                uses_vertex_color: true,
                ..ChannelAnalysis::default()
            },
            _ => ChannelAnalysis::default(),
        }
    }
}

/// Software renderer that compiles the proxy once and evaluates it at every
/// pixel center of the target. The quad always covers the whole target, so
/// the clear color only shows through when the proxy has no output.
pub struct CpuQuadRenderer {
    pub vertex_color: [f32; 4],
}

impl Default for CpuQuadRenderer {
    fn default() -> Self {
        Self {
            vertex_color: [1.0; 4],
        }
    }
}

impl TargetRenderer for CpuQuadRenderer {
    fn render_to_target(
        &mut self,
        proxy: &dyn ShadingProxy,
        view: &BakeView,
        target: &PooledTarget,
    ) -> Result<PixelData> {
        let mut compiler = EvalCompiler::default();
        let output = proxy.compile_output(&mut compiler)?;

        let width = target.desc.width as usize;
        let height = target.desc.height as usize;
        let bounds = view.uv_bounds;

        let mut pixels = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                let linear = match output {
                    None => target.clear_color,
                    Some(handle) => {
                        let ctx = EvalContext {
                            uv: [
                                bounds.min[0]
                                    + (x as f32 + 0.5) / width as f32 * bounds.width(),
                                bounds.min[1]
                                    + (y as f32 + 0.5) / height as f32 * bounds.height(),
                            ],
                            vertex_color: self.vertex_color,
                        };
                        let (value, ty) = compiler.eval(handle, &ctx);
                        let alpha = if ty == ValueType::Float4 { value[3] } else { 1.0 };
                        LinearColor::new(value[0], value[1], value[2], alpha)
                    }
                };
                pixels.push(linear);
            }
        }

        Ok(match target.desc.format {
            PixelFormat::Rgba8 => {
                PixelData::Rgba8(pixels.into_iter().map(LinearColor::to_color).collect())
            }
            PixelFormat::FloatRgba => PixelData::HalfFloat(
                pixels
                    .into_iter()
                    .map(|c| {
                        [
                            f16::from_f32(c.r),
                            f16::from_f32(c.g),
                            f16::from_f32(c.b),
                            f16::from_f32(c.a),
                        ]
                    })
                    .collect(),
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eval_compiler_broadcasts_scalars_in_arithmetic() {
        let mut c = EvalCompiler::default();
        let v = c.constant3(1.0, 2.0, 3.0);
        let s = c.constant(0.5);
        let scaled = c.mul(v, s);
        let (out, ty) = c.eval(scaled, &EvalContext::default());
        assert_eq!(out[..3], [0.5, 1.0, 1.5]);
        assert_eq!(ty, ValueType::Float3);
    }

    #[test]
    fn cast_to_float3_pins_alpha() {
        let mut c = EvalCompiler::default();
        let v = c.constant4(0.1, 0.2, 0.3, 0.4);
        let cast = c.force_cast(v, ValueType::Float3);
        let (out, _) = c.eval(cast, &EvalContext::default());
        assert_eq!(out, [0.1, 0.2, 0.3, 1.0]);
    }

    #[test]
    fn unisolated_context_queries_evaluate_to_the_sentinel() {
        let mut c = EvalCompiler::default();
        let camera = c.camera_vector();
        assert_eq!(c.eval(camera, &EvalContext::default()).0, [99.0; 4]);
    }
}
