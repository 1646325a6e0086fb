//! The shading-graph compiler boundary and the property-isolation proxy.
//!
//! The real compiler (whatever backend the host uses) is consumed through the
//! [`ShadingCompiler`] capability trait. [`IsolationCompiler`] wraps one of
//! those and answers every context-dependent query with a fixed constant, so
//! that a graph referencing world position, particle state or a camera vector
//! still compiles into something evaluatable off a static quad.

use serde::{Deserialize, Serialize};

use crate::channel::MaterialProperty;
use crate::color::LinearColor;

/// An opaque reference to a value inside a compiler's expression store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ValueHandle(pub usize);

/// Shading value width.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValueType {
    Float1,
    Float2,
    Float3,
    Float4,
}

/// The storage type each material property is force-cast to.
pub fn property_value_type(property: MaterialProperty) -> ValueType {
    match property {
        MaterialProperty::BaseColor
        | MaterialProperty::Normal
        | MaterialProperty::EmissiveColor
        | MaterialProperty::WorldPositionOffset => ValueType::Float3,
        MaterialProperty::Metallic
        | MaterialProperty::Specular
        | MaterialProperty::Roughness
        | MaterialProperty::AmbientOcclusion
        | MaterialProperty::Opacity
        | MaterialProperty::OpacityMask => ValueType::Float1,
        MaterialProperty::CustomUv(_) => ValueType::Float2,
    }
}

/// A named parameter collection referenced by a shading graph. Scalars are
/// packed four to a float4 register; vectors follow, one register each.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ParameterCollection {
    pub name: String,
    pub scalars: Vec<ScalarParameter>,
    pub vectors: Vec<VectorParameter>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScalarParameter {
    pub name: String,
    pub default: f32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VectorParameter {
    pub name: String,
    pub default: LinearColor,
}

/// A parameter's authored default, found by register location.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CollectionValue {
    Scalar(f32),
    Vector(LinearColor),
}

impl ParameterCollection {
    /// Scan the parameter table for the entry bound at
    /// `(parameter_index, component_index)`. Returns `None` when no entry
    /// matches; callers are expected to treat that as "no value" rather than
    /// an error.
    pub fn parameter_at(&self, parameter_index: u32, component_index: u32) -> Option<CollectionValue> {
        for (i, scalar) in self.scalars.iter().enumerate() {
            let register = (i / 4) as u32;
            let component = (i % 4) as u32;
            if register == parameter_index && component == component_index {
                return Some(CollectionValue::Scalar(scalar.default));
            }
        }

        let scalar_registers = self.scalars.len().div_ceil(4) as u32;
        for (i, vector) in self.vectors.iter().enumerate() {
            let register = scalar_registers + i as u32;
            if register == parameter_index && component_index == 0 {
                return Some(CollectionValue::Vector(vector.default));
            }
        }

        None
    }
}

/// The full capability set a shading graph may ask of its compiler.
///
/// Methods returning `Option` may legitimately produce no value ("nothing
/// compiled"); everything else always yields a handle.
pub trait ShadingCompiler {
    // Constants and arithmetic.
    fn constant(&mut self, x: f32) -> ValueHandle;
    fn constant2(&mut self, x: f32, y: f32) -> ValueHandle;
    fn constant3(&mut self, x: f32, y: f32, z: f32) -> ValueHandle;
    fn constant4(&mut self, x: f32, y: f32, z: f32, w: f32) -> ValueHandle;
    fn add(&mut self, a: ValueHandle, b: ValueHandle) -> ValueHandle;
    fn mul(&mut self, a: ValueHandle, b: ValueHandle) -> ValueHandle;
    fn force_cast(&mut self, v: ValueHandle, ty: ValueType) -> ValueHandle;

    // Legitimate per-vertex inputs.
    fn texture_coordinate(&mut self, index: u32) -> ValueHandle;
    fn vertex_color(&mut self) -> ValueHandle;

    // Context-dependent queries.
    fn world_position(&mut self) -> ValueHandle;
    fn object_world_position(&mut self) -> ValueHandle;
    fn actor_world_position(&mut self) -> ValueHandle;
    fn camera_vector(&mut self) -> ValueHandle;
    fn reflection_vector(&mut self) -> ValueHandle;
    fn reflection_about_custom_normal(
        &mut self,
        custom_normal: ValueHandle,
        normalize: bool,
    ) -> ValueHandle;
    fn light_vector(&mut self) -> ValueHandle;
    fn object_radius(&mut self) -> ValueHandle;
    fn object_bounds(&mut self) -> ValueHandle;
    fn distance_cull_fade(&mut self) -> ValueHandle;
    fn particle_relative_time(&mut self) -> ValueHandle;
    fn particle_motion_blur_fade(&mut self) -> ValueHandle;
    fn particle_random(&mut self) -> ValueHandle;
    fn particle_direction(&mut self) -> ValueHandle;
    fn particle_speed(&mut self) -> ValueHandle;
    fn particle_size(&mut self) -> ValueHandle;
    fn atmospheric_fog_color(&mut self, world_position: ValueHandle) -> Option<ValueHandle>;
    fn collection_parameter(
        &mut self,
        collection: &ParameterCollection,
        parameter_index: u32,
        component_index: u32,
    ) -> Option<ValueHandle>;

    /// Compiler-replacement hooks: pick one of two alternative subgraphs.
    fn lightmass_replace(
        &mut self,
        realtime: ValueHandle,
        lightmass: ValueHandle,
    ) -> ValueHandle;
    fn material_proxy_replace(
        &mut self,
        realtime: ValueHandle,
        proxy: ValueHandle,
    ) -> ValueHandle;
}

/// Wraps a real compiler and substitutes deterministic constants for every
/// context the bake quad cannot supply. Arithmetic, constants and per-vertex
/// inputs pass straight through.
pub struct IsolationCompiler<'a> {
    inner: &'a mut dyn ShadingCompiler,
}

impl<'a> IsolationCompiler<'a> {
    pub fn new(inner: &'a mut dyn ShadingCompiler) -> Self {
        Self { inner }
    }
}

impl ShadingCompiler for IsolationCompiler<'_> {
    fn constant(&mut self, x: f32) -> ValueHandle {
        self.inner.constant(x)
    }

    fn constant2(&mut self, x: f32, y: f32) -> ValueHandle {
        self.inner.constant2(x, y)
    }

    fn constant3(&mut self, x: f32, y: f32, z: f32) -> ValueHandle {
        self.inner.constant3(x, y, z)
    }

    fn constant4(&mut self, x: f32, y: f32, z: f32, w: f32) -> ValueHandle {
        self.inner.constant4(x, y, z, w)
    }

    fn add(&mut self, a: ValueHandle, b: ValueHandle) -> ValueHandle {
        self.inner.add(a, b)
    }

    fn mul(&mut self, a: ValueHandle, b: ValueHandle) -> ValueHandle {
        self.inner.mul(a, b)
    }

    fn force_cast(&mut self, v: ValueHandle, ty: ValueType) -> ValueHandle {
        self.inner.force_cast(v, ty)
    }

    fn texture_coordinate(&mut self, index: u32) -> ValueHandle {
        self.inner.texture_coordinate(index)
    }

    // Vertex color is a legitimate per-vertex input, not context.
    fn vertex_color(&mut self) -> ValueHandle {
        self.inner.vertex_color()
    }

    fn world_position(&mut self) -> ValueHandle {
        self.inner.constant3(0.0, 0.0, 0.0)
    }

    fn object_world_position(&mut self) -> ValueHandle {
        self.inner.constant3(0.0, 0.0, 0.0)
    }

    fn actor_world_position(&mut self) -> ValueHandle {
        self.inner.constant3(0.0, 0.0, 0.0)
    }

    fn camera_vector(&mut self) -> ValueHandle {
        self.inner.constant3(0.0, 0.0, 1.0)
    }

    fn reflection_vector(&mut self) -> ValueHandle {
        self.inner.constant3(0.0, 0.0, -1.0)
    }

    fn reflection_about_custom_normal(
        &mut self,
        _custom_normal: ValueHandle,
        _normalize: bool,
    ) -> ValueHandle {
        self.inner.constant3(0.0, 0.0, -1.0)
    }

    fn light_vector(&mut self) -> ValueHandle {
        self.inner.constant3(1.0, 0.0, 0.0)
    }

    fn object_radius(&mut self) -> ValueHandle {
        self.inner.constant(500.0)
    }

    fn object_bounds(&mut self) -> ValueHandle {
        self.inner.constant3(0.0, 0.0, 0.0)
    }

    // Fully visible.
    fn distance_cull_fade(&mut self) -> ValueHandle {
        self.inner.constant(1.0)
    }

    fn particle_relative_time(&mut self) -> ValueHandle {
        self.inner.constant(0.0)
    }

    fn particle_motion_blur_fade(&mut self) -> ValueHandle {
        self.inner.constant(1.0)
    }

    fn particle_random(&mut self) -> ValueHandle {
        self.inner.constant(0.0)
    }

    fn particle_direction(&mut self) -> ValueHandle {
        self.inner.constant3(0.0, 0.0, 0.0)
    }

    fn particle_speed(&mut self) -> ValueHandle {
        self.inner.constant(0.0)
    }

    fn particle_size(&mut self) -> ValueHandle {
        self.inner.constant2(0.0, 0.0)
    }

    fn atmospheric_fog_color(&mut self, _world_position: ValueHandle) -> Option<ValueHandle> {
        None
    }

    /// Resolve the parameter's authored default to a constant. No match in the
    /// collection's table yields no value, silently.
    fn collection_parameter(
        &mut self,
        collection: &ParameterCollection,
        parameter_index: u32,
        component_index: u32,
    ) -> Option<ValueHandle> {
        match collection.parameter_at(parameter_index, component_index)? {
            CollectionValue::Scalar(v) => Some(self.inner.constant(v)),
            CollectionValue::Vector(c) => Some(self.inner.constant4(c.r, c.g, c.b, c.a)),
        }
    }

    fn lightmass_replace(
        &mut self,
        realtime: ValueHandle,
        _lightmass: ValueHandle,
    ) -> ValueHandle {
        realtime
    }

    fn material_proxy_replace(
        &mut self,
        _realtime: ValueHandle,
        proxy: ValueHandle,
    ) -> ValueHandle {
        proxy
    }
}
