//! Shader program construction.
//!
//! Stages are WGSL text. Compilation parses and validates them with naga (the
//! same front-end wgpu runs), linking checks the stage interface and merges the
//! reflected uniform block and resource bindings, and uniform names are then
//! resolved once into byte offsets of that block.

pub mod uniforms;

use naga::{
    valid::{Capabilities, ValidationFlags, Validator},
    AddressSpace, Binding, EntryPoint, Handle, ImageClass, ImageDimension, Module, Scalar,
    ScalarKind, ShaderStage, Type, TypeInner, VectorSize,
};
use std::{collections::BTreeMap, fmt};
use thiserror::Error;

pub use self::uniforms::{UniformBlock, UniformLocation, UniformLocations};

/// The single bind group every program resource lives in.
pub const BIND_GROUP: u32 = 0;
/// Binding of the uniform block inside [`BIND_GROUP`].
pub const UNIFORM_BINDING: u32 = 0;
/// Vertex attribute carrying the quad position.
pub const POSITION_LOCATION: u32 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKind {
    Vertex,
    Fragment,
}

impl StageKind {
    fn naga_stage(self) -> ShaderStage {
        match self {
            StageKind::Vertex => ShaderStage::Vertex,
            StageKind::Fragment => ShaderStage::Fragment,
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StageKind::Vertex => "vertex",
            StageKind::Fragment => "fragment",
        })
    }
}

#[derive(Debug, Error)]
pub enum ProgramError {
    /// `ShaderCompileError`
    #[error("{stage} shader failed to compile:\n{log}")]
    Compile { stage: StageKind, log: String },

    /// `ProgramLinkError`
    #[error("program failed to link:\n{log}")]
    Link { log: String },
}

fn link_error(log: impl Into<String>) -> ProgramError {
    ProgramError::Link { log: log.into() }
}

/// A parsed and validated shader stage.
#[derive(Debug, Clone)]
pub struct CompiledStage {
    kind: StageKind,
    source: String,
    entry_point: String,
    entry_index: usize,
    module: Module,
}

impl CompiledStage {
    pub fn kind(&self) -> StageKind {
        self.kind
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }

    fn entry(&self) -> &EntryPoint {
        &self.module.entry_points[self.entry_index]
    }

    /// `@location` inputs of the entry point.
    fn inputs(&self) -> BTreeMap<u32, TypeInner> {
        let mut out = BTreeMap::new();
        for arg in &self.entry().function.arguments {
            collect_locations(&self.module, arg.ty, arg.binding.as_ref(), &mut out);
        }
        out
    }

    /// `@location` outputs of the entry point.
    fn outputs(&self) -> BTreeMap<u32, TypeInner> {
        let mut out = BTreeMap::new();
        if let Some(result) = &self.entry().function.result {
            collect_locations(&self.module, result.ty, result.binding.as_ref(), &mut out);
        }
        out
    }
}

fn collect_locations(
    module: &Module,
    ty: Handle<Type>,
    binding: Option<&Binding>,
    out: &mut BTreeMap<u32, TypeInner>,
) {
    match binding {
        Some(Binding::Location { location, .. }) => {
            out.insert(*location, module.types[ty].inner.clone());
        }
        Some(Binding::BuiltIn(_)) => {}
        None => {
            if let TypeInner::Struct { members, .. } = &module.types[ty].inner {
                for member in members {
                    collect_locations(module, member.ty, member.binding.as_ref(), out);
                }
            }
        }
    }
}

fn position_attribute() -> TypeInner {
    TypeInner::Vector {
        size: VectorSize::Bi,
        scalar: Scalar::F32,
    }
}

// -------------------- Reflection --------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniformType {
    F32,
    I32,
    U32,
    Vec2,
    Vec3,
    Vec4,
    /// Matrices, arrays, nested structs: resolvable but never written.
    Other,
}

impl UniformType {
    fn of(inner: &TypeInner) -> Self {
        match *inner {
            TypeInner::Scalar(Scalar { kind, width: 4 }) => match kind {
                ScalarKind::Float => Self::F32,
                ScalarKind::Sint => Self::I32,
                ScalarKind::Uint => Self::U32,
                _ => Self::Other,
            },
            TypeInner::Vector {
                size,
                scalar: Scalar::F32,
            } => match size {
                VectorSize::Bi => Self::Vec2,
                VectorSize::Tri => Self::Vec3,
                VectorSize::Quad => Self::Vec4,
            },
            _ => Self::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformMember {
    pub name: String,
    pub offset: u32,
    /// Bytes occupied, from the reflected type.
    pub size: u32,
    pub ty: UniformType,
}

impl UniformMember {
    fn overlaps(&self, other: &UniformMember) -> bool {
        self.offset < other.offset + other.size && other.offset < self.offset + self.size
    }
}

/// Reflected layout of the uniform struct at group 0, binding 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformBlockLayout {
    pub size: u32,
    pub members: Vec<UniformMember>,
}

impl UniformBlockLayout {
    pub fn member(&self, name: &str) -> Option<&UniformMember> {
        self.members.iter().find(|m| m.name == name)
    }

    fn reflect(module: &Module) -> Option<Self> {
        let (_, var) = module.global_variables.iter().find(|(_, var)| {
            var.space == AddressSpace::Uniform
                && var
                    .binding
                    .as_ref()
                    .map_or(false, |b| b.group == BIND_GROUP && b.binding == UNIFORM_BINDING)
        })?;

        let inner = &module.types[var.ty].inner;
        let size = inner.size(module.to_ctx());

        let members = match inner {
            TypeInner::Struct { members, .. } => members
                .iter()
                .filter_map(|m| {
                    let member_ty = &module.types[m.ty].inner;
                    Some(UniformMember {
                        name: m.name.clone()?,
                        offset: m.offset,
                        size: member_ty.size(module.to_ctx()),
                        ty: UniformType::of(member_ty),
                    })
                })
                .collect(),
            // A bare `var<uniform> x: f32;` exposes the variable itself.
            other => var
                .name
                .clone()
                .map(|name| UniformMember {
                    name,
                    offset: 0,
                    size,
                    ty: UniformType::of(other),
                })
                .into_iter()
                .collect(),
        };

        Some(Self { size, members })
    }

    fn merge(vertex: Option<Self>, fragment: Option<Self>) -> Result<Option<Self>, ProgramError> {
        let (mut merged, other) = match (vertex, fragment) {
            (Some(v), Some(f)) => (v, f),
            (v, f) => return Ok(v.or(f)),
        };

        for member in other.members {
            if let Some(existing) = merged.member(&member.name) {
                if *existing != member {
                    return Err(link_error(format!(
                        "uniform `{}` is declared differently by the vertex (offset {}, {:?}) \
                         and fragment (offset {}, {:?}) stages",
                        member.name, existing.offset, existing.ty, member.offset, member.ty
                    )));
                }
                continue;
            }
            // Distinct names must not share bytes of the one buffer both stages read.
            if let Some(existing) = merged.members.iter().find(|m| m.overlaps(&member)) {
                return Err(link_error(format!(
                    "uniform `{}` (offset {}, {} bytes) overlaps `{}` (offset {}, {} bytes) \
                     in the shared uniform block",
                    member.name,
                    member.offset,
                    member.size,
                    existing.name,
                    existing.offset,
                    existing.size
                )));
            }
            merged.members.push(member);
        }

        merged.size = merged.size.max(other.size);
        merged.members.sort_by_key(|m| m.offset);
        Ok(Some(merged))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureSample {
    Float,
    Uint,
    Sint,
    Depth,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    UniformBuffer,
    Texture(TextureSample),
    Sampler { comparison: bool },
}

/// One reflected binding of [`BIND_GROUP`] and the stages that declare it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceSlot {
    pub binding: u32,
    pub kind: ResourceKind,
    pub vertex: bool,
    pub fragment: bool,
}

fn reflect_resources(stage: &CompiledStage) -> Result<Vec<ResourceSlot>, ProgramError> {
    let module = &stage.module;
    let mut slots = Vec::new();

    for (_, var) in module.global_variables.iter() {
        let Some(binding) = var.binding.as_ref() else {
            continue;
        };
        let name = var.name.as_deref().unwrap_or("<unnamed>");

        if binding.group != BIND_GROUP {
            return Err(link_error(format!(
                "{} resource `{name}` uses bind group {}; only group {BIND_GROUP} is supported",
                stage.kind, binding.group
            )));
        }

        let kind = match (var.space, &module.types[var.ty].inner) {
            (AddressSpace::Uniform, _) => ResourceKind::UniformBuffer,
            (
                AddressSpace::Handle,
                TypeInner::Image {
                    dim: ImageDimension::D2,
                    arrayed: false,
                    class,
                },
            ) => match class {
                ImageClass::Sampled { kind, multi: false } => match kind {
                    ScalarKind::Float => ResourceKind::Texture(TextureSample::Float),
                    ScalarKind::Uint => ResourceKind::Texture(TextureSample::Uint),
                    ScalarKind::Sint => ResourceKind::Texture(TextureSample::Sint),
                    _ => return Err(unsupported(stage.kind, name)),
                },
                ImageClass::Depth { multi: false } => ResourceKind::Texture(TextureSample::Depth),
                _ => return Err(unsupported(stage.kind, name)),
            },
            (AddressSpace::Handle, TypeInner::Sampler { comparison }) => ResourceKind::Sampler {
                comparison: *comparison,
            },
            _ => return Err(unsupported(stage.kind, name)),
        };

        slots.push(ResourceSlot {
            binding: binding.binding,
            kind,
            vertex: stage.kind == StageKind::Vertex,
            fragment: stage.kind == StageKind::Fragment,
        });
    }

    Ok(slots)
}

fn unsupported(stage: StageKind, name: &str) -> ProgramError {
    link_error(format!(
        "{stage} resource `{name}` is not a uniform block, 2D texture or sampler"
    ))
}

fn merge_resources(
    vertex: Vec<ResourceSlot>,
    fragment: Vec<ResourceSlot>,
) -> Result<Vec<ResourceSlot>, ProgramError> {
    let mut merged: BTreeMap<u32, ResourceSlot> = BTreeMap::new();

    for slot in vertex.into_iter().chain(fragment) {
        match merged.get_mut(&slot.binding) {
            Some(existing) if existing.kind != slot.kind => {
                return Err(link_error(format!(
                    "binding {} is a {:?} in one stage and a {:?} in the other",
                    slot.binding, existing.kind, slot.kind
                )));
            }
            Some(existing) => {
                existing.vertex |= slot.vertex;
                existing.fragment |= slot.fragment;
            }
            None => {
                merged.insert(slot.binding, slot);
            }
        }
    }

    if let Some(slot) = merged.get(&UNIFORM_BINDING) {
        if slot.kind != ResourceKind::UniformBuffer {
            return Err(link_error(format!(
                "binding {UNIFORM_BINDING} is reserved for the uniform block, found {:?}",
                slot.kind
            )));
        }
    }

    Ok(merged.into_values().collect())
}

// -------------------- Program --------------------

/// A linked vertex + fragment pair with its reflected interface.
#[derive(Debug, Clone)]
pub struct ShaderProgram {
    vertex: CompiledStage,
    fragment: CompiledStage,
    uniform_block: Option<UniformBlockLayout>,
    resources: Vec<ResourceSlot>,
}

impl ShaderProgram {
    pub fn vertex(&self) -> &CompiledStage {
        &self.vertex
    }

    pub fn fragment(&self) -> &CompiledStage {
        &self.fragment
    }

    pub fn uniform_block(&self) -> Option<&UniformBlockLayout> {
        self.uniform_block.as_ref()
    }

    pub fn resources(&self) -> &[ResourceSlot] {
        &self.resources
    }

    /// Sample type of the first texture binding, if the program samples one.
    pub fn texture_sample(&self) -> Option<TextureSample> {
        self.resources.iter().find_map(|slot| match slot.kind {
            ResourceKind::Texture(sample) => Some(sample),
            _ => None,
        })
    }
}

/// Compiles stages, links them and resolves uniform names.
pub struct ProgramBuilder {
    validator: Validator,
}

impl Default for ProgramBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgramBuilder {
    pub fn new() -> Self {
        Self {
            validator: Validator::new(ValidationFlags::all(), Capabilities::default()),
        }
    }

    /// Parses and validates one stage; fails with the rendered diagnostic.
    pub fn compile_stage(
        &mut self,
        kind: StageKind,
        source: &str,
    ) -> Result<CompiledStage, ProgramError> {
        let fail = |log: String| ProgramError::Compile { stage: kind, log };

        if source.trim().is_empty() {
            return Err(fail("empty shader source".to_owned()));
        }

        let module =
            naga::front::wgsl::parse_str(source).map_err(|e| fail(e.emit_to_string(source)))?;

        self.validator
            .validate(&module)
            .map_err(|e| fail(e.emit_to_string(source)))?;

        let entry_index = module
            .entry_points
            .iter()
            .position(|ep| ep.stage == kind.naga_stage())
            .ok_or_else(|| fail(format!("no @{kind} entry point")))?;
        let entry_point = module.entry_points[entry_index].name.clone();

        log::debug!("Compiled {kind} stage, entry point `{entry_point}`.");

        Ok(CompiledStage {
            kind,
            source: source.to_owned(),
            entry_point,
            entry_index,
            module,
        })
    }

    /// Checks the stage interface and merges reflection data into a program.
    pub fn link_program(
        &self,
        vertex: CompiledStage,
        fragment: CompiledStage,
    ) -> Result<ShaderProgram, ProgramError> {
        if vertex.kind != StageKind::Vertex || fragment.kind != StageKind::Fragment {
            return Err(link_error(format!(
                "expected a vertex and a fragment stage, got {} and {}",
                vertex.kind, fragment.kind
            )));
        }

        // Attribute contract: only the quad position at location 0.
        for (location, ty) in vertex.inputs() {
            if location != POSITION_LOCATION {
                return Err(link_error(format!(
                    "vertex input @location({location}) is not provided; only \
                     @location({POSITION_LOCATION}) vec2<f32> is bound"
                )));
            }
            if ty != position_attribute() {
                return Err(link_error(format!(
                    "vertex input @location({POSITION_LOCATION}) must be vec2<f32>, found {ty:?}"
                )));
            }
        }

        let produced = vertex.outputs();
        for (location, ty) in fragment.inputs() {
            match produced.get(&location) {
                None => {
                    return Err(link_error(format!(
                        "fragment input @location({location}) is not written by the vertex stage"
                    )));
                }
                Some(out_ty) if *out_ty != ty => {
                    return Err(link_error(format!(
                        "@location({location}) type mismatch: vertex writes {out_ty:?}, \
                         fragment reads {ty:?}"
                    )));
                }
                Some(_) => {}
            }
        }

        let uniform_block = UniformBlockLayout::merge(
            UniformBlockLayout::reflect(&vertex.module),
            UniformBlockLayout::reflect(&fragment.module),
        )?;
        let resources = merge_resources(
            reflect_resources(&vertex)?,
            reflect_resources(&fragment)?,
        )?;

        log::debug!(
            "Linked program: {} uniform members, {} bindings.",
            uniform_block.as_ref().map_or(0, |b| b.members.len()),
            resources.len()
        );

        Ok(ShaderProgram {
            vertex,
            fragment,
            uniform_block,
            resources,
        })
    }

    /// Resolves `names` once; unknown names become absent entries.
    pub fn resolve_uniforms(&self, program: &ShaderProgram, names: &[&str]) -> UniformLocations {
        UniformLocations::resolve(program, names)
    }

    /// compile vertex → compile fragment → link.
    pub fn build(
        &mut self,
        vertex_source: &str,
        fragment_source: &str,
    ) -> Result<ShaderProgram, ProgramError> {
        let vertex = self.compile_stage(StageKind::Vertex, vertex_source)?;
        let fragment = self.compile_stage(StageKind::Fragment, fragment_source)?;
        self.link_program(vertex, fragment)
    }
}
