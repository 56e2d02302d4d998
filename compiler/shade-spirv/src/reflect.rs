//! Reflection over SPIR-V modules. The reflection table is computed from the
//! words of a module alone, so it is the same whichever dialect the module is
//! later cross compiled into.
use serde::Serialize;
use shade_pipeline::request::ShaderStage;
use shade_utils::{fxhash::FxHashMap, log};
use thiserror::Error;

use crate::{
    binary::{Instruction, SpirvError, SpirvModule},
    opcode::{decoration, execution_model, op, storage_class},
};

/// Type graphs deeper than this are treated as malformed.
const MAX_TYPE_DEPTH: usize = 64;

/// The kinds of resources that a shader can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    UniformBuffer,
    StorageBuffer,
    SampledImage,
    StorageImage,
    Sampler,
    StageInput,
    StageOutput,
    PushConstantBlock,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::UniformBuffer => "uniform_buffer",
            ResourceKind::StorageBuffer => "storage_buffer",
            ResourceKind::SampledImage => "sampled_image",
            ResourceKind::StorageImage => "storage_image",
            ResourceKind::Sampler => "sampler",
            ResourceKind::StageInput => "stage_input",
            ResourceKind::StageOutput => "stage_output",
            ResourceKind::PushConstantBlock => "push_constant_block",
        }
    }

    /// Whether the resource is bound through a descriptor set.
    pub fn is_descriptor(&self) -> bool {
        !matches!(
            self,
            ResourceKind::StageInput | ResourceKind::StageOutput | ResourceKind::PushConstantBlock
        )
    }
}

/// A single reflected resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReflectedResource {
    /// The name of the resource as declared in the source, or a stable
    /// synthesised name when the module carries none.
    pub name: String,

    pub kind: ResourceKind,

    /// The binding of a descriptor, or the location of a stage input/output.
    pub binding: u32,

    /// The descriptor set, always `0` for stage inputs, outputs and push
    /// constants.
    pub set: u32,

    /// The declared size of buffer blocks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub byte_size: Option<u64>,

    /// The stage of the entry point that uses the resource.
    pub stage: Option<ShaderStage>,
}

/// Two resources of a module claim the same slot.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("`{first}` and `{second}` both use {slot} {binding} of set {set}")]
pub struct BindingConflict {
    /// What kind of slot is shared, a `binding` or a `location`.
    pub slot: &'static str,
    pub set: u32,
    pub binding: u32,
    pub first: String,
    pub second: String,
}

/// Every resource that a shader module declares, grouped by kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReflectionTable {
    pub entry_point: Option<String>,
    pub stage: Option<ShaderStage>,
    pub uniform_buffers: Vec<ReflectedResource>,
    pub storage_buffers: Vec<ReflectedResource>,
    pub sampled_images: Vec<ReflectedResource>,
    pub storage_images: Vec<ReflectedResource>,
    pub samplers: Vec<ReflectedResource>,
    pub stage_inputs: Vec<ReflectedResource>,
    pub stage_outputs: Vec<ReflectedResource>,
    pub push_constant_blocks: Vec<ReflectedResource>,
}

impl ReflectionTable {
    /// The resources of one kind.
    pub fn resources(&self, kind: ResourceKind) -> &[ReflectedResource] {
        match kind {
            ResourceKind::UniformBuffer => &self.uniform_buffers,
            ResourceKind::StorageBuffer => &self.storage_buffers,
            ResourceKind::SampledImage => &self.sampled_images,
            ResourceKind::StorageImage => &self.storage_images,
            ResourceKind::Sampler => &self.samplers,
            ResourceKind::StageInput => &self.stage_inputs,
            ResourceKind::StageOutput => &self.stage_outputs,
            ResourceKind::PushConstantBlock => &self.push_constant_blocks,
        }
    }

    fn resources_mut(&mut self, kind: ResourceKind) -> &mut Vec<ReflectedResource> {
        match kind {
            ResourceKind::UniformBuffer => &mut self.uniform_buffers,
            ResourceKind::StorageBuffer => &mut self.storage_buffers,
            ResourceKind::SampledImage => &mut self.sampled_images,
            ResourceKind::StorageImage => &mut self.storage_images,
            ResourceKind::Sampler => &mut self.samplers,
            ResourceKind::StageInput => &mut self.stage_inputs,
            ResourceKind::StageOutput => &mut self.stage_outputs,
            ResourceKind::PushConstantBlock => &mut self.push_constant_blocks,
        }
    }

    /// Iterate over every resource of the table.
    pub fn iter(&self) -> impl Iterator<Item = &ReflectedResource> {
        self.uniform_buffers
            .iter()
            .chain(&self.storage_buffers)
            .chain(&self.sampled_images)
            .chain(&self.storage_images)
            .chain(&self.samplers)
            .chain(&self.stage_inputs)
            .chain(&self.stage_outputs)
            .chain(&self.push_constant_blocks)
    }

    /// Iterate over the resources that are bound through descriptor sets.
    pub fn descriptors(&self) -> impl Iterator<Item = &ReflectedResource> {
        self.iter().filter(|resource| resource.kind.is_descriptor())
    }

    /// The descriptors bound within the given set.
    pub fn bindings_for_set(&self, set: u32) -> impl Iterator<Item = &ReflectedResource> {
        self.descriptors().filter(move |resource| resource.set == set)
    }

    /// Find a resource by its name.
    pub fn find(&self, name: &str) -> Option<&ReflectedResource> {
        self.iter().find(|resource| resource.name == name)
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    /// Verify that no two descriptors share a `(set, binding)` pair and that
    /// stage inputs and outputs have distinct locations.
    pub fn check_unique_bindings(&self) -> Result<(), BindingConflict> {
        fn check<'r>(
            slot: &'static str,
            resources: impl Iterator<Item = &'r ReflectedResource>,
        ) -> Result<(), BindingConflict> {
            let mut seen: FxHashMap<(u32, u32), &str> = FxHashMap::default();

            for resource in resources {
                if let Some(first) = seen.insert((resource.set, resource.binding), &resource.name) {
                    return Err(BindingConflict {
                        slot,
                        set: resource.set,
                        binding: resource.binding,
                        first: first.to_string(),
                        second: resource.name.clone(),
                    });
                }
            }

            Ok(())
        }

        check("binding", self.descriptors())?;
        check("input location", self.stage_inputs.iter())?;
        check("output location", self.stage_outputs.iter())
    }

    fn sort(&mut self) {
        for list in [
            &mut self.uniform_buffers,
            &mut self.storage_buffers,
            &mut self.sampled_images,
            &mut self.storage_images,
            &mut self.samplers,
            &mut self.stage_inputs,
            &mut self.stage_outputs,
            &mut self.push_constant_blocks,
        ] {
            list.sort_by(|a, b| (a.set, a.binding, &a.name).cmp(&(b.set, b.binding, &b.name)));
        }
    }
}

#[derive(Debug, Clone)]
enum Type {
    Scalar { width: u32 },
    Vector { component: u32, count: u32 },
    Matrix { column: u32, columns: u32 },
    Image { sampled: u32 },
    Sampler,
    SampledImage,
    Array { element: u32, length: u32 },
    RuntimeArray { element: u32 },
    Struct { members: Vec<u32> },
    Pointer { pointee: u32 },
}

#[derive(Debug, Default)]
struct Decorations {
    binding: Option<u32>,
    set: Option<u32>,
    location: Option<u32>,
    array_stride: Option<u32>,
    built_in: bool,
    buffer_block: bool,
}

#[derive(Debug, Default)]
struct MemberDecorations {
    offset: Option<u32>,
    matrix_stride: Option<u32>,
    built_in: bool,
}

#[derive(Debug)]
struct Variable {
    id: u32,
    pointer: u32,
    storage: u32,
}

/// Everything reflection needs from a module, collected in one pass since
/// decorations and names precede the declarations they refer to.
#[derive(Default)]
struct ModuleFacts {
    names: FxHashMap<u32, String>,
    decorations: FxHashMap<u32, Decorations>,
    member_decorations: FxHashMap<(u32, u32), MemberDecorations>,
    types: FxHashMap<u32, Type>,
    constants: FxHashMap<u32, u64>,
    variables: Vec<Variable>,
    entry_point: Option<(String, u32)>,
}

impl ModuleFacts {
    fn collect(module: &SpirvModule<'_>) -> Result<Self, SpirvError> {
        let mut facts = ModuleFacts::default();

        for instruction in module.instructions() {
            facts.record(&instruction?)?;
        }

        Ok(facts)
    }

    fn record(&mut self, inst: &Instruction<'_>) -> Result<(), SpirvError> {
        match inst.opcode {
            op::NAME => {
                let (name, _) = inst.string(1)?;
                self.names.insert(inst.operand(0)?, name);
            }
            op::ENTRY_POINT if self.entry_point.is_none() => {
                let (name, _) = inst.string(2)?;
                self.entry_point = Some((name, inst.operand(0)?));
            }
            op::DECORATE => {
                let entry = self.decorations.entry(inst.operand(0)?).or_default();

                match inst.operand(1)? {
                    decoration::BINDING => entry.binding = Some(inst.operand(2)?),
                    decoration::DESCRIPTOR_SET => entry.set = Some(inst.operand(2)?),
                    decoration::LOCATION => entry.location = Some(inst.operand(2)?),
                    decoration::ARRAY_STRIDE => entry.array_stride = Some(inst.operand(2)?),
                    decoration::BUILT_IN => entry.built_in = true,
                    decoration::BUFFER_BLOCK => entry.buffer_block = true,
                    _ => {}
                }
            }
            op::MEMBER_DECORATE => {
                let key = (inst.operand(0)?, inst.operand(1)?);
                let entry = self.member_decorations.entry(key).or_default();

                match inst.operand(2)? {
                    decoration::OFFSET => entry.offset = Some(inst.operand(3)?),
                    decoration::MATRIX_STRIDE => entry.matrix_stride = Some(inst.operand(3)?),
                    decoration::BUILT_IN => entry.built_in = true,
                    _ => {}
                }
            }
            op::TYPE_BOOL => {
                self.types.insert(inst.operand(0)?, Type::Scalar { width: 32 });
            }
            op::TYPE_INT | op::TYPE_FLOAT => {
                self.types.insert(inst.operand(0)?, Type::Scalar { width: inst.operand(1)? });
            }
            op::TYPE_VECTOR => {
                let ty = Type::Vector { component: inst.operand(1)?, count: inst.operand(2)? };
                self.types.insert(inst.operand(0)?, ty);
            }
            op::TYPE_MATRIX => {
                let ty = Type::Matrix { column: inst.operand(1)?, columns: inst.operand(2)? };
                self.types.insert(inst.operand(0)?, ty);
            }
            op::TYPE_IMAGE => {
                self.types.insert(inst.operand(0)?, Type::Image { sampled: inst.operand(6)? });
            }
            op::TYPE_SAMPLER => {
                self.types.insert(inst.operand(0)?, Type::Sampler);
            }
            op::TYPE_SAMPLED_IMAGE => {
                self.types.insert(inst.operand(0)?, Type::SampledImage);
            }
            op::TYPE_ARRAY => {
                let ty = Type::Array { element: inst.operand(1)?, length: inst.operand(2)? };
                self.types.insert(inst.operand(0)?, ty);
            }
            op::TYPE_RUNTIME_ARRAY => {
                self.types.insert(inst.operand(0)?, Type::RuntimeArray { element: inst.operand(1)? });
            }
            op::TYPE_STRUCT => {
                let members = inst.operands.get(1..).unwrap_or_default().to_vec();
                self.types.insert(inst.operand(0)?, Type::Struct { members });
            }
            op::TYPE_POINTER => {
                self.types.insert(inst.operand(0)?, Type::Pointer { pointee: inst.operand(2)? });
            }
            op::CONSTANT => {
                let low = inst.operand(2)? as u64;
                let high = inst.operands.get(3).copied().unwrap_or(0) as u64;
                self.constants.insert(inst.operand(1)?, (high << 32) | low);
            }
            op::VARIABLE => {
                self.variables.push(Variable {
                    pointer: inst.operand(0)?,
                    id: inst.operand(1)?,
                    storage: inst.operand(2)?,
                });
            }
            _ => {}
        }

        Ok(())
    }

    fn decorations(&self, id: u32) -> Option<&Decorations> {
        self.decorations.get(&id)
    }

    /// Follow array types down to the type of their elements.
    fn strip_arrays(&self, mut id: u32) -> u32 {
        for _ in 0..MAX_TYPE_DEPTH {
            match self.types.get(&id) {
                Some(Type::Array { element, .. } | Type::RuntimeArray { element }) => id = *element,
                _ => break,
            }
        }
        id
    }

    fn classify(&self, variable: &Variable, base: u32) -> Option<ResourceKind> {
        let kind = match variable.storage {
            storage_class::UNIFORM_CONSTANT => match self.types.get(&base)? {
                Type::Image { sampled: 2 } => ResourceKind::StorageImage,
                Type::Image { .. } | Type::SampledImage => ResourceKind::SampledImage,
                Type::Sampler => ResourceKind::Sampler,
                _ => return None,
            },
            storage_class::UNIFORM => {
                if self.decorations(base).is_some_and(|d| d.buffer_block) {
                    ResourceKind::StorageBuffer
                } else {
                    ResourceKind::UniformBuffer
                }
            }
            storage_class::STORAGE_BUFFER => ResourceKind::StorageBuffer,
            storage_class::PUSH_CONSTANT => ResourceKind::PushConstantBlock,
            storage_class::INPUT => ResourceKind::StageInput,
            storage_class::OUTPUT => ResourceKind::StageOutput,
            _ => return None,
        };

        Some(kind)
    }

    /// Whether a stage variable is a built-in, either directly or because it
    /// is a block of built-in members.
    fn is_built_in(&self, variable: &Variable, base: u32) -> bool {
        if self.decorations(variable.id).is_some_and(|d| d.built_in) {
            return true;
        }

        match self.types.get(&base) {
            Some(Type::Struct { members }) => (0..members.len() as u32).any(|member| {
                self.member_decorations.get(&(base, member)).is_some_and(|d| d.built_in)
            }),
            _ => false,
        }
    }

    fn non_empty_name(&self, id: u32) -> Option<&str> {
        self.names.get(&id).map(String::as_str).filter(|name| !name.is_empty())
    }

    /// The declared size of a type, `None` for opaque types and for sizes that
    /// don't fit in 64 bits.
    fn size_of(&self, id: u32, depth: usize) -> Option<u64> {
        if depth > MAX_TYPE_DEPTH {
            return None;
        }

        let size = match self.types.get(&id)? {
            Type::Scalar { width } => (*width as u64).div_ceil(8),
            Type::Vector { component, count } => {
                self.size_of(*component, depth + 1)?.checked_mul(*count as u64)?
            }
            Type::Matrix { column, columns } => {
                self.size_of(*column, depth + 1)?.checked_mul(*columns as u64)?
            }
            Type::Array { element, length } => {
                let length = *self.constants.get(length)?;
                let stride = match self.decorations(id).and_then(|d| d.array_stride) {
                    Some(stride) => stride as u64,
                    None => self.size_of(*element, depth + 1)?,
                };
                length.checked_mul(stride)?
            }
            Type::RuntimeArray { .. } => 0,
            Type::Struct { members } => {
                let mut end = 0;

                for (index, member) in members.iter().enumerate() {
                    let decorations = self.member_decorations.get(&(id, index as u32));
                    let offset = decorations.and_then(|d| d.offset).map_or(end, |offset| offset as u64);

                    let size = match (self.types.get(member), decorations.and_then(|d| d.matrix_stride))
                    {
                        (Some(Type::Matrix { columns, .. }), Some(stride)) => {
                            (*columns as u64).checked_mul(stride as u64)?
                        }
                        _ => self.size_of(*member, depth + 1)?,
                    };

                    end = end.max(offset.checked_add(size)?);
                }

                end
            }
            Type::Image { .. } | Type::Sampler | Type::SampledImage | Type::Pointer { .. } => {
                return None;
            }
        };

        Some(size)
    }
}

fn stage_of(model: u32) -> Option<ShaderStage> {
    match model {
        execution_model::VERTEX => Some(ShaderStage::Vertex),
        execution_model::TESSELLATION_CONTROL => Some(ShaderStage::Hull),
        execution_model::TESSELLATION_EVALUATION => Some(ShaderStage::Domain),
        execution_model::GEOMETRY => Some(ShaderStage::Geometry),
        execution_model::FRAGMENT => Some(ShaderStage::Fragment),
        execution_model::GL_COMPUTE => Some(ShaderStage::Compute),
        _ => None,
    }
}

/// Extract the reflection table of a SPIR-V module.
pub fn extract_reflection(words: &[u32]) -> Result<ReflectionTable, SpirvError> {
    let module = SpirvModule::parse(words)?;
    let facts = ModuleFacts::collect(&module)?;

    let mut table = ReflectionTable::default();
    if let Some((name, model)) = &facts.entry_point {
        table.entry_point = Some(name.clone());
        table.stage = stage_of(*model);
    }

    let stage = table.stage;
    for variable in &facts.variables {
        let Some(Type::Pointer { pointee }) = facts.types.get(&variable.pointer) else {
            continue;
        };

        let base = facts.strip_arrays(*pointee);
        let Some(kind) = facts.classify(variable, base) else {
            continue;
        };

        let decorations = facts.decorations(variable.id);

        let (binding, set) = match kind {
            ResourceKind::StageInput | ResourceKind::StageOutput => {
                if facts.is_built_in(variable, base) {
                    continue;
                }

                let Some(location) = decorations.and_then(|d| d.location) else {
                    log::debug!("skipping stage variable %{} without a location", variable.id);
                    continue;
                };

                (location, 0)
            }
            ResourceKind::PushConstantBlock => (0, 0),
            _ => (
                decorations.and_then(|d| d.binding).unwrap_or(0),
                decorations.and_then(|d| d.set).unwrap_or(0),
            ),
        };

        let name = facts
            .non_empty_name(variable.id)
            .or_else(|| facts.non_empty_name(base))
            .map(str::to_string)
            .unwrap_or_else(|| match kind {
                ResourceKind::StageInput => format!("in_location{binding}"),
                ResourceKind::StageOutput => format!("out_location{binding}"),
                _ => format!("{}_{set}_{binding}", kind.as_str()),
            });

        let byte_size = match kind {
            ResourceKind::UniformBuffer
            | ResourceKind::StorageBuffer
            | ResourceKind::PushConstantBlock => facts.size_of(base, 0),
            _ => None,
        };

        table.resources_mut(kind).push(ReflectedResource {
            name,
            kind,
            binding,
            set,
            byte_size,
            stage,
        });
    }

    table.sort();
    Ok(table)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::binary::tests::Assembler;

    fn entry_point(module: &mut Assembler, model: u32, interface: &[u32]) {
        let mut operands = vec![model, 100];
        operands.extend(Assembler::string("main"));
        operands.extend_from_slice(interface);
        module.emit(op::ENTRY_POINT, &operands);
    }

    /// A fragment shader with a uniform block, a sampled texture, a colour
    /// output and a built-in position input.
    fn fragment_module() -> Vec<u32> {
        let mut module = Assembler::new();
        entry_point(&mut module, execution_model::FRAGMENT, &[10, 12]);
        module
            .name(3, "ParamsData")
            .name(5, "Params")
            .name(8, "Tex")
            .emit(op::DECORATE, &[3, decoration::BLOCK])
            .emit(op::MEMBER_DECORATE, &[3, 0, decoration::OFFSET, 0])
            .emit(op::MEMBER_DECORATE, &[3, 1, decoration::OFFSET, 16])
            .emit(op::DECORATE, &[5, decoration::DESCRIPTOR_SET, 0])
            .emit(op::DECORATE, &[5, decoration::BINDING, 0])
            .emit(op::DECORATE, &[8, decoration::DESCRIPTOR_SET, 0])
            .emit(op::DECORATE, &[8, decoration::BINDING, 1])
            .emit(op::DECORATE, &[10, decoration::LOCATION, 0])
            .emit(op::DECORATE, &[12, decoration::BUILT_IN, 15])
            .emit(op::TYPE_FLOAT, &[1, 32])
            .emit(op::TYPE_VECTOR, &[2, 1, 4])
            .emit(op::TYPE_STRUCT, &[3, 2, 2])
            .emit(op::TYPE_POINTER, &[4, storage_class::UNIFORM, 3])
            .emit(op::VARIABLE, &[4, 5, storage_class::UNIFORM])
            .emit(op::TYPE_IMAGE, &[6, 1, 1, 0, 0, 0, 1, 0])
            .emit(op::TYPE_POINTER, &[7, storage_class::UNIFORM_CONSTANT, 6])
            .emit(op::VARIABLE, &[7, 8, storage_class::UNIFORM_CONSTANT])
            .emit(op::TYPE_POINTER, &[9, storage_class::OUTPUT, 2])
            .emit(op::VARIABLE, &[9, 10, storage_class::OUTPUT])
            .emit(op::TYPE_POINTER, &[11, storage_class::INPUT, 2])
            .emit(op::VARIABLE, &[11, 12, storage_class::INPUT]);
        module.words
    }

    #[test]
    fn fragment_resources_are_reflected() {
        let table = extract_reflection(&fragment_module()).unwrap();
        let stage = Some(ShaderStage::Fragment);

        assert_eq!(table.entry_point.as_deref(), Some("main"));
        assert_eq!(table.stage, stage);
        assert_eq!(table.len(), 3);
        assert_eq!(
            table.uniform_buffers,
            vec![ReflectedResource {
                name: "Params".into(),
                kind: ResourceKind::UniformBuffer,
                binding: 0,
                set: 0,
                byte_size: Some(32),
                stage,
            }]
        );
        assert_eq!(
            table.sampled_images,
            vec![ReflectedResource {
                name: "Tex".into(),
                kind: ResourceKind::SampledImage,
                binding: 1,
                set: 0,
                byte_size: None,
                stage,
            }]
        );
        assert_eq!(table.stage_outputs[0].name, "out_location0");
        assert!(table.stage_inputs.is_empty());
        assert!(table.check_unique_bindings().is_ok());
        assert_eq!(table.bindings_for_set(0).count(), 2);
    }

    #[test]
    fn compute_resources_are_reflected() {
        let mut module = Assembler::new();
        entry_point(&mut module, execution_model::GL_COMPUTE, &[]);
        module
            .name(5, "Output")
            .name(12, "Particles")
            .name(13, "Constants")
            .emit(op::DECORATE, &[5, decoration::DESCRIPTOR_SET, 1])
            .emit(op::DECORATE, &[5, decoration::BINDING, 0])
            .emit(op::DECORATE, &[8, decoration::DESCRIPTOR_SET, 0])
            .emit(op::DECORATE, &[8, decoration::BINDING, 0])
            .emit(op::DECORATE, &[9, decoration::ARRAY_STRIDE, 4])
            .emit(op::DECORATE, &[10, decoration::BLOCK])
            .emit(op::MEMBER_DECORATE, &[10, 0, decoration::OFFSET, 0])
            .emit(op::MEMBER_DECORATE, &[10, 1, decoration::OFFSET, 4])
            .emit(op::DECORATE, &[12, decoration::DESCRIPTOR_SET, 0])
            .emit(op::DECORATE, &[12, decoration::BINDING, 1])
            .emit(op::DECORATE, &[13, decoration::BLOCK])
            .emit(op::MEMBER_DECORATE, &[13, 0, decoration::OFFSET, 0])
            .emit(op::MEMBER_DECORATE, &[13, 1, decoration::OFFSET, 4])
            .emit(op::TYPE_FLOAT, &[1, 32])
            .emit(op::TYPE_INT, &[2, 32, 0])
            .emit(op::TYPE_IMAGE, &[3, 1, 1, 0, 0, 0, 2, 1])
            .emit(op::TYPE_POINTER, &[4, storage_class::UNIFORM_CONSTANT, 3])
            .emit(op::VARIABLE, &[4, 5, storage_class::UNIFORM_CONSTANT])
            .emit(op::TYPE_SAMPLER, &[6])
            .emit(op::TYPE_POINTER, &[7, storage_class::UNIFORM_CONSTANT, 6])
            .emit(op::VARIABLE, &[7, 8, storage_class::UNIFORM_CONSTANT])
            .emit(op::TYPE_RUNTIME_ARRAY, &[9, 1])
            .emit(op::TYPE_STRUCT, &[10, 2, 9])
            .emit(op::TYPE_POINTER, &[11, storage_class::STORAGE_BUFFER, 10])
            .emit(op::VARIABLE, &[11, 12, storage_class::STORAGE_BUFFER])
            .emit(op::TYPE_STRUCT, &[13, 1, 1])
            .emit(op::TYPE_POINTER, &[14, storage_class::PUSH_CONSTANT, 13])
            .emit(op::VARIABLE, &[14, 15, storage_class::PUSH_CONSTANT]);

        let table = extract_reflection(&module.words).unwrap();

        assert_eq!(table.stage, Some(ShaderStage::Compute));
        assert_eq!(table.storage_images[0].name, "Output");
        assert_eq!((table.storage_images[0].set, table.storage_images[0].binding), (1, 0));
        assert_eq!(table.samplers[0].name, "sampler_0_0");
        assert_eq!(table.storage_buffers[0].name, "Particles");
        assert_eq!(table.storage_buffers[0].byte_size, Some(4));
        assert_eq!(table.push_constant_blocks[0].name, "Constants");
        assert_eq!(table.push_constant_blocks[0].byte_size, Some(8));
        assert_eq!(table.len(), 4);
        assert!(table.check_unique_bindings().is_ok());
    }

    #[test]
    fn oversized_arrays_have_no_size() {
        let mut module = Assembler::new();
        entry_point(&mut module, execution_model::FRAGMENT, &[]);
        module
            .name(6, "Huge")
            .emit(op::DECORATE, &[4, decoration::ARRAY_STRIDE, 16])
            .emit(op::DECORATE, &[5, decoration::BLOCK])
            .emit(op::MEMBER_DECORATE, &[5, 0, decoration::OFFSET, 0])
            .emit(op::DECORATE, &[6, decoration::DESCRIPTOR_SET, 0])
            .emit(op::DECORATE, &[6, decoration::BINDING, 0])
            .emit(op::TYPE_FLOAT, &[1, 32])
            .emit(op::TYPE_INT, &[2, 64, 0])
            .emit(op::CONSTANT, &[2, 3, u32::MAX, u32::MAX])
            .emit(op::TYPE_ARRAY, &[4, 1, 3])
            .emit(op::TYPE_STRUCT, &[5, 4])
            .emit(op::TYPE_POINTER, &[7, storage_class::UNIFORM, 5])
            .emit(op::VARIABLE, &[7, 6, storage_class::UNIFORM]);

        let table = extract_reflection(&module.words).unwrap();
        assert_eq!(table.uniform_buffers[0].name, "Huge");
        assert_eq!(table.uniform_buffers[0].byte_size, None);
    }

    #[test]
    fn modules_without_resources_reflect_to_an_empty_table() {
        let mut module = Assembler::new();
        entry_point(&mut module, execution_model::VERTEX, &[]);

        let table = extract_reflection(&module.words).unwrap();
        assert!(table.is_empty());
        assert_eq!(table.stage, Some(ShaderStage::Vertex));
    }

    #[test]
    fn malformed_modules_are_rejected() {
        let mut words = fragment_module();
        words.truncate(words.len() - 2);

        assert!(matches!(extract_reflection(&words), Err(SpirvError::Truncated { .. })));
        assert!(matches!(extract_reflection(&[1, 2, 3, 4, 5]), Err(SpirvError::BadMagic(1))));
    }

    #[test]
    fn duplicate_bindings_are_detected() {
        let mut table = extract_reflection(&fragment_module()).unwrap();
        let mut clash = table.uniform_buffers[0].clone();
        clash.name = "Other".into();
        table.uniform_buffers.push(clash);

        let conflict = table.check_unique_bindings().unwrap_err();
        assert_eq!(
            conflict.to_string(),
            "`Params` and `Other` both use binding 0 of set 0"
        );
    }

    #[test]
    fn tables_serialise_with_the_resource_shape() {
        let table = extract_reflection(&fragment_module()).unwrap();
        let json = serde_json::to_value(&table).unwrap();

        assert_eq!(json["uniform_buffers"][0]["name"], "Params");
        assert_eq!(json["uniform_buffers"][0]["byte_size"], 32);
        assert_eq!(json["sampled_images"][0]["stage"], "fragment");
        assert!(json["sampled_images"][0].get("byte_size").is_none());
    }
}
