//! The subset of SPIR-V enumerants that the reader understands.

/// Instruction opcodes.
pub mod op {
    pub const SOURCE_CONTINUED: u16 = 2;
    pub const SOURCE: u16 = 3;
    pub const NAME: u16 = 5;
    pub const STRING: u16 = 7;
    pub const LINE: u16 = 8;
    pub const ENTRY_POINT: u16 = 15;
    pub const TYPE_BOOL: u16 = 20;
    pub const TYPE_INT: u16 = 21;
    pub const TYPE_FLOAT: u16 = 22;
    pub const TYPE_VECTOR: u16 = 23;
    pub const TYPE_MATRIX: u16 = 24;
    pub const TYPE_IMAGE: u16 = 25;
    pub const TYPE_SAMPLER: u16 = 26;
    pub const TYPE_SAMPLED_IMAGE: u16 = 27;
    pub const TYPE_ARRAY: u16 = 28;
    pub const TYPE_RUNTIME_ARRAY: u16 = 29;
    pub const TYPE_STRUCT: u16 = 30;
    pub const TYPE_POINTER: u16 = 32;
    pub const CONSTANT: u16 = 43;
    pub const VARIABLE: u16 = 59;
    pub const DECORATE: u16 = 71;
    pub const MEMBER_DECORATE: u16 = 72;
    pub const NO_LINE: u16 = 317;
    pub const MODULE_PROCESSED: u16 = 330;

    /// Instructions that only carry source level debug information. `OpName`
    /// is not one of them, reflection relies on it.
    pub const DEBUG_SOURCE: [u16; 6] =
        [SOURCE_CONTINUED, SOURCE, STRING, LINE, NO_LINE, MODULE_PROCESSED];
}

/// Decorations.
pub mod decoration {
    pub const BLOCK: u32 = 2;
    pub const BUFFER_BLOCK: u32 = 3;
    pub const ARRAY_STRIDE: u32 = 6;
    pub const MATRIX_STRIDE: u32 = 7;
    pub const BUILT_IN: u32 = 11;
    pub const LOCATION: u32 = 30;
    pub const BINDING: u32 = 33;
    pub const DESCRIPTOR_SET: u32 = 34;
    pub const OFFSET: u32 = 35;
}

/// Storage classes of `OpVariable` and `OpTypePointer`.
pub mod storage_class {
    pub const UNIFORM_CONSTANT: u32 = 0;
    pub const INPUT: u32 = 1;
    pub const UNIFORM: u32 = 2;
    pub const OUTPUT: u32 = 3;
    pub const PUSH_CONSTANT: u32 = 9;
    pub const STORAGE_BUFFER: u32 = 12;
}

/// Execution models of `OpEntryPoint`.
pub mod execution_model {
    pub const VERTEX: u32 = 0;
    pub const TESSELLATION_CONTROL: u32 = 1;
    pub const TESSELLATION_EVALUATION: u32 = 2;
    pub const GEOMETRY: u32 = 3;
    pub const FRAGMENT: u32 = 4;
    pub const GL_COMPUTE: u32 = 5;
}
