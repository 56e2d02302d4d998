//! SPIR-V binary utilities. This crate reads SPIR-V modules word by word
//! without building any intermediate representation, which is enough to
//! extract reflection data and to strip source level debug information.
pub mod binary;
pub mod opcode;
pub mod reflect;

pub use binary::{SpirvError, SpirvModule};
pub use reflect::{ReflectedResource, ReflectionTable, ResourceKind, extract_reflection};
