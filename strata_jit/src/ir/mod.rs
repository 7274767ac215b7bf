//! Sea-of-nodes intermediate representation.
//!
//! - [`graph`]: arena graph with use lists and control links
//! - [`operators`]: node kinds, location identities, fences
//! - [`stamp`]: static value facts
//! - [`meta`]: resolved VM metadata
//! - [`builder`]: straight-line graph construction

pub mod builder;
pub mod graph;
pub mod meta;
pub mod node;
pub mod operators;
pub mod stamp;

pub use builder::GraphBuilder;
pub use graph::{CommitInfo, Graph, GraphFlags, GraphMethod};
pub use meta::{
    FieldRef, MetaTable, MethodRef, ObjectRef, ResolvedField, ResolvedMethod, ResolvedType,
    TypeRef,
};
pub use node::{Node, NodeId};
pub use operators::{
    BytecodeExceptionKind, CommitRef, CompressEncoding, CompressTarget, Constant,
    ForeignCallDescriptor, InvokeKind, LocationIdentity, MemoryBarriers, MonitorId, NodeKind,
    TemplateFamily,
};
pub use stamp::{ObjectStamp, Stamp};
