//! Retrieval & Context Assembler (spec.md §4.7): composes the plain-text
//! context blob the external agent consumes per turn. The core does not
//! interpret the result further; it is handed back as-is.

mod context;

pub use context::ContextAssembler;
