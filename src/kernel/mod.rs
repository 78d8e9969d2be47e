//! L4: the recursive decision-diagram algorithms (§4.4, §4.5). Every operation here takes a
//! `&mut WorkerContext` and runs the same shape: terminal cases, a GC yield point where it might
//! allocate, a cache probe, recursive cofactor-and-combine, `makenode`, cache publish.

pub mod access;
pub mod apply;
pub mod enumerate;
pub mod flavor;
pub mod info;
pub mod makenode;
pub mod quantify;
pub mod refs;
pub mod relational;
pub mod setops;

pub use flavor::Flavor;
