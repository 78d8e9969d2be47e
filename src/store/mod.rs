//! L2: node storage. See `node` for the packed node/handle layout, `table` for the lock-free
//! unique table (§3.2, §4.2), `region` for the 512-slot region allocator, `bitset` for the
//! atomic bitmaps backing it, and `gc` for the cooperative mark/sweep/rehash coordinator.

pub mod bitset;
pub mod gc;
pub mod node;
pub mod region;
pub mod table;

pub use node::{Handle, LeafKind, NodeBody};
pub use table::{InsertOutcome, NodeTable, TableWorkerState};
