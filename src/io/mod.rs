//! L5: skiplist-based binary (de)serialization (§4.6, §6.2). A `Writer` collects one or more DD
//! roots and assigns every reachable node a dense local id so the on-disk form never mentions the
//! node store's sparse global indices; a `Reader` rebuilds bottom-up through `makenode`, which
//! reinterns every node into the current store.

use std::io::{Read, Write};

use fxhash::FxHashMap;

use crate::error::{EngineError, Result};
use crate::kernel::access::is_leaf;
use crate::kernel::flavor::Flavor;
use crate::kernel::makenode::{intern_leaf, makenode};
use crate::runtime::WorkerContext;
use crate::store::node::{pack, unpack, NodeBody};
use crate::store::Handle;

fn io_err(action: &'static str) -> impl FnOnce(std::io::Error) -> EngineError {
    move |source| EngineError::Io { action, source }
}

fn write_u64<W: Write>(out: &mut W, v: u64) -> Result<()> {
    out.write_all(&v.to_le_bytes()).map_err(io_err("writing a u64 field"))
}

fn read_u64<R: Read>(input: &mut R) -> Result<u64> {
    let mut buf = [0u8; 8];
    input.read_exact(&mut buf).map_err(io_err("reading a u64 field"))?;
    Ok(u64::from_le_bytes(buf))
}

/// Accumulates the roots of a serialization session (§6.1 `writer_start`/`writer_add`/
/// `writer_write_binary`/`writer_get`/`writer_end`).
#[derive(Default)]
pub struct Writer {
    roots: Vec<Handle>,
}

impl Writer {
    pub fn start() -> Writer {
        Writer { roots: Vec::new() }
    }

    /// Register a root to include in the next `write_binary`; returns its position so a caller
    /// can later ask `get` which handle a given write-slot held.
    pub fn add(&mut self, dd: Handle) -> usize {
        self.roots.push(dd);
        self.roots.len() - 1
    }

    pub fn get(&self, slot: usize) -> Option<Handle> {
        self.roots.get(slot).copied()
    }

    pub fn end(self) {}

    fn assign_ids(&self, table: &crate::store::NodeTable) -> (FxHashMap<u64, u64>, Vec<u64>) {
        let mut local_id: FxHashMap<u64, u64> = FxHashMap::default();
        let mut order: Vec<u64> = Vec::new();

        fn visit(table: &crate::store::NodeTable, idx: u64, local_id: &mut FxHashMap<u64, u64>, order: &mut Vec<u64>) {
            if idx <= 1 || local_id.contains_key(&idx) {
                return;
            }
            if let NodeBody::Internal { low, high, .. } = table.body(idx) {
                visit(table, low, local_id, order);
                visit(table, high, local_id, order);
            }
            let id = 2 + order.len() as u64;
            local_id.insert(idx, id);
            order.push(idx);
        }

        for root in &self.roots {
            visit(table, root.index(), &mut local_id, &mut order);
        }
        (local_id, order)
    }

    /// Write every reachable node plus the root table in the format of §6.2: `u64 node_count`,
    /// `node_count` two-`u64` node records (child fields rewritten to dense ids), `i32 dd_count`,
    /// then `dd_count` `u64` root-handle records.
    pub fn write_binary<W: Write>(&self, table: &crate::store::NodeTable, out: &mut W) -> Result<()> {
        let (local_id, order) = self.assign_ids(table);

        write_u64(out, order.len() as u64)?;
        for &global in &order {
            let body = table.body(global);
            let remapped = match body {
                NodeBody::Internal { variable, low, high, high_complement } => {
                    let remap = |idx: u64| if idx <= 1 { idx } else { local_id[&idx] };
                    NodeBody::Internal { variable, low: remap(low), high: remap(high), high_complement }
                }
                leaf @ NodeBody::Leaf { .. } => leaf,
            };
            let (w0, w1) = pack(remapped);
            write_u64(out, w0)?;
            write_u64(out, w1)?;
        }

        out.write_all(&(self.roots.len() as i32).to_le_bytes()).map_err(io_err("writing dd_count"))?;
        for root in &self.roots {
            let local_index = if root.index() <= 1 { root.index() } else { local_id[&root.index()] };
            let rewritten = Handle::new(local_index, root.is_complemented(), root.is_leaf(), root.tag());
            write_u64(out, rewritten.raw())?;
        }
        Ok(())
    }
}

/// Rebuilds DDs from a byte stream produced by `Writer::write_binary` (§6.1 `reader_read_binary`/
/// `reader_get`/`reader_end`).
pub struct Reader {
    roots: Vec<Handle>,
}

impl Reader {
    /// `flavor` governs which reduction rule `makenode` applies while reinterning each node —
    /// must match the flavor the DD was originally built under.
    pub fn read_binary<R: Read>(ctx: &mut WorkerContext, flavor: Flavor, input: &mut R) -> Result<Reader> {
        let node_count = read_u64(input)?;
        // index 0/1 are the reserved false/true terminals; real records start at local id 2.
        let mut table_map: Vec<u64> = vec![0, 1];

        let resolve_child = |ctx: &WorkerContext, table_map: &[u64], local: u64, complement: bool| -> Handle {
            let global = if local <= 1 { local } else { table_map[local as usize] };
            if global <= 1 {
                Handle::new(global, complement, false, 0)
            } else {
                let leaf = is_leaf(&ctx.store, Handle::new(global, false, false, 0));
                Handle::new(global, complement, leaf, 0)
            }
        };

        for _ in 0..node_count {
            let w0 = read_u64(input)?;
            let w1 = read_u64(input)?;
            let result = match unpack(w0, w1) {
                NodeBody::Internal { variable, low, high, high_complement } => {
                    let low_h = resolve_child(ctx, &table_map, low, false);
                    let high_h = resolve_child(ctx, &table_map, high, high_complement);
                    makenode(ctx, flavor, variable, low_h, high_h)
                }
                NodeBody::Leaf { kind, payload } => intern_leaf(ctx, kind, payload),
            };
            table_map.push(result.index());
        }

        let mut dd_count_bytes = [0u8; 4];
        input.read_exact(&mut dd_count_bytes).map_err(io_err("reading dd_count"))?;
        let dd_count = i32::from_le_bytes(dd_count_bytes);
        if dd_count < 0 {
            return Err(EngineError::CorruptStream("negative dd_count"));
        }

        let mut roots = Vec::with_capacity(dd_count as usize);
        for _ in 0..dd_count {
            let raw = read_u64(input)?;
            let h = Handle::from_raw(raw);
            let local_index = h.index();
            let global = if local_index <= 1 { local_index } else { table_map[local_index as usize] };
            roots.push(Handle::new(global, h.is_complemented(), h.is_leaf(), h.tag()));
        }

        Ok(Reader { roots })
    }

    pub fn get(&self, slot: usize) -> Option<Handle> {
        self.roots.get(slot).copied()
    }

    pub fn end(self) {}
}
