//! L0: fixed 128-bit -> 64-bit hash used by both the node store and the operation cache.
//!
//! The node store keys every slot by a packed `(u64, u64)` node body; the operation cache keys
//! every bucket by up to four `u64` words. Both need the same property: cheap, well-mixed, and
//! stable across a rehash (the node store's GC rehashes every live slot with this exact function).
//!
//! The mixing steps below are a fixed multiply/rotate/xor finalizer seeded by a per-process
//! constant, in the spirit of a tabulation-hardened FNV variant: each 64-bit word is folded in
//! with a distinct odd constant before the finalizer runs, so permuting `(a, b)` to `(b, a)`
//! does not produce the same hash.

const SEED_A: u64 = 0x51_7c_c1_b7_27_22_0a_95;
const SEED_B: u64 = 0x9e_37_79_b9_7f_4a_7c_15;

#[inline]
fn fmix64(mut k: u64) -> u64 {
    k ^= k >> 33;
    k = k.wrapping_mul(0xff51afd7ed558ccd);
    k ^= k >> 33;
    k = k.wrapping_mul(0xc4ceb9fe1a85ec53);
    k ^= k >> 33;
    k
}

/// Hash a single 64-bit word with a caller-supplied seed. Used to re-seed hashing at each probe
/// retry so that a degenerate first hash does not doom every subsequent probe to the same
/// collision chain.
#[inline]
pub fn hash_u64(value: u64, seed: u64) -> u64 {
    fmix64(value.wrapping_add(seed).rotate_left(31))
}

/// Hash the two 64-bit words of a packed node body. This is the hash used to place a node in the
/// unique table and to recompute its bucket during GC rehash; it must be deterministic given
/// only `(a, b)` so that rehashing after GC reproduces exactly the same bucket a fresh insert
/// would have chosen.
#[inline]
pub fn hash_node(a: u64, b: u64, seed: u64) -> u64 {
    let mut h = seed ^ SEED_A;
    h ^= fmix64(a.wrapping_mul(SEED_A));
    h = h.rotate_left(27).wrapping_mul(SEED_B);
    h ^= fmix64(b.wrapping_mul(SEED_B));
    fmix64(h)
}

/// Hash an operation-cache key of up to four words. `opcode` is folded into `arg0` by the caller
/// (see `cache::Key::new`) so that distinct operations never alias the same bucket even when
/// their remaining arguments coincide.
#[inline]
pub fn hash_cache_key(arg0: u64, arg1: u64, arg2: u64, arg3: u64) -> u64 {
    let mut h = fmix64(arg0);
    h = h.rotate_left(17) ^ fmix64(arg1.wrapping_add(SEED_A));
    h = h.rotate_left(17) ^ fmix64(arg2.wrapping_add(SEED_B));
    h = h.rotate_left(17) ^ fmix64(arg3.wrapping_add(SEED_A ^ SEED_B));
    fmix64(h)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn hash_node_is_order_sensitive() {
        assert_ne!(hash_node(1, 2, 0), hash_node(2, 1, 0));
    }

    #[test]
    fn hash_node_is_deterministic() {
        assert_eq!(hash_node(123, 456, 7), hash_node(123, 456, 7));
    }

    #[test]
    fn hash_cache_key_distinguishes_opcode_folded_into_arg0() {
        let plain = hash_cache_key(5, 1, 2, 3);
        let with_opcode = hash_cache_key(5 ^ (9 << 56), 1, 2, 3);
        assert_ne!(plain, with_opcode);
    }
}
