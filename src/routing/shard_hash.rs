const FNV32_OFFSET_BASIS: u32 = 2166136261;
const FNV32_PRIME: u32 = 16777619;

/// 32-bit FNV-1a over raw bytes.
pub fn fnv1a_32(bytes: &[u8]) -> u32 {
    let mut hash = FNV32_OFFSET_BASIS;
    for byte in bytes {
        hash ^= *byte as u32;
        hash = hash.wrapping_mul(FNV32_PRIME);
    }
    hash
}

/// Computes the shard key for a tenant.
///
/// Reads and writes for the same tenant use this key, so both resolve
/// against the same replica placement. The value is stable across restarts.
pub fn shard_by_tenant(tenant_id: &str) -> u32 {
    fnv1a_32(tenant_id.as_bytes())
}
