//! Hash helpers: blake3 para fingerprints de snapshots, sha-256 para el
//! digest de contenido de los blobs persistidos.

use blake3::Hasher;
use serde_json::Value;
use sha2::{Digest, Sha256};

use super::to_canonical_json;

/// Hashea un string y devuelve hex.
pub fn hash_str(input: &str) -> String {
    let mut h = Hasher::new();
    h.update(input.as_bytes());
    h.finalize().to_hex().to_string()
}

/// Hash de un JSON en su forma canónica.
pub fn hash_value(value: &Value) -> String {
    hash_str(&to_canonical_json(value))
}

/// Digest sha-256 (hex minúsculas) de un payload binario.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    format!("{digest:x}")
}
