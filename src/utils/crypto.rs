use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

/// SHA256 hash of raw bytes, lowercase hex
pub fn sha256_hex(data: impl AsRef<[u8]>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data.as_ref());
    hex::encode(hasher.finalize())
}

/// MD5 digest of raw bytes, lowercase hex
pub fn md5_hex(data: impl AsRef<[u8]>) -> String {
    format!("{:x}", md5::compute(data.as_ref()))
}

/// HMAC-SHA256 with a string key
/// Used for the first step of the SigV4 key derivation
pub fn hmac_sha256(key: &str, data: &str) -> Vec<u8> {
    hmac_sha256_bytes(key.as_bytes(), data)
}

/// HMAC-SHA256 with a byte key
pub fn hmac_sha256_bytes(key: &[u8], data: &str) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(data.as_bytes());
    mac.finalize().into_bytes().to_vec()
}
