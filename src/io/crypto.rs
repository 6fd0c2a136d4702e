use crate::error::Result;
use sha2::{Digest, Sha256};
use std::{fs::File, io::Read, path::Path};

/// Hex-encoded SHA-256 of a file, streamed in 64 KiB blocks.
pub fn file_sha256(path: &Path) -> Result<String> {
    let mut f = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = f.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// `Ok(false)` when the file is missing or its digest differs.
pub fn verify_sha256(path: &Path, expected_hex: &str) -> Result<bool> {
    if !path.is_file() {
        return Ok(false);
    }
    let got = file_sha256(path)?;
    Ok(got.eq_ignore_ascii_case(expected_hex))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn verifies_known_digest() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("weights.bin");
        fs::write(&p, b"abc").unwrap();
        let abc = "BA7816BF8F01CFEA414140DE5DAE2223B00361A396177A9CB410FF61F20015AD";
        assert!(verify_sha256(&p, abc).unwrap());
        assert!(!verify_sha256(&p, &abc.replace('B', "C")).unwrap());
    }

    #[test]
    fn missing_file_is_not_verified() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!verify_sha256(&dir.path().join("nope"), "00").unwrap());
    }
}
