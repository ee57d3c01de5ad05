use anyhow::Result;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Length of the `uid` column.
pub const UID_LEN: usize = 16;

/// Full SHA-256 of a file as lowercase hex.
pub fn sha256_file(path: &Path) -> Result<String> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();

    let mut buffer = [0u8; 8192];
    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// Content-derived uid: the first 16 hex digits of the file's SHA-256.
pub fn file_uid(path: &Path) -> Result<String> {
    let mut digest = sha256_file(path)?;
    digest.truncate(UID_LEN);
    Ok(digest)
}
