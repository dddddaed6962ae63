//! Binary snapshots: 4 magic bytes, a length-prefixed crate version string and a
//! bincode payload. Files written by a different crate version are rejected.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

const VERSION_STR: &str = env!("CARGO_PKG_VERSION");

/// Serialize `value` with a small header (magic + crate version) and a bincode payload.
pub fn save<T: Serialize>(path: impl AsRef<Path>, magic: &[u8; 4], value: &T) -> Result<()> {
    let path = path.as_ref();
    let f = File::create(path).with_context(|| format!("create {}", path.display()))?;
    let mut f = BufWriter::new(f);

    f.write_all(magic)?;

    let v = VERSION_STR.as_bytes();
    let len = v.len() as u16;
    f.write_all(&len.to_le_bytes())?;
    f.write_all(v)?;

    let payload = bincode::serialize(value)?;
    f.write_all(&payload)?;
    f.flush()?;

    Ok(())
}

/// Load a snapshot written by [`save`] with the same `magic`.
pub fn load<T: DeserializeOwned>(path: impl AsRef<Path>, magic: &[u8; 4], what: &str) -> Result<T> {
    let path = path.as_ref();
    let f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut f = BufReader::new(f);

    let mut found = [0u8; 4];
    f.read_exact(&mut found)?;
    if &found != magic {
        bail!("Not a {what} file (bad magic)");
    }

    let mut len_buf = [0u8; 2];
    f.read_exact(&mut len_buf)?;
    let len = u16::from_le_bytes(len_buf) as usize;

    let mut ver_buf = vec![0u8; len];
    f.read_exact(&mut ver_buf)?;
    let file_version = std::str::from_utf8(&ver_buf)?;

    if file_version != VERSION_STR {
        bail!(
            "{what} version mismatch: file={}, binary={}",
            file_version,
            VERSION_STR
        );
    }

    let mut payload = Vec::new();
    f.read_to_end(&mut payload)?;
    let value: T = bincode::deserialize(&payload)?;

    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_wrong_magic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("v.bin");
        save(&path, b"AAAA", &vec![1u32, 2, 3]).unwrap();

        let back: Vec<u32> = load(&path, b"AAAA", "test").unwrap();
        assert_eq!(back, vec![1, 2, 3]);

        let err = load::<Vec<u32>>(&path, b"BBBB", "test").unwrap_err();
        assert!(err.to_string().contains("bad magic"));
    }
}
