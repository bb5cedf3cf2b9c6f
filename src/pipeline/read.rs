use std::io;
use std::path::Path;

use crate::error::{EngineError, Result};

const MMAP_THRESHOLD: u64 = 64 * 1024;

pub async fn read_file(path: &Path) -> Result<Vec<u8>> {
    read_bytes(path).await.map_err(|source| EngineError::Read {
        path: path.to_path_buf(),
        source,
    })
}

async fn read_bytes(path: &Path) -> io::Result<Vec<u8>> {
    let size = tokio::fs::metadata(path).await?.len();

    if size > MMAP_THRESHOLD {
        read_mmap(path).await
    } else {
        tokio::fs::read(path).await
    }
}

async fn read_mmap(path: &Path) -> io::Result<Vec<u8>> {
    let path = path.to_path_buf();

    tokio::task::spawn_blocking(move || {
        let file = std::fs::File::open(&path)?;
        let mmap = unsafe { memmap2::Mmap::map(&file)? };
        Ok(mmap.to_vec())
    })
    .await
    .map_err(io::Error::other)?
}
