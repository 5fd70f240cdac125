//! Build context packing

use crate::error::Result;
use flate2::Compression;
use flate2::write::GzEncoder;
use std::path::Path;

/// Pack `dir` into a gzipped tar archive suitable as a `/build` request body
pub fn pack_context(dir: &Path) -> Result<Vec<u8>> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    builder.follow_symlinks(false);
    builder.append_dir_all(".", dir)?;

    let encoder = builder.into_inner()?;
    Ok(encoder.finish()?)
}
