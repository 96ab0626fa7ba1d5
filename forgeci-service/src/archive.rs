// Archive Packing
// Builds gzip-compressed tar bundles from workspace directories

use std::fs::File;
use std::io;
use std::path::Path;

use flate2::write::GzEncoder;
use flate2::Compression;
use tar::Builder;

/// Pack `src` into a `.tar.gz` at `dest`.
///
/// Entries are prefixed with the source directory's final component, so the
/// archive unpacks into a single named directory.
pub fn pack_dir(src: &Path, dest: &Path) -> io::Result<()> {
    let prefix = src
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "source has no directory name"))?;

    let file = File::create(dest)?;
    let encoder = GzEncoder::new(file, Compression::default());
    let mut builder = Builder::new(encoder);

    builder.append_dir_all(prefix, src)?;
    builder.into_inner()?.finish()?;
    Ok(())
}
