//! Tar extraction for fetched artifacts

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Failed to open {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to unpack {path}: {source}")]
    Unpack {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Extraction task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, ArchiveError>;

/// Unpack a tar archive into `dest_dir`, overwriting existing entries.
///
/// Gzip compression is detected from the file header.
pub fn unpack(archive_path: &Path, dest_dir: &Path) -> Result<()> {
    let open_err = |source| ArchiveError::Open {
        path: archive_path.display().to_string(),
        source,
    };
    let unpack_err = |source| ArchiveError::Unpack {
        path: archive_path.display().to_string(),
        source,
    };

    let mut magic = [0u8; 2];
    let header_len = File::open(archive_path)
        .and_then(|mut file| file.read(&mut magic))
        .map_err(open_err)?;

    let file = BufReader::new(File::open(archive_path).map_err(open_err)?);
    let compressed = header_len == GZIP_MAGIC.len() && magic == GZIP_MAGIC;

    info!(
        archive = %archive_path.display(),
        dest = %dest_dir.display(),
        compressed,
        "Unpacking archive"
    );

    if compressed {
        unpack_reader(flate2::read::GzDecoder::new(file), dest_dir).map_err(unpack_err)
    } else {
        unpack_reader(file, dest_dir).map_err(unpack_err)
    }
}

fn unpack_reader<R: Read>(reader: R, dest_dir: &Path) -> std::io::Result<()> {
    let mut archive = tar::Archive::new(reader);
    archive.set_overwrite(true);
    archive.set_preserve_permissions(true);
    archive.unpack(dest_dir)
}

/// Run [`unpack`] on the blocking pool; once started it runs to completion.
pub async fn unpack_blocking(archive_path: PathBuf, dest_dir: PathBuf) -> Result<()> {
    tokio::task::spawn_blocking(move || unpack(&archive_path, &dest_dir)).await?
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use tempfile::TempDir;

    /// Build an in-memory tar with the given files, optionally gzipped
    pub(crate) fn tarball(files: &[(&str, &str)], gzip: bool) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        for (name, contents) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(contents.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder
                .append_data(&mut header, name, contents.as_bytes())
                .unwrap();
        }
        let raw = builder.into_inner().unwrap();
        if !gzip {
            return raw;
        }
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        std::io::Write::write_all(&mut encoder, &raw).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_unpack_gzip() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("pkg.tgz");
        std::fs::write(&archive, tarball(&[("bin/clang", "elf")], true)).unwrap();

        unpack(&archive, dir.path()).unwrap();
        assert_eq!(std::fs::read_to_string(dir.path().join("bin/clang")).unwrap(), "elf");
    }

    #[test]
    fn test_unpack_plain_tar_twice_overwrites() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("pkg.tar");
        std::fs::write(&archive, tarball(&[("README", "v1")], false)).unwrap();

        unpack(&archive, dir.path()).unwrap();
        unpack(&archive, dir.path()).unwrap();
        assert_eq!(std::fs::read_to_string(dir.path().join("README")).unwrap(), "v1");
    }

    #[test]
    fn test_unpack_missing_file() {
        let dir = TempDir::new().unwrap();
        let result = unpack(&dir.path().join("missing.tgz"), dir.path());
        assert!(matches!(result, Err(ArchiveError::Open { .. })));
    }

    #[tokio::test]
    async fn test_unpack_garbage() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("pkg.tgz");
        std::fs::write(&archive, [0x1f, 0x8b, 0x00, 0x01, 0x02]).unwrap();

        let result = unpack_blocking(archive, dir.path().to_path_buf()).await;
        assert!(matches!(result, Err(ArchiveError::Unpack { .. })));
    }
}
