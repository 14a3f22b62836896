//! Tar archiver with gzip/zstd compression.

use crate::types::CompressionType;
use stash_core::{ArtifactSet, Archiver, Error, Result};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Component, Path, PathBuf};
use tracing::debug;

const ZSTD_LEVEL: i32 = 3;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const ZSTD_MAGIC: [u8; 4] = [0x28, 0xb5, 0x2f, 0xfd];

/// Packs artifacts relative to a working directory into a compressed tar.
#[derive(Debug, Clone)]
pub struct TarArchiver {
    work_dir: PathBuf,
    compression: CompressionType,
}

impl TarArchiver {
    pub fn new(work_dir: impl Into<PathBuf>, compression: CompressionType) -> Self {
        Self {
            work_dir: work_dir.into(),
            compression,
        }
    }

    /// Resolve one artifact entry to `(source path, name in archive)` pairs.
    fn expand(&self, entry: &str) -> Result<Vec<(PathBuf, PathBuf)>> {
        let mut sources = if is_glob(entry) {
            self.glob_matches(entry)?
        } else {
            Vec::new()
        };

        // Names such as `out[1]` are still plain paths when nothing matches.
        if sources.is_empty() {
            let path = self.work_dir.join(entry);
            if path.symlink_metadata().is_ok() {
                sources.push(path);
            }
        }

        if sources.is_empty() {
            return Err(Error::ArchiveFailure(format!(
                "{}: No such file or directory",
                entry
            )));
        }

        sources
            .into_iter()
            .map(|source| {
                let relative = source.strip_prefix(&self.work_dir).unwrap_or(&source);
                let name = archive_name(relative);
                Ok((resolve(&source)?, name))
            })
            .collect()
    }

    fn glob_matches(&self, entry: &str) -> Result<Vec<PathBuf>> {
        let pattern = if Path::new(entry).is_absolute() {
            entry.to_string()
        } else {
            let base = self.work_dir.to_str().ok_or_else(|| {
                Error::ArchiveFailure(format!(
                    "Working directory is not valid UTF-8: {}",
                    self.work_dir.display()
                ))
            })?;
            format!("{}/{}", glob::Pattern::escape(base), entry)
        };

        let matches = match glob::glob(&pattern) {
            Ok(matches) => matches,
            Err(e) => {
                debug!(entry, error = %e, "Not a valid glob, treating as a path");
                return Ok(Vec::new());
            }
        };

        let mut sources = Vec::new();
        for path in matches {
            sources.push(path.map_err(|e| {
                Error::ArchiveFailure(format!("Failed to read match for {}: {}", entry, e))
            })?);
        }
        Ok(sources)
    }
}

/// Member name for a path relative to the working directory.
///
/// Like `tar`, drops the root and everything up to the last `..`.
fn archive_name(path: &Path) -> PathBuf {
    let mut name = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => name.push(part),
            Component::ParentDir => name.clear(),
            _ => {}
        }
    }
    name
}

/// `path` with its parent directory canonicalized. The last component is
/// kept as is, so symlinks are not followed.
fn resolve(path: &Path) -> Result<PathBuf> {
    let (Some(parent), Some(file_name)) = (path.parent(), path.file_name()) else {
        // `/` or a trailing `..`: always a directory.
        return path.canonicalize().map_err(|e| {
            Error::ArchiveFailure(format!("Failed to resolve {}: {}", path.display(), e))
        });
    };
    let parent = if parent.as_os_str().is_empty() {
        Path::new(".")
    } else {
        parent
    };
    let parent = parent.canonicalize().map_err(|e| {
        Error::ArchiveFailure(format!("Failed to resolve {}: {}", path.display(), e))
    })?;
    Ok(parent.join(file_name))
}

impl Archiver for TarArchiver {
    fn pack(&self, artifacts: &ArtifactSet, dest: &Path) -> Result<()> {
        let mut inputs = Vec::new();
        for entry in artifacts.iter() {
            inputs.extend(self.expand(entry)?);
        }

        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::ArchiveFailure(format!("Failed to create {}: {}", parent.display(), e))
            })?;
        }

        // The archive may sit inside a packed directory; never pack it into itself.
        let skip = resolve(dest)?;

        let file = File::create(dest).map_err(|e| {
            Error::ArchiveFailure(format!("Failed to create {}: {}", dest.display(), e))
        })?;
        let writer = BufWriter::new(file);

        let mut writer = match self.compression {
            CompressionType::None => write_tar(writer, &inputs, &skip)?,
            CompressionType::Gzip => {
                let encoder = flate2::write::GzEncoder::new(writer, flate2::Compression::default());
                write_tar(encoder, &inputs, &skip)?
                    .finish()
                    .map_err(|e| Error::ArchiveFailure(format!("Gzip finish failed: {}", e)))?
            }
            CompressionType::Zstd => {
                let encoder = zstd::stream::write::Encoder::new(writer, ZSTD_LEVEL)
                    .map_err(|e| Error::ArchiveFailure(format!("Zstd init failed: {}", e)))?;
                write_tar(encoder, &inputs, &skip)?
                    .finish()
                    .map_err(|e| Error::ArchiveFailure(format!("Zstd finish failed: {}", e)))?
            }
        };
        writer
            .flush()
            .map_err(|e| Error::ArchiveFailure(format!("Failed to write archive: {}", e)))?;

        debug!(
            archive = %dest.display(),
            entries = inputs.len(),
            compression = %self.compression,
            "Archive created"
        );
        Ok(())
    }

    fn unpack(&self, archive: &Path) -> Result<()> {
        let mut file = File::open(archive).map_err(|e| {
            Error::ArchiveFailure(format!("Failed to open {}: {}", archive.display(), e))
        })?;

        // Restore whatever format the archive was written in.
        let compression = sniff_compression(&mut file)?;
        let reader = BufReader::new(file);

        match compression {
            CompressionType::None => extract_tar(reader, &self.work_dir)?,
            CompressionType::Gzip => {
                extract_tar(flate2::read::GzDecoder::new(reader), &self.work_dir)?
            }
            CompressionType::Zstd => {
                let decoder = zstd::stream::read::Decoder::with_buffer(reader).map_err(|e| {
                    Error::ArchiveFailure(format!("Failed to create decoder: {}", e))
                })?;
                extract_tar(decoder, &self.work_dir)?
            }
        }

        debug!(
            archive = %archive.display(),
            dest = %self.work_dir.display(),
            compression = %compression,
            "Archive extracted"
        );
        Ok(())
    }
}

fn is_glob(entry: &str) -> bool {
    entry.contains(['*', '?', '['])
}

fn write_tar<W: Write>(writer: W, inputs: &[(PathBuf, PathBuf)], skip: &Path) -> Result<W> {
    let mut builder = tar::Builder::new(writer);
    builder.follow_symlinks(false);

    for (source, name) in inputs {
        append_entry(&mut builder, source, name, skip)?;
    }

    builder
        .into_inner()
        .map_err(|e| Error::ArchiveFailure(format!("Failed to finish tar: {}", e)))
}

/// Append `source` as `name`, descending into directories but not symlinks.
fn append_entry<W: Write>(
    builder: &mut tar::Builder<W>,
    source: &Path,
    name: &Path,
    skip: &Path,
) -> Result<()> {
    if source == skip {
        debug!(path = %source.display(), "Skipping the archive itself");
        return Ok(());
    }

    let metadata = source.symlink_metadata().map_err(|e| {
        Error::ArchiveFailure(format!("Failed to stat {}: {}", source.display(), e))
    })?;

    if !metadata.is_dir() {
        return builder.append_path_with_name(source, name).map_err(|e| {
            Error::ArchiveFailure(format!("Failed to pack file {}: {}", source.display(), e))
        });
    }

    // The working directory itself has no member of its own.
    if !name.as_os_str().is_empty() {
        builder.append_dir(name, source).map_err(|e| {
            Error::ArchiveFailure(format!("Failed to pack dir {}: {}", source.display(), e))
        })?;
    }

    let mut children = std::fs::read_dir(source)
        .and_then(|entries| {
            entries
                .map(|entry| entry.map(|e| e.file_name()))
                .collect::<std::io::Result<Vec<_>>>()
        })
        .map_err(|e| {
            Error::ArchiveFailure(format!("Failed to read dir {}: {}", source.display(), e))
        })?;
    children.sort();

    for child in children {
        append_entry(builder, &source.join(&child), &name.join(&child), skip)?;
    }
    Ok(())
}

fn extract_tar<R: Read>(reader: R, dest: &Path) -> Result<()> {
    let mut archive = tar::Archive::new(reader);
    archive.set_preserve_permissions(true);
    archive.set_overwrite(true);
    archive
        .unpack(dest)
        .map_err(|e| Error::ArchiveFailure(format!("Failed to unpack archive: {}", e)))
}

fn sniff_compression(file: &mut File) -> Result<CompressionType> {
    let mut magic = [0u8; 4];
    let mut read = 0;
    while read < magic.len() {
        match file.read(&mut magic[read..]) {
            Ok(0) => break,
            Ok(n) => read += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                return Err(Error::ArchiveFailure(format!("Failed to read archive: {}", e)));
            }
        }
    }
    file.seek(SeekFrom::Start(0))
        .map_err(|e| Error::ArchiveFailure(format!("Failed to rewind archive: {}", e)))?;

    Ok(if magic[..read].starts_with(&GZIP_MAGIC) {
        CompressionType::Gzip
    } else if read == ZSTD_MAGIC.len() && magic == ZSTD_MAGIC {
        CompressionType::Zstd
    } else {
        CompressionType::None
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn seed(dir: &Path) {
        fs::create_dir_all(dir.join("dist/assets")).unwrap();
        fs::write(dir.join("dist/index.html"), "<html></html>").unwrap();
        fs::write(dir.join("dist/assets/app.js"), "console.log(1)").unwrap();
        fs::write(dir.join("Cargo.lock"), "# lock").unwrap();
        fs::write(dir.join("notes.txt"), "not cached").unwrap();
    }

    fn restore_with(compression: CompressionType) {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        seed(src.path());

        let archive = src.path().join("build-42.zip");
        let packer = TarArchiver::new(src.path(), compression);
        let artifacts = ArtifactSet::parse("dist/,Cargo.lock").unwrap();
        packer.pack(&artifacts, &archive).unwrap();

        // Unpacking detects the format, whatever the reader is configured with.
        let unpacker = TarArchiver::new(dst.path(), CompressionType::Gzip);
        unpacker.unpack(&archive).unwrap();

        assert_eq!(
            fs::read_to_string(dst.path().join("dist/index.html")).unwrap(),
            "<html></html>"
        );
        assert_eq!(
            fs::read_to_string(dst.path().join("dist/assets/app.js")).unwrap(),
            "console.log(1)"
        );
        assert_eq!(fs::read_to_string(dst.path().join("Cargo.lock")).unwrap(), "# lock");
        assert!(!dst.path().join("notes.txt").exists());
    }

    #[test]
    fn test_gzip_pack_unpack() {
        restore_with(CompressionType::Gzip);
    }

    #[test]
    fn test_zstd_pack_unpack() {
        restore_with(CompressionType::Zstd);
    }

    #[test]
    fn test_plain_pack_unpack() {
        restore_with(CompressionType::None);
    }

    #[test]
    fn test_glob_entries() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        fs::create_dir_all(src.path().join("target")).unwrap();
        fs::write(src.path().join("target/a.rlib"), "a").unwrap();
        fs::write(src.path().join("target/b.rlib"), "b").unwrap();
        fs::write(src.path().join("target/c.d"), "c").unwrap();

        let archive = src.path().join("libs.zip");
        let archiver = TarArchiver::new(src.path(), CompressionType::Gzip);
        archiver
            .pack(&ArtifactSet::parse("target/*.rlib").unwrap(), &archive)
            .unwrap();
        TarArchiver::new(dst.path(), CompressionType::Gzip)
            .unpack(&archive)
            .unwrap();

        assert!(dst.path().join("target/a.rlib").exists());
        assert!(dst.path().join("target/b.rlib").exists());
        assert!(!dst.path().join("target/c.d").exists());
    }

    #[test]
    fn test_missing_entry_fails_before_writing() {
        let src = tempfile::tempdir().unwrap();
        let archive = src.path().join("missing.zip");
        let archiver = TarArchiver::new(src.path(), CompressionType::Gzip);

        let err = archiver
            .pack(&ArtifactSet::parse("does-not-exist").unwrap(), &archive)
            .unwrap_err();
        assert!(matches!(err, Error::ArchiveFailure(_)));
        assert!(!archive.exists());

        let err = archiver
            .pack(&ArtifactSet::parse("*.none").unwrap(), &archive)
            .unwrap_err();
        assert!(matches!(err, Error::ArchiveFailure(_)));
    }

    #[test]
    fn test_nested_archive_path() {
        let src = tempfile::tempdir().unwrap();
        seed(src.path());
        let archive = src.path().join("linux/build-42.zip");
        TarArchiver::new(src.path(), CompressionType::Gzip)
            .pack(&ArtifactSet::parse("Cargo.lock").unwrap(), &archive)
            .unwrap();
        assert!(archive.exists());
    }

    #[test]
    fn test_pack_working_dir_skips_archive() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        seed(src.path());

        let archive = src.path().join("build-42.zip");
        let archiver = TarArchiver::new(src.path(), CompressionType::Gzip);
        archiver
            .pack(&ArtifactSet::parse(".").unwrap(), &archive)
            .unwrap();
        TarArchiver::new(dst.path(), CompressionType::Gzip)
            .unpack(&archive)
            .unwrap();

        assert_eq!(
            fs::read_to_string(dst.path().join("dist/assets/app.js")).unwrap(),
            "console.log(1)"
        );
        assert_eq!(fs::read_to_string(dst.path().join("notes.txt")).unwrap(), "not cached");
        assert!(!dst.path().join("build-42.zip").exists());
    }

    #[test]
    fn test_repack_glob_matching_previous_archive() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        seed(src.path());

        let archive = src.path().join("build-42.zip");
        let archiver = TarArchiver::new(src.path(), CompressionType::Zstd);
        let artifacts = ArtifactSet::parse("*").unwrap();
        archiver.pack(&artifacts, &archive).unwrap();
        // The first archive is still on disk and now matches `*`.
        archiver.pack(&artifacts, &archive).unwrap();

        TarArchiver::new(dst.path(), CompressionType::Gzip)
            .unpack(&archive)
            .unwrap();

        assert_eq!(fs::read_to_string(dst.path().join("Cargo.lock")).unwrap(), "# lock");
        assert_eq!(
            fs::read_to_string(dst.path().join("dist/index.html")).unwrap(),
            "<html></html>"
        );
        assert!(!dst.path().join("build-42.zip").exists());
    }

    #[test]
    fn test_parent_dir_entries_are_stripped() {
        let root = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        let work = root.path().join("work");
        fs::create_dir_all(&work).unwrap();
        fs::create_dir_all(root.path().join("shared/include")).unwrap();
        fs::write(root.path().join("shared/include/lib.h"), "#pragma once").unwrap();

        let archive = work.join("shared.zip");
        TarArchiver::new(&work, CompressionType::Gzip)
            .pack(&ArtifactSet::parse("../shared").unwrap(), &archive)
            .unwrap();
        TarArchiver::new(dst.path(), CompressionType::Gzip)
            .unpack(&archive)
            .unwrap();

        assert_eq!(
            fs::read_to_string(dst.path().join("shared/include/lib.h")).unwrap(),
            "#pragma once"
        );
    }

    #[test]
    fn test_archive_name() {
        assert_eq!(archive_name(Path::new("./dist/app.js")), PathBuf::from("dist/app.js"));
        assert_eq!(archive_name(Path::new("../shared/lib")), PathBuf::from("shared/lib"));
        assert_eq!(archive_name(Path::new("a/../../b")), PathBuf::from("b"));
        assert_eq!(archive_name(Path::new("/opt/tools")), PathBuf::from("opt/tools"));
    }

    #[test]
    fn test_bracketed_literal_path() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        fs::write(src.path().join("out[1].txt"), "first").unwrap();

        let archive = src.path().join("out.zip");
        TarArchiver::new(src.path(), CompressionType::Gzip)
            .pack(&ArtifactSet::parse("out[1].txt").unwrap(), &archive)
            .unwrap();
        TarArchiver::new(dst.path(), CompressionType::Gzip)
            .unpack(&archive)
            .unwrap();

        assert_eq!(fs::read_to_string(dst.path().join("out[1].txt")).unwrap(), "first");
    }

    #[test]
    fn test_unpack_garbage_fails() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("bad.zip");
        fs::write(&archive, [0x1f, 0x8b, 0x00, 0x01, 0x02]).unwrap();
        let err = TarArchiver::new(dir.path(), CompressionType::Gzip)
            .unpack(&archive)
            .unwrap_err();
        assert!(matches!(err, Error::ArchiveFailure(_)));
    }
}
