//! Streaming a build root to and from the cache archive
//!
//! Archives are plain tar streams, optionally piped through an external
//! compression filter. Packing writes a sibling `.partial` file that is
//! renamed over the archive only once the stream and filter both succeed.

use crate::cache::best_effort;
use crate::cache::compression::Compression;
use crate::cache::exclude::ExclusionSet;
use crate::error::{RootCacheError, RootCacheResult};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::ffi::OsString;
use std::fs::{self, File, Metadata};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::os::unix::fs::{FileTypeExt, MetadataExt};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use tar::{Archive, Builder, EntryType, Header};
use tracing::{debug, info};
use walkdir::WalkDir;

/// Packs and unpacks build roots
#[derive(Debug, Clone)]
pub struct ArchiveCodec {
    compression: Compression,
    /// Working directory for the compression filter
    work_dir: Option<PathBuf>,
}

impl ArchiveCodec {
    pub fn new(compression: Compression) -> Self {
        Self {
            compression,
            work_dir: None,
        }
    }

    /// Run the compression filter from `dir` instead of the current directory
    pub fn with_work_dir(mut self, dir: PathBuf) -> Self {
        self.work_dir = Some(dir);
        self
    }

    /// Stream `source_root` into `archive`, returning the number of entries
    ///
    /// Excluded paths are skipped without descending. With
    /// `single_filesystem`, mount boundaries are not crossed. On failure no
    /// archive is left at `archive`.
    pub fn pack(
        &self,
        source_root: &Path,
        archive: &Path,
        exclusions: &ExclusionSet,
        single_filesystem: bool,
    ) -> RootCacheResult<u64> {
        let partial = partial_path(archive);
        let result = if source_root.is_dir() {
            self.write_archive(source_root, &partial, exclusions, single_filesystem)
                .and_then(|count| {
                    fs::rename(&partial, archive)
                        .map_err(|e| RootCacheError::archive(archive, e))
                        .map(|()| count)
                })
        } else {
            Err(RootCacheError::PathNotFound(source_root.to_path_buf()))
        };

        match result {
            Ok(count) => {
                info!("Packed {} entries into {}", count, archive.display());
                Ok(count)
            }
            Err(e) => {
                best_effort::remove_file(&partial);
                if best_effort::remove_file(archive) {
                    info!("Removed root cache {} after failed pack", archive.display());
                }
                Err(e)
            }
        }
    }

    /// Stream `archive` into `destination_root`, creating it if needed
    ///
    /// A failed unpack leaves whatever was already extracted in place.
    pub fn unpack(&self, archive: &Path, destination_root: &Path) -> RootCacheResult<()> {
        fs::create_dir_all(destination_root).map_err(|e| {
            RootCacheError::io(format!("creating {}", destination_root.display()), e)
        })?;
        let file = File::open(archive).map_err(|e| RootCacheError::archive(archive, e))?;

        let Some(program) = self.compression.program() else {
            return extract(BufReader::new(file), destination_root)
                .map_err(|e| RootCacheError::archive(archive, e));
        };

        let mut child = self
            .filter_command(program, self.compression.decompress_args())
            .stdin(file)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| RootCacheError::FilterSpawn {
                program: program.to_string(),
                source,
            })?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| RootCacheError::Internal("filter stdout not piped".to_string()))?;

        let extracted = extract(stdout, destination_root);
        if extracted.is_err() {
            let _ = child.kill();
        }
        let status = finish_filter(child, program);
        extracted.map_err(|e| RootCacheError::archive(archive, e))?;
        status?;

        debug!("Unpacked {} into {}", archive.display(), destination_root.display());
        Ok(())
    }

    fn write_archive(
        &self,
        source_root: &Path,
        partial: &Path,
        exclusions: &ExclusionSet,
        single_filesystem: bool,
    ) -> RootCacheResult<u64> {
        let file = File::create(partial).map_err(|e| RootCacheError::archive(partial, e))?;

        let Some(program) = self.compression.program() else {
            let (writer, count) =
                append_tree(BufWriter::new(file), source_root, exclusions, single_filesystem)?;
            let file = writer
                .into_inner()
                .map_err(|e| RootCacheError::archive(partial, e.into_error()))?;
            file.sync_all()
                .map_err(|e| RootCacheError::archive(partial, e))?;
            return Ok(count);
        };

        let mut child = self
            .filter_command(program, self.compression.compress_args())
            .stdin(Stdio::piped())
            .stdout(file)
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| RootCacheError::FilterSpawn {
                program: program.to_string(),
                source,
            })?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| RootCacheError::Internal("filter stdin not piped".to_string()))?;

        // stdin is dropped at the end of this statement, closing the pipe
        let written = append_tree(BufWriter::new(stdin), source_root, exclusions, single_filesystem)
            .and_then(|(writer, count)| {
                writer
                    .into_inner()
                    .map(|_| count)
                    .map_err(|e| RootCacheError::archive(partial, e.into_error()))
            });
        finish_filter(child, program)?;
        written
    }

    fn filter_command(&self, program: &str, args: &[&str]) -> Command {
        let mut command = Command::new(program);
        command.args(args);
        if let Some(ref dir) = self.work_dir {
            command.current_dir(dir);
        }
        command
    }
}

/// Append every non-excluded entry below `root`, returning the finished writer
///
/// Files with several links inside the tree are stored once; later names
/// become hard link entries pointing at the first.
fn append_tree<W: Write>(
    writer: W,
    root: &Path,
    exclusions: &ExclusionSet,
    single_filesystem: bool,
) -> RootCacheResult<(W, u64)> {
    let mut builder = Builder::new(writer);
    builder.follow_symlinks(false);
    let mut count = 0u64;
    let mut linked: HashMap<(u64, u64), PathBuf> = HashMap::new();

    let walker = WalkDir::new(root)
        .follow_links(false)
        .same_file_system(single_filesystem)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0
                || entry
                    .path()
                    .strip_prefix(root)
                    .map(|rel| !exclusions.is_excluded(rel))
                    .unwrap_or(true)
        });

    for entry in walker {
        let entry = entry?;
        if entry.depth() == 0 {
            continue;
        }
        let path = entry.path();
        let rel = path
            .strip_prefix(root)
            .map_err(|_| RootCacheError::Internal(format!("{} outside root", path.display())))?;

        if entry.file_type().is_socket() {
            debug!("Skipping socket {}", rel.display());
            continue;
        }

        if entry.file_type().is_file() {
            let meta = entry.metadata()?;
            if meta.nlink() > 1 {
                match linked.entry((meta.dev(), meta.ino())) {
                    Entry::Occupied(first) => {
                        append_hard_link(&mut builder, &meta, rel, first.get())
                            .map_err(|e| RootCacheError::archive(path, e))?;
                        count += 1;
                        continue;
                    }
                    Entry::Vacant(slot) => {
                        slot.insert(rel.to_path_buf());
                    }
                }
            }
        }

        builder
            .append_path_with_name(path, rel)
            .map_err(|e| RootCacheError::archive(path, e))?;
        count += 1;
    }

    let writer = builder
        .into_inner()
        .map_err(|e| RootCacheError::archive(root, e))?;
    Ok((writer, count))
}

fn append_hard_link<W: Write>(
    builder: &mut Builder<W>,
    meta: &Metadata,
    name: &Path,
    target: &Path,
) -> io::Result<()> {
    let mut header = Header::new_gnu();
    header.set_metadata(meta);
    header.set_entry_type(EntryType::Link);
    header.set_size(0);
    builder.append_link(&mut header, name, target)
}

fn extract<R: Read>(reader: R, destination: &Path) -> io::Result<()> {
    let mut archive = Archive::new(reader);
    archive.set_preserve_permissions(true);
    archive.set_preserve_mtime(true);
    archive.set_overwrite(true);
    archive.set_preserve_ownerships(running_as_root());
    archive.unpack(destination)?;

    // Unpacking stops at the first end-of-archive block; the filter must be
    // read to EOF or it dies writing the rest into a closed pipe.
    io::copy(&mut archive.into_inner(), &mut io::sink())?;
    Ok(())
}

/// Wait for a filter process and turn a non-zero exit into an error
fn finish_filter(child: Child, program: &str) -> RootCacheResult<()> {
    let output = child
        .wait_with_output()
        .map_err(|e| RootCacheError::io(format!("waiting for {}", program), e))?;
    if output.status.success() {
        Ok(())
    } else {
        Err(RootCacheError::ArchiveTool {
            program: program.to_string(),
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

fn partial_path(archive: &Path) -> PathBuf {
    let mut name = archive
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| OsString::from("cache.tar"));
    name.push(".partial");
    archive.with_file_name(name)
}

fn running_as_root() -> bool {
    // SAFETY: geteuid has no preconditions and cannot fail.
    unsafe { libc::geteuid() == 0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::compression::program_available;
    use std::collections::BTreeSet;
    use std::os::unix::fs::symlink;
    use tempfile::TempDir;

    fn sample_tree(root: &Path) {
        fs::create_dir_all(root.join("etc")).unwrap();
        fs::create_dir_all(root.join("usr/bin")).unwrap();
        fs::create_dir_all(root.join("proc/self")).unwrap();
        fs::create_dir_all(root.join("var/cache/dnf")).unwrap();
        fs::write(root.join("etc/os-release"), "NAME=Fedora\n").unwrap();
        fs::write(root.join("usr/bin/rpm"), "#!/bin/sh\n").unwrap();
        fs::write(root.join("proc/self/status"), "excluded").unwrap();
        fs::write(root.join("var/cache/dnf/packages.db"), "excluded").unwrap();
        symlink("../usr/bin/rpm", root.join("etc/rpm-link")).unwrap();
    }

    fn members(archive: &Path) -> BTreeSet<String> {
        let mut archive = Archive::new(File::open(archive).unwrap());
        archive
            .entries()
            .unwrap()
            .map(|e| {
                let path = e.unwrap().path().unwrap().to_string_lossy().to_string();
                path.trim_end_matches('/').to_string()
            })
            .collect()
    }

    #[test]
    fn pack_skips_excluded_paths() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("root");
        sample_tree(&root);
        let archive = temp.path().join("cache.tar");
        let exclusions = ExclusionSet::new(&["./proc", "./var/cache/dnf"]).unwrap();

        ArchiveCodec::new(Compression::None)
            .pack(&root, &archive, &exclusions, true)
            .unwrap();

        let members = members(&archive);
        assert!(members.contains("etc/os-release"));
        assert!(members.contains("etc/rpm-link"));
        assert!(members.contains("var/cache"));
        assert!(!members.iter().any(|m| m.starts_with("proc")));
        assert!(!members.iter().any(|m| m.starts_with("var/cache/dnf")));
        assert!(!temp.path().join("cache.tar.partial").exists());
    }

    #[test]
    fn roundtrip_reproduces_tree() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("root");
        sample_tree(&root);
        let archive = temp.path().join("cache.tar");
        let dest = temp.path().join("restored");
        let codec = ArchiveCodec::new(Compression::None);
        let exclusions = ExclusionSet::new(&["./proc"]).unwrap();

        codec.pack(&root, &archive, &exclusions, true).unwrap();
        codec.unpack(&archive, &dest).unwrap();

        assert_eq!(
            fs::read_to_string(dest.join("etc/os-release")).unwrap(),
            "NAME=Fedora\n"
        );
        assert_eq!(
            fs::read_link(dest.join("etc/rpm-link")).unwrap(),
            PathBuf::from("../usr/bin/rpm")
        );
        assert!(dest.join("var/cache/dnf/packages.db").exists());
        assert!(!dest.join("proc").exists());
    }

    #[test]
    fn gzip_roundtrip_when_available() {
        if !program_available("gzip") {
            return;
        }
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("root");
        sample_tree(&root);
        let archive = temp.path().join("cache.tar.gz");
        let dest = temp.path().join("restored");
        let codec = ArchiveCodec::new(Compression::Gzip).with_work_dir(temp.path().to_path_buf());

        codec
            .pack(&root, &archive, &ExclusionSet::default(), false)
            .unwrap();
        // gzip magic
        assert_eq!(&fs::read(&archive).unwrap()[..2], &[0x1f, 0x8b]);

        codec.unpack(&archive, &dest).unwrap();
        assert!(dest.join("usr/bin/rpm").exists());
    }

    #[test]
    fn gzip_unpack_succeeds_for_many_archive_sizes() {
        if !program_available("gzip") {
            return;
        }
        let temp = TempDir::new().unwrap();
        let codec = ArchiveCodec::new(Compression::Gzip).with_work_dir(temp.path().to_path_buf());
        let archive = temp.path().join("cache.tar.gz");

        // Pseudo-random payload so the compressed size shifts with every length
        let mut state = 0x2545_f491_u32;
        let payload: Vec<u8> = (0..64 * 1024 + 200 * 97)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                (state >> 24) as u8
            })
            .collect();

        for i in 0..200 {
            let root = temp.path().join("root");
            let dest = temp.path().join("restored");
            let _ = fs::remove_dir_all(&root);
            let _ = fs::remove_dir_all(&dest);
            fs::create_dir_all(&root).unwrap();
            let len = 64 * 1024 + i * 97;
            fs::write(root.join("blob"), &payload[..len]).unwrap();

            codec
                .pack(&root, &archive, &ExclusionSet::default(), false)
                .unwrap();
            codec
                .unpack(&archive, &dest)
                .unwrap_or_else(|e| panic!("unpack of {} byte tree failed: {}", len, e));
            assert_eq!(fs::metadata(dest.join("blob")).unwrap().len(), len as u64);
        }
    }

    #[test]
    fn hard_links_are_preserved() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("root");
        fs::create_dir_all(root.join("usr/bin")).unwrap();
        fs::write(root.join("usr/bin/python3"), "interpreter").unwrap();
        fs::hard_link(root.join("usr/bin/python3"), root.join("usr/bin/python3.12")).unwrap();
        let archive = temp.path().join("cache.tar");
        let dest = temp.path().join("restored");
        let codec = ArchiveCodec::new(Compression::None);

        codec
            .pack(&root, &archive, &ExclusionSet::default(), true)
            .unwrap();

        let mut tar = Archive::new(File::open(&archive).unwrap());
        let link = tar
            .entries()
            .unwrap()
            .map(|e| e.unwrap())
            .find(|e| e.path().unwrap() == Path::new("usr/bin/python3.12"))
            .unwrap();
        assert_eq!(link.header().entry_type(), EntryType::Link);
        assert_eq!(
            link.link_name().unwrap().unwrap().into_owned(),
            PathBuf::from("usr/bin/python3")
        );
        drop(link);

        codec.unpack(&archive, &dest).unwrap();
        let first = fs::metadata(dest.join("usr/bin/python3")).unwrap();
        let second = fs::metadata(dest.join("usr/bin/python3.12")).unwrap();
        assert_eq!(first.ino(), second.ino());
        assert_eq!(fs::read_to_string(dest.join("usr/bin/python3.12")).unwrap(), "interpreter");
    }

    #[test]
    fn failed_pack_reports_error_and_removes_archive() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("cache.tar");
        fs::write(&archive, b"old archive").unwrap();

        let err = ArchiveCodec::new(Compression::None)
            .pack(&temp.path().join("missing-root"), &archive, &ExclusionSet::default(), true)
            .unwrap_err();
        assert!(matches!(err, RootCacheError::PathNotFound(_)));
        assert!(!archive.exists());

        let root = temp.path().join("root");
        sample_tree(&root);
        let err = ArchiveCodec::new(Compression::None)
            .pack(&root, &temp.path().join("no-dir").join("cache.tar"), &ExclusionSet::default(), true)
            .unwrap_err();
        assert!(matches!(err, RootCacheError::Archive { .. }));
    }

    #[test]
    fn missing_filter_program_fails_pack_cleanly() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("root");
        sample_tree(&root);
        let archive = temp.path().join("cache.tar.gz");
        fs::write(&archive, b"stale").unwrap();
        let codec = ArchiveCodec::new(Compression::Pigz)
            .with_work_dir(temp.path().join("does-not-exist"));

        let err = codec
            .pack(&root, &archive, &ExclusionSet::default(), true)
            .unwrap_err();

        assert!(matches!(err, RootCacheError::FilterSpawn { .. }));
        assert!(!archive.exists());
        assert!(!temp.path().join("cache.tar.gz.partial").exists());
    }

    #[test]
    fn unpack_missing_archive_is_error() {
        let temp = TempDir::new().unwrap();
        let err = ArchiveCodec::new(Compression::None)
            .unpack(&temp.path().join("cache.tar"), &temp.path().join("root"))
            .unwrap_err();
        assert!(matches!(err, RootCacheError::Archive { .. }));
    }

    #[test]
    fn partial_path_is_sibling() {
        assert_eq!(
            partial_path(Path::new("/var/cache/rc/cache.tar.gz")),
            PathBuf::from("/var/cache/rc/cache.tar.gz.partial")
        );
    }
}
