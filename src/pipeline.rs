use anyhow::{Context, Result};
use std::fs::File;
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::merge::{self, MergeStats};

/// The result of rewriting one destination file.
#[derive(Debug)]
pub struct ReplaceOutcome {
    pub destination: PathBuf,
    /// Where the original destination was moved during the run.
    pub backup_path: PathBuf,
    /// `true` if the backup was left on disk (see [`Config::keep_backup`]).
    pub backup_kept: bool,
    pub stats: MergeStats,
}

fn open_reader(path: &Path, what: &str) -> Result<BufReader<File>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open {what} {}", path.display()))?;
    Ok(BufReader::new(file))
}

/// Replace the metadata of `destination` with that of `source`, or strip it
/// when `source` is `None`.
///
/// The destination is first renamed to its backup path (see
/// [`Config::backup_path`]) and a new file is written in its place. The
/// backup is removed once the new file is complete. If anything fails, the
/// backup stays on disk and the destination path holds whatever was written
/// so far, which may not be a valid image.
///
/// # Example
///
/// ```rust,no_run
/// use meta_swap::config::Config;
/// use meta_swap::pipeline::replace_metadata;
/// use std::path::Path;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::default();
///
/// // Copy EXIF, XMP and comments from one photo to another
/// replace_metadata(Path::new("edited.jpg"), Some(Path::new("original.jpg")), &config)?;
///
/// // Strip all metadata
/// let outcome = replace_metadata(Path::new("upload.jpg"), None, &config)?;
/// println!("Dropped {} segment(s)", outcome.stats.image.segments_dropped);
/// # Ok(())
/// # }
/// ```
pub fn replace_metadata(
    destination: &Path,
    source: Option<&Path>,
    config: &Config,
) -> Result<ReplaceOutcome> {
    config.validate()?;

    let backup_path = config.backup_path(destination);
    // Decide before the move: afterwards the destination path names the new,
    // still empty output file.
    let donor_is_destination = source.is_some_and(|src| same_file(src, destination));

    move_to_backup(destination, &backup_path)?;
    log::debug!("Backup created: {}", backup_path.display());

    let donor = if donor_is_destination {
        Some(backup_path.as_path())
    } else {
        source
    };
    let stats = match write_merged(destination, &backup_path, donor, config) {
        Ok(stats) => stats,
        Err(e) => {
            log::error!(
                "Rewriting {} failed; the original is still at {}",
                destination.display(),
                backup_path.display()
            );
            return Err(e);
        }
    };

    let backup_kept = config.keep_backup;
    if !backup_kept {
        std::fs::remove_file(&backup_path)
            .with_context(|| format!("Failed to remove backup {}", backup_path.display()))?;
        log::debug!("Backup removed: {}", backup_path.display());
    }

    Ok(ReplaceOutcome {
        destination: destination.to_path_buf(),
        backup_path,
        backup_kept,
        stats,
    })
}

/// Whether `a` and `b` name the same existing file.
fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Move `destination` to `backup_path` without ever replacing an existing
/// file there.
///
/// Linking fails atomically if the backup path is taken. Filesystems without
/// hard links fall back to a checked rename, which can race with another
/// process creating the backup path in between.
fn move_to_backup(destination: &Path, backup_path: &Path) -> Result<()> {
    match std::fs::hard_link(destination, backup_path) {
        Ok(()) => {
            if let Err(e) = std::fs::remove_file(destination) {
                let _ = std::fs::remove_file(backup_path);
                return Err(e).with_context(|| {
                    format!("Failed to move {} aside", destination.display())
                });
            }
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            anyhow::bail!(
                "Backup path {} already exists; restore or remove it first",
                backup_path.display()
            )
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Err(e).with_context(|| {
            format!("Failed to open destination {}", destination.display())
        }),
        Err(e) => {
            log::debug!(
                "Cannot link {} to {} ({e}), renaming instead",
                destination.display(),
                backup_path.display()
            );
            if backup_path.exists() {
                anyhow::bail!(
                    "Backup path {} already exists; restore or remove it first",
                    backup_path.display()
                );
            }
            std::fs::rename(destination, backup_path).with_context(|| {
                format!(
                    "Failed to move {} to {}",
                    destination.display(),
                    backup_path.display()
                )
            })
        }
    }
}

fn write_merged(
    destination: &Path,
    original: &Path,
    source: Option<&Path>,
    config: &Config,
) -> Result<MergeStats> {
    let out = File::create(destination)
        .with_context(|| format!("Failed to create {}", destination.display()))?;
    let image = open_reader(original, "backup")?;
    let donor = source
        .map(|p| open_reader(p, "metadata source"))
        .transpose()?;

    merge::merge(BufWriter::new(out), image, donor, config.trailer)
        .with_context(|| format!("Failed to rewrite {}", destination.display()))
}

/// Run the merge for `destination` and `source` without writing anything.
///
/// Both files are parsed under `config.trailer` exactly as
/// [`replace_metadata`] would parse them, so an `Ok` here means a real run
/// would get past the merge step.
pub fn check_metadata(
    destination: &Path,
    source: Option<&Path>,
    config: &Config,
) -> Result<MergeStats> {
    let image = open_reader(destination, "destination")?;
    let donor = source
        .map(|p| open_reader(p, "metadata source"))
        .transpose()?;

    merge::merge(io::sink(), image, donor, config.trailer)
        .with_context(|| format!("{} cannot be rewritten", destination.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::TrailerPolicy;
    use std::fs;
    use tempfile::TempDir;

    fn segment(marker: u8, payload: &[u8]) -> Vec<u8> {
        let len = (payload.len() + 2) as u16;
        let mut out = vec![0xFF, marker];
        out.extend_from_slice(&len.to_be_bytes());
        out.extend_from_slice(payload);
        out
    }

    fn image(comment: &[u8], scan: &[u8]) -> Vec<u8> {
        let mut out = vec![0xFF, 0xD8];
        out.extend(segment(0xFE, comment));
        out.extend(segment(0xDB, &[0, 1, 2]));
        out.extend(segment(0xDA, &[1, 1, 0]));
        out.extend_from_slice(scan);
        out.extend_from_slice(&[0xFF, 0xD9]);
        out
    }

    fn stripped(scan: &[u8]) -> Vec<u8> {
        let mut out = vec![0xFF, 0xD8];
        out.extend(segment(0xDB, &[0, 1, 2]));
        out.extend(segment(0xDA, &[1, 1, 0]));
        out.extend_from_slice(scan);
        out.extend_from_slice(&[0xFF, 0xD9]);
        out
    }

    #[test]
    fn strip_in_place_removes_backup() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("photo.jpg");
        fs::write(&dest, image(b"secret", &[1, 2, 3])).unwrap();

        let outcome = replace_metadata(&dest, None, &Config::default()).unwrap();
        assert_eq!(fs::read(&dest).unwrap(), stripped(&[1, 2, 3]));
        assert!(!outcome.backup_kept);
        assert!(!outcome.backup_path.exists());
        assert_eq!(outcome.stats.image.segments_dropped, 1);
    }

    #[test]
    fn keep_backup() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("photo.jpg");
        let original = image(b"secret", &[1, 2, 3]);
        fs::write(&dest, &original).unwrap();

        let config = Config {
            keep_backup: true,
            ..Config::default()
        };
        let outcome = replace_metadata(&dest, None, &config).unwrap();
        assert!(outcome.backup_kept);
        assert_eq!(fs::read(&outcome.backup_path).unwrap(), original);
    }

    #[test]
    fn source_same_as_destination() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("photo.jpg");
        let original = image(b"keep me", &[4, 5, 6]);
        fs::write(&dest, &original).unwrap();

        // A differently spelled path to the same file.
        let source = dir.path().join(".").join("photo.jpg");
        let outcome = replace_metadata(&dest, Some(source.as_path()), &Config::default()).unwrap();
        assert_eq!(fs::read(&dest).unwrap(), original);
        assert_eq!(outcome.stats.donor.map(|s| s.segments_kept), Some(1));
        assert!(!outcome.backup_path.exists());
    }

    #[test]
    fn same_file_compares_resolved_paths() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.jpg");
        let b = dir.path().join("b.jpg");
        fs::write(&a, b"a").unwrap();
        fs::write(&b, b"b").unwrap();
        assert!(same_file(&a, &dir.path().join(".").join("a.jpg")));
        assert!(!same_file(&a, &b));
        assert!(!same_file(&a, &dir.path().join("missing.jpg")));
    }

    #[test]
    fn existing_backup_blocks_run() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("photo.jpg");
        let original = image(b"c", &[9]);
        fs::write(&dest, &original).unwrap();
        fs::write(dir.path().join("photo.jpg~"), b"older backup").unwrap();

        assert!(replace_metadata(&dest, None, &Config::default()).is_err());
        assert_eq!(fs::read(&dest).unwrap(), original);
        assert_eq!(fs::read(dir.path().join("photo.jpg~")).unwrap(), b"older backup");
    }

    #[test]
    fn failure_leaves_backup() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("photo.jpg");
        let mut original = image(b"c", &[9]);
        original.push(0x00);
        fs::write(&dest, &original).unwrap();

        assert!(replace_metadata(&dest, None, &Config::default()).is_err());
        assert_eq!(fs::read(dir.path().join("photo.jpg~")).unwrap(), original);
    }

    #[test]
    fn strip_trailer_policy() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("photo.jpg");
        let mut original = image(b"c", &[9]);
        original.extend_from_slice(b"trailer");
        fs::write(&dest, &original).unwrap();

        let config = Config {
            trailer: TrailerPolicy::Strip,
            ..Config::default()
        };
        replace_metadata(&dest, None, &config).unwrap();
        assert_eq!(fs::read(&dest).unwrap(), stripped(&[9]));
    }

    #[test]
    fn check_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("photo.jpg");
        let src = dir.path().join("donor.jpg");
        let original = image(b"dest", &[7, 7]);
        fs::write(&dest, &original).unwrap();
        fs::write(&src, image(b"donor", &[8])).unwrap();

        let stats = check_metadata(&dest, Some(src.as_path()), &Config::default()).unwrap();
        assert_eq!(stats.donor.map(|s| s.segments_kept), Some(1));
        assert_eq!(fs::read(&dest).unwrap(), original);
        assert!(!dir.path().join("photo.jpg~").exists());
    }

    #[test]
    fn check_reports_malformed_source() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("photo.jpg");
        let src = dir.path().join("donor.jpg");
        fs::write(&dest, image(b"dest", &[7])).unwrap();
        fs::write(&src, b"not a jpeg").unwrap();

        assert!(check_metadata(&dest, Some(src.as_path()), &Config::default()).is_err());
    }
}
