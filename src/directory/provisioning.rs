use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use phf::phf_map;
use tracing::{debug, info, warn};

use super::Directory;

/// Name of the bundled LDIF resource used when no other source is configured
pub const DEFAULT_SOURCE: &str = "embedded-ldap/default.ldif";

/// LDIF resources compiled into the binary, by name
static RESOURCES: phf::Map<&'static str, &'static str> = phf_map! {
    "embedded-ldap/default.ldif" => include_str!("../../resources/default.ldif"),
};

/// Where provisioning entries are read from
#[derive(Debug, Clone, PartialEq)]
pub enum Source<'s> {
    /// A directory of `.ldif` files
    Directory(PathBuf),

    /// A single LDIF file
    File(PathBuf),

    /// A bundled resource
    Resource(&'static str),

    /// The LDIF content itself
    Inline(&'s str),
}

impl<'s> Source<'s> {
    /// Resolves a configured provisioning source.
    ///
    /// Existing filesystem paths take precedence over bundled resources. Anything else is taken as
    /// literal LDIF content.
    pub async fn resolve(source: &'s str) -> Self {
        if let Ok(metadata) = tokio::fs::metadata(source).await {
            return if metadata.is_dir() {
                Self::Directory(PathBuf::from(source))
            } else {
                Self::File(PathBuf::from(source))
            };
        }

        if let Some(resource) = RESOURCES.get(source) {
            return Self::Resource(*resource);
        }

        return Self::Inline(source);
    }

    /// Imports all entries from this source, returning the number of imported entries.
    pub async fn provision(&self, directory: &mut Directory) -> Result<usize> {
        return match self {
            Self::Directory(path) => {
                let mut total = 0;
                for file in ldif_files(path).await? {
                    total += import_file(directory, &file).await?;
                }
                Ok(total)
            }

            Self::File(path) => import_file(directory, path).await,

            Self::Resource(content) => import_content(directory, content),

            Self::Inline(content) => import_content(directory, content),
        };
    }
}

fn import_content(directory: &mut Directory, content: &str) -> Result<usize> {
    let count = directory.import_ldif(content)
        .context("Importing LDIF content")?;
    info!("Imported #{} default LDAP entries", count);

    return Ok(count);
}

async fn import_file(directory: &mut Directory, path: &Path) -> Result<usize> {
    let content = tokio::fs::read_to_string(path).await
        .with_context(|| format!("Reading LDIF file: {:?}", path))?;

    let count = directory.import_ldif(&content)
        .with_context(|| format!("Importing LDIF file: {:?}", path))?;
    info!("Imported #{} '{}'", count, path.display());

    return Ok(count);
}

/// Position of a file in the import order, taken from a numeric prefix like in `01_users.ldif`
fn import_order(name: &str) -> Option<u32> {
    let (prefix, _) = name.split_once('_')?;
    if prefix.is_empty() || !prefix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    return prefix.parse().ok();
}

/// Sorts files by their numeric prefix. Files without a prefix are moved to the end, keeping
/// their relative order.
fn sort_ldif_files(files: &mut [PathBuf]) {
    files.sort_by_key(|path| {
        let order = path.file_name()
            .and_then(|name| name.to_str())
            .and_then(import_order);
        return (order.is_none(), order);
    });
}

/// Lists the regular `.ldif` files of a directory in import order.
pub async fn ldif_files(path: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let path = path.as_ref();

    let mut dir = tokio::fs::read_dir(path).await
        .with_context(|| format!("Reading dir: {:?}", path))?;

    let mut files = Vec::new();

    while let Some(entry) = dir.next_entry().await? {
        let name = entry.file_name();
        let name = if let Some(name) = name.to_str() { name } else {
            warn!("Ignoring file with invalid filename: {:?}", entry.path());
            continue;
        };

        if !name.ends_with(".ldif") {
            debug!("Ignoring file with wrong extension: {:?}", entry.path());
            continue;
        }

        match tokio::fs::metadata(entry.path()).await {
            Ok(metadata) if metadata.is_file() => {}
            Ok(_) => {
                debug!("Ignoring non-regular file: {:?}", entry.path());
                continue;
            }
            Err(err) => {
                debug!("Ignoring unreadable file {:?}: {}", entry.path(), err);
                continue;
            }
        }

        files.push(entry.path());
    }

    sort_ldif_files(&mut files);

    return Ok(files);
}
