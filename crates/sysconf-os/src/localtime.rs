// # Local-Time Symlink Adapter
//
// The system local time is selected by a symbolic link (normally
// `/etc/localtime`) into the zone database (normally `/usr/share/zoneinfo`).
//
// ## Swap
//
// A new link is created next to the target under a temporary name and then
// renamed over it. rename(2) replaces the old link atomically, so readers
// see either the old zone or the new one, never a missing file.
//
// ## Zone Database
//
// A zone is known when `<zoneinfo_dir>/<zone>` is a regular file starting
// with the `TZif` magic. Index files such as `zone.tab` do not count.

use std::io::{ErrorKind, Read};
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use sysconf_core::{Error, LocaltimeService, Result, ZoneDatabase};
use tokio::fs;
use tracing::{debug, warn};

const SERVICE: &str = "localtime";

/// Magic bytes at the start of every compiled zone file
const TZIF_MAGIC: &[u8; 4] = b"TZif";

/// Zone database rooted at a zoneinfo directory
#[derive(Debug, Clone)]
pub struct ZoneinfoDatabase {
    root: PathBuf,
}

impl ZoneinfoDatabase {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File for `zone`, if the name stays inside the database
    fn zone_path(&self, zone: &str) -> Option<PathBuf> {
        let relative = Path::new(zone);
        if zone.is_empty()
            || !relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)))
        {
            return None;
        }
        Some(self.root.join(relative))
    }
}

impl ZoneDatabase for ZoneinfoDatabase {
    fn contains(&self, zone: &str) -> bool {
        let Some(path) = self.zone_path(zone) else {
            return false;
        };

        let mut magic = [0u8; 4];
        match std::fs::File::open(&path) {
            Ok(mut file) => {
                file.metadata().map(|m| m.is_file()).unwrap_or(false)
                    && file.read_exact(&mut magic).is_ok()
                    && &magic == TZIF_MAGIC
            }
            Err(_) => false,
        }
    }
}

/// Local time selected by a symlink into the zone database
#[derive(Debug, Clone)]
pub struct SymlinkLocaltime {
    path: PathBuf,
    zones: ZoneinfoDatabase,
}

impl SymlinkLocaltime {
    pub fn new(path: impl Into<PathBuf>, zones: ZoneinfoDatabase) -> Self {
        Self {
            path: path.into(),
            zones,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sibling of the link used while swapping
    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "localtime".to_string());
        self.path.with_file_name(format!(".{name}.sysconf-tmp"))
    }

    /// Map a link target back onto a zone name
    fn zone_of(&self, target: &Path) -> Option<String> {
        let absolute = if target.is_absolute() {
            target.to_path_buf()
        } else {
            self.path.parent().unwrap_or(Path::new("/")).join(target)
        };

        let relative = match absolute.strip_prefix(self.zones.root()) {
            Ok(relative) => relative.to_path_buf(),
            // e.g. `../usr/share/zoneinfo/Europe/Berlin`
            Err(_) => {
                let resolved = std::fs::canonicalize(&absolute).ok()?;
                let root = std::fs::canonicalize(self.zones.root()).ok()?;
                resolved.strip_prefix(&root).ok()?.to_path_buf()
            }
        };

        let zone = relative.to_str()?.to_string();
        self.zones.contains(&zone).then_some(zone)
    }
}

fn io_error(err: std::io::Error, action: &str, path: &Path) -> Error {
    match err.kind() {
        ErrorKind::PermissionDenied => Error::permission_denied(SERVICE),
        _ => Error::service(SERVICE, format!("Failed to {} {}: {}", action, path.display(), err)),
    }
}

#[async_trait]
impl LocaltimeService for SymlinkLocaltime {
    async fn swap_target(&self, zone: &str) -> Result<()> {
        let target = match self.zones.zone_path(zone) {
            Some(target) if self.zones.contains(zone) => target,
            _ => {
                return Err(Error::service(
                    SERVICE,
                    format!("Zone {zone:?} is not in {}", self.zones.root().display()),
                ));
            }
        };

        let temp = self.temp_path();
        match fs::remove_file(&temp).await {
            Ok(()) => warn!("Removed stale {}", temp.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(io_error(e, "remove", &temp)),
        }

        fs::symlink(&target, &temp)
            .await
            .map_err(|e| io_error(e, "create", &temp))?;

        if let Err(e) = fs::rename(&temp, &self.path).await {
            let _ = fs::remove_file(&temp).await;
            return Err(io_error(e, "replace", &self.path));
        }

        debug!("{} now points at {}", self.path.display(), target.display());
        Ok(())
    }

    async fn current_zone(&self) -> Result<Option<String>> {
        match fs::read_link(&self.path).await {
            Ok(target) => Ok(self.zone_of(&target)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            // exists, but is a plain file rather than a link
            Err(e) if e.kind() == ErrorKind::InvalidInput => {
                warn!("{} is not a symbolic link", self.path.display());
                Ok(None)
            }
            Err(e) => Err(io_error(e, "read", &self.path)),
        }
    }
}
