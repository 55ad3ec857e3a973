//! File ownership and permission handling
//!
//! Unix only. User and group names are resolved through the system account
//! database; purely numeric names are taken as ids.

use std::ffi::CString;
use std::fs::Permissions;
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::Path;

use crate::utils::error::{AppError, AppResult};

/// Permission and ownership bits of a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileAttributes {
    /// Permission bits including setuid/setgid/sticky
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
}

impl FileAttributes {
    /// Mode in the leading-zero octal notation used by `mode`
    pub fn mode_string(&self) -> String {
        format!("0{:03o}", self.mode)
    }
}

/// Read the attributes of `path`
pub fn read_attributes(path: &Path) -> AppResult<FileAttributes> {
    let metadata = std::fs::metadata(path)?;
    Ok(FileAttributes {
        mode: metadata.mode() & 0o7777,
        uid: metadata.uid(),
        gid: metadata.gid(),
    })
}

/// Set permission bits on `path`
pub fn set_mode(path: &Path, mode: u32) -> AppResult<()> {
    std::fs::set_permissions(path, Permissions::from_mode(mode))?;
    Ok(())
}

/// Change owner and/or group of `path`
pub fn set_ownership(path: &Path, uid: Option<u32>, gid: Option<u32>) -> AppResult<()> {
    std::os::unix::fs::chown(path, uid, gid)?;
    Ok(())
}

/// Resolve a user name (or numeric uid) to a uid
pub fn resolve_user(name: &str) -> AppResult<u32> {
    if let Ok(uid) = name.parse::<u32>() {
        return Ok(uid);
    }

    let c_name = CString::new(name)
        .map_err(|_| AppError::NotFound(format!("User {} does not exist", name)))?;

    // getpwnam returns NULL or a pointer into static storage, read immediately
    let entry = unsafe { libc::getpwnam(c_name.as_ptr()) };
    if entry.is_null() {
        return Err(AppError::NotFound(format!("User {} does not exist", name)));
    }
    Ok(unsafe { (*entry).pw_uid })
}

/// Resolve a group name (or numeric gid) to a gid
pub fn resolve_group(name: &str) -> AppResult<u32> {
    if let Ok(gid) = name.parse::<u32>() {
        return Ok(gid);
    }

    let c_name = CString::new(name)
        .map_err(|_| AppError::NotFound(format!("Group {} does not exist", name)))?;

    // getgrnam returns NULL or a pointer into static storage, read immediately
    let entry = unsafe { libc::getgrnam(c_name.as_ptr()) };
    if entry.is_null() {
        return Err(AppError::NotFound(format!("Group {} does not exist", name)));
    }
    Ok(unsafe { (*entry).gr_gid })
}
