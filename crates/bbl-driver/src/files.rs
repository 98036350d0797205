use std::path::Path;

use crate::error::DriverError;

/// Write a generated file, creating its directory first.
pub(crate) async fn write(path: &Path, data: impl AsRef<[u8]>) -> Result<(), DriverError> {
    if let Some(dir) = path.parent() {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| DriverError::io(&format!("create {}", dir.display()), e))?;
    }
    tokio::fs::write(path, data)
        .await
        .map_err(|e| DriverError::io(&format!("write {}", path.display()), e))
}

/// Write a file readable only by its owner.
pub(crate) async fn write_private(path: &Path, data: impl AsRef<[u8]>) -> Result<(), DriverError> {
    write(path, data).await?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
            .await
            .map_err(|e| DriverError::io(&format!("chmod {}", path.display()), e))?;
    }
    Ok(())
}

/// Read a file, treating a missing one as empty.
pub(crate) async fn read_optional(path: &Path) -> Result<String, DriverError> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Ok(content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
        Err(e) => Err(DriverError::io(&format!("read {}", path.display()), e)),
    }
}

pub(crate) async fn remove_optional(path: &Path) -> Result<(), DriverError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(DriverError::io(&format!("remove {}", path.display()), e)),
    }
}
