use crate::error::{Error, Result};
use std::path::Path;

/// Validates a server name
pub fn validate_server_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::Validation("Server name is empty".to_string()));
    }

    // Names end up in log lines and report output
    if name.chars().any(char::is_control) {
        return Err(Error::Validation(format!(
            "Server name {:?} contains control characters",
            name
        )));
    }

    Ok(())
}

/// Validates a normalized server control path
pub fn validate_server_path(name: &str, path: &Path) -> Result<()> {
    if path.as_os_str().is_empty() {
        return Err(Error::Validation(format!("Server '{}' has empty path", name)));
    }

    // The lifecycle executables are siblings named after the final segment
    if path.file_name().is_none() {
        return Err(Error::Validation(format!(
            "Server '{}' path {} has no final segment",
            name,
            path.display()
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_blank_and_control_names() {
        assert!(validate_server_name("alice").is_ok());
        assert!(validate_server_name("   ").is_err());
        assert!(validate_server_name("bad\nname").is_err());
    }

    #[test]
    fn test_rejects_paths_without_final_segment() {
        assert!(validate_server_path("a", Path::new("/srv/a")).is_ok());
        assert!(validate_server_path("a", Path::new("")).is_err());
        assert!(validate_server_path("a", Path::new("/")).is_err());
        assert!(validate_server_path("a", Path::new("/srv/..")).is_err());
    }
}
