//! Where the bearer credential comes from.
//!
//! The controller reads the credential once per connection attempt and
//! never writes it. Issuing and refreshing tokens is someone else's job.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// Read-only access to the current bearer token.
pub trait CredentialSource: Send + Sync {
    /// The token, or `None` when the user is not authenticated.
    fn credential(&self) -> Option<String>;
}

/// A token fixed at startup, from configuration or the command line.
#[derive(Debug, Clone, Default)]
pub struct StaticCredential {
    token: Option<String>,
}

impl StaticCredential {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
        }
    }

    /// A source that never has a token.
    pub fn none() -> Self {
        Self { token: None }
    }
}

impl CredentialSource for StaticCredential {
    fn credential(&self) -> Option<String> {
        self.token.clone().filter(|t| !t.trim().is_empty())
    }
}

/// A token stored in a file by a separate login flow.
///
/// The file is re-read on every call so a fresh login is picked up by the
/// next reconnect. A missing or blank file means no token.
#[derive(Debug, Clone)]
pub struct SessionFile {
    path: PathBuf,
}

impl SessionFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialSource for SessionFile {
    fn credential(&self) -> Option<String> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => {
                let token = contents.trim();
                if token.is_empty() {
                    debug!(path = %self.path.display(), "session file is empty");
                    None
                } else {
                    Some(token.to_string())
                }
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no session file");
                None
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "cannot read session file");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_static_credential() {
        assert_eq!(StaticCredential::new("jwt").credential(), Some("jwt".to_string()));
        assert_eq!(StaticCredential::new("  ").credential(), None);
        assert_eq!(StaticCredential::none().credential(), None);
    }

    #[test]
    fn test_session_file_reads_trimmed_token() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "  eyJhbGciOiJIUzI1NiJ9.e30.sig  ").unwrap();
        file.flush().unwrap();

        let source = SessionFile::new(file.path());
        assert_eq!(
            source.credential(),
            Some("eyJhbGciOiJIUzI1NiJ9.e30.sig".to_string())
        );
    }

    #[test]
    fn test_session_file_blank_or_missing() {
        let file = NamedTempFile::new().unwrap();
        assert_eq!(SessionFile::new(file.path()).credential(), None);

        let dir = tempfile::tempdir().unwrap();
        let missing = SessionFile::new(dir.path().join("session"));
        assert_eq!(missing.credential(), None);
    }

    #[test]
    fn test_session_file_picks_up_new_login() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session");
        let source = SessionFile::new(&path);
        assert_eq!(source.credential(), None);

        std::fs::write(&path, "fresh-token\n").unwrap();
        assert_eq!(source.credential(), Some("fresh-token".to_string()));
    }
}
