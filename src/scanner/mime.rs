use crate::config::MimeSource;
use crate::error::Error;
use std::path::Path;
use std::process::Command;
use std::sync::Arc;

/// Resolves the MIME type string of a file on disk.
pub trait MimeResolver: Send + Sync {
    fn resolve(&self, path: &Path) -> Result<String, Error>;
}

pub fn resolver_for(source: MimeSource) -> Arc<dyn MimeResolver> {
    match source {
        MimeSource::FileCommand => Arc::new(FileCommand::new()),
        MimeSource::Extension => Arc::new(ExtensionGuess),
    }
}

/// Asks the `file` utility (`file --mime-type --brief <path>`).
///
/// The tool being absent or failing is reported as an error, never as an
/// empty MIME type.
#[derive(Debug, Clone)]
pub struct FileCommand {
    program: String,
}

impl FileCommand {
    pub fn new() -> Self {
        Self {
            program: "file".to_string(),
        }
    }

    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for FileCommand {
    fn default() -> Self {
        Self::new()
    }
}

impl MimeResolver for FileCommand {
    fn resolve(&self, path: &Path) -> Result<String, Error> {
        let output = Command::new(&self.program)
            .arg("--mime-type")
            .arg("--brief")
            .arg("--")
            .arg(path)
            .output()
            .map_err(|e| Error::Mime {
                path: path.to_path_buf(),
                reason: format!("{}: {}", self.program, e),
            })?;

        if !output.status.success() {
            return Err(Error::Mime {
                path: path.to_path_buf(),
                reason: format!(
                    "{} exited with {}: {}",
                    self.program,
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        mime_from_output(path, &String::from_utf8_lossy(&output.stdout))
    }
}

/// `file` reports unreadable paths on stdout and still exits 0.
fn mime_from_output(path: &Path, stdout: &str) -> Result<String, Error> {
    let mime = stdout.trim_end_matches(&['\n', '\r'][..]);
    if mime.is_empty() || mime.starts_with("cannot open") {
        return Err(Error::Mime {
            path: path.to_path_buf(),
            reason: if mime.is_empty() {
                "empty output".to_string()
            } else {
                mime.to_string()
            },
        });
    }
    Ok(mime.to_string())
}

/// Guesses from the file extension only. Unknown extensions resolve to
/// `application/octet-stream`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtensionGuess;

impl MimeResolver for ExtensionGuess {
    fn resolve(&self, path: &Path) -> Result<String, Error> {
        Ok(mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string())
    }
}
