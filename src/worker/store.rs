use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use super::Store;
use crate::error::StoreError;

/// Runs `<program> <args...> <path>` and takes trimmed stdout as the content
/// identifier. With the server defaults this is `ipfs add --quieter <path>`.
#[derive(Debug, Clone)]
pub struct CommandStore {
    program: String,
    args: Vec<String>,
}

impl CommandStore {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

#[async_trait]
impl Store for CommandStore {
    async fn store(&self, path: &Path) -> Result<String, StoreError> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(path)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            return Err(StoreError::Failed {
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let identifier = stdout.trim_end_matches(['\r', '\n']);
        if identifier.is_empty() {
            return Err(StoreError::EmptyIdentifier);
        }
        Ok(identifier.to_string())
    }
}
