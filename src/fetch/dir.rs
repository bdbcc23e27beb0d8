use super::ScriptSource;
use anyhow::{bail, Context, Result};
use std::{fs, path::PathBuf};
use tracing::debug;

/// Scripts stored as files in a directory, named `<id>` or `<id>.sql`.
#[derive(Debug, Clone)]
pub struct DirScriptSource {
    root: PathBuf,
}

impl DirScriptSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ScriptSource for DirScriptSource {
    fn read_script(&self, script_id: &str) -> Result<String> {
        if script_id.is_empty() || script_id.contains(['/', '\\']) || script_id.starts_with('.') {
            bail!("invalid script id `{script_id}`");
        }
        let plain = self.root.join(script_id);
        let path = if plain.is_file() {
            plain
        } else {
            self.root.join(format!("{script_id}.sql"))
        };
        debug!(path = %path.display(), "reading script");
        fs::read_to_string(&path)
            .with_context(|| format!("failed to read script {}", path.display()))
    }
}
