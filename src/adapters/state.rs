use crate::domain::model::StateFile;
use crate::domain::ports::StateStore;
use crate::utils::error::Result;
use std::fs;
use std::path::{Path, PathBuf};

/// JSON 狀態檔存在本機檔案系統；檔案不存在視為尚未部署
#[derive(Debug, Clone)]
pub struct LocalStateStore {
    path: PathBuf,
}

impl LocalStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StateStore for LocalStateStore {
    async fn load(&self) -> Result<Option<StateFile>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let state: StateFile = serde_json::from_str(&content)?;
        Ok(Some(state))
    }

    async fn save(&self, state: &StateFile) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(state)?;
        fs::write(&self.path, content)?;
        Ok(())
    }
}
