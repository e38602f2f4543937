use crate::domain::ports::KeyValueStore;
use crate::utils::error::Result;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// 以 JSON 檔案保存的 session 鍵值（CLI 版的 localStorage）
#[derive(Debug, Clone)]
pub struct LocalSessionStore {
    path: PathBuf,
}

impl LocalSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let data = fs::read(&self.path)?;
        if data.is_empty() {
            return Ok(BTreeMap::new());
        }
        Ok(serde_json::from_slice(&data)?)
    }

    fn save(&self, items: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(&self.path, serde_json::to_vec_pretty(items)?)?;
        Ok(())
    }
}

impl KeyValueStore for LocalSessionStore {
    async fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.load()?.remove(key))
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let mut items = self.load()?;
        items.insert(key.to_string(), value.to_string());
        self.save(&items)
    }

    async fn remove_item(&self, key: &str) -> Result<()> {
        let mut items = self.load()?;
        if items.remove(key).is_some() {
            self.save(&items)?;
        }
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_items_persist_across_instances() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("session.json");

        let store = LocalSessionStore::new(&path);
        assert_eq!(store.get_item("sessionToken").await.unwrap(), None);

        store.set_item("sessionToken", "abc").await.unwrap();
        store.set_item("rememberLogin", "true").await.unwrap();

        let reopened = LocalSessionStore::new(&path);
        assert_eq!(
            reopened.get_item("sessionToken").await.unwrap().as_deref(),
            Some("abc")
        );

        reopened.remove_item("sessionToken").await.unwrap();
        assert_eq!(store.get_item("sessionToken").await.unwrap(), None);
        assert_eq!(
            store.get_item("rememberLogin").await.unwrap().as_deref(),
            Some("true")
        );

        store.clear().await.unwrap();
        assert!(!path.exists());
        assert_eq!(store.get_item("rememberLogin").await.unwrap(), None);
    }
}
