use crate::core::Storage;
use crate::utils::error::{EstimatorError, Result};
use std::path::{Path, PathBuf};

/// 本機檔案儲存；相對路徑以 base_path 為根
#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn resolve(&self, path: &str) -> PathBuf {
        self.base_path.join(path)
    }

    /// 列出目錄下指定副檔名的檔案，依檔名排序
    pub async fn list_files(&self, dir: &str, extension: &str) -> Result<Vec<PathBuf>> {
        let mut entries = tokio::fs::read_dir(self.resolve(dir)).await?;
        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let matches = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case(extension));
            if matches {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}

impl Storage for LocalStorage {
    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let full_path = self.resolve(path);
        match tokio::fs::read(&full_path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(EstimatorError::NotFoundError {
                resource: "File".to_string(),
                detail: full_path.display().to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
        let full_path = self.resolve(path);

        if let Some(parent) = full_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        tokio::fs::write(&full_path, data).await?;
        tracing::debug!("💾 Wrote {} bytes to {}", data.len(), full_path.display());
        Ok(())
    }
}

/// 副檔名（小寫）
pub fn extension_of(path: &str) -> Option<String> {
    Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_lowercase)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_creates_directories_and_reads_back() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path());

        storage.write_file("nested/out/data.txt", b"hello").await.unwrap();
        let data = storage.read_file("nested/out/data.txt").await.unwrap();

        assert_eq!(data, b"hello");
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path());

        let err = tokio_test::block_on(storage.read_file("missing.toml")).unwrap_err();
        assert!(matches!(err, EstimatorError::NotFoundError { .. }));
    }

    #[tokio::test]
    async fn test_list_files_filters_and_sorts() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path());
        for name in ["page-2.png", "page-1.PNG", "notes.txt"] {
            storage.write_file(&format!("pages/{}", name), b"x").await.unwrap();
        }

        let files = storage.list_files("pages", "png").await.unwrap();
        let names: Vec<_> = files
            .iter()
            .filter_map(|p| p.file_name().and_then(|n| n.to_str()))
            .collect();
        assert_eq!(names, vec!["page-1.PNG", "page-2.png"]);
        assert_eq!(extension_of("Roof.JSON").as_deref(), Some("json"));
    }
}
