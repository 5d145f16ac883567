use std::{
    ops::Deref,
    path::{Path, PathBuf},
    sync::Arc,
};

use uuid::Uuid;

pub(crate) type ArcTmpDir = Arc<TmpDir>;

#[derive(Debug)]
pub(crate) struct TmpDir {
    path: Option<PathBuf>,
}

impl TmpDir {
    pub(crate) async fn init<P: AsRef<Path>>(path: P) -> std::io::Result<Arc<Self>> {
        let path = path.as_ref().join(Uuid::now_v7().to_string());
        tokio::fs::create_dir_all(&path).await?;
        Ok(Arc::new(TmpDir { path: Some(path) }))
    }

    pub(crate) fn tmp_file(&self, ext: Option<&str>) -> TmpFile {
        let dir = self.path.as_ref().expect("tmp path exists");

        let path = if let Some(ext) = ext {
            dir.join(format!("{}{}", Uuid::now_v7(), ext))
        } else {
            dir.join(Uuid::now_v7().to_string())
        };

        TmpFile(Some(path))
    }

    pub(crate) async fn cleanup(self: Arc<Self>) -> std::io::Result<()> {
        if let Some(path) = Arc::into_inner(self).and_then(|mut this| this.path.take()) {
            tokio::fs::remove_dir_all(path).await?;
        }

        Ok(())
    }
}

impl Drop for TmpDir {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            let _ = std::fs::remove_dir_all(path);
        }
    }
}

#[must_use]
#[derive(Debug)]
pub(crate) struct TmpFile(Option<PathBuf>);

impl TmpFile {
    pub(crate) fn from_path(path: PathBuf) -> Self {
        TmpFile(Some(path))
    }

    pub(crate) async fn cleanup(mut self) -> std::io::Result<()> {
        if let Some(path) = self.0.take() {
            tokio::fs::remove_file(path).await?;
        }

        Ok(())
    }
}

impl AsRef<Path> for TmpFile {
    fn as_ref(&self) -> &Path {
        self.0.as_deref().expect("tmp file exists")
    }
}

impl Deref for TmpFile {
    type Target = Path;

    fn deref(&self) -> &Self::Target {
        self.0.as_deref().expect("tmp file exists")
    }
}

impl Drop for TmpFile {
    fn drop(&mut self) {
        if let Some(path) = self.0.take() {
            let _ = std::fs::remove_file(path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::TmpDir;

    #[tokio::test]
    async fn tmp_file_removed_on_drop() {
        let tmp_dir = TmpDir::init(std::env::temp_dir().join("vid-rs-tests"))
            .await
            .expect("Created tmp dir");

        let tmp_file = tmp_dir.tmp_file(Some(".mp4"));
        let path = tmp_file.to_path_buf();

        tokio::fs::write(&path, b"bytes").await.expect("Wrote file");
        assert!(path.exists());

        drop(tmp_file);
        assert!(!path.exists());

        tmp_dir.cleanup().await.expect("Removed tmp dir");
    }

    #[tokio::test]
    async fn tmp_file_removed_on_cleanup() {
        let tmp_dir = TmpDir::init(std::env::temp_dir().join("vid-rs-tests"))
            .await
            .expect("Created tmp dir");

        let tmp_file = tmp_dir.tmp_file(None);
        let path = tmp_file.to_path_buf();

        tokio::fs::write(&path, b"bytes").await.expect("Wrote file");

        tmp_file.cleanup().await.expect("Removed tmp file");
        assert!(!path.exists());

        tmp_dir.cleanup().await.expect("Removed tmp dir");
    }

    #[tokio::test]
    async fn tmp_dir_removes_stragglers() {
        let tmp_dir = TmpDir::init(std::env::temp_dir().join("vid-rs-tests"))
            .await
            .expect("Created tmp dir");

        let tmp_file = tmp_dir.tmp_file(Some(".mp4"));
        let path = tmp_file.to_path_buf();
        std::mem::forget(tmp_file);

        tokio::fs::write(&path, b"bytes").await.expect("Wrote file");

        tmp_dir.cleanup().await.expect("Removed tmp dir");
        assert!(!path.exists());
    }
}
