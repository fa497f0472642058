use super::{DataFile, DataSource, IndexFile, Storage};
use crate::{Error, Result, types::Format};
use async_trait::async_trait;
use bytes::Bytes;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tokio::fs;

pub struct LocalStorage {
    data_dir: PathBuf,
}

impl LocalStorage {
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    fn make_file_path(&self, id: &str, format: Format) -> Result<PathBuf> {
        if !is_safe_id(id) {
            return Err(Error::NotFound(id.to_string()));
        }
        Ok(self.data_dir.join(format!("{}.{}", id, format.extension())))
    }

    async fn find_index(path: &Path, format: Format) -> Option<IndexFile> {
        for kind in format.index_kinds() {
            let idx_ext = kind.extension();
            // Check both appended (file.bam.bai) and replaced (file.bai) conventions
            let appended_idx = PathBuf::from(format!("{}.{}", path.display(), idx_ext));
            let replaced_idx = path.with_extension(idx_ext);

            for candidate in [appended_idx, replaced_idx] {
                if let Ok(metadata) = fs::metadata(&candidate).await {
                    if metadata.is_file() {
                        return Some(IndexFile {
                            path: candidate,
                            kind: *kind,
                            modified: metadata.modified().ok(),
                        });
                    }
                }
            }
        }
        None
    }
}

fn is_safe_id(id: &str) -> bool {
    if id.is_empty() || id.contains('\\') || id.starts_with('/') {
        return false;
    }
    Path::new(id)
        .components()
        .all(|c| matches!(c, Component::Normal(_)))
}

#[async_trait]
impl Storage for LocalStorage {
    async fn locate(&self, id: &str, format: Format) -> Result<DataFile> {
        let path = self.make_file_path(id, format)?;
        let metadata = fs::metadata(&path)
            .await
            .map_err(|_| Error::NotFound(id.to_string()))?;
        if !metadata.is_file() {
            return Err(Error::NotFound(id.to_string()));
        }

        let index = Self::find_index(&path, format).await;

        Ok(DataFile {
            id: id.to_string(),
            format,
            size: metadata.len(),
            modified: metadata.modified().ok(),
            path,
            index,
        })
    }

    async fn read_index(&self, index: &IndexFile) -> Result<Bytes> {
        match fs::read(&index.path).await {
            Ok(bytes) => Ok(Bytes::from(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(Error::NotFound(index.path.display().to_string()))
            }
            Err(e) => Err(Error::Io(e)),
        }
    }

    async fn open_data(&self, file: &DataFile) -> Result<DataSource> {
        let handle = match fs::File::open(&file.path).await {
            Ok(handle) => handle,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(Error::NotFound(file.id.clone()));
            }
            Err(e) => return Err(Error::Io(e)),
        };
        let size = handle.metadata().await?.len();

        Ok(DataSource {
            size,
            reader: Box::new(handle),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::ByteRange;
    use crate::types::IndexKind;

    fn storage_with(files: &[(&str, &[u8])]) -> (tempfile::TempDir, LocalStorage) {
        let dir = tempfile::tempdir().unwrap();
        for (name, contents) in files {
            std::fs::write(dir.path().join(name), contents).unwrap();
        }
        let storage = LocalStorage::new(dir.path().to_path_buf());
        (dir, storage)
    }

    #[tokio::test]
    async fn test_locate_with_appended_index() {
        let (_dir, storage) = storage_with(&[("a.bam", b"data"), ("a.bam.bai", b"idx")]);

        let file = storage.locate("a", Format::Bam).await.unwrap();
        assert_eq!(file.size, 4);
        let index = file.index.unwrap();
        assert_eq!(index.kind, IndexKind::Bai);
        assert!(index.path.ends_with("a.bam.bai"));
    }

    #[tokio::test]
    async fn test_locate_with_replaced_extension_csi() {
        let (_dir, storage) = storage_with(&[("b.bcf", b"data"), ("b.csi", b"idx")]);

        let file = storage.locate("b", Format::Bcf).await.unwrap();
        assert_eq!(file.index.unwrap().kind, IndexKind::Csi);
    }

    #[tokio::test]
    async fn test_locate_without_index() {
        let (_dir, storage) = storage_with(&[("c.vcf.gz", b"data")]);

        let file = storage.locate("c", Format::Vcf).await.unwrap();
        assert!(file.index.is_none());
    }

    #[tokio::test]
    async fn test_locate_missing_file() {
        let (_dir, storage) = storage_with(&[]);
        let err = storage.locate("nope", Format::Bam).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_locate_rejects_traversal() {
        let (_dir, storage) = storage_with(&[("a.bam", b"data")]);
        for id in ["../a", "/etc/passwd", "x\\y", ""] {
            let err = storage.locate(id, Format::Bam).await.unwrap_err();
            assert!(matches!(err, Error::NotFound(_)), "{id} was accepted");
        }
    }

    #[tokio::test]
    async fn test_read_range() {
        let (_dir, storage) = storage_with(&[("a.bam", b"0123456789")]);
        let file = storage.locate("a", Format::Bam).await.unwrap();

        let bytes = storage.read_range(&file, ByteRange::new(2, 6)).await.unwrap();
        assert_eq!(&bytes[..], b"2345");

        let err = storage
            .read_range(&file, ByteRange::new(8, 12))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::RangeUnsatisfiable { size: 10, .. }));
    }

    #[tokio::test]
    async fn test_open_data_after_delete() {
        let (dir, storage) = storage_with(&[("a.bam", b"data")]);
        let file = storage.locate("a", Format::Bam).await.unwrap();
        std::fs::remove_file(dir.path().join("a.bam")).unwrap();

        let err = storage.open_data(&file).await.err().unwrap();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
