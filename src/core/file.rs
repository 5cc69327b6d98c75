use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use bytes::Bytes;
use futures::Stream;
use futures::stream;
use serde::Deserialize;
use tokio_util::io::ReaderStream;
use super::errors::ConfigurationError;

pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

pub type FileStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send + Sync>>;

/// A file held in memory together with its metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InMemoryFile {
    pub name: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

impl InMemoryFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            content_type: None,
            bytes: bytes.into(),
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// Where the file to upload comes from. Nothing is selected by default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "Option<PathBuf>")]
pub enum FileSource {
    #[default]
    Unselected,
    Path(PathBuf),
    Memory(InMemoryFile),
}

impl FileSource {
    pub fn is_selected(&self) -> bool {
        !matches!(self, FileSource::Unselected)
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            FileSource::Path(path) => Some(path),
            _ => None,
        }
    }

    /// Resolves the selection to exactly one readable file.
    pub async fn resolve(&self) -> Result<ResolvedFile, ConfigurationError> {
        match self {
            FileSource::Unselected => Err(ConfigurationError::MissingFile),
            FileSource::Path(path) => {
                if path.as_os_str().is_empty() {
                    return Err(ConfigurationError::MissingFile);
                }

                let metadata = tokio::fs::metadata(path)
                    .await
                    .map_err(|_| ConfigurationError::MissingFile)?;
                if !metadata.is_file() {
                    return Err(ConfigurationError::MissingFile);
                }

                Ok(ResolvedFile {
                    name: file_name(path),
                    content_type: None,
                    size: metadata.len(),
                    content: FileContent::Path(path.clone()),
                })
            }
            FileSource::Memory(file) => Ok(ResolvedFile {
                name: file.name.clone(),
                content_type: file.content_type.clone(),
                size: file.bytes.len() as u64,
                content: FileContent::Memory(file.bytes.clone()),
            }),
        }
    }
}

impl From<Option<PathBuf>> for FileSource {
    fn from(path: Option<PathBuf>) -> Self {
        match path {
            Some(path) => FileSource::Path(path),
            None => FileSource::Unselected,
        }
    }
}

impl From<PathBuf> for FileSource {
    fn from(path: PathBuf) -> Self {
        FileSource::Path(path)
    }
}

impl From<&Path> for FileSource {
    fn from(path: &Path) -> Self {
        FileSource::Path(path.to_path_buf())
    }
}

impl From<&str> for FileSource {
    fn from(path: &str) -> Self {
        FileSource::Path(PathBuf::from(path))
    }
}

impl From<InMemoryFile> for FileSource {
    fn from(file: InMemoryFile) -> Self {
        FileSource::Memory(file)
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "file".to_string())
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum FileContent {
    Path(PathBuf),
    Memory(Bytes),
}

/// A selected file, ready to be streamed into a request body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFile {
    pub name: String,
    pub content_type: Option<String>,
    pub size: u64,
    content: FileContent,
}

impl ResolvedFile {
    pub fn content_type_or_default(&self) -> &str {
        self.content_type.as_deref().unwrap_or(DEFAULT_CONTENT_TYPE)
    }

    pub async fn read_all(&self) -> io::Result<Bytes> {
        match &self.content {
            FileContent::Path(path) => Ok(Bytes::from(tokio::fs::read(path).await?)),
            FileContent::Memory(bytes) => Ok(bytes.clone()),
        }
    }

    pub async fn byte_stream(&self, chunk_size: usize) -> io::Result<FileStream> {
        let chunk_size = chunk_size.max(1);
        match &self.content {
            FileContent::Path(path) => {
                let file = tokio::fs::File::open(path).await?;
                Ok(Box::pin(ReaderStream::with_capacity(file, chunk_size)))
            }
            FileContent::Memory(bytes) => {
                let bytes = bytes.clone();
                let chunks: Vec<io::Result<Bytes>> = (0..bytes.len())
                    .step_by(chunk_size)
                    .map(|start| Ok(bytes.slice(start..(start + chunk_size).min(bytes.len()))))
                    .collect();
                Ok(Box::pin(stream::iter(chunks)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;

    #[tokio::test]
    async fn test_unselected_source_is_missing_file() {
        let err = FileSource::Unselected.resolve().await.unwrap_err();
        assert_eq!(err, ConfigurationError::MissingFile);

        let err = FileSource::Path(PathBuf::new()).resolve().await.unwrap_err();
        assert_eq!(err, ConfigurationError::MissingFile);
    }

    #[tokio::test]
    async fn test_nonexistent_path_is_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let source = FileSource::from(dir.path().join("absent.bin"));
        assert_eq!(source.resolve().await.unwrap_err(), ConfigurationError::MissingFile);

        // a directory is not a file either
        let source = FileSource::from(dir.path());
        assert_eq!(source.resolve().await.unwrap_err(), ConfigurationError::MissingFile);
    }

    #[tokio::test]
    async fn test_resolve_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.pdf");
        tokio::fs::write(&path, b"%PDF-1.7").await.unwrap();

        let resolved = FileSource::from(path).resolve().await.unwrap();
        assert_eq!(resolved.name, "report.pdf");
        assert_eq!(resolved.size, 8);
        assert_eq!(resolved.content_type_or_default(), DEFAULT_CONTENT_TYPE);
        assert_eq!(resolved.read_all().await.unwrap(), Bytes::from_static(b"%PDF-1.7"));
    }

    #[tokio::test]
    async fn test_memory_stream_chunks() {
        let file = InMemoryFile::new("data.bin", vec![7u8; 10]).with_content_type("application/x-test");
        let resolved = FileSource::from(file).resolve().await.unwrap();
        assert_eq!(resolved.content_type_or_default(), "application/x-test");

        let chunks: Vec<Bytes> = resolved.byte_stream(4).await.unwrap().try_collect().await.unwrap();
        let sizes: Vec<usize> = chunks.iter().map(|c| c.len()).collect();
        assert_eq!(sizes, vec![4, 4, 2]);
    }

    #[test]
    fn test_deserialize_from_path() {
        #[derive(Deserialize)]
        struct Wrapper {
            file: FileSource,
        }

        let wrapper: Wrapper = toml::from_str(r#"file = "/tmp/report.pdf""#).unwrap();
        assert_eq!(wrapper.file, FileSource::Path(PathBuf::from("/tmp/report.pdf")));
    }
}
