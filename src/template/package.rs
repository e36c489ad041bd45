use crate::registry::ConfiguredFunction;
use crate::types::Resource;
use async_trait::async_trait;
use std::io::{Cursor, Write};
use std::path::PathBuf;
use thiserror::Error as ThisError;
use zip::write::FileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

#[derive(ThisError, Debug)]
pub enum PackageError {
    #[error("Failed to read resource {path}: {source}")]
    ReadResource {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to write archive: {0}")]
    Zip(
        #[source]
        #[from]
        zip::result::ZipError,
    ),
    #[error("Failed to write archive: {0}")]
    Io(
        #[source]
        #[from]
        std::io::Error,
    ),
}

/// Turns the sources of a function into an archive.
#[async_trait]
pub trait Packager: Send + Sync {
    async fn package(&self, function: &ConfiguredFunction) -> Result<Vec<u8>, PackageError>;
}

/// Zips local files into a byte-reproducible archive.
///
/// Entries are sorted by their path inside the archive and carry a fixed modification time,
/// so the same files always produce the same bytes.
#[derive(Debug, Clone, Default)]
pub struct ZipPackager {
    /// root the resource paths are relative to
    root: PathBuf,
    /// resources replace the default resources of the function kind when not empty
    resources: Vec<Resource>,
}

impl ZipPackager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            resources: Vec::new(),
        }
    }

    pub fn with_resources(mut self, resources: Vec<Resource>) -> Self {
        self.resources = resources;
        self
    }

    fn resources_for(&self, function: &ConfiguredFunction) -> Vec<Resource> {
        if self.resources.is_empty() {
            function.kind.default_resources()
        } else {
            self.resources.clone()
        }
    }

    async fn read(&self, resource: Resource) -> Result<(Resource, Vec<u8>), PackageError> {
        let path = self.root.join(&resource.path);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok((resource, bytes)),
            Err(source) => Err(PackageError::ReadResource { path, source }),
        }
    }

    fn zip(mut files: Vec<(Resource, Vec<u8>)>) -> Result<Vec<u8>, PackageError> {
        files.sort_by_key(|(resource, _)| resource.archive_path());

        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        for (resource, bytes) in files {
            let options = FileOptions::default()
                .compression_method(CompressionMethod::Deflated)
                .unix_permissions(resource.mode)
                .last_modified_time(DateTime::default());

            zip.start_file(resource.archive_path(), options)?;
            zip.write_all(&bytes)?;
        }

        Ok(zip.finish()?.into_inner())
    }
}

#[async_trait]
impl Packager for ZipPackager {
    async fn package(&self, function: &ConfiguredFunction) -> Result<Vec<u8>, PackageError> {
        let resources = self.resources_for(function);
        tracing::debug!(
            name = %function.name,
            resources = resources.len(),
            "Compressing resources into an artifact."
        );

        let files =
            futures::future::try_join_all(resources.into_iter().map(|r| self.read(r))).await?;
        let raw = Self::zip(files)?;

        tracing::debug!(name = %function.name, size = raw.len(), "Compression is successful.");
        Ok(raw)
    }
}
