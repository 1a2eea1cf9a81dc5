use std::collections::HashMap;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use failure::ResultExt;
use log::{debug, info};
use parking_lot::RwLock;

use crate::errors::*;
use crate::models::{select_artifacts, ModelArtifact};
use crate::utils::LanguageCode;

const MODEL_FILE_EXTENSION: &str = "model";

/// Persistence of model artifacts, keyed by (hash, language, type, context)
pub trait ModelStore: Send + Sync {
    fn model_exists(&self, hash: &str, language: &str) -> Result<bool>;

    /// Artifacts of `hash`, one per (type, context), the most recent winning
    fn get_models_from_hash(&self, hash: &str, language: &str) -> Result<Vec<ModelArtifact>>;

    fn persist_models(&self, artifacts: &[ModelArtifact], language: &str) -> Result<()>;
}

#[derive(Default)]
pub struct InMemoryModelStore {
    artifacts: RwLock<HashMap<LanguageCode, Vec<ModelArtifact>>>,
}

impl ModelStore for InMemoryModelStore {
    fn model_exists(&self, hash: &str, language: &str) -> Result<bool> {
        Ok(self
            .artifacts
            .read()
            .get(language)
            .map(|artifacts| artifacts.iter().any(|a| a.meta.hash == hash))
            .unwrap_or(false))
    }

    fn get_models_from_hash(&self, hash: &str, language: &str) -> Result<Vec<ModelArtifact>> {
        let artifacts = self
            .artifacts
            .read()
            .get(language)
            .cloned()
            .unwrap_or_default();
        Ok(select_artifacts(artifacts, hash))
    }

    fn persist_models(&self, artifacts: &[ModelArtifact], language: &str) -> Result<()> {
        self.artifacts
            .write()
            .entry(language.to_string())
            .or_insert_with(Vec::new)
            .extend(artifacts.iter().cloned());
        Ok(())
    }
}

/// Stores each artifact as a json file named `{hash}.{language}.{TYPE}.{context}.model`
pub struct FileModelStore {
    directory: PathBuf,
}

impl FileModelStore {
    pub fn new<P: AsRef<Path>>(directory: P) -> Result<Self> {
        let directory = directory.as_ref().to_path_buf();
        fs::create_dir_all(&directory).with_context(|_| {
            format!("Cannot create model directory '{:?}'", &directory)
        })?;
        info!("Model artifacts stored in {:?}", &directory);
        Ok(Self { directory })
    }

    fn file_name(artifact: &ModelArtifact) -> String {
        format!(
            "{}.{}.{}.{}.{}",
            artifact.meta.hash,
            artifact.meta.language,
            artifact.meta.kind,
            urlencoding::encode(&artifact.meta.context),
            MODEL_FILE_EXTENSION
        )
    }

    fn model_files(&self, hash: &str, language: &str) -> Result<Vec<PathBuf>> {
        let prefix = format!("{}.{}.", hash, language);
        let suffix = format!(".{}", MODEL_FILE_EXTENSION);
        let mut paths = vec![];
        let entries = fs::read_dir(&self.directory).with_context(|_| {
            format!("Cannot list model directory '{:?}'", &self.directory)
        })?;
        for entry in entries {
            let path = entry?.path();
            let matches = path
                .file_name()
                .and_then(|name| name.to_str())
                .map(|name| name.starts_with(&prefix) && name.ends_with(&suffix))
                .unwrap_or(false);
            if matches {
                paths.push(path);
            }
        }
        Ok(paths)
    }
}

impl ModelStore for FileModelStore {
    fn model_exists(&self, hash: &str, language: &str) -> Result<bool> {
        Ok(!self.model_files(hash, language)?.is_empty())
    }

    fn get_models_from_hash(&self, hash: &str, language: &str) -> Result<Vec<ModelArtifact>> {
        let mut artifacts = vec![];
        for path in self.model_files(hash, language)? {
            let file = fs::File::open(&path)
                .with_context(|_| format!("Cannot open model file '{:?}'", &path))?;
            let artifact: ModelArtifact = serde_json::from_reader(file)
                .with_context(|_| format!("Cannot deserialize model file '{:?}'", &path))?;
            artifacts.push(artifact);
        }
        Ok(select_artifacts(artifacts, hash))
    }

    fn persist_models(&self, artifacts: &[ModelArtifact], language: &str) -> Result<()> {
        for artifact in artifacts.iter().filter(|a| a.meta.language == language) {
            let path = self.directory.join(Self::file_name(artifact));
            let file = fs::File::create(&path)
                .with_context(|_| format!("Cannot create model file '{:?}'", &path))?;
            write_artifact(file, artifact)
                .with_context(|_| format!("Cannot write model file '{:?}'", &path))?;
            debug!("Persisted {:?}", &path);
        }
        Ok(())
    }
}

fn write_artifact<W: Write>(destination: W, artifact: &ModelArtifact) -> Result<()> {
    let mut writer = BufWriter::new(destination);
    serde_json::to_writer(&mut writer, artifact)?;
    writer.flush()?;
    Ok(())
}
