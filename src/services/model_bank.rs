//! Lazily-loaded, process-wide cache of trained artifacts.
//!
//! Artifacts are immutable once deployed, so the cache is read-through and
//! never invalidated. Cold loads read and compile outside the lock; if two
//! callers race on the same key the first insert wins and the other copy is
//! dropped. Missing artifacts are not cached, so a model deployed while the
//! process runs is picked up on the next request.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

use super::artifact::{ArtifactError, Classifier, Regressor};
use super::variables::{classifier_file_name, regressor_file_name, CONDITION_CLASSIFIER};

struct ArtifactCache<T> {
    entries: RwLock<HashMap<String, Arc<T>>>,
}

impl<T> ArtifactCache<T> {
    fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    async fn get(&self, key: &str) -> Option<Arc<T>> {
        self.entries.read().await.get(key).cloned()
    }

    /// Insert unless another load got there first; returns the cached copy.
    async fn insert(&self, key: &str, value: T) -> Arc<T> {
        let mut entries = self.entries.write().await;
        entries
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(value))
            .clone()
    }

    async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

pub struct ModelBank {
    base_dir: PathBuf,
    regressors: ArtifactCache<Regressor>,
    classifiers: ArtifactCache<Classifier>,
}

impl ModelBank {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            regressors: ArtifactCache::new(),
            classifiers: ArtifactCache::new(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Load the regressor for `variable`, from cache when possible.
    pub async fn load_regressor(&self, variable: &str) -> Result<Arc<Regressor>, ArtifactError> {
        if let Some(cached) = self.regressors.get(variable).await {
            return Ok(cached);
        }
        let bytes = self.read_artifact(&regressor_file_name(variable)).await?;
        let regressor = Regressor::from_json(&bytes)?;
        tracing::debug!(
            "Loaded regressor for {} ({} features)",
            variable,
            regressor.feature_names().len()
        );
        Ok(self.regressors.insert(variable, regressor).await)
    }

    /// Load the condition classifier, from cache when possible.
    pub async fn load_classifier(&self) -> Result<Arc<Classifier>, ArtifactError> {
        if let Some(cached) = self.classifiers.get(CONDITION_CLASSIFIER).await {
            return Ok(cached);
        }
        let bytes = self.read_artifact(&classifier_file_name()).await?;
        let classifier = Classifier::from_json(&bytes)?;
        tracing::debug!(
            "Loaded condition classifier ({} classes)",
            classifier.classes().len()
        );
        Ok(self.classifiers.insert(CONDITION_CLASSIFIER, classifier).await)
    }

    /// The regressor for `variable`, or `None` when it is unavailable.
    ///
    /// A missing file is expected and logged at warn; a corrupt one is logged
    /// at error. Neither is fatal.
    pub async fn regressor(&self, variable: &str) -> Option<Arc<Regressor>> {
        match self.load_regressor(variable).await {
            Ok(r) => Some(r),
            Err(ArtifactError::NotFound(path)) => {
                tracing::warn!("Regressor for {} not found at {}", variable, path);
                None
            }
            Err(e) => {
                tracing::error!("Failed to load regressor for {}: {}", variable, e);
                None
            }
        }
    }

    /// The condition classifier, or `None` when it is unavailable.
    pub async fn classifier(&self) -> Option<Arc<Classifier>> {
        match self.load_classifier().await {
            Ok(c) => Some(c),
            Err(ArtifactError::NotFound(path)) => {
                tracing::warn!("Condition classifier not found at {}", path);
                None
            }
            Err(e) => {
                tracing::error!("Failed to load condition classifier: {}", e);
                None
            }
        }
    }

    /// Preload every listed regressor plus the classifier.
    ///
    /// Returns the number of artifacts that are now cached.
    pub async fn warm_up(&self, variables: &[&str]) -> usize {
        let loads = variables.iter().map(|v| self.regressor(v));
        let loaded = futures::future::join_all(loads)
            .await
            .into_iter()
            .filter(Option::is_some)
            .count();
        let classifier = usize::from(self.classifier().await.is_some());

        tracing::info!(
            "Model bank warm-up: {}/{} regressors, classifier {}",
            loaded,
            variables.len(),
            if classifier == 1 { "loaded" } else { "missing" }
        );
        loaded + classifier
    }

    /// Number of artifacts currently held in memory.
    pub async fn cached_count(&self) -> usize {
        self.regressors.len().await + self.classifiers.len().await
    }

    async fn read_artifact(&self, file_name: &str) -> Result<Vec<u8>, ArtifactError> {
        let path = self.base_dir.join(file_name);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ArtifactError::NotFound(path.display().to_string()))
            }
            Err(e) => Err(ArtifactError::Io(e)),
        }
    }
}
