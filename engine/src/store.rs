//! On-disk workspace.
//!
//! Layout under the workspace home:
//!
//! ```text
//! .tabflow/
//! ├── contexts/<slug>.json          one StoredContext per file
//! ├── texts.json                    text outputs
//! └── active_transformations.json   SavedState
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::EngineConfig;
use crate::error::{StoreError, StoreResult};
use crate::host::memory::{StoredContext, TextOutput};
use crate::host::{Evaluator, MemoryHost};
use crate::registry::{ActiveTransformationRegistry, TransformationDescription};

const TEXTS_FILE: &str = "texts.json";

/// Persisted registry state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedState {
    pub saved_at: DateTime<Utc>,
    pub transformations: Vec<TransformationDescription>,
    #[serde(default)]
    pub edited_outputs: BTreeSet<String>,
}

impl SavedState {
    pub fn from_registry(registry: &ActiveTransformationRegistry) -> Self {
        Self {
            saved_at: Utc::now(),
            transformations: registry.snapshot().serialize(),
            edited_outputs: registry.edited_outputs().clone(),
        }
    }

    pub fn into_registry(self) -> ActiveTransformationRegistry {
        ActiveTransformationRegistry::from_saved(self.transformations, self.edited_outputs)
    }
}

pub struct Workspace {
    home: PathBuf,
    contexts_dir: PathBuf,
    state_path: PathBuf,
}

impl Workspace {
    /// Open the workspace described by `config`, creating its directories.
    pub fn open(config: &EngineConfig) -> StoreResult<Self> {
        let workspace = Self {
            home: config.home.clone(),
            contexts_dir: config.contexts_path(),
            state_path: config.state_path(),
        };
        fs::create_dir_all(&workspace.contexts_dir)?;
        Ok(workspace)
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    fn context_path(&self, name: &str) -> PathBuf {
        self.contexts_dir.join(format!("{}.json", file_slug(name)))
    }

    pub fn save_context(&self, stored: &StoredContext) -> StoreResult<()> {
        let content = serde_json::to_string_pretty(stored)?;
        fs::write(self.context_path(&stored.context.name), content)?;
        Ok(())
    }

    /// Remove the file of a context. Missing files are fine.
    pub fn delete_context(&self, name: &str) -> StoreResult<()> {
        match fs::remove_file(self.context_path(name)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn load_contexts(&self) -> StoreResult<Vec<StoredContext>> {
        let mut contexts = Vec::new();
        for entry in fs::read_dir(&self.contexts_dir)? {
            let path = entry?.path();
            if !path.extension().is_some_and(|e| e == "json") {
                continue;
            }
            let content = fs::read_to_string(&path)?;
            let stored: StoredContext = serde_json::from_str(&content).map_err(|e| StoreError::InvalidContext {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
            contexts.push(stored);
        }
        contexts.sort_by(|a, b| a.context.name.cmp(&b.context.name));
        Ok(contexts)
    }

    pub fn load_texts(&self) -> StoreResult<Vec<TextOutput>> {
        let path = self.home.join(TEXTS_FILE);
        if !path.exists() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&fs::read_to_string(path)?)?)
    }

    pub fn save_texts(&self, texts: &[TextOutput]) -> StoreResult<()> {
        fs::write(self.home.join(TEXTS_FILE), serde_json::to_string_pretty(texts)?)?;
        Ok(())
    }

    /// Saved registry state, or `None` if nothing was saved yet.
    pub fn load_state(&self) -> StoreResult<Option<SavedState>> {
        if !self.state_path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.state_path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    pub fn save_state(&self, state: &SavedState) -> StoreResult<()> {
        fs::write(&self.state_path, serde_json::to_string_pretty(state)?)?;
        Ok(())
    }

    /// In-memory host holding every stored context and text.
    pub fn load_host(&self, evaluator: impl Evaluator + 'static) -> StoreResult<MemoryHost> {
        let host = MemoryHost::new(evaluator);
        for stored in self.load_contexts()? {
            host.insert_context(stored.context, stored.dataset);
        }
        for text in self.load_texts()? {
            host.insert_text(text);
        }
        Ok(host)
    }

    /// Write the contents of `host` back, removing files of contexts the
    /// host no longer has.
    pub fn save_host(&self, host: &MemoryHost) -> StoreResult<()> {
        let current: BTreeMap<String, StoredContext> = host
            .contexts()
            .into_iter()
            .map(|stored| (stored.context.name.clone(), stored))
            .collect();
        for stored in self.load_contexts()? {
            if !current.contains_key(&stored.context.name) {
                self.delete_context(&stored.context.name)?;
            }
        }
        for stored in current.values() {
            self.save_context(stored)?;
        }
        self.save_texts(&host.texts())
    }

    pub fn load_registry(&self) -> StoreResult<ActiveTransformationRegistry> {
        Ok(self
            .load_state()?
            .map(SavedState::into_registry)
            .unwrap_or_default())
    }

    pub fn save_registry(&self, registry: &ActiveTransformationRegistry) -> StoreResult<()> {
        self.save_state(&SavedState::from_registry(registry))
    }
}

/// File name for a context: readable slug plus a hash of the exact name.
fn file_slug(name: &str) -> String {
    let slug: String = name
        .chars()
        .map(|c| if c.is_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-");

    // FNV-1a
    let hash = name
        .bytes()
        .fold(0xcbf29ce484222325_u64, |h, b| (h ^ b as u64).wrapping_mul(0x100000001b3));
    format!("{}-{:016x}", slug, hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{AttributeEvaluator, Host};
    use crate::models::{Attribute, Collection, DataContext, DataSet};
    use crate::registry::DatasetCreatorDescription;
    use crate::transform::{TransformationOutputType, Transformer, TransformerState};
    use tempfile::tempdir;
    use uuid::Uuid;

    fn workspace(dir: &Path) -> Workspace {
        Workspace::open(&EngineConfig::default().with_home(dir)).unwrap()
    }

    fn stored(name: &str) -> StoredContext {
        StoredContext {
            context: DataContext::new(name),
            dataset: DataSet::new(vec![Collection::new("Cases", vec![Attribute::new("x")])], vec![]),
        }
    }

    #[test]
    fn test_slugs_are_distinct_and_safe() {
        let a = file_slug("Sort(Copy(C), ...)");
        let b = file_slug("sort copy c");
        assert!(a.starts_with("sort-copy-c-"));
        assert_ne!(a, b);
        assert!(!file_slug("a/b").contains('/'));
    }

    #[test]
    fn test_contexts_round_trip() {
        let dir = tempdir().unwrap();
        let ws = workspace(dir.path());
        ws.save_context(&stored("B")).unwrap();
        ws.save_context(&stored("A/1")).unwrap();

        let names: Vec<String> = ws.load_contexts().unwrap().into_iter().map(|s| s.context.name).collect();
        assert_eq!(names, vec!["A/1", "B"]);

        ws.delete_context("B").unwrap();
        ws.delete_context("B").unwrap();
        assert_eq!(ws.load_contexts().unwrap().len(), 1);
    }

    #[test]
    fn test_invalid_context_file() {
        let dir = tempdir().unwrap();
        let ws = workspace(dir.path());
        fs::write(dir.path().join("contexts").join("bad.json"), "{").unwrap();
        assert!(matches!(ws.load_contexts(), Err(StoreError::InvalidContext { .. })));
    }

    #[tokio::test]
    async fn test_host_and_registry_round_trip() {
        let dir = tempdir().unwrap();
        let ws = workspace(dir.path());

        let host = MemoryHost::new(AttributeEvaluator::new());
        host.insert_context(stored("Input").context, stored("Input").dataset);
        let output = host
            .create_context_with_dataset(&stored("x").dataset, "Copy(Input)", "A copy")
            .await
            .unwrap();
        host.create_text("Median(Input, x)", "4").await.unwrap();
        ws.save_host(&host).unwrap();

        let mut registry = ActiveTransformationRegistry::new();
        registry
            .register(TransformationDescription::DatasetCreator(DatasetCreatorDescription {
                id: Uuid::new_v4(),
                transformer: Transformer::Copy,
                state: TransformerState::new().context1("Input"),
                inputs: vec!["Input".into()],
                extra_dependencies: vec![],
                output: output.clone(),
                output_type: TransformationOutputType::Context,
            }))
            .unwrap();
        registry.mark_output_edited(output.clone());
        ws.save_registry(&registry).unwrap();

        let loaded = ws.load_host(AttributeEvaluator::new()).unwrap();
        assert_eq!(loaded.context_names(), vec!["Copy(Input)", "Input"]);
        assert_eq!(loaded.texts().len(), 1);

        let restored = ws.load_registry().unwrap();
        assert_eq!(*restored.snapshot(), *registry.snapshot());
        assert!(restored.edited_outputs().contains(&output));

        host.delete_data_context(&output).await.unwrap();
        ws.save_host(&host).unwrap();
        assert_eq!(ws.load_contexts().unwrap().len(), 1);
    }

    #[test]
    fn test_missing_state_is_empty_registry() {
        let dir = tempdir().unwrap();
        let ws = workspace(dir.path());
        assert!(ws.load_state().unwrap().is_none());
        assert!(ws.load_registry().unwrap().snapshot().is_empty());
    }
}
