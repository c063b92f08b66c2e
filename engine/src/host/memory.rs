//! In-process host holding contexts and text outputs in memory.
//!
//! Updates and deletions are announced through a [`ContextNotifier`], so a
//! registry subscribed to this host sees the same hooks a real platform
//! would fire.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{Evaluator, Host};
use crate::error::{HostError, HostResult};
use crate::models::{DataContext, DataSet};
use crate::registry::hooks::{ContextNotifier, Subscription};
use crate::transform::names::unique_name;

/// A context as stored by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredContext {
    pub context: DataContext,
    pub dataset: DataSet,
}

/// A text output, e.g. the display of a median.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextOutput {
    pub name: String,
    pub title: String,
    pub content: String,
}

pub struct MemoryHost {
    contexts: Mutex<BTreeMap<String, StoredContext>>,
    texts: Mutex<BTreeMap<String, TextOutput>>,
    evaluator: Box<dyn Evaluator>,
    notifier: ContextNotifier,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MemoryHost {
    pub fn new(evaluator: impl Evaluator + 'static) -> Self {
        Self {
            contexts: Mutex::new(BTreeMap::new()),
            texts: Mutex::new(BTreeMap::new()),
            evaluator: Box::new(evaluator),
            notifier: ContextNotifier::new(),
        }
    }

    pub fn notifier(&self) -> &ContextNotifier {
        &self.notifier
    }

    /// Subscribe to update and delete notifications.
    pub fn subscribe(&self) -> Subscription {
        self.notifier.subscribe()
    }

    /// Add or replace a context without notifying anyone.
    pub fn insert_context(&self, context: DataContext, dataset: DataSet) {
        lock(&self.contexts).insert(context.name.clone(), StoredContext { context, dataset });
    }

    pub fn insert_text(&self, text: TextOutput) {
        lock(&self.texts).insert(text.name.clone(), text);
    }

    /// Replace the dataset of an existing context and announce the update.
    pub fn set_dataset(&self, name: &str, dataset: DataSet) -> HostResult<()> {
        {
            let mut contexts = lock(&self.contexts);
            let stored = contexts
                .get_mut(name)
                .ok_or_else(|| HostError::ContextNotFound(name.to_string()))?;
            stored.dataset = dataset;
        }
        self.notifier.notify_updated(name);
        Ok(())
    }

    /// Announce an update of a context without changing it.
    pub fn touch(&self, name: &str) -> HostResult<()> {
        if !lock(&self.contexts).contains_key(name) {
            return Err(HostError::ContextNotFound(name.to_string()));
        }
        self.notifier.notify_updated(name);
        Ok(())
    }

    /// Change the user-facing title of a context.
    pub fn set_title(&self, name: &str, title: &str) -> HostResult<()> {
        let mut contexts = lock(&self.contexts);
        let stored = contexts
            .get_mut(name)
            .ok_or_else(|| HostError::ContextNotFound(name.to_string()))?;
        stored.context.title = Some(title.to_string());
        Ok(())
    }

    pub fn context_names(&self) -> Vec<String> {
        lock(&self.contexts).keys().cloned().collect()
    }

    pub fn contexts(&self) -> Vec<StoredContext> {
        lock(&self.contexts).values().cloned().collect()
    }

    pub fn context(&self, name: &str) -> Option<StoredContext> {
        lock(&self.contexts).get(name).cloned()
    }

    pub fn texts(&self) -> Vec<TextOutput> {
        lock(&self.texts).values().cloned().collect()
    }

    pub fn text(&self, name: &str) -> Option<TextOutput> {
        lock(&self.texts).get(name).cloned()
    }

    pub fn has_output(&self, name: &str) -> bool {
        lock(&self.contexts).contains_key(name) || lock(&self.texts).contains_key(name)
    }

    /// Context title if `name` is a context, text title if it is a text.
    pub fn output_title(&self, name: &str) -> Option<String> {
        if let Some(stored) = lock(&self.contexts).get(name) {
            return Some(stored.context.readable_name().to_string());
        }
        lock(&self.texts).get(name).map(|t| t.title.clone())
    }

    fn taken_names(&self) -> Vec<String> {
        let mut names = self.context_names();
        names.extend(lock(&self.texts).keys().cloned());
        names
    }
}

#[async_trait]
impl Host for MemoryHost {
    fn evaluator(&self) -> &dyn Evaluator {
        self.evaluator.as_ref()
    }

    async fn get_data_context(&self, name: &str) -> HostResult<DataContext> {
        lock(&self.contexts)
            .get(name)
            .map(|stored| stored.context.clone())
            .ok_or_else(|| HostError::ContextNotFound(name.to_string()))
    }

    async fn get_context_and_dataset(&self, name: &str) -> HostResult<(DataContext, DataSet)> {
        lock(&self.contexts)
            .get(name)
            .map(|stored| (stored.context.clone(), stored.dataset.clone()))
            .ok_or_else(|| HostError::ContextNotFound(name.to_string()))
    }

    async fn create_context_with_dataset(
        &self,
        dataset: &DataSet,
        title: &str,
        description: &str,
    ) -> HostResult<String> {
        let name = unique_name(title, &self.taken_names());
        let context = DataContext {
            name: name.clone(),
            title: Some(title.to_string()),
            description: Some(description.to_string()),
        };
        self.insert_context(context, dataset.clone());
        Ok(name)
    }

    async fn update_context_with_dataset(
        &self,
        name: &str,
        dataset: &DataSet,
        title: Option<&str>,
        description: Option<&str>,
    ) -> HostResult<()> {
        {
            let mut contexts = lock(&self.contexts);
            let stored = contexts
                .get_mut(name)
                .ok_or_else(|| HostError::ContextNotFound(name.to_string()))?;
            stored.dataset = dataset.clone();
            if let Some(title) = title {
                stored.context.title = Some(title.to_string());
            }
            if let Some(description) = description {
                stored.context.description = Some(description.to_string());
            }
        }
        self.notifier.notify_updated(name);
        Ok(())
    }

    async fn delete_data_context(&self, name: &str) -> HostResult<()> {
        lock(&self.contexts)
            .remove(name)
            .ok_or_else(|| HostError::ContextNotFound(name.to_string()))?;
        self.notifier.notify_deleted(name);
        Ok(())
    }

    async fn create_text(&self, title: &str, content: &str) -> HostResult<String> {
        let name = unique_name(title, &self.taken_names());
        self.insert_text(TextOutput {
            name: name.clone(),
            title: title.to_string(),
            content: content.to_string(),
        });
        Ok(name)
    }

    async fn update_text(&self, name: &str, content: &str, title: Option<&str>) -> HostResult<()> {
        let mut texts = lock(&self.texts);
        let text = texts
            .get_mut(name)
            .ok_or_else(|| HostError::TextNotFound(name.to_string()))?;
        text.content = content.to_string();
        if let Some(title) = title {
            text.title = title.to_string();
        }
        Ok(())
    }
}
