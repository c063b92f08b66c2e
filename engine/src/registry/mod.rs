//! Active transformation registry.
//!
//! Tracks which transformations depend on which contexts and re-runs them
//! when an input changes:
//! - `description`: what is stored per transformation
//! - `update`: re-running one description against the host
//! - `hooks`: update and delete notifications
//!
//! ## State
//!
//! [`ActiveTransformations`] maps each input context to the descriptions
//! reading it, in the order they were registered. A description with two
//! inputs appears under both. The map is never mutated in place: every
//! [`Action`] produces a new map that shares untouched entries with the
//! previous one, so a [`snapshot`](ActiveTransformationRegistry::snapshot)
//! stays valid while the registry moves on.

pub mod description;
pub mod hooks;
pub mod update;

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::error::{RegistryError, RegistryResult};
use crate::host::Host;
use crate::logs::{log_error_indent, log_info, log_info_indent, log_success_indent, log_warning};
use crate::transform::TransformationOutputType;

pub use description::{
    DatasetCreatorDescription, FullOverrideDescription, FullOverridePatch, TransformationDescription,
};
pub use hooks::{ContextEvent, ContextNotifier, Subscription};
pub use update::update_from_description;

// =============================================================================
// Dependency map
// =============================================================================

pub type DescriptionRef = Arc<TransformationDescription>;

/// Input context name to the descriptions depending on it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActiveTransformations {
    entries: BTreeMap<String, Arc<Vec<DescriptionRef>>>,
}

impl ActiveTransformations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Input context names with at least one dependent.
    pub fn inputs(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Descriptions keyed under `context`, in registration order.
    pub fn dependents(&self, context: &str) -> Vec<DescriptionRef> {
        self.entries
            .get(context)
            .map(|list| list.as_ref().clone())
            .unwrap_or_default()
    }

    pub fn entry(&self, context: &str) -> Option<&Arc<Vec<DescriptionRef>>> {
        self.entries.get(context)
    }

    pub fn find(&self, id: Uuid) -> Option<DescriptionRef> {
        self.entries
            .values()
            .flat_map(|list| list.iter())
            .find(|d| d.id() == id)
            .cloned()
    }

    /// Every description once, in order of first appearance.
    pub fn descriptions(&self) -> Vec<DescriptionRef> {
        let mut seen = HashSet::new();
        self.entries
            .values()
            .flat_map(|list| list.iter())
            .filter(|d| seen.insert(d.id()))
            .cloned()
            .collect()
    }

    /// Flat list for persistence. Each description appears once.
    pub fn serialize(&self) -> Vec<TransformationDescription> {
        self.descriptions().iter().map(|d| d.as_ref().clone()).collect()
    }

    /// Rebuild the fan-out map from a flat list. Descriptions without
    /// inputs are skipped.
    pub fn deserialize(descriptions: Vec<TransformationDescription>) -> Self {
        let mut map = Self::new();
        for description in descriptions {
            let id = description.id();
            match map.with_description(description) {
                Ok(next) => map = next,
                Err(e) => log_warning(format!("Skipping stored transformation {}: {}", id, e)),
            }
        }
        map
    }

    /// New map with `description` appended under each of its inputs.
    pub fn with_description(&self, description: TransformationDescription) -> RegistryResult<Self> {
        if description.inputs().is_empty() {
            return Err(RegistryError::NoInputs(description.id()));
        }
        let mut next = self.clone();
        let description = Arc::new(description);
        let mut inputs: Vec<&String> = description.inputs().iter().collect();
        inputs.dedup();
        for input in inputs {
            let list = next.entries.entry(input.clone()).or_default();
            Arc::make_mut(list).push(description.clone());
        }
        Ok(next)
    }

    /// New map without any description that depends on `context`, either
    /// as an input or as an extra dependency.
    pub fn without_context(&self, context: &str) -> (Self, Vec<DescriptionRef>) {
        let mut removed: Vec<DescriptionRef> = Vec::new();
        let mut entries = BTreeMap::new();
        for (input, list) in &self.entries {
            if input == context {
                push_unique(&mut removed, list.iter());
                continue;
            }
            if !list.iter().any(|d| d.depends_on(context)) {
                entries.insert(input.clone(), list.clone());
                continue;
            }
            push_unique(&mut removed, list.iter().filter(|d| d.depends_on(context)));
            let kept: Vec<DescriptionRef> = list.iter().filter(|d| !d.depends_on(context)).cloned().collect();
            if !kept.is_empty() {
                entries.insert(input.clone(), Arc::new(kept));
            }
        }
        (Self { entries }, removed)
    }

    /// New map with the full-override description `id` patched. The
    /// description keeps its position under inputs it still has and is
    /// appended under new ones.
    pub fn with_edit(&self, id: Uuid, patch: FullOverridePatch) -> RegistryResult<(Self, DescriptionRef)> {
        let current = self.find(id).ok_or(RegistryError::DescriptionNotFound(id))?;
        let patched = match current.as_ref() {
            TransformationDescription::FullOverride(d) => TransformationDescription::FullOverride(d.patched(patch)),
            TransformationDescription::DatasetCreator(_) => return Err(RegistryError::NotFullOverride(id)),
        };
        if patched.inputs().is_empty() {
            return Err(RegistryError::NoInputs(id));
        }
        let patched = Arc::new(patched);
        let new_inputs: BTreeSet<&String> = patched.inputs().iter().collect();

        let mut entries = BTreeMap::new();
        for (input, list) in &self.entries {
            if !list.iter().any(|d| d.id() == id) {
                entries.insert(input.clone(), list.clone());
                continue;
            }
            let updated: Vec<DescriptionRef> = list
                .iter()
                .filter_map(|d| match d.id() == id {
                    false => Some(d.clone()),
                    true if new_inputs.contains(input) => Some(patched.clone()),
                    true => None,
                })
                .collect();
            if !updated.is_empty() {
                entries.insert(input.clone(), Arc::new(updated));
            }
        }
        for input in new_inputs {
            let list = entries.entry(input.clone()).or_default();
            if !list.iter().any(|d| d.id() == id) {
                Arc::make_mut(list).push(patched.clone());
            }
        }
        Ok((Self { entries }, patched))
    }
}

/// Title of a dataset creator's output, falling back to its name.
async fn output_title(host: &dyn Host, description: &DatasetCreatorDescription) -> String {
    match description.output_type {
        TransformationOutputType::Context => match host.get_data_context(&description.output).await {
            Ok(context) => context.readable_name().to_string(),
            Err(_) => description.output.clone(),
        },
        TransformationOutputType::Text => description.output.clone(),
    }
}

fn push_unique<'a>(out: &mut Vec<DescriptionRef>, items: impl Iterator<Item = &'a DescriptionRef>) {
    for item in items {
        if !out.iter().any(|d| d.id() == item.id()) {
            out.push(item.clone());
        }
    }
}

// =============================================================================
// Reducer
// =============================================================================

/// A change to the dependency map.
#[derive(Debug, Clone)]
pub enum Action {
    /// Replace the whole map, e.g. after loading saved state.
    Set(ActiveTransformations),
    Add(TransformationDescription),
    Edit { id: Uuid, patch: FullOverridePatch },
    /// Drop every description depending on this context.
    Delete(String),
}

/// Next map after `action`. The previous map is left untouched.
pub fn reduce(state: &ActiveTransformations, action: Action) -> RegistryResult<ActiveTransformations> {
    match action {
        Action::Set(next) => Ok(next),
        Action::Add(description) => state.with_description(description),
        Action::Edit { id, patch } => state.with_edit(id, patch).map(|(next, _)| next),
        Action::Delete(context) => Ok(state.without_context(&context).0),
    }
}

// =============================================================================
// Registry
// =============================================================================

/// Outcome of propagating one notification.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateReport {
    pub updated: Vec<Uuid>,
    pub failures: Vec<UpdateFailure>,
    pub removed: Vec<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateFailure {
    pub id: Uuid,
    pub output: String,
    pub message: String,
}

impl UpdateReport {
    pub fn merge(&mut self, other: UpdateReport) {
        self.updated.extend(other.updated);
        self.failures.extend(other.failures);
        self.removed.extend(other.removed);
    }
}

/// Owner of the dependency map and of the set of outputs whose titles the
/// user edited.
#[derive(Debug, Default)]
pub struct ActiveTransformationRegistry {
    state: Arc<ActiveTransformations>,
    edited_outputs: BTreeSet<String>,
}

impl ActiveTransformationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry over previously saved state.
    pub fn from_saved(descriptions: Vec<TransformationDescription>, edited_outputs: BTreeSet<String>) -> Self {
        Self {
            state: Arc::new(ActiveTransformations::deserialize(descriptions)),
            edited_outputs,
        }
    }

    /// Current map. Later changes do not affect the returned value.
    pub fn snapshot(&self) -> Arc<ActiveTransformations> {
        self.state.clone()
    }

    pub fn edited_outputs(&self) -> &BTreeSet<String> {
        &self.edited_outputs
    }

    pub fn apply(&mut self, action: Action) -> RegistryResult<()> {
        self.state = Arc::new(reduce(&self.state, action)?);
        Ok(())
    }

    pub fn register(&mut self, description: TransformationDescription) -> RegistryResult<()> {
        log_info(format!(
            "Tracking {} ({}) on {}",
            description.transformer(),
            description.label(),
            description.inputs().join(", ")
        ));
        self.apply(Action::Add(description))
    }

    /// Keep the current title of `output` on future updates.
    pub fn mark_output_edited(&mut self, output: impl Into<String>) {
        self.edited_outputs.insert(output.into());
    }

    /// Merge a patch into a full-override description.
    pub fn edit(&mut self, id: Uuid, patch: FullOverridePatch) -> RegistryResult<()> {
        let (next, patched) = self.state.with_edit(id, patch)?;
        log_info_indent(format!("Updated saved state of {}", patched.label()), 1);
        self.state = Arc::new(next);
        Ok(())
    }

    /// Re-run every description reading `context`, in registration order.
    ///
    /// A failing description is reported and stays registered; the others
    /// still run.
    pub async fn on_context_updated(&mut self, host: &dyn Host, context: &str) -> UpdateReport {
        let mut report = UpdateReport::default();
        let dependents = self.state.dependents(context);
        if dependents.is_empty() {
            return report;
        }

        let title = match host.get_data_context(context).await {
            Ok(c) => c.readable_name().to_string(),
            Err(_) => context.to_string(),
        };
        log_info(format!("{} changed, updating {} dependent transformation(s)", title, dependents.len()));

        for description in dependents {
            let id = description.id();
            // an earlier update in this batch may have removed it
            let Some(current) = self.state.find(id) else {
                continue;
            };
            match update_from_description(&current, host, &self.edited_outputs).await {
                Ok(patch) => {
                    if let Some(patch) = patch {
                        if let Err(e) = self.edit(id, patch) {
                            log_warning(format!("Could not save state of {}: {}", current.label(), e));
                        }
                    }
                    log_success_indent(format!("Updated {}", current.label()), 1);
                    report.updated.push(id);
                }
                Err(e) => {
                    let message = match current.as_ref() {
                        TransformationDescription::DatasetCreator(d) => {
                            format!("Error updating \"{}\": {}", output_title(host, d).await, e)
                        }
                        TransformationDescription::FullOverride(_) => e.to_string(),
                    };
                    log_error_indent(&message, 1);
                    report.failures.push(UpdateFailure {
                        id,
                        output: current.label(),
                        message,
                    });
                }
            }
        }
        report
    }

    /// Stop tracking everything that depends on `context`.
    pub fn on_context_deleted(&mut self, context: &str) -> UpdateReport {
        let (next, removed) = self.state.without_context(context);
        if !removed.is_empty() {
            log_info(format!(
                "{} was deleted, no longer tracking {} transformation(s)",
                context,
                removed.len()
            ));
            for description in &removed {
                log_info_indent(description.label(), 1);
            }
        }
        self.state = Arc::new(next);
        UpdateReport {
            removed: removed.iter().map(|d| d.id()).collect(),
            ..Default::default()
        }
    }

    pub async fn handle(&mut self, host: &dyn Host, event: &ContextEvent) -> UpdateReport {
        match event {
            ContextEvent::Updated { context } => self.on_context_updated(host, context).await,
            ContextEvent::Deleted { context } => self.on_context_deleted(context),
        }
    }

    /// Handle every event already queued on `subscription`, including the
    /// ones raised while handling, until the queue is empty.
    pub async fn drain(&mut self, host: &dyn Host, subscription: &mut Subscription) -> UpdateReport {
        let mut report = UpdateReport::default();
        while let Some(event) = subscription.try_next() {
            report.merge(self.handle(host, &event).await);
        }
        report
    }

    /// Handle events until the subscription ends.
    pub async fn run(&mut self, host: &dyn Host, mut subscription: Subscription) {
        while let Some(event) = subscription.next().await {
            self.handle(host, &event).await;
        }
    }
}
