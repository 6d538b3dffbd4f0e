//! Endpoint list reconciliation
//!
//! Computes the minimal set of lifecycle actions that turns the previously
//! applied endpoint list into a new one, then drives the registry through
//! them. Planning is pure; only [`ReconcilePlan::apply`] touches connections.
//!
//! Identity is the endpoint id. An id present in both lists whose address or
//! port changed is a modification and is handled by replacing the connection
//! under the same id.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::endpoint::{EndpointDescriptor, EndpointId};
use crate::error::Error;
use crate::events::EventHub;
use crate::registry::ConnectionRegistry;

/// Drop later entries that reuse an id, keeping the first occurrence
pub fn dedup_by_id(list: &[EndpointDescriptor]) -> Vec<EndpointDescriptor> {
    let mut seen = HashSet::with_capacity(list.len());
    let mut out = Vec::with_capacity(list.len());

    for descriptor in list {
        if seen.insert(&descriptor.id) {
            out.push(descriptor.clone());
        } else {
            tracing::warn!(
                endpoint = %descriptor.id,
                url = %descriptor.url(),
                "Duplicate endpoint id ignored"
            );
        }
    }

    out
}

/// One lifecycle action against the registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileAction {
    Remove(EndpointId),
    Create(EndpointDescriptor),
    Replace(EndpointDescriptor),
}

impl ReconcileAction {
    pub fn id(&self) -> &EndpointId {
        match self {
            ReconcileAction::Remove(id) => id,
            ReconcileAction::Create(d) | ReconcileAction::Replace(d) => &d.id,
        }
    }
}

/// Difference between two endpoint lists
///
/// Each group keeps the order of the list it came from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcilePlan {
    /// Ids only in the previous list
    pub removed: Vec<EndpointId>,
    /// Descriptors only in the new list
    pub added: Vec<EndpointDescriptor>,
    /// Descriptors in both lists whose address or port changed
    pub modified: Vec<EndpointDescriptor>,
}

impl ReconcilePlan {
    /// Diff `next` against `previous`
    ///
    /// `previous == None` marks the initial population: every descriptor in
    /// `next` is added without comparison.
    pub fn compute(previous: Option<&[EndpointDescriptor]>, next: &[EndpointDescriptor]) -> Self {
        let next = dedup_by_id(next);

        let Some(previous) = previous else {
            return Self {
                added: next,
                ..Default::default()
            };
        };
        let previous = dedup_by_id(previous);

        let old: HashMap<&EndpointId, &EndpointDescriptor> =
            previous.iter().map(|d| (&d.id, d)).collect();
        let new_ids: HashSet<&EndpointId> = next.iter().map(|d| &d.id).collect();

        let removed = previous
            .iter()
            .filter(|d| !new_ids.contains(&d.id))
            .map(|d| d.id.clone())
            .collect();

        let mut added = Vec::new();
        let mut modified = Vec::new();
        for descriptor in &next {
            match old.get(&descriptor.id) {
                None => added.push(descriptor.clone()),
                Some(prev) if !prev.same_target(descriptor) => modified.push(descriptor.clone()),
                Some(_) => {}
            }
        }

        Self {
            removed,
            added,
            modified,
        }
    }

    /// Check if the plan has no actions
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.added.is_empty() && self.modified.is_empty()
    }

    /// Total number of actions
    pub fn len(&self) -> usize {
        self.removed.len() + self.added.len() + self.modified.len()
    }

    /// Actions in application order: removals, then creations, then
    /// replacements
    pub fn actions(&self) -> impl Iterator<Item = ReconcileAction> + '_ {
        let removes = self.removed.iter().cloned().map(ReconcileAction::Remove);
        let creates = self.added.iter().cloned().map(ReconcileAction::Create);
        let replaces = self.modified.iter().cloned().map(ReconcileAction::Replace);
        removes.chain(creates).chain(replaces)
    }

    /// Drive the registry through the plan
    ///
    /// A failing action does not stop the rest; failures are collected in
    /// the report.
    pub async fn apply(&self, registry: &ConnectionRegistry, hub: &Arc<EventHub>) -> ReconcileReport {
        let mut report = ReconcileReport::default();

        for action in self.actions() {
            let id = action.id().clone();
            let result = match action {
                ReconcileAction::Remove(id) => {
                    if registry.remove(&id).await.is_some() {
                        report.removed += 1;
                    }
                    Ok(())
                }
                ReconcileAction::Create(descriptor) => registry
                    .create(descriptor, hub)
                    .await
                    .map(|_| report.created += 1),
                ReconcileAction::Replace(descriptor) => registry
                    .replace(descriptor, hub)
                    .await
                    .map(|_| report.replaced += 1),
            };

            if let Err(e) = result {
                tracing::warn!(endpoint = %id, error = %e, "Reconcile action failed");
                report.failed.push((id, e));
            }
        }

        tracing::info!(
            created = report.created,
            removed = report.removed,
            replaced = report.replaced,
            failed = report.failed.len(),
            "Endpoint list reconciled"
        );

        report
    }
}

/// Outcome of applying a plan
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcileReport {
    pub created: usize,
    pub removed: usize,
    pub replaced: usize,
    /// Actions that failed, with the reason
    pub failed: Vec<(EndpointId, Error)>,
}

impl ReconcileReport {
    /// Check if every action succeeded
    pub fn is_ok(&self) -> bool {
        self.failed.is_empty()
    }

    /// Whether an action for `id` failed
    pub fn failed_for(&self, id: &EndpointId) -> bool {
        self.failed.iter().any(|(failed, _)| failed == id)
    }
}
