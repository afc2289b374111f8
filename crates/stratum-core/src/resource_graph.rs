//! # Resource Graph
//!
//! The bucket arena behind the index: one bucket per resource identity,
//! addressed by `ResourceId` handles.
//!
//! The containment tree is stored as a non-owning parent handle plus an
//! ordered list of child handles on each bucket. No bucket refers to
//! another by reference, so the tree needs no back-pointers.
//!
//! All storage uses `BTreeMap` for deterministic iteration.

use crate::types::{Measure, Resource, ResourceId, ResourceKey};
use std::collections::BTreeMap;

// =============================================================================
// BUCKET
// =============================================================================

/// The index record of one resource.
#[derive(Debug, Clone)]
pub struct Bucket {
    resource: Resource,
    parent: Option<ResourceId>,
    children: Vec<ResourceId>,
    measures: BTreeMap<String, Measure>,
    excluded: bool,
}

impl Bucket {
    /// The canonical resource, with its effective key set.
    #[must_use]
    pub fn resource(&self) -> &Resource {
        &self.resource
    }

    #[must_use]
    pub fn parent(&self) -> Option<ResourceId> {
        self.parent
    }

    /// Child handles in insertion order, excluded ones included.
    #[must_use]
    pub fn children(&self) -> &[ResourceId] {
        &self.children
    }

    #[must_use]
    pub fn is_excluded(&self) -> bool {
        self.excluded
    }

    #[must_use]
    pub fn measure(&self, metric_key: &str) -> Option<&Measure> {
        self.measures.get(metric_key)
    }

    /// Measures ordered by metric key.
    pub fn measures(&self) -> impl Iterator<Item = &Measure> {
        self.measures.values()
    }
}

// =============================================================================
// RESOURCE GRAPH
// =============================================================================

/// Arena of buckets plus the identity lookup.
#[derive(Debug, Clone, Default)]
pub struct ResourceGraph {
    /// Bucket storage: ResourceId -> Bucket
    buckets: BTreeMap<ResourceId, Bucket>,

    /// Reverse lookup: identity -> ResourceId
    identity_index: BTreeMap<ResourceKey, ResourceId>,

    /// Next available ResourceId. Never decremented.
    next_id: u64,
}

impl ResourceGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Handle of the bucket for `resource`, excluded or not.
    #[must_use]
    pub fn find(&self, resource: &Resource) -> Option<ResourceId> {
        self.identity_index.get(&resource.identity()).copied()
    }

    /// Handle of the bucket for `resource`, hiding excluded buckets unless
    /// `accept_excluded` is set.
    #[must_use]
    pub fn get(&self, resource: &Resource, accept_excluded: bool) -> Option<ResourceId> {
        let id = self.find(resource)?;
        if !accept_excluded && self.is_excluded(id) {
            return None;
        }
        Some(id)
    }

    #[must_use]
    pub fn bucket(&self, id: ResourceId) -> Option<&Bucket> {
        self.buckets.get(&id)
    }

    #[must_use]
    pub fn resource(&self, id: ResourceId) -> Option<&Resource> {
        self.buckets.get(&id).map(Bucket::resource)
    }

    /// True when `id` names an excluded bucket.
    #[must_use]
    pub fn is_excluded(&self, id: ResourceId) -> bool {
        self.buckets.get(&id).is_some_and(|b| b.excluded)
    }

    /// Create the bucket for `resource`, or return the existing one.
    ///
    /// A fresh bucket is appended to its parent's child list.
    pub fn insert(
        &mut self,
        resource: Resource,
        parent: Option<ResourceId>,
        excluded: bool,
    ) -> ResourceId {
        let identity = resource.identity();
        if let Some(&existing) = self.identity_index.get(&identity) {
            return existing;
        }

        let id = ResourceId(self.next_id);
        self.next_id = self.next_id.saturating_add(1);

        self.buckets.insert(
            id,
            Bucket {
                resource,
                parent,
                children: Vec::new(),
                measures: BTreeMap::new(),
                excluded,
            },
        );
        self.identity_index.insert(identity, id);

        if let Some(parent_bucket) = parent.and_then(|p| self.buckets.get_mut(&p)) {
            parent_bucket.children.push(id);
        }
        id
    }

    /// Store `measure` on a bucket, replacing any measure of the same metric.
    /// Returns false when the bucket does not exist.
    pub fn put_measure(&mut self, id: ResourceId, measure: Measure) -> bool {
        match self.buckets.get_mut(&id) {
            Some(bucket) => {
                bucket.measures.insert(measure.metric_key.clone(), measure);
                true
            }
            None => false,
        }
    }

    /// Child handles of `id` in insertion order.
    #[must_use]
    pub fn children(&self, id: ResourceId, accept_excluded: bool) -> Vec<ResourceId> {
        self.buckets
            .get(&id)
            .map(|bucket| {
                bucket
                    .children
                    .iter()
                    .copied()
                    .filter(|child| accept_excluded || !self.is_excluded(*child))
                    .collect()
            })
            .unwrap_or_default()
    }

    #[must_use]
    pub fn parent(&self, id: ResourceId) -> Option<ResourceId> {
        self.buckets.get(&id).and_then(Bucket::parent)
    }

    /// Every bucket, ordered by handle (creation order).
    pub fn iter(&self) -> impl Iterator<Item = (ResourceId, &Bucket)> {
        self.buckets.iter().map(|(id, bucket)| (*id, bucket))
    }

    /// Drop every bucket below project scope.
    ///
    /// Surviving buckets lose the dropped handles from their child lists.
    /// Returns the number of buckets removed.
    pub fn retain_sets(&mut self) -> usize {
        let before = self.buckets.len();
        self.buckets.retain(|_, bucket| bucket.resource.is_set());
        self.identity_index
            .retain(|_, id| self.buckets.contains_key(id));

        let survivors: Vec<ResourceId> = self.buckets.keys().copied().collect();
        for bucket in self.buckets.values_mut() {
            bucket.children.retain(|child| survivors.binary_search(child).is_ok());
        }
        before - self.buckets.len()
    }
}

// =============================================================================
// TESTS
// =============================================================================
