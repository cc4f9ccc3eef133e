//! Children of one parent entity
//!
//! Every structural mutation runs in three phases:
//!
//! 1. `propose_*`: structural checks, then the parent's voters decide;
//! 2. `apply_*`: the child map is changed atomically (or not at all);
//! 3. `commit_*`: commit observers are informed.
//!
//! `add`, `update` and `remove` run the three phases back to back. The
//! propagation pipeline runs them separately so that commit observers fire
//! after the partners have been told.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::info;

use super::{FleetChild, FleetEntity};
use crate::domain::error::{FleetError, FleetResult};
use crate::domain::events::{ChildChange, ProposalVerdict, VetoableNotifier};
use crate::domain::ids::{Actor, EventTrackingId};

type Parent<C> = <C as FleetChild>::Parent;
type Id<C> = <C as FleetEntity>::Id;

pub struct ChildRegistry<C: FleetChild> {
    children: RwLock<BTreeMap<Id<C>, Arc<C>>>,
    notifier: VetoableNotifier<Parent<C>, C>,
}

impl<C: FleetChild> Default for ChildRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: FleetChild> fmt::Debug for ChildRegistry<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChildRegistry")
            .field("kind", &C::KIND)
            .field("children", &self.len())
            .field("notifier", &self.notifier)
            .finish()
    }
}

impl<C: FleetChild> ChildRegistry<C> {
    pub fn new() -> Self {
        Self {
            children: RwLock::new(BTreeMap::new()),
            notifier: VetoableNotifier::new(),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<Id<C>, Arc<C>>> {
        self.children.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<Id<C>, Arc<C>>> {
        self.children.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Subscribe voters and commit observers for this relationship here.
    pub fn notifier(&self) -> &VetoableNotifier<Parent<C>, C> {
        &self.notifier
    }

    pub fn get(&self, id: &Id<C>) -> Option<Arc<C>> {
        self.read().get(id).cloned()
    }

    pub fn contains(&self, id: &Id<C>) -> bool {
        self.read().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Child ids in ascending order.
    pub fn ids(&self) -> Vec<Id<C>> {
        self.read().keys().cloned().collect()
    }

    /// Snapshot of all children, ordered by id.
    pub fn all(&self) -> Vec<Arc<C>> {
        self.read().values().cloned().collect()
    }

    fn not_found(id: &Id<C>) -> FleetError {
        FleetError::NotFound {
            entity: C::KIND,
            id: id.to_string(),
        }
    }

    fn already_exists(id: &Id<C>) -> FleetError {
        FleetError::AlreadyExists {
            entity: C::KIND,
            id: id.to_string(),
        }
    }

    fn check_parent(parent: &Parent<C>, child: &C) -> FleetResult<()> {
        if child.parent_id() != parent.id() {
            return Err(FleetError::InvalidArgument(format!(
                "{} {} belongs to {} {}, not {}",
                C::KIND,
                child.id(),
                <Parent<C> as FleetEntity>::KIND,
                child.parent_id(),
                parent.id()
            )));
        }
        Ok(())
    }

    fn verdict(child: &C, verdict: ProposalVerdict) -> FleetResult<()> {
        match verdict {
            ProposalVerdict::Approved => Ok(()),
            ProposalVerdict::Vetoed(vetoes) => Err(FleetError::Vetoed {
                entity: C::KIND,
                id: child.id().to_string(),
                vetoes,
            }),
        }
    }

    // ── Addition ───────────────────────────────────────────────

    pub fn propose_add(
        &self,
        parent: &Parent<C>,
        child: &C,
        actor: &Actor,
        event_id: EventTrackingId,
    ) -> FleetResult<()> {
        Self::check_parent(parent, child)?;
        if self.contains(child.id()) {
            return Err(Self::already_exists(child.id()));
        }
        Self::verdict(
            child,
            self.notifier
                .propose(parent, ChildChange::Added(child), actor, event_id),
        )
    }

    /// Inserts the child unless a child with the same id appeared in the
    /// meantime.
    pub fn apply_add(&self, child: Arc<C>) -> FleetResult<Arc<C>> {
        let mut children = self.write();
        if children.contains_key(child.id()) {
            return Err(Self::already_exists(child.id()));
        }
        children.insert(child.id().clone(), child.clone());
        info!(kind = C::KIND, id = %child.id(), parent = %child.parent_id(), "Child added");
        Ok(child)
    }

    pub fn commit_add(&self, parent: &Parent<C>, child: &C, actor: &Actor, event_id: EventTrackingId) {
        self.notifier
            .commit(parent, ChildChange::Added(child), actor, event_id);
    }

    pub fn add(
        &self,
        parent: &Parent<C>,
        child: Arc<C>,
        actor: &Actor,
        event_id: EventTrackingId,
    ) -> FleetResult<Arc<C>> {
        self.propose_add(parent, &child, actor, event_id)?;
        let child = self.apply_add(child)?;
        self.commit_add(parent, &child, actor, event_id);
        Ok(child)
    }

    // ── Update ─────────────────────────────────────────────────

    /// Returns the child that would be replaced.
    pub fn propose_update(
        &self,
        parent: &Parent<C>,
        new: &C,
        actor: &Actor,
        event_id: EventTrackingId,
    ) -> FleetResult<Arc<C>> {
        Self::check_parent(parent, new)?;
        let old = self.get(new.id()).ok_or_else(|| Self::not_found(new.id()))?;
        Self::verdict(
            new,
            self.notifier.propose(
                parent,
                ChildChange::Updated { old: &*old, new },
                actor,
                event_id,
            ),
        )?;
        Ok(old)
    }

    /// Replaces the child with the same id and returns the previous one.
    pub fn apply_update(&self, new: Arc<C>) -> FleetResult<Arc<C>> {
        let mut children = self.write();
        let slot = children
            .get_mut(new.id())
            .ok_or_else(|| Self::not_found(new.id()))?;
        let old = std::mem::replace(slot, new.clone());
        info!(kind = C::KIND, id = %new.id(), "Child updated");
        Ok(old)
    }

    pub fn commit_update(
        &self,
        parent: &Parent<C>,
        old: &C,
        new: &C,
        actor: &Actor,
        event_id: EventTrackingId,
    ) {
        self.notifier
            .commit(parent, ChildChange::Updated { old, new }, actor, event_id);
    }

    /// Returns the replaced child.
    pub fn update(
        &self,
        parent: &Parent<C>,
        new: Arc<C>,
        actor: &Actor,
        event_id: EventTrackingId,
    ) -> FleetResult<Arc<C>> {
        self.propose_update(parent, &new, actor, event_id)?;
        let old = self.apply_update(new.clone())?;
        self.commit_update(parent, &old, &new, actor, event_id);
        Ok(old)
    }

    // ── Removal ────────────────────────────────────────────────

    /// Returns the child that would be removed.
    pub fn propose_remove(
        &self,
        parent: &Parent<C>,
        id: &Id<C>,
        actor: &Actor,
        event_id: EventTrackingId,
    ) -> FleetResult<Arc<C>> {
        let child = self.get(id).ok_or_else(|| Self::not_found(id))?;
        Self::verdict(
            &child,
            self.notifier
                .propose(parent, ChildChange::Removed(&*child), actor, event_id),
        )?;
        Ok(child)
    }

    pub fn apply_remove(&self, id: &Id<C>) -> FleetResult<Arc<C>> {
        let removed = self.write().remove(id).ok_or_else(|| Self::not_found(id))?;
        info!(kind = C::KIND, %id, "Child removed");
        Ok(removed)
    }

    pub fn commit_remove(&self, parent: &Parent<C>, child: &C, actor: &Actor, event_id: EventTrackingId) {
        self.notifier
            .commit(parent, ChildChange::Removed(child), actor, event_id);
    }

    pub fn remove(
        &self,
        parent: &Parent<C>,
        id: &Id<C>,
        actor: &Actor,
        event_id: EventTrackingId,
    ) -> FleetResult<Arc<C>> {
        self.propose_remove(parent, id, actor, event_id)?;
        let removed = self.apply_remove(id)?;
        self.commit_remove(parent, &removed, actor, event_id);
        Ok(removed)
    }
}
