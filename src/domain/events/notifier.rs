//! Vetoable notifications for child mutations
//!
//! A parent entity owns one [`VetoableNotifier`] per child relationship.
//! Before a child is added, replaced or removed the parent asks every
//! [`MutationVoter`] subscribed to that event category; a single "no" (or a
//! failing voter) blocks the mutation. After the mutation has been applied
//! the [`CommitObserver`]s are informed. Nothing an observer does at that
//! stage can undo the mutation.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use chrono::Utc;
use tracing::{debug, warn};

use super::lifecycle::{
    ChildChange, LifecycleEvent, LifecycleKind, ObserverFault, ProposalVerdict, Veto, VetoCause,
};
use crate::domain::ids::{Actor, EventTrackingId};

/// Decides whether a proposed mutation may go ahead.
///
/// Report failures as an [`ObserverFault`]; they count as a veto. A voter
/// must not panic. A panic is caught and recorded as a fault, but whatever
/// state the voter held at that point is left as it was.
pub trait MutationVoter<P, C>: Send + Sync {
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    fn vote(&self, event: &LifecycleEvent<'_, P, C>) -> Result<bool, ObserverFault>;
}

/// Informed after a mutation has been applied.
///
/// Report failures as an [`ObserverFault`]; they are logged and never undo
/// the mutation. Observers must not panic either. A caught panic is logged
/// like a fault and the remaining observers still run.
pub trait CommitObserver<P, C>: Send + Sync {
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    fn committed(&self, event: &LifecycleEvent<'_, P, C>) -> Result<(), ObserverFault>;
}

/// Handle returned by the `subscribe_*` methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Registration<O: ?Sized> {
    id: SubscriptionId,
    kind: LifecycleKind,
    observer: Arc<O>,
}

pub struct VetoableNotifier<P, C> {
    voters: RwLock<Vec<Registration<dyn MutationVoter<P, C>>>>,
    committers: RwLock<Vec<Registration<dyn CommitObserver<P, C>>>>,
    next_id: AtomicU64,
}

impl<P, C> Default for VetoableNotifier<P, C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P, C> std::fmt::Debug for VetoableNotifier<P, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VetoableNotifier")
            .field("voters", &self.voter_count())
            .field("committers", &self.committer_count())
            .finish()
    }
}

impl<P, C> VetoableNotifier<P, C> {
    pub fn new() -> Self {
        Self {
            voters: RwLock::new(Vec::new()),
            committers: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    fn allocate_id(&self) -> SubscriptionId {
        SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    pub fn subscribe_voter(
        &self,
        kind: LifecycleKind,
        voter: Arc<dyn MutationVoter<P, C>>,
    ) -> SubscriptionId {
        let id = self.allocate_id();
        debug!(observer = voter.name(), %kind, "Voter subscribed");
        self.voters
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Registration {
                id,
                kind,
                observer: voter,
            });
        id
    }

    pub fn subscribe_commit(
        &self,
        kind: LifecycleKind,
        observer: Arc<dyn CommitObserver<P, C>>,
    ) -> SubscriptionId {
        let id = self.allocate_id();
        debug!(observer = observer.name(), %kind, "Commit observer subscribed");
        self.committers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Registration { id, kind, observer });
        id
    }

    /// Removes a voter or commit observer. Returns false if `id` is unknown.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut voters = self.voters.write().unwrap_or_else(PoisonError::into_inner);
        let before = voters.len();
        voters.retain(|r| r.id != id);
        if voters.len() < before {
            return true;
        }
        drop(voters);

        let mut committers = self
            .committers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = committers.len();
        committers.retain(|r| r.id != id);
        committers.len() < before
    }

    pub fn voter_count(&self) -> usize {
        self.voters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn committer_count(&self) -> usize {
        self.committers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    // Observers are collected before they run so they can (un)subscribe
    // from inside a callback without deadlocking.
    fn voters_for(&self, kind: LifecycleKind) -> Vec<Arc<dyn MutationVoter<P, C>>> {
        self.voters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|r| r.kind == kind)
            .map(|r| r.observer.clone())
            .collect()
    }

    fn committers_for(&self, kind: LifecycleKind) -> Vec<Arc<dyn CommitObserver<P, C>>> {
        self.committers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|r| r.kind == kind)
            .map(|r| r.observer.clone())
            .collect()
    }

    /// Asks every voter subscribed to the change's category, in
    /// subscription order. Approved only if all of them vote yes; approved
    /// vacuously if nobody is subscribed.
    pub fn propose(
        &self,
        parent: &P,
        change: ChildChange<'_, C>,
        actor: &Actor,
        event_id: EventTrackingId,
    ) -> ProposalVerdict {
        let event = LifecycleEvent {
            timestamp: Utc::now(),
            event_id,
            actor,
            parent,
            change,
        };

        let mut vetoes = Vec::new();
        for voter in self.voters_for(change.kind()) {
            match guarded(|| voter.vote(&event)) {
                Ok(true) => {}
                Ok(false) => vetoes.push(Veto {
                    observer: voter.name().to_string(),
                    cause: VetoCause::Rejected,
                }),
                Err(fault) => {
                    warn!(
                        observer = voter.name(),
                        %event_id,
                        error = %fault,
                        "Voter failed; treating as veto"
                    );
                    vetoes.push(Veto {
                        observer: voter.name().to_string(),
                        cause: VetoCause::Fault(fault.to_string()),
                    });
                }
            }
        }

        if vetoes.is_empty() {
            ProposalVerdict::Approved
        } else {
            debug!(%event_id, kind = %change.kind(), vetoes = vetoes.len(), "Mutation vetoed");
            ProposalVerdict::Vetoed(vetoes)
        }
    }

    /// Informs commit observers. Failures are logged and otherwise ignored.
    pub fn commit(
        &self,
        parent: &P,
        change: ChildChange<'_, C>,
        actor: &Actor,
        event_id: EventTrackingId,
    ) {
        let event = LifecycleEvent {
            timestamp: Utc::now(),
            event_id,
            actor,
            parent,
            change,
        };

        for observer in self.committers_for(change.kind()) {
            if let Err(fault) = guarded(|| observer.committed(&event)) {
                warn!(
                    observer = observer.name(),
                    %event_id,
                    error = %fault,
                    "Commit observer failed"
                );
            }
        }
    }
}

/// Runs an observer callback, turning a panic into an [`ObserverFault`].
fn guarded<T>(callback: impl FnOnce() -> Result<T, ObserverFault>) -> Result<T, ObserverFault> {
    panic::catch_unwind(AssertUnwindSafe(callback))
        .unwrap_or_else(|payload| Err(ObserverFault::new(format!("panicked: {}", panic_message(&*payload)))))
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[derive(Debug)]
    struct Parent;
    #[derive(Debug)]
    struct Child(&'static str);

    struct FixedVote(bool, AtomicUsize);

    impl FixedVote {
        fn new(vote: bool) -> Arc<Self> {
            Arc::new(Self(vote, AtomicUsize::new(0)))
        }

        fn calls(&self) -> usize {
            self.1.load(Ordering::SeqCst)
        }
    }

    impl MutationVoter<Parent, Child> for FixedVote {
        fn name(&self) -> &str {
            if self.0 { "yes" } else { "no" }
        }

        fn vote(&self, _event: &LifecycleEvent<'_, Parent, Child>) -> Result<bool, ObserverFault> {
            self.1.fetch_add(1, Ordering::SeqCst);
            Ok(self.0)
        }
    }

    struct Failing;

    impl MutationVoter<Parent, Child> for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn vote(&self, _event: &LifecycleEvent<'_, Parent, Child>) -> Result<bool, ObserverFault> {
            Err(ObserverFault::new("backend unreachable"))
        }
    }

    #[derive(Default)]
    struct Recorder(RwLock<Vec<String>>);

    impl CommitObserver<Parent, Child> for Recorder {
        fn committed(&self, event: &LifecycleEvent<'_, Parent, Child>) -> Result<(), ObserverFault> {
            self.0
                .write()
                .unwrap()
                .push(format!("{}:{}", event.kind(), event.change.subject().0));
            Ok(())
        }
    }

    struct Exploding;

    impl CommitObserver<Parent, Child> for Exploding {
        fn committed(&self, _event: &LifecycleEvent<'_, Parent, Child>) -> Result<(), ObserverFault> {
            Err(ObserverFault::new("disk full"))
        }
    }

    fn propose_add(n: &VetoableNotifier<Parent, Child>, child: &Child) -> ProposalVerdict {
        n.propose(
            &Parent,
            ChildChange::Added(child),
            &Actor::system(),
            EventTrackingId::new(),
        )
    }

    #[test]
    fn no_voters_means_approved() {
        let n = VetoableNotifier::<Parent, Child>::new();
        assert!(propose_add(&n, &Child("a")).is_approved());
    }

    #[test]
    fn single_no_vetoes_and_all_voters_are_asked() {
        let n = VetoableNotifier::<Parent, Child>::new();
        let yes = FixedVote::new(true);
        let no = FixedVote::new(false);
        let yes2 = FixedVote::new(true);
        n.subscribe_voter(LifecycleKind::Addition, yes.clone());
        n.subscribe_voter(LifecycleKind::Addition, no.clone());
        n.subscribe_voter(LifecycleKind::Addition, yes2.clone());

        let verdict = propose_add(&n, &Child("a"));
        assert_eq!(
            verdict,
            ProposalVerdict::Vetoed(vec![Veto {
                observer: "no".into(),
                cause: VetoCause::Rejected
            }])
        );
        assert_eq!(yes.calls(), 1);
        assert_eq!(no.calls(), 1);
        assert_eq!(yes2.calls(), 1);
    }

    #[test]
    fn voters_only_see_their_category() {
        let n = VetoableNotifier::<Parent, Child>::new();
        let no = FixedVote::new(false);
        n.subscribe_voter(LifecycleKind::Removal, no.clone());

        assert!(propose_add(&n, &Child("a")).is_approved());
        assert_eq!(no.calls(), 0);

        let verdict = n.propose(
            &Parent,
            ChildChange::Removed(&Child("a")),
            &Actor::system(),
            EventTrackingId::new(),
        );
        assert!(!verdict.is_approved());
    }

    #[test]
    fn failing_voter_is_a_veto_with_reason() {
        let n = VetoableNotifier::<Parent, Child>::new();
        n.subscribe_voter(LifecycleKind::Addition, Arc::new(Failing));

        let verdict = propose_add(&n, &Child("a"));
        assert_eq!(
            verdict.vetoes(),
            &[Veto {
                observer: "failing".into(),
                cause: VetoCause::Fault("backend unreachable".into())
            }]
        );
    }

    #[test]
    fn unsubscribe_removes_voter() {
        let n = VetoableNotifier::<Parent, Child>::new();
        let id = n.subscribe_voter(LifecycleKind::Addition, FixedVote::new(false));
        assert!(n.unsubscribe(id));
        assert!(!n.unsubscribe(id));
        assert!(propose_add(&n, &Child("a")).is_approved());
    }

    #[test]
    fn commit_reaches_observers_despite_failures() {
        let n = VetoableNotifier::<Parent, Child>::new();
        let recorder = Arc::new(Recorder::default());
        n.subscribe_commit(LifecycleKind::Addition, Arc::new(Exploding));
        n.subscribe_commit(LifecycleKind::Addition, recorder.clone());

        n.commit(
            &Parent,
            ChildChange::Added(&Child("a")),
            &Actor::system(),
            EventTrackingId::new(),
        );
        assert_eq!(*recorder.0.read().unwrap(), vec!["addition:a".to_string()]);
    }

    struct Panicking;

    impl MutationVoter<Parent, Child> for Panicking {
        fn name(&self) -> &str {
            "panicking"
        }

        fn vote(&self, _event: &LifecycleEvent<'_, Parent, Child>) -> Result<bool, ObserverFault> {
            panic!("index out of range")
        }
    }

    impl CommitObserver<Parent, Child> for Panicking {
        fn committed(&self, _event: &LifecycleEvent<'_, Parent, Child>) -> Result<(), ObserverFault> {
            panic!("observer bug")
        }
    }

    #[test]
    fn panicking_voter_is_a_veto() {
        let n = VetoableNotifier::<Parent, Child>::new();
        let yes = FixedVote::new(true);
        n.subscribe_voter(LifecycleKind::Addition, Arc::new(Panicking));
        n.subscribe_voter(LifecycleKind::Addition, yes.clone());

        let verdict = propose_add(&n, &Child("a"));
        assert_eq!(
            verdict.vetoes(),
            &[Veto {
                observer: "panicking".into(),
                cause: VetoCause::Fault("panicked: index out of range".into())
            }]
        );
        assert_eq!(yes.calls(), 1);
    }

    #[test]
    fn panicking_commit_observer_does_not_stop_the_others() {
        let n = VetoableNotifier::<Parent, Child>::new();
        let recorder = Arc::new(Recorder::default());
        n.subscribe_commit(LifecycleKind::Addition, Arc::new(Panicking));
        n.subscribe_commit(LifecycleKind::Addition, recorder.clone());

        n.commit(
            &Parent,
            ChildChange::Added(&Child("a")),
            &Actor::system(),
            EventTrackingId::new(),
        );
        assert_eq!(*recorder.0.read().unwrap(), vec!["addition:a".to_string()]);
    }

    #[test]
    fn update_events_carry_old_and_new() {
        struct DiffCheck;
        impl MutationVoter<Parent, Child> for DiffCheck {
            fn vote(&self, event: &LifecycleEvent<'_, Parent, Child>) -> Result<bool, ObserverFault> {
                match event.change {
                    ChildChange::Updated { old, new } => Ok(old.0 != new.0),
                    _ => Ok(false),
                }
            }
        }

        let n = VetoableNotifier::<Parent, Child>::new();
        n.subscribe_voter(LifecycleKind::Update, Arc::new(DiffCheck));
        let verdict = n.propose(
            &Parent,
            ChildChange::Updated {
                old: &Child("a"),
                new: &Child("a"),
            },
            &Actor::system(),
            EventTrackingId::new(),
        );
        assert!(!verdict.is_approved());
    }
}
