//! Reconciliation engine.
//!
//! One state machine per entity, generic over the resource kind:
//!
//! - Create: `Planned -> Created`, folding the whole response into state
//! - Read: `Created -> Drifted -> Reconciled` when the service disagrees
//! - Update or Replace: `Created -> Created`, chosen by the field schema
//! - Delete: `* -> Destroyed`
//! - Import: straight into `Created` from an ID
//!
//! Each kind module implements [`ManagedKind`] with its remote calls; this
//! module owns everything they share.

pub mod allocation;
#[cfg(test)]
mod allocation_test;
pub mod block;
#[cfg(test)]
mod block_test;
pub mod environment;
#[cfg(test)]
mod environment_test;
pub mod pool;
pub mod reserved_block;
#[cfg(test)]
mod reserved_block_test;

use crate::error::{Operation, ReconcileError};
use crate::state::{Lifecycle, Managed, StateSnapshot};
use crate::strategy::BlockLocks;
use ipam_client::IpamClientTrait;
use ipam_declarations::{ChangeSet, Declaration, Observed, ValidationError};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// What the engine shares across entities: the injected client and the
/// per-block allocation locks.
#[derive(Clone)]
pub struct ReconcileContext {
    client: Arc<dyn IpamClientTrait>,
    locks: Arc<BlockLocks>,
}

impl fmt::Debug for ReconcileContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReconcileContext")
            .field("base_url", &self.client.base_url())
            .finish_non_exhaustive()
    }
}

impl ReconcileContext {
    pub fn new(client: Arc<dyn IpamClientTrait>) -> Self {
        Self {
            client,
            locks: Arc::new(BlockLocks::new()),
        }
    }

    pub fn client(&self) -> &dyn IpamClientTrait {
        self.client.as_ref()
    }

    pub fn locks(&self) -> &BlockLocks {
        &self.locks
    }
}

/// Remote operations of one resource kind
#[async_trait::async_trait]
pub trait ManagedKind: Declaration + 'static {
    /// Create the entity and return its full recorded state
    async fn create(&self, ctx: &ReconcileContext, label: &str) -> Result<Self::State, ReconcileError>;

    /// Fetch the current remote state of a recorded entity
    async fn read(ctx: &ReconcileContext, prior: &Self::State) -> Result<Self::State, ReconcileError>;

    /// Fetch an entity knowing nothing but its ID
    async fn read_by_id(ctx: &ReconcileContext, id: &str) -> Result<Self::State, ReconcileError>;

    /// Apply the in-place fields. Computed fields missing from the response
    /// are carried over from `prior`.
    async fn update(&self, ctx: &ReconcileContext, prior: &Self::State) -> Result<Self::State, ReconcileError>;

    async fn delete(ctx: &ReconcileContext, state: &Self::State) -> Result<(), ReconcileError>;

    /// This kind's entries in recorded state
    fn entries(snapshot: &StateSnapshot) -> &BTreeMap<String, Managed<Self::State>>;

    fn entries_mut(snapshot: &mut StateSnapshot) -> &mut BTreeMap<String, Managed<Self::State>>;
}

/// What reconciling one entity does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Create,
    Update,
    /// Delete, then create
    Replace,
    NoOp,
    Delete,
    Read,
    Import,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Action::Create => "create",
            Action::Update => "update",
            Action::Replace => "replace",
            Action::NoOp => "no-op",
            Action::Delete => "delete",
            Action::Read => "read",
            Action::Import => "import",
        })
    }
}

/// The planned action for one entity and the changes behind it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub action: Action,
    pub changes: ChangeSet,
}

/// Outcome of applying one entity
#[derive(Debug)]
pub struct Applied<S> {
    pub action: Action,
    /// What the state entry becomes; `None` removes it
    pub entry: Option<Managed<S>>,
    pub result: Result<(), ReconcileError>,
}

impl<S> Applied<S> {
    /// Lifecycle reached, for reporting
    pub fn lifecycle(&self) -> Option<Lifecycle> {
        match (&self.result, &self.entry) {
            (Err(_), _) => None,
            (Ok(()), Some(entry)) => Some(entry.lifecycle),
            (Ok(()), None) => Some(Lifecycle::Destroyed),
        }
    }
}

/// Decide what to do for one entity. Purely local: validates the
/// declaration, refuses changes to create-only fields, and partitions the
/// rest into update and replace.
pub fn plan<D: ManagedKind>(label: &str, desired: &D, prior: Option<&Managed<D::State>>) -> Result<Plan, ReconcileError> {
    desired
        .validate()
        .map_err(|e| ReconcileError::validation(Operation::Plan, D::KIND, label, e))?;

    let Some(prior) = prior else {
        return Ok(Plan {
            action: Action::Create,
            changes: ChangeSet::default(),
        });
    };

    let changes = desired.changes_against(&prior.state);
    if let Some(change) = changes.rejected().next() {
        return Err(ReconcileError::validation(
            Operation::Plan,
            D::KIND,
            label,
            ValidationError::Immutable {
                kind: D::KIND,
                field: change.field,
                from: change.from.clone(),
                to: change.to.clone(),
            },
        ));
    }
    for change in changes.ignored() {
        warn!("{} {}: ignoring change to {}", D::KIND, label, change);
    }

    let action = if changes.requires_replace() {
        Action::Replace
    } else if changes.requires_update() {
        Action::Update
    } else {
        Action::NoOp
    };
    Ok(Plan { action, changes })
}

/// Bring one entity to its declaration
pub async fn apply<D: ManagedKind>(
    ctx: &ReconcileContext,
    label: &str,
    desired: &D,
    prior: Option<&Managed<D::State>>,
) -> Applied<D::State> {
    let plan = match plan(label, desired, prior) {
        Ok(plan) => plan,
        Err(e) => return failed(label, Action::NoOp, prior.cloned(), e),
    };

    match (plan.action, prior) {
        (Action::Create, _) => match desired.create(ctx, label).await {
            Ok(state) => {
                info!("{} {} created (ID: {})", D::KIND, label, state.id());
                created(state, Action::Create)
            }
            Err(e) => failed(label, Action::Create, None, e),
        },
        (Action::Update, Some(prior)) => {
            for change in plan.changes.updates() {
                debug!("{} {}: {}", D::KIND, label, change);
            }
            match desired.update(ctx, &prior.state).await {
                Ok(state) => {
                    info!("{} {} updated in place (ID: {})", D::KIND, label, state.id());
                    created(state, Action::Update)
                }
                Err(e) => failed(label, Action::Update, Some(prior.clone()), e),
            }
        }
        (Action::Replace, Some(prior)) => {
            for change in plan.changes.replacements() {
                info!("{} {}: {} forces replacement", D::KIND, label, change);
            }
            if let Err(e) = D::delete(ctx, &prior.state).await {
                return failed(label, Action::Replace, Some(prior.clone()), e);
            }
            // The old entity is gone; from here a failure leaves no entry
            match desired.create(ctx, label).await {
                Ok(state) => {
                    info!("{} {} replaced (ID: {} -> {})", D::KIND, label, prior.id(), state.id());
                    created(state, Action::Replace)
                }
                Err(e) => failed(label, Action::Replace, None, e),
            }
        }
        (_, prior) => {
            debug!("{} {} is up to date", D::KIND, label);
            Applied {
                action: Action::NoOp,
                entry: prior.cloned(),
                result: Ok(()),
            }
        }
    }
}

/// Re-read one entity and fold whatever the service says into state
pub async fn refresh<D: ManagedKind>(ctx: &ReconcileContext, label: &str, prior: &Managed<D::State>) -> Applied<D::State> {
    match D::read(ctx, &prior.state).await {
        Ok(fresh) if fresh == prior.state => Applied {
            action: Action::Read,
            entry: Some(prior.clone()),
            result: Ok(()),
        },
        Ok(fresh) => {
            let before = prior.state.observed_fields();
            for (field, value) in fresh.observed_fields() {
                let old = before.iter().find(|(f, _)| *f == field).and_then(|(_, v)| v.as_ref());
                if old != value.as_ref() {
                    warn!(
                        "{} {} drifted: {}: {} -> {}",
                        D::KIND,
                        label,
                        field,
                        old.map_or("<none>", String::as_str),
                        value.as_deref().unwrap_or("<none>")
                    );
                }
            }
            debug!("{} {}: {} -> {}", D::KIND, label, Lifecycle::Drifted, Lifecycle::Reconciled);
            Applied {
                action: Action::Read,
                entry: Some(Managed::new(Lifecycle::Reconciled, fresh)),
                result: Ok(()),
            }
        }
        Err(e) => failed(label, Action::Read, Some(prior.clone()), e),
    }
}

/// Adopt an existing remote entity by ID. The result is both desired and
/// actual state.
pub async fn import<D: ManagedKind>(ctx: &ReconcileContext, label: &str, id: &str) -> Result<Managed<D::State>, ReconcileError> {
    let state = D::read_by_id(ctx, id).await.map_err(|e| {
        error!("Failed to import {} {} (ID: {}): {}", D::KIND, label, id, e);
        e
    })?;
    info!("{} {} imported (ID: {})", D::KIND, label, state.id());
    Ok(Managed::new(Lifecycle::Created, state))
}

/// Delete one entity. A missing remote entity is an error, not a success.
pub async fn destroy<D: ManagedKind>(ctx: &ReconcileContext, label: &str, prior: &Managed<D::State>) -> Applied<D::State> {
    match D::delete(ctx, &prior.state).await {
        Ok(()) => {
            info!("{} {} destroyed (ID: {})", D::KIND, label, prior.id());
            Applied {
                action: Action::Delete,
                entry: None,
                result: Ok(()),
            }
        }
        Err(e) => failed(label, Action::Delete, Some(prior.clone()), e),
    }
}

fn created<S: Observed>(state: S, action: Action) -> Applied<S> {
    Applied {
        action,
        entry: Some(Managed::new(Lifecycle::Created, state)),
        result: Ok(()),
    }
}

fn failed<S>(label: &str, action: Action, entry: Option<Managed<S>>, e: ReconcileError) -> Applied<S> {
    error!("Failed to {} {}: {}", action, label, e);
    Applied {
        action,
        entry,
        result: Err(e),
    }
}
