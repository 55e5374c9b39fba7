//! Recorded state
//!
//! What the reconciler knows about each managed entity after the service
//! last answered, keyed by the label the desired-state document uses. The
//! file is JSON and is replaced atomically on save.

use crate::error::ReconcileError;
use chrono::{DateTime, Utc};
use ipam_declarations::{
    AllocationState, BlockState, EnvironmentState, Observed, PoolState, ReservedBlockState, ResourceKind,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use tracing::debug;

/// Per-entity lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Lifecycle {
    /// Desired values known, remote state unknown
    Planned,
    /// Remote ID assigned and every computed field recorded
    Created,
    /// A read found remote values differing from recorded state
    Drifted,
    /// Drift folded back into state
    Reconciled,
    /// Deleted remotely; terminal
    Destroyed,
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Recorded state of one entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Managed<S> {
    pub lifecycle: Lifecycle,
    pub state: S,
    pub last_reconciled: DateTime<Utc>,
}

impl<S: Observed> Managed<S> {
    pub fn new(lifecycle: Lifecycle, state: S) -> Self {
        Self {
            lifecycle,
            state,
            last_reconciled: Utc::now(),
        }
    }

    pub fn id(&self) -> &str {
        self.state.id()
    }
}

/// Everything the reconciler has recorded
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    #[serde(default)]
    pub environments: BTreeMap<String, Managed<EnvironmentState>>,

    #[serde(default)]
    pub pools: BTreeMap<String, Managed<PoolState>>,

    #[serde(default)]
    pub blocks: BTreeMap<String, Managed<BlockState>>,

    #[serde(default)]
    pub allocations: BTreeMap<String, Managed<AllocationState>>,

    #[serde(default)]
    pub reserved_blocks: BTreeMap<String, Managed<ReservedBlockState>>,
}

impl StateSnapshot {
    /// Load state from `path`; a missing file is empty state.
    pub async fn load(path: &Path) -> Result<Self, ReconcileError> {
        let text = match tokio::fs::read_to_string(path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No state file at {}, starting empty", path.display());
                return Ok(Self::default());
            }
            Err(e) => return Err(state_error(path, &e)),
        };
        serde_json::from_str(&text).map_err(|e| state_error(path, &e))
    }

    /// Write state to `path` through a sibling temp file and a rename.
    pub async fn save(&self, path: &Path) -> Result<(), ReconcileError> {
        let json = serde_json::to_string_pretty(self).map_err(|e| state_error(path, &e))?;
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = Path::new(&tmp);
        tokio::fs::write(tmp, json).await.map_err(|e| state_error(tmp, &e))?;
        tokio::fs::rename(tmp, path).await.map_err(|e| state_error(path, &e))?;
        debug!("Saved state to {}", path.display());
        Ok(())
    }

    /// Recorded labels of `kind`
    pub fn labels(&self, kind: ResourceKind) -> Vec<String> {
        match kind {
            ResourceKind::Environment => self.environments.keys().cloned().collect(),
            ResourceKind::Pool => self.pools.keys().cloned().collect(),
            ResourceKind::Block => self.blocks.keys().cloned().collect(),
            ResourceKind::Allocation => self.allocations.keys().cloned().collect(),
            ResourceKind::ReservedBlock => self.reserved_blocks.keys().cloned().collect(),
        }
    }

    /// Service ID recorded for `label`
    pub fn id_of(&self, kind: ResourceKind, label: &str) -> Option<&str> {
        match kind {
            ResourceKind::Environment => self.environments.get(label).map(Managed::id),
            ResourceKind::Pool => self.pools.get(label).map(Managed::id),
            ResourceKind::Block => self.blocks.get(label).map(Managed::id),
            ResourceKind::Allocation => self.allocations.get(label).map(Managed::id),
            ResourceKind::ReservedBlock => self.reserved_blocks.get(label).map(Managed::id),
        }
    }

    pub fn is_empty(&self) -> bool {
        ResourceKind::ALL.iter().all(|kind| self.labels(*kind).is_empty())
    }
}

fn state_error(path: &Path, e: &dyn fmt::Display) -> ReconcileError {
    ReconcileError::State {
        path: path.display().to_string(),
        message: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ipam_declarations::{BlockNameRef, IpCount};

    fn snapshot() -> StateSnapshot {
        let mut state = StateSnapshot::default();
        state.blocks.insert(
            "edge".to_string(),
            Managed::new(
                Lifecycle::Created,
                BlockState {
                    id: "b-1".to_string(),
                    name: "edge".to_string(),
                    cidr: "10.1.100.0/24".to_string(),
                    environment_id: None,
                    pool_id: None,
                    total_ips: IpCount::new("256"),
                    used_ips: IpCount::new("0"),
                    available_ips: IpCount::new("256"),
                },
            ),
        );
        state.allocations.insert(
            "web".to_string(),
            Managed::new(
                Lifecycle::Reconciled,
                AllocationState {
                    id: "a-1".to_string(),
                    name: "web".to_string(),
                    block_name: BlockNameRef::new("edge"),
                    cidr: "10.1.100.0/26".to_string(),
                    prefix_length: Some(26),
                },
            ),
        );
        state
    }

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("ipam-reconciler-{}-{}.json", name, std::process::id()))
    }

    #[tokio::test]
    async fn test_missing_file_is_empty_state() {
        let state = StateSnapshot::load(&temp_path("missing")).await.unwrap();
        assert!(state.is_empty());
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let path = temp_path("save");
        let state = snapshot();
        state.save(&path).await.unwrap();
        let loaded = StateSnapshot::load(&path).await.unwrap();
        tokio::fs::remove_file(&path).await.unwrap();

        assert_eq!(loaded, state);
        assert_eq!(loaded.id_of(ResourceKind::Allocation, "web"), Some("a-1"));
        assert_eq!(loaded.labels(ResourceKind::Block), vec!["edge".to_string()]);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_a_state_error() {
        let path = temp_path("corrupt");
        tokio::fs::write(&path, "{not json").await.unwrap();
        let result = StateSnapshot::load(&path).await;
        tokio::fs::remove_file(&path).await.unwrap();
        assert!(matches!(result, Err(ReconcileError::State { .. })));
    }
}
