//! Query utilities for the IPAM API
//!
//! Turns the typed list filters into query parameters. Unset filters are
//! omitted rather than sent empty.

use crate::models::{
    AllocationFilter, BlockFilter, EnvironmentFilter, ListOptions, PoolFilter, ReservedBlockFilter,
};

/// A list filter that can be rendered as query parameters
pub trait QueryFilter {
    /// Query parameters for the set fields, in a stable order
    fn query_pairs(&self) -> Vec<(&'static str, String)>;
}

fn push(pairs: &mut Vec<(&'static str, String)>, key: &'static str, value: Option<&String>) {
    if let Some(v) = value {
        pairs.push((key, v.clone()));
    }
}

impl QueryFilter for ListOptions {
    fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(limit) = self.limit {
            pairs.push(("limit", limit.to_string()));
        }
        if let Some(offset) = self.offset {
            pairs.push(("offset", offset.to_string()));
        }
        pairs
    }
}

impl QueryFilter for EnvironmentFilter {
    fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        push(&mut pairs, "name", self.name.as_ref());
        pairs
    }
}

impl QueryFilter for PoolFilter {
    fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        push(&mut pairs, "environment_id", self.environment_id.as_ref());
        pairs
    }
}

impl QueryFilter for BlockFilter {
    fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        push(&mut pairs, "name", self.name.as_ref());
        push(&mut pairs, "environment_id", self.environment_id.as_ref());
        if let Some(orphaned) = self.orphaned_only {
            pairs.push(("orphaned_only", orphaned.to_string()));
        }
        pairs
    }
}

impl QueryFilter for AllocationFilter {
    fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        push(&mut pairs, "name", self.name.as_ref());
        push(&mut pairs, "block_name", self.block_name.as_ref());
        pairs
    }
}

impl QueryFilter for ReservedBlockFilter {
    fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        push(&mut pairs, "name", self.name.as_ref());
        pairs
    }
}

/// Filter pairs followed by pagination pairs
pub fn list_query(filter: &impl QueryFilter, options: ListOptions) -> Vec<(&'static str, String)> {
    let mut pairs = filter.query_pairs();
    pairs.extend(options.query_pairs());
    pairs
}
