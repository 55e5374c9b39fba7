//! The traits tying a desired declaration to its recorded state

use crate::schema::{ChangeSet, ResourceKind, ResourceSchema, diff_fields};
use crate::validation::Validate;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt::Debug;

/// Field values keyed by schema field name
pub type Fields = Vec<(&'static str, Option<String>)>;

/// State recorded for a managed entity after the service answered
pub trait Observed: Clone + Debug + PartialEq + Serialize + DeserializeOwned + Send + Sync {
    /// Service-assigned ID
    fn id(&self) -> &str;

    /// Every schema field, including computed ones
    fn observed_fields(&self) -> Fields;
}

/// What the operator asks for one entity
pub trait Declaration: Validate + Clone + Debug + Send + Sync {
    type State: Observed;

    const KIND: ResourceKind;

    fn schema() -> &'static ResourceSchema;

    /// Operator-supplied field values
    fn desired_fields(&self) -> Fields;

    /// Changed fields relative to `state`, partitioned by the schema
    fn changes_against(&self, state: &Self::State) -> ChangeSet {
        diff_fields(Self::schema(), &self.desired_fields(), &state.observed_fields())
    }

    /// The declaration that would produce `state` unchanged. Used to show an
    /// imported entity in document form.
    fn from_observed(state: &Self::State) -> Self;
}
