//! Mutation engine for broker admission requests.
//!
//! A single generic [`MutationEngine`] runs a per-kind [`RuleSet`]: a list of
//! pure transformation functions for CREATE and another for UPDATE. Any
//! other operation is passed through untouched.
//!
//! The engine never fails and holds no state between requests. Defaults
//! (finalizer token, relist behavior) are supplied at construction.

pub mod rules;

use kube::core::admission::Operation;

use crate::crd::{BrokerResource, FINALIZER_SERVICE_CATALOG, RelistBehavior};

pub use rules::{cluster_service_broker_rules, service_broker_rules};

/// Values the rules fill in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MutationDefaults {
    /// The single finalizer every newly created broker carries.
    pub finalizer: String,
    /// Relist behavior applied when a client leaves it unset.
    pub relist_behavior: RelistBehavior,
}

impl Default for MutationDefaults {
    fn default() -> Self {
        Self {
            finalizer: FINALIZER_SERVICE_CATALOG.to_string(),
            relist_behavior: RelistBehavior::Duration,
        }
    }
}

/// Rule run on CREATE against the incoming object.
pub type CreateRule<K> = fn(&MutationDefaults, &mut K);

/// Rule run on UPDATE with the stored object and the incoming object.
pub type UpdateRule<K> = fn(&MutationDefaults, &K, &mut K);

/// Operation-specific rules for one resource kind.
pub struct RuleSet<K> {
    create: Vec<CreateRule<K>>,
    update: Vec<UpdateRule<K>>,
}

impl<K> Default for RuleSet<K> {
    fn default() -> Self {
        Self {
            create: Vec::new(),
            update: Vec::new(),
        }
    }
}

impl<K> RuleSet<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a rule to the CREATE branch.
    pub fn on_create(mut self, rule: CreateRule<K>) -> Self {
        self.create.push(rule);
        self
    }

    /// Append a rule to the UPDATE branch.
    pub fn on_update(mut self, rule: UpdateRule<K>) -> Self {
        self.update.push(rule);
        self
    }

    #[cfg(test)]
    pub(crate) fn create_rules(&self) -> usize {
        self.create.len()
    }

    #[cfg(test)]
    pub(crate) fn update_rules(&self) -> usize {
        self.update.len()
    }
}

/// Result of running the engine.
#[derive(Clone, Debug, PartialEq)]
pub enum Mutation<K> {
    /// The operation is handled; the object is the normalized copy.
    Applied(K),
    /// The operation is not handled; the object is an unchanged copy.
    Skipped(K),
}

impl<K> Mutation<K> {
    pub fn is_applied(&self) -> bool {
        matches!(self, Mutation::Applied(_))
    }

    pub fn object(&self) -> &K {
        match self {
            Mutation::Applied(obj) | Mutation::Skipped(obj) => obj,
        }
    }

    pub fn into_inner(self) -> K {
        match self {
            Mutation::Applied(obj) | Mutation::Skipped(obj) => obj,
        }
    }
}

/// Applies a [`RuleSet`] to admission objects.
pub struct MutationEngine<K> {
    rules: RuleSet<K>,
    defaults: MutationDefaults,
}

impl<K: BrokerResource> MutationEngine<K> {
    pub fn new(rules: RuleSet<K>, defaults: MutationDefaults) -> Self {
        Self { rules, defaults }
    }

    /// Whether the engine runs rules for this operation.
    pub fn handles(&self, operation: &Operation) -> bool {
        matches!(operation, Operation::Create | Operation::Update)
    }

    /// Produce the normalized copy of `new`.
    ///
    /// `old` is only consulted on UPDATE. An UPDATE without a stored object
    /// skips the update rules, since there is no prior state to carry over.
    pub fn mutate(&self, operation: &Operation, new: &K, old: Option<&K>) -> Mutation<K> {
        let mut mutated = new.clone();
        match operation {
            Operation::Create => {
                for rule in &self.rules.create {
                    rule(&self.defaults, &mut mutated);
                }
                Mutation::Applied(mutated)
            }
            Operation::Update => {
                if let Some(old) = old {
                    for rule in &self.rules.update {
                        rule(&self.defaults, old, &mut mutated);
                    }
                }
                Mutation::Applied(mutated)
            }
            _ => Mutation::Skipped(mutated),
        }
    }
}
