//! Publish plan

use serde::{Deserialize, Serialize};

/// Members in publish order, dependencies first
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PublishPlan {
    order: Vec<String>,
}

impl PublishPlan {
    pub(crate) fn new(order: Vec<String>) -> Self {
        Self { order }
    }

    /// Crate names in order
    pub fn order(&self) -> &[String] {
        &self.order
    }

    /// Iterate crate names in order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Position of a crate in the plan
    pub fn position(&self, name: &str) -> Option<usize> {
        self.order.iter().position(|n| n == name)
    }

    /// Number of members
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Check if the plan is empty
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl IntoIterator for PublishPlan {
    type Item = String;
    type IntoIter = std::vec::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.order.into_iter()
    }
}
