use std::time::Duration;

use dashmap::DashMap;

use crate::link::{LinkError, SubscriptionId};

/// What a telemetry subscription asked for.
#[derive(Debug, Clone)]
pub struct ActiveSubscription {
    pub period: Duration,
    pub channels: Vec<String>,
}

/// The telemetry subscriptions currently open on a simulated link.
#[derive(Debug)]
pub struct SubscriptionMap {
    subscriptions: DashMap<SubscriptionId, ActiveSubscription, ahash::RandomState>,
}

impl SubscriptionMap {
    pub fn new() -> Self {
        Self {
            subscriptions: DashMap::default(),
        }
    }

    pub fn open(&self, subscription: ActiveSubscription) -> SubscriptionId {
        let id = SubscriptionId::generate();
        self.subscriptions.insert(id.clone(), subscription);
        id
    }

    pub fn close(&self, id: &SubscriptionId) -> Result<ActiveSubscription, LinkError> {
        self.subscriptions
            .remove(id)
            .map(|(_, subscription)| subscription)
            .ok_or_else(|| LinkError::SubscriptionNotFound(id.clone()))
    }

    pub fn is_active(&self, id: &SubscriptionId) -> bool {
        self.subscriptions.contains_key(id)
    }

    pub fn active_count(&self) -> usize {
        self.subscriptions.len()
    }
}

impl Default for SubscriptionMap {
    fn default() -> Self {
        Self::new()
    }
}
