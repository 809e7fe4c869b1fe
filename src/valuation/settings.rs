use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use super::domain::{DealKind, TenantId};
use super::repository::StoreError;

/// Dollar values a tenant assigns to one parking space and one locker,
/// kept separate per transaction direction. Lease values are monthly-rent
/// context, not capitalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustmentSchedule {
    pub sale_parking_space: u64,
    pub sale_locker: u64,
    pub lease_parking_space: u64,
    pub lease_locker: u64,
}

impl AdjustmentSchedule {
    pub const fn parking_value(&self, deal: DealKind) -> u64 {
        match deal {
            DealKind::Sale => self.sale_parking_space,
            DealKind::Lease => self.lease_parking_space,
        }
    }

    pub const fn locker_value(&self, deal: DealKind) -> u64 {
        match deal {
            DealKind::Sale => self.sale_locker,
            DealKind::Lease => self.lease_locker,
        }
    }
}

impl Default for AdjustmentSchedule {
    fn default() -> Self {
        Self {
            sale_parking_space: 40_000,
            sale_locker: 5_000,
            lease_parking_space: 150,
            lease_locker: 25,
        }
    }
}

/// Per-tenant engine configuration. Owned by tenant administration; the
/// engine only ever reads a snapshot fetched at the start of a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantSettings {
    pub tenant: TenantId,
    pub adjustments: AdjustmentSchedule,
    pub narrative_enabled: bool,
    pub narrative_credential: Option<String>,
}

impl TenantSettings {
    /// Documented fallback applied when the settings store has no row for
    /// the tenant.
    pub fn defaults_for(tenant: TenantId) -> Self {
        Self {
            tenant,
            adjustments: AdjustmentSchedule::default(),
            narrative_enabled: false,
            narrative_credential: None,
        }
    }

    pub fn narrative_credential(&self) -> Option<&str> {
        if !self.narrative_enabled {
            return None;
        }
        self.narrative_credential
            .as_deref()
            .filter(|credential| !credential.trim().is_empty())
    }
}

/// Read interface over the tenant administration store.
pub trait TenantSettingsStore: Send + Sync {
    fn fetch(&self, tenant: &TenantId) -> Result<Option<TenantSettings>, StoreError>;
}

/// Map-backed settings store for the demo binary and tests.
#[derive(Debug, Default, Clone)]
pub struct InMemorySettingsStore {
    entries: Arc<Mutex<HashMap<TenantId, TenantSettings>>>,
}

impl InMemorySettingsStore {
    pub fn upsert(&self, settings: TenantSettings) {
        let mut guard = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.insert(settings.tenant.clone(), settings);
    }
}

impl TenantSettingsStore for InMemorySettingsStore {
    fn fetch(&self, tenant: &TenantId) -> Result<Option<TenantSettings>, StoreError> {
        let guard = self
            .entries
            .lock()
            .map_err(|_| StoreError::Unavailable("settings lock poisoned".to_string()))?;
        Ok(guard.get(tenant).cloned())
    }
}
