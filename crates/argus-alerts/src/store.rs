//! In-memory alert store with CRUD used by the engine and the REST API.

use std::collections::HashMap;

use chrono::Utc;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use argus_core::{
    canonicalize, Alert, AlertType, IndicatorCondition, IndicatorName, PriceCondition,
};

use crate::error::{AlertError, Result};

/// Creation payload (REST body).
#[derive(Debug, Clone, Deserialize)]
pub struct AlertDraft {
    pub symbol: String,
    pub alert_type: AlertType,
    pub price_threshold: Option<Decimal>,
    pub price_condition: Option<PriceCondition>,
    pub indicator_name: Option<IndicatorName>,
    pub indicator_condition: Option<IndicatorCondition>,
    pub indicator_value: Option<f64>,
    pub description: Option<String>,
}

/// Partial update payload (REST PATCH body).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AlertPatch {
    pub enabled: Option<bool>,
    pub price_threshold: Option<Decimal>,
    pub price_condition: Option<PriceCondition>,
    pub indicator_value: Option<f64>,
    pub description: Option<String>,
}

/// Concurrent alert store.
#[derive(Default)]
pub struct AlertStore {
    alerts: RwLock<HashMap<String, Alert>>,
}

impl AlertStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an alert after validating type-dependent fields.
    pub fn create(&self, draft: AlertDraft) -> Result<Alert> {
        let now = Utc::now();
        let alert = Alert {
            id: Uuid::new_v4().to_string(),
            symbol: canonicalize(&draft.symbol),
            alert_type: draft.alert_type,
            price_threshold: draft.price_threshold,
            price_condition: draft.price_condition,
            indicator_name: draft.indicator_name,
            indicator_condition: draft.indicator_condition,
            indicator_value: draft.indicator_value,
            enabled: true,
            triggered: false,
            triggered_at: None,
            description: draft.description,
            created_at: now,
            updated_at: now,
        };
        alert.validate()?;
        self.alerts.write().insert(alert.id.clone(), alert.clone());
        Ok(alert)
    }

    pub fn get(&self, id: &str) -> Result<Alert> {
        self.alerts
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| AlertError::NotFound(id.to_string()))
    }

    /// List alerts, optionally filtered by canonical symbol.
    #[must_use]
    pub fn list(&self, symbol: Option<&str>) -> Vec<Alert> {
        let symbol = symbol.map(canonicalize);
        let mut alerts: Vec<Alert> = self
            .alerts
            .read()
            .values()
            .filter(|a| symbol.as_deref().map_or(true, |s| a.symbol == s))
            .cloned()
            .collect();
        alerts.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        alerts
    }

    /// Apply a partial update. Re-validates the result.
    pub fn update(&self, id: &str, patch: AlertPatch) -> Result<Alert> {
        let mut alerts = self.alerts.write();
        let alert = alerts
            .get_mut(id)
            .ok_or_else(|| AlertError::NotFound(id.to_string()))?;

        if let Some(enabled) = patch.enabled {
            alert.enabled = enabled;
        }
        if let Some(threshold) = patch.price_threshold {
            alert.price_threshold = Some(threshold);
        }
        if let Some(condition) = patch.price_condition {
            alert.price_condition = Some(condition);
        }
        if let Some(value) = patch.indicator_value {
            alert.indicator_value = Some(value);
        }
        if let Some(description) = patch.description {
            alert.description = Some(description);
        }
        alert.updated_at = Utc::now();
        alert.validate()?;
        Ok(alert.clone())
    }

    pub fn delete(&self, id: &str) -> Result<()> {
        self.alerts
            .write()
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| AlertError::NotFound(id.to_string()))
    }

    /// Snapshot of alerts the engine should evaluate this tick.
    #[must_use]
    pub fn evaluation_snapshot(&self) -> Vec<Alert> {
        self.alerts
            .read()
            .values()
            .filter(|a| a.enabled && !a.triggered)
            .cloned()
            .collect()
    }

    /// Triggered alerts eligible for rearm at `cutoff` seconds.
    #[must_use]
    pub fn rearm_candidates(&self, cooloff_secs: u64) -> Vec<String> {
        let cutoff = Utc::now() - chrono::Duration::seconds(cooloff_secs as i64);
        self.alerts
            .read()
            .values()
            .filter(|a| a.triggered && a.triggered_at.is_some_and(|t| t < cutoff))
            .map(|a| a.id.clone())
            .collect()
    }

    /// Mark an alert triggered. Missing alerts (deleted mid-tick) are
    /// ignored.
    pub fn mark_triggered(&self, id: &str) {
        if let Some(alert) = self.alerts.write().get_mut(id) {
            alert.mark_triggered(Utc::now());
        }
    }

    /// Rearm a triggered alert.
    pub fn rearm(&self, id: &str) {
        if let Some(alert) = self.alerts.write().get_mut(id) {
            alert.rearm(Utc::now());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn draft() -> AlertDraft {
        AlertDraft {
            symbol: "btc".to_string(),
            alert_type: AlertType::Price,
            price_threshold: Some(dec!(50000)),
            price_condition: Some(PriceCondition::Above),
            indicator_name: None,
            indicator_condition: None,
            indicator_value: None,
            description: None,
        }
    }

    #[test]
    fn test_create_canonicalizes_symbol() {
        let store = AlertStore::new();
        let alert = store.create(draft()).unwrap();
        assert_eq!(alert.symbol, "BTC/USDT");
        assert!(alert.enabled);
        assert!(!alert.triggered);
    }

    #[test]
    fn test_create_rejects_incomplete_price_alert() {
        let store = AlertStore::new();
        let mut d = draft();
        d.price_condition = None;
        assert!(store.create(d).is_err());
    }

    #[test]
    fn test_list_filters_by_symbol() {
        let store = AlertStore::new();
        store.create(draft()).unwrap();
        let mut eth = draft();
        eth.symbol = "ETH/USDT".to_string();
        store.create(eth).unwrap();

        assert_eq!(store.list(None).len(), 2);
        assert_eq!(store.list(Some("BTC")).len(), 1);
        assert_eq!(store.list(Some("ETH/USDT")).len(), 1);
    }

    #[test]
    fn test_triggered_excluded_from_snapshot() {
        let store = AlertStore::new();
        let alert = store.create(draft()).unwrap();
        assert_eq!(store.evaluation_snapshot().len(), 1);
        store.mark_triggered(&alert.id);
        assert!(store.evaluation_snapshot().is_empty());
    }

    #[test]
    fn test_update_disable() {
        let store = AlertStore::new();
        let alert = store.create(draft()).unwrap();
        store
            .update(
                &alert.id,
                AlertPatch {
                    enabled: Some(false),
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(store.evaluation_snapshot().is_empty());
    }

    #[test]
    fn test_delete_missing_is_not_found() {
        let store = AlertStore::new();
        assert!(matches!(
            store.delete("missing"),
            Err(AlertError::NotFound(_))
        ));
    }
}
