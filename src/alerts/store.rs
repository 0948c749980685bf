use crate::alerts::types::{Alert, NewAlert};
use crate::error::AppError;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, PartialEq)]
pub enum PendingMutation {
    Toggled { id: u64, previous_enabled: bool },
    Deleted { index: usize, alert: Alert },
    Created { provisional_id: u64 },
}

#[derive(Debug)]
pub struct AlertBook {
    alerts: Vec<Alert>,
    next_provisional_id: u64,
}

impl Default for AlertBook {
    fn default() -> Self {
        Self {
            alerts: Vec::new(),
            next_provisional_id: u64::MAX,
        }
    }
}

impl AlertBook {
    pub fn alerts(&self) -> &[Alert] {
        &self.alerts
    }

    pub fn replace_all(&mut self, alerts: Vec<Alert>) {
        self.alerts = alerts;
    }

    fn position(&self, id: u64) -> Result<usize, AppError> {
        self.alerts
            .iter()
            .position(|alert| alert.id == id)
            .ok_or_else(|| AppError::InvalidArgument(format!("alert {id} not found")))
    }

    pub fn apply_toggle(&mut self, id: u64, enabled: bool) -> Result<PendingMutation, AppError> {
        let index = self.position(id)?;
        let previous_enabled = self.alerts[index].enabled;
        self.alerts[index].enabled = enabled;
        Ok(PendingMutation::Toggled {
            id,
            previous_enabled,
        })
    }

    pub fn apply_delete(&mut self, id: u64) -> Result<PendingMutation, AppError> {
        let index = self.position(id)?;
        let alert = self.alerts.remove(index);
        Ok(PendingMutation::Deleted { index, alert })
    }

    pub fn apply_create(&mut self, new_alert: &NewAlert, now: DateTime<Utc>) -> (Alert, PendingMutation) {
        let provisional_id = self.next_provisional_id;
        self.next_provisional_id = self.next_provisional_id.saturating_sub(1);

        let alert = new_alert.provisional(provisional_id, now);
        self.alerts.push(alert.clone());
        (alert, PendingMutation::Created { provisional_id })
    }

    pub fn confirm_created(&mut self, provisional_id: u64, created: Alert) {
        match self.alerts.iter().position(|alert| alert.id == provisional_id) {
            Some(index) => self.alerts[index] = created,
            None if !self.alerts.iter().any(|alert| alert.id == created.id) => {
                self.alerts.push(created)
            }
            None => {}
        }
    }

    pub fn rollback(&mut self, pending: PendingMutation) {
        match pending {
            PendingMutation::Toggled {
                id,
                previous_enabled,
            } => {
                if let Some(alert) = self.alerts.iter_mut().find(|alert| alert.id == id) {
                    alert.enabled = previous_enabled;
                }
            }
            PendingMutation::Deleted { index, alert } => {
                // A refresh may already have brought the row back.
                if !self.alerts.iter().any(|existing| existing.id == alert.id) {
                    let index = index.min(self.alerts.len());
                    self.alerts.insert(index, alert);
                }
            }
            PendingMutation::Created { provisional_id } => {
                self.alerts.retain(|alert| alert.id != provisional_id);
            }
        }
    }
}
