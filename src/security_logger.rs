//! Security-focused logging module to track authentication events

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Types of security events to track
#[derive(Debug, Clone)]
pub enum SecurityEvent {
    // Provisioning events
    AccountProvisioned { user_id: String },
    ProvisioningRejected { reasons: usize },

    // Authentication events
    AuthenticationFailed { user_id: Option<String>, reason: String },
    AuthenticationSuccess { user_id: String },
    TokensIssued { user_id: String, access_jti: String, refresh_jti: String },
    IssuanceFailed { user_id: String, error: String },
    SignedOut { user_id: String, tokens_removed: usize },

    // Token checks
    TokenValidationFailed { reason: String },
    TokenRevoked { user_id: String, token_id: String },

    // System security
    ConfigurationError { component: String, error: String },
}

impl SecurityEvent {
    /// Counter key for this kind of event
    fn key(&self) -> &'static str {
        match self {
            SecurityEvent::AccountProvisioned { .. } => "account_provisioned",
            SecurityEvent::ProvisioningRejected { .. } => "provisioning_rejected",
            SecurityEvent::AuthenticationFailed { .. } => "auth_failed",
            SecurityEvent::AuthenticationSuccess { .. } => "auth_success",
            SecurityEvent::TokensIssued { .. } => "tokens_issued",
            SecurityEvent::IssuanceFailed { .. } => "issuance_failed",
            SecurityEvent::SignedOut { .. } => "signed_out",
            SecurityEvent::TokenValidationFailed { .. } => "token_validation_failed",
            SecurityEvent::TokenRevoked { .. } => "token_revoked",
            SecurityEvent::ConfigurationError { .. } => "config_error",
        }
    }
}

/// Security event with timestamp
#[derive(Debug, Clone)]
struct TimestampedEvent {
    event: SecurityEvent,
    timestamp: Instant,
}

/// Security logger for tracking and alerting on security events
pub struct SecurityLogger {
    events: Arc<RwLock<Vec<TimestampedEvent>>>,
    event_counts: Arc<RwLock<HashMap<String, usize>>>,
    alert_counts: Arc<RwLock<HashMap<String, usize>>>,
    max_events: usize,
    alert_thresholds: HashMap<String, usize>,
}

impl SecurityLogger {
    /// Create a new security logger
    pub fn new() -> Self {
        let mut alert_thresholds = HashMap::new();
        alert_thresholds.insert("auth_failed".to_string(), 5);
        alert_thresholds.insert("token_validation_failed".to_string(), 10);
        alert_thresholds.insert("token_revoked".to_string(), 5);
        alert_thresholds.insert("issuance_failed".to_string(), 1);
        alert_thresholds.insert("config_error".to_string(), 1);

        Self {
            events: Arc::new(RwLock::new(Vec::new())),
            event_counts: Arc::new(RwLock::new(HashMap::new())),
            alert_counts: Arc::new(RwLock::new(HashMap::new())),
            max_events: 10000,
            alert_thresholds,
        }
    }

    /// Log a security event
    pub async fn log_event(&self, event: SecurityEvent) {
        let event_key = event.key();

        {
            let mut events = self.events.write().await;
            events.push(TimestampedEvent {
                event: event.clone(),
                timestamp: Instant::now(),
            });

            // Limit memory usage
            if events.len() > self.max_events {
                let events_to_remove = events.len() - self.max_events;
                events.drain(0..events_to_remove);
            }
        }

        {
            let mut counts = self.event_counts.write().await;
            *counts.entry(event_key.to_string()).or_insert(0) += 1;
        }

        // Alert counters reset after each alert, totals above do not
        if let Some(&threshold) = self.alert_thresholds.get(event_key) {
            let mut pending = self.alert_counts.write().await;
            let count = pending.entry(event_key.to_string()).or_insert(0);
            *count += 1;
            if *count >= threshold {
                self.trigger_alert(event_key, *count, &event);
                *count = 0;
            }
        }

        match event {
            SecurityEvent::AccountProvisioned { user_id } => {
                log::info!("SECURITY: Account provisioned - User: {}", user_id);
            }
            SecurityEvent::ProvisioningRejected { reasons } => {
                log::info!("SECURITY: Account provisioning rejected - {} reason(s)", reasons);
            }
            SecurityEvent::AuthenticationFailed { user_id, reason } => {
                log::warn!("SECURITY: Authentication failed - User: {:?}, Reason: {}", user_id, reason);
            }
            SecurityEvent::AuthenticationSuccess { user_id } => {
                log::info!("SECURITY: Authentication success - User: {}", user_id);
            }
            SecurityEvent::TokensIssued { user_id, access_jti, refresh_jti } => {
                log::info!(
                    "SECURITY: Token pair issued - User: {}, Access: {}, Refresh: {}",
                    user_id, access_jti, refresh_jti
                );
            }
            SecurityEvent::IssuanceFailed { user_id, error } => {
                log::error!("SECURITY: Token issuance failed - User: {}, Error: {}", user_id, error);
            }
            SecurityEvent::SignedOut { user_id, tokens_removed } => {
                log::info!("SECURITY: Signed out - User: {}, Tokens removed: {}", user_id, tokens_removed);
            }
            SecurityEvent::TokenValidationFailed { reason } => {
                log::warn!("SECURITY: Token validation failed - Reason: {}", reason);
            }
            SecurityEvent::TokenRevoked { user_id, token_id } => {
                log::warn!("SECURITY: Revoked token presented - User: {}, Token: {}", user_id, token_id);
            }
            SecurityEvent::ConfigurationError { component, error } => {
                log::error!("SECURITY: Configuration error - Component: {}, Error: {}", component, error);
            }
        }
    }

    fn trigger_alert(&self, event_type: &str, count: usize, sample_event: &SecurityEvent) {
        log::error!("SECURITY ALERT: {} events of type '{}' detected", count, event_type);
        log::error!("Sample event: {:?}", sample_event);
    }

    /// Get recent security events
    pub async fn get_recent_events(&self, duration: Duration) -> Vec<SecurityEvent> {
        let events = self.events.read().await;
        let now = Instant::now();

        events
            .iter()
            .filter(|event| now.duration_since(event.timestamp) <= duration)
            .map(|event| event.event.clone())
            .collect()
    }

    /// Total number of events per kind since start-up
    pub async fn get_event_stats(&self) -> HashMap<String, usize> {
        self.event_counts.read().await.clone()
    }

    /// Clean up old events
    pub async fn cleanup_old_events(&self, max_age: Duration) {
        let mut events = self.events.write().await;
        let now = Instant::now();

        events.retain(|event| now.duration_since(event.timestamp) <= max_age);
    }

    /// Start periodic cleanup task
    pub fn start_cleanup_task(self: Arc<Self>) {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(300)); // Every 5 minutes
            loop {
                interval.tick().await;
                self.cleanup_old_events(Duration::from_secs(3600 * 24)).await; // Keep 24 hours
            }
        });
    }
}

impl Default for SecurityLogger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_events_are_counted() {
        let logger = SecurityLogger::new();
        for _ in 0..7 {
            logger
                .log_event(SecurityEvent::AuthenticationFailed {
                    user_id: None,
                    reason: "invalid_credentials".to_string(),
                })
                .await;
        }
        logger
            .log_event(SecurityEvent::AuthenticationSuccess { user_id: "u1".to_string() })
            .await;

        let stats = logger.get_event_stats().await;
        assert_eq!(stats.get("auth_failed"), Some(&7));
        assert_eq!(stats.get("auth_success"), Some(&1));
        assert_eq!(logger.get_recent_events(Duration::from_secs(60)).await.len(), 8);
    }

    #[tokio::test]
    async fn test_cleanup_drops_old_events() {
        let logger = SecurityLogger::new();
        logger
            .log_event(SecurityEvent::SignedOut { user_id: "u1".to_string(), tokens_removed: 2 })
            .await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        logger.cleanup_old_events(Duration::from_millis(1)).await;
        assert!(logger.get_recent_events(Duration::from_secs(60)).await.is_empty());
    }
}
