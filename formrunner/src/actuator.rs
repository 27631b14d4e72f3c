//! The capability interface commands are dispatched to.

use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use crate::errors::ActuatorError;

/// Performs classified commands against a live form.
///
/// Identifiers are the resolved element ids from the mapping table. Every
/// call completes before the interpreter advances to the next cell.
#[async_trait]
pub trait Actuator: Send + Sync {
    async fn click(&self, id: &str) -> Result<(), ActuatorError>;

    async fn radio_click(&self, id: &str) -> Result<(), ActuatorError>;

    /// Select the bank card whose number ends in `tail`.
    async fn select_card(&self, tail: &str) -> Result<(), ActuatorError>;

    async fn fill_subject_amount(&self, id: &str, value: &str) -> Result<(), ActuatorError>;

    /// `value` is already encoded through the dropdown mapping table.
    async fn select_dropdown(&self, id: &str, value: &str) -> Result<(), ActuatorError>;

    async fn select_date(&self, id: &str, value: &str) -> Result<(), ActuatorError>;

    async fn plain_fill(&self, id: &str, value: &str) -> Result<(), ActuatorError>;

    async fn press_enter(&self) -> Result<(), ActuatorError>;

    async fn wait(&self, seconds: f64) -> Result<(), ActuatorError> {
        tokio::time::sleep(wait_duration(seconds)?).await;
        Ok(())
    }
}

/// Convert a wait in seconds, rejecting values a `Duration` cannot hold.
pub(crate) fn wait_duration(seconds: f64) -> Result<Duration, ActuatorError> {
    Duration::try_from_secs_f64(seconds)
        .map_err(|e| ActuatorError::Rejected(format!("wait of {seconds}s: {e}")))
}

/// Logs every command and reports success without touching a browser.
#[derive(Debug, Clone, Default)]
pub struct DryRunActuator {
    /// Skip real sleeps for wait commands.
    pub skip_waits: bool,
}

impl DryRunActuator {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Actuator for DryRunActuator {
    async fn click(&self, id: &str) -> Result<(), ActuatorError> {
        info!(id, "[dry-run] click");
        Ok(())
    }

    async fn radio_click(&self, id: &str) -> Result<(), ActuatorError> {
        info!(id, "[dry-run] radio click");
        Ok(())
    }

    async fn select_card(&self, tail: &str) -> Result<(), ActuatorError> {
        info!(tail, "[dry-run] select card");
        Ok(())
    }

    async fn fill_subject_amount(&self, id: &str, value: &str) -> Result<(), ActuatorError> {
        info!(id, value, "[dry-run] fill subject amount");
        Ok(())
    }

    async fn select_dropdown(&self, id: &str, value: &str) -> Result<(), ActuatorError> {
        info!(id, value, "[dry-run] select dropdown");
        Ok(())
    }

    async fn select_date(&self, id: &str, value: &str) -> Result<(), ActuatorError> {
        info!(id, value, "[dry-run] select date");
        Ok(())
    }

    async fn plain_fill(&self, id: &str, value: &str) -> Result<(), ActuatorError> {
        info!(id, value, "[dry-run] fill");
        Ok(())
    }

    async fn press_enter(&self) -> Result<(), ActuatorError> {
        info!("[dry-run] press enter");
        Ok(())
    }

    async fn wait(&self, seconds: f64) -> Result<(), ActuatorError> {
        info!(seconds, "[dry-run] wait");
        let duration = wait_duration(seconds)?;
        if !self.skip_waits {
            tokio::time::sleep(duration).await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_dry_run_wait_sleeps() {
        let actuator = DryRunActuator::new();
        let started = tokio::time::Instant::now();
        actuator.wait(2.5).await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(2500));
    }

    #[tokio::test]
    async fn test_dry_run_always_succeeds() {
        let actuator = DryRunActuator { skip_waits: true };
        assert!(actuator.click("submit").await.is_ok());
        assert!(actuator.select_dropdown("pay", "10").await.is_ok());
        assert!(actuator.wait(30.0).await.is_ok());
    }

    #[tokio::test]
    async fn test_unrepresentable_wait_is_rejected() {
        let actuator = DryRunActuator { skip_waits: true };
        assert!(matches!(
            actuator.wait(1e20).await,
            Err(ActuatorError::Rejected(_))
        ));
        assert!(actuator.wait(f64::NAN).await.is_err());
    }
}
