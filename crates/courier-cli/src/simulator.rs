//! SimulatedSender - stand-in transport for dry runs.

use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use courier_core::domain::{Recipient, SendError};
use courier_core::ports::MessageSender;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::time::sleep;
use tracing::debug;

use crate::config::SimulatorConfig;

/// Pretends to send: waits `latency`, rejects `blocked_phones`, and fails a
/// `failure_rate` share of the rest with a transient error.
pub struct SimulatedSender {
    failure_rate: f64,
    blocked_phones: HashSet<String>,
    latency: Duration,
    rng: Mutex<StdRng>,
}

impl SimulatedSender {
    pub fn new(config: &SimulatorConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            failure_rate: probability(config.failure_rate),
            blocked_phones: config.blocked_phones.iter().cloned().collect(),
            latency: Duration::from_millis(config.latency_ms),
            rng: Mutex::new(rng),
        }
    }

    fn roll_failure(&self) -> bool {
        self.rng
            .lock()
            .map(|mut rng| rng.gen_bool(self.failure_rate))
            .unwrap_or(false)
    }
}

/// `gen_bool` panics outside `[0, 1]`; NaN reads as "never fail".
fn probability(rate: f64) -> f64 {
    if rate.is_nan() {
        0.0
    } else {
        rate.clamp(0.0, 1.0)
    }
}

#[async_trait]
impl MessageSender for SimulatedSender {
    async fn send(&self, recipient: &Recipient, message: &str) -> Result<(), SendError> {
        sleep(self.latency).await;

        if self.blocked_phones.contains(&recipient.phone) {
            return Err(SendError::new(format!(
                "invalid number: {} is not on WhatsApp",
                recipient.phone
            )));
        }
        if self.roll_failure() {
            return Err(SendError::new("simulated timeout waiting for chat to load"));
        }
        debug!(phone = %recipient.phone, len = message.len(), "simulated send");
        Ok(())
    }
}
