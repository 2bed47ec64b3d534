//! Network link management.
//!
//! [`LinkManager::ensure_link_up`] is the only entry point the agent uses.
//! It is a no-op while the link is up; otherwise it starts a connect attempt
//! and waits for it, bounded by a timeout. A timed-out attempt is not fatal:
//! the agent calls again on its next iteration. There is no backoff; the
//! timeout itself throttles the retry cadence.

use std::net::IpAddr;
use std::time::Duration;

use tokio::time::{sleep, Instant};

use crate::{log_debug, log_info, log_warn};
use crate::{Link, LinkConfig, LinkState, Result, UplinkError};

/// Owns the link driver and its connect policy.
pub struct LinkManager {
    link: Box<dyn Link>,
    config: LinkConfig,
}

impl LinkManager {
    // ---
    pub fn new(link: Box<dyn Link>, config: LinkConfig) -> Self {
        Self { link, config }
    }

    /// Current link state as reported by the driver.
    pub fn state(&self) -> LinkState {
        self.link.state()
    }

    /// Address assigned to the device, once up.
    pub fn local_addr(&self) -> Option<IpAddr> {
        self.link.local_addr()
    }

    /// Stable hardware address of the link interface, if known.
    pub fn hardware_address(&self) -> Option<String> {
        self.link.hardware_address()
    }

    /// Ensure the link is up, waiting at most the configured connect timeout.
    pub async fn ensure_link_up(&mut self) -> Result<()> {
        self.ensure_link_up_within(self.config.connect_timeout).await
    }

    /// Ensure the link is up, waiting at most `timeout`.
    ///
    /// Returns immediately with `Ok` when the link is already up. With a
    /// zero timeout a down link fails without waiting.
    ///
    /// # Errors
    ///
    /// [`UplinkError::LinkDown`] if the link did not come up in time.
    pub async fn ensure_link_up_within(&mut self, timeout: Duration) -> Result<()> {
        // ---
        if self.link.state() == LinkState::Up {
            return Ok(());
        }

        log_info!("link: connecting to '{}'", self.config.credentials.ssid);
        self.link.begin(&self.config.credentials);

        let start = Instant::now();
        loop {
            if self.link.state() == LinkState::Up {
                match self.link.local_addr() {
                    Some(addr) => log_info!("link: connected, address {addr}"),
                    None => log_info!("link: connected"),
                }
                return Ok(());
            }

            let elapsed = start.elapsed();
            if elapsed >= timeout {
                log_warn!("link: connect timed out after {timeout:?}");
                return Err(UplinkError::LinkDown);
            }

            log_debug!("link: waiting ({elapsed:?} elapsed)");
            sleep(self.config.poll_interval.min(timeout - elapsed)).await;
        }
    }
}
