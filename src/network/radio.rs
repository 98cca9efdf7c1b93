//! Radio boundary.

use async_trait::async_trait;

use crate::error::Result;
use crate::network::NetworkCandidate;

/// The WiFi station driver.
///
/// Implementations perform the actual association. The selector bounds
/// every call with its own timeout, so implementations may block as long
/// as the hardware does.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WifiRadio: Send + Sync {
    /// Associate with `candidate`. An `Err` is an explicit rejection.
    async fn associate(&self, candidate: &NetworkCandidate) -> Result<()>;

    /// Drop the current association, if any.
    async fn disassociate(&self) -> Result<()>;

    /// Whether the radio still has a working link.
    async fn is_link_up(&self) -> bool;
}
