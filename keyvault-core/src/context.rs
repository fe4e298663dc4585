//! Shared per-portfolio state handed to wallets and accounts.

use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

use crate::storage::Storage;

/// Handle shared by a vault and every wallet and account derived from it.
///
/// The storage reference lives as long as its longest holder. No holder may
/// assume exclusive access to it.
pub struct PortfolioContext {
    storage: Arc<dyn Storage>,
    portfolio_id: Uuid,
}

impl PortfolioContext {
    /// Bundles `storage` with the id of the portfolio that owns it.
    #[must_use]
    pub fn new(storage: Arc<dyn Storage>, portfolio_id: Uuid) -> Arc<Self> {
        Arc::new(Self {
            storage,
            portfolio_id,
        })
    }

    /// The shared storage port.
    #[must_use]
    pub fn storage(&self) -> &dyn Storage {
        self.storage.as_ref()
    }

    /// Id of the owning portfolio.
    #[must_use]
    pub const fn portfolio_id(&self) -> Uuid {
        self.portfolio_id
    }
}

impl fmt::Debug for PortfolioContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PortfolioContext")
            .field("portfolio_id", &self.portfolio_id)
            .finish_non_exhaustive()
    }
}
