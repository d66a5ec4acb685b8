//! Zone selection for new instances.

use std::sync::{Mutex, PoisonError};

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::provider::{Provider, ProviderError};

/// Picks a zone for each new instance.
///
/// An explicit zone is returned as-is. Otherwise the provider's zone list is
/// fetched again and sampled uniformly, so two instances in the same batch
/// may land in different zones.
#[derive(Debug)]
pub struct ZoneSelector {
    rng: Mutex<StdRng>,
}

impl Default for ZoneSelector {
    fn default() -> Self {
        Self::new()
    }
}

impl ZoneSelector {
    /// Creates a selector seeded from the operating system.
    #[must_use]
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Creates a selector with a fixed seed, for reproducible sampling.
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Resolves the zone for one instance.
    ///
    /// # Errors
    ///
    /// Returns the provider's error when listing zones fails, or
    /// [`ProviderError::NoZonesAvailable`] when the listing is empty.
    pub async fn resolve_zone<P: Provider + ?Sized>(
        &self,
        provider: &P,
        explicit: Option<&str>,
    ) -> Result<String, ProviderError> {
        if let Some(zone) = explicit {
            return Ok(zone.to_owned());
        }

        let zones = provider.list_zones().await?;
        self.pick(&zones)
    }

    fn pick(&self, zones: &[String]) -> Result<String, ProviderError> {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        zones
            .choose(&mut *rng)
            .cloned()
            .ok_or(ProviderError::NoZonesAvailable)
    }
}
