//! Target resolution: ask the places service for venues near a coordinate and
//! pick one under a selection policy.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tracing::{debug, info};

use crate::config::PlacesConfig;
use crate::error::{PlacesError, ResolutionError};
use crate::geo::Coordinate;
use crate::model::Venue;

/// Which candidate to pick from a distance-ranked list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Selection {
    /// First entry (the nearest).
    Nearest,
    /// Uniformly random entry.
    Random,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RankBy {
    Distance,
}

impl RankBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            RankBy::Distance => "distance",
        }
    }
}

/// A nearby search request.
#[derive(Clone, Debug, PartialEq)]
pub struct PlacesQuery {
    pub origin: Coordinate,
    pub rank_by: RankBy,
    pub open_now: bool,
    pub category: String,
}

#[async_trait]
pub trait PlacesService: Send + Sync {
    /// Venues near `query.origin`, in the service's ranking order.
    async fn nearby_search(&self, query: &PlacesQuery) -> Result<Vec<Venue>, PlacesError>;
}

pub struct TargetResolver {
    places: Arc<dyn PlacesService>,
    category: String,
    open_now: bool,
    timeout: Duration,
}

impl TargetResolver {
    pub fn new(places: Arc<dyn PlacesService>, config: &PlacesConfig) -> Self {
        Self {
            places,
            category: config.category.clone(),
            open_now: config.open_now,
            timeout: config.timeout(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn query(&self, origin: Coordinate) -> PlacesQuery {
        PlacesQuery {
            origin,
            rank_by: RankBy::Distance,
            open_now: self.open_now,
            category: self.category.clone(),
        }
    }

    /// Resolve a target near `origin`. No retries: a failure is reported to the
    /// caller, who decides whether to try again.
    pub async fn resolve(
        &self,
        origin: Coordinate,
        selection: Selection,
    ) -> Result<Venue, ResolutionError> {
        let query = self.query(origin);
        debug!("Searching for {} near {}", query.category, origin);

        let candidates = tokio::time::timeout(self.timeout, self.places.nearby_search(&query))
            .await
            .map_err(|_| ResolutionError::Timeout(self.timeout))??;

        debug!("{} candidates", candidates.len());
        let venue = select(candidates, selection, &mut rand::thread_rng())?;
        info!("Resolved target: {} ({:?})", venue, selection);
        Ok(venue)
    }
}

/// Pick one venue from a distance-ranked list.
pub fn select<R: Rng>(
    mut candidates: Vec<Venue>,
    selection: Selection,
    rng: &mut R,
) -> Result<Venue, ResolutionError> {
    if candidates.is_empty() {
        return Err(ResolutionError::NoCandidates);
    }

    let index = match selection {
        Selection::Nearest => 0,
        Selection::Random => rng.gen_range(0..candidates.len()),
    };
    Ok(candidates.swap_remove(index))
}
