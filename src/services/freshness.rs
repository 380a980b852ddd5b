//! Freshness policy for cached observations.
//!
//! Kept as a pure predicate with an explicit staleness parameter: the
//! threshold has been tuned before (5 vs 10 minutes) and the read path's
//! serve/refetch/fallback choreography is easier to test with the decision
//! isolated from I/O.

use chrono::{DateTime, Duration, Utc};

use crate::db::models::Observation;

/// Decide whether a cached observation is too old to serve.
///
/// True when no cached observation exists or its age strictly exceeds
/// `staleness`; an observation aged exactly `staleness` is still fresh.
pub fn should_refetch(
    cached: Option<&Observation>,
    now: DateTime<Utc>,
    staleness: Duration,
) -> bool {
    match cached {
        None => true,
        Some(obs) => now - obs.captured_at > staleness,
    }
}
