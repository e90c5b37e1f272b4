//! Track domain model.
//!
//! # Responsibility
//! - Define the canonical record for a named geographic route.
//! - Derive route length from waypoints.
//!
//! # Invariants
//! - `id` is stable across renames and moves; it is never derived from
//!   `parents` or `name`.
//! - Length is always computed from `waypoints`, never stored separately.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable track identifier.
///
/// Kept as a string alias because journal entries may reference ids that no
/// longer (or never did) resolve to a live track.
pub type TrackId = String;

const EARTH_RADIUS_KM: f64 = 6371.8;

/// One geographic point of a track.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// Canonical track record as persisted by the primary store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: TrackId,
    pub name: String,
    /// Ordered ancestor folder names, outermost first.
    #[serde(default)]
    pub parents: Vec<String>,
    #[serde(default)]
    pub waypoints: Vec<Coordinates>,
    #[serde(default)]
    pub comment: String,
}

impl Track {
    /// Creates a track with a freshly generated stable id.
    pub fn new(name: impl Into<String>, parents: Vec<String>) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), name, parents)
    }

    /// Creates a track with a caller-provided id.
    pub fn with_id(id: impl Into<TrackId>, name: impl Into<String>, parents: Vec<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            parents,
            waypoints: Vec::new(),
            comment: String::new(),
        }
    }

    /// Route length in whole meters.
    pub fn length(&self) -> u32 {
        waypoints_length(&self.waypoints)
    }
}

/// Sums haversine distances between consecutive waypoints, in whole meters.
pub fn waypoints_length(waypoints: &[Coordinates]) -> u32 {
    let kilometers: f64 = waypoints
        .windows(2)
        .map(|pair| haversine_km(pair[0], pair[1]))
        .sum();
    (kilometers * 1000.0) as u32
}

fn haversine_km(from: Coordinates, to: Coordinates) -> f64 {
    let lat1 = from.latitude.to_radians();
    let lat2 = to.latitude.to_radians();
    let d_lat = lat2 - lat1;
    let d_lon = (to.longitude - from.longitude).to_radians();

    let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_KM * c
}

#[cfg(test)]
mod tests {
    use super::{waypoints_length, Coordinates, Track};

    #[test]
    fn length_of_empty_or_single_point_route_is_zero() {
        assert_eq!(waypoints_length(&[]), 0);
        assert_eq!(waypoints_length(&[Coordinates::new(49.0, 9.0)]), 0);
    }

    #[test]
    fn length_sums_consecutive_segments() {
        // One hundredth of a degree of latitude is roughly 1112 meters.
        let route = [
            Coordinates::new(49.00, 9.0),
            Coordinates::new(49.01, 9.0),
            Coordinates::new(49.02, 9.0),
        ];
        let length = waypoints_length(&route);
        assert!((2220..=2230).contains(&length), "unexpected length {length}");
    }

    #[test]
    fn new_tracks_get_distinct_ids() {
        let a = Track::new("Loop", vec![]);
        let b = Track::new("Loop", vec![]);
        assert_ne!(a.id, b.id);
    }
}
