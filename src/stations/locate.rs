//! Nearest-station search over the flattened station feed.
//!
//! The feed is small (a few thousand stations) and re-fetched for every
//! top-level call, so the search is a plain linear pass: no spatial index,
//! no shared state, no I/O. Great-circle (haversine) distance is the
//! authoritative metric for all ranking; the planar approximation exists only
//! for coarse pre-filtering.

use crate::stations::error::LocateError;
use crate::types::station::{City, Station};
use ordered_float::OrderedFloat;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Mean Earth radius in kilometers, as used by the haversine metric.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Approximate kilometers per degree of latitude (and of longitude at the
/// equator). Only used to size the bounding-box pre-filter; on the spherical
/// model a degree spans ~111.195 km, so dividing by 111 always yields a
/// slightly generous window.
const KM_PER_DEGREE: f64 = 111.0;

/// Below this, cos(latitude) is treated as zero and the longitude filter is
/// disabled rather than dividing by a vanishing term near the poles.
const MIN_COS_LATITUDE: f64 = 1e-6;

/// Great-circle distance in kilometers between two points given in decimal
/// degrees.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);

    EARTH_RADIUS_KM * 2.0 * a.sqrt().asin()
}

/// Planar distance in raw degrees. Cheaper than [`haversine_km`] but only
/// meaningful for comparing candidates over a small local area; never used
/// for final ranking.
pub fn euclidean_deg(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    ((lat1 - lat2).powi(2) + (lon1 - lon2).powi(2)).sqrt()
}

/// Rectangular pre-filter for radius queries. Sized directly from the degree
/// conversion with no margin subtraction, so it can only over-include, never
/// reject a station the exact haversine test would accept. Longitude is
/// compared as a circular difference, which also keeps the filter correct
/// across the antimeridian.
struct BoundingBox {
    min_lat: f64,
    max_lat: f64,
    center_lon: f64,
    lon_half_width: f64,
}

impl BoundingBox {
    fn around(latitude: f64, longitude: f64, max_km: f64) -> Self {
        let lat_delta = max_km / KM_PER_DEGREE;
        let cos_lat = latitude.to_radians().cos();
        let lon_half_width = if cos_lat <= MIN_COS_LATITUDE {
            180.0
        } else {
            (max_km / (KM_PER_DEGREE * cos_lat)).min(180.0)
        };
        Self {
            min_lat: latitude - lat_delta,
            max_lat: latitude + lat_delta,
            center_lon: longitude,
            lon_half_width,
        }
    }

    fn contains(&self, latitude: f64, longitude: f64) -> bool {
        if latitude < self.min_lat || latitude > self.max_lat {
            return false;
        }
        if self.lon_half_width >= 180.0 {
            return true;
        }
        let delta = (longitude - self.center_lon).rem_euclid(360.0);
        let delta = if delta > 180.0 { 360.0 - delta } else { delta };
        delta <= self.lon_half_width
    }
}

/// Heap entry for the bounded top-k pass. Ordered by distance, then by scan
/// sequence, so the heap's maximum is the farthest retained candidate and,
/// among equal distances, the latest-seen one. Eviction therefore always
/// keeps the earlier encounter.
struct Candidate<'a> {
    distance_km: OrderedFloat<f64>,
    seq: usize,
    station: &'a Station,
}

impl PartialEq for Candidate<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.distance_km == other.distance_km && self.seq == other.seq
    }
}
impl Eq for Candidate<'_> {}
impl PartialOrd for Candidate<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Candidate<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance_km
            .cmp(&other.distance_km)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

/// Pure nearest-station search over one snapshot of the station feed.
///
/// The snapshot is immutable for the locator's lifetime. Stations without
/// usable coordinates stay in the snapshot but are skipped by every query;
/// ties on exactly equal distance resolve to the station seen first in feed
/// order, which keeps results reproducible across runs against the same feed.
#[derive(Debug, Clone)]
pub struct StationLocator {
    stations: Vec<Station>,
}

impl StationLocator {
    pub fn new(stations: Vec<Station>) -> Self {
        Self { stations }
    }

    /// Flattens a city-grouped feed into one search space, preserving feed
    /// encounter order.
    pub fn from_cities(cities: &[City]) -> Self {
        let stations = cities
            .iter()
            .flat_map(|city| city.stations.iter().cloned())
            .collect();
        Self { stations }
    }

    pub fn stations(&self) -> &[Station] {
        &self.stations
    }

    /// Finds the station closest to the query point.
    ///
    /// Errors with [`LocateError::NoValidStations`] when the snapshot is
    /// empty or no station has usable coordinates.
    pub fn find_nearest(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<(&Station, f64), LocateError> {
        let mut best: Option<(&Station, f64)> = None;

        for station in &self.stations {
            let Some((lat, lon)) = station.coords() else {
                continue;
            };
            let distance = haversine_km(latitude, longitude, lat, lon);
            match best {
                // strict comparison: the first station seen at the minimum wins
                Some((_, best_distance)) if distance >= best_distance => {}
                _ => best = Some((station, distance)),
            }
        }

        best.ok_or(LocateError::NoValidStations)
    }

    /// Finds the closest station within `max_km` of the query point.
    ///
    /// `Ok(None)` means the search space was fine but nothing lies in range;
    /// it is a normal outcome, distinct from the empty-feed error.
    pub fn find_nearest_within_radius(
        &self,
        latitude: f64,
        longitude: f64,
        max_km: f64,
    ) -> Result<Option<(&Station, f64)>, LocateError> {
        let bbox = BoundingBox::around(latitude, longitude, max_km);
        let mut saw_valid = false;
        let mut best: Option<(&Station, f64)> = None;

        for station in &self.stations {
            let Some((lat, lon)) = station.coords() else {
                continue;
            };
            saw_valid = true;
            if !bbox.contains(lat, lon) {
                continue;
            }
            let distance = haversine_km(latitude, longitude, lat, lon);
            if distance > max_km {
                continue;
            }
            match best {
                Some((_, best_distance)) if distance >= best_distance => {}
                _ => best = Some((station, distance)),
            }
        }

        if !saw_valid {
            return Err(LocateError::NoValidStations);
        }
        Ok(best)
    }

    /// Finds the `k` stations closest to the query point, ascending by
    /// distance.
    ///
    /// Single pass with a bounded max-heap: O(n log k) instead of a full
    /// sort. Returns fewer than `k` entries when fewer valid stations exist,
    /// an empty vector for `k == 0`, and
    /// [`LocateError::NoValidStations`] when there is nothing to search.
    pub fn find_k_nearest(
        &self,
        latitude: f64,
        longitude: f64,
        k: usize,
    ) -> Result<Vec<(&Station, f64)>, LocateError> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut heap: BinaryHeap<Candidate<'_>> = BinaryHeap::with_capacity(k);
        let mut seq = 0usize;

        for station in &self.stations {
            let Some((lat, lon)) = station.coords() else {
                continue;
            };
            let candidate = Candidate {
                distance_km: OrderedFloat(haversine_km(latitude, longitude, lat, lon)),
                seq,
                station,
            };
            seq += 1;

            if heap.len() < k {
                heap.push(candidate);
            } else if let Some(worst_distance) = heap.peek().map(|c| c.distance_km) {
                // strictly closer only; an equal distance keeps the earlier station
                if candidate.distance_km < worst_distance {
                    heap.pop();
                    heap.push(candidate);
                }
            }
        }

        if heap.is_empty() {
            return Err(LocateError::NoValidStations);
        }

        Ok(heap
            .into_sorted_vec()
            .into_iter()
            .map(|c| (c.station, c.distance_km.into_inner()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn station(id: &str, lat: f64, lon: f64) -> Station {
        Station {
            id: id.to_string(),
            name: id.to_string(),
            latitude: Some(lat),
            longitude: Some(lon),
            live: true,
            avg_aqi: None,
        }
    }

    fn coordless(id: &str) -> Station {
        Station {
            id: id.to_string(),
            name: id.to_string(),
            latitude: None,
            longitude: None,
            live: false,
            avg_aqi: None,
        }
    }

    // Mumbai-area pair plus Delhi, as one compact fixture.
    fn three_stations() -> StationLocator {
        StationLocator::new(vec![
            station("A", 19.0, 72.8),
            station("B", 19.1, 72.9),
            station("C", 28.6, 77.2),
        ])
    }

    #[test]
    fn haversine_is_symmetric_and_zero_on_identity() {
        let (lat1, lon1) = (19.0760, 72.8777);
        let (lat2, lon2) = (28.6139, 77.2090);
        assert_eq!(
            haversine_km(lat1, lon1, lat2, lon2),
            haversine_km(lat2, lon2, lat1, lon1)
        );
        assert_eq!(haversine_km(lat1, lon1, lat1, lon1), 0.0);
    }

    #[test]
    fn haversine_mumbai_to_delhi() {
        let d = haversine_km(19.0760, 72.8777, 28.6139, 77.2090);
        assert!((1100.0..1200.0).contains(&d), "got {d} km");
    }

    #[test]
    fn euclidean_deg_is_planar() {
        assert_eq!(euclidean_deg(0.0, 0.0, 3.0, 4.0), 5.0);
        assert_eq!(euclidean_deg(1.5, -2.0, 1.5, -2.0), 0.0);
    }

    #[test]
    fn nearest_matches_the_true_minimum() {
        let locator = three_stations();
        let (query_lat, query_lon) = (19.05, 72.85);

        let d_a = haversine_km(query_lat, query_lon, 19.0, 72.8);
        let d_b = haversine_km(query_lat, query_lon, 19.1, 72.9);
        // Both are in the 7-8 km range; the winner is whichever is truly closer.
        assert!((7.0..8.0).contains(&d_a));
        assert!((7.0..8.0).contains(&d_b));
        let expected = if d_a <= d_b { "A" } else { "B" };

        let (nearest, distance) = locator.find_nearest(query_lat, query_lon).unwrap();
        assert_eq!(nearest.id, expected);
        assert_eq!(distance, d_a.min(d_b));
    }

    #[test]
    fn nearest_distance_bounds_every_other_station() {
        let locator = three_stations();
        let (_, best) = locator.find_nearest(19.05, 72.85).unwrap();
        for s in locator.stations() {
            let (lat, lon) = s.coords().unwrap();
            assert!(best <= haversine_km(19.05, 72.85, lat, lon) + 1e-12);
        }
    }

    #[test]
    fn empty_feed_is_a_distinct_failure() {
        let locator = StationLocator::new(vec![]);
        assert!(matches!(
            locator.find_nearest(19.0, 72.8),
            Err(LocateError::NoValidStations)
        ));
        assert!(matches!(
            locator.find_k_nearest(19.0, 72.8, 3),
            Err(LocateError::NoValidStations)
        ));
        assert!(matches!(
            locator.find_nearest_within_radius(19.0, 72.8, 50.0),
            Err(LocateError::NoValidStations)
        ));
    }

    #[test]
    fn feed_with_only_invalid_coordinates_is_empty_input() {
        let locator = StationLocator::new(vec![coordless("X"), coordless("Y")]);
        assert!(matches!(
            locator.find_nearest(19.0, 72.8),
            Err(LocateError::NoValidStations)
        ));
    }

    #[test]
    fn invalid_records_are_skipped_not_fatal() {
        let cities: Vec<City> = serde_json::from_value(json!([
            {
                "cityName": "Mumbai",
                "stationsInCity": [
                    {"id": "bad_1", "latitude": "", "longitude": ""},
                    {"id": "good", "latitude": 19.0, "longitude": 72.8},
                    {"id": "bad_2", "latitude": "abc", "longitude": 72.9},
                    {"id": "bad_3", "longitude": 72.9}
                ]
            }
        ]))
        .unwrap();
        let locator = StationLocator::from_cities(&cities);
        let (nearest, _) = locator.find_nearest(19.05, 72.85).unwrap();
        assert_eq!(nearest.id, "good");
        let k = locator.find_k_nearest(19.05, 72.85, 10).unwrap();
        assert_eq!(k.len(), 1);
    }

    #[test]
    fn radius_miss_is_not_found_not_an_error() {
        let locator = three_stations();
        // A and B are ~7-8 km out, so a 1 km radius finds nothing.
        let result = locator.find_nearest_within_radius(19.05, 72.85, 1.0).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn radius_hit_returns_the_closest_in_range() {
        let locator = three_stations();
        let (station, distance) = locator
            .find_nearest_within_radius(19.05, 72.85, 10.0)
            .unwrap()
            .expect("A and B are within 10 km");
        let (nearest, nearest_distance) = locator.find_nearest(19.05, 72.85).unwrap();
        assert_eq!(station.id, nearest.id);
        assert_eq!(distance, nearest_distance);
        assert!(distance <= 10.0);
    }

    #[test]
    fn radius_never_returns_a_station_beyond_it() {
        let locator = three_stations();
        // Delhi (~1150 km away) must not leak through a 1000 km radius even
        // though the Mumbai pair is inside.
        let (station, distance) = locator
            .find_nearest_within_radius(19.05, 72.85, 1000.0)
            .unwrap()
            .unwrap();
        assert!(distance <= 1000.0);
        assert_ne!(station.id, "C");
    }

    #[test]
    fn bounding_box_does_not_clip_near_the_radius_edge() {
        // 0.9 degrees of longitude on the equator is ~100.08 km; a station
        // just inside the radius must survive the pre-filter.
        let locator = StationLocator::new(vec![station("edge", 0.0, 0.9)]);
        let hit = locator
            .find_nearest_within_radius(0.0, 0.0, 100.2)
            .unwrap()
            .expect("station just inside the radius must be found");
        assert_eq!(hit.0.id, "edge");
    }

    #[test]
    fn bounding_box_wraps_across_the_antimeridian() {
        let locator = StationLocator::new(vec![station("far_east", -10.0, -179.95)]);
        let hit = locator
            .find_nearest_within_radius(-10.0, 179.95, 50.0)
            .unwrap()
            .expect("neighbor across the date line is ~11 km away");
        assert_eq!(hit.0.id, "far_east");
    }

    #[test]
    fn radius_search_works_at_the_pole() {
        let locator = StationLocator::new(vec![station("arctic", 89.99, 120.0)]);
        // cos(90 deg) is ~0; the longitude filter must disable itself rather
        // than divide by it.
        let hit = locator
            .find_nearest_within_radius(90.0, 0.0, 5.0)
            .unwrap()
            .expect("station ~1.1 km from the pole");
        assert_eq!(hit.0.id, "arctic");
    }

    #[test]
    fn k_nearest_is_sorted_and_bounded() {
        let locator = three_stations();
        let results = locator.find_k_nearest(19.05, 72.85, 2).unwrap();
        assert_eq!(results.len(), 2);
        assert!(results[0].1 <= results[1].1);
        let ids: Vec<&str> = results.iter().map(|(s, _)| s.id.as_str()).collect();
        assert!(ids.contains(&"A") && ids.contains(&"B"));
        assert!(!ids.contains(&"C"));
    }

    #[test]
    fn k_nearest_head_agrees_with_find_nearest() {
        let locator = three_stations();
        let results = locator.find_k_nearest(19.05, 72.85, 3).unwrap();
        let (nearest, distance) = locator.find_nearest(19.05, 72.85).unwrap();
        assert_eq!(results[0].0.id, nearest.id);
        assert_eq!(results[0].1, distance);
    }

    #[test]
    fn k_larger_than_feed_returns_everything() {
        let locator = three_stations();
        let results = locator.find_k_nearest(19.05, 72.85, 10).unwrap();
        assert_eq!(results.len(), 3);
        assert!(results.windows(2).all(|w| w[0].1 <= w[1].1));
    }

    #[test]
    fn k_zero_is_an_empty_sequence() {
        let locator = three_stations();
        assert!(locator.find_k_nearest(19.05, 72.85, 0).unwrap().is_empty());
        // Even over an empty feed: nothing was asked for, nothing is missing.
        let empty = StationLocator::new(vec![]);
        assert!(empty.find_k_nearest(19.05, 72.85, 0).unwrap().is_empty());
    }

    #[test]
    fn equal_distances_resolve_to_feed_order() {
        // Four stations all exactly one degree from the query point.
        let locator = StationLocator::new(vec![
            station("east", 0.0, 1.0),
            station("west", 0.0, -1.0),
            station("north", 1.0, 0.0),
            station("south", -1.0, 0.0),
        ]);

        let (nearest, _) = locator.find_nearest(0.0, 0.0).unwrap();
        assert_eq!(nearest.id, "east");

        let top2 = locator.find_k_nearest(0.0, 0.0, 2).unwrap();
        let ids: Vec<&str> = top2.iter().map(|(s, _)| s.id.as_str()).collect();
        assert_eq!(ids, ["east", "west"]);

        let in_range = locator
            .find_nearest_within_radius(0.0, 0.0, 200.0)
            .unwrap()
            .unwrap();
        assert_eq!(in_range.0.id, "east");
    }

    #[test]
    fn from_cities_flattens_in_feed_order() {
        let cities = vec![
            City {
                name: "Mumbai".into(),
                id: "c1".into(),
                state_id: "mh".into(),
                stations: vec![station("m1", 19.0, 72.8), station("m2", 19.1, 72.9)],
            },
            City {
                name: "Delhi".into(),
                id: "c2".into(),
                state_id: "dl".into(),
                stations: vec![station("d1", 28.6, 77.2)],
            },
        ];
        let locator = StationLocator::from_cities(&cities);
        let ids: Vec<&str> = locator.stations().iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, ["m1", "m2", "d1"]);
    }
}
