//! Shapes the city-grouped station feed into polars `DataFrame`s: one row per
//! station, a per-city summary, or a coordinates table for mapping.

use crate::types::aqi::AqiCategory;
use crate::types::station::City;
use polars::prelude::*;

/// Flattens the feed into one row per station. Stations without usable
/// coordinates keep their row; the coordinate columns are null.
pub fn stations_frame(cities: &[City]) -> PolarsResult<DataFrame> {
    let total: usize = cities.iter().map(|c| c.stations.len()).sum();
    let mut city_name = Vec::with_capacity(total);
    let mut city_id = Vec::with_capacity(total);
    let mut state_id = Vec::with_capacity(total);
    let mut station_id = Vec::with_capacity(total);
    let mut station_name = Vec::with_capacity(total);
    let mut longitude: Vec<Option<f64>> = Vec::with_capacity(total);
    let mut latitude: Vec<Option<f64>> = Vec::with_capacity(total);
    let mut live = Vec::with_capacity(total);
    let mut avg_aqi: Vec<Option<f64>> = Vec::with_capacity(total);

    for city in cities {
        for station in &city.stations {
            city_name.push(city.name.as_str());
            city_id.push(city.id.as_str());
            state_id.push(city.state_id.as_str());
            station_id.push(station.id.as_str());
            station_name.push(station.name.as_str());
            longitude.push(station.longitude);
            latitude.push(station.latitude);
            live.push(station.live);
            avg_aqi.push(station.avg_aqi);
        }
    }

    df!(
        "city_name" => city_name,
        "city_id" => city_id,
        "state_id" => state_id,
        "station_id" => station_id,
        "station_name" => station_name,
        "longitude" => longitude,
        "latitude" => latitude,
        "live" => live,
        "avg_aqi" => avg_aqi,
    )
}

/// Aggregates the feed per city: station counts, live share, and AQI
/// statistics over live stations that report a value.
pub fn city_summary_frame(cities: &[City]) -> PolarsResult<DataFrame> {
    let n = cities.len();
    let mut city_name = Vec::with_capacity(n);
    let mut city_id = Vec::with_capacity(n);
    let mut state_id = Vec::with_capacity(n);
    let mut total_stations = Vec::with_capacity(n);
    let mut live_stations = Vec::with_capacity(n);
    let mut offline_stations = Vec::with_capacity(n);
    let mut live_percentage = Vec::with_capacity(n);
    let mut avg_aqi: Vec<Option<f64>> = Vec::with_capacity(n);
    let mut min_aqi: Vec<Option<f64>> = Vec::with_capacity(n);
    let mut max_aqi: Vec<Option<f64>> = Vec::with_capacity(n);
    let mut stations_with_data = Vec::with_capacity(n);

    for city in cities {
        let total = city.stations.len();
        let live = city.stations.iter().filter(|s| s.live).count();
        let values: Vec<f64> = city
            .stations
            .iter()
            .filter(|s| s.live)
            .filter_map(|s| s.avg_aqi)
            .collect();

        city_name.push(city.name.as_str());
        city_id.push(city.id.as_str());
        state_id.push(city.state_id.as_str());
        total_stations.push(total as u32);
        live_stations.push(live as u32);
        offline_stations.push((total - live) as u32);
        live_percentage.push(if total > 0 {
            live as f64 / total as f64 * 100.0
        } else {
            0.0
        });
        avg_aqi.push(if values.is_empty() {
            None
        } else {
            Some(values.iter().sum::<f64>() / values.len() as f64)
        });
        min_aqi.push(values.iter().copied().reduce(f64::min));
        max_aqi.push(values.iter().copied().reduce(f64::max));
        stations_with_data.push(values.len() as u32);
    }

    df!(
        "city_name" => city_name,
        "city_id" => city_id,
        "state_id" => state_id,
        "total_stations" => total_stations,
        "live_stations" => live_stations,
        "offline_stations" => offline_stations,
        "live_percentage" => live_percentage,
        "avg_aqi" => avg_aqi,
        "min_aqi" => min_aqi,
        "max_aqi" => max_aqi,
        "stations_with_data" => stations_with_data,
    )
}

/// A mapping-oriented table: only stations with usable coordinates, with a
/// status label and the AQI category of the current reading.
pub fn coordinates_frame(cities: &[City]) -> PolarsResult<DataFrame> {
    let mut station_id = Vec::new();
    let mut station_name = Vec::new();
    let mut city_name = Vec::new();
    let mut state_id = Vec::new();
    let mut longitude = Vec::new();
    let mut latitude = Vec::new();
    let mut live = Vec::new();
    let mut avg_aqi: Vec<Option<f64>> = Vec::new();
    let mut status = Vec::new();
    let mut aqi_category = Vec::new();

    for city in cities {
        for station in &city.stations {
            let Some((lat, lon)) = station.coords() else {
                continue;
            };
            station_id.push(station.id.as_str());
            station_name.push(station.name.as_str());
            city_name.push(city.name.as_str());
            state_id.push(city.state_id.as_str());
            longitude.push(lon);
            latitude.push(lat);
            live.push(station.live);
            avg_aqi.push(station.avg_aqi);
            status.push(if station.live { "Live" } else { "Offline" });
            aqi_category.push(
                station
                    .avg_aqi
                    .map_or("No Data", |v| AqiCategory::from_value(v).label()),
            );
        }
    }

    df!(
        "station_id" => station_id,
        "station_name" => station_name,
        "city_name" => city_name,
        "state_id" => state_id,
        "longitude" => longitude,
        "latitude" => latitude,
        "live" => live,
        "avg_aqi" => avg_aqi,
        "status" => status,
        "aqi_category" => aqi_category,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::station::Station;

    fn feed() -> Vec<City> {
        vec![
            City {
                name: "Mumbai".into(),
                id: "city_1".into(),
                state_id: "mh".into(),
                stations: vec![
                    Station {
                        id: "site_1".into(),
                        name: "Bandra".into(),
                        latitude: Some(19.04),
                        longitude: Some(72.86),
                        live: true,
                        avg_aqi: Some(92.0),
                    },
                    Station {
                        id: "site_2".into(),
                        name: "Colaba".into(),
                        latitude: None,
                        longitude: None,
                        live: true,
                        avg_aqi: Some(110.0),
                    },
                    Station {
                        id: "site_3".into(),
                        name: "Worli".into(),
                        latitude: Some(19.01),
                        longitude: Some(72.82),
                        live: false,
                        avg_aqi: None,
                    },
                ],
            },
            City {
                name: "Shillong".into(),
                id: "city_2".into(),
                state_id: "ml".into(),
                stations: vec![],
            },
        ]
    }

    #[test]
    fn stations_frame_keeps_every_row() {
        let frame = stations_frame(&feed()).unwrap();
        assert_eq!(frame.shape(), (3, 9));
        assert_eq!(
            frame.get_column_names(),
            [
                "city_name",
                "city_id",
                "state_id",
                "station_id",
                "station_name",
                "longitude",
                "latitude",
                "live",
                "avg_aqi"
            ]
        );
        // Coordinate-less stations stay, with nulls.
        assert_eq!(frame.column("latitude").unwrap().null_count(), 1);
    }

    #[test]
    fn city_summary_aggregates_live_readings() {
        let frame = city_summary_frame(&feed()).unwrap();
        assert_eq!(frame.shape(), (2, 11));

        let total = frame.column("total_stations").unwrap().u32().unwrap();
        assert_eq!(total.get(0), Some(3));
        assert_eq!(total.get(1), Some(0));

        let live_pct = frame.column("live_percentage").unwrap().f64().unwrap();
        assert!((live_pct.get(0).unwrap() - 66.666).abs() < 0.01);
        assert_eq!(live_pct.get(1), Some(0.0));

        // Only live stations with data contribute: (92 + 110) / 2.
        let avg = frame.column("avg_aqi").unwrap().f64().unwrap();
        assert_eq!(avg.get(0), Some(101.0));
        assert_eq!(avg.get(1), None);

        let with_data = frame.column("stations_with_data").unwrap().u32().unwrap();
        assert_eq!(with_data.get(0), Some(2));
    }

    #[test]
    fn coordinates_frame_drops_invalid_and_labels() {
        let frame = coordinates_frame(&feed()).unwrap();
        assert_eq!(frame.shape(), (2, 10));

        let status = frame.column("status").unwrap().str().unwrap();
        assert_eq!(status.get(0), Some("Live"));
        assert_eq!(status.get(1), Some("Offline"));

        let category = frame.column("aqi_category").unwrap().str().unwrap();
        assert_eq!(category.get(0), Some("Satisfactory"));
        assert_eq!(category.get(1), Some("No Data"));
    }
}
