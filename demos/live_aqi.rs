use vayuayan::{LatLon, Vayuayan, VayuayanError};

#[tokio::main]
async fn main() -> Result<(), VayuayanError> {
    let client = Vayuayan::new().await?;

    let snapshot = client
        .live_aqi()
        .location(LatLon(28.6139, 77.2090))
        .call()
        .await?;

    println!("Live AQI for station {}", snapshot.station_id);
    println!("{:<10} {:>6} {:>6} {:>6}  period", "pollutant", "avg", "min", "max");
    for metric in &snapshot.metrics {
        println!(
            "{:<10} {:>6} {:>6} {:>6}  {}",
            metric.name,
            metric.avg.map_or("-".to_string(), |v| v.to_string()),
            metric.min.map_or("-".to_string(), |v| v.to_string()),
            metric.max.map_or("-".to_string(), |v| v.to_string()),
            metric.avg_desc
        );
    }

    Ok(())
}
