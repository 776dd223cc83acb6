use vayuayan::{LatLon, Vayuayan, VayuayanError};

#[tokio::main]
async fn main() -> Result<(), VayuayanError> {
    let client = Vayuayan::new().await?;
    let mumbai = LatLon(19.0760, 72.8777);

    let (station, distance) = client
        .nearest_station()
        .location(mumbai)
        .call()
        .await?;
    println!(
        "Nearest station: {} ({}), {:.1} km away",
        station.name, station.id, distance
    );

    let top5 = client
        .k_nearest_stations()
        .location(mumbai)
        .call()
        .await?;
    for (station, distance) in top5 {
        println!("  {:>6.1} km  {}", distance, station.name);
    }

    Ok(())
}
