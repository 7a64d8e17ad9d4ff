use era5_fetch::{DownloadOptions, Humidity, Polygon, download_era5};

fn main() -> Result<(), era5_fetch::Error> {
    // Needs a CDS token in ~/.cdsapirc (or the file named by CDSAPI_RC).
    let grand_mesa = Polygon::new(vec![
        (-108.3, 38.9),
        (-107.8, 38.9),
        (-107.8, 39.2),
        (-108.3, 39.2),
        (-108.3, 38.9),
    ]);

    let options = DownloadOptions::default()
        .with_subset(grand_mesa)
        .with_humidity(Humidity::Relative)
        .with_line_of_sight(true);

    let path = download_era5("2020-02-12T18:00", ".", &options)?;
    println!("{}", path.display());
    Ok(())
}
