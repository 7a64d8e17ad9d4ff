use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// CDS dataset identifier for ERA5 on pressure levels.
pub const DATASET: &str = "reanalysis-era5-pressure-levels";

/// All 37 ERA5 pressure levels, in millibars.
pub const PRESSURE_LEVELS: [&str; 37] = [
    "1", "2", "3", "5", "7", "10", "20", "30", "50", "70", "100", "125", "150", "175", "200",
    "225", "250", "300", "350", "400", "450", "500", "550", "600", "650", "700", "750", "775",
    "800", "825", "850", "875", "900", "925", "950", "975", "1000",
];

/// Which humidity field to download next to geopotential and temperature.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Humidity {
    Relative,
    #[default]
    Specific,
}

impl Humidity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Humidity::Relative => "relative_humidity",
            Humidity::Specific => "specific_humidity",
        }
    }
}

impl fmt::Display for Humidity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Humidity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "relative_humidity" => Ok(Humidity::Relative),
            "specific_humidity" => Ok(Humidity::Specific),
            other => Err(Error::validation(format!(
                "humidity parameter must be 'relative_humidity' or 'specific_humidity', got '{}'",
                other
            ))),
        }
    }
}

/// Request body sent to the CDS for one ERA5 pressure-level snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PressureLevelRequest {
    pub product_type: &'static str,
    pub format: &'static str,
    pub variable: Vec<&'static str>,
    pub pressure_level: Vec<&'static str>,
    /// `YYYY-MM-DD`
    pub date: String,
    /// `HH:00`
    pub time: String,
    /// `north/west/south/east`; absent means the full globe.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub area: Option<String>,
}

impl PressureLevelRequest {
    pub(crate) fn new(date: String, time: String, humidity: Humidity) -> Self {
        Self {
            product_type: "reanalysis",
            format: "netcdf",
            variable: vec!["geopotential", "temperature", humidity.as_str()],
            pressure_level: PRESSURE_LEVELS.to_vec(),
            date,
            time,
            area: None,
        }
    }
}
