//! Airport and aircraft reference data.

use crate::error::LookupError;
use crate::models::{AircraftProfile, Airport, Coordinate};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Lookup of static reference entities by code.
pub trait ReferenceData: Send + Sync {
    fn airport(&self, code: &str) -> Result<Airport, LookupError>;
    fn aircraft(&self, model: &str) -> Result<AircraftProfile, LookupError>;
}

/// Serialized catalog shape, e.g. loaded from a JSON file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogFile {
    #[serde(default)]
    pub airports: Vec<Airport>,
    #[serde(default)]
    pub aircraft: Vec<AircraftProfile>,
}

/// In-memory catalog keyed by upper-cased code.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    airports: HashMap<String, Airport>,
    aircraft: HashMap<String, AircraftProfile>,
}

impl Catalog {
    pub fn from_file(file: CatalogFile) -> Self {
        let mut catalog = Self::default();
        for airport in file.airports {
            catalog.insert_airport(airport);
        }
        for profile in file.aircraft {
            catalog.insert_aircraft(profile);
        }
        catalog
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let file: CatalogFile = serde_json::from_str(json)?;
        Ok(Self::from_file(file))
    }

    /// Built-in catalog with the domestic Indian network and three common types.
    pub fn builtin() -> Self {
        let airports = [
            ("DEL", "Indira Gandhi International", "Delhi", 28.5562, 77.1000, 237.0),
            ("BOM", "Chhatrapati Shivaji Maharaj International", "Mumbai", 19.0896, 72.8656, 11.0),
            ("BLR", "Kempegowda International", "Bengaluru", 13.1986, 77.7066, 915.0),
            ("MAA", "Chennai International", "Chennai", 12.9941, 80.1709, 16.0),
            ("CCU", "Netaji Subhas Chandra Bose International", "Kolkata", 22.6547, 88.4467, 5.0),
            ("HYD", "Rajiv Gandhi International", "Hyderabad", 17.2403, 78.4294, 617.0),
        ];
        let aircraft = [
            ("A320", 840.0, 24_210.0, 2_500.0),
            ("B737-800", 842.0, 26_020.0, 2_600.0),
            ("ATR-72", 511.0, 5_000.0, 800.0),
        ];

        let file = CatalogFile {
            airports: airports
                .into_iter()
                .map(|(code, name, city, lat, lon, elevation_m)| Airport {
                    code: code.to_string(),
                    name: name.to_string(),
                    city: city.to_string(),
                    location: Coordinate::new(lat, lon),
                    elevation_m,
                    timezone: "Asia/Kolkata".to_string(),
                })
                .collect(),
            aircraft: aircraft
                .into_iter()
                .map(|(model, cruise_speed_kmh, fuel_capacity_l, fuel_burn_lph)| AircraftProfile {
                    model: model.to_string(),
                    cruise_speed_kmh,
                    fuel_capacity_l,
                    fuel_burn_lph,
                })
                .collect(),
        };
        Self::from_file(file)
    }

    pub fn insert_airport(&mut self, airport: Airport) {
        self.airports.insert(normalize_code(&airport.code), airport);
    }

    pub fn insert_aircraft(&mut self, profile: AircraftProfile) {
        self.aircraft.insert(normalize_code(&profile.model), profile);
    }

    pub fn airports(&self) -> Vec<Airport> {
        let mut all: Vec<Airport> = self.airports.values().cloned().collect();
        all.sort_by(|a, b| a.code.cmp(&b.code));
        all
    }

    pub fn aircraft_profiles(&self) -> Vec<AircraftProfile> {
        let mut all: Vec<AircraftProfile> = self.aircraft.values().cloned().collect();
        all.sort_by(|a, b| a.model.cmp(&b.model));
        all
    }
}

impl ReferenceData for Catalog {
    fn airport(&self, code: &str) -> Result<Airport, LookupError> {
        self.airports
            .get(&normalize_code(code))
            .cloned()
            .ok_or_else(|| LookupError::UnknownAirport(code.to_string()))
    }

    fn aircraft(&self, model: &str) -> Result<AircraftProfile, LookupError> {
        self.aircraft
            .get(&normalize_code(model))
            .cloned()
            .ok_or_else(|| LookupError::UnknownAircraft(model.to_string()))
    }
}

fn normalize_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_lookup_is_case_insensitive() {
        let catalog = Catalog::builtin();
        let del = catalog.airport("del").expect("DEL present");
        assert_eq!(del.location, Coordinate::new(28.5562, 77.1000));
        let a320 = catalog.aircraft("a320").expect("A320 present");
        assert_eq!(a320.fuel_capacity_l, 24_210.0);
    }

    #[test]
    fn test_unknown_codes_are_lookup_failures() {
        let catalog = Catalog::builtin();
        assert_eq!(
            catalog.airport("XXX"),
            Err(LookupError::UnknownAirport("XXX".to_string()))
        );
        assert!(matches!(
            catalog.aircraft("Concorde"),
            Err(LookupError::UnknownAircraft(_))
        ));
    }

    #[test]
    fn test_catalog_from_json() {
        let json = r#"{
            "airports": [
                {"code": "GOI", "name": "Dabolim", "location": {"lat": 15.3808, "lon": 73.8314}}
            ],
            "aircraft": [
                {"model": "Q400", "cruise_speed_kmh": 667.0, "fuel_capacity_l": 6526.0, "fuel_burn_lph": 1000.0}
            ]
        }"#;
        let catalog = Catalog::from_json(json).expect("valid catalog");
        assert_eq!(catalog.airport("goi").map(|a| a.name), Ok("Dabolim".to_string()));
        assert!(catalog.aircraft("Q400").is_ok());
        assert!(catalog.airport("DEL").is_err());
    }
}
