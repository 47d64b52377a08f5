//! Reference tables scraped from the member home page
//!
//! The login response embeds seven static lookup tables as script variables.
//! [`ReferenceCache::populate`] extracts all of them once; a cache value only
//! exists if every table parsed, so lookups never see a missing category.

use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, error};

use super::scrape::{extract_var, ScrapeError};

/// Reference table category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceCategory {
    /// Tracks and configurations
    Tracks,
    /// Cars
    Cars,
    /// Car classes
    CarClass,
    /// Clubs
    Club,
    /// Seasons
    Season,
    /// Divisions
    Division,
    /// Available years and quarters
    YearAndQuarter,
}

impl ReferenceCategory {
    /// Every category, in population order
    pub const ALL: [ReferenceCategory; 7] = [
        ReferenceCategory::Tracks,
        ReferenceCategory::Cars,
        ReferenceCategory::CarClass,
        ReferenceCategory::Club,
        ReferenceCategory::Season,
        ReferenceCategory::Division,
        ReferenceCategory::YearAndQuarter,
    ];

    /// Category key
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferenceCategory::Tracks => "tracks",
            ReferenceCategory::Cars => "cars",
            ReferenceCategory::CarClass => "car_class",
            ReferenceCategory::Club => "club",
            ReferenceCategory::Season => "season",
            ReferenceCategory::Division => "division",
            ReferenceCategory::YearAndQuarter => "year_and_quarter",
        }
    }

    /// Script variable holding the table
    pub fn variable(&self) -> &'static str {
        match self {
            ReferenceCategory::Tracks => "TrackListing",
            ReferenceCategory::Cars => "CarListing",
            ReferenceCategory::CarClass => "CarClassListing",
            ReferenceCategory::Club => "ClubListing",
            ReferenceCategory::Season => "SeasonListing",
            ReferenceCategory::Division => "DivisionListing",
            ReferenceCategory::YearAndQuarter => "YearAndQuarterListing",
        }
    }
}

impl fmt::Display for ReferenceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReferenceCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == key)
            .ok_or_else(|| {
                let known: Vec<_> = Self::ALL.iter().map(|c| c.as_str()).collect();
                format!("unknown reference category {s:?} (expected one of {})", known.join(", "))
            })
    }
}

/// A reference table failed to load
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("failed to load {category} reference table: {source}")]
pub struct ReferenceError {
    /// Category that failed
    pub category: ReferenceCategory,
    /// Scrape failure
    #[source]
    pub source: ScrapeError,
}

/// All seven reference tables
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceCache {
    tracks: Value,
    cars: Value,
    car_class: Value,
    club: Value,
    season: Value,
    division: Value,
    year_and_quarter: Value,
}

impl ReferenceCache {
    /// Extract every table from the home page body
    ///
    /// # Errors
    /// Returns [`ReferenceError`] for the first table that is missing or does not
    /// parse; the failure is also logged with its category
    pub fn populate(body: &str) -> Result<Self, ReferenceError> {
        let load = |category: ReferenceCategory| {
            extract_var(body, category.variable())
                .map(|table| {
                    debug!(category = %category, entries = table_len(&table), "Loaded reference table");
                    table
                })
                .map_err(|source| {
                    error!(category = %category, error = %source, "Failed to parse reference table");
                    ReferenceError { category, source }
                })
        };

        Ok(Self {
            tracks: load(ReferenceCategory::Tracks)?,
            cars: load(ReferenceCategory::Cars)?,
            car_class: load(ReferenceCategory::CarClass)?,
            club: load(ReferenceCategory::Club)?,
            season: load(ReferenceCategory::Season)?,
            division: load(ReferenceCategory::Division)?,
            year_and_quarter: load(ReferenceCategory::YearAndQuarter)?,
        })
    }

    /// Table for `category`
    pub fn get(&self, category: ReferenceCategory) -> &Value {
        match category {
            ReferenceCategory::Tracks => &self.tracks,
            ReferenceCategory::Cars => &self.cars,
            ReferenceCategory::CarClass => &self.car_class,
            ReferenceCategory::Club => &self.club,
            ReferenceCategory::Season => &self.season,
            ReferenceCategory::Division => &self.division,
            ReferenceCategory::YearAndQuarter => &self.year_and_quarter,
        }
    }

    /// Tracks table
    pub fn tracks(&self) -> &Value {
        &self.tracks
    }

    /// Cars table
    pub fn cars(&self) -> &Value {
        &self.cars
    }

    /// Seasons table
    pub fn seasons(&self) -> &Value {
        &self.season
    }

    /// Whether `car_id` appears in the cars table
    ///
    /// The table is either a list of objects with an `id` field or an object
    /// keyed by id.
    pub fn has_car(&self, car_id: i64) -> bool {
        match &self.cars {
            Value::Array(cars) => cars
                .iter()
                .any(|car| car.get("id").and_then(Value::as_i64) == Some(car_id)),
            Value::Object(cars) => cars.contains_key(&car_id.to_string()),
            _ => false,
        }
    }
}

fn table_len(table: &Value) -> usize {
    match table {
        Value::Array(a) => a.len(),
        Value::Object(o) => o.len(),
        _ => 1,
    }
}
