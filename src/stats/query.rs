//! Search and listing options
//!
//! Typed options for the search endpoints and the form fields they encode to.
//! The backend uses `-1` for "any" on numeric filters and `1`/`0` for
//! checkboxes; every encoder fills in the full field set the search pages send.

use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;

use super::request::{field, FormData};
use crate::PageWindow;

/// Backend value for "no filter"
pub const ANY: i64 = -1;

/// Common sort fields
pub mod sort_fields {
    /// Session start time
    pub const START_TIME: &str = "start_time";
    /// Championship points
    pub const POINTS: &str = "points";
    /// iRating
    pub const IRATING: &str = "irating";
    /// Display name
    pub const DISPLAY_NAME: &str = "displayname";
    /// Finishing position
    pub const FINISH_POSITION: &str = "finishing_position";
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Ascending
    Asc,
    /// Descending
    #[default]
    Desc,
}

impl SortOrder {
    /// Form value
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

/// Sort field and direction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortOptions {
    /// Column to sort by
    pub sort: String,
    /// Direction
    pub order: SortOrder,
}

impl Default for SortOptions {
    fn default() -> Self {
        Self::by(sort_fields::START_TIME)
    }
}

impl SortOptions {
    /// Sort by `sort` in `order`
    pub fn new(sort: impl Into<String>, order: SortOrder) -> Self {
        Self {
            sort: sort.into(),
            order,
        }
    }

    /// Sort by `sort`, descending
    pub fn by(sort: impl Into<String>) -> Self {
        Self::new(sort, SortOrder::Desc)
    }

    fn push(&self, data: &mut FormData) {
        data.push(field("sort", &self.sort));
        data.push(field("order", self.order.as_str()));
    }
}

/// Racing category used by charts and searches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum ChartCategory {
    /// Oval
    Oval,
    /// Road
    #[default]
    Road,
    /// Dirt oval
    DirtOval,
    /// Dirt road
    DirtRoad,
}

impl ChartCategory {
    /// Backend category id
    pub fn id(&self) -> u8 {
        match self {
            ChartCategory::Oval => 1,
            ChartCategory::Road => 2,
            ChartCategory::DirtOval => 3,
            ChartCategory::DirtRoad => 4,
        }
    }
}

impl fmt::Display for ChartCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ChartCategory::Oval => "oval",
            ChartCategory::Road => "road",
            ChartCategory::DirtOval => "dirt-oval",
            ChartCategory::DirtRoad => "dirt-road",
        })
    }
}

impl FromStr for ChartCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "oval" | "1" => Ok(ChartCategory::Oval),
            "road" | "2" => Ok(ChartCategory::Road),
            "dirt-oval" | "3" => Ok(ChartCategory::DirtOval),
            "dirt-road" | "4" => Ok(ChartCategory::DirtRoad),
            other => Err(format!(
                "unknown category {other:?} (expected oval, road, dirt-oval or dirt-road)"
            )),
        }
    }
}

/// Hosted session filters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionOptions {
    /// Host display name
    pub host: Option<String>,
    /// Session name
    pub name: Option<String>,
}

impl SessionOptions {
    /// Filter by host
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Filter by session name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Hosted results form for one page
    pub fn form(
        &self,
        date_range: Option<(DateTime<Utc>, DateTime<Utc>)>,
        sort: &SortOptions,
        window: PageWindow,
    ) -> FormData {
        let mut data = FormData::new();
        sort.push(&mut data);
        data.push(field("lowerBound", window.lower));
        data.push(field("upperBound", window.upper));

        if let Some(host) = &self.host {
            data.push(field("sessionhost", host));
        }
        if let Some(name) = &self.name {
            data.push(field("sessionname", name));
        }
        if let Some((start, end)) = date_range {
            data.push(field("starttime_lowerbound", start.timestamp_millis()));
            data.push(field("starttime_upperbound", end.timestamp_millis()));
        }
        data
    }
}

/// Season standings filters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeasonOptions {
    /// Car class id
    pub car_class: i64,
    /// Club id
    pub club: i64,
    /// Race week (0-based)
    pub race_week: i64,
    /// Division
    pub division: i64,
}

impl Default for SeasonOptions {
    fn default() -> Self {
        Self {
            car_class: ANY,
            club: ANY,
            race_week: ANY,
            division: ANY,
        }
    }
}

impl SeasonOptions {
    /// Season standings form for one page
    pub fn form(&self, season: i64, sort: &SortOptions, window: PageWindow) -> FormData {
        let mut data = FormData::new();
        sort.push(&mut data);
        data.push(field("seasonid", season));
        data.push(field("carclassid", self.car_class));
        data.push(field("clubid", self.club));
        data.push(field("raceweek", self.race_week));
        data.push(field("division", self.division));
        data.push(field("start", window.lower));
        data.push(field("end", window.upper));
        data
    }
}

/// Driver search filters
#[derive(Debug, Clone, PartialEq)]
pub struct DriverSearchQuery {
    /// Name (or part of one)
    pub name: Option<String>,
    /// Category the ratings refer to
    pub category: ChartCategory,
    /// Country code
    pub country: Option<String>,
    /// Only friends
    pub friends_only: bool,
    /// Only watched drivers
    pub watched_only: bool,
    /// Only drivers seen recently
    pub recent_only: bool,
    /// Only active members
    pub active_only: bool,
    /// License class range (inclusive)
    pub license_class: Option<(i64, i64)>,
    /// iRating range (inclusive)
    pub irating: Option<(i64, i64)>,
    /// TT rating range (inclusive)
    pub tt_rating: Option<(i64, i64)>,
    /// Average incidents range (inclusive)
    pub avg_incidents: Option<(f64, f64)>,
    /// Sorting
    pub sort: SortOptions,
}

impl Default for DriverSearchQuery {
    fn default() -> Self {
        Self {
            name: None,
            category: ChartCategory::Road,
            country: None,
            friends_only: false,
            watched_only: false,
            recent_only: false,
            active_only: true,
            license_class: None,
            irating: None,
            tt_rating: None,
            avg_incidents: None,
            sort: SortOptions::by(sort_fields::IRATING),
        }
    }
}

impl DriverSearchQuery {
    /// Search by name
    pub fn by_name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Form for one page, searched as `customer_id`
    pub fn form(&self, customer_id: i64, window: PageWindow) -> FormData {
        let mut data = FormData::new();
        data.push(field("search", self.name.as_deref().unwrap_or("null")));
        data.push(field("friend", flag(self.friends_only)));
        data.push(field("watched", flag(self.watched_only)));
        data.push(field("country", self.country.as_deref().unwrap_or("null")));
        data.push(field("recent", flag(self.recent_only)));
        data.push(field("category", self.category.id()));
        push_range(&mut data, "class", self.license_class);
        push_range(&mut data, "irating", self.irating);
        push_range(&mut data, "ttrating", self.tt_rating);
        match self.avg_incidents {
            Some((low, high)) => {
                data.push(field("avgincidentslow", low));
                data.push(field("avgincidentshigh", high));
            }
            None => {
                data.push(field("avgincidentslow", ANY));
                data.push(field("avgincidentshigh", ANY));
            }
        }
        data.push(field("custid", customer_id));
        data.push(field("lowerbound", window.lower));
        data.push(field("upperbound", window.upper));
        self.sort.push(&mut data);
        data.push(field("active", if self.active_only { 1 } else { 0 }));
        data
    }
}

/// Results archive filters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultsQuery {
    /// Categories to include
    pub categories: Vec<ChartCategory>,
    /// Include races
    pub races: bool,
    /// Include qualifying sessions
    pub qualifying: bool,
    /// Include time trials
    pub time_trials: bool,
    /// Include open practice
    pub practice: bool,
    /// Only official sessions
    pub official_only: bool,
    /// Season year and quarter
    pub season: Option<(i32, u8)>,
    /// Race week (0-based)
    pub race_week: Option<u8>,
    /// Session start window
    pub date_range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    /// Car id
    pub car_id: Option<i64>,
    /// Track id
    pub track_id: Option<i64>,
    /// Sorting
    pub sort: SortOptions,
}

impl Default for ResultsQuery {
    fn default() -> Self {
        Self {
            categories: vec![ChartCategory::Road],
            races: true,
            qualifying: false,
            time_trials: false,
            practice: false,
            official_only: true,
            season: None,
            race_week: None,
            date_range: None,
            car_id: None,
            track_id: None,
            sort: SortOptions::default(),
        }
    }
}

impl ResultsQuery {
    /// Form for one page of `customer_id`'s results
    pub fn form(&self, customer_id: i64, window: PageWindow) -> FormData {
        let mut data = FormData::new();
        data.push(field("custid", customer_id));
        data.push(field("showraces", checkbox(self.races)));
        data.push(field("showquals", checkbox(self.qualifying)));
        data.push(field("showtts", checkbox(self.time_trials)));
        data.push(field("showops", checkbox(self.practice)));
        data.push(field("showofficial", 1));
        data.push(field("showunofficial", checkbox(!self.official_only)));
        for license in [
            "showrookie",
            "showclassd",
            "showclassc",
            "showclassb",
            "showclassa",
            "showpro",
            "showprowc",
        ] {
            data.push(field(license, 1));
        }
        for category in &self.categories {
            data.push(field("category[]", category.id()));
        }
        if let Some((year, quarter)) = self.season {
            data.push(field("seasonyear", year));
            data.push(field("seasonquarter", quarter));
        }
        if let Some(week) = self.race_week {
            data.push(field("raceweek", week));
        }
        if let Some((start, end)) = self.date_range {
            data.push(field("starttime_low", start.timestamp_millis()));
            data.push(field("starttime_high", end.timestamp_millis()));
        }
        if let Some(car) = self.car_id {
            data.push(field("carid", car));
        }
        if let Some(track) = self.track_id {
            data.push(field("trackid", track));
        }
        data.push(field("lowerbound", window.lower));
        data.push(field("upperbound", window.upper));
        self.sort.push(&mut data);
        data.push(field("format", "json"));
        data
    }
}

fn flag(enabled: bool) -> i64 {
    if enabled {
        1
    } else {
        ANY
    }
}

fn checkbox(enabled: bool) -> u8 {
    u8::from(enabled)
}

fn push_range(data: &mut FormData, name: &str, range: Option<(i64, i64)>) {
    let (low, high) = range.unwrap_or((ANY, ANY));
    data.push(field(&format!("{name}low"), low));
    data.push(field(&format!("{name}high"), high));
}
