//! Endpoint registry
//!
//! Every backend call is described by one [`EndpointSpec`] constant: where it
//! lives, how it is sent, how its body is decoded and what happens when that
//! fails. Facade methods only choose an endpoint and its form data; the rest
//! is data in this module.
//!
//! # Response shapes
//!
//! - [`DecodeMode::Text`] - HTML or script text (login page, series stats page)
//! - [`DecodeMode::Json`] - JSON returned as-is
//! - [`DecodeMode::Columnar`] - `{"m": ..., "d": ...}` envelope zipped into records

/// Backend host used when no base URL is configured
pub const DEFAULT_BASE_URL: &str = "https://members.iracing.com";

/// Where the row list sits inside a columnar envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowLocation {
    /// Rows under `d.r`, totals as sibling fields of `r`
    Nested,
    /// `d` is the row list itself
    Direct,
}

/// Drop the caller's own row from a search result
///
/// The driver search endpoint puts the searching member first in every result
/// page, ahead of the actual matches, and reports the match count in a
/// different field when it does. This is backend behaviour, not something the
/// query asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelfRowRule {
    /// Column holding the row's customer id
    pub customer_id_column: &'static str,
    /// Field of `d` holding the total once the self row is dropped
    pub alternate_total_field: &'static str,
}

/// Layout of a columnar envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnarLayout {
    /// Row list location
    pub rows: RowLocation,
    /// Field of `d` holding the total; `None` counts the decoded rows
    pub total_field: Option<&'static str>,
    /// Self-row exclusion, for endpoints that need it
    pub self_row: Option<SelfRowRule>,
}

impl ColumnarLayout {
    /// Rows under `d.r` without a total field
    pub const fn nested() -> Self {
        Self {
            rows: RowLocation::Nested,
            total_field: None,
            self_row: None,
        }
    }

    /// `d` is the row list
    pub const fn direct() -> Self {
        Self {
            rows: RowLocation::Direct,
            total_field: None,
            self_row: None,
        }
    }

    /// Read the total from `field` of `d`
    pub const fn with_total(mut self, field: &'static str) -> Self {
        self.total_field = Some(field);
        self
    }

    /// Apply a self-row rule
    pub const fn with_self_row(mut self, rule: SelfRowRule) -> Self {
        self.self_row = Some(rule);
        self
    }
}

/// How a response body is decoded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeMode {
    /// Body returned as text
    Text,
    /// Body parsed as JSON
    Json,
    /// Body parsed as a columnar envelope
    Columnar(ColumnarLayout),
}

/// What a failed call produces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Every failure reaches the caller
    IdentityCritical,
    /// Decode and HTTP status failures become an empty page; timeouts,
    /// network errors and shutdown still reach the caller
    Enumeration,
}

/// Static description of one backend endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointSpec {
    /// Label for logs and metrics
    pub name: &'static str,
    /// Path below the base URL
    pub path: &'static str,
    /// Response decoding
    pub decode: DecodeMode,
    /// Failure handling
    pub policy: FailurePolicy,
    /// Form data is URL-encoded into the path; always GET
    pub embed_in_path: bool,
    /// Send form data as a query string instead of a POST body
    pub use_get: bool,
    /// Backend URL-encodes text values (`+` and `%xx`) in this response
    pub unescape_text: bool,
    /// Login handshake: credentials in the body, never logged
    pub login: bool,
}

impl EndpointSpec {
    const fn json(name: &'static str, path: &'static str) -> Self {
        Self {
            name,
            path,
            decode: DecodeMode::Json,
            policy: FailurePolicy::IdentityCritical,
            embed_in_path: false,
            use_get: false,
            unescape_text: false,
            login: false,
        }
    }

    const fn columnar(name: &'static str, path: &'static str, layout: ColumnarLayout) -> Self {
        let mut spec = Self::json(name, path);
        spec.decode = DecodeMode::Columnar(layout);
        spec
    }

    const fn text(name: &'static str, path: &'static str) -> Self {
        let mut spec = Self::json(name, path);
        spec.decode = DecodeMode::Text;
        spec
    }

    const fn in_path(mut self) -> Self {
        self.embed_in_path = true;
        self
    }

    const fn get(mut self) -> Self {
        self.use_get = true;
        self
    }

    const fn enumeration(mut self) -> Self {
        self.policy = FailurePolicy::Enumeration;
        self
    }

    const fn unescaped(mut self) -> Self {
        self.unescape_text = true;
        self
    }
}

/// Driver search self row: customer id column and the total reported alongside it
///
/// The backend reports the same total field whether or not the self row is
/// present.
pub const DRIVER_SEARCH_SELF_ROW: SelfRowRule = SelfRowRule {
    customer_id_column: "custid",
    alternate_total_field: "32",
};

/// Login form; the response is the member home page
pub const LOGIN: EndpointSpec = {
    let mut spec = EndpointSpec::text("login", "/membersite/Login");
    spec.login = true;
    spec
};

/// iRating / license chart points
pub const IRATING_CHART: EndpointSpec =
    EndpointSpec::json("irating_chart", "/memberstats/member/GetChartData").in_path();

/// Connected friends and notification counts
pub const DRIVER_COUNTS: EndpointSpec =
    EndpointSpec::json("driver_counts", "/membersite/member/GetDriverCounts").get();

/// Career totals per category
pub const CAREER_STATS: EndpointSpec =
    EndpointSpec::json("career_stats", "/memberstats/member/GetCareerStats").in_path();

/// Per-year totals per category
pub const YEARLY_STATS: EndpointSpec =
    EndpointSpec::json("yearly_stats", "/memberstats/member/GetYearlyStats").in_path();

/// Car ids a member has raced
pub const CARS_DRIVEN: EndpointSpec =
    EndpointSpec::json("cars_driven", "/memberstats/member/GetCarsDriven").in_path();

/// Best official lap times for one car
pub const PERSONAL_BESTS: EndpointSpec =
    EndpointSpec::json("personal_bests", "/memberstats/member/GetPersonalBests").in_path();

/// Online status lookup by driver name
pub const DRIVER_STATUS: EndpointSpec =
    EndpointSpec::json("driver_status", "/membersite/member/GetDriverStatus").in_path();

/// Summary of the last races of a member
pub const LAST_RACE_STATS: EndpointSpec =
    EndpointSpec::json("last_race_stats", "/memberstats/member/GetLastRacesStats").in_path();

/// Driver search
pub const DRIVER_SEARCH: EndpointSpec = EndpointSpec::columnar(
    "driver_search",
    "/memberstats/member/GetDriverStats",
    ColumnarLayout::nested()
        .with_total("32")
        .with_self_row(DRIVER_SEARCH_SELF_ROW),
)
.enumeration();

/// Results archive search
pub const RESULTS_ARCHIVE: EndpointSpec = EndpointSpec::columnar(
    "results_archive",
    "/memberstats/member/GetResults",
    ColumnarLayout::nested().with_total("46"),
)
.enumeration();

/// Series stats page; `SeasonListing` is embedded in its script
pub const SERIES_STATS_PAGE: EndpointSpec =
    EndpointSpec::text("series_stats_page", "/membersite/member/statsseries.jsp").get();

/// Season standings
pub const SEASON_STANDINGS: EndpointSpec = EndpointSpec::columnar(
    "season_standings",
    "/memberstats/member/GetSeasonStandings",
    ColumnarLayout::nested().with_total("27"),
)
.enumeration();

/// Hosted session results (`rows` / `rowcount` JSON)
pub const HOSTED_RESULTS: EndpointSpec =
    EndpointSpec::json("hosted_results", "/memberstats/member/GetPrivateSessionResults");

/// Current and upcoming sessions of a season
pub const SESSION_TIMES: EndpointSpec =
    EndpointSpec::json("session_times", "/membersite/member/GetSessionTimes").get();

/// All race results of a season week
pub const SERIES_RACE_RESULTS: EndpointSpec = EndpointSpec::columnar(
    "series_race_results",
    "/memberstats/member/GetSeriesRaceResults",
    ColumnarLayout::direct(),
);

/// Full results of one subsession
pub const SUBSESSION_RESULTS: EndpointSpec =
    EndpointSpec::json("subsession_results", "/membersite/member/GetSubsessionResults").unescaped();

/// Laps of one driver or team in a subsession
pub const SESSION_LAPS: EndpointSpec =
    EndpointSpec::json("session_laps", "/membersite/member/GetLaps").unescaped();

/// Seasons of a league
pub const LEAGUE_SEASONS: EndpointSpec = EndpointSpec::columnar(
    "league_seasons",
    "/membersite/member/GetLeagueSeasons",
    ColumnarLayout::nested(),
)
.unescaped();

/// One page of league members
pub const LEAGUE_MEMBERS: EndpointSpec =
    EndpointSpec::json("league_members", "/membersite/member/GetLeagueMembers").unescaped();

/// Driver standings of a league season
pub const LEAGUE_SEASON_STANDINGS: EndpointSpec = EndpointSpec::json(
    "league_season_standings",
    "/memberstats/member/GetLeagueSeasonStandings",
);

/// Team standings of a league season
pub const LEAGUE_TEAM_STANDINGS: EndpointSpec = EndpointSpec::json(
    "league_team_standings",
    "/memberstats/member/GetLeagueSeasonTeamStandings",
);

/// Event calendar of a league season
pub const LEAGUE_SEASON_CALENDAR: EndpointSpec = EndpointSpec::json(
    "league_season_calendar",
    "/membersite/member/GetLeagueCalendarBySeason",
);

/// League directory search
pub const LEAGUE_DIRECTORY: EndpointSpec = EndpointSpec::columnar(
    "league_directory",
    "/membersite/member/GetLeagueDirectory",
    ColumnarLayout::nested(),
)
.enumeration()
.unescaped();

/// Every registered endpoint
pub const ALL_ENDPOINTS: &[EndpointSpec] = &[
    LOGIN,
    IRATING_CHART,
    DRIVER_COUNTS,
    CAREER_STATS,
    YEARLY_STATS,
    CARS_DRIVEN,
    PERSONAL_BESTS,
    DRIVER_STATUS,
    LAST_RACE_STATS,
    DRIVER_SEARCH,
    RESULTS_ARCHIVE,
    SERIES_STATS_PAGE,
    SEASON_STANDINGS,
    HOSTED_RESULTS,
    SESSION_TIMES,
    SERIES_RACE_RESULTS,
    SUBSESSION_RESULTS,
    SESSION_LAPS,
    LEAGUE_SEASONS,
    LEAGUE_MEMBERS,
    LEAGUE_SEASON_STANDINGS,
    LEAGUE_TEAM_STANDINGS,
    LEAGUE_SEASON_CALENDAR,
    LEAGUE_DIRECTORY,
];
