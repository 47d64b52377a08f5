//! Authenticated stats client
//!
//! [`Stats`] is built by logging in; a value only exists once the session and
//! every reference table are in place. All methods take `&self` and may be
//! called from many tasks at once: the shared [`ThrottledTransport`] queues
//! and spaces their requests.
//!
//! Customer-id arguments are optional and default to the logged-in member.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use super::auth::{Authenticator, LoginOutcome};
use super::decoder::{DecodeError, Decoded, ResponseDecoder};
use super::endpoints::{self, EndpointSpec, FailurePolicy, DEFAULT_BASE_URL};
use super::pagination::Paginator;
use super::query::{
    sort_fields, ChartCategory, DriverSearchQuery, ResultsQuery, SeasonOptions, SessionOptions,
    SortOptions,
};
use super::reference::ReferenceCache;
use super::request::{field, FormData, RequestBuilder, RequestOptions};
use super::scrape::extract_var;
use super::{StatsError, StatsResult};
use crate::metrics;
use crate::transport::{ThrottledTransport, TransportConfig};
use crate::{PageWindow, Record, RecordPage, RecordValue, Session};

/// Rows requested from the league directory in one search
pub const LEAGUE_DIRECTORY_LIMIT: u32 = 33;

/// Client configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Backend base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Settings for the transport opened by [`Stats::authenticate`]
    #[serde(default)]
    pub transport: TransportConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            transport: TransportConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Create a config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the base URL
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the transport settings
    pub fn with_transport(mut self, transport: TransportConfig) -> Self {
        self.transport = transport;
        self
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

/// One page of hosted session results
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HostedResults {
    /// Result rows
    pub rows: Vec<Value>,
    /// Total rows across all pages
    pub total: u64,
}

/// Authenticated client for the stats backend
pub struct Stats {
    transport: Arc<ThrottledTransport>,
    base_url: String,
    session: Session,
    reference: ReferenceCache,
}

impl Stats {
    /// Open a transport from `config` and log in
    ///
    /// # Errors
    /// Returns [`StatsError::Transport`] if the transport cannot be opened and
    /// [`StatsError::Auth`] if the login fails
    pub async fn authenticate(config: ClientConfig, username: &str, password: &str) -> StatsResult<Self> {
        let transport = ThrottledTransport::open(config.transport.clone())?;
        Self::authenticate_with(transport, config, username, password).await
    }

    /// Log in through an existing transport
    ///
    /// `config.transport` is ignored; the transport keeps its own settings.
    /// Several clients may share one transport and its request budget.
    ///
    /// # Errors
    /// Returns [`StatsError::Auth`] if the login fails
    pub async fn authenticate_with(
        transport: Arc<ThrottledTransport>,
        config: ClientConfig,
        username: &str,
        password: &str,
    ) -> StatsResult<Self> {
        let mut authenticator = Authenticator::new(transport.clone(), config.base_url.clone());
        let LoginOutcome { session, reference } = authenticator.authenticate(username, password).await?;

        Ok(Self {
            transport,
            base_url: config.base_url,
            session,
            reference,
        })
    }

    /// Session of the logged-in member
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Customer id of the logged-in member
    pub fn customer_id(&self) -> i64 {
        self.session.customer_id()
    }

    /// Reference tables loaded at login
    pub fn reference(&self) -> &ReferenceCache {
        &self.reference
    }

    /// Transport this client sends through
    pub fn transport(&self) -> &Arc<ThrottledTransport> {
        &self.transport
    }

    /// Shut the transport down; later calls fail with `Closed`
    ///
    /// Idempotent. Other clients sharing the transport are shut down too.
    pub fn shutdown(&self) {
        self.transport.shutdown();
    }

    fn customer(&self, customer_id: Option<i64>) -> i64 {
        customer_id.unwrap_or(self.session.customer_id())
    }

    async fn call(&self, endpoint: &EndpointSpec, data: Option<FormData>) -> StatsResult<Decoded> {
        match self.dispatch(endpoint, data).await {
            Err(e) if endpoint.policy == FailurePolicy::Enumeration && e.is_degradable() => {
                metrics::record_degraded(endpoint.name, &e.to_string());
                Ok(Decoded::empty(&endpoint.decode))
            }
            other => other,
        }
    }

    async fn dispatch(&self, endpoint: &EndpointSpec, data: Option<FormData>) -> StatsResult<Decoded> {
        let options = RequestOptions::for_endpoint(endpoint);
        let request =
            RequestBuilder::new(&self.base_url, Some(&self.session)).build(endpoint, data, &options)?;
        let raw = self.transport.send(request).await?;

        let decoded = ResponseDecoder::decode(
            &raw.body,
            &options.decode,
            Some(self.session.customer_id()),
            endpoint.unescape_text,
        )?;
        Ok(decoded)
    }

    async fn json(&self, endpoint: &EndpointSpec, data: Option<FormData>) -> StatsResult<Value> {
        Ok(self.call(endpoint, data).await?.into_json()?)
    }

    async fn page(&self, endpoint: &EndpointSpec, data: Option<FormData>) -> StatsResult<RecordPage> {
        Ok(self.call(endpoint, data).await?.into_page()?)
    }

    /// iRating chart points of a member in `category`
    pub async fn irating_chart(&self, customer_id: Option<i64>, category: ChartCategory) -> StatsResult<Value> {
        let data = vec![
            field("custId", self.customer(customer_id)),
            field("catId", category.id()),
            field("chartType", 1),
        ];
        self.json(&endpoints::IRATING_CHART, Some(data)).await
    }

    /// Connected friends and notification counts of the logged-in member
    pub async fn driver_counts(&self) -> StatsResult<Value> {
        self.json(&endpoints::DRIVER_COUNTS, None).await
    }

    /// Career totals (starts, wins, top 5s, ...) per category
    pub async fn career_stats(&self, customer_id: Option<i64>) -> StatsResult<Value> {
        let data = vec![field("custid", self.customer(customer_id))];
        self.json(&endpoints::CAREER_STATS, Some(data)).await
    }

    /// Totals per year and category
    pub async fn yearly_stats(&self, customer_id: Option<i64>) -> StatsResult<Value> {
        let data = vec![field("custid", self.customer(customer_id))];
        self.json(&endpoints::YEARLY_STATS, Some(data)).await
    }

    /// Car ids a member has raced
    pub async fn cars_driven(&self, customer_id: Option<i64>) -> StatsResult<Value> {
        let data = vec![field("custid", self.customer(customer_id))];
        self.json(&endpoints::CARS_DRIVEN, Some(data)).await
    }

    /// Best official lap times of a member in one car
    ///
    /// # Errors
    /// Returns [`StatsError::UnknownCar`] without a request if `car_id` is not in
    /// the reference cars table
    pub async fn personal_best(&self, customer_id: Option<i64>, car_id: i64) -> StatsResult<Value> {
        if !self.reference.has_car(car_id) {
            return Err(StatsError::UnknownCar(car_id));
        }
        let data = vec![
            field("carid", car_id),
            field("custid", self.customer(customer_id)),
        ];
        self.json(&endpoints::PERSONAL_BESTS, Some(data)).await
    }

    /// Profile and online status of drivers matching `driver_name`
    pub async fn driver_status(&self, driver_name: &str) -> StatsResult<Value> {
        let data = vec![field("searchTerms", driver_name)];
        self.json(&endpoints::DRIVER_STATUS, Some(data)).await
    }

    /// Summary of a member's most recent races
    pub async fn last_race_stats(&self, customer_id: Option<i64>) -> StatsResult<Value> {
        let data = vec![field("custid", self.customer(customer_id))];
        self.json(&endpoints::LAST_RACE_STATS, Some(data)).await
    }

    /// One page of driver search results
    ///
    /// The logged-in member's own row, which the backend puts first, is left
    /// out. Decode and HTTP status failures return an empty page.
    ///
    /// # Errors
    /// Returns [`StatsError::InvalidArgument`] without a request for pages above
    /// [`MAX_PAGE`](crate::MAX_PAGE)
    pub async fn driver_search(&self, query: &DriverSearchQuery, page: u32) -> StatsResult<RecordPage> {
        let data = query.form(self.session.customer_id(), PageWindow::try_for_page(page)?);
        self.page(&endpoints::DRIVER_SEARCH, Some(data)).await
    }

    /// One page of a member's results archive
    ///
    /// Decode and HTTP status failures return an empty page.
    pub async fn results_archive(
        &self,
        customer_id: Option<i64>,
        query: &ResultsQuery,
        page: u32,
    ) -> StatsResult<RecordPage> {
        let data = query.form(self.customer(customer_id), PageWindow::try_for_page(page)?);
        self.page(&endpoints::RESULTS_ARCHIVE, Some(data)).await
    }

    /// Every season listed on the series stats page
    pub async fn all_seasons(&self) -> StatsResult<Value> {
        let text = self
            .call(&endpoints::SERIES_STATS_PAGE, None)
            .await?
            .into_text()?;
        Ok(extract_var(&text, "SeasonListing")?)
    }

    /// One page of season standings
    ///
    /// Sorted by points, descending, unless `sort` says otherwise. Decode and
    /// HTTP status failures return an empty page.
    pub async fn season_standings(
        &self,
        season: i64,
        options: &SeasonOptions,
        sort: Option<&SortOptions>,
        page: u32,
    ) -> StatsResult<RecordPage> {
        let default_sort = SortOptions::by(sort_fields::POINTS);
        let sort = sort.unwrap_or(&default_sort);
        let data = options.form(season, sort, PageWindow::try_for_page(page)?);
        self.page(&endpoints::SEASON_STANDINGS, Some(data)).await
    }

    /// One page of hosted session results
    pub async fn hosted_results(
        &self,
        options: &SessionOptions,
        date_range: Option<(DateTime<Utc>, DateTime<Utc>)>,
        sort: Option<&SortOptions>,
        page: u32,
    ) -> StatsResult<HostedResults> {
        let default_sort = SortOptions::default();
        let sort = sort.unwrap_or(&default_sort);
        let data = options.form(date_range, sort, PageWindow::try_for_page(page)?);
        let value = self.json(&endpoints::HOSTED_RESULTS, Some(data)).await?;

        let rows = match value.get("rows") {
            Some(Value::Array(rows)) => rows.clone(),
            Some(_) => {
                return Err(DecodeError::UnexpectedShape("rows is not an array".to_string()).into())
            }
            None => return Err(DecodeError::MissingField("rows".to_string()).into()),
        };
        let total = value
            .get("rowcount")
            .and_then(Value::as_u64)
            .ok_or_else(|| DecodeError::MissingField("rowcount".to_string()))?;

        Ok(HostedResults { rows, total })
    }

    /// Current and upcoming sessions of a season between `start` and `end`
    pub async fn session_times(&self, season: i64, start: u32, end: u32) -> StatsResult<Value> {
        let data = vec![
            field("start", start),
            field("end", end),
            field("season", season),
        ];
        self.json(&endpoints::SESSION_TIMES, Some(data)).await
    }

    /// Results of every race in one week of a season
    pub async fn series_race_results(&self, season: i64, race_week: u32) -> StatsResult<Vec<Record>> {
        let data = vec![field("seasonid", season), field("raceweek", race_week)];
        Ok(self.page(&endpoints::SERIES_RACE_RESULTS, Some(data)).await?.records)
    }

    /// Full results of one subsession
    pub async fn session_results(&self, subsession_id: i64) -> StatsResult<Value> {
        let data = vec![
            field("subsessionID", subsession_id),
            field("custid", self.session.customer_id()),
        ];
        self.json(&endpoints::SUBSESSION_RESULTS, Some(data)).await
    }

    /// Laps of one driver (or team) in a subsession
    pub async fn session_laps(&self, subsession_id: i64, group_id: i64) -> StatsResult<Value> {
        let data = vec![
            field("subsessionid", subsession_id),
            field("groupid", group_id),
        ];
        self.json(&endpoints::SESSION_LAPS, Some(data)).await
    }

    /// Seasons of a league, with `custom_points_json` parsed
    pub async fn league_seasons(&self, league_id: i64) -> StatsResult<Vec<Record>> {
        let data = vec![field("leagueID", league_id)];
        let mut seasons = self.page(&endpoints::LEAGUE_SEASONS, Some(data)).await?.records;

        for season in &mut seasons {
            if let Some(points) = season.get_mut("custom_points_json") {
                *points = parse_embedded_json(points)?;
            }
        }
        Ok(seasons)
    }

    /// Every member of a league, fetched page by page
    pub async fn league_members(&self, league_id: i64) -> StatsResult<Vec<Value>> {
        Paginator::collect_all(|page| async move {
            let members = self.league_members_page(league_id, page).await?;
            let count = members.len() as u64;
            Ok((members, count))
        })
        .await
    }

    /// One page of league members
    pub async fn league_members_page(&self, league_id: i64, page: u32) -> StatsResult<Vec<Value>> {
        let window = PageWindow::try_for_page(page)?;
        let data = vec![
            field("leagueid", league_id),
            field("lowerBound", window.lower),
            field("upperBound", window.upper),
        ];

        match self.json(&endpoints::LEAGUE_MEMBERS, Some(data)).await? {
            Value::Array(members) => Ok(members),
            Value::Null => Ok(Vec::new()),
            other => {
                debug!(league_id, response = %other, "Unexpected league members response");
                Err(DecodeError::UnexpectedShape("league members is not a list".to_string()).into())
            }
        }
    }

    /// Driver standings of a league season
    pub async fn league_season_standings(&self, league_id: i64, season_id: i64) -> StatsResult<Value> {
        self.json(&endpoints::LEAGUE_SEASON_STANDINGS, Some(league_season(league_id, season_id)))
            .await
    }

    /// Team standings of a league season
    pub async fn league_season_team_standings(&self, league_id: i64, season_id: i64) -> StatsResult<Value> {
        self.json(&endpoints::LEAGUE_TEAM_STANDINGS, Some(league_season(league_id, season_id)))
            .await
    }

    /// Event calendar of a league season
    pub async fn league_season_calendar(&self, league_id: i64, season_id: i64) -> StatsResult<Value> {
        self.json(&endpoints::LEAGUE_SEASON_CALENDAR, Some(league_season(league_id, season_id)))
            .await
    }

    /// League directory entries matching `term`
    ///
    /// Decode and HTTP status failures return an empty page.
    pub async fn league_directory(&self, term: &str) -> StatsResult<RecordPage> {
        let data = vec![
            field("search", term),
            field("restrictToMember", 0),
            field("lowerbound", 1),
            field("upperbound", LEAGUE_DIRECTORY_LIMIT),
        ];
        self.page(&endpoints::LEAGUE_DIRECTORY, Some(data)).await
    }
}

fn league_season(league_id: i64, season_id: i64) -> FormData {
    vec![field("leagueID", league_id), field("leagueSeasonID", season_id)]
}

fn parse_embedded_json(value: &RecordValue) -> StatsResult<RecordValue> {
    match value {
        RecordValue::Text(text) if text.trim().is_empty() => Ok(RecordValue::Null),
        RecordValue::Text(text) => serde_json::from_str(text)
            .map(RecordValue::Json)
            .map_err(|e| DecodeError::InvalidJson(format!("custom_points_json: {e}")).into()),
        other => Ok(other.clone()),
    }
}
