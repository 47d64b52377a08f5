//! Subcommands
//!
//! Each subcommand maps to one facade call and yields a JSON value for output.

use clap::Subcommand;
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use super::CliError;
use crate::stats::query::DriverSearchQuery;
use crate::stats::reference::ReferenceCategory;
use crate::{Stats, MAX_PAGE};

/// CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Career totals per category
    Career {
        /// Customer id (defaults to the logged-in member)
        custid: Option<i64>,
    },

    /// Summary of the most recent races
    LastRaces {
        /// Customer id (defaults to the logged-in member)
        custid: Option<i64>,
    },

    /// Full results of a subsession
    SessionResults {
        /// Subsession id
        subsession: i64,
    },

    /// Laps of one driver or team in a subsession
    SessionLaps {
        /// Subsession id
        subsession: i64,
        /// Group id (customer id, or team id for team events)
        group: i64,
    },

    /// Every member of a league
    LeagueMembers {
        /// League id
        league: i64,
    },

    /// Search drivers by name
    DriverSearch {
        /// Name or part of a name
        name: String,
        /// Result page (25 rows per page)
        #[arg(
            long,
            default_value_t = 1,
            value_parser = clap::value_parser!(u32).range(1..=i64::from(MAX_PAGE))
        )]
        page: u32,
    },

    /// Print a reference table loaded at login
    Reference {
        /// tracks, cars, car_class, club, season, division or year_and_quarter
        category: ReferenceCategory,
    },
}

impl Commands {
    /// Run the command against an authenticated client
    ///
    /// # Errors
    /// Returns [`CliError::Stats`] if the call fails
    pub async fn execute(&self, stats: &Stats) -> Result<Value, CliError> {
        match self {
            Commands::Career { custid } => Ok(stats.career_stats(*custid).await?),
            Commands::LastRaces { custid } => Ok(stats.last_race_stats(*custid).await?),
            Commands::SessionResults { subsession } => Ok(stats.session_results(*subsession).await?),
            Commands::SessionLaps { subsession, group } => {
                Ok(stats.session_laps(*subsession, *group).await?)
            }
            Commands::LeagueMembers { league } => {
                let members = stats.league_members(*league).await?;
                info!(league = *league, members = members.len(), "Fetched league members");
                Ok(Value::Array(members))
            }
            Commands::DriverSearch { name, page } => {
                let results = stats
                    .driver_search(&DriverSearchQuery::by_name(name.as_str()), *page)
                    .await?;
                to_value(&results)
            }
            Commands::Reference { category } => Ok(stats.reference().get(*category).clone()),
        }
    }
}

fn to_value<T: Serialize>(value: &T) -> Result<Value, CliError> {
    Ok(serde_json::to_value(value)?)
}

/// Render `value` for stdout
///
/// # Errors
/// Returns [`CliError::Serialization`] if the value cannot be written
pub fn render(value: &Value, pretty: bool) -> Result<String, CliError> {
    let rendered = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    Ok(rendered)
}
