//! Integration tests for the stats facade against a mock member site

use super::support::{self, CUSTOMER_ID, PASSWORD, SESSION_COOKIE, USERNAME};
use irace_stats::stats::query::{ChartCategory, DriverSearchQuery, ResultsQuery, SessionOptions};
use irace_stats::{RecordValue, Stats, StatsError, TransportConfig, TransportError, MAX_PAGE};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn driver_envelope(rows: serde_json::Value, total: u64) -> serde_json::Value {
    json!({
        "m": {"1": "custid", "2": "displayname", "3": "irating"},
        "d": {"32": total, "r": rows}
    })
}

#[tokio::test]
async fn test_identity_endpoint_sends_session_cookie() {
    let server = MockServer::start().await;
    let stats = support::login(&server).await;

    Mock::given(method("GET"))
        .and(path("/memberstats/member/GetCareerStats"))
        .and(query_param("custid", CUSTOMER_ID.to_string()))
        .and(header("cookie", SESSION_COOKIE))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"category": "Road", "starts": 120, "wins": 4}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let career = stats.career_stats(None).await.unwrap();
    assert_eq!(career[0]["starts"], 120);
}

#[tokio::test]
async fn test_explicit_customer_id_overrides_session() {
    let server = MockServer::start().await;
    let stats = support::login(&server).await;

    Mock::given(method("GET"))
        .and(path("/memberstats/member/GetChartData"))
        .and(query_param("custId", "42"))
        .and(query_param("catId", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([[1_600_000_000_000_i64, 1350]])))
        .expect(1)
        .mount(&server)
        .await;

    let chart = stats.irating_chart(Some(42), ChartCategory::Road).await.unwrap();
    assert_eq!(chart[0][1], 1350);
}

#[tokio::test]
async fn test_identity_endpoint_propagates_http_status() {
    let server = MockServer::start().await;
    let stats = support::login(&server).await;

    Mock::given(method("GET"))
        .and(path("/memberstats/member/GetCareerStats"))
        .respond_with(ResponseTemplate::new(500).set_body_string("oops"))
        .mount(&server)
        .await;

    let result = stats.career_stats(None).await;
    match result {
        Err(StatsError::Transport(TransportError::HttpStatus { status, body })) => {
            assert_eq!(status, 500);
            assert_eq!(body, "oops");
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test]
async fn test_identity_endpoint_propagates_bad_json() {
    let server = MockServer::start().await;
    let stats = support::login(&server).await;

    Mock::given(method("GET"))
        .and(path("/memberstats/member/GetYearlyStats"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    assert!(matches!(
        stats.yearly_stats(None).await,
        Err(StatsError::Decode(_))
    ));
}

// Own-row-first is current backend behaviour and may change.
#[tokio::test]
async fn test_driver_search_drops_own_row() {
    let server = MockServer::start().await;
    let stats = support::login(&server).await;

    let rows = json!([
        {"1": CUSTOMER_ID, "2": "Jane+Doe", "3": 1800},
        {"1": 1, "2": "Alex", "3": 2500},
        {"1": 2, "2": "Sam", "3": 2400}
    ]);
    Mock::given(method("POST"))
        .and(path("/memberstats/member/GetDriverStats"))
        .and(body_string_contains("search=Doe"))
        .and(body_string_contains("lowerbound=26"))
        .respond_with(ResponseTemplate::new(200).set_body_json(driver_envelope(rows, 2)))
        .expect(1)
        .mount(&server)
        .await;

    let page = stats
        .driver_search(&DriverSearchQuery::by_name("Doe"), 2)
        .await
        .unwrap();

    assert_eq!(page.total, 2);
    assert_eq!(page.records.len(), 2);
    assert_eq!(page.records[0].get("custid"), Some(&RecordValue::Integer(1)));
    assert_eq!(
        page.records[1].get("displayname").and_then(RecordValue::as_str),
        Some("Sam")
    );
}

#[tokio::test]
async fn test_driver_search_keeps_other_first_row() {
    let server = MockServer::start().await;
    let stats = support::login(&server).await;

    let rows = json!([[7, "Kim", 3100], [8, "Lee", 3000]]);
    Mock::given(method("POST"))
        .and(path("/memberstats/member/GetDriverStats"))
        .respond_with(ResponseTemplate::new(200).set_body_json(driver_envelope(rows, 140)))
        .mount(&server)
        .await;

    let page = stats
        .driver_search(&DriverSearchQuery::by_name("K"), 1)
        .await
        .unwrap();
    assert_eq!(page.records.len(), 2);
    assert_eq!(page.total, 140);
}

#[tokio::test]
async fn test_enumeration_degrades_on_http_status() {
    let server = MockServer::start().await;
    let stats = support::login(&server).await;

    Mock::given(method("POST"))
        .and(path("/memberstats/member/GetResults"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let page = stats
        .results_archive(None, &ResultsQuery::default(), 1)
        .await
        .unwrap();
    assert!(page.records.is_empty());
    assert_eq!(page.total, 0);
}

#[tokio::test]
async fn test_enumeration_degrades_on_bad_body() {
    let server = MockServer::start().await;
    let stats = support::login(&server).await;

    Mock::given(method("POST"))
        .and(path("/memberstats/member/GetSeasonStandings"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"m\": [\"a\"], \"d\": {\"27\": 3, \"r\": [[1, 2]]}}"))
        .mount(&server)
        .await;

    let page = stats
        .season_standings(3000, &Default::default(), None, 1)
        .await
        .unwrap();
    assert!(page.records.is_empty());
}

#[tokio::test]
async fn test_enumeration_propagates_timeout() {
    let server = MockServer::start().await;
    support::mount_login(&server).await;

    let config = support::config(&server).with_transport(
        TransportConfig::default()
            .with_dispatch_delay(Duration::from_millis(1))
            .with_request_timeout(Duration::from_millis(300)),
    );
    let stats = Stats::authenticate(config, USERNAME, PASSWORD).await.unwrap();

    Mock::given(method("POST"))
        .and(path("/memberstats/member/GetResults"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"m": [], "d": {}}))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let result = stats.results_archive(None, &ResultsQuery::default(), 1).await;
    assert!(matches!(
        result,
        Err(StatsError::Transport(TransportError::Timeout(_)))
    ));
}

#[tokio::test]
async fn test_results_archive_reads_total_field() {
    let server = MockServer::start().await;
    let stats = support::login(&server).await;

    Mock::given(method("POST"))
        .and(path("/memberstats/member/GetResults"))
        .and(body_string_contains(format!("custid={CUSTOMER_ID}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "m": [{"name": "subsessionid", "type": "int"}, {"name": "start_time", "type": "date"}],
            "d": {"46": 51, "r": [["9001", 1_700_000_000_000_i64]]}
        })))
        .mount(&server)
        .await;

    let page = stats
        .results_archive(None, &ResultsQuery::default(), 1)
        .await
        .unwrap();
    assert_eq!(page.total, 51);
    assert_eq!(page.records[0].get("subsessionid"), Some(&RecordValue::Integer(9001)));
    assert!(page.records[0].get("start_time").and_then(RecordValue::as_date).is_some());
}

#[tokio::test]
async fn test_personal_best_unknown_car_sends_nothing() {
    let server = MockServer::start().await;
    let stats = support::login(&server).await;

    Mock::given(path("/memberstats/member/GetPersonalBests"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    assert!(matches!(
        stats.personal_best(None, 999).await,
        Err(StatsError::UnknownCar(999))
    ));
}

#[tokio::test]
async fn test_personal_best_known_car() {
    let server = MockServer::start().await;
    let stats = support::login(&server).await;

    Mock::given(method("GET"))
        .and(path("/memberstats/member/GetPersonalBests"))
        .and(query_param("carid", "67"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"trackid": 1, "bestlaptime": "1:02.345"}])))
        .expect(1)
        .mount(&server)
        .await;

    let bests = stats.personal_best(None, 67).await.unwrap();
    assert_eq!(bests[0]["trackid"], 1);
}

#[tokio::test]
async fn test_league_members_collects_every_page() {
    let server = MockServer::start().await;
    let stats = support::login(&server).await;

    let page_one: Vec<_> = (0..25).map(|i| json!({"custid": i, "displayName": "Member+One"})).collect();
    let page_two: Vec<_> = (25..28).map(|i| json!({"custid": i, "displayName": "Late%20Joiner"})).collect();

    Mock::given(method("POST"))
        .and(path("/membersite/member/GetLeagueMembers"))
        .and(body_string_contains("upperBound=25"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_one))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/membersite/member/GetLeagueMembers"))
        .and(body_string_contains("upperBound=50"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_two))
        .expect(1)
        .mount(&server)
        .await;

    let members = stats.league_members(77).await.unwrap();
    assert_eq!(members.len(), 28);
    assert_eq!(members[0]["displayName"], "Member One");
    assert_eq!(members[27]["displayName"], "Late Joiner");
}

#[tokio::test]
async fn test_league_seasons_parse_custom_points() {
    let server = MockServer::start().await;
    let stats = support::login(&server).await;

    Mock::given(method("POST"))
        .and(path("/membersite/member/GetLeagueSeasons"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "m": ["league_season_id", "league_season_name", "custom_points_json"],
            "d": {"r": [
                [11, "Spring+2024", "{\"1\":25,\"2\":22}"],
                [12, "Summer", ""]
            ]}
        })))
        .mount(&server)
        .await;

    let seasons = stats.league_seasons(77).await.unwrap();
    assert_eq!(seasons.len(), 2);
    assert_eq!(
        seasons[0].get("league_season_name").and_then(RecordValue::as_str),
        Some("Spring 2024")
    );
    assert_eq!(
        seasons[0].get("custom_points_json"),
        Some(&RecordValue::Json(json!({"1": 25, "2": 22})))
    );
    assert_eq!(seasons[1].get("custom_points_json"), Some(&RecordValue::Null));
}

#[tokio::test]
async fn test_hosted_results_rows_and_count() {
    let server = MockServer::start().await;
    let stats = support::login(&server).await;

    Mock::given(method("POST"))
        .and(path("/memberstats/member/GetPrivateSessionResults"))
        .and(body_string_contains("sessionhost=Jane"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "rowcount": 31,
            "rows": [{"subsessionid": 1}, {"subsessionid": 2}]
        })))
        .mount(&server)
        .await;

    let results = stats
        .hosted_results(&SessionOptions::default().with_host("Jane"), None, None, 1)
        .await
        .unwrap();
    assert_eq!(results.total, 31);
    assert_eq!(results.rows.len(), 2);
}

#[tokio::test]
async fn test_session_times_is_a_get() {
    let server = MockServer::start().await;
    let stats = support::login(&server).await;

    Mock::given(method("GET"))
        .and(path("/membersite/member/GetSessionTimes"))
        .and(query_param("season", "3000"))
        .and(query_param("start", "0"))
        .and(query_param("end", "10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"sessionid": 5}])))
        .expect(1)
        .mount(&server)
        .await;

    let times = stats.session_times(3000, 0, 10).await.unwrap();
    assert_eq!(times[0]["sessionid"], 5);
}

#[tokio::test]
async fn test_series_race_results_direct_rows() {
    let server = MockServer::start().await;
    let stats = support::login(&server).await;

    Mock::given(method("POST"))
        .and(path("/memberstats/member/GetSeriesRaceResults"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "m": {"1": "subsessionid", "2": "sizeoffield"},
            "d": [{"1": 100, "2": 20}, {"1": 101, "2": 18}]
        })))
        .mount(&server)
        .await;

    let results = stats.series_race_results(3000, 4).await.unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[1].get("sizeoffield"), Some(&RecordValue::Integer(18)));
}

#[tokio::test]
async fn test_session_results_are_unescaped() {
    let server = MockServer::start().await;
    let stats = support::login(&server).await;

    Mock::given(method("POST"))
        .and(path("/membersite/member/GetSubsessionResults"))
        .and(body_string_contains("subsessionID=9001"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "track_name": "Lime+Rock%20Park",
            "rows": [{"displayname": "Jane+Doe"}]
        })))
        .mount(&server)
        .await;

    let results = stats.session_results(9001).await.unwrap();
    assert_eq!(results["track_name"], "Lime Rock Park");
    assert_eq!(results["rows"][0]["displayname"], "Jane Doe");
}

#[tokio::test]
async fn test_all_seasons_scraped_from_series_page() {
    let server = MockServer::start().await;
    let stats = support::login(&server).await;

    Mock::given(method("GET"))
        .and(path("/membersite/member/statsseries.jsp"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "<script>var SeasonListing = extractJSON('[{\"seasonid\":3001,\"seriesname\":\"Pro\"}]');</script>",
        ))
        .mount(&server)
        .await;

    let seasons = stats.all_seasons().await.unwrap();
    assert_eq!(seasons[0]["seasonid"], 3001);
}

#[tokio::test]
async fn test_league_directory_window() {
    let server = MockServer::start().await;
    let stats = support::login(&server).await;

    Mock::given(method("POST"))
        .and(path("/membersite/member/GetLeagueDirectory"))
        .and(body_string_contains("lowerbound=1"))
        .and(body_string_contains("upperbound=33"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "m": ["leagueid", "leaguename"],
            "d": {"r": [[5, "Sunday+Cup"]]}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let page = stats.league_directory("Sunday").await.unwrap();
    assert_eq!(page.records.len(), 1);
    assert_eq!(
        page.records[0].get("leaguename").and_then(RecordValue::as_str),
        Some("Sunday Cup")
    );
}

#[tokio::test]
async fn test_page_beyond_last_is_rejected_without_request() {
    let server = MockServer::start().await;
    let stats = support::login(&server).await;

    Mock::given(path("/memberstats/member/GetDriverStats"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(path("/membersite/member/GetLeagueMembers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    assert!(matches!(
        stats
            .driver_search(&DriverSearchQuery::by_name("Doe"), MAX_PAGE + 1)
            .await,
        Err(StatsError::InvalidArgument(_))
    ));
    assert!(matches!(
        stats.league_members_page(77, 200_000_000).await,
        Err(StatsError::InvalidArgument(_))
    ));
}

#[tokio::test]
async fn test_calls_after_shutdown_fail_closed() {
    let server = MockServer::start().await;
    let stats = support::login(&server).await;

    stats.shutdown();
    stats.shutdown();

    assert!(matches!(
        stats.driver_counts().await,
        Err(StatsError::Transport(TransportError::Closed))
    ));
    // Closed is not a degradable failure, even for enumeration endpoints.
    assert!(matches!(
        stats.results_archive(None, &ResultsQuery::default(), 1).await,
        Err(StatsError::Transport(TransportError::Closed))
    ));
}
