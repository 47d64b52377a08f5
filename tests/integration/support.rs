//! Mock member site shared by the integration tests

use irace_stats::{ClientConfig, Stats, TransportConfig};
use std::time::Duration;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const USERNAME: &str = "jane";
pub const PASSWORD: &str = "s3cret-pw";
pub const CUSTOMER_ID: i64 = 123456;

/// Cookie the client must send once logged in
pub const SESSION_COOKIE: &str = "JSESSIONID=xyz;irsso_membersv2=abc";

pub const HOME_PATH: &str = "/membersite/member/Home.do";

/// Home page carrying the customer id and every reference listing
pub fn home_page() -> String {
    home_page_with(&[
        ("TrackListing", r#"[{"id":1,"name":"Lime+Rock+Park"}]"#),
        ("CarListing", r#"[{"id":1,"name":"Skip+Barber"},{"id":67,"name":"Mazda+MX-5"}]"#),
        ("CarClassListing", r#"[{"id":74,"name":"MX-5"}]"#),
        ("ClubListing", r#"[{"id":1,"name":"Atlantic"}]"#),
        ("SeasonListing", r#"[{"seasonid":3000,"seriesname":"Rookie"}]"#),
        ("DivisionListing", r#"[{"id":-1,"name":"ALL"}]"#),
        ("YearAndQuarterListing", r#"[{"year":2024,"quarters":[1,2,3,4]}]"#),
    ])
}

/// Home page with only the given listings
pub fn home_page_with(listings: &[(&str, &str)]) -> String {
    let mut page = String::from("<html><head><script>\n");
    page.push_str(&format!("var js_custid = {CUSTOMER_ID};\n"));
    for (name, json) in listings {
        page.push_str(&format!("var {name} = extractJSON('{json}');\n"));
    }
    page.push_str("</script></head><body>Home</body></html>");
    page
}

/// Login that sets the session marker on a redirect and lands on `home`
pub async fn mount_login_with(server: &MockServer, home: String) {
    Mock::given(method("POST"))
        .and(path("/membersite/Login"))
        .and(body_string_contains(format!("username={USERNAME}").as_str()))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("Location", HOME_PATH)
                .insert_header("Set-Cookie", "irsso_membersv2=abc; Path=/; HttpOnly"),
        )
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(HOME_PATH))
        .and(header("cookie", "irsso_membersv2=abc"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Set-Cookie", "JSESSIONID=xyz; Path=/")
                .set_body_string(home),
        )
        .mount(server)
        .await;
}

pub async fn mount_login(server: &MockServer) {
    mount_login_with(server, home_page()).await;
}

/// Client config pointed at `server` with a short dispatch delay
pub fn config(server: &MockServer) -> ClientConfig {
    ClientConfig::new().with_base_url(server.uri()).with_transport(
        TransportConfig::default()
            .with_dispatch_delay(Duration::from_millis(1))
            .with_request_timeout(Duration::from_secs(2)),
    )
}

/// Logged-in client against `server`
pub async fn login(server: &MockServer) -> Stats {
    mount_login(server).await;
    Stats::authenticate(config(server), USERNAME, PASSWORD)
        .await
        .expect("login against mock server")
}
