//! End-to-end decision flows: real HTTP validator, stand-in CAS server, map-backed session.

use std::sync::Arc;

use wiremock::matchers::{any, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use casgate::identity::{MemorySession, RETURN_TO_KEY};
use casgate::{CasGateway, GatewayConfig, GatewayOptions, GatewayRequest, GatewayResponse, HttpTicketValidator, Session};

fn gateway_for(server: &MockServer, opts: GatewayOptions) -> CasGateway {
    let opts = GatewayOptions {
        cas_url: format!("{}/cas", server.uri()),
        service_url: "http://app.local".into(),
        ..opts
    };
    CasGateway::new(GatewayConfig::from_options(opts).expect("valid config")).expect("gateway")
}

fn v1() -> GatewayOptions {
    GatewayOptions { cas_version: "1.0".into(), ..Default::default() }
}

#[tokio::test]
async fn login_round_trip_protocol_1() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cas/validate"))
        .and(query_param("ticket", "ST-123"))
        .and(query_param("service", "http://app.local/secure"))
        .respond_with(ResponseTemplate::new(200).set_body_string("yes\nalice\n"))
        .expect(1)
        .mount(&server)
        .await;
    let gw = gateway_for(&server, v1());
    let mut session = MemorySession::new();

    // First visit: no session, no ticket -> login redirect
    let first = GatewayRequest::from_parts("/secure", None);
    let GatewayResponse::Redirect(login) = gw.bounce(&first, &mut session).await else {
        panic!("expected login redirect");
    };
    assert_eq!(login, format!("{}/cas/login?service=http%3A%2F%2Fapp.local%2Fsecure", server.uri()));
    assert_eq!(session.get(RETURN_TO_KEY).as_deref(), Some("/secure"));

    // CAS sends the browser back with a ticket
    let back = GatewayRequest::from_parts("/secure", Some("ticket=ST-123"));
    assert_eq!(gw.bounce(&back, &mut session).await, GatewayResponse::Redirect("/secure".into()));
    assert_eq!(session.get("cas_user").as_deref(), Some("alice"));

    // Subsequent requests pass straight through
    assert_eq!(gw.bounce(&first, &mut session).await, GatewayResponse::Continue);
}

#[tokio::test]
async fn rejected_ticket_protocol_1() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cas/validate"))
        .respond_with(ResponseTemplate::new(200).set_body_string("no\n"))
        .expect(1)
        .mount(&server)
        .await;
    let gw = gateway_for(&server, v1());
    let mut session = MemorySession::new();
    session.insert(RETURN_TO_KEY, "/secure".into());
    let before = session.values.clone();

    let back = GatewayRequest::from_parts("/secure", Some("ticket=ST-123"));
    assert_eq!(gw.bounce(&back, &mut session).await, GatewayResponse::Status(401));
    assert_eq!(session.values, before);
}

#[tokio::test]
async fn protocol_3_failure_is_401() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cas/p3/serviceValidate"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "<cas:serviceResponse xmlns:cas='http://www.yale.edu/tp/cas'><cas:authenticationFailure code='INVALID_SERVICE'>bad service</cas:authenticationFailure></cas:serviceResponse>",
        ))
        .expect(1)
        .mount(&server)
        .await;
    let gw = gateway_for(&server, GatewayOptions::default());
    let mut session = MemorySession::new();
    let back = GatewayRequest::from_parts("/reports", Some("ticket=ST-9"));
    assert_eq!(gw.bounce(&back, &mut session).await, GatewayResponse::Status(401));
    assert_eq!(session.get("cas_user"), None);
}

#[tokio::test]
async fn block_never_calls_cas() {
    let server = MockServer::start().await;
    Mock::given(any()).respond_with(ResponseTemplate::new(200)).expect(0).mount(&server).await;
    let gw = gateway_for(&server, v1());
    let mut session = MemorySession::new();
    let req = GatewayRequest::from_parts("/api/data", Some("ticket=ST-123"));
    assert_eq!(gw.block(&req, &mut session).await, GatewayResponse::Status(401));
    assert!(session.values.is_empty());
}

#[tokio::test]
async fn dev_mode_never_calls_cas() {
    let server = MockServer::start().await;
    Mock::given(any()).respond_with(ResponseTemplate::new(200)).expect(0).mount(&server).await;
    let opts = GatewayOptions { dev_mode: true, dev_mode_user: "bob".into(), ..v1() };
    let gw = gateway_for(&server, opts);
    let mut session = MemorySession::new();
    let req = GatewayRequest::from_parts("/secure", Some("ticket=ST-123"));
    assert_eq!(gw.bounce(&req, &mut session).await, GatewayResponse::Continue);
    assert_eq!(session.get("cas_user").as_deref(), Some("bob"));
}

#[tokio::test]
async fn stale_return_to_survives_failed_ticket() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(query_param("ticket", "ST-bad"))
        .respond_with(ResponseTemplate::new(200).set_body_string("no\n"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(query_param("ticket", "ST-good"))
        .respond_with(ResponseTemplate::new(200).set_body_string("yes\ncarol\n"))
        .mount(&server)
        .await;
    let gw = gateway_for(&server, v1());
    let mut session = MemorySession::new();
    session.insert(RETURN_TO_KEY, "/original".into());

    let bad = GatewayRequest::from_parts("/cb", Some("ticket=ST-bad"));
    assert_eq!(gw.bounce(&bad, &mut session).await, GatewayResponse::Status(401));
    let good = GatewayRequest::from_parts("/cb", Some("ticket=ST-good"));
    assert_eq!(gw.bounce(&good, &mut session).await, GatewayResponse::Redirect("/original".into()));
}

#[tokio::test]
async fn custom_validator_type_is_accepted() {
    // Gateways built from a shared config and an explicit validator behave the same
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("yes\ndave\n"))
        .mount(&server)
        .await;
    let cfg = Arc::new(GatewayConfig::from_options(GatewayOptions {
        cas_url: server.uri(),
        service_url: "http://app.local".into(),
        ..v1()
    }).unwrap());
    let gw = CasGateway::with_validator(cfg.clone(), HttpTicketValidator::new(cfg).unwrap());
    let mut session = MemorySession::new();
    let req = GatewayRequest::from_parts("/x", Some("ticket=ST-1"));
    assert_eq!(gw.bounce(&req, &mut session).await, GatewayResponse::Redirect("/x".into()));
    assert_eq!(gw.current_user(&session).as_deref(), Some("dave"));
}
