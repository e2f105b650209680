use mapch_client::{CandidateRequest, RequestFailure};
use mapch_client::infra::http::{Method, TransportError};
use mapch_client::infra::probe::Payload;
use mapch_client::infra::testing::stubs::ScriptedTransport;

mod support;
use support::client;

fn candidates() -> Vec<CandidateRequest> {
    vec![
        CandidateRequest::form("api/a"),
        CandidateRequest::form("api/b"),
        CandidateRequest::form("api/c"),
    ]
}

#[tokio::test(start_paused = true)]
async fn first_success_wins_after_client_errors() {
    let transport = ScriptedTransport::new()
        .respond(Method::Post, "api/a", 404, "")
        .respond(Method::Post, "api/b", 404, "")
        .respond(Method::Post, "api/c", 200, "{\"ok\":true}");
    let api = client(&transport);

    let response = api
        .probe()
        .probe(&candidates(), |c| api.write_candidate(c, &Payload::new()))
        .await
        .expect("third candidate answers");

    assert_eq!(response.text(), "{\"ok\":true}");
    assert_eq!(
        transport.labels(),
        vec!["POST /api/a", "POST /api/b", "POST /api/c"]
    );
}

#[tokio::test(start_paused = true)]
async fn transport_failure_stops_the_walk() {
    let transport = ScriptedTransport::new()
        .fail(Method::Post, "api/a", TransportError::NotConnected)
        .respond(Method::Post, "api/b", 200, "{}");
    let api = client(&transport);

    let failure = api
        .probe()
        .probe(&candidates(), |c| api.write_candidate(c, &Payload::new()))
        .await
        .expect_err("no candidate reached");

    assert!(failure.is_transport());
    assert_eq!(failure.attempts.len(), 1);
    assert_eq!(failure.last_status, None);
    // The executor's single retry, then nothing else.
    assert_eq!(transport.labels(), vec!["POST /api/a", "POST /api/a"]);
}

#[tokio::test(start_paused = true)]
async fn server_error_is_retried_then_skipped() {
    let transport = ScriptedTransport::new()
        .respond(Method::Post, "api/a", 500, "down")
        .respond(Method::Post, "api/b", 200, "{}");
    let api = client(&transport);

    api.probe()
        .probe(&candidates(), |c| api.write_candidate(c, &Payload::new()))
        .await
        .expect("second candidate answers");

    assert_eq!(
        transport.labels(),
        vec!["POST /api/a", "POST /api/a", "POST /api/b"]
    );
}

#[tokio::test(start_paused = true)]
async fn exhausted_probe_reports_every_attempt() {
    let transport = ScriptedTransport::new()
        .respond(Method::Post, "api/a", 404, "")
        .respond(Method::Post, "api/b", 405, "")
        .respond(Method::Post, "api/c", 422, "{\"error\":\"bad\"}");
    let api = client(&transport);

    let failure = api
        .probe()
        .probe(&candidates(), |c| api.write_candidate(c, &Payload::new()))
        .await
        .expect_err("all refused");

    assert!(!failure.is_transport());
    assert_eq!(failure.last_status, Some(422));
    assert_eq!(failure.last_body.as_deref(), Some("{\"error\":\"bad\"}"));
    assert_eq!(
        failure.summary(),
        "POST api/a -> 404, POST api/b -> 405, POST api/c -> 422"
    );
}

#[tokio::test(start_paused = true)]
async fn method_override_header_reaches_the_wire() {
    let transport = ScriptedTransport::new().respond(
        Method::Post,
        "api/spots/9",
        200,
        "{}",
    );
    let api = client(&transport);
    let candidates = [CandidateRequest::form("api/spots/9")
        .with_override(Method::Patch)];

    api.probe()
        .probe(&candidates, |c| {
            api.write_candidate(c, &Payload::new().field("spot_name", "x"))
        })
        .await
        .expect("accepted");

    let requests = transport.requests();
    assert_eq!(
        requests[0].header_value("X-HTTP-Method-Override"),
        Some("PATCH")
    );
    assert_eq!(requests[0].body.field("spot_name"), Some("x"));
    assert_eq!(requests[0].timeout, api.write_timeout());
}

#[tokio::test(start_paused = true)]
async fn undecodable_success_reports_its_own_body() {
    let transport = ScriptedTransport::new()
        .respond(Method::Get, "api/a", 404, "route not found")
        .respond(Method::Get, "api/b", 200, "<html>maintenance</html>");
    let api = client(&transport);
    let candidates = [
        CandidateRequest::get("api/a"),
        CandidateRequest::get("api/b"),
    ];

    let failure = api
        .probe()
        .probe_decode(
            &candidates,
            |c| api.read_candidate(c, &Payload::new()),
            |response| {
                serde_json::from_slice::<serde_json::Value>(&response.body)
                    .map_err(|err| RequestFailure::decode(response, err))
            },
        )
        .await
        .expect_err("nothing decodes");

    assert_eq!(failure.last_status, Some(200));
    assert_eq!(
        failure.last_body.as_deref(),
        Some("<html>maintenance</html>")
    );
    assert_eq!(failure.summary(), "GET api/a -> 404, GET api/b -> 200");
}
