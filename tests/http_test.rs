//! Integration tests for HTTP handler instrumentation.

use std::panic::{catch_unwind, AssertUnwindSafe};

use harvest_agent::http::{status_key, HTTP_STATUSES, HTTP_THROUGHPUT_KEY};
use harvest_agent::{
    Agent, AgentConfig, HttpHandler, RecordedResponse, ResponseWriter, TimerStat,
};

fn agent(collect_http_statuses: bool) -> Agent {
    Agent::new(AgentConfig {
        license: "test-license".to_string(),
        collect_gc: false,
        collect_memory: false,
        collect_http_statuses,
        ..AgentConfig::default()
    })
}

fn requests(agent: &Agent) -> f64 {
    agent
        .registry()
        .get_timer_value(HTTP_THROUGHPUT_KEY, TimerStat::Count)
        .unwrap()
}

fn status_count(agent: &Agent, status: u16) -> f64 {
    agent.registry().get_counter_value(&status_key(status)).unwrap()
}

// === Status counting ===

#[test]
fn explicit_status_counts_only_that_code() {
    let agent = agent(true);
    let handler = agent.wrap_http_handler(|w: &mut dyn ResponseWriter, _req: ()| {
        w.write_header(404);
        let _ = w.write(b"not found");
    });

    let mut response = RecordedResponse::default();
    handler.serve(&mut response, ());

    assert_eq!(response.status, Some(404));
    assert_eq!(response.body, b"not found");
    assert_eq!(requests(&agent), 1.0);
    for status in HTTP_STATUSES {
        let expected = if status == 404 { 1.0 } else { 0.0 };
        assert_eq!(status_count(&agent, status), expected, "status {}", status);
    }
}

#[test]
fn body_without_header_counts_as_ok() {
    let agent = agent(true);
    let handler = agent.wrap_http_handler(|w: &mut dyn ResponseWriter, _req: ()| {
        let _ = w.write(b"hello");
    });

    let mut response = RecordedResponse::default();
    handler.serve(&mut response, ());

    assert_eq!(response.status, Some(200));
    assert_eq!(status_count(&agent, 200), 1.0);
}

#[test]
fn empty_response_counts_as_ok() {
    let agent = agent(true);
    let handler = agent.wrap_http_handler(|_w: &mut dyn ResponseWriter, _req: ()| {});

    handler.serve(&mut RecordedResponse::default(), ());

    assert_eq!(status_count(&agent, 200), 1.0);
    assert_eq!(requests(&agent), 1.0);
}

#[test]
fn repeated_headers_count_first_only() {
    let agent = agent(true);
    let handler = agent.wrap_http_handler(|w: &mut dyn ResponseWriter, _req: ()| {
        w.write_header(201);
        w.write_header(500);
    });

    handler.serve(&mut RecordedResponse::default(), ());

    assert_eq!(status_count(&agent, 201), 1.0);
    assert_eq!(status_count(&agent, 500), 0.0);
}

#[test]
fn unlisted_status_is_timed_but_not_counted() {
    let agent = agent(true);
    let handler = agent.wrap_http_handler(|w: &mut dyn ResponseWriter, _req: ()| {
        w.write_header(299);
    });

    handler.serve(&mut RecordedResponse::default(), ());

    assert_eq!(requests(&agent), 1.0);
    let counted: f64 = HTTP_STATUSES.iter().map(|&s| status_count(&agent, s)).sum();
    assert_eq!(counted, 0.0);
}

#[test]
fn panicking_handler_records_timer_and_server_error() {
    let agent = agent(true);
    let handler = agent.wrap_http_handler(|_w: &mut dyn ResponseWriter, _req: ()| {
        panic!("handler failed");
    });

    let mut response = RecordedResponse::default();
    let result = catch_unwind(AssertUnwindSafe(|| handler.serve(&mut response, ())));

    assert!(result.is_err());
    assert_eq!(requests(&agent), 1.0);
    assert_eq!(status_count(&agent, 500), 1.0);
}

// === Throughput only ===

#[test]
fn statuses_disabled_records_throughput_only() {
    let agent = agent(false);
    let handler = agent.wrap_http_handler(|w: &mut dyn ResponseWriter, _req: ()| {
        w.write_header(404);
    });

    handler.serve(&mut RecordedResponse::default(), ());
    handler.serve(&mut RecordedResponse::default(), ());

    assert_eq!(requests(&agent), 2.0);
    assert!(agent.registry().counter(&status_key(404)).is_err());
}

#[test]
fn wrappers_share_one_timer() {
    let agent = agent(false);
    let first = agent.wrap_http_handler(|_w: &mut dyn ResponseWriter, _req: u32| {});
    let second = agent.wrap_http_handler(|_w: &mut dyn ResponseWriter, _req: u32| {});

    first.serve(&mut RecordedResponse::default(), 1);
    second.serve(&mut RecordedResponse::default(), 2);

    assert_eq!(requests(&agent), 2.0);
}

#[test]
fn request_is_passed_through() {
    let agent = agent(false);
    let handler = agent.wrap_http_handler(|w: &mut dyn ResponseWriter, req: String| {
        let _ = w.write(req.as_bytes());
    });

    let mut response = RecordedResponse::default();
    handler.serve(&mut response, "echo".to_string());

    assert_eq!(response.body, b"echo");
}
