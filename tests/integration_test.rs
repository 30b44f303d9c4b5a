use assert_cmd::Command;
use assert_cmd::cargo;
use mockito::{Matcher, Server};
use predicates::prelude::*;
use std::io::Write;
use tempfile::NamedTempFile;

/// The binary with no ambient configuration leaking in from the caller.
fn adminapi() -> Command {
    let mut cmd = Command::new(cargo::cargo_bin!("adminapi"));
    cmd.env_remove("ADMINAPI_BASE_URL")
        .env_remove("ADMINAPI_MEMBERS_URL")
        .env_remove("ADMINAPI_MEMBERS_TOKEN");
    cmd
}

#[test]
fn test_get_prints_json() {
    let mut server = Server::new();
    let mock = server
        .mock("GET", "/api/events")
        .match_query(Matcher::UrlEncoded("page".into(), "1".into()))
        .match_header("accept", "application/json")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"data": [{"id": 1, "name": "Satsang"}]}"#)
        .create();

    adminapi()
        .arg("get")
        .arg("/events")
        .arg("-q")
        .arg("page=1")
        .arg("--api-url")
        .arg(server.url())
        .assert()
        .success()
        .stdout(predicates::str::contains("\"name\": \"Satsang\""));

    mock.assert();
}

#[test]
fn test_get_retries_server_errors_then_fails() {
    let mut server = Server::new();
    let mock = server
        .mock("GET", "/api/events")
        .with_status(503)
        .expect(3)
        .create();

    adminapi()
        .args(["get", "events", "--max-retries", "2", "--initial-delay", "1"])
        .arg("--api-url")
        .arg(server.url())
        .assert()
        .failure()
        .stderr(predicates::str::contains(
            "Service unavailable. Please try again later.",
        ))
        .stderr(predicates::str::contains("HTTP_503"));

    mock.assert();
}

#[test]
fn test_post_is_not_retried() {
    let mut server = Server::new();
    let mock = server
        .mock("POST", "/api/events")
        .match_body(Matcher::Json(serde_json::json!({"name": "Satsang"})))
        .with_status(503)
        .expect(1)
        .create();

    adminapi()
        .args(["post", "events", "--data", r#"{"name": "Satsang"}"#])
        .arg("--api-url")
        .arg(server.url())
        .assert()
        .failure()
        .stderr(predicates::str::contains("Service unavailable"));

    mock.assert();
}

#[test]
fn test_client_error_uses_server_message() {
    let mut server = Server::new();
    let mock = server
        .mock("GET", "/api/events/9")
        .with_status(404)
        .with_body(r#"{"error": "Bad input"}"#)
        .expect(1)
        .create();

    adminapi()
        .args(["get", "api/events/9"])
        .arg("--api-url")
        .arg(server.url())
        .assert()
        .failure()
        .stderr(predicates::str::contains("Bad input"));

    mock.assert();
}

#[test]
fn test_json_errors_prints_normalized_record() {
    let mut server = Server::new();
    let _mock = server
        .mock("DELETE", "/api/events/1")
        .with_status(404)
        .with_header("x-request-id", "req-7")
        .create();

    adminapi()
        .args(["delete", "events/1", "--json-errors"])
        .arg("--api-url")
        .arg(server.url())
        .assert()
        .failure()
        .stderr(predicates::str::contains("\"code\": \"HTTP_404\""))
        .stderr(predicates::str::contains("\"message\": \"Resource not found.\""))
        .stderr(predicates::str::contains("\"requestId\": \"req-7\""));
}

#[test]
fn test_network_error_message() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    adminapi()
        .args(["get", "events", "--max-retries", "0"])
        .arg("--api-url")
        .arg(format!("http://{}", addr))
        .assert()
        .failure()
        .stderr(predicates::str::contains(
            "Network error. Please check your connection.",
        ));
}

#[test]
fn test_members_request_sends_bearer_token() {
    let mut server = Server::new();
    let mock = server
        .mock("GET", "/members/volunteers")
        .match_header("authorization", "Bearer integration-token")
        .with_status(200)
        .with_body("[]")
        .create();

    adminapi()
        .env("ADMINAPI_MEMBERS_TOKEN", "integration-token")
        .args(["get", "volunteers", "--members"])
        .arg("--members-url")
        .arg(format!("{}/members", server.url()))
        .assert()
        .success()
        .stdout(predicates::str::contains("[]"));

    mock.assert();
}

#[test]
fn test_url_command() {
    adminapi()
        .args(["url", "/events", "--api-url", "http://admin.example.org/"])
        .assert()
        .success()
        .stdout("http://admin.example.org/api/events\n");

    adminapi()
        .env("ADMINAPI_BASE_URL", "http://env.example.org")
        .args(["url", "api/events"])
        .assert()
        .success()
        .stdout("http://env.example.org/api/events\n");
}

#[test]
fn test_master_data_command() {
    let mut server = Server::new();
    let mock = server
        .mock("GET", "/api/event-sub-categories/by-category")
        .match_query(Matcher::UrlEncoded("category_id".into(), "4".into()))
        .with_status(200)
        .with_body(r#"[{"id": 2, "name": "Youth", "event_category_id": 4}]"#)
        .create();

    adminapi()
        .args(["master-data", "event-sub-categories", "--category-id", "4"])
        .arg("--api-url")
        .arg(server.url())
        .assert()
        .success()
        .stdout(predicates::str::contains("\"name\": \"Youth\""));

    mock.assert();
}

#[test]
fn test_dedupe_from_file() {
    let mut input = NamedTempFile::new().unwrap();
    write!(
        input,
        r#"[{{"id": 1, "name": "A"}}, {{"id": 1, "name": "B"}}, {{"id": 2, "name": "C"}}]"#
    )
    .unwrap();

    adminapi()
        .args(["dedupe", "volunteers", "--input"])
        .arg(input.path())
        .assert()
        .success()
        .stdout(predicates::str::contains("\"A\""))
        .stdout(predicates::str::contains("\"C\""))
        .stdout(predicates::str::contains("\"B\"").not());
}

#[test]
fn test_dedupe_from_stdin() {
    adminapi()
        .args(["dedupe", "guests"])
        .write_stdin(r#"[{"phone": "+91 98765 43210"}, {"personalNumber": "9876543210"}]"#)
        .assert()
        .success()
        .stdout(predicates::str::contains("+91 98765 43210"))
        .stdout(predicates::str::contains("personalNumber").not());
}
