//! Tests for TokenManager: acquisition, failure reporting and proactive refresh.

mod common;

use rstest::rstest;

use icdsync::application::ApplicationError;
use icdsync::infrastructure::traits::HttpResponse;

use common::{start_time, token_ok, Harness, TOKEN_URL};

#[test]
fn given_valid_credentials_when_acquiring_then_token_held_with_issue_time() {
    // Arrange
    let h = Harness::new();
    h.api.queue_token(token_ok("abc", 3600));
    let mut tokens = h.token_manager();

    // Act
    let token = tokens.acquire().unwrap().clone();

    // Assert
    assert_eq!(token.value, "abc");
    assert_eq!(token.expires_in, 3600);
    assert_eq!(token.issued_at, start_time());
    assert_eq!(tokens.token(), Some(&token));
}

#[test]
fn given_acquire_when_posting_then_sends_client_credentials_form() {
    // Arrange
    let h = Harness::new();
    let mut tokens = h.token_manager();

    // Act
    tokens.acquire().unwrap();

    // Assert
    let requests = h.api.token_requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.url, TOKEN_URL);
    assert_eq!(request.param("client_id"), Some("test-client"));
    assert_eq!(request.param("client_secret"), Some("test-secret"));
    assert_eq!(request.param("grant_type"), Some("client_credentials"));
    assert_eq!(request.param("scope"), Some("icdapi_access"));
}

#[test]
fn given_rejection_when_acquiring_then_auth_error_carries_body() {
    // Arrange
    let h = Harness::new();
    h.api
        .queue_token(HttpResponse::new(400, r#"{"error":"invalid_client"}"#));
    let mut tokens = h.token_manager();

    // Act
    let err = tokens.acquire().unwrap_err();

    // Assert
    match &err {
        ApplicationError::Auth { status, body } => {
            assert_eq!(*status, 400);
            assert_eq!(body, r#"{"error":"invalid_client"}"#);
        }
        other => panic!("expected auth error, got {:?}", other),
    }
    assert!(err.to_string().contains("invalid_client"));
    assert!(tokens.token().is_none());
}

#[test]
fn given_success_without_token_field_when_acquiring_then_auth_error() {
    // Arrange
    let h = Harness::new();
    h.api
        .queue_token(HttpResponse::new(200, r#"{"token_type":"Bearer"}"#));
    let mut tokens = h.token_manager();

    // Act
    let result = tokens.acquire();

    // Assert
    assert!(matches!(result, Err(ApplicationError::Auth { status: 200, .. })));
}

#[test]
fn given_unreachable_endpoint_when_acquiring_then_transport_error() {
    // Arrange
    let h = Harness::new();
    h.api.set_offline(true);
    let mut tokens = h.token_manager();

    // Act
    let result = tokens.acquire();

    // Assert
    assert!(matches!(result, Err(ApplicationError::Transport { .. })));
}

#[test]
fn given_no_token_when_ensuring_fresh_then_acquires() {
    // Arrange
    let h = Harness::new();
    let mut tokens = h.token_manager();
    assert!(tokens.refresh_due());

    // Act
    let value = tokens.ensure_fresh().unwrap().to_string();

    // Assert
    assert_eq!(value, "token-1");
    assert_eq!(h.api.token_requests().len(), 1);
}

#[rstest]
#[case::fresh(0, 1, "token-1")]
#[case::one_second_before_margin(3299, 1, "token-1")]
#[case::at_margin(3300, 2, "token-2")]
#[case::expired(3600, 2, "token-2")]
#[case::long_expired(86_400, 2, "token-2")]
fn given_elapsed_time_when_ensuring_fresh_then_refreshes_only_within_margin(
    #[case] elapsed: i64,
    #[case] expected_requests: usize,
    #[case] expected_token: &str,
) {
    // Arrange
    let h = Harness::new();
    let mut tokens = h.token_manager();
    tokens.acquire().unwrap();
    h.clock.advance(elapsed);

    // Act
    let value = tokens.ensure_fresh().unwrap().to_string();

    // Assert
    assert_eq!(value, expected_token);
    assert_eq!(h.api.token_requests().len(), expected_requests);
}

#[test]
fn given_refreshed_token_when_time_passes_then_margin_counts_from_new_issue() {
    // Arrange
    let h = Harness::new();
    let mut tokens = h.token_manager();
    tokens.acquire().unwrap();
    h.clock.advance(3300);
    tokens.ensure_fresh().unwrap();

    // Act
    h.clock.advance(3299);
    let value = tokens.ensure_fresh().unwrap().to_string();

    // Assert
    assert_eq!(value, "token-2");
    assert_eq!(h.api.token_requests().len(), 2);
}

#[test]
fn given_refresh_failure_when_ensuring_fresh_then_error_and_old_token_kept() {
    // Arrange
    let h = Harness::new();
    let mut tokens = h.token_manager();
    tokens.acquire().unwrap();
    h.api
        .queue_token(HttpResponse::new(500, "token service down"));
    h.clock.advance(3300);

    // Act
    let result = tokens.ensure_fresh();

    // Assert
    assert!(matches!(result, Err(ApplicationError::Auth { status: 500, .. })));
    assert_eq!(tokens.token().map(|t| t.value.as_str()), Some("token-1"));
    assert!(tokens.refresh_due());
}

#[test]
fn given_short_lived_grant_when_acquired_then_refresh_due_immediately() {
    // Arrange
    let h = Harness::new();
    h.api.queue_token(token_ok("short", 120));
    let mut tokens = h.token_manager();

    // Act
    tokens.acquire().unwrap();

    // Assert
    assert!(tokens.refresh_due());
}

#[rstest]
#[case::beyond_date_range(9_000_000_000_000_000)]
#[case::max(i64::MAX)]
#[case::min(i64::MIN)]
fn given_out_of_range_expires_in_when_acquiring_then_auth_error_and_no_token(
    #[case] expires_in: i64,
) {
    // Arrange
    let h = Harness::new();
    h.api.queue_token(token_ok("odd", expires_in));
    let mut tokens = h.token_manager();

    // Act
    let result = tokens.acquire();

    // Assert
    match result {
        Err(ApplicationError::Auth { status, body }) => {
            assert_eq!(status, 200);
            assert!(body.contains("expires_in"));
        }
        other => panic!("expected auth error, got {:?}", other),
    }
    assert!(tokens.token().is_none());
    assert!(tokens.refresh_due());
}
