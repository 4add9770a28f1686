use std::sync::Arc;

use httpmock::prelude::*;
use httpmock::Mock;
use lifecycle_core::issue_event::parse_issue_hook;
use lifecycle_core::policy_config::LifecycleConfig;
use lifecycle_runtime::{
    CloseGuard, CloseGuardOutcome, EnterpriseApiClient, EnterpriseApiConfig, GiteeApiClient,
    GiteeApiConfig,
};
use lifecycle_runtime::close_guard::{LIST_OPERATE_LOGS_OPERATION, LIST_PULL_REQUESTS_OPERATION};
use serde_json::json;

const ISSUE_PATH: &str = "/v5/repos/openeuler/kernel/issues/I7XYZ";

struct GiteeFixture<'a> {
    linked: Mock<'a>,
    logs: Mock<'a>,
    catalog: Mock<'a>,
    revert: Mock<'a>,
    comment: Mock<'a>,
}

fn mount_gitee(
    server: &MockServer,
    linked_pull_requests: bool,
    revert_status: u16,
) -> GiteeFixture<'_> {
    let linked = server.mock(|when, then| {
        when.method(GET)
            .path(format!("{ISSUE_PATH}/pull_requests"))
            .query_param("access_token", "v5-token");
        let pulls = if linked_pull_requests {
            json!([{"number": 12, "title": "fix kernel panic"}])
        } else {
            json!([])
        };
        then.status(200).json_body(pulls);
    });
    let logs = server.mock(|when, then| {
        when.method(GET)
            .path("/v5/repos/openeuler/issues/I7XYZ/operate_logs")
            .query_param("repo", "kernel")
            .query_param("sort", "desc");
        then.status(200).json_body(json!([
            {"id": 31, "content": "alice changed task state from InProgress closed"},
            {"id": 30, "content": "alice changed task state from Open InProgress"}
        ]));
    });
    let catalog = server.mock(|when, then| {
        when.method(GET)
            .path("/enterprises/5566/issue_states")
            .query_param("access_token", "v8-token");
        then.status(200).json_body(json!({
            "data": [{"title": "Open", "id": 1}, {"title": "InProgress", "id": 2}]
        }));
    });
    let revert = server.mock(|when, then| {
        when.method(PUT)
            .path("/enterprises/5566/issues/4242")
            .json_body(json!({"access_token": "v8-token", "issue_state_id": 2}));
        then.status(revert_status).json_body(json!({"id": 4242}));
    });
    let comment = server.mock(|when, then| {
        when.method(POST)
            .path(format!("{ISSUE_PATH}/comments"))
            .body_includes("***@alice***")
            .body_includes("can't close an issue");
        then.status(201).json_body(json!({"id": 9001}));
    });
    GiteeFixture {
        linked,
        logs,
        catalog,
        revert,
        comment,
    }
}

fn close_guard(server: &MockServer) -> CloseGuard {
    let config = LifecycleConfig::from_json_str(
        r#"{"config_items":[{"repos":["openeuler"],"need_issue_has_link_pull_requests":true}]}"#,
    )
    .expect("policy config");
    let issues = GiteeApiClient::new(GiteeApiConfig {
        api_base: server.url("/v5"),
        access_token: "v5-token".to_string(),
    })
    .expect("gitee client");
    let states = EnterpriseApiClient::new(EnterpriseApiConfig {
        api_base: server.url("/enterprises"),
        enterprise_id: "5566".to_string(),
        access_token: "v8-token".to_string(),
    })
    .expect("enterprise client");
    CloseGuard::new(Arc::new(config), Arc::new(issues), Arc::new(states))
}

fn close_hook() -> Vec<u8> {
    serde_json::to_vec(&json!({
        "action": "state_change",
        "state": "closed",
        "issue": {"id": 4242, "number": "I7XYZ", "state": "closed"},
        "repository": {"namespace": "openeuler", "path": "kernel", "full_name": "openeuler/kernel"},
        "user": {"login": "alice"}
    }))
    .expect("serialize hook")
}

#[tokio::test]
async fn integration_close_without_linked_pull_request_is_reverted_and_actor_notified() {
    let server = MockServer::start_async().await;
    let gitee = mount_gitee(&server, false, 200);
    let event = parse_issue_hook(&close_hook()).expect("event");

    let outcome = close_guard(&server)
        .handle_issue_event(&event)
        .await
        .expect("handled");
    assert_eq!(
        outcome,
        CloseGuardOutcome::Reverted {
            state_name: "InProgress".to_string(),
            state_id: 2,
        }
    );
    gitee.linked.assert_calls(1);
    gitee.logs.assert_calls(1);
    gitee.catalog.assert_calls(1);
    gitee.revert.assert_calls(1);
    gitee.comment.assert_calls(1);
}

#[tokio::test]
async fn integration_rejected_revert_posts_no_comment_and_returns_no_error() {
    let server = MockServer::start_async().await;
    let gitee = mount_gitee(&server, false, 500);
    let event = parse_issue_hook(&close_hook()).expect("event");

    let outcome = close_guard(&server)
        .handle_issue_event(&event)
        .await
        .expect("soft failure is not an error");
    assert_eq!(outcome.reason_code(), "revert_rejected");
    gitee.revert.assert_calls(1);
    gitee.comment.assert_calls(0);
}

#[tokio::test]
async fn integration_linked_pull_request_makes_close_a_no_op() {
    let server = MockServer::start_async().await;
    let gitee = mount_gitee(&server, true, 200);
    let event = parse_issue_hook(&close_hook()).expect("event");

    let outcome = close_guard(&server)
        .handle_issue_event(&event)
        .await
        .expect("handled");
    assert_eq!(outcome, CloseGuardOutcome::HasLinkedPullRequests);
    gitee.linked.assert_calls(1);
    gitee.logs.assert_calls(0);
    gitee.catalog.assert_calls(0);
    gitee.revert.assert_calls(0);
    gitee.comment.assert_calls(0);
}

#[tokio::test]
async fn regression_redelivered_close_event_is_handled_again_without_dedup() {
    let server = MockServer::start_async().await;
    let gitee = mount_gitee(&server, false, 200);
    let event = parse_issue_hook(&close_hook()).expect("event");
    let guard = close_guard(&server);

    for _ in 0..2 {
        let outcome = guard.handle_issue_event(&event).await.expect("handled");
        assert_eq!(outcome.reason_code(), "close_reverted");
    }
    gitee.catalog.assert_calls(2);
    gitee.revert.assert_calls(2);
    gitee.comment.assert_calls(2);
}

#[tokio::test]
async fn regression_repo_outside_policy_scope_makes_no_remote_calls() {
    let server = MockServer::start_async().await;
    let gitee = mount_gitee(&server, false, 200);
    let mut event = parse_issue_hook(&close_hook()).expect("event");
    event.org = "src-openeuler".to_string();

    let outcome = close_guard(&server)
        .handle_issue_event(&event)
        .await
        .expect("handled");
    assert_eq!(
        outcome,
        CloseGuardOutcome::PolicyNotApplied {
            reason_code: "policy_outside_scope",
        }
    );
    gitee.linked.assert_calls(0);
}

#[tokio::test]
async fn regression_unavailable_link_check_is_absorbed_without_further_calls() {
    let server = MockServer::start_async().await;
    let linked = server.mock(|when, then| {
        when.method(GET).path(format!("{ISSUE_PATH}/pull_requests"));
        then.status(503).body("upstream unavailable");
    });
    let logs = server.mock(|when, then| {
        when.method(GET)
            .path("/v5/repos/openeuler/issues/I7XYZ/operate_logs");
        then.status(200).json_body(json!([]));
    });
    let event = parse_issue_hook(&close_hook()).expect("event");

    let outcome = close_guard(&server)
        .handle_issue_event(&event)
        .await
        .expect("protocol error is absorbed");
    assert_eq!(
        outcome,
        CloseGuardOutcome::CollaboratorRejected {
            operation: LIST_PULL_REQUESTS_OPERATION,
            reason_code: "gitee_unexpected_status",
        }
    );
    linked.assert_calls(1);
    logs.assert_calls(0);
}

#[tokio::test]
async fn regression_undecodable_operate_log_is_absorbed_without_revert() {
    let server = MockServer::start_async().await;
    let linked = server.mock(|when, then| {
        when.method(GET).path(format!("{ISSUE_PATH}/pull_requests"));
        then.status(200).json_body(json!([]));
    });
    let logs = server.mock(|when, then| {
        when.method(GET)
            .path("/v5/repos/openeuler/issues/I7XYZ/operate_logs");
        then.status(200).body("<html>maintenance</html>");
    });
    let revert = server.mock(|when, then| {
        when.method(PUT).path("/enterprises/5566/issues/4242");
        then.status(200).json_body(json!({"id": 4242}));
    });
    let event = parse_issue_hook(&close_hook()).expect("event");

    let outcome = close_guard(&server)
        .handle_issue_event(&event)
        .await
        .expect("protocol error is absorbed");
    assert_eq!(
        outcome,
        CloseGuardOutcome::CollaboratorRejected {
            operation: LIST_OPERATE_LOGS_OPERATION,
            reason_code: "gitee_invalid_response",
        }
    );
    linked.assert_calls(1);
    logs.assert_calls(1);
    revert.assert_calls(0);
}
