//! Ingestion events and webhook authenticity.
//!
//! The HTTP surface lives elsewhere; this module owns the event shape, the
//! accept/ignore filter, and signature verification over the raw body.

use serde::{Deserialize, Serialize};

/// Signature header value prefix for SHA-256 HMACs.
const SIGNATURE_PREFIX: &str = "sha256=";

/// A workflow-run event as delivered by the code host.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowRunEvent {
    pub action: String,
    pub workflow_run: WorkflowRun,
    pub repository: Repository,
    #[serde(default)]
    pub installation: Option<Installation>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowRun {
    pub id: i64,
    pub head_sha: String,
    pub head_branch: String,
    pub conclusion: Option<String>,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Repository {
    /// `owner/name`
    pub full_name: String,
    pub clone_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Installation {
    pub id: i64,
}

/// A failure event accepted into the pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct FailureEvent {
    pub run_id: i64,
    pub repo: String,
    pub sha: String,
    pub branch: String,
    pub workflow_name: String,
    pub clone_url: String,
    pub installation_id: Option<i64>,
}

/// Outcome of the ingestion filter.
#[derive(Debug, Clone)]
pub enum EventDecision {
    Accept(FailureEvent),
    Ignore(&'static str),
}

/// Decide whether an event should start a pipeline.
///
/// Only completed runs that concluded in failure are acted on; everything
/// else is acknowledged and dropped.
pub fn screen_event(event: &WorkflowRunEvent) -> EventDecision {
    if event.action != "completed" {
        return EventDecision::Ignore("action is not completed");
    }
    match event.workflow_run.conclusion.as_deref() {
        Some("failure") => {}
        _ => return EventDecision::Ignore("conclusion is not failure"),
    }

    EventDecision::Accept(FailureEvent {
        run_id: event.workflow_run.id,
        repo: event.repository.full_name.clone(),
        sha: event.workflow_run.head_sha.clone(),
        branch: event.workflow_run.head_branch.clone(),
        workflow_name: event.workflow_run.name.clone(),
        clone_url: event.repository.clone_url.clone(),
        installation_id: event.installation.as_ref().map(|i| i.id),
    })
}

/// Verify a webhook signature header against the raw request body.
///
/// The header carries `sha256=<hex HMAC-SHA-256 of the body>` keyed with the
/// shared secret. Comparison is constant-time via the Mac verifier.
pub fn verify_signature(secret: &str, body: &[u8], signature_header: &str) -> bool {
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    let Some(hex_digest) = signature_header.strip_prefix(SIGNATURE_PREFIX) else {
        return false;
    };
    let Ok(expected) = hex::decode(hex_digest) else {
        return false;
    };

    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

/// Compute the signature header value for a body (used by tests and tools).
pub fn sign_body(secret: &str, body: &[u8]) -> String {
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(body);
    format!("{}{}", SIGNATURE_PREFIX, hex::encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_event(action: &str, conclusion: Option<&str>) -> WorkflowRunEvent {
        WorkflowRunEvent {
            action: action.to_string(),
            workflow_run: WorkflowRun {
                id: 1001,
                head_sha: "a1b2".to_string(),
                head_branch: "main".to_string(),
                conclusion: conclusion.map(String::from),
                name: "CI".to_string(),
            },
            repository: Repository {
                full_name: "acme/x".to_string(),
                clone_url: "https://github.test/acme/x.git".to_string(),
            },
            installation: Some(Installation { id: 7 }),
        }
    }

    #[test]
    fn test_screen_accepts_completed_failures_only() {
        match screen_event(&sample_event("completed", Some("failure"))) {
            EventDecision::Accept(event) => {
                assert_eq!(event.run_id, 1001);
                assert_eq!(event.repo, "acme/x");
                assert_eq!(event.installation_id, Some(7));
            }
            EventDecision::Ignore(_) => panic!("should accept"),
        }

        for (action, conclusion) in [
            ("requested", Some("failure")),
            ("completed", Some("success")),
            ("completed", Some("cancelled")),
            ("completed", Some("skipped")),
            ("completed", None),
        ] {
            assert!(matches!(
                screen_event(&sample_event(action, conclusion)),
                EventDecision::Ignore(_)
            ));
        }
    }

    #[test]
    fn test_event_deserializes_from_webhook_json() {
        let json = r#"{
            "action": "completed",
            "workflow_run": {
                "id": 1001,
                "head_sha": "a1b2",
                "head_branch": "main",
                "conclusion": "failure",
                "name": "CI"
            },
            "repository": {
                "full_name": "acme/x",
                "clone_url": "https://github.test/acme/x.git"
            }
        }"#;

        let event: WorkflowRunEvent = serde_json::from_str(json).unwrap();
        assert!(event.installation.is_none());
        assert!(matches!(screen_event(&event), EventDecision::Accept(_)));
    }

    #[test]
    fn test_signature_round_trip() {
        let body = br#"{"action": "completed"}"#;
        let header = sign_body("shhh", body);
        assert!(header.starts_with("sha256="));
        assert!(verify_signature("shhh", body, &header));
    }

    #[test]
    fn test_signature_rejects_tampering() {
        let body = br#"{"action": "completed"}"#;
        let header = sign_body("shhh", body);

        assert!(!verify_signature("shhh", br#"{"action": "requested"}"#, &header));
        assert!(!verify_signature("wrong-secret", body, &header));
        assert!(!verify_signature("shhh", body, "sha256=deadbeef"));
        assert!(!verify_signature("shhh", body, "not-a-signature"));
    }
}
