// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn alice() -> Identity {
    Identity {
        id: "u-1".to_owned(),
        name: "Alice".to_owned(),
        email: "alice@example.com".to_owned(),
        role: "user".to_owned(),
    }
}

#[test]
fn starts_empty() {
    let state = SessionState::new();
    assert!(state.current_credential().is_none());
    assert!(state.current_identity().is_none());
    assert!(!state.is_authenticated());
}

#[test]
fn writes_are_visible_immediately() {
    let state = SessionState::new();
    state.set_credential(Credential::new("tok-1"));
    assert_eq!(state.current_credential(), Some(Credential::new("tok-1")));
    assert!(state.is_authenticated());

    state.set_identity(alice());
    assert_eq!(state.current_identity(), Some(alice()));

    state.set_credential(Credential::new("tok-2"));
    assert_eq!(state.current_credential(), Some(Credential::new("tok-2")));
    // Identity survives a credential swap.
    assert_eq!(state.current_identity(), Some(alice()));
}

#[test]
fn establish_sets_both() {
    let state = SessionState::new();
    state.establish(Credential::new("tok"), alice());
    assert_eq!(state.current_credential().as_ref().map(Credential::as_str), Some("tok"));
    assert_eq!(state.current_identity(), Some(alice()));
}

#[test]
fn clear_is_idempotent() {
    let state = SessionState::new();
    state.establish(Credential::new("tok"), alice());

    state.clear();
    assert!(state.current_credential().is_none());
    assert!(state.current_identity().is_none());

    state.clear();
    assert!(state.current_credential().is_none());
    assert!(state.current_identity().is_none());
}

#[test]
fn credential_debug_is_redacted() {
    let cred = Credential::new("secret-token");
    let shown = format!("{cred:?}");
    assert!(!shown.contains("secret-token"));
}

#[test]
fn session_event_serializes_with_tag() -> anyhow::Result<()> {
    let event = SessionEvent::Ended { reason: EndReason::RenewalFailed };
    let json = serde_json::to_value(&event)?;
    assert_eq!(json["event"], "ended");
    assert_eq!(json["reason"], "renewal_failed");
    Ok(())
}
