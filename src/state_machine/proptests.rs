//! Property-based tests for the call state machine
//!
//! These tests verify key invariants hold across all possible inputs.

use super::state::*;
use super::transition::*;
use super::*;
use crate::engine::{EngineReply, TransferReason};
use crate::session::CallStatus;
use proptest::prelude::*;

// ============================================================================
// Test Helpers
// ============================================================================

fn test_context(threshold: u32) -> CallContext {
    CallContext::new("session_prop", threshold)
}

/// Position in the Pending -> Active -> final ordering
fn rank(status: CallStatus) -> u8 {
    match status {
        CallStatus::Pending => 0,
        CallStatus::Active => 1,
        CallStatus::Completed | CallStatus::Transferred | CallStatus::Failed => 2,
    }
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_transfer_reason() -> impl Strategy<Value = TransferReason> {
    prop_oneof![
        Just(TransferReason::CallerRequested),
        Just(TransferReason::OutOfScope),
        Just(TransferReason::SilenceThreshold),
        Just(TransferReason::Manual),
    ]
}

fn arb_reply() -> impl Strategy<Value = EngineReply> {
    ("[a-zA-Z ,.]{1,40}", proptest::option::of(arb_transfer_reason()))
        .prop_map(|(reply, transfer)| EngineReply { reply, transfer })
}

fn arb_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        Just(Event::StartCall),
        Just(Event::TransferRequested),
        Just(Event::EndCall),
        "[a-z ]{1,20}".prop_map(|message| Event::Fail { message }),
        "[a-zA-Z ]{0,30}".prop_map(|text| Event::CallerUtterance { text }),
        arb_reply().prop_map(|reply| Event::AssistantReply { reply }),
        Just(Event::SilenceTick),
        Just(Event::SilenceTick),
    ]
}

fn arb_terminal_state() -> impl Strategy<Value = CallState> {
    prop_oneof![
        Just(CallState::Completed),
        arb_transfer_reason().prop_map(|reason| CallState::Transferred { reason }),
        "[a-z ]{1,20}".prop_map(|message| CallState::Failed { message }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    // Invariant 1: status never moves backwards, terminal states stay put
    #[test]
    fn prop_status_is_monotonic(
        events in proptest::collection::vec(arb_event(), 0..40),
        threshold in 1u32..6,
    ) {
        let ctx = test_context(threshold);
        let mut state = CallState::Pending;

        for event in events {
            let before = state.status();
            match transition(&state, &ctx, event) {
                Ok(result) => {
                    prop_assert!(!state.is_terminal(), "Terminal state accepted an event");
                    prop_assert!(rank(result.new_state.status()) >= rank(before));
                    state = result.new_state;
                }
                Err(_) => { /* Invalid transition is OK */ }
            }
        }
    }

    // Invariant 2: a summary is produced exactly when the call completes
    #[test]
    fn prop_summary_iff_completed(
        events in proptest::collection::vec(arb_event(), 0..40),
    ) {
        let ctx = test_context(3);
        let mut state = CallState::Pending;

        for event in events {
            if let Ok(result) = transition(&state, &ctx, event) {
                let summarizes = result.effects.contains(&Effect::GenerateSummary);
                prop_assert_eq!(summarizes, result.new_state == CallState::Completed);
                state = result.new_state;
            }
        }
    }

    // Invariant 3: engine is only consulted with a reply slot open
    #[test]
    fn prop_consult_only_when_awaiting(
        events in proptest::collection::vec(arb_event(), 0..40),
    ) {
        let ctx = test_context(4);
        let mut state = CallState::Pending;

        for event in events {
            if let Ok(result) = transition(&state, &ctx, event) {
                let consults = result
                    .effects
                    .iter()
                    .any(|e| matches!(e, Effect::ConsultEngine { .. }));
                if consults {
                    let awaiting = matches!(
                        result.new_state,
                        CallState::Active { awaiting_reply: true, .. }
                    );
                    prop_assert!(awaiting);
                }
                state = result.new_state;
            }
        }
    }

    // Invariant 4: every transfer announces its reason and stamps the end
    #[test]
    fn prop_transfer_announces_reason(
        events in proptest::collection::vec(arb_event(), 0..40),
        threshold in 1u32..6,
    ) {
        let ctx = test_context(threshold);
        let mut state = CallState::Pending;

        for event in events {
            if let Ok(result) = transition(&state, &ctx, event) {
                if let CallState::Transferred { reason } = &result.new_state {
                    prop_assert!(result.effects.contains(&Effect::assistant_turn(transfer_notice(*reason))));
                    prop_assert!(result.effects.contains(&Effect::StampEnd));
                }
                state = result.new_state;
            }
        }
    }

    // Invariant 5: silence transfers exactly at the threshold
    #[test]
    fn prop_silence_threshold(threshold in 1u32..30, ticks in 0u32..40) {
        let ctx = test_context(threshold);
        let mut state = CallState::active();

        for _ in 0..ticks {
            if state.is_terminal() {
                break;
            }
            state = transition(&state, &ctx, Event::SilenceTick).unwrap().new_state;
        }

        let transferred = state == CallState::Transferred { reason: TransferReason::SilenceThreshold };
        prop_assert_eq!(transferred, ticks >= threshold);
    }

    // Invariant 6: terminal states reject every event
    #[test]
    fn prop_terminal_rejects_all(state in arb_terminal_state(), event in arb_event()) {
        let result = transition(&state, &test_context(3), event);
        prop_assert!(matches!(result, Err(TransitionError::CallEnded(_))));
    }

    // Invariant 7: failure is only reachable before the call ends
    #[test]
    fn prop_fail_from_live_states(silent in 0u32..5, awaiting in any::<bool>()) {
        let ctx = test_context(10);
        for state in [CallState::Pending, CallState::Active { silent_secs: silent, awaiting_reply: awaiting }] {
            let result = transition(&state, &ctx, Event::Fail { message: "x".into() }).unwrap();
            prop_assert_eq!(result.new_state.status(), CallStatus::Failed);
        }
    }
}
