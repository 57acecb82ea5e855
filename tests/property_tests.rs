//! Property-based tests for identifiers, history and trigger resolution.
//!
//! These tests use proptest to verify properties hold across
//! many randomly generated inputs.

use chrono::Utc;
use fusium::core::{bare_trigger, local_trigger_key, normalize_id};
use fusium::{ErrorKind, StateChange, StateHistory, StateMachine};
use proptest::prelude::*;

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(future)
}

prop_compose! {
    fn arbitrary_name()(name in "[a-zA-Z][a-zA-Z0-9 _.-]{0,16}") -> String {
        name
    }
}

proptest! {
    #[test]
    fn normalize_is_idempotent(name in "[ -~]{0,24}") {
        let once = normalize_id(&name);
        prop_assert_eq!(normalize_id(&once), once);
    }

    #[test]
    fn normalized_ids_are_lowercase_kebab(name in "[ -~]{0,24}") {
        let id = normalize_id(&name);
        prop_assert!(id
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
        prop_assert!(!id.starts_with('-'));
        prop_assert!(!id.ends_with('-'));
        prop_assert!(!id.contains("--"));
    }

    #[test]
    fn names_with_a_letter_never_normalize_to_empty(name in arbitrary_name()) {
        prop_assert!(!normalize_id(&name).is_empty());
    }

    #[test]
    fn bare_trigger_recovers_normalized_trigger(
        state in arbitrary_name(),
        trigger in arbitrary_name(),
    ) {
        let key = local_trigger_key(&normalize_id(&state), &trigger);
        prop_assert_eq!(bare_trigger(&key), normalize_id(&trigger));
    }

    #[test]
    fn history_path_follows_recorded_changes(
        targets in prop::collection::vec("[a-z]{1,8}", 1..10)
    ) {
        let mut history = StateHistory::new();
        let mut from: Option<String> = None;
        for to in &targets {
            history.record(StateChange {
                from: from.clone(),
                to: to.clone(),
                trigger: None,
                timestamp: Utc::now(),
            });
            from = Some(to.clone());
        }

        let path: Vec<String> = history.get_path().iter().map(|s| s.to_string()).collect();
        prop_assert_eq!(path, targets);
    }

    #[test]
    fn bounded_history_never_exceeds_limit(
        limit in 0usize..16,
        count in 0usize..64,
    ) {
        let mut history = StateHistory::with_limit(limit);
        for i in 0..count {
            history.record(StateChange {
                from: None,
                to: format!("s{i}"),
                trigger: None,
                timestamp: Utc::now(),
            });
        }

        prop_assert_eq!(history.len(), count.min(limit));
        if let Some(last) = history.changes().back() {
            prop_assert_eq!(last.to.clone(), format!("s{}", count - 1));
        }
    }

    #[test]
    fn start_without_states_always_fails(name in arbitrary_name()) {
        let machine = StateMachine::new(name);
        let err = block_on(machine.start()).unwrap_err();
        prop_assert_eq!(err.kind, ErrorKind::NoStatesDefined);
    }

    #[test]
    fn local_transition_always_shadows_global(trigger in arbitrary_name()) {
        let machine = StateMachine::new("shadowing");
        let origin = machine.create_state("origin", false, None, None).unwrap();
        let local = machine.create_state("local target", false, None, None).unwrap();
        let global = machine.create_state("global target", false, None, None).unwrap();
        origin.add_transition(&trigger, &local).unwrap();
        machine.add_global_transition(&trigger, &global).unwrap();

        block_on(async {
            machine.start().await.unwrap();
            machine.trigger(&trigger).await.unwrap();
        });

        prop_assert_eq!(machine.current_state(), Some(local));
    }

    #[test]
    fn chain_of_states_is_walked_in_order(length in 2usize..8) {
        let machine = StateMachine::new("chain");
        let states: Vec<_> = (0..length)
            .map(|i| {
                machine
                    .create_state(&format!("step {i}"), i == length - 1, None, None)
                    .unwrap()
            })
            .collect();
        for pair in states.windows(2) {
            pair[0].add_transition("next", &pair[1]).unwrap();
        }

        block_on(async {
            machine.start().await.unwrap();
            for _ in 1..length {
                machine.trigger("next").await.unwrap();
            }
        });

        let expected: Vec<String> = (0..length).map(|i| format!("step-{i}")).collect();
        let path: Vec<String> = machine
            .history()
            .get_path()
            .iter()
            .map(|s| s.to_string())
            .collect();
        prop_assert_eq!(path, expected);
        prop_assert!(machine.is_complete());
        prop_assert_eq!(
            block_on(machine.trigger("next")).unwrap_err().kind,
            ErrorKind::Completed
        );
    }
}
