//! Transition rules between device cgroup policies.

use proptest::prelude::*;
use rustbox_fuzz::kernel::cgroup::devices::{Emulator, Rule};
use rustbox_fuzz::RuntimeError;

fn arb_number() -> impl Strategy<Value = String> {
    prop_oneof![Just("*".to_string()), (0u32..4).prop_map(|n| n.to_string())]
}

fn arb_perms() -> impl Strategy<Value = String> {
    prop::sample::subsequence(vec!['r', 'w', 'm'], 1..=3).prop_map(|p| p.into_iter().collect())
}

fn arb_line() -> impl Strategy<Value = String> {
    let prefix = prop::sample::select(vec!["", "allow ", "deny "]);
    prop_oneof![
        1 => prefix.clone().prop_map(|p| format!("{p}a *:* rwm")),
        6 => (
            prefix,
            prop::sample::select(vec!['b', 'c']),
            arb_number(),
            arb_number(),
            arb_perms()
        )
            .prop_map(|(p, t, major, minor, perms)| format!("{p}{t} {major}:{minor} {perms}")),
    ]
}

fn arb_list() -> impl Strategy<Value = String> {
    prop::collection::vec(arb_line(), 0..8).prop_map(|lines| lines.join("\n"))
}

fn apply_all(mut emulator: Emulator, rules: &[Rule]) -> Result<Emulator, RuntimeError> {
    for rule in rules {
        emulator.apply(rule)?;
    }
    Ok(emulator)
}

fn is_wildcard_refusal(err: &RuntimeError) -> bool {
    matches!(err, RuntimeError::Device(msg) if msg.contains("covered by wildcard exception"))
}

#[test]
fn test_identical_policies_need_no_rules() {
    let a = Emulator::from_list("c 1:3 rw\nb 8:* r").unwrap();
    assert!(a.transition(&a.clone()).is_empty());
    assert!(Emulator::new().transition(&Emulator::new()).is_empty());
}

#[test]
fn test_allow_all_to_deny_all() {
    let a = Emulator::from_list("a *:* rwm").unwrap();
    let b = Emulator::from_list("deny a *:* rwm").unwrap();
    assert_eq!(a.transition(&b), vec![Rule::blanket(false)]);
}

#[test]
fn test_default_change_comes_first() {
    let a = Emulator::from_list("c 1:3 rw").unwrap();
    let b = Emulator::from_list("a *:* rwm\ndeny c 1:5 m").unwrap();
    let rules = a.transition(&b);
    assert_eq!(rules[0], Rule::blanket(true));
    assert_eq!(rules.len(), 2);
    assert_eq!(apply_all(a, &rules).ok(), Some(b));
}

#[test]
fn test_partial_permission_changes() {
    let a = Emulator::from_list("c 1:3 rwm\nc 1:5 r").unwrap();
    let b = Emulator::from_list("c 1:3 r\nc 1:5 rw\nb 8:0 m").unwrap();
    let rules = a.transition(&b);
    let text: Vec<String> = rules.iter().map(ToString::to_string).collect();
    assert_eq!(
        text,
        vec!["deny c 1:3 wm", "allow b 8:0 m", "allow c 1:5 w"]
    );
    assert_eq!(apply_all(a, &rules).ok(), Some(b));
}

#[test]
fn test_grant_under_kept_wildcard_is_refused() {
    let a = Emulator::from_list("a *:* rwm\ndeny c *:* r\ndeny c 1:3 r").unwrap();
    let b = Emulator::from_list("a *:* rwm\ndeny c *:* r").unwrap();
    let rules = a.transition(&b);
    let text: Vec<String> = rules.iter().map(ToString::to_string).collect();
    assert_eq!(text, vec!["allow c 1:3 r"]);

    let err = apply_all(a, &rules).unwrap_err();
    assert!(is_wildcard_refusal(&err), "{err}");
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(512))]

    /// The emitted rules reach the target unless one is refused for
    /// landing under a wildcard exception.
    #[test]
    fn prop_transition_reaches_target(a_text in arb_list(), b_text in arb_list()) {
        let (Ok(a), Ok(b)) = (Emulator::from_list(&a_text), Emulator::from_list(&b_text)) else {
            return Ok(());
        };
        let rules = a.transition(&b);
        match apply_all(a, &rules) {
            Ok(reached) => prop_assert_eq!(reached, b),
            Err(err) => prop_assert!(is_wildcard_refusal(&err), "{}", err),
        }
    }

    #[test]
    fn prop_transition_is_deterministic(a_text in arb_list(), b_text in arb_list()) {
        let (Ok(a), Ok(b)) = (Emulator::from_list(&a_text), Emulator::from_list(&b_text)) else {
            return Ok(());
        };
        prop_assert_eq!(a.transition(&b), a.transition(&b));
    }

    #[test]
    fn prop_self_transition_is_empty(text in arb_list()) {
        if let Ok(a) = Emulator::from_list(&text) {
            prop_assert!(a.transition(&a).is_empty());
        }
    }
}
