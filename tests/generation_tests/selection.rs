use std::collections::HashSet;

use infini_prompt::{GenerationRequest, Generator, GlobalLedger, PromptError, Template};
use pretty_assertions::assert_eq;

use super::{render, render_ok, with_data};

const NAMES: &[&str] = &["alice", "bob", "charlie", "david"];

#[test]
fn test_normal_selection_resolves_the_pick() {
    let data: &[(&str, &[&str])] = &[
        ("greeting", &["hello {name}", "hi {name}"]),
        ("name", &["Ann"]),
    ];
    for seed in 1..10 {
        let output = render(&with_data("{greeting}", data), seed).unwrap();
        assert!(output == "hello Ann" || output == "hi Ann", "{}", output);
    }
}

#[test]
fn test_same_seed_same_output() {
    let template = with_data(
        "{name} {name} {name} {x:3|{name}}",
        &[("name", NAMES)],
    );
    let first = render(&template, 1234).unwrap();
    for _ in 0..3 {
        assert_eq!(render(&template, 1234).unwrap(), first);
    }
}

#[test]
fn test_exclusive_within_pass() {
    for seed in 1..20 {
        let output = render(
            &with_data("{@:names} {@:names} {@:names} {@:names}", &[("names", NAMES)]),
            seed,
        )
        .unwrap();
        let drawn: HashSet<&str> = output.split(' ').collect();
        assert_eq!(drawn.len(), 4, "{}", output);
    }
}

#[test]
fn test_exclusive_scopes_are_independent() {
    let data: &[(&str, &[&str])] = &[("pair", &["x", "y"])];
    for seed in 1..20 {
        let output = render(
            &with_data("{a@:pair}{a@:pair} {b@:pair}{b@:pair}", data),
            seed,
        )
        .unwrap();
        let (a, b) = output.split_once(' ').unwrap();
        assert!(a == "xy" || a == "yx", "{}", a);
        assert!(b == "xy" || b == "yx", "{}", b);
    }
}

#[test]
fn test_exclusive_resets_after_exhaustion() {
    let data: &[(&str, &[&str])] = &[("pair", &["x", "y"])];
    let output = render_ok("{@:pair}{@:pair}{@:pair}{@:pair}", data);
    assert_eq!(output.len(), 4);
    assert_eq!(output.matches('x').count(), 2);
}

#[test]
fn test_global_exclusive_spans_prompts() {
    let template = with_data("{@@:names}", &[("names", NAMES)]);
    let generator = Generator::default();
    let request = GenerationRequest::new().with_seed(9).with_prompts(4);
    let records = generator.generate(&template, &request).unwrap();
    let drawn: HashSet<String> = records.iter().map(|r| r.output.clone()).collect();
    assert_eq!(drawn.len(), 4);
    assert_eq!(generator.ledger().used("names").len(), 4);
}

#[test]
fn test_shared_ledger_spans_generators() {
    let ledger = GlobalLedger::new();
    let template = with_data("{@@:names}", &[("names", NAMES)]);
    let mut drawn = HashSet::new();
    for seed in 1..=4 {
        let generator = Generator::default().with_ledger(ledger.clone());
        let records = generator
            .generate(&template, &GenerationRequest::new().with_seed(seed))
            .unwrap();
        drawn.insert(records[0].output.clone());
    }
    assert_eq!(drawn.len(), 4);

    ledger.reset();
    assert!(ledger.is_empty());
}

#[test]
fn test_shared_ledger_across_threads() {
    const POOL: &[&str] = &["a", "b", "c", "d", "e", "f", "g", "h"];
    let ledger = GlobalLedger::new();
    let template = with_data("{@@:names}", &[("names", POOL)]);
    let drawn: Vec<String> = std::thread::scope(|scope| {
        let handles: Vec<_> = (1..=4u64)
            .map(|seed| {
                let generator = Generator::default().with_ledger(ledger.clone());
                let template = &template;
                scope.spawn(move || {
                    let request = GenerationRequest::new().with_seed(seed).with_prompts(2);
                    generator.generate(template, &request).unwrap()
                })
            })
            .collect();
        handles
            .into_iter()
            .flat_map(|handle| handle.join().unwrap())
            .map(|record| record.output)
            .collect()
    });
    assert_eq!(drawn.len(), POOL.len());
    let distinct: HashSet<&String> = drawn.iter().collect();
    assert_eq!(distinct.len(), POOL.len(), "{:?}", drawn);
    assert_eq!(ledger.used("names").len(), POOL.len());
}

#[test]
fn test_static_selection_is_stable_within_pass() {
    for seed in 1..10 {
        let records = Generator::default()
            .generate(
                &with_data("{$:names} {$:names} {$:names}", &[("names", NAMES)]),
                &GenerationRequest::new().with_seed(seed),
            )
            .unwrap();
        let words: Vec<&str> = records[0].output.split(' ').collect();
        assert!(words.iter().all(|w| *w == words[0]));
        assert_eq!(records[0].statics["names"], words[0]);
    }
}

#[test]
fn test_prefixed_statics_are_separate_slots() {
    let records = Generator::default()
        .generate(
            &with_data("{hero$:names}{villain$:names}", &[("names", NAMES)]),
            &GenerationRequest::new().with_seed(5),
        )
        .unwrap();
    assert!(records[0].statics.contains_key("heronames"));
    assert!(records[0].statics.contains_key("villainnames"));
}

#[test]
fn test_except_with_key_and_expression() {
    let data: &[(&str, &[&str])] = &[
        ("colors", &["red", "green", "blue"]),
        ("warm", &["red", "green"]),
        ("fav", &["blue"]),
    ];
    for seed in 1..10 {
        let template = with_data("{^:colors|warm|none}", data);
        assert_eq!(render(&template, seed).unwrap(), "blue");
        let template = with_data("{$:colors}-{^:colors|{$:colors}|none}", data);
        let output = render(&template, seed).unwrap();
        let (picked, other) = output.split_once('-').unwrap();
        assert_ne!(picked, other);
    }
}

#[test]
fn test_missing_key() {
    let err = render(&Template::new("a {nothing}"), 1).unwrap_err();
    assert!(matches!(err, PromptError::MissingKey(ref key) if key == "nothing"));
    assert_eq!(
        err.to_string(),
        "Selection key 'nothing' not found in state data."
    );
}

#[test]
fn test_invalid_data_shapes() {
    let template = Template::new("{empty}").with_data("empty", Vec::<String>::new());
    let err = render(&template, 1).unwrap_err();
    assert_eq!(err.to_string(), "Selection key 'empty' must be a non-empty list.");

    let template = Template::from_json(
        r#"{"entrypoint": "{weird}", "templates": {"data": {"weird": {"a": 1}}}}"#,
    )
    .unwrap();
    let err = render(&template, 1).unwrap_err();
    assert!(matches!(err, PromptError::InvalidData { .. }));
}

#[test]
fn test_exclusive_on_string_behaves_like_normal() {
    assert_eq!(render_ok("{@:name} {@@:name}", &[("name", &["Ann"])]), "Ann Ann");
}
