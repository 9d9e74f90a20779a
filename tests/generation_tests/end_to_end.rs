use infini_prompt::{
    GenerationOutcome, GenerationRequest, Generator, GeneratorConfig, Hooks, PromptError,
    Template,
};
use pretty_assertions::assert_eq;

use super::{render, with_data};

#[test]
fn test_simple_sentence() {
    let template = with_data(
        "I see a {size} {color} {animal}",
        &[("size", &["big"]), ("color", &["red"]), ("animal", &["cat"])],
    );
    assert_eq!(render(&template, 1).unwrap(), "I see a big red cat");
}

#[test]
fn test_plain_text_passes_through() {
    assert_eq!(render(&Template::new("no brackets here"), 1).unwrap(), "no brackets here");
}

#[test]
fn test_full_template_document() {
    let template = Template::parse(
        r#"
{set:hero|{$:names}}{$:hero} meets {^:names|{$:hero}|nobody}{maybe:0|{twist}}.
{case:{$:hero}|role_|role_unknown|alice,bob}

```template.twist
and then {missing}
```

```json
{
  "templates": {"data": {"names": ["alice", "bob"]}},
  "postprocess": [{"pattern": "role_", "replacement": "as "}]
}
```
"#,
    )
    .unwrap();
    for seed in 1..10 {
        let records = Generator::default()
            .generate(&template, &GenerationRequest::new().with_seed(seed))
            .unwrap();
        let record = &records[0];
        let hero = record.statics["hero"].clone();
        let other = if hero == "alice" { "bob" } else { "alice" };
        assert_eq!(
            record.output,
            format!("{} meets {}. as {}", hero, other, hero)
        );
        assert_eq!(record.statics["names"], hero);
    }
}

#[test]
fn test_arguments_are_escaped() {
    let template = Template::new("Hi {meta_name}");
    let request = GenerationRequest::new()
        .with_seed(1)
        .with_argument("name", "a|b{c}");
    let records = Generator::default().generate(&template, &request).unwrap();
    assert_eq!(records[0].output, "Hi a|b{c}");
}

#[test]
fn test_record_serialization() {
    let template = Template::new("{set:k|v}out");
    let request = GenerationRequest::new()
        .with_seed(11)
        .with_argument("mood", "calm");
    let records = Generator::default().generate(&template, &request).unwrap();
    let json = serde_json::to_value(&records).unwrap();
    assert_eq!(
        json,
        serde_json::json!([{
            "output": "out",
            "seed": 11,
            "statics": {"k": "v"},
            "generation_info": {
                "mood": "calm",
                "pass_number": "0",
                "gen_prompt_number": 0,
                "gen_pass_number": 0
            }
        }])
    );
}

#[test]
fn test_no_except_reports_errors() {
    let generator = Generator::default();
    let request = GenerationRequest::new().with_seed(1);

    let outcome = generator.generate_no_except(&Template::new("{nothing}"), &request);
    assert_eq!(
        outcome,
        GenerationOutcome::Error {
            error: "Selection key 'nothing' not found in state data.".to_string()
        }
    );
    assert_eq!(
        serde_json::to_value(&outcome).unwrap(),
        serde_json::json!({"error": "Selection key 'nothing' not found in state data."})
    );

    let outcome = generator.generate_no_except(&Template::new("ok"), &request);
    assert!(matches!(outcome, GenerationOutcome::Records(ref r) if r[0].output == "ok"));
}

#[test]
fn test_recursive_data_hits_depth_limit() {
    let template = Template::new("{loop}").with_data("loop", "x{loop}");
    let err = render(&template, 1).unwrap_err();
    assert!(matches!(err, PromptError::ResourceExhausted(_)), "{}", err);
}

#[test]
fn test_hook_loop_hits_step_limit() {
    let config = GeneratorConfig {
        max_steps: 1000,
        ..Default::default()
    };
    let hooks = Hooks::new().with("again", |_| "{hook:again|x}".to_string());
    let request = GenerationRequest::new().with_seed(1).with_hooks(hooks);
    let err = Generator::new(config)
        .generate(&Template::new("{hook:again|x}"), &request)
        .unwrap_err();
    assert!(matches!(err, PromptError::ResourceExhausted(_)), "{}", err);
}

#[test]
fn test_hook_output_is_resolved() {
    let hooks = Hooks::new().with("wrap", |s| format!("{{{}}}", s.trim()));
    let template = Template::new("{hook:wrap|animal}").with_data("animal", "cat");
    let request = GenerationRequest::new().with_seed(1).with_hooks(hooks);
    let records = Generator::default().generate(&template, &request).unwrap();
    assert_eq!(records[0].output, "cat");
}

#[test]
fn test_many_prompts_differ() {
    let template = with_data(
        "{names}",
        &[("names", &["alice", "bob", "charlie", "david", "erin"])],
    );
    let records = Generator::default()
        .generate(&template, &GenerationRequest::new().with_seed(77).with_prompts(20))
        .unwrap();
    assert_eq!(records.len(), 20);
    let first = &records[0].output;
    assert!(records.iter().any(|r| &r.output != first));
}
