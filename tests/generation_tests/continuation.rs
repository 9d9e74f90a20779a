use infini_prompt::{GenerationRequest, Generator, GeneratorConfig, Template};
use pretty_assertions::assert_eq;

fn outputs(template: &Template, request: &GenerationRequest) -> Vec<String> {
    Generator::default()
        .generate(template, request)
        .unwrap()
        .into_iter()
        .map(|r| r.output)
        .collect()
}

#[test]
fn test_statics_flow_into_next_pass() {
    let template = Template::new("{set:step|{+:{opt:meta_last_step|0}|1}}step {$:step}");
    let request = GenerationRequest::new().with_seed(7).with_continues(2);
    assert_eq!(outputs(&template, &request), vec!["step 1", "step 2", "step 3"]);
}

#[test]
fn test_chain_resets_per_prompt() {
    let template = Template::new("{set:step|{+:{opt:meta_last_step|0}|1}}{$:step}");
    let request = GenerationRequest::new()
        .with_seed(7)
        .with_prompts(2)
        .with_continues(1);
    assert_eq!(outputs(&template, &request), vec!["1", "2", "1", "2"]);
}

#[test]
fn test_statics_are_not_carried_as_statics() {
    let template =
        Template::new("{==:meta_pass_number|0|{set:flag|on}|}{$:flag} {opt:meta_last_flag|-}")
            .with_data("flag", "default");
    let request = GenerationRequest::new().with_seed(3).with_continues(1);
    assert_eq!(outputs(&template, &request), vec!["on -", "default on"]);
}

#[test]
fn test_last_output_is_bound() {
    let template = Template::new("{opt:meta_last_output|start}-x");
    let request = GenerationRequest::new().with_seed(3).with_continues(2);
    assert_eq!(
        outputs(&template, &request),
        vec!["start-x", "start-x-x", "start-x-x-x"]
    );
}

#[test]
fn test_last_values_only_bound_when_continuing() {
    let template = Template::new("{set:a|1}{opt:meta_last_a|none}");
    let request = GenerationRequest::new().with_seed(3).with_prompts(2);
    assert_eq!(outputs(&template, &request), vec!["none", "none"]);
}

#[test]
fn test_pass_number_argument() {
    let template = Template::new("pass {meta_pass_number}");
    let records = Generator::default()
        .generate(&template, &GenerationRequest::new().with_seed(1).with_continues(2))
        .unwrap();
    let outputs: Vec<&str> = records.iter().map(|r| r.output.as_str()).collect();
    assert_eq!(outputs, vec!["pass 0", "pass 1", "pass 2"]);
    assert_eq!(records[2].generation_info.arguments["pass_number"], "2");
    assert_eq!(records[2].generation_info.gen_pass_number, 2);
}

#[test]
fn test_follow_lists_cycle_over_prompts() {
    let template = Template::new("a {meta_current_animal}");
    let request = GenerationRequest::new()
        .with_seed(1)
        .with_prompts(3)
        .with_argument("follow-list-of-animal", "cat\n\n  dog \n");
    let records = Generator::default().generate(&template, &request).unwrap();
    let outputs: Vec<&str> = records.iter().map(|r| r.output.as_str()).collect();
    assert_eq!(outputs, vec!["a cat", "a dog", "a cat"]);
    assert_eq!(records[1].generation_info.arguments["animal"], "dog");
}

#[test]
fn test_counts_are_clamped() {
    let config = GeneratorConfig {
        max_prompts: 3,
        max_continues: 1,
        ..Default::default()
    };
    let request = GenerationRequest::new()
        .with_seed(1)
        .with_prompts(10)
        .with_continues(5);
    let records = Generator::new(config)
        .generate(&Template::new("x"), &request)
        .unwrap();
    assert_eq!(records.len(), 6);
}

#[test]
fn test_zero_seed_draws_fresh_seed() {
    let records = Generator::default()
        .generate(&Template::new("x"), &GenerationRequest::new().with_seed(0))
        .unwrap();
    assert!(records[0].seed > 0);
}
