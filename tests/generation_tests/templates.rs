use std::fs;

use infini_prompt::template::TemplateLoader;
use infini_prompt::{
    GenerationRequest, Generator, GlobalLedger, PromptError, RegexRule, Template,
};
use pretty_assertions::assert_eq;

use super::render;

#[test]
fn test_document_template_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cat.md");
    fs::write(
        &path,
        r#"
A {style} picture of {subject}.

```template.subject
a {color} cat
```

```json
{"templates": {"data": {"style": "watercolor", "color": ["red"]}}}
```
"#,
    )
    .unwrap();
    let template = Template::from_file(&path).unwrap();
    assert_eq!(render(&template, 1).unwrap(), "A watercolor picture of a red cat.");
}

#[test]
fn test_document_errors() {
    let err = Template::parse("just text").unwrap_err();
    assert_eq!(
        err.to_string(),
        "Invalid template: No JSON code block found in template document."
    );
    let err = Template::parse("text\n```json\n{}\n").unwrap_err();
    assert!(err.to_string().contains("Unclosed code block"));
}

#[test]
fn test_sequence_entrypoint() {
    let template = Template::from_json(
        r#"{
            "entrypoint": ["A photo of", ["{animal}"], ["in the rain", "at night"]],
            "templates": {"data": {"animal": "a cat"}}
        }"#,
    )
    .unwrap();
    for seed in 1..10 {
        let output = render(&template, seed).unwrap();
        assert!(
            output == "A photo of a cat in the rain" || output == "A photo of a cat at night",
            "{}",
            output
        );
    }
}

#[test]
fn test_map_entrypoint_selector() {
    let template = Template::from_json(
        r#"{"entrypoint": {"dark portrait": "gloomy {who}", "portrait": "bright {who}"},
            "templates": {"data": {"who": "Ann"}}}"#,
    )
    .unwrap();
    let request = GenerationRequest::new()
        .with_seed(1)
        .with_argument("entrypoint_selector", "a dark moody portrait");
    let records = Generator::default().generate(&template, &request).unwrap();
    assert_eq!(records[0].output, "gloomy Ann");

    let err = render(&template, 1).unwrap_err();
    assert!(err.to_string().contains("entrypoint_selector"));
}

#[test]
fn test_tree_entrypoint() {
    let template = Template::from_json(
        r#"{"entrypoint": {"animals": {"text": "animals", "cat": {"text": "a {size} cat,"}},
                           "plants": {"tree": "a tree"}},
            "templates": {"data": {"size": "small"}}}"#,
    )
    .unwrap();
    let request = GenerationRequest::new()
        .with_seed(1)
        .with_argument("tags_path", "animals/cat\nplants/tree");
    let records = Generator::default().generate(&template, &request).unwrap();
    assert_eq!(records[0].output, "a small cat, a tree");
}

#[test]
fn test_empty_entrypoint() {
    let err = render(&Template::new("   "), 1).unwrap_err();
    assert_eq!(err.to_string(), "Invalid template: Entrypoint is empty.");
    let err = render(&Template::default(), 1).unwrap_err();
    assert_eq!(err.to_string(), "Invalid template: Entrypoint is empty.");
}

#[test]
fn test_preprocess_and_captures() {
    let mut template = Template::new("{meta_regex_animal}: {meta_text}")
        .with_preprocess(RegexRule::new("here", "there"));
    template
        .templates
        .regex
        .insert("animal".to_string(), r"(\w+) is".to_string());
    let request = GenerationRequest::new()
        .with_seed(1)
        .with_argument("text", "cat is here");
    let records = Generator::default().generate(&template, &request).unwrap();
    assert_eq!(records[0].output, "cat: cat is there");
}

#[test]
fn test_captured_text_stays_literal() {
    let mut template = Template::new("got {meta_regex_name}");
    template
        .templates
        .regex
        .insert("name".to_string(), r"name: (.*)".to_string());
    for text in ["name: {set:x|pwn}", "name: {boom}"] {
        let request = GenerationRequest::new()
            .with_seed(1)
            .with_argument("text", text);
        let records = Generator::default().generate(&template, &request).unwrap();
        assert_eq!(records[0].output, format!("got {}", &text[6..]));
        assert!(records[0].statics.is_empty());
    }
}

#[test]
fn test_capture_without_text_is_empty() {
    let mut template = Template::new("[{meta_regex_animal}]");
    template
        .templates
        .regex
        .insert("animal".to_string(), r"(\w+)".to_string());
    assert_eq!(render(&template, 1).unwrap(), "[]");
}

#[test]
fn test_postprocess_rules() {
    let template = Template::new("a {color} cat , RED sky")
        .with_data("color", "red")
        .with_postprocess(RegexRule::new(r"\bred\b", "crimson"))
        .with_postprocess(RegexRule::new(r"(\w+) cat", "cat of {1}"));
    assert_eq!(render(&template, 1).unwrap(), "a cat of crimson, crimson sky");
}

#[test]
fn test_invalid_regex_rule() {
    let template = Template::new("x").with_postprocess(RegexRule::new("(", ""));
    let err = render(&template, 1).unwrap_err();
    assert!(matches!(err, PromptError::Regex { stage: "postprocess", .. }));
}

#[test]
fn test_includes_through_generator() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("parts")).unwrap();
    fs::write(
        dir.path().join("parts/animals.json"),
        r#"{"templates": {"data": {"animal": "owl", "color": "blue"}}}"#,
    )
    .unwrap();
    let main = dir.path().join("main.json");
    fs::write(
        &main,
        r#"{"entrypoint": "a {color} {animal}",
            "templates": {"data": {"color": "grey"}},
            "includes": ["parts|animals.json"]}"#,
    )
    .unwrap();

    let template = Template::from_file(&main).unwrap();
    assert_eq!(render(&template, 1).unwrap(), "a grey owl");

    let loaded = TemplateLoader::new().load(&main).unwrap();
    assert_eq!(render(&loaded, 1).unwrap(), "a grey owl");
}

#[test]
fn test_include_cycle_through_generator() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("a.json"),
        r#"{"entrypoint": "x", "includes": ["b.json"]}"#,
    )
    .unwrap();
    fs::write(dir.path().join("b.json"), r#"{"includes": ["a.json"]}"#).unwrap();
    let template = Template::from_file(dir.path().join("a.json")).unwrap();
    let err = render(&template, 1).unwrap_err();
    assert!(matches!(err, PromptError::IncludeCycle(_)));
}

#[test]
fn test_reserved_data_keys() {
    for key in ["meta_x", "track_y"] {
        let template = Template::new("x").with_data(key, "v");
        let err = render(&template, 1).unwrap_err();
        assert!(matches!(err, PromptError::ReservedKey(_)), "{}", key);
    }
}

#[test]
fn test_unbalanced_input_fails_before_any_draw() {
    let ledger = GlobalLedger::new();
    let generator = Generator::default().with_ledger(ledger.clone());
    let template = Template::new("{@@:names} {oops").with_data("names", vec!["a", "b"]);
    let err = generator
        .generate(&template, &GenerationRequest::new().with_seed(1))
        .unwrap_err();
    assert!(matches!(err, PromptError::UnbalancedBracket { .. }));
    assert!(ledger.is_empty());

    let template = Template::new("{@@:names}")
        .with_data("names", vec!["a", "b"])
        .with_data("broken", "x}");
    let err = generator
        .generate(&template, &GenerationRequest::new().with_seed(1))
        .unwrap_err();
    assert!(matches!(err, PromptError::UnbalancedBracket { .. }));
    assert!(ledger.is_empty());
}

#[test]
fn test_unbalanced_entrypoint_option_fails_for_every_seed() {
    let template = Template::from_json(r#"{"entrypoint": ["ok", "{bad"]}"#).unwrap();
    for seed in 1..20 {
        let err = render(&template, seed).unwrap_err();
        assert!(matches!(err, PromptError::UnbalancedBracket { .. }), "{}", seed);
    }

    let template = Template::from_json(
        r#"{"entrypoint": {"portrait": "fine", "landscape": "broken}"}}"#,
    )
    .unwrap();
    let request = GenerationRequest::new()
        .with_seed(1)
        .with_argument("entrypoint_selector", "portrait");
    let err = Generator::default().generate(&template, &request).unwrap_err();
    assert!(matches!(err, PromptError::UnbalancedBracket { .. }));
}
