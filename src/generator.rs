//! Generation orchestrator.
//!
//! Drives seeding, argument binding, preprocessing, entrypoint selection,
//! resolution and postprocessing for every pass of a request, then packages
//! one [`PromptRecord`] per pass.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::config::GeneratorConfig;
use crate::eval::{EchoSink, EvalContext, Evaluator, GlobalLedger, Hooks, StderrEcho};
use crate::formatter::Formatter;
use crate::preprocessor::{escape, Preprocessor};
use crate::template::{DataValue, Template, TemplateLoader};
use crate::{scanner, PromptError, PromptResult};

const META_PREFIX: &str = "meta_";
const LAST_PREFIX: &str = "last_";
const LAST_OUTPUT: &str = "last_output";
const FOLLOW_LIST_PREFIX: &str = "follow-list-of-";
const CURRENT_PREFIX: &str = "current_";
const PASS_NUMBER: &str = "pass_number";
const TEXT_ARGUMENT: &str = "text";
const RESERVED_ARGUMENT_PREFIXES: [&str; 2] = ["meta_", "regex_"];

/// Everything a caller can vary between generation calls.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// `None` or `0` draws a fresh seed from the clock.
    pub seed: Option<u64>,
    pub arguments: BTreeMap<String, String>,
    pub hooks: Hooks,
    pub num_prompts: usize,
    pub num_continues: usize,
}

impl Default for GenerationRequest {
    fn default() -> Self {
        Self {
            seed: None,
            arguments: BTreeMap::new(),
            hooks: Hooks::new(),
            num_prompts: 1,
            num_continues: 0,
        }
    }
}

impl GenerationRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_argument(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.arguments.insert(key.into(), value.into());
        self
    }

    pub fn with_hooks(mut self, hooks: Hooks) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_prompts(mut self, num_prompts: usize) -> Self {
        self.num_prompts = num_prompts;
        self
    }

    pub fn with_continues(mut self, num_continues: usize) -> Self {
        self.num_continues = num_continues;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationInfo {
    #[serde(flatten)]
    pub arguments: BTreeMap<String, String>,
    pub gen_prompt_number: usize,
    pub gen_pass_number: usize,
}

/// Result of one generation pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptRecord {
    pub output: String,
    pub seed: u64,
    pub statics: BTreeMap<String, String>,
    pub generation_info: GenerationInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GenerationOutcome {
    Records(Vec<PromptRecord>),
    Error { error: String },
}

struct PassOutput {
    output: String,
    statics: BTreeMap<String, String>,
}

// Per-call state shared by every pass: the prepared template and its
// compiled rule sets.
struct Prepared {
    template: Template,
    preprocessor: Preprocessor,
    formatter: Formatter,
}

pub struct Generator {
    config: GeneratorConfig,
    ledger: GlobalLedger,
    echo: Arc<dyn EchoSink>,
}

impl Default for Generator {
    fn default() -> Self {
        Self::new(GeneratorConfig::default())
    }
}

impl Generator {
    pub fn new(config: GeneratorConfig) -> Self {
        Self {
            config,
            ledger: GlobalLedger::new(),
            echo: Arc::new(StderrEcho),
        }
    }

    /// Shares an existing ledger, so global exclusivity spans generators.
    pub fn with_ledger(mut self, ledger: GlobalLedger) -> Self {
        self.ledger = ledger;
        self
    }

    pub fn with_echo(mut self, echo: Arc<dyn EchoSink>) -> Self {
        self.echo = echo;
        self
    }

    pub fn ledger(&self) -> &GlobalLedger {
        &self.ledger
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Runs every pass of `request` and returns one record per pass.
    #[instrument(
        level = "debug",
        skip_all,
        fields(seed = ?request.seed, prompts = request.num_prompts)
    )]
    pub fn generate(
        &self,
        template: &Template,
        request: &GenerationRequest,
    ) -> PromptResult<Vec<PromptRecord>> {
        check_arguments(&request.arguments)?;
        let prepared = self.prepare(template)?;

        let seed = match request.seed {
            Some(seed) if seed > 0 => seed,
            _ => fresh_seed(),
        };
        let prompts = self.config.clamp_prompts(request.num_prompts);
        let continues = self.config.clamp_continues(request.num_continues);
        if prompts != request.num_prompts || continues != request.num_continues {
            warn!(
                "Clamped request to {} prompts with {} continuations",
                prompts, continues
            );
        }

        let (mut arguments, follow_lists) = split_follow_lists(&request.arguments);
        let mut records = Vec::with_capacity(prompts * (continues + 1));
        let mut pass_index: u64 = 0;
        for prompt_number in 0..prompts {
            for (name, lines) in &follow_lists {
                let line = lines[prompt_number % lines.len()].clone();
                arguments.insert(format!("{}{}", CURRENT_PREFIX, name), line);
            }
            let mut last: BTreeMap<String, String> = BTreeMap::new();
            for pass_number in 0..=continues {
                arguments.insert(PASS_NUMBER.to_string(), pass_number.to_string());
                let pass_seed = seed.wrapping_add(pass_index);
                let pass = self.run_pass(&prepared, pass_seed, &arguments, &last, &request.hooks)?;

                if continues > 0 {
                    last = pass
                        .statics
                        .iter()
                        .map(|(k, v)| (format!("{}{}", LAST_PREFIX, k), v.clone()))
                        .collect();
                    last.insert(LAST_OUTPUT.to_string(), pass.output.clone());
                }
                records.push(PromptRecord {
                    output: pass.output,
                    seed: pass_seed,
                    statics: pass.statics,
                    generation_info: GenerationInfo {
                        arguments: info_arguments(&arguments),
                        gen_prompt_number: prompt_number,
                        gen_pass_number: pass_number,
                    },
                });
                pass_index += 1;
            }
        }
        info!("Generated {} records from seed {}", records.len(), seed);
        Ok(records)
    }

    /// Like [`Self::generate`] but reports failure as a value.
    pub fn generate_no_except(
        &self,
        template: &Template,
        request: &GenerationRequest,
    ) -> GenerationOutcome {
        match self.generate(template, request) {
            Ok(records) => GenerationOutcome::Records(records),
            Err(e) => {
                warn!("Generation failed: {}", e);
                GenerationOutcome::Error {
                    error: e.to_string(),
                }
            }
        }
    }

    // Loads includes and validates everything that does not depend on the
    // pass, before any random draw.
    fn prepare(&self, template: &Template) -> PromptResult<Prepared> {
        template.check_reserved_keys()?;
        let template = TemplateLoader::new().resolve(template.clone())?;
        if let Some(entrypoint) = &template.entrypoint {
            entrypoint.validate()?;
        }
        template.validate_data()?;
        let preprocessor = Preprocessor::new(&template.templates)?;
        let formatter = Formatter::new(&template.postprocess)?;
        Ok(Prepared {
            template,
            preprocessor,
            formatter,
        })
    }

    #[instrument(level = "debug", skip(self, prepared, arguments, last, hooks))]
    fn run_pass(
        &self,
        prepared: &Prepared,
        seed: u64,
        arguments: &BTreeMap<String, String>,
        last: &BTreeMap<String, String>,
        hooks: &Hooks,
    ) -> PromptResult<PassOutput> {
        let mut rng = StdRng::seed_from_u64(seed);

        let mut bound = arguments.clone();
        bound.extend(last.iter().map(|(k, v)| (k.clone(), v.clone())));
        if let Some(text) = bound.get(TEXT_ARGUMENT) {
            let processed = prepared.preprocessor.process_text(text);
            bound.insert(TEXT_ARGUMENT.to_string(), processed);
        }

        let entrypoint = prepared
            .template
            .entrypoint
            .as_ref()
            .ok_or_else(|| PromptError::template("Entrypoint is empty."))?
            .select(&mut rng, &bound)?;
        let entrypoint = entrypoint.trim();
        if entrypoint.is_empty() {
            return Err(PromptError::template("Entrypoint is empty."));
        }
        scanner::validate(entrypoint)?;

        let mut data = prepared.template.templates.data.clone();
        let captures = prepared
            .preprocessor
            .captures(bound.get(TEXT_ARGUMENT).map(String::as_str));
        for (key, value) in captures {
            data.insert(format!("{}{}", META_PREFIX, key), value);
        }
        for (key, value) in &bound {
            data.insert(
                format!("{}{}", META_PREFIX, key),
                DataValue::Text(escape(value)),
            );
        }

        let ctx = EvalContext::new(
            data,
            rng,
            hooks,
            &self.ledger,
            self.echo.as_ref(),
            &self.config,
        );
        let mut evaluator = Evaluator::new(ctx);
        let resolved = evaluator.resolve(entrypoint)?;
        let output = prepared.formatter.format(resolved.trim());
        debug!("Pass output: {}", output);
        Ok(PassOutput {
            output,
            statics: evaluator.into_statics(),
        })
    }
}

fn check_arguments(arguments: &BTreeMap<String, String>) -> PromptResult<()> {
    for key in arguments.keys() {
        if let Some(prefix) = RESERVED_ARGUMENT_PREFIXES
            .iter()
            .find(|p| key.starts_with(*p))
        {
            return Err(PromptError::ReservedKey(format!(
                "Argument key '{}' cannot start with '{}'. This prefix is reserved.",
                key, prefix
            )));
        }
    }
    Ok(())
}

/// Separates `follow-list-of-<name>` arguments, split into their lines.
fn split_follow_lists(
    arguments: &BTreeMap<String, String>,
) -> (BTreeMap<String, String>, Vec<(String, Vec<String>)>) {
    let mut plain = BTreeMap::new();
    let mut lists = Vec::new();
    for (key, value) in arguments {
        match key.strip_prefix(FOLLOW_LIST_PREFIX) {
            Some(name) => {
                let lines: Vec<String> = value
                    .lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty())
                    .map(str::to_string)
                    .collect();
                if lines.is_empty() {
                    continue;
                }
                lists.push((name.to_string(), lines));
            }
            None => {
                plain.insert(key.clone(), value.clone());
            }
        }
    }
    (plain, lists)
}

fn info_arguments(arguments: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    arguments
        .iter()
        .map(|(k, v)| {
            let key = k.strip_prefix(CURRENT_PREFIX).unwrap_or(k);
            (key.to_string(), v.clone())
        })
        .collect()
}

fn fresh_seed() -> u64 {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default();
    millis
        .wrapping_add(rand::random::<u32>() as u64)
        .max(1)
}
