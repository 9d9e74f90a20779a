use clap::{command, Parser};
use infini_prompt::{
    template::TemplateLoader, GenerationRequest, Generator, GeneratorConfig, PromptError,
};
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Template file, JSON or hybrid document
    template: PathBuf,

    /// Seed for the first pass; omitted or 0 picks one from the clock
    #[arg(short, long)]
    seed: Option<u64>,

    /// Number of prompts to generate
    #[arg(short = 'n', long, default_value_t = 1)]
    prompts: usize,

    /// Continuation passes per prompt
    #[arg(short = 'c', long, default_value_t = 0)]
    continues: usize,

    /// Template argument as key=value, repeatable
    #[arg(short = 'a', long = "arg", value_parser = parse_key_value)]
    arguments: Vec<(String, String)>,

    /// Path to config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Report failures as an error record instead of exiting non-zero
    #[arg(long)]
    no_except: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got '{}'", raw))
}

fn run(cli: &Cli) -> Result<(), PromptError> {
    let config = match &cli.config {
        Some(path) => GeneratorConfig::from_file(path)?,
        None => GeneratorConfig::default(),
    };
    debug!("config: {:?}", config);

    let template = TemplateLoader::new().load(&cli.template)?;
    info!("template loaded from {}", cli.template.display());

    let mut request = GenerationRequest::new()
        .with_prompts(cli.prompts)
        .with_continues(cli.continues);
    request.seed = cli.seed;
    for (key, value) in &cli.arguments {
        request.arguments.insert(key.clone(), value.clone());
    }

    let generator = Generator::new(config);
    let json = if cli.no_except {
        serde_json::to_string_pretty(&generator.generate_no_except(&template, &request))?
    } else {
        serde_json::to_string_pretty(&generator.generate(&template, &request)?)?
    };
    println!("{}", json);
    Ok(())
}

fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(&cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
