//! Template resolution engine for mass-producing varied text.
//!
//! A [`Template`] holds an entrypoint with nested `{...}` expressions and a
//! data map of values and option lists. [`Generator::generate`] resolves the
//! entrypoint into one [`PromptRecord`] per pass, reproducibly from a seed.
//!
//! ```
//! use infini_prompt::{GenerationRequest, Generator, Template};
//!
//! let template = Template::new("I see a {size} {color} {animal}")
//!     .with_data("size", "big")
//!     .with_data("color", vec!["red"])
//!     .with_data("animal", vec!["cat"]);
//! let request = GenerationRequest::new().with_seed(42);
//! let records = Generator::default().generate(&template, &request).unwrap();
//! assert_eq!(records[0].output, "I see a big red cat");
//! ```

pub mod config;
pub mod error;
pub mod eval;
pub mod formatter;
pub mod generator;
pub mod preprocessor;
pub mod scanner;
pub mod template;

// Re-exports
pub use config::GeneratorConfig;
pub use error::*;
pub use eval::{GlobalLedger, Hooks};
pub use generator::{GenerationInfo, GenerationOutcome, GenerationRequest, Generator, PromptRecord};
pub use template::{DataValue, Entrypoint, RegexRule, Template};
