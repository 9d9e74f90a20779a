//! Bracket expression evaluation.
//!
//! [`Evaluator`] owns the per-pass [`EvalContext`] and resolves text by
//! repeatedly taking the first `{...}` span, dispatching its content to an
//! operator handler and splicing the trimmed result back in.

pub mod context;
pub mod evaluator;
pub mod expression;
pub mod hooks;
pub mod ledger;
pub mod operator;
pub mod selection;

pub use context::EvalContext;
pub use evaluator::Evaluator;
pub use expression::Number;
pub use hooks::{CollectingEcho, EchoSink, HookFn, Hooks, StderrEcho};
pub use ledger::{GlobalLedger, UsageLedger};
pub use operator::{Comparison, Keyword, Operator};
