use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

pub type HookFn = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Named text transforms callable from templates through `{hook:name|text}`.
#[derive(Clone, Default)]
pub struct Hooks {
    hooks: HashMap<String, HookFn>,
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, name: impl Into<String>, hook: F) -> &mut Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.hooks.insert(name.into(), Arc::new(hook));
        self
    }

    pub fn with<F>(mut self, name: impl Into<String>, hook: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.register(name, hook);
        self
    }

    pub fn get(&self, name: &str) -> Option<&HookFn> {
        self.hooks.get(name)
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.hooks.keys().collect();
        names.sort();
        f.debug_struct("Hooks").field("names", &names).finish()
    }
}

/// Destination for `{echo:...}` output.
pub trait EchoSink: Send + Sync {
    fn emit(&self, line: &str);
}

/// Writes echo blocks to stderr so stdout stays reserved for results.
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrEcho;

impl EchoSink for StderrEcho {
    fn emit(&self, line: &str) {
        eprintln!("{}", line);
    }
}

/// Keeps every emitted line in memory.
#[derive(Debug, Default)]
pub struct CollectingEcho {
    lines: Mutex<Vec<String>>,
}

impl CollectingEcho {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        match self.lines.lock() {
            Ok(lines) => lines.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl EchoSink for CollectingEcho {
    fn emit(&self, line: &str) {
        match self.lines.lock() {
            Ok(mut lines) => lines.push(line.to_string()),
            Err(poisoned) => poisoned.into_inner().push(line.to_string()),
        }
    }
}
