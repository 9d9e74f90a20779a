use std::path::{Path, PathBuf};

use tracing::{debug, instrument};

use super::Template;
use crate::{PromptError, PromptResult};

/// Merges `includes` files into a template's data map.
///
/// Entries are either a single path or `directory|file1|file2`. Keys already
/// defined by the including template win. A file that appears again on its
/// own include chain is a cycle.
#[derive(Debug, Default)]
pub struct TemplateLoader {
    chain: Vec<PathBuf>,
}

impl TemplateLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load<P: AsRef<Path>>(&mut self, path: P) -> PromptResult<Template> {
        let path = absolute(path.as_ref());
        let template = Template::from_file(&path)?;
        template.check_reserved_keys()?;
        self.chain.push(path);
        let resolved = self.resolve(template);
        self.chain.pop();
        resolved
    }

    #[instrument(level = "debug", skip(self, template), fields(includes = template.includes.len()))]
    pub fn resolve(&mut self, mut template: Template) -> PromptResult<Template> {
        let base = match &template.source_dir {
            Some(dir) => dir.clone(),
            None => std::env::current_dir()?,
        };
        for reference in std::mem::take(&mut template.includes) {
            for path in expand_reference(&reference, &base) {
                let included = self.include(&path)?;
                for (key, value) in included.templates.data {
                    template.templates.data.entry(key).or_insert(value);
                }
            }
        }
        Ok(template)
    }

    fn include(&mut self, path: &Path) -> PromptResult<Template> {
        let absolute = absolute(path);
        if self.chain.contains(&absolute) {
            return Err(PromptError::IncludeCycle(absolute.display().to_string()));
        }
        debug!("Including template file {}", absolute.display());
        let template = Template::from_file(&absolute).map_err(|e| {
            PromptError::Include(format!(
                "Failed to load included template file '{}': {}",
                absolute.display(),
                e
            ))
        })?;
        template.check_reserved_keys()?;
        self.chain.push(absolute);
        let resolved = self.resolve(template);
        self.chain.pop();
        resolved
    }
}

fn expand_reference(reference: &str, base: &Path) -> Vec<PathBuf> {
    let mut parts = reference.split('|');
    let first = parts.next().unwrap_or_default();
    let files: Vec<&str> = parts.filter(|f| !f.trim().is_empty()).collect();
    if files.is_empty() {
        return vec![anchor(&expand_home(first.trim()), base)];
    }
    let dir = anchor(&expand_home(first.trim()), base);
    files.into_iter().map(|f| dir.join(f.trim())).collect()
}

fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix('~'), std::env::var_os("HOME")) {
        (Some(rest), Some(home)) => PathBuf::from(home).join(rest.trim_start_matches('/')),
        _ => PathBuf::from(path),
    }
}

fn anchor(path: &Path, base: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

fn absolute(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}
