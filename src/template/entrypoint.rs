use std::collections::BTreeMap;
use std::fmt;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{scanner, PromptError, PromptResult};

/// Argument holding newline separated `a/b/c` paths for tree entrypoints.
pub const TAGS_PATH: &str = "tags_path";
/// Argument matched against the keys of a flat map entrypoint.
pub const ENTRYPOINT_SELECTOR: &str = "entrypoint_selector";

const TREE_TEXT: &str = "text";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Entrypoint {
    Text(String),
    Sequence(Vec<Entrypoint>),
    Map(EntryMap),
}

/// JSON object that keeps document order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntryMap(pub Vec<(String, Entrypoint)>);

impl EntryMap {
    pub fn get(&self, key: &str) -> Option<&Entrypoint> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// A map with a `text` key or any nested map is a path-keyed tree.
    pub fn is_tree(&self) -> bool {
        self.get(TREE_TEXT).is_some() || self.0.iter().any(|(_, v)| matches!(v, Entrypoint::Map(_)))
    }
}

impl Serialize for EntryMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter().map(|(k, v)| (k, v)))
    }
}

impl<'de> Deserialize<'de> for EntryMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct EntryMapVisitor;

        impl<'de> Visitor<'de> for EntryMapVisitor {
            type Value = EntryMap;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of entrypoints")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<EntryMap, A::Error> {
                let mut entries = Vec::new();
                while let Some((key, value)) = access.next_entry::<String, Entrypoint>()? {
                    entries.push((key, value));
                }
                Ok(EntryMap(entries))
            }
        }

        deserializer.deserialize_map(EntryMapVisitor)
    }
}

impl Entrypoint {
    /// Bracket balance check over every string leaf, whichever one a later
    /// draw would pick.
    pub fn validate(&self) -> PromptResult<()> {
        match self {
            Entrypoint::Text(text) => scanner::validate(text),
            Entrypoint::Sequence(items) => items.iter().try_for_each(Entrypoint::validate),
            Entrypoint::Map(map) => map.0.iter().try_for_each(|(_, entry)| entry.validate()),
        }
    }

    /// Reduces the entrypoint to one string, drawing from `rng` for list shapes.
    pub fn select<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        arguments: &BTreeMap<String, String>,
    ) -> PromptResult<String> {
        match self {
            Entrypoint::Text(text) => Ok(text.clone()),
            Entrypoint::Sequence(items) => select_sequence(items, rng),
            Entrypoint::Map(map) if map.is_tree() => {
                let paths = arguments.get(TAGS_PATH).ok_or_else(|| {
                    PromptError::template(format!(
                        "No '{}' argument provided for tree entrypoint.",
                        TAGS_PATH
                    ))
                })?;
                walk_tree(map, paths)
            }
            Entrypoint::Map(map) => {
                let selector = arguments.get(ENTRYPOINT_SELECTOR).ok_or_else(|| {
                    PromptError::template(format!(
                        "No '{}' argument provided for map entrypoint.",
                        ENTRYPOINT_SELECTOR
                    ))
                })?;
                let (_, entry) = map
                    .0
                    .iter()
                    .find(|(key, _)| matches_selector(key, selector))
                    .ok_or_else(|| {
                        PromptError::template(format!(
                            "No entrypoint key matches selector '{}'.",
                            selector
                        ))
                    })?;
                match entry {
                    Entrypoint::Text(text) => Ok(text.clone()),
                    Entrypoint::Sequence(items) => select_sequence(items, rng),
                    Entrypoint::Map(_) => Err(PromptError::template(
                        "Map entrypoint values must be strings or lists.",
                    )),
                }
            }
        }
    }
}

fn select_sequence<R: Rng + ?Sized>(items: &[Entrypoint], rng: &mut R) -> PromptResult<String> {
    if items.is_empty() {
        return Ok(String::new());
    }
    let texts: Vec<&String> = items
        .iter()
        .filter_map(|item| match item {
            Entrypoint::Text(text) => Some(text),
            _ => None,
        })
        .collect();
    if texts.len() == items.len() {
        return Ok(texts.choose(rng).map(|t| t.to_string()).unwrap_or_default());
    }

    let (prefix, lists) = match items.split_first() {
        Some((Entrypoint::Text(prefix), rest)) => (Some(prefix), rest),
        _ => (None, items),
    };
    let mut parts: Vec<String> = prefix.into_iter().cloned().collect();
    for list in lists {
        match list {
            Entrypoint::Sequence(inner) => parts.push(select_sequence(inner, rng)?),
            _ => return Err(PromptError::template("Invalid entrypoint list structure.")),
        }
    }
    Ok(parts.join(" "))
}

fn walk_tree(root: &EntryMap, paths: &str) -> PromptResult<String> {
    let mut texts = Vec::new();
    for path in paths.lines().map(str::trim).filter(|p| !p.is_empty()) {
        let mut node = Some(root);
        let mut leaf = None;
        for segment in path.split('/') {
            match node.and_then(|n| n.get(segment)) {
                Some(Entrypoint::Map(child)) => node = Some(child),
                Some(Entrypoint::Text(text)) => {
                    node = None;
                    leaf = Some(text);
                }
                _ => {
                    node = None;
                    leaf = None;
                    break;
                }
            }
        }
        match (node, leaf) {
            (Some(map), _) => match map.get(TREE_TEXT) {
                Some(Entrypoint::Text(text)) => texts.push(text.clone()),
                _ => {
                    return Err(PromptError::template(format!(
                        "Tree entrypoint node '{}' has no 'text' entry.",
                        path
                    )))
                }
            },
            (None, Some(text)) => texts.push(text.clone()),
            (None, None) => {}
        }
    }
    Ok(texts.join("\n"))
}

/// Every whitespace separated fragment of `key` occurs in `selector`, in
/// order and without overlapping.
fn matches_selector(key: &str, selector: &str) -> bool {
    let mut cursor = 0;
    for fragment in key.split_whitespace() {
        match selector[cursor..].find(fragment) {
            Some(pos) => cursor += pos + fragment.len(),
            None => return false,
        }
    }
    true
}
