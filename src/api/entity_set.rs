//! Logical name -> entity set name resolution.
//!
//! The Web API addresses tables by their entity set name, which for almost
//! every table is the English plural of the logical name (`account` ->
//! `accounts`, `opportunity` -> `opportunities`). Tables that break the rule
//! are listed under `EntitySetNames` in the settings file.

use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct EntitySetResolver {
    overrides: HashMap<String, String>,
}

impl EntitySetResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolver with explicit `logical name -> entity set` entries.
    pub fn with_overrides(overrides: HashMap<String, String>) -> Self {
        let overrides = overrides
            .into_iter()
            .map(|(logical, set)| (logical.to_ascii_lowercase(), set))
            .collect();
        Self { overrides }
    }

    pub fn insert(&mut self, logical_name: impl Into<String>, entity_set: impl Into<String>) {
        self.overrides
            .insert(logical_name.into().to_ascii_lowercase(), entity_set.into());
    }

    pub fn resolve(&self, logical_name: &str) -> String {
        match self.overrides.get(&logical_name.to_ascii_lowercase()) {
            Some(set) => {
                log::debug!("Entity set override: {} -> {}", logical_name, set);
                set.clone()
            }
            None => pluralize(logical_name),
        }
    }
}

fn is_vowel(c: char) -> bool {
    matches!(c.to_ascii_lowercase(), 'a' | 'e' | 'i' | 'o' | 'u')
}

/// English plural of a logical name.
pub fn pluralize(name: &str) -> String {
    let lower = name.to_ascii_lowercase();
    let mut tail = lower.chars().rev();
    let last = match tail.next() {
        Some(c) => c,
        None => return String::new(),
    };
    let before_last = tail.next();

    // keys -> keys, company -> companies
    if last == 'y' {
        return match before_last {
            Some(c) if !is_vowel(c) => format!("{}ies", &name[..name.len() - 1]),
            _ => format!("{}s", name),
        };
    }

    if lower.ends_with("ss")
        || lower.ends_with("sh")
        || lower.ends_with("ch")
        || last == 's'
        || last == 'x'
    {
        return format!("{}es", name);
    }

    // quiz -> quizzes, but waltz -> waltzes
    if last == 'z' {
        return match before_last {
            Some(c) if is_vowel(c) => format!("{}zes", name),
            _ => format!("{}es", name),
        };
    }

    if lower.ends_with("fe") {
        return format!("{}ves", &name[..name.len() - 2]);
    }
    if last == 'f' && !lower.ends_with("ff") {
        return format!("{}ves", &name[..name.len() - 1]);
    }

    if last == 'o' {
        if let Some(c) = before_last {
            if !is_vowel(c) {
                return format!("{}es", name);
            }
        }
    }

    format!("{}s", name)
}
