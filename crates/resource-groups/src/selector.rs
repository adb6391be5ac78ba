//! Compiled selection rules.

use std::collections::BTreeSet;

use gatehouse_core::SessionContext;
use regex::Regex;

use crate::config::SelectorSpec;
use crate::error::{ResourceGroupError, Result};
use crate::tree::GroupId;

/// A selector with its patterns compiled and its target resolved to a group id.
#[derive(Debug, Clone)]
pub(crate) struct CompiledSelector {
    user: Option<Regex>,
    source: Option<Regex>,
    client_tags: BTreeSet<String>,
    pub(crate) group: GroupId,
}

impl CompiledSelector {
    pub(crate) fn compile(spec: &SelectorSpec, group: GroupId) -> Result<Self> {
        Ok(Self {
            user: spec.user.as_deref().map(full_match).transpose()?,
            source: spec.source.as_deref().map(full_match).transpose()?,
            client_tags: spec.client_tags.iter().cloned().collect(),
            group,
        })
    }

    pub(crate) fn matches(&self, session: &SessionContext) -> bool {
        if let Some(user) = &self.user {
            if !user.is_match(&session.user) {
                return false;
            }
        }
        if let Some(source) = &self.source {
            match session.source.as_deref() {
                Some(s) if source.is_match(s) => {}
                _ => return false,
            }
        }
        self.client_tags.is_subset(&session.client_tags)
    }
}

/// Patterns must match the whole attribute, not a substring.
fn full_match(pattern: &str) -> Result<Regex> {
    Regex::new(&format!("^(?:{pattern})$")).map_err(|e| {
        ResourceGroupError::Validation(format!("invalid selector pattern '{pattern}': {e}"))
    })
}
