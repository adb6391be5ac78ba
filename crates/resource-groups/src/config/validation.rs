use std::collections::{HashMap, HashSet};

use regex::Regex;

use super::types::{GroupPath, GroupSpec, ResourceGroupsDefinition};
use crate::error::{ResourceGroupError, Result};

impl ResourceGroupsDefinition {
    /// Validate the definition: limits present, names well-formed, selectors
    /// pointing at existing leaf groups.
    pub fn validate(&self) -> Result<()> {
        if self.root_groups.is_empty() {
            return Err(ResourceGroupError::Validation(
                "at least one root group is required".to_string(),
            ));
        }

        let mut leaves = HashMap::new();
        let mut root_names = HashSet::new();
        for root in &self.root_groups {
            if !root_names.insert(root.name.as_str()) {
                return Err(ResourceGroupError::Validation(format!(
                    "duplicate root group '{}'",
                    root.name
                )));
            }
            validate_group(root, &GroupPath::root(&root.name), &mut leaves)?;
        }

        self.validate_selectors(&leaves)?;
        Ok(())
    }

    /// Every selector must target a leaf and carry compilable patterns.
    fn validate_selectors(&self, leaves: &HashMap<String, bool>) -> Result<()> {
        for (index, selector) in self.selectors.iter().enumerate() {
            match leaves.get(selector.group.as_str()) {
                None => {
                    return Err(ResourceGroupError::Validation(format!(
                        "selector {index} references unknown group '{}'",
                        selector.group
                    )));
                }
                Some(false) => {
                    return Err(ResourceGroupError::Validation(format!(
                        "selector {index} targets '{}', which is not a leaf group",
                        selector.group
                    )));
                }
                Some(true) => {}
            }
            for (field, pattern) in [("user", &selector.user), ("source", &selector.source)] {
                if let Some(pattern) = pattern {
                    Regex::new(pattern).map_err(|e| {
                        ResourceGroupError::Validation(format!(
                            "selector {index} has an invalid {field} pattern '{pattern}': {e}"
                        ))
                    })?;
                }
            }
        }
        Ok(())
    }
}

/// Check one group and its subtree, recording `path -> is_leaf` for every node.
fn validate_group(
    group: &GroupSpec,
    path: &GroupPath,
    seen: &mut HashMap<String, bool>,
) -> Result<()> {
    if group.name.trim().is_empty() || group.name.contains('.') {
        return Err(ResourceGroupError::Validation(format!(
            "invalid group name '{}' at '{}': names must be non-empty and must not contain '.'",
            group.name, path
        )));
    }

    match group.hard_concurrency_limit {
        None => {
            return Err(ResourceGroupError::Validation(format!(
                "group '{path}' is missing hardConcurrencyLimit"
            )));
        }
        Some(0) => {
            tracing::warn!(group = %path, "hardConcurrencyLimit is 0, queries in this group will never run");
        }
        Some(_) => {}
    }

    if group.soft_memory_limit.is_some() {
        return Err(ResourceGroupError::Validation(format!(
            "group '{path}' sets softMemoryLimit, which is not supported"
        )));
    }

    if group.max_queued.is_none() {
        return Err(ResourceGroupError::Validation(format!(
            "group '{path}' is missing maxQueued"
        )));
    }

    seen.insert(path.to_string(), group.sub_groups.is_empty());

    let mut child_names = HashSet::new();
    for child in &group.sub_groups {
        if !child_names.insert(child.name.as_str()) {
            return Err(ResourceGroupError::Validation(format!(
                "duplicate sub-group '{}' under '{}'",
                child.name, path
            )));
        }
        validate_group(child, &path.child(&child.name), seen)?;
    }
    Ok(())
}
