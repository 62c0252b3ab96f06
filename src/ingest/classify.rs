//! Regex-based category classification.
//!
//! A category filter is two pipe-separated pattern chunks divided by
//! `~`: the left half includes, the right half excludes, and either may
//! be absent. A category is a candidate when ANY include pattern matches
//! the item's title or description; it is rejected when ANY exclude
//! pattern matches (exclude overrides include). A category with no
//! include patterns never matches, regardless of its exclude list.

use regex::{Regex, RegexBuilder};

use super::normalize::NormalizedItem;
use crate::storage::Category;

/// A category definition compiled for one pipeline run.
#[derive(Debug)]
pub struct CompiledCategory {
    pub id: i64,
    pub name: String,
    includes: Vec<Regex>,
    excludes: Vec<Regex>,
}

impl CompiledCategory {
    pub fn compile(category: &Category) -> Self {
        let (include_part, exclude_part) = match category.filter.split_once('~') {
            Some((i, e)) => (i, e),
            None => (category.filter.as_str(), ""),
        };
        Self {
            id: category.id,
            name: category.name.clone(),
            includes: compile_patterns(include_part, &category.name),
            excludes: compile_patterns(exclude_part, &category.name),
        }
    }

    /// Does this category apply to an item with the given title and
    /// description?
    fn matches_item(&self, title: &str, description: &str) -> bool {
        if self.includes.is_empty() {
            // An empty include list is "no candidates"
            return false;
        }
        let included = self
            .includes
            .iter()
            .any(|re| re.is_match(title) || re.is_match(description));
        if !included {
            return false;
        }
        !self
            .excludes
            .iter()
            .any(|re| re.is_match(title) || re.is_match(description))
    }

    /// Recount-time matching: the same include/exclude logic, but run
    /// against a persisted category field. The subject is wrapped in
    /// spaces so patterns written as `" News "` cannot partially overlap
    /// neighbouring words.
    pub fn matches_category_field(&self, category_field: &str) -> bool {
        if self.includes.is_empty() {
            return false;
        }
        let subject = format!(" {} ", category_field);
        let included = self.includes.iter().any(|re| re.is_match(&subject));
        included && !self.excludes.iter().any(|re| re.is_match(&subject))
    }
}

fn compile_patterns(chunk: &str, category_name: &str) -> Vec<Regex> {
    chunk
        .split('|')
        .filter(|p| !p.is_empty())
        .filter_map(|pattern| {
            match RegexBuilder::new(pattern).case_insensitive(true).build() {
                Ok(re) => Some(re),
                Err(e) => {
                    tracing::warn!(
                        category = %category_name,
                        pattern = %pattern,
                        error = %e,
                        "category pattern does not compile, ignoring"
                    );
                    None
                }
            }
        })
        .collect()
}

/// Compile the per-run category snapshot.
pub fn compile_categories(categories: &[Category]) -> Vec<CompiledCategory> {
    categories.iter().map(CompiledCategory::compile).collect()
}

/// Tags the item with every matching category.
///
/// The working tag set starts from any category already on the item;
/// matched category names are appended (no duplicates). When at least
/// one tag was added the item's category field is replaced with the
/// joined set. Returns the number of tags added.
pub fn classify(item: &mut NormalizedItem, categories: &[CompiledCategory]) -> usize {
    let mut tags: Vec<String> = item
        .category
        .as_deref()
        .map(|c| c.split(", ").map(str::to_string).collect())
        .unwrap_or_default();
    let description = item.description.as_deref().unwrap_or("");

    let mut added = 0;
    for category in categories {
        if !category.matches_item(&item.title, description) {
            continue;
        }
        if tags.iter().any(|t| t == &category.name) {
            continue;
        }
        tags.push(category.name.clone());
        added += 1;
    }

    if added > 0 {
        item.category = Some(tags.join(", "));
    }
    added
}
