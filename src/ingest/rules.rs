//! The rewrite rule engine.
//!
//! Rules are an ordered chain of per-source (or wildcard) text
//! transformations, each reading one field of the item and conditionally
//! writing another. Rules are independent transactions: every rule reads
//! its source field fresh, so later rules observe earlier rules' writes.
//!
//! A rule whose precondition fails (absent source field, empty pattern,
//! uncompilable regex, no match) performs no write and never stops the
//! chain.

use regex::{NoExpand, Regex, RegexBuilder};

use super::normalize::NormalizedItem;
use crate::feed::RawItem;
use crate::storage::Rule as StoredRule;

/// Highest match placeholder (`$0`..`$9`) substituted in extract
/// templates.
const MAX_EXTRACT_PLACEHOLDERS: usize = 10;

/// The closed set of item fields a rule can address by name.
///
/// Anything else read falls through to the raw feed item's field map, so
/// rules can extract from arbitrary feed elements; anything else written
/// is a no-op, except `category`, which appends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Link,
    Title,
    Description,
    Date,
    Creator,
    Custom1,
    Custom2,
}

impl Field {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "link" => Some(Self::Link),
            "title" => Some(Self::Title),
            "description" => Some(Self::Description),
            "date" => Some(Self::Date),
            "creator" => Some(Self::Creator),
            "custom1" => Some(Self::Custom1),
            "custom2" => Some(Self::Custom2),
            _ => None,
        }
    }
}

/// Rule operations. Each row documents its write condition; see
/// [`CompiledRule::evaluate`] for the exact semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RuleOp {
    /// Keep the text before the first literal occurrence of the pattern.
    Shrink,
    /// Drop the pattern off the front, only when it sits at index 0.
    Cut,
    /// Regex-replace the pattern everywhere; a literal occurrence makes a
    /// literal replace pass win instead.
    Replace,
    /// Splice out the first regex match.
    Remove,
    /// Cut to N characters on a word boundary and append `...`.
    Truncate,
    /// Pick the Nth regex match, or fill a `$0..$9` template.
    Extract,
}

impl RuleOp {
    fn parse(op: &str) -> Option<Self> {
        match op {
            "shrink" => Some(Self::Shrink),
            "cut" => Some(Self::Cut),
            "replace" => Some(Self::Replace),
            "remove" => Some(Self::Remove),
            "truncate" => Some(Self::Truncate),
            "extract" => Some(Self::Extract),
            _ => None,
        }
    }
}

#[derive(Debug)]
struct CompiledRule {
    source_name: String,
    from_field: String,
    to_field: String,
    op: RuleOp,
    pattern: String,
    value: String,
    int_value: i64,
    /// Case-insensitive compilation of `pattern`; `None` when the
    /// pattern is empty or does not compile (regex ops become no-ops).
    regex: Option<Regex>,
}

/// An immutable, pre-compiled snapshot of the rule chain for one run.
#[derive(Debug, Default)]
pub struct RuleSet {
    rules: Vec<CompiledRule>,
}

impl RuleSet {
    /// Compile stored rules, preserving their storage order. Unknown
    /// operations are dropped with a warning; bad regex patterns disable
    /// only the regex-based behavior of their rule.
    pub fn compile(stored: &[StoredRule]) -> Self {
        let mut rules = Vec::with_capacity(stored.len());
        for rule in stored {
            let Some(op) = RuleOp::parse(&rule.op) else {
                tracing::warn!(rule = rule.id, op = %rule.op, "unknown rule operation, skipping");
                continue;
            };
            let regex = if rule.pattern.is_empty() {
                None
            } else {
                match RegexBuilder::new(&rule.pattern).case_insensitive(true).build() {
                    Ok(re) => Some(re),
                    Err(e) => {
                        tracing::warn!(
                            rule = rule.id,
                            pattern = %rule.pattern,
                            error = %e,
                            "rule pattern does not compile, rule disabled for regex matching"
                        );
                        None
                    }
                }
            };
            rules.push(CompiledRule {
                source_name: rule.source_name.clone(),
                from_field: rule.from_field.clone(),
                to_field: rule.to_field.clone(),
                op,
                pattern: rule.pattern.clone(),
                value: rule.value.clone(),
                int_value: rule.int_value,
                regex,
            });
        }
        Self { rules }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Apply every matching rule to the item, in order. Returns the
    /// number of rules that actually wrote a field (informational only).
    pub fn apply(&self, source_name: &str, item: &mut NormalizedItem, raw: &RawItem) -> usize {
        let mut applied = 0;
        for rule in &self.rules {
            if rule.source_name != "*" && rule.source_name != source_name {
                continue;
            }
            let Some(value) = read_field(item, raw, &rule.from_field) else {
                continue;
            };
            let Some(result) = rule.evaluate(&value) else {
                continue;
            };
            if write_field(item, &rule.to_field, result) {
                applied += 1;
            }
        }
        applied
    }
}

impl CompiledRule {
    fn evaluate(&self, value: &str) -> Option<String> {
        match self.op {
            RuleOp::Shrink => {
                if self.pattern.is_empty() {
                    return None;
                }
                let idx = value.find(&self.pattern)?;
                Some(value[..idx].trim().to_string())
            }
            RuleOp::Cut => {
                if self.pattern.is_empty() {
                    return None;
                }
                value.strip_prefix(self.pattern.as_str()).map(str::to_string)
            }
            RuleOp::Replace => {
                let re = self.regex.as_ref()?;
                // Two passes: the case-insensitive regex pass, overridden
                // by a literal substring pass whenever the pattern occurs
                // verbatim. Kept exactly as the stored rules expect it.
                if value.contains(&self.pattern) {
                    Some(value.replace(&self.pattern, &self.value))
                } else {
                    Some(re.replace_all(value, NoExpand(&self.value)).into_owned())
                }
            }
            RuleOp::Remove => {
                let re = self.regex.as_ref()?;
                let m = re.find(value)?;
                // Only the matched span is removed; identical text
                // elsewhere in the field stays put
                let mut out = String::with_capacity(value.len() - (m.end() - m.start()));
                out.push_str(&value[..m.start()]);
                out.push_str(&value[m.end()..]);
                Some(out)
            }
            RuleOp::Truncate => truncate_at_word(value, self.int_value),
            RuleOp::Extract => self.extract(value),
        }
    }

    fn extract(&self, value: &str) -> Option<String> {
        let re = self.regex.as_ref()?;
        let matches: Vec<&str> = re.find_iter(value).map(|m| m.as_str()).collect();

        if self.value.is_empty() {
            // Plain indexed extraction: the int value is a zero-based
            // match index
            let idx = usize::try_from(self.int_value).ok()?;
            return matches.get(idx).map(|m| m.to_string());
        }

        // Template extraction: fill $0..$9 with the matches in the order
        // they were found, but only once enough matches exist
        let required = usize::try_from(self.int_value).unwrap_or(0);
        if matches.len() <= required {
            return None;
        }
        let mut out = self.value.clone();
        for i in (0..matches.len().min(MAX_EXTRACT_PLACEHOLDERS)).rev() {
            out = out.replace(&format!("${}", i), matches[i]);
        }
        Some(out)
    }
}

fn read_field(item: &NormalizedItem, raw: &RawItem, name: &str) -> Option<String> {
    match Field::parse(name) {
        Some(Field::Link) => Some(item.link.clone()),
        Some(Field::Title) => Some(item.title.clone()),
        Some(Field::Description) => item.description.clone(),
        Some(Field::Date) => Some(item.date.clone()),
        Some(Field::Creator) => item.creator.clone(),
        Some(Field::Custom1) => item.custom1.clone(),
        Some(Field::Custom2) => item.custom2.clone(),
        // Fallback: unknown names read straight from the raw feed item
        None => raw
            .fields
            .get(name)
            .cloned()
            .or_else(|| raw.dc.get(name).cloned()),
    }
}

/// Returns true when a field was actually written.
fn write_field(item: &mut NormalizedItem, name: &str, value: String) -> bool {
    match Field::parse(name) {
        Some(Field::Link) => item.link = value,
        Some(Field::Title) => item.title = value,
        Some(Field::Description) => item.description = Some(value),
        Some(Field::Date) => item.date = value,
        Some(Field::Creator) => item.creator = Some(value),
        Some(Field::Custom1) => item.custom1 = Some(value),
        Some(Field::Custom2) => item.custom2 = Some(value),
        // `category` is write-only with append semantics
        None if name == "category" => {
            item.category = Some(match item.category.take() {
                Some(existing) if !existing.is_empty() => format!("{}, {}", existing, value),
                _ => value,
            });
        }
        // Unknown targets are a documented no-op
        None => return false,
    }
    true
}

fn truncate_at_word(value: &str, max_chars: i64) -> Option<String> {
    if max_chars <= 0 {
        return None;
    }
    let max_chars = max_chars as usize;
    if value.chars().count() <= max_chars {
        return None;
    }

    let cut_byte = value
        .char_indices()
        .nth(max_chars)
        .map(|(i, _)| i)
        .unwrap_or(value.len());
    let prefix = &value[..cut_byte];

    // The cut split a word when non-whitespace sits on both sides of it;
    // back up to the last word boundary and drop the fragment
    let splits_word = value[cut_byte..]
        .chars()
        .next()
        .is_some_and(|c| !c.is_whitespace())
        && prefix.chars().last().is_some_and(|c| !c.is_whitespace());
    let kept = if splits_word {
        match prefix.rfind(char::is_whitespace) {
            Some(i) => &prefix[..i],
            None => "",
        }
    } else {
        prefix
    };

    Some(format!("{}...", kept.trim_end()))
}
