//! Change plans
//!
//! A [`ChangePlan`] folds a batch of edits into the desired configuration,
//! using the List Reconciler for ordered lists. Building a plan only checks
//! edit shape (known leaf, value type); value grammar is checked by the
//! appliers before anything is applied.

use crate::error::{ValidationError, ValidationReason};
use crate::model::{
    ChangeBatch, Clock, DnsServer, Edit, LeafPath, LeafValue, Operation, ResolverOptions, Subtree,
    SystemConfig,
};
use crate::reconcile::{ListEdit, reconcile_search, reconcile_servers};
use std::collections::BTreeSet;

/// Desired configuration plus the leaves a batch touched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangePlan {
    /// Running configuration before the batch
    pub prior: SystemConfig,
    /// Configuration after every edit of the batch
    pub desired: SystemConfig,
    touched: BTreeSet<LeafPath>,
}

impl ChangePlan {
    /// Fold `batch` into `prior`
    pub fn build(prior: &SystemConfig, batch: &ChangeBatch) -> Result<Self, ValidationError> {
        let mut desired = prior.clone();
        let mut touched = BTreeSet::new();

        for edit in &batch.edits {
            apply_edit(&mut desired, edit)?;
            touched.insert(edit.path);
        }

        Ok(Self {
            prior: prior.clone(),
            desired,
            touched,
        })
    }

    /// Whether the batch edited `leaf`
    pub fn touches(&self, leaf: LeafPath) -> bool {
        self.touched.contains(&leaf)
    }

    /// Whether the batch edited any leaf below `subtree`
    pub fn touches_subtree(&self, subtree: Subtree) -> bool {
        self.touched.iter().any(|leaf| leaf.subtree() == subtree)
    }

    /// Touched subtrees in apply order
    pub fn subtrees(&self) -> Vec<Subtree> {
        Subtree::APPLY_ORDER
            .into_iter()
            .filter(|s| self.touches_subtree(*s))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.touched.is_empty()
    }
}

fn apply_edit(desired: &mut SystemConfig, edit: &Edit) -> Result<(), ValidationError> {
    match edit.path {
        LeafPath::Hostname => {
            desired.hostname = match edit.operation {
                Operation::Created | Operation::Modified => Some(text(edit, edit.new_value.as_ref())?),
                Operation::Deleted => None,
            };
        }
        LeafPath::TimezoneName => match edit.operation {
            Operation::Created | Operation::Modified => {
                desired.clock = Some(Clock::TimezoneName(text(edit, edit.new_value.as_ref())?));
            }
            // only clears the choice if this case is the authoritative one
            Operation::Deleted => {
                if matches!(desired.clock, Some(Clock::TimezoneName(_))) {
                    desired.clock = None;
                }
            }
        },
        LeafPath::TimezoneUtcOffset => match edit.operation {
            Operation::Created | Operation::Modified => {
                let minutes = integer(edit, edit.new_value.as_ref())?;
                let minutes = i16::try_from(minutes).map_err(|_| {
                    ValidationError::new(
                        edit.path.as_str(),
                        minutes.to_string(),
                        ValidationReason::InvalidUtcOffset,
                    )
                })?;
                desired.clock = Some(Clock::TimezoneUtcOffset(minutes));
            }
            Operation::Deleted => {
                if matches!(desired.clock, Some(Clock::TimezoneUtcOffset(_))) {
                    desired.clock = None;
                }
            }
        },
        LeafPath::DnsSearch => {
            let list_edit = list_edit(edit, |value| text(edit, Some(value)))?;
            desired.dns_resolver.search = reconcile_search(&desired.dns_resolver.search, list_edit);
        }
        LeafPath::DnsServer => {
            let list_edit = list_edit(edit, |value| server(edit, value))?;
            desired.dns_resolver.server = reconcile_servers(&desired.dns_resolver.server, list_edit);
        }
        LeafPath::DnsOptionsTimeout => {
            desired.dns_resolver.options.timeout_secs =
                knob(edit, ResolverOptions::default().timeout_secs)?;
        }
        LeafPath::DnsOptionsAttempts => {
            desired.dns_resolver.options.attempts = knob(edit, ResolverOptions::default().attempts)?;
        }
    }

    Ok(())
}

/// Translate a store edit on a list leaf into a reconciler edit
///
/// Created appends (merge semantics). Modified replaces the old entry in
/// place, or upserts by key when the store did not send the old value.
/// Deleted removes the old entry, or clears the list when none is named.
fn list_edit<T>(
    edit: &Edit,
    convert: impl Fn(&LeafValue) -> Result<T, ValidationError>,
) -> Result<ListEdit<T>, ValidationError> {
    let required = |value: Option<&LeafValue>| {
        value
            .ok_or_else(|| mismatch(edit, "<missing>"))
            .and_then(&convert)
    };

    Ok(match edit.operation {
        Operation::Created => ListEdit::Append(required(edit.new_value.as_ref())?),
        Operation::Modified => {
            let new = required(edit.new_value.as_ref())?;
            match edit.old_value.as_ref() {
                Some(old) => ListEdit::Replace {
                    old: convert(old)?,
                    new,
                },
                None => ListEdit::Upsert(new),
            }
        }
        Operation::Deleted => match edit.old_value.as_ref() {
            Some(old) => ListEdit::Remove(convert(old)?),
            None => ListEdit::Clear,
        },
    })
}

fn knob(edit: &Edit, default: u8) -> Result<u8, ValidationError> {
    match edit.operation {
        Operation::Created | Operation::Modified => {
            let value = integer(edit, edit.new_value.as_ref())?;
            u8::try_from(value).map_err(|_| {
                ValidationError::new(
                    edit.path.as_str(),
                    value.to_string(),
                    ValidationReason::OutOfRange,
                )
            })
        }
        Operation::Deleted => Ok(default),
    }
}

fn text(edit: &Edit, value: Option<&LeafValue>) -> Result<String, ValidationError> {
    match value {
        Some(LeafValue::Text(s)) => Ok(s.clone()),
        Some(other) => Err(mismatch(edit, &other.to_string())),
        None => Err(mismatch(edit, "<missing>")),
    }
}

fn integer(edit: &Edit, value: Option<&LeafValue>) -> Result<i64, ValidationError> {
    match value {
        Some(LeafValue::Integer(n)) => Ok(*n),
        Some(other) => Err(mismatch(edit, &other.to_string())),
        None => Err(mismatch(edit, "<missing>")),
    }
}

fn server(edit: &Edit, value: &LeafValue) -> Result<DnsServer, ValidationError> {
    match value {
        LeafValue::Server(s) => Ok(s.clone()),
        other => Err(mismatch(edit, &other.to_string())),
    }
}

fn mismatch(edit: &Edit, value: &str) -> ValidationError {
    ValidationError::new(edit.path.as_str(), value, ValidationReason::TypeMismatch)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_value(s: &str) -> LeafValue {
        LeafValue::Text(s.to_string())
    }

    #[test]
    fn merge_created_search_entries_append() {
        let mut prior = SystemConfig::default();
        prior.dns_resolver.search = vec!["corp.example".to_string()];

        let batch = ChangeBatch::new()
            .with(Edit::created(LeafPath::DnsSearch, text_value("a")))
            .with(Edit::created(LeafPath::DnsSearch, text_value("b")));

        let plan = ChangePlan::build(&prior, &batch).unwrap();
        assert_eq!(plan.desired.dns_resolver.search, vec!["corp.example", "a", "b"]);
        assert_eq!(plan.subtrees(), vec![Subtree::DnsResolver]);
        assert!(plan.touches(LeafPath::DnsSearch));
        assert!(!plan.touches(LeafPath::DnsServer));
    }

    #[test]
    fn setting_zone_name_replaces_offset() {
        let prior = SystemConfig {
            clock: Some(Clock::TimezoneUtcOffset(120)),
            ..Default::default()
        };

        // store order within the batch must not matter
        for edits in [
            vec![
                Edit::deleted(LeafPath::TimezoneUtcOffset, Some(LeafValue::Integer(120))),
                Edit::created(LeafPath::TimezoneName, text_value("Europe/Berlin")),
            ],
            vec![
                Edit::created(LeafPath::TimezoneName, text_value("Europe/Berlin")),
                Edit::deleted(LeafPath::TimezoneUtcOffset, Some(LeafValue::Integer(120))),
            ],
        ] {
            let plan = ChangePlan::build(&prior, &ChangeBatch::from(edits)).unwrap();
            assert_eq!(
                plan.desired.clock,
                Some(Clock::TimezoneName("Europe/Berlin".to_string()))
            );
        }
    }

    #[test]
    fn wrong_value_type_is_rejected() {
        let batch = ChangeBatch::new().with(Edit::created(LeafPath::Hostname, LeafValue::Integer(7)));
        let err = ChangePlan::build(&SystemConfig::default(), &batch).unwrap_err();
        assert_eq!(err.reason, ValidationReason::TypeMismatch);
        assert_eq!(err.leaf, "system/hostname");
    }

    #[test]
    fn deleting_search_without_old_value_clears() {
        let mut prior = SystemConfig::default();
        prior.dns_resolver.search = vec!["a".to_string(), "b".to_string()];

        let batch = ChangeBatch::new().with(Edit::deleted(LeafPath::DnsSearch, None));
        let plan = ChangePlan::build(&prior, &batch).unwrap();
        assert!(plan.desired.dns_resolver.search.is_empty());
    }

    #[test]
    fn oversized_knob_is_out_of_range() {
        let batch = ChangeBatch::new().with(Edit::modified(
            LeafPath::DnsOptionsAttempts,
            None,
            LeafValue::Integer(300),
        ));
        let err = ChangePlan::build(&SystemConfig::default(), &batch).unwrap_err();
        assert_eq!(err.reason, ValidationReason::OutOfRange);
    }

    #[test]
    fn subtrees_follow_apply_order() {
        let batch = ChangeBatch::new()
            .with(Edit::created(LeafPath::DnsSearch, text_value("a")))
            .with(Edit::created(LeafPath::TimezoneName, text_value("Europe/Berlin")))
            .with(Edit::created(LeafPath::Hostname, text_value("host")));
        let plan = ChangePlan::build(&SystemConfig::default(), &batch).unwrap();
        assert_eq!(
            plan.subtrees(),
            vec![Subtree::Hostname, Subtree::Clock, Subtree::DnsResolver]
        );
    }
}
