//! List Reconciler
//!
//! Computes the complete desired value of an ordered list-typed setting from
//! its previous value plus one edit. The result is always a full list: the
//! resolver service is programmed by full replacement, never incrementally.
//!
//! Merge semantics are additive and order-preserving. Adding `"c"` to
//! `["a", "b"]` yields `["a", "b", "c"]`, not `["c"]`.

use crate::model::DnsServer;

/// One edit to an ordered list
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListEdit<T> {
    /// Append at the end
    Append(T),
    /// Replace the matching entry in place; append if nothing matches
    Replace { old: T, new: T },
    /// Replace the entry sharing the new value's key in place; append if none
    Upsert(T),
    /// Remove the first matching entry
    Remove(T),
    /// Drop every entry
    Clear,
}

/// Reconcile the search domain list
///
/// Entries are identified by their text.
pub fn reconcile_search(previous: &[String], edit: ListEdit<String>) -> Vec<String> {
    apply_list_edit(previous, edit, |a, b| a == b, |a, b| a == b)
}

/// Reconcile the name server list
///
/// Entries are identified by the `(name, address)` pair; `Upsert` keys on the
/// name alone so that a server's address can be changed in place. Duplicate
/// entries are kept.
pub fn reconcile_servers(previous: &[DnsServer], edit: ListEdit<DnsServer>) -> Vec<DnsServer> {
    apply_list_edit(previous, edit, |a, b| a == b, |a, b| a.name == b.name)
}

fn apply_list_edit<T: Clone>(
    previous: &[T],
    edit: ListEdit<T>,
    same_entry: impl Fn(&T, &T) -> bool,
    same_key: impl Fn(&T, &T) -> bool,
) -> Vec<T> {
    let mut list = previous.to_vec();

    match edit {
        ListEdit::Append(item) => list.push(item),
        ListEdit::Replace { old, new } => {
            match list.iter().position(|entry| same_entry(entry, &old)) {
                Some(idx) => list[idx] = new,
                None => list.push(new),
            }
        }
        ListEdit::Upsert(item) => match list.iter().position(|entry| same_key(entry, &item)) {
            Some(idx) => list[idx] = item,
            None => list.push(item),
        },
        ListEdit::Remove(item) => {
            if let Some(idx) = list.iter().position(|entry| same_entry(entry, &item)) {
                list.remove(idx);
            }
        }
        ListEdit::Clear => list.clear(),
    }

    list
}
