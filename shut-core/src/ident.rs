//! Structural identifiers for tasks and groups.
//!
//! An identifier is the entity's own name prefixed by the identifiers of every group above it,
//! joined with [`SEPARATOR`] (e.g. `checks:readme`). Identifiers are computed from the live
//! parent chain rather than stored on the entity.

use smallvec::SmallVec;

use crate::error::{Error, Result};

/// Separator between the segments of an identifier.
pub const SEPARATOR: &str = ":";

/// Checks that `name` can be used as a single identifier segment.
pub fn validate_name(name: &str) -> Result<()> {
    let reason = if name.trim().is_empty() {
        "name must not be empty"
    } else if name.contains(SEPARATOR) {
        "name must not contain ':'"
    } else {
        return Ok(());
    };

    Err(Error::InvalidName {
        name: name.to_string(),
        reason,
    })
}

/// Joins a child name onto its parent's identifier.
#[inline]
pub fn join(parent: Option<&str>, name: &str) -> String {
    match parent {
        Some(parent) => format!("{}{}{}", parent, SEPARATOR, name),
        None => name.to_string(),
    }
}

/// Resolves the identifier of an entity named `name` whose parent is `parent`.
///
/// `lookup` maps a group index to that group's name and its own parent, and is followed until a
/// root group is reached.
pub fn resolve<'a, F>(name: &'a str, mut parent: Option<usize>, mut lookup: F) -> String
where
    F: FnMut(usize) -> (&'a str, Option<usize>),
{
    let mut segments: SmallVec<[&str; 4]> = SmallVec::new();
    segments.push(name);
    while let Some(index) = parent {
        let (group_name, next) = lookup(index);
        segments.push(group_name);
        parent = next;
    }
    segments.reverse();
    segments.join(SEPARATOR)
}
