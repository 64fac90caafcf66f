//! Permissions granted by access tokens and required by applications

use std::{
    collections::{btree_set, BTreeSet},
    fmt,
    str::FromStr,
};

use aliri_braid::braid;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single permission string, such as `read:data`
#[braid(serde, ref_doc = "A borrowed reference to a [`Permission`]")]
pub struct Permission;

/// The token lacked one or more of the permissions an application requires
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("Missing permissions '{missing}'")]
pub struct MissingPermissions {
    missing: Permissions,
}

impl MissingPermissions {
    /// The required permissions that were not granted
    #[inline]
    pub fn missing(&self) -> &Permissions {
        &self.missing
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
enum PermissionsDto {
    String(String),
    Array(Vec<Permission>),
}

impl From<Option<PermissionsDto>> for Permissions {
    fn from(dto: Option<PermissionsDto>) -> Self {
        match dto {
            Some(PermissionsDto::String(s)) => Self::from_delimited(&s),
            Some(PermissionsDto::Array(arr)) => arr.into_iter().collect(),
            None => Self::empty(),
        }
    }
}

impl From<Permissions> for PermissionsDto {
    fn from(p: Permissions) -> Self {
        PermissionsDto::Array(p.0.into_iter().collect())
    }
}

/// An ordered set of permissions
///
/// Ordering is lexicographic so that anything derived from a set, such as
/// the list of missing permissions in a denial, is stable between runs.
///
/// Deserializes from either a JSON array of strings or a single
/// whitespace-delimited string.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(from = "Option<PermissionsDto>", into = "PermissionsDto")]
#[must_use]
pub struct Permissions(BTreeSet<Permission>);

impl Permissions {
    /// Produces an empty permission set
    #[inline]
    pub const fn empty() -> Self {
        Self(BTreeSet::new())
    }

    /// Constructs a permission set holding a single permission
    #[inline]
    pub fn single(permission: Permission) -> Self {
        Self::empty().and(permission)
    }

    /// Adds an additional permission
    #[inline]
    pub fn and(mut self, permission: Permission) -> Self {
        self.insert(permission);
        self
    }

    /// Builds a set from a whitespace-delimited list
    pub fn from_delimited(s: &str) -> Self {
        s.split_whitespace().collect()
    }

    /// Adds a permission to the set
    #[inline]
    pub fn insert(&mut self, permission: Permission) {
        self.0.insert(permission);
    }

    /// The number of distinct permissions held
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set holds no permissions
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether the set holds `permission`
    #[inline]
    #[must_use]
    pub fn contains(&self, permission: &PermissionRef) -> bool {
        self.0.contains(permission)
    }

    /// Produces an iterator of the permissions in this set, in order
    #[inline]
    pub fn iter(&self) -> Iter<'_> {
        self.into_iter()
    }

    /// Checks to see whether this set contains all of the
    /// permissions in `subset`
    #[inline]
    #[must_use]
    pub fn contains_all(&self, subset: &Permissions) -> bool {
        self.0.is_superset(&subset.0)
    }

    /// The permissions in this set which are absent from `granted`
    pub fn missing_from(&self, granted: &Permissions) -> Permissions {
        Self(self.0.difference(&granted.0).cloned().collect())
    }

    /// Evaluates these required permissions against those `granted`
    ///
    /// # Errors
    ///
    /// Returns the required permissions absent from `granted` if there are any.
    pub fn evaluate(&self, granted: &Permissions) -> Result<(), MissingPermissions> {
        if granted.contains_all(self) {
            Ok(())
        } else {
            Err(MissingPermissions {
                missing: self.missing_from(granted),
            })
        }
    }
}

/// Renders the permissions joined by `, `
impl fmt::Display for Permissions {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut first = true;
        for p in &self.0 {
            if !first {
                f.write_str(", ")?;
            }
            f.write_str(p.as_str())?;
            first = false;
        }
        Ok(())
    }
}

impl IntoIterator for Permissions {
    type Item = Permission;
    type IntoIter = btree_set::IntoIter<Permission>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// An iterator over a set of borrowed permissions
#[derive(Clone, Debug)]
pub struct Iter<'a> {
    iter: btree_set::Iter<'a, Permission>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a PermissionRef;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.iter.next().map(|x| x.as_ref())
    }
}

impl<'a> IntoIterator for &'a Permissions {
    type Item = &'a PermissionRef;
    type IntoIter = Iter<'a>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        Iter {
            iter: self.0.iter(),
        }
    }
}

impl Extend<Permission> for Permissions {
    #[inline]
    fn extend<I>(&mut self, iter: I)
    where
        I: IntoIterator<Item = Permission>,
    {
        self.0.extend(iter)
    }
}

impl FromIterator<Permission> for Permissions {
    #[inline]
    fn from_iter<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = Permission>,
    {
        Self(iter.into_iter().collect())
    }
}

impl<'a> FromIterator<&'a str> for Permissions {
    #[inline]
    fn from_iter<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        iter.into_iter()
            .map(|s| Permission::new(s.to_owned()))
            .collect()
    }
}

impl FromStr for Permissions {
    type Err = std::convert::Infallible;

    #[inline]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_delimited(s))
    }
}
