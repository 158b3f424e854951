//! Immutable in-memory copy of every collection.
//!
//! A snapshot is built once per reload and shared behind an `Arc`; readers
//! never observe a half-applied write.

use crate::entities::{EntityKind, EntitySpec};
use crate::record::{parse_integer, Record};
use crate::roles::Role;
use crate::views::{join_production, join_sites, ProductionView, SiteView};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// One dropdown choice for a foreign-key field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectOption {
    pub value: String,
    pub label: String,
}

#[derive(Debug, Clone)]
pub struct Snapshot {
    collections: HashMap<EntityKind, Vec<Record>>,
    roles: Vec<Record>,
    pub sites_full: Vec<SiteView>,
    pub production_full: Vec<ProductionView>,
    pub loaded_at: DateTime<Utc>,
}

impl Snapshot {
    /// Build a snapshot and its joined views. Entities missing from
    /// `collections` are treated as empty.
    pub fn build(
        collections: impl IntoIterator<Item = (EntityKind, Vec<Record>)>,
        roles: Vec<Record>,
    ) -> Self {
        let collections: HashMap<_, _> = collections.into_iter().collect();

        let empty = Vec::new();
        let get = |kind: EntityKind| collections.get(&kind).unwrap_or(&empty);
        let sites_full = join_sites(
            get(EntityKind::Sites),
            get(EntityKind::Countries),
            get(EntityKind::Minerals),
        );
        let production_full = join_production(
            get(EntityKind::Production),
            get(EntityKind::Countries),
            get(EntityKind::Minerals),
        );

        Self {
            collections,
            roles,
            sites_full,
            production_full,
            loaded_at: Utc::now(),
        }
    }

    pub fn empty() -> Self {
        Self::build(std::iter::empty(), Vec::new())
    }

    /// Rows of one entity in file order.
    pub fn records(&self, kind: EntityKind) -> &[Record] {
        self.collections
            .get(&kind)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn count(&self, kind: EntityKind) -> usize {
        self.records(kind).len()
    }

    pub fn roles(&self) -> &[Record] {
        &self.roles
    }

    /// Find a row of `kind` by identifier.
    pub fn find(&self, kind: EntityKind, id: i64) -> Option<&Record> {
        let id_field = kind.spec().id_field();
        self.records(kind)
            .iter()
            .find(|r| r.integer(id_field) == Some(id))
    }

    /// Resolve a `RoleID` cell to its role name.
    pub fn role_name(&self, role_id: &str) -> Option<&str> {
        let id = parse_integer(role_id)?;
        self.roles
            .iter()
            .find(|r| r.integer("RoleID") == Some(id))
            .and_then(|r| r.get("RoleName"))
    }

    /// Role of a user row; `None` when its RoleID does not resolve.
    pub fn role_of(&self, user: &Record) -> Option<Role> {
        self.role_name(user.get_or_empty("RoleID"))
            .map(Role::from_name)
    }

    /// Exact, case-sensitive username lookup.
    pub fn find_user(&self, username: &str) -> Option<&Record> {
        self.records(EntityKind::Users)
            .iter()
            .find(|u| u.get("Username") == Some(username))
    }

    /// Dropdown choices for every foreign-key field of `spec`, taken from the
    /// referenced entity's current rows.
    pub fn select_options(&self, spec: &EntitySpec) -> BTreeMap<&'static str, Vec<SelectOption>> {
        spec.selects
            .iter()
            .map(|select| {
                let options = self
                    .records(select.entity)
                    .iter()
                    .map(|r| SelectOption {
                        value: r.get_or_empty(select.id_field).to_string(),
                        label: r.get_or_empty(select.display_field).to_string(),
                    })
                    .collect();
                (select.field, options)
            })
            .collect()
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::empty()
    }
}
