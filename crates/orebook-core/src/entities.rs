//! Entity registry
//!
//! Static description of every collection the generic admin operations work
//! on: backing file, identifier column, ordered columns, display title and
//! foreign-key "select" references used to populate form dropdowns.
//!
//! The registry never changes shape at runtime.

use crate::{OrebookError, Result};
use serde::{Deserialize, Serialize};

/// Layout of one flat file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableSpec {
    /// File name inside the data directory
    pub file_name: &'static str,
    /// Identifier column (None for logs without identifiers)
    pub id_field: Option<&'static str>,
    /// Columns in the order they are written
    pub fields: &'static [&'static str],
}

impl TableSpec {
    /// Header line as written to disk.
    pub fn header(&self) -> String {
        self.fields.join(",")
    }
}

/// A foreign-key column whose form input is a dropdown over another entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ForeignKeySelect {
    /// Column on the referencing entity
    pub field: &'static str,
    /// Referenced entity
    pub entity: EntityKind,
    /// Identifier column on the referenced entity
    pub id_field: &'static str,
    /// Column shown to the user
    pub display_field: &'static str,
}

/// Registered entity kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Users,
    Countries,
    Minerals,
    Sites,
    Production,
}

impl EntityKind {
    pub const ALL: [EntityKind; 5] = [
        EntityKind::Users,
        EntityKind::Countries,
        EntityKind::Minerals,
        EntityKind::Sites,
        EntityKind::Production,
    ];

    /// Name used in routes and on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Users => "users",
            EntityKind::Countries => "countries",
            EntityKind::Minerals => "minerals",
            EntityKind::Sites => "sites",
            EntityKind::Production => "production",
        }
    }

    pub fn spec(&self) -> &'static EntitySpec {
        match self {
            EntityKind::Users => &USERS,
            EntityKind::Countries => &COUNTRIES,
            EntityKind::Minerals => &MINERALS,
            EntityKind::Sites => &SITES,
            EntityKind::Production => &PRODUCTION,
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for EntityKind {
    type Err = OrebookError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "users" => Ok(EntityKind::Users),
            "countries" => Ok(EntityKind::Countries),
            "minerals" => Ok(EntityKind::Minerals),
            "sites" => Ok(EntityKind::Sites),
            "production" => Ok(EntityKind::Production),
            _ => Err(OrebookError::NotFound(format!("Unknown entity: {}", s))),
        }
    }
}

/// Registry entry for one entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntitySpec {
    pub kind: EntityKind,
    pub title: &'static str,
    pub table: TableSpec,
    pub selects: &'static [ForeignKeySelect],
}

impl EntitySpec {
    pub fn name(&self) -> &'static str {
        self.kind.as_str()
    }

    /// Identifier column. Every registered entity has one.
    pub fn id_field(&self) -> &'static str {
        self.table.id_field.unwrap_or("")
    }

    pub fn fields(&self) -> &'static [&'static str] {
        self.table.fields
    }

    /// Editable columns: everything except the identifier.
    pub fn form_fields(&self) -> Vec<&'static str> {
        let id = self.id_field();
        self.table
            .fields
            .iter()
            .copied()
            .filter(|f| *f != id)
            .collect()
    }

    pub fn select_for(&self, field: &str) -> Option<&'static ForeignKeySelect> {
        self.selects.iter().find(|s| s.field == field)
    }
}

const COUNTRY_SELECT: ForeignKeySelect = ForeignKeySelect {
    field: "CountryID",
    entity: EntityKind::Countries,
    id_field: "CountryID",
    display_field: "CountryName",
};

const MINERAL_SELECT: ForeignKeySelect = ForeignKeySelect {
    field: "MineralID",
    entity: EntityKind::Minerals,
    id_field: "MineralID",
    display_field: "MineralName",
};

pub static USERS: EntitySpec = EntitySpec {
    kind: EntityKind::Users,
    title: "Users",
    table: TableSpec {
        file_name: "users.csv",
        id_field: Some("UserID"),
        fields: &["UserID", "Username", "PasswordHash", "RoleID", "Email"],
    },
    selects: &[],
};

pub static COUNTRIES: EntitySpec = EntitySpec {
    kind: EntityKind::Countries,
    title: "Countries",
    table: TableSpec {
        file_name: "countries.csv",
        id_field: Some("CountryID"),
        fields: &[
            "CountryID",
            "CountryName",
            "GDP_BillionUSD",
            "MiningRevenue_BillionUSD",
            "KeyProjects",
        ],
    },
    selects: &[],
};

pub static MINERALS: EntitySpec = EntitySpec {
    kind: EntityKind::Minerals,
    title: "Minerals",
    table: TableSpec {
        file_name: "minerals.csv",
        id_field: Some("MineralID"),
        fields: &[
            "MineralID",
            "MineralName",
            "Description",
            "MarketPriceUSD_per_tonne",
        ],
    },
    selects: &[],
};

pub static SITES: EntitySpec = EntitySpec {
    kind: EntityKind::Sites,
    title: "Sites",
    table: TableSpec {
        file_name: "sites.csv",
        id_field: Some("SiteID"),
        fields: &[
            "SiteID",
            "SiteName",
            "CountryID",
            "MineralID",
            "Latitude",
            "Longitude",
            "Production_tonnes",
        ],
    },
    selects: &[COUNTRY_SELECT, MINERAL_SELECT],
};

pub static PRODUCTION: EntitySpec = EntitySpec {
    kind: EntityKind::Production,
    title: "Production Stats",
    table: TableSpec {
        file_name: "production_stats.csv",
        id_field: Some("StatID"),
        fields: &[
            "StatID",
            "Year",
            "CountryID",
            "MineralID",
            "Production_tonnes",
            "ExportValue_BillionUSD",
        ],
    },
    selects: &[COUNTRY_SELECT, MINERAL_SELECT],
};

/// Role lookup table. Read for authentication only; not an admin entity.
pub static ROLES: TableSpec = TableSpec {
    file_name: "roles.csv",
    id_field: Some("RoleID"),
    fields: &["RoleID", "RoleName"],
};

/// Look up a registered entity by its route name.
pub fn lookup(name: &str) -> Result<&'static EntitySpec> {
    name.parse::<EntityKind>().map(|kind| kind.spec())
}

/// Every registered entity, in registry order.
pub fn all() -> impl Iterator<Item = &'static EntitySpec> {
    EntityKind::ALL.iter().map(|k| k.spec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_known_entities() {
        for name in ["users", "countries", "minerals", "sites", "production"] {
            let spec = lookup(name).unwrap();
            assert_eq!(spec.name(), name);
            assert_eq!(spec.fields()[0], spec.id_field());
        }
    }

    #[test]
    fn test_lookup_unknown_entity_is_not_found() {
        let err = lookup("roles").unwrap_err();
        assert!(matches!(err, OrebookError::NotFound(_)));
        assert!(lookup("Sites").is_err());
    }

    #[test]
    fn test_form_fields_exclude_identifier() {
        let fields = SITES.form_fields();
        assert!(!fields.contains(&"SiteID"));
        assert_eq!(fields.len(), SITES.fields().len() - 1);
        assert_eq!(fields[0], "SiteName");
    }

    #[test]
    fn test_selects() {
        let sel = PRODUCTION.select_for("MineralID").unwrap();
        assert_eq!(sel.entity, EntityKind::Minerals);
        assert_eq!(sel.display_field, "MineralName");
        assert!(COUNTRIES.select_for("CountryID").is_none());
    }

    #[test]
    fn test_headers_match_file_layout() {
        assert_eq!(
            PRODUCTION.table.header(),
            "StatID,Year,CountryID,MineralID,Production_tonnes,ExportValue_BillionUSD"
        );
        assert_eq!(ROLES.header(), "RoleID,RoleName");
        assert_eq!(all().count(), 5);
    }
}
