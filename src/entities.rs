use std::fmt;
use std::str::FromStr;

use crate::domain::{CompassError, Role};
use crate::row::{Row, RowKind};

/// A tab of the dashboard: a category of records with its own collection and
/// searchable fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Entity {
    Patients,
    Hospitals,
    Doctors,
    Nurses,
    Ashas,
}

impl Entity {
    pub const ALL: [Entity; 5] = [
        Entity::Patients,
        Entity::Hospitals,
        Entity::Doctors,
        Entity::Nurses,
        Entity::Ashas,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Entity::Patients => "patients",
            Entity::Hospitals => "hospitals",
            Entity::Doctors => "doctors",
            Entity::Nurses => "nurses",
            Entity::Ashas => "ashas",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Entity::Patients => "Patients",
            Entity::Hospitals => "Hospitals",
            Entity::Doctors => "Doctors",
            Entity::Nurses => "Nurses",
            Entity::Ashas => "ASHA workers",
        }
    }

    pub fn collection(&self) -> &'static str {
        match self {
            Entity::Patients => "patients",
            Entity::Hospitals => "hospitals",
            Entity::Doctors | Entity::Nurses | Entity::Ashas => "users",
        }
    }

    pub fn search_fields(&self) -> &'static [&'static str] {
        match self {
            Entity::Patients => &[
                "name",
                "patient_id",
                "diseases",
                "phone",
                "village",
                "hospital",
                "assigned_asha",
            ],
            Entity::Hospitals => &["name", "city", "district", "phone", "specialties"],
            Entity::Doctors => &["name", "email", "phone", "hospital", "specialization"],
            Entity::Nurses | Entity::Ashas => &["name", "email", "phone", "hospital"],
        }
    }

    /// Fields that CSV files store as `;`-separated lists.
    pub fn list_fields(&self) -> &'static [&'static str] {
        match self {
            Entity::Patients => &["diseases", "medications"],
            Entity::Hospitals => &["specialties"],
            Entity::Doctors | Entity::Nurses | Entity::Ashas => &[],
        }
    }

    /// Whether a record of the backing collection belongs to this tab.
    pub fn accepts(&self, row: &Row) -> bool {
        match (self, row.kind()) {
            (Entity::Patients, RowKind::Patient) => true,
            (Entity::Hospitals, RowKind::Hospital) => true,
            (Entity::Doctors, RowKind::User(Some(Role::Doctor))) => true,
            (Entity::Nurses, RowKind::User(Some(Role::Nurse))) => true,
            (Entity::Ashas, RowKind::User(Some(Role::Asha))) => true,
            _ => false,
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Entity {
    type Err = CompassError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Entity::ALL
            .into_iter()
            .find(|e| e.name() == s)
            .ok_or_else(|| CompassError::UnknownEntity(s.to_string()))
    }
}

/// Backing collection of an entity key. An unknown key is a configuration
/// bug and is reported as an error.
pub fn collection_name(key: &str) -> Result<&'static str, CompassError> {
    Ok(key.parse::<Entity>()?.collection())
}

/// Discriminant for a record of `collection`. Users carry their role.
pub fn kind_for(collection: &str, role: Option<&str>) -> Result<RowKind, CompassError> {
    match collection {
        "patients" => Ok(RowKind::Patient),
        "hospitals" => Ok(RowKind::Hospital),
        "users" => Ok(RowKind::User(role.and_then(|r| r.parse::<Role>().ok()))),
        other => Err(CompassError::UnknownEntity(other.to_string())),
    }
}
