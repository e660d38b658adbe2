//! Entity catalogue: the static description of every registry table.
//!
//! # Responsibility
//! - Name the six entity kinds and their storage/URL identifiers.
//! - Declare each kind's writable fields and the rule each field follows.
//! - Declare which dependents block deletion of which targets.
//!
//! # Invariants
//! - Every `FieldRule::Reference` has a matching entry in `DELETE_GUARDS`.
//! - Field order is the order validation reports and FK checks run in.
//! - Table and column names are compile-time constants; SQL built from them
//!   never contains caller input.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Maximum length of `nameEn` / `nameMl`, in characters.
pub const NAME_MAX_CHARS: usize = 200;

/// Registry entity kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Gothram,
    Gramam,
    Vedam,
    Profession,
    Illam,
    Namboodiri,
}

impl EntityKind {
    /// All kinds, lookups first.
    pub const ALL: [EntityKind; 6] = [
        EntityKind::Gothram,
        EntityKind::Gramam,
        EntityKind::Vedam,
        EntityKind::Profession,
        EntityKind::Illam,
        EntityKind::Namboodiri,
    ];

    /// Returns the static descriptor for this kind.
    pub fn spec(self) -> &'static EntitySpec {
        match self {
            Self::Gothram => &GOTHRAM,
            Self::Gramam => &GRAMAM,
            Self::Vedam => &VEDAM,
            Self::Profession => &PROFESSION,
            Self::Illam => &ILLAM,
            Self::Namboodiri => &NAMBOODIRI,
        }
    }

    /// SQL table name.
    pub fn table(self) -> &'static str {
        self.spec().table
    }

    /// Lowercase singular label used in messages and URL paths.
    pub fn label(self) -> &'static str {
        self.spec().label
    }

    /// Lowercase plural label used in messages.
    pub fn plural(self) -> &'static str {
        self.spec().plural
    }

    /// Whether this kind is a reference list with no outgoing foreign keys.
    pub fn is_lookup(self) -> bool {
        !self.spec().fields.iter().any(|field| field.rule.target().is_some())
    }

    /// Resolves a URL path segment (`gothram`, `illam`, ...) to a kind.
    pub fn from_path(segment: &str) -> Option<EntityKind> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.label() == segment.trim())
    }

    /// Guards that must pass before a row of this kind may be deleted.
    pub fn delete_guards(self) -> impl Iterator<Item = &'static DeleteGuard> {
        DELETE_GUARDS
            .iter()
            .filter(move |guard| guard.protected == self)
    }
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Validation rule attached to one writable field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRule {
    /// Required display name, trimmed and capped at `NAME_MAX_CHARS`.
    Name,
    /// Optional free text; blank input is stored as NULL.
    Text,
    /// Optional email address.
    Email,
    /// Optional absolute http(s) URL.
    Url,
    /// Required foreign key into the target kind.
    Reference(EntityKind),
}

impl FieldRule {
    /// Whether the field must be supplied.
    pub fn is_required(self) -> bool {
        matches!(self, Self::Name | Self::Reference(_))
    }

    /// Foreign-key target, if this is a reference.
    pub fn target(self) -> Option<EntityKind> {
        match self {
            Self::Reference(kind) => Some(kind),
            _ => None,
        }
    }
}

/// One writable field: wire key, storage column and rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// camelCase JSON key.
    pub key: &'static str,
    /// snake_case SQL column.
    pub column: &'static str,
    pub rule: FieldRule,
}

/// Static description of one entity kind.
#[derive(Debug)]
pub struct EntitySpec {
    pub kind: EntityKind,
    pub table: &'static str,
    pub label: &'static str,
    pub plural: &'static str,
    /// Writable fields in validation order.
    pub fields: &'static [FieldSpec],
    /// `(name_en, name_ml)` carries a unique constraint.
    pub unique_name: bool,
}

impl EntitySpec {
    /// Foreign-key fields in declaration order.
    pub fn references(&self) -> impl Iterator<Item = (&'static FieldSpec, EntityKind)> {
        self.fields
            .iter()
            .filter_map(|field| field.rule.target().map(|target| (field, target)))
    }
}

/// A dependent relation that blocks deleting its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteGuard {
    /// Kind whose rows are protected.
    pub protected: EntityKind,
    /// Kind holding the reference.
    pub dependent: EntityKind,
    /// FK column on the dependent table.
    pub column: &'static str,
}

/// Every foreign key protects its target; deletes are never cascaded.
pub const DELETE_GUARDS: &[DeleteGuard] = &[
    DeleteGuard {
        protected: EntityKind::Gothram,
        dependent: EntityKind::Illam,
        column: "gothram_id",
    },
    DeleteGuard {
        protected: EntityKind::Gothram,
        dependent: EntityKind::Namboodiri,
        column: "gothram_id",
    },
    DeleteGuard {
        protected: EntityKind::Gramam,
        dependent: EntityKind::Illam,
        column: "gramam_id",
    },
    DeleteGuard {
        protected: EntityKind::Vedam,
        dependent: EntityKind::Illam,
        column: "vedam_id",
    },
    DeleteGuard {
        protected: EntityKind::Illam,
        dependent: EntityKind::Namboodiri,
        column: "illam_id",
    },
    DeleteGuard {
        protected: EntityKind::Profession,
        dependent: EntityKind::Namboodiri,
        column: "profession_id",
    },
];

const NAME_FIELDS: [FieldSpec; 2] = [
    FieldSpec {
        key: "nameEn",
        column: "name_en",
        rule: FieldRule::Name,
    },
    FieldSpec {
        key: "nameMl",
        column: "name_ml",
        rule: FieldRule::Name,
    },
];

static GOTHRAM: EntitySpec = EntitySpec {
    kind: EntityKind::Gothram,
    table: "gothram",
    label: "gothram",
    plural: "gothrams",
    fields: &NAME_FIELDS,
    unique_name: true,
};

static GRAMAM: EntitySpec = EntitySpec {
    kind: EntityKind::Gramam,
    table: "gramam",
    label: "gramam",
    plural: "gramams",
    fields: &NAME_FIELDS,
    unique_name: false,
};

static VEDAM: EntitySpec = EntitySpec {
    kind: EntityKind::Vedam,
    table: "vedam",
    label: "vedam",
    plural: "vedams",
    fields: &NAME_FIELDS,
    unique_name: false,
};

static PROFESSION: EntitySpec = EntitySpec {
    kind: EntityKind::Profession,
    table: "profession",
    label: "profession",
    plural: "professions",
    fields: &NAME_FIELDS,
    unique_name: false,
};

static ILLAM: EntitySpec = EntitySpec {
    kind: EntityKind::Illam,
    table: "illam",
    label: "illam",
    plural: "illams",
    fields: &[
        NAME_FIELDS[0],
        NAME_FIELDS[1],
        FieldSpec {
            key: "gothramId",
            column: "gothram_id",
            rule: FieldRule::Reference(EntityKind::Gothram),
        },
        FieldSpec {
            key: "gramamId",
            column: "gramam_id",
            rule: FieldRule::Reference(EntityKind::Gramam),
        },
        FieldSpec {
            key: "vedamId",
            column: "vedam_id",
            rule: FieldRule::Reference(EntityKind::Vedam),
        },
        FieldSpec {
            key: "phone",
            column: "phone",
            rule: FieldRule::Text,
        },
        FieldSpec {
            key: "address",
            column: "address",
            rule: FieldRule::Text,
        },
        FieldSpec {
            key: "district",
            column: "district",
            rule: FieldRule::Text,
        },
        FieldSpec {
            key: "state",
            column: "state",
            rule: FieldRule::Text,
        },
        FieldSpec {
            key: "pincode",
            column: "pincode",
            rule: FieldRule::Text,
        },
        FieldSpec {
            key: "mapsUrl",
            column: "maps_url",
            rule: FieldRule::Url,
        },
    ],
    unique_name: true,
};

static NAMBOODIRI: EntitySpec = EntitySpec {
    kind: EntityKind::Namboodiri,
    table: "namboodiri",
    label: "namboodiri",
    plural: "namboodiris",
    fields: &[
        NAME_FIELDS[0],
        NAME_FIELDS[1],
        FieldSpec {
            key: "gothramId",
            column: "gothram_id",
            rule: FieldRule::Reference(EntityKind::Gothram),
        },
        FieldSpec {
            key: "illamId",
            column: "illam_id",
            rule: FieldRule::Reference(EntityKind::Illam),
        },
        FieldSpec {
            key: "professionId",
            column: "profession_id",
            rule: FieldRule::Reference(EntityKind::Profession),
        },
        FieldSpec {
            key: "phone",
            column: "phone",
            rule: FieldRule::Text,
        },
        FieldSpec {
            key: "email",
            column: "email",
            rule: FieldRule::Email,
        },
        FieldSpec {
            key: "address",
            column: "address",
            rule: FieldRule::Text,
        },
        FieldSpec {
            key: "district",
            column: "district",
            rule: FieldRule::Text,
        },
        FieldSpec {
            key: "state",
            column: "state",
            rule: FieldRule::Text,
        },
        FieldSpec {
            key: "pincode",
            column: "pincode",
            rule: FieldRule::Text,
        },
    ],
    unique_name: false,
};

#[cfg(test)]
mod tests {
    use super::{EntityKind, FieldRule, DELETE_GUARDS};

    #[test]
    fn every_reference_is_guarded() {
        for kind in EntityKind::ALL {
            for (field, target) in kind.spec().references() {
                assert!(
                    DELETE_GUARDS.iter().any(|guard| guard.protected == target
                        && guard.dependent == kind
                        && guard.column == field.column),
                    "{kind}.{} has no delete guard",
                    field.column
                );
            }
        }
        let reference_count: usize = EntityKind::ALL
            .iter()
            .map(|kind| kind.spec().references().count())
            .sum();
        assert_eq!(reference_count, DELETE_GUARDS.len());
    }

    #[test]
    fn lookups_have_no_references() {
        assert!(EntityKind::Gothram.is_lookup());
        assert!(EntityKind::Gramam.is_lookup());
        assert!(EntityKind::Vedam.is_lookup());
        assert!(EntityKind::Profession.is_lookup());
        assert!(!EntityKind::Illam.is_lookup());
        assert!(!EntityKind::Namboodiri.is_lookup());
    }

    #[test]
    fn from_path_resolves_labels_only() {
        for kind in EntityKind::ALL {
            assert_eq!(EntityKind::from_path(kind.label()), Some(kind));
            assert_eq!(kind.spec().kind, kind);
        }
        assert_eq!(EntityKind::from_path("users"), None);
        assert_eq!(EntityKind::from_path("Gothram"), None);
    }

    #[test]
    fn illam_references_are_declared_in_check_order() {
        let targets: Vec<EntityKind> = EntityKind::Illam
            .spec()
            .references()
            .map(|(_, target)| target)
            .collect();
        assert_eq!(
            targets,
            vec![EntityKind::Gothram, EntityKind::Gramam, EntityKind::Vedam]
        );
        assert!(FieldRule::Reference(EntityKind::Gothram).is_required());
        assert!(!FieldRule::Email.is_required());
    }

    #[test]
    fn gothram_and_illam_names_are_unique() {
        let unique: Vec<EntityKind> = EntityKind::ALL
            .into_iter()
            .filter(|kind| kind.spec().unique_name)
            .collect();
        assert_eq!(unique, vec![EntityKind::Gothram, EntityKind::Illam]);
    }
}
