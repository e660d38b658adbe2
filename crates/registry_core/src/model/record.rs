//! Read models returned by the registry.
//!
//! Dependent entities carry their relations inlined, so callers never
//! receive a bare foreign key without the row it points at.

use crate::model::entity::EntityKind;
use serde::{Deserialize, Serialize, Serializer};

/// Store-assigned integer identity.
pub type RecordId = i64;

/// Row of any lookup table (gothram, gramam, vedam, profession).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupRecord {
    pub id: RecordId,
    pub name_en: String,
    pub name_ml: String,
    /// Epoch milliseconds.
    pub created_at: i64,
    /// Epoch milliseconds.
    pub updated_at: i64,
}

/// Scalar columns of one illam row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IllamRecord {
    pub id: RecordId,
    pub name_en: String,
    pub name_ml: String,
    pub gothram_id: RecordId,
    pub gramam_id: RecordId,
    pub vedam_id: RecordId,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub district: Option<String>,
    pub state: Option<String>,
    pub pincode: Option<String>,
    pub maps_url: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Illam with its gothram, gramam and vedam resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Illam {
    #[serde(flatten)]
    pub record: IllamRecord,
    pub gothram: LookupRecord,
    pub gramam: LookupRecord,
    pub vedam: LookupRecord,
}

/// Scalar columns of one namboodiri row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamboodiriRecord {
    pub id: RecordId,
    pub name_en: String,
    pub name_ml: String,
    pub gothram_id: RecordId,
    pub illam_id: RecordId,
    pub profession_id: RecordId,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub district: Option<String>,
    pub state: Option<String>,
    pub pincode: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Namboodiri with gothram, illam (scalar row) and profession resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Namboodiri {
    #[serde(flatten)]
    pub record: NamboodiriRecord,
    pub gothram: LookupRecord,
    pub illam: IllamRecord,
    pub profession: LookupRecord,
}

/// Any registry row, as produced by the generic repository.
///
/// Serializes as the inner row with no tag; the caller already knows
/// which kind it asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    Lookup(EntityKind, LookupRecord),
    Illam(Illam),
    Namboodiri(Namboodiri),
}

impl Record {
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Lookup(kind, _) => *kind,
            Self::Illam(_) => EntityKind::Illam,
            Self::Namboodiri(_) => EntityKind::Namboodiri,
        }
    }

    pub fn id(&self) -> RecordId {
        match self {
            Self::Lookup(_, record) => record.id,
            Self::Illam(illam) => illam.record.id,
            Self::Namboodiri(namboodiri) => namboodiri.record.id,
        }
    }

    pub fn name_en(&self) -> &str {
        match self {
            Self::Lookup(_, record) => record.name_en.as_str(),
            Self::Illam(illam) => illam.record.name_en.as_str(),
            Self::Namboodiri(namboodiri) => namboodiri.record.name_en.as_str(),
        }
    }

    pub fn name_ml(&self) -> &str {
        match self {
            Self::Lookup(_, record) => record.name_ml.as_str(),
            Self::Illam(illam) => illam.record.name_ml.as_str(),
            Self::Namboodiri(namboodiri) => namboodiri.record.name_ml.as_str(),
        }
    }

    pub fn as_lookup(&self) -> Option<&LookupRecord> {
        match self {
            Self::Lookup(_, record) => Some(record),
            _ => None,
        }
    }

    pub fn as_illam(&self) -> Option<&Illam> {
        match self {
            Self::Illam(illam) => Some(illam),
            _ => None,
        }
    }

    pub fn as_namboodiri(&self) -> Option<&Namboodiri> {
        match self {
            Self::Namboodiri(namboodiri) => Some(namboodiri),
            _ => None,
        }
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Lookup(_, record) => record.serialize(serializer),
            Self::Illam(illam) => illam.serialize(serializer),
            Self::Namboodiri(namboodiri) => namboodiri.serialize(serializer),
        }
    }
}
