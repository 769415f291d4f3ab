//! Core domain types for the organization registry graph.
//!
//! Every entity is identified by a natural key (see [`crate::keys`]). Link
//! entities reference their endpoints by key fields, never by owned copies,
//! so the whole graph of one import can live in a flat arena.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::keys::NaturalKey;

/// Namespace for deterministic foreign-organization ids.
const FOREIGN_ORG_NS: Uuid = Uuid::from_bytes([
    0x3f, 0x1c, 0x5e, 0x82, 0x47, 0xa0, 0x4b, 0x9d, 0x8e, 0x21, 0x0c, 0x6a, 0xd4, 0x17, 0xb3, 0x5f,
]);

// ── Kinds ─────────────────────────────────────────────────────────

/// Every kind of entity the store knows about.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Organization,
    Person,
    ForeignOrganization,
    Founder,
    Manager,
    Authority,
    Okved,
    Document,
    License,
    RegistrySmb,
    Finance,
    Address,
    Region,
    Area,
    City,
    Settlement,
    Street,
    OrganizationFounder,
    OrganizationManager,
    OrganizationOkved,
    OrganizationAuthority,
    InnRecord,
}

impl EntityKind {
    pub const ALL: [EntityKind; 22] = [
        EntityKind::Organization,
        EntityKind::Person,
        EntityKind::ForeignOrganization,
        EntityKind::Founder,
        EntityKind::Manager,
        EntityKind::Authority,
        EntityKind::Okved,
        EntityKind::Document,
        EntityKind::License,
        EntityKind::RegistrySmb,
        EntityKind::Finance,
        EntityKind::Address,
        EntityKind::Region,
        EntityKind::Area,
        EntityKind::City,
        EntityKind::Settlement,
        EntityKind::Street,
        EntityKind::OrganizationFounder,
        EntityKind::OrganizationManager,
        EntityKind::OrganizationOkved,
        EntityKind::OrganizationAuthority,
        EntityKind::InnRecord,
    ];

    /// Graph label used for nodes of this kind.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Organization => "Organization",
            Self::Person => "Person",
            Self::ForeignOrganization => "ForeignOrganization",
            Self::Founder => "Founder",
            Self::Manager => "Manager",
            Self::Authority => "Authority",
            Self::Okved => "Okved",
            Self::Document => "Document",
            Self::License => "License",
            Self::RegistrySmb => "RegistrySmb",
            Self::Finance => "Finance",
            Self::Address => "Address",
            Self::Region => "Region",
            Self::Area => "Area",
            Self::City => "City",
            Self::Settlement => "Settlement",
            Self::Street => "Street",
            Self::OrganizationFounder => "OrganizationFounder",
            Self::OrganizationManager => "OrganizationManager",
            Self::OrganizationOkved => "OrganizationOkved",
            Self::OrganizationAuthority => "OrganizationAuthority",
            Self::InnRecord => "InnRecord",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One level of the shared address hierarchy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum GeoLevel {
    Region,
    Area,
    City,
    Settlement,
    Street,
}

impl GeoLevel {
    pub const ALL: [GeoLevel; 5] = [
        GeoLevel::Region,
        GeoLevel::Area,
        GeoLevel::City,
        GeoLevel::Settlement,
        GeoLevel::Street,
    ];

    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Region => EntityKind::Region,
            Self::Area => EntityKind::Area,
            Self::City => EntityKind::City,
            Self::Settlement => EntityKind::Settlement,
            Self::Street => EntityKind::Street,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Region => "region",
            Self::Area => "area",
            Self::City => "city",
            Self::Settlement => "settlement",
            Self::Street => "street",
        }
    }
}

// ── Entities ──────────────────────────────────────────────────────

/// The root of every imported graph.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Organization {
    pub inn: String,
    pub name: Option<String>,
    pub name_short: Option<String>,
    pub name_with_opf: Option<String>,
    pub name_short_with_opf: Option<String>,
    pub name_latin: Option<String>,
    pub org_type: Option<String>,
    pub branch_type: Option<String>,
    pub branch_count: Option<i64>,
    pub ogrn: Option<String>,
    pub ogrn_date: Option<DateTime<Utc>>,
    pub okpo: Option<String>,
    pub okved: Option<String>,
    pub okved_type: Option<String>,
    pub hid: Option<String>,
    pub kpp: Option<String>,
    pub address: Option<String>,
    pub address_unrestricted: Option<String>,
    pub management_name: Option<String>,
    pub management_post: Option<String>,
    /// Tax id of the manager whose name matches `management_name`.
    pub management_inn: Option<String>,
    pub capital: Option<Decimal>,
    pub capital_type: Option<String>,
    pub status: Option<String>,
    pub opf: Option<String>,
    pub opf_short: Option<String>,
    pub opf_type: Option<String>,
    pub actuality_date: Option<DateTime<Utc>>,
    pub registration_date: Option<DateTime<Utc>>,
    pub liquidation_date: Option<DateTime<Utc>>,
}

/// A natural person, shared across every role they hold.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Person {
    pub inn: String,
    pub surname: Option<String>,
    pub name: Option<String>,
    pub patronymic: Option<String>,
    pub gender: Option<String>,
    pub source: Option<String>,
}

/// Stand-in for a role holder without a domestic tax id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ForeignOrganization {
    pub id: Uuid,
    pub hid: String,
    pub name: Option<String>,
}

impl ForeignOrganization {
    pub fn new(hid: &str, name: Option<String>) -> Self {
        Self {
            id: Self::id_for(hid),
            hid: hid.to_string(),
            name,
        }
    }

    /// Deterministic surrogate id so the same hid always yields the same id.
    pub fn id_for(hid: &str) -> Uuid {
        Uuid::new_v5(&FOREIGN_ORG_NS, hid.as_bytes())
    }
}

/// Identity triple of a founder or manager. At most one slot is populated.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct RoleHolder {
    pub person_inn: Option<String>,
    pub org_inn: Option<String>,
    pub foreign_org_id: Option<Uuid>,
}

/// A regulatory body, shared across many organizations.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Authority {
    pub code: String,
    pub authority_type: Option<String>,
    pub name: Option<String>,
    pub address: Option<String>,
}

/// A business classification code.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Okved {
    pub code: String,
    pub name: Option<String>,
    pub okved_type: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Document {
    pub org_inn: String,
    pub doc_type: String,
    pub series: Option<String>,
    pub number: Option<String>,
    pub issue_date: Option<DateTime<Utc>>,
    pub issue_authority: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct License {
    pub org_inn: String,
    pub series: Option<String>,
    pub number: Option<String>,
    pub issue_authority: Option<String>,
    pub issue_date: Option<DateTime<Utc>>,
    pub suspend_authority: Option<String>,
    pub suspend_date: Option<DateTime<Utc>>,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_to: Option<DateTime<Utc>>,
}

/// Small/medium business registry status snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegistrySmb {
    pub org_inn: String,
    pub smb_type: Option<String>,
    pub category: Option<String>,
    pub issue_date: Option<DateTime<Utc>>,
}

/// Reported financial figures. Rows are appended whenever the figures change.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Finance {
    pub org_inn: String,
    pub tax_system: Option<String>,
    pub income: Option<Decimal>,
    pub expense: Option<Decimal>,
    pub debt: Option<Decimal>,
    pub penalty: Option<Decimal>,
}

/// An organization's address. Geography levels are referenced by fias id.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Address {
    pub org_inn: String,
    pub fias_id: Option<String>,
    pub source: Option<String>,
    pub block: Option<String>,
    pub block_type: Option<String>,
    pub timezone: Option<String>,
    pub geo_lat: Option<String>,
    pub geo_lon: Option<String>,
    pub country: Option<String>,
    pub okato: Option<String>,
    pub oktmo: Option<String>,
    /// Nearby metro stations, kept as the raw JSON text.
    pub metro: Option<String>,
    pub region_fias_id: Option<String>,
    pub area_fias_id: Option<String>,
    pub city_fias_id: Option<String>,
    pub settlement_fias_id: Option<String>,
    pub street_fias_id: Option<String>,
    pub house: Option<String>,
    pub house_type: Option<String>,
    pub flat: Option<String>,
    pub flat_type: Option<String>,
}

impl Address {
    pub fn geo_fias_id(&self, level: GeoLevel) -> Option<&str> {
        match level {
            GeoLevel::Region => self.region_fias_id.as_deref(),
            GeoLevel::Area => self.area_fias_id.as_deref(),
            GeoLevel::City => self.city_fias_id.as_deref(),
            GeoLevel::Settlement => self.settlement_fias_id.as_deref(),
            GeoLevel::Street => self.street_fias_id.as_deref(),
        }
    }
}

/// A shared geography node (region, area, city, settlement or street).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GeoNode {
    pub level: GeoLevel,
    pub fias_id: String,
    pub name: Option<String>,
    pub type_full: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrganizationFounder {
    pub org_inn: String,
    pub person_inn: Option<String>,
    pub holder_org_inn: Option<String>,
    pub foreign_org_id: Option<Uuid>,
    pub founder_type: Option<String>,
    pub share_type: Option<String>,
    pub share_value: Option<Decimal>,
    pub share_numerator: Option<i64>,
    pub share_denominator: Option<i64>,
}

impl OrganizationFounder {
    pub fn new(org_inn: &str, holder: &RoleHolder) -> Self {
        Self {
            org_inn: org_inn.to_string(),
            person_inn: holder.person_inn.clone(),
            holder_org_inn: holder.org_inn.clone(),
            foreign_org_id: holder.foreign_org_id,
            ..Default::default()
        }
    }

    pub fn holder(&self) -> RoleHolder {
        RoleHolder {
            person_inn: self.person_inn.clone(),
            org_inn: self.holder_org_inn.clone(),
            foreign_org_id: self.foreign_org_id,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrganizationManager {
    pub org_inn: String,
    pub person_inn: Option<String>,
    pub holder_org_inn: Option<String>,
    pub foreign_org_id: Option<Uuid>,
    pub post: Option<String>,
    pub manager_type: Option<String>,
}

impl OrganizationManager {
    pub fn new(org_inn: &str, holder: &RoleHolder) -> Self {
        Self {
            org_inn: org_inn.to_string(),
            person_inn: holder.person_inn.clone(),
            holder_org_inn: holder.org_inn.clone(),
            foreign_org_id: holder.foreign_org_id,
            ..Default::default()
        }
    }

    pub fn holder(&self) -> RoleHolder {
        RoleHolder {
            person_inn: self.person_inn.clone(),
            org_inn: self.holder_org_inn.clone(),
            foreign_org_id: self.foreign_org_id,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrganizationOkved {
    pub org_inn: String,
    pub okved_code: String,
    pub is_main: bool,
}

/// Link between an organization and an authority acting in a given role.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrganizationAuthority {
    pub org_inn: String,
    pub authority_code: String,
    pub authority_type: Option<String>,
    pub role: String,
}

/// Entry in the registry of tax ids scheduled for parsing.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct InnRecord {
    pub inn: String,
    pub name: Option<String>,
    pub last_parsed_at: Option<DateTime<Utc>>,
}

/// Enum wrapper for every entity that can be stored.
#[derive(Debug, Clone, PartialEq)]
pub enum Entity {
    Organization(Organization),
    Person(Person),
    ForeignOrganization(ForeignOrganization),
    Founder(RoleHolder),
    Manager(RoleHolder),
    Authority(Authority),
    Okved(Okved),
    Document(Document),
    License(License),
    RegistrySmb(RegistrySmb),
    Finance(Finance),
    Address(Address),
    Geography(GeoNode),
    OrganizationFounder(OrganizationFounder),
    OrganizationManager(OrganizationManager),
    OrganizationOkved(OrganizationOkved),
    OrganizationAuthority(OrganizationAuthority),
    InnRecord(InnRecord),
}

impl Entity {
    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::Organization(_) => EntityKind::Organization,
            Entity::Person(_) => EntityKind::Person,
            Entity::ForeignOrganization(_) => EntityKind::ForeignOrganization,
            Entity::Founder(_) => EntityKind::Founder,
            Entity::Manager(_) => EntityKind::Manager,
            Entity::Authority(_) => EntityKind::Authority,
            Entity::Okved(_) => EntityKind::Okved,
            Entity::Document(_) => EntityKind::Document,
            Entity::License(_) => EntityKind::License,
            Entity::RegistrySmb(_) => EntityKind::RegistrySmb,
            Entity::Finance(_) => EntityKind::Finance,
            Entity::Address(_) => EntityKind::Address,
            Entity::Geography(g) => g.level.kind(),
            Entity::OrganizationFounder(_) => EntityKind::OrganizationFounder,
            Entity::OrganizationManager(_) => EntityKind::OrganizationManager,
            Entity::OrganizationOkved(_) => EntityKind::OrganizationOkved,
            Entity::OrganizationAuthority(_) => EntityKind::OrganizationAuthority,
            Entity::InnRecord(_) => EntityKind::InnRecord,
        }
    }

    /// The natural key this entity is deduplicated by.
    pub fn key(&self) -> NaturalKey {
        match self {
            Entity::Organization(o) => NaturalKey::Organization { inn: o.inn.clone() },
            Entity::Person(p) => NaturalKey::Person { inn: p.inn.clone() },
            Entity::ForeignOrganization(f) => NaturalKey::ForeignOrganization {
                hid: f.hid.clone(),
            },
            Entity::Founder(h) => NaturalKey::Founder(h.clone()),
            Entity::Manager(h) => NaturalKey::Manager(h.clone()),
            Entity::Authority(a) => NaturalKey::Authority {
                code: a.code.clone(),
                authority_type: a.authority_type.clone(),
            },
            Entity::Okved(o) => NaturalKey::Okved {
                code: o.code.clone(),
            },
            Entity::Document(d) => NaturalKey::Document {
                org_inn: d.org_inn.clone(),
                series: d.series.clone(),
                number: d.number.clone(),
            },
            Entity::License(l) => NaturalKey::License {
                org_inn: l.org_inn.clone(),
                series: l.series.clone(),
                number: l.number.clone(),
            },
            Entity::RegistrySmb(s) => NaturalKey::RegistrySmb {
                org_inn: s.org_inn.clone(),
                smb_type: s.smb_type.clone(),
                category: s.category.clone(),
            },
            Entity::Finance(f) => NaturalKey::Finance {
                org_inn: f.org_inn.clone(),
                income: f.income,
                expense: f.expense,
                debt: f.debt,
                penalty: f.penalty,
            },
            Entity::Address(a) => NaturalKey::Address {
                org_inn: a.org_inn.clone(),
                fias_id: a.fias_id.clone(),
            },
            Entity::Geography(g) => NaturalKey::Geography {
                level: g.level,
                fias_id: g.fias_id.clone(),
            },
            Entity::OrganizationFounder(l) => NaturalKey::OrganizationFounder {
                org_inn: l.org_inn.clone(),
                founder: l.holder(),
            },
            Entity::OrganizationManager(l) => NaturalKey::OrganizationManager {
                org_inn: l.org_inn.clone(),
                manager: l.holder(),
            },
            Entity::OrganizationOkved(l) => NaturalKey::OrganizationOkved {
                org_inn: l.org_inn.clone(),
                code: l.okved_code.clone(),
            },
            Entity::OrganizationAuthority(l) => NaturalKey::OrganizationAuthority {
                org_inn: l.org_inn.clone(),
                code: l.authority_code.clone(),
                authority_type: l.authority_type.clone(),
                role: l.role.clone(),
            },
            Entity::InnRecord(r) => NaturalKey::InnRecord { inn: r.inn.clone() },
        }
    }

    /// Relationships from this entity to the entities it references by key.
    pub fn references(&self) -> Vec<(EdgeType, NaturalKey)> {
        let org = |inn: &str| NaturalKey::Organization {
            inn: inn.to_string(),
        };

        match self {
            Entity::Founder(h) | Entity::Manager(h) => holder_identity(h)
                .map(|key| vec![(EdgeType::Identifies, key)])
                .unwrap_or_default(),
            Entity::Document(d) => vec![(EdgeType::BelongsTo, org(&d.org_inn))],
            Entity::License(l) => vec![(EdgeType::BelongsTo, org(&l.org_inn))],
            Entity::RegistrySmb(s) => vec![(EdgeType::BelongsTo, org(&s.org_inn))],
            Entity::Finance(f) => vec![(EdgeType::BelongsTo, org(&f.org_inn))],
            Entity::Address(a) => {
                let mut refs = vec![(EdgeType::BelongsTo, org(&a.org_inn))];
                for level in GeoLevel::ALL {
                    if let Some(fias_id) = a.geo_fias_id(level) {
                        refs.push((
                            EdgeType::LocatedIn,
                            NaturalKey::Geography {
                                level,
                                fias_id: fias_id.to_string(),
                            },
                        ));
                    }
                }
                refs
            }
            Entity::OrganizationFounder(l) => vec![
                (EdgeType::BelongsTo, org(&l.org_inn)),
                (EdgeType::Targets, NaturalKey::Founder(l.holder())),
            ],
            Entity::OrganizationManager(l) => vec![
                (EdgeType::BelongsTo, org(&l.org_inn)),
                (EdgeType::Targets, NaturalKey::Manager(l.holder())),
            ],
            Entity::OrganizationOkved(l) => vec![
                (EdgeType::BelongsTo, org(&l.org_inn)),
                (
                    EdgeType::Targets,
                    NaturalKey::Okved {
                        code: l.okved_code.clone(),
                    },
                ),
            ],
            Entity::OrganizationAuthority(l) => vec![
                (EdgeType::BelongsTo, org(&l.org_inn)),
                (
                    EdgeType::Targets,
                    NaturalKey::Authority {
                        code: l.authority_code.clone(),
                        authority_type: l.authority_type.clone(),
                    },
                ),
            ],
            _ => Vec::new(),
        }
    }
}

/// The entity a role-holder triple stands for. Foreign organizations are
/// referenced by surrogate id, which is not a natural key, so they are skipped.
fn holder_identity(holder: &RoleHolder) -> Option<NaturalKey> {
    if let Some(inn) = &holder.person_inn {
        return Some(NaturalKey::Person { inn: inn.clone() });
    }
    holder
        .org_inn
        .as_ref()
        .map(|inn| NaturalKey::Organization { inn: inn.clone() })
}

// ── Edge Types ────────────────────────────────────────────────────

/// Relationship drawn from an entity to an entity it references.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EdgeType {
    /// Organization-scoped row → its organization.
    BelongsTo,
    /// Link row → its non-organization endpoint.
    Targets,
    /// Founder/manager → the person or organization behind it.
    Identifies,
    /// Address → geography node.
    LocatedIn,
}

impl EdgeType {
    pub fn as_cypher(&self) -> &'static str {
        match self {
            Self::BelongsTo => "BELONGS_TO",
            Self::Targets => "TARGETS",
            Self::Identifies => "IDENTIFIES",
            Self::LocatedIn => "LOCATED_IN",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn foreign_org_id_is_deterministic() {
        let a = ForeignOrganization::new("abc123", Some("Acme Ltd".to_string()));
        let b = ForeignOrganization::new("abc123", None);
        assert_eq!(a.id, b.id);
        assert_ne!(a.id, ForeignOrganization::id_for("other"));
    }

    #[test]
    fn geography_kind_follows_level() {
        let node = Entity::Geography(GeoNode {
            level: GeoLevel::City,
            fias_id: "c-1".to_string(),
            name: Some("Moscow".to_string()),
            type_full: Some("город".to_string()),
        });
        assert_eq!(node.kind(), EntityKind::City);
        assert_eq!(node.kind().label(), "City");
    }

    #[test]
    fn link_key_carries_holder_triple() {
        let holder = RoleHolder {
            person_inn: Some("500100732259".to_string()),
            ..Default::default()
        };
        let link = Entity::OrganizationFounder(OrganizationFounder::new("7707083893", &holder));
        assert_eq!(
            link.key(),
            NaturalKey::OrganizationFounder {
                org_inn: "7707083893".to_string(),
                founder: holder,
            }
        );
    }

    #[test]
    fn address_references_present_geo_levels_only() {
        let address = Entity::Address(Address {
            org_inn: "7707083893".to_string(),
            fias_id: Some("addr".to_string()),
            region_fias_id: Some("r-1".to_string()),
            street_fias_id: Some("s-1".to_string()),
            ..Default::default()
        });
        let refs = address.references();
        assert_eq!(refs.len(), 3);
        assert_eq!(refs[0].0, EdgeType::BelongsTo);
        let located: Vec<_> = refs
            .iter()
            .filter(|(edge, _)| *edge == EdgeType::LocatedIn)
            .map(|(_, key)| key.clone())
            .collect();
        assert_eq!(
            located,
            vec![
                NaturalKey::Geography {
                    level: GeoLevel::Region,
                    fias_id: "r-1".to_string()
                },
                NaturalKey::Geography {
                    level: GeoLevel::Street,
                    fias_id: "s-1".to_string()
                },
            ]
        );
    }

    #[test]
    fn edge_type_serializes_screaming_snake() {
        let json = serde_json::to_string(&EdgeType::LocatedIn).unwrap();
        assert_eq!(json, "\"LOCATED_IN\"");
    }
}
