//! Natural keys: the externally meaningful identity of every entity.
//!
//! A key both names the kind it belongs to and carries the exact property
//! values a store must match to find the entity. Keys are the stable indices
//! link entities use to point at their endpoints.

use std::fmt;

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::types::{EntityKind, GeoLevel, RoleHolder};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NaturalKey {
    Organization {
        inn: String,
    },
    Person {
        inn: String,
    },
    ForeignOrganization {
        hid: String,
    },
    Founder(RoleHolder),
    Manager(RoleHolder),
    Authority {
        code: String,
        authority_type: Option<String>,
    },
    Okved {
        code: String,
    },
    Document {
        org_inn: String,
        series: Option<String>,
        number: Option<String>,
    },
    License {
        org_inn: String,
        series: Option<String>,
        number: Option<String>,
    },
    RegistrySmb {
        org_inn: String,
        smb_type: Option<String>,
        category: Option<String>,
    },
    Finance {
        org_inn: String,
        income: Option<Decimal>,
        expense: Option<Decimal>,
        debt: Option<Decimal>,
        penalty: Option<Decimal>,
    },
    Address {
        org_inn: String,
        fias_id: Option<String>,
    },
    Geography {
        level: GeoLevel,
        fias_id: String,
    },
    OrganizationFounder {
        org_inn: String,
        founder: RoleHolder,
    },
    OrganizationManager {
        org_inn: String,
        manager: RoleHolder,
    },
    OrganizationOkved {
        org_inn: String,
        code: String,
    },
    OrganizationAuthority {
        org_inn: String,
        code: String,
        authority_type: Option<String>,
        role: String,
    },
    InnRecord {
        inn: String,
    },
}

/// One property a store must match. `None` means the property must be absent.
pub type KeyComponent = (&'static str, Option<String>);

impl NaturalKey {
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Organization { .. } => EntityKind::Organization,
            Self::Person { .. } => EntityKind::Person,
            Self::ForeignOrganization { .. } => EntityKind::ForeignOrganization,
            Self::Founder(_) => EntityKind::Founder,
            Self::Manager(_) => EntityKind::Manager,
            Self::Authority { .. } => EntityKind::Authority,
            Self::Okved { .. } => EntityKind::Okved,
            Self::Document { .. } => EntityKind::Document,
            Self::License { .. } => EntityKind::License,
            Self::RegistrySmb { .. } => EntityKind::RegistrySmb,
            Self::Finance { .. } => EntityKind::Finance,
            Self::Address { .. } => EntityKind::Address,
            Self::Geography { level, .. } => level.kind(),
            Self::OrganizationFounder { .. } => EntityKind::OrganizationFounder,
            Self::OrganizationManager { .. } => EntityKind::OrganizationManager,
            Self::OrganizationOkved { .. } => EntityKind::OrganizationOkved,
            Self::OrganizationAuthority { .. } => EntityKind::OrganizationAuthority,
            Self::InnRecord { .. } => EntityKind::InnRecord,
        }
    }

    /// Property name/value pairs identifying the entity in a store.
    ///
    /// Property names match the serialized field names of the entity structs.
    pub fn components(&self) -> Vec<KeyComponent> {
        let s = |v: &str| Some(v.to_string());
        match self {
            Self::Organization { inn } | Self::Person { inn } | Self::InnRecord { inn } => {
                vec![("inn", s(inn))]
            }
            Self::ForeignOrganization { hid } => vec![("hid", s(hid))],
            Self::Founder(h) | Self::Manager(h) => vec![
                ("person_inn", h.person_inn.clone()),
                ("org_inn", h.org_inn.clone()),
                ("foreign_org_id", uuid_text(h.foreign_org_id)),
            ],
            Self::Authority {
                code,
                authority_type,
            } => vec![("code", s(code)), ("authority_type", authority_type.clone())],
            Self::Okved { code } => vec![("code", s(code))],
            Self::Document {
                org_inn,
                series,
                number,
            }
            | Self::License {
                org_inn,
                series,
                number,
            } => vec![
                ("org_inn", s(org_inn)),
                ("series", series.clone()),
                ("number", number.clone()),
            ],
            Self::RegistrySmb {
                org_inn,
                smb_type,
                category,
            } => vec![
                ("org_inn", s(org_inn)),
                ("smb_type", smb_type.clone()),
                ("category", category.clone()),
            ],
            Self::Finance {
                org_inn,
                income,
                expense,
                debt,
                penalty,
            } => vec![
                ("org_inn", s(org_inn)),
                ("income", decimal_text(*income)),
                ("expense", decimal_text(*expense)),
                ("debt", decimal_text(*debt)),
                ("penalty", decimal_text(*penalty)),
            ],
            Self::Address { org_inn, fias_id } => {
                vec![("org_inn", s(org_inn)), ("fias_id", fias_id.clone())]
            }
            Self::Geography { fias_id, .. } => vec![("fias_id", s(fias_id))],
            Self::OrganizationFounder {
                org_inn,
                founder: h,
            }
            | Self::OrganizationManager {
                org_inn,
                manager: h,
            } => vec![
                ("org_inn", s(org_inn)),
                ("person_inn", h.person_inn.clone()),
                ("holder_org_inn", h.org_inn.clone()),
                ("foreign_org_id", uuid_text(h.foreign_org_id)),
            ],
            Self::OrganizationOkved { org_inn, code } => {
                vec![("org_inn", s(org_inn)), ("okved_code", s(code))]
            }
            Self::OrganizationAuthority {
                org_inn,
                code,
                authority_type,
                role,
            } => vec![
                ("org_inn", s(org_inn)),
                ("authority_code", s(code)),
                ("authority_type", authority_type.clone()),
                ("role", s(role)),
            ],
        }
    }
}

/// Decimals are compared in normalized form so `100` and `100.00` match.
pub fn decimal_text(value: Option<Decimal>) -> Option<String> {
    value.map(|d| d.normalize().to_string())
}

fn uuid_text(value: Option<Uuid>) -> Option<String> {
    value.map(|id| id.to_string())
}

impl fmt::Display for NaturalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.kind().label())?;
        let mut first = true;
        for (name, value) in self.components() {
            if !first {
                f.write_str(", ")?;
            }
            first = false;
            match value {
                Some(v) => write!(f, "{name}={v}")?,
                None => write!(f, "{name}=null")?,
            }
        }
        f.write_str(")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::str::FromStr;

    #[test]
    fn finance_keys_compare_by_value() {
        let a = NaturalKey::Finance {
            org_inn: "7707083893".to_string(),
            income: Some(Decimal::from_str("100").unwrap()),
            expense: Some(Decimal::from_str("50.00").unwrap()),
            debt: None,
            penalty: None,
        };
        let b = NaturalKey::Finance {
            org_inn: "7707083893".to_string(),
            income: Some(Decimal::from_str("100.0").unwrap()),
            expense: Some(Decimal::from_str("50").unwrap()),
            debt: None,
            penalty: None,
        };
        assert_eq!(a, b);
        assert_eq!(a.components(), b.components());

        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }

    #[test]
    fn absent_parts_become_null_components() {
        let key = NaturalKey::Founder(RoleHolder {
            org_inn: Some("7736207543".to_string()),
            ..Default::default()
        });
        assert_eq!(
            key.components(),
            vec![
                ("person_inn", None),
                ("org_inn", Some("7736207543".to_string())),
                ("foreign_org_id", None),
            ]
        );
    }

    #[test]
    fn display_names_kind_and_parts() {
        let key = NaturalKey::Authority {
            code: "7746".to_string(),
            authority_type: Some("FEDERAL_TAX_SERVICE".to_string()),
        };
        assert_eq!(
            key.to_string(),
            "Authority(code=7746, authority_type=FEDERAL_TAX_SERVICE)"
        );
    }

    #[test]
    fn geography_kind_depends_on_level() {
        let key = NaturalKey::Geography {
            level: GeoLevel::Settlement,
            fias_id: "f".to_string(),
        };
        assert_eq!(key.kind(), EntityKind::Settlement);
    }
}
