//! Inbound organization payload.
//!
//! Mirrors the JSON record handed over by the delivery side:
//! `{ "data": { "inn": …, "founders": [ … ], … } }`. Upstream feeds are
//! loose about nulls and about numbers vs strings for identifiers, so most
//! fields are optional and identifiers accept either form.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};

use crate::error::RegsyncError;

/// Raw date as delivered (epoch milliseconds, number or string, or null).
pub type RawDate = serde_json::Value;

/// Document types that are imported; anything else is skipped.
pub const RECOGNIZED_DOCUMENT_TYPES: [&str; 4] = [
    "FTS_REGISTRATION",
    "FTS_REPORT",
    "PF_REGISTRATION",
    "SIF_REGISTRATION",
];

#[derive(Debug, Clone, Deserialize)]
pub struct Payload {
    pub data: OrganizationData,
}

impl Payload {
    pub fn from_slice(bytes: &[u8]) -> Result<Self, RegsyncError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OrganizationData {
    #[serde(deserialize_with = "text")]
    pub inn: String,
    #[serde(deserialize_with = "nullable")]
    pub name: NameData,
    #[serde(rename = "type")]
    pub org_type: Option<String>,
    pub branch_type: Option<String>,
    pub branch_count: Option<i64>,
    #[serde(deserialize_with = "opt_text")]
    pub ogrn: Option<String>,
    pub ogrn_date: RawDate,
    #[serde(deserialize_with = "opt_text")]
    pub okpo: Option<String>,
    pub okved: Option<String>,
    pub okved_type: Option<String>,
    pub hid: Option<String>,
    #[serde(deserialize_with = "opt_text")]
    pub kpp: Option<String>,
    pub address: Option<AddressData>,
    #[serde(deserialize_with = "nullable")]
    pub management: ManagementData,
    #[serde(deserialize_with = "nullable")]
    pub capital: CapitalData,
    #[serde(deserialize_with = "nullable")]
    pub state: StateData,
    #[serde(deserialize_with = "nullable")]
    pub opf: OpfData,
    #[serde(deserialize_with = "nullable")]
    pub founders: Vec<RoleHolderData>,
    #[serde(deserialize_with = "nullable")]
    pub managers: Vec<RoleHolderData>,
    #[serde(deserialize_with = "nullable")]
    pub okveds: Vec<OkvedData>,
    #[serde(deserialize_with = "nullable")]
    pub authorities: BTreeMap<String, Option<AuthorityData>>,
    #[serde(deserialize_with = "nullable")]
    pub documents: DocumentsData,
    pub finance: Option<FinanceData>,
    #[serde(deserialize_with = "nullable")]
    pub licenses: Vec<LicenseData>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NameData {
    pub full: Option<String>,
    pub short: Option<String>,
    pub full_with_opf: Option<String>,
    pub short_with_opf: Option<String>,
    pub latin: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ManagementData {
    pub name: Option<String>,
    pub post: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CapitalData {
    #[serde(rename = "type")]
    pub capital_type: Option<String>,
    pub value: Option<Decimal>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StateData {
    pub status: Option<String>,
    pub actuality_date: RawDate,
    pub registration_date: RawDate,
    pub liquidation_date: RawDate,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OpfData {
    pub full: Option<String>,
    pub short: Option<String>,
    #[serde(rename = "type", deserialize_with = "opt_text")]
    pub opf_type: Option<String>,
}

// ── Founders & Managers ───────────────────────────────────────────

/// Closed set of role-holder kinds the importer understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HolderKind {
    Physical,
    Legal,
}

impl HolderKind {
    /// Founder type strings: `PHYSICAL`, `LEGAL`.
    pub fn for_founder(raw: &str) -> Option<Self> {
        match raw.trim().to_uppercase().as_str() {
            "PHYSICAL" => Some(Self::Physical),
            "LEGAL" => Some(Self::Legal),
            _ => None,
        }
    }

    /// Manager type strings: `EMPLOYEE`, `FOREIGNER`, `PHYSICAL`, `LEGAL`.
    pub fn for_manager(raw: &str) -> Option<Self> {
        match raw.trim().to_uppercase().as_str() {
            "EMPLOYEE" | "FOREIGNER" | "PHYSICAL" => Some(Self::Physical),
            "LEGAL" => Some(Self::Legal),
            _ => None,
        }
    }
}

/// A founder or manager entry. Managers carry `post`, founders `share`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RoleHolderData {
    #[serde(rename = "type")]
    pub holder_type: Option<String>,
    pub fio: Option<FioData>,
    #[serde(deserialize_with = "opt_text")]
    pub inn: Option<String>,
    pub hid: Option<String>,
    pub name: Option<String>,
    pub post: Option<String>,
    pub share: Option<ShareData>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FioData {
    pub surname: Option<String>,
    pub name: Option<String>,
    pub patronymic: Option<String>,
    pub gender: Option<String>,
    pub source: Option<String>,
}

impl FioData {
    /// "Surname Name Patronymic", skipping absent parts.
    pub fn display_name(&self) -> String {
        [&self.surname, &self.name, &self.patronymic]
            .into_iter()
            .filter_map(|part| part.as_deref())
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// The name as written at the source, falling back to the assembled parts.
    pub fn full_name(&self) -> String {
        match self.source.as_deref().map(str::trim) {
            Some(source) if !source.is_empty() => source.to_string(),
            _ => self.display_name(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ShareData {
    #[serde(rename = "type")]
    pub share_type: Option<String>,
    pub value: Option<Decimal>,
    pub numerator: Option<i64>,
    pub denominator: Option<i64>,
}

// ── Collections ───────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OkvedData {
    #[serde(deserialize_with = "text")]
    pub code: String,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub okved_type: Option<String>,
    pub main: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AuthorityData {
    #[serde(deserialize_with = "opt_text")]
    pub code: Option<String>,
    #[serde(rename = "type")]
    pub authority_type: Option<String>,
    pub name: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DocumentData {
    #[serde(rename = "type")]
    pub doc_type: Option<String>,
    #[serde(deserialize_with = "opt_text")]
    pub series: Option<String>,
    #[serde(deserialize_with = "opt_text")]
    pub number: Option<String>,
    pub issue_date: RawDate,
    #[serde(deserialize_with = "opt_text")]
    pub issue_authority: Option<String>,
}

impl DocumentData {
    pub fn is_recognized(&self) -> bool {
        self.doc_type
            .as_deref()
            .is_some_and(|t| RECOGNIZED_DOCUMENT_TYPES.contains(&t))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SmbData {
    #[serde(rename = "type")]
    pub smb_type: Option<String>,
    pub category: Option<String>,
    pub issue_date: RawDate,
}

impl SmbData {
    pub fn is_empty(&self) -> bool {
        self.smb_type.is_none() && self.category.is_none() && self.issue_date.is_null()
    }
}

/// Filed documents plus the small/medium-business status.
///
/// Accepts an object keyed by document name (the `smb` key holds the status)
/// or an array whose elements are documents or `{ "smb": { … } }`.
#[derive(Debug, Clone, Default)]
pub struct DocumentsData {
    pub entries: Vec<DocumentData>,
    pub smb: Option<SmbData>,
}

impl<'de> Deserialize<'de> for DocumentsData {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Keyed(BTreeMap<String, serde_json::Value>),
            Listed(Vec<serde_json::Value>),
        }

        let mut docs = DocumentsData::default();
        let items: Vec<(Option<String>, serde_json::Value)> = match Raw::deserialize(deserializer)? {
            Raw::Keyed(map) => map.into_iter().map(|(k, v)| (Some(k), v)).collect(),
            Raw::Listed(list) => list.into_iter().map(|v| (None, v)).collect(),
        };

        for (name, value) in items {
            if value.is_null() {
                continue;
            }
            let smb_value = match (name.as_deref(), &value) {
                (Some("smb"), _) => Some(value.clone()),
                (None, serde_json::Value::Object(obj)) if obj.len() == 1 => obj.get("smb").cloned(),
                _ => None,
            };
            match smb_value {
                Some(raw) if !raw.is_null() => {
                    docs.smb = Some(serde_json::from_value(raw).map_err(D::Error::custom)?);
                }
                Some(_) => {}
                None => docs
                    .entries
                    .push(serde_json::from_value(value).map_err(D::Error::custom)?),
            }
        }

        Ok(docs)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FinanceData {
    pub tax_system: Option<String>,
    pub income: Option<Decimal>,
    pub expense: Option<Decimal>,
    pub debt: Option<Decimal>,
    pub penalty: Option<Decimal>,
}

impl FinanceData {
    pub fn is_empty(&self) -> bool {
        self.tax_system.is_none()
            && self.income.is_none()
            && self.expense.is_none()
            && self.debt.is_none()
            && self.penalty.is_none()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AddressData {
    pub value: Option<String>,
    pub unrestricted_value: Option<String>,
    pub data: Option<AddressDetails>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AddressDetails {
    pub fias_id: Option<String>,
    pub source: Option<String>,
    pub block: Option<String>,
    pub block_type: Option<String>,
    pub timezone: Option<String>,
    #[serde(deserialize_with = "opt_text")]
    pub geo_lat: Option<String>,
    #[serde(deserialize_with = "opt_text")]
    pub geo_lon: Option<String>,
    pub country: Option<String>,
    #[serde(deserialize_with = "opt_text")]
    pub okato: Option<String>,
    #[serde(deserialize_with = "opt_text")]
    pub oktmo: Option<String>,
    pub metro: serde_json::Value,
    pub region: Option<String>,
    pub region_fias_id: Option<String>,
    pub region_type_full: Option<String>,
    pub area: Option<String>,
    pub area_fias_id: Option<String>,
    pub area_type_full: Option<String>,
    pub city: Option<String>,
    pub city_fias_id: Option<String>,
    pub city_type_full: Option<String>,
    pub settlement: Option<String>,
    pub settlement_fias_id: Option<String>,
    pub settlement_type_full: Option<String>,
    pub street: Option<String>,
    pub street_fias_id: Option<String>,
    pub street_type_full: Option<String>,
    #[serde(deserialize_with = "opt_text")]
    pub house: Option<String>,
    pub house_type_full: Option<String>,
    #[serde(deserialize_with = "opt_text")]
    pub flat: Option<String>,
    pub flat_type_full: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LicenseData {
    #[serde(deserialize_with = "opt_text")]
    pub series: Option<String>,
    #[serde(deserialize_with = "opt_text")]
    pub number: Option<String>,
    pub issue_authority: Option<String>,
    pub issue_date: RawDate,
    pub suspend_authority: Option<String>,
    pub suspend_date: RawDate,
    pub valid_from: RawDate,
    pub valid_to: RawDate,
}

// ── Lenient field decoding ────────────────────────────────────────

/// Treat an explicit `null` like a missing field.
fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Identifier that may arrive as a string or a number.
fn opt_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<serde_json::Value>::deserialize(deserializer)? {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) => Ok(Some(s)),
        Some(serde_json::Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(D::Error::custom(format!(
            "expected string or number, found {other}"
        ))),
    }
}

fn text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(opt_text(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_payload_with_nulls() {
        let json = r#"{
            "data": {
                "inn": 7707083893,
                "name": null,
                "founders": null,
                "managers": [],
                "authorities": {"fts_registration": null},
                "documents": null,
                "finance": null
            }
        }"#;
        let payload = Payload::from_slice(json.as_bytes()).unwrap();
        assert_eq!(payload.data.inn, "7707083893");
        assert!(payload.data.founders.is_empty());
        assert!(payload.data.authorities["fts_registration"].is_none());
        assert!(payload.data.documents.entries.is_empty());
        assert!(payload.data.documents.smb.is_none());
    }

    #[test]
    fn keyed_documents_split_out_smb() {
        let json = r#"{
            "fts_registration": {"type": "FTS_REGISTRATION", "series": "77", "number": 12345},
            "smb": {"type": "SMB", "category": "MICRO", "issue_date": 1470614400000},
            "fts_report": null
        }"#;
        let docs: DocumentsData = serde_json::from_str(json).unwrap();
        assert_eq!(docs.entries.len(), 1);
        assert_eq!(docs.entries[0].number.as_deref(), Some("12345"));
        assert_eq!(docs.smb.unwrap().category.as_deref(), Some("MICRO"));
    }

    #[test]
    fn listed_documents_split_out_smb() {
        let json = r#"[
            {"type": "PF_REGISTRATION", "number": "087108011866"},
            {"smb": {"type": "SMB", "category": "SMALL"}}
        ]"#;
        let docs: DocumentsData = serde_json::from_str(json).unwrap();
        assert_eq!(docs.entries.len(), 1);
        assert!(docs.entries[0].is_recognized());
        assert_eq!(docs.smb.unwrap().category.as_deref(), Some("SMALL"));
    }

    #[test]
    fn holder_kinds_are_closed() {
        assert_eq!(HolderKind::for_founder("PHYSICAL"), Some(HolderKind::Physical));
        assert_eq!(HolderKind::for_founder("legal"), Some(HolderKind::Legal));
        assert_eq!(HolderKind::for_founder("EMPLOYEE"), None);
        assert_eq!(HolderKind::for_manager("EMPLOYEE"), Some(HolderKind::Physical));
        assert_eq!(HolderKind::for_manager("FOREIGNER"), Some(HolderKind::Physical));
        assert_eq!(HolderKind::for_manager("LEGAL"), Some(HolderKind::Legal));
        assert_eq!(HolderKind::for_manager("TRUST"), None);
    }

    #[test]
    fn fio_full_name_prefers_source() {
        let fio = FioData {
            surname: Some("Petrov".to_string()),
            name: Some("Ivan".to_string()),
            patronymic: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(fio.full_name(), "Petrov Ivan");

        let sourced = FioData {
            source: Some("Petrov Ivan Sergeevich".to_string()),
            ..fio
        };
        assert_eq!(sourced.full_name(), "Petrov Ivan Sergeevich");
    }

    #[test]
    fn empty_finance_is_detected() {
        assert!(FinanceData::default().is_empty());
        let finance: FinanceData = serde_json::from_str(r#"{"income": 100}"#).unwrap();
        assert!(!finance.is_empty());
    }
}
