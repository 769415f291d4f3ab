//! Builds the entity graph for one new organization.
//!
//! Walks the payload in a fixed order, resolving every sub-entity by natural
//! key before creating it, and registers everything with the unit of work.
//! Nothing is written to the store here; the coordinator flushes on success.

use chrono::Utc;
use serde_json::Value;

use regsync_core::payload::{
    AddressData, AuthorityData, DocumentData, FinanceData, HolderKind, LicenseData, OkvedData,
    OrganizationData, RoleHolderData, SmbData,
};
use regsync_core::types::{
    Address, Authority, Document, Finance, ForeignOrganization, GeoLevel, GeoNode, InnRecord,
    License, Okved, Organization, OrganizationAuthority, OrganizationFounder, OrganizationManager,
    OrganizationOkved, Person, RegistrySmb, RoleHolder,
};
use regsync_core::{Entity, NaturalKey};
use regsync_graph::EntityStore;

use crate::dates::parse_epoch_millis;
use crate::error::{Result, SyncError};
use crate::resolver::IdentityResolver;
use crate::unit_of_work::{Handle, UnitOfWork};

pub struct GraphBuilder<'a, S: EntityStore + ?Sized> {
    store: &'a mut S,
    uow: &'a mut UnitOfWork,
    resolver: &'a mut IdentityResolver,
}

impl<'a, S: EntityStore + ?Sized> GraphBuilder<'a, S> {
    pub fn new(
        store: &'a mut S,
        uow: &'a mut UnitOfWork,
        resolver: &'a mut IdentityResolver,
    ) -> Self {
        Self {
            store,
            uow,
            resolver,
        }
    }

    /// Register the organization and everything it references. Returns the
    /// organization's handle.
    pub async fn build(&mut self, data: &OrganizationData) -> Result<Handle> {
        let inn = data.inn.trim();
        if inn.is_empty() {
            return Err(SyncError::Validation("organization has no inn".to_string()));
        }

        let org_key = NaturalKey::Organization {
            inn: inn.to_string(),
        };
        if self.resolve(&org_key).await?.is_some() {
            return Err(SyncError::AlreadyExists {
                inn: inn.to_string(),
            });
        }

        let mut organization = organization_from(inn, data);
        organization.management_inn = management_inn(data);

        if !self.store.is_open() {
            tracing::warn!("Store session closed by an earlier failure, reopening");
            self.store.reopen().await?;
        }
        let org = self.uow.persist(Entity::Organization(organization));

        for founder in &data.founders {
            self.founder(inn, founder).await?;
        }
        for manager in &data.managers {
            self.manager(inn, manager).await?;
        }
        for okved in &data.okveds {
            self.okved(inn, okved).await?;
        }
        for (role, authority) in &data.authorities {
            if let Some(authority) = authority {
                self.authority(inn, role, authority).await?;
            }
        }
        for document in &data.documents.entries {
            self.document(inn, document).await?;
        }
        if let Some(smb) = &data.documents.smb {
            self.smb(inn, smb).await?;
        }
        if let Some(finance) = &data.finance {
            self.finance(inn, finance).await?;
        }
        if let Some(address) = &data.address {
            self.address(inn, address).await?;
        }
        for license in &data.licenses {
            self.license(inn, license).await?;
        }

        self.stamp_inn_record(inn).await?;
        Ok(org)
    }

    // ── Resolution ───────────────────────────────────────────────

    async fn resolve(&mut self, key: &NaturalKey) -> Result<Option<Handle>> {
        self.resolver.resolve(&mut *self.store, self.uow, key).await
    }

    /// Resolve `entity` by its key, registering it as new when nothing matches.
    /// Remembered entities are served from the run cache for the rest of the run.
    async fn resolve_or_create(&mut self, entity: Entity, remember: bool) -> Result<Handle> {
        let key = entity.key();
        if let Some(handle) = self.resolve(&key).await? {
            return Ok(handle);
        }
        let handle = self.uow.persist(entity);
        if remember {
            self.resolver.remember(key, handle);
        }
        Ok(handle)
    }

    // ── Founders & Managers ──────────────────────────────────────

    async fn founder(&mut self, org_inn: &str, data: &RoleHolderData) -> Result<()> {
        let kind = data.holder_type.as_deref().and_then(HolderKind::for_founder);
        let holder = self.role_holder(data, kind).await?;
        self.resolve_or_create(Entity::Founder(holder.clone()), false).await?;

        let mut link = OrganizationFounder::new(org_inn, &holder);
        link.founder_type = data.holder_type.clone();
        if let Some(share) = &data.share {
            link.share_type = share.share_type.clone();
            link.share_value = share.value;
            link.share_numerator = share.numerator;
            link.share_denominator = share.denominator;
        }
        self.resolve_or_create(Entity::OrganizationFounder(link), false).await?;
        Ok(())
    }

    async fn manager(&mut self, org_inn: &str, data: &RoleHolderData) -> Result<()> {
        let kind = data.holder_type.as_deref().and_then(HolderKind::for_manager);
        let holder = self.role_holder(data, kind).await?;
        self.resolve_or_create(Entity::Manager(holder.clone()), false).await?;

        let mut link = OrganizationManager::new(org_inn, &holder);
        link.post = data.post.clone();
        link.manager_type = data.holder_type.clone();
        self.resolve_or_create(Entity::OrganizationManager(link), false).await?;
        Ok(())
    }

    /// Identity triple for a founder or manager. Holders without a usable tax
    /// id are represented by a foreign organization keyed by their hid.
    async fn role_holder(
        &mut self,
        data: &RoleHolderData,
        kind: Option<HolderKind>,
    ) -> Result<RoleHolder> {
        let inn = non_empty(data.inn.as_deref());

        match (kind, inn) {
            (Some(HolderKind::Physical), Some(inn)) => {
                let fio = data.fio.clone().unwrap_or_default();
                let person = Person {
                    inn: inn.to_string(),
                    surname: fio.surname,
                    name: fio.name,
                    patronymic: fio.patronymic,
                    gender: fio.gender.map(|g| g.to_lowercase()),
                    source: fio.source,
                };
                self.resolve_or_create(Entity::Person(person), true).await?;
                Ok(RoleHolder {
                    person_inn: Some(inn.to_string()),
                    ..Default::default()
                })
            }
            (Some(HolderKind::Legal), Some(inn)) => Ok(RoleHolder {
                org_inn: Some(inn.to_string()),
                ..Default::default()
            }),
            _ => {
                let hid = non_empty(data.hid.as_deref()).ok_or_else(|| {
                    SyncError::Validation(format!(
                        "{} role holder has neither inn nor hid",
                        data.holder_type.as_deref().unwrap_or("untyped")
                    ))
                })?;
                let foreign = ForeignOrganization::new(hid, holder_display_name(data, kind));
                let id = foreign.id;
                self.resolve_or_create(Entity::ForeignOrganization(foreign), false).await?;
                Ok(RoleHolder {
                    foreign_org_id: Some(id),
                    ..Default::default()
                })
            }
        }
    }

    // ── Classification & Authorities ─────────────────────────────

    async fn okved(&mut self, org_inn: &str, data: &OkvedData) -> Result<()> {
        let code = data.code.trim();
        if code.is_empty() {
            tracing::warn!("Skipping okved without a code");
            return Ok(());
        }

        let okved = Okved {
            code: code.to_string(),
            name: data.name.clone(),
            okved_type: data.okved_type.clone(),
        };
        self.resolve_or_create(Entity::Okved(okved), false).await?;

        let link = OrganizationOkved {
            org_inn: org_inn.to_string(),
            okved_code: code.to_string(),
            is_main: data.main.unwrap_or(false),
        };
        self.resolve_or_create(Entity::OrganizationOkved(link), false).await?;
        Ok(())
    }

    async fn authority(&mut self, org_inn: &str, role: &str, data: &AuthorityData) -> Result<()> {
        let Some(code) = non_empty(data.code.as_deref()) else {
            tracing::warn!(role, "Skipping authority without a code");
            return Ok(());
        };

        let authority = Authority {
            code: code.to_string(),
            authority_type: data.authority_type.clone(),
            name: data.name.clone(),
            address: data.address.clone(),
        };
        self.resolve_or_create(Entity::Authority(authority), true).await?;

        let link = OrganizationAuthority {
            org_inn: org_inn.to_string(),
            authority_code: code.to_string(),
            authority_type: data.authority_type.clone(),
            role: role.to_string(),
        };
        self.resolve_or_create(Entity::OrganizationAuthority(link), true).await?;
        Ok(())
    }

    // ── Organization-scoped records ──────────────────────────────

    async fn document(&mut self, org_inn: &str, data: &DocumentData) -> Result<()> {
        let Some(doc_type) = data.doc_type.as_deref().filter(|_| data.is_recognized()) else {
            tracing::debug!(doc_type = ?data.doc_type, "Skipping unrecognized document type");
            return Ok(());
        };

        let document = Document {
            org_inn: org_inn.to_string(),
            doc_type: doc_type.to_string(),
            series: data.series.clone(),
            number: data.number.clone(),
            issue_date: parse_epoch_millis(&data.issue_date),
            issue_authority: data.issue_authority.clone(),
        };
        self.resolve_or_create(Entity::Document(document), false).await?;
        Ok(())
    }

    async fn smb(&mut self, org_inn: &str, data: &SmbData) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        let smb = RegistrySmb {
            org_inn: org_inn.to_string(),
            smb_type: data.smb_type.clone(),
            category: data.category.clone(),
            issue_date: parse_epoch_millis(&data.issue_date),
        };
        self.resolve_or_create(Entity::RegistrySmb(smb), false).await?;
        Ok(())
    }

    /// Finance rows are keyed by their figures: unchanged figures resolve to
    /// the existing row, changed ones append a new row.
    async fn finance(&mut self, org_inn: &str, data: &FinanceData) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        let finance = Finance {
            org_inn: org_inn.to_string(),
            tax_system: data.tax_system.clone(),
            income: data.income.map(|d| d.normalize()),
            expense: data.expense.map(|d| d.normalize()),
            debt: data.debt.map(|d| d.normalize()),
            penalty: data.penalty.map(|d| d.normalize()),
        };
        self.resolve_or_create(Entity::Finance(finance), false).await?;
        Ok(())
    }

    async fn address(&mut self, org_inn: &str, data: &AddressData) -> Result<()> {
        let Some(details) = &data.data else {
            return Ok(());
        };
        let address = address_from(org_inn, data);
        if self.resolve(&Entity::Address(address.clone()).key()).await?.is_some() {
            return Ok(());
        }

        for level in GeoLevel::ALL {
            let Some(fias_id) = address.geo_fias_id(level) else {
                continue;
            };
            let (name, type_full) = geo_names(details, level);
            let node = GeoNode {
                level,
                fias_id: fias_id.to_string(),
                name,
                type_full,
            };
            self.resolve_or_create(Entity::Geography(node), false).await?;
        }

        self.uow.persist(Entity::Address(address));
        Ok(())
    }

    async fn license(&mut self, org_inn: &str, data: &LicenseData) -> Result<()> {
        let license = License {
            org_inn: org_inn.to_string(),
            series: data.series.clone(),
            number: data.number.clone(),
            issue_authority: data.issue_authority.clone(),
            issue_date: parse_epoch_millis(&data.issue_date),
            suspend_authority: data.suspend_authority.clone(),
            suspend_date: parse_epoch_millis(&data.suspend_date),
            valid_from: parse_epoch_millis(&data.valid_from),
            valid_to: parse_epoch_millis(&data.valid_to),
        };
        self.resolve_or_create(Entity::License(license), false).await?;
        Ok(())
    }

    // ── Parse registry ───────────────────────────────────────────

    async fn stamp_inn_record(&mut self, inn: &str) -> Result<()> {
        let key = NaturalKey::InnRecord {
            inn: inn.to_string(),
        };
        let Some(handle) = self.resolve(&key).await? else {
            tracing::error!(
                severity = "critical",
                inn,
                "Inn record not found, parse time not stamped"
            );
            return Ok(());
        };

        let stamped = match self.uow.get(handle) {
            Some(Entity::InnRecord(record)) => InnRecord {
                last_parsed_at: Some(Utc::now()),
                ..record.clone()
            },
            _ => return Ok(()),
        };
        self.uow.mark_dirty(handle, Entity::InnRecord(stamped));
        tracing::debug!(inn, "Inn record stamped");
        Ok(())
    }
}

// ── Payload mapping ───────────────────────────────────────────────

/// Organization scalars as delivered. `management_inn` is left unset.
pub fn organization_from(inn: &str, data: &OrganizationData) -> Organization {
    Organization {
        inn: inn.to_string(),
        name: data.name.full.clone(),
        name_short: data.name.short.clone(),
        name_with_opf: data.name.full_with_opf.clone(),
        name_short_with_opf: data.name.short_with_opf.clone(),
        name_latin: data.name.latin.clone(),
        org_type: data.org_type.clone(),
        branch_type: data.branch_type.clone(),
        branch_count: data.branch_count,
        ogrn: data.ogrn.clone(),
        ogrn_date: parse_epoch_millis(&data.ogrn_date),
        okpo: data.okpo.clone(),
        okved: data.okved.clone(),
        okved_type: data.okved_type.clone(),
        hid: data.hid.clone(),
        kpp: data.kpp.clone(),
        address: data.address.as_ref().and_then(|a| a.value.clone()),
        address_unrestricted: data
            .address
            .as_ref()
            .and_then(|a| a.unrestricted_value.clone()),
        management_name: data.management.name.clone(),
        management_post: data.management.post.clone(),
        management_inn: None,
        capital: data.capital.value,
        capital_type: data.capital.capital_type.clone(),
        status: data.state.status.clone(),
        opf: data.opf.full.clone(),
        opf_short: data.opf.short.clone(),
        opf_type: data.opf.opf_type.clone(),
        actuality_date: parse_epoch_millis(&data.state.actuality_date),
        registration_date: parse_epoch_millis(&data.state.registration_date),
        liquidation_date: parse_epoch_millis(&data.state.liquidation_date),
    }
}

/// Tax id of the first manager whose full name matches the management name.
pub fn management_inn(data: &OrganizationData) -> Option<String> {
    let wanted = normalize_name(data.management.name.as_deref()?);
    if wanted.is_empty() {
        return None;
    }

    data.managers.iter().find_map(|manager| {
        let inn = non_empty(manager.inn.as_deref())?;
        let fio = manager.fio.as_ref()?;
        (normalize_name(&fio.full_name()) == wanted).then(|| inn.to_string())
    })
}

/// Lowercased name tokens in sorted order, so "Ivan Petrov" and
/// "PETROV  ivan" compare equal.
pub fn normalize_name(name: &str) -> String {
    let mut tokens: Vec<String> = name.split_whitespace().map(str::to_lowercase).collect();
    tokens.sort();
    tokens.join(" ")
}

fn holder_display_name(data: &RoleHolderData, kind: Option<HolderKind>) -> Option<String> {
    let fio_name = || {
        data.fio
            .as_ref()
            .map(|fio| fio.display_name())
            .filter(|name| !name.is_empty())
    };
    match kind {
        Some(HolderKind::Physical) => fio_name(),
        Some(HolderKind::Legal) => data.name.clone(),
        None => data.name.clone().or_else(fio_name),
    }
}

/// Strings are kept as is; lists and objects are kept as JSON text.
fn metro_text(metro: &Value) -> Option<String> {
    match metro {
        Value::Null => None,
        Value::String(s) => non_empty(Some(s)).map(str::to_string),
        other => Some(other.to_string()),
    }
}

fn address_from(org_inn: &str, data: &AddressData) -> Address {
    let details = data.data.clone().unwrap_or_default();
    let metro = metro_text(&details.metro);
    Address {
        org_inn: org_inn.to_string(),
        fias_id: details.fias_id,
        source: details.source,
        block: details.block,
        block_type: details.block_type,
        timezone: details.timezone,
        geo_lat: details.geo_lat,
        geo_lon: details.geo_lon,
        country: details.country,
        okato: details.okato,
        oktmo: details.oktmo,
        metro,
        region_fias_id: non_empty_owned(details.region_fias_id),
        area_fias_id: non_empty_owned(details.area_fias_id),
        city_fias_id: non_empty_owned(details.city_fias_id),
        settlement_fias_id: non_empty_owned(details.settlement_fias_id),
        street_fias_id: non_empty_owned(details.street_fias_id),
        house: details.house,
        house_type: details.house_type_full,
        flat: details.flat,
        flat_type: details.flat_type_full,
    }
}

fn geo_names(
    details: &regsync_core::payload::AddressDetails,
    level: GeoLevel,
) -> (Option<String>, Option<String>) {
    let (name, type_full) = match level {
        GeoLevel::Region => (&details.region, &details.region_type_full),
        GeoLevel::Area => (&details.area, &details.area_type_full),
        GeoLevel::City => (&details.city, &details.city_type_full),
        GeoLevel::Settlement => (&details.settlement, &details.settlement_type_full),
        GeoLevel::Street => (&details.street, &details.street_type_full),
    };
    (name.clone(), type_full.clone())
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn non_empty_owned(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
