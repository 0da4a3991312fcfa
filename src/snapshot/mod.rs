//! Immutable tenant configuration snapshot.
//!
//! A [`TenantSnapshot`] is the aggregate the provider publishes through a
//! single atomic pointer. Once published it is never mutated: writers clone
//! it, change the clone and publish the clone. Per-tenant collections sit
//! behind `Arc`, so a clone copies only the top-level maps and
//! `Arc::make_mut` copies a tenant's collection the first time it changes.
//!
//! The derived indices (`code_index`, `domain_index`) are rebuilt by
//! [`TenantSnapshot::rebuild_indexes`] before a snapshot is published and
//! are never persisted.


use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;
use tracing::warn;

use crate::DomainConfig;
use crate::FtpConfigDetail;
use crate::ResolverConfig;
use crate::ServiceDatabaseConfig;
use crate::StorageConfig;
use crate::TenantId;
use crate::TenantMeta;

pub type DatabaseConfigs = HashMap<String, Arc<ServiceDatabaseConfig>>;
pub type FtpConfigs = Vec<Arc<FtpConfigDetail>>;

/// Where the data in a snapshot came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SnapshotOrigin {
    /// Nothing loaded yet
    #[default]
    Empty,
    /// Bulk load or watch event from the coordination store
    Store,
    /// Restored from the durable fallback cache
    Fallback,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TenantSnapshot {
    /// Store revision this snapshot reflects (0 when unknown)
    revision: i64,
    #[serde(skip)]
    origin: SnapshotOrigin,

    metas: HashMap<TenantId, Arc<TenantMeta>>,
    databases: HashMap<TenantId, Arc<DatabaseConfigs>>,
    ftps: HashMap<TenantId, Arc<FtpConfigs>>,
    storages: HashMap<TenantId, Arc<StorageConfig>>,
    domains: HashMap<TenantId, Arc<DomainConfig>>,
    resolver: Option<Arc<ResolverConfig>>,

    #[serde(skip)]
    code_index: HashMap<String, TenantId>,
    #[serde(skip)]
    domain_index: HashMap<String, TenantId>,
}

impl TenantSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn revision(&self) -> i64 {
        self.revision
    }

    pub fn origin(&self) -> SnapshotOrigin {
        self.origin
    }

    pub fn tenant_count(&self) -> usize {
        self.metas.len()
    }

    pub fn meta(
        &self,
        tenant_id: TenantId,
    ) -> Option<&Arc<TenantMeta>> {
        self.metas.get(&tenant_id)
    }

    pub fn database(
        &self,
        tenant_id: TenantId,
        service_code: &str,
    ) -> Option<&Arc<ServiceDatabaseConfig>> {
        self.databases.get(&tenant_id)?.get(service_code)
    }

    pub fn databases(
        &self,
        tenant_id: TenantId,
    ) -> Option<&Arc<DatabaseConfigs>> {
        self.databases.get(&tenant_id)
    }

    pub fn ftps(
        &self,
        tenant_id: TenantId,
    ) -> Option<&Arc<FtpConfigs>> {
        self.ftps.get(&tenant_id)
    }

    /// Global username lookup. Usernames are expected to be unique across
    /// tenants; if they are not, the lowest tenant ID wins.
    pub fn ftp_by_username(
        &self,
        username: &str,
    ) -> Option<&Arc<FtpConfigDetail>> {
        self.ftps
            .iter()
            .filter_map(|(id, configs)| configs.iter().find(|c| c.username == username).map(|c| (*id, c)))
            .min_by_key(|(id, _)| *id)
            .map(|(_, c)| c)
    }

    pub fn storage(
        &self,
        tenant_id: TenantId,
    ) -> Option<&Arc<StorageConfig>> {
        self.storages.get(&tenant_id)
    }

    pub fn domain(
        &self,
        tenant_id: TenantId,
    ) -> Option<&Arc<DomainConfig>> {
        self.domains.get(&tenant_id)
    }

    pub fn resolver(&self) -> Option<&Arc<ResolverConfig>> {
        self.resolver.as_ref()
    }

    /// Case-insensitive tenant code lookup
    pub fn tenant_id_by_code(
        &self,
        code: &str,
    ) -> Option<TenantId> {
        if code.is_empty() {
            return None;
        }
        self.code_index.get(&code.to_lowercase()).copied()
    }

    /// Exact (case-insensitive) domain lookup over primary, alias and internal domains
    pub fn tenant_id_by_domain(
        &self,
        domain: &str,
    ) -> Option<TenantId> {
        let domain = normalize_domain(domain);
        if domain.is_empty() {
            return None;
        }
        self.domain_index.get(&domain).copied()
    }

    pub fn database_count(&self) -> usize {
        self.databases.values().map(|m| m.len()).sum()
    }

    pub fn ftp_count(&self) -> usize {
        self.ftps.values().map(|v| v.len()).sum()
    }

    pub fn domain_mapping_count(&self) -> usize {
        self.domain_index.len()
    }

    // -
    // Mutation (only ever on an unpublished copy)

    pub(crate) fn set_revision(
        &mut self,
        revision: i64,
    ) {
        self.revision = revision;
    }

    pub(crate) fn set_origin(
        &mut self,
        origin: SnapshotOrigin,
    ) {
        self.origin = origin;
    }

    /// Marks a snapshot decoded from the fallback cache and restores its indices.
    pub(crate) fn into_fallback(mut self) -> Self {
        self.origin = SnapshotOrigin::Fallback;
        self.rebuild_indexes();
        self
    }

    pub(crate) fn upsert_meta(
        &mut self,
        meta: TenantMeta,
    ) {
        let tenant_id = meta.tenant_id;
        self.metas.insert(tenant_id, Arc::new(meta));
        self.enrich_tenant(tenant_id);
    }

    pub(crate) fn remove_meta(
        &mut self,
        tenant_id: TenantId,
    ) -> bool {
        self.metas.remove(&tenant_id).is_some()
    }

    pub(crate) fn upsert_database(
        &mut self,
        mut config: ServiceDatabaseConfig,
    ) {
        if let Some(meta) = self.metas.get(&config.tenant_id) {
            config.code = meta.code.clone();
            config.name = meta.name.clone();
        }
        let services = self.databases.entry(config.tenant_id).or_default();
        Arc::make_mut(services).insert(config.service_code.clone(), Arc::new(config));
    }

    pub(crate) fn remove_database(
        &mut self,
        tenant_id: TenantId,
        service_code: &str,
    ) -> bool {
        let Some(services) = self.databases.get_mut(&tenant_id) else {
            return false;
        };
        if !services.contains_key(service_code) {
            return false;
        }
        Arc::make_mut(services).remove(service_code);
        if services.is_empty() {
            self.databases.remove(&tenant_id);
        }
        true
    }

    /// Replaces the account with the same username, or appends it.
    pub(crate) fn upsert_ftp(
        &mut self,
        config: FtpConfigDetail,
    ) {
        let accounts = Arc::make_mut(self.ftps.entry(config.tenant_id).or_default());
        match accounts.iter().position(|c| c.username == config.username) {
            Some(pos) => accounts[pos] = Arc::new(config),
            None => accounts.push(Arc::new(config)),
        }
    }

    pub(crate) fn remove_ftp(
        &mut self,
        tenant_id: TenantId,
        username: &str,
    ) -> bool {
        let Some(accounts) = self.ftps.get_mut(&tenant_id) else {
            return false;
        };
        if !accounts.iter().any(|c| c.username == username) {
            return false;
        }
        Arc::make_mut(accounts).retain(|c| c.username != username);
        if accounts.is_empty() {
            self.ftps.remove(&tenant_id);
        }
        true
    }

    pub(crate) fn upsert_storage(
        &mut self,
        mut config: StorageConfig,
    ) {
        if let Some(meta) = self.metas.get(&config.tenant_id) {
            config.code = meta.code.clone();
            config.name = meta.name.clone();
        }
        self.storages.insert(config.tenant_id, Arc::new(config));
    }

    pub(crate) fn remove_storage(
        &mut self,
        tenant_id: TenantId,
    ) -> bool {
        self.storages.remove(&tenant_id).is_some()
    }

    /// Applies `update` to the tenant's domain config, creating it when
    /// absent and dropping it once every field is empty.
    pub(crate) fn update_domain<F>(
        &mut self,
        tenant_id: TenantId,
        update: F,
    ) where
        F: FnOnce(&mut DomainConfig),
    {
        let labels = self.metas.get(&tenant_id).map(|m| (m.code.clone(), m.name.clone()));
        let entry = self.domains.entry(tenant_id).or_insert_with(|| {
            Arc::new(DomainConfig {
                tenant_id,
                ..DomainConfig::default()
            })
        });
        let domain = Arc::make_mut(entry);
        update(domain);
        if let Some((code, name)) = labels {
            domain.code = code;
            domain.name = name;
        }
        if domain.is_empty() {
            self.domains.remove(&tenant_id);
        }
    }

    pub(crate) fn set_resolver(
        &mut self,
        resolver: Option<ResolverConfig>,
    ) {
        self.resolver = resolver.map(Arc::new);
    }

    /// Copies the tenant's code/name into every record that carries them.
    ///
    /// Records whose labels already match are left shared with older snapshots.
    pub(crate) fn enrich_tenant(
        &mut self,
        tenant_id: TenantId,
    ) {
        let Some(meta) = self.metas.get(&tenant_id).cloned() else {
            return;
        };
        let stale = |code: &str, name: &str| code != meta.code || name != meta.name;

        if let Some(services) = self.databases.get_mut(&tenant_id) {
            if services.values().any(|c| stale(&c.code, &c.name)) {
                for config in Arc::make_mut(services).values_mut() {
                    if stale(&config.code, &config.name) {
                        let config = Arc::make_mut(config);
                        config.code = meta.code.clone();
                        config.name = meta.name.clone();
                    }
                }
            }
        }

        if let Some(storage) = self.storages.get_mut(&tenant_id) {
            if stale(&storage.code, &storage.name) {
                let storage = Arc::make_mut(storage);
                storage.code = meta.code.clone();
                storage.name = meta.name.clone();
            }
        }

        if let Some(domain) = self.domains.get_mut(&tenant_id) {
            if stale(&domain.code, &domain.name) {
                let domain = Arc::make_mut(domain);
                domain.code = meta.code.clone();
                domain.name = meta.name.clone();
            }
        }
    }

    /// Second denormalization pass after a bulk load, where records may
    /// have been decoded before their tenant's meta.
    pub(crate) fn enrich_all(&mut self) {
        let tenant_ids: Vec<TenantId> = self.metas.keys().copied().collect();
        for tenant_id in tenant_ids {
            self.enrich_tenant(tenant_id);
        }
    }

    pub(crate) fn rebuild_indexes(&mut self) {
        self.code_index = build_code_index(&self.metas);
        self.domain_index = build_domain_index(&self.domains);
    }
}

/// Lowercase and trim; an empty result means "no domain".
pub(crate) fn normalize_domain(domain: &str) -> String {
    domain.trim().to_lowercase()
}

/// Tenants are visited in ascending ID order so the lowest ID keeps a
/// contested key.
fn sorted_ids<V>(map: &HashMap<TenantId, V>) -> Vec<TenantId> {
    let mut ids: Vec<TenantId> = map.keys().copied().collect();
    ids.sort_unstable();
    ids
}

fn build_code_index(metas: &HashMap<TenantId, Arc<TenantMeta>>) -> HashMap<String, TenantId> {
    let mut index = HashMap::with_capacity(metas.len());
    for tenant_id in sorted_ids(metas) {
        let code = metas[&tenant_id].code.to_lowercase();
        if code.is_empty() {
            continue;
        }
        claim(&mut index, code, tenant_id, "code");
    }
    index
}

fn build_domain_index(domains: &HashMap<TenantId, Arc<DomainConfig>>) -> HashMap<String, TenantId> {
    let mut index = HashMap::with_capacity(domains.len().max(2) * 4);
    for tenant_id in sorted_ids(domains) {
        for domain in domains[&tenant_id].domains() {
            claim(&mut index, normalize_domain(domain), tenant_id, "domain");
        }
    }
    index
}

fn claim(
    index: &mut HashMap<String, TenantId>,
    key: String,
    tenant_id: TenantId,
    kind: &'static str,
) {
    match index.get(&key) {
        Some(&owner) if owner != tenant_id => {
            warn!(
                kind,
                key = %key,
                owner,
                rejected = tenant_id,
                "tenant index conflict, keeping the first claimant"
            );
        }
        Some(_) => {}
        None => {
            index.insert(key, tenant_id);
        }
    }
}
