//! Lock-free read API.
//!
//! Every accessor performs one atomic snapshot load followed by a map
//! lookup. Records come back as shared `Arc`s of the snapshot they were read
//! from; use [`TenantProvider::snapshot`] when several values must come from
//! the same snapshot.

use std::sync::Arc;

use super::TenantProvider;
use crate::DatabaseConfigs;
use crate::DomainConfig;
use crate::FtpConfigDetail;
use crate::FtpConfigs;
use crate::NotFoundError;
use crate::ResolverConfig;
use crate::ServiceDatabaseConfig;
use crate::StorageConfig;
use crate::TenantId;
use crate::TenantMeta;
use crate::TenantSnapshot;

impl TenantProvider {
    /// The currently published snapshot
    pub fn snapshot(&self) -> Arc<TenantSnapshot> {
        self.inner.current.load_full()
    }

    pub fn tenant_count(&self) -> usize {
        self.inner.current.load().tenant_count()
    }

    pub fn get_tenant_meta(
        &self,
        tenant_id: TenantId,
    ) -> Option<Arc<TenantMeta>> {
        self.inner.current.load().meta(tenant_id).cloned()
    }

    /// `false` for unknown tenants
    pub fn is_tenant_enabled(
        &self,
        tenant_id: TenantId,
    ) -> bool {
        self.inner.current.load().meta(tenant_id).is_some_and(|m| m.is_enabled())
    }

    pub fn get_tenant_id_by_code(
        &self,
        code: &str,
    ) -> Option<TenantId> {
        self.inner.current.load().tenant_id_by_code(code)
    }

    pub fn get_service_database_config(
        &self,
        tenant_id: TenantId,
        service_code: &str,
    ) -> Option<Arc<ServiceDatabaseConfig>> {
        self.inner.current.load().database(tenant_id, service_code).cloned()
    }

    /// All services' database configs for the tenant, keyed by service code
    pub fn get_all_service_database_configs(
        &self,
        tenant_id: TenantId,
    ) -> Option<Arc<DatabaseConfigs>> {
        self.inner.current.load().databases(tenant_id).cloned()
    }

    pub fn get_ftp_configs(
        &self,
        tenant_id: TenantId,
    ) -> Option<Arc<FtpConfigs>> {
        self.inner.current.load().ftps(tenant_id).cloned()
    }

    /// Looks a username up across all tenants.
    pub fn get_ftp_config_by_username(
        &self,
        username: &str,
    ) -> Option<Arc<FtpConfigDetail>> {
        self.inner.current.load().ftp_by_username(username).cloned()
    }

    /// Accounts whose status is empty or `active`; `None` if there are none.
    pub fn get_active_ftp_configs(
        &self,
        tenant_id: TenantId,
    ) -> Option<Vec<Arc<FtpConfigDetail>>> {
        let snapshot = self.inner.current.load();
        let active: Vec<_> = snapshot
            .ftps(tenant_id)?
            .iter()
            .filter(|c| c.is_active())
            .cloned()
            .collect();
        (!active.is_empty()).then_some(active)
    }

    pub fn get_domain_config(
        &self,
        tenant_id: TenantId,
    ) -> Option<Arc<DomainConfig>> {
        self.inner.current.load().domain(tenant_id).cloned()
    }

    /// Exact match on primary, alias or internal domain, ignoring case and
    /// surrounding whitespace.
    pub fn get_tenant_id_by_domain(
        &self,
        domain: &str,
    ) -> Option<TenantId> {
        self.inner.current.load().tenant_id_by_domain(domain)
    }

    pub fn get_storage_config(
        &self,
        tenant_id: TenantId,
    ) -> Option<Arc<StorageConfig>> {
        self.inner.current.load().storage(tenant_id).cloned()
    }

    pub fn get_resolver_config(&self) -> Option<Arc<ResolverConfig>> {
        self.inner.current.load().resolver().cloned()
    }

    /// An owned copy; mutating it never affects the snapshot.
    pub fn get_resolver_config_or_default(&self) -> ResolverConfig {
        self.inner
            .current
            .load()
            .resolver()
            .map(|r| ResolverConfig::clone(r))
            .unwrap_or_default()
    }

    // -
    // Typed lookups for the per-domain cache adapters

    pub fn require_tenant_meta(
        &self,
        tenant_id: TenantId,
    ) -> Result<Arc<TenantMeta>, NotFoundError> {
        self.get_tenant_meta(tenant_id)
            .ok_or(NotFoundError::TenantMeta { tenant_id })
    }

    pub fn require_service_database_config(
        &self,
        tenant_id: TenantId,
        service_code: &str,
    ) -> Result<Arc<ServiceDatabaseConfig>, NotFoundError> {
        self.get_service_database_config(tenant_id, service_code)
            .ok_or_else(|| NotFoundError::Database {
                tenant_id,
                service_code: service_code.to_string(),
            })
    }

    pub fn require_ftp_configs(
        &self,
        tenant_id: TenantId,
    ) -> Result<Arc<FtpConfigs>, NotFoundError> {
        self.get_ftp_configs(tenant_id).ok_or(NotFoundError::Ftp { tenant_id })
    }

    pub fn require_storage_config(
        &self,
        tenant_id: TenantId,
    ) -> Result<Arc<StorageConfig>, NotFoundError> {
        self.get_storage_config(tenant_id)
            .ok_or(NotFoundError::Storage { tenant_id })
    }

    pub fn require_domain_config(
        &self,
        tenant_id: TenantId,
    ) -> Result<Arc<DomainConfig>, NotFoundError> {
        self.get_domain_config(tenant_id)
            .ok_or(NotFoundError::Domain { tenant_id })
    }
}
