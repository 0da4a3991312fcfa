//! Coordination-store key layout.
//!
//! ```text
//! {ns}tenants/{id}/meta
//! {ns}tenants/{id}/database/{serviceCode}
//! {ns}tenants/{id}/ftp/{username}
//! {ns}tenants/{id}/storage
//! {ns}tenants/{id}/domain/{primary|aliases|internal}
//! {ns}common/resolver
//! ```
//!
//! [`KeySpace`] parses raw keys into [`ConfigKey`] and builds keys back from
//! their parts. [`KeyCodec`] turns key/value pairs into snapshot mutations.

mod codec;

#[cfg(test)]
mod keyspace_test;

use std::fmt;

pub use codec::*;
use serde::Deserialize;
use serde::Serialize;

use crate::constants::*;
use crate::TenantId;

/// Optional configuration categories. Tenant meta, domains and the
/// resolver record are always loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigType {
    Database,
    Ftp,
    Storage,
}

impl ConfigType {
    pub const ALL: [ConfigType; 3] = [ConfigType::Database, ConfigType::Ftp, ConfigType::Storage];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigType::Database => CATEGORY_DATABASE,
            ConfigType::Ftp => CATEGORY_FTP,
            ConfigType::Storage => CATEGORY_STORAGE,
        }
    }
}

impl fmt::Display for ConfigType {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The three independently stored parts of a tenant's domain config
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DomainField {
    Primary,
    Aliases,
    Internal,
}

impl DomainField {
    pub fn as_str(&self) -> &'static str {
        match self {
            DomainField::Primary => DOMAIN_PRIMARY,
            DomainField::Aliases => DOMAIN_ALIASES,
            DomainField::Internal => DOMAIN_INTERNAL,
        }
    }

    fn parse(segment: &str) -> Option<Self> {
        match segment {
            DOMAIN_PRIMARY => Some(DomainField::Primary),
            DOMAIN_ALIASES => Some(DomainField::Aliases),
            DOMAIN_INTERNAL => Some(DomainField::Internal),
            _ => None,
        }
    }
}

/// A recognized key, with the namespace stripped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigKey {
    Meta { tenant_id: TenantId },
    Database { tenant_id: TenantId, service_code: String },
    Ftp { tenant_id: TenantId, username: String },
    Storage { tenant_id: TenantId },
    Domain { tenant_id: TenantId, field: DomainField },
    Resolver,
}

impl ConfigKey {
    pub fn tenant_id(&self) -> Option<TenantId> {
        match self {
            ConfigKey::Meta { tenant_id }
            | ConfigKey::Database { tenant_id, .. }
            | ConfigKey::Ftp { tenant_id, .. }
            | ConfigKey::Storage { tenant_id }
            | ConfigKey::Domain { tenant_id, .. } => Some(*tenant_id),
            ConfigKey::Resolver => None,
        }
    }

    pub fn category(&self) -> &'static str {
        match self {
            ConfigKey::Meta { .. } => CATEGORY_META,
            ConfigKey::Database { .. } => CATEGORY_DATABASE,
            ConfigKey::Ftp { .. } => CATEGORY_FTP,
            ConfigKey::Storage { .. } => CATEGORY_STORAGE,
            ConfigKey::Domain { .. } => CATEGORY_DOMAIN,
            ConfigKey::Resolver => RESOLVER_KEY,
        }
    }

    /// The optional category this key belongs to, if any
    pub fn config_type(&self) -> Option<ConfigType> {
        match self {
            ConfigKey::Database { .. } => Some(ConfigType::Database),
            ConfigKey::Ftp { .. } => Some(ConfigType::Ftp),
            ConfigKey::Storage { .. } => Some(ConfigType::Storage),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySpace {
    namespace: String,
}

impl KeySpace {
    /// A non-empty namespace always ends with `/`.
    pub fn new(namespace: impl Into<String>) -> Self {
        let mut namespace = namespace.into();
        if !namespace.is_empty() && !namespace.ends_with('/') {
            namespace.push('/');
        }
        Self { namespace }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Prefix covering every key the provider understands
    pub fn watch_prefix(&self) -> &str {
        &self.namespace
    }

    pub fn tenants_prefix(&self) -> String {
        format!("{}{}/", self.namespace, TENANTS_SEGMENT)
    }

    pub fn common_prefix(&self) -> String {
        format!("{}{}/", self.namespace, COMMON_SEGMENT)
    }

    pub fn meta_key(
        &self,
        tenant_id: TenantId,
    ) -> String {
        format!("{}{}/{}", self.tenants_prefix(), tenant_id, CATEGORY_META)
    }

    pub fn database_key(
        &self,
        tenant_id: TenantId,
        service_code: &str,
    ) -> String {
        format!("{}{}/{}/{}", self.tenants_prefix(), tenant_id, CATEGORY_DATABASE, service_code)
    }

    pub fn ftp_key(
        &self,
        tenant_id: TenantId,
        username: &str,
    ) -> String {
        format!("{}{}/{}/{}", self.tenants_prefix(), tenant_id, CATEGORY_FTP, username)
    }

    pub fn storage_key(
        &self,
        tenant_id: TenantId,
    ) -> String {
        format!("{}{}/{}", self.tenants_prefix(), tenant_id, CATEGORY_STORAGE)
    }

    pub fn domain_key(
        &self,
        tenant_id: TenantId,
        field: DomainField,
    ) -> String {
        format!(
            "{}{}/{}/{}",
            self.tenants_prefix(),
            tenant_id,
            CATEGORY_DOMAIN,
            field.as_str()
        )
    }

    pub fn resolver_key(&self) -> String {
        format!("{}{}", self.common_prefix(), RESOLVER_KEY)
    }

    /// Extracts the numeric tenant segment of a `{ns}tenants/{id}/...` key.
    ///
    /// Returns `None` for keys outside the namespace, outside `tenants/`,
    /// or whose ID segment is not a plain decimal integer.
    pub fn parse_tenant_id(
        &self,
        key: &str,
    ) -> Option<TenantId> {
        let rest = key.strip_prefix(self.namespace.as_str())?;
        let mut parts = rest.split('/');
        if parts.next()? != TENANTS_SEGMENT {
            return None;
        }
        parse_id_segment(parts.next()?)
    }

    pub fn parse(
        &self,
        key: &str,
    ) -> Option<ConfigKey> {
        let rest = key.strip_prefix(self.namespace.as_str())?;
        let parts: Vec<&str> = rest.split('/').collect();

        match parts.as_slice() {
            [COMMON_SEGMENT, RESOLVER_KEY] => Some(ConfigKey::Resolver),
            [TENANTS_SEGMENT, id, category] => {
                let tenant_id = parse_id_segment(id)?;
                match *category {
                    CATEGORY_META => Some(ConfigKey::Meta { tenant_id }),
                    CATEGORY_STORAGE => Some(ConfigKey::Storage { tenant_id }),
                    _ => None,
                }
            }
            [TENANTS_SEGMENT, id, category, subkey] if !subkey.is_empty() => {
                let tenant_id = parse_id_segment(id)?;
                match *category {
                    CATEGORY_DATABASE => Some(ConfigKey::Database {
                        tenant_id,
                        service_code: subkey.to_string(),
                    }),
                    CATEGORY_FTP => Some(ConfigKey::Ftp {
                        tenant_id,
                        username: subkey.to_string(),
                    }),
                    CATEGORY_DOMAIN => DomainField::parse(subkey).map(|field| ConfigKey::Domain { tenant_id, field }),
                    _ => None,
                }
            }
            _ => None,
        }
    }
}

fn parse_id_segment(segment: &str) -> Option<TenantId> {
    if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    segment.parse().ok()
}
