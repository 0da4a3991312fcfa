use std::collections::HashSet;

use serde::de::DeserializeOwned;
use tracing::trace;

use super::ConfigKey;
use super::ConfigType;
use super::DomainField;
use super::KeySpace;
use crate::CodecError;
use crate::FtpConfigDetail;
use crate::ResolverConfig;
use crate::ServiceDatabaseConfig;
use crate::StorageConfig;
use crate::TenantMeta;
use crate::TenantSnapshot;

/// Applies raw key/value changes to an unpublished snapshot.
///
/// Unknown keys, and keys of a configuration type that is not enabled, are
/// ignored. The caller is responsible for `rebuild_indexes` once it is done
/// mutating.
#[derive(Debug, Clone)]
pub struct KeyCodec {
    keyspace: KeySpace,
    config_types: HashSet<ConfigType>,
}

impl KeyCodec {
    pub fn new(
        keyspace: KeySpace,
        config_types: impl IntoIterator<Item = ConfigType>,
    ) -> Self {
        Self {
            keyspace,
            config_types: config_types.into_iter().collect(),
        }
    }

    pub fn keyspace(&self) -> &KeySpace {
        &self.keyspace
    }

    pub fn is_enabled(
        &self,
        config_type: ConfigType,
    ) -> bool {
        self.config_types.contains(&config_type)
    }

    /// Recognizes `key` if it belongs to an enabled category.
    pub fn classify(
        &self,
        key: &str,
    ) -> Option<ConfigKey> {
        let parsed = self.keyspace.parse(key)?;
        match parsed.config_type() {
            Some(t) if !self.is_enabled(t) => None,
            _ => Some(parsed),
        }
    }

    /// Decodes `value` and upserts it into `snapshot`.
    ///
    /// Returns the recognized key, or `None` when the key was ignored. On a
    /// decode failure the snapshot is left untouched.
    pub fn apply_put(
        &self,
        snapshot: &mut TenantSnapshot,
        key: &str,
        value: &[u8],
    ) -> Result<Option<ConfigKey>, CodecError> {
        let Some(parsed) = self.classify(key) else {
            trace!(key, "ignoring put on unrecognized key");
            return Ok(None);
        };

        match &parsed {
            ConfigKey::Meta { tenant_id } => {
                let mut meta: TenantMeta = decode(key, &parsed, value)?;
                meta.tenant_id = *tenant_id;
                snapshot.upsert_meta(meta);
            }
            ConfigKey::Database {
                tenant_id,
                service_code,
            } => {
                let mut config: ServiceDatabaseConfig = decode(key, &parsed, value)?;
                config.tenant_id = *tenant_id;
                config.service_code = service_code.clone();
                snapshot.upsert_database(config);
            }
            ConfigKey::Ftp { tenant_id, username } => {
                let mut config: FtpConfigDetail = decode(key, &parsed, value)?;
                config.tenant_id = *tenant_id;
                config.username = username.clone();
                snapshot.upsert_ftp(config);
            }
            ConfigKey::Storage { tenant_id } => {
                let mut config: StorageConfig = decode(key, &parsed, value)?;
                config.tenant_id = *tenant_id;
                snapshot.upsert_storage(config);
            }
            ConfigKey::Domain { tenant_id, field } => {
                let field = *field;
                match field {
                    DomainField::Aliases => {
                        let aliases = decode_aliases(key, value)?;
                        snapshot.update_domain(*tenant_id, |d| d.aliases = aliases);
                    }
                    DomainField::Primary | DomainField::Internal => {
                        let domain = decode_scalar(key, value)?;
                        snapshot.update_domain(*tenant_id, |d| match field {
                            DomainField::Primary => d.primary = domain,
                            _ => d.internal = domain,
                        });
                    }
                }
            }
            ConfigKey::Resolver => {
                let resolver: ResolverConfig = decode(key, &parsed, value)?;
                snapshot.set_resolver(Some(resolver));
            }
        }

        Ok(Some(parsed))
    }

    /// Removes the record `key` refers to.
    ///
    /// A delete of a meta key removes only the meta record; the tenant's
    /// other records stay until their own keys are deleted.
    pub fn apply_delete(
        &self,
        snapshot: &mut TenantSnapshot,
        key: &str,
    ) -> Option<ConfigKey> {
        let Some(parsed) = self.classify(key) else {
            trace!(key, "ignoring delete on unrecognized key");
            return None;
        };

        match &parsed {
            ConfigKey::Meta { tenant_id } => {
                snapshot.remove_meta(*tenant_id);
            }
            ConfigKey::Database {
                tenant_id,
                service_code,
            } => {
                snapshot.remove_database(*tenant_id, service_code);
            }
            ConfigKey::Ftp { tenant_id, username } => {
                snapshot.remove_ftp(*tenant_id, username);
            }
            ConfigKey::Storage { tenant_id } => {
                snapshot.remove_storage(*tenant_id);
            }
            ConfigKey::Domain { tenant_id, field } => {
                if snapshot.domain(*tenant_id).is_some() {
                    let field = *field;
                    snapshot.update_domain(*tenant_id, |d| match field {
                        DomainField::Primary => d.primary.clear(),
                        DomainField::Aliases => d.aliases.clear(),
                        DomainField::Internal => d.internal.clear(),
                    });
                }
            }
            ConfigKey::Resolver => snapshot.set_resolver(None),
        }

        Some(parsed)
    }
}

fn decode<T: DeserializeOwned>(
    key: &str,
    parsed: &ConfigKey,
    value: &[u8],
) -> Result<T, CodecError> {
    serde_json::from_slice(value).map_err(|source| CodecError::Json {
        key: key.to_string(),
        category: parsed.category(),
        source,
    })
}

/// Domain scalars are written either as a JSON string or as raw text.
/// A JSON `null` clears the field.
pub(crate) fn decode_scalar(
    key: &str,
    value: &[u8],
) -> Result<String, CodecError> {
    let text = std::str::from_utf8(value).map_err(|_| CodecError::Utf8 { key: key.to_string() })?;
    let text = text.trim();
    if text == "null" {
        return Ok(String::new());
    }
    if text.starts_with('"') {
        if let Ok(decoded) = serde_json::from_str::<String>(text) {
            return Ok(decoded.trim().to_string());
        }
    }
    Ok(text.to_string())
}

/// Aliases are a JSON array of strings, or `null` for none. Blank entries
/// are dropped.
pub(crate) fn decode_aliases(
    key: &str,
    value: &[u8],
) -> Result<Vec<String>, CodecError> {
    let text = std::str::from_utf8(value).map_err(|_| CodecError::Utf8 { key: key.to_string() })?;
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    let aliases: Option<Vec<String>> = serde_json::from_str(text).map_err(|source| CodecError::Json {
        key: key.to_string(),
        category: crate::constants::CATEGORY_DOMAIN,
        source,
    })?;
    Ok(aliases
        .unwrap_or_default()
        .into_iter()
        .map(|a| a.trim().to_string())
        .filter(|a| !a.is_empty())
        .collect())
}
