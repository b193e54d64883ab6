//! Upload destinations: the fixed set of S3-compatible providers and their
//! out-of-band configuration.
//!
//! Each provider reads a fixed set of environment variables. Missing optional
//! settings fall back to documented defaults (bucket name, OCI region); a
//! missing required credential disables the provider entirely, so it is never
//! offered for selection.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Everything except RFC 3986 unreserved characters is escaped in object names.
const OBJECT_NAME_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Destination identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    R2,
    Impossible,
    Wasabi,
    Oracle,
}

impl Provider {
    pub const ALL: [Provider; 4] = [
        Provider::R2,
        Provider::Impossible,
        Provider::Wasabi,
        Provider::Oracle,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Provider::R2 => "r2",
            Provider::Impossible => "impossible",
            Provider::Wasabi => "wasabi",
            Provider::Oracle => "oracle",
        }
    }

    /// Human-facing provider name.
    pub fn display_name(self) -> &'static str {
        match self {
            Provider::R2 => "Cloudflare R2",
            Provider::Impossible => "ImpossibleCloud",
            Provider::Wasabi => "Wasabi",
            Provider::Oracle => "Oracle Cloud",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown destination '{0}' (expected one of: r2, impossible, wasabi, oracle)")]
pub struct UnknownProvider(pub String);

impl FromStr for Provider {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "r2" | "cloudflare" => Ok(Provider::R2),
            "impossible" | "impossiblecloud" => Ok(Provider::Impossible),
            "wasabi" => Ok(Provider::Wasabi),
            "oracle" | "oci" => Ok(Provider::Oracle),
            _ => Err(UnknownProvider(s.to_string())),
        }
    }
}

/// Connection settings for one enabled destination.
#[derive(Clone, PartialEq, Eq)]
pub struct Destination {
    pub provider: Provider,
    pub bucket: String,
    pub endpoint: String,
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    /// Address buckets as `endpoint/bucket` instead of `bucket.endpoint`.
    pub force_path_style: bool,
    /// Upload is skipped when the checked size exceeds this many bytes.
    pub size_limit: Option<u64>,
    /// Oracle Cloud object storage namespace (used for public object URLs).
    pub oci_namespace: Option<String>,
}

impl fmt::Debug for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Destination")
            .field("provider", &self.provider)
            .field("bucket", &self.bucket)
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("force_path_style", &self.force_path_style)
            .field("size_limit", &self.size_limit)
            .finish()
    }
}

impl Destination {
    /// Permanent public URL for an object, where the provider has one (Oracle Cloud).
    pub fn public_object_url(&self, key: &str) -> Option<String> {
        if self.provider != Provider::Oracle {
            return None;
        }
        let namespace = self.oci_namespace.as_deref()?;
        let encoded = utf8_percent_encode(key, OBJECT_NAME_ENCODE_SET);
        Some(format!(
            "https://objectstorage.{}.oraclecloud.com/n/{}/b/{}/o/{}",
            self.region, namespace, self.bucket, encoded
        ))
    }
}

/// A provider that could not be enabled, with the settings it is missing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisabledDestination {
    pub provider: Provider,
    pub missing: Vec<&'static str>,
}

/// The destinations available to this process.
#[derive(Debug, Clone, Default)]
pub struct DestinationSet {
    enabled: Vec<Destination>,
    disabled: Vec<DisabledDestination>,
}

impl DestinationSet {
    /// Build from explicit destinations (tests, embedding).
    pub fn new(enabled: Vec<Destination>) -> Self {
        Self {
            enabled,
            disabled: Vec::new(),
        }
    }

    /// Read provider settings from the process environment.
    pub fn from_env(r2_size_limit: u64) -> Self {
        Self::from_lookup(|key| std::env::var(key).ok(), r2_size_limit)
    }

    /// Read provider settings through `lookup`; empty values count as absent.
    pub fn from_lookup<F>(lookup: F, r2_size_limit: u64) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut set = DestinationSet::default();

        for provider in Provider::ALL {
            let spec = ProviderEnv::for_provider(provider);
            let missing: Vec<&'static str> = spec
                .required
                .iter()
                .copied()
                .filter(|key| get(key).is_none())
                .collect();
            if !missing.is_empty() {
                tracing::debug!(%provider, ?missing, "destination disabled");
                set.disabled.push(DisabledDestination { provider, missing });
                continue;
            }

            let access_key_id = get(spec.access_key).unwrap_or_default();
            let secret_access_key = get(spec.secret_key).unwrap_or_default();
            let bucket = get(spec.bucket).unwrap_or_else(|| spec.default_bucket.to_string());

            let destination = match provider {
                Provider::R2 => {
                    let account = get("R2_ACCOUNT_ID").unwrap_or_default();
                    Destination {
                        provider,
                        bucket,
                        endpoint: format!("https://{}.r2.cloudflarestorage.com", account),
                        region: "auto".to_string(),
                        access_key_id,
                        secret_access_key,
                        force_path_style: false,
                        size_limit: Some(r2_size_limit),
                        oci_namespace: None,
                    }
                }
                Provider::Impossible => Destination {
                    provider,
                    bucket,
                    endpoint: "https://eu-central-2.storage.impossibleapi.net".to_string(),
                    region: "eu-central-2".to_string(),
                    access_key_id,
                    secret_access_key,
                    force_path_style: false,
                    size_limit: None,
                    oci_namespace: None,
                },
                Provider::Wasabi => Destination {
                    provider,
                    bucket,
                    endpoint: "https://s3.ap-northeast-1.wasabisys.com".to_string(),
                    region: "ap-northeast-1".to_string(),
                    access_key_id,
                    secret_access_key,
                    force_path_style: false,
                    size_limit: None,
                    oci_namespace: None,
                },
                Provider::Oracle => {
                    let namespace = get("OCI_NAMESPACE").unwrap_or_default();
                    let region = get("OCI_REGION").unwrap_or_else(|| "ap-hyderabad-1".to_string());
                    Destination {
                        provider,
                        bucket,
                        endpoint: format!(
                            "https://{}.compat.objectstorage.{}.oraclecloud.com",
                            namespace, region
                        ),
                        region,
                        access_key_id,
                        secret_access_key,
                        force_path_style: true,
                        size_limit: None,
                        oci_namespace: Some(namespace),
                    }
                }
            };
            set.enabled.push(destination);
        }

        set
    }

    pub fn get(&self, provider: Provider) -> Option<&Destination> {
        self.enabled.iter().find(|d| d.provider == provider)
    }

    pub fn is_enabled(&self, provider: Provider) -> bool {
        self.get(provider).is_some()
    }

    pub fn enabled(&self) -> &[Destination] {
        &self.enabled
    }

    pub fn disabled(&self) -> &[DisabledDestination] {
        &self.disabled
    }
}

/// Environment variable names for one provider.
struct ProviderEnv {
    required: &'static [&'static str],
    access_key: &'static str,
    secret_key: &'static str,
    bucket: &'static str,
    default_bucket: &'static str,
}

impl ProviderEnv {
    fn for_provider(provider: Provider) -> Self {
        match provider {
            Provider::R2 => ProviderEnv {
                required: &["R2_ACCOUNT_ID", "R2_ACCESS_KEY_ID", "R2_SECRET_ACCESS_KEY"],
                access_key: "R2_ACCESS_KEY_ID",
                secret_key: "R2_SECRET_ACCESS_KEY",
                bucket: "R2_BUCKET_NAME",
                default_bucket: "r2-default-bucket",
            },
            Provider::Impossible => ProviderEnv {
                required: &["IMPOSSIBLE_ACCESS_KEY_ID", "IMPOSSIBLE_SECRET_ACCESS_KEY"],
                access_key: "IMPOSSIBLE_ACCESS_KEY_ID",
                secret_key: "IMPOSSIBLE_SECRET_ACCESS_KEY",
                bucket: "IMPOSSIBLE_BUCKET_NAME",
                default_bucket: "impossible-default-bucket",
            },
            Provider::Wasabi => ProviderEnv {
                required: &["WASABI_ACCESS_KEY_ID", "WASABI_SECRET_ACCESS_KEY"],
                access_key: "WASABI_ACCESS_KEY_ID",
                secret_key: "WASABI_SECRET_ACCESS_KEY",
                bucket: "WASABI_BUCKET_NAME",
                default_bucket: "wasabi-default-bucket",
            },
            Provider::Oracle => ProviderEnv {
                required: &["OCI_NAMESPACE", "OCI_ACCESS_KEY_ID", "OCI_SECRET_ACCESS_KEY"],
                access_key: "OCI_ACCESS_KEY_ID",
                secret_key: "OCI_SECRET_ACCESS_KEY",
                bucket: "OCI_BUCKET_NAME",
                default_bucket: "oci-default-bucket",
            },
        }
    }
}
