use std::fs;
use std::path::{Path, PathBuf};

use k8s_openapi::api::admissionregistration::v1::RuleWithOperations;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use serde::Deserialize;
use tracing::info;

use crate::generator::{Error, GeneratorOptions, SecretRef, ServiceTarget};
use crate::webhook::{
    FailurePolicy, Registry, SideEffectClass, WebhookDescriptor, WebhookKind,
};

/// Manifest file describing the webhook server and the webhooks it serves.
/// Read as YAML, which also accepts JSON.
#[derive(Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    #[serde(default)]
    pub port: i32,
    #[serde(default)]
    pub cert_dir: Option<PathBuf>,
    #[serde(default)]
    pub mutating_config_name: Option<String>,
    #[serde(default)]
    pub validating_config_name: Option<String>,
    #[serde(default)]
    pub secret: Option<SecretRef>,
    #[serde(default)]
    pub service: Option<ServiceTarget>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub webhooks: Vec<WebhookSpec>,
}

#[derive(Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct WebhookSpec {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub kind: Option<WebhookKind>,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub rules: Vec<RuleWithOperations>,
    #[serde(default)]
    pub failure_policy: Option<FailurePolicy>,
    #[serde(default)]
    pub namespace_selector: Option<LabelSelector>,
    #[serde(default)]
    pub side_effects: SideEffectClass,
    #[serde(default)]
    pub admission_review_versions: Vec<String>,
    #[serde(default)]
    pub timeout_seconds: Option<i32>,
}

impl From<WebhookSpec> for WebhookDescriptor {
    fn from(spec: WebhookSpec) -> WebhookDescriptor {
        let mut webhook = WebhookDescriptor::default()
            .with_kind(spec.kind)
            .with_name(spec.name)
            .with_path(spec.path)
            .with_rules(spec.rules)
            .with_side_effects(spec.side_effects)
            .with_admission_review_versions(spec.admission_review_versions);
        if let Some(policy) = spec.failure_policy {
            webhook = webhook.with_failure_policy(policy);
        }
        if let Some(selector) = spec.namespace_selector {
            webhook = webhook.with_namespace_selector(selector);
        }
        if let Some(timeout) = spec.timeout_seconds {
            webhook = webhook.with_timeout_seconds(timeout);
        }
        webhook
    }
}

impl Manifest {
    pub fn from_path(path: &Path) -> Result<Manifest, Error> {
        info!("Reading manifest {}", path.display());
        let raw = fs::read_to_string(path)?;
        Manifest::parse(&raw)
    }

    pub fn parse(raw: &str) -> Result<Manifest, Error> {
        Ok(serde_yaml::from_str(raw)?)
    }

    /// Registry keys come from each webhook's defaulted path. A webhook without
    /// one can't be keyed and is rejected with the check it fails.
    pub fn into_options(self) -> Result<GeneratorOptions, Error> {
        let mut registry = Registry::new();
        for spec in self.webhooks {
            let webhook = WebhookDescriptor::from(spec);
            if webhook.path().is_empty() {
                webhook.validate()?;
            }
            registry.register(webhook)?;
        }

        Ok(GeneratorOptions {
            registry,
            port: self.port,
            cert_dir: self.cert_dir.unwrap_or_default(),
            mutating_config_name: self.mutating_config_name.unwrap_or_default(),
            validating_config_name: self.validating_config_name.unwrap_or_default(),
            secret: self.secret,
            service: self.service,
            host: self.host,
        })
    }
}
