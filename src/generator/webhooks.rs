use std::collections::BTreeMap;

use k8s_openapi::api::admissionregistration::v1::{
    MutatingWebhook, MutatingWebhookConfiguration, RuleWithOperations, ValidatingWebhook,
    ValidatingWebhookConfiguration, WebhookClientConfig,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, LabelSelectorRequirement};
use kube::core::ObjectMeta;
use tracing::debug;

use super::{Error, GeneratorOptions};
use crate::webhook::{WebhookDescriptor, WebhookKind};

const MUTATING_CA_SECRET_ANNOTATION: &str = "admissionwebhook.alpha.kubebuilder.io/ca-secret-name";
const VALIDATING_CA_SECRET_ANNOTATION: &str = "admission.alpha.kubebuilder.io/ca-secret-name";
const CONTROL_PLANE_LABEL: &str = "control-plane";

/// A webhook entry before it is turned into the kind specific type.
struct Entry {
    path: String,
    name: String,
    client_config: WebhookClientConfig,
    rules: Vec<RuleWithOperations>,
    failure_policy: Option<String>,
    namespace_selector: Option<LabelSelector>,
    side_effects: String,
    admission_review_versions: Vec<String>,
    timeout_seconds: Option<i32>,
}

impl Entry {
    fn into_mutating(self) -> MutatingWebhook {
        MutatingWebhook {
            name: self.name,
            client_config: self.client_config,
            rules: Some(self.rules),
            failure_policy: self.failure_policy,
            namespace_selector: self.namespace_selector,
            side_effects: self.side_effects,
            admission_review_versions: self.admission_review_versions,
            timeout_seconds: self.timeout_seconds,
            ..Default::default()
        }
    }

    fn into_validating(self) -> ValidatingWebhook {
        ValidatingWebhook {
            name: self.name,
            client_config: self.client_config,
            rules: Some(self.rules),
            failure_policy: self.failure_policy,
            namespace_selector: self.namespace_selector,
            side_effects: self.side_effects,
            admission_review_versions: self.admission_review_versions,
            timeout_seconds: self.timeout_seconds,
            ..Default::default()
        }
    }
}

/// Keeps webhooks away from objects in namespaces labeled `control-plane`.
pub fn exclude_control_plane() -> LabelSelector {
    LabelSelector {
        match_expressions: Some(vec![LabelSelectorRequirement {
            key: CONTROL_PLANE_LABEL.to_string(),
            operator: "DoesNotExist".to_string(),
            values: None,
        }]),
        ..Default::default()
    }
}

impl GeneratorOptions {
    pub(crate) fn mutating_configuration(
        &self,
    ) -> Result<Option<MutatingWebhookConfiguration>, Error> {
        let webhooks: Vec<MutatingWebhook> = self
            .entries(WebhookKind::Mutating)?
            .into_iter()
            .map(Entry::into_mutating)
            .collect();
        if webhooks.is_empty() {
            return Ok(None);
        }

        Ok(Some(MutatingWebhookConfiguration {
            metadata: self.configuration_meta(
                &self.mutating_config_name,
                MUTATING_CA_SECRET_ANNOTATION,
            ),
            webhooks: Some(webhooks),
        }))
    }

    pub(crate) fn validating_configuration(
        &self,
    ) -> Result<Option<ValidatingWebhookConfiguration>, Error> {
        let webhooks: Vec<ValidatingWebhook> = self
            .entries(WebhookKind::Validating)?
            .into_iter()
            .map(Entry::into_validating)
            .collect();
        if webhooks.is_empty() {
            return Ok(None);
        }

        Ok(Some(ValidatingWebhookConfiguration {
            metadata: self.configuration_meta(
                &self.validating_config_name,
                VALIDATING_CA_SECRET_ANNOTATION,
            ),
            webhooks: Some(webhooks),
        }))
    }

    fn configuration_meta(&self, name: &str, annotation: &str) -> ObjectMeta {
        let mut annotations: BTreeMap<String, String> = BTreeMap::new();
        annotations.insert(annotation.to_string(), self.cert_secret_name());

        ObjectMeta {
            name: Some(name.to_string()),
            annotations: Some(annotations),
            ..Default::default()
        }
    }

    /// Every registered webhook of `kind`, sorted by name. The registry has no
    /// order of its own, so the sort is what makes the output stable.
    fn entries(&self, kind: WebhookKind) -> Result<Vec<Entry>, Error> {
        let mut entries = Vec::new();
        for (path, webhook) in self.registry.iter() {
            if webhook.kind() != Some(kind) {
                continue;
            }
            debug!("Building {} webhook {} for {}", kind, webhook.name(), path);
            entries.push(self.entry(path, webhook)?);
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.path.cmp(&b.path)));
        Ok(entries)
    }

    fn entry(&self, path: &str, webhook: &WebhookDescriptor) -> Result<Entry, Error> {
        Ok(Entry {
            path: path.to_string(),
            name: webhook.name().to_string(),
            client_config: self.build_client_config(path)?,
            rules: webhook.rules().to_vec(),
            failure_policy: webhook.failure_policy().map(|p| p.to_string()),
            namespace_selector: self.namespace_selector(webhook),
            side_effects: webhook.side_effects().to_string(),
            admission_review_versions: webhook.admission_review_versions(),
            timeout_seconds: webhook.timeout_seconds(),
        })
    }

    fn namespace_selector(&self, webhook: &WebhookDescriptor) -> Option<LabelSelector> {
        if let Some(selector) = webhook.namespace_selector() {
            return Some(selector.clone());
        }
        match &self.service {
            Some(service) if !service.namespace.is_empty() => Some(exclude_control_plane()),
            _ => None,
        }
    }
}
