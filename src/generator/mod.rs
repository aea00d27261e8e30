use std::collections::BTreeMap;
use std::path::PathBuf;

use k8s_openapi::api::admissionregistration::v1::{
    MutatingWebhookConfiguration, ValidatingWebhookConfiguration,
};
use k8s_openapi::api::core::v1::Service;
use kube::ResourceExt;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::webhook::{DescriptorError, Registry};

mod client_config;
mod service;
mod webhooks;

pub const DEFAULT_PORT: i32 = 443;
pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_MUTATING_CONFIG_NAME: &str = "mutating-webhook-configuration";
pub const DEFAULT_VALIDATING_CONFIG_NAME: &str = "validating-webhook-configuration";
/// Secret name used in the cert annotations when no secret is configured.
pub const DEFAULT_CERT_SECRET_NAME: &str = "webhook-cert";

#[derive(Debug, Error)]
pub enum Error {
    #[error("InvalidDescriptor: {0}")]
    InvalidDescriptor(#[from] DescriptorError),
    #[error("ConflictingClientTarget: host and service can't be set at the same time")]
    ConflictingClientTarget,
    #[error("UnableToBuildUrl: {0}")]
    UnableToBuildUrl(#[from] http::Error),
    #[error("DuplicatePath: {0}")]
    DuplicatePath(String),
    #[error("UnableToReadManifest: {0}")]
    UnableToReadManifest(#[from] std::io::Error),
    #[error("UnableToParseManifest: {0}")]
    UnableToParseManifest(#[from] serde_yaml::Error),
    #[error("UnableToRenderYaml: {0}")]
    UnableToRenderYaml(serde_yaml::Error),
    #[error("UnableToSerializeObject: {0}")]
    UnableToSerializeObject(#[from] serde_json::Error),
}

/// Location of the secret holding the serving certificate.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Debug, Default)]
pub struct SecretRef {
    pub name: String,
    #[serde(default)]
    pub namespace: String,
}

/// The Service fronting the webhook server pods.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Debug, Default)]
pub struct ServiceTarget {
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    /// Must select the pods running the webhook server.
    #[serde(default)]
    pub selector: BTreeMap<String, String>,
}

/// Global settings plus the registry of webhooks to generate configurations
/// for.
///
/// One and only one of `service` and `host` may be set. When neither is,
/// `host` defaults to `localhost`.
#[derive(Clone, Debug, Default)]
pub struct GeneratorOptions {
    pub registry: Registry,
    /// Port the webhook server listens on.
    pub port: i32,
    /// Directory holding the server key and certificate.
    pub cert_dir: PathBuf,
    pub mutating_config_name: String,
    pub validating_config_name: String,
    pub secret: Option<SecretRef>,
    pub service: Option<ServiceTarget>,
    pub host: Option<String>,
}

/// An object produced by [`GeneratorOptions::generate`].
#[derive(Serialize, Clone, Debug)]
#[serde(untagged)]
pub enum GeneratedObject {
    Mutating(MutatingWebhookConfiguration),
    Validating(ValidatingWebhookConfiguration),
    Service(Service),
}

impl GeneratedObject {
    pub fn name(&self) -> String {
        match self {
            GeneratedObject::Mutating(m) => m.name_any(),
            GeneratedObject::Validating(v) => v.name_any(),
            GeneratedObject::Service(s) => s.name_any(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            GeneratedObject::Mutating(_) => "MutatingWebhookConfiguration",
            GeneratedObject::Validating(_) => "ValidatingWebhookConfiguration",
            GeneratedObject::Service(_) => "Service",
        }
    }
}

impl GeneratorOptions {
    pub fn set_defaults(&mut self) {
        if self.port <= 0 {
            self.port = DEFAULT_PORT;
        }
        if self.cert_dir.as_os_str().is_empty() {
            self.cert_dir = PathBuf::from("k8s-webhook-server").join("cert");
        }
        if self.mutating_config_name.is_empty() {
            self.mutating_config_name = DEFAULT_MUTATING_CONFIG_NAME.to_string();
        }
        if self.validating_config_name.is_empty() {
            self.validating_config_name = DEFAULT_VALIDATING_CONFIG_NAME.to_string();
        }
        if self.host.is_none() && self.service.is_none() {
            self.host = Some(DEFAULT_HOST.to_string());
        }
    }

    /// Builds the webhook configurations and the Service, in that order.
    ///
    /// Either every object is returned or none is: the first invalid
    /// descriptor or client config error aborts generation.
    pub fn generate(&mut self) -> Result<Vec<GeneratedObject>, Error> {
        self.set_defaults();
        info!(
            "Generating webhook configurations for {} webhooks",
            self.registry.len()
        );

        for (path, webhook) in self.registry.iter() {
            if let Err(e) = webhook.validate() {
                warn!("Webhook registered at {:?} is invalid: {}", path, e);
                return Err(e);
            }
        }

        let mut objects = Vec::new();
        if let Some(mutating) = self.mutating_configuration()? {
            objects.push(GeneratedObject::Mutating(mutating));
        }
        if let Some(validating) = self.validating_configuration()? {
            objects.push(GeneratedObject::Validating(validating));
        }
        if let Some(service) = self.service_object() {
            objects.push(GeneratedObject::Service(service));
        }

        for object in &objects {
            debug!("Generated {} {}", object.kind(), object.name());
        }
        Ok(objects)
    }

    fn cert_secret_name(&self) -> String {
        match &self.secret {
            Some(secret) if !secret.name.is_empty() => secret.name.clone(),
            _ => DEFAULT_CERT_SECRET_NAME.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::webhook::{rule, WebhookDescriptor};

    fn service_target() -> ServiceTarget {
        ServiceTarget {
            name: "webhook-service".into(),
            namespace: "system".into(),
            selector: BTreeMap::from([("app".to_string(), "webhook-server".to_string())]),
        }
    }

    #[test]
    fn set_defaults_fills_every_option() {
        let mut options = GeneratorOptions::default();
        options.set_defaults();
        assert_eq!(options.port, 443);
        assert_eq!(options.cert_dir, PathBuf::from("k8s-webhook-server/cert"));
        assert_eq!(options.mutating_config_name, "mutating-webhook-configuration");
        assert_eq!(
            options.validating_config_name,
            "validating-webhook-configuration"
        );
        assert_eq!(options.host.as_deref(), Some("localhost"));
        assert!(options.registry.is_empty());
    }

    #[test]
    fn set_defaults_keeps_explicit_values() {
        let mut options = GeneratorOptions {
            port: 9443,
            cert_dir: PathBuf::from("/tmp/cert"),
            mutating_config_name: "m".into(),
            validating_config_name: "v".into(),
            service: Some(service_target()),
            ..Default::default()
        };
        options.set_defaults();
        options.set_defaults();
        assert_eq!(options.port, 9443);
        assert_eq!(options.cert_dir, PathBuf::from("/tmp/cert"));
        assert_eq!(options.mutating_config_name, "m");
        assert_eq!(options.validating_config_name, "v");
        assert!(options.host.is_none());
    }

    #[test]
    fn negative_port_is_defaulted() {
        let mut options = GeneratorOptions {
            port: -1,
            ..Default::default()
        };
        options.set_defaults();
        assert_eq!(options.port, 443);
    }

    #[test]
    fn empty_registry_without_service_generates_nothing() {
        let mut options = GeneratorOptions::default();
        assert!(options.generate().unwrap().is_empty());
    }

    #[test]
    fn empty_registry_with_service_generates_only_the_service() {
        let mut options = GeneratorOptions {
            service: Some(service_target()),
            ..Default::default()
        };
        let objects = options.generate().unwrap();
        assert_eq!(objects.len(), 1);
        assert!(matches!(&objects[0], GeneratedObject::Service(s) if s.name_any() == "webhook-service"));
    }

    #[test]
    fn generates_one_configuration_per_kind() {
        let mut options = GeneratorOptions::default();
        options
            .registry
            .register(WebhookDescriptor::mutating().with_rule(rule(&["pods"])))
            .unwrap();
        options
            .registry
            .register(WebhookDescriptor::validating().with_rule(rule(&["pods"])))
            .unwrap();

        let objects = options.generate().unwrap();
        assert_eq!(objects.len(), 2);
        match (&objects[0], &objects[1]) {
            (GeneratedObject::Mutating(m), GeneratedObject::Validating(v)) => {
                assert_eq!(m.webhooks.as_ref().unwrap().len(), 1);
                assert_eq!(v.webhooks.as_ref().unwrap().len(), 1);
                assert_eq!(m.name_any(), "mutating-webhook-configuration");
                assert_eq!(v.name_any(), "validating-webhook-configuration");
            }
            other => panic!("unexpected objects: {:?}", other),
        }
    }

    #[test]
    fn objects_come_in_fixed_order() {
        let mut options = GeneratorOptions {
            service: Some(service_target()),
            ..Default::default()
        };
        options
            .registry
            .register(WebhookDescriptor::validating().with_rule(rule(&["pods"])))
            .unwrap();
        options
            .registry
            .register(WebhookDescriptor::mutating().with_rule(rule(&["pods"])))
            .unwrap();

        let kinds: Vec<&str> = options
            .generate()
            .unwrap()
            .iter()
            .map(GeneratedObject::kind)
            .collect();
        assert_eq!(
            kinds,
            vec![
                "MutatingWebhookConfiguration",
                "ValidatingWebhookConfiguration",
                "Service"
            ]
        );
    }

    #[test]
    fn invalid_descriptor_aborts_generation() {
        let mut options = GeneratorOptions::default();
        options
            .registry
            .register(WebhookDescriptor::mutating().with_rule(rule(&["pods"])))
            .unwrap();
        options
            .registry
            .insert("/broken", WebhookDescriptor::validating().with_path("/broken"));

        assert!(matches!(
            options.generate(),
            Err(Error::InvalidDescriptor(DescriptorError::EmptyRules))
        ));
    }

    #[test]
    fn host_and_service_conflict_at_generation() {
        let mut options = GeneratorOptions {
            host: Some("localhost".into()),
            service: Some(service_target()),
            ..Default::default()
        };
        options
            .registry
            .register(WebhookDescriptor::mutating().with_rule(rule(&["pods"])))
            .unwrap();
        assert!(matches!(
            options.generate(),
            Err(Error::ConflictingClientTarget)
        ));
    }

    #[test]
    fn cert_secret_name_follows_secret() {
        let mut options = GeneratorOptions::default();
        assert_eq!(options.cert_secret_name(), "webhook-cert");
        options.secret = Some(SecretRef {
            name: "serving-cert".into(),
            namespace: "system".into(),
        });
        assert_eq!(options.cert_secret_name(), "serving-cert");
    }
}
