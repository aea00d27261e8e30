use std::collections::hash_map::{Entry, HashMap};
use std::fmt;
use std::sync::OnceLock;

use k8s_openapi::api::admissionregistration::v1::RuleWithOperations;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::generator::Error;

/// Suffix appended to names derived from a webhook path.
pub const NAME_SUFFIX: &str = ".example.com";

const DEFAULT_ADMISSION_REVIEW_VERSION: &str = "v1";

#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum WebhookKind {
    #[serde(alias = "mutating")]
    Mutating,
    #[serde(alias = "validating")]
    Validating,
}

impl WebhookKind {
    fn path_prefix(&self) -> &'static str {
        match self {
            WebhookKind::Mutating => "/mutate-",
            WebhookKind::Validating => "/validate-",
        }
    }
}

impl fmt::Display for WebhookKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let kind = match self {
            WebhookKind::Mutating => "Mutating",
            WebhookKind::Validating => "Validating",
        };
        write!(f, "{}", kind)
    }
}

/// Whether the API server admits (`Ignore`) or rejects (`Fail`) a request
/// when the webhook cannot be reached.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug)]
pub enum FailurePolicy {
    Ignore,
    Fail,
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let policy = match self {
            FailurePolicy::Ignore => "Ignore",
            FailurePolicy::Fail => "Fail",
        };
        write!(f, "{}", policy)
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum SideEffectClass {
    #[default]
    None,
    NoneOnDryRun,
}

impl fmt::Display for SideEffectClass {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let class = match self {
            SideEffectClass::None => "None",
            SideEffectClass::NoneOnDryRun => "NoneOnDryRun",
        };
        write!(f, "{}", class)
    }
}

/// The validation check a [`WebhookDescriptor`] failed.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorError {
    #[error("field rules should not be empty")]
    EmptyRules,
    #[error("field name should not be empty")]
    EmptyName,
    #[error("unsupported kind, only Mutating and Validating are supported")]
    UnsupportedKind,
    #[error("field path should not be empty")]
    EmptyPath,
}

#[derive(Clone, Debug)]
struct Defaults {
    name: String,
    path: String,
}

/// One admission webhook endpoint.
///
/// Name and path may be left empty; they are filled in the first time any
/// accessor (or [`WebhookDescriptor::set_defaults`]) runs and never change
/// afterwards. The guard is a [`OnceLock`], so concurrent first access from
/// several registry consumers still defaults exactly once.
#[derive(Clone, Debug, Default)]
pub struct WebhookDescriptor {
    name: String,
    kind: Option<WebhookKind>,
    path: String,
    rules: Vec<RuleWithOperations>,
    failure_policy: Option<FailurePolicy>,
    namespace_selector: Option<LabelSelector>,
    side_effects: SideEffectClass,
    admission_review_versions: Vec<String>,
    timeout_seconds: Option<i32>,
    defaults: OnceLock<Defaults>,
}

impl WebhookDescriptor {
    pub fn new(kind: WebhookKind) -> WebhookDescriptor {
        WebhookDescriptor {
            kind: Some(kind),
            ..Default::default()
        }
    }

    pub fn mutating() -> WebhookDescriptor {
        WebhookDescriptor::new(WebhookKind::Mutating)
    }

    pub fn validating() -> WebhookDescriptor {
        WebhookDescriptor::new(WebhookKind::Validating)
    }

    // Builders touching name, kind, path or rules reset the guard so defaults
    // follow the final values.
    fn rebuilt(self) -> WebhookDescriptor {
        WebhookDescriptor {
            defaults: OnceLock::new(),
            ..self
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> WebhookDescriptor {
        self.name = name.into();
        self.rebuilt()
    }

    pub fn with_kind(mut self, kind: Option<WebhookKind>) -> WebhookDescriptor {
        self.kind = kind;
        self.rebuilt()
    }

    pub fn with_path(mut self, path: impl Into<String>) -> WebhookDescriptor {
        self.path = path.into();
        self.rebuilt()
    }

    pub fn with_rule(mut self, rule: RuleWithOperations) -> WebhookDescriptor {
        self.rules.push(rule);
        self.rebuilt()
    }

    pub fn with_rules(mut self, rules: Vec<RuleWithOperations>) -> WebhookDescriptor {
        self.rules = rules;
        self.rebuilt()
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> WebhookDescriptor {
        self.failure_policy = Some(policy);
        self
    }

    pub fn with_namespace_selector(mut self, selector: LabelSelector) -> WebhookDescriptor {
        self.namespace_selector = Some(selector);
        self
    }

    pub fn with_side_effects(mut self, side_effects: SideEffectClass) -> WebhookDescriptor {
        self.side_effects = side_effects;
        self
    }

    pub fn with_admission_review_versions(mut self, versions: Vec<String>) -> WebhookDescriptor {
        self.admission_review_versions = versions;
        self
    }

    pub fn with_timeout_seconds(mut self, timeout: i32) -> WebhookDescriptor {
        self.timeout_seconds = Some(timeout);
        self
    }

    fn defaults(&self) -> &Defaults {
        self.defaults.get_or_init(|| {
            let path = if self.path.is_empty() {
                default_path(self.kind, &self.rules).unwrap_or_default()
            } else {
                self.path.clone()
            };
            let name = if self.name.is_empty() {
                name_from_path(&path)
            } else {
                self.name.clone()
            };
            Defaults { name, path }
        })
    }

    /// Fills in name and path. Only the first call does any work.
    pub fn set_defaults(&self) {
        self.defaults();
    }

    pub fn name(&self) -> &str {
        &self.defaults().name
    }

    pub fn path(&self) -> &str {
        &self.defaults().path
    }

    pub fn kind(&self) -> Option<WebhookKind> {
        self.defaults();
        self.kind
    }

    pub fn rules(&self) -> &[RuleWithOperations] {
        &self.rules
    }

    pub fn failure_policy(&self) -> Option<FailurePolicy> {
        self.failure_policy
    }

    pub fn namespace_selector(&self) -> Option<&LabelSelector> {
        self.namespace_selector.as_ref()
    }

    pub fn side_effects(&self) -> SideEffectClass {
        self.side_effects
    }

    pub fn admission_review_versions(&self) -> Vec<String> {
        if self.admission_review_versions.is_empty() {
            vec![DEFAULT_ADMISSION_REVIEW_VERSION.to_string()]
        } else {
            self.admission_review_versions.clone()
        }
    }

    pub fn timeout_seconds(&self) -> Option<i32> {
        self.timeout_seconds
    }

    pub fn validate(&self) -> Result<(), Error> {
        self.set_defaults();
        if self.rules.is_empty() {
            return Err(DescriptorError::EmptyRules.into());
        }
        if self.name().is_empty() {
            return Err(DescriptorError::EmptyName.into());
        }
        if self.kind.is_none() {
            return Err(DescriptorError::UnsupportedKind.into());
        }
        if self.path().is_empty() {
            return Err(DescriptorError::EmptyPath.into());
        }
        Ok(())
    }
}

/// `/mutate-<resource>` or `/validate-<resource>` from the first resource of
/// the first rule. `None` when there is nothing to derive from.
fn default_path(kind: Option<WebhookKind>, rules: &[RuleWithOperations]) -> Option<String> {
    let resource = rules.first()?.resources.as_ref()?.first()?;
    Some(format!("{}{}", kind?.path_prefix(), resource))
}

/// Lower-cased path with everything but ASCII alphanumerics stripped, plus
/// [`NAME_SUFFIX`].
pub fn name_from_path(path: &str) -> String {
    let mut name: String = path
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect();
    name.push_str(NAME_SUFFIX);
    name
}

/// Webhook descriptors keyed by the path they are served on.
///
/// Iteration order is unspecified; anything that needs a stable order must
/// sort what it collects.
#[derive(Clone, Debug, Default)]
pub struct Registry {
    webhooks: HashMap<String, WebhookDescriptor>,
}

impl Registry {
    pub fn new() -> Registry {
        Registry::default()
    }

    /// Defaults the descriptor and stores it under its path.
    pub fn register(&mut self, webhook: WebhookDescriptor) -> Result<(), Error> {
        let path = webhook.path().to_string();
        if path.is_empty() {
            return Err(DescriptorError::EmptyPath.into());
        }
        match self.webhooks.entry(path) {
            Entry::Occupied(e) => Err(Error::DuplicatePath(e.key().clone())),
            Entry::Vacant(e) => {
                e.insert(webhook);
                Ok(())
            }
        }
    }

    /// Stores the descriptor under an explicit path, replacing any previous one.
    pub fn insert(
        &mut self,
        path: impl Into<String>,
        webhook: WebhookDescriptor,
    ) -> Option<WebhookDescriptor> {
        self.webhooks.insert(path.into(), webhook)
    }

    pub fn get(&self, path: &str) -> Option<&WebhookDescriptor> {
        self.webhooks.get(path)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &WebhookDescriptor)> {
        self.webhooks.iter().map(|(path, webhook)| (path.as_str(), webhook))
    }

    pub fn len(&self) -> usize {
        self.webhooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.webhooks.is_empty()
    }
}

#[cfg(test)]
pub(crate) fn rule(resources: &[&str]) -> RuleWithOperations {
    RuleWithOperations {
        api_groups: Some(vec!["".to_string()]),
        api_versions: Some(vec!["v1".to_string()]),
        operations: Some(vec!["CREATE".to_string(), "UPDATE".to_string()]),
        resources: Some(resources.iter().map(|r| r.to_string()).collect()),
        scope: None,
    }
}
