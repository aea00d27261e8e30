//! Generates the admission webhook configurations (and the optional fronting
//! Service) for a registry of webhook endpoints.

pub mod config;
pub mod generator;
pub mod output;
pub mod webhook;

pub use generator::{Error, GeneratedObject, GeneratorOptions, SecretRef, ServiceTarget};
pub use webhook::{
    DescriptorError, FailurePolicy, Registry, SideEffectClass, WebhookDescriptor, WebhookKind,
};
