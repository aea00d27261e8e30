use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::core::ObjectMeta;

use super::GeneratorOptions;

const SERVING_CERT_ANNOTATION: &str = "service.alpha.kubebuilder.io/serving-cert-secret-name";
/// The API server always sends admission requests to 443 on a Service.
const SERVICE_PORT: i32 = 443;

impl GeneratorOptions {
    /// Service fronting the webhook server, if one is configured.
    pub(crate) fn service_object(&self) -> Option<Service> {
        let service = self.service.as_ref()?;

        let mut annotations: BTreeMap<String, String> = BTreeMap::new();
        annotations.insert(SERVING_CERT_ANNOTATION.into(), self.cert_secret_name());

        Some(Service {
            metadata: ObjectMeta {
                name: Some(service.name.clone()),
                namespace: if service.namespace.is_empty() {
                    None
                } else {
                    Some(service.namespace.clone())
                },
                annotations: Some(annotations),
                ..Default::default()
            },
            spec: Some(ServiceSpec {
                selector: Some(service.selector.clone()),
                ports: Some(vec![ServicePort {
                    protocol: Some("TCP".into()),
                    port: SERVICE_PORT,
                    target_port: Some(IntOrString::Int(self.port)),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        })
    }
}
