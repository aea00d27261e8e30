use http::Uri;
use k8s_openapi::api::admissionregistration::v1::{ServiceReference, WebhookClientConfig};
use k8s_openapi::ByteString;

use super::{Error, GeneratorOptions};

impl GeneratorOptions {
    /// Client config the API server uses to reach the webhook served at `path`.
    ///
    /// `ca_bundle` is left empty; the certificate provisioner fills it in.
    pub fn build_client_config(&self, path: &str) -> Result<WebhookClientConfig, Error> {
        let mut config = WebhookClientConfig {
            ca_bundle: Some(ByteString(Vec::new())),
            ..Default::default()
        };

        match (&self.host, &self.service) {
            (Some(_), Some(_)) => return Err(Error::ConflictingClientTarget),
            (Some(host), None) => {
                config.url = Some(webhook_url(host, self.port, path)?);
            }
            (None, Some(service)) => {
                config.service = Some(ServiceReference {
                    name: service.name.clone(),
                    namespace: service.namespace.clone(),
                    path: Some(path.to_string()),
                    // the API server defaults to 443, which the Service maps
                    port: None,
                });
            }
            (None, None) => {}
        }

        Ok(config)
    }
}

fn webhook_url(host: &str, port: i32, path: &str) -> Result<String, Error> {
    let authority = join_host_port(host, port);
    let path = escape_path(path);

    let uri = Uri::builder()
        .scheme("https")
        .authority(authority.as_str())
        .path_and_query(path.as_str())
        .build()?;
    Ok(uri.to_string())
}

/// Percent-encodes each segment so `?` and `#` stay part of the path.
fn escape_path(path: &str) -> String {
    let escaped = path
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/");
    if escaped.starts_with('/') {
        escaped
    } else {
        format!("/{}", escaped)
    }
}

// IPv6 literals need brackets
fn join_host_port(host: &str, port: i32) -> String {
    if host.contains(':') {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    }
}
