use clap::ValueEnum;
use serde_json::json;

use crate::generator::{Error, GeneratedObject};

#[derive(ValueEnum, Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum OutputFormat {
    /// Multi-document YAML stream
    #[default]
    Yaml,
    /// A single `v1/List`
    Json,
}

pub fn render(objects: &[GeneratedObject], format: OutputFormat) -> Result<String, Error> {
    match format {
        OutputFormat::Yaml => to_yaml(objects),
        OutputFormat::Json => to_json(objects),
    }
}

pub fn to_yaml(objects: &[GeneratedObject]) -> Result<String, Error> {
    let mut out = String::new();
    for object in objects {
        out.push_str("---\n");
        out.push_str(&serde_yaml::to_string(object).map_err(Error::UnableToRenderYaml)?);
    }
    Ok(out)
}

pub fn to_json(objects: &[GeneratedObject]) -> Result<String, Error> {
    let list = json!({
        "apiVersion": "v1",
        "kind": "List",
        "items": objects,
    });
    let mut out = serde_json::to_string_pretty(&list)?;
    out.push('\n');
    Ok(out)
}
