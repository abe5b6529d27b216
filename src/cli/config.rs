//! `config` command.

use super::{OutputFormat, output_error, write_json};
use crate::Result;
use crate::config::KeepsetConfig;
use crate::models::{RetentionPolicy, TypeName};
use crate::storage::TypeSchema;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;

#[derive(Serialize)]
#[serde(untagged)]
enum ResolvedPolicy {
    Ok(RetentionPolicy),
    Err { error: String },
}

#[derive(Serialize)]
struct ConfigReport {
    database: PathBuf,
    base_type: TypeName,
    vacuum_tables: bool,
    policies: BTreeMap<TypeName, ResolvedPolicy>,
}

fn build_report(config: &KeepsetConfig, schema: &TypeSchema) -> ConfigReport {
    let policies = schema
        .descendants_or_self(schema.base())
        .into_iter()
        .map(|name| {
            let resolved = schema
                .ancestry(&name)
                .and_then(|ancestry| config.resolve_policy(&ancestry))
                .map_or_else(
                    |e| ResolvedPolicy::Err {
                        error: e.to_string(),
                    },
                    ResolvedPolicy::Ok,
                );
            (name, resolved)
        })
        .collect();

    ConfigReport {
        database: config.database.clone(),
        base_type: config.base_type.clone(),
        vacuum_tables: config.vacuum_tables,
        policies,
    }
}

/// Shows the effective configuration and the policy each registered type
/// resolves to.
///
/// Returns `false` if any type's policy failed to resolve.
///
/// # Errors
///
/// Returns an error if output fails.
pub fn cmd_config<W: Write>(
    config: &KeepsetConfig,
    schema: &TypeSchema,
    format: OutputFormat,
    writer: &mut W,
) -> Result<bool> {
    let report = build_report(config, schema);
    let all_ok = report
        .policies
        .values()
        .all(|p| matches!(p, ResolvedPolicy::Ok(_)));

    if format == OutputFormat::Json {
        write_json(writer, &report)?;
        return Ok(all_ok);
    }

    writeln!(writer, "Database:      {}", report.database.display()).map_err(output_error)?;
    writeln!(writer, "Base type:     {}", report.base_type).map_err(output_error)?;
    writeln!(writer, "Vacuum tables: {}", report.vacuum_tables).map_err(output_error)?;
    writeln!(writer).map_err(output_error)?;
    writeln!(
        writer,
        "{:<24}{:<10}{:<10}{:<11}OLD TYPES",
        "TYPE", "VERSIONS", "DRAFTS", "REDIRECTS"
    )
    .map_err(output_error)?;
    for (name, resolved) in &report.policies {
        let written = match resolved {
            ResolvedPolicy::Ok(policy) => writeln!(
                writer,
                "{:<24}{:<10}{:<10}{:<11}{}",
                name.as_str(),
                policy.keep_versions.to_string(),
                policy.keep_drafts.to_string(),
                policy.keep_redirects,
                policy.keep_old_types
            ),
            ResolvedPolicy::Err { error } => writeln!(writer, "{:<24}error: {error}", name.as_str()),
        };
        written.map_err(output_error)?;
    }
    Ok(all_ok)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PolicyOverride, RetentionSettings, SettingValue};

    fn schema() -> TypeSchema {
        let mut schema = TypeSchema::new(TypeName::from("Page")).unwrap();
        schema
            .register(TypeName::from("BlogPost"), &TypeName::from("Page"))
            .unwrap();
        schema
    }

    #[test]
    fn test_cmd_config_text() {
        let retention = RetentionSettings::default().with_type(
            TypeName::from("BlogPost"),
            PolicyOverride {
                keep_versions: Some(SettingValue::Int(3)),
                ..PolicyOverride::default()
            },
        );
        let config = KeepsetConfig::new()
            .with_database("/tmp/k.db")
            .with_retention(retention);
        let mut out = Vec::new();

        let ok = cmd_config(&config, &schema(), OutputFormat::Text, &mut out).unwrap();

        assert!(ok);
        let out = String::from_utf8(out).unwrap();
        assert!(out.contains("Database:      /tmp/k.db"));
        assert!(out.contains(&format!("{:<24}{:<10}{:<10}{:<11}false", "BlogPost", "3", "5", "true")));
        assert!(out.contains(&format!("{:<24}{:<10}{:<10}{:<11}false", "Page", "10", "5", "true")));
    }

    #[test]
    fn test_cmd_config_reports_bad_override() {
        let retention = RetentionSettings::default().with_type(
            TypeName::from("BlogPost"),
            PolicyOverride {
                keep_drafts: Some(SettingValue::Text("lots".to_string())),
                ..PolicyOverride::default()
            },
        );
        let config = KeepsetConfig::new().with_retention(retention);
        let mut out = Vec::new();

        let ok = cmd_config(&config, &schema(), OutputFormat::Json, &mut out).unwrap();

        assert!(!ok);
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert!(value["policies"]["BlogPost"]["error"].is_string());
        assert_eq!(value["policies"]["Page"]["keep_versions"]["keep"], 10);
    }
}
