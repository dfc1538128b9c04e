//! `ptemplate check <template>` — list the markers and field references of a template.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;

use ptemplate_core::{Document, MarkerKind};
use ptemplate_renderer::config::{DEFAULT_LDELIM, DEFAULT_RDELIM};
use ptemplate_renderer::segments::{self, Segment};

use super::read_template;

/// Arguments for `ptemplate check`.
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Template file holding an HTML fragment.
    pub template: PathBuf,

    /// Left field delimiter.
    #[arg(long, default_value = DEFAULT_LDELIM)]
    pub ldelim: String,

    /// Right field delimiter.
    #[arg(long, default_value = DEFAULT_RDELIM)]
    pub rdelim: String,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct Report {
    markers: Vec<MarkerEntry>,
    fields: Vec<String>,
}

#[derive(Debug, Serialize)]
struct MarkerEntry {
    node: usize,
    kind: MarkerKind,
    value: String,
}

impl CheckArgs {
    pub fn run(self) -> Result<()> {
        let source = read_template(&self.template)?;
        let doc = Document::parse(&source)
            .with_context(|| format!("failed to parse template {}", self.template.display()))?;
        let report = build_report(&doc, &self.ldelim, &self.rdelim);

        if self.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
            return Ok(());
        }

        if report.markers.is_empty() {
            println!("No markers in {}.", self.template.display());
        }
        for entry in &report.markers {
            let kind = match entry.kind {
                MarkerKind::Repeat => "repeat".cyan(),
                MarkerKind::Conditional => "if".green(),
                MarkerKind::Else => "else".yellow(),
            };
            println!("{:>6}  {:<8} {}", format!("#{}", entry.node), kind.bold(), entry.value);
        }
        if !report.fields.is_empty() {
            println!("{} {}", "fields:".bold(), report.fields.join(", "));
        }
        Ok(())
    }
}

fn build_report(doc: &Document, ldelim: &str, rdelim: &str) -> Report {
    let markers = doc
        .markers_in(doc.root())
        .into_iter()
        .map(|(node, marker)| MarkerEntry {
            node: node.0,
            kind: marker.kind(),
            value: marker.value().to_string(),
        })
        .collect();

    let markup = doc.to_string();
    let mut fields: Vec<String> = Vec::new();
    for segment in segments::tokenize(&markup, ldelim, rdelim) {
        if let Segment::Field(field) = segment {
            let mut tag = field.name.to_string();
            for filter in &field.filters {
                tag.push('|');
                tag.push_str(filter);
            }
            if !fields.contains(&tag) {
                fields.push(tag);
            }
        }
    }
    Report { markers, fields }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_lists_markers_and_unique_fields() {
        let doc = Document::parse(concat!(
            r#"<ul><li data-repeat-on="pets">[[name]] [[weight|sIfPlural]]"#,
            r#"<i data-if="vaccinated">[[name]]<b data-else>no</b></i></li></ul>"#,
        ))
        .expect("parse");
        let report = build_report(&doc, "[[", "]]");

        let kinds: Vec<_> = report.markers.iter().map(|m| m.kind).collect();
        assert_eq!(
            kinds,
            vec![MarkerKind::Repeat, MarkerKind::Conditional, MarkerKind::Else]
        );
        assert_eq!(report.markers[0].value, "pets");
        assert_eq!(report.fields, vec!["name", "weight|sIfPlural"]);
    }
}
