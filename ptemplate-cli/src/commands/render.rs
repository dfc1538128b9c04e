//! `ptemplate render <template> --data <file>` — render a template to stdout or a file.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{ensure, Context, Result};
use clap::Args;
use colored::Colorize;
use serde_json::Value;

use ptemplate_renderer::{CollectingSink, RenderConfig, RenderOptions, Renderer};

use super::read_template;

/// Arguments for `ptemplate render`.
#[derive(Args, Debug)]
pub struct RenderArgs {
    /// Template file holding an HTML fragment.
    pub template: PathBuf,

    /// Data file: JSON, or YAML for `.yaml` / `.yml`.
    #[arg(long, short)]
    pub data: PathBuf,

    /// Options file. Defaults to `<config dir>/ptemplate/config.yaml` when present.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Evaluate `data-if` conditions as expressions.
    #[arg(long)]
    pub trusted: bool,

    /// Print rendering diagnostics to stderr.
    #[arg(long)]
    pub debug: bool,

    /// Left field delimiter.
    #[arg(long)]
    pub ldelim: Option<String>,

    /// Right field delimiter.
    #[arg(long)]
    pub rdelim: Option<String>,

    /// Write the result here instead of stdout.
    #[arg(long, short)]
    pub output: Option<PathBuf>,
}

impl RenderArgs {
    pub fn run(self) -> Result<()> {
        let options = self.options()?;
        let config = RenderConfig::from_options(&options).context("invalid render options")?;
        let template = read_template(&self.template)?;
        let data = load_data(&self.data)?;

        let renderer = Renderer::new(config);
        let mut sink = CollectingSink::new();
        let html = renderer
            .render_markup(&template, &data, &mut sink)
            .with_context(|| format!("failed to parse template {}", self.template.display()))?;
        tracing::debug!(issues = sink.len(), "rendered {}", self.template.display());

        for issue in &sink.issues {
            eprintln!("{} {issue}", "warning:".yellow().bold());
        }

        match &self.output {
            Some(path) => fs::write(path, &html)
                .with_context(|| format!("failed to write {}", path.display()))?,
            None => {
                print!("{html}");
                if !html.ends_with('\n') {
                    println!();
                }
            }
        }
        Ok(())
    }

    /// Options file (explicit or default) with command-line flags on top.
    fn options(&self) -> Result<RenderOptions> {
        let base = match &self.config {
            Some(path) => RenderOptions::load(path)?,
            None => match default_config_path() {
                Some(path) if path.is_file() => RenderOptions::load(&path)?,
                _ => RenderOptions::default(),
            },
        };
        let flags = RenderOptions {
            ldelim: self.ldelim.clone(),
            rdelim: self.rdelim.clone(),
            debug: self.debug.then_some(true),
            trusted: self.trusted.then_some(true),
            ..RenderOptions::default()
        };
        Ok(base.merge(flags))
    }
}

/// `<config dir>/ptemplate/config.yaml`, if the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("ptemplate").join("config.yaml"))
}

/// Load a data file; the top level must be a mapping.
fn load_data(path: &Path) -> Result<Value> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("failed to read data {}", path.display()))?;
    let data: Value = match path.extension().and_then(|e| e.to_str()) {
        Some("yaml" | "yml") => serde_yaml::from_str(&contents)
            .with_context(|| format!("invalid YAML in {}", path.display()))?,
        _ => serde_json::from_str(&contents)
            .with_context(|| format!("invalid JSON in {}", path.display()))?,
    };
    ensure!(
        data.is_object(),
        "data in {} must be a mapping at the top level",
        path.display()
    );
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn yaml_data_is_read_by_extension() {
        let mut file = tempfile::Builder::new()
            .suffix(".yml")
            .tempfile()
            .expect("tempfile");
        writeln!(file, "name: Buddy\nweight: 300").expect("write");
        let data = load_data(file.path()).expect("load");
        assert_eq!(data["name"], "Buddy");
        assert_eq!(data["weight"], 300);
    }

    #[test]
    fn sequence_data_is_rejected() {
        let mut file = tempfile::Builder::new()
            .suffix(".json")
            .tempfile()
            .expect("tempfile");
        write!(file, "[1, 2]").expect("write");
        let err = load_data(file.path()).unwrap_err();
        assert!(err.to_string().contains("mapping"), "got: {err}");
    }

    #[test]
    fn flags_override_config_file() {
        let mut file = tempfile::Builder::new()
            .suffix(".yaml")
            .tempfile()
            .expect("tempfile");
        writeln!(file, "ldelim: '<%'\nrdelim: '%>'\ndebug: false").expect("write");
        let args = RenderArgs {
            template: PathBuf::from("t.html"),
            data: PathBuf::from("d.json"),
            config: Some(file.path().to_path_buf()),
            trusted: false,
            debug: true,
            ldelim: Some("{{".into()),
            rdelim: None,
            output: None,
        };
        let options = args.options().expect("options");
        assert_eq!(options.ldelim.as_deref(), Some("{{"));
        assert_eq!(options.rdelim.as_deref(), Some("%>"));
        assert_eq!(options.debug, Some(true));
        assert_eq!(options.trusted, None);
    }
}
