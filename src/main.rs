use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use webext_manifest::config::config_root;
use webext_manifest::{BundleFile, ManifestParser, PluginOptions, ProjectRoot};

#[derive(Parser, Debug)]
#[command(
  name = "webext-manifest",
  version,
  about = "Manifest pipeline for module-bundled browser extensions"
)]
struct Cli {
  /// Plugin config (JSON or YAML). Defaults to `webext.config.*` in the current directory.
  #[arg(long, global = true, conflicts_with = "manifest")]
  config: Option<PathBuf>,
  /// Build a bare `manifest.json` with default options.
  #[arg(long, global = true)]
  manifest: Option<PathBuf>,
  /// Directory manifest references resolve against. Defaults to the config's directory.
  #[arg(long, global = true)]
  root: Option<PathBuf>,
  /// Run the watch-mode hooks.
  #[arg(long, global = true)]
  watch: bool,
  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Print the files the bundler has to compile, as JSON.
  Inputs,
  /// Print the input and output stages in execution order.
  Stages,
  /// Rewrite the manifest against a compiled bundle and write the extension output.
  Build {
    /// Bundle description: an array of chunks or the bundler's `{ fileName: chunk }` map.
    #[arg(long)]
    bundle: PathBuf,
    /// Directory receiving `manifest.json` and emitted assets.
    #[arg(long, default_value = "dist")]
    out_dir: PathBuf,
  },
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();
  let (mut options, default_root) = load_options(&cli)?;
  options.watch |= cli.watch;
  let root = cli.root.clone().unwrap_or(default_root);
  let parser = ManifestParser::new(options, ProjectRoot::new(root))?;

  match &cli.command {
    Command::Inputs => {
      let result = parser.parse_input()?;
      println!("{}", serde_json::to_string_pretty(&result.input_scripts)?);
    }
    Command::Stages => {
      println!("input:  {}", parser.input_stage_names().join(", "));
      println!("output: {}", parser.output_stage_names().join(", "));
    }
    Command::Build { bundle, out_dir } => build(&parser, bundle, out_dir)?,
  }

  Ok(())
}

fn load_options(cli: &Cli) -> Result<(PluginOptions, PathBuf)> {
  if let Some(manifest) = &cli.manifest {
    return Ok((PluginOptions::from_manifest_path(manifest)?, config_root(manifest)));
  }
  if let Some(config) = &cli.config {
    return Ok((PluginOptions::from_path(config)?, config_root(config)));
  }

  let cwd = std::env::current_dir().context("failed to read the current directory")?;
  Ok((PluginOptions::discover(&cwd)?, cwd))
}

fn build(parser: &ManifestParser, bundle: &Path, out_dir: &Path) -> Result<()> {
  let input = parser.parse_input()?;
  let output = futures::executor::block_on(parser.parse_output(input, &BundleFile::new(bundle)))?;

  fs::create_dir_all(out_dir)
    .with_context(|| format!("failed to create {}", out_dir.display()))?;

  let manifest_path = out_dir.join("manifest.json");
  fs::write(&manifest_path, output.manifest.to_json_pretty()?)
    .with_context(|| format!("failed to write {}", manifest_path.display()))?;

  for file in &output.emit_files {
    let path = out_dir.join(&file.file_name);
    if let Some(parent) = path.parent() {
      fs::create_dir_all(parent)
        .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(&path, &file.source)
      .with_context(|| format!("failed to write {}", path.display()))?;
  }

  tracing::info!(
    out_dir = %out_dir.display(),
    emitted = output.emit_files.len(),
    "extension manifest written"
  );
  Ok(())
}
