// Copyright 2025 The Drasi Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// Allow println! in main.rs for CLI user-facing output (validate, graph commands)
#![allow(clippy::print_stdout)]

use anyhow::Result;
use clap::{Parser, Subcommand};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};

use druid_eks::composer::{Composer, CompositionError, RealizedGraph};
use druid_eks::config::{ContextMap, FsDocumentSource, InvocationSettings, ReleaseDocument};
use druid_eks::provision::TokenProvisioner;
use druid_eks::synth::{ManifestWriter, Synthesizer};

#[derive(Parser)]
#[command(name = "druid-eks")]
#[command(about = "Compose and synthesize an Apache Druid on EKS release")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_version = concat!(
    env!("CARGO_PKG_VERSION"),
    "\nrustc: ",
    env!("DRUID_EKS_RUSTC_VERSION"),
    "\nserde_yaml: ",
    env!("DRUID_EKS_SERDE_YAML_VERSION"),
))]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to the invocation file
    #[arg(short, long, default_value = "deployment.yaml", global = true)]
    config: PathBuf,

    /// Context parameter as key=value (repeatable, overrides the invocation file)
    #[arg(long = "context", value_name = "KEY=VALUE", global = true)]
    context: Vec<String>,

    /// Deployment tag as key=value (repeatable)
    #[arg(long = "tag", value_name = "KEY=VALUE", global = true)]
    tags: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Compose the release and write the synthesis manifest (default)
    Synth {
        /// Override the output directory
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Resolve and compose everything without writing output
    Validate {
        /// Show the resolved context
        #[arg(long)]
        show_resolved: bool,
    },

    /// Print the realization order, waves and dependency pairs
    Graph,
}

/// Everything loaded before composition starts.
struct Session {
    settings: InvocationSettings,
    context: ContextMap,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let session = prepare(&cli.config, &cli.context, &cli.tags)?;

    match cli.command {
        Some(Commands::Synth { output }) => run_synth(session, output),
        Some(Commands::Validate { show_resolved }) => run_validate(session, show_resolved),
        Some(Commands::Graph) => run_graph(session),
        None => run_synth(session, None),
    }
}

/// Load `.env`, the invocation file and the base context, and initialize
/// logging.
fn prepare(config_path: &Path, cli_context: &[String], cli_tags: &[String]) -> Result<Session> {
    // Look for .env in the same directory as the invocation file
    let env_file = config_path
        .parent()
        .map(|dir| dir.join(".env"))
        .filter(|path| path.exists());
    let env_file_loaded = match &env_file {
        Some(path) => match dotenvy::from_path(path) {
            Ok(_) => true,
            Err(e) => {
                eprintln!("Warning: Failed to load .env file: {e}");
                false
            }
        },
        None => false,
    };

    let settings = if config_path.exists() {
        match InvocationSettings::load(config_path) {
            Ok(settings) => Some(settings),
            Err(e) => fail(&CompositionError::from(e)),
        }
    } else {
        None
    };
    let settings_found = settings.is_some();
    let settings = settings.unwrap_or_default();

    // RUST_LOG wins over the invocation file
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(settings.log_level.as_str()),
    )
    .init();

    if env_file_loaded {
        info!("Loaded environment variables from .env file");
    }
    if settings_found {
        info!("Invocation file: {}", config_path.display());
    } else {
        warn!(
            "Invocation file '{}' not found. Using defaults and command line context.",
            config_path.display()
        );
    }
    debug!("Document root: {}", settings.document_root().display());

    let context = match settings.base_context(cli_context, cli_tags) {
        Ok(context) => context,
        Err(e) => fail(&CompositionError::from(e)),
    };

    Ok(Session { settings, context })
}

fn compose(session: &Session) -> (ReleaseDocument, RealizedGraph) {
    let documents = FsDocumentSource::new(session.settings.document_root());
    let composer = Composer::new(documents, TokenProvisioner::new());
    let release_document = session.settings.release.as_str();

    let release = match composer.load_release(release_document, &session.context) {
        Ok(release) => release,
        Err(e) => fail(&e),
    };

    match composer.compose(release_document, &release, session.context.clone()) {
        Ok(realized) => (release, realized),
        Err(e) => fail(&e),
    }
}

/// Compose and write the manifest. A partial graph is still written before
/// exiting non-zero.
fn run_synth(session: Session, output: Option<PathBuf>) -> Result<()> {
    let (_, realized) = compose(&session);

    let output = output.unwrap_or_else(|| session.settings.output.clone());
    let path = ManifestWriter::new(output).synthesize(&realized)?;
    println!("Synthesized {} to {}", realized.stack().name, path.display());

    exit_on_failures(&realized);
    Ok(())
}

fn run_validate(session: Session, show_resolved: bool) -> Result<()> {
    println!("Validating release: {}", session.settings.release);
    println!();

    let (release, realized) = compose(&session);
    let planned = realized.outcomes().count();
    let registered = realized.realization_order().len();

    if realized.is_complete() {
        println!("[OK] Release is valid");
    } else {
        println!("[ERROR] Release is invalid");
    }
    println!();

    println!("Summary:");
    println!("  Stack: {}", realized.stack().name);
    println!("  Release: {}", release.release.common.id);
    println!("  Units: {registered}/{planned} registered");
    println!("  Edges: {}", realized.edges().len());
    println!("  Waves: {}", realized.waves().len());
    println!("  Failures: {}", realized.failures().len());

    if show_resolved {
        println!();
        println!("Resolved context:");
        for (key, value) in realized.context().iter() {
            println!("  {key} = {}", value.render());
        }
    }

    exit_on_failures(&realized);
    Ok(())
}

fn run_graph(session: Session) -> Result<()> {
    let (_, realized) = compose(&session);

    println!("Realization order:");
    for (i, id) in realized.realization_order().iter().enumerate() {
        println!("  {}. {id}", i + 1);
    }

    println!();
    println!("Waves:");
    for (i, wave) in realized.waves().iter().enumerate() {
        println!("  {}: {}", i + 1, wave.join(", "));
    }

    println!();
    println!("Dependencies:");
    for (unit, depends_on) in realized.edges() {
        println!("  {unit} -> {depends_on}");
    }

    exit_on_failures(&realized);
    Ok(())
}

fn exit_on_failures(realized: &RealizedGraph) {
    let failures = realized.failures();
    if failures.is_empty() {
        return;
    }

    for (_, error) in &failures {
        eprintln!("{}: {}", error.kind(), error.subject());
        eprintln!("  {error}");
    }
    std::process::exit(1);
}

/// Print the error kind and offending identifier, then exit non-zero.
fn fail(error: &CompositionError) -> ! {
    eprintln!("{}: {}", error.kind(), error.subject());
    eprintln!("  {error}");
    std::process::exit(1);
}
