//! Parameter generator (mep-params) - Main entry point
//!
//! Writes the instruction, structural and functional params files the
//! multi-echo pipeline scripts read, and launches the structural pipeline.

use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::info;

use mep_common::config::{init_logging, ConfigResolver, TomlConfig, ToolEnvironment};
use mep_common::ParamsKind;
use mep_params::bids::NiftiFrameCounter;
use mep_params::generate::{
    generate_bids, generate_functional, generate_instructions, generate_structural, load_instructions,
    params_path,
};
use mep_params::header::{DicomHeaderReader, HeaderReader, SidecarHeaderReader};
use mep_params::locator::PathStyle;
use mep_params::overrides::OverrideFile;

/// Stages of `Structural_pp_090121.csh`, in execution order
const STRUCTURAL_MODULES: &[&str] = &[
    "T1_DCM",
    "T1_AVG",
    "T2_DCM",
    "T2_AVG",
    "T1_REG2ATL",
    "T2toT1REG",
    "SURFACE_CREATION",
    "POSTFREESURFER",
    "SEG2ATL",
    "POSTFREESURFER2ATL",
    "CREATE_RIBBON",
    "SUBCORTICAL",
    "IMAGEREG_CHECK",
];

const STRUCTURAL_SCRIPT: &str = "Structural_pp_090121.csh";

/// Command-line arguments for mep-params
#[derive(Parser, Debug)]
#[command(name = "mep-params")]
#[command(about = "Parameter file generator for the multi-echo fMRI pipeline")]
#[command(version)]
struct Cli {
    /// Bootstrap config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level, overrides the config file (RUST_LOG still wins)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write instructions.params (and instructions.toml) for a project
    Instructions {
        project_dir: PathBuf,

        /// TOML table of instruction values to change
        #[arg(long)]
        set_file: Option<PathBuf>,
    },

    /// Select anatomical studies and write struct.params
    Structural {
        subject_dir: PathBuf,

        #[command(flatten)]
        scan: ScanArgs,

        /// Record study paths relative to the subject directory
        #[arg(long)]
        relative: bool,
    },

    /// Group functional runs of every session and write func.params
    Functional {
        subject_dir: PathBuf,

        #[command(flatten)]
        scan: ScanArgs,

        /// Directory holding instructions.params (default: parent of subject)
        #[arg(long)]
        project_dir: Option<PathBuf>,

        /// Per-session override file
        #[arg(long)]
        overrides: Option<PathBuf>,

        /// Session holding the anatomy (default: first session)
        #[arg(long)]
        day1: Option<String>,
    },

    /// Generate every params file for a BIDS dataset
    Bids {
        bids_dir: PathBuf,
        project_dir: PathBuf,

        /// TOML table of instruction values to change
        #[arg(long)]
        set_file: Option<PathBuf>,

        /// Per-session override file
        #[arg(long)]
        overrides: Option<PathBuf>,
    },

    /// Print shell exports for the pipeline tool environment
    Tools {
        #[arg(long, env = "MEP_TOOL_ROOT")]
        tool_root: Option<PathBuf>,
    },

    /// Run the structural pipeline for one subject
    RunStructural {
        project_dir: PathBuf,
        subject: String,

        /// Module to start at
        #[arg(long, value_parser = clap::builder::PossibleValuesParser::new(STRUCTURAL_MODULES.iter().copied()))]
        module_start: Option<String>,

        /// Exit after the start module
        #[arg(long)]
        module_exit: bool,

        #[arg(long, env = "MEP_TOOL_ROOT")]
        tool_root: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
struct ScanArgs {
    /// Directory levels searched for session manifests
    #[arg(long, default_value_t = 2)]
    max_depth: usize,

    /// Where study headers are read from
    #[arg(long, value_enum, default_value_t = HeaderSource::Dicom)]
    headers: HeaderSource,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum HeaderSource {
    Dicom,
    Sidecar,
}

impl ScanArgs {
    fn reader(&self) -> Box<dyn HeaderReader> {
        match self.headers {
            HeaderSource::Dicom => Box::new(DicomHeaderReader),
            HeaderSource::Sidecar => Box::new(SidecarHeaderReader),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = ConfigResolver::default()
        .load(cli.config.as_deref())
        .context("Failed to load configuration")?;

    let mut logging = config.logging.clone();
    if let Some(level) = &cli.log_level {
        logging.level = level.clone();
    }
    init_logging(&logging).context("Failed to initialize logging")?;

    info!("Starting mep-params v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Instructions {
            project_dir,
            set_file,
        } => {
            let table = instruction_table(set_file.as_deref(), &config)?;
            generate_instructions(&project_dir, table.as_ref())
                .with_context(|| format!("Failed to write instructions in {}", project_dir.display()))?;
        }

        Commands::Structural {
            subject_dir,
            scan,
            relative,
        } => {
            let style = if relative {
                let root = subject_dir
                    .canonicalize()
                    .with_context(|| format!("Failed to resolve {}", subject_dir.display()))?;
                PathStyle::RelativeTo(root)
            } else {
                PathStyle::Absolute
            };
            generate_structural(&subject_dir, scan.max_depth, scan.reader().as_ref(), &style)
                .with_context(|| format!("Failed to generate structural params for {}", subject_dir.display()))?;
        }

        Commands::Functional {
            subject_dir,
            scan,
            project_dir,
            overrides,
            day1,
        } => {
            let project_dir = match project_dir {
                Some(dir) => dir,
                None => subject_dir
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| PathBuf::from(".")),
            };
            let instructions = load_instructions(&project_dir)
                .with_context(|| format!("Failed to read instructions in {}", project_dir.display()))?;
            let overrides = load_overrides(overrides.as_deref())?;

            let reports = generate_functional(
                &subject_dir,
                scan.max_depth,
                scan.reader().as_ref(),
                &instructions,
                overrides.as_ref(),
                day1.as_deref(),
            )
            .with_context(|| format!("Failed to generate functional params for {}", subject_dir.display()))?;

            for report in reports {
                println!("{}\t{} runs\t{}", report.session, report.runs, report.output_dir.display());
            }
        }

        Commands::Bids {
            bids_dir,
            project_dir,
            set_file,
            overrides,
        } => {
            let table = instruction_table(set_file.as_deref(), &config)?;
            let overrides = load_overrides(overrides.as_deref())?;

            let report = generate_bids(
                &bids_dir,
                &project_dir,
                &NiftiFrameCounter,
                table.as_ref(),
                overrides.as_ref(),
            )
            .with_context(|| format!("Failed to process BIDS dataset {}", bids_dir.display()))?;

            for subject in &report.skipped {
                println!("{}\tno T1w, structural params skipped", subject);
            }
            for session in &report.sessions {
                println!("{}\t{} runs\t{}", session.session, session.runs, session.output_dir.display());
            }
        }

        Commands::Tools { tool_root } => {
            let env = ToolEnvironment::resolve(tool_root.as_deref(), &config)
                .context("Failed to resolve tool environment")?;
            print!("{}", env.to_shell_exports());
        }

        Commands::RunStructural {
            project_dir,
            subject,
            module_start,
            module_exit,
            tool_root,
        } => {
            run_structural(
                &project_dir,
                &subject,
                module_start.as_deref().unwrap_or(STRUCTURAL_MODULES[0]),
                module_exit,
                tool_root.as_deref(),
                &config,
            )?;
        }
    }

    Ok(())
}

/// Instruction overrides from `--set-file`, plus `min_frames` from the
/// bootstrap config when the file does not set it
fn instruction_table(set_file: Option<&Path>, config: &TomlConfig) -> Result<Option<toml::Table>> {
    let mut table = match set_file {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            toml::from_str::<toml::Table>(&content)
                .with_context(|| format!("Failed to parse {}", path.display()))?
        }
        None => toml::Table::new(),
    };

    if let Some(min_frames) = config.min_frames {
        if !table.contains_key("min_frames") {
            let value = i64::try_from(min_frames).context("min_frames out of range")?;
            table.insert("min_frames".to_string(), toml::Value::Integer(value));
        }
    }

    Ok((!table.is_empty()).then_some(table))
}

fn load_overrides(path: Option<&Path>) -> Result<Option<OverrideFile>> {
    path.map(|p| OverrideFile::load(p).with_context(|| format!("Failed to load overrides {}", p.display())))
        .transpose()
}

fn run_structural(
    project_dir: &Path,
    subject: &str,
    module_start: &str,
    module_exit: bool,
    tool_root: Option<&Path>,
    config: &TomlConfig,
) -> Result<()> {
    let instructions = params_path(project_dir, ParamsKind::Instructions);
    if !instructions.is_file() {
        bail!("Instructions file not found at {}", instructions.display());
    }

    let subject_dir = project_dir.join(subject);
    let struct_params = params_path(&subject_dir, ParamsKind::Structural);
    if !struct_params.is_file() {
        bail!("Structural params not found at {}", struct_params.display());
    }

    let env = ToolEnvironment::resolve(tool_root, config).context("Failed to resolve tool environment")?;

    let instructions = instructions.canonicalize()?;
    let struct_params = struct_params.canonicalize()?;
    info!(subject, module = module_start, exit = module_exit, "Running structural pipeline");

    let mut command = Command::new(STRUCTURAL_SCRIPT);
    command
        .current_dir(&subject_dir)
        .arg(&struct_params)
        .arg(&instructions)
        .arg(module_start)
        .arg(if module_exit { "1" } else { "0" });
    env.apply(&mut command);

    let status = command
        .status()
        .with_context(|| format!("Failed to launch {}", STRUCTURAL_SCRIPT))?;
    if !status.success() {
        bail!("{} exited with {}", STRUCTURAL_SCRIPT, status);
    }
    Ok(())
}
