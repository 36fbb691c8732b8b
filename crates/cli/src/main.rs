mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use onmodel_core::{store::SqliteStore, Studio};
use tracing_subscriber::EnvFilter;

/// onmodel: keep illustrations on model with reference-guided correction
#[derive(Parser)]
#[command(name = "onmodel", version, about)]
struct Cli {
    /// Path to the studio database
    #[arg(long, global = true, env = "ONMODEL_DB", default_value_t = default_db_path())]
    db: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage reference packs: list, create, import images, enable or disable
    Packs {
        #[command(subcommand)]
        action: Option<PacksAction>,
    },
    /// Show or change the correction settings
    Settings {
        #[command(subcommand)]
        action: Option<SettingsAction>,
    },
    /// Rank the enabled references against an image
    Rank {
        /// Path to the source image
        image: PathBuf,
        /// Angle to rank for (default: the saved setting)
        #[arg(long)]
        angle: Option<String>,
        /// Maximum number of references to show
        #[arg(long, default_value_t = onmodel_core::retrieval::DEFAULT_RANK_LIMIT)]
        limit: usize,
    },
}

#[derive(Subcommand)]
enum PacksAction {
    /// Create an empty pack (enabled immediately)
    Create {
        name: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// Delete a pack and all its images
    Rm { id: String },
    /// Show the images in a pack
    Show { id: String },
    /// Include a pack in retrieval
    Enable { id: String },
    /// Exclude a pack from retrieval
    Disable { id: String },
    /// Import image files (or directories of images) into a pack
    Import {
        id: String,
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Tag applied to every imported image (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,
    },
}

#[derive(Subcommand)]
enum SettingsAction {
    /// Show the current settings
    Show,
    /// Change one or more settings
    Set {
        /// "Proportion" or "Conditioned"
        #[arg(long)]
        mode: Option<String>,
        /// e.g. "Front", "3/4 View", "Profile"
        #[arg(long)]
        angle: Option<String>,
        /// e.g. "Full Image", "Face Priority"
        #[arg(long)]
        scope: Option<String>,
        /// 1-100
        #[arg(long)]
        strength: Option<f64>,
        /// 0-100
        #[arg(long)]
        line_preservation: Option<f64>,
        /// Require pixels outside the mask to stay untouched
        #[arg(long)]
        fidelity: Option<bool>,
    },
}

fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home)
        .join(".onmodel")
        .join("studio.db")
        .to_string_lossy()
        .to_string()
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let store = SqliteStore::open(&PathBuf::from(&cli.db))?;
    let mut studio = Studio::open(store);

    match cli.command {
        Commands::Packs { action } => match action {
            None => commands::packs::list(&studio)?,
            Some(PacksAction::Create { name, description }) => {
                commands::packs::create(&mut studio, &name, &description)?
            }
            Some(PacksAction::Rm { id }) => commands::packs::remove(&mut studio, &id)?,
            Some(PacksAction::Show { id }) => commands::packs::show(&studio, &id)?,
            Some(PacksAction::Enable { id }) => commands::packs::set_enabled(&mut studio, &id, true)?,
            Some(PacksAction::Disable { id }) => commands::packs::set_enabled(&mut studio, &id, false)?,
            Some(PacksAction::Import { id, paths, tags }) => {
                commands::packs::import(&mut studio, &id, &paths, &tags)?
            }
        },
        Commands::Settings { action } => match action {
            None | Some(SettingsAction::Show) => commands::settings::show(&studio),
            Some(SettingsAction::Set {
                mode,
                angle,
                scope,
                strength,
                line_preservation,
                fidelity,
            }) => commands::settings::set(
                &mut studio,
                onmodel_core::settings::SettingsInput {
                    mode,
                    scope,
                    angle_tag: angle,
                    strength,
                    line_preservation,
                    absolute_line_fidelity: fidelity,
                },
            )?,
        },
        Commands::Rank { image, angle, limit } => {
            commands::rank::run(&studio, &image, angle.as_deref(), limit)?
        }
    }

    Ok(())
}
