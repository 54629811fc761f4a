use clap::{Args, Parser, Subcommand};
use mediasync::reconcile::ReconcileOptions;
use mediasync_common::{CoverImageMode, Provider};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mediasync")]
#[command(author, version, about = "Reconcile media metadata against external catalogs")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the changes catalogs would make, without writing anything
    Preview {
        /// Record ids to reconcile
        #[arg(required = true)]
        ids: Vec<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        overrides: OptionOverrides,
    },

    /// Preview, approve and commit changes
    Reconcile {
        /// Record ids to reconcile
        #[arg(required = true)]
        ids: Vec<String>,

        /// Accept the default approvals without prompting
        #[arg(short, long)]
        yes: bool,

        #[command(flatten)]
        overrides: OptionOverrides,
    },

    /// Extract catalog identifiers from an external links blob
    Ids {
        /// JSON object or free text containing catalog URLs
        blob: String,
    },

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}

/// Per-run overrides of the configured reconciliation defaults.
#[derive(Args, Debug, Clone, Default)]
pub struct OptionOverrides {
    /// Only fill fields that are currently empty
    #[arg(long, conflicts_with = "overwrite")]
    pub only_missing: bool,

    /// Replace existing values that differ
    #[arg(long)]
    pub overwrite: bool,

    /// Never change titles
    #[arg(long)]
    pub no_titles: bool,

    /// Never change descriptions
    #[arg(long)]
    pub no_descriptions: bool,

    /// Never change cover images
    #[arg(long)]
    pub no_covers: bool,

    /// Catalogs to consult, most trusted first (e.g. tmdb,omdb)
    #[arg(long, value_delimiter = ',')]
    pub sources: Vec<Provider>,

    /// Store covers as links (url) or upload them (binary)
    #[arg(long)]
    pub cover_mode: Option<CoverImageMode>,
}

impl OptionOverrides {
    pub fn apply(&self, mut options: ReconcileOptions) -> ReconcileOptions {
        if self.only_missing {
            options.only_missing = true;
        }
        if self.overwrite {
            options.only_missing = false;
        }
        if self.no_titles {
            options.update_titles = false;
        }
        if self.no_descriptions {
            options.update_descriptions = false;
        }
        if self.no_covers {
            options.update_cover_images = false;
        }
        if !self.sources.is_empty() {
            options.preferred_sources = self.sources.clone();
        }
        if let Some(mode) = self.cover_mode {
            options.cover_image_mode = mode;
        }
        options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_apply_to_defaults() {
        let cli = Cli::parse_from([
            "mediasync",
            "preview",
            "r1",
            "r2",
            "--overwrite",
            "--no-covers",
            "--sources",
            "tmdb,omdb",
            "--cover-mode",
            "binary",
        ]);

        let Commands::Preview { ids, overrides, json } = cli.command else {
            panic!("expected preview");
        };
        assert_eq!(ids, vec!["r1", "r2"]);
        assert!(!json);

        let options = overrides.apply(ReconcileOptions::default());
        assert!(!options.only_missing);
        assert!(!options.update_cover_images);
        assert!(options.update_titles);
        assert_eq!(options.preferred_sources, vec![Provider::Tmdb, Provider::Omdb]);
        assert_eq!(options.cover_image_mode, CoverImageMode::Binary);
    }

    #[test]
    fn no_overrides_keep_configured_options() {
        let configured = ReconcileOptions {
            only_missing: false,
            ..ReconcileOptions::default()
        };
        assert_eq!(OptionOverrides::default().apply(configured.clone()), configured);
    }

    #[test]
    fn conflicting_policy_flags_are_rejected() {
        let result = Cli::try_parse_from(["mediasync", "reconcile", "r1", "--only-missing", "--overwrite"]);
        assert!(result.is_err());
    }

    #[test]
    fn unknown_source_is_rejected() {
        let result = Cli::try_parse_from(["mediasync", "preview", "r1", "--sources", "imdb"]);
        assert!(result.is_err());
    }
}
