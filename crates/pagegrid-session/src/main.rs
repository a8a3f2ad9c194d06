//! pagegrid: command-line tool over the layout engine.
//!
//! Inspects the built-in page registry, prints the default arrangement a user
//! gets for a page, and shows what a saved layout record turns into once the
//! server has normalized it and the client has merged it with the catalog.
//!
//! # Usage
//!
//! ```text
//! pagegrid [--config <PATH>] <COMMAND>
//!
//! Commands:
//!   pages                                   List registered pages and their blocks
//!   defaults --page <KEY> [--admin] [--grant module:action]...
//!   merge    --page <KEY> --record <FILE> [--admin] [--grant module:action]...
//!                                           (updates the local cache when enabled)
//!   cache show  --page <KEY>                Print the locally cached layout
//!   cache clear --page <KEY>                Delete the locally cached layout
//! ```
//!
//! # Environment variable overrides
//!
//! | Variable          | Description                                   |
//! |-------------------|-----------------------------------------------|
//! | `PAGEGRID_CONFIG` | Config file to use instead of the platform one |
//! | `PAGEGRID_USER`   | Username the page is resolved for             |
//! | `RUST_LOG`        | Overrides the configured log level            |
//!
//! JSON goes to stdout and logs go to stderr.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use pagegrid_core::catalog::{builtin_pages, find_page};
use pagegrid_core::protocol::{cache_key, decode_record};
use pagegrid_core::{Action, ModulePermissions, PageCatalog, ResolvedPage, Role, UserContext};
use pagegrid_session::application::edit_session::EditSession;
use pagegrid_session::application::ports::{LayoutCache, LayoutStore};
use pagegrid_session::infrastructure::cache::FileLayoutCache;
use pagegrid_session::infrastructure::config::{
    load_config, load_config_from, ConfigError, PagegridConfig,
};
use pagegrid_session::infrastructure::store::InMemoryLayoutStore;
use serde_json::json;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

// ── CLI argument definitions ──────────────────────────────────────────────────

#[derive(Debug, Parser)]
#[command(
    name = "pagegrid",
    about = "Inspect default, saved and merged layouts of customizable pages",
    version
)]
struct Cli {
    /// Config file to use instead of the platform default.
    #[arg(long, env = "PAGEGRID_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List the registered pages and their blocks.
    Pages,

    /// Print the default arrangement of a page for a user.
    Defaults {
        #[command(flatten)]
        target: Target,
    },

    /// Normalize a saved layout record and merge it with the page catalog.
    Merge {
        #[command(flatten)]
        target: Target,

        /// JSON file holding a `{ version, page_key, layouts, hidden_blocks }` record.
        #[arg(long)]
        record: PathBuf,
    },

    /// Inspect the local fallback cache.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Debug, Subcommand)]
enum CacheAction {
    Show {
        #[arg(long)]
        page: String,
    },
    Clear {
        #[arg(long)]
        page: String,
    },
}

/// The page and the user it is resolved for.
#[derive(Debug, Args)]
struct Target {
    /// Page key, e.g. `module:pharmacy:inventory`.
    #[arg(long)]
    page: String,

    #[arg(long, default_value = "cli", env = "PAGEGRID_USER")]
    user: String,

    /// Resolve as an administrator (bypasses every permission check).
    #[arg(long)]
    admin: bool,

    /// Grant a module permission, as `module:view` or `module:edit`.  Repeatable.
    #[arg(long = "grant", value_parser = parse_grant)]
    grants: Vec<(String, Action)>,
}

impl Target {
    fn user(&self) -> UserContext {
        let role = if self.admin { Role::Admin } else { Role::User };
        UserContext::new(self.user.clone(), role)
    }

    fn permissions(&self) -> ModulePermissions {
        self.grants
            .iter()
            .fold(ModulePermissions::new(), |perms, (module, action)| {
                perms.grant(module.clone(), *action)
            })
    }

    fn resolve(&self) -> anyhow::Result<ResolvedPage> {
        let definition =
            find_page(&self.page).with_context(|| format!("unknown page: {}", self.page))?;
        Ok(PageCatalog::from_definition(definition).resolve(&self.user(), &self.permissions()))
    }
}

fn parse_grant(raw: &str) -> Result<(String, Action), String> {
    let (module, action) = raw
        .rsplit_once(':')
        .ok_or_else(|| format!("expected module:action, got '{raw}'"))?;
    if module.is_empty() {
        return Err(format!("missing module name in '{raw}'"));
    }
    let action = action.parse::<Action>().map_err(|e| e.to_string())?;
    Ok((module.to_string(), action))
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = read_config(&cli)?;

    // RUST_LOG wins over the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.session.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Pages => print_pages(),
        Command::Defaults { target } => print_defaults(&target)?,
        Command::Merge { target, record } => print_merged(&target, &record, &config).await?,
        Command::Cache { action } => run_cache_action(&action, &config)?,
    }
    Ok(())
}

fn read_config(cli: &Cli) -> anyhow::Result<PagegridConfig> {
    let result = match &cli.config {
        Some(path) => load_config_from(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => match load_config() {
            Ok(config) => config,
            // No home directory (containers, CI): run on defaults.
            Err(ConfigError::NoPlatformConfigDir) => PagegridConfig::default(),
            Err(e) => return Err(e).context("loading config"),
        },
    };
    Ok(result)
}

// ── Commands ──────────────────────────────────────────────────────────────────

fn print_pages() {
    for page in builtin_pages() {
        let blocks: Vec<&str> = page.block_ids().collect();
        println!("{}\t{}", page.key, blocks.join(", "));
    }
}

fn print_defaults(target: &Target) -> anyhow::Result<()> {
    let page = target.resolve()?;
    debug!(page = %page.key, blocks = page.allowed.len(), "resolved page");
    let output = json!({
        "page": page.key,
        "canEdit": page.can_edit,
        "layouts": page.defaults,
        "hiddenBlocks": page.default_hidden,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn print_merged(
    target: &Target,
    record_path: &Path,
    config: &PagegridConfig,
) -> anyhow::Result<()> {
    let bytes = std::fs::read(record_path)
        .with_context(|| format!("reading {}", record_path.display()))?;
    let record = decode_record(&bytes)
        .with_context(|| format!("decoding layout record {}", record_path.display()))?;
    if record.page_key != target.page {
        bail!(
            "record is for page '{}' but --page is '{}'",
            record.page_key,
            target.page
        );
    }

    let page = target.resolve()?;
    let store = Arc::new(InMemoryLayoutStore::new(
        target.user(),
        Arc::new(target.permissions()),
    ));
    store
        .save(record)
        .await
        .context("server rejected the layout record")?;

    let mut session = EditSession::new(page, store)
        .with_autosave_delay(config.session.autosave_delay());
    if config.cache.enabled {
        // Without a cache directory the merge still runs, uncached.
        match config.cache.resolved_directory() {
            Ok(dir) => {
                session = session
                    .with_cache(Arc::new(FileLayoutCache::new(dir)), &config.cache.namespace);
            }
            Err(e) => warn!(error = %e, "local cache unavailable"),
        }
    }
    session.load().await.context("loading the stored layout")?;
    info!(page = %session.page_key(), session = %session.id(), "merged saved layout");

    let output = json!({
        "page": session.page_key(),
        "layouts": session.active(),
        "hiddenBlocks": session.hidden_active(),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn run_cache_action(action: &CacheAction, config: &PagegridConfig) -> anyhow::Result<()> {
    if !config.cache.enabled {
        warn!("the local cache is disabled in the configuration");
    }
    let dir = config
        .cache
        .resolved_directory()
        .context("locating the cache directory")?;
    let cache = FileLayoutCache::new(dir);

    match action {
        CacheAction::Show { page } => {
            let key = cache_key(&config.cache.namespace, page);
            match cache.read(&key).context("reading the cache")? {
                Some(entry) => println!("{}", serde_json::to_string_pretty(&entry)?),
                None => println!("no cached layout for {page}"),
            }
        }
        CacheAction::Clear { page } => {
            let key = cache_key(&config.cache.namespace, page);
            cache.remove(&key).context("clearing the cache")?;
            info!(path = %cache.path_for(&key).display(), "cache entry removed");
        }
    }
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_grant_accepts_module_and_action() {
        assert_eq!(
            parse_grant("pharmacy:edit"),
            Ok(("pharmacy".to_string(), Action::Edit))
        );
    }

    #[test]
    fn test_parse_grant_rejects_missing_separator() {
        assert!(parse_grant("pharmacy").is_err());
        assert!(parse_grant(":view").is_err());
        assert!(parse_grant("pharmacy:delete").is_err());
    }

    #[test]
    fn test_cli_parses_repeated_grants() {
        // Arrange / Act
        let cli = Cli::parse_from([
            "pagegrid",
            "defaults",
            "--page",
            "module:clothing:collaborators",
            "--grant",
            "collaborators:view",
            "--grant",
            "collaborators:edit",
        ]);

        // Assert
        let Command::Defaults { target } = cli.command else {
            panic!("expected the defaults command");
        };
        assert_eq!(target.grants.len(), 2);
        assert!(!target.admin);
        let page = target.resolve().unwrap();
        assert_eq!(page.allowed.len(), 2);
    }

    fn scratch_config(enabled: bool) -> PagegridConfig {
        let mut config = PagegridConfig::default();
        config.cache.directory = Some(
            std::env::temp_dir().join(format!("pagegrid-cli-{}", uuid::Uuid::new_v4())),
        );
        config.cache.enabled = enabled;
        config
    }

    fn write_pharmacy_record(dir: &Path) -> PathBuf {
        std::fs::create_dir_all(dir).unwrap();
        let path = dir.join("record.json");
        std::fs::write(
            &path,
            br#"{
                "version": 1,
                "page_key": "module:pharmacy:inventory",
                "layouts": {"lg": [{"i": "pharmacy-header", "x": 0, "y": 0, "w": 12, "h": 2}]},
                "hidden_blocks": ["pharmacy-stats"]
            }"#,
        )
        .unwrap();
        path
    }

    fn merge_target() -> Target {
        let cli = Cli::parse_from([
            "pagegrid",
            "defaults",
            "--page",
            "module:pharmacy:inventory",
            "--grant",
            "pharmacy:view",
        ]);
        let Command::Defaults { target } = cli.command else {
            panic!("expected the defaults command");
        };
        target
    }

    #[tokio::test]
    async fn test_merge_writes_the_configured_file_cache() {
        // Arrange
        let config = scratch_config(true);
        let dir = config.cache.resolved_directory().unwrap();
        let record = write_pharmacy_record(&dir.join("input"));

        // Act
        print_merged(&merge_target(), &record, &config).await.unwrap();

        // Assert
        let key = cache_key(&config.cache.namespace, "module:pharmacy:inventory");
        let entry = FileLayoutCache::new(&dir).read(&key).unwrap().expect("entry cached");
        assert_eq!(entry.hidden_blocks, vec!["pharmacy-stats".to_string()]);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn test_merge_skips_a_disabled_cache() {
        let config = scratch_config(false);
        let dir = config.cache.resolved_directory().unwrap();
        let record = write_pharmacy_record(&dir.join("input"));

        print_merged(&merge_target(), &record, &config).await.unwrap();

        let key = cache_key(&config.cache.namespace, "module:pharmacy:inventory");
        assert!(FileLayoutCache::new(&dir).read(&key).unwrap().is_none());
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_unknown_page_is_an_error() {
        let cli = Cli::parse_from(["pagegrid", "defaults", "--page", "module:nope"]);
        let Command::Defaults { target } = cli.command else {
            panic!("expected the defaults command");
        };
        assert!(target.resolve().is_err());
    }
}
