//! `statehub sources` — Manage module repositories.

use crate::output::StyledOutput;
use anyhow::{bail, Result};
use clap::Subcommand;
use statehub_pm::{ModuleManager, RepositorySource};

#[derive(Subcommand)]
pub enum SourcesAction {
    /// Add a new repository
    Add {
        /// Repository name
        name: String,
        /// Repository URL
        url: String,
    },

    /// List all cached repositories
    List,

    /// Remove a repository
    Del {
        /// Repository name or URL to remove
        name_or_url: String,
    },

    /// Re-fetch every cached repository
    Refresh,
}

pub fn execute(manager: &ModuleManager, action: SourcesAction, out: &mut StyledOutput) -> Result<()> {
    match action {
        SourcesAction::Add { name, url } => {
            let source = manager.add_source(&name, &url)?;
            out.success("Added repository ");
            out.heading(&source.list_name);
            out.plain(&format!(" ({} modules)", source.module_count()));
            out.newline();
        }

        SourcesAction::List => {
            manager.ensure_default_source()?;
            print_sources(&manager.list_sources()?, out);
        }

        SourcesAction::Del { name_or_url } => {
            let removed = manager.remove_source(&name_or_url)?;
            out.success("Removed repository ");
            out.heading(&removed.list_name);
            out.newline();
        }

        SourcesAction::Refresh => {
            let report = manager.refresh_sources()?;
            for (name, e) in report.failures() {
                out.warning(&format!("Failed to refresh {}: {}", name, e));
                out.newline();
            }
            out.plain(&format!("Repository cache refreshed: {}", report));
            out.newline();
            if report.failed() > 0 {
                bail!("{} repository refresh(es) failed", report.failed());
            }
        }
    }

    Ok(())
}

fn print_sources(sources: &[RepositorySource], out: &mut StyledOutput) {
    if sources.is_empty() {
        out.warning("No repositories cached");
        out.newline();
        return;
    }

    out.section("Cached Repositories:");
    for source in sources {
        let maintainers = source
            .maintainers
            .iter()
            .map(|(name, contact)| format!("{} <{}>", name, contact))
            .collect::<Vec<_>>()
            .join(", ");

        out.heading(&source.list_name);
        out.newline();
        out.field("Description", or_na(&source.list_description));
        out.field("Modules", &source.module_count().to_string());
        out.field("Maintainers", or_na(&maintainers));
        out.field("URL", &source.list_url);
        out.newline();
    }
}

fn or_na(value: &str) -> &str {
    if value.is_empty() {
        "N/A"
    } else {
        value
    }
}
