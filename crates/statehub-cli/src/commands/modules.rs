//! `statehub install|uninstall|update|modlist` — Module lifecycle commands.

use crate::output::StyledOutput;
use anyhow::{bail, Result};
use statehub_pm::{InstalledModule, ModuleManager};

pub fn install(manager: &ModuleManager, name: &str, out: &mut StyledOutput) -> Result<()> {
    let outcome = manager.install(name)?;

    out.success("Installed ");
    out.heading(&outcome.name);
    out.plain(&format!(
        " {} from {}",
        outcome.manifest.version, outcome.source
    ));
    out.newline();
    out.field("Path", &outcome.path.display().to_string());
    out.field("SHA-256", &outcome.checksum);

    Ok(())
}

pub fn uninstall(manager: &ModuleManager, name: &str, out: &mut StyledOutput) -> Result<()> {
    manager.uninstall(name)?;

    out.success("Uninstalled ");
    out.heading(name);
    out.newline();

    Ok(())
}

pub fn update(manager: &ModuleManager, name: &str, out: &mut StyledOutput) -> Result<()> {
    let outcome = manager.update(name)?;

    out.success("Updated ");
    out.plain(&outcome.to_string());
    out.newline();

    Ok(())
}

pub fn update_all(manager: &ModuleManager, out: &mut StyledOutput) -> Result<()> {
    let report = manager.update_all()?;
    if report.is_empty() {
        out.warning("No modules installed");
        out.newline();
        return Ok(());
    }

    for (_, outcome) in report.successes() {
        out.success("  ✓ ");
        out.plain(&outcome.to_string());
        out.newline();
    }
    for (name, e) in report.failures() {
        out.failure(&format!("  ✗ {}: {}", name, e));
        out.newline();
    }

    out.newline();
    out.bold(&format!("Done! {}", report));
    out.newline();

    if report.failed() > 0 {
        bail!("{} module(s) failed to update", report.failed());
    }
    Ok(())
}

pub fn modlist(manager: &ModuleManager, extended: bool, out: &mut StyledOutput) -> Result<()> {
    let modules = manager.list_installed()?;
    if modules.is_empty() {
        out.warning("No modules installed");
        out.newline();
        return Ok(());
    }

    out.section("Installed Modules:");
    for module in &modules {
        print_module(module, extended, out);
    }

    Ok(())
}

fn print_module(module: &InstalledModule, extended: bool, out: &mut StyledOutput) {
    let manifest = match &module.manifest {
        Ok(manifest) => manifest,
        Err(e) => {
            out.failure(&format!("{} - Invalid ({})", module.name, e));
            out.newline();
            return;
        }
    };

    if !extended {
        out.info(&manifest.name);
        out.plain(" - ");
        out.dim(&manifest.version);
        out.newline();
        return;
    }

    out.heading(&manifest.name);
    out.newline();
    out.field("Version", &manifest.version);
    out.field("Description", manifest.description.as_deref().unwrap_or("N/A"));
    out.field("Author", &manifest.author);
    out.field("License", manifest.license.as_deref().unwrap_or("N/A"));
    out.field("Entry Point", manifest.entry_point_or_default());
    if let Some(namespace) = manifest.namespace() {
        out.field("Namespace", namespace);
    }
    if !manifest.dependencies.is_empty() {
        out.field("Dependencies", &manifest.dependencies.join(", "));
    }
    if let Some(repo) = &manifest.repo {
        out.field("Repository", repo);
    }
    out.newline();
}
