//! `privy pm <package>`: install with apt, then ask for a cheat sheet.

use anyhow::{bail, Context, Result};
use tokio::process::Command;
use tracing::warn;

use crate::generator::TextGenerator;

const CHEAT_SHEET_SYSTEM: &str = "You are a helpful Linux assistant.";

pub fn cheat_sheet_prompt(package: &str) -> String {
    format!(
        "Provide a concise cheat sheet for the linux command '{}'. \
         List top 5 most useful examples. Output in Markdown. Keep it under 200 words.",
        package
    )
}

/// Ask the generator for a cheat sheet; failures become a short notice.
pub async fn cheat_sheet(generator: &dyn TextGenerator, package: &str) -> String {
    match generator
        .generate(&cheat_sheet_prompt(package), CHEAT_SHEET_SYSTEM)
        .await
    {
        Ok(text) => text,
        Err(e) => {
            warn!(package = %package, error = %e, "cheat sheet generation failed");
            format!("Could not generate cheat sheet (Error: {e}).")
        }
    }
}

/// A package name apt would accept; rejects anything shell- or flag-like.
pub fn is_valid_package_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('-')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '+' | '-' | ':' | '_'))
}

/// Run the pm command.
pub async fn run_pm(generator: &dyn TextGenerator, package: &str) -> Result<()> {
    if !is_valid_package_name(package) {
        bail!("Invalid package name: {}", package);
    }

    println!("PrivyPM: Installing {}...", package);

    let status = Command::new("sudo")
        .args(["apt-get", "install", "-y", package])
        .status()
        .await
        .context("Failed to run apt-get")?;

    if !status.success() {
        bail!("Failed to install {}.", package);
    }

    println!("Success! Generating cheat sheet for {}...", package);
    let sheet = cheat_sheet(generator, package).await;

    println!();
    println!("Cheat Sheet: {}", package);
    println!("{}", "-".repeat(40));
    println!("{}", sheet.trim());
    println!();
    Ok(())
}
