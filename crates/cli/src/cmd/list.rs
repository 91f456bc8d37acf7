//! Implementation of the `tpb list` command.

use anyhow::{Context, Result};
use owo_colors::{OwoColorize, Stream};

use tpb_lib::config::HostConfig;
use tpb_lib::host::Host;
use tpb_lib::list::{BundleListing, list};

use crate::output::{OutputFormat, print_info, print_json};

/// List installed bundles as text or JSON.
pub fn cmd_list(config: HostConfig, output: OutputFormat) -> Result<()> {
  let host = Host::open(config, "list").context("Failed to open host")?;

  let listings = list(&host).context("Failed to list bundles")?;

  if output.is_json() {
    return print_json(&listings);
  }

  if listings.is_empty() {
    print_info("No bundles installed");
    return Ok(());
  }

  for (i, listing) in listings.iter().enumerate() {
    if i > 0 {
      println!();
    }
    print_listing(listing);
  }

  Ok(())
}

fn print_listing(listing: &BundleListing) {
  println!("{}", listing.name.if_supports_color(Stream::Stdout, |s| s.bold()));
  print_field("Description", &listing.description);
  print_field("URL", &listing.url);
  print_field("Binaries", &listing.bin.join(", "));
  print_field("Dependencies", &listing.includes.join(", "));
}

fn print_field(label: &str, value: &str) {
  let value = if value.is_empty() { "-" } else { value };
  let label = format!("{:<13}", format!("{label}:"));
  println!("  {} {}", label.if_supports_color(Stream::Stdout, |s| s.dimmed()), value);
}
