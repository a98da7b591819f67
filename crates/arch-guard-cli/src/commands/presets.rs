//! Presets command implementation.

use anyhow::Result;
use std::path::Path;

use super::GlobalOptions;

/// Lists registered presets, or describes one.
pub fn run(name: Option<&str>, options: &GlobalOptions) -> Result<()> {
    let manifest = options.manifest(Path::new("."))?;
    let registry = &manifest.registry;

    let Some(name) = name else {
        println!("Available presets:\n");
        for summary in registry.list() {
            println!("  {:<12} {}", summary.name, summary.description);
        }
        return Ok(());
    };

    let preset = registry.get(name)?;
    println!("{} - {}\n", preset.name, preset.description);
    println!("Layers (most core first):");
    for (rank, layer) in preset.hierarchy.iter().enumerate() {
        println!("  {rank}  {layer}");
    }
    if !preset.exceptions.is_empty() {
        println!("\nExceptions:");
        for (from, to) in &preset.exceptions {
            println!("  {from} may import {}", to.join(", "));
        }
    }
    if let Some(routes) = &preset.fs_route_rules {
        println!("\nFile-system routes in `{}`:", routes.route_layer);
        println!("  page   -> {}", routes.page_can_import.join(", "));
        println!("  layout -> {}", routes.layout_can_import.join(", "));
        println!("  route  -> {}", routes.route_can_import.join(", "));
        if routes.no_page_to_page {
            println!("  pages may not import other pages");
        }
    }
    Ok(())
}
