//! Adapter listing

use anyhow::Result;

use super::output::Output;
use crate::engine::Engine;

/// Lists registered adapters with their capabilities and file locations
pub fn list(output: &Output) -> Result<()> {
    let engine = Engine::default();
    let registry = engine.registry();

    if output.is_json() {
        let items: Vec<_> = registry
            .iter()
            .map(|adapter| {
                serde_json::json!({
                    "name": adapter.name(),
                    "capabilities": adapter.capabilities(),
                    "mergePolicy": adapter.merge_policy(),
                    "locations": adapter.locations(),
                })
            })
            .collect();
        output.data(&items);
        return Ok(());
    }

    println!("{:<16} {:<9} {:<6} {:<12} LOCATIONS", "NAME", "GENERATE", "PARSE", "SCOPE");
    println!("{}", "-".repeat(72));
    for adapter in registry.iter() {
        let caps = adapter.capabilities();
        println!(
            "{:<16} {:<9} {:<6} {:<12} {}",
            adapter.name(),
            if caps.supports_generate { "yes" } else { "no" },
            if caps.supports_parse { "yes" } else { "no" },
            caps.file_location_scope,
            adapter.locations().join(", ")
        );
    }

    Ok(())
}
