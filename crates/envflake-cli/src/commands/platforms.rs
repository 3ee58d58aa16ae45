use super::{json_pretty, load, EXIT_SUCCESS};
use envflake_schema::Platform;
use std::path::Path;

pub fn run(descriptor_path: &Path, json: bool) -> Result<u8, String> {
    let descriptor = load(descriptor_path)?;
    let host = Platform::host();

    if json {
        let platforms: Vec<_> = descriptor
            .shells()
            .map(|shell| {
                serde_json::json!({
                    "platform": shell.platform,
                    "host": Some(shell.platform) == host,
                    "library": shell.library.len(),
                    "tooling": shell.tooling.len(),
                })
            })
            .collect();
        println!("{}", json_pretty(&platforms)?);
    } else {
        for shell in descriptor.shells() {
            let marker = if Some(shell.platform) == host { "*" } else { " " };
            println!(
                "{marker} {:<16} {} library, {} tooling",
                shell.platform.as_str(),
                shell.library.len(),
                shell.tooling.len()
            );
        }
    }
    Ok(EXIT_SUCCESS)
}
