use super::{colorize_pinned, json_pretty, load, EXIT_SUCCESS};
use std::path::Path;

pub fn run(descriptor_path: &Path, json: bool) -> Result<u8, String> {
    let descriptor = load(descriptor_path)?;

    if json {
        let inputs: Vec<_> = descriptor
            .inputs()
            .map(|input| {
                serde_json::json!({
                    "name": input.name,
                    "locator": input.locator.to_string(),
                    "kind": input.locator.kind(),
                    "rev": input.rev(),
                    "pinned": input.is_pinned(),
                    "follows": input.follows,
                })
            })
            .collect();
        println!("{}", json_pretty(&inputs)?);
        return Ok(EXIT_SUCCESS);
    }

    if descriptor.inputs().next().is_none() {
        println!("no inputs declared");
        return Ok(EXIT_SUCCESS);
    }

    let width = descriptor
        .inputs()
        .map(|i| i.name.len())
        .max()
        .unwrap_or(0);
    for input in descriptor.inputs() {
        println!(
            "{:<width$}  {}  {}",
            input.name.as_str(),
            input.locator,
            colorize_pinned(input.is_pinned())
        );
        for (sub_input, target) in &input.follows {
            println!("{:<width$}    {sub_input} follows {target}", "");
        }
    }
    for overlay in descriptor.overlays() {
        println!("overlay: {overlay}");
    }
    Ok(EXIT_SUCCESS)
}
