use super::{json_pretty, load, EXIT_SUCCESS};
use envflake_schema::{compute_descriptor_id, Platform};
use std::path::Path;

pub fn run(descriptor_path: &Path, json: bool) -> Result<u8, String> {
    let descriptor = load(descriptor_path)?;
    let identity = compute_descriptor_id(&descriptor);
    let platforms: Vec<&str> = descriptor.platforms().map(Platform::as_str).collect();
    let unpinned: Vec<&str> = descriptor
        .inputs()
        .filter(|i| !i.is_pinned())
        .map(|i| i.name.as_str())
        .collect();

    if json {
        let payload = serde_json::json!({
            "status": "ok",
            "descriptor": descriptor_path,
            "descriptor_id": identity.descriptor_id,
            "short_id": identity.short_id,
            "inputs": descriptor.inputs().count(),
            "overlays": descriptor.overlays().len(),
            "platforms": platforms,
            "unpinned": unpinned,
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        println!(
            "ok: {} ({} inputs, {} overlays, {} shells) {}",
            descriptor_path.display(),
            descriptor.inputs().count(),
            descriptor.overlays().len(),
            platforms.len(),
            identity.short_id
        );
        if !unpinned.is_empty() {
            println!("unpinned: {}", unpinned.join(", "));
        }
    }
    Ok(EXIT_SUCCESS)
}
