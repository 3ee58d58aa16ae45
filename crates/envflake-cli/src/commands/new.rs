use super::{descriptor_error, json_pretty, write_atomic, EXIT_SUCCESS};
use envflake_schema::{get_preset, list_presets, load_descriptor_str, Preset};
use std::path::Path;

fn find_preset(name: &str) -> Result<&'static Preset, String> {
    get_preset(name).ok_or_else(|| {
        let known: Vec<&str> = list_presets().iter().map(|p| p.name).collect();
        format!("unknown template '{name}' (expected: {})", known.join(", "))
    })
}

pub fn run(template: &str, dest: &Path, force: bool, json: bool) -> Result<u8, String> {
    let preset = find_preset(template)?;
    if dest.exists() && !force {
        return Err(format!(
            "refusing to overwrite existing {} (pass --force)",
            dest.display()
        ));
    }

    load_descriptor_str(preset.descriptor).map_err(|e| descriptor_error(&e))?;
    write_atomic(dest, preset.descriptor)?;

    if json {
        let payload = serde_json::json!({
            "status": "written",
            "path": dest,
            "template": preset.name,
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        println!("wrote {} from template '{}'", dest.display(), preset.name);
    }
    Ok(EXIT_SUCCESS)
}
