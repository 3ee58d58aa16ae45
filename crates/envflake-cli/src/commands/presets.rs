use super::{json_pretty, EXIT_SUCCESS};
use envflake_schema::list_presets;

pub fn run(json: bool) -> Result<u8, String> {
    let presets = list_presets();
    if json {
        let payload: Vec<_> = presets
            .iter()
            .map(|p| serde_json::json!({ "name": p.name, "description": p.description }))
            .collect();
        println!("{}", json_pretty(&payload)?);
    } else {
        for preset in presets {
            println!("{:<14} {}", preset.name, preset.description);
        }
    }
    Ok(EXIT_SUCCESS)
}
