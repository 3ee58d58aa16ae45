use super::{json_pretty, load, EXIT_SUCCESS};
use envflake_schema::compute_descriptor_id;
use std::path::Path;

pub fn run(descriptor_path: &Path, json: bool) -> Result<u8, String> {
    let descriptor = load(descriptor_path)?;
    let identity = compute_descriptor_id(&descriptor);
    if json {
        println!("{}", json_pretty(&identity)?);
    } else {
        println!("{}", identity.descriptor_id);
    }
    Ok(EXIT_SUCCESS)
}
