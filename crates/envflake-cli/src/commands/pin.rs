use super::{descriptor_error, json_pretty, write_atomic, EXIT_SUCCESS};
use envflake_schema::{parse_descriptor_file, DescriptorError, InputName, Revision};
use std::path::Path;
use tracing::info;

pub fn run(
    descriptor_path: &Path,
    check: bool,
    set: &[(InputName, Revision)],
    json: bool,
) -> Result<u8, String> {
    let mut raw = parse_descriptor_file(descriptor_path).map_err(|e| descriptor_error(&e))?;

    if check {
        let resolved = raw.resolve().map_err(|e| descriptor_error(&e))?;
        let unpinned: Vec<&str> = resolved
            .inputs()
            .filter(|i| !i.is_pinned())
            .map(|i| i.name.as_str())
            .collect();
        if unpinned.is_empty() {
            if json {
                let payload = serde_json::json!({
                    "status": "pinned",
                    "descriptor": descriptor_path,
                });
                println!("{}", json_pretty(&payload)?);
            }
            return Ok(EXIT_SUCCESS);
        }
        return Err(format!(
            "inputs not pinned: {} (run 'envflake pin --set <input>=<rev>')",
            unpinned.join(", ")
        ));
    }

    if set.is_empty() {
        return Err("nothing to pin: pass --check or --set <input>=<rev>".to_owned());
    }

    for (name, rev) in set {
        let Some(decl) = raw.inputs.get_mut(name.as_str()) else {
            let e = DescriptorError::UnresolvedInput {
                input: name.to_string(),
                referrer: "pin --set".to_owned(),
            };
            return Err(descriptor_error(&e));
        };
        info!("pinning {name} to {rev}");
        decl.set_rev(rev.as_str());
    }

    // Re-validate before touching the file: a rev is rejected for tarball
    // and path inputs.
    raw.resolve().map_err(|e| descriptor_error(&e))?;

    let toml =
        toml::to_string_pretty(&raw).map_err(|e| format!("TOML serialization failed: {e}"))?;
    write_atomic(descriptor_path, &toml)?;

    if json {
        let pinned: Vec<_> = set
            .iter()
            .map(|(name, rev)| serde_json::json!({ "input": name, "rev": rev }))
            .collect();
        let payload = serde_json::json!({
            "status": "pinned",
            "descriptor": descriptor_path,
            "inputs": pinned,
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        for (name, rev) in set {
            println!("pinned {name} to {rev} in {}", descriptor_path.display());
        }
    }

    Ok(EXIT_SUCCESS)
}
