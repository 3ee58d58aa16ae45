use super::{json_pretty, load, lock_error, sibling_lock_path, EXIT_SUCCESS};
use envflake_schema::{InputName, LockFile, Revision};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::warn;

pub fn run(
    descriptor_path: &Path,
    revs: &[(InputName, Revision)],
    verify: bool,
    json: bool,
) -> Result<u8, String> {
    let descriptor = load(descriptor_path)?;
    let lock_path = sibling_lock_path(descriptor_path);

    if verify {
        let lock = LockFile::read_from_file(&lock_path).map_err(|e| lock_error(&e))?;
        lock.verify_integrity().map_err(|e| lock_error(&e))?;
        lock.verify_descriptor_intent(&descriptor).map_err(|e| lock_error(&e))?;
        if json {
            let payload = serde_json::json!({
                "status": "verified",
                "lock": lock_path,
                "lock_id": lock.lock_id,
            });
            println!("{}", json_pretty(&payload)?);
        } else {
            println!("lock file {} is up to date ({})", lock_path.display(), lock.short_id);
        }
        return Ok(EXIT_SUCCESS);
    }

    let mut revisions = BTreeMap::new();
    for (name, rev) in revs {
        if let Some(previous) = revisions.insert(name.clone(), rev.clone()) {
            warn!("--rev given twice for {name}; using {rev} over {previous}");
        }
    }

    let lock = LockFile::from_descriptor(&descriptor, &revisions).map_err(|e| lock_error(&e))?;
    lock.write_to_file(&lock_path).map_err(|e| lock_error(&e))?;

    if json {
        let payload = serde_json::json!({
            "status": "written",
            "lock": lock_path,
            "lock_id": lock.lock_id,
            "inputs": lock.inputs.len(),
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        println!(
            "wrote {} ({} inputs, {})",
            lock_path.display(),
            lock.inputs.len(),
            lock.short_id
        );
    }
    Ok(EXIT_SUCCESS)
}
