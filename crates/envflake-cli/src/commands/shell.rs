use super::{descriptor_error, json_pretty, load, EXIT_SUCCESS};
use envflake_schema::{PackageRef, Platform};
use std::path::Path;

fn print_list(label: &str, packages: &[PackageRef]) {
    println!("{label} ({}):", packages.len());
    for pkg in packages {
        println!("  {pkg}");
    }
}

pub fn run(descriptor_path: &Path, platform: Platform, json: bool) -> Result<u8, String> {
    let descriptor = load(descriptor_path)?;
    let shell = descriptor
        .shell(platform)
        .map_err(|e| descriptor_error(&e))?;

    if json {
        println!("{}", json_pretty(shell)?);
    } else {
        println!("platform: {}", shell.platform);
        print_list("library", &shell.library);
        print_list("tooling", &shell.tooling);
    }
    Ok(EXIT_SUCCESS)
}
