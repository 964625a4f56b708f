//! Version command implementation.

use anyhow::Result;

pub fn run(json: bool) -> Result<()> {
    let version = env!("CARGO_PKG_VERSION");
    if json {
        println!("{}", serde_json::json!({ "version": version }));
    } else {
        println!("swell {version}");
    }
    Ok(())
}
