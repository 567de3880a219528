use std::path::Path;

use anyhow::{Context as _, Result};

pub fn run(path: &Path) -> Result<()> {
    let fingerprint = modweave::fingerprint_file(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    println!("{}", fingerprint);
    Ok(())
}
