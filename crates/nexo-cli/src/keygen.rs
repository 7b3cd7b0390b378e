//! # Keygen Subcommand
//!
//! Writes `cosigner_{i}.key` (base64 32-byte seed) and `cosigner_{i}.pub`
//! for `i` in `0..count`, the layout the server reads from its key directory.

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use clap::Args;

use nexo_crypto::keystore;
use nexo_crypto::{CosignerId, CosignerKey, CosignerPublic};

/// Arguments for `nexo keygen`.
#[derive(Args, Debug)]
pub struct KeygenArgs {
    /// Number of cosigner key pairs to generate.
    #[arg(long, default_value_t = 3)]
    pub count: usize,
    /// Output directory for the key files.
    #[arg(long, short, default_value = "server/_secrets/dev_cosigners")]
    pub output: PathBuf,
    /// Overwrite existing key files.
    #[arg(long)]
    pub force: bool,
}

/// Execute `nexo keygen`.
pub fn run_keygen(args: &KeygenArgs) -> Result<u8> {
    let generated = generate_keys(args.count, &args.output, args.force)?;
    println!(
        "OK: generated {} cosigner key pair(s) in {}",
        generated.len(),
        args.output.display()
    );
    for c in &generated {
        println!("  {}  {}", c.id, c.public_key.to_base64());
    }
    Ok(0)
}

/// Generate `count` key pairs into `dir`. Refuses to clobber an existing
/// `.key` file unless `force` is set.
pub fn generate_keys(count: usize, dir: &Path, force: bool) -> Result<Vec<CosignerPublic>> {
    if count == 0 {
        bail!("--count must be at least 1");
    }
    if !force {
        if let Some(existing) = (0..count)
            .map(|i| keystore::key_file(dir, i))
            .find(|p| p.exists())
        {
            bail!(
                "{} already exists; pass --force to overwrite",
                existing.display()
            );
        }
    }

    let mut out = Vec::with_capacity(count);
    for i in 0..count {
        let key = CosignerKey::generate(CosignerId::indexed(i));
        keystore::write_key_files(dir, i, &key)?;
        tracing::info!(cosigner = %key.id(), "wrote key pair");
        out.push(key.to_public());
    }
    Ok(out)
}
