//! JSON-file-per-company key store under `--keys-dir`. One external
//! collaborator: the core
//! never touches the filesystem, so loading/saving identities is entirely
//! the CLI's job.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use cop_core::{CompanyIdentity, CompanyIdentityDocument};

fn path_for(keys_dir: &Path, company: &str) -> PathBuf {
    keys_dir.join(format!("{company}.json"))
}

/// Generate a fresh identity for `company` and write it to `keys_dir`,
/// failing if a file already exists so a re-run never silently overwrites
/// key material.
pub fn generate(keys_dir: &Path, company: &str) -> Result<CompanyIdentity> {
    let path = path_for(keys_dir, company);
    if path.exists() {
        anyhow::bail!("key file already exists for {company:?} at {}", path.display());
    }
    fs::create_dir_all(keys_dir).with_context(|| format!("creating keys dir {}", keys_dir.display()))?;

    let identity = cop_core::generate_company_identity(company);
    let document = identity.to_document();
    let json = serde_json::to_string_pretty(&document)?;
    fs::write(&path, json).with_context(|| format!("writing key file {}", path.display()))?;
    Ok(identity)
}

/// Load a previously generated identity. Fails loudly if the file is
/// missing — there is no fallback or lazy generation here.
pub fn load(keys_dir: &Path, company: &str) -> Result<CompanyIdentity> {
    let path = path_for(keys_dir, company);
    let json = fs::read_to_string(&path).with_context(|| format!("no key file for {company:?} at {}", path.display()))?;
    let document: CompanyIdentityDocument = serde_json::from_str(&json)?;
    cop_core::CompanyIdentity::from_document(&document).with_context(|| format!("key file for {company:?} is corrupt"))
}

/// Every company name with a key file under `keys_dir`.
pub fn list(keys_dir: &Path) -> Result<Vec<String>> {
    if !keys_dir.exists() {
        return Ok(Vec::new());
    }
    let mut names = Vec::new();
    for entry in fs::read_dir(keys_dir).with_context(|| format!("reading keys dir {}", keys_dir.display()))? {
        let entry = entry?;
        if let Some(stem) = entry.path().file_stem().and_then(|s| s.to_str()) {
            if entry.path().extension().and_then(|e| e.to_str()) == Some("json") {
                names.push(stem.to_string());
            }
        }
    }
    names.sort();
    Ok(names)
}
