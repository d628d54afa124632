use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Declare every `src/checks/<name>/mod.rs` as a module so registering a check
/// only takes adding its directory.
fn main() -> io::Result<()> {
    println!("cargo:rerun-if-changed=src/checks/");

    let manifest_dir = env::var_os("CARGO_MANIFEST_DIR")
        .map(PathBuf::from)
        .ok_or_else(|| io::Error::other("CARGO_MANIFEST_DIR is not set"))?;
    let out_dir = env::var_os("OUT_DIR")
        .map(PathBuf::from)
        .ok_or_else(|| io::Error::other("OUT_DIR is not set"))?;

    let declarations: String = check_modules(&manifest_dir.join("src/checks"))?
        .into_iter()
        .map(|(name, path)| format!("#[path = {path:?}]\npub(crate) mod {name};\n"))
        .collect();
    fs::write(out_dir.join("check_modules.rs"), declarations)
}

fn check_modules(checks_dir: &Path) -> io::Result<Vec<(String, PathBuf)>> {
    let mut modules = Vec::new();
    for entry in fs::read_dir(checks_dir)? {
        let entry = entry?;
        let module = entry.path().join("mod.rs");
        if entry.file_type()?.is_dir() && module.is_file() {
            modules.push((entry.file_name().to_string_lossy().into_owned(), module));
        }
    }
    modules.sort();
    Ok(modules)
}
