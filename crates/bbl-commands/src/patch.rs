use std::path::{Path, PathBuf};

use tracing::info;

/// Finds operator customisations layered over the generated files so
/// they can be called out before anything is applied.
pub struct PatchDetector {
    root: PathBuf,
}

impl PatchDetector {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        PatchDetector { root: root.into() }
    }

    /// Relative paths of every patch file, sorted. Unreadable dirs are skipped.
    pub fn find(&self) -> Vec<String> {
        let mut found = Vec::new();
        for (dir, is_patch) in [
            ("", is_root_override as fn(&str) -> bool),
            ("terraform", is_terraform_override),
            ("cloud-config", is_ops_file),
            ("bosh-deployment", is_ops_file),
            ("jumpbox-deployment", is_ops_file),
        ] {
            for name in file_names(&self.root.join(dir)) {
                if is_patch(&name) {
                    found.push(if dir.is_empty() { name } else { format!("{dir}/{name}") });
                }
            }
        }
        found.sort();
        found
    }

    pub fn log(&self) {
        let patches = self.find();
        if patches.is_empty() {
            return;
        }
        info!("you have a patched environment; patch files found:");
        for patch in &patches {
            info!("  {patch}");
        }
    }
}

fn file_names(dir: &Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    entries
        .filter_map(Result::ok)
        .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
        .filter_map(|e| e.file_name().into_string().ok())
        .collect()
}

fn is_root_override(name: &str) -> bool {
    name.ends_with("-override.sh")
}

fn is_terraform_override(name: &str) -> bool {
    name.ends_with("_override.tf") || name == "override.tf"
}

fn is_ops_file(name: &str) -> bool {
    name.ends_with("-ops.yml") || name.ends_with("-ops.yaml")
}
