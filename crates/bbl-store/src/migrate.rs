use bbl_domain::STATE_VERSION;
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::error::StoreError;
use crate::paths::StatePaths;

/// Bring a raw record up to [`STATE_VERSION`], one version step at a time.
///
/// Records written by a newer release are rejected rather than downgraded.
pub fn migrate(mut raw: Value, paths: &StatePaths) -> Result<Value, StoreError> {
    let version = raw.get("version").and_then(Value::as_u64).unwrap_or(0);
    let found = match u32::try_from(version) {
        Ok(found) if found <= STATE_VERSION => found,
        _ => return Err(StoreError::NewerVersion { found: version }),
    };

    let record = raw
        .as_object_mut()
        .ok_or_else(|| StoreError::Migration("state record is not a JSON object".into()))?;

    if found < 13 {
        info!(from = found, "migrating state to version 13");
        fold_legacy_jumpbox(record);
        rename_key(record, "bosh", "variables", "varsStore");
        rename_legacy_vars_dir(paths)?;
        record.insert("version".into(), Value::from(13));
    }

    if found < 14 {
        debug!("migrating state to version 14");
        add_default_jumpbox_port(record);
        record.insert("version".into(), Value::from(STATE_VERSION));
    }

    Ok(raw)
}

/// Older records stored `"jumpbox": true` next to a separate
/// `jumpboxDeployment` object.
fn fold_legacy_jumpbox(record: &mut Map<String, Value>) {
    let Some(Value::Bool(enabled)) = record.get("jumpbox").cloned() else {
        return;
    };
    let mut jumpbox = match record.remove("jumpboxDeployment") {
        Some(Value::Object(deployment)) => deployment,
        _ => Map::new(),
    };
    if let Some(vars) = jumpbox.remove("variables") {
        jumpbox.insert("varsStore".into(), vars);
    }
    jumpbox.insert("enabled".into(), Value::Bool(enabled));
    record.insert("jumpbox".into(), Value::Object(jumpbox));
}

fn rename_key(record: &mut Map<String, Value>, section: &str, from: &str, to: &str) {
    if let Some(Value::Object(obj)) = record.get_mut(section) {
        if let Some(value) = obj.remove(from) {
            obj.entry(to.to_string()).or_insert(value);
        }
    }
}

fn rename_legacy_vars_dir(paths: &StatePaths) -> Result<(), StoreError> {
    let legacy = paths.legacy_vars_dir();
    let vars = paths.vars_dir();
    if legacy.is_dir() && !vars.exists() {
        info!(from = %legacy.display(), to = %vars.display(), "renaming legacy vars dir");
        std::fs::rename(&legacy, &vars).map_err(|e| StoreError::io(&legacy, e))?;
    }
    Ok(())
}

fn add_default_jumpbox_port(record: &mut Map<String, Value>) {
    let Some(Value::Object(jumpbox)) = record.get_mut("jumpbox") else {
        return;
    };
    if let Some(Value::String(url)) = jumpbox.get_mut("url") {
        if !url.is_empty() && !url.contains(':') {
            url.push_str(":22");
        }
    }
}
