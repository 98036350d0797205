use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::error::DriverError;

/// Terraform outputs keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Outputs {
    map: BTreeMap<String, Value>,
}

impl Outputs {
    pub fn new(map: BTreeMap<String, Value>) -> Self {
        Outputs { map }
    }

    /// Parse `terraform output -json`, which wraps every value as
    /// `{"value": ..., "type": ..., "sensitive": ...}`.
    pub fn from_terraform_json(raw: &str) -> Result<Self, DriverError> {
        if raw.trim().is_empty() {
            return Ok(Outputs::default());
        }
        let parsed: BTreeMap<String, Value> = serde_json::from_str(raw)
            .map_err(|e| DriverError::Internal(format!("parse terraform output: {e}")))?;
        let map = parsed
            .into_iter()
            .map(|(k, v)| match v {
                Value::Object(mut o) => (k, o.remove("value").unwrap_or(Value::Null)),
                other => (k, other),
            })
            .collect();
        Ok(Outputs { map })
    }

    /// A missing key yields `""`.
    pub fn get_string(&self, key: &str) -> Result<String, DriverError> {
        match self.map.get(key) {
            None | Some(Value::Null) => Ok(String::new()),
            Some(Value::String(s)) => Ok(s.clone()),
            Some(_) => Err(DriverError::OutputType { key: key.to_string(), expected: "string" }),
        }
    }

    /// A missing key yields an empty list.
    pub fn get_string_slice(&self, key: &str) -> Result<Vec<String>, DriverError> {
        let mismatch = || DriverError::OutputType { key: key.to_string(), expected: "list of strings" };
        match self.map.get(key) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| item.as_str().map(str::to_string).ok_or_else(mismatch))
                .collect(),
            Some(_) => Err(mismatch()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn map(&self) -> &BTreeMap<String, Value> {
        &self.map
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn outputs() -> Outputs {
        Outputs::from_terraform_json(
            &json!({
                "vpc_id": {"value": "vpc-123", "type": "string", "sensitive": false},
                "zones": {"value": ["us-east-1a", "us-east-1b"], "type": ["list", "string"]},
                "count": {"value": 3, "type": "number"}
            })
            .to_string(),
        )
        .unwrap()
    }

    #[test]
    fn strings_and_lists() {
        let outputs = outputs();
        assert_eq!(outputs.get_string("vpc_id").unwrap(), "vpc-123");
        assert_eq!(outputs.get_string_slice("zones").unwrap(), ["us-east-1a", "us-east-1b"]);
    }

    #[test]
    fn missing_keys_are_empty() {
        let outputs = outputs();
        assert_eq!(outputs.get_string("nope").unwrap(), "");
        assert!(outputs.get_string_slice("nope").unwrap().is_empty());
        assert!(Outputs::from_terraform_json("  \n").unwrap().is_empty());
    }

    #[test]
    fn shape_mismatch_is_explicit() {
        let outputs = outputs();
        let err = outputs.get_string("zones").unwrap_err();
        assert_eq!(err.to_string(), "terraform output \"zones\" is not a string");
        assert!(matches!(
            outputs.get_string_slice("count"),
            Err(DriverError::OutputType { expected: "list of strings", .. })
        ));
    }
}
