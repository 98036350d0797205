use semver::Version;

use crate::error::DriverError;

pub const MINIMUM_BOSH_VERSION: &str = "2.0.48";
pub const MINIMUM_TERRAFORM_VERSION: &str = "1.0.0";

/// Parse versions as printed by CLIs: `v1.5.7`, `2.0.48-e94aeeb-2018-01-09T23:08:07Z`.
/// Build suffixes are ignored.
pub fn parse_loose(raw: &str) -> Option<Version> {
    let trimmed = raw.trim().trim_start_matches('v');
    let core: String = trimmed
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    let mut parts: Vec<&str> = core.split('.').filter(|p| !p.is_empty()).collect();
    if parts.is_empty() || parts.len() > 3 {
        return None;
    }
    while parts.len() < 3 {
        parts.push("0");
    }
    Version::parse(&parts.join(".")).ok()
}

/// Fail with `VersionTooOld` when `found` is below `minimum`.
pub fn check_minimum(tool: &'static str, found: &str, minimum: &'static str) -> Result<(), DriverError> {
    let parsed = parse_loose(found)
        .ok_or_else(|| DriverError::Internal(format!("{tool} version {found:?} could not be parsed")))?;
    let required = parse_loose(minimum)
        .ok_or_else(|| DriverError::Internal(format!("bad minimum version {minimum:?}")))?;
    if parsed < required {
        return Err(DriverError::VersionTooOld { tool, minimum, found: parsed.to_string() });
    }
    Ok(())
}
