//! Service resolution
//!
//! A configured service name is compiled as a regular expression and matched
//! against the cluster's service identifiers. The first identifier in listing
//! order that matches wins.

use regex::Regex;
use tracing::{debug, warn};

use crate::error::{DiscoveryError, DiscoveryResult};

/// Compile a configured service name
pub fn compile_pattern(pattern: &str) -> DiscoveryResult<Regex> {
    Regex::new(pattern).map_err(|source| DiscoveryError::Pattern {
        pattern: pattern.to_string(),
        source,
    })
}

/// Resolve one configured service name to the first matching service identifier
pub fn resolve_service<'a>(pattern: &str, services: &'a [String]) -> DiscoveryResult<&'a str> {
    let regex = compile_pattern(pattern)?;

    match services.iter().find(|service| regex.is_match(service)) {
        Some(service) => {
            debug!(pattern, service = %service, "Resolved service");
            Ok(service.as_str())
        }
        None => {
            warn!(pattern, candidates = services.len(), "No service matched configured name");
            Err(DiscoveryError::Resolution {
                pattern: pattern.to_string(),
            })
        }
    }
}
