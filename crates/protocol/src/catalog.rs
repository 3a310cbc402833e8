//! Catalog payload parsing.
//!
//! The catalog endpoint returns a bare JSON array of descriptors. Fetching
//! is done by UI code; this module only owns the shape of the payload.

use crate::descriptor::IntegrationDescriptor;

/// Parses a catalog response body into descriptors.
///
/// Unknown fields are ignored so catalog-side additions do not break older
/// clients. A malformed payload is a transport-level problem for the caller
/// to surface; no partial results are produced.
pub fn parse_catalog(body: &str) -> serde_json::Result<Vec<IntegrationDescriptor>> {
    serde_json::from_str(body)
}
