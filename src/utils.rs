//! Identifier helpers

use crate::error::{FreightError, FreightResult};
use bech32::Bech32m;
use uuid7::uuid7;

// construct a unique id then encode using bech32, the hrp names the entity kind
pub fn new_id(hrp: &str) -> FreightResult<String> {
    let hrp = bech32::Hrp::parse(hrp)
        .map_err(|e| FreightError::internal(format!("invalid id prefix {hrp:?}: {e}")))?;
    bech32::encode::<Bech32m>(hrp, uuid7().as_bytes())
        .map_err(|e| FreightError::internal(format!("failed to encode id: {e}")))
}

pub fn new_trace_id() -> String {
    uuid7().to_string()
}
