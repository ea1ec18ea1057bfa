//! Process-wide, immutable configuration (§5, §9: "global mutable state ->
//! explicit configuration struct"). No singleton — callers build one value
//! and thread it through `Enroll`/`Verify`.

use crate::error::EnrollError;
use crate::types::QuantizerParams;

/// `method`/`network` are constrained to short lowercase ASCII so the
/// resulting DID string is well-formed. Not specified by name in the
/// source spec, but required for §4.5's DID grammar to hold.
fn validate_token(label: &str, value: &str) -> Result<(), EnrollError> {
    let ok = !value.is_empty()
        && value.len() <= 32
        && value
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-');
    if ok {
        Ok(())
    } else {
        Err(EnrollError::InvalidConfig(format!(
            "{label} must match [a-z0-9-]{{1,32}}, got {value:?}"
        )))
    }
}

/// Configuration shared by `Enroll` and `Verify` (§5). Constructed once by
/// the caller; never mutated after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct DecDidConfig {
    /// DID method name, e.g. `"cardano"`.
    pub method: String,
    /// DID network name, e.g. `"mainnet"`.
    pub network: String,
    /// Default quantizer parameters used at enrollment when the caller
    /// does not override them.
    pub default_quantizer_params: QuantizerParams,
}

impl DecDidConfig {
    /// Build a configuration, validating `method` and `network`.
    ///
    /// # Errors
    ///
    /// Returns `EnrollError::InvalidConfig` if either token is empty,
    /// longer than 32 bytes, or contains characters outside `[a-z0-9-]`.
    pub fn new(method: impl Into<String>, network: impl Into<String>) -> Result<Self, EnrollError> {
        let method = method.into();
        let network = network.into();
        validate_token("method", &method)?;
        validate_token("network", &network)?;
        Ok(Self {
            method,
            network,
            default_quantizer_params: QuantizerParams::default(),
        })
    }

    /// Override the default quantizer parameters (builder-style).
    #[must_use]
    pub const fn with_quantizer_params(mut self, params: QuantizerParams) -> Self {
        self.default_quantizer_params = params;
        self
    }
}
