//! Credential resolution.
//!
//! The recovery phrase reaches the bridge either through the
//! `DYDX_MNEMONIC_SECRET` environment variable (the hardened path, so the
//! secret never transits stdin) or through the legacy in-band `mnemonic`
//! request field. It is held in a newtype whose Debug output is redacted and
//! it flows only into wallet derivation, never into logs or results.

use std::fmt;

use crate::error::BridgeError;

pub const MNEMONIC_ENV: &str = "DYDX_MNEMONIC_SECRET";

#[derive(Clone)]
pub struct Mnemonic(String);

impl Mnemonic {
    /// Resolves the credential for this invocation. The environment variable
    /// wins over the in-band field; an empty or missing phrase is rejected
    /// before any network activity.
    pub fn resolve(inline: Option<&str>) -> Result<Self, BridgeError> {
        Self::resolve_with(std::env::var(MNEMONIC_ENV).ok(), inline)
    }

    fn resolve_with(env: Option<String>, inline: Option<&str>) -> Result<Self, BridgeError> {
        let raw = env
            .filter(|s| !s.trim().is_empty())
            .or_else(|| inline.map(str::to_string))
            .unwrap_or_default();

        // Phrases pasted from backups often carry stray whitespace.
        let phrase = raw.split_whitespace().collect::<Vec<_>>().join(" ");
        if phrase.is_empty() {
            return Err(BridgeError::MissingMnemonic);
        }
        Ok(Self(phrase))
    }

    pub fn phrase(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Mnemonic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Mnemonic(<redacted>)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_wins_over_inline() {
        let m = Mnemonic::resolve_with(Some("alpha bravo".into()), Some("charlie delta")).unwrap();
        assert_eq!(m.phrase(), "alpha bravo");
    }

    #[test]
    fn inline_is_the_fallback() {
        let m = Mnemonic::resolve_with(None, Some("charlie delta")).unwrap();
        assert_eq!(m.phrase(), "charlie delta");

        let m = Mnemonic::resolve_with(Some("   ".into()), Some("charlie delta")).unwrap();
        assert_eq!(m.phrase(), "charlie delta");
    }

    #[test]
    fn whitespace_is_normalized() {
        let m = Mnemonic::resolve_with(Some("  mirror   actor\twait \n".into()), None).unwrap();
        assert_eq!(m.phrase(), "mirror actor wait");
    }

    #[test]
    fn empty_phrase_is_rejected() {
        let err = Mnemonic::resolve_with(None, None).unwrap_err();
        assert_eq!(err.to_string(), "mnemonic is required");

        let err = Mnemonic::resolve_with(None, Some("")).unwrap_err();
        assert_eq!(err.to_string(), "mnemonic is required");
    }

    #[test]
    fn debug_output_is_redacted() {
        let m = Mnemonic::resolve_with(Some("mirror actor wait".into()), None).unwrap();
        let shown = format!("{m:?}");
        assert!(!shown.contains("mirror"));
        assert_eq!(shown, "Mnemonic(<redacted>)");
    }
}
