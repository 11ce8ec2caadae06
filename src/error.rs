// =============================================================================
// Typed error surface for the engine's library-facing boundary
// =============================================================================
//
// Internal tasks (feed loops, the periodic analytic cycle) use `anyhow` the
// way the rest of this codebase does. `EngineError` exists for the seams a
// caller outside this crate actually touches: applying an update to a
// specific book, constructing the engine from a config. Risk rejections are
// deliberately NOT represented here — per the risk-gate contract they are a
// plain `(bool, Option<String>)`, never an error.
// =============================================================================

use thiserror::Error;

use crate::book::BookKey;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EngineError {
    /// A `BookUpdate` referenced a `(venue, asset, market)` triple outside
    /// the fixed set of live keys.
    #[error("unknown book key: {0:?}")]
    UnknownBookKey(BookKey),

    /// A feed payload could not be parsed into a canonical `BookUpdate`.
    /// Constructed by the feed normalizer; never propagated past it — the
    /// normalizer drops the payload and bumps a counter instead.
    #[error("feed parse failure: {0}")]
    Parse(String),

    /// A config value was outside its valid domain (e.g. a negative capital).
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
