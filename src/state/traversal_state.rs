/// Traversal state definitions for one seed's pagination chain
///
/// Every seed walks `Seeded -> Fetching -> Extracting -> Persisting -> Advancing`
/// and loops back to `Fetching` until no next page is produced.
use std::fmt;

/// Represents where a seed's traversal currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TraversalState {
    /// Seed URL has become the current target
    Seeded,

    /// The fetch backend is loading the current target
    Fetching,

    /// Item extractors are running over the fetched view
    Extracting,

    /// Extracted URLs and pairs are being committed
    Persisting,

    /// The next-page extractor is deciding whether to continue
    Advancing,

    /// No further pages for this seed
    Done,
}

impl TraversalState {
    /// Returns true if no further work happens for this seed
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// Returns true if `next` is a legal successor of this state
    ///
    /// A failed fetch and a cancellation both move straight to `Done`,
    /// so `Done` is reachable from every non-terminal state.
    pub fn can_transition_to(&self, next: TraversalState) -> bool {
        use TraversalState::*;
        match (self, next) {
            (Done, _) => false,
            (_, Done) => true,
            (Seeded, Fetching) => true,
            (Fetching, Extracting) => true,
            (Extracting, Persisting) => true,
            (Persisting, Advancing) => true,
            (Advancing, Fetching) => true,
            _ => false,
        }
    }

    /// Short name used in diagnostics
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Seeded => "seeded",
            Self::Fetching => "fetching",
            Self::Extracting => "extracting",
            Self::Persisting => "persisting",
            Self::Advancing => "advancing",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for TraversalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
