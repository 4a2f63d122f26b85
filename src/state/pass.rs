use std::fmt;

/// The engine passes that can run against a store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pass {
    /// Paginated discovery of item URLs from seed URLs
    Traversal,

    /// Visits items without info and extracts it
    InfoFill,

    /// Visits every item and re-extracts its info
    InfoRefresh,

    /// Follows a URL stored inside each item's info
    Hydration,
}

impl Pass {
    /// Short machine-friendly name, used as a structured log field
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Traversal => "traversal",
            Self::InfoFill => "info_fill",
            Self::InfoRefresh => "info_refresh",
            Self::Hydration => "hydration",
        }
    }

    /// Returns true for the passes that walk stored items rather than pages
    pub fn is_item_pass(&self) -> bool {
        !matches!(self, Self::Traversal)
    }
}

impl fmt::Display for Pass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Traversal => "traversal pass",
            Self::InfoFill => "info-fill pass",
            Self::InfoRefresh => "info-refresh pass",
            Self::Hydration => "hydration pass",
        };
        f.write_str(name)
    }
}
