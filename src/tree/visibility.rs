//! Hidden-object visibility scope.

/// Which nodes a lookup may return.
///
/// Chosen once per call from the caller's capability; every read below the
/// service layer receives the chosen scope instead of the raw flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    /// Hidden and visible nodes alike.
    All,
    /// Visible nodes only. A hidden folder also hides everything below it.
    VisibleOnly,
}

impl Visibility {
    /// Map the "may see hidden objects" capability to a scope.
    pub fn from_capability(may_see_hidden: bool) -> Self {
        if may_see_hidden {
            Visibility::All
        } else {
            Visibility::VisibleOnly
        }
    }

    /// SQL condition appended to a `WHERE` clause.
    pub(crate) fn sql_filter(self) -> &'static str {
        match self {
            Visibility::All => "",
            Visibility::VisibleOnly => " AND is_hidden = 0",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_capability() {
        assert_eq!(Visibility::from_capability(true), Visibility::All);
        assert_eq!(Visibility::from_capability(false), Visibility::VisibleOnly);
    }
}
