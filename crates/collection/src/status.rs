//! Collection status lifecycle (spec.md §3 "status ∈ {...}").

/// A collection's position in its sync lifecycle.
///
/// Transitions form a DAG: `Idle -> Loading -> InitialCommit -> Ready`;
/// `Ready -> CleanedUp` once `gcTime` elapses with zero subscribers;
/// `Error` is terminal until an explicit reset back to `Idle`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Status {
    Idle,
    Loading,
    /// The sync source has committed at least one frame but has not yet
    /// called `markReady`. Treated as loading for `isLoading` purposes
    /// (spec.md §9 open question, resolved in SPEC_FULL.md §9).
    InitialCommit,
    Ready,
    Error { message: String },
    CleanedUp,
}

impl Status {
    pub fn is_loading(&self) -> bool {
        matches!(self, Status::Loading | Status::InitialCommit)
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Status::Ready)
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, Status::Idle)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Status::Error { .. })
    }

    pub fn is_cleaned_up(&self) -> bool {
        matches!(self, Status::CleanedUp)
    }

    /// True once the collection has committed its first sync frame or
    /// later — the threshold `preload()` waits for (spec.md §4.1).
    pub fn at_least_initial_commit(&self) -> bool {
        matches!(self, Status::InitialCommit | Status::Ready)
    }

    /// Whether `to` is a legal transition from `self`, per the status DAG.
    pub fn can_transition_to(&self, to: &Status) -> bool {
        use Status::*;
        match (self, to) {
            (Idle, Loading) => true,
            (Loading, InitialCommit) => true,
            (Loading, Ready) => true,
            (InitialCommit, Ready) => true,
            (Ready, CleanedUp) => true,
            (_, CleanedUp) => true,
            (_, Error { .. }) => true,
            (Error { .. }, Idle) => true,
            (a, b) => a == b,
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Status::Idle => write!(f, "idle"),
            Status::Loading => write!(f, "loading"),
            Status::InitialCommit => write!(f, "initialCommit"),
            Status::Ready => write!(f, "ready"),
            Status::Error { message } => write!(f, "error: {message}"),
            Status::CleanedUp => write!(f, "cleaned-up"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_transitions_are_legal() {
        assert!(Status::Idle.can_transition_to(&Status::Loading));
        assert!(Status::Loading.can_transition_to(&Status::InitialCommit));
        assert!(Status::InitialCommit.can_transition_to(&Status::Ready));
        assert!(Status::Ready.can_transition_to(&Status::CleanedUp));
    }

    #[test]
    fn error_is_reachable_from_anywhere_and_resettable() {
        assert!(Status::Loading.can_transition_to(&Status::Error { message: "x".into() }));
        assert!(Status::Ready.can_transition_to(&Status::Error { message: "x".into() }));
        assert!(Status::Error { message: "x".into() }.can_transition_to(&Status::Idle));
    }

    #[test]
    fn initial_commit_counts_as_loading_for_is_loading() {
        assert!(Status::InitialCommit.is_loading());
        assert!(Status::InitialCommit.at_least_initial_commit());
    }

    #[test]
    fn backwards_transition_is_illegal() {
        assert!(!Status::Ready.can_transition_to(&Status::Loading));
    }
}
