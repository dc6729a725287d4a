/// A value that either came from a remote collaborator or was substituted
/// locally after that collaborator failed.
#[derive(Debug, Clone, PartialEq)]
pub enum Sourced<T> {
    Remote(T),
    Fallback(T),
}

impl<T> Sourced<T> {
    /// Use the remote value when the call succeeded, otherwise log and substitute `fallback`.
    pub fn or_fallback(
        result: anyhow::Result<T>,
        what: &str,
        fallback: impl FnOnce() -> T,
    ) -> Self {
        match result {
            Ok(value) => Self::Remote(value),
            Err(e) => {
                log::warn!("{what} failed, using fallback: {e:#}");
                Self::Fallback(fallback())
            }
        }
    }

    #[must_use]
    pub const fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback(_))
    }

    #[must_use]
    pub fn value(&self) -> &T {
        match self {
            Self::Remote(v) | Self::Fallback(v) => v,
        }
    }

    pub fn into_inner(self) -> T {
        match self {
            Self::Remote(v) | Self::Fallback(v) => v,
        }
    }
}
