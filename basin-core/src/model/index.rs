use std::fmt;

/// Position of a member within an indexed family.
///
/// Time entries are positions within the model's [`TimeSet`](crate::TimeSet),
/// not time values.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(
    feature = "serde-derive",
    derive(serde::Serialize, serde::Deserialize)
)]
pub enum Index {
    #[default]
    Scalar,
    Time(usize),
    Member(String),
    TimeMember(usize, String),
}

impl Index {
    /// Creates a `(time, member)` index.
    pub fn time_member(t: usize, member: impl Into<String>) -> Self {
        Index::TimeMember(t, member.into())
    }

    /// Returns the time position, if the index has one.
    #[must_use]
    pub fn time(&self) -> Option<usize> {
        match self {
            Index::Time(t) | Index::TimeMember(t, _) => Some(*t),
            Index::Scalar | Index::Member(_) => None,
        }
    }

    /// Returns the member name, if the index has one.
    #[must_use]
    pub fn member(&self) -> Option<&str> {
        match self {
            Index::Member(m) | Index::TimeMember(_, m) => Some(m),
            Index::Scalar | Index::Time(_) => None,
        }
    }
}

impl fmt::Display for Index {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Index::Scalar => Ok(()),
            Index::Time(t) => write!(f, "[{t}]"),
            Index::Member(m) => write!(f, "[{m}]"),
            Index::TimeMember(t, m) => write!(f, "[{t},{m}]"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn displays_as_bracketed_key() {
        assert_eq!(Index::Scalar.to_string(), "");
        assert_eq!(Index::Time(0).to_string(), "[0]");
        assert_eq!(Index::time_member(2, "S_h2").to_string(), "[2,S_h2]");
    }

    #[test]
    fn exposes_parts() {
        let index = Index::time_member(1, "S_IC");
        assert_eq!(index.time(), Some(1));
        assert_eq!(index.member(), Some("S_IC"));
        assert_eq!(Index::Member("co2".into()).time(), None);
    }
}
