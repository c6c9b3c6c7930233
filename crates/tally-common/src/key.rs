use chrono::NaiveDateTime;
use std::{
    cmp::Ordering,
    fmt::{self, Display},
    hash::{Hash, Hasher},
};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A dimension key: what a record projects to for filtering and grouping.
///
/// Keys are totally ordered so a dimension can keep a sorted index over them:
///
/// * values of different variants order by variant
///   (`Int < Number < Text < Timestamp < Composite`),
/// * `Number` uses IEEE-754 total ordering,
/// * `Composite` compares lexicographically by component, then by length.
///
/// `Eq` and `Hash` agree with that ordering, so keys can live in both
/// `BTreeMap` and hash maps.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone)]
pub enum Key {
    Int(i64),
    Number(f64),
    Text(String),
    Timestamp(NaiveDateTime),
    Composite(Vec<Key>),
}

impl Key {
    pub fn text(s: impl Into<String>) -> Self {
        Key::Text(s.into())
    }

    pub fn composite<I, K>(parts: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<Key>,
    {
        Key::Composite(parts.into_iter().map(Into::into).collect())
    }

    /// False when the key (or any component) is a NaN number.
    ///
    /// NaN has a place in the total order but no meaning as a category, so
    /// dimensions refuse it the same way they refuse a missing key.
    pub fn is_defined(&self) -> bool {
        match self {
            Key::Number(n) => !n.is_nan(),
            Key::Composite(parts) => parts.iter().all(Key::is_defined),
            _ => true,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Key::Int(i) => Some(*i),
            Key::Number(n) if n.fract() == 0.0 && n.is_finite() => Some(*n as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Key::Int(i) => Some(*i as f64),
            Key::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Key::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            Key::Timestamp(ts) => Some(*ts),
            _ => None,
        }
    }

    /// Components of a composite key; a scalar key is its own single component.
    pub fn components(&self) -> &[Key] {
        match self {
            Key::Composite(parts) => parts,
            other => std::slice::from_ref(other),
        }
    }

    pub fn component(&self, idx: usize) -> Option<&Key> {
        self.components().get(idx)
    }

    fn rank(&self) -> u8 {
        match self {
            Key::Int(_) => 0,
            Key::Number(_) => 1,
            Key::Text(_) => 2,
            Key::Timestamp(_) => 3,
            Key::Composite(_) => 4,
        }
    }
}

impl Ord for Key {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Key::Int(a), Key::Int(b)) => a.cmp(b),
            (Key::Number(a), Key::Number(b)) => a.total_cmp(b),
            (Key::Text(a), Key::Text(b)) => a.cmp(b),
            (Key::Timestamp(a), Key::Timestamp(b)) => a.cmp(b),
            // Vec<Key> ordering is lexicographic, shorter prefix first.
            (Key::Composite(a), Key::Composite(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Key {}

impl Hash for Key {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u8(self.rank());
        match self {
            Key::Int(i) => i.hash(state),
            Key::Number(n) => n.to_bits().hash(state),
            Key::Text(s) => s.hash(state),
            Key::Timestamp(ts) => ts.hash(state),
            Key::Composite(parts) => parts.hash(state),
        }
    }
}

impl Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Int(i) => write!(f, "{i}"),
            Key::Number(n) => write!(f, "{n}"),
            Key::Text(s) => write!(f, "{s}"),
            Key::Timestamp(ts) => write!(f, "{}", ts.format("%Y-%m-%d %H:%M:%S")),
            Key::Composite(parts) => {
                f.write_str("(")?;
                for (i, part) in parts.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{part}")?;
                }
                f.write_str(")")
            }
        }
    }
}

/* ───────────────────────── conversions ───────────────────────── */

macro_rules! key_from_int {
    ($($t:ty),*) => {
        $(impl From<$t> for Key {
            fn from(v: $t) -> Self {
                Key::Int(v as i64)
            }
        })*
    };
}

key_from_int!(i64, i32, i16, i8, u32, u16, u8);

impl From<f64> for Key {
    fn from(v: f64) -> Self {
        Key::Number(v)
    }
}

impl From<&str> for Key {
    fn from(v: &str) -> Self {
        Key::Text(v.to_string())
    }
}

impl From<String> for Key {
    fn from(v: String) -> Self {
        Key::Text(v)
    }
}

impl From<NaiveDateTime> for Key {
    fn from(v: NaiveDateTime) -> Self {
        Key::Timestamp(v)
    }
}

impl<A: Into<Key>, B: Into<Key>> From<(A, B)> for Key {
    fn from((a, b): (A, B)) -> Self {
        Key::Composite(vec![a.into(), b.into()])
    }
}

impl<A: Into<Key>, B: Into<Key>, C: Into<Key>> From<(A, B, C)> for Key {
    fn from((a, b, c): (A, B, C)) -> Self {
        Key::Composite(vec![a.into(), b.into(), c.into()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeSet, HashSet};

    #[test]
    fn composite_orders_lexicographically() {
        let a = Key::from((1u8, 5u8));
        let b = Key::from((1u8, 7u8));
        let c = Key::from((2u8, 0u8));
        assert!(a < b && b < c);

        let short = Key::composite(["a"]);
        let long = Key::composite(["a", "b"]);
        assert!(short < long);
    }

    #[test]
    fn variants_rank_before_values() {
        let mut keys = vec![
            Key::text("19102"),
            Key::Number(-3.5),
            Key::Int(99),
            Key::composite([1]),
        ];
        keys.sort();
        assert_eq!(keys[0], Key::Int(99));
        assert_eq!(keys[1], Key::Number(-3.5));
        assert_eq!(keys[2], Key::text("19102"));
    }

    #[test]
    fn eq_and_hash_follow_ordering() {
        let set: HashSet<Key> = [Key::Number(0.5), Key::Number(0.5), Key::Int(1)]
            .into_iter()
            .collect();
        assert_eq!(set.len(), 2);

        let ordered: BTreeSet<Key> = set.into_iter().collect();
        assert_eq!(ordered.iter().next(), Some(&Key::Int(1)));
    }

    #[test]
    fn nan_is_not_a_defined_key() {
        assert!(!Key::Number(f64::NAN).is_defined());
        assert!(!Key::composite([Key::Int(1), Key::Number(f64::NAN)]).is_defined());
        assert!(Key::text("").is_defined());
    }

    #[test]
    fn display_composite() {
        let key = Key::from(("1200 MARKET ST", "19107", "METER EXPIRED"));
        assert_eq!(key.to_string(), "(1200 MARKET ST, 19107, METER EXPIRED)");
        assert_eq!(key.component(1), Some(&Key::text("19107")));
    }
}
