//! Participant identities and per-side bookkeeping.

use std::ops::{Index, IndexMut};

use serde::{Deserialize, Serialize};

/// One of the two participants in a match.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::Display,
    strum::AsRefStr,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum Side {
    SideA,
    SideB,
}

impl Side {
    /// Both sides in canonical order.
    pub const BOTH: [Side; 2] = [Side::SideA, Side::SideB];

    pub const fn opponent(self) -> Side {
        match self {
            Side::SideA => Side::SideB,
            Side::SideB => Side::SideA,
        }
    }

    /// Human-readable label used in round descriptions.
    pub const fn label(self) -> &'static str {
        match self {
            Side::SideA => "Side A",
            Side::SideB => "Side B",
        }
    }
}

/// Final result of a match.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum Outcome {
    SideA,
    SideB,
    Draw,
}

impl Outcome {
    /// Compares two scores; the strictly greater one wins.
    pub fn from_scores<T: PartialOrd>(side_a: T, side_b: T) -> Self {
        if side_a > side_b {
            Outcome::SideA
        } else if side_b > side_a {
            Outcome::SideB
        } else {
            Outcome::Draw
        }
    }

    pub const fn side(self) -> Option<Side> {
        match self {
            Outcome::SideA => Some(Side::SideA),
            Outcome::SideB => Some(Side::SideB),
            Outcome::Draw => None,
        }
    }
}

impl From<Side> for Outcome {
    fn from(side: Side) -> Self {
        match side {
            Side::SideA => Outcome::SideA,
            Side::SideB => Outcome::SideB,
        }
    }
}

/// A value held once per side, serialized as `{"sideA": .., "sideB": ..}`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerSide<T> {
    pub side_a: T,
    pub side_b: T,
}

impl<T> PerSide<T> {
    pub const fn new(side_a: T, side_b: T) -> Self {
        Self { side_a, side_b }
    }

    /// Builds both entries from a per-side constructor.
    pub fn from_fn(mut f: impl FnMut(Side) -> T) -> Self {
        Self {
            side_a: f(Side::SideA),
            side_b: f(Side::SideB),
        }
    }

    pub fn get(&self, side: Side) -> &T {
        match side {
            Side::SideA => &self.side_a,
            Side::SideB => &self.side_b,
        }
    }

    pub fn get_mut(&mut self, side: Side) -> &mut T {
        match side {
            Side::SideA => &mut self.side_a,
            Side::SideB => &mut self.side_b,
        }
    }

    pub fn map<U>(self, mut f: impl FnMut(T) -> U) -> PerSide<U> {
        PerSide {
            side_a: f(self.side_a),
            side_b: f(self.side_b),
        }
    }

    pub fn as_ref(&self) -> PerSide<&T> {
        PerSide {
            side_a: &self.side_a,
            side_b: &self.side_b,
        }
    }
}

impl<T: Clone> PerSide<T> {
    pub fn splat(value: T) -> Self {
        Self {
            side_a: value.clone(),
            side_b: value,
        }
    }
}

impl<T> Index<Side> for PerSide<T> {
    type Output = T;

    fn index(&self, side: Side) -> &T {
        self.get(side)
    }
}

impl<T> IndexMut<Side> for PerSide<T> {
    fn index_mut(&mut self, side: Side) -> &mut T {
        self.get_mut(side)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sides_serialize_as_camel_case() {
        assert_eq!(serde_json::to_string(&Side::SideA).unwrap(), "\"sideA\"");
        assert_eq!(Side::SideB.to_string(), "sideB");

        let scores = PerSide::new(3, 7);
        assert_eq!(
            serde_json::to_value(scores).unwrap(),
            serde_json::json!({"sideA": 3, "sideB": 7})
        );
    }

    #[test]
    fn outcome_from_scores() {
        assert_eq!(Outcome::from_scores(5, 2), Outcome::SideA);
        assert_eq!(Outcome::from_scores(2, 5), Outcome::SideB);
        assert_eq!(Outcome::from_scores(4, 4), Outcome::Draw);
    }

    #[test]
    fn index_by_side() {
        let mut credits = PerSide::splat(1000u32);
        credits[Side::SideB] -= 150;
        assert_eq!(credits[Side::SideA], 1000);
        assert_eq!(credits[Side::SideB], 850);
        assert_eq!(Side::SideA.opponent(), Side::SideB);
    }
}
