//! Input points and their categories

use crate::{EngineError, GeoPoint, Result, utils};
use std::fmt;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Point of interest category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Category {
    Restaurant,
    Cafe,
    Museum,
    Park,
    Shop,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Restaurant,
        Category::Cafe,
        Category::Museum,
        Category::Park,
        Category::Shop,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Restaurant => "restaurant",
            Self::Cafe => "cafe",
            Self::Museum => "museum",
            Self::Park => "park",
            Self::Shop => "shop",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        Category::ALL
            .into_iter()
            .find(|category| category.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| EngineError::UnknownCategory(s.to_string()))
    }
}

/// Category selection applied before the cluster index is built
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CategoryFilter {
    #[default]
    All,
    Only(Category),
}

impl CategoryFilter {
    #[inline]
    pub fn matches(&self, category: Category) -> bool {
        match self {
            Self::All => true,
            Self::Only(only) => *only == category,
        }
    }
}

impl fmt::Display for CategoryFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            Self::Only(category) => write!(f, "{category}"),
        }
    }
}

impl FromStr for CategoryFilter {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        if s.trim().eq_ignore_ascii_case("all") {
            Ok(Self::All)
        } else {
            s.parse().map(Self::Only)
        }
    }
}

/// A single point of the clustered dataset
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct InputPoint {
    pub id: String,
    pub category: Category,
    /// Rating-like scalar aggregated by clusters
    pub weight: f64,
    pub position: GeoPoint,
}

impl InputPoint {
    /// Create a point, rejecting coordinates outside the WGS84 ranges
    pub fn new(
        id: impl Into<String>,
        category: Category,
        weight: f64,
        position: GeoPoint,
    ) -> Result<Self> {
        let point = Self {
            id: id.into(),
            category,
            weight,
            position,
        };
        point.validate()?;
        Ok(point)
    }

    /// Check the ingestion invariants (finite weight, valid lng/lat)
    pub fn validate(&self) -> Result<()> {
        if !utils::is_valid_lng_lat(&self.position) {
            return Err(EngineError::InvalidGeometry(format!(
                "point {} has invalid position ({}, {})",
                self.id,
                self.position.x(),
                self.position.y()
            )));
        }
        if !self.weight.is_finite() {
            return Err(EngineError::InvalidGeometry(format!(
                "point {} has non-finite weight",
                self.id
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Point;

    #[test]
    fn test_category_parse() {
        assert_eq!("cafe".parse::<Category>().unwrap(), Category::Cafe);
        assert_eq!(" Museum ".parse::<Category>().unwrap(), Category::Museum);
        assert!("bakery".parse::<Category>().is_err());
    }

    #[test]
    fn test_category_filter_parse() {
        assert_eq!("all".parse::<CategoryFilter>().unwrap(), CategoryFilter::All);
        assert_eq!(
            "park".parse::<CategoryFilter>().unwrap(),
            CategoryFilter::Only(Category::Park)
        );
        assert!("nothing".parse::<CategoryFilter>().is_err());
    }

    #[test]
    fn test_category_filter_matches() {
        assert!(CategoryFilter::All.matches(Category::Shop));
        assert!(CategoryFilter::Only(Category::Shop).matches(Category::Shop));
        assert!(!CategoryFilter::Only(Category::Shop).matches(Category::Cafe));
    }

    #[test]
    fn test_category_filter_display_roundtrip() {
        for filter in [CategoryFilter::All, CategoryFilter::Only(Category::Restaurant)] {
            assert_eq!(filter.to_string().parse::<CategoryFilter>().unwrap(), filter);
        }
    }

    #[test]
    fn test_input_point_validation() {
        assert!(InputPoint::new("a", Category::Cafe, 4.5, Point::new(-122.4, 37.8)).is_ok());
        assert!(InputPoint::new("b", Category::Cafe, 4.5, Point::new(-200.0, 37.8)).is_err());
        assert!(InputPoint::new("c", Category::Cafe, 4.5, Point::new(0.0, 91.0)).is_err());
        assert!(InputPoint::new("d", Category::Cafe, f64::NAN, Point::new(0.0, 0.0)).is_err());
    }
}
