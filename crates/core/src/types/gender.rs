//! Gender tag carried by catalog products.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Error returned when a gender tag cannot be parsed.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid gender: {0}")]
pub struct GenderParseError(pub String);

/// Target audience of a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "pos.gender", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Men,
    Women,
    Unisex,
    Kids,
}

impl Gender {
    /// Wire representation, identical to the serde and database spelling.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Men => "men",
            Self::Women => "women",
            Self::Unisex => "unisex",
            Self::Kids => "kids",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Gender {
    type Err = GenderParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "men" => Ok(Self::Men),
            "women" => Ok(Self::Women),
            "unisex" => Ok(Self::Unisex),
            "kids" => Ok(Self::Kids),
            _ => Err(GenderParseError(s.to_owned())),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_gender_display_matches_parse() {
        for gender in [Gender::Men, Gender::Women, Gender::Unisex, Gender::Kids] {
            assert_eq!(gender.to_string().parse::<Gender>().unwrap(), gender);
        }
    }

    #[test]
    fn test_gender_rejects_unknown() {
        assert_eq!(
            "MEN".parse::<Gender>(),
            Err(GenderParseError("MEN".to_owned()))
        );
    }

    #[test]
    fn test_gender_serde_spelling() {
        assert_eq!(serde_json::to_string(&Gender::Kids).unwrap(), "\"kids\"");
        let parsed: Gender = serde_json::from_str("\"unisex\"").unwrap();
        assert_eq!(parsed, Gender::Unisex);
    }
}
