//! Positional heuristics over a listing's free-text description.

use std::sync::LazyLock;

use regex::Regex;

use super::{AttributeSource, ExtractError};
use crate::models::Field;

static YEAR_TOKEN: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\d{4,}").ok());

/// Year, make and model guessed from text like `2015 Cat 320 Excavator`.
///
/// The year is the first run of four or more digits; make and model are
/// the two tokens after the token holding it, or the first two tokens
/// when there is no year. Hours are never guessed.
#[derive(Debug, Clone, Default)]
pub struct Description {
    year: Option<String>,
    make: Option<String>,
    model: Option<String>,
}

impl Description {
    pub fn parse(text: &str) -> Self {
        let tokens: Vec<&str> = text.split_whitespace().collect();
        let year = YEAR_TOKEN
            .as_ref()
            .and_then(|re| re.find(text))
            .map(|m| m.as_str().to_string());

        let start = match &year {
            Some(y) => tokens
                .iter()
                .position(|t| t.contains(y.as_str()))
                .map_or(0, |i| i + 1),
            None => 0,
        };

        let token = |i: usize| tokens.get(i).map(|t| t.to_string());
        Self {
            make: token(start),
            model: token(start + 1),
            year,
        }
    }
}

impl AttributeSource for Description {
    fn name(&self) -> &'static str {
        "description"
    }

    fn attribute(&self, field: Field) -> Result<String, ExtractError> {
        let value = match field {
            Field::Year => self.year.clone(),
            Field::Make => self.make.clone(),
            Field::Model => self.model.clone(),
            Field::Hours => None,
        };
        value.ok_or(ExtractError::NoFallback(field.key()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_year_then_make_model() {
        let desc = Description::parse("2015 Caterpillar 320EL Excavator");
        assert_eq!(desc.attribute(Field::Year).unwrap(), "2015");
        assert_eq!(desc.attribute(Field::Make).unwrap(), "Caterpillar");
        assert_eq!(desc.attribute(Field::Model).unwrap(), "320EL");
        assert!(desc.attribute(Field::Hours).is_err());
    }

    #[test]
    fn test_year_in_middle() {
        let desc = Description::parse("Lot 7: 2008 Bobcat S185 Skid Steer");
        assert_eq!(desc.attribute(Field::Year).unwrap(), "2008");
        assert_eq!(desc.attribute(Field::Make).unwrap(), "Bobcat");
        assert_eq!(desc.attribute(Field::Model).unwrap(), "S185");
    }

    #[test]
    fn test_no_year_uses_first_tokens() {
        let desc = Description::parse("Kubota KX040 Mini Excavator");
        assert!(desc.attribute(Field::Year).is_err());
        assert_eq!(desc.attribute(Field::Make).unwrap(), "Kubota");
        assert_eq!(desc.attribute(Field::Model).unwrap(), "KX040");
    }

    #[test]
    fn test_short_and_empty() {
        let desc = Description::parse("2019 Genie");
        assert_eq!(desc.attribute(Field::Make).unwrap(), "Genie");
        assert!(desc.attribute(Field::Model).is_err());

        let empty = Description::parse("");
        for field in Field::ALL {
            assert!(empty.attribute(field).is_err());
        }
    }
}
