//! Prompt templates for the specialists and the consolidator
//!
//! Templates are MiniJinja sources compiled once into a [`PromptLibrary`]
//! with strict undefined handling, so a missing variable fails the render
//! instead of silently producing an empty string.

mod system;
mod user;

pub use system::{ADVISOR_SYSTEM, SPECIALIST_SYSTEM};

use crate::domain::{Dimension, Symbol};
use crate::error::Result;
use crate::reasoning::Prompt;
use minijinja::{Environment, UndefinedBehavior, context};
use serde::Serialize;

pub const CONSOLIDATION: &str = "consolidation";

/// One section handed to the consolidation prompt
#[derive(Debug, Clone, Serialize)]
pub struct SectionInput {
    pub title: &'static str,
    /// Narrative, or the failure description when unavailable
    pub body: String,
    pub available: bool,
}

pub struct PromptLibrary {
    env: Environment<'static>,
}

impl PromptLibrary {
    pub fn new() -> Result<Self> {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);

        for dimension in Dimension::ALL {
            env.add_template(dimension.as_str(), source_for(dimension))?;
        }
        env.add_template(CONSOLIDATION, user::CONSOLIDATION)?;

        Ok(Self { env })
    }

    /// Specialist prompt for `dimension`
    ///
    /// `extra` carries template-specific flags such as `is_reit`; anything
    /// that does not serialize to an object is ignored.
    pub fn specialist<S: Serialize>(
        &self,
        dimension: Dimension,
        symbol: &Symbol,
        data: &str,
        extra: S,
    ) -> Result<Prompt> {
        let mut vars = match serde_json::to_value(&extra)? {
            serde_json::Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };
        vars.insert("symbol".to_string(), symbol.as_str().into());
        vars.insert("data".to_string(), data.into());

        let template = self.env.get_template(dimension.as_str())?;
        let text = template.render(&vars)?;

        Ok(Prompt::new(dimension.as_str(), text).with_system(SPECIALIST_SYSTEM))
    }

    pub fn consolidation(&self, symbol: &Symbol, sections: &[SectionInput]) -> Result<Prompt> {
        let missing: Vec<&str> = sections
            .iter()
            .filter(|s| !s.available)
            .map(|s| s.title)
            .collect();

        let template = self.env.get_template(CONSOLIDATION)?;
        let text = template.render(context! {
            symbol => symbol.as_str(),
            sections => sections,
            missing => missing,
        })?;

        Ok(Prompt::new(CONSOLIDATION, text).with_system(ADVISOR_SYSTEM))
    }
}

fn source_for(dimension: Dimension) -> &'static str {
    match dimension {
        Dimension::Price => user::PRICE,
        Dimension::Dividend => user::DIVIDEND,
        Dimension::Movement => user::MOVEMENT,
        Dimension::Valuation => user::VALUATION,
        Dimension::Controversy => user::CONTROVERSY,
    }
}

impl std::fmt::Debug for PromptLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.env.templates().map(|(name, _)| name).collect();
        f.debug_struct("PromptLibrary").field("templates", &names).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StockError;
    use serde_json::json;

    fn tel() -> Symbol {
        Symbol::parse("TEL").unwrap()
    }

    #[test]
    fn test_specialist_prompt_renders() {
        let library = PromptLibrary::new().unwrap();
        let prompt = library
            .specialist(Dimension::Price, &tel(), "Current price: ₱1,320.00", ())
            .unwrap();

        assert_eq!(prompt.name, "price");
        assert!(prompt.text.contains("**TEL**"));
        assert!(prompt.text.contains("Current price: ₱1,320.00"));
        assert_eq!(prompt.system.as_deref(), Some(SPECIALIST_SYSTEM));
    }

    #[test]
    fn test_reit_flag_adds_question() {
        let library = PromptLibrary::new().unwrap();
        let reit = library
            .specialist(Dimension::Dividend, &tel(), "-", json!({ "is_reit": true }))
            .unwrap();
        assert!(reit.text.contains("REIT distribution requirement"));

        let plain = library
            .specialist(Dimension::Dividend, &tel(), "-", json!({ "is_reit": false }))
            .unwrap();
        assert!(!plain.text.contains("REIT"));
    }

    #[test]
    fn test_strict_undefined_fails_render() {
        // the dividend template needs is_reit
        let library = PromptLibrary::new().unwrap();
        let err = library
            .specialist(Dimension::Dividend, &tel(), "-", ())
            .unwrap_err();
        assert!(matches!(err, StockError::TemplateError(_)));
    }

    #[test]
    fn test_consolidation_lists_limitations() {
        let library = PromptLibrary::new().unwrap();
        let sections = vec![
            SectionInput {
                title: "Price Analysis",
                body: "Trading near the 52-week low.".to_string(),
                available: true,
            },
            SectionInput {
                title: "Dividend Analysis",
                body: "no profile to derive dividends for TEL".to_string(),
                available: false,
            },
        ];

        let prompt = library.consolidation(&tel(), &sections).unwrap();
        assert_eq!(prompt.name, CONSOLIDATION);
        assert!(prompt.text.contains("**Price Analysis:**\nTrading near the 52-week low."));
        assert!(prompt.text.contains("Data limitation: no profile to derive dividends for TEL"));
        assert!(prompt.text.contains("could not be analysed (Dividend Analysis)"));
        assert!(prompt.text.contains("**BUY** or **NOT BUY**"));
    }
}
