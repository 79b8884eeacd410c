//! Ordered fallback chains.
//!
//! A [`RuleChain`] is evaluated front to back and the first rule that
//! yields an acceptable value wins. Each rule has a name so a record can
//! report which rule resolved each field.

use tracing::{debug, trace};

use crate::error::ExtractionError;
use crate::extract::barcode::Barcode;
use crate::extract::catalog::CompiledPattern;
use crate::extract::disambiguate::{collides, Resolved};
use crate::models::record::{ExtractionMode, Field, FieldValue};

/// Named heuristic rule.
pub type Heuristic = fn(&FieldContext<'_>) -> Result<Option<String>, ExtractionError>;

/// Post-processing applied to a pattern capture before acceptance.
pub type Refine = fn(&str, &FieldContext<'_>) -> Option<String>;

/// Everything a rule may look at while resolving one field.
#[derive(Debug, Clone, Copy)]
pub struct FieldContext<'a> {
    pub field: Field,
    pub mode: ExtractionMode,
    /// Normalized document text.
    pub text: &'a str,
    /// Fields resolved earlier in the dependency order.
    pub resolved: &'a Resolved,
    pub barcode: Option<&'a Barcode>,
}

impl FieldContext<'_> {
    /// Post-normalize a candidate for this field.
    pub fn normalize(&self, raw: &str) -> Option<String> {
        match FieldValue::normalized(self.field.kind(), raw) {
            FieldValue::Found(value) => Some(value),
            FieldValue::NotFound => None,
        }
    }

    /// Post-normalize and reject values owned by an already-resolved field.
    pub fn accept(&self, raw: &str) -> Option<String> {
        let value = self.normalize(raw)?;
        if let Some(owner) = collides(self.resolved, self.field, &value) {
            trace!("{}: candidate {} already resolved as {}", self.field, value, owner);
            return None;
        }
        Some(value)
    }
}

/// One step of a fallback chain.
pub enum Rule {
    /// A catalog pattern; every capture is tried in document order.
    Pattern {
        pattern: CompiledPattern,
        refine: Option<Refine>,
    },
    /// A hand-written heuristic.
    Heuristic { name: &'static str, run: Heuristic },
}

impl Rule {
    pub fn heuristic(name: &'static str, run: Heuristic) -> Self {
        Rule::Heuristic { name, run }
    }

    pub fn name(&self) -> &str {
        match self {
            Rule::Pattern { pattern, .. } => pattern.key(),
            Rule::Heuristic { name, .. } => name,
        }
    }

    pub fn apply(&self, ctx: &FieldContext<'_>) -> Result<Option<String>, ExtractionError> {
        match self {
            Rule::Pattern { pattern, refine } => {
                for raw in pattern.captures(ctx.text) {
                    let candidate = match refine {
                        Some(refine) => refine(raw, ctx),
                        None => Some(raw.to_string()),
                    };
                    if let Some(value) = candidate.and_then(|c| ctx.accept(&c)) {
                        return Ok(Some(value));
                    }
                }
                Ok(None)
            }
            Rule::Heuristic { run, .. } => run(ctx),
        }
    }
}

impl std::fmt::Debug for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Rule").field(&self.name()).finish()
    }
}

/// A resolved value and the rule that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hit {
    pub value: String,
    pub rule: String,
}

/// Rules evaluated in order; the first success short-circuits.
#[derive(Debug, Default)]
pub struct RuleChain {
    rules: Vec<Rule>,
}

impl RuleChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a rule.
    pub fn then(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Append catalog patterns in their declared order.
    pub fn then_patterns(mut self, patterns: &[CompiledPattern], refine: Option<Refine>) -> Self {
        self.rules.extend(patterns.iter().cloned().map(|pattern| Rule::Pattern { pattern, refine }));
        self
    }

    /// Rule names in evaluation order.
    pub fn names(&self) -> Vec<&str> {
        self.rules.iter().map(Rule::name).collect()
    }

    pub fn evaluate(&self, ctx: &FieldContext<'_>) -> Result<Option<Hit>, ExtractionError> {
        for rule in &self.rules {
            if let Some(value) = rule.apply(ctx)?.and_then(|v| ctx.normalize(&v)) {
                debug!("{} resolved by {}", ctx.field, rule.name());
                return Ok(Some(Hit {
                    value,
                    rule: rule.name().to_string(),
                }));
            }
        }
        Ok(None)
    }
}
