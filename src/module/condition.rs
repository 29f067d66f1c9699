/*!
 * Module Conditions
 * Branching from a module into another path based on its return value
 */

use super::types::{ModuleError, ModuleResult};
use crate::path::PathId;
use serde::{Deserialize, Serialize};

/// Comparison applied to the module return value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Equal,
    NotEqual,
}

impl ConditionOperator {
    pub fn symbol(&self) -> &'static str {
        match self {
            ConditionOperator::Less => "<",
            ConditionOperator::LessEqual => "<=",
            ConditionOperator::Greater => ">",
            ConditionOperator::GreaterEqual => ">=",
            ConditionOperator::Equal => "=",
            ConditionOperator::NotEqual => "!=",
        }
    }

    #[inline]
    pub fn apply(&self, lhs: i32, rhs: i32) -> bool {
        match self {
            ConditionOperator::Less => lhs < rhs,
            ConditionOperator::LessEqual => lhs <= rhs,
            ConditionOperator::Greater => lhs > rhs,
            ConditionOperator::GreaterEqual => lhs >= rhs,
            ConditionOperator::Equal => lhs == rhs,
            ConditionOperator::NotEqual => lhs != rhs,
        }
    }
}

/// What happens once a condition path has run to its end
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AfterConditionPath {
    /// The event ends; the next event starts at the top of the start path
    #[default]
    End,
    /// Resume in the calling path after the branching module
    Continue,
}

/// Condition attached to a module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModuleCondition {
    pub operator: ConditionOperator,
    pub value: i32,
    pub path: PathId,
    pub after: AfterConditionPath,
}

impl ModuleCondition {
    pub fn new(operator: ConditionOperator, value: i32, path: PathId) -> Self {
        Self {
            operator,
            value,
            path,
            after: AfterConditionPath::End,
        }
    }

    /// Branch when the module returned true (non-zero)
    pub fn if_true(path: PathId) -> Self {
        Self::new(ConditionOperator::GreaterEqual, 1, path)
    }

    /// Branch when the module returned false (zero or negative)
    pub fn if_false(path: PathId) -> Self {
        Self::new(ConditionOperator::Less, 1, path)
    }

    /// Parse an expression such as `"<0"`, `">= 5"` or `"=1"`
    pub fn parse(expression: &str, path: PathId) -> ModuleResult<Self> {
        let trimmed = expression.trim();
        let invalid = || ModuleError::InvalidCondition(expression.to_string());

        // Two-character operators first so "<=" is not read as "<"
        let operators = [
            ("<=", ConditionOperator::LessEqual),
            (">=", ConditionOperator::GreaterEqual),
            ("!=", ConditionOperator::NotEqual),
            ("==", ConditionOperator::Equal),
            ("<", ConditionOperator::Less),
            (">", ConditionOperator::Greater),
            ("=", ConditionOperator::Equal),
        ];
        let (operator, rest) = operators
            .iter()
            .find_map(|(symbol, op)| trimmed.strip_prefix(symbol).map(|rest| (*op, rest)))
            .ok_or_else(invalid)?;
        let value = rest.trim().parse::<i32>().map_err(|_| invalid())?;

        Ok(Self::new(operator, value, path))
    }

    pub fn with_after(mut self, after: AfterConditionPath) -> Self {
        self.after = after;
        self
    }

    #[inline]
    pub fn evaluate(&self, return_value: i32) -> bool {
        self.operator.apply(return_value, self.value)
    }
}

impl std::fmt::Display for ModuleCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{} -> {}", self.operator.symbol(), self.value, self.path)
    }
}
