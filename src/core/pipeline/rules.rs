#![allow(clippy::result_large_err)] // Rule parsing returns AppError so configuration failures keep their codes.

use crate::core::error::{
    AppError, CODE_INVALID_RULE, CODE_INVALID_RULE_NAME, CODE_INVALID_RULE_OPTIONS,
};
use crate::core::types::ErrorCategory;
use serde_json::{Map, Value};

/// One declared pipeline entry: which stage runs and with what options.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub stage_name: String,
    pub options: Map<String, Value>,
}

impl Rule {
    pub fn new<T: Into<String>>(stage_name: T) -> Self {
        Self {
            stage_name: stage_name.into(),
            options: Map::new(),
        }
    }

    pub fn with_options<T: Into<String>>(stage_name: T, options: Map<String, Value>) -> Self {
        Self {
            stage_name: stage_name.into(),
            options,
        }
    }

    /// Parse a rule declaration: `"name"`, `["name"]` or `["name", {options}]`.
    pub fn parse(declaration: &Value) -> Result<Self, AppError> {
        match declaration {
            Value::String(name) => Ok(Rule::new(parse_name(name)?)),
            Value::Array(items) => match items.as_slice() {
                [name] => Ok(Rule::new(parse_name_value(name)?)),
                [name, options] => Ok(Rule::with_options(
                    parse_name_value(name)?,
                    parse_options(options)?,
                )),
                _ => Err(invalid_rule(format!(
                    "rule list entry must have one or two elements, got {}",
                    items.len()
                ))),
            },
            other => Err(invalid_rule(format!(
                "rule must be a string or an array, got {}",
                value_kind(other)
            ))),
        }
    }
}

fn parse_name_value(value: &Value) -> Result<String, AppError> {
    match value {
        Value::String(name) => parse_name(name),
        other => Err(AppError::new(
            ErrorCategory::ConfigurationError,
            format!("rule name must be a string, got {}", value_kind(other)),
        )
        .with_code(CODE_INVALID_RULE_NAME)),
    }
}

fn parse_name(name: &str) -> Result<String, AppError> {
    if name.trim().is_empty() {
        return Err(AppError::new(
            ErrorCategory::ConfigurationError,
            "rule name must not be empty",
        )
        .with_code(CODE_INVALID_RULE_NAME));
    }
    Ok(name.to_string())
}

fn parse_options(value: &Value) -> Result<Map<String, Value>, AppError> {
    match value {
        Value::Object(map) => Ok(map.clone()),
        Value::Null => Ok(Map::new()),
        other => Err(AppError::new(
            ErrorCategory::ConfigurationError,
            format!("rule options must be an object, got {}", value_kind(other)),
        )
        .with_code(CODE_INVALID_RULE_OPTIONS)),
    }
}

fn invalid_rule(message: String) -> AppError {
    AppError::new(ErrorCategory::ConfigurationError, message).with_code(CODE_INVALID_RULE)
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Ordered rules as declared. Duplicate names are kept; each runs on its own.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleList {
    rules: Vec<Rule>,
}

impl RuleList {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    pub fn parse(declarations: &[Value]) -> Result<Self, AppError> {
        let rules = declarations
            .iter()
            .enumerate()
            .map(|(index, declaration)| {
                Rule::parse(declaration).map_err(|err| err.with_context("rule_index", index.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rules })
    }

    /// Whether any rule references `name`.
    pub fn declares(&self, name: &str) -> bool {
        self.rules.iter().any(|rule| rule.stage_name == name)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Rule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl From<Vec<Rule>> for RuleList {
    fn from(rules: Vec<Rule>) -> Self {
        Self::new(rules)
    }
}
