//! Validation primitives
//!
//! A validator is one independently testable semantic rule over a fixed set of
//! named [`Param`]s. Invoking it yields an ordered sequence of zero or more
//! [`ValidationFailure`]s (empty = passed). Rule violations are values, never
//! errors: validators convert every expected condition, including classified
//! collaborator faults, into failures the caller collects into a report.

use std::fmt;

pub mod ebs;
pub mod url;

/// Raw value of a configuration parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    Str(String),
    Int(i64),
    Bool(bool),
    /// Optional parameter that was not provided
    Unset,
}

/// A named, typed configuration value used as validator input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    pub value: ParamValue,
}

impl Param {
    pub fn str(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: ParamValue::Str(value.into()),
        }
    }

    pub fn int(name: impl Into<String>, value: i64) -> Self {
        Self {
            name: name.into(),
            value: ParamValue::Int(value),
        }
    }

    pub fn bool(name: impl Into<String>, value: bool) -> Self {
        Self {
            name: name.into(),
            value: ParamValue::Bool(value),
        }
    }

    pub fn unset(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: ParamValue::Unset,
        }
    }

    pub fn opt_str(name: impl Into<String>, value: Option<String>) -> Self {
        match value {
            Some(v) => Self::str(name, v),
            None => Self::unset(name),
        }
    }

    pub fn opt_int(name: impl Into<String>, value: Option<i64>) -> Self {
        match value {
            Some(v) => Self::int(name, v),
            None => Self::unset(name),
        }
    }

    pub fn opt_bool(name: impl Into<String>, value: Option<bool>) -> Self {
        match value {
            Some(v) => Self::bool(name, v),
            None => Self::unset(name),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.value {
            ParamValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self.value {
            ParamValue::Int(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.value {
            ParamValue::Bool(b) => Some(b),
            _ => None,
        }
    }

    pub fn is_set(&self) -> bool {
        self.value != ParamValue::Unset
    }
}

/// Severity of a validation outcome
///
/// `Error` blocks downstream use of the configuration; `Warning` is advisory.
/// Ordered by severity so reports can be sorted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FailureLevel {
    Warning,
    Error,
}

impl fmt::Display for FailureLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureLevel::Warning => write!(f, "WARNING"),
            FailureLevel::Error => write!(f, "ERROR"),
        }
    }
}

/// One failed semantic check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationFailure {
    pub message: String,
    pub level: FailureLevel,
    /// Name of the validator that produced this failure
    pub validator: &'static str,
    /// Params implicated in the failure, in the order the validator named them
    pub params: Vec<Param>,
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.level, self.message)?;
        if !self.params.is_empty() {
            let names: Vec<&str> = self.params.iter().map(|p| p.name.as_str()).collect();
            write!(f, " [{}]", names.join(", "))?;
        }
        Ok(())
    }
}

/// Per-validator failure accumulator
///
/// Carries the validator name so individual checks only state the message,
/// level and offending params.
pub struct FailureCollector {
    validator: &'static str,
    failures: Vec<ValidationFailure>,
}

impl FailureCollector {
    pub fn new(validator: &'static str) -> Self {
        Self {
            validator,
            failures: Vec::new(),
        }
    }

    pub fn add(&mut self, message: impl Into<String>, level: FailureLevel, params: &[&Param]) {
        self.failures.push(ValidationFailure {
            message: message.into(),
            level,
            validator: self.validator,
            params: params.iter().map(|p| (*p).clone()).collect(),
        });
    }

    pub fn into_failures(self) -> Vec<ValidationFailure> {
        self.failures
    }
}

/// All failures collected across one validation pass
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    failures: Vec<ValidationFailure>,
}

impl ValidationReport {
    pub fn new(failures: Vec<ValidationFailure>) -> Self {
        Self { failures }
    }

    pub fn failures(&self) -> &[ValidationFailure] {
        &self.failures
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    /// True when at least one failure blocks use of the configuration
    pub fn has_errors(&self) -> bool {
        self.failures
            .iter()
            .any(|f| f.level == FailureLevel::Error)
    }

    /// Failures ordered most severe first, original order within a level
    pub fn by_severity(&self) -> Vec<&ValidationFailure> {
        let mut sorted: Vec<&ValidationFailure> = self.failures.iter().collect();
        sorted.sort_by(|a, b| b.level.cmp(&a.level));
        sorted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn param_accessors_match_declared_type() {
        let p = Param::str("VolumeType", "gp3");
        assert_eq!(p.as_str(), Some("gp3"));
        assert_eq!(p.as_int(), None);
        assert!(p.is_set());

        let p = Param::opt_int("Iops", None);
        assert_eq!(p.as_int(), None);
        assert!(!p.is_set());
    }

    #[test]
    fn failure_levels_are_ordered_by_severity() {
        assert!(FailureLevel::Error > FailureLevel::Warning);
    }

    #[test]
    fn report_has_errors_only_for_error_level() {
        let warning = ValidationFailure {
            message: "advisory".to_string(),
            level: FailureLevel::Warning,
            validator: "Test",
            params: vec![],
        };
        let report = ValidationReport::new(vec![warning.clone()]);
        assert!(!report.has_errors());

        let error = ValidationFailure {
            level: FailureLevel::Error,
            ..warning.clone()
        };
        let report = ValidationReport::new(vec![warning, error]);
        assert!(report.has_errors());
    }

    #[test]
    fn by_severity_puts_errors_first_and_keeps_relative_order() {
        let make = |msg: &str, level| ValidationFailure {
            message: msg.to_string(),
            level,
            validator: "Test",
            params: vec![],
        };
        let report = ValidationReport::new(vec![
            make("w1", FailureLevel::Warning),
            make("e1", FailureLevel::Error),
            make("w2", FailureLevel::Warning),
            make("e2", FailureLevel::Error),
        ]);
        let messages: Vec<&str> = report
            .by_severity()
            .iter()
            .map(|f| f.message.as_str())
            .collect();
        assert_eq!(messages, vec!["e1", "e2", "w1", "w2"]);
    }

    #[test]
    fn failure_display_includes_level_and_params() {
        let failure = ValidationFailure {
            message: "bad size".to_string(),
            level: FailureLevel::Error,
            validator: "Test",
            params: vec![Param::int("Size", 3)],
        };
        assert_eq!(failure.to_string(), "ERROR: bad size [Size]");
    }
}
