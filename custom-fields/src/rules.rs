//! Validation rules and the user/system merge.
//!
//! Rules are structured `{ name, parameters }` pairs. The `name:p1,p2` string
//! form is only produced or parsed at the boundary with external rule
//! consumers (`Display`, `FromStr`, [`to_rule_string`]).

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::FieldsError;

/// One validation rule.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RuleRepr")]
pub struct RuleSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<String>,
}

/// Rules may be written either as `"max:100"` or as `{ name, parameters }`.
#[derive(Deserialize)]
#[serde(untagged)]
enum RuleRepr {
    Text(String),
    Structured {
        name: String,
        #[serde(default)]
        parameters: Vec<String>,
    },
}

impl TryFrom<RuleRepr> for RuleSpec {
    type Error = FieldsError;

    fn try_from(repr: RuleRepr) -> Result<Self, Self::Error> {
        match repr {
            RuleRepr::Text(s) => s.parse(),
            RuleRepr::Structured { name, parameters } => Ok(RuleSpec { name, parameters }),
        }
    }
}

impl RuleSpec {
    pub fn new<I, S>(name: impl Into<String>, parameters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            parameters: parameters.into_iter().map(Into::into).collect(),
        }
    }

    /// A rule without parameters, e.g. `required`.
    pub fn flag(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: Vec::new(),
        }
    }

    /// A single-parameter rule, e.g. `max:255`.
    pub fn with_param(name: impl Into<String>, parameter: impl ToString) -> Self {
        Self {
            name: name.into(),
            parameters: vec![parameter.to_string()],
        }
    }

    /// Static parameter arity for this rule name, if the vocabulary knows it.
    pub fn arity(&self) -> Option<Arity> {
        arity(&self.name)
    }
}

impl fmt::Display for RuleSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.parameters.is_empty() {
            f.write_str(&self.name)
        } else {
            write!(f, "{}:{}", self.name, self.parameters.join(","))
        }
    }
}

impl FromStr for RuleSpec {
    type Err = FieldsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (name, rest) = match s.split_once(':') {
            Some((name, rest)) => (name.trim(), Some(rest)),
            None => (s, None),
        };
        if name.is_empty() {
            return Err(FieldsError::InvalidRule {
                rule: s.to_string(),
                message: "missing rule name".into(),
            });
        }

        let parameters: Vec<String> = match (arity(name), rest) {
            (_, None) => Vec::new(),
            // single-parameter rules keep commas (regex patterns, dates)
            (Some(Arity::One), Some(rest)) => vec![rest.to_string()],
            (_, Some(rest)) => rest.split(',').map(|p| p.trim().to_string()).collect(),
        };

        if let Some(expected) = arity(name) {
            if !expected.accepts(parameters.len()) {
                return Err(FieldsError::InvalidRule {
                    rule: s.to_string(),
                    message: format!("expected {expected} parameter(s), got {}", parameters.len()),
                });
            }
        }

        Ok(RuleSpec {
            name: name.to_string(),
            parameters,
        })
    }
}

/// How many parameters a rule takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    None,
    One,
    Two,
    Variadic,
}

impl Arity {
    pub fn accepts(&self, count: usize) -> bool {
        match self {
            Arity::None => count == 0,
            Arity::One => count == 1,
            Arity::Two => count == 2,
            Arity::Variadic => count >= 1,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::None => f.write_str("0"),
            Arity::One => f.write_str("1"),
            Arity::Two => f.write_str("2"),
            Arity::Variadic => f.write_str("1 or more"),
        }
    }
}

/// The rule vocabulary. Unknown names return `None`.
pub fn arity(name: &str) -> Option<Arity> {
    let arity = match name {
        "required" | "nullable" | "sometimes" | "filled" | "present" | "accepted"
        | "declined" | "string" | "integer" | "numeric" | "boolean" | "array" | "date"
        | "url" | "active_url" | "email" | "uuid" | "ulid" | "json" | "alpha"
        | "alpha_num" | "alpha_dash" | "ascii" | "lowercase" | "uppercase" | "distinct"
        | "ip" | "ipv4" | "ipv6" | "hex_color" => Arity::None,
        "min" | "max" | "size" | "gt" | "gte" | "lt" | "lte" | "regex" | "not_regex"
        | "date_format" | "after" | "after_or_equal" | "before" | "before_or_equal"
        | "date_equals" | "digits" | "min_digits" | "max_digits" | "multiple_of"
        | "same" | "different" => Arity::One,
        "between" | "digits_between" => Arity::Two,
        "in" | "not_in" | "starts_with" | "ends_with" | "doesnt_start_with"
        | "doesnt_end_with" | "decimal" | "required_if" | "required_unless"
        | "required_with" | "required_without" | "mimes" => Arity::Variadic,
        _ => return None,
    };
    Some(arity)
}

/// Direction of a bound-carrying rule family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundKind {
    /// Smaller is stricter.
    Upper,
    /// Larger is stricter.
    Lower,
    /// Two parameters `lower,upper`; intersect.
    Range,
}

pub fn bound_kind(name: &str) -> Option<BoundKind> {
    match name {
        "max" | "lt" | "lte" | "max_digits" => Some(BoundKind::Upper),
        "min" | "gt" | "gte" | "min_digits" => Some(BoundKind::Lower),
        "between" | "digits_between" => Some(BoundKind::Range),
        _ => None,
    }
}

/// Merge user-declared rules with system-derived rules.
///
/// Rules are grouped by name. Bound families keep the stricter bound from
/// either side; other known rules keep their first instance, user rules first.
/// Unknown rule names pass through untouched (only exact duplicates collapse).
pub fn merge(user_rules: &[RuleSpec], system_rules: &[RuleSpec]) -> Vec<RuleSpec> {
    let mut merged: IndexMap<String, RuleSpec> = IndexMap::new();

    for rule in user_rules.iter().chain(system_rules) {
        let key = if arity(&rule.name).is_some() {
            rule.name.clone()
        } else {
            format!("?{rule}")
        };

        match merged.get_mut(&key) {
            None => {
                merged.insert(key, rule.clone());
            }
            Some(existing) => {
                if let Some(kind) = bound_kind(&rule.name) {
                    *existing = stricter(kind, existing, rule);
                }
            }
        }
    }

    merged.into_values().collect()
}

/// Pick the stricter of two instances of the same bound family. When the
/// parameters cannot be compared numerically the earlier instance stays.
fn stricter(kind: BoundKind, current: &RuleSpec, candidate: &RuleSpec) -> RuleSpec {
    match kind {
        BoundKind::Upper | BoundKind::Lower => {
            let (Some(a), Some(b)) = (current.parameters.first(), candidate.parameters.first())
            else {
                return current.clone();
            };
            let replace = match (compare_bounds(b, a), kind) {
                (Some(Ordering::Less), BoundKind::Upper) => true,
                (Some(Ordering::Greater), BoundKind::Lower) => true,
                _ => false,
            };
            if replace {
                candidate.clone()
            } else {
                current.clone()
            }
        }
        BoundKind::Range => {
            if current.parameters.len() != 2 || candidate.parameters.len() != 2 {
                return current.clone();
            }
            let lower = pick(&current.parameters[0], &candidate.parameters[0], Ordering::Greater);
            let upper = pick(&current.parameters[1], &candidate.parameters[1], Ordering::Less);
            RuleSpec::new(current.name.clone(), [lower, upper])
        }
    }
}

fn pick(current: &str, candidate: &str, prefer: Ordering) -> String {
    if compare_bounds(candidate, current) == Some(prefer) {
        candidate.to_string()
    } else {
        current.to_string()
    }
}

/// Numeric comparison of two bound parameters. Integers compare exactly so the
/// i64 extremes survive; anything else goes through f64.
pub fn compare_bounds(a: &str, b: &str) -> Option<Ordering> {
    let (a, b) = (a.trim(), b.trim());
    if let (Ok(x), Ok(y)) = (a.parse::<i128>(), b.parse::<i128>()) {
        return Some(x.cmp(&y));
    }
    let x = a.parse::<f64>().ok().filter(|v| v.is_finite())?;
    let y = b.parse::<f64>().ok().filter(|v| v.is_finite())?;
    x.partial_cmp(&y)
}

/// True iff a rule with this name is present.
pub fn contains_rule(rules: &[RuleSpec], name: &str) -> bool {
    rules.iter().any(|r| r.name == name)
}

/// Pipe-joined string form for external rule consumers.
pub fn to_rule_string(rules: &[RuleSpec]) -> String {
    rules
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("|")
}

/// Parse a pipe-joined rule string.
pub fn parse_rule_string(s: &str) -> Result<Vec<RuleSpec>, FieldsError> {
    s.split('|')
        .filter(|part| !part.trim().is_empty())
        .map(str::parse)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(s: &str) -> RuleSpec {
        s.parse().unwrap()
    }

    fn find<'a>(rules: &'a [RuleSpec], name: &str) -> Option<&'a RuleSpec> {
        rules.iter().find(|r| r.name == name)
    }

    #[test]
    fn parse_and_display() {
        assert_eq!(rule("max:100"), RuleSpec::with_param("max", 100));
        assert_eq!(rule("required"), RuleSpec::flag("required"));
        assert_eq!(rule("between:1,10").parameters, vec!["1", "10"]);
        assert_eq!(rule("in:a, b ,c").parameters, vec!["a", "b", "c"]);
        assert_eq!(rule("between:1,10").to_string(), "between:1,10");
    }

    #[test]
    fn single_parameter_rules_keep_commas() {
        let r = rule("regex:^[a-z]{1,3}$");
        assert_eq!(r.parameters, vec!["^[a-z]{1,3}$"]);
    }

    #[test]
    fn wrong_arity_is_rejected() {
        assert!("max".parse::<RuleSpec>().is_err());
        assert!("max:1,2".parse::<RuleSpec>().is_err());
        assert!("required:yes".parse::<RuleSpec>().is_err());
        assert!("between:1".parse::<RuleSpec>().is_err());
        assert!(":5".parse::<RuleSpec>().is_err());
    }

    #[test]
    fn unknown_rules_parse_freely() {
        let r = rule("vat_number:eu,strict");
        assert_eq!(r.arity(), None);
        assert_eq!(r.parameters.len(), 2);
    }

    #[test]
    fn user_stricter_max_wins() {
        let merged = merge(&[rule("max:100")], &[rule("max:65535")]);
        assert_eq!(find(&merged, "max"), Some(&rule("max:100")));
        assert_eq!(merged.len(), 1);
    }

    #[test]
    fn system_stricter_max_wins() {
        let merged = merge(&[rule("max:100000")], &[rule("max:65535")]);
        assert_eq!(find(&merged, "max"), Some(&rule("max:65535")));
    }

    #[test]
    fn user_bounds_inside_i64_range_survive() {
        let merged = merge(
            &[rule("min:10"), rule("max:100")],
            &[
                rule("min:-9223372036854775808"),
                rule("max:9223372036854775807"),
            ],
        );
        assert_eq!(find(&merged, "min"), Some(&rule("min:10")));
        assert_eq!(find(&merged, "max"), Some(&rule("max:100")));
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn larger_min_wins_from_system() {
        let merged = merge(&[rule("min:-5")], &[rule("min:0")]);
        assert_eq!(find(&merged, "min"), Some(&rule("min:0")));
    }

    #[test]
    fn decimal_bounds_compare_numerically() {
        let merged = merge(
            &[rule("max:1000000000000000000")],
            &[rule("max:999999999999999.999999999999999")],
        );
        assert_eq!(
            find(&merged, "max"),
            Some(&rule("max:999999999999999.999999999999999"))
        );
    }

    #[test]
    fn between_intersects() {
        let merged = merge(&[rule("between:0,500")], &[rule("between:10,100")]);
        assert_eq!(find(&merged, "between"), Some(&rule("between:10,100")));

        let merged = merge(&[rule("between:20,50")], &[rule("between:10,100")]);
        assert_eq!(find(&merged, "between"), Some(&rule("between:20,50")));
    }

    #[test]
    fn non_numeric_bounds_keep_user_instance() {
        let merged = merge(&[rule("max:abc")], &[rule("max:255")]);
        assert_eq!(find(&merged, "max"), Some(&rule("max:abc")));
    }

    #[test]
    fn one_sided_rules_are_kept() {
        let merged = merge(&[rule("required")], &[rule("string"), rule("max:255")]);
        let names: Vec<_> = merged.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["required", "string", "max"]);
    }

    #[test]
    fn non_bound_duplicates_collapse_with_user_precedence() {
        let merged = merge(
            &[rule("string"), rule("in:a,b")],
            &[rule("in:c"), rule("string"), rule("nullable")],
        );
        assert_eq!(
            merged,
            vec![rule("string"), rule("in:a,b"), rule("nullable")]
        );
    }

    #[test]
    fn user_order_is_preserved_when_system_tightens() {
        let merged = merge(
            &[rule("max:100000"), rule("required")],
            &[rule("string"), rule("max:255")],
        );
        assert_eq!(
            merged,
            vec![rule("max:255"), rule("required"), rule("string")]
        );
    }

    #[test]
    fn unknown_rules_pass_through() {
        let merged = merge(
            &[rule("vat_number:eu"), rule("vat_number:uk")],
            &[rule("vat_number:eu")],
        );
        assert_eq!(merged, vec![rule("vat_number:eu"), rule("vat_number:uk")]);
    }

    #[test]
    fn merge_is_never_looser_than_either_side() {
        for (user, system) in [(5, 10), (10, 5), (7, 7)] {
            let merged = merge(
                &[RuleSpec::with_param("max", user)],
                &[RuleSpec::with_param("max", system)],
            );
            let effective: i64 = find(&merged, "max").unwrap().parameters[0].parse().unwrap();
            assert_eq!(effective, user.min(system));
        }
    }

    #[test]
    fn rule_string_round_trip() {
        let rules = parse_rule_string("required|max:100|in:a,b").unwrap();
        assert_eq!(rules.len(), 3);
        assert_eq!(to_rule_string(&rules), "required|max:100|in:a,b");
    }

    #[test]
    fn rules_deserialize_from_both_forms() {
        let json = r#"["required", {"name": "max", "parameters": ["10"]}]"#;
        let rules: Vec<RuleSpec> = serde_json::from_str(json).unwrap();
        assert_eq!(rules, vec![rule("required"), rule("max:10")]);

        let out = serde_json::to_string(&rules).unwrap();
        let back: Vec<RuleSpec> = serde_json::from_str(&out).unwrap();
        assert_eq!(back, rules);
    }
}
