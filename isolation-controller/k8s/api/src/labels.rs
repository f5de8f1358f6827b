use crate::{LabelSelector, LabelSelectorRequirement};
use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    sync::Arc,
};

#[derive(Clone, Debug, Eq, Default)]
pub struct Labels(Arc<Map>);

pub type Map = BTreeMap<String, String>;

pub type Expressions = Vec<Expression>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Expression {
    key: String,
    operator: Operator,
    values: BTreeSet<String>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Operator {
    In,
    NotIn,
    Exists,
    DoesNotExist,
}

/// Selects a set of pods or namespaces by their labels.
#[derive(Clone, Debug, Eq, PartialEq, Default)]
pub struct Selector {
    match_labels: Option<Map>,
    match_expressions: Option<Expressions>,
}

/// A `LabelSelector` used an operator that is not part of the label selector API.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InvalidOperator(pub String);

// === Selector ===

impl Selector {
    pub fn from_expressions(exprs: Expressions) -> Self {
        Self {
            match_labels: None,
            match_expressions: Some(exprs),
        }
    }

    pub fn from_map(map: Map) -> Self {
        Self {
            match_labels: Some(map),
            match_expressions: None,
        }
    }

    pub fn match_expressions(&self) -> &[Expression] {
        self.match_expressions.as_deref().unwrap_or_default()
    }

    /// An empty selector has no requirements and therefore selects everything.
    pub fn is_empty(&self) -> bool {
        self.match_labels.as_ref().map_or(true, Map::is_empty)
            && self.match_expressions().is_empty()
    }

    pub fn matches(&self, labels: &Labels) -> bool {
        for expr in self.match_expressions.iter().flatten() {
            if !expr.matches(labels.as_ref()) {
                return false;
            }
        }

        if let Some(match_labels) = self.match_labels.as_ref() {
            for (k, v) in match_labels.iter() {
                if labels.0.get(k) != Some(v) {
                    return false;
                }
            }
        }

        true
    }
}

impl std::iter::FromIterator<(String, String)> for Selector {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self::from_map(iter.into_iter().collect())
    }
}

impl std::iter::FromIterator<(&'static str, &'static str)> for Selector {
    fn from_iter<T: IntoIterator<Item = (&'static str, &'static str)>>(iter: T) -> Self {
        Self::from_map(
            iter.into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }
}

impl std::iter::FromIterator<Expression> for Selector {
    fn from_iter<T: IntoIterator<Item = Expression>>(iter: T) -> Self {
        Self::from_expressions(iter.into_iter().collect())
    }
}

impl From<Selector> for LabelSelector {
    fn from(selector: Selector) -> Self {
        let Selector {
            match_labels,
            match_expressions,
        } = selector;
        LabelSelector {
            match_labels: match_labels.filter(|m| !m.is_empty()),
            match_expressions: match_expressions
                .filter(|e| !e.is_empty())
                .map(|exprs| exprs.into_iter().map(Into::into).collect()),
        }
    }
}

impl TryFrom<LabelSelector> for Selector {
    type Error = InvalidOperator;

    fn try_from(selector: LabelSelector) -> Result<Self, Self::Error> {
        let match_expressions = selector
            .match_expressions
            .map(|exprs| {
                exprs
                    .into_iter()
                    .map(Expression::try_from)
                    .collect::<Result<Expressions, _>>()
            })
            .transpose()?;
        Ok(Self {
            match_labels: selector.match_labels,
            match_expressions,
        })
    }
}

// === Labels ===

impl From<Map> for Labels {
    #[inline]
    fn from(labels: Map) -> Self {
        Self(Arc::new(labels))
    }
}

impl AsRef<Map> for Labels {
    #[inline]
    fn as_ref(&self) -> &Map {
        self.0.as_ref()
    }
}

impl<T: AsRef<Map>> std::cmp::PartialEq<T> for Labels {
    #[inline]
    fn eq(&self, t: &T) -> bool {
        self.0.as_ref().eq(t.as_ref())
    }
}

impl std::iter::FromIterator<(String, String)> for Labels {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self(Arc::new(iter.into_iter().collect()))
    }
}

impl std::iter::FromIterator<(&'static str, &'static str)> for Labels {
    fn from_iter<T: IntoIterator<Item = (&'static str, &'static str)>>(iter: T) -> Self {
        iter.into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }
}

// === Expression ===

impl Expression {
    pub fn new(
        key: impl Into<String>,
        operator: Operator,
        values: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            key: key.into(),
            operator,
            values: values.into_iter().collect(),
        }
    }

    pub fn not_in(key: impl Into<String>, values: impl IntoIterator<Item = String>) -> Self {
        Self::new(key, Operator::NotIn, values)
    }

    pub fn does_not_exist(key: impl Into<String>) -> Self {
        Self::new(key, Operator::DoesNotExist, None::<String>)
    }

    fn matches(&self, labels: &Map) -> bool {
        match self.operator {
            Operator::In => labels
                .get(&self.key)
                .is_some_and(|v| self.values.contains(v)),
            Operator::NotIn => labels
                .get(&self.key)
                .map_or(true, |v| !self.values.contains(v)),
            Operator::Exists => labels.contains_key(&self.key),
            Operator::DoesNotExist => !labels.contains_key(&self.key),
        }
    }
}

impl From<Expression> for LabelSelectorRequirement {
    fn from(expr: Expression) -> Self {
        let values = match expr.operator {
            Operator::In | Operator::NotIn => Some(expr.values.into_iter().collect()),
            Operator::Exists | Operator::DoesNotExist => None,
        };
        LabelSelectorRequirement {
            key: expr.key,
            operator: expr.operator.as_str().to_string(),
            values,
        }
    }
}

impl TryFrom<LabelSelectorRequirement> for Expression {
    type Error = InvalidOperator;

    fn try_from(req: LabelSelectorRequirement) -> Result<Self, Self::Error> {
        let operator = req.operator.parse()?;
        Ok(Self::new(req.key, operator, req.values.unwrap_or_default()))
    }
}

// === Operator ===

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::In => "In",
            Self::NotIn => "NotIn",
            Self::Exists => "Exists",
            Self::DoesNotExist => "DoesNotExist",
        }
    }
}

impl std::str::FromStr for Operator {
    type Err = InvalidOperator;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "In" => Ok(Self::In),
            "NotIn" => Ok(Self::NotIn),
            "Exists" => Ok(Self::Exists),
            "DoesNotExist" => Ok(Self::DoesNotExist),
            other => Err(InvalidOperator(other.to_string())),
        }
    }
}

impl fmt::Display for InvalidOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unsupported label selector operator: {}", self.0)
    }
}

impl std::error::Error for InvalidOperator {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches() {
        for (selector, labels, matches, msg) in &[
            (Selector::default(), Labels::default(), true, "empty match"),
            (
                Selector::from_iter(Some(("foo", "bar"))),
                Labels::from_iter(Some(("foo", "bar"))),
                true,
                "exact label match",
            ),
            (
                Selector::from_iter(Some(("foo", "bar"))),
                Labels::from_iter(vec![("foo", "bar"), ("bah", "baz")]),
                true,
                "sufficient label match",
            ),
            (
                Selector::from_iter(Some(Expression::new(
                    "foo",
                    Operator::In,
                    Some("bar".to_string()),
                ))),
                Labels::from_iter(vec![("foo", "bar"), ("bah", "baz")]),
                true,
                "expression match",
            ),
            (
                Selector::from_iter(Some(Expression::not_in("foo", Some("bar".to_string())))),
                Labels::from_iter(Some(("foo", "bar"))),
                false,
                "not-in excludes listed value",
            ),
            (
                Selector::from_iter(Some(Expression::not_in("foo", Some("bar".to_string())))),
                Labels::from_iter(Some(("foo", "qux"))),
                true,
                "not-in admits other values",
            ),
            (
                Selector::from_iter(Some(Expression::not_in("foo", Some("bar".to_string())))),
                Labels::default(),
                true,
                "not-in admits missing key",
            ),
            (
                Selector::from_iter(Some(Expression::does_not_exist("foo"))),
                Labels::from_iter(Some(("bah", "baz"))),
                true,
                "does-not-exist admits missing key",
            ),
            (
                Selector::from_iter(Some(Expression::does_not_exist("foo"))),
                Labels::from_iter(Some(("foo", "baz"))),
                false,
                "does-not-exist rejects present key",
            ),
            (
                Selector::from_iter(Some(Expression::new("foo", Operator::Exists, None::<String>))),
                Labels::from_iter(Some(("foo", ""))),
                true,
                "exists admits empty value",
            ),
        ] {
            assert_eq!(selector.matches(labels), *matches, "{}", msg);
        }
    }

    #[test]
    fn converts_to_label_selector() {
        let selector = Selector::from_iter(vec![
            Expression::not_in("app", Some("web".to_string())),
            Expression::does_not_exist("tier"),
        ]);
        let json = serde_json::to_value(LabelSelector::from(selector)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "matchExpressions": [
                    { "key": "app", "operator": "NotIn", "values": ["web"] },
                    { "key": "tier", "operator": "DoesNotExist" },
                ]
            })
        );
    }

    #[test]
    fn empty_selector_converts_to_match_all() {
        let json = serde_json::to_value(LabelSelector::from(Selector::from_expressions(
            vec![],
        )))
        .unwrap();
        assert_eq!(json, serde_json::json!({}));
    }

    #[test]
    fn parses_label_selector() {
        let selector = LabelSelector {
            match_labels: Some(maplit::btreemap! {
                "app".to_string() => "web".to_string(),
            }),
            match_expressions: Some(vec![LabelSelectorRequirement {
                key: "tier".to_string(),
                operator: "DoesNotExist".to_string(),
                values: None,
            }]),
        };
        let selector = Selector::try_from(selector).expect("selector must parse");
        assert!(selector.matches(&Labels::from_iter(Some(("app", "web")))));
        assert!(!selector.matches(&Labels::from_iter(vec![("app", "web"), ("tier", "db")])));

        let bad = LabelSelector {
            match_expressions: Some(vec![LabelSelectorRequirement {
                key: "tier".to_string(),
                operator: "Gt".to_string(),
                values: None,
            }]),
            ..Default::default()
        };
        assert_eq!(
            Selector::try_from(bad),
            Err(InvalidOperator("Gt".to_string()))
        );
    }
}
