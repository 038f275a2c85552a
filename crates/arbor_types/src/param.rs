//! Task parameters that are either literal or bound to a blackboard variable

use serde::{Deserialize, Serialize};

use crate::blackboard::Blackboard;
use crate::value::VariantKind;

/// Parameter of a task: a literal value, or the name of a blackboard
/// variable resolved at execution time
///
/// In documents a literal serializes as the plain value and a binding as
/// `{"$var": "name"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BbParam<T> {
    Var {
        #[serde(rename = "$var")]
        name: String,
    },
    Value(T),
}

impl<T: VariantKind + Clone> BbParam<T> {
    /// Literal parameter
    pub fn value(v: T) -> Self {
        BbParam::Value(v)
    }

    /// Blackboard-bound parameter
    pub fn var(name: impl Into<String>) -> Self {
        BbParam::Var { name: name.into() }
    }

    pub fn is_bound(&self) -> bool {
        matches!(self, BbParam::Var { .. })
    }

    /// Resolve against a blackboard
    ///
    /// A literal always resolves; a binding resolves through the type-checked
    /// read and is `None` when the variable is absent or mistyped.
    pub fn read(&self, bb: &Blackboard) -> Option<T> {
        match self {
            BbParam::Value(v) => Some(v.clone()),
            BbParam::Var { name } => bb.read::<T>(name),
        }
    }
}

impl<T: Default> Default for BbParam<T> {
    fn default() -> Self {
        BbParam::Value(T::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_reads_without_blackboard_entry() {
        let bb = Blackboard::new();
        let p = BbParam::value(3.5);
        assert_eq!(p.read(&bb), Some(3.5));
        assert!(!p.is_bound());
    }

    #[test]
    fn test_bound_reads_from_blackboard() {
        let mut bb = Blackboard::new();
        bb.set("speed", 7.0);

        let p: BbParam<f64> = BbParam::var("speed");
        assert_eq!(p.read(&bb), Some(7.0));
        assert!(p.is_bound());
    }

    #[test]
    fn test_bound_missing_or_mistyped() {
        let mut bb = Blackboard::new();
        bb.set("speed", "fast");

        let p: BbParam<f64> = BbParam::var("speed");
        assert_eq!(p.read(&bb), None);

        let q: BbParam<f64> = BbParam::var("absent");
        assert_eq!(q.read(&bb), None);
    }

    #[test]
    fn test_serde_forms() {
        let lit: BbParam<f64> = serde_json::from_str("2.5").unwrap();
        assert_eq!(lit, BbParam::Value(2.5));

        let bound: BbParam<f64> = serde_json::from_str(r#"{"$var":"speed"}"#).unwrap();
        assert_eq!(bound, BbParam::var("speed"));

        assert_eq!(serde_json::to_string(&bound).unwrap(), r#"{"$var":"speed"}"#);

        // a plain string literal must not be mistaken for a binding
        let s: BbParam<String> = serde_json::from_str(r#""hello""#).unwrap();
        assert_eq!(s, BbParam::Value("hello".to_string()));
    }
}
