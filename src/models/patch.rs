//! Tri-state field updates for partial (PATCH-like) requests.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A field in a partial update.
///
/// An absent field deserializes to `Keep`, an explicit JSON `null` to `Clear`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FieldPatch<T> {
    #[default]
    Keep,
    Clear,
    Set(T),
}

impl<T> FieldPatch<T> {
    pub fn apply(self, target: &mut Option<T>) {
        match self {
            FieldPatch::Keep => {}
            FieldPatch::Clear => *target = None,
            FieldPatch::Set(v) => *target = Some(v),
        }
    }

    pub fn is_keep(&self) -> bool {
        matches!(self, FieldPatch::Keep)
    }
}

impl FieldPatch<String> {
    /// Trim a text value; blank text means "no change", never an overwrite with "".
    pub fn normalized(self) -> Self {
        match self {
            FieldPatch::Set(v) => {
                let trimmed = v.trim();
                if trimmed.is_empty() {
                    FieldPatch::Keep
                } else {
                    FieldPatch::Set(trimmed.to_string())
                }
            }
            other => other,
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for FieldPatch<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Option::<T>::deserialize(deserializer)? {
            Some(v) => FieldPatch::Set(v),
            None => FieldPatch::Clear,
        })
    }
}

impl<T: Serialize> Serialize for FieldPatch<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FieldPatch::Set(v) => serializer.serialize_some(v),
            FieldPatch::Keep | FieldPatch::Clear => serializer.serialize_none(),
        }
    }
}

/// Trim optional text, mapping blank input to `None`.
pub fn clean_text(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct CityPatch {
        #[serde(default)]
        city: FieldPatch<String>,
    }

    #[test]
    fn test_absent_null_and_value() {
        let absent: CityPatch = serde_json::from_str("{}").unwrap();
        assert_eq!(absent.city, FieldPatch::Keep);
        let null: CityPatch = serde_json::from_str(r#"{"city": null}"#).unwrap();
        assert_eq!(null.city, FieldPatch::Clear);
        let set: CityPatch = serde_json::from_str(r#"{"city": "Oakland"}"#).unwrap();
        assert_eq!(set.city, FieldPatch::Set("Oakland".to_string()));
    }

    #[test]
    fn test_blank_text_is_no_change() {
        let mut city = Some("Berkeley".to_string());
        FieldPatch::Set("   ".to_string()).normalized().apply(&mut city);
        assert_eq!(city.as_deref(), Some("Berkeley"));
        FieldPatch::<String>::Clear.normalized().apply(&mut city);
        assert_eq!(city, None);
    }

    #[test]
    fn test_clean_text() {
        assert_eq!(clean_text(Some("  x ".into())).as_deref(), Some("x"));
        assert_eq!(clean_text(Some("   ".into())), None);
        assert_eq!(clean_text(None), None);
    }
}
