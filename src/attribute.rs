use crate::lookup::Substitutor;
use crate::record::LogRecord;

/// One extra key/value pair added to every outgoing document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttributeSpec {
    pub name: String,
    /// Literal value, or a template when `needs_lookup` is set.
    pub value: String,
    pub needs_lookup: bool,
}

impl AttributeSpec {
    /// Create an attribute, treating the value as a template when it
    /// contains a `${` placeholder.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        let value = value.into();
        let needs_lookup = value.contains("${");
        AttributeSpec {
            name: name.into(),
            value,
            needs_lookup,
        }
    }

    pub fn literal(name: impl Into<String>, value: impl Into<String>) -> Self {
        AttributeSpec {
            name: name.into(),
            value: value.into(),
            needs_lookup: false,
        }
    }

    pub fn lookup(name: impl Into<String>, template: impl Into<String>) -> Self {
        AttributeSpec {
            name: name.into(),
            value: template.into(),
            needs_lookup: true,
        }
    }

    /// Final value of this attribute for `record`.
    pub fn resolve(&self, record: &LogRecord, substitutor: &Substitutor) -> String {
        if self.needs_lookup {
            substitutor.replace(record, &self.value)
        } else {
            self.value.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::Level;

    #[test]
    fn literal_values_are_not_substituted() {
        let record = LogRecord::new(Level::INFO, "app", "msg").with_context("eval", "x");
        let spec = AttributeSpec::literal("p", "${eval}");
        assert_eq!(spec.resolve(&record, &Substitutor::new()), "${eval}");
    }

    #[test]
    fn new_detects_templates() {
        assert!(AttributeSpec::new("p", "${eval}").needs_lookup);
        assert!(!AttributeSpec::new("p", "value").needs_lookup);

        let record = LogRecord::new(Level::INFO, "app", "msg").with_context("eval", "eval");
        let spec = AttributeSpec::new("p3", "${eval}");
        assert_eq!(spec.resolve(&record, &Substitutor::new()), "eval");
    }
}
