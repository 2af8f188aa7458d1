use serde::{Deserialize, Serialize};

/// A named, indexed transformation of a fitted data set.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct Variant {
    pub function_name: String,
    pub index: u32,
}

impl Variant {
    pub fn new(function_name: &str, index: u32) -> Self {
        Self {
            function_name: function_name.to_string(),
            index,
        }
    }

    /// Directory-friendly label, e.g. `double_x_000002`.
    #[must_use]
    pub fn label(&self) -> String {
        format!("{}_{:06}", self.function_name, self.index)
    }
}

/// Human-facing description of an applied variant.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct VariantMetadata {
    pub short_name: String,
    pub description: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_is_zero_padded() {
        assert_eq!(Variant::new("double_x", 2).label(), "double_x_000002");
    }
}
