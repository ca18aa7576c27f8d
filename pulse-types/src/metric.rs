//! A single labelled metric value.

/// One entry of a dashboard metric collection.
///
/// Both fields are free-form strings: the server formats values itself
/// (counts, percentages, durations) and the client displays them verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Metric {
    /// Human-readable concept being measured.
    #[cfg_attr(feature = "serde", serde(rename = "concepto"))]
    pub label: String,

    /// Display value for the concept.
    #[cfg_attr(feature = "serde", serde(rename = "cantidad"))]
    pub value: String,
}

impl Metric {
    /// Create a metric from a label and a value.
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}
