//! Snapshot - the complete dashboard payload at one point in time.

use crate::Metric;

/// A complete, self-contained set of dashboard metrics.
///
/// Every `dashboard:update` event carries one snapshot, and the latest one
/// replaces the previous one entirely. Snapshots are never merged or diffed.
///
/// # Example
///
/// ```rust
/// use pulse_types::{Metric, MetricSnapshot};
///
/// let snapshot = MetricSnapshot::builder()
///     .user("Total", "12")
///     .build();
///
/// assert_eq!(snapshot.users, vec![Metric::new("Total", "12")]);
/// assert!(snapshot.improvement_data.is_empty());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MetricSnapshot {
    /// User-related metrics, in server order.
    #[cfg_attr(feature = "serde", serde(default))]
    pub users: Vec<Metric>,

    /// Improvement-plan metrics, in server order.
    #[cfg_attr(
        feature = "serde",
        serde(default, rename = "improvementData")
    )]
    pub improvement_data: Vec<Metric>,
}

impl MetricSnapshot {
    /// Create an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder for constructing snapshots.
    pub fn builder() -> MetricSnapshotBuilder {
        MetricSnapshotBuilder::new()
    }

    /// Check if both collections are empty.
    pub fn is_empty(&self) -> bool {
        self.users.is_empty() && self.improvement_data.is_empty()
    }

    /// Total number of metrics across both collections.
    pub fn len(&self) -> usize {
        self.users.len() + self.improvement_data.len()
    }
}

/// Builder for constructing `MetricSnapshot` instances.
#[derive(Debug, Default)]
pub struct MetricSnapshotBuilder {
    users: Vec<Metric>,
    improvement_data: Vec<Metric>,
}

impl MetricSnapshotBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a user metric.
    pub fn user(mut self, label: impl Into<String>, value: impl Into<String>) -> Self {
        self.users.push(Metric::new(label, value));
        self
    }

    /// Append an improvement-data metric.
    pub fn improvement(mut self, label: impl Into<String>, value: impl Into<String>) -> Self {
        self.improvement_data.push(Metric::new(label, value));
        self
    }

    /// Build the snapshot.
    pub fn build(self) -> MetricSnapshot {
        MetricSnapshot {
            users: self.users,
            improvement_data: self.improvement_data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_builder() {
        let snapshot = MetricSnapshot::builder()
            .user("Total", "12")
            .improvement("Open plans", "4")
            .improvement("Closed plans", "7")
            .build();

        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot.users[0].label, "Total");
        assert_eq!(snapshot.improvement_data[1].value, "7");
        assert!(!snapshot.is_empty());
        assert!(MetricSnapshot::new().is_empty());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_deserialize_dashboard_payload() {
        let json = r#"{
            "users": [
                { "concepto": "Total", "cantidad": "12" },
                { "concepto": "Activos", "cantidad": "9" }
            ],
            "improvementData": [
                { "concepto": "Planes abiertos", "cantidad": "4" }
            ]
        }"#;

        let snapshot: MetricSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snapshot.users.len(), 2);
        assert_eq!(snapshot.users[1], Metric::new("Activos", "9"));
        assert_eq!(snapshot.improvement_data[0].label, "Planes abiertos");
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_missing_collections_default_to_empty() {
        let snapshot: MetricSnapshot = serde_json::from_str("{}").unwrap();
        assert!(snapshot.is_empty());

        let snapshot: MetricSnapshot =
            serde_json::from_str(r#"{"users":[{"concepto":"Total","cantidad":"1"}]}"#).unwrap();
        assert_eq!(snapshot.users.len(), 1);
        assert!(snapshot.improvement_data.is_empty());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_serializes_with_server_field_names() {
        let snapshot = MetricSnapshot::builder().improvement("Acciones", "3").build();
        let json = serde_json::to_value(&snapshot).unwrap();

        assert!(json.get("improvementData").is_some());
        assert_eq!(json["improvementData"][0]["cantidad"], "3");
        assert_eq!(json["users"], serde_json::json!([]));
    }
}
