use serde_json::Value;
use std::fmt;

// ============ Row Boundary ============

/// A loosely-typed result row as returned by the data collaborator.
///
/// Column names map to whatever the driver could decode. Typed records are built
/// from it through the `from_row` conversions below, which never fail.
pub type RawRow = serde_json::Map<String, Value>;

/// Label used whenever an area, unit or leader label is blank or missing.
pub const UNIDENTIFIED_LABEL: &str = "Não Identificada";

/// Coerces a field to a non-negative count; anything unparseable becomes 0.
fn coerce_count(value: Option<&Value>) -> u64 {
    match value {
        Some(Value::Number(n)) => {
            if let Some(v) = n.as_u64() {
                v
            } else if let Some(v) = n.as_f64() {
                if v.is_finite() && v > 0.0 {
                    v.trunc() as u64
                } else {
                    0
                }
            } else {
                0
            }
        }
        Some(Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .ok()
            .and_then(|v| u64::try_from(v).ok())
            .unwrap_or(0),
        Some(Value::Bool(b)) => u64::from(*b),
        _ => 0,
    }
}

/// Coerces a field to a finite percentage; anything unparseable becomes `None`.
fn coerce_pct(value: Option<&Value>) -> Option<f64> {
    let parsed = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

/// Reads a text field, trimmed; blank or non-text values yield `None`.
pub fn text_field(row: &RawRow, key: &str) -> Option<String> {
    match row.get(key) {
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

/// Trims a label and substitutes the placeholder when it ends up empty.
pub fn label_or_placeholder(label: &str) -> String {
    let trimmed = label.trim();
    if trimmed.is_empty() {
        UNIDENTIFIED_LABEL.to_string()
    } else {
        trimmed.to_string()
    }
}

// ============ Metric Model ============

/// Visits completed vs planned for one scope and period.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AdherenceMetric {
    pub visits_completed: u64,
    pub visits_planned: u64,
    /// `None` when nothing was planned or the source value was unusable.
    pub adherence_pct: Option<f64>,
}

impl AdherenceMetric {
    /// Metric used when a scope has no row at all in a window.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds a metric from a loosely-typed row. Never panics.
    pub fn from_row(row: &RawRow) -> Self {
        Self {
            visits_completed: coerce_count(row.get("visits_completed")),
            visits_planned: coerce_count(row.get("visits_planned")),
            adherence_pct: coerce_pct(row.get("adherence_pct")),
        }
    }

    pub fn has_planned_visits(&self) -> bool {
        self.visits_planned > 0
    }
}

/// A metric attached to a grouping key (area, collaborator or unit name).
#[derive(Debug, Clone, PartialEq)]
pub struct GroupedMetric {
    pub key: String,
    pub metric: AdherenceMetric,
}

impl GroupedMetric {
    /// Reads the grouping key from `key_field`, falling back to the placeholder label.
    pub fn from_row(row: &RawRow, key_field: &str) -> Self {
        Self {
            key: text_field(row, key_field).unwrap_or_else(|| UNIDENTIFIED_LABEL.to_string()),
            metric: AdherenceMetric::from_row(row),
        }
    }

    /// Like `from_row`, but rows without a usable key are dropped.
    pub fn try_from_row(row: &RawRow, key_field: &str) -> Option<Self> {
        let key = text_field(row, key_field)?;
        Some(Self {
            key,
            metric: AdherenceMetric::from_row(row),
        })
    }
}

// ============ Directory Models ============

/// One leader×area mapping from the leadership directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderRecord {
    /// Trimmed leader name; may be empty when the directory has a gap.
    pub name: String,
    /// Trimmed area label, placeholder when blank.
    pub area: String,
    /// Phone exactly as stored (trimmed), normalized later by the resolver.
    pub raw_phone: String,
}

impl LeaderRecord {
    pub fn from_row(row: &RawRow) -> Self {
        Self {
            name: text_field(row, "leader_name").unwrap_or_default(),
            area: text_field(row, "area").unwrap_or_else(|| UNIDENTIFIED_LABEL.to_string()),
            raw_phone: text_field(row, "phone").unwrap_or_default(),
        }
    }
}

// ============ Dispatch Models ============

/// Which report a dispatch item carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchCategory {
    GeneralLeader,
    Executive,
    AreaLeader,
    Test,
}

impl DispatchCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            DispatchCategory::GeneralLeader => "lider_merchan",
            DispatchCategory::Executive => "diretoria",
            DispatchCategory::AreaLeader => "lider_area",
            DispatchCategory::Test => "teste",
        }
    }
}

impl fmt::Display for DispatchCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recipient's full set of messages, sent in one session.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchItem {
    pub recipient: String,
    pub phone: String,
    pub messages: Vec<String>,
    pub category: DispatchCategory,
}

/// Outcome of a dispatch batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DispatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// The operator cancelled the batch before every item was attempted.
    pub interrupted: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> RawRow {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_metric_from_well_formed_row() {
        let metric = AdherenceMetric::from_row(&row(json!({
            "visits_completed": 8,
            "visits_planned": 10,
            "adherence_pct": "80.00"
        })));

        assert_eq!(metric.visits_completed, 8);
        assert_eq!(metric.visits_planned, 10);
        assert_eq!(metric.adherence_pct, Some(80.0));
    }

    #[test]
    fn test_metric_from_empty_row() {
        let metric = AdherenceMetric::from_row(&RawRow::new());
        assert_eq!(metric, AdherenceMetric::empty());
        assert!(!metric.has_planned_visits());
    }

    #[test]
    fn test_metric_coerces_garbage() {
        let metric = AdherenceMetric::from_row(&row(json!({
            "visits_completed": "abc",
            "visits_planned": -4,
            "adherence_pct": "n/a"
        })));

        assert_eq!(metric.visits_completed, 0);
        assert_eq!(metric.visits_planned, 0);
        assert_eq!(metric.adherence_pct, None);
    }

    #[test]
    fn test_metric_accepts_numeric_strings_and_floats() {
        let metric = AdherenceMetric::from_row(&row(json!({
            "visits_completed": " 7 ",
            "visits_planned": 9.0,
            "adherence_pct": 77.78
        })));

        assert_eq!(metric.visits_completed, 7);
        assert_eq!(metric.visits_planned, 9);
        assert_eq!(metric.adherence_pct, Some(77.78));
    }

    #[test]
    fn test_null_pct_stays_none() {
        let metric = AdherenceMetric::from_row(&row(json!({
            "visits_completed": 0,
            "visits_planned": 0,
            "adherence_pct": null
        })));
        assert_eq!(metric.adherence_pct, None);
    }

    #[test]
    fn test_grouped_metric_keys() {
        let r = row(json!({"area": "  Filial ", "visits_planned": 3}));
        assert_eq!(GroupedMetric::from_row(&r, "area").key, "Filial");

        let blank = row(json!({"collaborator": "   ", "visits_planned": 3}));
        assert_eq!(GroupedMetric::from_row(&blank, "collaborator").key, UNIDENTIFIED_LABEL);
        assert!(GroupedMetric::try_from_row(&blank, "collaborator").is_none());
    }

    #[test]
    fn test_leader_record_defaults() {
        let leader = LeaderRecord::from_row(&row(json!({
            "leader_name": " Ana Souza ",
            "area": null,
            "phone": null
        })));

        assert_eq!(leader.name, "Ana Souza");
        assert_eq!(leader.area, UNIDENTIFIED_LABEL);
        assert_eq!(leader.raw_phone, "");
    }

    #[test]
    fn test_label_or_placeholder() {
        assert_eq!(label_or_placeholder("  Trad "), "Trad");
        assert_eq!(label_or_placeholder("   "), UNIDENTIFIED_LABEL);
    }
}
