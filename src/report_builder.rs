//! Plain-text report messages for the WhatsApp dispatch.
//!
//! All builders are pure: they take already-aggregated metrics and lookup maps and
//! return the finished message body. Names and labels are interpolated verbatim.

use crate::models::{label_or_placeholder, AdherenceMetric, GroupedMetric};
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

/// Group key → metric, for looking up the second window of a comparison.
pub type MetricLookup = HashMap<String, AdherenceMetric>;

pub const NULL_PLACEHOLDER: &str = "—";
pub const NO_PLANNED_VISITS_LINE: &str = "- Nenhum colaborador com visitas planejadas ontem.";
const NO_DATA_LINE: &str = "- Sem visitas no período.";

/// Visual tier for an adherence percentage.
pub fn pct_indicator(pct: f64) -> &'static str {
    if pct < 70.0 {
        "❌"
    } else if pct < 90.0 {
        "🟡"
    } else {
        "✅"
    }
}

/// Renders a percentage with one decimal, `—` when unknown.
pub fn format_pct(pct: Option<f64>, with_indicator: bool) -> String {
    match pct {
        None => NULL_PLACEHOLDER.to_string(),
        Some(p) if with_indicator => format!("{} {:.1}%", pct_indicator(p), p),
        Some(p) => format!("{:.1}%", p),
    }
}

pub fn format_metric(metric: &AdherenceMetric, with_indicator: bool) -> String {
    format_pct(metric.adherence_pct, with_indicator)
}

/// Builds a key → metric map. Later duplicates overwrite earlier ones.
pub fn index_by_key(rows: &[GroupedMetric]) -> MetricLookup {
    rows.iter()
        .map(|row| (row.key.clone(), row.metric))
        .collect()
}

/// Orders areas by the preferred list, then alphabetically (case-insensitive).
pub fn order_areas<'a>(rows: &'a [GroupedMetric], priority: &[String]) -> Vec<&'a GroupedMetric> {
    let rank: HashMap<String, usize> = priority
        .iter()
        .enumerate()
        .map(|(i, name)| (name.trim().to_lowercase(), i))
        .collect();

    let mut ordered: Vec<&GroupedMetric> = rows.iter().collect();
    ordered.sort_by_cached_key(|row| {
        let name = row.key.trim().to_lowercase();
        (rank.get(&name).copied().unwrap_or(usize::MAX), name)
    });
    ordered
}

/// One important unit compared across two windows.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedUnit {
    pub name: String,
    pub first: Option<AdherenceMetric>,
    pub second: Option<AdherenceMetric>,
}

/// Unions unit keys from both windows; each side is looked up independently.
///
/// Ordered by planned visits in the second (longer) window, then by name.
pub fn merge_unit_windows(first: &[GroupedMetric], second: &[GroupedMetric]) -> Vec<MergedUnit> {
    let first_by_name = index_by_key(first);
    let second_by_name = index_by_key(second);

    let names: BTreeSet<&String> = first_by_name.keys().chain(second_by_name.keys()).collect();

    let mut merged: Vec<MergedUnit> = names
        .into_iter()
        .map(|name| MergedUnit {
            name: name.clone(),
            first: first_by_name.get(name).copied(),
            second: second_by_name.get(name).copied(),
        })
        .collect();

    merged.sort_by(|a, b| {
        let planned = |u: &MergedUnit| u.second.map(|m| m.visits_planned).unwrap_or(0);
        planned(b)
            .cmp(&planned(a))
            .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
    });
    merged
}

/// Collaborators listed for an area leader, alphabetical.
///
/// Only collaborators with planned visits in the yesterday window qualify.
pub fn build_roster<'a>(
    day: &'a MetricLookup,
    month: &'a MetricLookup,
) -> Vec<(&'a str, AdherenceMetric, AdherenceMetric)> {
    let mut roster: Vec<(&str, AdherenceMetric, AdherenceMetric)> = day
        .iter()
        .filter(|(_, metric)| metric.has_planned_visits())
        .map(|(name, metric)| {
            let month_metric = month.get(name).copied().unwrap_or_else(AdherenceMetric::empty);
            (name.as_str(), *metric, month_metric)
        })
        .collect();

    roster.sort_by(|a, b| match a.0.to_lowercase().cmp(&b.0.to_lowercase()) {
        Ordering::Equal => a.0.cmp(b.0),
        other => other,
    });
    roster
}

fn finish(lines: Vec<String>) -> String {
    format!("{}\n", lines.join("\n").trim())
}

fn headline(first_label: &str, first: &AdherenceMetric, second_label: &str, second: &AdherenceMetric) -> String {
    format!(
        "{}: {}  |  {}: {}",
        first_label,
        format_metric(first, false),
        second_label,
        format_metric(second, true)
    )
}

fn entry(
    name: &str,
    first_label: &str,
    first: Option<&AdherenceMetric>,
    second_label: &str,
    second: Option<&AdherenceMetric>,
) -> String {
    format!(
        "- {}: {} {}  |  {} {}",
        name,
        first_label,
        format_pct(first.and_then(|m| m.adherence_pct), false),
        second_label,
        format_pct(second.and_then(|m| m.adherence_pct), true)
    )
}

/// Units block shared by the general and executive messages.
#[derive(Debug, Clone, Copy)]
pub struct UnitsSection<'a> {
    pub title: &'a str,
    pub first: &'a [GroupedMetric],
    pub second: &'a [GroupedMetric],
}

fn push_area_section(
    lines: &mut Vec<String>,
    first_label: &str,
    areas: &[GroupedMetric],
    month_by_area: &MetricLookup,
    area_order: &[String],
) {
    lines.push(String::new());
    lines.push("📍 Aderência ao Roteiro por Área".to_string());
    if areas.is_empty() {
        lines.push(NO_DATA_LINE.to_string());
        return;
    }
    for row in order_areas(areas, area_order) {
        let area = label_or_placeholder(&row.key);
        lines.push(entry(
            &area,
            first_label,
            Some(&row.metric),
            "Mês",
            month_by_area.get(&row.key),
        ));
    }
}

fn push_units_section(lines: &mut Vec<String>, first_label: &str, section: &UnitsSection<'_>) {
    lines.push(String::new());
    lines.push(section.title.to_string());
    let merged = merge_unit_windows(section.first, section.second);
    if merged.is_empty() {
        lines.push(NO_DATA_LINE.to_string());
        return;
    }
    for unit in &merged {
        lines.push(entry(
            &unit.name,
            first_label,
            unit.first.as_ref(),
            "Mês",
            unit.second.as_ref(),
        ));
    }
}

/// Inputs for the daily general-leadership message.
pub struct GeneralReport<'a> {
    pub reference_label: &'a str,
    pub overall_day: AdherenceMetric,
    pub overall_month: AdherenceMetric,
    pub areas_day: &'a [GroupedMetric],
    pub areas_month: &'a MetricLookup,
    pub area_order: &'a [String],
    /// Present on days the units block is sent.
    pub units: Option<UnitsSection<'a>>,
}

pub fn build_general_leader_message(report: &GeneralReport<'_>) -> String {
    let mut lines = vec![
        format!("📊 Relatório Merchandising (ref.: {})", report.reference_label),
        String::new(),
        "Aderência ao Roteiro Geral".to_string(),
        headline("Ontem", &report.overall_day, "Mês", &report.overall_month),
    ];

    push_area_section(
        &mut lines,
        "Ontem",
        report.areas_day,
        report.areas_month,
        report.area_order,
    );

    if let Some(units) = &report.units {
        push_units_section(&mut lines, "Ontem", units);
    }

    finish(lines)
}

/// Inputs for the Monday executive message.
pub struct ExecutiveReport<'a> {
    pub reference_label: &'a str,
    pub week_label: &'a str,
    pub overall_week: AdherenceMetric,
    pub overall_month: AdherenceMetric,
    pub areas_week: &'a [GroupedMetric],
    pub areas_month: &'a MetricLookup,
    pub area_order: &'a [String],
    pub units: Option<UnitsSection<'a>>,
}

/// Same layout as the general message, with the previous week in place of
/// yesterday. Only the month figure carries an indicator.
pub fn build_executive_message(report: &ExecutiveReport<'_>) -> String {
    let mut lines = vec![
        format!(
            "📊 Relatório Merchandising - Diretoria (ref.: {})",
            report.reference_label
        ),
        String::new(),
        "Aderência ao Roteiro Geral".to_string(),
        headline(
            &format!("Semana ({})", report.week_label),
            &report.overall_week,
            "Mês",
            &report.overall_month,
        ),
    ];

    push_area_section(
        &mut lines,
        "Semana",
        report.areas_week,
        report.areas_month,
        report.area_order,
    );

    if let Some(units) = &report.units {
        push_units_section(&mut lines, "Semana", units);
    }

    finish(lines)
}

/// Inputs for one area leader's message.
pub struct AreaLeaderReport<'a> {
    pub area_name: &'a str,
    pub reference_label: &'a str,
    pub area_day: AdherenceMetric,
    pub area_month: AdherenceMetric,
    pub collaborators_day: &'a MetricLookup,
    pub collaborators_month: &'a MetricLookup,
}

pub fn build_area_leader_message(report: &AreaLeaderReport<'_>) -> String {
    let area = label_or_placeholder(report.area_name);
    let mut lines = vec![
        format!(
            "📊 Relatório Merchan - {} (ref.: {})",
            area, report.reference_label
        ),
        String::new(),
        format!("Aderência ao Roteiro {}", area),
        headline("Ontem", &report.area_day, "Mês", &report.area_month),
        String::new(),
        "👥 Colaboradores (ordem alfabética)".to_string(),
    ];

    let roster = build_roster(report.collaborators_day, report.collaborators_month);
    if roster.is_empty() {
        lines.push(NO_PLANNED_VISITS_LINE.to_string());
    }
    for (name, day, month) in roster {
        lines.push(entry(name, "Ontem", Some(&day), "Mês", Some(&month)));
    }

    finish(lines)
}
