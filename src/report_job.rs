//! One reporting run: directory → metrics → messages → dispatch items.

use crate::config::Config;
use crate::errors::{AppError, ResultExt};
use crate::models::{AdherenceMetric, DispatchCategory, DispatchItem, GroupedMetric, LeaderRecord};
use crate::period::RunCalendar;
use crate::queries::{QueryScope, UnitSelection, VisitStore};
use crate::recipients::{partition_leaders, recipient_name, LeaderClass, RecipientResolver};
use crate::report_builder::{
    build_area_leader_message, build_executive_message, build_general_leader_message,
    index_by_key, AreaLeaderReport, ExecutiveReport, GeneralReport, UnitsSection,
};

/// Command-line switches that change which reports are produced.
#[derive(Debug, Clone, Copy, Default)]
pub struct JobOptions {
    /// Only the Monday executive report; general and area reports are skipped.
    pub executive_only: bool,
}

pub struct ReportJob<'a, V: ?Sized> {
    store: &'a V,
    area_order: &'a [String],
    resolver: RecipientResolver,
    options: JobOptions,
}

impl<'a, V: VisitStore + ?Sized> ReportJob<'a, V> {
    pub fn new(store: &'a V, config: &'a Config, options: JobOptions) -> Result<Self, AppError> {
        Ok(Self {
            store,
            area_order: &config.area_order,
            resolver: RecipientResolver::new(&config.recipients)?,
            options,
        })
    }

    /// Builds every dispatch item for the run, in send order:
    /// general leaders, executives, then area leaders.
    pub async fn build_items(&self, calendar: &RunCalendar) -> Result<Vec<DispatchItem>, AppError> {
        let leaders = self
            .store
            .leaders()
            .await
            .context("Loading leader directory")?;
        if leaders.is_empty() {
            return Err(AppError::NoLeaders);
        }

        let partition = partition_leaders(leaders);
        tracing::info!(
            "Leaders: {} general, {} executive, {} area",
            partition.general.len(),
            partition.executive.len(),
            partition.area.len()
        );

        let mut items = Vec::new();

        if !self.options.executive_only && !partition.general.is_empty() {
            items.extend(self.general_items(calendar, &partition.general).await?);
        }

        if calendar.is_executive_day() && !partition.executive.is_empty() {
            items.extend(self.executive_items(calendar, &partition.executive).await?);
        }

        if !self.options.executive_only && !partition.area.is_empty() {
            items.extend(self.area_items(calendar, &partition.area).await?);
        }

        tracing::info!("✓ {} dispatch item(s) prepared", items.len());
        Ok(items)
    }

    async fn general_items(
        &self,
        calendar: &RunCalendar,
        leaders: &[LeaderRecord],
    ) -> Result<Vec<DispatchItem>, AppError> {
        let day = &calendar.yesterday;
        let month = &calendar.month_to_date;

        let overall_day = self.store.overall(day).await.context("Overall, yesterday")?;
        let overall_month = self.store.overall(month).await.context("Overall, month")?;
        let areas_day = self.store.areas(day).await.context("Areas, yesterday")?;
        let areas_month = index_by_key(&self.store.areas(month).await.context("Areas, month")?);
        let units_day = self
            .store
            .important_units(day, UnitSelection::GROUPS_AND_CHAINS)
            .await
            .context("Important units, yesterday")?;
        let units_month = self
            .store
            .important_units(month, UnitSelection::GROUPS_AND_CHAINS)
            .await
            .context("Important units, month")?;

        let reference_label = calendar.reference_label();
        let units_title = format!("🏪 Grupos/Redes Importantes ({})", month.label());
        let message = build_general_leader_message(&GeneralReport {
            reference_label: &reference_label,
            overall_day,
            overall_month,
            areas_day: &areas_day,
            areas_month: &areas_month,
            area_order: self.area_order,
            units: Some(UnitsSection {
                title: &units_title,
                first: &units_day,
                second: &units_month,
            }),
        });

        Ok(leaders
            .iter()
            .map(|leader| DispatchItem {
                recipient: recipient_name(leader, LeaderClass::General),
                phone: self.resolver.resolve_phone(&leader.raw_phone),
                messages: vec![message.clone()],
                category: DispatchCategory::GeneralLeader,
            })
            .collect())
    }

    async fn executive_items(
        &self,
        calendar: &RunCalendar,
        leaders: &[LeaderRecord],
    ) -> Result<Vec<DispatchItem>, AppError> {
        let week = &calendar.previous_week;
        let month = &calendar.month_to_date;

        let overall_week = self.store.overall(week).await.context("Overall, week")?;
        let overall_month = self.store.overall(month).await.context("Overall, month")?;
        let areas_week = self.store.areas(week).await.context("Areas, week")?;
        let areas_month = index_by_key(&self.store.areas(month).await.context("Areas, month")?);
        let groups_week = self
            .store
            .important_units(week, UnitSelection::GROUPS_ONLY)
            .await
            .context("Economic groups, week")?;
        let groups_month = self
            .store
            .important_units(month, UnitSelection::GROUPS_ONLY)
            .await
            .context("Economic groups, month")?;

        let reference_label = calendar.reference_label();
        let message = build_executive_message(&ExecutiveReport {
            reference_label: &reference_label,
            week_label: week.label(),
            overall_week,
            overall_month,
            areas_week: &areas_week,
            areas_month: &areas_month,
            area_order: self.area_order,
            units: Some(UnitsSection {
                title: "🏪 Grupos Econômicos Importantes",
                first: &groups_week,
                second: &groups_month,
            }),
        });

        Ok(leaders
            .iter()
            .map(|leader| DispatchItem {
                recipient: recipient_name(leader, LeaderClass::Executive),
                phone: self.resolver.resolve_phone(&leader.raw_phone),
                messages: vec![message.clone()],
                category: DispatchCategory::Executive,
            })
            .collect())
    }

    async fn area_items(
        &self,
        calendar: &RunCalendar,
        leaders: &[LeaderRecord],
    ) -> Result<Vec<DispatchItem>, AppError> {
        let day = &calendar.yesterday;
        let month = &calendar.month_to_date;
        let reference_label = calendar.reference_label();
        let mut items = Vec::new();

        for leader in leaders {
            let requested = QueryScope::Area(leader.area.clone());
            let area_day = self
                .store
                .scope_total(&requested, day)
                .await
                .with_context(|| format!("Area total for {}, yesterday", leader.area))?;
            let area_month = self
                .store
                .scope_total(&requested, month)
                .await
                .with_context(|| format!("Area total for {}, month", leader.area))?;

            // The database spelling of the area wins over the directory's.
            let area_name = area_day
                .as_ref()
                .map(|row| row.key.clone())
                .unwrap_or_else(|| leader.area.clone());
            let scope = QueryScope::Area(area_name.clone());

            let collaborators_day = index_by_key(
                &self
                    .store
                    .collaborators(&scope, day)
                    .await
                    .with_context(|| format!("Collaborators for {}, yesterday", area_name))?,
            );
            let collaborators_month = index_by_key(
                &self
                    .store
                    .collaborators(&scope, month)
                    .await
                    .with_context(|| format!("Collaborators for {}, month", area_name))?,
            );

            if collaborators_day.is_empty() && collaborators_month.is_empty() {
                tracing::warn!(
                    "⚠ Skipping {} ({}): no collaborators in the period",
                    leader.name,
                    area_name
                );
                continue;
            }

            let message = build_area_leader_message(&AreaLeaderReport {
                area_name: &area_name,
                reference_label: &reference_label,
                area_day: metric_or_empty(area_day),
                area_month: metric_or_empty(area_month),
                collaborators_day: &collaborators_day,
                collaborators_month: &collaborators_month,
            });

            items.push(DispatchItem {
                recipient: leader.name.clone(),
                phone: self.resolver.resolve_phone(&leader.raw_phone),
                messages: vec![message],
                category: DispatchCategory::AreaLeader,
            });
        }

        Ok(items)
    }
}

fn metric_or_empty(row: Option<GroupedMetric>) -> AdherenceMetric {
    row.map(|r| r.metric).unwrap_or_default()
}
