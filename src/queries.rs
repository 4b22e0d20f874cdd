//! Aggregation queries over the field-visit monitoring table.
//!
//! Every query returns the same metric columns (`visits_completed`,
//! `visits_planned`, `adherence_pct`) plus, when grouped, one key column
//! (`area`, `collaborator` or `unit`). Window bounds are bound as `$1`/`$2` and the
//! completed check-in types as `$3`; scope values and unit names follow.
//!
//! Visit filters applied everywhere:
//! - the off-route flag must be negative (`'Não'`), a missing flag counts as negative;
//! - visits on a listed holiday are ignored (unless disabled in configuration).

use crate::config::QueryConfig;
use crate::errors::{AppError, ResultExt};
use crate::models::{AdherenceMetric, GroupedMetric, LeaderRecord, RawRow, UNIDENTIFIED_LABEL};
use crate::period::ReportWindow;
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use serde_json::Value;
use sqlx::postgres::PgRow;
use sqlx::{Column, PgPool, Row};

/// Restricts a grouped query to one area.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryScope {
    Area(String),
}

impl QueryScope {
    pub fn value(&self) -> &str {
        match self {
            QueryScope::Area(name) => name,
        }
    }
}

/// Which kinds of important units to aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitSelection {
    pub groups: bool,
    pub chains: bool,
}

impl UnitSelection {
    pub const GROUPS_AND_CHAINS: Self = Self {
        groups: true,
        chains: true,
    };
    pub const GROUPS_ONLY: Self = Self {
        groups: true,
        chains: false,
    };
}

/// Read side of the monitoring database, as consumed by the report job.
#[async_trait]
pub trait VisitStore: Send + Sync {
    /// Leader directory joined with leadership phones.
    async fn leaders(&self) -> Result<Vec<LeaderRecord>, AppError>;

    /// Company-wide adherence for a window.
    async fn overall(&self, window: &ReportWindow) -> Result<AdherenceMetric, AppError>;

    /// Adherence per area for a window.
    async fn areas(&self, window: &ReportWindow) -> Result<Vec<GroupedMetric>, AppError>;

    /// Area total for one leader's team or one area.
    async fn scope_total(
        &self,
        scope: &QueryScope,
        window: &ReportWindow,
    ) -> Result<Option<GroupedMetric>, AppError>;

    /// Adherence per field collaborator inside a scope.
    async fn collaborators(
        &self,
        scope: &QueryScope,
        window: &ReportWindow,
    ) -> Result<Vec<GroupedMetric>, AppError>;

    /// Adherence per important economic group and/or retail chain.
    async fn important_units(
        &self,
        window: &ReportWindow,
        selection: UnitSelection,
    ) -> Result<Vec<GroupedMetric>, AppError>;
}

// ============ SQL Templates ============

fn completed_expr(alias: &str) -> String {
    format!("SUM(CASE WHEN {alias}tipo_checkin = ANY($3) THEN 1 ELSE 0 END)")
}

fn metric_columns(alias: &str) -> String {
    let completed = completed_expr(alias);
    format!(
        "COALESCE({completed}, 0) AS visits_completed,
    COUNT({alias}visita_id) AS visits_planned,
    CAST(
        {completed}::float8 * 100 / NULLIF(COUNT({alias}visita_id), 0)
    AS NUMERIC(10,2)) AS adherence_pct"
    )
}

fn visit_filters(config: &QueryConfig) -> String {
    let mut filters = String::from(
        "mp.data_visita >= $1
  AND mp.data_visita < $2
  AND lower(btrim(COALESCE(mp.fora_do_roteiro, 'Não'))) IN ('nao', 'não')",
    );
    if config.exclude_holidays {
        filters.push_str(&format!(
            "
  AND NOT EXISTS (
      SELECT 1 FROM {} f WHERE f.data = CAST(mp.data_visita AS DATE)
  )",
            config.tables.holidays
        ));
    }
    filters
}

fn area_expr() -> String {
    format!("COALESCE(dam.area_merchan, '{}')", UNIDENTIFIED_LABEL)
}

pub fn leaders_sql(config: &QueryConfig) -> String {
    format!(
        "SELECT DISTINCT
    a.colaborador_superior AS leader_name,
    a.area_merchan AS area,
    t.telefone AS phone
FROM {areas} a
LEFT JOIN {phones} t
    ON t.nome_colaborador = a.colaborador_superior
ORDER BY leader_name, area",
        areas = config.tables.area_directory,
        phones = config.tables.leader_phones,
    )
}

pub fn overall_sql(config: &QueryConfig) -> String {
    format!(
        "SELECT
    {columns}
FROM {monitoring} mp
WHERE {filters}",
        columns = metric_columns("mp."),
        monitoring = config.tables.monitoring,
        filters = visit_filters(config),
    )
}

pub fn area_totals_sql(config: &QueryConfig) -> String {
    format!(
        "SELECT
    {area} AS area,
    {columns}
FROM {monitoring} mp
LEFT JOIN {areas} dam
    ON dam.colaborador_superior = mp.colaborador_superior
WHERE {filters}
GROUP BY {area}",
        area = area_expr(),
        columns = metric_columns("mp."),
        monitoring = config.tables.monitoring,
        areas = config.tables.area_directory,
        filters = visit_filters(config),
    )
}

fn scope_filter(scope: &QueryScope) -> String {
    match scope {
        QueryScope::Area(_) => format!("{} = $4", area_expr()),
    }
}

pub fn scope_total_sql(config: &QueryConfig, scope: &QueryScope) -> String {
    format!(
        "SELECT
    {area} AS area,
    {columns}
FROM {monitoring} mp
LEFT JOIN {areas} dam
    ON dam.colaborador_superior = mp.colaborador_superior
WHERE {scope}
  AND {filters}
GROUP BY {area}",
        area = area_expr(),
        columns = metric_columns("mp."),
        monitoring = config.tables.monitoring,
        areas = config.tables.area_directory,
        scope = scope_filter(scope),
        filters = visit_filters(config),
    )
}

pub fn collaborators_sql(config: &QueryConfig, scope: &QueryScope) -> String {
    // Area scope needs the directory join to map supervisors to areas.
    let join = format!(
        "INNER JOIN {} dam
    ON dam.colaborador_superior = mp.colaborador_superior",
        config.tables.area_directory
    );
    format!(
        "SELECT
    mp.colaborador AS collaborator,
    {columns}
FROM {monitoring} mp
{join}
WHERE {scope}
  AND {filters}
GROUP BY mp.colaborador",
        columns = metric_columns("mp."),
        monitoring = config.tables.monitoring,
        scope = scope_filter(scope),
        filters = visit_filters(config),
    )
}

/// SQL text plus the name lists to bind after the three common parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitQuery {
    pub sql: String,
    pub name_lists: Vec<Vec<String>>,
}

/// Builds the important-units query, or `None` when nothing would be selected.
///
/// The client code is the point-of-sale label up to the first `-`; labels that do
/// not start with a numeric code fall into the 99999 bucket and match nothing.
pub fn important_units_sql(config: &QueryConfig, selection: UnitSelection) -> Option<UnitQuery> {
    let mut branches = Vec::new();
    let mut name_lists = Vec::new();

    if selection.groups && !config.important_groups.is_empty() {
        name_lists.push(config.important_groups.clone());
        branches.push(format!(
            "SELECT g.nome_grupo AS unit, b.visita_id, b.tipo_checkin
    FROM base_com_codigo b
    INNER JOIN {groups} g ON g.cod_cliente = b.cod_cliente
    WHERE g.nome_grupo = ANY(${param})",
            groups = config.tables.economic_groups,
            param = 3 + name_lists.len(),
        ));
    }

    if selection.chains && !config.important_chains.is_empty() {
        name_lists.push(config.important_chains.clone());
        branches.push(format!(
            "SELECT r.nome_rede AS unit, b.visita_id, b.tipo_checkin
    FROM base_com_codigo b
    INNER JOIN {clients} c ON c.cod_cliente = b.cod_cliente
    INNER JOIN {chains} r ON r.cod_rede = c.cod_rede
    WHERE r.nome_rede = ANY(${param})",
            clients = config.tables.clients,
            chains = config.tables.retail_chains,
            param = 3 + name_lists.len(),
        ));
    }

    if branches.is_empty() {
        return None;
    }

    let sql = format!(
        "WITH base AS (
    SELECT
        mp.visita_id,
        mp.tipo_checkin,
        btrim(split_part(COALESCE(mp.ponto_de_venda, ''), '-', 1)) AS cod_extraido
    FROM {monitoring} mp
    WHERE {filters}
),
base_com_codigo AS (
    SELECT
        visita_id,
        tipo_checkin,
        CASE
            WHEN cod_extraido ~ '^[0-9]{{1,9}}$' THEN cod_extraido::int
            ELSE 99999
        END AS cod_cliente
    FROM base
),
uniao AS (
    {branches}
)
SELECT
    unit,
    {columns}
FROM uniao
GROUP BY unit",
        monitoring = config.tables.monitoring,
        filters = visit_filters(config),
        branches = branches.join("\n\n    UNION ALL\n\n    "),
        columns = metric_columns(""),
    );

    Some(UnitQuery { sql, name_lists })
}

// ============ Postgres Store ============

/// Decodes every column of a row into a loosely-typed mapping.
///
/// Integers become JSON numbers, NUMERIC becomes its decimal string, text stays
/// text; anything the driver cannot decode becomes null.
pub fn decode_row(row: &PgRow) -> RawRow {
    let mut out = RawRow::new();
    for column in row.columns() {
        let idx = column.ordinal();
        let value = if let Ok(v) = row.try_get::<Option<i64>, _>(idx) {
            v.map(Value::from)
        } else if let Ok(v) = row.try_get::<Option<i32>, _>(idx) {
            v.map(Value::from)
        } else if let Ok(v) = row.try_get::<Option<BigDecimal>, _>(idx) {
            v.map(|d| Value::String(d.to_string()))
        } else if let Ok(v) = row.try_get::<Option<f64>, _>(idx) {
            v.and_then(serde_json::Number::from_f64).map(Value::Number)
        } else if let Ok(v) = row.try_get::<Option<String>, _>(idx) {
            v.map(Value::String)
        } else {
            tracing::debug!("Column '{}' has an undecodable type", column.name());
            None
        };
        out.insert(column.name().to_string(), value.unwrap_or(Value::Null));
    }
    out
}

pub struct PgVisitStore {
    pool: PgPool,
    config: QueryConfig,
}

impl PgVisitStore {
    pub fn new(pool: PgPool, config: QueryConfig) -> Self {
        Self { pool, config }
    }

    async fn fetch_window_rows(
        &self,
        sql: &str,
        window: &ReportWindow,
        extra: &[String],
        what: &str,
    ) -> Result<Vec<RawRow>, AppError> {
        tracing::debug!("Querying {} for {} .. {}", what, window.start(), window.end());
        let mut query = sqlx::query(sql)
            .bind(window.start())
            .bind(window.end())
            .bind(self.config.valid_checkins.clone());
        for value in extra {
            query = query.bind(value.clone());
        }
        let rows = query
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("Querying {}", what))?;
        Ok(rows.iter().map(decode_row).collect())
    }
}

#[async_trait]
impl VisitStore for PgVisitStore {
    async fn leaders(&self) -> Result<Vec<LeaderRecord>, AppError> {
        let rows = sqlx::query(&leaders_sql(&self.config))
            .fetch_all(&self.pool)
            .await
            .context("Querying leader directory")?;
        Ok(rows
            .iter()
            .map(|row| LeaderRecord::from_row(&decode_row(row)))
            .collect())
    }

    async fn overall(&self, window: &ReportWindow) -> Result<AdherenceMetric, AppError> {
        let rows = self
            .fetch_window_rows(&overall_sql(&self.config), window, &[], "overall adherence")
            .await?;
        Ok(rows
            .first()
            .map(AdherenceMetric::from_row)
            .unwrap_or_else(AdherenceMetric::empty))
    }

    async fn areas(&self, window: &ReportWindow) -> Result<Vec<GroupedMetric>, AppError> {
        let rows = self
            .fetch_window_rows(&area_totals_sql(&self.config), window, &[], "area totals")
            .await?;
        Ok(rows
            .iter()
            .map(|row| GroupedMetric::from_row(row, "area"))
            .collect())
    }

    async fn scope_total(
        &self,
        scope: &QueryScope,
        window: &ReportWindow,
    ) -> Result<Option<GroupedMetric>, AppError> {
        let rows = self
            .fetch_window_rows(
                &scope_total_sql(&self.config, scope),
                window,
                &[scope.value().to_string()],
                "scope total",
            )
            .await?;
        Ok(rows.first().map(|row| GroupedMetric::from_row(row, "area")))
    }

    async fn collaborators(
        &self,
        scope: &QueryScope,
        window: &ReportWindow,
    ) -> Result<Vec<GroupedMetric>, AppError> {
        let rows = self
            .fetch_window_rows(
                &collaborators_sql(&self.config, scope),
                window,
                &[scope.value().to_string()],
                "collaborators",
            )
            .await?;
        Ok(rows
            .iter()
            .filter_map(|row| GroupedMetric::try_from_row(row, "collaborator"))
            .collect())
    }

    async fn important_units(
        &self,
        window: &ReportWindow,
        selection: UnitSelection,
    ) -> Result<Vec<GroupedMetric>, AppError> {
        let Some(unit_query) = important_units_sql(&self.config, selection) else {
            tracing::debug!("No important units configured for {:?}", selection);
            return Ok(Vec::new());
        };

        tracing::debug!("Querying important units for {} .. {}", window.start(), window.end());
        let mut query = sqlx::query(&unit_query.sql)
            .bind(window.start())
            .bind(window.end())
            .bind(self.config.valid_checkins.clone());
        for names in &unit_query.name_lists {
            query = query.bind(names.clone());
        }
        let rows = query
            .fetch_all(&self.pool)
            .await
            .context("Querying important units")?;

        Ok(rows
            .iter()
            .filter_map(|row| GroupedMetric::try_from_row(&decode_row(row), "unit"))
            .collect())
    }
}
