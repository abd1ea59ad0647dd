//! Classification → SQL.
//!
//! Three statement shapes are generated against `proj_dashboard`, all
//! restricted to `ISLATEST = 1`:
//!
//! - **Specific**: the 19 detail columns for one project, best match first,
//!   `LIMIT 1`.
//! - **List**: a display subset plus `COUNT(*) OVER ()` as `total_count`,
//!   ordered by budget and paged with `LIMIT/OFFSET`.
//! - **Aggregate**: count, null-coalesced sum and average, optionally
//!   grouped by one column.
//!
//! Within a filter category values are OR'ed; categories are AND'ed. Every
//! statement passes [`validate_sql`] before it is returned. A statement that
//! fails is discarded and the builder returns an empty string.

use std::sync::LazyLock;

use dziwani_core::dashboard::{
    BUDGET, COMPLETION_DATE, COMPLETION_PERCENTAGE, CONTRACTOR, DESCRIPTION, DISTRICT,
    EXPENDITURE, FISCAL_YEAR, FUNDING_SOURCE, IS_LATEST, LAST_VISIT, PROJECT_CODE, PROJECT_NAME,
    REGION, SECTOR, SIGNING_DATE, STAGE, START_DATE, STATUS, TABLE, TRADITIONAL_AUTHORITY,
};
use dziwani_core::vocab::sector_like_terms;
use dziwani_core::{
    Aggregate, GroupBy, PaginationState, QueryClassification, QueryParameters, QueryType,
};
use regex::Regex;
use tracing::{debug, warn};

use crate::safety::validate_sql;

pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Alias of the window column carrying the full match count.
pub const TOTAL_COUNT: &str = "total_count";
/// Alias of the grouping column in grouped aggregates.
pub const GROUP_VALUE: &str = "group_value";

/// Detail columns and their aliases.
pub const DETAIL_COLUMNS: &[(&str, &str)] = &[
    (PROJECT_NAME, "project_name"),
    (PROJECT_CODE, "project_code"),
    (SECTOR, "project_sector"),
    (STATUS, "status"),
    (STAGE, "stage"),
    (REGION, "region"),
    (DISTRICT, "district"),
    (TRADITIONAL_AUTHORITY, "traditionalauthority"),
    (BUDGET, "total_budget"),
    (EXPENDITURE, "total_expenditure"),
    (FUNDING_SOURCE, "funding_source"),
    (START_DATE, "start_date"),
    (COMPLETION_DATE, "completion_date"),
    (LAST_VISIT, "last_monitoring_visit"),
    (COMPLETION_PERCENTAGE, "completion_progress"),
    (CONTRACTOR, "contractor"),
    (SIGNING_DATE, "contract_signing_date"),
    (DESCRIPTION, "description"),
    (FISCAL_YEAR, "fiscal_year"),
];

/// List columns and their aliases.
pub const LIST_COLUMNS: &[(&str, &str)] = &[
    (PROJECT_NAME, "project_name"),
    (FISCAL_YEAR, "fiscal_year"),
    (REGION, "region"),
    (DISTRICT, "district"),
    (BUDGET, "total_budget"),
    (STATUS, "status"),
    (SECTOR, "project_sector"),
];

/// Builds validated SELECT statements from classifications.
#[derive(Debug, Clone, Copy)]
pub struct SqlBuilder {
    page_size: usize,
}

impl Default for SqlBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl SqlBuilder {
    /// A builder producing pages of `page_size` rows (at least 1).
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size: page_size.max(1),
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// First page of results for `classification`.
    pub fn build(&self, classification: &QueryClassification) -> String {
        self.build_page(classification, 1)
    }

    /// Statement for 1-based `page`. Empty for conversational types or when
    /// the statement fails validation.
    pub fn build_page(&self, classification: &QueryClassification, page: usize) -> String {
        let params = &classification.parameters;
        let sql = match (classification.query_type, params.project_identifier()) {
            (QueryType::Greeting | QueryType::Unrelated, _) => return String::new(),
            (QueryType::Specific, Some(id)) => specific_sql(id),
            _ => match params.aggregate() {
                Some(aggregate) => aggregate_sql(params, aggregate),
                None => {
                    let paging = PaginationState::for_page(page, self.page_size, 0);
                    apply_paging(&list_sql(params), &paging)
                }
            },
        };
        checked(sql)
    }
}

fn checked(sql: String) -> String {
    match validate_sql(&sql) {
        Ok(()) => {
            debug!(sql = %sql, "generated SQL");
            sql
        }
        Err(violation) => {
            warn!(%violation, "rejected generated SQL");
            String::new()
        }
    }
}

// ── Statement shapes ──

fn select_list(columns: &[(&str, &str)]) -> String {
    columns
        .iter()
        .map(|(col, alias)| format!("{col} AS {alias}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// One project by code or name.
///
/// Codes match exactly. Names match as a substring, and also with spaces
/// widened to wildcards. Ordering prefers an exact name, then a prefix,
/// then ongoing over completed over anything else, then the larger budget.
pub fn specific_sql(identifier: &str) -> String {
    let id = identifier.trim();
    let (filter, rank) = if PROJECT_CODE_SHAPE.is_match(id) {
        let code = quote(&id.to_uppercase());
        (
            format!("UPPER({PROJECT_CODE}) = {code}"),
            format!("CASE WHEN UPPER({PROJECT_CODE}) = {code} THEN 0 ELSE 1 END"),
        )
    } else {
        let name = id.to_lowercase();
        let contains = quote(&format!("%{name}%"));
        let widened = quote(&format!("%{}%", name.split_whitespace().collect::<Vec<_>>().join("%")));
        (
            format!(
                "LOWER({PROJECT_NAME}) LIKE {contains} OR LOWER({PROJECT_NAME}) LIKE {widened}"
            ),
            format!(
                "CASE WHEN LOWER({PROJECT_NAME}) = {exact} THEN 0 \
                 WHEN LOWER({PROJECT_NAME}) LIKE {prefix} THEN 1 ELSE 2 END",
                exact = quote(&name),
                prefix = quote(&format!("{name}%")),
            ),
        )
    };

    format!(
        "SELECT {columns} FROM {TABLE} WHERE {IS_LATEST} = 1 AND ({filter}) \
         ORDER BY {rank}, \
         CASE WHEN LOWER({STATUS}) = 'ongoing' THEN 0 WHEN LOWER({STATUS}) = 'completed' THEN 1 ELSE 2 END, \
         {BUDGET} DESC NULLS LAST LIMIT 1",
        columns = select_list(DETAIL_COLUMNS),
    )
}

/// Listing without paging. Use [`apply_paging`] to select a page.
pub fn list_sql(params: &QueryParameters) -> String {
    format!(
        "SELECT {columns}, COUNT(*) OVER () AS {TOTAL_COUNT} FROM {TABLE} WHERE {filters} \
         ORDER BY {BUDGET} DESC NULLS LAST",
        columns = select_list(LIST_COLUMNS),
        filters = where_clause(params),
    )
}

/// Count, sum and average, optionally grouped.
pub fn aggregate_sql(params: &QueryParameters, aggregate: Aggregate) -> String {
    let measures = format!(
        "COUNT(*) AS total_projects, \
         COALESCE(SUM({BUDGET}), 0) AS total_budget, \
         COALESCE(AVG({BUDGET}), 0) AS average_budget, \
         COALESCE(SUM({EXPENDITURE}), 0) AS total_expenditure"
    );
    let filters = where_clause(params);
    match aggregate.group_by {
        None => format!("SELECT {measures} FROM {TABLE} WHERE {filters}"),
        Some(group) => {
            let column = group_column(group);
            format!(
                "SELECT {column} AS {GROUP_VALUE}, {measures} FROM {TABLE} WHERE {filters} \
                 GROUP BY {column} ORDER BY total_budget DESC"
            )
        }
    }
}

fn group_column(group: GroupBy) -> &'static str {
    match group {
        GroupBy::District => DISTRICT,
        GroupBy::Sector => SECTOR,
        GroupBy::Status => STATUS,
        GroupBy::FiscalYear => FISCAL_YEAR,
    }
}

/// `ISLATEST = 1` followed by one parenthesised clause per populated
/// category.
pub fn where_clause(params: &QueryParameters) -> String {
    let mut clauses = vec![format!("{IS_LATEST} = 1")];

    if !params.districts().is_empty() {
        clauses.push(any_of(params.districts().iter().map(|d| {
            format!("LOWER({DISTRICT}) LIKE {}", quote(&format!("%{}%", d.to_lowercase())))
        })));
    }
    if !params.sectors().is_empty() {
        clauses.push(any_of(params.sectors().iter().flat_map(|s| {
            let sector = s.to_lowercase();
            sector_like_terms(&sector)
                .into_iter()
                .map(|term| format!("LOWER({SECTOR}) LIKE {}", quote(&format!("%{term}%"))))
                .collect::<Vec<_>>()
        })));
    }
    if !params.statuses().is_empty() {
        clauses.push(any_of(params.statuses().iter().map(|s| {
            format!("LOWER({STATUS}) = {}", quote(&s.to_lowercase()))
        })));
    }

    let budget = params.budget_range();
    let mut bounds = Vec::new();
    if let Some(min) = budget.min().filter(|v| v.is_finite()) {
        bounds.push(format!("{BUDGET} >= {min}"));
    }
    if let Some(max) = budget.max().filter(|v| v.is_finite()) {
        bounds.push(format!("{BUDGET} <= {max}"));
    }
    if !bounds.is_empty() {
        clauses.push(format!("({})", bounds.join(" AND ")));
    }

    let time = params.time_range();
    let mut dates = Vec::new();
    if let Some(start) = time.start() {
        dates.push(format!("{START_DATE} >= '{}'", start.format("%Y-%m-%d")));
    }
    if let Some(end) = time.end() {
        dates.push(format!("{COMPLETION_DATE} <= '{}'", end.format("%Y-%m-%d")));
    }
    if !dates.is_empty() {
        clauses.push(format!("({})", dates.join(" AND ")));
    }

    clauses.join(" AND ")
}

fn any_of(conditions: impl Iterator<Item = String>) -> String {
    format!("({})", conditions.collect::<Vec<_>>().join(" OR "))
}

/// SQL string literal with embedded quotes doubled.
pub fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

// ── Paging ──

/// Remove a trailing `LIMIT n [OFFSET m]` (and `;`) from a statement.
pub fn strip_paging(sql: &str) -> &str {
    match TRAILING_PAGING.find(sql) {
        Some(m) => &sql[..m.start()],
        None => sql.trim_end().trim_end_matches(';').trim_end(),
    }
}

/// Replace any trailing paging with the window in `state`.
pub fn apply_paging(sql: &str, state: &PaginationState) -> String {
    format!(
        "{} LIMIT {} OFFSET {}",
        strip_paging(sql),
        state.limit,
        state.offset
    )
}

static PROJECT_CODE_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^MW-[A-Z]{2}-[A-Z0-9]{2}$").expect("Invalid regex"));
static TRAILING_PAGING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\s+LIMIT\s+\d+(?:\s+OFFSET\s+\d+)?\s*;?\s*$").expect("Invalid regex")
});
