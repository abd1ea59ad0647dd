//! Rows → `ResponseEnvelope`.
//!
//! Three renderings, chosen by the shape of the classification:
//!
//! - **Project details**: one project as six titled sections of labelled
//!   values, plus a one-sentence summary.
//! - **Listing**: a summary text, a page of rows projected onto the display
//!   fields, and a "show more" hint when rows remain.
//! - **Aggregate**: a single narrative text with an optional breakdown.
//!
//! Missing values always render as [`NOT_AVAILABLE`], never as zero.

use chrono::NaiveDate;
use dziwani_core::{
    AggregateFunction, GroupBy, PaginationState, ProjectRecord, QueryClassification,
    QueryParameters, QueryType, ResponseEnvelope, ResponseMetadata, ResultItem, Row,
};
use dziwani_store::builder::{GROUP_VALUE, TOTAL_COUNT};
use serde_json::{Value, json};
use tracing::warn;

pub const NOT_AVAILABLE: &str = "Not available";

// ── Fixed replies ──

pub const GREETING: &str = "Hello! I can help you explore infrastructure projects in Malawi. \
Try asking about projects in a district, a sector, a status or a budget range.";
pub const UNRELATED: &str = "I can only answer questions about infrastructure projects in \
Malawi. Try asking about projects in a district or sector.";
pub const REPHRASE: &str = "I couldn't understand your query. Please try rephrasing it.";
pub const EXECUTION_ERROR: &str =
    "Sorry, I ran into a problem retrieving project data. Please try again later.";
pub const NO_MORE_RESULTS: &str =
    "There are no more results to show. Ask a new question to start a search.";
pub const EMPTY_QUESTION: &str =
    "Please type a question about infrastructure projects in Malawi.";
pub const NO_MATCHES: &str = "I couldn't find any projects matching your criteria.";

/// Breakdowns longer than this are summarised instead of listed.
const MAX_BREAKDOWN_LINES: usize = 8;
/// Names quoted in a summarised breakdown.
const BREAKDOWN_SAMPLE: usize = 5;

/// Display fields of a listing, in order.
pub const LIST_FIELDS: [&str; 6] = [
    "Project Name",
    "Fiscal Year",
    "Location",
    "Budget",
    "Status",
    "Sector",
];

// ── Values ──

/// `MWK 1,234,567.89`.
pub fn format_currency(amount: f64) -> String {
    if !amount.is_finite() {
        return NOT_AVAILABLE.to_string();
    }
    let fixed = format!("{:.2}", amount.abs());
    let (whole, cents) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
    let sign = if amount < 0.0 && fixed != "0.00" { "-" } else { "" };
    format!("MWK {sign}{}.{cents}", group_thousands(whole))
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// `January 05, 2024` from an ISO date; anything else is returned as is.
pub fn format_date(raw: &str) -> String {
    let trimmed = raw.trim();
    let head = trimmed.get(..10).unwrap_or(trimmed);
    match NaiveDate::parse_from_str(head, "%Y-%m-%d") {
        Ok(date) => date.format("%B %d, %Y").to_string(),
        Err(_) => trimmed.to_string(),
    }
}

pub fn format_percent(value: f64) -> String {
    format!("{value:.1}%")
}

fn or_missing(value: Option<String>) -> String {
    value.unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

fn text_field(value: &Option<String>) -> String {
    or_missing(
        value
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
    )
}

fn money_field(value: Option<f64>) -> String {
    or_missing(value.map(format_currency))
}

fn date_field(value: &Option<String>) -> String {
    or_missing(
        value
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(format_date),
    )
}

// ── Row access ──

fn row_text(row: &Row, key: &str) -> Option<String> {
    match row.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn row_number(row: &Row, key: &str) -> Option<f64> {
    match row.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.replace(',', "").trim().parse().ok(),
        _ => None,
    }
}

fn row_count(row: &Row, key: &str) -> usize {
    row_number(row, key).map_or(0, |n| n.max(0.0) as usize)
}

/// Full match count carried by the window column of a listing.
pub fn total_from_rows(rows: &[Row]) -> Option<usize> {
    rows.first()
        .and_then(|row| row_number(row, TOTAL_COUNT))
        .map(|n| n.max(0.0) as usize)
}

fn envelope(results: Vec<ResultItem>, total_results: usize) -> ResponseEnvelope {
    ResponseEnvelope {
        results,
        metadata: ResponseMetadata {
            total_results,
            ..ResponseMetadata::default()
        },
    }
}

/// A single text reply that counts as zero results.
pub fn rephrase() -> ResponseEnvelope {
    envelope(vec![ResultItem::text(REPHRASE)], 0)
}

pub fn execution_error() -> ResponseEnvelope {
    envelope(vec![ResultItem::error(EXECUTION_ERROR)], 0)
}

pub fn no_matches(classification: &QueryClassification) -> ResponseEnvelope {
    let message = match classification.parameters.project_identifier() {
        Some(id) if classification.query_type == QueryType::Specific => format!(
            "I couldn't find a project matching '{id}'. Check the name or project code and try again."
        ),
        _ => NO_MATCHES.to_string(),
    };
    envelope(vec![ResultItem::text(message)], 0)
}

// ── Project details ──

/// The single-project card.
pub fn project_details(row: &Row) -> ResponseEnvelope {
    let p = ProjectRecord::from_row(row).unwrap_or_else(|e| {
        warn!(error = %e, "undecodable project row");
        ProjectRecord::default()
    });

    let sections = [
        (
            "Core Information",
            vec![
                ("Project Name", text_field(&p.project_name)),
                ("Project Code", text_field(&p.project_code)),
                ("Sector", text_field(&p.project_sector)),
                ("Status", text_field(&p.status)),
                ("Current Stage", text_field(&p.stage)),
            ],
        ),
        (
            "Location",
            vec![
                ("Region", text_field(&p.region)),
                ("District", text_field(&p.district)),
                ("Traditional Authority", text_field(&p.traditional_authority)),
            ],
        ),
        (
            "Financial Details",
            vec![
                ("Total Budget", money_field(p.total_budget)),
                ("Expenditure to Date", money_field(p.total_expenditure)),
                ("Source of Funding", text_field(&p.funding_source)),
            ],
        ),
        (
            "Timeline",
            vec![
                ("Start Date", date_field(&p.start_date)),
                ("Estimated Completion Date", date_field(&p.completion_date)),
                ("Last Council Monitoring Visit", date_field(&p.last_monitoring_visit)),
                (
                    "Completion Progress",
                    or_missing(p.completion_progress.map(format_percent)),
                ),
            ],
        ),
        (
            "Contractor Details",
            vec![
                ("Contractor", text_field(&p.contractor)),
                ("Contract Signing Date", date_field(&p.contract_signing_date)),
            ],
        ),
        (
            "Additional Information",
            vec![
                ("Description", text_field(&p.description)),
                ("Fiscal Year", text_field(&p.fiscal_year)),
            ],
        ),
    ];

    let data = json!({
        "sections": sections
            .iter()
            .map(|(title, fields)| json!({
                "title": title,
                "fields": fields
                    .iter()
                    .map(|(label, value)| json!({ "label": label, "value": value }))
                    .collect::<Vec<_>>(),
            }))
            .collect::<Vec<_>>(),
    });

    envelope(vec![ResultItem::project_details(project_summary(&p), data)], 1)
}

/// One-sentence description of a project.
pub fn project_summary(p: &ProjectRecord) -> String {
    format!(
        "{name} is a {sector} project in {district} district, {region}. \
         It is currently {status} at {progress} completion with a total budget of {budget}.",
        name = text_field(&p.project_name),
        sector = text_field(&p.project_sector),
        district = text_field(&p.district),
        region = text_field(&p.region),
        status = text_field(&p.status),
        progress = or_missing(p.completion_progress.map(format_percent)),
        budget = money_field(p.total_budget),
    )
}

// ── Listings ──

/// A page of a listing. `page.total_results` is the full match count.
pub fn listing(
    rows: &[Row],
    classification: &QueryClassification,
    page: PaginationState,
) -> ResponseEnvelope {
    if rows.is_empty() {
        return no_matches(classification);
    }
    let params = &classification.parameters;
    let total = page.total_results.max(rows.len());

    let mut summary = format!(
        "I found {total} {} {}.",
        projects(total),
        listing_scope(classification.query_type, params)
    );
    let budgets: Vec<f64> = rows.iter().filter_map(|r| row_number(r, "total_budget")).collect();
    if !budgets.is_empty() {
        summary.push_str(&format!(
            " The total budget for the projects on this page is {}.",
            format_currency(budgets.iter().sum())
        ));
    }
    let first = page.offset.saturating_add(1);
    let last = page.offset.saturating_add(rows.len());
    if total > rows.len() {
        summary.push_str(&format!(" Showing results {first}-{last} of {total}."));
    }

    let values: Vec<Value> = rows.iter().map(display_row).collect();
    let mut results = vec![
        ResultItem::text(summary),
        ResultItem::list(
            format!("Projects {first}-{last}"),
            json!({ "fields": LIST_FIELDS, "values": values }),
        ),
    ];
    if page.has_more() {
        let remaining = page.remaining();
        results.push(ResultItem::text(format!(
            "There are {remaining} more {}. Type 'show more' to see the next page.",
            projects(remaining)
        )));
    }

    let mut out = envelope(results, total);
    out.metadata.pagination = Some(page);
    out.metadata.understanding = Some(understanding(classification));
    out
}

fn listing_scope(query_type: QueryType, params: &QueryParameters) -> String {
    match query_type {
        QueryType::District if !params.districts().is_empty() => {
            format!("in the {} district", join_or(params.districts()))
        }
        QueryType::Sector if !params.sectors().is_empty() => {
            format!("in the {} sector", join_or(params.sectors()))
        }
        _ => "matching your criteria".to_string(),
    }
}

fn display_row(row: &Row) -> Value {
    let location = [row_text(row, "district"), row_text(row, "region")]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(", ");
    json!({
        "Project Name": or_missing(row_text(row, "project_name")),
        "Fiscal Year": or_missing(row_text(row, "fiscal_year")),
        "Location": if location.is_empty() { NOT_AVAILABLE.to_string() } else { location },
        "Budget": money_field(row_number(row, "total_budget")),
        "Status": or_missing(row_text(row, "status")),
        "Sector": or_missing(row_text(row, "project_sector")),
    })
}

// ── Aggregates ──

/// Narrative answer for count, sum and average requests.
pub fn aggregate(rows: &[Row], classification: &QueryClassification) -> ResponseEnvelope {
    let params = &classification.parameters;
    let Some(request) = params.aggregate() else {
        return no_matches(classification);
    };
    let scope = scope_phrase(params);

    let (message, total, data) = match request.group_by {
        None => {
            let row = rows.first();
            let count = row.map_or(0, |r| row_count(r, "total_projects"));
            let budget = row.and_then(|r| row_number(r, "total_budget")).unwrap_or(0.0);
            let mut message = format!(
                "Found {count} {}{scope}. Total budget: {}.",
                projects(count),
                format_currency(budget)
            );
            if request.function == AggregateFunction::Average {
                let average = row.and_then(|r| row_number(r, "average_budget")).unwrap_or(0.0);
                message.push_str(&format!(" Average budget: {}.", format_currency(average)));
            }
            let data = row.cloned().map(Value::Object).unwrap_or(Value::Null);
            (message, count, data)
        }
        Some(group) => {
            let count: usize = rows.iter().map(|r| row_count(r, "total_projects")).sum();
            let budget: f64 = rows.iter().filter_map(|r| row_number(r, "total_budget")).sum();
            let mut message = format!("Found {count} {}{scope}", projects(count));
            if !rows.is_empty() {
                message.push_str(&format!(" across {} {}", rows.len(), group.plural()));
            }
            message.push_str(&format!(". Total budget: {}.", format_currency(budget)));
            if request.function == AggregateFunction::Average && count > 0 {
                message.push_str(&format!(
                    " Average budget: {}.",
                    format_currency(budget / count as f64)
                ));
            }
            if let Some(breakdown) = breakdown(rows, group) {
                message.push('\n');
                message.push_str(&breakdown);
            }
            let data = Value::Array(rows.iter().cloned().map(Value::Object).collect());
            (message, count, data)
        }
    };

    let mut item = ResultItem::text(message);
    item.data = data;
    let mut out = envelope(vec![item], total);
    out.metadata.understanding = Some(understanding(classification));
    out
}

fn breakdown(rows: &[Row], group: GroupBy) -> Option<String> {
    if rows.is_empty() {
        return None;
    }
    let name = |row: &Row| row_text(row, GROUP_VALUE).unwrap_or_else(|| "Unspecified".into());
    if rows.len() <= MAX_BREAKDOWN_LINES {
        let lines: Vec<String> = rows
            .iter()
            .map(|row| {
                let n = row_count(row, "total_projects");
                format!(
                    "- {}: {n} {}, {}",
                    name(row),
                    projects(n),
                    format_currency(row_number(row, "total_budget").unwrap_or(0.0))
                )
            })
            .collect();
        return Some(lines.join("\n"));
    }
    let sample: Vec<String> = rows.iter().take(BREAKDOWN_SAMPLE).map(name).collect();
    Some(format!(
        "{} {}, including: {}, and more.",
        rows.len(),
        group.plural(),
        sample.join(", ")
    ))
}

// ── Understanding ──

/// Plain-language restatement of the filters, e.g.
/// `I understood your query as asking about projects in the Zomba district.`
pub fn understanding(classification: &QueryClassification) -> String {
    let params = &classification.parameters;
    let scope = scope_phrase(params);
    match params.aggregate() {
        None => format!("I understood your query as asking about projects{scope}."),
        Some(request) => {
            let measure = match request.function {
                AggregateFunction::Count => "number",
                AggregateFunction::Sum => "total budget",
                AggregateFunction::Average => "average budget",
            };
            let grouped = request
                .group_by
                .map(|g| format!(", broken down by {}", group_label(g)))
                .unwrap_or_default();
            format!("I understood your query as asking for the {measure} of projects{scope}{grouped}.")
        }
    }
}

fn group_label(group: GroupBy) -> &'static str {
    match group {
        GroupBy::District => "district",
        GroupBy::Sector => "sector",
        GroupBy::Status => "status",
        GroupBy::FiscalYear => "fiscal year",
    }
}

/// Filters as trailing prepositional phrases, each with a leading space.
fn scope_phrase(params: &QueryParameters) -> String {
    let mut out = String::new();
    if !params.districts().is_empty() {
        let noun = if params.districts().len() > 1 { "districts" } else { "district" };
        out.push_str(&format!(" in the {} {noun}", join_or(params.districts())));
    }
    if !params.sectors().is_empty() {
        let noun = if params.sectors().len() > 1 { "sectors" } else { "sector" };
        out.push_str(&format!(" in the {} {noun}", join_or(params.sectors())));
    }
    if !params.statuses().is_empty() {
        out.push_str(&format!(" with status {}", join_or(params.statuses())));
    }

    let budget = params.budget_range();
    match (budget.min(), budget.max()) {
        (Some(min), Some(max)) => out.push_str(&format!(
            " with a budget between {} and {}",
            format_currency(min),
            format_currency(max)
        )),
        (Some(min), None) => {
            out.push_str(&format!(" with a budget above {}", format_currency(min)))
        }
        (None, Some(max)) => {
            out.push_str(&format!(" with a budget below {}", format_currency(max)))
        }
        (None, None) => {}
    }

    let time = params.time_range();
    let day = |d: NaiveDate| d.format("%B %d, %Y").to_string();
    match (time.start(), time.end()) {
        (Some(start), Some(end)) => out.push_str(&format!(
            " running between {} and {}",
            day(start),
            day(end)
        )),
        (Some(start), None) => out.push_str(&format!(" starting from {}", day(start))),
        (None, Some(end)) => out.push_str(&format!(" completing by {}", day(end))),
        (None, None) => {}
    }
    out
}

/// `a`, `a or b`, `a, b or c`.
fn join_or<'a>(values: impl IntoIterator<Item = &'a String>) -> String {
    let values: Vec<&str> = values.into_iter().map(String::as_str).collect();
    match values.split_last() {
        None => String::new(),
        Some((last, [])) => (*last).to_string(),
        Some((last, rest)) => format!("{} or {last}", rest.join(", ")),
    }
}

fn projects(n: usize) -> &'static str {
    if n == 1 { "project" } else { "projects" }
}

#[cfg(test)]
mod tests {
    use dziwani_core::{Aggregate, ItemKind};

    use super::*;

    fn row(pairs: &[(&str, Value)]) -> Row {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    fn classification(query_type: QueryType, params: QueryParameters) -> QueryClassification {
        QueryClassification::new(query_type, 0.9, params)
    }

    fn zomba() -> QueryClassification {
        classification(
            QueryType::District,
            QueryParameters::builder().district("Zomba").build(),
        )
    }

    fn listing_rows(n: usize, total: usize) -> Vec<Row> {
        (0..n)
            .map(|i| {
                row(&[
                    ("project_name", json!(format!("Project {i}"))),
                    ("district", json!("Zomba")),
                    ("region", json!("Southern Region")),
                    ("total_budget", json!(1000.0)),
                    ("status", json!("Ongoing")),
                    ("project_sector", json!("Education")),
                    ("total_count", json!(total)),
                ])
            })
            .collect()
    }

    fn sum(function: AggregateFunction, group_by: Option<GroupBy>) -> Aggregate {
        Aggregate { function, group_by }
    }

    #[test]
    fn currency_groups_thousands() {
        assert_eq!(format_currency(1_234_567.891), "MWK 1,234,567.89");
        assert_eq!(format_currency(0.0), "MWK 0.00");
        assert_eq!(format_currency(999.5), "MWK 999.50");
        assert_eq!(format_currency(1000.0), "MWK 1,000.00");
        assert_eq!(format_currency(-2500.0), "MWK -2,500.00");
        assert_eq!(format_currency(f64::NAN), NOT_AVAILABLE);
    }

    #[test]
    fn dates_and_percentages() {
        assert_eq!(format_date("2024-01-05"), "January 05, 2024");
        assert_eq!(format_date("2023-11-30T00:00:00"), "November 30, 2023");
        assert_eq!(format_date("sometime in 2023"), "sometime in 2023");
        assert_eq!(format_percent(45.0), "45.0%");
        assert_eq!(format_percent(12.345), "12.3%");
    }

    #[test]
    fn total_comes_from_window_column() {
        assert_eq!(total_from_rows(&listing_rows(3, 42)), Some(42));
        assert_eq!(total_from_rows(&[]), None);
        assert_eq!(total_from_rows(&[row(&[("project_name", json!("x"))])]), None);
    }

    #[test]
    fn details_carry_nineteen_fields() {
        let r = row(&[
            ("project_name", json!("Thondwe Bridge")),
            ("project_code", json!("MW-CR-DO")),
            ("project_sector", json!("Roads")),
            ("status", json!("Ongoing")),
            ("district", json!("Zomba")),
            ("region", json!("Southern Region")),
            ("total_budget", json!(12_000_000.0)),
            ("completion_progress", json!(45.0)),
            ("start_date", json!("2024-01-05")),
            ("contractor", json!("Mota-Engil")),
        ]);
        let out = project_details(&r);
        assert_eq!(out.results.len(), 1);
        assert_eq!(out.metadata.total_results, 1);

        let item = &out.results[0];
        assert_eq!(item.kind, ItemKind::ProjectDetails);
        assert_eq!(
            item.message,
            "Thondwe Bridge is a Roads project in Zomba district, Southern Region. \
             It is currently Ongoing at 45.0% completion with a total budget of MWK 12,000,000.00."
        );

        let sections = item.data["sections"].as_array().unwrap();
        assert_eq!(sections.len(), 6);
        let fields: Vec<&Value> = sections
            .iter()
            .flat_map(|s| s["fields"].as_array().unwrap())
            .collect();
        assert_eq!(fields.len(), 19);

        let value = |label: &str| {
            fields
                .iter()
                .find(|f| f["label"] == label)
                .map(|f| f["value"].as_str().unwrap().to_string())
                .unwrap()
        };
        assert_eq!(value("Project Code"), "MW-CR-DO");
        assert_eq!(value("Start Date"), "January 05, 2024");
        assert_eq!(value("Total Budget"), "MWK 12,000,000.00");
        assert_eq!(value("Expenditure to Date"), NOT_AVAILABLE);
        assert_eq!(value("Last Council Monitoring Visit"), NOT_AVAILABLE);
        assert_eq!(value("Contractor"), "Mota-Engil");
    }

    #[test]
    fn summary_marks_missing_parts() {
        let text = project_summary(&ProjectRecord {
            project_name: Some("Lonely Borehole".into()),
            ..ProjectRecord::default()
        });
        assert!(text.starts_with("Lonely Borehole is a Not available project"));
        assert!(text.ends_with("total budget of Not available."));
    }

    #[test]
    fn first_page_of_a_long_listing() {
        let page = PaginationState::for_page(1, 10, 23);
        let out = listing(&listing_rows(10, 23), &zomba(), page);

        assert_eq!(out.metadata.total_results, 23);
        assert_eq!(out.metadata.pagination, Some(page));
        assert_eq!(out.results.len(), 3);
        assert_eq!(
            out.results[0].message,
            "I found 23 projects in the Zomba district. \
             The total budget for the projects on this page is MWK 10,000.00. \
             Showing results 1-10 of 23."
        );
        assert_eq!(out.results[1].kind, ItemKind::List);
        assert_eq!(out.results[1].data["values"].as_array().unwrap().len(), 10);
        assert_eq!(out.results[1].data["fields"][2], "Location");
        assert_eq!(
            out.results[1].data["values"][0]["Location"],
            "Zomba, Southern Region"
        );
        assert_eq!(
            out.results[2].message,
            "There are 13 more projects. Type 'show more' to see the next page."
        );
        assert_eq!(
            out.metadata.understanding.as_deref(),
            Some("I understood your query as asking about projects in the Zomba district.")
        );
    }

    #[test]
    fn short_listing_has_no_continuation() {
        let page = PaginationState::for_page(1, 10, 2);
        let out = listing(&listing_rows(2, 2), &zomba(), page);
        assert_eq!(out.results.len(), 2);
        assert!(!out.results[0].message.contains("Showing results"));
    }

    #[test]
    fn last_page_counts_from_offset() {
        let page = PaginationState::for_page(3, 10, 23);
        let out = listing(&listing_rows(3, 23), &zomba(), page);
        assert!(out.results[0].message.contains("Showing results 21-23 of 23."));
        assert_eq!(out.results.len(), 2);
    }

    #[test]
    fn listing_without_budgets_skips_budget_sentence() {
        let rows = vec![row(&[("project_name", json!("Unfunded")), ("total_count", json!(1))])];
        let c = classification(
            QueryType::Sector,
            QueryParameters::builder().sector("health").build(),
        );
        let out = listing(&rows, &c, PaginationState::for_page(1, 10, 1));
        assert_eq!(out.results[0].message, "I found 1 project in the health sector.");
        assert_eq!(out.results[1].data["values"][0]["Budget"], NOT_AVAILABLE);
        assert_eq!(out.results[1].data["values"][0]["Location"], NOT_AVAILABLE);
    }

    #[test]
    fn empty_results_are_a_single_text() {
        let out = listing(&[], &zomba(), PaginationState::for_page(1, 10, 0));
        assert_eq!(out.results, vec![ResultItem::text(NO_MATCHES)]);
        assert_eq!(out.metadata.total_results, 0);

        let specific = classification(
            QueryType::Specific,
            QueryParameters::builder().project_identifier("Mpira Dam").build(),
        );
        assert!(no_matches(&specific).results[0].message.contains("'Mpira Dam'"));
    }

    #[test]
    fn sum_narrative() {
        let c = classification(
            QueryType::Sector,
            QueryParameters::builder()
                .sector("infrastructure")
                .aggregate(sum(AggregateFunction::Sum, None))
                .build(),
        );
        let rows = vec![row(&[
            ("total_projects", json!(4)),
            ("total_budget", json!(2_500_000.5)),
            ("average_budget", json!(625_000.125)),
        ])];
        let out = aggregate(&rows, &c);
        assert_eq!(out.results.len(), 1);
        assert_eq!(out.results[0].kind, ItemKind::Text);
        assert_eq!(
            out.results[0].message,
            "Found 4 projects in the infrastructure sector. Total budget: MWK 2,500,000.50."
        );
        assert_eq!(out.metadata.total_results, 4);
        assert_eq!(
            out.metadata.understanding.as_deref(),
            Some("I understood your query as asking for the total budget of projects in the infrastructure sector.")
        );
    }

    #[test]
    fn average_adds_average_sentence() {
        let c = classification(
            QueryType::General,
            QueryParameters::builder()
                .aggregate(sum(AggregateFunction::Average, None))
                .build(),
        );
        let rows = vec![row(&[
            ("total_projects", json!(2)),
            ("total_budget", json!(3000.0)),
            ("average_budget", json!(1500.0)),
        ])];
        assert_eq!(
            aggregate(&rows, &c).results[0].message,
            "Found 2 projects. Total budget: MWK 3,000.00. Average budget: MWK 1,500.00."
        );
    }

    #[test]
    fn zero_row_aggregate_reads_zero() {
        let c = classification(
            QueryType::Sector,
            QueryParameters::builder()
                .sector("tourism")
                .aggregate(sum(AggregateFunction::Count, None))
                .build(),
        );
        let rows = vec![row(&[("total_projects", json!(0)), ("total_budget", json!(0.0))])];
        let out = aggregate(&rows, &c);
        assert_eq!(
            out.results[0].message,
            "Found 0 projects in the tourism sector. Total budget: MWK 0.00."
        );
        assert_eq!(out.metadata.total_results, 0);
    }

    fn group_rows(names: &[&str]) -> Vec<Row> {
        names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                row(&[
                    ("group_value", json!(name)),
                    ("total_projects", json!(i + 1)),
                    ("total_budget", json!(1000.0 * (i + 1) as f64)),
                ])
            })
            .collect()
    }

    #[test]
    fn small_breakdown_lists_every_group() {
        let c = classification(
            QueryType::General,
            QueryParameters::builder()
                .aggregate(sum(AggregateFunction::Count, Some(GroupBy::District)))
                .build(),
        );
        let out = aggregate(&group_rows(&["Zomba", "Balaka"]), &c);
        assert_eq!(
            out.results[0].message,
            "Found 3 projects across 2 districts. Total budget: MWK 3,000.00.\n\
             - Zomba: 1 project, MWK 1,000.00\n\
             - Balaka: 2 projects, MWK 2,000.00"
        );
        assert_eq!(out.results[0].data.as_array().unwrap().len(), 2);
        assert!(
            out.metadata
                .understanding
                .unwrap()
                .ends_with("number of projects, broken down by district.")
        );
    }

    #[test]
    fn large_breakdown_is_truncated() {
        let names = [
            "Zomba", "Balaka", "Blantyre", "Dedza", "Dowa", "Karonga", "Kasungu", "Likoma", "Neno",
        ];
        let c = classification(
            QueryType::General,
            QueryParameters::builder()
                .aggregate(sum(AggregateFunction::Sum, Some(GroupBy::District)))
                .build(),
        );
        let message = aggregate(&group_rows(&names), &c).results[0].message.clone();
        assert!(message.ends_with(
            "9 districts, including: Zomba, Balaka, Blantyre, Dedza, Dowa, and more."
        ));
        assert!(!message.contains("- Neno"));
    }

    #[test]
    fn scope_covers_every_category() {
        let c = classification(
            QueryType::Combined,
            QueryParameters::builder()
                .district("Zomba")
                .district("Balaka")
                .sector("health")
                .status("ongoing")
                .budget(Some(1_000_000.0), None)
                .time(NaiveDate::from_ymd_opt(2020, 1, 1), None)
                .build(),
        );
        assert_eq!(
            understanding(&c),
            "I understood your query as asking about projects in the Balaka or Zomba districts \
             in the health sector with status ongoing with a budget above MWK 1,000,000.00 \
             starting from January 01, 2020."
        );
    }
}
