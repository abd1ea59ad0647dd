//! Generated SQL executed against an in-memory DuckDB catalog.

use std::time::Duration;

use dziwani_core::{
    Aggregate, AggregateFunction, GroupBy, PaginationState, ProjectRecord, QueryClassification,
    QueryParameters, QueryType,
};
use dziwani_store::{DuckStore, SqlBuilder, SqlExecutor, apply_paging};

fn project(name: &str, code: &str, district: &str, sector: &str, budget: Option<f64>) -> ProjectRecord {
    ProjectRecord {
        project_name: Some(name.into()),
        project_code: Some(code.into()),
        district: Some(district.into()),
        project_sector: Some(sector.into()),
        status: Some("Ongoing".into()),
        region: Some("Southern Region".into()),
        total_budget: budget,
        ..ProjectRecord::default()
    }
}

fn catalog() -> DuckStore {
    let store = DuckStore::open().unwrap();
    let mut records = vec![
        project("Zomba Girls Hostel", "MW-ZA-01", "Zomba", "Education", Some(9_000_000.0)),
        project("Zomba Health Post", "MW-ZA-02", "Zomba", "Medical services", Some(4_000_000.0)),
        project("Balaka Borehole", "MW-BA-01", "Balaka", "Water and Sanitation", None),
        project("Thondwe Bridge", "MW-CR-DO", "Zomba", "Roads", Some(12_000_000.0)),
    ];
    for i in 0..11 {
        records.push(project(
            &format!("Zomba Classroom Block {i}"),
            &format!("MW-ZC-{i:02}"),
            "Zomba",
            "Education",
            Some(100_000.0 * (i + 1) as f64),
        ));
    }
    store.insert_projects(&records).unwrap();

    // A superseded revision that must never be returned.
    store
        .insert_project(
            &project("Thondwe Bridge (old)", "MW-CR-DO", "Zomba", "Roads", Some(99.0)),
            false,
        )
        .unwrap();
    store
}

fn classify(query_type: QueryType, params: QueryParameters) -> QueryClassification {
    QueryClassification::new(query_type, 0.9, params)
}

#[tokio::test]
async fn district_listing_reports_full_total() {
    let store = catalog().into_shared(Duration::from_secs(5));
    let c = classify(
        QueryType::District,
        QueryParameters::builder().district("Zomba").build(),
    );
    let sql = SqlBuilder::default().build(&c);
    let rows = store.execute(&sql).await.unwrap();

    assert_eq!(rows.len(), 10);
    assert_eq!(rows[0]["total_count"], 14);
    assert_eq!(rows[0]["project_name"], "Thondwe Bridge");
    let budgets: Vec<f64> = rows
        .iter()
        .filter_map(|r| r.get("total_budget").and_then(|v| v.as_f64()))
        .collect();
    assert!(budgets.windows(2).all(|w| w[0] >= w[1]));
}

#[tokio::test]
async fn second_page_continues_first() {
    let store = catalog().into_shared(Duration::from_secs(5));
    let c = classify(
        QueryType::District,
        QueryParameters::builder().district("Zomba").build(),
    );
    let builder = SqlBuilder::default();
    let first = store.execute(&builder.build_page(&c, 1)).await.unwrap();
    let second_sql = apply_paging(&builder.build(&c), &PaginationState::for_page(2, 10, 14));
    let second = store.execute(&second_sql).await.unwrap();

    assert_eq!(second.len(), 4);
    for row in &second {
        assert!(!first.iter().any(|f| f["project_name"] == row["project_name"]));
    }
}

#[tokio::test]
async fn sector_synonyms_match_free_text_labels() {
    let store = catalog().into_shared(Duration::from_secs(5));
    let c = classify(
        QueryType::Sector,
        QueryParameters::builder().sector("health").build(),
    );
    let rows = store.execute(&SqlBuilder::default().build(&c)).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["project_name"], "Zomba Health Post");
}

#[tokio::test]
async fn code_lookup_skips_superseded_rows() {
    let store = catalog().into_shared(Duration::from_secs(5));
    let c = classify(
        QueryType::Specific,
        QueryParameters::builder().project_identifier("MW-CR-DO").build(),
    );
    let rows = store.execute(&SqlBuilder::default().build(&c)).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["project_name"], "Thondwe Bridge");
    assert_eq!(rows[0]["total_budget"], 12_000_000.0);
}

#[tokio::test]
async fn aggregate_over_empty_sector_is_zero() {
    let store = catalog().into_shared(Duration::from_secs(5));
    let c = classify(
        QueryType::Sector,
        QueryParameters::builder()
            .sector("tourism")
            .aggregate(Aggregate {
                function: AggregateFunction::Sum,
                group_by: None,
            })
            .build(),
    );
    let rows = store.execute(&SqlBuilder::default().build(&c)).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["total_projects"], 0);
    assert_eq!(rows[0]["total_budget"], 0.0);
}

#[tokio::test]
async fn grouped_aggregate_orders_by_budget() {
    let store = catalog().into_shared(Duration::from_secs(5));
    let c = classify(
        QueryType::General,
        QueryParameters::builder()
            .aggregate(Aggregate {
                function: AggregateFunction::Count,
                group_by: Some(GroupBy::District),
            })
            .build(),
    );
    let rows = store.execute(&SqlBuilder::default().build(&c)).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["group_value"], "Zomba");
    assert_eq!(rows[0]["total_projects"], 14);
    assert_eq!(rows[1]["group_value"], "Balaka");
    assert_eq!(rows[1]["total_budget"], 0.0);
}
