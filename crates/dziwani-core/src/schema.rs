/// Arrow schema and column names for the project catalog.
pub mod dashboard {
    use arrow::datatypes::{DataType, Field, Schema};

    /// The single catalog table.
    pub const TABLE: &str = "proj_dashboard";

    pub const PROJECT_NAME: &str = "PROJECTNAME";
    pub const PROJECT_CODE: &str = "PROJECTCODE";
    pub const SECTOR: &str = "PROJECTSECTOR";
    pub const STATUS: &str = "PROJECTSTATUS";
    pub const STAGE: &str = "STAGE";
    pub const REGION: &str = "REGION";
    pub const DISTRICT: &str = "DISTRICT";
    pub const TRADITIONAL_AUTHORITY: &str = "TRADITIONALAUTHORITY";
    pub const BUDGET: &str = "TOTALBUDGET";
    pub const EXPENDITURE: &str = "TOTALEXPENDITURETODATE";
    pub const FUNDING_SOURCE: &str = "FUNDINGSOURCE";
    pub const START_DATE: &str = "STARTDATE";
    pub const COMPLETION_DATE: &str = "COMPLETIONESTIDATE";
    pub const LAST_VISIT: &str = "LASTVISIT";
    pub const COMPLETION_PERCENTAGE: &str = "COMPLETIONPERCENTAGE";
    pub const CONTRACTOR: &str = "CONTRACTORNAME";
    pub const SIGNING_DATE: &str = "SIGNINGDATE";
    pub const DESCRIPTION: &str = "PROJECTDESC";
    pub const FISCAL_YEAR: &str = "FISCALYEAR";
    /// 1 for the current revision of a project, 0 for superseded rows.
    pub const IS_LATEST: &str = "ISLATEST";

    /// Schema of `proj_dashboard`. Column names are case-sensitive.
    pub fn dashboard_schema() -> Schema {
        Schema::new(vec![
            Field::new(PROJECT_NAME, DataType::Utf8, false),
            Field::new(PROJECT_CODE, DataType::Utf8, true),
            Field::new(SECTOR, DataType::Utf8, true),
            Field::new(STATUS, DataType::Utf8, true),
            Field::new(STAGE, DataType::Utf8, true),
            Field::new(REGION, DataType::Utf8, true),
            Field::new(DISTRICT, DataType::Utf8, true),
            Field::new(TRADITIONAL_AUTHORITY, DataType::Utf8, true),
            Field::new(BUDGET, DataType::Float64, true),
            Field::new(EXPENDITURE, DataType::Float64, true),
            Field::new(FUNDING_SOURCE, DataType::Utf8, true),
            Field::new(START_DATE, DataType::Date32, true),
            Field::new(COMPLETION_DATE, DataType::Date32, true),
            Field::new(LAST_VISIT, DataType::Date32, true),
            Field::new(COMPLETION_PERCENTAGE, DataType::Float64, true),
            Field::new(CONTRACTOR, DataType::Utf8, true),
            Field::new(SIGNING_DATE, DataType::Date32, true),
            Field::new(DESCRIPTION, DataType::Utf8, true),
            Field::new(FISCAL_YEAR, DataType::Utf8, true),
            Field::new(IS_LATEST, DataType::Int32, false),
        ])
    }
}
