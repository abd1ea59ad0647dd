//! Reference vocabularies for districts, sectors, and project statuses.
//!
//! Every table here is a `static` slice, so they are built into the binary
//! and shared read-only by every request. Order matters: fuzzy matching
//! breaks ties by first occurrence, and synonym tables are scanned
//! longest-phrase-first by the extractors.

/// The 28 districts of Malawi, in alphabetical order.
pub const DISTRICTS: &[&str] = &[
    "Balaka",
    "Blantyre",
    "Chikwawa",
    "Chiradzulu",
    "Chitipa",
    "Dedza",
    "Dowa",
    "Karonga",
    "Kasungu",
    "Likoma",
    "Lilongwe",
    "Machinga",
    "Mangochi",
    "Mchinji",
    "Mulanje",
    "Mwanza",
    "Mzimba",
    "Neno",
    "Nkhata Bay",
    "Nkhotakota",
    "Nsanje",
    "Ntcheu",
    "Ntchisi",
    "Phalombe",
    "Rumphi",
    "Salima",
    "Thyolo",
    "Zomba",
];

/// Administrative region of each district.
const DISTRICT_REGIONS: &[(&str, Region)] = &[
    ("Chitipa", Region::Northern),
    ("Karonga", Region::Northern),
    ("Likoma", Region::Northern),
    ("Mzimba", Region::Northern),
    ("Nkhata Bay", Region::Northern),
    ("Rumphi", Region::Northern),
    ("Dedza", Region::Central),
    ("Dowa", Region::Central),
    ("Kasungu", Region::Central),
    ("Lilongwe", Region::Central),
    ("Mchinji", Region::Central),
    ("Nkhotakota", Region::Central),
    ("Ntcheu", Region::Central),
    ("Ntchisi", Region::Central),
    ("Salima", Region::Central),
    ("Balaka", Region::Southern),
    ("Blantyre", Region::Southern),
    ("Chikwawa", Region::Southern),
    ("Chiradzulu", Region::Southern),
    ("Machinga", Region::Southern),
    ("Mangochi", Region::Southern),
    ("Mulanje", Region::Southern),
    ("Mwanza", Region::Southern),
    ("Neno", Region::Southern),
    ("Nsanje", Region::Southern),
    ("Phalombe", Region::Southern),
    ("Thyolo", Region::Southern),
    ("Zomba", Region::Southern),
];

/// Common misspellings and informal names, keyed by lowercase spelling.
pub const DISTRICT_VARIATIONS: &[(&str, &str)] = &[
    ("nkhatabay", "Nkhata Bay"),
    ("nkata bay", "Nkhata Bay"),
    ("nkhata-bay", "Nkhata Bay"),
    ("nkhotacota", "Nkhotakota"),
    ("lilongway", "Lilongwe"),
    ("blantire", "Blantyre"),
    ("blantrye", "Blantyre"),
    ("zomba city", "Zomba"),
    ("mzuzu", "Mzimba"),
];

/// Canonical sector labels (lowercase).
pub const SECTORS: &[&str] = &[
    "education",
    "health",
    "water",
    "sanitation",
    "transport",
    "agriculture",
    "energy",
    "infrastructure",
    "environment",
    "governance",
    "social protection",
    "tourism",
    "trade",
    "industry",
];

/// Words that imply a sector without naming it.
pub const SECTOR_SYNONYMS: &[(&str, &str)] = &[
    ("health centre", "health"),
    ("health center", "health"),
    ("water supply", "water"),
    ("school", "education"),
    ("schools", "education"),
    ("classroom", "education"),
    ("classrooms", "education"),
    ("teacher", "education"),
    ("hospital", "health"),
    ("hospitals", "health"),
    ("clinic", "health"),
    ("clinics", "health"),
    ("medical", "health"),
    ("healthcare", "health"),
    ("road", "transport"),
    ("roads", "transport"),
    ("bridge", "transport"),
    ("bridges", "transport"),
    ("highway", "transport"),
    ("borehole", "water"),
    ("boreholes", "water"),
    ("wells", "water"),
    ("irrigation", "agriculture"),
    ("farming", "agriculture"),
    ("crop", "agriculture"),
    ("crops", "agriculture"),
    ("electricity", "energy"),
    ("power", "energy"),
    ("solar", "energy"),
    ("toilet", "sanitation"),
    ("toilets", "sanitation"),
    ("latrine", "sanitation"),
    ("latrines", "sanitation"),
];

/// Free-text terms a sector label may appear under in the `PROJECTSECTOR`
/// column. Sectors not listed match on their own name only.
const SECTOR_LIKE_TERMS: &[(&str, &[&str])] = &[
    ("health", &["health", "medical", "hospital", "clinic"]),
    ("education", &["education", "school", "learning"]),
    ("water", &["water", "sanitation"]),
    ("transport", &["transport", "road", "bridge"]),
    ("agriculture", &["agriculture", "farming", "crop", "irrigation"]),
];

/// Canonical project statuses (lowercase).
pub const STATUSES: &[&str] = &[
    "planned",
    "approved",
    "ongoing",
    "completed",
    "delayed",
    "cancelled",
    "suspended",
];

/// Informal status phrasing, longest phrases first.
pub const STATUS_SYNONYMS: &[(&str, &str)] = &[
    ("behind schedule", "delayed"),
    ("in progress", "ongoing"),
    ("in-progress", "ongoing"),
    ("inprogress", "ongoing"),
    ("under construction", "ongoing"),
    ("active", "ongoing"),
    ("current", "ongoing"),
    ("done", "completed"),
    ("finished", "completed"),
    ("complete", "completed"),
    ("ended", "completed"),
    ("pending", "planned"),
    ("proposed", "planned"),
    ("future", "planned"),
    ("upcoming", "planned"),
    ("late", "delayed"),
    ("postponed", "delayed"),
    ("stopped", "suspended"),
    ("halted", "suspended"),
    ("terminated", "cancelled"),
    ("canceled", "cancelled"),
];

/// Administrative region of Malawi.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Region {
    Northern,
    Central,
    Southern,
}

impl Region {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Northern => "Northern Region",
            Self::Central => "Central Region",
            Self::Southern => "Southern Region",
        }
    }
}

/// Region containing a canonical district.
pub fn region_of(district: &str) -> Option<Region> {
    DISTRICT_REGIONS
        .iter()
        .find(|(name, _)| *name == district)
        .map(|(_, region)| *region)
}

/// `LIKE` terms for a canonical sector. Unknown sectors expand to themselves.
pub fn sector_like_terms(sector: &str) -> Vec<&str> {
    SECTOR_LIKE_TERMS
        .iter()
        .find(|(name, _)| *name == sector)
        .map(|(_, terms)| terms.to_vec())
        .unwrap_or_else(|| vec![sector])
}
