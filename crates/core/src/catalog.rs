use serde::Serialize;

/// One lodging option in the static catalog.
///
/// Records never change after startup; the catalog is read-only process-wide
/// state and is safe to share across any number of concurrent queries.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LodgingRecord {
    pub name: &'static str,
    pub price_per_night: u32,
    pub rating: f32,
    pub location: &'static str,
}

/// Simulated hotel data for Seattle.
///
/// Returned as an owned `Vec` so callers inject the catalog into the query
/// rather than reaching for a module-level singleton; tests substitute their
/// own catalogs the same way.
pub fn seattle_catalog() -> Vec<LodgingRecord> {
    vec![
        LodgingRecord {
            name: "Contoso Suites",
            price_per_night: 189,
            rating: 4.5,
            location: "Downtown",
        },
        LodgingRecord {
            name: "Fabrikam Residences",
            price_per_night: 159,
            rating: 4.2,
            location: "Pike Place Market",
        },
        LodgingRecord {
            name: "Alpine Ski House",
            price_per_night: 249,
            rating: 4.7,
            location: "Seattle Center",
        },
        LodgingRecord {
            name: "Margie's Travel Lodge",
            price_per_night: 219,
            rating: 4.4,
            location: "Waterfront",
        },
        LodgingRecord {
            name: "Northwind Inn",
            price_per_night: 139,
            rating: 4.0,
            location: "Capitol Hill",
        },
        LodgingRecord {
            name: "Relecloud Hotel",
            price_per_night: 99,
            rating: 3.8,
            location: "University District",
        },
    ]
}
