//! Joined read views.
//!
//! Sites and production stats are joined with their country and mineral by
//! parsed identifier. Joins are inner: a row whose foreign key does not match
//! an existing country or mineral is dropped from the view.

use crate::record::Record;
use serde::Serialize;
use std::collections::HashMap;

/// A site joined with its country and mineral.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SiteView {
    pub site_id: i64,
    pub site_name: String,
    pub country_id: i64,
    pub country_name: String,
    pub mineral_id: i64,
    pub mineral_name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub production_tonnes: f64,
}

/// A production stat joined with its country and mineral.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductionView {
    pub stat_id: i64,
    pub year: i64,
    pub country_id: i64,
    pub country_name: String,
    pub mineral_id: i64,
    pub mineral_name: String,
    pub production_tonnes: f64,
    pub export_value_billion_usd: f64,
}

/// One site marker for the map widget.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapMarker {
    pub site_name: String,
    pub country_name: String,
    pub mineral_name: String,
    pub production_tonnes: f64,
    pub latitude: f64,
    pub longitude: f64,
}

impl From<&SiteView> for MapMarker {
    fn from(site: &SiteView) -> Self {
        Self {
            site_name: site.site_name.clone(),
            country_name: site.country_name.clone(),
            mineral_name: site.mineral_name.clone(),
            production_tonnes: site.production_tonnes,
            latitude: site.latitude,
            longitude: site.longitude,
        }
    }
}

/// Index records by a parsed integer column. Later duplicates win.
pub fn index_by<'a>(records: &'a [Record], id_field: &str) -> HashMap<i64, &'a Record> {
    records
        .iter()
        .filter_map(|r| r.integer(id_field).map(|id| (id, r)))
        .collect()
}

/// Join sites with countries and minerals, keeping site order.
pub fn join_sites(sites: &[Record], countries: &[Record], minerals: &[Record]) -> Vec<SiteView> {
    let countries = index_by(countries, "CountryID");
    let minerals = index_by(minerals, "MineralID");

    sites
        .iter()
        .filter_map(|site| {
            let country_id = site.integer("CountryID")?;
            let mineral_id = site.integer("MineralID")?;
            let country = countries.get(&country_id)?;
            let mineral = minerals.get(&mineral_id)?;

            Some(SiteView {
                site_id: site.integer("SiteID")?,
                site_name: site.get_or_empty("SiteName").to_string(),
                country_id,
                country_name: country.get_or_empty("CountryName").to_string(),
                mineral_id,
                mineral_name: mineral.get_or_empty("MineralName").to_string(),
                latitude: site.number_or_zero("Latitude"),
                longitude: site.number_or_zero("Longitude"),
                production_tonnes: site.number_or_zero("Production_tonnes"),
            })
        })
        .collect()
}

/// Join production stats with countries and minerals, keeping stat order.
pub fn join_production(
    production: &[Record],
    countries: &[Record],
    minerals: &[Record],
) -> Vec<ProductionView> {
    let countries = index_by(countries, "CountryID");
    let minerals = index_by(minerals, "MineralID");

    production
        .iter()
        .filter_map(|stat| {
            let country_id = stat.integer("CountryID")?;
            let mineral_id = stat.integer("MineralID")?;
            let country = countries.get(&country_id)?;
            let mineral = minerals.get(&mineral_id)?;

            Some(ProductionView {
                stat_id: stat.integer("StatID")?,
                year: stat.integer("Year")?,
                country_id,
                country_name: country.get_or_empty("CountryName").to_string(),
                mineral_id,
                mineral_name: mineral.get_or_empty("MineralName").to_string(),
                production_tonnes: stat.number_or_zero("Production_tonnes"),
                export_value_billion_usd: stat.number_or_zero("ExportValue_BillionUSD"),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn countries() -> Vec<Record> {
        vec![
            Record::from_pairs([("CountryID", "1"), ("CountryName", "Testland")]),
            Record::from_pairs([("CountryID", "2"), ("CountryName", "Otherland")]),
        ]
    }

    fn minerals() -> Vec<Record> {
        vec![Record::from_pairs([("MineralID", "1"), ("MineralName", "Cobalt")])]
    }

    #[test]
    fn test_join_sites() {
        let sites = vec![
            Record::from_pairs([
                ("SiteID", "1"),
                ("SiteName", "North Pit"),
                ("CountryID", "2"),
                ("MineralID", "1"),
                ("Latitude", "-10.5"),
                ("Longitude", "25.0"),
                ("Production_tonnes", "1500"),
            ]),
            // Dangling country
            Record::from_pairs([
                ("SiteID", "2"),
                ("SiteName", "Ghost"),
                ("CountryID", "9"),
                ("MineralID", "1"),
            ]),
        ];

        let joined = join_sites(&sites, &countries(), &minerals());
        assert_eq!(joined.len(), 1);
        assert_eq!(joined[0].country_name, "Otherland");
        assert_eq!(joined[0].mineral_name, "Cobalt");
        assert_eq!(joined[0].latitude, -10.5);

        let marker = MapMarker::from(&joined[0]);
        assert_eq!(marker.site_name, "North Pit");
        assert_eq!(marker.production_tonnes, 1500.0);
    }

    #[test]
    fn test_join_production_matches_float_ids() {
        let stats = vec![Record::from_pairs([
            ("StatID", "1"),
            ("Year", "2023"),
            ("CountryID", "1.0"),
            ("MineralID", "1"),
            ("Production_tonnes", "10"),
            ("ExportValue_BillionUSD", "0.5"),
        ])];

        let joined = join_production(&stats, &countries(), &minerals());
        assert_eq!(joined.len(), 1);
        assert_eq!(joined[0].country_id, 1);
        assert_eq!(joined[0].year, 2023);
        assert_eq!(joined[0].export_value_billion_usd, 0.5);
    }

    #[test]
    fn test_join_drops_unknown_mineral() {
        let stats = vec![Record::from_pairs([
            ("StatID", "1"),
            ("Year", "2023"),
            ("CountryID", "1"),
            ("MineralID", "4"),
        ])];
        assert!(join_production(&stats, &countries(), &minerals()).is_empty());
    }
}
