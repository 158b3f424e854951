//! Aggregates served to dashboards, charts and the map.

use crate::entities::EntityKind;
use crate::record::Record;
use crate::snapshot::Snapshot;
use crate::views::{index_by, MapMarker, ProductionView};
use crate::{OrebookError, Result};
use serde::Serialize;
use std::collections::BTreeMap;

/// Default number of production years in the investor overview.
pub const DEFAULT_YEARS_WINDOW: usize = 3;

/// Headline numbers for the main dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSummary {
    pub total_countries: usize,
    pub total_minerals: usize,
    pub total_sites: usize,
    /// Latest year present in production stats
    pub latest_year: Option<i64>,
    /// Production across all stats of `latest_year`
    pub total_production: f64,
}

/// Production of one mineral in one year, summed over countries.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub year: i64,
    pub mineral_id: i64,
    pub mineral_name: String,
    pub production_tonnes: f64,
}

/// Per-mineral totals over the overview window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MineralTotal {
    pub mineral_name: String,
    pub production_tonnes: f64,
    pub export_value_billion_usd: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountryLink {
    pub country_id: i64,
    pub country_name: String,
}

/// Investor dashboard data.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvestorOverview {
    pub latest_year: Option<i64>,
    /// Years included in `mineral_overview`, ascending
    pub years: Vec<i64>,
    /// "2023" or "2021–2023"; empty without production data
    pub years_label: String,
    pub trends: Vec<TrendPoint>,
    pub mineral_overview: Vec<MineralTotal>,
    /// Export value growth of the latest year over the previous one, percent
    pub yoy_export_pct: f64,
    pub countries: Vec<CountryLink>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountryProfile {
    pub country: Record,
    pub production: Vec<ProductionView>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SitesByCountry {
    pub country_id: i64,
    pub country_name: String,
    pub sites: Vec<Record>,
}

/// Distinct production years, ascending.
fn production_years(stats: &[Record]) -> Vec<i64> {
    let mut years: Vec<i64> = stats.iter().filter_map(|s| s.integer("Year")).collect();
    years.sort_unstable();
    years.dedup();
    years
}

pub fn dashboard_summary(snapshot: &Snapshot) -> DashboardSummary {
    let stats = snapshot.records(EntityKind::Production);
    let latest_year = production_years(stats).last().copied();

    let total_production = latest_year
        .map(|year| {
            stats
                .iter()
                .filter(|s| s.integer("Year") == Some(year))
                .map(|s| s.number_or_zero("Production_tonnes"))
                .sum()
        })
        .unwrap_or(0.0);

    DashboardSummary {
        total_countries: snapshot.count(EntityKind::Countries),
        total_minerals: snapshot.count(EntityKind::Minerals),
        total_sites: snapshot.count(EntityKind::Sites),
        latest_year,
        total_production,
    }
}

/// Label for a sorted, non-empty list of years.
pub fn years_label(years: &[i64]) -> String {
    match (years.first(), years.last()) {
        (Some(first), Some(last)) if first == last => first.to_string(),
        (Some(first), Some(last)) => format!("{}–{}", first, last),
        _ => String::new(),
    }
}

/// Percent change of total export value between the two latest years,
/// rounded to 2 decimals. Zero without a previous year or when it is zero.
pub fn yoy_export_growth(stats: &[Record]) -> f64 {
    let mut by_year: BTreeMap<i64, f64> = BTreeMap::new();
    for stat in stats {
        if let Some(year) = stat.integer("Year") {
            *by_year.entry(year).or_default() += stat.number_or_zero("ExportValue_BillionUSD");
        }
    }

    let mut totals = by_year.values().rev();
    match (totals.next(), totals.next()) {
        (Some(latest), Some(previous)) if *previous != 0.0 => {
            let pct = (latest - previous) / previous * 100.0;
            (pct * 100.0).round() / 100.0
        }
        _ => 0.0,
    }
}

pub fn investor_overview(snapshot: &Snapshot, window: usize) -> InvestorOverview {
    let stats = snapshot.records(EntityKind::Production);
    let minerals = index_by(snapshot.records(EntityKind::Minerals), "MineralID");

    let all_years = production_years(stats);
    let years: Vec<i64> = all_years[all_years.len().saturating_sub(window)..].to_vec();

    let mut trend_totals: BTreeMap<(i64, i64), f64> = BTreeMap::new();
    for stat in stats {
        if let (Some(year), Some(mineral_id)) = (stat.integer("Year"), stat.integer("MineralID")) {
            *trend_totals.entry((year, mineral_id)).or_default() +=
                stat.number_or_zero("Production_tonnes");
        }
    }
    let trends = trend_totals
        .into_iter()
        .filter_map(|((year, mineral_id), production_tonnes)| {
            let mineral = minerals.get(&mineral_id)?;
            Some(TrendPoint {
                year,
                mineral_id,
                mineral_name: mineral.get_or_empty("MineralName").to_string(),
                production_tonnes,
            })
        })
        .collect();

    let mut overview: BTreeMap<&str, (f64, f64)> = BTreeMap::new();
    for row in snapshot
        .production_full
        .iter()
        .filter(|p| years.contains(&p.year))
    {
        let totals = overview.entry(row.mineral_name.as_str()).or_default();
        totals.0 += row.production_tonnes;
        totals.1 += row.export_value_billion_usd;
    }
    let mineral_overview = overview
        .into_iter()
        .map(|(name, (production, export))| MineralTotal {
            mineral_name: name.to_string(),
            production_tonnes: production,
            export_value_billion_usd: export,
        })
        .collect();

    let countries = snapshot
        .records(EntityKind::Countries)
        .iter()
        .filter_map(|c| {
            Some(CountryLink {
                country_id: c.integer("CountryID")?,
                country_name: c.get_or_empty("CountryName").to_string(),
            })
        })
        .collect();

    InvestorOverview {
        latest_year: all_years.last().copied(),
        years_label: years_label(&years),
        years,
        trends,
        mineral_overview,
        yoy_export_pct: yoy_export_growth(stats),
        countries,
    }
}

pub fn country_profile(snapshot: &Snapshot, country_id: i64) -> Result<CountryProfile> {
    let country = snapshot
        .find(EntityKind::Countries, country_id)
        .ok_or_else(|| OrebookError::NotFound("Country not found.".to_string()))?;

    let production = snapshot
        .production_full
        .iter()
        .filter(|p| p.country_id == country_id)
        .cloned()
        .collect();

    Ok(CountryProfile {
        country: country.clone(),
        production,
    })
}

pub fn map_markers(snapshot: &Snapshot) -> Vec<MapMarker> {
    snapshot.sites_full.iter().map(MapMarker::from).collect()
}

/// Raw site rows of one country, for the admin listing.
pub fn sites_by_country(snapshot: &Snapshot, country_id: i64) -> Result<SitesByCountry> {
    let country = snapshot
        .find(EntityKind::Countries, country_id)
        .ok_or_else(|| OrebookError::NotFound("Country not found.".to_string()))?;

    let sites = snapshot
        .records(EntityKind::Sites)
        .iter()
        .filter(|s| s.integer("CountryID") == Some(country_id))
        .cloned()
        .collect();

    Ok(SitesByCountry {
        country_id,
        country_name: country.get_or_empty("CountryName").to_string(),
        sites,
    })
}
