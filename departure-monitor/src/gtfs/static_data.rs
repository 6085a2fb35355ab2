//! Parsed GTFS static data.
//!
//! Only the tables needed to decorate realtime trip updates are loaded:
//! stops, routes, trip headsigns and agencies. `stop_times.txt` is never
//! read; on national feeds it runs to gigabytes.

use std::collections::HashMap;
use std::io::{Cursor, Read, Seek};

use serde::{Deserialize, Serialize};
use zip::ZipArchive;

use super::error::GtfsError;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// A stop from `stops.txt`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GtfsStop {
    pub stop_id: String,
    pub stop_name: String,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub platform_code: Option<String>,
}

/// A route from `routes.txt`.
#[derive(Debug, Clone, PartialEq)]
pub struct GtfsRoute {
    pub short_name: String,
    pub long_name: String,
    /// Raw `route_type`; some feeds put garbage here.
    pub route_type: String,
    pub agency_id: String,
}

/// Counts of loaded records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GtfsStats {
    pub stops: usize,
    pub routes: usize,
    pub trips: usize,
    pub agencies: usize,
}

#[derive(Deserialize)]
struct StopRow {
    stop_id: String,
    #[serde(default)]
    stop_name: String,
    #[serde(default)]
    stop_lat: String,
    #[serde(default)]
    stop_lon: String,
    #[serde(default)]
    platform_code: String,
}

#[derive(Deserialize)]
struct RouteRow {
    route_id: String,
    #[serde(default)]
    route_short_name: String,
    #[serde(default)]
    route_long_name: String,
    #[serde(default)]
    route_type: String,
    #[serde(default)]
    agency_id: String,
}

#[derive(Deserialize)]
struct TripRow {
    trip_id: String,
    #[serde(default)]
    trip_headsign: String,
}

#[derive(Deserialize)]
struct AgencyRow {
    #[serde(default)]
    agency_id: String,
    #[serde(default)]
    agency_name: String,
}

/// GTFS static data for one feed.
#[derive(Debug, Clone, Default)]
pub struct GtfsStatic {
    /// Stops in file order, so searches are deterministic.
    stops: Vec<GtfsStop>,
    stop_index: HashMap<String, usize>,
    routes: HashMap<String, GtfsRoute>,
    /// trip_id → headsign, only for trips that have one.
    trips: HashMap<String, String>,
    /// agency_id (or agency_name when the id is empty) → agency_name
    agencies: HashMap<String, String>,
}

impl GtfsStatic {
    /// Parse a GTFS zip held in memory.
    pub fn from_zip_bytes(bytes: &[u8]) -> Result<Self, GtfsError> {
        if looks_like_html(bytes) {
            return Err(GtfsError::NotAZip);
        }
        Self::from_zip(Cursor::new(bytes))
    }

    /// Parse a GTFS zip.
    ///
    /// `stops.txt` is required and must contain at least one stop. The other
    /// tables are optional.
    pub fn from_zip<R: Read + Seek>(reader: R) -> Result<Self, GtfsError> {
        let mut archive = ZipArchive::new(reader).map_err(|e| GtfsError::Zip(e.to_string()))?;

        let stops_csv =
            read_entry(&mut archive, "stops.txt")?.ok_or(GtfsError::MissingFile("stops.txt"))?;
        let mut data = GtfsStatic::default();
        data.load_stops(&stops_csv)?;

        if let Some(bytes) = read_entry(&mut archive, "routes.txt")? {
            data.load_routes(&bytes)?;
        }
        if let Some(bytes) = read_entry(&mut archive, "trips.txt")? {
            data.load_trips(&bytes)?;
        }
        if let Some(bytes) = read_entry(&mut archive, "agency.txt")? {
            data.load_agencies(&bytes)?;
        }

        let stats = data.stats();
        tracing::info!(
            stops = stats.stops,
            routes = stats.routes,
            trips = stats.trips,
            agencies = stats.agencies,
            "loaded GTFS static data"
        );
        Ok(data)
    }

    fn load_stops(&mut self, bytes: &[u8]) -> Result<(), GtfsError> {
        for row in csv_reader(bytes).deserialize::<StopRow>() {
            let row = row.map_err(|e| GtfsError::csv("stops.txt", e))?;
            let stop = GtfsStop {
                lat: row.stop_lat.trim().parse().ok(),
                lon: row.stop_lon.trim().parse().ok(),
                platform_code: Some(row.platform_code).filter(|p| !p.is_empty()),
                stop_name: row.stop_name,
                stop_id: row.stop_id,
            };
            match self.stop_index.get(&stop.stop_id) {
                Some(&idx) => self.stops[idx] = stop,
                None => {
                    self.stop_index.insert(stop.stop_id.clone(), self.stops.len());
                    self.stops.push(stop);
                }
            }
        }

        if self.stops.is_empty() {
            return Err(GtfsError::NoStops);
        }
        Ok(())
    }

    fn load_routes(&mut self, bytes: &[u8]) -> Result<(), GtfsError> {
        for row in csv_reader(bytes).deserialize::<RouteRow>() {
            let row = row.map_err(|e| GtfsError::csv("routes.txt", e))?;
            self.routes.insert(
                row.route_id,
                GtfsRoute {
                    short_name: row.route_short_name,
                    long_name: row.route_long_name,
                    route_type: row.route_type,
                    agency_id: row.agency_id,
                },
            );
        }
        Ok(())
    }

    fn load_trips(&mut self, bytes: &[u8]) -> Result<(), GtfsError> {
        for row in csv_reader(bytes).deserialize::<TripRow>() {
            let row = row.map_err(|e| GtfsError::csv("trips.txt", e))?;
            if !row.trip_id.is_empty() && !row.trip_headsign.is_empty() {
                self.trips.insert(row.trip_id, row.trip_headsign);
            }
        }
        Ok(())
    }

    fn load_agencies(&mut self, bytes: &[u8]) -> Result<(), GtfsError> {
        for row in csv_reader(bytes).deserialize::<AgencyRow>() {
            let row = row.map_err(|e| GtfsError::csv("agency.txt", e))?;
            let key = if row.agency_id.is_empty() {
                row.agency_name.clone()
            } else {
                row.agency_id
            };
            if !key.is_empty() {
                self.agencies.insert(key, row.agency_name);
            }
        }
        Ok(())
    }

    pub fn stop(&self, stop_id: &str) -> Option<&GtfsStop> {
        self.stop_index.get(stop_id).map(|&idx| &self.stops[idx])
    }

    pub fn stop_name(&self, stop_id: &str) -> Option<&str> {
        self.stop(stop_id).map(|s| s.stop_name.as_str())
    }

    /// Platform code of a stop, `None` when absent or empty.
    pub fn stop_platform_code(&self, stop_id: &str) -> Option<&str> {
        self.stop(stop_id).and_then(|s| s.platform_code.as_deref())
    }

    pub fn route(&self, route_id: &str) -> Option<&GtfsRoute> {
        self.routes.get(route_id)
    }

    /// Route short name, falling back to the long name.
    pub fn route_short_name(&self, route_id: &str) -> Option<&str> {
        let route = self.routes.get(route_id)?;
        [&route.short_name, &route.long_name]
            .into_iter()
            .find(|s| !s.is_empty())
            .map(String::as_str)
    }

    /// Numeric route type, `None` when missing or unparseable.
    pub fn route_type(&self, route_id: &str) -> Option<i64> {
        let route = self.routes.get(route_id)?;
        match route.route_type.trim().parse() {
            Ok(t) => Some(t),
            Err(_) => {
                tracing::debug!(route_id, raw = %route.route_type, "invalid route_type");
                None
            }
        }
    }

    pub fn trip_headsign(&self, trip_id: &str) -> Option<&str> {
        self.trips.get(trip_id).map(String::as_str)
    }

    /// Agency operating a route.
    ///
    /// Routes without an `agency_id` belong to the feed's single agency, if
    /// there is exactly one.
    pub fn agency_name(&self, route_id: &str) -> Option<&str> {
        let route = self.routes.get(route_id)?;
        if route.agency_id.is_empty() {
            if self.agencies.len() == 1 {
                return self.agencies.values().next().map(String::as_str);
            }
            return None;
        }
        self.agencies.get(&route.agency_id).map(String::as_str)
    }

    /// Stops whose name contains `term`, case-insensitively, in file order.
    pub fn search_stops(&self, term: &str, limit: usize) -> Vec<&GtfsStop> {
        let term = term.to_lowercase();
        self.stops
            .iter()
            .filter(|s| s.stop_name.to_lowercase().contains(&term))
            .take(limit)
            .collect()
    }

    pub fn stats(&self) -> GtfsStats {
        GtfsStats {
            stops: self.stops.len(),
            routes: self.routes.len(),
            trips: self.trips.len(),
            agencies: self.agencies.len(),
        }
    }
}

/// Real-world feeds occasionally have short rows.
fn csv_reader(bytes: &[u8]) -> csv::Reader<&[u8]> {
    csv::ReaderBuilder::new().flexible(true).from_reader(bytes)
}

/// Read an archive entry fully, with any UTF-8 BOM removed.
fn read_entry<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    name: &'static str,
) -> Result<Option<Vec<u8>>, GtfsError> {
    let mut file = match archive.by_name(name) {
        Ok(file) => file,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(GtfsError::Zip(e.to_string())),
    };

    let mut buf = Vec::new();
    file.read_to_end(&mut buf)
        .map_err(|e| GtfsError::csv(name, e))?;

    if buf.starts_with(UTF8_BOM) {
        buf.drain(..UTF8_BOM.len());
    }
    Ok(Some(buf))
}

fn looks_like_html(bytes: &[u8]) -> bool {
    let head: Vec<u8> = bytes.iter().take(512).map(u8::to_ascii_lowercase).collect();
    let contains = |needle: &[u8]| head.windows(needle.len()).any(|w| w == needle);
    contains(b"<html") || contains(b"<!doctype")
}
