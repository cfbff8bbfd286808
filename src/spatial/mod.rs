//! Geometry support for the datastore.
//!
//! Geometries are stored as (E)WKT text. The predicates the association
//! strategies need are registered on each connection as SQL scalar functions:
//!
//! - `st_centroid(geom)` returns the centroid as WKT (NULL for NULL or empty input)
//! - `st_intersects(a, b)` returns 1 when the geometries share any point
//! - `st_relate(a, b, pattern)` tests a DE-9IM pattern such as `'2********'`
//!
//! All three propagate NULL, so rows without geometry never match.

use geo::{Centroid, Geometry, Intersects, Relate};
use rusqlite::functions::FunctionFlags;
use rusqlite::Connection;
use thiserror::Error;
use wkt::{ToWkt, TryFromWkt};

#[derive(Debug, Error)]
pub enum GeometryError {
    #[error("Invalid SRID prefix: '{0}'")]
    InvalidSrid(String),

    #[error("Invalid WKT geometry: {0}")]
    InvalidWkt(String),

    #[error("Invalid DE-9IM pattern: '{0}'")]
    InvalidPattern(String),
}

/// A parsed geometry with its optional SRID
#[derive(Debug, Clone)]
pub struct SpatialValue {
    pub srid: Option<i32>,
    pub geometry: Geometry<f64>,
}

/// Parse WKT or EWKT (`SRID=4326;POLYGON(...)`)
pub fn parse_ewkt(text: &str) -> Result<SpatialValue, GeometryError> {
    let text = text.trim();
    let (srid, body) = match text.split_once(';') {
        Some((prefix, body)) if prefix.trim().to_ascii_uppercase().starts_with("SRID=") => {
            let raw = prefix.trim()[5..].trim();
            let srid = raw
                .parse::<i32>()
                .map_err(|_| GeometryError::InvalidSrid(prefix.to_string()))?;
            (Some(srid), body)
        }
        _ => (None, text),
    };

    let geometry = Geometry::<f64>::try_from_wkt_str(body.trim())
        .map_err(|e| GeometryError::InvalidWkt(e.to_string()))?;
    Ok(SpatialValue { srid, geometry })
}

/// Centroid of a geometry as WKT; `None` for empty geometries
pub fn centroid_wkt(geometry: &Geometry<f64>) -> Option<String> {
    geometry.centroid().map(|p| p.wkt_string())
}

pub fn intersects(a: &Geometry<f64>, b: &Geometry<f64>) -> bool {
    a.intersects(b)
}

/// Test the DE-9IM intersection matrix of `a` against `b` with a 9-character pattern
pub fn relate(a: &Geometry<f64>, b: &Geometry<f64>, pattern: &str) -> Result<bool, GeometryError> {
    a.relate(b)
        .matches(pattern)
        .map_err(|_| GeometryError::InvalidPattern(pattern.to_string()))
}

fn to_sql_error(err: GeometryError) -> rusqlite::Error {
    rusqlite::Error::UserFunctionError(Box::new(err))
}

fn geometry_arg(ctx: &rusqlite::functions::Context<'_>, idx: usize) -> rusqlite::Result<Option<Geometry<f64>>> {
    match ctx.get::<Option<String>>(idx)? {
        Some(text) => parse_ewkt(&text).map(|v| Some(v.geometry)).map_err(to_sql_error),
        None => Ok(None),
    }
}

/// Register the spatial SQL functions on a connection
pub fn register_functions(conn: &Connection) -> rusqlite::Result<()> {
    let flags = FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC;

    conn.create_scalar_function("st_centroid", 1, flags, |ctx| {
        Ok(geometry_arg(ctx, 0)?.as_ref().and_then(centroid_wkt))
    })?;

    conn.create_scalar_function("st_intersects", 2, flags, |ctx| {
        let (Some(a), Some(b)) = (geometry_arg(ctx, 0)?, geometry_arg(ctx, 1)?) else {
            return Ok(None);
        };
        Ok(Some(intersects(&a, &b)))
    })?;

    conn.create_scalar_function("st_relate", 3, flags, |ctx| {
        let (Some(a), Some(b)) = (geometry_arg(ctx, 0)?, geometry_arg(ctx, 1)?) else {
            return Ok(None);
        };
        let pattern: String = ctx.get(2)?;
        relate(&a, &b, &pattern).map(Some).map_err(to_sql_error)
    })?;

    Ok(())
}
