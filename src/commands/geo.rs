//! Geospatial commands (GEOADD, GEORADIUS, GEORADIUSBYMEMBER, GEODIST, GEOPOS).
//!
//! Geo sets are sorted sets underneath, so members are removed with
//! [`sorted_sets::zrem`](crate::commands::sorted_sets::zrem).

use bytes::Bytes;

use crate::commands::{arg, command, exec};
use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::types::{ToArg, Value};

/// Distance unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GeoUnit {
    /// Meters.
    #[default]
    Meters,
    /// Kilometers.
    Kilometers,
    /// Miles.
    Miles,
    /// Feet.
    Feet,
}

impl GeoUnit {
    fn as_arg(self) -> Bytes {
        Bytes::from_static(match self {
            GeoUnit::Meters => b"m",
            GeoUnit::Kilometers => b"km",
            GeoUnit::Miles => b"mi",
            GeoUnit::Feet => b"ft",
        })
    }
}

/// A longitude/latitude pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoCoordinate {
    /// Longitude in degrees.
    pub longitude: f64,
    /// Latitude in degrees.
    pub latitude: f64,
}

/// Result ordering for radius queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeoSort {
    /// Nearest first.
    Asc,
    /// Farthest first.
    Desc,
}

/// Optional modifiers for radius queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GeoRadiusOptions {
    /// Include each member's coordinate (WITHCOORD).
    pub with_coord: bool,
    /// Include each member's distance from the center (WITHDIST).
    pub with_dist: bool,
    /// Limit the number of results (COUNT).
    pub count: Option<usize>,
    /// Sort by distance.
    pub sort: Option<GeoSort>,
}

impl GeoRadiusOptions {
    /// No modifiers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Include coordinates.
    pub fn with_coord(mut self) -> Self {
        self.with_coord = true;
        self
    }

    /// Include distances.
    pub fn with_dist(mut self) -> Self {
        self.with_dist = true;
        self
    }

    /// Limit the result count.
    pub fn count(mut self, count: usize) -> Self {
        self.count = Some(count);
        self
    }

    /// Sort nearest first.
    pub fn sort_asc(mut self) -> Self {
        self.sort = Some(GeoSort::Asc);
        self
    }

    /// Sort farthest first.
    pub fn sort_desc(mut self) -> Self {
        self.sort = Some(GeoSort::Desc);
        self
    }

    fn append_to(&self, args: &mut Vec<Bytes>) {
        if self.with_coord {
            args.push(Bytes::from("WITHCOORD"));
        }
        if self.with_dist {
            args.push(Bytes::from("WITHDIST"));
        }
        if let Some(count) = self.count {
            args.push(Bytes::from("COUNT"));
            args.push(arg(count));
        }
        match self.sort {
            Some(GeoSort::Asc) => args.push(Bytes::from("ASC")),
            Some(GeoSort::Desc) => args.push(Bytes::from("DESC")),
            None => {}
        }
    }
}

/// One member returned by a radius query.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoRadiusResponse {
    /// Member name.
    pub member: String,
    /// Distance from the center, when WITHDIST was requested.
    pub distance: Option<f64>,
    /// Member position, when WITHCOORD was requested.
    pub coordinate: Option<GeoCoordinate>,
}

/// GEOADD key longitude latitude member. Number of new members.
pub async fn geoadd(
    conn: &mut Connection,
    key: impl ToArg,
    longitude: f64,
    latitude: f64,
    member: impl ToArg,
) -> Result<i64> {
    exec(
        conn,
        vec![
            Bytes::from("GEOADD"),
            arg(key),
            arg(longitude),
            arg(latitude),
            arg(member),
        ],
    )
    .await?
    .into_integer()
}

/// GEORADIUS key longitude latitude radius unit [options].
pub async fn georadius(
    conn: &mut Connection,
    key: impl ToArg,
    center: GeoCoordinate,
    radius: f64,
    unit: GeoUnit,
    options: GeoRadiusOptions,
) -> Result<Vec<GeoRadiusResponse>> {
    let mut args = vec![
        Bytes::from("GEORADIUS"),
        arg(key),
        arg(center.longitude),
        arg(center.latitude),
        arg(radius),
        unit.as_arg(),
    ];
    options.append_to(&mut args);
    let reply = exec(conn, args).await?;
    parse_radius_reply(reply, &options)
}

/// GEORADIUSBYMEMBER key member radius unit [options].
pub async fn georadius_by_member(
    conn: &mut Connection,
    key: impl ToArg,
    member: impl ToArg,
    radius: f64,
    unit: GeoUnit,
    options: GeoRadiusOptions,
) -> Result<Vec<GeoRadiusResponse>> {
    let mut args = vec![
        Bytes::from("GEORADIUSBYMEMBER"),
        arg(key),
        arg(member),
        arg(radius),
        unit.as_arg(),
    ];
    options.append_to(&mut args);
    let reply = exec(conn, args).await?;
    parse_radius_reply(reply, &options)
}

/// GEODIST key member1 member2 unit. `None` when either member is missing.
pub async fn geodist(
    conn: &mut Connection,
    key: impl ToArg,
    member1: impl ToArg,
    member2: impl ToArg,
    unit: GeoUnit,
) -> Result<Option<f64>> {
    exec(
        conn,
        vec![
            Bytes::from("GEODIST"),
            arg(key),
            arg(member1),
            arg(member2),
            unit.as_arg(),
        ],
    )
    .await?
    .into_opt_f64()
}

/// GEOPOS key member [member ...]. One entry per member, `None` where missing.
pub async fn geopos(
    conn: &mut Connection,
    key: impl ToArg,
    members: &[impl ToArg],
) -> Result<Vec<Option<GeoCoordinate>>> {
    exec(conn, command("GEOPOS", &[arg(key)], members))
        .await?
        .into_array()?
        .into_iter()
        .map(|v| match v {
            Value::Nil => Ok(None),
            other => parse_coordinate(other).map(Some),
        })
        .collect()
}

fn parse_coordinate(value: Value) -> Result<GeoCoordinate> {
    let mut parts = value.into_array()?.into_iter();
    match (parts.next(), parts.next()) {
        (Some(lng), Some(lat)) => Ok(GeoCoordinate {
            longitude: required_f64(lng)?,
            latitude: required_f64(lat)?,
        }),
        _ => Err(Error::Protocol("coordinate needs two elements".into())),
    }
}

fn required_f64(value: Value) -> Result<f64> {
    value
        .into_opt_f64()?
        .ok_or_else(|| Error::Protocol("unexpected nil number".into()))
}

/// Items are plain member names without WITH* flags, otherwise arrays of
/// `[member, dist?, coord?]` in that order.
fn parse_radius_reply(reply: Value, options: &GeoRadiusOptions) -> Result<Vec<GeoRadiusResponse>> {
    let plain = !options.with_coord && !options.with_dist;
    reply
        .into_array()?
        .into_iter()
        .map(|item| {
            if plain {
                return Ok(GeoRadiusResponse {
                    member: item.into_string()?,
                    distance: None,
                    coordinate: None,
                });
            }
            let mut parts = item.into_array()?.into_iter();
            let member = parts
                .next()
                .ok_or_else(|| Error::Protocol("empty GEORADIUS item".into()))?
                .into_string()?;
            let distance = if options.with_dist {
                let raw = parts
                    .next()
                    .ok_or_else(|| Error::Protocol("GEORADIUS item missing distance".into()))?;
                Some(required_f64(raw)?)
            } else {
                None
            };
            let coordinate = if options.with_coord {
                let raw = parts
                    .next()
                    .ok_or_else(|| Error::Protocol("GEORADIUS item missing coordinate".into()))?;
                Some(parse_coordinate(raw)?)
            } else {
                None
            };
            Ok(GeoRadiusResponse {
                member,
                distance,
                coordinate,
            })
        })
        .collect()
}
