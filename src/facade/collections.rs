//! List, hash, set, sorted set and geo operations.

use std::collections::{HashMap, HashSet};

use bytes::Bytes;

use super::CommandFacade;
use crate::commands::geo::{GeoCoordinate, GeoRadiusOptions, GeoRadiusResponse, GeoUnit};
use crate::commands::{composite, geo, hashes, lists, sets, sorted_sets};
use crate::error::Result;
use crate::policy::Operation;
use crate::types::{ToArg, Value};

impl CommandFacade {
    // ── Lists ───────────────────────────────────────────────────────────

    /// Every element of the list at `key`.
    pub fn lrange_all(&self, key: impl ToArg) -> Result<Vec<String>> {
        self.lrange_op(Operation::LRangeAll, key, 0, -1)
    }

    /// LRANGE key start stop.
    pub fn lrange(&self, key: impl ToArg, start: i64, stop: i64) -> Result<Vec<String>> {
        self.lrange_op(Operation::LRange, key, start, stop)
    }

    fn lrange_op(&self, op: Operation, key: impl ToArg, start: i64, stop: i64) -> Result<Vec<String>> {
        self.runtime.block_on(async {
            let mut conn = self.acquire(op).await?;
            lists::lrange(&mut conn, key, start, stop).await
        })
    }

    /// LPUSH key values. Returns the new length.
    pub fn lpush(&self, key: impl ToArg, values: &[impl ToArg]) -> Result<i64> {
        self.runtime.block_on(async {
            let mut conn = self.acquire(Operation::LPush).await?;
            lists::lpush(&mut conn, key, values).await
        })
    }

    /// LPUSH followed by EXPIRE.
    pub fn lpush_with_expiry<S: AsRef<str>>(
        &self,
        key: &str,
        values: &[S],
        ttl_seconds: u64,
    ) -> Result<i64> {
        self.runtime.block_on(async {
            let mut conn = self.acquire(Operation::LPushWithExpiry).await?;
            composite::lpush_with_expiry(&mut conn, key, values, ttl_seconds).await
        })
    }

    /// Merge `values` into the list so each element appears once, optionally
    /// reapplying an expiry. Returns the new length. Not atomic.
    pub fn lpush_unique<S: AsRef<str>>(
        &self,
        key: &str,
        values: &[S],
        ttl_seconds: Option<u64>,
    ) -> Result<i64> {
        self.runtime.block_on(async {
            let mut conn = self.acquire(Operation::LPushUnique).await?;
            composite::lpush_unique(&mut conn, key, values, ttl_seconds).await
        })
    }

    /// Whether the list at `key` holds `value`.
    pub fn list_contains(&self, key: &str, value: &str) -> Result<bool> {
        self.runtime.block_on(async {
            let mut conn = self.acquire(Operation::ListContains).await?;
            composite::list_contains(&mut conn, key, value).await
        })
    }

    /// Remove one occurrence of `value`. False, with no change, when absent.
    /// Not atomic.
    pub fn pop_single(&self, key: &str, value: &str) -> Result<bool> {
        self.runtime.block_on(async {
            let mut conn = self.acquire(Operation::PopSingle).await?;
            composite::pop_single(&mut conn, key, value).await
        })
    }

    /// LPOP key.
    pub fn lpop(&self, key: impl ToArg) -> Result<Option<String>> {
        self.runtime.block_on(async {
            let mut conn = self.acquire(Operation::LPop).await?;
            lists::lpop(&mut conn, key).await
        })
    }

    /// RPOP key.
    pub fn rpop(&self, key: impl ToArg) -> Result<Option<String>> {
        self.runtime.block_on(async {
            let mut conn = self.acquire(Operation::RPop).await?;
            lists::rpop(&mut conn, key).await
        })
    }

    /// BLPOP keys timeout. `[key, element]`, or empty after `timeout_secs`.
    ///
    /// Holds a master connection for the whole wait; 0 waits forever.
    pub fn blpop(&self, timeout_secs: u64, keys: &[impl ToArg]) -> Result<Vec<String>> {
        self.runtime.block_on(async {
            let mut conn = self.acquire(Operation::BLPop).await?;
            lists::blpop(&mut conn, timeout_secs, keys).await
        })
    }

    /// BRPOP keys timeout.
    pub fn brpop(&self, timeout_secs: u64, keys: &[impl ToArg]) -> Result<Vec<String>> {
        self.runtime.block_on(async {
            let mut conn = self.acquire(Operation::BRPop).await?;
            lists::brpop(&mut conn, timeout_secs, keys).await
        })
    }

    /// LLEN key.
    pub fn llen(&self, key: impl ToArg) -> Result<i64> {
        self.runtime.block_on(async {
            let mut conn = self.acquire(Operation::LLen).await?;
            lists::llen(&mut conn, key).await
        })
    }

    // ── Hashes ──────────────────────────────────────────────────────────

    /// HSET key field value. Returns 1 when the field is new.
    pub fn hset(&self, key: impl ToArg, field: impl ToArg, value: impl ToArg) -> Result<i64> {
        self.runtime.block_on(async {
            let mut conn = self.acquire(Operation::HSet).await?;
            hashes::hset(&mut conn, key, &[(field, value)]).await
        })
    }

    /// Store `values` in one hash field through the serializer.
    pub fn hset_list(&self, key: impl ToArg, field: impl ToArg, values: &[String]) -> Result<i64> {
        self.authorize(Operation::HSetList)?;
        let encoded = self.serializer.encode(values)?;
        self.runtime.block_on(async {
            let mut conn = self.acquire(Operation::HSetList).await?;
            hashes::hset(&mut conn, key, &[(field, encoded)]).await
        })
    }

    /// HGET key field as text.
    pub fn hget(&self, key: impl ToArg, field: impl ToArg) -> Result<Option<String>> {
        self.runtime.block_on(async {
            let mut conn = self.acquire(Operation::HGet).await?;
            match hashes::hget(&mut conn, key, field).await? {
                Some(raw) => Value::String(raw).into_string().map(Some),
                None => Ok(None),
            }
        })
    }

    /// HGET key field as raw bytes.
    pub fn hget_bytes(&self, key: impl ToArg, field: impl ToArg) -> Result<Option<Bytes>> {
        self.runtime.block_on(async {
            let mut conn = self.acquire(Operation::HGetBytes).await?;
            hashes::hget(&mut conn, key, field).await
        })
    }

    /// A list stored by [`hset_list`](Self::hset_list). Empty when the field
    /// is missing or blank.
    pub fn hget_list(&self, key: impl ToArg, field: impl ToArg) -> Result<Vec<String>> {
        let raw = self.runtime.block_on(async {
            let mut conn = self.acquire(Operation::HGetList).await?;
            hashes::hget(&mut conn, key, field).await
        })?;
        match raw {
            Some(raw) if !raw.is_empty() => {
                let text = Value::String(raw).into_string()?;
                self.serializer.decode(&text)
            }
            _ => Ok(Vec::new()),
        }
    }

    /// HSET key with several field/value pairs.
    pub fn hmset(&self, key: impl ToArg, fields: &[(impl ToArg, impl ToArg)]) -> Result<()> {
        self.runtime.block_on(async {
            let mut conn = self.acquire(Operation::HMSet).await?;
            hashes::hset(&mut conn, key, fields).await?;
            Ok(())
        })
    }

    /// Several list-valued fields through the serializer.
    pub fn hmset_list(&self, key: impl ToArg, fields: &[(impl ToArg, Vec<String>)]) -> Result<()> {
        self.authorize(Operation::HMSetList)?;
        let encoded = fields
            .iter()
            .map(|(field, values)| -> Result<(Bytes, String)> {
                Ok((field.to_arg(), self.serializer.encode(values)?))
            })
            .collect::<Result<Vec<_>>>()?;
        self.runtime.block_on(async {
            let mut conn = self.acquire(Operation::HMSetList).await?;
            hashes::hset(&mut conn, key, &encoded).await?;
            Ok(())
        })
    }

    /// HMGET key fields.
    pub fn hmget(&self, key: impl ToArg, fields: &[impl ToArg]) -> Result<Vec<Option<String>>> {
        self.runtime.block_on(async {
            let mut conn = self.acquire(Operation::HMGet).await?;
            hashes::hmget(&mut conn, key, fields).await
        })
    }

    /// HGETALL key.
    pub fn hgetall(&self, key: impl ToArg) -> Result<HashMap<String, String>> {
        self.runtime.block_on(async {
            let mut conn = self.acquire(Operation::HGetAll).await?;
            hashes::hgetall(&mut conn, key).await
        })
    }

    /// HKEYS key.
    pub fn hkeys(&self, key: impl ToArg) -> Result<HashSet<String>> {
        self.runtime.block_on(async {
            let mut conn = self.acquire(Operation::HKeys).await?;
            hashes::hkeys(&mut conn, key).await
        })
    }

    /// HDEL key fields. Returns the number removed.
    pub fn hdel(&self, key: impl ToArg, fields: &[impl ToArg]) -> Result<i64> {
        self.runtime.block_on(async {
            let mut conn = self.acquire(Operation::HDel).await?;
            hashes::hdel(&mut conn, key, fields).await
        })
    }

    /// HLEN key.
    pub fn hlen(&self, key: impl ToArg) -> Result<i64> {
        self.runtime.block_on(async {
            let mut conn = self.acquire(Operation::HLen).await?;
            hashes::hlen(&mut conn, key).await
        })
    }

    // ── Sets ────────────────────────────────────────────────────────────

    /// SADD key members. Returns the number added.
    pub fn sadd(&self, key: impl ToArg, members: &[impl ToArg]) -> Result<i64> {
        self.runtime.block_on(async {
            let mut conn = self.acquire(Operation::SAdd).await?;
            sets::sadd(&mut conn, key, members).await
        })
    }

    /// SREM key members. Returns the number removed.
    pub fn srem(&self, key: impl ToArg, members: &[impl ToArg]) -> Result<i64> {
        self.runtime.block_on(async {
            let mut conn = self.acquire(Operation::SRem).await?;
            sets::srem(&mut conn, key, members).await
        })
    }

    /// SMEMBERS key.
    pub fn smembers(&self, key: impl ToArg) -> Result<HashSet<String>> {
        self.runtime.block_on(async {
            let mut conn = self.acquire(Operation::SMembers).await?;
            sets::smembers(&mut conn, key).await
        })
    }

    /// SCARD key.
    pub fn scard(&self, key: impl ToArg) -> Result<i64> {
        self.runtime.block_on(async {
            let mut conn = self.acquire(Operation::SCard).await?;
            sets::scard(&mut conn, key).await
        })
    }

    /// SISMEMBER key member.
    pub fn sismember(&self, key: impl ToArg, member: impl ToArg) -> Result<bool> {
        self.runtime.block_on(async {
            let mut conn = self.acquire(Operation::SIsMember).await?;
            sets::sismember(&mut conn, key, member).await
        })
    }

    // ── Sorted sets ─────────────────────────────────────────────────────

    /// ZADD key score member.
    pub fn zadd(&self, key: impl ToArg, score: f64, member: impl ToArg) -> Result<i64> {
        self.runtime.block_on(async {
            let mut conn = self.acquire(Operation::ZAdd).await?;
            sorted_sets::zadd(&mut conn, key, score, member).await
        })
    }

    /// ZRANGE key start stop.
    pub fn zrange(&self, key: impl ToArg, start: i64, stop: i64) -> Result<Vec<String>> {
        self.runtime.block_on(async {
            let mut conn = self.acquire(Operation::ZRange).await?;
            sorted_sets::zrange(&mut conn, key, start, stop).await
        })
    }

    /// ZREM key members.
    pub fn zrem(&self, key: impl ToArg, members: &[impl ToArg]) -> Result<i64> {
        self.runtime.block_on(async {
            let mut conn = self.acquire(Operation::ZRem).await?;
            sorted_sets::zrem(&mut conn, key, members).await
        })
    }

    /// ZREMRANGEBYSCORE key min max.
    pub fn zrem_range_by_score(&self, key: impl ToArg, min: f64, max: f64) -> Result<i64> {
        self.runtime.block_on(async {
            let mut conn = self.acquire(Operation::ZRemRangeByScore).await?;
            sorted_sets::zremrangebyscore(&mut conn, key, min, max).await
        })
    }

    /// ZRANGEBYSCORE key min max WITHSCORES.
    pub fn zrange_by_score_with_scores(
        &self,
        key: impl ToArg,
        min: f64,
        max: f64,
    ) -> Result<Vec<(String, f64)>> {
        self.runtime.block_on(async {
            let mut conn = self.acquire(Operation::ZRangeByScore).await?;
            sorted_sets::zrangebyscore_withscores(&mut conn, key, min, max).await
        })
    }

    /// ZSCORE key member.
    pub fn zscore(&self, key: impl ToArg, member: impl ToArg) -> Result<Option<f64>> {
        self.runtime.block_on(async {
            let mut conn = self.acquire(Operation::ZScore).await?;
            sorted_sets::zscore(&mut conn, key, member).await
        })
    }

    // ── Geo ─────────────────────────────────────────────────────────────

    /// GEOADD key longitude latitude member.
    pub fn geo_add(
        &self,
        key: impl ToArg,
        longitude: f64,
        latitude: f64,
        member: impl ToArg,
    ) -> Result<i64> {
        self.runtime.block_on(async {
            let mut conn = self.acquire(Operation::GeoAdd).await?;
            geo::geoadd(&mut conn, key, longitude, latitude, member).await
        })
    }

    /// Remove members from a geo set.
    pub fn geo_remove(&self, key: impl ToArg, members: &[impl ToArg]) -> Result<i64> {
        self.runtime.block_on(async {
            let mut conn = self.acquire(Operation::GeoRemove).await?;
            sorted_sets::zrem(&mut conn, key, members).await
        })
    }

    /// Members within `radius` of `center`.
    pub fn geo_radius(
        &self,
        key: impl ToArg,
        center: GeoCoordinate,
        radius: f64,
        unit: GeoUnit,
        options: GeoRadiusOptions,
    ) -> Result<Vec<GeoRadiusResponse>> {
        self.runtime.block_on(async {
            let mut conn = self.acquire(Operation::GeoRadius).await?;
            geo::georadius(&mut conn, key, center, radius, unit, options).await
        })
    }

    /// Members within `radius` of an existing member.
    pub fn geo_radius_by_member(
        &self,
        key: impl ToArg,
        member: impl ToArg,
        radius: f64,
        unit: GeoUnit,
        options: GeoRadiusOptions,
    ) -> Result<Vec<GeoRadiusResponse>> {
        self.runtime.block_on(async {
            let mut conn = self.acquire(Operation::GeoRadiusByMember).await?;
            geo::georadius_by_member(&mut conn, key, member, radius, unit, options).await
        })
    }

    /// Distance between two members. `None` when either is missing.
    pub fn geo_dist(
        &self,
        key: impl ToArg,
        member1: impl ToArg,
        member2: impl ToArg,
        unit: GeoUnit,
    ) -> Result<Option<f64>> {
        self.runtime.block_on(async {
            let mut conn = self.acquire(Operation::GeoDist).await?;
            geo::geodist(&mut conn, key, member1, member2, unit).await
        })
    }

    /// Positions of `members`, `None` where missing.
    pub fn geo_pos(
        &self,
        key: impl ToArg,
        members: &[impl ToArg],
    ) -> Result<Vec<Option<GeoCoordinate>>> {
        self.runtime.block_on(async {
            let mut conn = self.acquire(Operation::GeoPos).await?;
            geo::geopos(&mut conn, key, members).await
        })
    }
}
