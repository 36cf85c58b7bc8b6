//! Action categories, routing and the per-instance allow-list.
//!
//! Every facade operation is tagged with exactly one [`Action`]. The action
//! decides two things: whether this instance may run the operation at all
//! ([`ActionPolicy::check`]) and which pool serves it ([`Action::routing`]).
//! Both lookups are pure; nothing here touches a connection.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Operation category used for authorization and routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Plain reads.
    Read,
    /// Writes and commands that hold a connection exclusively.
    Write,
    /// Key or member removal.
    Delete,
    /// Read-modify-write updates of existing data.
    Update,
    /// Existence and membership checks.
    Check,
    /// Geospatial reads.
    GeoRead,
    /// Geospatial writes.
    GeoWrite,
}

impl Action {
    /// All actions, in declaration order.
    pub const ALL: [Action; 7] = [
        Action::Read,
        Action::Write,
        Action::Delete,
        Action::Update,
        Action::Check,
        Action::GeoRead,
        Action::GeoWrite,
    ];

    /// Which pool strategy serves this action.
    pub const fn routing(self) -> Routing {
        match self {
            Action::Read | Action::Check | Action::GeoRead => Routing::ReadPreferReplica,
            Action::Write
            | Action::Delete
            | Action::Update
            | Action::GeoWrite => Routing::WriteOnly,
        }
    }

    /// Lowercase name as used in configuration files.
    pub const fn as_str(self) -> &'static str {
        match self {
            Action::Read => "read",
            Action::Write => "write",
            Action::Delete => "delete",
            Action::Update => "update",
            Action::Check => "check",
            Action::GeoRead => "geo_read",
            Action::GeoWrite => "geo_write",
        }
    }

    const fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Connection routing strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Routing {
    /// Borrow from the replica pool, falling back to master once.
    ReadPreferReplica,
    /// Borrow from the master pool only.
    WriteOnly,
}

/// Immutable allow-list of actions for one facade instance.
///
/// An empty policy denies everything.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct ActionPolicy {
    allowed: u8,
}

impl ActionPolicy {
    /// Build a policy allowing exactly the given actions.
    pub fn new(actions: impl IntoIterator<Item = Action>) -> Self {
        let allowed = actions.into_iter().fold(0u8, |acc, a| acc | a.bit());
        Self { allowed }
    }

    /// A policy allowing every action.
    pub fn all() -> Self {
        Self::new(Action::ALL)
    }

    /// A policy denying every action.
    pub const fn deny_all() -> Self {
        Self { allowed: 0 }
    }

    /// Whether `action` is in the allow-list.
    pub const fn allows(&self, action: Action) -> bool {
        self.allowed & action.bit() != 0
    }

    /// Reject `action` unless it is in the allow-list.
    pub fn check(&self, action: Action) -> Result<()> {
        if self.allows(action) {
            Ok(())
        } else {
            Err(Error::AuthorizationDenied {
                action,
                allowed: *self,
            })
        }
    }

    /// The allowed actions, in declaration order.
    pub fn actions(&self) -> impl Iterator<Item = Action> + '_ {
        Action::ALL.into_iter().filter(|a| self.allows(*a))
    }

    /// Whether the policy denies everything.
    pub fn is_empty(&self) -> bool {
        self.allowed == 0
    }
}

impl Default for ActionPolicy {
    fn default() -> Self {
        Self::all()
    }
}

impl fmt::Display for ActionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, action) in self.actions().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}", action)?;
        }
        Ok(())
    }
}

impl fmt::Debug for ActionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.actions()).finish()
    }
}

impl FromIterator<Action> for ActionPolicy {
    fn from_iter<I: IntoIterator<Item = Action>>(iter: I) -> Self {
        Self::new(iter)
    }
}

/// Every operation exposed by [`CommandFacade`](crate::CommandFacade).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    // keys / strings
    HasKey,
    Get,
    GetBytes,
    Set,
    SetNx,
    SetEx,
    SetWithOptions,
    Del,
    Expire,
    Ttl,
    Pttl,
    Incr,
    IncrWithExpiry,
    Decr,
    // lists
    LRangeAll,
    LRange,
    LPush,
    LPushWithExpiry,
    LPushUnique,
    ListContains,
    PopSingle,
    LPop,
    RPop,
    BLPop,
    BRPop,
    LLen,
    // hashes
    HSet,
    HSetList,
    HGet,
    HGetBytes,
    HGetList,
    HMSet,
    HMSetList,
    HMGet,
    HGetAll,
    HKeys,
    HDel,
    HLen,
    // sets
    SAdd,
    SRem,
    SMembers,
    SCard,
    SIsMember,
    // sorted sets
    ZAdd,
    ZRange,
    ZRem,
    ZRemRangeByScore,
    ZRangeByScore,
    ZScore,
    // geo
    GeoAdd,
    GeoRemove,
    GeoRadius,
    GeoRadiusByMember,
    GeoDist,
    GeoPos,
    // scripting, time, pub/sub, transactions
    CurrentTime,
    SetToCurrentTime,
    Eval,
    Publish,
    PatternSubscribe,
    Transaction,
}

impl Operation {
    /// The action category of this operation.
    pub const fn action(self) -> Action {
        use Operation::*;
        match self {
            HasKey | ListContains => Action::Check,

            Get | GetBytes | Ttl | Pttl | LRangeAll | LRange | LLen | HGet | HGetBytes
            | HGetList | HMGet | HGetAll | HKeys | HLen | SMembers | SCard | SIsMember
            | ZRange | ZRangeByScore | ZScore | CurrentTime => Action::Read,

            Set | SetNx | SetEx | SetWithOptions | Decr | LPop | RPop | BLPop | BRPop | HSet
            | HSetList | HMSet | HMSetList | HDel | SAdd | ZAdd | ZRem | ZRemRangeByScore
            | SetToCurrentTime | Eval | Publish | PatternSubscribe | Transaction => Action::Write,

            Del | SRem => Action::Delete,

            Expire | Incr | IncrWithExpiry | LPush | LPushWithExpiry | LPushUnique
            | PopSingle => Action::Update,

            GeoAdd | GeoRemove => Action::GeoWrite,

            GeoRadius | GeoRadiusByMember | GeoDist | GeoPos => Action::GeoRead,
        }
    }

    /// Routing of this operation, derived from its action.
    pub const fn routing(self) -> Routing {
        self.action().routing()
    }
}
