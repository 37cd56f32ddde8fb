//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::cmp::Ordering;
use std::net::{Ipv4Addr, Ipv6Addr};

use bitflags::bitflags;
use chrono::{DateTime, Utc};
use derive_new::new;
use ipnetwork::Ipv6Network;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::collections::{Arena, RouteIndex};
use crate::config::RouteTableCfg;
use crate::debug::Debug;
use crate::error::Error;
use crate::lsa::{LsaKey, LsaRouterFlags, Options, PrefixOptions};
use crate::table::{PrefixTable, TrieKey};

// Maximum number of nexthops per route.
pub const MULTI_PATH_LIMIT: usize = 4;

// Destination type.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[derive(Deserialize, Serialize)]
pub enum RouteType {
    Router = 1,
    Network = 2,
    Discard = 3,
    Linkstate = 4,
    Range = 5,
}

// Path type, in order of preference.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[derive(Deserialize, Serialize)]
pub enum PathType {
    IntraArea,
    InterArea,
    Type1External,
    Type2External,
}

#[derive(Clone, Copy, Debug, Eq, Hash, new, Ord, PartialEq, PartialOrd)]
#[derive(Deserialize, Serialize)]
pub struct Nexthop {
    pub addr: Ipv6Addr,
    pub ifindex: u32,
}

pub type Nexthops = SmallVec<[Nexthop; MULTI_PATH_LIMIT]>;

#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct RoutePath {
    pub area_id: Ipv4Addr,
    pub path_type: PathType,
    // LSA this path was computed from.
    pub origin: LsaKey,
    pub router_bits: LsaRouterFlags,
    pub options: Options,
    pub prefix_options: PrefixOptions,
    pub cost: u32,
    pub cost_e2: u32,
    pub tag: Option<u32>,
}

#[derive(Clone, Debug)]
#[derive(Serialize)]
pub struct Route {
    pub rtype: RouteType,
    pub prefix: Ipv6Network,
    pub path: RoutePath,
    pub nexthops: Nexthops,
    pub flags: RouteFlags,
    pub installed: DateTime<Utc>,
    pub changed: DateTime<Utc>,
    // Neighbor routes in table order.
    #[serde(skip)]
    prev: Option<RouteIndex>,
    #[serde(skip)]
    next: Option<RouteIndex>,
}

bitflags! {
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    #[derive(Deserialize, Serialize)]
    #[serde(transparent)]
    pub struct RouteFlags: u8 {
        const BEST = 0x01;
        const ADD = 0x02;
        const REMOVE = 0x04;
        const CHANGE = 0x08;
        const WAS_REMOVED = 0x10;
    }
}

pub type RouteAddHook = Box<dyn FnMut(&Route) + Send>;
pub type RouteRemoveHook = Box<dyn FnMut(&Route, Option<&Route>) + Send>;

// Callbacks invoked whenever the best route of a destination changes.
#[derive(Default)]
pub struct RouteTableHooks {
    // Invoked with the new best route.
    pub add: Option<RouteAddHook>,
    // Invoked with the removed best route and, if any, the alternate route
    // promoted in its place.
    pub remove: Option<RouteRemoveHook>,
}

// Routing table.
//
// Every destination is a group of one or more routes sorted by preference.
// All routes are linked in a single chain sorted by destination first, which
// allows ordered iteration over the whole table in constant time per step.
// The first route of each group is the best one, and it's the one referenced
// by the prefix table.
#[derive(Debug)]
pub struct RouteTable {
    pub name: String,
    arena: Arena<Route>,
    tree: PrefixTable<RouteIndex>,
    count: usize,
    config: RouteTableCfg,
    pub hooks: RouteTableHooks,
}

// Insertion point of a route within its destination.
#[derive(Debug, Default)]
struct Position {
    prev: Option<RouteIndex>,
    next: Option<RouteIndex>,
    old: Option<RouteIndex>,
}

// ===== impl RoutePath =====

impl RoutePath {
    pub fn new(
        area_id: Ipv4Addr,
        path_type: PathType,
        origin: LsaKey,
        cost: u32,
    ) -> RoutePath {
        RoutePath {
            area_id,
            path_type,
            origin,
            router_bits: Default::default(),
            options: Default::default(),
            prefix_options: Default::default(),
            cost,
            cost_e2: 0,
            tag: None,
        }
    }
}

// ===== impl Route =====

impl Route {
    pub fn new(rtype: RouteType, prefix: Ipv6Network, path: RoutePath) -> Route {
        let now = Utc::now();
        Route {
            rtype,
            prefix,
            path,
            nexthops: Default::default(),
            flags: RouteFlags::empty(),
            installed: now,
            changed: now,
            prev: None,
            next: None,
        }
    }

    pub fn is_best(&self) -> bool {
        self.flags.contains(RouteFlags::BEST)
    }

    // Returns whether both routes were computed from the same LSA.
    pub fn is_same_origin(&self, other: &Route) -> bool {
        self.path.area_id == other.path.area_id
            && self.path.origin == other.path.origin
    }

    pub fn is_identical(&self, other: &Route) -> bool {
        self.rtype == other.rtype
            && self.prefix == other.prefix
            && self.path == other.path
            && self.nexthops_eq(other)
    }

    // Adds a nexthop, unless it's already present or the nexthop limit was
    // reached. Returns whether the nexthop was added.
    pub fn nexthop_add(&mut self, nexthop: Nexthop) -> bool {
        if self.nexthops.contains(&nexthop)
            || self.nexthops.len() >= MULTI_PATH_LIMIT
        {
            return false;
        }

        self.nexthops.push(nexthop);
        true
    }

    // Merges the nexthops of another route into this one.
    pub fn nexthop_merge(&mut self, other: &Route) {
        for nexthop in &other.nexthops {
            self.nexthop_add(*nexthop);
        }
    }

    // Compares the nexthop sets of both routes, regardless of ordering.
    pub fn nexthops_eq(&self, other: &Route) -> bool {
        self.nexthops.len() == other.nexthops.len()
            && self
                .nexthops
                .iter()
                .all(|nexthop| other.nexthops.contains(nexthop))
    }

    pub fn nexthops_clear(&mut self) {
        self.nexthops.clear();
    }

    fn trie_key(&self) -> TrieKey {
        TrieKey::from(self.prefix)
    }
}

// ===== impl RouteTableHooks =====

impl RouteTableHooks {
    fn route_add(&mut self, route: &Route) {
        if let Some(hook) = &mut self.add {
            hook(route);
        }
    }

    fn route_remove(&mut self, route: &Route, promoted: Option<&Route>) {
        if let Some(hook) = &mut self.remove {
            hook(route, promoted);
        }
    }
}

impl std::fmt::Debug for RouteTableHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteTableHooks")
            .field("add", &self.add.is_some())
            .field("remove", &self.remove.is_some())
            .finish()
    }
}

// ===== impl RouteTable =====

impl RouteTable {
    pub fn new(name: &str, config: RouteTableCfg) -> RouteTable {
        RouteTable {
            name: name.to_owned(),
            arena: Default::default(),
            tree: Default::default(),
            count: 0,
            config,
            hooks: Default::default(),
        }
    }

    // Adds a route to the table.
    //
    // When a route computed from the same LSA already exists, it's updated
    // in place. An identical route is discarded and the existing one is
    // returned with the `ADD` flag set.
    pub fn add(&mut self, mut route: Route) -> Result<RouteIndex, Error> {
        route.flags = RouteFlags::empty();
        route.nexthops.truncate(self.config.max_paths());
        let tkey = route.trie_key();

        // First route for this destination.
        let Some(head) = self.tree.get(&tkey).copied() else {
            self.check_capacity()?;
            let now = Utc::now();
            route.installed = now;
            route.changed = now;
            route.flags.insert(RouteFlags::ADD);

            let route_idx = self.link_destination(tkey, route);
            let route = &self.arena[route_idx];
            Debug::RouteAddDestination(&self.name, &route.prefix).log();
            self.hooks.route_add(route);
            return Ok(route_idx);
        };

        let position = self.position(&tkey, head, &route);
        if let Some(old_idx) = position.old {
            return Ok(self.update(tkey, old_idx, route));
        }

        // Another path to an existing destination.
        self.check_capacity()?;
        let now = Utc::now();
        route.installed = now;
        route.changed = now;
        route.flags.insert(RouteFlags::ADD);

        let (route_idx, best) = self.link_path(tkey, head, position.prev, route);
        let route = &self.arena[route_idx];
        Debug::RouteAddPath(&self.name, &route.prefix, best).log();
        if best {
            self.hooks.route_add(route);
        }

        Ok(route_idx)
    }

    // Replaces a route computed from the same LSA as the new one.
    fn update(
        &mut self,
        tkey: TrieKey,
        old_idx: RouteIndex,
        mut route: Route,
    ) -> RouteIndex {
        let old = &mut self.arena[old_idx];
        if old.is_identical(&route) {
            old.flags.insert(RouteFlags::ADD);
            old.flags.remove(RouteFlags::REMOVE);
            Debug::RouteAddNeedless(&self.name, &old.prefix).log();
            return old_idx;
        }

        route.installed = old.installed;
        route.changed = Utc::now();
        route.flags.insert(RouteFlags::CHANGE);

        // Take the place of the old route, unless its new cost moves it
        // elsewhere within the destination.
        if self.is_ordered_in_place(&tkey, old_idx, &route) {
            let old = &mut self.arena[old_idx];
            route.prev = old.prev;
            route.next = old.next;
            if old.is_best() {
                route.flags.insert(RouteFlags::BEST);
            }
            *old = route;

            let route = &self.arena[old_idx];
            let best = route.is_best();
            Debug::RouteUpdate(&self.name, &route.prefix, best).log();
            if best {
                self.hooks.route_add(route);
            }
            return old_idx;
        }

        let (old, promoted) = self.unlink(tkey, old_idx);
        let (route_idx, best) = match self.tree.get(&tkey).copied() {
            Some(head) => {
                let position = self.position(&tkey, head, &route);
                self.link_path(tkey, head, position.prev, route)
            }
            None => (self.link_destination(tkey, route), true),
        };

        let route = &self.arena[route_idx];
        Debug::RouteUpdate(&self.name, &route.prefix, best).log();
        if best {
            self.hooks.route_add(route);
        } else if old.is_best() {
            if let Some(promoted) = promoted {
                let promoted = &self.arena[promoted];
                Debug::RoutePromote(&self.name, &promoted.prefix).log();
            }
            let promoted = promoted.map(|promoted| &self.arena[promoted]);
            self.hooks.route_remove(&old, promoted);
        }

        route_idx
    }

    // Removes a route from the table, returning it.
    //
    // If the removed route was the best one for its destination, the next
    // alternate route (if any) is promoted in its place.
    pub fn remove(&mut self, route_idx: RouteIndex) -> Result<Route, Error> {
        let Some(route) = self.arena.get(route_idx) else {
            return Err(Error::RouteHandleInvalid(self.name.clone()));
        };
        let prefix = route.prefix;
        let tkey = route.trie_key();
        if !self.group(&tkey).any(|(member_idx, _)| member_idx == route_idx) {
            return Err(Error::RouteNotPresent(self.name.clone(), prefix));
        }

        let (mut route, promoted) = self.unlink(tkey, route_idx);
        route.flags.insert(RouteFlags::WAS_REMOVED);

        let best = route.is_best();
        Debug::RouteRemove(&self.name, &route.prefix, best).log();
        if best {
            if let Some(promoted) = promoted {
                let promoted = &self.arena[promoted];
                Debug::RoutePromote(&self.name, &promoted.prefix).log();
            }
            let promoted = promoted.map(|promoted| &self.arena[promoted]);
            self.hooks.route_remove(&route, promoted);
        }

        Ok(route)
    }

    // Removes all routes, one by one.
    pub fn remove_all(&mut self) {
        while let Some(route_idx) = self.head() {
            if let Err(error) = self.remove(route_idx) {
                error.log();
                break;
            }
        }
    }

    pub fn get(&self, route_idx: RouteIndex) -> Option<&Route> {
        self.arena.get(route_idx)
    }

    // Returns the best route for the given destination.
    pub fn lookup(&self, prefix: &Ipv6Network) -> Option<(RouteIndex, &Route)> {
        self.tree
            .get(&TrieKey::from(*prefix))
            .map(|route_idx| (*route_idx, &self.arena[*route_idx]))
    }

    // Returns the route to the same destination computed from the same LSA as
    // the provided route.
    pub fn lookup_identical(
        &self,
        route: &Route,
    ) -> Option<(RouteIndex, &Route)> {
        self.group(&route.trie_key()).find(|(_, member)| {
            member.rtype == route.rtype && member.is_same_origin(route)
        })
    }

    // Longest-prefix match.
    pub fn lookup_bestmatch(
        &self,
        prefix: &Ipv6Network,
    ) -> Option<(RouteIndex, &Route)> {
        self.tree
            .lookup_match(&TrieKey::from(*prefix))
            .map(|(_, route_idx)| (*route_idx, &self.arena[*route_idx]))
    }

    // Returns the first route in table order.
    pub fn head(&self) -> Option<RouteIndex> {
        self.tree.top().map(|(_, route_idx)| *route_idx)
    }

    // Returns the route that follows the provided one in table order.
    //
    // Panics if the route is no longer present in the table.
    pub fn next(&self, route_idx: RouteIndex) -> Option<RouteIndex> {
        self.arena[route_idx].next
    }

    // Returns the best route of the destination that follows the provided
    // route's destination, skipping any alternate routes.
    //
    // Panics if the route is no longer present in the table.
    pub fn best_next(&self, route_idx: RouteIndex) -> Option<RouteIndex> {
        let tkey = self.arena[route_idx].trie_key();
        self.tree.next(&tkey).map(|(_, route_idx)| *route_idx)
    }

    // Returns the first route whose destination is covered by the given
    // prefix.
    pub fn match_head(&self, prefix: &Ipv6Network) -> Option<RouteIndex> {
        self.tree
            .subtree(TrieKey::from(*prefix))
            .next()
            .map(|(_, route_idx)| *route_idx)
    }

    // Returns the route that follows the provided one, as long as its
    // destination is still covered by the given prefix.
    //
    // Panics if the route is no longer present in the table.
    pub fn match_next(
        &self,
        prefix: &Ipv6Network,
        route_idx: RouteIndex,
    ) -> Option<RouteIndex> {
        let tkey = TrieKey::from(*prefix);
        self.arena[route_idx]
            .next
            .filter(|next| tkey.contains(&self.arena[*next].trie_key()))
    }

    // Returns an iterator over all routes in table order.
    pub fn iter(&self) -> impl Iterator<Item = (RouteIndex, &Route)> {
        self.chain(self.head())
    }

    // Returns an iterator over the best route of each destination.
    pub fn iter_best(&self) -> impl Iterator<Item = (RouteIndex, &Route)> {
        self.tree
            .values()
            .map(|route_idx| (*route_idx, &self.arena[*route_idx]))
    }

    // Returns the number of destinations.
    pub fn count(&self) -> usize {
        self.count
    }

    // Returns the number of routes, including alternate ones.
    pub fn route_count(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    // Verifies the table internal consistency.
    pub fn check(&self) -> Result<(), Error> {
        if self.count != self.tree.len() {
            return Err(Error::RouteCountMismatch(
                self.name.clone(),
                self.tree.len(),
                self.count,
            ));
        }
        let chain_len = self.iter().count();
        if chain_len != self.arena.len() {
            return Err(Error::RouteCountMismatch(
                self.name.clone(),
                self.arena.len(),
                chain_len,
            ));
        }

        for (tkey, head) in self.tree.iter() {
            let head = &self.arena[*head];
            if let Some(prev) = head.prev
                && self.arena[prev].trie_key() == *tkey
            {
                return Err(Error::RouteChainBroken(
                    self.name.clone(),
                    head.prefix,
                ));
            }

            let group = self
                .group(tkey)
                .map(|(_, route)| route)
                .collect::<Vec<_>>();
            if !head.is_best()
                || group.iter().filter(|route| route.is_best()).count() != 1
            {
                return Err(Error::RouteBestMismatch(
                    self.name.clone(),
                    head.prefix,
                ));
            }
            if group.iter().tuple_combinations().any(|(a, b)| {
                a.rtype == b.rtype && route_cmp(a, b) == Ordering::Greater
            }) {
                return Err(Error::RouteChainBroken(
                    self.name.clone(),
                    head.prefix,
                ));
            }
        }

        for ((a_idx, a), (_, b)) in self.iter().tuple_windows() {
            if b.prev != Some(a_idx) || a.trie_key() > b.trie_key() {
                return Err(Error::RouteChainBroken(
                    self.name.clone(),
                    b.prefix,
                ));
            }
        }

        Ok(())
    }

    // Walks the chain starting from the given route.
    fn chain(
        &self,
        start: Option<RouteIndex>,
    ) -> impl Iterator<Item = (RouteIndex, &Route)> {
        std::iter::successors(start, |route_idx| self.arena[*route_idx].next)
            .map(|route_idx| (route_idx, &self.arena[route_idx]))
    }

    // Returns all routes to the given destination, best route first.
    fn group(
        &self,
        tkey: &TrieKey,
    ) -> impl Iterator<Item = (RouteIndex, &Route)> {
        let tkey = *tkey;
        self.chain(self.tree.get(&tkey).copied())
            .take_while(move |(_, route)| route.trie_key() == tkey)
    }

    // Finds where a new route should be inserted within its destination.
    fn position(
        &self,
        tkey: &TrieKey,
        head: RouteIndex,
        route: &Route,
    ) -> Position {
        let mut position = Position::default();

        for (route_idx, current) in self.chain(Some(head)) {
            if current.trie_key() != *tkey {
                position.next.get_or_insert(route_idx);
                break;
            }
            let same_type = current.rtype == route.rtype;
            if same_type && current.is_same_origin(route) {
                position.old = Some(route_idx);
                break;
            }

            // Keep scanning the destination for a route from the same origin.
            if position.next.is_some() {
                continue;
            }
            if same_type && route_cmp(current, route) == Ordering::Greater {
                position.next = Some(route_idx);
            } else {
                position.prev = Some(route_idx);
            }
        }

        position
    }

    // Returns whether replacing the given route by the new one keeps the
    // destination sorted by preference.
    fn is_ordered_in_place(
        &self,
        tkey: &TrieKey,
        old_idx: RouteIndex,
        route: &Route,
    ) -> bool {
        let mut before = true;
        for (route_idx, member) in self.group(tkey) {
            if route_idx == old_idx {
                before = false;
                continue;
            }
            if member.rtype != route.rtype {
                continue;
            }

            let cmp = if before {
                route_cmp(member, route)
            } else {
                route_cmp(route, member)
            };
            if cmp == Ordering::Greater {
                return false;
            }
        }

        true
    }

    // Links a route to an existing destination, right after `prev` or, when
    // unset, in front of the destination's best route. Returns the index of
    // the route and whether it became the new best route.
    fn link_path(
        &mut self,
        tkey: TrieKey,
        head: RouteIndex,
        prev: Option<RouteIndex>,
        mut route: Route,
    ) -> (RouteIndex, bool) {
        let (prev, next) = match prev {
            Some(prev) => (Some(prev), self.arena[prev].next),
            None => (self.arena[head].prev, Some(head)),
        };
        let best = next == Some(head);

        route.prev = prev;
        route.next = next;
        route.flags.set(RouteFlags::BEST, best);
        let route_idx = self.arena.insert(route);
        self.link_neighbors(prev, next, route_idx);

        if best {
            self.arena[head].flags.remove(RouteFlags::BEST);
            self.tree.insert(tkey, route_idx);
        }

        (route_idx, best)
    }

    // Links the first route of a new destination between the routes of the
    // neighbor destinations.
    fn link_destination(&mut self, tkey: TrieKey, mut route: Route) -> RouteIndex {
        let next = self.tree.next(&tkey).map(|(_, route_idx)| *route_idx);
        let prev = match next {
            Some(next) => self.arena[next].prev,
            None => self.tail(),
        };

        route.prev = prev;
        route.next = next;
        route.flags.insert(RouteFlags::BEST);
        let route_idx = self.arena.insert(route);
        self.link_neighbors(prev, next, route_idx);
        self.tree.insert(tkey, route_idx);
        self.count += 1;

        route_idx
    }

    fn link_neighbors(
        &mut self,
        prev: Option<RouteIndex>,
        next: Option<RouteIndex>,
        route_idx: RouteIndex,
    ) {
        if let Some(prev) = prev {
            self.arena[prev].next = Some(route_idx);
        }
        if let Some(next) = next {
            self.arena[next].prev = Some(route_idx);
        }
    }

    // Detaches a route from the table, promoting the next alternate route if
    // the detached route was the best one. Returns the detached route and the
    // promoted one.
    fn unlink(
        &mut self,
        tkey: TrieKey,
        route_idx: RouteIndex,
    ) -> (Route, Option<RouteIndex>) {
        // Callers resolve the handle from its destination group first.
        let route = self
            .arena
            .remove(route_idx)
            .expect("unlinked route must be present in the arena");
        if let Some(prev) = route.prev {
            self.arena[prev].next = route.next;
        }
        if let Some(next) = route.next {
            self.arena[next].prev = route.prev;
        }

        let mut promoted = None;
        if self.tree.get(&tkey) == Some(&route_idx) {
            match route
                .next
                .filter(|next| self.arena[*next].trie_key() == tkey)
            {
                Some(next) => {
                    self.arena[next].flags.insert(RouteFlags::BEST);
                    self.tree.insert(tkey, next);
                    promoted = Some(next);
                }
                None => {
                    self.tree.remove(&tkey);
                    self.count -= 1;
                }
            }
        }

        (route, promoted)
    }

    // Returns the last route in table order.
    fn tail(&self) -> Option<RouteIndex> {
        let (_, head) = self.tree.last()?;
        self.chain(Some(*head))
            .last()
            .map(|(route_idx, _)| route_idx)
    }

    fn check_capacity(&self) -> Result<(), Error> {
        if let Some(max_routes) = self.config.max_routes
            && self.arena.len() >= max_routes
        {
            return Err(Error::RouteTableFull(self.name.clone(), max_routes));
        }

        Ok(())
    }
}

impl std::ops::Index<RouteIndex> for RouteTable {
    type Output = Route;

    fn index(&self, route_idx: RouteIndex) -> &Self::Output {
        &self.arena[route_idx]
    }
}

// ===== global functions =====

// Compares two routes to the same destination. `Ordering::Less` means `a` is
// preferred over `b`.
pub fn route_cmp(a: &Route, b: &Route) -> Ordering {
    let cmp = a.rtype.cmp(&b.rtype);
    if cmp != Ordering::Equal {
        return cmp;
    }

    // Area IDs compare numerically.
    let cmp = a.path.area_id.cmp(&b.path.area_id);
    if cmp != Ordering::Equal {
        return cmp;
    }

    let cmp = a.path.path_type.cmp(&b.path.path_type);
    if cmp != Ordering::Equal {
        return cmp;
    }

    if a.path.path_type == PathType::Type2External {
        a.path.cost_e2.cmp(&b.path.cost_e2)
    } else {
        a.path.cost.cmp(&b.path.cost)
    }
}

// Returns the synthetic prefix used to index routes to routers and links.
pub fn linkstate_prefix(adv_rtr: Ipv4Addr, lsa_id: Ipv4Addr) -> Ipv6Network {
    let mut octets = [0; 16];
    octets[0..4].copy_from_slice(&adv_rtr.octets());
    octets[4..8].copy_from_slice(&lsa_id.octets());
    Ipv6Network::new(Ipv6Addr::from(octets), 64).unwrap()
}

// Returns the advertising router and LS-ID encoded in a linkstate prefix.
pub fn linkstate_prefix_parts(prefix: &Ipv6Network) -> (Ipv4Addr, Ipv4Addr) {
    let octets = prefix.network().octets();
    let adv_rtr = Ipv4Addr::new(octets[0], octets[1], octets[2], octets[3]);
    let lsa_id = Ipv4Addr::new(octets[4], octets[5], octets[6], octets[7]);
    (adv_rtr, lsa_id)
}
