//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::sync::Arc;

use bitflags::bitflags;
use derive_new::new;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::Sender;

use crate::collections::{Arena, LsaEntryIndex};
use crate::config::LsdbCfg;
use crate::debug::Debug;
use crate::error::Error;
use crate::lsa::{
    LSA_INIT_SEQ_NO, LSA_RESERVED_SEQ_NO, Lsa, LsaKey, LsaType, lsa_is_changed,
};
use crate::table::{PrefixTable, TrieKey};
use crate::task::IntervalTask;
use crate::tasks;
use crate::tasks::messages::LsdbMaxAgeSweepMsg;

// Owner of an LSDB, which also determines its flooding scope.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[derive(Deserialize, Serialize)]
pub enum LsdbId {
    // Area ID and interface index.
    Link(Ipv4Addr, u32),
    Area(Ipv4Addr),
    As,
}

pub type LsaHook = Box<dyn FnMut(&Arc<Lsa>) + Send>;

// Callbacks invoked on topologically significant LSDB changes.
#[derive(Default)]
pub struct LsdbHooks {
    pub add: Option<LsaHook>,
    pub remove: Option<LsaHook>,
    // Invoked when a MaxAge LSA with a wrapped sequence number needs to be
    // originated again instead of being removed.
    pub refresh: Option<LsaHook>,
}

#[derive(Debug, new)]
pub struct LsaEntry {
    // LSA data.
    pub data: Arc<Lsa>,
    // LSA entry flags.
    #[new(default)]
    pub flags: LsaEntryFlags,
    // Neighbor entries in database order.
    prev: Option<LsaEntryIndex>,
    next: Option<LsaEntryIndex>,
}

bitflags! {
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    #[derive(Deserialize, Serialize)]
    #[serde(transparent)]
    pub struct LsaEntryFlags: u8 {
        const SEQNO_WRAPPED = 0x01;
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct LsdbTypeStats {
    pub count: usize,
    pub cksum_sum: u32,
}

#[derive(Debug)]
pub struct Lsdb {
    pub id: LsdbId,
    arena: Arena<LsaEntry>,
    tree: PrefixTable<LsaEntryIndex>,
    count: usize,
    stats: BTreeMap<LsaType, LsdbTypeStats>,
    config: LsdbCfg,
    maxage_sweep_tx: Option<Sender<LsdbMaxAgeSweepMsg>>,
    maxage_sweeper: Option<IntervalTask>,
    pub hooks: LsdbHooks,
}

// ===== impl LsdbId =====

impl std::fmt::Display for LsdbId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LsdbId::Link(area_id, ifindex) => {
                write!(f, "link-scope area {area_id} ifindex {ifindex}")
            }
            LsdbId::Area(area_id) => write!(f, "area-scope area {area_id}"),
            LsdbId::As => write!(f, "as-scope"),
        }
    }
}

// ===== impl LsdbHooks =====

impl LsdbHooks {
    fn lsa_add(&mut self, lsa: &Arc<Lsa>) {
        if let Some(hook) = &mut self.add {
            hook(lsa);
        }
    }

    fn lsa_remove(&mut self, lsa: &Arc<Lsa>) {
        if let Some(hook) = &mut self.remove {
            hook(lsa);
        }
    }

    fn lsa_refresh(&mut self, lsa: &Arc<Lsa>) {
        if let Some(hook) = &mut self.refresh {
            hook(lsa);
        }
    }
}

impl std::fmt::Debug for LsdbHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LsdbHooks")
            .field("add", &self.add.is_some())
            .field("remove", &self.remove.is_some())
            .field("refresh", &self.refresh.is_some())
            .finish()
    }
}

// ===== impl Lsdb =====

impl Lsdb {
    pub fn new(id: LsdbId, config: LsdbCfg) -> Lsdb {
        Lsdb {
            id,
            arena: Default::default(),
            tree: Default::default(),
            count: 0,
            stats: Default::default(),
            config,
            maxage_sweep_tx: None,
            maxage_sweeper: None,
            hooks: Default::default(),
        }
    }

    // Installs the provided LSA, replacing any existing instance with the same
    // key. Adding a byte-identical copy of the installed instance is a no-op.
    //
    // Fails only when a new key would exceed the configured maximum number of
    // LSAs. Replacing an existing instance never fails.
    pub fn add(&mut self, lsa: Arc<Lsa>) -> Result<(), Error> {
        let tkey = lsa.key().trie_key();
        match self.tree.get(&tkey).copied() {
            // A byte-identical instance is already installed.
            Some(lse_idx) if *self.arena[lse_idx].data == *lsa => {
                Debug::LsaAddDuplicate(&self.id, &lsa.hdr).log();
            }
            Some(lse_idx) => self.replace(lse_idx, lsa),
            None => self.insert(tkey, lsa)?,
        }

        Ok(())
    }

    fn insert(&mut self, tkey: TrieKey, lsa: Arc<Lsa>) -> Result<(), Error> {
        if let Some(max_lsas) = self.config.max_lsas
            && self.count >= max_lsas
        {
            return Err(Error::LsdbFull(self.id, max_lsas));
        }

        // Link the new entry between its neighbors in database order.
        let prev = self.tree.prev(&tkey).map(|(_, lse_idx)| *lse_idx);
        let next = self.tree.next(&tkey).map(|(_, lse_idx)| *lse_idx);
        let lse_idx = self.arena.insert(LsaEntry::new(lsa.clone(), prev, next));
        if let Some(prev) = prev {
            self.arena[prev].next = Some(lse_idx);
        }
        if let Some(next) = next {
            self.arena[next].prev = Some(lse_idx);
        }
        self.tree.insert(tkey, lse_idx);
        self.count += 1;
        self.stats_add(&lsa);

        Debug::LsaAdd(&self.id, &lsa.hdr).log();

        if lsa.is_maxage() {
            self.hooks.lsa_remove(&lsa);
            self.maxage_sweep_start();
        } else {
            self.hooks.lsa_add(&lsa);
        }

        Ok(())
    }

    fn replace(&mut self, lse_idx: LsaEntryIndex, lsa: Arc<Lsa>) {
        let lse = &mut self.arena[lse_idx];
        let old = std::mem::replace(&mut lse.data, lsa.clone());
        lse.flags = LsaEntryFlags::empty();

        // Neighbors retransmitting the old instance will retransmit the new
        // one instead.
        lsa.rxmt_set(old.rxmt_count());

        self.stats_remove(&old);
        self.stats_add(&lsa);

        let changed = lsa_is_changed(&old, &lsa);
        Debug::LsaReplace(&self.id, &lsa.hdr, changed).log();

        if changed {
            if lsa.is_maxage() {
                self.hooks.lsa_remove(&old);
                self.hooks.lsa_remove(&lsa);
            } else if old.is_maxage() {
                self.hooks.lsa_add(&lsa);
            } else {
                self.hooks.lsa_remove(&old);
                self.hooks.lsa_add(&lsa);
            }
        }

        if lsa.is_maxage() {
            self.maxage_sweep_start();
        }
    }

    // Removes the provided LSA from the database.
    //
    // The LSA must be the exact instance stored in the database, not just an
    // instance with the same key.
    pub fn remove(&mut self, lsa: &Lsa) -> Result<(), Error> {
        let key = lsa.key();
        let tkey = key.trie_key();
        let lse_idx = match self.tree.get(&tkey) {
            Some(lse_idx)
                if std::ptr::eq(Arc::as_ptr(&self.arena[*lse_idx].data), lsa) =>
            {
                *lse_idx
            }
            _ => return Err(Error::LsaNotPresent(self.id, key)),
        };

        let lsa = self.unlink(tkey, lse_idx);
        Debug::LsaRemove(&self.id, &lsa.hdr).log();
        self.hooks.lsa_remove(&lsa);

        Ok(())
    }

    // Removes all LSAs, one by one.
    pub fn remove_all(&mut self) {
        while let Some((tkey, lse_idx)) =
            self.tree.top().map(|(tkey, lse_idx)| (*tkey, *lse_idx))
        {
            let lsa = self.unlink(tkey, lse_idx);
            Debug::LsaRemove(&self.id, &lsa.hdr).log();
            self.hooks.lsa_remove(&lsa);
        }

        self.maxage_sweep_stop();
    }

    // Detaches an entry from the database, returning the database's reference
    // to its LSA.
    fn unlink(&mut self, tkey: TrieKey, lse_idx: LsaEntryIndex) -> Arc<Lsa> {
        let lse = &self.arena[lse_idx];
        let (prev, next) = (lse.prev, lse.next);
        let lsa = lse.data.clone();

        if let Some(prev) = prev {
            self.arena[prev].next = next;
        }
        if let Some(next) = next {
            self.arena[next].prev = prev;
        }
        self.arena.remove(lse_idx);
        self.tree.remove(&tkey);
        self.count -= 1;
        self.stats_remove(&lsa);

        lsa
    }

    // Exact lookup.
    pub fn lookup(
        &self,
        lsa_type: LsaType,
        lsa_id: Ipv4Addr,
        adv_rtr: Ipv4Addr,
    ) -> Option<&Arc<Lsa>> {
        self.entry(&LsaKey::new(lsa_type, adv_rtr, lsa_id))
            .map(|lse| &lse.data)
    }

    // Returns the first LSA strictly after the given key, which doesn't need
    // to be present in the database.
    pub fn lookup_next(
        &self,
        lsa_type: LsaType,
        lsa_id: Ipv4Addr,
        adv_rtr: Ipv4Addr,
    ) -> Option<&Arc<Lsa>> {
        let tkey = LsaKey::new(lsa_type, adv_rtr, lsa_id).trie_key();
        self.tree
            .next(&tkey)
            .map(|(_, lse_idx)| &self.arena[*lse_idx].data)
    }

    pub fn entry(&self, key: &LsaKey) -> Option<&LsaEntry> {
        self.tree
            .get(&key.trie_key())
            .map(|lse_idx| &self.arena[*lse_idx])
    }

    // Returns the first LSA in database order.
    pub fn head(&self) -> Option<Arc<Lsa>> {
        self.tree
            .top()
            .map(|(_, lse_idx)| self.arena[*lse_idx].data.clone())
    }

    // Returns the LSA that follows the provided one in database order.
    //
    // The provided LSA might have been removed or replaced in the meantime,
    // in which case iteration resumes from its former position.
    pub fn next(&self, lsa: &Lsa) -> Option<Arc<Lsa>> {
        let tkey = lsa.key().trie_key();
        let next = match self.tree.get(&tkey) {
            Some(lse_idx) => self.arena[*lse_idx].next,
            None => self.tree.next(&tkey).map(|(_, lse_idx)| *lse_idx),
        };
        next.map(|lse_idx| self.arena[lse_idx].data.clone())
    }

    pub fn type_head(&self, lsa_type: LsaType) -> Option<Arc<Lsa>> {
        self.tree
            .subtree(lsa_type.trie_key())
            .next()
            .map(|(_, lse_idx)| self.arena[*lse_idx].data.clone())
    }

    pub fn type_next(&self, lsa_type: LsaType, lsa: &Lsa) -> Option<Arc<Lsa>> {
        self.next(lsa).filter(|next| next.hdr.lsa_type == lsa_type)
    }

    pub fn type_router_head(
        &self,
        lsa_type: LsaType,
        adv_rtr: Ipv4Addr,
    ) -> Option<Arc<Lsa>> {
        self.tree
            .subtree(LsaKey::type_advrtr_trie_key(lsa_type, adv_rtr))
            .next()
            .map(|(_, lse_idx)| self.arena[*lse_idx].data.clone())
    }

    pub fn type_router_next(
        &self,
        lsa_type: LsaType,
        adv_rtr: Ipv4Addr,
        lsa: &Lsa,
    ) -> Option<Arc<Lsa>> {
        self.next(lsa).filter(|next| {
            next.hdr.lsa_type == lsa_type && next.hdr.adv_rtr == adv_rtr
        })
    }

    // Returns an iterator over all LSAs in database order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Lsa>> {
        self.tree
            .values()
            .map(|lse_idx| &self.arena[*lse_idx].data)
    }

    // Returns an iterator over all LSAs of the given type.
    pub fn iter_by_type(
        &self,
        lsa_type: LsaType,
    ) -> impl Iterator<Item = &Arc<Lsa>> {
        self.tree
            .subtree(lsa_type.trie_key())
            .map(|(_, lse_idx)| &self.arena[*lse_idx].data)
    }

    // Returns an iterator over all LSAs of the given type originated by the
    // given router.
    pub fn iter_by_type_advrtr(
        &self,
        lsa_type: LsaType,
        adv_rtr: Ipv4Addr,
    ) -> impl Iterator<Item = &Arc<Lsa>> {
        self.tree
            .subtree(LsaKey::type_advrtr_trie_key(lsa_type, adv_rtr))
            .map(|(_, lse_idx)| &self.arena[*lse_idx].data)
    }

    // Marks a self-originated LSA whose sequence number reached its maximum
    // value. Once flushed, it will be refreshed by the MaxAge sweep instead of
    // being removed.
    pub fn set_seqno_wrapped(&mut self, key: &LsaKey) -> Result<(), Error> {
        let lse_idx = self
            .tree
            .get(&key.trie_key())
            .copied()
            .ok_or(Error::LsaNotPresent(self.id, *key))?;
        let lse = &mut self.arena[lse_idx];
        lse.flags.insert(LsaEntryFlags::SEQNO_WRAPPED);
        Debug::LsaSeqNoWrapped(&self.id, &lse.data.hdr).log();

        Ok(())
    }

    // Removes all MaxAge LSAs that aren't pending retransmission.
    //
    // Returns true when at least one MaxAge LSA couldn't be removed because of
    // pending retransmissions, in which case the sweep should run again later.
    pub fn maxage_remover(&mut self) -> bool {
        let mut reschedule = false;

        let maxage_lsas = self
            .tree
            .iter()
            .filter(|(_, lse_idx)| self.arena[**lse_idx].data.is_maxage())
            .map(|(tkey, lse_idx)| (*tkey, *lse_idx))
            .collect::<Vec<_>>();
        for (tkey, lse_idx) in maxage_lsas {
            let lse = &mut self.arena[lse_idx];

            let rxmt_count = lse.data.rxmt_count();
            if rxmt_count > 0 {
                Debug::LsaMaxAgeRxmtPending(&self.id, &lse.data.hdr, rxmt_count)
                    .log();
                reschedule = true;
                continue;
            }

            if lse.flags.contains(LsaEntryFlags::SEQNO_WRAPPED) {
                lse.flags.remove(LsaEntryFlags::SEQNO_WRAPPED);

                // The next sequence number allocated for this LSA will be the
                // initial one.
                let mut lsa = (*lse.data).clone();
                lsa.hdr.seq_no = LSA_RESERVED_SEQ_NO;
                let lsa = Arc::new(lsa);
                lse.data = lsa.clone();

                Debug::LsaMaxAgeRefresh(&self.id, &lsa.hdr).log();
                self.hooks.lsa_refresh(&lsa);
                continue;
            }

            let lsa = self.unlink(tkey, lse_idx);
            Debug::LsaMaxAgeRemove(&self.id, &lsa.hdr).log();
            self.hooks.lsa_remove(&lsa);
        }

        if !reschedule {
            self.maxage_sweep_stop();
        }

        reschedule
    }

    // Enables the periodic MaxAge sweep. The sweep runs only while the
    // database contains MaxAge LSAs; the owner is expected to call
    // `maxage_remover` upon receiving each message.
    pub fn maxage_sweep_enable(&mut self, tx: Sender<LsdbMaxAgeSweepMsg>) {
        self.maxage_sweep_tx = Some(tx);
        if self.iter().any(|lsa| lsa.is_maxage()) {
            self.maxage_sweep_start();
        }
    }

    pub fn is_maxage_sweep_running(&self) -> bool {
        self.maxage_sweeper.is_some()
    }

    // Updates the MaxAge sweep interval, in seconds.
    pub fn set_maxage_sweep_interval(&mut self, interval: u16) {
        self.config.maxage_sweep_interval = interval;
        let interval = self.config.maxage_sweep_interval();
        if let Some(maxage_sweeper) = &mut self.maxage_sweeper {
            maxage_sweeper.reset(Some(interval));
        }
    }

    fn maxage_sweep_start(&mut self) {
        if self.maxage_sweeper.is_some() {
            return;
        }
        let Some(maxage_sweep_tx) = &self.maxage_sweep_tx else {
            return;
        };

        Debug::LsdbMaxAgeSweepStart(&self.id).log();
        let task = tasks::lsdb_maxage_sweep_interval(
            self.id,
            self.config.maxage_sweep_interval(),
            maxage_sweep_tx,
        );
        self.maxage_sweeper = Some(task);
    }

    fn maxage_sweep_stop(&mut self) {
        if self.maxage_sweeper.take().is_some() {
            Debug::LsdbMaxAgeSweepStop(&self.id).log();
        }
    }

    // Returns an unused LS-ID for a new LSA of the given type originated by
    // the given router. LS-IDs are allocated starting from 1.
    pub fn new_ls_id(&self, lsa_type: LsaType, adv_rtr: Ipv4Addr) -> Ipv4Addr {
        let mut id = 1;
        for lsa in self.iter_by_type_advrtr(lsa_type, adv_rtr) {
            let lsa_id = u32::from(lsa.hdr.lsa_id);
            if lsa_id < id {
                continue;
            }
            if lsa_id > id {
                break;
            }
            id += 1;
        }

        Ipv4Addr::from(id)
    }

    // Returns the sequence number to use for the next instance of the given
    // LSA.
    pub fn new_ls_seqnum(
        &self,
        lsa_type: LsaType,
        lsa_id: Ipv4Addr,
        adv_rtr: Ipv4Addr,
    ) -> u32 {
        match self.lookup(lsa_type, lsa_id, adv_rtr) {
            Some(lsa) => lsa.hdr.seq_no.wrapping_add(1),
            None => LSA_INIT_SEQ_NO,
        }
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn count_by_type(&self, lsa_type: LsaType) -> usize {
        self.stats
            .get(&lsa_type)
            .map(|stats| stats.count)
            .unwrap_or(0)
    }

    // Returns the number of LSAs originated by the given router.
    pub fn count_self(&self, router_id: Ipv4Addr) -> usize {
        self.iter()
            .filter(|lsa| lsa.hdr.adv_rtr == router_id)
            .count()
    }

    // Returns the sum of the checksums of all LSAs.
    pub fn cksum_sum(&self) -> u32 {
        self.stats
            .values()
            .fold(0, |sum, stats| sum.wrapping_add(stats.cksum_sum))
    }

    pub fn cksum_sum_by_type(&self, lsa_type: LsaType) -> u32 {
        self.stats
            .get(&lsa_type)
            .map(|stats| stats.cksum_sum)
            .unwrap_or(0)
    }

    pub fn stats(&self) -> &BTreeMap<LsaType, LsdbTypeStats> {
        &self.stats
    }

    // Verifies the database internal consistency.
    pub fn check(&self) -> Result<(), Error> {
        if self.count != self.tree.len() || self.count != self.arena.len() {
            return Err(Error::LsdbCountMismatch(
                self.id,
                self.tree.len(),
                self.count,
            ));
        }

        let mut prev = None;
        for (tkey, lse_idx) in self.tree.iter() {
            let lse = &self.arena[*lse_idx];
            let key = lse.data.key();
            if key.trie_key() != *tkey || lse.prev != prev {
                return Err(Error::LsdbChainBroken(self.id, key));
            }
            if let Some(prev) = prev
                && self.arena[prev].next != Some(*lse_idx)
            {
                return Err(Error::LsdbChainBroken(self.id, key));
            }
            prev = Some(*lse_idx);
        }
        if let Some(prev) = prev
            && self.arena[prev].next.is_some()
        {
            let key = self.arena[prev].data.key();
            return Err(Error::LsdbChainBroken(self.id, key));
        }

        Ok(())
    }

    fn stats_add(&mut self, lsa: &Lsa) {
        let stats = self.stats.entry(lsa.hdr.lsa_type).or_default();
        stats.count += 1;
        stats.cksum_sum = stats.cksum_sum.wrapping_add(lsa.hdr.cksum.into());
    }

    fn stats_remove(&mut self, lsa: &Lsa) {
        if let Some(stats) = self.stats.get_mut(&lsa.hdr.lsa_type) {
            stats.count -= 1;
            stats.cksum_sum =
                stats.cksum_sum.wrapping_sub(lsa.hdr.cksum.into());
            if stats.count == 0 {
                self.stats.remove(&lsa.hdr.lsa_type);
            }
        }
    }
}
