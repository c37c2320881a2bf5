//! Partitions and partition sets of one target-node walk.
//!
//! A partition is a candidate event variant: the transcripts that entered
//! the target through one in-edge and have followed the same branches so
//! far. A partition set records that its members diverged together at some
//! node; a combination of partitions that all sit in one live set restates
//! an event already reported further downstream and is rejected.

use crate::transcript_set::TranscriptSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartitionId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SetId(pub u32);

#[derive(Debug, Clone)]
pub struct Partition {
    pub transcripts: TranscriptSet,
    parents: Vec<SetId>,
}

impl Partition {
    pub fn parents(&self) -> &[SetId] {
        &self.parents
    }
}

#[derive(Debug, Clone)]
pub struct PartitionSet {
    members: Vec<PartitionId>,
    alive: bool,
}

impl PartitionSet {
    pub fn members(&self) -> &[PartitionId] {
        &self.members
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }
}

#[derive(Debug, Default)]
pub struct PartitionArena {
    partitions: Vec<Option<Partition>>,
    sets: Vec<PartitionSet>,
}

impl PartitionArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn partition(&self, id: PartitionId) -> &Partition {
        match self.partitions.get(id.0 as usize).and_then(|p| p.as_ref()) {
            Some(p) => p,
            None => panic!("partition {id:?} was dropped"),
        }
    }

    fn partition_mut(&mut self, id: PartitionId) -> &mut Partition {
        match self.partitions.get_mut(id.0 as usize).and_then(|p| p.as_mut()) {
            Some(p) => p,
            None => panic!("partition {id:?} was dropped"),
        }
    }

    pub fn set(&self, id: SetId) -> &PartitionSet {
        &self.sets[id.0 as usize]
    }

    pub fn is_live(&self, id: PartitionId) -> bool {
        self.partitions
            .get(id.0 as usize)
            .is_some_and(|p| p.is_some())
    }

    fn push_partition(&mut self, transcripts: TranscriptSet, parents: Vec<SetId>) -> PartitionId {
        assert!(!transcripts.is_empty(), "partitions never hold an empty set");
        let id = PartitionId(self.partitions.len() as u32);
        for &s in &parents {
            self.sets[s.0 as usize].members.push(id);
        }
        self.partitions.push(Some(Partition { transcripts, parents }));
        id
    }

    /// New partition living in a fresh singleton set.
    pub fn new_partition(&mut self, transcripts: TranscriptSet) -> PartitionId {
        let set = SetId(self.sets.len() as u32);
        self.sets.push(PartitionSet {
            members: Vec::new(),
            alive: true,
        });
        self.push_partition(transcripts, vec![set])
    }

    /// Move `inter` out of `p` into a new partition sharing `p`'s sets.
    ///
    /// `inter` must be a non-empty proper subset of `p`.
    pub fn split_off(&mut self, p: PartitionId, inter: &TranscriptSet) -> PartitionId {
        let (rest, parents) = {
            let part = self.partition(p);
            assert!(
                inter.is_subset_of(&part.transcripts) && *inter != part.transcripts,
                "split must take a proper subset"
            );
            (part.transcripts.without(inter), part.parents.clone())
        };
        self.partition_mut(p).transcripts = rest;
        self.push_partition(inter.clone(), parents)
    }

    /// Remove `drop` from `p`; an emptied partition is dropped.
    /// Returns whether `p` survives.
    pub fn subtract(&mut self, p: PartitionId, drop: &TranscriptSet) -> bool {
        let part = self.partition_mut(p);
        part.transcripts.subtract(drop);
        if part.transcripts.is_empty() {
            self.drop_partition(p);
            return false;
        }
        true
    }

    /// Drop a partition together with its set memberships.
    pub fn drop_partition(&mut self, p: PartitionId) {
        let Some(part) = self.partitions.get_mut(p.0 as usize).and_then(Option::take) else {
            return;
        };
        for s in part.parents {
            self.sets[s.0 as usize].members.retain(|&m| m != p);
        }
    }

    /// Record that `members` diverged together.
    pub fn new_set(&mut self, members: &[PartitionId]) -> SetId {
        let id = SetId(self.sets.len() as u32);
        let mut sorted = members.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        for &m in &sorted {
            self.partition_mut(m).parents.push(id);
        }
        self.sets.push(PartitionSet {
            members: sorted,
            alive: true,
        });
        id
    }

    /// Retire every other live set whose members all belong to `set`.
    /// Returns the number of retired sets.
    pub fn retire_subsumed(&mut self, set: SetId) -> usize {
        let cover = self.sets[set.0 as usize].members.clone();
        let mut retired = 0;
        for (i, s) in self.sets.iter_mut().enumerate() {
            if i == set.0 as usize || !s.alive {
                continue;
            }
            if s.members.iter().all(|m| cover.binary_search(m).is_ok()) {
                s.alive = false;
                retired += 1;
            }
        }
        retired
    }

    /// Live sets of `p`.
    pub fn live_parents(&self, p: PartitionId) -> Vec<SetId> {
        let mut out: Vec<SetId> = self
            .partition(p)
            .parents
            .iter()
            .copied()
            .filter(|&s| self.sets[s.0 as usize].alive)
            .collect();
        out.sort_unstable();
        out
    }

    /// A combination is valid unless one live set contains all of it.
    pub fn check_valid(&self, chosen: &[PartitionId]) -> bool {
        let Some((&first, rest)) = chosen.split_first() else {
            return true;
        };
        let mut primers = self.live_parents(first);
        for &p in rest {
            primers = self.check_valid_primers(&primers, p);
            if primers.is_empty() {
                return true;
            }
        }
        primers.is_empty()
    }

    /// Incremental form of [`check_valid`](Self::check_valid): narrow the sets
    /// shared by the partitions chosen so far to those also holding `p`.
    ///
    /// An empty result means no extension of the combination can be covered
    /// by a single set.
    pub fn check_valid_primers(&self, primers: &[SetId], p: PartitionId) -> Vec<SetId> {
        let own = &self.partition(p).parents;
        primers
            .iter()
            .copied()
            .filter(|s| own.contains(s))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(bits: &[usize]) -> TranscriptSet {
        TranscriptSet::from_indices(4, bits.iter().copied())
    }

    #[test]
    fn singletons_are_always_valid_together() {
        let mut arena = PartitionArena::new();
        let a = arena.new_partition(set(&[0]));
        let b = arena.new_partition(set(&[1]));
        assert!(arena.check_valid(&[a, b]));
    }

    #[test]
    fn a_shared_set_rejects_the_combination() {
        let mut arena = PartitionArena::new();
        let a = arena.new_partition(set(&[0]));
        let b = arena.new_partition(set(&[1]));
        let c = arena.new_partition(set(&[2]));
        let ab = arena.new_set(&[a, b]);
        assert!(!arena.check_valid(&[a, b]));
        assert!(arena.check_valid(&[a, c]));
        assert!(arena.check_valid(&[b, c]));

        // Retiring the singletons does not change the verdicts.
        assert_eq!(arena.retire_subsumed(ab), 2);
        assert!(!arena.check_valid(&[b, a]));
        assert!(arena.check_valid(&[a, c]));
    }

    #[test]
    fn split_clones_share_parents_and_preserve_the_union() {
        let mut arena = PartitionArena::new();
        let p = arena.new_partition(set(&[0, 2]));
        let before = arena.partition(p).transcripts.clone();
        let inter = set(&[0]);
        let clone = arena.split_off(p, &inter);

        let rest = arena.partition(p).transcripts.clone();
        assert_eq!(rest.union(&arena.partition(clone).transcripts), before);
        assert!(!rest.intersects(&inter));
        assert_eq!(arena.partition(clone).parents(), arena.partition(p).parents());
        // Both halves came in through the same in-edge: never an event.
        assert!(!arena.check_valid(&[p, clone]));
    }

    #[test]
    fn emptied_partitions_leave_their_sets() {
        let mut arena = PartitionArena::new();
        let a = arena.new_partition(set(&[0]));
        let b = arena.new_partition(set(&[1]));
        let ab = arena.new_set(&[a, b]);
        assert!(!arena.subtract(a, &set(&[0, 3])));
        assert!(!arena.is_live(a));
        assert_eq!(arena.set(ab).members(), &[b]);
        assert!(arena.subtract(b, &set(&[3])));
    }

    #[test]
    fn three_way_combination_needs_one_covering_set() {
        let mut arena = PartitionArena::new();
        let a = arena.new_partition(set(&[0]));
        let b = arena.new_partition(set(&[1]));
        let c = arena.new_partition(set(&[2]));
        arena.new_set(&[a, b]);
        arena.new_set(&[b, c]);
        // No single set holds all three.
        assert!(arena.check_valid(&[a, b, c]));
        let abc = arena.new_set(&[a, b, c]);
        assert!(!arena.check_valid(&[a, b, c]));
        assert_eq!(arena.retire_subsumed(abc), 5);
    }
}
