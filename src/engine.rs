//! The dynamic-programming core: fills the `main`/`subtree` matrices over
//! the parasite tree in post-order and returns the optimal-cost root node of
//! the solution DAG.

use bitflags::bitflags;
use rustc_hash::FxHashMap;
use tracing::{debug, instrument};

use crate::{
    dag::{policy::PolicyKind, Association, Event, Kind, NodeId as DagNodeId, SolutionArena},
    error::{EngineError, ReconcileError},
    options::{ReconciliationOptions, ScaledCostVector},
    transfer::TransferSets,
    tree::{NodeId as TreeNodeId, Tree},
    utils::cancellation::CancellationToken,
};

bitflags! {
    /// Orthogonal run-mode toggles, replacing what would otherwise be three
    /// separate bool parameters threaded through every DP-fill call.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct EngineFlags: u8 {
        const ACYCLIC_ONLY          = 1 << 0;
        const COUNT_SUBSOLUTIONS    = 1 << 1;
        const COLLECT_EVENT_VECTORS = 1 << 2;
    }
}

pub struct Engine<'a> {
    host: &'a Tree,
    parasite: &'a Tree,
    leaf_map: &'a FxHashMap<TreeNodeId, TreeNodeId>,
    cost: ScaledCostVector,
    flags: EngineFlags,
    transfers: TransferSets,
    cancellation: &'a CancellationToken,

    pub arena: SolutionArena,
    pub policy: PolicyKind,
    main: Vec<Vec<DagNodeId>>,
    subtree: Vec<Vec<DagNodeId>>,
}

impl<'a> Engine<'a> {
    pub fn new(
        host: &'a Tree,
        parasite: &'a Tree,
        leaf_map: &'a FxHashMap<TreeNodeId, TreeNodeId>,
        options: &ReconciliationOptions,
        cancellation: &'a CancellationToken,
    ) -> Self {
        let mut flags = EngineFlags::empty();
        if options.acyclic_only {
            flags |= EngineFlags::ACYCLIC_ONLY;
        }
        let policy = match options.task {
            crate::options::Task::AllSolutions => PolicyKind::min_cost_counting(),
            crate::options::Task::EventVectors => {
                flags |= EngineFlags::COLLECT_EVENT_VECTORS;
                PolicyKind::event_vector()
            }
            crate::options::Task::EventPartition | crate::options::Task::CdEquivalence => {
                PolicyKind::min_cost_no_count()
            }
            crate::options::Task::BestK => {
                PolicyKind::best_k(options.best_k.expect("validate() rejects BestK without a k"))
            }
        };
        if policy.accumulate() {
            flags |= EngineFlags::COUNT_SUBSOLUTIONS;
        }

        let arena = SolutionArena::new(policy.accumulate());
        let main = vec![vec![arena.empty_solution(); host.len()]; parasite.len()];
        let subtree = main.clone();

        Self {
            host,
            parasite,
            leaf_map,
            cost: options.scaled_cost(),
            flags,
            transfers: TransferSets::new(options.distance_threshold),
            cancellation,
            arena,
            policy,
            main,
            subtree,
        }
    }

    pub fn flags(&self) -> EngineFlags {
        self.flags
    }

    /// Fills every DP cell and returns the optimal-cost node at the
    /// parasite root.
    #[instrument(skip(self))]
    pub fn run(&mut self) -> Result<DagNodeId, ReconcileError> {
        self.initialize_leaf_costs();

        let mut tick = self.cancellation.throttle_check(std::num::NonZeroU32::new(64).unwrap());
        for &parasite in self.parasite.post_order() {
            if self.parasite.is_leaf(parasite) {
                continue;
            }
            for &host in self.host.post_order() {
                tick.bail_if_cancelled()?;
                self.fill_at(parasite, host).map_err(ReconcileError::Engine)?;
            }
        }

        let root_row = &self.main[self.parasite.index(self.parasite.root()) as usize];
        debug!(cost_candidates = root_row.len(), "finishing up");
        let root = self
            .policy
            .best_solution(&mut self.arena, root_row)
            .map_err(EngineError::Dag)
            .map_err(ReconcileError::Engine)?;
        if self.arena.is_empty_solution(root) {
            return Err(ReconcileError::Engine(EngineError::Infeasible));
        }
        Ok(root)
    }

    fn row(&self, tree: &Tree, node: TreeNodeId) -> usize {
        tree.index(node) as usize
    }

    /// Re-runs the fill with each parasite node's event pinned to
    /// `events[parasite]` instead of chosen by minimum cost — recovers one
    /// concrete reconciliation belonging to an equivalence class that
    /// already fixed its event sequence. When `mapping` is given (CD-
    /// equivalence only), also pins non-host-switch parasites to the given
    /// host and discards any subtree-matrix fragment that lands elsewhere.
    #[instrument(skip(self, events, mapping))]
    pub fn run_forced(
        &mut self,
        events: &FxHashMap<TreeNodeId, Event>,
        mapping: Option<&FxHashMap<TreeNodeId, TreeNodeId>>,
    ) -> Result<DagNodeId, ReconcileError> {
        self.initialize_leaf_costs();

        let mut tick = self.cancellation.throttle_check(std::num::NonZeroU32::new(64).unwrap());
        for &parasite in self.parasite.post_order() {
            if self.parasite.is_leaf(parasite) {
                continue;
            }
            let event = events
                .get(&parasite)
                .copied()
                .expect("every internal parasite node has a prescribed event");
            for &host in self.host.post_order() {
                tick.bail_if_cancelled()?;
                self.fill_at_forced(parasite, host, event)
                    .map_err(ReconcileError::Engine)?;
            }
            if let Some(mapping) = mapping {
                if let Some(&forced_host) = mapping.get(&parasite) {
                    self.mask_to_host(parasite, forced_host);
                }
            }
        }

        let root_row = &self.main[self.parasite.index(self.parasite.root()) as usize];
        let root = self
            .policy
            .best_solution(&mut self.arena, root_row)
            .map_err(EngineError::Dag)
            .map_err(ReconcileError::Engine)?;
        if self.arena.is_empty_solution(root) {
            return Err(ReconcileError::Engine(EngineError::Infeasible));
        }
        Ok(root)
    }

    fn fill_at_forced(&mut self, parasite: TreeNodeId, host: TreeNodeId, event: Event) -> Result<(), EngineError> {
        let association = Association { parasite, host };
        let pr = self.row(self.parasite, parasite);
        let hc = self.row(self.host, host);

        if self.host.is_leaf(host) {
            let best = match event {
                Event::Duplication => self.duplication_leaf_solution(parasite, host, association),
                Event::HostSwitch => self.transfer_solution(parasite, host, association),
                _ => self.arena.empty_solution(),
            };
            self.main[pr][hc] = best;
            self.subtree[pr][hc] = best;
        } else {
            let best = match event {
                Event::Duplication => self.duplication_solution(parasite, host, association),
                Event::HostSwitch => self.transfer_solution(parasite, host, association),
                _ => self.cospeciation_solution(parasite, host, association),
            };
            self.main[pr][hc] = best;

            let (host_left, host_right) = self.host.children(host).expect("host is internal");
            let hlc = self.row(self.host, host_left);
            let hrc = self.row(self.host, host_right);
            let loss_left = self.policy.add_loss(&mut self.arena, self.cost.loss, self.subtree[pr][hlc]);
            let loss_right = self.policy.add_loss(&mut self.arena, self.cost.loss, self.subtree[pr][hrc]);
            let best_subtree = self
                .policy
                .best_solution(&mut self.arena, &[best, loss_left, loss_right])
                .map_err(EngineError::Dag)?;
            self.subtree[pr][hc] = best_subtree;
        }
        Ok(())
    }

    /// Collapses every `main`/`subtree` fragment for `parasite` that didn't
    /// land on `forced_host` — the CD-equivalence class already committed to
    /// that host for every non-host-switch event.
    ///
    /// `main[pr][hc]`'s own association host is always exactly the host at
    /// column `hc` by construction, so zeroing every non-forced column is
    /// enough there. `subtree[pr][hc]` is different: a loss-extended entry
    /// carries the association of the *original* deeper descendant host it
    /// was built from, not the current column's host, so a non-forced column
    /// can still hold a fragment that truly belongs to the forced host (and
    /// the forced column itself can hold a `Multiple` mixing fragments that
    /// do and don't). Every column's `subtree` entry is filtered down to the
    /// fragments whose own association host matches, rather than the column
    /// being kept or discarded wholesale.
    fn mask_to_host(&mut self, parasite: TreeNodeId, forced_host: TreeNodeId) {
        let pr = self.row(self.parasite, parasite);
        let forced_hc = self.row(self.host, forced_host);
        for hc in 0..self.host.len() {
            if hc != forced_hc {
                self.main[pr][hc] = self.arena.empty_solution();
            }
        }
        for hc in 0..self.host.len() {
            self.subtree[pr][hc] = self.filter_fragment_to_host(self.subtree[pr][hc], forced_host);
        }
    }

    /// Keeps only the sub-fragments of `id` whose own association host is
    /// `forced_host`, unwrapping a `Multiple` node to look inside it; merges
    /// the survivors back into one node (or the empty solution if none
    /// survive).
    fn filter_fragment_to_host(&mut self, id: DagNodeId, forced_host: TreeNodeId) -> DagNodeId {
        let node = self.arena.get(id);
        let fragments: Vec<DagNodeId> = if node.kind == Kind::Multiple {
            node.children.clone()
        } else {
            vec![id]
        };
        let kept: Vec<DagNodeId> = fragments
            .into_iter()
            .filter(|&f| {
                self.arena
                    .get(f)
                    .association
                    .is_some_and(|a| a.host == forced_host)
            })
            .collect();
        match kept.len() {
            0 => self.arena.empty_solution(),
            1 => kept[0],
            _ => {
                let mut acc = kept[0];
                for &k in &kept[1..] {
                    acc = self
                        .arena
                        .merge(acc, k)
                        .expect("tied-cost fragments from the same column merge cleanly");
                }
                acc
            }
        }
    }

    fn initialize_leaf_costs(&mut self) {
        for (&parasite_leaf, &host_leaf) in self.leaf_map.iter() {
            let association = Association {
                parasite: parasite_leaf,
                host: host_leaf,
            };
            let pr = self.row(self.parasite, parasite_leaf);
            let hc = self.row(self.host, host_leaf);
            let leaf = self.policy.from_leaf_association(&mut self.arena, association, 0, 0);
            self.main[pr][hc] = leaf;
            self.subtree[pr][hc] = leaf;

            let mut distance = 1u64;
            let mut ancestor = self.host.parent(host_leaf);
            while let Some(a) = ancestor {
                let ac = self.row(self.host, a);
                self.subtree[pr][ac] =
                    self.policy
                        .from_leaf_association(&mut self.arena, association, self.cost.loss, distance);
                ancestor = self.host.parent(a);
                distance += 1;
            }
        }
    }

    fn fill_at(&mut self, parasite: TreeNodeId, host: TreeNodeId) -> Result<(), EngineError> {
        let association = Association { parasite, host };
        let pr = self.row(self.parasite, parasite);
        let hc = self.row(self.host, host);

        if self.host.is_leaf(host) {
            let duplication = self.duplication_leaf_solution(parasite, host, association);
            let transfer = self.transfer_solution(parasite, host, association);
            let best = self
                .policy
                .best_solution(&mut self.arena, &[duplication, transfer])
                .map_err(EngineError::Dag)?;
            self.main[pr][hc] = best;
            self.subtree[pr][hc] = best;
        } else {
            let cospeciation = self.cospeciation_solution(parasite, host, association);
            let duplication = self.duplication_solution(parasite, host, association);
            let transfer = self.transfer_solution(parasite, host, association);
            let best = self
                .policy
                .best_solution(&mut self.arena, &[cospeciation, duplication, transfer])
                .map_err(EngineError::Dag)?;
            self.main[pr][hc] = best;

            let (host_left, host_right) = self.host.children(host).expect("host is internal");
            let hlc = self.row(self.host, host_left);
            let hrc = self.row(self.host, host_right);
            let loss_left = self.policy.add_loss(&mut self.arena, self.cost.loss, self.subtree[pr][hlc]);
            let loss_right = self.policy.add_loss(&mut self.arena, self.cost.loss, self.subtree[pr][hrc]);
            let best_subtree = self
                .policy
                .best_solution(&mut self.arena, &[best, loss_left, loss_right])
                .map_err(EngineError::Dag)?;
            self.subtree[pr][hc] = best_subtree;
        }
        Ok(())
    }

    fn duplication_leaf_solution(&mut self, parasite: TreeNodeId, host: TreeNodeId, association: Association) -> DagNodeId {
        let (pl, pr_) = self.parasite.children(parasite).expect("parasite is internal");
        let hc = self.row(self.host, host);
        let first = self.main[self.row(self.parasite, pl)][hc];
        let second = self.main[self.row(self.parasite, pr_)][hc];
        self.policy
            .cartesian(&mut self.arena, self.cost.duplication, first, second, association, Event::Duplication, 0)
    }

    fn duplication_solution(&mut self, parasite: TreeNodeId, host: TreeNodeId, association: Association) -> DagNodeId {
        let (pl, pr_) = self.parasite.children(parasite).expect("parasite is internal");
        let (hl, hr) = self.host.children(host).expect("host is internal");
        let (plr, prr, hc, hlc, hrc) = (
            self.row(self.parasite, pl),
            self.row(self.parasite, pr_),
            self.row(self.host, host),
            self.row(self.host, hl),
            self.row(self.host, hr),
        );

        let first1 = self.main[plr][hc];
        let second1 = self.main[prr][hc];
        let s1 = self
            .policy
            .cartesian(&mut self.arena, self.cost.duplication, first1, second1, association, Event::Duplication, 0);

        let loss = self.cost.duplication + self.cost.loss;
        let s2 = {
            let first2 = self.main[plr][hc];
            let second2 = self.subtree[prr][hlc];
            self.policy.cartesian(&mut self.arena, loss, first2, second2, association, Event::Duplication, 1)
        };
        let s3 = {
            let first3 = self.main[plr][hc];
            let second3 = self.subtree[prr][hrc];
            self.policy.cartesian(&mut self.arena, loss, first3, second3, association, Event::Duplication, 1)
        };
        let s4 = {
            let second4 = self.subtree[plr][hlc];
            let first4 = self.main[prr][hc];
            self.policy.cartesian(&mut self.arena, loss, second4, first4, association, Event::Duplication, 1)
        };
        let s5 = {
            let second5 = self.subtree[plr][hrc];
            let first5 = self.main[prr][hc];
            self.policy.cartesian(&mut self.arena, loss, second5, first5, association, Event::Duplication, 1)
        };
        let loss2 = self.cost.duplication + self.cost.loss + self.cost.loss;
        let s6 = {
            let first6 = self.subtree[plr][hlc];
            let second6 = self.subtree[prr][hlc];
            self.policy.cartesian(&mut self.arena, loss2, first6, second6, association, Event::Duplication, 2)
        };
        let s7 = {
            let first7 = self.subtree[plr][hrc];
            let second7 = self.subtree[prr][hrc];
            self.policy.cartesian(&mut self.arena, loss2, first7, second7, association, Event::Duplication, 2)
        };

        self.policy
            .best_solution(&mut self.arena, &[s1, s2, s3, s4, s5, s6, s7])
            .expect("non-empty candidate list")
    }

    fn transfer_solution(&mut self, parasite: TreeNodeId, host: TreeNodeId, association: Association) -> DagNodeId {
        let mut best = self.arena.empty_solution();
        let targets = self.transfers.for_host(self.host, host);
        let (pl, pr_) = self.parasite.children(parasite).expect("parasite is internal");
        let hc = self.row(self.host, host);

        for target in targets {
            let tc = self.row(self.host, target);
            let first_left = self.main[self.row(self.parasite, pl)][tc];
            let first_right = self.subtree[self.row(self.parasite, pr_)][hc];
            let first = self.policy.cartesian(
                &mut self.arena,
                self.cost.host_switch,
                first_left,
                first_right,
                association,
                Event::HostSwitch,
                0,
            );

            let second_left = self.subtree[self.row(self.parasite, pl)][hc];
            let second_right = self.main[self.row(self.parasite, pr_)][tc];
            let second = self.policy.cartesian(
                &mut self.arena,
                self.cost.host_switch,
                second_left,
                second_right,
                association,
                Event::HostSwitch,
                0,
            );

            best = self
                .policy
                .best_solution(&mut self.arena, &[best, first, second])
                .expect("non-empty candidate list");
        }
        best
    }

    fn cospeciation_solution(&mut self, parasite: TreeNodeId, host: TreeNodeId, association: Association) -> DagNodeId {
        let (pl, pr_) = self.parasite.children(parasite).expect("parasite is internal");
        let (hl, hr) = self.host.children(host).expect("host is internal");
        let (plr, prr, hlc, hrc) = (
            self.row(self.parasite, pl),
            self.row(self.parasite, pr_),
            self.row(self.host, hl),
            self.row(self.host, hr),
        );

        let first_left = self.subtree[plr][hlc];
        let first_right = self.subtree[prr][hrc];
        let first = self.policy.cartesian(
            &mut self.arena,
            self.cost.cospeciation,
            first_left,
            first_right,
            association,
            Event::Cospeciation,
            0,
        );

        let second_left = self.subtree[plr][hrc];
        let second_right = self.subtree[prr][hlc];
        let second = self.policy.cartesian(
            &mut self.arena,
            self.cost.cospeciation,
            second_left,
            second_right,
            association,
            Event::Cospeciation,
            0,
        );

        self.policy
            .best_solution(&mut self.arena, &[first, second])
            .expect("non-empty candidate list")
    }
}
