//! The reconciliation pass.
//!
//! One call to [`Router::make_routing`] runs, in order:
//!
//! 1. allocate a new epoch,
//! 2. create a [`RoutingPlan`] for every domain,
//! 3. explicit pass: re-stamp every outstanding explicit request,
//! 4. implicit pass: route every candidate to the first valid member of its group,
//! 5. commit: delete stale connections, implement new or changed ones,
//! 6. delete the plans,
//! 7. apply commands the backends deferred during the pass.
//!
//! Backend failures never abort the pass. A connection whose `implement` failed stays
//! recorded and is retried by the next pass.

use std::collections::{BTreeMap, HashSet};

use super::Router;
use crate::connection::{ConnectionKey, ConnectionKind};
use crate::domain::{Deferred, DomainId, DomainTable, Epoch, Link, RoutingPlan};
use crate::error::BackendError;
use crate::hooks::{ConnectionImplemented, ConnectionRemoved};
use crate::node::{Direction, NodeIndex};

/// Summary of one routing pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RoutingReport {
    /// Epoch allocated for the pass.
    pub epoch: Epoch,
    /// Explicit connections confirmed.
    pub explicit: usize,
    /// Implicit connections derived.
    pub implicit: usize,
    /// `implement` calls that succeeded.
    pub implemented: usize,
    /// Implemented connections torn down.
    pub removed: usize,
    /// Backend calls that failed.
    pub failed: usize,
    /// Explicit requests dropped because an endpoint vanished.
    pub dropped: usize,
}

impl RoutingReport {
    /// Returns true if the pass changed anything in a backend.
    pub fn has_changes(&self) -> bool {
        self.implemented > 0 || self.removed > 0
    }
}

#[derive(Clone, Copy, Debug)]
enum BackendOp {
    Implement,
    Delete,
}

fn dispatch(
    domains: &mut DomainTable,
    plans: &mut BTreeMap<DomainId, RoutingPlan>,
    deferred: &mut Deferred,
    domain: DomainId,
    op: BackendOp,
    link: Link<'_>,
) -> Result<(), BackendError> {
    let Some(entry) = domains.get_mut(domain) else {
        return Err(BackendError::unavailable(format!("{domain} is not registered")));
    };
    let Some(backend) = entry.backend.as_deref_mut() else {
        return Ok(());
    };
    let Some(plan) = plans.get_mut(&domain) else {
        return Err(BackendError::unavailable(format!("no routing plan for {domain}")));
    };
    match op {
        BackendOp::Implement => backend.implement(plan, link, deferred),
        BackendOp::Delete => backend.delete(plan, link, deferred),
    }
}

impl Router {
    /// Runs one full routing pass and returns its summary.
    ///
    /// Clears the pending flag first; deferred commands applied at the end of the pass
    /// may set it again.
    pub fn make_routing(&mut self) -> RoutingReport {
        self.pending = false;
        self.epoch = self.epoch.next();
        let mut report = RoutingReport {
            epoch: self.epoch,
            ..RoutingReport::default()
        };

        let mut plans = self.create_plans();
        let mut linked = HashSet::new();
        self.explicit_pass(&mut report, &mut linked);
        self.implicit_pass(&mut report, &mut linked);
        self.commit(&mut plans, &mut report);
        self.delete_plans(plans);

        tracing::debug!(
            epoch = %report.epoch,
            explicit = report.explicit,
            implicit = report.implicit,
            implemented = report.implemented,
            removed = report.removed,
            failed = report.failed,
            dropped = report.dropped,
            "routing_pass: done"
        );

        if !self.deferred.is_empty() {
            tracing::debug!(
                commands = self.deferred.len(),
                "routing_pass: applying deferred commands"
            );
            self.apply_deferred();
        }
        report
    }

    fn create_plans(&mut self) -> BTreeMap<DomainId, RoutingPlan> {
        let mut plans = BTreeMap::new();
        for id in self.domains.ids() {
            let mut plan = RoutingPlan::new(id, self.epoch);
            if let Some(backend) = self.domains.get_mut(id).and_then(|d| d.backend.as_mut())
                && let Err(err) = backend.create_plan(&mut plan)
            {
                tracing::warn!(domain = %id, epoch = %self.epoch, "routing_plan: create failed: {err}");
            }
            plans.insert(id, plan);
        }
        plans
    }

    fn delete_plans(&mut self, plans: BTreeMap<DomainId, RoutingPlan>) {
        for (id, mut plan) in plans {
            if let Some(backend) = self.domains.get_mut(id).and_then(|d| d.backend.as_mut()) {
                backend.delete_plan(&mut plan);
            }
        }
    }

    /// Re-stamps every outstanding explicit request whose endpoints still exist.
    fn explicit_pass(&mut self, report: &mut RoutingReport, linked: &mut HashSet<NodeIndex>) {
        let mut dropped = Vec::new();
        for &key in &self.explicit {
            let (Some(input), Some(output)) = (self.nodes.get(key.input), self.nodes.get(key.output))
            else {
                tracing::warn!("routing_explicit: dropping {key}, endpoint no longer exists");
                dropped.push(key);
                continue;
            };
            let Some(domain) = self.domains.best_common(input, output) else {
                tracing::warn!("routing_explicit: dropping {key}, no common domain left");
                dropped.push(key);
                continue;
            };
            self.connections
                .upsert(key, ConnectionKind::Explicit, domain, self.epoch);
            linked.insert(key.input);
            linked.insert(key.output);
            report.explicit += 1;
        }
        report.dropped = dropped.len();
        for key in dropped {
            self.explicit.remove(&key);
        }
    }

    /// Routes each candidate to the first valid member of the group it is routed
    /// through. Candidates already linked this epoch are left alone.
    ///
    /// A member that is itself a candidate serves as a target at most once, and only
    /// while it is still unlinked; being chosen links it. Each candidate therefore ends
    /// the pass with at most one implicit connection.
    fn implicit_pass(&mut self, report: &mut RoutingReport, linked: &mut HashSet<NodeIndex>) {
        let candidates: HashSet<NodeIndex> = self.candidates.iter().copied().collect();
        for &candidate in &self.candidates {
            if linked.contains(&candidate) {
                tracing::trace!(node = %candidate, "routing_implicit: already linked");
                continue;
            }
            let Some(node) = self.nodes.get(candidate) else {
                continue;
            };
            let Some(group) = node.routed_via().and_then(|g| self.groups.get(g)) else {
                continue;
            };

            let target = group
                .members()
                .iter()
                .filter_map(|&member| self.nodes.get(member))
                .filter(|member| {
                    member.direction() == node.direction().opposite()
                        && member.index() != candidate
                        && member.is_routable()
                        && !(candidates.contains(&member.index())
                            && linked.contains(&member.index()))
                })
                .find_map(|member| {
                    self.domains
                        .best_common(node, member)
                        .map(|domain| (member.index(), domain))
                });
            let Some((target, domain)) = target else {
                tracing::trace!(node = %candidate, group = %group.id(), "routing_implicit: no valid target");
                continue;
            };

            let key = match node.direction() {
                Direction::Input => ConnectionKey::new(candidate, target),
                Direction::Output => ConnectionKey::new(target, candidate),
            };
            tracing::trace!(node = %candidate, domain = %domain, "routing_implicit: {key}");
            self.connections
                .upsert(key, ConnectionKind::Implicit, domain, self.epoch);
            linked.insert(candidate);
            if candidates.contains(&target) {
                linked.insert(target);
            }
            report.implicit += 1;
        }
    }

    /// Deletes stale connections and implements new or changed ones, in id order.
    fn commit(&mut self, plans: &mut BTreeMap<DomainId, RoutingPlan>, report: &mut RoutingReport) {
        for id in self.connections.ids() {
            let Some(conn) = self.connections.get(id).cloned() else {
                continue;
            };
            let input = self.nodes.get(conn.input());
            let output = self.nodes.get(conn.output());
            let link = Link {
                connection: &conn,
                input,
                output,
            };

            if conn.epoch() != self.epoch || input.is_none() || output.is_none() {
                if let Some((kind, domain)) = conn.implemented {
                    if let Err(err) = dispatch(
                        &mut self.domains,
                        plans,
                        &mut self.deferred,
                        domain,
                        BackendOp::Delete,
                        link,
                    ) {
                        tracing::warn!(connection = %id, domain = %domain, "routing_commit: delete failed: {err}");
                        report.failed += 1;
                    }
                    self.hooks.connection_removed.notify(&ConnectionRemoved {
                        id,
                        input: conn.input(),
                        output: conn.output(),
                        kind,
                        domain,
                    });
                    report.removed += 1;
                }
                tracing::debug!(connection = %id, "routing_commit: removed stale {}", conn.key());
                self.connections.remove(id);
                self.explicit.remove(&conn.key());
                continue;
            }

            if !conn.needs_implement() {
                continue;
            }

            if let Some((_, previous)) = conn.implemented
                && previous != conn.domain()
            {
                if let Err(err) = dispatch(
                    &mut self.domains,
                    plans,
                    &mut self.deferred,
                    previous,
                    BackendOp::Delete,
                    link,
                ) {
                    tracing::warn!(connection = %id, domain = %previous, "routing_commit: migrating delete failed: {err}");
                    report.failed += 1;
                }
                if let Some(entry) = self.connections.get_mut(id) {
                    entry.implemented = None;
                }
            }

            match dispatch(
                &mut self.domains,
                plans,
                &mut self.deferred,
                conn.domain(),
                BackendOp::Implement,
                link,
            ) {
                Ok(()) => {
                    if let Some(entry) = self.connections.get_mut(id) {
                        entry.implemented = Some((conn.kind(), conn.domain()));
                    }
                    tracing::debug!(
                        connection = %id,
                        kind = %conn.kind(),
                        domain = %conn.domain(),
                        "routing_commit: implemented {}",
                        conn.key()
                    );
                    self.hooks
                        .connection_implemented
                        .notify(&ConnectionImplemented {
                            id,
                            input: conn.input(),
                            output: conn.output(),
                            kind: conn.kind(),
                            domain: conn.domain(),
                            epoch: self.epoch,
                        });
                    report.implemented += 1;
                }
                Err(err) => {
                    tracing::warn!(connection = %id, domain = %conn.domain(), "routing_commit: implement failed, will retry: {err}");
                    report.failed += 1;
                }
            }
        }
    }
}
