//! Routes
//!
//! For every flow, each reply address at TTL `t` is linked to each reply
//! address at TTL `t + 1`:
//!
//! ```text
//! ttl 1: {A}        (A, P, B)
//! ttl 2: {B, B'}    (A, P, B')
//! ttl 3: {C}        (B, P, C), (B', P, C)
//! ```
//!
//! where `P` is the flow's destination prefix. Each link carries the reply
//! metadata of its near address, taken from the first reply captured from it.

use mpat_pipeline::{Process, StageContext, TaskError};
use mpat_protocol::{GroupedFlow, RouteRow, TableType};
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::flows::{adjacent, hops};
use crate::runner::{JobReport, JobRunner};

/// Links of one flow
pub fn links(flow: &GroupedFlow) -> Vec<RouteRow> {
    let hops = hops(flow, |reply| reply.reply_src_addr);
    let mut rows = Vec::new();

    for (near, far) in adjacent(&hops) {
        for a in &near.replies {
            for b in &far.replies {
                rows.push(RouteRow {
                    ip_addr: a.reply_src_addr,
                    dst_prefix: flow.probe_dst_prefix,
                    next_addr: b.reply_src_addr,
                    first_capture_timestamp: a.capture_timestamp,
                    probe_protocol: flow.flow.probe_protocol,
                    probe_src_addr: flow.flow.probe_src_addr,
                    probe_dst_addr: flow.flow.probe_dst_addr,
                    probe_src_port: flow.flow.probe_src_port,
                    probe_dst_port: flow.flow.probe_dst_port,
                    reply_icmp_type: a.reply_icmp_type,
                    reply_icmp_code: a.reply_icmp_code,
                    reply_size: a.reply_size,
                    rtt: a.rtt,
                    time_exceeded_reply: u8::from(a.time_exceeded_reply()),
                });
            }
        }
    }
    rows
}

/// Process stage: grouped flow → route links
#[derive(Debug, Clone, Copy, Default)]
pub struct RoutesProcess;

impl Process for RoutesProcess {
    type Input = GroupedFlow;
    type Output = RouteRow;

    fn process(
        &self,
        _ctx: &StageContext,
        flow: GroupedFlow,
        out: &mut Vec<RouteRow>,
    ) -> std::result::Result<(), TaskError> {
        out.extend(links(&flow));
        Ok(())
    }
}

impl JobRunner {
    /// Compute `routes__*` from each `results__*` table
    pub async fn compute_routes(&self, tables: &[String], cancel: &CancellationToken) -> Result<JobReport> {
        self.derive_from_flows(
            "routes",
            tables,
            |name| Ok(name.convert(TableType::Routes)?.to_string()),
            || RoutesProcess,
            cancel,
        )
        .await
    }
}

#[cfg(test)]
#[path = "routes_test.rs"]
mod routes_test;
