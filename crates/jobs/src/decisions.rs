//! Forwarding decisions
//!
//! Same hop pairs as the routes links, but a reply is identified by its
//! address and its round, so a router answering in two rounds shows up once
//! per round. Each row keeps the near and far TTL and round with the flow-id.

use mpat_pipeline::{Process, StageContext, TaskError};
use mpat_protocol::{ForwardingDecisionRow, GroupedFlow, forwarding_decisions_name};
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::flows::{adjacent, hops};
use crate::runner::{JobReport, JobRunner};

/// Forwarding decisions of one flow
pub fn decisions(flow: &GroupedFlow) -> Vec<ForwardingDecisionRow> {
    let hops = hops(flow, |reply| (reply.reply_src_addr, reply.round));
    let mut rows = Vec::new();

    for (near, far) in adjacent(&hops) {
        for n in &near.replies {
            for f in &far.replies {
                rows.push(ForwardingDecisionRow {
                    near_round: n.round,
                    near_addr: n.reply_src_addr,
                    near_probe_ttl: n.probe_ttl,
                    far_round: f.round,
                    far_addr: f.reply_src_addr,
                    far_probe_ttl: f.probe_ttl,
                    probe_protocol: flow.flow.probe_protocol,
                    probe_src_addr: flow.flow.probe_src_addr,
                    probe_dst_prefix: flow.probe_dst_prefix,
                    probe_dst_addr: flow.flow.probe_dst_addr,
                    probe_src_port: flow.flow.probe_src_port,
                    probe_dst_port: flow.flow.probe_dst_port,
                });
            }
        }
    }
    rows
}

/// Process stage: grouped flow → forwarding decisions
#[derive(Debug, Clone, Copy, Default)]
pub struct DecisionsProcess;

impl Process for DecisionsProcess {
    type Input = GroupedFlow;
    type Output = ForwardingDecisionRow;

    fn process(
        &self,
        _ctx: &StageContext,
        flow: GroupedFlow,
        out: &mut Vec<ForwardingDecisionRow>,
    ) -> std::result::Result<(), TaskError> {
        out.extend(decisions(&flow));
        Ok(())
    }
}

impl JobRunner {
    /// Compute `forwarding_decisions__*` from each `results__*` table
    pub async fn compute_forwarding_decisions(
        &self,
        tables: &[String],
        cancel: &CancellationToken,
    ) -> Result<JobReport> {
        self.derive_from_flows(
            "forwarding-decisions",
            tables,
            |name| Ok(forwarding_decisions_name(name.as_str())?),
            || DecisionsProcess,
            cancel,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use mpat_protocol::ProbeRecord;
    use mpat_store::test_utils::{mapped, probe_record};

    use super::*;

    fn flow(records: &[ProbeRecord]) -> GroupedFlow {
        GroupedFlow::group(records).remove(0)
    }

    fn in_round(mut record: ProbeRecord, round: u8) -> ProbeRecord {
        record.round = round;
        record
    }

    #[test]
    fn test_adjacent_pairs() {
        let (a, b, c) = (mapped(10, 0, 0, 1), mapped(10, 0, 0, 2), mapped(10, 0, 0, 3));
        let flow = flow(&[
            probe_record(24000, 1, a),
            probe_record(24000, 2, b),
            probe_record(24000, 3, c),
        ]);

        let rows = decisions(&flow);
        assert_eq!(rows.len(), 2);
        assert_eq!((rows[0].near_addr, rows[0].far_addr), (a, b));
        assert_eq!((rows[0].near_probe_ttl, rows[0].far_probe_ttl), (1, 2));
        assert_eq!((rows[1].near_addr, rows[1].far_addr), (b, c));
        assert_eq!(rows[1].probe_dst_prefix, mapped(8, 8, 8, 0));
        assert_eq!(rows[1].probe_src_port, 24000);
    }

    #[test]
    fn test_rounds_are_kept_apart() {
        let (a, b) = (mapped(10, 0, 0, 1), mapped(10, 0, 0, 2));
        let flow = flow(&[
            in_round(probe_record(24000, 1, a), 1),
            in_round(probe_record(24000, 1, a), 2),
            in_round(probe_record(24000, 1, a), 2),
            in_round(probe_record(24000, 2, b), 1),
        ]);

        let rows = decisions(&flow);
        let rounds: Vec<(u8, u8)> = rows.iter().map(|r| (r.near_round, r.far_round)).collect();
        assert_eq!(rounds, vec![(1, 1), (2, 1)]);
    }

    #[test]
    fn test_null_and_destination_suppressed() {
        let a = mapped(10, 0, 0, 1);
        let flow = flow(&[
            probe_record(24000, 1, a),
            probe_record(24000, 2, std::net::Ipv6Addr::UNSPECIFIED),
            probe_record(24000, 2, mapped(8, 8, 8, 0)),
        ]);

        assert!(decisions(&flow).is_empty());
    }
}
