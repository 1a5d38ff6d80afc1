//! Grouped flows: ingest and per-TTL hop sets
//!
//! The grouped-flow relation comes from one store cursor. The first ingest
//! worker to arrive takes the cursor and streams it; the other workers return
//! at once.
//!
//! Both derived-table process stages look at a flow as a sequence of hops:
//! the replies seen at one TTL, deduplicated, without the null address and
//! without the flow's destination prefix.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use futures_util::StreamExt;
use mpat_pipeline::{Emitter, Ingest, StageContext, TaskError};
use mpat_protocol::{FlowReply, GroupedFlow, is_null_addr};
use mpat_store::Store;
use tracing::debug;

/// Streams grouped flows of a set of results tables
pub struct FlowIngest {
    store: Arc<dyn Store>,
    tables: Vec<String>,
    taken: AtomicBool,
}

impl FlowIngest {
    pub fn new(store: Arc<dyn Store>, tables: Vec<String>) -> Self {
        Self {
            store,
            tables,
            taken: AtomicBool::new(false),
        }
    }

    fn target(&self) -> String {
        self.tables.join(",")
    }
}

#[async_trait]
impl Ingest for FlowIngest {
    type Output = GroupedFlow;

    async fn run(&self, ctx: &StageContext, out: &Emitter<GroupedFlow>) -> Result<(), TaskError> {
        if self.taken.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let target = self.target();
        let store = self.store.as_ref();
        let tables = self.tables.as_slice();
        let target_ref = target.as_str();

        let mut flows = ctx
            .retry(target_ref, |_| async move {
                store
                    .grouped_flows(tables)
                    .await
                    .map_err(|e| TaskError::from_error(target_ref, &e))
            })
            .await?;

        let mut count = 0u64;
        loop {
            let next = tokio::select! {
                biased;
                _ = ctx.cancelled() => return Err(TaskError::cancelled()),
                next = flows.next() => next,
            };
            let Some(flow) = next else { break };
            let flow = flow.map_err(|e| TaskError::from_error(target_ref, &e))?;
            out.emit(flow).await?;
            count += 1;
        }

        debug!(tables = %target, flows = count, "grouped flows streamed");
        Ok(())
    }
}

// =============================================================================
// Hops
// =============================================================================

/// Deduplicated replies at one TTL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hop<'a> {
    pub ttl: u8,
    pub replies: Vec<&'a FlowReply>,
}

/// Hops of `flow` in TTL order
///
/// Replies with the same `key` at the same TTL collapse into the one captured
/// first. Null replies and replies from the destination prefix are left out.
pub fn hops<K, F>(flow: &GroupedFlow, key: F) -> Vec<Hop<'_>>
where
    K: PartialEq,
    F: Fn(&FlowReply) -> K,
{
    let mut hops: Vec<Hop<'_>> = Vec::new();
    for reply in &flow.replies {
        if is_null_addr(&reply.reply_src_addr) || reply.reply_src_addr == flow.probe_dst_prefix {
            continue;
        }

        if hops.last().is_none_or(|hop| hop.ttl != reply.probe_ttl) {
            hops.push(Hop {
                ttl: reply.probe_ttl,
                replies: Vec::new(),
            });
        }
        let Some(hop) = hops.last_mut() else { continue };

        let k = key(reply);
        match hop.replies.iter_mut().find(|seen| key(seen) == k) {
            Some(seen) if reply.capture_timestamp < seen.capture_timestamp => *seen = reply,
            Some(_) => {}
            None => hop.replies.push(reply),
        }
    }
    hops
}

/// Pairs of hops at adjacent TTLs `(t, t + 1)`
pub fn adjacent<'h, 'a>(hops: &'h [Hop<'a>]) -> impl Iterator<Item = (&'h Hop<'a>, &'h Hop<'a>)> {
    hops.windows(2)
        .filter(|w| w[0].ttl.checked_add(1) == Some(w[1].ttl))
        .map(|w| (&w[0], &w[1]))
}
