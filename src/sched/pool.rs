use std::{sync::Arc, thread};

use crossbeam_channel::unbounded;
use tracing::debug;

use crate::{
    exec::{
        invoke::{run_block, BlockOutcome},
        registry::ExecutorRegistry,
    },
    limits::ResourceLimiter,
    runtime::{environment::EnvRef, error::RuntimeError},
    sandbox::{audit::AuditLog, manager::SandboxManager},
    sched::deps::{build_groups, BlockSpec},
};

/// Fixed-size worker pool draining dependency groups in order.
///
/// Inside a group completion order is unspecified; every write a block
/// declared is committed to the shared environment at the group barrier,
/// before the next group is released. A failed block commits nothing, but
/// nothing already committed is rolled back.
pub struct Scheduler {
    workers: usize,
}

impl Scheduler {
    pub fn new() -> Self {
        Scheduler {
            workers: num_cpus::get().max(1),
        }
    }

    pub fn with_workers(workers: usize) -> Self {
        Scheduler {
            workers: workers.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Runs a batch and returns one result per block, in batch order.
    /// Per-block guard errors (sandbox, unknown language, backend failure)
    /// land in that block's slot; they do not abort the rest of the batch.
    pub fn run(
        &self,
        registry: &ExecutorRegistry,
        sandboxes: &SandboxManager,
        limits: &ResourceLimiter,
        audit: &Arc<AuditLog>,
        env: &EnvRef,
        blocks: &[BlockSpec],
    ) -> Vec<Result<BlockOutcome, RuntimeError>> {
        let groups = build_groups(blocks);
        debug!(
            blocks = blocks.len(),
            groups = groups.len(),
            "scheduling batch"
        );

        let mut results: Vec<Option<Result<BlockOutcome, RuntimeError>>> =
            blocks.iter().map(|_| None).collect();

        for group in &groups {
            let (task_tx, task_rx) = unbounded::<usize>();
            let (done_tx, done_rx) = unbounded::<(usize, Result<BlockOutcome, RuntimeError>)>();
            for &position in &group.members {
                let _ = task_tx.send(position);
            }
            drop(task_tx);

            let worker_count = self.workers.min(group.members.len());
            thread::scope(|scope| {
                for _ in 0..worker_count {
                    let task_rx = task_rx.clone();
                    let done_tx = done_tx.clone();
                    scope.spawn(move || {
                        while let Ok(position) = task_rx.recv() {
                            let block = &blocks[position];
                            let result = run_block(
                                registry,
                                sandboxes,
                                Some(limits),
                                audit,
                                &block.id,
                                &block.language,
                                &block.code,
                            );
                            let _ = done_tx.send((position, result));
                        }
                    });
                }
            });
            drop(done_tx);

            // Group barrier: all workers have exited, commit the writes.
            while let Ok((position, result)) = done_rx.recv() {
                if let Ok(outcome) = &result {
                    for name in &blocks[position].writes {
                        env.define(name.clone(), outcome.value.clone());
                    }
                }
                results[position] = Some(result);
            }
        }

        results
            .into_iter()
            .map(|slot| match slot {
                Some(result) => result,
                None => unreachable!("every block belongs to exactly one group"),
            })
            .collect()
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Scheduler::new()
    }
}
