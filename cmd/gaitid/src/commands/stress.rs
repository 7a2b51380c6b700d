//! Concurrency exercise against an in-memory gallery.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Instant;

use clap::Args;
use serde::Serialize;

use giztoy_gaitid::{
    EnrollmentService, MatchingEngine, RebuildPolicy, SimilarityIndex, DEFAULT_THRESHOLD,
};
use giztoy_gallery::{GalleryStore, MemoryGallery};

use super::{output_result, print_verbose};
use crate::Cli;

/// Enroll a newcomer while many matchers query the same index.
///
/// Every matcher must see either the old or the new gallery in full, and
/// every enrolled vector must match itself exactly.
#[derive(Args)]
pub struct StressCommand {
    /// Identities enrolled before the run
    #[arg(long, default_value_t = 1000)]
    identities: usize,

    /// Concurrent match requests
    #[arg(long, default_value_t = 100)]
    queries: usize,

    /// Embedding dimension
    #[arg(long, default_value_t = 256)]
    dim: usize,

    /// Index refresh on enrollment (rebuild, insert)
    #[arg(long, default_value_t = RebuildPolicy::Rebuild)]
    rebuild: RebuildPolicy,
}

#[derive(Debug, Serialize)]
struct StressReport {
    identities: usize,
    queries: usize,
    dim: usize,
    rebuild: RebuildPolicy,
    torn_snapshots: usize,
    wrong_matches: usize,
    final_size: usize,
    newcomer_found: bool,
    elapsed_ms: u128,
}

impl StressReport {
    fn passed(&self) -> bool {
        self.torn_snapshots == 0
            && self.wrong_matches == 0
            && self.final_size == self.identities + 1
            && self.newcomer_found
    }
}

impl StressCommand {
    pub async fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        if self.identities == 0 || self.queries == 0 || self.dim == 0 {
            anyhow::bail!("--identities, --queries and --dim must be positive");
        }
        let policy = self.rebuild;
        print_verbose(
            cli,
            &format!(
                "stress: {} identities, {} queries, dim {}, {}",
                self.identities, self.queries, self.dim, policy
            ),
        );

        let (n, q, dim) = (self.identities, self.queries, self.dim);
        let report = tokio::task::spawn_blocking(move || run_stress(n, q, dim, policy)).await??;

        output_result(&report, cli.output.as_deref(), cli.json)?;
        if !report.passed() {
            anyhow::bail!("consistency check failed");
        }
        Ok(())
    }
}

fn run_stress(
    identities: usize,
    queries: usize,
    dim: usize,
    policy: RebuildPolicy,
) -> anyhow::Result<StressReport> {
    let store = Arc::new(MemoryGallery::new(dim));
    let vectors: Vec<Vec<f32>> = (0..identities as u64).map(|i| pseudo_vec(dim, i)).collect();
    for (i, v) in vectors.iter().enumerate() {
        store.put(&format!("id-{i}"), v)?;
    }
    let index = Arc::new(SimilarityIndex::new(dim));
    let enrollment = EnrollmentService::new(store, index.clone(), policy)?;
    enrollment.sync()?;
    let engine = MatchingEngine::new(index, DEFAULT_THRESHOLD)?;

    let newcomer = pseudo_vec(dim, u64::MAX);
    let torn = AtomicUsize::new(0);
    let wrong = AtomicUsize::new(0);
    let barrier = Barrier::new(queries + 1);
    let start = Instant::now();

    thread::scope(|s| -> anyhow::Result<()> {
        let writer = s.spawn(|| {
            barrier.wait();
            enrollment.enroll("newcomer", &newcomer)
        });

        for q in 0..queries {
            let (engine, vectors, barrier, torn, wrong) =
                (&engine, &vectors, &barrier, &torn, &wrong);
            s.spawn(move || {
                barrier.wait();
                let snap = engine.index().snapshot();
                let consistent = (snap.len() == identities || snap.len() == identities + 1)
                    && snap
                        .ids()
                        .iter()
                        .enumerate()
                        .all(|(slot, id)| snap.slot_of(id) == Some(slot));
                if !consistent {
                    torn.fetch_add(1, Ordering::Relaxed);
                }

                let target = q * 7 % identities;
                let want = format!("id-{target}");
                match engine.match_query(&vectors[target], 1.0) {
                    Ok(r) if r.identity_id.as_deref() == Some(want.as_str()) => {}
                    _ => {
                        wrong.fetch_add(1, Ordering::Relaxed);
                    }
                }
            });
        }

        writer
            .join()
            .map_err(|_| anyhow::anyhow!("enrollment thread panicked"))??;
        Ok(())
    })?;

    let elapsed_ms = start.elapsed().as_millis();
    let newcomer_found = engine
        .match_query(&newcomer, 1.0)?
        .identity_id
        .is_some_and(|id| id == "newcomer");

    Ok(StressReport {
        identities,
        queries,
        dim,
        rebuild: policy,
        torn_snapshots: torn.into_inner(),
        wrong_matches: wrong.into_inner(),
        final_size: engine.index().len(),
        newcomer_found,
        elapsed_ms,
    })
}

/// Deterministic vector in [-0.5, 0.5) per component.
fn pseudo_vec(dim: usize, seed: u64) -> Vec<f32> {
    let mut state = seed ^ 0x9E37_79B9_7F4A_7C15;
    (0..dim)
        .map(|_| {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            ((state >> 40) as f32) / ((1u64 << 24) as f32) - 0.5
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;
    use crate::Commands;

    fn parse_stress(args: &[&str]) -> Result<StressCommand, clap::Error> {
        let cli = Cli::try_parse_from(["gaitid", "stress"].iter().chain(args).copied())?;
        match cli.command {
            Commands::Stress(cmd) => Ok(cmd),
            _ => unreachable!(),
        }
    }

    #[test]
    fn rebuild_flag_parses_policy() {
        assert_eq!(parse_stress(&[]).unwrap().rebuild, RebuildPolicy::Rebuild);
        assert_eq!(
            parse_stress(&["--rebuild", "insert"]).unwrap().rebuild,
            RebuildPolicy::Insert
        );
        assert!(parse_stress(&["--rebuild", "sometimes"]).is_err());
    }

    #[test]
    fn small_run_is_consistent() {
        for policy in [RebuildPolicy::Rebuild, RebuildPolicy::Insert] {
            let report = run_stress(50, 16, 8, policy).unwrap();
            assert!(report.passed(), "{report:?}");
            assert_eq!(report.final_size, 51);
        }
    }
}
