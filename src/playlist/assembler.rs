use super::track::ScoredTrack;
use crate::cancel::CancellationToken;
use crate::error::GenerationError;
use std::collections::HashSet;

/// Converts the configured playlist length into track durations (seconds)
pub const SECONDS_PER_MINUTE: u32 = 60;

/// Why the assembler stopped walking the candidate list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The next eligible track would not fit in the remaining budget
    DurationCapReached,
    /// Every candidate was considered before the budget ran out
    PoolExhausted,
}

/// Ordered selection produced by the assembler
#[derive(Debug, Clone, PartialEq)]
pub struct Assembly {
    pub tracks: Vec<ScoredTrack>,
    pub total_duration: u32, // in seconds
    pub stop_reason: StopReason,
}

/// Greedy, duration-bounded selection over a score-ordered candidate list
pub struct PlaylistAssembler;

impl PlaylistAssembler {
    /// Walk `candidates` in order, keeping each track with a known duration
    /// that is not already selected, until the next one would overshoot
    /// `max_minutes` or the list ends.
    ///
    /// The budget is never exceeded; a first track longer than the whole
    /// budget yields an empty assembly.
    pub fn assemble(candidates: &[ScoredTrack], max_minutes: u32) -> Assembly {
        let never_cancelled = || -> Result<(), std::convert::Infallible> { Ok(()) };
        match Self::walk(candidates, max_minutes, never_cancelled) {
            Ok(assembly) => assembly,
            Err(never) => match never {},
        }
    }

    /// Same as [`assemble`](Self::assemble), checking `cancel` before each
    /// candidate
    pub fn assemble_cancellable(
        candidates: &[ScoredTrack],
        max_minutes: u32,
        cancel: &CancellationToken,
    ) -> Result<Assembly, GenerationError> {
        Self::walk(candidates, max_minutes, || cancel.check())
    }

    fn walk<E>(
        candidates: &[ScoredTrack],
        max_minutes: u32,
        check: impl Fn() -> Result<(), E>,
    ) -> Result<Assembly, E> {
        let budget = u64::from(max_minutes) * u64::from(SECONDS_PER_MINUTE);
        let mut total: u64 = 0;
        let mut seen_ids: HashSet<&str> = HashSet::new();
        let mut tracks = Vec::new();

        for candidate in candidates {
            check()?;

            if total >= budget {
                return Ok(Self::finish(tracks, total, StopReason::DurationCapReached));
            }

            let Some(duration) = candidate.track.duration else {
                log::debug!("Skipping '{}': unknown duration", candidate.id());
                continue;
            };
            if seen_ids.contains(candidate.id()) {
                continue;
            }

            if total + u64::from(duration) > budget {
                log::debug!(
                    "Stopping before '{}': {}s would exceed the {}s budget",
                    candidate.id(),
                    total + u64::from(duration),
                    budget
                );
                return Ok(Self::finish(tracks, total, StopReason::DurationCapReached));
            }

            seen_ids.insert(candidate.id());
            total += u64::from(duration);
            tracks.push(candidate.clone());
        }

        let stop_reason = if total >= budget {
            StopReason::DurationCapReached
        } else {
            StopReason::PoolExhausted
        };
        Ok(Self::finish(tracks, total, stop_reason))
    }

    fn finish(tracks: Vec<ScoredTrack>, total: u64, stop_reason: StopReason) -> Assembly {
        log::info!(
            "Assembled {} tracks ({}s), stopped: {:?}",
            tracks.len(),
            total,
            stop_reason
        );
        Assembly {
            tracks,
            total_duration: u32::try_from(total).unwrap_or(u32::MAX),
            stop_reason,
        }
    }
}
