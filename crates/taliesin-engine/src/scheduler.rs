//! Bounded cooperative round-robin scheduling.
//!
//! `run_bounded` drives a batch of [`Steppable`] tasks in rounds. Each round
//! scans the batch in index order and advances at most `limit` unfinished
//! tasks by one step; finished tasks are skipped without consuming budget.
//! After each round the caller sees the latest per-task progress.
//!
//! The scan order makes the round trace a pure function of the tasks' step
//! sequences, which keeps session output reproducible and testable.

use crate::task::{StepOutcome, Steppable};

/// Drive `tasks` to completion, at most `limit` step advancements per round.
///
/// `on_round` is called after every round with the latest yielded value per
/// task (`None` until a task's first yield). The round in which the last task
/// finishes does not get a callback; the caller builds its terminal state
/// from the returned finals instead.
///
/// A `limit` of zero is treated as one. Returns one final per task, in task
/// order.
pub async fn run_bounded<T, F>(mut tasks: Vec<T>, limit: usize, mut on_round: F) -> Vec<T::Final>
where
    T: Steppable,
    F: FnMut(&[Option<T::Yield>]),
{
    let limit = limit.max(1);
    let mut latest: Vec<Option<T::Yield>> = (0..tasks.len()).map(|_| None).collect();
    let mut finals: Vec<Option<T::Final>> = (0..tasks.len()).map(|_| None).collect();
    let mut finished = vec![false; tasks.len()];
    let mut round = 0u64;

    while finished.iter().any(|done| !done) {
        round += 1;
        let mut advanced = 0usize;

        for (index, task) in tasks.iter_mut().enumerate() {
            if finished[index] {
                continue;
            }

            advanced += 1;
            match task.step().await {
                StepOutcome::Yielded(value) => latest[index] = Some(value),
                StepOutcome::Done(value) => {
                    finished[index] = true;
                    finals[index] = Some(value);
                }
            }

            if advanced >= limit {
                break;
            }
        }

        if finished.iter().all(|done| *done) {
            tracing::debug!(rounds = round, tasks = tasks.len(), "All tasks finished");
            break;
        }

        on_round(&latest);
    }

    finals.into_iter().flatten().collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    /// A task that yields `steps - 1` times, then finishes.
    struct Countdown {
        id: usize,
        steps: usize,
        taken: usize,
    }

    impl Countdown {
        fn new(id: usize, steps: usize) -> Self {
            Self { id, steps, taken: 0 }
        }
    }

    #[async_trait]
    impl Steppable for Countdown {
        type Yield = (usize, usize);
        type Final = usize;

        async fn step(&mut self) -> StepOutcome<(usize, usize), usize> {
            self.taken += 1;
            if self.taken < self.steps {
                StepOutcome::Yielded((self.id, self.taken))
            } else {
                StepOutcome::Done(self.id)
            }
        }
    }

    #[tokio::test]
    async fn test_round_trace_with_limit_two() {
        // T0 takes 2 steps, T1 takes 1, T2 takes 3.
        let tasks = vec![Countdown::new(0, 2), Countdown::new(1, 1), Countdown::new(2, 3)];

        let mut rounds: Vec<Vec<Option<(usize, usize)>>> = Vec::new();
        let finals = run_bounded(tasks, 2, |latest| rounds.push(latest.to_vec())).await;

        assert_eq!(finals, vec![0, 1, 2]);

        // Round 1: T0 yields, T1 finishes (budget spent).
        // Round 2: T0 finishes, T2 yields.
        // Round 3: T2 yields again (only unfinished task).
        // Round 4: T2 finishes; no callback for the all-finished round.
        assert_eq!(
            rounds,
            vec![
                vec![Some((0, 1)), None, None],
                vec![Some((0, 1)), None, Some((2, 1))],
                vec![Some((0, 1)), None, Some((2, 2))],
            ]
        );
    }

    #[tokio::test]
    async fn test_no_callback_when_all_finish_in_first_round() {
        let tasks = vec![Countdown::new(0, 1), Countdown::new(1, 1)];

        let mut calls = 0;
        let finals = run_bounded(tasks, 10, |_| calls += 1).await;

        assert_eq!(finals, vec![0, 1]);
        assert_eq!(calls, 0);
    }

    #[tokio::test]
    async fn test_limit_one_serializes_tasks() {
        let tasks = vec![Countdown::new(0, 2), Countdown::new(1, 2)];

        let mut rounds: Vec<Vec<Option<(usize, usize)>>> = Vec::new();
        let finals = run_bounded(tasks, 1, |latest| rounds.push(latest.to_vec())).await;

        assert_eq!(finals, vec![0, 1]);
        // One advancement per round: T0 yield, T0 done, T1 yield, T1 done.
        assert_eq!(
            rounds,
            vec![
                vec![Some((0, 1)), None],
                vec![Some((0, 1)), None],
                vec![Some((0, 1)), Some((1, 1))],
            ]
        );
    }

    #[tokio::test]
    async fn test_zero_limit_clamped_to_one() {
        let finals = run_bounded(vec![Countdown::new(0, 2)], 0, |_| {}).await;
        assert_eq!(finals, vec![0]);
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let finals: Vec<usize> = run_bounded(Vec::<Countdown>::new(), 3, |_| {}).await;
        assert!(finals.is_empty());
    }

    #[tokio::test]
    async fn test_finished_tasks_skipped_for_free() {
        // Three tasks, limit 2. After T0 and T1 finish, T2 must still get
        // stepped every round even though it sits past the first two slots.
        let tasks = vec![Countdown::new(0, 1), Countdown::new(1, 1), Countdown::new(2, 4)];

        let mut rounds = 0;
        let finals = run_bounded(tasks, 2, |_| rounds += 1).await;

        assert_eq!(finals, vec![0, 1, 2]);
        // Round 1: T0 done, T1 done. Rounds 2-4: T2 yields x3. Round 5: T2
        // done (no callback).
        assert_eq!(rounds, 4);
    }
}
