use gonogo_core::{Phase, TrialSpec, Word};
use rand::Rng;
use rand::seq::SliceRandom;

use crate::config::ExperimentConfig;

/// The pre-generated trial lists for one session: a practice block with
/// feedback and a main block without. Built once, before the window opens.
#[derive(Debug, Clone)]
pub struct TrialSchedule {
    pub practice: Vec<TrialSpec>,
    pub main: Vec<TrialSpec>,
}

impl TrialSchedule {
    pub fn generate<P: Phase, R: Rng>(config: &ExperimentConfig<P>, rng: &mut R) -> Self {
        Self {
            practice: practice_block(
                config.practice_go_trials,
                config.practice_nogo_trials,
                rng,
            ),
            main: main_block(config.main_go_trials, config.main_nogo_trials, rng),
        }
    }
}

/// Go trials are drawn uniformly from the go vocabulary, one independent
/// draw per slot; the no-go slots all carry the single no-go word.
fn practice_block<R: Rng>(go: usize, nogo: usize, rng: &mut R) -> Vec<TrialSpec> {
    let mut block: Vec<TrialSpec> = (0..go)
        .map(|_| {
            let word = Word::GO_WORDS[rng.random_range(0..Word::GO_WORDS.len())];
            TrialSpec::new(word, true)
        })
        .collect();
    block.extend((0..nogo).map(|_| TrialSpec::new(Word::NOGO_WORD, true)));
    block.shuffle(rng);
    block
}

/// The go vocabulary is repeated to fill the go slots evenly, so every go
/// word appears the same number of times.
fn main_block<R: Rng>(go: usize, nogo: usize, rng: &mut R) -> Vec<TrialSpec> {
    let mut block: Vec<TrialSpec> = Word::GO_WORDS
        .iter()
        .cycle()
        .take(go)
        .map(|word| TrialSpec::new(*word, false))
        .collect();
    block.extend((0..nogo).map(|_| TrialSpec::new(Word::NOGO_WORD, false)));
    block.shuffle(rng);
    block
}

#[cfg(test)]
mod tests {
    use super::*;
    use gonogo_core::GoNoGoPhase;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn generate(seed: u64) -> TrialSchedule {
        let config = ExperimentConfig::<GoNoGoPhase>::default();
        TrialSchedule::generate(&config, &mut StdRng::seed_from_u64(seed))
    }

    fn count_word(block: &[TrialSpec], word: Word) -> usize {
        block.iter().filter(|spec| spec.word == word).count()
    }

    #[test]
    fn practice_block_has_three_go_and_two_nogo() {
        for seed in 0..20 {
            let block = generate(seed).practice;
            assert_eq!(block.len(), 5);
            assert_eq!(block.iter().filter(|spec| spec.is_go).count(), 3);
            assert_eq!(count_word(&block, Word::Blauw), 2);
            assert!(block.iter().all(|spec| spec.is_practice));
        }
    }

    #[test]
    fn main_block_has_thirty_go_and_twenty_nogo() {
        for seed in 0..20 {
            let block = generate(seed).main;
            assert_eq!(block.len(), 50);
            assert_eq!(block.iter().filter(|spec| spec.is_go).count(), 30);
            assert_eq!(count_word(&block, Word::Blauw), 20);
            assert!(block.iter().all(|spec| !spec.is_practice));
        }
    }

    #[test]
    fn main_block_repeats_go_words_evenly() {
        for seed in 0..20 {
            let block = generate(seed).main;
            assert_eq!(count_word(&block, Word::Rood), 15);
            assert_eq!(count_word(&block, Word::Geel), 15);
        }
    }

    #[test]
    fn go_flags_are_consistent_with_words() {
        let schedule = generate(7);
        for spec in schedule.practice.iter().chain(&schedule.main) {
            assert_eq!(spec.is_go, spec.word.is_go());
        }
    }

    #[test]
    fn same_seed_reproduces_the_schedule() {
        let first = generate(42);
        let second = generate(42);
        assert_eq!(first.practice, second.practice);
        assert_eq!(first.main, second.main);
    }

    #[test]
    fn block_sizes_follow_configuration() {
        let mut config = ExperimentConfig::<GoNoGoPhase>::default();
        config.main_go_trials = 6;
        config.main_nogo_trials = 4;
        let schedule = TrialSchedule::generate(&config, &mut StdRng::seed_from_u64(1));
        assert_eq!(schedule.main.len(), 10);
        assert_eq!(count_word(&schedule.main, Word::Rood), 3);
        assert_eq!(count_word(&schedule.main, Word::Geel), 3);
    }
}
