//! Bounded recent-result buffer (newest first) with color statistics.

use std::collections::VecDeque;

use crate::types::outcome::{Color, Outcome};

/// Current run of identical colors, starting at the newest result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Streak {
    pub color: Color,
    pub length: usize,
}

/// Color counts over the buffered results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ColorStats {
    pub total: usize,
    pub red: usize,
    pub black: usize,
    pub white: usize,
    pub streak: Option<Streak>,
}

#[derive(Debug)]
pub struct RecentResults {
    capacity: usize,
    results: VecDeque<Outcome>,
}

impl RecentResults {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            results: VecDeque::with_capacity(capacity),
        }
    }

    /// Insert at the front, evicting the oldest beyond capacity.
    pub fn push(&mut self, outcome: Outcome) {
        self.results.push_front(outcome);
        self.results.truncate(self.capacity);
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn latest(&self) -> Option<&Outcome> {
        self.results.front()
    }

    /// Newest first.
    pub fn iter(&self) -> impl Iterator<Item = &Outcome> {
        self.results.iter()
    }

    /// The `n` newest colors, newest first.
    pub fn newest_colors(&self, n: usize) -> Vec<Color> {
        self.results.iter().take(n).map(|o| o.color).collect()
    }

    pub fn streak(&self) -> Option<Streak> {
        let first = self.results.front()?.color;
        let length = self
            .results
            .iter()
            .take_while(|o| o.color == first)
            .count();
        Some(Streak {
            color: first,
            length,
        })
    }

    pub fn stats(&self) -> ColorStats {
        let mut stats = ColorStats {
            total: self.results.len(),
            streak: self.streak(),
            ..Default::default()
        };
        for o in &self.results {
            match o.color {
                Color::Red => stats.red += 1,
                Color::Black => stats.black += 1,
                Color::White => stats.white += 1,
            }
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push_colors(history: &mut RecentResults, colors: &[Color]) {
        for (i, c) in colors.iter().enumerate() {
            history.push(Outcome::new(*c, i as i32, i as i64));
        }
    }

    #[test]
    fn test_capacity_keeps_newest() {
        let mut history = RecentResults::new(50);
        for i in 0..60 {
            history.push(Outcome::new(Color::Red, i, i as i64));
        }
        assert_eq!(history.len(), 50);
        assert_eq!(history.latest().map(|o| o.number), Some(59));
        assert_eq!(history.iter().last().map(|o| o.number), Some(10));
    }

    #[test]
    fn test_stats_and_streak() {
        let mut history = RecentResults::new(50);
        // Oldest → newest
        push_colors(
            &mut history,
            &[Color::White, Color::Black, Color::Red, Color::Red, Color::Red],
        );

        let stats = history.stats();
        assert_eq!(stats.total, 5);
        assert_eq!(stats.red, 3);
        assert_eq!(stats.black, 1);
        assert_eq!(stats.white, 1);
        assert_eq!(
            stats.streak,
            Some(Streak {
                color: Color::Red,
                length: 3
            })
        );
        assert_eq!(
            history.newest_colors(2),
            vec![Color::Red, Color::Red]
        );
    }

    #[test]
    fn test_empty_history() {
        let history = RecentResults::new(50);
        assert!(history.is_empty());
        assert_eq!(history.stats(), ColorStats::default());
    }
}
