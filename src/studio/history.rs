//! Session history of generated images, newest first.

use std::collections::VecDeque;

use crate::studio::types::GeneratedImage;

#[derive(Debug, Default)]
pub struct History {
    entries: VecDeque<GeneratedImage>,
    /// `None` keeps everything for the session.
    capacity: Option<usize>,
}

impl History {
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity: capacity.filter(|c| *c > 0),
        }
    }

    /// Put a finished batch in front of older entries, keeping batch order.
    /// Returns how many old entries were evicted.
    ///
    /// Only older entries are evicted: a batch larger than the capacity is
    /// kept whole until the next batch arrives.
    pub fn prepend_batch(&mut self, batch: Vec<GeneratedImage>) -> usize {
        let batch_len = batch.len();
        for image in batch.into_iter().rev() {
            self.entries.push_front(image);
        }
        let Some(capacity) = self.capacity else {
            return 0;
        };
        let keep = capacity.max(batch_len);
        let evicted = self.entries.len().saturating_sub(keep);
        self.entries.truncate(keep);
        evicted
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &GeneratedImage> {
        self.entries.iter()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn snapshot(&self) -> Vec<GeneratedImage> {
        self.entries.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::studio::types::{AspectRatio, DesignStyle};
    use chrono::Utc;
    use uuid::Uuid;

    fn image(prompt: &str) -> GeneratedImage {
        GeneratedImage {
            id: Uuid::new_v4(),
            url: "data:image/png;base64,AA==".into(),
            prompt: prompt.into(),
            timestamp: Utc::now(),
            style: DesignStyle::ThreeD,
            ratio: AspectRatio::Square,
            grounding_links: None,
        }
    }

    fn prompts(history: &History) -> Vec<String> {
        history.iter().map(|i| i.prompt.clone()).collect()
    }

    #[test]
    fn test_batches_prepend_in_order() {
        let mut history = History::new(None);
        history.prepend_batch(vec![image("a1"), image("a2")]);
        history.prepend_batch(vec![image("b1"), image("b2"), image("b3")]);
        assert_eq!(prompts(&history), ["b1", "b2", "b3", "a1", "a2"]);
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let mut history = History::new(Some(3));
        assert_eq!(history.prepend_batch(vec![image("a1"), image("a2")]), 0);
        assert_eq!(history.prepend_batch(vec![image("b1"), image("b2")]), 1);
        assert_eq!(prompts(&history), ["b1", "b2", "a1"]);
    }

    #[test]
    fn test_oversized_batch_is_kept_whole() {
        let mut history = History::new(Some(2));
        history.prepend_batch(vec![image("a1")]);
        assert_eq!(history.prepend_batch(vec![image("b1"), image("b2"), image("b3")]), 1);
        assert_eq!(prompts(&history), ["b1", "b2", "b3"]);
        // The next batch trims back down to the capacity.
        assert_eq!(history.prepend_batch(vec![image("c1")]), 2);
        assert_eq!(prompts(&history), ["c1", "b1"]);
    }

    #[test]
    fn test_zero_capacity_means_unbounded() {
        let mut history = History::new(Some(0));
        history.prepend_batch((0..10).map(|i| image(&i.to_string())).collect());
        assert_eq!(history.len(), 10);
    }

    #[test]
    fn test_clear() {
        let mut history = History::new(None);
        history.prepend_batch(vec![image("x")]);
        history.clear();
        assert!(history.is_empty());
    }
}
