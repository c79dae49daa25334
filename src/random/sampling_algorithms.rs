//! Algorithms for uniform random sampling from iterators of known length. These are written to be
//! generic over the container type, so callers can sample agent ids straight out of filtered
//! iterators without collecting them first.

use rand::seq::index::sample as choose_range;
use rand::Rng;

/// Sample a random element uniformly from a container of known length.
///
/// We do not assume the container is randomly indexable, only that it can be iterated over.
pub fn sample_single_from_known_length<I, R, T>(rng: &mut R, mut iter: I) -> Option<T>
where
    R: Rng,
    I: Iterator<Item = T> + ExactSizeIterator<Item = T>,
{
    let len = iter.len();
    if len == 0 {
        return None;
    }
    let index = rng.random_range(0..len);
    iter.nth(index)
}

/// Sample multiple random elements uniformly without replacement from a container of known
/// length. Selected items are returned in iteration order. If more samples are requested than
/// the container holds, every item is returned.
pub fn sample_multiple_from_known_length<I, R, T>(rng: &mut R, iter: I, requested: usize) -> Vec<T>
where
    R: Rng,
    I: IntoIterator<Item = T> + ExactSizeIterator<Item = T>,
{
    let requested = requested.min(iter.len());
    let mut indexes = Vec::with_capacity(requested);
    indexes.extend(choose_range(rng, iter.len(), requested));
    indexes.sort_unstable();
    let mut index_iterator = indexes.into_iter();
    let Some(mut next_idx) = index_iterator.next() else {
        return Vec::new();
    };
    let mut selected = Vec::with_capacity(requested);

    for (idx, item) in iter.enumerate() {
        if idx == next_idx {
            selected.push(item);
            if let Some(i) = index_iterator.next() {
                next_idx = i;
            } else {
                break;
            }
        }
    }

    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    #[test]
    fn single_from_empty_is_none() {
        let mut rng = SmallRng::seed_from_u64(42);
        let empty: Vec<u32> = Vec::new();
        assert_eq!(sample_single_from_known_length(&mut rng, empty.iter()), None);
    }

    #[test]
    fn single_is_roughly_uniform() {
        let mut rng = SmallRng::seed_from_u64(42);
        let mut counts = [0usize; 4];
        for _ in 0..8000 {
            let i = sample_single_from_known_length(&mut rng, 0..4usize).unwrap();
            counts[i] += 1;
        }
        assert!(counts.iter().all(|&c| c > 1800 && c < 2200), "{counts:?}");
    }

    #[test]
    fn multiple_returns_distinct_items_in_order() {
        let mut rng = SmallRng::seed_from_u64(42);
        let items: Vec<u32> = (100..200).collect();
        let chosen = sample_multiple_from_known_length(&mut rng, items.iter().copied(), 20);
        assert_eq!(chosen.len(), 20);
        assert!(chosen.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn multiple_caps_at_length() {
        let mut rng = SmallRng::seed_from_u64(42);
        let chosen = sample_multiple_from_known_length(&mut rng, 0..3usize, 10);
        assert_eq!(chosen, vec![0, 1, 2]);
    }
}
