use std::collections::BTreeMap;

use ndarray::Array1;

/// A fixed-dimension vector of `f64` values.
///
/// Storage is either dense (every slot physically present) or sparse (a
/// sorted map of explicitly set entries over a shared default value). All
/// operations observe dense semantics: an unset sparse slot reads as the
/// default. The dimension is fixed at construction and never changes.
#[derive(Debug, Clone)]
pub struct Vector {
    dimension: usize,
    storage: Storage,
}

#[derive(Debug, Clone)]
pub(crate) enum Storage {
    Dense(Array1<f64>),
    Sparse {
        default: f64,
        entries: BTreeMap<usize, f64>,
    },
}

impl Vector {
    /// Creates a dense vector of zeros.
    pub fn dense(dimension: usize) -> Self {
        Self {
            dimension,
            storage: Storage::Dense(Array1::zeros(dimension)),
        }
    }

    /// Creates a sparse vector with a default value of zero.
    pub fn sparse(dimension: usize) -> Self {
        Self::sparse_with_default(dimension, 0.0)
    }

    /// Creates a sparse vector whose unset slots all read as `default`.
    pub fn sparse_with_default(dimension: usize, default: f64) -> Self {
        Self {
            dimension,
            storage: Storage::Sparse {
                default,
                entries: BTreeMap::new(),
            },
        }
    }

    pub(crate) fn from_array(values: Array1<f64>) -> Self {
        Self {
            dimension: values.len(),
            storage: Storage::Dense(values),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn is_sparse(&self) -> bool {
        matches!(self.storage, Storage::Sparse { .. })
    }

    pub(crate) fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Returns the value at `index`.
    ///
    /// # Panics
    /// If `index >= dimension`.
    pub fn get(&self, index: usize) -> f64 {
        self.check_index(index);
        match &self.storage {
            Storage::Dense(values) => values[index],
            Storage::Sparse { default, entries } => {
                entries.get(&index).copied().unwrap_or(*default)
            }
        }
    }

    /// Writes `value` at `index`. Sparse vectors record the entry even when
    /// it equals the default.
    ///
    /// # Panics
    /// If `index >= dimension`.
    pub fn set(&mut self, index: usize, value: f64) {
        self.check_index(index);
        match &mut self.storage {
            Storage::Dense(values) => values[index] = value,
            Storage::Sparse { entries, .. } => {
                entries.insert(index, value);
            }
        }
    }

    /// Applies `f` to every slot, producing a vector of the same sparsity
    /// class. A sparse result's default is `f(old default)`, and `f` touches
    /// only the stored entries; this is exact because `f` is uniform over
    /// slots.
    pub fn map(&self, f: impl Fn(f64) -> f64) -> Self {
        let storage = match &self.storage {
            Storage::Dense(values) => Storage::Dense(values.mapv(&f)),
            Storage::Sparse { default, entries } => Storage::Sparse {
                default: f(*default),
                entries: entries.iter().map(|(i, v)| (*i, f(*v))).collect(),
            },
        };
        Self {
            dimension: self.dimension,
            storage,
        }
    }

    /// Combines two vectors elementwise: the result holds
    /// `f(self.get(i), other.get(i))` at every index.
    ///
    /// When both operands are sparse the stored entries are walked with a
    /// two-pointer merge in index order, gaps filled against the opposite
    /// default, so no full-dimension pass is made. Any dense operand makes
    /// the result dense.
    ///
    /// # Panics
    /// If the dimensions differ.
    pub fn zip_with(&self, other: &Vector, f: impl Fn(f64, f64) -> f64) -> Self {
        assert_eq!(
            self.dimension, other.dimension,
            "cannot combine vectors of dimension {} and {}",
            self.dimension, other.dimension
        );
        match (&self.storage, &other.storage) {
            (
                Storage::Sparse {
                    default: da,
                    entries: ea,
                },
                Storage::Sparse {
                    default: db,
                    entries: eb,
                },
            ) => {
                let default = f(*da, *db);
                let mut entries = BTreeMap::new();
                let mut a = ea.iter().map(|(&i, &v)| (i, v)).peekable();
                let mut b = eb.iter().map(|(&i, &v)| (i, v)).peekable();
                loop {
                    let (index, value, both) = match (a.peek().copied(), b.peek().copied()) {
                        (Some((ia, va)), Some((ib, vb))) => {
                            if ia < ib {
                                a.next();
                                (ia, f(va, *db), false)
                            } else if ib < ia {
                                b.next();
                                (ib, f(*da, vb), false)
                            } else {
                                a.next();
                                b.next();
                                (ia, f(va, vb), true)
                            }
                        }
                        (Some((ia, va)), None) => {
                            a.next();
                            (ia, f(va, *db), false)
                        }
                        (None, Some((ib, vb))) => {
                            b.next();
                            (ib, f(*da, vb), false)
                        }
                        (None, None) => break,
                    };
                    // Gap-filled slots were never explicitly set, so they
                    // stay unstored when they land on the default.
                    if both || value != default {
                        entries.insert(index, value);
                    }
                }
                Self {
                    dimension: self.dimension,
                    storage: Storage::Sparse { default, entries },
                }
            }
            _ => Self::from_array(
                self.iter()
                    .zip(other.iter())
                    .map(|((_, a), (_, b))| f(a, b))
                    .collect(),
            ),
        }
    }

    /// Dot product, equal to `sum_i self.get(i) * other.get(i)`. Sparse
    /// operands contribute their defaults in bulk rather than slot by slot.
    ///
    /// # Panics
    /// If the dimensions differ.
    pub fn dot(&self, other: &Vector) -> f64 {
        assert_eq!(
            self.dimension, other.dimension,
            "cannot dot vectors of dimension {} and {}",
            self.dimension, other.dimension
        );
        match (&self.storage, &other.storage) {
            (Storage::Dense(a), Storage::Dense(b)) => a.dot(b),
            (
                Storage::Sparse {
                    default: da,
                    entries: ea,
                },
                Storage::Sparse {
                    default: db,
                    entries: eb,
                },
            ) => {
                let mut sum = 0.0;
                let mut visited = 0usize;
                let mut a = ea.iter().map(|(&i, &v)| (i, v)).peekable();
                let mut b = eb.iter().map(|(&i, &v)| (i, v)).peekable();
                loop {
                    let product = match (a.peek().copied(), b.peek().copied()) {
                        (Some((ia, va)), Some((ib, vb))) => {
                            if ia < ib {
                                a.next();
                                va * *db
                            } else if ib < ia {
                                b.next();
                                *da * vb
                            } else {
                                a.next();
                                b.next();
                                va * vb
                            }
                        }
                        (Some((_, va)), None) => {
                            a.next();
                            va * *db
                        }
                        (None, Some((_, vb))) => {
                            b.next();
                            *da * vb
                        }
                        (None, None) => break,
                    };
                    visited += 1;
                    sum += product;
                }
                sum + (self.dimension - visited) as f64 * *da * *db
            }
            (Storage::Sparse { default, entries }, Storage::Dense(dense))
            | (Storage::Dense(dense), Storage::Sparse { default, entries }) => {
                let mut sum = default * dense.sum();
                for (&i, &v) in entries {
                    sum += (v - default) * dense[i];
                }
                sum
            }
        }
    }

    /// Returns the sub-vector over the half-open range `[start, end)`, of
    /// the same sparsity class.
    ///
    /// # Panics
    /// If `start > end` or `end > dimension`.
    pub fn slice(&self, start: usize, end: usize) -> Self {
        assert!(
            start <= end && end <= self.dimension,
            "slice [{start}, {end}) out of range for vector of dimension {}",
            self.dimension
        );
        let storage = match &self.storage {
            Storage::Dense(values) => {
                Storage::Dense(values.slice(ndarray::s![start..end]).to_owned())
            }
            Storage::Sparse { default, entries } => Storage::Sparse {
                default: *default,
                entries: entries
                    .range(start..end)
                    .map(|(i, v)| (i - start, *v))
                    .collect(),
            },
        };
        Self {
            dimension: end - start,
            storage,
        }
    }

    /// Returns the first `length` slots, i.e. `slice(0, length)`.
    pub fn slice_to(&self, length: usize) -> Self {
        self.slice(0, length)
    }

    /// Iterates every index from 0 to dimension in order, unset sparse
    /// slots yielding the default. Lazy and restartable.
    pub fn iter(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        (0..self.dimension).map(move |i| (i, self.get(i)))
    }

    /// Iterates only the indices whose stored value differs from the
    /// default, in ascending order. A dense vector has no default, so every
    /// slot qualifies.
    pub fn iter_stored(&self) -> Box<dyn Iterator<Item = (usize, f64)> + '_> {
        match &self.storage {
            Storage::Dense(values) => Box::new(values.iter().copied().enumerate()),
            Storage::Sparse { default, entries } => Box::new(
                entries
                    .iter()
                    .filter(move |(_, v)| **v != *default)
                    .map(|(i, v)| (*i, *v)),
            ),
        }
    }

    pub fn sum(&self) -> f64 {
        match &self.storage {
            Storage::Dense(values) => values.sum(),
            Storage::Sparse { default, entries } => {
                let stored: f64 = entries.values().sum();
                stored + (self.dimension - entries.len()) as f64 * default
            }
        }
    }

    /// Densifies into an owned array.
    pub fn to_array(&self) -> Array1<f64> {
        match &self.storage {
            Storage::Dense(values) => values.clone(),
            Storage::Sparse { .. } => self.iter().map(|(_, v)| v).collect(),
        }
    }

    pub fn to_vec(&self) -> Vec<f64> {
        self.iter().map(|(_, v)| v).collect()
    }

    fn check_index(&self, index: usize) {
        assert!(
            index < self.dimension,
            "index {index} out of range for vector of dimension {}",
            self.dimension
        );
    }
}

impl From<Vec<f64>> for Vector {
    fn from(values: Vec<f64>) -> Self {
        Self::from_array(Array1::from_vec(values))
    }
}

/// Equality is over dense semantics: same dimension and same value at every
/// index, regardless of how either side is stored.
impl PartialEq for Vector {
    fn eq(&self, other: &Self) -> bool {
        self.dimension == other.dimension
            && self
                .iter()
                .zip(other.iter())
                .all(|((_, a), (_, b))| a == b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sparse_from(dimension: usize, default: f64, entries: &[(usize, f64)]) -> Vector {
        let mut v = Vector::sparse_with_default(dimension, default);
        for &(i, value) in entries {
            v.set(i, value);
        }
        v
    }

    #[test]
    fn get_returns_default_for_unset_sparse_slots() {
        let v = sparse_from(5, 2.5, &[(1, 7.0)]);
        assert_eq!(v.get(0), 2.5);
        assert_eq!(v.get(1), 7.0);
        assert_eq!(v.get(4), 2.5);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn get_past_dimension_panics() {
        Vector::dense(3).get(3);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn set_past_dimension_panics() {
        Vector::sparse(3).set(3, 1.0);
    }

    #[test]
    fn map_identity_is_identity() {
        let dense = Vector::from(vec![1.0, -2.0, 0.0, 4.5]);
        let sparse = sparse_from(4, 0.5, &[(2, 3.0)]);
        assert_eq!(dense.map(|x| x), dense);
        assert_eq!(sparse.map(|x| x), sparse);
    }

    #[test]
    fn map_rewrites_the_sparse_default() {
        let v = sparse_from(4, 1.0, &[(0, 3.0)]);
        let doubled = v.map(|x| x * 2.0);
        assert!(doubled.is_sparse());
        assert_eq!(doubled.get(0), 6.0);
        assert_eq!(doubled.get(3), 2.0);
    }

    #[test]
    fn zip_with_plus_matches_per_index_sum() {
        let dense = Vector::from(vec![1.0, 2.0, 3.0, 4.0, 5.0]);
        let sparse = sparse_from(5, -1.0, &[(1, 10.0), (3, 0.0)]);
        for (a, b) in [(&dense, &sparse), (&sparse, &dense)] {
            let sum = a.zip_with(b, |x, y| x + y);
            for i in 0..5 {
                assert_eq!(sum.get(i), a.get(i) + b.get(i), "index {i}");
            }
        }
    }

    #[test]
    fn zip_with_is_operand_order_insensitive() {
        let a = sparse_from(6, 2.0, &[(0, 1.0), (4, 5.0)]);
        let b = sparse_from(6, 3.0, &[(2, 8.0), (4, -1.0)]);
        assert_eq!(a.zip_with(&b, |x, y| x + y), b.zip_with(&a, |x, y| x + y));
        assert_eq!(a.zip_with(&b, |x, y| x * y), b.zip_with(&a, |x, y| x * y));
    }

    #[test]
    fn zip_with_of_two_sparse_vectors_stays_sparse() {
        let a = sparse_from(100, 1.0, &[(7, 2.0)]);
        let b = sparse_from(100, 2.0, &[(9, 5.0)]);
        let sum = a.zip_with(&b, |x, y| x + y);
        assert!(sum.is_sparse());
        assert_eq!(sum.get(0), 3.0);
        assert_eq!(sum.get(7), 4.0);
        assert_eq!(sum.get(9), 6.0);
    }

    #[test]
    fn dot_agrees_with_naive_loop_across_storage_classes() {
        let dense = Vector::from(vec![1.0, 0.0, -2.0, 3.0, 0.5, 0.0]);
        let sparse = sparse_from(6, 0.5, &[(0, 2.0), (3, 0.0), (5, 4.0)]);
        let naive: f64 = (0..6).map(|i| dense.get(i) * sparse.get(i)).sum();
        assert_eq!(dense.dot(&sparse), naive);
        assert_eq!(sparse.dot(&dense), naive);

        let other = sparse_from(6, 2.0, &[(1, 1.0), (3, 3.0)]);
        let naive: f64 = (0..6).map(|i| sparse.get(i) * other.get(i)).sum();
        assert!((sparse.dot(&other) - naive).abs() < 1e-12);
        assert!((other.dot(&sparse) - naive).abs() < 1e-12);
    }

    #[test]
    fn dot_of_all_default_vectors_is_zero() {
        let a = Vector::sparse(8);
        let b = Vector::dense(8);
        assert_eq!(a.dot(&b), 0.0);
        assert_eq!(a.dot(&Vector::sparse(8)), 0.0);
    }

    #[test]
    fn slice_is_half_open() {
        let v = Vector::from(vec![0.0, 1.0, 2.0, 3.0, 4.0]);
        let s = v.slice(1, 4);
        assert_eq!(s.dimension(), 3);
        assert_eq!(s.to_vec(), vec![1.0, 2.0, 3.0]);
        assert_eq!(v.slice_to(2).to_vec(), vec![0.0, 1.0]);
        assert_eq!(v.slice(2, 2).dimension(), 0);
    }

    #[test]
    fn slice_reindexes_sparse_entries() {
        let v = sparse_from(10, 9.0, &[(2, 1.0), (5, 2.0), (8, 3.0)]);
        let s = v.slice(2, 8);
        assert!(s.is_sparse());
        assert_eq!(s.get(0), 1.0);
        assert_eq!(s.get(3), 2.0);
        assert_eq!(s.get(1), 9.0);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn slice_past_dimension_panics() {
        Vector::dense(4).slice(1, 5);
    }

    #[test]
    fn iter_covers_every_index_in_order() {
        let v = sparse_from(4, 1.5, &[(2, 8.0)]);
        let pairs: Vec<_> = v.iter().collect();
        assert_eq!(pairs, vec![(0, 1.5), (1, 1.5), (2, 8.0), (3, 1.5)]);
        // restartable
        assert_eq!(v.iter().count(), 4);
    }

    #[test]
    fn iter_stored_skips_entries_equal_to_the_default() {
        let mut v = Vector::sparse_with_default(5, 1.0);
        v.set(1, 4.0);
        v.set(3, 1.0); // recorded, but indistinguishable from the default
        let stored: Vec<_> = v.iter_stored().collect();
        assert_eq!(stored, vec![(1, 4.0)]);
    }

    #[test]
    fn dense_and_sparse_with_same_content_compare_equal() {
        let dense = Vector::from(vec![0.5, 0.5, 2.0]);
        let sparse = sparse_from(3, 0.5, &[(2, 2.0)]);
        assert_eq!(dense, sparse);
    }
}
