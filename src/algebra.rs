//! Mapper and combiner contracts.
//!
//! The engine never looks inside an aggregate. It only relies on the
//! combiner forming a commutative monoid:
//!
//! - `combine(a, combine(b, c)) == combine(combine(a, b), c)`
//! - `combine(a, b) == combine(b, a)`
//! - `combine(a, identity()) == a`
//!
//! Partitioning and tree reduction regroup partial aggregates freely, so a
//! combiner that breaks these laws produces implementation-defined results.
//! Upholding them is the caller's obligation.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::hash::Hash;
use std::marker::PhantomData;

use crate::error::TaskResult;

/// Turns one work item into a partial aggregate.
///
/// Implemented for every `Fn(&I) -> TaskResult<A>`; use [`infallible`] for
/// closures that cannot fail.
pub trait Mapper<I, A>: Send + Sync + 'static {
    fn map(&self, item: &I) -> TaskResult<A>;
}

impl<I, A, F> Mapper<I, A> for F
where
    F: Fn(&I) -> TaskResult<A> + Send + Sync + 'static,
{
    fn map(&self, item: &I) -> TaskResult<A> {
        self(item)
    }
}

/// Adapter for mappers that never fail. Created by [`infallible`].
#[derive(Debug, Clone, Copy)]
pub struct Infallible<F>(pub F);

impl<I, A, F> Mapper<I, A> for Infallible<F>
where
    F: Fn(&I) -> A + Send + Sync + 'static,
{
    fn map(&self, item: &I) -> TaskResult<A> {
        Ok((self.0)(item))
    }
}

/// Wrap a plain `Fn(&I) -> A` as a [`Mapper`].
///
/// ```rust
/// use parallel_mapreduce::algebra::{infallible, Mapper};
///
/// let square = infallible(|x: &u64| x * x);
/// assert_eq!(square.map(&7).unwrap(), 49);
/// ```
pub fn infallible<F>(f: F) -> Infallible<F> {
    Infallible(f)
}

/// Associative, commutative merge with an identity element.
pub trait Combiner<A>: Send + Sync + 'static {
    /// The neutral element; empty partitions reduce to this.
    fn identity(&self) -> A;

    /// Merge two partial aggregates.
    fn combine(&self, left: A, right: A) -> TaskResult<A>;
}

/// Fold a sequence with a combiner, sequentially.
///
/// Seeds from the first element; only an empty sequence yields the identity.
/// Returns the position of the element whose merge failed alongside the error.
pub fn fold_all<A, C>(
    combiner: &C,
    values: impl IntoIterator<Item = A>,
) -> std::result::Result<A, (usize, crate::error::BoxError)>
where
    C: Combiner<A> + ?Sized,
{
    let mut iter = values.into_iter();
    let Some(mut acc) = iter.next() else {
        return Ok(combiner.identity());
    };
    for (offset, value) in iter.enumerate() {
        acc = combiner.combine(acc, value).map_err(|e| (offset + 1, e))?;
    }
    Ok(acc)
}

/// A type with a lawful, infallible combine and an identity.
///
/// Implementing this is the quickest way to get a [`Combiner`]: see
/// [`MonoidCombiner`].
pub trait Monoid: Sized {
    fn empty() -> Self;
    fn combine(self, other: Self) -> Self;
}

/// [`Combiner`] for any [`Monoid`] type.
pub struct MonoidCombiner<A>(PhantomData<fn() -> A>);

impl<A> MonoidCombiner<A> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<A> Default for MonoidCombiner<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> Clone for MonoidCombiner<A> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<A> Combiner<A> for MonoidCombiner<A>
where
    A: Monoid + 'static,
{
    fn identity(&self) -> A {
        A::empty()
    }

    fn combine(&self, left: A, right: A) -> TaskResult<A> {
        Ok(left.combine(right))
    }
}

/// [`Combiner`] built from an identity constructor and a merge closure.
pub struct FnCombiner<Id, F> {
    identity: Id,
    combine: F,
}

/// Build a [`Combiner`] from closures.
///
/// ```rust
/// use parallel_mapreduce::algebra::{combiner_fn, Combiner};
///
/// let sum = combiner_fn(|| 0u64, |a, b| Ok(a + b));
/// assert_eq!(sum.combine(2, 3).unwrap(), 5);
/// assert_eq!(sum.identity(), 0);
/// ```
pub fn combiner_fn<A, Id, F>(identity: Id, combine: F) -> FnCombiner<Id, F>
where
    Id: Fn() -> A + Send + Sync + 'static,
    F: Fn(A, A) -> TaskResult<A> + Send + Sync + 'static,
{
    FnCombiner { identity, combine }
}

impl<A, Id, F> Combiner<A> for FnCombiner<Id, F>
where
    Id: Fn() -> A + Send + Sync + 'static,
    F: Fn(A, A) -> TaskResult<A> + Send + Sync + 'static,
{
    fn identity(&self) -> A {
        (self.identity)()
    }

    fn combine(&self, left: A, right: A) -> TaskResult<A> {
        (self.combine)(left, right)
    }
}

impl Monoid for () {
    fn empty() -> Self {}

    fn combine(self, _other: Self) -> Self {}
}

impl<A: Monoid, B: Monoid> Monoid for (A, B) {
    fn empty() -> Self {
        (A::empty(), B::empty())
    }

    fn combine(self, other: Self) -> Self {
        (self.0.combine(other.0), self.1.combine(other.1))
    }
}

impl<T: Eq + Hash> Monoid for HashSet<T> {
    fn empty() -> Self {
        HashSet::new()
    }

    fn combine(mut self, other: Self) -> Self {
        if self.len() < other.len() {
            return other.combine(self);
        }
        self.extend(other);
        self
    }
}

impl<T: Ord> Monoid for BTreeSet<T> {
    fn empty() -> Self {
        BTreeSet::new()
    }

    fn combine(mut self, mut other: Self) -> Self {
        self.append(&mut other);
        self
    }
}

/// Key-wise merge; values under the same key are combined.
impl<K: Eq + Hash, V: Monoid> Monoid for HashMap<K, V> {
    fn empty() -> Self {
        HashMap::new()
    }

    fn combine(mut self, other: Self) -> Self {
        for (key, value) in other {
            let merged = match self.remove(&key) {
                Some(existing) => existing.combine(value),
                None => value,
            };
            self.insert(key, merged);
        }
        self
    }
}

/// Key-wise merge; values under the same key are combined.
impl<K: Ord, V: Monoid> Monoid for BTreeMap<K, V> {
    fn empty() -> Self {
        BTreeMap::new()
    }

    fn combine(mut self, other: Self) -> Self {
        for (key, value) in other {
            let merged = match self.remove(&key) {
                Some(existing) => existing.combine(value),
                None => value,
            };
            self.insert(key, merged);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct Count(u64);

    impl Monoid for Count {
        fn empty() -> Self {
            Count(0)
        }

        fn combine(self, other: Self) -> Self {
            Count(self.0 + other.0)
        }
    }

    #[test]
    fn fold_all_of_nothing_is_identity() {
        let sum = combiner_fn(|| 10u32, |a, b| Ok(a + b));
        assert_eq!(fold_all(&sum, Vec::<u32>::new()).unwrap(), 10);
        // seeded from the first element, identity is not mixed in
        assert_eq!(fold_all(&sum, vec![1, 2, 3]).unwrap(), 6);
    }

    #[test]
    fn fold_all_reports_failing_position() {
        let picky = combiner_fn(
            || 0i32,
            |a: i32, b: i32| {
                if b < 0 {
                    Err("negative".into())
                } else {
                    Ok(a + b)
                }
            },
        );
        let (pos, err) = fold_all(&picky, vec![1, 2, -1, 4]).unwrap_err();
        assert_eq!(pos, 2);
        assert_eq!(err.to_string(), "negative");
    }

    #[test]
    fn map_monoid_merges_shared_keys() {
        let left: HashMap<&str, BTreeSet<u32>> =
            HashMap::from([("a", BTreeSet::from([1])), ("b", BTreeSet::from([1]))]);
        let right: HashMap<&str, BTreeSet<u32>> = HashMap::from([("a", BTreeSet::from([2]))]);

        let merged = left.combine(right);
        assert_eq!(merged["a"], BTreeSet::from([1, 2]));
        assert_eq!(merged["b"], BTreeSet::from([1]));
    }

    #[test]
    fn monoid_combiner_delegates() {
        let combiner = MonoidCombiner::<(Count, Count)>::new();
        assert_eq!(combiner.identity(), (Count(0), Count(0)));
        let merged = combiner
            .combine((Count(1), Count(2)), (Count(3), Count(4)))
            .unwrap();
        assert_eq!(merged, (Count(4), Count(6)));
    }

    #[test]
    fn closures_are_mappers() {
        let fallible = |x: &i32| -> TaskResult<i32> {
            if *x == 0 {
                Err("zero".into())
            } else {
                Ok(100 / x)
            }
        };
        assert_eq!(fallible.map(&4).unwrap(), 25);
        assert!(fallible.map(&0).is_err());
    }

    proptest! {
        #[test]
        fn set_union_is_associative_and_commutative(
            a in prop::collection::btree_set(0u8..32, 0..8),
            b in prop::collection::btree_set(0u8..32, 0..8),
            c in prop::collection::btree_set(0u8..32, 0..8),
        ) {
            let left = a.clone().combine(b.clone()).combine(c.clone());
            let right = a.clone().combine(b.clone().combine(c.clone()));
            prop_assert_eq!(&left, &right);
            prop_assert_eq!(a.clone().combine(b.clone()), b.clone().combine(a.clone()));
            prop_assert_eq!(a.clone().combine(BTreeSet::empty()), a);
        }

        #[test]
        fn map_merge_is_associative(
            a in prop::collection::hash_map(0u8..8, prop::collection::hash_set(0u8..16, 0..4), 0..6),
            b in prop::collection::hash_map(0u8..8, prop::collection::hash_set(0u8..16, 0..4), 0..6),
            c in prop::collection::hash_map(0u8..8, prop::collection::hash_set(0u8..16, 0..4), 0..6),
        ) {
            let left = a.clone().combine(b.clone()).combine(c.clone());
            let right = a.combine(b.combine(c));
            prop_assert_eq!(left, right);
        }
    }
}
