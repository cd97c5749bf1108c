//! Iterator helpers.

use std::iter::Zip;

/// Like [`Iterator::zip`], but panics when the two sides differ in length.
///
/// Network outputs are copied into preallocated landmark buffers with this, so a mismatched tensor
/// shape shows up as a panic instead of silently truncated data.
#[track_caller]
pub fn zip_exact<A, B>(a: A, b: B) -> Zip<A::IntoIter, B::IntoIter>
where
    A: IntoIterator,
    B: IntoIterator,
    A::IntoIter: ExactSizeIterator,
    B::IntoIter: ExactSizeIterator,
{
    let (a, b) = (a.into_iter(), b.into_iter());
    assert_eq!(
        a.len(),
        b.len(),
        "`zip_exact` called on iterators with different lengths"
    );
    a.zip(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zips_equal_lengths() {
        let pairs = zip_exact([1, 2, 3], ['a', 'b', 'c']).collect::<Vec<_>>();
        assert_eq!(pairs, [(1, 'a'), (2, 'b'), (3, 'c')]);
    }

    #[test]
    #[should_panic(expected = "different lengths")]
    fn panics_on_length_mismatch() {
        zip_exact([1, 2, 3], [1.0]).for_each(drop);
    }
}
