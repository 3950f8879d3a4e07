//! # Table Signatures
//!
//! Fixed-size bitsets over the property id space. A signature is both the
//! identity key of a table and the inclusion/exclusion mask of a filter.

use std::fmt;

use super::registry::PropertyId;

/// Number of 64-bit words in a signature.
pub const SIGNATURE_WORDS: usize = 4;

/// Upper bound on registered properties, set by the signature width.
pub const MAX_PROPERTIES: usize = SIGNATURE_WORDS * 64;

/// Bitset encoding of a property set.
///
/// Two signatures are equal iff the same bits are set, regardless of the
/// order the properties were supplied in.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct TableSignature {
    words: [u64; SIGNATURE_WORDS],
}

impl TableSignature {
    /// The empty signature.
    pub const EMPTY: Self = Self {
        words: [0; SIGNATURE_WORDS],
    };

    /// Builds a signature from a list of properties. Duplicates are ignored.
    #[must_use]
    pub fn from_properties(properties: &[PropertyId]) -> Self {
        properties.iter().copied().collect()
    }

    #[inline]
    fn locate(property: PropertyId) -> (usize, u64) {
        let bit = property.index();
        assert!(
            bit < MAX_PROPERTIES,
            "Property id {bit} does not fit in a {MAX_PROPERTIES}-bit signature"
        );
        (bit / 64, 1u64 << (bit % 64))
    }

    /// Sets the bit for `property`.
    #[inline]
    pub fn set(&mut self, property: PropertyId) {
        let (word, mask) = Self::locate(property);
        self.words[word] |= mask;
    }

    /// Clears the bit for `property`.
    #[inline]
    pub fn clear(&mut self, property: PropertyId) {
        let (word, mask) = Self::locate(property);
        self.words[word] &= !mask;
    }

    /// Flips the bit for `property`.
    #[inline]
    pub fn flip(&mut self, property: PropertyId) {
        let (word, mask) = Self::locate(property);
        self.words[word] ^= mask;
    }

    /// Checks whether the bit for `property` is set.
    #[inline]
    #[must_use]
    pub fn is_set(&self, property: PropertyId) -> bool {
        let (word, mask) = Self::locate(property);
        self.words[word] & mask != 0
    }

    /// Checks whether every bit of `other` is also set in `self`.
    #[inline]
    #[must_use]
    pub fn is_superset_of(&self, other: &Self) -> bool {
        self.words
            .iter()
            .zip(&other.words)
            .all(|(mine, theirs)| mine & theirs == *theirs)
    }

    /// Checks whether `self` and `other` share no bits.
    #[inline]
    #[must_use]
    pub fn is_disjoint(&self, other: &Self) -> bool {
        self.words
            .iter()
            .zip(&other.words)
            .all(|(mine, theirs)| mine & theirs == 0)
    }

    /// Superset of `inclusive` and disjoint from `exclusive`.
    #[inline]
    #[must_use]
    pub fn matches(&self, inclusive: &Self, exclusive: &Self) -> bool {
        self.is_superset_of(inclusive) && self.is_disjoint(exclusive)
    }

    /// Checks if no bits are set.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|w| *w == 0)
    }

    /// Returns the number of properties in the set.
    #[inline]
    #[must_use]
    pub fn count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Iterates over the set properties in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = PropertyId> + '_ {
        self.words.iter().enumerate().flat_map(|(word_idx, &word)| {
            let mut bits = word;
            std::iter::from_fn(move || {
                if bits == 0 {
                    return None;
                }
                let bit = bits.trailing_zeros() as usize;
                bits &= bits - 1;
                Some(PropertyId::from_index(word_idx * 64 + bit))
            })
        })
    }
}

impl FromIterator<PropertyId> for TableSignature {
    fn from_iter<I: IntoIterator<Item = PropertyId>>(iter: I) -> Self {
        let mut signature = Self::EMPTY;
        for property in iter {
            signature.set(property);
        }
        signature
    }
}

impl fmt::Debug for TableSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter().map(PropertyId::index)).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid(i: usize) -> PropertyId {
        PropertyId::from_index(i)
    }

    #[test]
    fn test_signature_order_independent() {
        let ab = TableSignature::from_properties(&[pid(1), pid(2)]);
        let ba = TableSignature::from_properties(&[pid(2), pid(1)]);
        assert_eq!(ab, ba);
    }

    #[test]
    fn test_signature_flip() {
        let mut sig = TableSignature::from_properties(&[pid(3)]);
        sig.flip(pid(70));
        assert!(sig.is_set(pid(70)));
        sig.flip(pid(3));
        assert!(!sig.is_set(pid(3)));
        assert_eq!(sig.count(), 1);
    }

    #[test]
    fn test_signature_superset_and_disjoint() {
        let abc = TableSignature::from_properties(&[pid(0), pid(1), pid(200)]);
        let ab = TableSignature::from_properties(&[pid(0), pid(1)]);
        let c = TableSignature::from_properties(&[pid(200)]);

        assert!(abc.is_superset_of(&ab));
        assert!(!ab.is_superset_of(&abc));
        assert!(ab.is_disjoint(&c));
        assert!(!abc.is_disjoint(&c));
        assert!(ab.matches(&ab, &c));
        assert!(!abc.matches(&ab, &c));
    }

    #[test]
    fn test_signature_iter_ascending() {
        let sig = TableSignature::from_properties(&[pid(130), pid(5), pid(64)]);
        let ids: Vec<usize> = sig.iter().map(PropertyId::index).collect();
        assert_eq!(ids, vec![5, 64, 130]);
    }

    #[test]
    fn test_empty_signature_is_subset_of_everything() {
        let sig = TableSignature::from_properties(&[pid(9)]);
        assert!(sig.is_superset_of(&TableSignature::EMPTY));
        assert!(TableSignature::EMPTY.is_empty());
    }

    #[test]
    #[should_panic(expected = "does not fit")]
    fn test_signature_out_of_range() {
        let mut sig = TableSignature::EMPTY;
        sig.set(pid(MAX_PROPERTIES));
    }
}
