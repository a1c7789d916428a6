//! Bit-vector Sets of Interned Items
//!
//! A [`BitSet`] stores interned items as bits in a growable array of 64-bit
//! words; item `i` lives at bit `i % 64` of word `i / 64`. Set algebra
//! between two word arrays is word-parallel. Anything else that implements
//! [`ItemSet`] goes through the element-wise fallback.
//!
//! The word array only grows. `remove` and the in-place operations clear
//! bits but never release words; only [`BitSet::clear`] does.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

use smallvec::SmallVec;

use crate::pseudo_class::{Interned, PseudoClass, StyleClass};

/// Set of pseudo-classes (node state, selector requirements)
pub type PseudoClassSet = BitSet<PseudoClass>;

/// Set of style-classes (node classification, selector requirements)
pub type StyleClassSet = BitSet<StyleClass>;

const WORD_BITS: usize = 64;

/// Read access shared by every set of interned items
pub trait ItemSet<T: Interned> {
    /// The packed word array, for representations that have one.
    /// Returning `Some` enables the word-parallel fast path.
    fn words(&self) -> Option<&[u64]> {
        None
    }

    fn contains_item(&self, item: T) -> bool;

    fn for_each_item(&self, f: &mut dyn FnMut(T));
}

/// Growable bit-vector set
pub struct BitSet<T> {
    words: SmallVec<[u64; 2]>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Interned> BitSet<T> {
    pub fn new() -> Self {
        Self {
            words: SmallVec::new(),
            _marker: PhantomData,
        }
    }

    /// Build a set directly from packed words
    pub fn from_words(words: &[u64]) -> Self {
        Self {
            words: SmallVec::from_slice(words),
            _marker: PhantomData,
        }
    }

    #[inline]
    fn position(item: T) -> (usize, u64) {
        let index = item.index();
        (index / WORD_BITS, 1u64 << (index % WORD_BITS))
    }

    /// Add an item. Returns true if it was not already present.
    pub fn add(&mut self, item: T) -> bool {
        let (word, bit) = Self::position(item);
        if word >= self.words.len() {
            self.words.resize(word + 1, 0);
        }
        let was_set = self.words[word] & bit != 0;
        self.words[word] |= bit;
        !was_set
    }

    /// Remove an item. Returns true if it was present.
    pub fn remove(&mut self, item: T) -> bool {
        let (word, bit) = Self::position(item);
        match self.words.get_mut(word) {
            Some(w) if *w & bit != 0 => {
                *w &= !bit;
                true
            }
            _ => false,
        }
    }

    #[inline]
    pub fn contains(&self, item: T) -> bool {
        let (word, bit) = Self::position(item);
        self.words.get(word).is_some_and(|w| w & bit != 0)
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    pub fn len(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Drop every item and release the word array
    pub fn clear(&mut self) {
        self.words = SmallVec::new();
    }

    /// Packed words, including any trailing zero words
    pub fn as_words(&self) -> &[u64] {
        &self.words
    }

    /// Words with trailing zero words trimmed, for keys and equality
    fn significant_words(&self) -> &[u64] {
        let len = self
            .words
            .iter()
            .rposition(|&w| w != 0)
            .map_or(0, |last| last + 1);
        &self.words[..len]
    }

    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            words: &self.words,
            word: 0,
            current: self.words.first().copied().unwrap_or(0),
            _marker: PhantomData,
        }
    }

    /// Add every item of `other` to this set
    pub fn add_all<S: ItemSet<T> + ?Sized>(&mut self, other: &S) {
        match other.words() {
            Some(words) => {
                if words.len() > self.words.len() {
                    self.words.resize(words.len(), 0);
                }
                for (dst, src) in self.words.iter_mut().zip(words) {
                    *dst |= *src;
                }
            }
            None => other.for_each_item(&mut |item| {
                self.add(item);
            }),
        }
    }

    /// Keep only the items also in `other`
    pub fn retain_all<S: ItemSet<T> + ?Sized>(&mut self, other: &S) {
        match other.words() {
            Some(words) => {
                for (i, dst) in self.words.iter_mut().enumerate() {
                    *dst &= words.get(i).copied().unwrap_or(0);
                }
            }
            None => {
                let doomed: Vec<T> =
                    self.iter().filter(|&item| !other.contains_item(item)).collect();
                for item in doomed {
                    self.remove(item);
                }
            }
        }
    }

    /// Remove every item of `other` from this set
    pub fn remove_all<S: ItemSet<T> + ?Sized>(&mut self, other: &S) {
        match other.words() {
            Some(words) => {
                for (dst, src) in self.words.iter_mut().zip(words) {
                    *dst &= !*src;
                }
            }
            None => other.for_each_item(&mut |item| {
                self.remove(item);
            }),
        }
    }

    /// True if every item of `other` is in this set
    pub fn contains_all<S: ItemSet<T> + ?Sized>(&self, other: &S) -> bool {
        match other.words() {
            Some(words) => words.iter().enumerate().all(|(i, &src)| {
                let dst = self.words.get(i).copied().unwrap_or(0);
                src & !dst == 0
            }),
            None => {
                let mut all = true;
                other.for_each_item(&mut |item| all &= self.contains(item));
                all
            }
        }
    }

    /// True if every item of this set is in `other`
    pub fn is_subset_of<S: ItemSet<T> + ?Sized>(&self, other: &S) -> bool {
        match other.words() {
            Some(words) => self.words.iter().enumerate().all(|(i, &src)| {
                let dst = words.get(i).copied().unwrap_or(0);
                src & !dst == 0
            }),
            None => self.iter().all(|item| other.contains_item(item)),
        }
    }

    pub fn is_superset_of<S: ItemSet<T> + ?Sized>(&self, other: &S) -> bool {
        self.contains_all(other)
    }

    /// New set holding the items of both sets
    pub fn union(&self, other: &Self) -> Self {
        let mut out = self.clone();
        out.add_all(other);
        out
    }

    /// New set holding the items common to both sets
    pub fn intersect(&self, other: &Self) -> Self {
        let mut out = self.clone();
        out.retain_all(other);
        out
    }
}

impl<T: Interned> Default for BitSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for BitSet<T> {
    fn clone(&self) -> Self {
        Self {
            words: self.words.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: Interned> PartialEq for BitSet<T> {
    fn eq(&self, other: &Self) -> bool {
        self.significant_words() == other.significant_words()
    }
}

impl<T: Interned> Eq for BitSet<T> {}

impl<T: Interned> Hash for BitSet<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.significant_words().hash(state);
    }
}

impl<T: Interned + fmt::Display> fmt::Debug for BitSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter().map(|item| item.to_string())).finish()
    }
}

impl<T: Interned> FromIterator<T> for BitSet<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut set = Self::new();
        for item in iter {
            set.add(item);
        }
        set
    }
}

impl<T: Interned> Extend<T> for BitSet<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for item in iter {
            self.add(item);
        }
    }
}

impl<T: Interned> ItemSet<T> for BitSet<T> {
    fn words(&self) -> Option<&[u64]> {
        Some(&self.words)
    }

    fn contains_item(&self, item: T) -> bool {
        self.contains(item)
    }

    fn for_each_item(&self, f: &mut dyn FnMut(T)) {
        for item in self.iter() {
            f(item);
        }
    }
}

impl<T: Interned> ItemSet<T> for [T] {
    fn contains_item(&self, item: T) -> bool {
        self.contains(&item)
    }

    fn for_each_item(&self, f: &mut dyn FnMut(T)) {
        for &item in self {
            f(item);
        }
    }
}

/// Iterator over the items of a [`BitSet`], in index order
pub struct Iter<'a, T> {
    words: &'a [u64],
    word: usize,
    current: u64,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Interned> Iterator for Iter<'_, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        loop {
            if self.current != 0 {
                let bit = self.current.trailing_zeros() as usize;
                self.current &= self.current - 1;
                return Some(T::from_index(self.word * WORD_BITS + bit));
            }
            self.word += 1;
            self.current = *self.words.get(self.word)?;
        }
    }
}

impl<'a, T: Interned> IntoIterator for &'a BitSet<T> {
    type Item = T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
