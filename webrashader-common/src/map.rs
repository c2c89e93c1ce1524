/// Fast optimized hash map type for small sets, such as per-pass uniform tables.
pub type FastHashMap<K, V> =
    halfbrown::SizedHashMap<K, V, core::hash::BuildHasherDefault<rustc_hash::FxHasher>, 32>;

/// A string with small string optimizations up to 23 bytes.
///
/// Almost every uniform, sampler and parameter name in a preset fits inline.
pub type ShortString = smartstring::SmartString<smartstring::LazyCompact>;
