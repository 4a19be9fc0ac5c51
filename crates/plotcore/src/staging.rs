use crate::COORDS_PER_VERTEX;

/// Capacity (in floats) of a freshly created staging cache.
pub const DEFAULT_STAGING_FLOATS: usize = 120;

/// Growth factor applied whenever an append would overflow the cache.
const GROWTH_FACTOR: f64 = 1.125;

/// Growable host-side array that accumulates vertices until the next flush.
///
/// The cache only ever holds whole vertices: appends are typed as
/// `[f32; 3]` triples, so `len()` is always a multiple of
/// [`COORDS_PER_VERTEX`].
#[derive(Debug, Clone)]
pub struct StagingCache {
    data: Vec<f32>,
    len: usize,
}

impl StagingCache {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_STAGING_FLOATS)
    }

    /// Creates a cache able to hold `floats` coordinates before growing.
    pub fn with_capacity(floats: usize) -> Self {
        Self {
            data: vec![0.0; round_to_vertex(floats)],
            len: 0,
        }
    }

    /// Stages `vertices` after any previously appended data.
    pub fn append(&mut self, vertices: &[[f32; COORDS_PER_VERTEX]]) {
        let coords: &[f32] = bytemuck::cast_slice(vertices);
        let required = self.len + coords.len();
        if required > self.data.len() {
            let grown = grown_capacity(self.data.len(), coords.len());
            tracing::trace!(
                from = self.data.len(),
                to = grown,
                "growing staging cache"
            );
            self.data.resize(grown, 0.0);
        }
        self.data[self.len..required].copy_from_slice(coords);
        self.len = required;
    }

    /// Hands out every staged float and empties the cache.
    ///
    /// The returned slice borrows the cache mutably, so nothing can be
    /// appended while the drained view is alive.
    pub fn drain(&mut self) -> &[f32] {
        let len = std::mem::take(&mut self.len);
        &self.data[..len]
    }

    /// Number of valid floats currently staged.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Allocated size in floats.
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn pending_vertices(&self) -> usize {
        self.len / COORDS_PER_VERTEX
    }
}

impl Default for StagingCache {
    fn default() -> Self {
        Self::new()
    }
}

fn grown_capacity(capacity: usize, incoming: usize) -> usize {
    let scaled = ((capacity + incoming) as f64 * GROWTH_FACTOR).ceil() as usize;
    round_to_vertex(scaled)
}

fn round_to_vertex(floats: usize) -> usize {
    floats.div_ceil(COORDS_PER_VERTEX) * COORDS_PER_VERTEX
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vertices(count: usize) -> Vec<[f32; 3]> {
        (0..count).map(|i| [i as f32, i as f32 * 2.0, 0.0]).collect()
    }

    #[test]
    fn append_then_drain_returns_packed_coordinates() {
        let mut cache = StagingCache::new();
        cache.append(&[[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]);
        assert_eq!(cache.len(), 6);
        assert_eq!(cache.pending_vertices(), 2);

        let drained = cache.drain().to_vec();
        assert_eq!(drained, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert!(cache.is_empty());
    }

    #[test]
    fn drain_resets_length_but_keeps_allocation() {
        let mut cache = StagingCache::with_capacity(9);
        cache.append(&vertices(3));
        let capacity = cache.capacity();
        assert_eq!(cache.drain().len(), 9);
        assert_eq!(cache.capacity(), capacity);
        assert_eq!(cache.drain().len(), 0);
    }

    #[test]
    fn capacity_is_rounded_to_whole_vertices() {
        assert_eq!(StagingCache::with_capacity(10).capacity(), 12);
        assert_eq!(StagingCache::with_capacity(0).capacity(), 0);
    }

    #[test]
    fn growth_covers_appended_floats_and_is_geometric() {
        let mut cache = StagingCache::with_capacity(3);
        let mut total = 0;
        let mut previous = cache.capacity();
        for batch in 1..40 {
            cache.append(&vertices(batch % 7 + 1));
            total += (batch % 7 + 1) * COORDS_PER_VERTEX;
            let capacity = cache.capacity();
            assert!(capacity >= total, "capacity {capacity} < {total}");
            assert!(capacity >= previous);
            if capacity != previous {
                assert!(capacity as f64 >= previous as f64 * 1.125);
            }
            assert_eq!(capacity % COORDS_PER_VERTEX, 0);
            previous = capacity;
        }
        assert_eq!(cache.len(), total);
    }

    #[test]
    fn growth_preserves_existing_contents() {
        let mut cache = StagingCache::with_capacity(3);
        cache.append(&[[1.0, 1.0, 1.0]]);
        cache.append(&[[2.0, 2.0, 2.0], [3.0, 3.0, 3.0]]);
        assert_eq!(
            cache.drain(),
            &[1.0, 1.0, 1.0, 2.0, 2.0, 2.0, 3.0, 3.0, 3.0]
        );
    }

    #[test]
    fn exact_fit_does_not_reallocate() {
        let mut cache = StagingCache::with_capacity(6);
        cache.append(&vertices(2));
        assert_eq!(cache.capacity(), 6);
    }
}
