//! Fixed-capacity vertex ring with wraparound writes.
//!
//! The ring never grows after allocation. Once `vertex_count` reaches the
//! capacity every new vertex overwrites the oldest one in place, and
//! [`RingBuffer::draw_range`] hands back the resident vertices as one or two
//! spans ordered oldest to newest so a line strip renders without a seam.

use crate::COORDS_PER_VERTEX;

/// Device-resident backing storage for a [`RingBuffer`].
///
/// Implementations must be zero-initialised on creation and must accept
/// writes at any float offset within `capacity_floats()`.
pub trait VertexStore {
    /// Total size of the store in floats.
    fn capacity_floats(&self) -> usize;
    /// Copies `data` into the store starting at float `offset`.
    fn write_floats(&mut self, offset: usize, data: &[f32]);
}

/// Plain host-memory vertex store.
#[derive(Debug, Clone, PartialEq)]
pub struct HostStore {
    data: Vec<f32>,
}

impl HostStore {
    pub fn zeroed(capacity_floats: usize) -> Self {
        Self {
            data: vec![0.0; capacity_floats],
        }
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Returns the vertex stored at `index`, if it lies inside the store.
    pub fn vertex(&self, index: usize) -> Option<[f32; COORDS_PER_VERTEX]> {
        let start = index * COORDS_PER_VERTEX;
        let coords = self.data.get(start..start + COORDS_PER_VERTEX)?;
        Some([coords[0], coords[1], coords[2]])
    }
}

impl VertexStore for HostStore {
    fn capacity_floats(&self) -> usize {
        self.data.len()
    }

    fn write_floats(&mut self, offset: usize, data: &[f32]) {
        self.data[offset..offset + data.len()].copy_from_slice(data);
    }
}

/// A contiguous run of vertices submitted as one draw call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawSpan {
    pub first_vertex: usize,
    pub vertex_count: usize,
}

impl DrawSpan {
    pub fn new(first_vertex: usize, vertex_count: usize) -> Self {
        Self {
            first_vertex,
            vertex_count,
        }
    }

    /// One past the last vertex of the span.
    pub fn end(&self) -> usize {
        self.first_vertex + self.vertex_count
    }
}

/// Spans covering the resident vertices, in draw order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawRange {
    Empty,
    Single(DrawSpan),
    /// The ring is full and the cursor sits mid-buffer: the older tail is
    /// drawn first, then the newer head.
    Wrapped { tail: DrawSpan, head: DrawSpan },
}

impl DrawRange {
    /// Iterates the spans oldest to newest.
    pub fn spans(&self) -> impl Iterator<Item = DrawSpan> {
        let (first, second) = match *self {
            DrawRange::Empty => (None, None),
            DrawRange::Single(span) => (Some(span), None),
            DrawRange::Wrapped { tail, head } => (Some(tail), Some(head)),
        };
        first.into_iter().chain(second)
    }

    pub fn vertex_count(&self) -> usize {
        self.spans().map(|span| span.vertex_count).sum()
    }
}

/// Result of a single [`RingBuffer::write`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WriteOutcome {
    /// Floats copied into the store.
    pub written_floats: usize,
    /// Oldest floats of an oversized batch that never reached the store.
    pub discarded_floats: usize,
    /// True when the write crossed the end of the store.
    pub wrapped: bool,
}

/// Circular vertex storage over a fixed-size [`VertexStore`].
#[derive(Debug)]
pub struct RingBuffer<S> {
    store: S,
    write_cursor: usize,
    vertex_count: usize,
}

impl<S: VertexStore> RingBuffer<S> {
    /// Float capacity the ring will be allocated with.
    pub fn capacity_for(requested_floats: usize, pending_floats: usize) -> usize {
        requested_floats.max(pending_floats)
    }

    /// Allocates the backing store once, sized to
    /// `max(requested_floats, pending_floats)`.
    pub fn allocate<E>(
        requested_floats: usize,
        pending_floats: usize,
        alloc: impl FnOnce(usize) -> Result<S, E>,
    ) -> Result<Self, E> {
        let capacity = Self::capacity_for(requested_floats, pending_floats);
        Ok(Self::new(alloc(capacity)?))
    }

    /// Wraps an already allocated, zeroed store.
    pub fn new(store: S) -> Self {
        debug_assert_eq!(store.capacity_floats() % COORDS_PER_VERTEX, 0);
        Self {
            store,
            write_cursor: 0,
            vertex_count: 0,
        }
    }

    /// Appends `floats` at the cursor, wrapping to the start of the store.
    ///
    /// A batch larger than the whole ring keeps only its newest
    /// `capacity_floats()` floats; the rest are reported as discarded.
    pub fn write(&mut self, floats: &[f32]) -> WriteOutcome {
        let capacity = self.capacity_floats();
        if floats.is_empty() || capacity == 0 {
            return WriteOutcome {
                discarded_floats: floats.len(),
                ..WriteOutcome::default()
            };
        }

        let discarded = floats.len().saturating_sub(capacity);
        let floats = &floats[discarded..];
        let count = floats.len();
        let remaining = capacity - self.write_cursor;

        let wrapped = if remaining >= count {
            self.store.write_floats(self.write_cursor, floats);
            self.write_cursor += count;
            if self.write_cursor == capacity {
                self.write_cursor = 0;
            }
            false
        } else {
            let (tail, head) = floats.split_at(remaining);
            self.store.write_floats(self.write_cursor, tail);
            self.store.write_floats(0, head);
            self.write_cursor = head.len();
            true
        };

        self.vertex_count =
            (self.vertex_count + count / COORDS_PER_VERTEX).min(self.capacity_vertices());

        WriteOutcome {
            written_floats: count,
            discarded_floats: discarded,
            wrapped,
        }
    }

    /// Spans to draw, oldest vertices first.
    pub fn draw_range(&self) -> DrawRange {
        if self.vertex_count == 0 {
            return DrawRange::Empty;
        }
        if !self.is_full() {
            return DrawRange::Single(DrawSpan::new(0, self.vertex_count));
        }

        let cursor_vertex = self.write_cursor / COORDS_PER_VERTEX;
        let capacity = self.capacity_vertices();
        let tail = DrawSpan::new(cursor_vertex, capacity - cursor_vertex);
        if cursor_vertex == 0 {
            DrawRange::Single(tail)
        } else {
            DrawRange::Wrapped {
                tail,
                head: DrawSpan::new(0, cursor_vertex),
            }
        }
    }

    pub fn capacity_floats(&self) -> usize {
        self.store.capacity_floats()
    }

    pub fn capacity_vertices(&self) -> usize {
        self.capacity_floats() / COORDS_PER_VERTEX
    }

    /// Float offset the next write starts at.
    pub fn write_cursor(&self) -> usize {
        self.write_cursor
    }

    pub fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    pub fn is_full(&self) -> bool {
        self.vertex_count == self.capacity_vertices()
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}
