//! The engine's line buffer pair (spec §3 "Line buffer pair").
//!
//! Two NUL-terminated byte buffers, `lhs` and `rhs`, each holding one
//! logical line, with independent cursors. Growth is arena-free (§9): each
//! buffer owns its storage outright and grows by doubling with a 64 KiB
//! floor, never aliasing the other side or any rule data.

/// Buffers never shrink below this many bytes of capacity once grown past
/// it; matches spec §4.3's "floor 64 KiB".
pub const MIN_CAPACITY: usize = 64 * 1024;

/// Compute the next power-of-two-ish capacity (doubling from `MIN_CAPACITY`)
/// that is at least `required`.
fn grown_capacity(current: usize, required: usize) -> usize {
    let mut cap = current.max(MIN_CAPACITY);
    while cap < required {
        cap = cap.saturating_mul(2);
    }
    cap
}

/// Which side of the pair an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Lhs,
    Rhs,
}

/// The two line buffers plus their independent cursors. Invariant (spec
/// §3): after any tokenizer step, both cursors point either at the
/// terminating NUL, at a separator byte, or at the first byte of a number.
#[derive(Debug)]
pub struct LineBuffers {
    lhs: Vec<u8>,
    rhs: Vec<u8>,
    lhs_i: usize,
    rhs_i: usize,
}

impl LineBuffers {
    pub fn new(initial_capacity: usize) -> Self {
        let cap = grown_capacity(0, initial_capacity.max(1));
        let mut lhs = Vec::with_capacity(cap);
        let mut rhs = Vec::with_capacity(cap);
        lhs.push(0);
        rhs.push(0);
        Self {
            lhs,
            rhs,
            lhs_i: 0,
            rhs_i: 0,
        }
    }

    fn buf(&self, side: Side) -> &Vec<u8> {
        match side {
            Side::Lhs => &self.lhs,
            Side::Rhs => &self.rhs,
        }
    }

    fn buf_mut(&mut self, side: Side) -> &mut Vec<u8> {
        match side {
            Side::Lhs => &mut self.lhs,
            Side::Rhs => &mut self.rhs,
        }
    }

    pub fn side(&self, side: Side) -> &[u8] {
        self.buf(side)
    }

    pub fn lhs(&self) -> &[u8] {
        &self.lhs
    }

    pub fn rhs(&self) -> &[u8] {
        &self.rhs
    }

    pub fn cursor(&self, side: Side) -> usize {
        match side {
            Side::Lhs => self.lhs_i,
            Side::Rhs => self.rhs_i,
        }
    }

    pub fn set_cursor(&mut self, side: Side, pos: usize) {
        let len = self.buf(side).len();
        let pos = pos.min(len.saturating_sub(1));
        match side {
            Side::Lhs => self.lhs_i = pos,
            Side::Rhs => self.rhs_i = pos,
        }
    }

    pub fn lhs_i(&self) -> usize {
        self.lhs_i
    }

    pub fn rhs_i(&self) -> usize {
        self.rhs_i
    }

    /// Overwrite one side's content with `content`, growing storage by
    /// doubling if needed, and terminate it with a NUL byte. Does not
    /// touch cursors — callers reset those explicitly (`reset_cursors`),
    /// matching the four line operations in spec §4.3 which all reset both
    /// cursors together.
    pub fn set_side(&mut self, side: Side, content: &[u8]) {
        let required = content.len() + 1;
        let current_cap = self.buf(side).capacity();
        if current_cap < required {
            let new_cap = grown_capacity(current_cap, required);
            self.buf_mut(side).reserve(new_cap - self.buf(side).len());
        }
        let buf = self.buf_mut(side);
        buf.clear();
        buf.extend_from_slice(content);
        buf.push(0);
    }

    pub fn reset_cursors(&mut self) {
        self.lhs_i = 0;
        self.rhs_i = 0;
    }

    /// True when both cursors point at their buffer's terminating NUL.
    pub fn is_empty(&self) -> bool {
        self.lhs.get(self.lhs_i) == Some(&0) && self.rhs.get(self.rhs_i) == Some(&0)
    }

    pub fn byte_at(&self, side: Side, pos: usize) -> u8 {
        *self.buf(side).get(pos).unwrap_or(&0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_buffers_are_empty() {
        let b = LineBuffers::new(16);
        assert!(b.is_empty());
    }

    #[test]
    fn set_side_terminates_with_nul_and_resets_on_request() {
        let mut b = LineBuffers::new(16);
        b.set_side(Side::Lhs, b"hello");
        b.set_side(Side::Rhs, b"hellp");
        b.reset_cursors();
        assert_eq!(b.lhs()[5], 0);
        assert_eq!(b.rhs()[5], 0);
        assert!(!b.is_empty());
    }

    #[test]
    fn cursor_clamps_to_buffer_length() {
        let mut b = LineBuffers::new(16);
        b.set_side(Side::Lhs, b"ab");
        b.set_cursor(Side::Lhs, 9999);
        assert_eq!(b.cursor(Side::Lhs), 2); // the NUL index
    }

    #[test]
    fn growth_never_drops_below_the_floor() {
        let b = LineBuffers::new(16);
        assert!(b.lhs.capacity() >= MIN_CAPACITY);
    }

    #[test]
    fn growth_doubles_to_fit_large_lines() {
        let mut b = LineBuffers::new(16);
        let big = vec![b'x'; MIN_CAPACITY * 3];
        b.set_side(Side::Lhs, &big);
        assert!(b.lhs.capacity() >= big.len() + 1);
        assert_eq!(b.lhs.capacity() % MIN_CAPACITY, 0);
    }
}
