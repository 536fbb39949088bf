//! Screen rotation cursors.

/// Rank offsets into a type's ordered set used by screen rotation.
///
/// `latest` walks towards the newest entries and picks up newly finished
/// tasks; `earliest` replays older entries behind it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScreenCursors {
    pub latest: usize,
    pub earliest: usize,
}

impl ScreenCursors {
    pub fn new(latest: usize, earliest: usize) -> Self {
        Self { latest, earliest }
    }

    /// Cursors after the member at `removed_rank` left the set.
    ///
    /// Ranks above the removed one shift down by one, so a cursor pointing
    /// past it moves down with them.
    pub fn after_removal(self, removed_rank: usize) -> Self {
        let shift = |cursor: usize| {
            if removed_rank < cursor {
                cursor - 1
            } else {
                cursor
            }
        };
        Self {
            latest: shift(self.latest),
            earliest: shift(self.earliest),
        }
    }

    /// Keep both cursors within a set of `size` members.
    pub fn clamp(self, size: usize) -> Self {
        Self {
            latest: self.latest.min(size),
            earliest: self.earliest.min(size),
        }
    }
}

/// Ranges of ranks one screen request shows, in display order.
///
/// Walks the set the way screen rotation does: first from `latest` towards
/// the newest end, then from `earliest` up to (never past) `latest`,
/// resetting `earliest` to 0 once it catches up. Rounds repeat while the
/// request is short, bounded by `n`, so a set smaller than `n` shows entries
/// more than once. Returns the `(start, count)` ranges and the new cursors.
pub fn plan_screen(
    cursors: ScreenCursors,
    size: usize,
    n: usize,
) -> (Vec<(usize, usize)>, ScreenCursors) {
    let mut cursors = cursors.clamp(size);
    let mut ranges = Vec::new();
    if size == 0 {
        return (ranges, cursors);
    }

    let mut taken = 0;
    let mut rounds = 0;
    while taken < n && rounds < n {
        rounds += 1;

        let count = (n - taken).min(size - cursors.latest);
        if count > 0 {
            ranges.push((cursors.latest, count));
            cursors.latest += count;
            taken += count;
        }

        let count = (n - taken).min(cursors.latest.saturating_sub(cursors.earliest));
        if count > 0 {
            ranges.push((cursors.earliest, count));
            cursors.earliest += count;
            taken += count;
        }

        if cursors.earliest >= cursors.latest {
            cursors.earliest = 0;
        }
    }

    (ranges, cursors)
}
