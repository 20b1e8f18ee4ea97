use crate::types::{Pt, Rect};

/// Vertical cursor over a content rectangle.
pub enum AddResult {
    /// Placed at this absolute y.
    Placed(Pt),
    Overflow,
}

pub struct Frame {
    rect: Rect,
    cursor_y: Pt,
}

impl Frame {
    pub fn new(rect: Rect) -> Self {
        Self {
            rect,
            cursor_y: Pt::ZERO,
        }
    }

    pub fn remaining_height(&self) -> Pt {
        (self.rect.height - self.cursor_y).max(Pt::ZERO)
    }

    pub fn rect(&self) -> Rect {
        self.rect
    }

    pub fn is_empty(&self) -> bool {
        self.cursor_y <= Pt::ZERO
    }

    /// Absolute y of the cursor.
    pub fn y(&self) -> Pt {
        self.rect.y + self.cursor_y
    }

    pub fn left(&self) -> Pt {
        self.rect.x
    }

    pub fn width(&self) -> Pt {
        self.rect.width
    }

    pub fn bottom(&self) -> Pt {
        self.rect.y + self.rect.height
    }

    /// Reserves `height` when it fits. An empty frame always accepts so that
    /// pagination keeps moving forward.
    pub fn add(&mut self, height: Pt) -> AddResult {
        if height <= self.remaining_height() || self.is_empty() {
            AddResult::Placed(self.force(height))
        } else {
            AddResult::Overflow
        }
    }

    /// Reserves `height` even past the bottom edge.
    pub fn force(&mut self, height: Pt) -> Pt {
        let y = self.y();
        self.cursor_y += height.max(Pt::ZERO);
        y
    }
}
