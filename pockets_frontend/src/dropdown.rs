//! Menu/dropdown state independent of any rendering toolkit.

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn contains(&self, px: f32, py: f32) -> bool {
        px >= self.x && px <= self.right() && py >= self.y && py <= self.bottom()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Below,
    Above,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MenuPosition {
    pub placement: Placement,
    pub rect: Rect,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DropdownPhase {
    Closed,
    /// Waiting for the anchor to be measured before the menu can be placed.
    Opening,
    Open(MenuPosition),
}

#[derive(Debug, Clone)]
pub struct Dropdown {
    phase: DropdownPhase,
    anchor: Option<Rect>,
    gap: f32,
}

impl Default for Dropdown {
    fn default() -> Self {
        Self {
            phase: DropdownPhase::Closed,
            anchor: None,
            gap: 4.0,
        }
    }
}

impl Dropdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> DropdownPhase {
        self.phase
    }

    pub fn is_open(&self) -> bool {
        matches!(self.phase, DropdownPhase::Open(_))
    }

    pub fn position(&self) -> Option<MenuPosition> {
        match self.phase {
            DropdownPhase::Open(position) => Some(position),
            _ => None,
        }
    }

    pub fn toggle(&mut self) {
        self.phase = match self.phase {
            DropdownPhase::Closed => DropdownPhase::Opening,
            DropdownPhase::Opening | DropdownPhase::Open(_) => DropdownPhase::Closed,
        };
    }

    pub fn close(&mut self) {
        self.phase = DropdownPhase::Closed;
    }

    pub fn escape(&mut self) {
        self.close();
    }

    /// Completes an opening once layout knows where the trigger is. Also
    /// repositions an already open menu (scroll, resize).
    pub fn anchor_measured(&mut self, anchor: Rect, menu: (f32, f32), viewport: (f32, f32)) {
        self.anchor = Some(anchor);
        if matches!(self.phase, DropdownPhase::Closed) {
            return;
        }
        self.phase = DropdownPhase::Open(place_menu(anchor, menu, viewport, self.gap));
    }

    /// Handles a pointer press anywhere on screen. Presses outside both the
    /// trigger and the menu close it.
    pub fn click_at(&mut self, x: f32, y: f32) {
        let on_anchor = self.anchor.is_some_and(|anchor| anchor.contains(x, y));
        match self.phase {
            DropdownPhase::Open(position) if !position.rect.contains(x, y) && !on_anchor => {
                self.close()
            }
            DropdownPhase::Opening if !on_anchor => self.close(),
            _ => {}
        }
    }
}

pub fn place_menu(anchor: Rect, menu: (f32, f32), viewport: (f32, f32), gap: f32) -> MenuPosition {
    let (menu_w, menu_h) = menu;
    let (view_w, view_h) = viewport;

    let space_below = view_h - anchor.bottom() - gap;
    let space_above = anchor.y - gap;
    let placement = if space_below >= menu_h || space_below >= space_above {
        Placement::Below
    } else {
        Placement::Above
    };
    let y = match placement {
        Placement::Below => anchor.bottom() + gap,
        Placement::Above => (anchor.y - gap - menu_h).max(0.0),
    };
    let max_x = (view_w - menu_w).max(0.0);
    let x = anchor.x.clamp(0.0, max_x);

    MenuPosition {
        placement,
        rect: Rect::new(x, y, menu_w, menu_h),
    }
}
