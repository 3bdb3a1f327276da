//! Touch input handling
//!
//! Raw per-slot touch events (as libinput delivers them) and the pointer-set
//! `MotionEvent` the shade consumes. `MotionAssembler` turns the former into
//! the latter.

/// Position in logical pixels
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Raw touch event from libinput
#[derive(Debug, Clone)]
pub enum TouchEvent {
    Down {
        slot: i32,
        position: Point,
    },
    Up {
        slot: i32,
    },
    Motion {
        slot: i32,
        position: Point,
    },
    Cancel,
    Frame,
}

/// What happened in a `MotionEvent`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TouchAction {
    /// First pointer went down
    Down,
    Move,
    /// Another pointer went down while one was already down
    PointerDown { index: usize },
    /// A non-last pointer went up. It is still listed in `pointers`.
    PointerUp { index: usize },
    /// Last pointer went up
    Up,
    Cancel,
}

/// One pointer that is down during a `MotionEvent`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TouchPointer {
    pub id: i32,
    pub position: Point,
}

/// A touch event carrying every pointer currently down
#[derive(Debug, Clone, PartialEq)]
pub struct MotionEvent {
    pub action: TouchAction,
    pub pointers: Vec<TouchPointer>,
}

impl MotionEvent {
    pub fn new(action: TouchAction, pointers: Vec<TouchPointer>) -> Self {
        Self { action, pointers }
    }

    fn single(action: TouchAction, id: i32, position: Point) -> Self {
        Self::new(action, vec![TouchPointer { id, position }])
    }

    pub fn down(id: i32, position: Point) -> Self {
        Self::single(TouchAction::Down, id, position)
    }

    pub fn moved(id: i32, position: Point) -> Self {
        Self::single(TouchAction::Move, id, position)
    }

    pub fn up(id: i32, position: Point) -> Self {
        Self::single(TouchAction::Up, id, position)
    }

    pub fn cancel(id: i32, position: Point) -> Self {
        Self::single(TouchAction::Cancel, id, position)
    }

    pub fn find_pointer_index(&self, id: i32) -> Option<usize> {
        self.pointers.iter().position(|p| p.id == id)
    }

    pub fn pointer_id(&self, index: usize) -> Option<i32> {
        self.pointers.get(index).map(|p| p.id)
    }

    pub fn position(&self, index: usize) -> Option<Point> {
        self.pointers.get(index).map(|p| p.position)
    }

    /// Index of the pointer the action refers to (0 for whole-gesture actions)
    pub fn action_index(&self) -> usize {
        match self.action {
            TouchAction::PointerDown { index } | TouchAction::PointerUp { index } => index,
            _ => 0,
        }
    }
}

/// Groups per-slot libinput events into `MotionEvent`s
#[derive(Debug, Default)]
pub struct MotionAssembler {
    pointers: Vec<TouchPointer>,
}

impl MotionAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one raw event. Returns the motion event it produces, if any.
    pub fn push(&mut self, event: &TouchEvent) -> Option<MotionEvent> {
        match *event {
            TouchEvent::Down { slot, position } => {
                if let Some(existing) = self.pointers.iter_mut().find(|p| p.id == slot) {
                    // Duplicate down for a live slot: treat as a move.
                    existing.position = position;
                    return Some(MotionEvent::new(TouchAction::Move, self.pointers.clone()));
                }
                self.pointers.push(TouchPointer { id: slot, position });
                let action = if self.pointers.len() == 1 {
                    TouchAction::Down
                } else {
                    TouchAction::PointerDown {
                        index: self.pointers.len() - 1,
                    }
                };
                Some(MotionEvent::new(action, self.pointers.clone()))
            }
            TouchEvent::Motion { slot, position } => {
                let pointer = self.pointers.iter_mut().find(|p| p.id == slot)?;
                pointer.position = position;
                Some(MotionEvent::new(TouchAction::Move, self.pointers.clone()))
            }
            TouchEvent::Up { slot } => {
                let index = self.pointers.iter().position(|p| p.id == slot)?;
                let action = if self.pointers.len() == 1 {
                    TouchAction::Up
                } else {
                    TouchAction::PointerUp { index }
                };
                let event = MotionEvent::new(action, self.pointers.clone());
                self.pointers.remove(index);
                Some(event)
            }
            TouchEvent::Cancel => {
                if self.pointers.is_empty() {
                    return None;
                }
                let event = MotionEvent::new(TouchAction::Cancel, std::mem::take(&mut self.pointers));
                Some(event)
            }
            TouchEvent::Frame => None,
        }
    }

    pub fn active_pointers(&self) -> usize {
        self.pointers.len()
    }
}
