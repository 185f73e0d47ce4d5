//! Workspace coordinate primitives.
//!
//! Everything in the connection index, the dragger and the bumper works in a
//! single shared workspace coordinate space. View scaling happens elsewhere
//! (see [`crate::config::LayoutConfigUnit`]).

use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

/// Point in the workspace coordinate system.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WorkspacePoint {
    pub x: f64,
    pub y: f64,
}

impl WorkspacePoint {
    pub const ZERO: WorkspacePoint = WorkspacePoint { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`.
    pub fn distance_to(&self, other: WorkspacePoint) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

impl Add for WorkspacePoint {
    type Output = WorkspacePoint;
    fn add(self, rhs: WorkspacePoint) -> WorkspacePoint {
        WorkspacePoint::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl AddAssign for WorkspacePoint {
    fn add_assign(&mut self, rhs: WorkspacePoint) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl Sub for WorkspacePoint {
    type Output = WorkspacePoint;
    fn sub(self, rhs: WorkspacePoint) -> WorkspacePoint {
        WorkspacePoint::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl SubAssign for WorkspacePoint {
    fn sub_assign(&mut self, rhs: WorkspacePoint) {
        self.x -= rhs.x;
        self.y -= rhs.y;
    }
}

impl Neg for WorkspacePoint {
    type Output = WorkspacePoint;
    fn neg(self) -> WorkspacePoint {
        WorkspacePoint::new(-self.x, -self.y)
    }
}

/// Size in the workspace coordinate system.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WorkspaceSize {
    pub width: f64,
    pub height: f64,
}

impl WorkspaceSize {
    pub const ZERO: WorkspaceSize = WorkspaceSize {
        width: 0.0,
        height: 0.0,
    };

    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Edge insets, with leading/trailing instead of left/right so that
/// right-to-left workspaces read naturally.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EdgeInsets {
    pub top: f64,
    pub leading: f64,
    pub bottom: f64,
    pub trailing: f64,
}

impl EdgeInsets {
    pub fn new(top: f64, leading: f64, bottom: f64, trailing: f64) -> Self {
        Self {
            top,
            leading,
            bottom,
            trailing,
        }
    }
}

/// Axis-aligned rectangle in workspace coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceRect {
    pub min: WorkspacePoint,
    pub max: WorkspacePoint,
}

impl WorkspaceRect {
    pub fn from_origin_size(origin: WorkspacePoint, size: WorkspaceSize) -> Self {
        Self {
            min: origin,
            max: WorkspacePoint::new(origin.x + size.width, origin.y + size.height),
        }
    }

    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    /// Smallest rectangle containing both `self` and `other`.
    pub fn union(&self, other: WorkspaceRect) -> WorkspaceRect {
        WorkspaceRect {
            min: WorkspacePoint::new(self.min.x.min(other.min.x), self.min.y.min(other.min.y)),
            max: WorkspacePoint::new(self.max.x.max(other.max.x), self.max.y.max(other.max.y)),
        }
    }

    /// Grow the rectangle outward by `insets`.
    pub fn outset(&self, insets: EdgeInsets) -> WorkspaceRect {
        WorkspaceRect {
            min: WorkspacePoint::new(self.min.x - insets.leading, self.min.y - insets.top),
            max: WorkspacePoint::new(self.max.x + insets.trailing, self.max.y + insets.bottom),
        }
    }
}
