//! Local transformation of a scene node.
//!
//! The engine is 2D: nodes translate in 3D (z is kept for layering), rotate
//! around the z axis and scale along x and y.

use cgmath::{Matrix4, Rad, Vector2, Vector3, Vector4};

/// Position, rotation around z and scale of a node relative to its parent.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub position: Vector3<f32>,
    pub rotation: Rad<f32>,
    pub scale: Vector2<f32>,
}

impl Transform {
    /// Identity transformation (no move, rotate, or scale).
    pub fn new() -> Self {
        Self {
            position: Vector3::new(0.0, 0.0, 0.0),
            rotation: Rad(0.0),
            scale: Vector2::new(1.0, 1.0),
        }
    }

    pub fn to_matrix(&self) -> Matrix4<f32> {
        Matrix4::from_translation(self.position)
            * Matrix4::from_angle_z(self.rotation)
            * Matrix4::from_nonuniform_scale(self.scale.x, self.scale.y, 1.0)
    }

    /// Maps a point in the node's own space into its parent's space.
    pub fn apply(&self, point: Vector2<f32>) -> Vector3<f32> {
        let p = self.to_matrix() * Vector4::new(point.x, point.y, 0.0, 1.0);
        Vector3::new(p.x, p.y, p.z)
    }
}

impl From<Vector3<f32>> for Transform {
    fn from(position: Vector3<f32>) -> Self {
        Transform {
            position,
            ..Default::default()
        }
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::new()
    }
}
