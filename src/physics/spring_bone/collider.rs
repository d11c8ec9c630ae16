//! 弹簧骨碰撞体
//!
//! 挂在骨骼上的球/胶囊，只用来阻挡弹簧关节的尾端，本身不参与模拟。
//! 碰撞体矩阵取骨骼世界矩阵去掉缩放，尺寸（半径、偏移、胶囊尾端）
//! 都已经是世界单位，由缩放时从基准值重新计算。

use glam::{Mat4, Vec3};

use crate::skeleton::{strip_scale, BoneSet};

/// 碰撞体形状（骨骼局部空间）
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ColliderShape {
    Sphere { offset: Vec3, radius: f32 },
    /// 从 offset 到 tail 的胶囊
    Capsule { offset: Vec3, tail: Vec3, radius: f32 },
}

impl ColliderShape {
    pub fn radius(&self) -> f32 {
        match *self {
            Self::Sphere { radius, .. } | Self::Capsule { radius, .. } => radius,
        }
    }

    /// 所有尺寸乘以 `factor`
    pub fn scaled(&self, factor: f32) -> Self {
        match *self {
            Self::Sphere { offset, radius } => Self::Sphere { offset: offset * factor, radius: radius * factor },
            Self::Capsule { offset, tail, radius } => Self::Capsule {
                offset: offset * factor,
                tail: tail * factor,
                radius: radius * factor,
            },
        }
    }

    /// 与半径 `object_radius` 的球的有符号距离
    ///
    /// 返回 (距离, 从碰撞体指向球心的单位方向)；距离为负表示相交。
    pub fn collide(&self, matrix: Mat4, position: Vec3, object_radius: f32) -> (f32, Vec3) {
        let delta = match *self {
            Self::Sphere { offset, .. } => position - matrix.transform_point3(offset),
            Self::Capsule { offset, tail, .. } => {
                let head = matrix.transform_point3(offset);
                let segment = matrix.transform_point3(tail) - head;
                let length_sq = segment.length_squared();
                let to_point = position - head;
                let dot = segment.dot(to_point);
                if dot <= 0.0 {
                    to_point
                } else if length_sq <= dot {
                    to_point - segment
                } else {
                    to_point - segment * (dot / length_sq)
                }
            }
        };
        let distance = delta.length() - (object_radius + self.radius());
        (distance, delta.normalize_or_zero())
    }
}

/// 挂在骨骼上的碰撞体
#[derive(Debug, Clone, PartialEq)]
pub struct SpringCollider {
    pub name: String,
    pub bone: usize,
    pub shape: ColliderShape,
    /// 缩放为 1 时的形状
    base: ColliderShape,
}

impl SpringCollider {
    pub fn new(name: impl Into<String>, bone: usize, shape: ColliderShape) -> Self {
        Self { name: name.into(), bone, shape, base: shape }
    }

    pub fn base_shape(&self) -> ColliderShape {
        self.base
    }

    /// 从基准值重新计算尺寸
    pub fn rescale(&mut self, factor: f32) {
        self.shape = self.base.scaled(factor);
    }

    /// 碰撞体世界矩阵（骨骼世界矩阵去掉缩放）
    pub fn world_matrix(&self, skeleton: &BoneSet) -> Mat4 {
        strip_scale(skeleton.world_matrix(self.bone))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sphere_distance() {
        let shape = ColliderShape::Sphere { offset: Vec3::new(0.0, 1.0, 0.0), radius: 0.5 };
        let (d, dir) = shape.collide(Mat4::IDENTITY, Vec3::new(0.0, 1.0, 1.0), 0.1);
        assert!((d - 0.4).abs() < 1e-6);
        assert!(dir.abs_diff_eq(Vec3::Z, 1e-6));
    }

    #[test]
    fn test_capsule_distance_uses_nearest_segment_point() {
        let shape = ColliderShape::Capsule { offset: Vec3::ZERO, tail: Vec3::new(0.0, 2.0, 0.0), radius: 0.5 };
        let m = Mat4::from_translation(Vec3::new(1.0, 0.0, 0.0));
        // 中段
        let (d, dir) = shape.collide(m, Vec3::new(1.3, 1.0, 0.0), 0.0);
        assert!((d + 0.2).abs() < 1e-6);
        assert!(dir.abs_diff_eq(Vec3::X, 1e-6));
        // 超过尾端
        let (d, _) = shape.collide(m, Vec3::new(1.0, 3.0, 0.0), 0.0);
        assert!((d - 0.5).abs() < 1e-6);
        // 头端之前
        let (d, _) = shape.collide(m, Vec3::new(1.0, -1.0, 0.0), 0.0);
        assert!((d - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_rescale_uses_base() {
        let mut c = SpringCollider::new(
            "leg",
            0,
            ColliderShape::Capsule { offset: Vec3::X, tail: Vec3::Y, radius: 1.0 },
        );
        c.rescale(2.0);
        c.rescale(2.0);
        assert_eq!(c.shape, ColliderShape::Capsule { offset: Vec3::X * 2.0, tail: Vec3::Y * 2.0, radius: 2.0 });
        c.rescale(1.0);
        assert_eq!(c.shape, c.base_shape());
    }
}
