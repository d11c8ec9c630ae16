//! 骨骼系统
//!
//! 物理后端的外部协作者：
//! - BoneLink: 单个骨骼节点
//! - BoneSet: 管理骨骼层次结构与世界矩阵刷新
//! - ModelTransform: 模型根节点（位置/旋转/缩放 + 可选父变换）

mod bone_link;
mod bone_set;

pub use bone_link::{BoneLink, BoneFlags};
pub use bone_set::BoneSet;

use glam::{Vec3, Quat, Mat4};

// ============================================================================
// 公共类型定义
// ============================================================================

/// 模型根变换
///
/// 骨骼世界矩阵 = parent * TRS(translation, rotation, scale) * 骨骼链。
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ModelTransform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
    /// 父节点世界矩阵（None 表示无父节点）
    pub parent: Option<Mat4>,
}

impl Default for ModelTransform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
            parent: None,
        }
    }
}

impl ModelTransform {
    /// 本地矩阵（不含父变换）
    #[inline]
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }

    /// 世界矩阵
    #[inline]
    pub fn world_matrix(&self) -> Mat4 {
        match self.parent {
            Some(parent) => parent * self.to_matrix(),
            None => self.to_matrix(),
        }
    }

    /// 世界缩放
    #[inline]
    pub fn world_scale(&self) -> Vec3 {
        let (scale, _, _) = self.world_matrix().to_scale_rotation_translation();
        scale
    }

    /// 世界缩放是否为 (1, 1, 1)
    #[inline]
    pub fn has_unit_scale(&self) -> bool {
        self.world_scale().abs_diff_eq(Vec3::ONE, 1e-6)
    }
}

/// 去掉矩阵中的缩放，只保留旋转和平移
#[inline]
pub fn strip_scale(m: Mat4) -> Mat4 {
    let (_, rotation, translation) = m.to_scale_rotation_translation();
    Mat4::from_rotation_translation(rotation, translation)
}

// ============================================================================
// 类型别名
// ============================================================================

/// Bone 别名
pub type Bone = BoneLink;

/// Skeleton 别名
pub type Skeleton = BoneSet;
