//! 骨骼节点
//!
//! BoneLink 是骨骼系统的核心单元，每个 BoneLink 代表骨骼层次中的一个节点。
//! 本地平移/旋转由动画层、IK/付与层或物理后端写入；
//! 同一帧内只有一个所有者写同一根骨骼（见 `BoneFlags::PHYSICS`）。

use glam::{Mat4, Quat, Vec3};
use bitflags::bitflags;

// ============================================================================
// 骨骼标志
// ============================================================================

bitflags! {
    /// 骨骼标志位
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct BoneFlags: u32 {
        /// 可旋转
        const ROTATABLE = 1 << 0;
        /// 可移动
        const MOVABLE = 1 << 1;
        /// 由物理后端接管（动画层本帧不应覆盖）
        const PHYSICS = 1 << 2;
    }
}

// ============================================================================
// 骨骼节点
// ============================================================================

/// 骨骼节点
///
/// - 静态数据：名称、父子关系、初始位置（构建后不变）
/// - 动态数据：本地平移/旋转、世界矩阵（每帧更新）
#[derive(Clone, Debug)]
pub struct BoneLink {
    // ========================================
    // 静态数据
    // ========================================

    /// 骨骼名称
    pub name: String,

    /// 骨骼内部索引
    pub(crate) internal_id: usize,

    /// 父骨骼索引 (-1 表示根骨骼)
    pub parent_index: i32,

    /// 子骨骼索引（按添加顺序，build 时计算）
    pub(crate) children: Vec<usize>,

    /// 骨骼标志
    pub flags: BoneFlags,

    /// 初始位置（模型空间）
    pub initial_position: Vec3,

    /// 相对于父骨骼的静止偏移（build 时计算）
    pub body_shift: Vec3,

    /// 静止姿态的本地旋转
    pub rest_rotation: Quat,

    // ========================================
    // 动态数据
    // ========================================

    /// 本地平移（相对父骨骼）
    pub position: Vec3,

    /// 本地旋转（相对父骨骼）
    pub rotation: Quat,

    /// 全局变换矩阵（包含模型根变换）
    pub local_to_world: Mat4,
}

impl BoneLink {
    /// 创建新骨骼
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            internal_id: 0,
            parent_index: -1,
            children: Vec::new(),
            flags: BoneFlags::ROTATABLE,
            initial_position: Vec3::ZERO,
            body_shift: Vec3::ZERO,
            rest_rotation: Quat::IDENTITY,
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            local_to_world: Mat4::IDENTITY,
        }
    }

    /// 设置父骨骼
    pub fn with_parent(mut self, parent: usize) -> Self {
        self.parent_index = parent as i32;
        self
    }

    /// 设置初始位置（模型空间）
    pub fn with_position(mut self, position: Vec3) -> Self {
        self.initial_position = position;
        self
    }

    // ========================================
    // 访问器
    // ========================================

    /// 骨骼索引
    #[inline]
    pub fn link_id(&self) -> usize {
        self.internal_id
    }

    /// 父骨骼索引
    #[inline]
    pub fn parent_id(&self) -> Option<usize> {
        if self.parent_index >= 0 {
            Some(self.parent_index as usize)
        } else {
            None
        }
    }

    /// 是否为根骨骼
    #[inline]
    pub fn is_root(&self) -> bool {
        self.parent_index < 0
    }

    /// 子骨骼索引
    #[inline]
    pub fn children(&self) -> &[usize] {
        &self.children
    }

    /// 获取世界位置
    #[inline]
    pub fn world_position(&self) -> Vec3 {
        self.local_to_world.w_axis.truncate()
    }

    /// 获取世界旋转（忽略缩放）
    #[inline]
    pub fn world_rotation(&self) -> Quat {
        let (_, rotation, _) = self.local_to_world.to_scale_rotation_translation();
        rotation
    }

    /// 本地变换矩阵 (local_to_parent)
    #[inline]
    pub fn local_transform(&self) -> Mat4 {
        Mat4::from_rotation_translation(self.rotation, self.position)
    }

    /// 恢复静止姿态
    #[inline]
    pub fn reset_pose(&mut self) {
        self.position = self.body_shift;
        self.rotation = self.rest_rotation;
    }

    #[inline]
    pub fn is_physics_driven(&self) -> bool {
        self.flags.contains(BoneFlags::PHYSICS)
    }

    #[inline]
    pub fn set_physics_driven(&mut self, driven: bool) {
        self.flags.set(BoneFlags::PHYSICS, driven);
    }
}

impl Default for BoneLink {
    fn default() -> Self {
        Self::new(String::new())
    }
}
