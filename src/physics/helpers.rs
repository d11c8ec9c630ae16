//! 调试可视化数据
//!
//! 后端把当前模拟状态导出为与渲染无关的线框图元：
//! 每个刚体/碰撞体一个形状，每个关节一条线。只读快照，不影响模拟。

use glam::{Mat4, Vec3};

/// RGBA 颜色（0-255）
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HelperColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl HelperColor {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// 运动学刚体
    pub const KINEMATIC: Self = Self::new(0xFF, 0x88, 0x88, 0x40);
    /// 动态刚体
    pub const DYNAMIC: Self = Self::new(0x88, 0xFF, 0x88, 0x40);
    /// 动态跟骨刚体
    pub const DYNAMIC_PINNED: Self = Self::new(0x88, 0x88, 0xFF, 0x40);
    /// 弹簧骨碰撞体
    pub const COLLIDER: Self = Self::new(0xFF, 0x00, 0xFF, 0x40);
    /// 关节连线
    pub const JOINT: Self = Self::new(0xFF, 0xFF, 0x00, 0xFF);
}

/// 形状
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum HelperShapeKind {
    Sphere { radius: f32 },
    Box { half_extents: Vec3 },
    /// 沿局部 Y 轴的胶囊（height 为圆柱段长度）
    Capsule { radius: f32, height: f32 },
    /// 两个端点之间的胶囊（世界空间）
    Segment { radius: f32, head: Vec3, tail: Vec3 },
}

/// 单个形状
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HelperShape {
    /// 对应刚体或碰撞体的索引
    pub source_index: usize,
    pub kind: HelperShapeKind,
    /// 世界变换（不含缩放）
    pub transform: Mat4,
    pub color: HelperColor,
}

/// 单条线段
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HelperLine {
    pub start: Vec3,
    pub end: Vec3,
    pub color: HelperColor,
}

/// 一次导出的全部图元
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PhysicsHelpers {
    pub shapes: Vec<HelperShape>,
    pub lines: Vec<HelperLine>,
}

impl PhysicsHelpers {
    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty() && self.lines.is_empty()
    }
}
