//! 模型作者给定的刚体/关节参数
//!
//! 数值与 PMX 文件一致（模型局部空间，模型缩放为 1 时的尺寸），
//! 形状和模式保持原始整数，由后端在构建时解释。

use glam::{Quat, Vec3};

use crate::{MmdError, Result};

/// 刚体形状
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RigidBodyShape {
    Sphere = 0,
    Box = 1,
    Capsule = 2,
}

impl TryFrom<u8> for RigidBodyShape {
    type Error = MmdError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Self::Sphere),
            1 => Ok(Self::Box),
            2 => Ok(Self::Capsule),
            other => Err(MmdError::UnsupportedShape(other)),
        }
    }
}

/// 刚体物理模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhysicsMode {
    /// 跟随骨骼（运动学），动画为准
    Kinematic,
    /// 完全由物理驱动（旋转 + 位置写回骨骼）
    Dynamic,
    /// 物理驱动旋转，位置钉在骨骼上
    DynamicPinned,
}

impl TryFrom<u8> for PhysicsMode {
    type Error = MmdError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Self::Kinematic),
            1 => Ok(Self::Dynamic),
            2 => Ok(Self::DynamicPinned),
            other => Err(MmdError::UnknownPhysicsMode(other)),
        }
    }
}

/// 刚体参数
#[derive(Debug, Clone, PartialEq)]
pub struct RigidBodyParam {
    pub name: String,
    /// 关联骨骼索引（-1 表示无骨骼）
    pub bone_index: i32,
    /// 碰撞组（0~15）
    pub group: u8,
    /// 碰撞掩码
    pub group_mask: u16,
    /// 形状原始值（0 球 / 1 盒 / 2 胶囊）
    pub shape_type: u8,
    /// 球 [半径, -, -] / 盒 [半宽, 半高, 半深] / 胶囊 [半径, 高, -]
    pub size: [f32; 3],
    /// 模型局部空间位置
    pub position: [f32; 3],
    /// 模型局部空间欧拉角（XYZ 顺序，弧度）
    pub rotation: [f32; 3],
    pub mass: f32,
    pub linear_damping: f32,
    pub angular_damping: f32,
    pub restitution: f32,
    pub friction: f32,
    /// 模式原始值（0 跟骨 / 1 物理 / 2 物理+骨位置）
    pub physics_mode: u8,
}

impl Default for RigidBodyParam {
    fn default() -> Self {
        Self {
            name: String::new(),
            bone_index: -1,
            group: 0,
            group_mask: 0xFFFF,
            shape_type: RigidBodyShape::Sphere as u8,
            size: [1.0, 1.0, 1.0],
            position: [0.0; 3],
            rotation: [0.0; 3],
            mass: 1.0,
            linear_damping: 0.5,
            angular_damping: 0.5,
            restitution: 0.0,
            friction: 0.5,
            physics_mode: 0,
        }
    }
}

impl RigidBodyParam {
    pub fn shape(&self) -> Result<RigidBodyShape> {
        RigidBodyShape::try_from(self.shape_type)
    }

    /// 解析后的物理模式
    ///
    /// 质量为 0 的刚体一律按运动学处理；未知模式同样退化为运动学。
    pub fn mode(&self) -> PhysicsMode {
        let mode = PhysicsMode::try_from(self.physics_mode).unwrap_or_else(|e| {
            log::warn!("[刚体] '{}': {}，按跟骨处理", self.name, e);
            PhysicsMode::Kinematic
        });
        if self.mass <= 0.0 {
            PhysicsMode::Kinematic
        } else {
            mode
        }
    }

    pub fn bone(&self) -> Option<usize> {
        (self.bone_index >= 0).then_some(self.bone_index as usize)
    }

    #[inline]
    pub fn local_position(&self) -> Vec3 {
        Vec3::from_array(self.position)
    }

    #[inline]
    pub fn local_rotation(&self) -> Quat {
        euler_xyz(self.rotation)
    }
}

/// 关节参数（6DOF 弹簧）
#[derive(Debug, Clone, PartialEq, Default)]
pub struct JointParam {
    pub name: String,
    pub rigid_body_a_index: i32,
    pub rigid_body_b_index: i32,
    /// 锚点位置（模型局部空间）
    pub position: [f32; 3],
    /// 锚点欧拉角（XYZ 顺序，弧度）
    pub rotation: [f32; 3],
    pub position_min: [f32; 3],
    pub position_max: [f32; 3],
    pub rotation_min: [f32; 3],
    pub rotation_max: [f32; 3],
    /// 每轴线性弹簧刚度（0 表示该轴无弹簧）
    pub position_spring: [f32; 3],
    /// 每轴角度弹簧刚度（0 表示该轴无弹簧）
    pub rotation_spring: [f32; 3],
}

impl JointParam {
    #[inline]
    pub fn anchor_position(&self) -> Vec3 {
        Vec3::from_array(self.position)
    }

    #[inline]
    pub fn anchor_rotation(&self) -> Quat {
        euler_xyz(self.rotation)
    }
}

/// XYZ 顺序欧拉角 → 四元数（R = Rx * Ry * Rz）
#[inline]
pub fn euler_xyz(angles: [f32; 3]) -> Quat {
    let rx = Quat::from_rotation_x(angles[0]);
    let ry = Quat::from_rotation_y(angles[1]);
    let rz = Quat::from_rotation_z(angles[2]);
    rx * ry * rz
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_from_raw() {
        let mut rb = RigidBodyParam { physics_mode: 2, ..Default::default() };
        assert_eq!(rb.mode(), PhysicsMode::DynamicPinned);

        // 质量为 0 → 运动学
        rb.mass = 0.0;
        assert_eq!(rb.mode(), PhysicsMode::Kinematic);

        // 未知模式 → 运动学
        rb.mass = 1.0;
        rb.physics_mode = 9;
        assert_eq!(rb.mode(), PhysicsMode::Kinematic);
    }

    #[test]
    fn test_unsupported_shape() {
        let rb = RigidBodyParam { shape_type: 5, ..Default::default() };
        assert_eq!(rb.shape(), Err(MmdError::UnsupportedShape(5)));
    }

    #[test]
    fn test_euler_order() {
        let q = euler_xyz([0.3, 0.0, 0.0]);
        assert!(q.abs_diff_eq(Quat::from_rotation_x(0.3), 1e-6));
        let q = euler_xyz([0.1, 0.2, 0.3]);
        let expected = Quat::from_rotation_x(0.1) * Quat::from_rotation_y(0.2) * Quat::from_rotation_z(0.3);
        assert!(q.abs_diff_eq(expected, 1e-6));
    }
}
